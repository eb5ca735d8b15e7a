use std::sync::LazyLock;

use regex::Regex;

/// "ARTICLE 10: USE RESTRICTIONS", "ARTICLE IV", "Article 3 - Membership".
static ARTICLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^ARTICLE\s+([IVXLCDM]+|\d+(?:\.\d+)*)\b\.?(.*)$").unwrap()
});
/// "10.11. Animals. No animals ...", "10.11.Animals.", "1.1 Meaning", "Section 4.3 Enforcement".
static SECTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:(?i:SECTION)\s+)?(\d+(?:\.\d+)+[a-z]?)(?:\.\s*|\s+|$)(.*)$").unwrap()
});

const MAX_ARTICLE: u32 = 100;
const MAX_TITLE_LINE: usize = 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeadingKind {
    Article,
    Section,
}

/// A detected heading, positioned in the concatenated document text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadingMatch {
    pub kind: HeadingKind,
    pub number: String,
    pub title: String,
    pub page_number: u32,
    pub offset: usize,
}

/// What a single normalized line looks like, before any context is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineClass {
    Article {
        number: u32,
        title: String,
    },
    Section {
        number: String,
        title: String,
        /// Byte offset within the line where the section's text begins.
        body_start: usize,
    },
    /// "ARTICLE 10.4 ..." reads as either; the segmenter decides.
    Ambiguous {
        article: u32,
        title: String,
        section: String,
    },
    Text,
}

pub fn classify_line(line: &str) -> LineClass {
    if let Some(caps) = ARTICLE_RE.captures(line) {
        let tail = caps.get(2).map_or("", |m| m.as_str());
        if is_cross_reference(tail) {
            return LineClass::Text;
        }
        let raw = &caps[1];
        let title = clean_article_title(tail);
        if raw.contains('.') {
            return match raw.split('.').next().and_then(|m| m.parse().ok()) {
                Some(article) if (1..=MAX_ARTICLE).contains(&article) => LineClass::Ambiguous {
                    article,
                    title,
                    section: raw.to_string(),
                },
                _ => LineClass::Text,
            };
        }
        return match article_number(raw) {
            Some(number) => LineClass::Article { number, title },
            None => LineClass::Text,
        };
    }

    if let Some(caps) = SECTION_RE.captures(line) {
        let number = caps[1].to_string();
        let Some(tail) = caps.get(2).filter(|m| !m.as_str().is_empty()) else {
            return LineClass::Section {
                number,
                title: String::new(),
                body_start: line.len(),
            };
        };
        if is_cross_reference(tail.as_str()) {
            return LineClass::Text;
        }
        let (title, body_rel) = split_title_and_body(tail.as_str());
        return LineClass::Section {
            number,
            title,
            body_start: tail.start() + body_rel,
        };
    }

    LineClass::Text
}

/// A line that can serve as an ARTICLE title when the heading line had none.
pub fn is_title_line(line: &str) -> bool {
    !line.is_empty()
        && line.len() <= MAX_TITLE_LINE
        && line.chars().any(char::is_alphabetic)
        && !line.chars().any(|c| c.is_ascii_lowercase())
        && classify_line(line) == LineClass::Text
}

pub fn clean_article_title(raw: &str) -> String {
    let text = raw.trim_start_matches(|c: char| c.is_whitespace() || matches!(c, ':' | '-' | '–' | '.'));
    let cut = text.find(['.', ';']).unwrap_or(text.len());
    text[..cut].trim().to_uppercase()
}

/// Split the text after "X.Y." into (title, byte offset where the body begins).
/// Colon ends the title; otherwise the first sentence; otherwise the whole line.
fn split_title_and_body(tail: &str) -> (String, usize) {
    if let Some(i) = tail.find(':') {
        return (tail[..i].trim().to_string(), skip_spaces(tail, i + 1));
    }
    if let Some(i) = tail.find('.') {
        return (tail[..=i].trim().to_string(), skip_spaces(tail, i + 1));
    }
    (tail.trim().to_string(), tail.len())
}

fn skip_spaces(s: &str, from: usize) -> usize {
    from + (s[from..].len() - s[from..].trim_start().len())
}

/// "Article 9 of this Declaration", "10.4 of the Bylaws", "Section 2.1, above".
fn is_cross_reference(tail: &str) -> bool {
    let tail = tail.trim_start();
    tail.chars()
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || matches!(c, ',' | ')' | ';'))
}

fn article_number(raw: &str) -> Option<u32> {
    let n = match raw.parse::<u32>() {
        Ok(n) => n,
        Err(_) => roman_value(raw)?,
    };
    (1..=MAX_ARTICLE).contains(&n).then_some(n)
}

const ROMAN: &[(u32, &str)] = &[
    (1000, "M"),
    (900, "CM"),
    (500, "D"),
    (400, "CD"),
    (100, "C"),
    (90, "XC"),
    (50, "L"),
    (40, "XL"),
    (10, "X"),
    (9, "IX"),
    (5, "V"),
    (4, "IV"),
    (1, "I"),
];

/// Canonical roman numerals only, so words like "mix" or "did" are rejected.
pub fn roman_value(raw: &str) -> Option<u32> {
    let upper = raw.to_ascii_uppercase();
    let mut rest = upper.as_str();
    let mut total = 0;
    for &(value, symbol) in ROMAN {
        while let Some(r) = rest.strip_prefix(symbol) {
            total += value;
            rest = r;
        }
    }
    if !rest.is_empty() || total == 0 || to_roman(total) != upper {
        return None;
    }
    Some(total)
}

fn to_roman(mut n: u32) -> String {
    let mut out = String::new();
    for &(value, symbol) in ROMAN {
        while n >= value {
            out.push_str(symbol);
            n -= value;
        }
    }
    out
}
