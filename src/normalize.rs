use std::sync::LazyLock;

use regex::Regex;

/// Running headers/footers stamped on every page of the recorded document:
/// "Page | 33", recorder book/page references "BK123456", "PG 789".
pub static FOOTER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)Page\s*\|\s*\d+|\bBK\d{6,}\b|\bPG\s*\d+\b").unwrap()
});

static ARTICLE_WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?i:ART[1l|]CLE)\b").unwrap());
static ARTICLE_NUM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?i:ARTICLE)\s+([0-9OoIl]+)\b").unwrap());
static HEADING_NUM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9OoIl]+(?:\.[0-9OoIl]+)+)(?:\.|\s|$)").unwrap());

const LIGATURES: &[(&str, &str)] = &[
    ("\u{fb00}", "ff"),
    ("\u{fb01}", "fi"),
    ("\u{fb02}", "fl"),
    ("\u{fb03}", "ffi"),
    ("\u{fb04}", "ffl"),
];

/// Clean one page of raw OCR output. Idempotent.
///
/// Steps, in order: ligatures, per-line whitespace collapse, page furniture
/// removal, heading-number misreads, hyphenated line-wrap joins, blank-line
/// collapse.
pub fn normalize(raw: &str) -> String {
    let mut text = raw.to_string();
    for (from, to) in LIGATURES {
        if text.contains(from) {
            text = text.replace(from, to);
        }
    }

    let lines: Vec<String> = text
        .lines()
        .map(|l| l.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|l| !FOOTER_RE.is_match(l))
        .map(|l| fix_misreads(&l))
        .collect();

    let lines = join_hyphenated(lines);

    let mut out: Vec<String> = Vec::with_capacity(lines.len());
    for line in lines {
        if line.is_empty() && out.last().is_none_or(|l| l.is_empty()) {
            continue;
        }
        out.push(line);
    }
    while out.last().is_some_and(|l| l.is_empty()) {
        out.pop();
    }
    out.join("\n")
}

/// Fix the fixed table of OCR misreads that only matter at line start:
/// "ARTlCLE" → "ARTICLE", "ARTICLE 1O" → "ARTICLE 10", "1O.4" → "10.4".
fn fix_misreads(line: &str) -> String {
    let mut line = line.to_string();

    if let Some(m) = ARTICLE_WORD_RE.find(&line) {
        if !m.as_str().eq_ignore_ascii_case("article") {
            line.replace_range(m.range(), "ARTICLE");
        }
    }

    if let Some(caps) = ARTICLE_NUM_RE.captures(&line) {
        let tok = caps.get(1).unwrap();
        if has_digit(tok.as_str()) {
            let fixed = fix_digits(tok.as_str());
            line.replace_range(tok.range(), &fixed);
        }
        return line;
    }

    if let Some(caps) = HEADING_NUM_RE.captures(&line) {
        let tok = caps.get(1).unwrap();
        if has_digit(tok.as_str()) {
            let fixed = fix_digits(tok.as_str());
            line.replace_range(tok.range(), &fixed);
        }
    }
    line
}

fn has_digit(s: &str) -> bool {
    s.chars().any(|c| c.is_ascii_digit())
}

fn fix_digits(token: &str) -> String {
    token
        .chars()
        .map(|c| match c {
            'O' | 'o' => '0',
            'I' | 'l' => '1',
            other => other,
        })
        .collect()
}

/// Rejoin "govern-" + "ment ..." line wraps. A join is refused when the
/// merged line would look like page furniture.
fn join_hyphenated(lines: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(lines.len());
    let mut iter = lines.into_iter().peekable();

    while let Some(mut current) = iter.next() {
        while let Some(next) = iter.peek() {
            if !ends_with_wrap_hyphen(&current) || !starts_lowercase(next) {
                break;
            }
            let joined = format!("{}{}", &current[..current.len() - 1], next);
            if FOOTER_RE.is_match(&joined) {
                break;
            }
            current = joined;
            iter.next();
        }
        out.push(current);
    }
    out
}

fn ends_with_wrap_hyphen(line: &str) -> bool {
    let mut rev = line.chars().rev();
    rev.next() == Some('-') && rev.next().is_some_and(|c| c.is_ascii_lowercase())
}

fn starts_lowercase(line: &str) -> bool {
    line.chars().next().is_some_and(|c| c.is_ascii_lowercase())
}
