use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::Result;
use crate::normalize::FOOTER_RE;

static SECTION_NUM_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+(\.\d+)+[a-z]?$").unwrap());

const MIN_TEXT_CHARS: usize = 20;

/// Loosely typed so that bad values are reported rather than rejected:
/// null or non-string text fields read as strings, and numeric fields keep
/// the raw JSON value for the checks below.
#[derive(Debug, Clone, Deserialize)]
pub struct SectionRecord {
    #[serde(default, deserialize_with = "lenient_string")]
    pub doc_type: String,
    #[serde(default)]
    pub article_number: Value,
    #[serde(default, deserialize_with = "lenient_string")]
    pub section_number: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub section_title: String,
    #[serde(default)]
    pub page_start: Value,
    #[serde(default)]
    pub page_end: Value,
    #[serde(default, deserialize_with = "lenient_string")]
    pub text: String,
}

impl SectionRecord {
    pub fn article(&self) -> Option<i64> {
        self.article_number.as_i64()
    }

    /// Both page bounds, when both are integers.
    pub fn pages(&self) -> Option<(i64, i64)> {
        Some((self.page_start.as_i64()?, self.page_end.as_i64()?))
    }
}

fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<String, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    })
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    metadata: Option<EnvelopeMeta>,
    sections: Vec<SectionRecord>,
}

#[derive(Debug, Deserialize)]
struct EnvelopeMeta {
    page_count: Option<i64>,
}

/// The KB file: the bare array, or the older `{metadata, sections}` envelope.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum KbFile {
    Sections(Vec<SectionRecord>),
    Envelope(Envelope),
}

pub fn read_sections(path: &Path) -> Result<(Vec<SectionRecord>, Option<usize>)> {
    let raw = fs::read_to_string(path)?;
    Ok(match serde_json::from_str(&raw)? {
        KbFile::Sections(sections) => (sections, None),
        KbFile::Envelope(env) => {
            let page_count = env
                .metadata
                .and_then(|m| m.page_count)
                .and_then(|n| usize::try_from(n).ok());
            (env.sections, page_count)
        }
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Error,
    Warn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueCode {
    SectionsMissing,
    BadDocType,
    BadArticleNumber,
    BadSectionNumber,
    BadPageRange,
    PageOutOfBounds,
    ArticleSectionMismatch,
    DuplicateSection,
    NonMonotonicArticle,
    DocTypeOrder,
    PageOverlap,
    FooterNoise,
    TextTooShort,
}

impl IssueCode {
    pub fn level(self) -> Level {
        use IssueCode::*;
        match self {
            SectionsMissing | BadDocType | BadArticleNumber | BadSectionNumber | BadPageRange
            | PageOutOfBounds => Level::Error,
            _ => Level::Warn,
        }
    }

    fn as_str(self) -> &'static str {
        use IssueCode::*;
        match self {
            SectionsMissing => "SECTIONS_MISSING",
            BadDocType => "BAD_DOCTYPE",
            BadArticleNumber => "BAD_ARTICLE_NUM",
            BadSectionNumber => "BAD_SECTION_NUM",
            BadPageRange => "BAD_PAGE_RANGE",
            PageOutOfBounds => "PAGE_OOB",
            ArticleSectionMismatch => "ARTICLE_SECTION_MISMATCH",
            DuplicateSection => "DUP_SECTION_NUMBER",
            NonMonotonicArticle => "NON_MONOTONIC_ARTICLE",
            DocTypeOrder => "DOCTYPE_ORDER",
            PageOverlap => "PAGE_OVERLAP",
            FooterNoise => "FOOTER_NOISE",
            TextTooShort => "TEXT_TOO_SHORT",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    pub code: IssueCode,
    pub section_idx: Option<usize>,
    pub message: String,
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.code.level() {
            Level::Error => "ERROR",
            Level::Warn => "WARN",
        };
        match self.section_idx {
            Some(i) => write!(f, "{} {} section[{}]: {}", level, self.code.as_str(), i, self.message),
            None => write!(f, "{} {} GLOBAL: {}", level, self.code.as_str(), self.message),
        }
    }
}

#[derive(Debug, Default)]
pub struct Report {
    pub issues: Vec<Issue>,
}

impl Report {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    #[cfg(test)]
    pub fn count(&self, code: IssueCode) -> usize {
        self.issues.iter().filter(|i| i.code == code).count()
    }

    pub fn print(&self) {
        for issue in &self.issues {
            println!("{}", issue);
        }
        let errors = self.issues.iter().filter(|i| i.code.level() == Level::Error).count();
        println!(
            "\nSummary: {} errors, {} warnings, {} total issues.",
            errors,
            self.issues.len() - errors,
            self.issues.len()
        );
    }
}

/// Read a KB file and check it. Never writes to `path`.
pub fn validate_file(path: &Path, page_count: Option<usize>) -> Result<Report> {
    let (sections, file_page_count) = read_sections(path)?;
    Ok(validate(&sections, page_count.or(file_page_count)))
}

pub fn validate(sections: &[SectionRecord], page_count: Option<usize>) -> Report {
    let mut report = Report::default();
    let mut push = |code, idx, message: String| {
        report.issues.push(Issue {
            code,
            section_idx: idx,
            message,
        })
    };

    if sections.is_empty() {
        push(IssueCode::SectionsMissing, None, "KB has no sections".into());
        return report;
    }

    let mut seen: HashMap<(&str, Option<i64>, &str), Vec<usize>> = HashMap::new();
    let mut seen_bylaws = false;

    for (i, s) in sections.iter().enumerate() {
        let idx = Some(i);
        let section_number = s.section_number.trim();

        match s.doc_type.as_str() {
            "Declaration" if seen_bylaws => push(
                IssueCode::DocTypeOrder,
                idx,
                "Declaration entry after Bylaws entries".into(),
            ),
            "Declaration" => {}
            "Bylaws" => seen_bylaws = true,
            other => push(IssueCode::BadDocType, idx, format!("doc_type invalid: {:?}", other)),
        }

        let article = s.article().filter(|&n| n > 0);
        if article.is_none() {
            push(
                IssueCode::BadArticleNumber,
                idx,
                format!("article_number invalid: {}", s.article_number),
            );
        }

        if !SECTION_NUM_RE.is_match(section_number) {
            push(
                IssueCode::BadSectionNumber,
                idx,
                format!("section_number invalid: {:?}", s.section_number),
            );
        } else if article.is_some() && section_major(section_number) != article {
            push(
                IssueCode::ArticleSectionMismatch,
                idx,
                format!(
                    "article_number={} but section_number={}",
                    s.article_number, section_number
                ),
            );
        }

        match s.pages() {
            Some((start, end)) if start < 1 || end < start => push(
                IssueCode::BadPageRange,
                idx,
                format!("Bad page range: {}-{}", start, end),
            ),
            Some(_) => {}
            None => push(
                IssueCode::BadPageRange,
                idx,
                format!("Bad page range: {}-{}", s.page_start, s.page_end),
            ),
        }
        if let (Some(count), Some((_, end))) = (page_count, s.pages()) {
            if end > count as i64 {
                push(
                    IssueCode::PageOutOfBounds,
                    idx,
                    format!("page_end {} > page_count {}", end, count),
                );
            }
        }

        if FOOTER_RE.is_match(&s.text) {
            push(
                IssueCode::FooterNoise,
                idx,
                "Detected Page|BK footer/header noise in text.".into(),
            );
        }
        let chars = s.text.trim().chars().count();
        if chars < MIN_TEXT_CHARS {
            push(
                IssueCode::TextTooShort,
                idx,
                format!("text is very short ({} chars)", chars),
            );
        }

        if let Some(prev) = i.checked_sub(1).map(|p| &sections[p]) {
            let same_doc = prev.doc_type == s.doc_type;
            if let (true, Some(a), Some(pa)) = (same_doc, article, prev.article()) {
                if a < pa {
                    push(
                        IssueCode::NonMonotonicArticle,
                        idx,
                        format!("article_number {} follows {} in {}", a, pa, s.doc_type),
                    );
                } else if a == pa {
                    if let (Some((start, _)), Some((_, prev_end))) = (s.pages(), prev.pages()) {
                        if prev_end > start {
                            push(
                                IssueCode::PageOverlap,
                                idx,
                                format!(
                                    "section {} starts on page {} before section {} ends on page {}",
                                    section_number, start, prev.section_number, prev_end
                                ),
                            );
                        }
                    }
                }
            }
        }

        seen.entry((s.doc_type.as_str(), article, section_number))
            .or_default()
            .push(i);
    }

    let mut dups: Vec<_> = seen.into_iter().filter(|(_, idxs)| idxs.len() > 1).collect();
    dups.sort_by_key(|(_, idxs)| idxs[0]);
    for ((doc_type, article, number), idxs) in dups {
        let article = article.map_or_else(|| "?".to_string(), |a| a.to_string());
        push(
            IssueCode::DuplicateSection,
            None,
            format!(
                "Duplicate section_number {:?} in {} article {}: idxs={:?}",
                number, doc_type, article, idxs
            ),
        );
    }

    report
}

fn section_major(section_number: &str) -> Option<i64> {
    section_number.split('.').next()?.parse().ok()
}
