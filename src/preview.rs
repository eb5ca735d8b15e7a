use std::fmt::Write as _;

use anyhow::{bail, Context, Result};

use crate::validate::SectionRecord;

const WRAP_WIDTH: usize = 110;

/// Inclusive page filter; either end may be open.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PageRange {
    pub start: Option<i64>,
    pub end: Option<i64>,
}

impl PageRange {
    /// "4-6", "35", "-10", "50-".
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        let num = |s: &str| -> Result<Option<i64>> {
            let s = s.trim();
            if s.is_empty() {
                return Ok(None);
            }
            s.parse()
                .map(Some)
                .with_context(|| format!("bad page number {:?}", s))
        };
        match raw.split_once('-') {
            Some((a, b)) => {
                let range = PageRange { start: num(a)?, end: num(b)? };
                if let (Some(s), Some(e)) = (range.start, range.end) {
                    if s > e {
                        bail!("page range {} runs backwards", raw);
                    }
                }
                Ok(range)
            }
            None => {
                let page = num(raw)?;
                Ok(PageRange { start: page, end: page })
            }
        }
    }

    /// Sections without integer page bounds never match.
    fn overlaps(&self, s: &SectionRecord) -> bool {
        let Some((page_start, page_end)) = s.pages() else {
            return false;
        };
        self.start.is_none_or(|start| page_end >= start) && self.end.is_none_or(|end| page_start <= end)
    }
}

#[derive(Debug, Default)]
pub struct Filter {
    pub pages: PageRange,
    pub doc_type: Option<String>,
    pub section_prefix: Option<String>,
}

impl Filter {
    fn matches(&self, s: &SectionRecord) -> bool {
        self.doc_type.as_deref().is_none_or(|d| s.doc_type == d)
            && self
                .section_prefix
                .as_deref()
                .is_none_or(|p| s.section_number.starts_with(p))
            && self.pages.overlaps(s)
    }
}

/// Render the matching sections for side-by-side reading against the PDF.
pub fn render(sections: &[SectionRecord], filter: &Filter) -> String {
    let mut out = String::new();
    for s in sections.iter().filter(|s| filter.matches(s)) {
        let header = format!(
            "[p{}–{}] {} Art {} Sec {} {}",
            s.page_start, s.page_end, s.doc_type, s.article_number, s.section_number, s.section_title
        );
        let _ = writeln!(out, "{}", header);
        let _ = writeln!(out, "{}", "-".repeat(header.chars().count()));
        let text = s.text.trim();
        if text.is_empty() {
            out.push_str("(no text)\n");
        } else {
            for line in wrap(text, WRAP_WIDTH) {
                let _ = writeln!(out, "{}", line);
            }
        }
        out.push('\n');
    }
    out
}

fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut line = String::new();
    for word in text.split_whitespace() {
        if !line.is_empty() && line.chars().count() + 1 + word.chars().count() > width {
            lines.push(std::mem::take(&mut line));
        }
        if !line.is_empty() {
            line.push(' ');
        }
        line.push_str(word);
    }
    if !line.is_empty() {
        lines.push(line);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(doc_type: &str, number: &str, pages: (i64, i64), text: &str) -> SectionRecord {
        let article: i64 = number.split('.').next().unwrap().parse().unwrap();
        SectionRecord {
            doc_type: doc_type.into(),
            article_number: article.into(),
            section_number: number.into(),
            section_title: "Title.".into(),
            page_start: pages.0.into(),
            page_end: pages.1.into(),
            text: text.into(),
        }
    }

    #[test]
    fn page_ranges() {
        assert_eq!(PageRange::parse("4-6").unwrap(), PageRange { start: Some(4), end: Some(6) });
        assert_eq!(PageRange::parse("35").unwrap(), PageRange { start: Some(35), end: Some(35) });
        assert_eq!(PageRange::parse("-10").unwrap(), PageRange { start: None, end: Some(10) });
        assert_eq!(PageRange::parse("50-").unwrap(), PageRange { start: Some(50), end: None });
        assert!(PageRange::parse("9-2").is_err());
        assert!(PageRange::parse("x").is_err());
    }

    #[test]
    fn filters_and_formats() {
        let kb = vec![
            rec("Declaration", "1.1", (1, 1), "Lot means a parcel."),
            rec("Declaration", "10.2", (33, 34), "No animals."),
            rec("Bylaws", "1.1", (57, 57), ""),
        ];
        let filter = Filter {
            pages: PageRange::parse("30-").unwrap(),
            ..Filter::default()
        };
        let out = render(&kb, &filter);
        assert!(out.starts_with("[p33–34] Declaration Art 10 Sec 10.2 Title.\n"));
        assert!(out.contains("No animals.\n"));
        assert!(out.contains("(no text)"));
        assert!(!out.contains("Lot means"));

        let filter = Filter {
            section_prefix: Some("1.".into()),
            doc_type: Some("Declaration".into()),
            ..Filter::default()
        };
        let out = render(&kb, &filter);
        assert!(out.contains("Lot means a parcel."));
        assert!(!out.contains("No animals"));
    }

    #[test]
    fn missing_pages_never_match() {
        let mut kb = vec![rec("Declaration", "3.1", (9, 9), "Every Owner shall be a member.")];
        kb[0].page_start = serde_json::Value::Null;
        assert!(render(&kb, &Filter::default()).is_empty());
    }

    #[test]
    fn wraps_long_text() {
        let text = "word ".repeat(60);
        let lines = wrap(&text, 20);
        assert!(lines.iter().all(|l| l.chars().count() <= 20));
        assert_eq!(lines.join(" ").split(' ').count(), 60);
    }
}
