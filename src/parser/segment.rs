use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use super::headings::{classify_line, clean_article_title, is_title_line, HeadingKind, HeadingMatch, LineClass};
use super::paged::PagedText;
use crate::error::{KbError, Result};
use crate::model::{ArticleNode, DocType, Page, SectionNode};

/// Upper-case only: prose such as "Bylaws of the Association" wrapped onto a
/// new line must not split the document.
static BYLAWS_MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^(?:AMENDED\s+(?:AND\s+RESTATED\s+)?)?BYLAWS\s+OF\b").unwrap()
});

pub struct Segmenter {
    /// Fixed Bylaws boundary; when unset the marker line is searched for.
    pub bylaws_start_page: Option<u32>,
}

struct OpenSection {
    heading: HeadingMatch,
    body_start: usize,
}

impl Segmenter {
    pub fn new(bylaws_start_page: Option<u32>) -> Self {
        Segmenter { bylaws_start_page }
    }

    /// Split the document into Declaration/Bylaws and build each part's
    /// Article → Section tree. Fails if a part has no ARTICLE heading.
    pub fn segment(&self, pages: &[Page]) -> Result<Vec<ArticleNode>> {
        let paged = PagedText::from_pages(pages);
        let end = paged.len();

        let parts = match self.bylaws_boundary(&paged)? {
            Some(b) => vec![(DocType::Declaration, 0..b), (DocType::Bylaws, b..end)],
            None => {
                warn!("No Bylaws boundary marker found; treating the whole document as Declaration");
                vec![(DocType::Declaration, 0..end)]
            }
        };

        let mut articles = Vec::new();
        for (doc_type, range) in parts {
            let part = scan_part(&paged, doc_type, range);
            if part.is_empty() {
                return Err(KbError::Segmentation { doc_type });
            }
            debug!(%doc_type, articles = part.len(), "Segmented");
            articles.extend(part);
        }

        flag_empty_sections(&articles);
        Ok(articles)
    }

    fn bylaws_boundary(&self, paged: &PagedText) -> Result<Option<usize>> {
        if let Some(page) = self.bylaws_start_page {
            return paged
                .page_start_offset(page)
                .map(Some)
                .ok_or_else(|| KbError::Config(format!("bylaws_start_page {} is beyond the document", page)));
        }
        Ok(BYLAWS_MARKER_RE.find(paged.text()).map(|m| m.start()))
    }
}

fn scan_part(paged: &PagedText, doc_type: DocType, range: Range<usize>) -> Vec<ArticleNode> {
    let part_end = range.end;
    let lines = paged.lines(range);
    let mut articles: Vec<ArticleNode> = Vec::new();
    let mut open: Option<OpenSection> = None;

    let mut i = 0;
    while i < lines.len() {
        let (offset, line) = lines[i];
        i += 1;

        let class = match classify_line(line) {
            // Only opens an article when none is open yet; otherwise it is text.
            LineClass::Ambiguous { article, title, .. } if articles.is_empty() => {
                LineClass::Article { number: article, title }
            }
            LineClass::Ambiguous { section, .. } => {
                debug!(%doc_type, %section, page = paged.page_at(offset), "ARTICLE line with a section number read as text");
                LineClass::Text
            }
            other => other,
        };

        match class {
            LineClass::Article { number, mut title } => {
                close_section(paged, &mut articles, open.take(), offset);
                if title.is_empty() {
                    if let Some(j) = next_nonempty(&lines, i).filter(|&j| is_title_line(lines[j].1)) {
                        title = clean_article_title(lines[j].1);
                        i = j + 1;
                    }
                }
                let heading = heading_at(paged, HeadingKind::Article, number.to_string(), title, offset);
                articles.push(ArticleNode {
                    doc_type,
                    number,
                    title: heading.title,
                    page_start: heading.page_number,
                    sections: Vec::new(),
                });
            }
            LineClass::Section { number, title, body_start } => {
                let Some(article) = articles.last() else {
                    warn!(%doc_type, section = %number, page = paged.page_at(offset), "Section before any ARTICLE; skipped");
                    continue;
                };
                // Kept in the open article; a missed ARTICLE heading is left for validate to flag.
                if major(&number) != Some(article.number) {
                    warn!(
                        %doc_type,
                        article = article.number,
                        section = %number,
                        page = paged.page_at(offset),
                        "Section number does not belong to its article"
                    );
                }
                close_section(paged, &mut articles, open.take(), offset);
                open = Some(OpenSection {
                    heading: heading_at(paged, HeadingKind::Section, number, title, offset),
                    body_start: offset + body_start,
                });
            }
            LineClass::Ambiguous { .. } | LineClass::Text => {}
        }
    }
    close_section(paged, &mut articles, open.take(), part_end);

    for article in articles.iter().filter(|a| a.sections.is_empty()) {
        warn!(%doc_type, article = article.number, page = article.page_start, "Article has no numbered sections");
    }
    articles
}

fn heading_at(paged: &PagedText, kind: HeadingKind, number: String, title: String, offset: usize) -> HeadingMatch {
    let m = HeadingMatch {
        kind,
        number,
        title,
        page_number: paged.page_at(offset),
        offset,
    };
    debug!(kind = ?m.kind, number = %m.number, title = %m.title, page = m.page_number, offset = m.offset, "Heading");
    m
}

/// End the open section at `end` (the next heading's offset or end of part).
fn close_section(paged: &PagedText, articles: &mut [ArticleNode], open: Option<OpenSection>, end: usize) {
    let (Some(open), Some(article)) = (open, articles.last_mut()) else {
        return;
    };
    let start = open.heading.offset;
    let body = &paged.text()[open.body_start.min(end)..end];
    article.sections.push(SectionNode {
        doc_type: article.doc_type,
        article_number: article.number,
        article_title: article.title.clone(),
        section_number: open.heading.number,
        section_title: open.heading.title,
        page_start: open.heading.page_number,
        page_end: paged
            .page_of_last_char(start..end)
            .unwrap_or(open.heading.page_number),
        text: body.split_whitespace().collect::<Vec<_>>().join(" "),
    });
}

fn next_nonempty(lines: &[(usize, &str)], from: usize) -> Option<usize> {
    (from..lines.len()).find(|&j| !lines[j].1.trim().is_empty())
}

fn major(section_number: &str) -> Option<u32> {
    section_number.split('.').next()?.parse().ok()
}

fn flag_empty_sections(articles: &[ArticleNode]) {
    let sections: Vec<&SectionNode> = articles.iter().flat_map(|a| &a.sections).collect();
    let last = sections.len().saturating_sub(1);
    for (i, s) in sections.iter().enumerate().filter(|(_, s)| s.text.is_empty()) {
        if i == last {
            warn!(section = %s.section_number, page = s.page_start, "Last section has no text; document may be truncated");
        } else {
            warn!(section = %s.section_number, page = s.page_start, "Section has no text");
        }
    }
}
