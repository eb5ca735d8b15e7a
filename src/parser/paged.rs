use std::ops::Range;

use crate::model::Page;

/// Normalized page texts concatenated into one buffer, with enough
/// bookkeeping to map any byte offset back to its page.
#[derive(Debug)]
pub struct PagedText {
    text: String,
    /// (start offset, page number), ascending in both.
    starts: Vec<(usize, u32)>,
}

impl PagedText {
    /// Every page contributes its text plus a trailing newline, so pages
    /// always begin on a line boundary.
    pub fn from_pages(pages: &[Page]) -> Self {
        let mut text = String::new();
        let mut starts = Vec::with_capacity(pages.len());
        for page in pages {
            debug_assert!(starts.last().is_none_or(|&(_, n)| n < page.page_number));
            starts.push((text.len(), page.page_number));
            text.push_str(&page.normalized_text);
            text.push('\n');
        }
        PagedText { text, starts }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn page_at(&self, offset: usize) -> u32 {
        let idx = self.starts.partition_point(|&(start, _)| start <= offset);
        self.starts
            .get(idx.saturating_sub(1))
            .map(|&(_, page)| page)
            .unwrap_or(1)
    }

    /// Page owning the last non-whitespace character in `range`.
    pub fn page_of_last_char(&self, range: Range<usize>) -> Option<u32> {
        let start = range.start;
        self.text[range]
            .char_indices()
            .rev()
            .find(|(_, c)| !c.is_whitespace())
            .map(|(i, _)| self.page_at(start + i))
    }

    pub fn page_start_offset(&self, page_number: u32) -> Option<usize> {
        self.starts
            .iter()
            .find(|&&(_, page)| page == page_number)
            .map(|&(start, _)| start)
    }

    /// Lines of `range` with their absolute start offsets, newline excluded.
    pub fn lines(&self, range: Range<usize>) -> Vec<(usize, &str)> {
        let mut offset = range.start;
        let mut out = Vec::new();
        for line in self.text[range].split('\n') {
            out.push((offset, line));
            offset += line.len() + 1;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paged(texts: &[&str]) -> PagedText {
        let pages: Vec<Page> = (1u32..)
            .zip(texts)
            .map(|(n, t)| Page::new(n, t.to_string()))
            .collect();
        PagedText::from_pages(&pages)
    }

    #[test]
    fn offsets_map_to_pages() {
        let p = paged(&["abc", "", "de"]);
        assert_eq!(p.text(), "abc\n\nde\n");
        assert_eq!(p.page_at(0), 1);
        assert_eq!(p.page_at(3), 1);
        assert_eq!(p.page_at(4), 2);
        assert_eq!(p.page_at(5), 3);
        assert_eq!(p.page_start_offset(3), Some(5));
        assert_eq!(p.page_start_offset(9), None);
    }

    #[test]
    fn last_char_skips_trailing_newlines() {
        let p = paged(&["abc", "", "de"]);
        assert_eq!(p.page_of_last_char(0..5), Some(1));
        assert_eq!(p.page_of_last_char(0..p.len()), Some(3));
        assert_eq!(p.page_of_last_char(3..5), None);
    }

    #[test]
    fn lines_carry_offsets() {
        let p = paged(&["a\nbb", "c"]);
        let lines = p.lines(0..p.len());
        assert_eq!(lines[0], (0, "a"));
        assert_eq!(lines[1], (2, "bb"));
        assert_eq!(lines[2], (5, "c"));
    }
}
