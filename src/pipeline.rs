use tracing::info;

use crate::config::Settings;
use crate::error::Result;
use crate::kb::{KbMetadata, KnowledgeBase};
use crate::model::DocType;
use crate::ocr::cache::PageCache;
use crate::ocr::engine::PageOcr;
use crate::ocr::{self, OcrStats};
use crate::parser::Segmenter;

#[derive(Debug)]
pub struct BuildSummary {
    pub ocr: OcrStats,
    pub metadata: KbMetadata,
    pub declaration_sections: usize,
    pub bylaws_sections: usize,
}

impl BuildSummary {
    pub fn print(&self) {
        println!("Source: {}", self.metadata.source_file);
        println!(
            "Pages: {} of {} ({} cached, {} OCR'd, {} failed)",
            self.metadata.page_count,
            self.ocr.pages,
            self.ocr.cached,
            self.ocr.ocr_calls - self.ocr.failed,
            self.ocr.failed
        );
        println!(
            "Sections: {} Declaration, {} Bylaws",
            self.declaration_sections, self.bylaws_sections
        );
    }
}

/// PDF → pages (cached) → segmented tree → KB file. The output file is only
/// written once every earlier stage has succeeded.
pub fn run_build(settings: &Settings, engine: &dyn PageOcr) -> Result<BuildSummary> {
    info!("Building KB from {}", settings.pdf_path.display());

    let mut cache = PageCache::open(&settings.cache_path);
    let (pages, ocr) = ocr::collect_pages(settings, engine, &mut cache)?;

    let articles = Segmenter::new(settings.bylaws_start_page).segment(&pages)?;
    let metadata = KbMetadata {
        source_file: settings.pdf_path.display().to_string(),
        page_count: pages.len(),
    };
    let kb = KnowledgeBase::build(articles, metadata);
    kb.write(&settings.output_path)?;

    let count = |d: DocType| kb.sections.iter().filter(|s| s.doc_type == d).count();
    Ok(BuildSummary {
        ocr,
        declaration_sections: count(DocType::Declaration),
        bylaws_sections: count(DocType::Bylaws),
        metadata: kb.metadata,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::fs;

    use super::*;
    use crate::config::test_settings;
    use crate::error::KbError;
    use crate::model::SectionNode;
    use crate::ocr::testing::FakeOcr;

    fn fixture_engine() -> FakeOcr {
        let raw = fs::read_to_string("tests/fixtures/sample_pages.json").unwrap();
        let pages: BTreeMap<u32, String> = serde_json::from_str(&raw).unwrap();
        let texts: Vec<&str> = pages.values().map(String::as_str).collect();
        FakeOcr::new(&texts)
    }

    fn settings(dir: &std::path::Path) -> Settings {
        let mut s = test_settings(dir);
        s.pdf_path = dir.join("Riverwalk_CCRs.pdf");
        fs::write(&s.pdf_path, b"%PDF-1.4").unwrap();
        s
    }

    fn read_kb(s: &Settings) -> Vec<SectionNode> {
        serde_json::from_str(&fs::read_to_string(&s.output_path).unwrap()).unwrap()
    }

    #[test]
    fn builds_fixture_document() {
        let dir = tempfile::tempdir().unwrap();
        let s = settings(dir.path());
        let summary = run_build(&s, &fixture_engine()).unwrap();
        assert_eq!(summary.metadata.page_count, 5);
        assert_eq!(summary.declaration_sections, 5);
        assert_eq!(summary.bylaws_sections, 3);

        let kb = read_kb(&s);
        let keys: Vec<(DocType, u32, &str)> = kb
            .iter()
            .map(|x| (x.doc_type, x.article_number, x.section_number.as_str()))
            .collect();
        assert_eq!(
            keys,
            [
                (DocType::Declaration, 1, "1.1"),
                (DocType::Declaration, 1, "1.2"),
                (DocType::Declaration, 1, "1.20"),
                (DocType::Declaration, 1, "1.20"),
                (DocType::Declaration, 10, "10.1"),
                (DocType::Bylaws, 1, "1.1"),
                (DocType::Bylaws, 2, "2.1"),
                (DocType::Bylaws, 2, "2.2"),
            ]
        );

        assert_eq!(kb[0].text, "Riverwalk Homeowners Association, Inc., and its successors, subject to the governing documents.");
        assert_eq!(kb[1].section_title, "Board");
        assert_eq!((kb[1].page_start, kb[1].page_end), (2, 3));
        assert_eq!(kb[4].article_title, "USE RESTRICTIONS");
        assert_eq!(kb[5].article_title, "NAME AND LOCATION");
        assert_eq!(kb[6].text, "Every Owner shall be a member of the Association. Article 9 of the Declaration governs transfers.");
        assert!(kb.iter().all(|x| !x.text.contains("Page |") && !x.text.contains("BK123456")));
    }

    #[test]
    fn second_run_uses_cache_only() {
        let dir = tempfile::tempdir().unwrap();
        let s = settings(dir.path());

        let first = fixture_engine();
        run_build(&s, &first).unwrap();
        assert_eq!(first.calls.get(), 5);
        let bytes = fs::read(&s.output_path).unwrap();

        let second = fixture_engine();
        let summary = run_build(&s, &second).unwrap();
        assert_eq!(second.calls.get(), 0);
        assert_eq!(summary.ocr.cached, 5);
        assert_eq!(fs::read(&s.output_path).unwrap(), bytes);
    }

    #[test]
    fn no_headings_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let s = settings(dir.path());
        let engine = FakeOcr::new(&["Cover page", "Exhibit A legal description"]);
        let err = run_build(&s, &engine).unwrap_err();
        assert!(matches!(err, KbError::Segmentation { .. }));
        assert!(!s.output_path.exists());
    }

    #[test]
    fn unavailable_ocr_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let s = settings(dir.path());
        let mut engine = fixture_engine();
        engine.available = false;
        let err = run_build(&s, &engine).unwrap_err();
        assert!(matches!(err, KbError::OcrUnavailable { .. }));
        assert!(!s.output_path.exists());
        assert!(!s.cache_path.exists());
    }

    #[test]
    fn bad_bylaws_page_fails_without_ocr() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = settings(dir.path());
        s.bylaws_start_page = Some(9);
        let engine = fixture_engine();
        let err = run_build(&s, &engine).unwrap_err();
        assert!(matches!(err, KbError::Config(_)));
        assert_eq!(engine.calls.get(), 0);
        assert!(!s.output_path.exists());
    }

    #[test]
    fn bylaws_page_setting_overrides_marker() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = settings(dir.path());
        s.bylaws_start_page = Some(5);
        let summary = run_build(&s, &fixture_engine()).unwrap();
        assert_eq!(summary.declaration_sections, 6);
        assert_eq!(summary.bylaws_sections, 2);
    }

    #[test]
    fn failed_page_still_builds() {
        let dir = tempfile::tempdir().unwrap();
        let s = settings(dir.path());
        let mut engine = fixture_engine();
        engine.fail_pages = vec![1];
        let summary = run_build(&s, &engine).unwrap();
        assert_eq!(summary.ocr.failed, 1);
        assert_eq!(read_kb(&s).len(), 8);
    }

    #[test]
    fn declaration_precedes_bylaws() {
        let dir = tempfile::tempdir().unwrap();
        let s = settings(dir.path());
        run_build(&s, &fixture_engine()).unwrap();
        let kb = read_kb(&s);
        let first_bylaws = kb.iter().position(|x| x.doc_type == DocType::Bylaws).unwrap();
        assert!(kb[first_bylaws..].iter().all(|x| x.doc_type == DocType::Bylaws));
        assert!(kb.iter().all(|x| x.page_start <= x.page_end));
    }
}
