pub mod cache;
pub mod engine;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use crate::config::Settings;
use crate::error::{KbError, Result};
use crate::model::Page;
use cache::PageCache;
use engine::PageOcr;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct OcrStats {
    pub pages: usize,
    pub cached: usize,
    pub ocr_calls: usize,
    pub failed: usize,
}

/// Produce every page of the PDF in order, reading through the cache and
/// OCR'ing only the pages it lacks. Each new page is flushed to the cache
/// before the next one starts.
pub fn collect_pages(
    settings: &Settings,
    engine: &dyn PageOcr,
    cache: &mut PageCache,
) -> Result<(Vec<Page>, OcrStats)> {
    let pdf = &settings.pdf_path;

    if !pdf.exists() {
        return cache_only(settings, cache);
    }

    let count = engine.page_count(pdf)?;
    settings.check_page_count(count)?;
    let missing = (1..=count).filter(|n| cache.load(*n).is_none()).count();
    if missing > 0 {
        engine.check_available()?;
        info!("OCR'ing {} of {} pages from {}", missing, count, pdf.display());
    }

    let pb = ProgressBar::new(missing as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} pages (eta {eta})")
            .map_err(|e| KbError::Config(e.to_string()))?
            .progress_chars("=> "),
    );

    let mut stats = OcrStats {
        pages: count as usize,
        ..OcrStats::default()
    };
    let mut pages = Vec::with_capacity(count as usize);

    for n in 1..=count {
        if let Some(text) = cache.load(n) {
            stats.cached += 1;
            pages.push(Page::new(n, text.to_string()));
            continue;
        }

        stats.ocr_calls += 1;
        match engine.extract_page(pdf, n, settings.dpi) {
            Ok(text) => {
                cache.store(n, text.clone())?;
                pages.push(Page::new(n, text));
            }
            Err(e) if !e.is_fatal() => {
                pb.suspend(|| warn!(page = n, "{}; continuing with empty text", e));
                stats.failed += 1;
                pages.push(Page::new(n, String::new()));
            }
            Err(e) => {
                pb.finish_and_clear();
                return Err(e);
            }
        }
        pb.inc(1);
    }

    pb.finish_and_clear();
    Ok((pages, stats))
}

fn cache_only(settings: &Settings, cache: &PageCache) -> Result<(Vec<Page>, OcrStats)> {
    let Some(max) = cache.max_page() else {
        return Err(KbError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("PDF not found at {} and no OCR cache", settings.pdf_path.display()),
        )));
    };
    settings.check_page_count(max)?;
    warn!(
        "PDF {} not found; building from {} cached pages",
        settings.pdf_path.display(),
        cache.len()
    );

    let pages: Vec<Page> = (1..=max)
        .map(|n| {
            let text = cache.load(n).unwrap_or_else(|| {
                warn!(page = n, "Page missing from cache; using empty text");
                ""
            });
            Page::new(n, text.to_string())
        })
        .collect();

    let stats = OcrStats {
        pages: pages.len(),
        cached: cache.len(),
        ..OcrStats::default()
    };
    Ok((pages, stats))
}
