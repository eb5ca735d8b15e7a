use std::path::PathBuf;

use serde::Deserialize;

use crate::error::{KbError, Result};

const ENV_PREFIX: &str = "RIVERWALK";
const CONFIG_FILE: &str = "riverwalk";

/// Runtime settings: built-in defaults, then `riverwalk.toml`, then
/// `RIVERWALK_*` environment variables. CLI flags are applied on top by `main`.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub pdf_path: PathBuf,
    pub output_path: PathBuf,
    pub cache_path: PathBuf,
    pub dpi: u32,
    pub ocr_lang: String,
    pub pdftoppm_bin: String,
    pub pdfinfo_bin: String,
    pub tesseract_bin: String,
    /// Forces the Bylaws boundary to the start of this page instead of
    /// scanning for the `BYLAWS OF` marker.
    #[serde(default)]
    pub bylaws_start_page: Option<u32>,
}

impl Settings {
    pub fn load() -> Result<Self> {
        let settings = config::Config::builder()
            .set_default("pdf_path", "data/Riverwalk_CCRs.pdf")
            .and_then(|b| b.set_default("output_path", "output/riverwalk_ccrs_kb.json"))
            .and_then(|b| b.set_default("cache_path", "output/riverwalk_ccrs_pages.json"))
            .and_then(|b| b.set_default("dpi", 300_i64))
            .and_then(|b| b.set_default("ocr_lang", "eng"))
            .and_then(|b| b.set_default("pdftoppm_bin", "pdftoppm"))
            .and_then(|b| b.set_default("pdfinfo_bin", "pdfinfo"))
            .and_then(|b| b.set_default("tesseract_bin", "tesseract"))
            .map_err(|e| KbError::Config(e.to_string()))?
            .add_source(config::File::with_name(CONFIG_FILE).required(false))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()
            .map_err(|e| KbError::Config(e.to_string()))?;

        let settings: Settings = settings
            .try_deserialize()
            .map_err(|e| KbError::Config(e.to_string()))?;
        settings.check()?;
        Ok(settings)
    }

    pub fn check(&self) -> Result<()> {
        if self.dpi == 0 {
            return Err(KbError::Config("dpi must be positive".into()));
        }
        if self.bylaws_start_page == Some(0) {
            return Err(KbError::Config("bylaws_start_page is 1-based".into()));
        }
        Ok(())
    }

    /// Settings that depend on the document; checked once the page count is known.
    pub fn check_page_count(&self, page_count: u32) -> Result<()> {
        match self.bylaws_start_page {
            Some(page) if page > page_count => Err(KbError::Config(format!(
                "bylaws_start_page {} is beyond the document ({} pages)",
                page, page_count
            ))),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
pub(crate) fn test_settings(dir: &std::path::Path) -> Settings {
    Settings {
        pdf_path: dir.join("missing.pdf"),
        output_path: dir.join("out/kb.json"),
        cache_path: dir.join("out/pages.json"),
        dpi: 300,
        ocr_lang: "eng".into(),
        pdftoppm_bin: "pdftoppm".into(),
        pdfinfo_bin: "pdfinfo".into(),
        tesseract_bin: "tesseract".into(),
        bylaws_start_page: None,
    }
}
