use std::io::ErrorKind;
use std::path::Path;
use std::process::{Command, Output, Stdio};

use tracing::debug;

use crate::config::Settings;
use crate::error::{KbError, Result};

/// Page image in, raw text out. The real implementation shells out to
/// poppler and tesseract; tests substitute a scripted one.
pub trait PageOcr {
    /// Fail with `OcrUnavailable` unless every external binary can be spawned.
    fn check_available(&self) -> Result<()>;

    fn page_count(&self, pdf_path: &Path) -> Result<u32>;

    fn extract_page(&self, pdf_path: &Path, page_number: u32, dpi: u32) -> Result<String>;
}

/// `pdfinfo` for the page count, `pdftoppm` to rasterize, `tesseract` to read.
pub struct PopplerTesseract {
    pdftoppm: String,
    pdfinfo: String,
    tesseract: String,
    lang: String,
}

impl PopplerTesseract {
    pub fn from_settings(settings: &Settings) -> Self {
        PopplerTesseract {
            pdftoppm: settings.pdftoppm_bin.clone(),
            pdfinfo: settings.pdfinfo_bin.clone(),
            tesseract: settings.tesseract_bin.clone(),
            lang: settings.ocr_lang.clone(),
        }
    }
}

impl PageOcr for PopplerTesseract {
    fn check_available(&self) -> Result<()> {
        for bin in [&self.pdfinfo, &self.pdftoppm, &self.tesseract] {
            let status = Command::new(bin)
                .arg("-v")
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status();
            if status.is_err() {
                return Err(KbError::OcrUnavailable {
                    binary: bin.to_string(),
                });
            }
        }
        Ok(())
    }

    fn page_count(&self, pdf_path: &Path) -> Result<u32> {
        let out = run(Command::new(&self.pdfinfo).arg(pdf_path), &self.pdfinfo)?;
        if !out.status.success() {
            return Err(KbError::Io(std::io::Error::other(format!(
                "pdfinfo failed on {}: {}",
                pdf_path.display(),
                String::from_utf8_lossy(&out.stderr).trim()
            ))));
        }
        parse_page_count(&String::from_utf8_lossy(&out.stdout)).ok_or_else(|| {
            KbError::Io(std::io::Error::other(format!(
                "pdfinfo reported no page count for {}",
                pdf_path.display()
            )))
        })
    }

    fn extract_page(&self, pdf_path: &Path, page_number: u32, dpi: u32) -> Result<String> {
        let render_err = |reason: String| KbError::PageRender {
            page: page_number,
            reason,
        };

        let dir = tempfile::tempdir()?;
        let prefix = dir.path().join("page");
        let page = page_number.to_string();
        let out = run(
            Command::new(&self.pdftoppm)
                .args(["-f", &page, "-l", &page, "-r", &dpi.to_string()])
                .args(["-png", "-singlefile"])
                .arg(pdf_path)
                .arg(&prefix),
            &self.pdftoppm,
        )?;
        if !out.status.success() {
            return Err(render_err(format!(
                "pdftoppm exit {}: {}",
                out.status.code().unwrap_or(-1),
                String::from_utf8_lossy(&out.stderr).trim()
            )));
        }

        let image = prefix.with_extension("png");
        debug!(page = page_number, image = %image.display(), "Rasterized page");

        let out = run(
            Command::new(&self.tesseract)
                .arg(&image)
                .arg("stdout")
                .args(["-l", &self.lang]),
            &self.tesseract,
        )?;
        if !out.status.success() {
            return Err(render_err(format!(
                "tesseract exit {}: {}",
                out.status.code().unwrap_or(-1),
                String::from_utf8_lossy(&out.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&out.stdout).into_owned())
    }
}

/// Run a command to completion, mapping a missing binary to `OcrUnavailable`.
fn run(cmd: &mut Command, bin: &str) -> Result<Output> {
    cmd.output().map_err(|e| match e.kind() {
        ErrorKind::NotFound | ErrorKind::PermissionDenied => KbError::OcrUnavailable {
            binary: bin.to_string(),
        },
        _ => KbError::Io(e),
    })
}

fn parse_page_count(pdfinfo: &str) -> Option<u32> {
    pdfinfo.lines().find_map(|line| {
        line.strip_prefix("Pages:")
            .and_then(|n| n.trim().parse().ok())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_settings;

    #[test]
    fn page_count_from_pdfinfo() {
        let out = "Title:          Riverwalk\nProducer:       scanner\nPages:          84\nEncrypted:      no\n";
        assert_eq!(parse_page_count(out), Some(84));
        assert_eq!(parse_page_count("Title: x\n"), None);
    }

    #[test]
    fn missing_binary_is_unavailable() {
        let mut settings = test_settings(Path::new("."));
        settings.tesseract_bin = "/nonexistent/tesseract".into();
        let engine = PopplerTesseract::from_settings(&settings);
        let err = run(Command::new(&engine.tesseract).arg("-v"), &engine.tesseract).unwrap_err();
        assert!(matches!(err, KbError::OcrUnavailable { ref binary } if binary == "/nonexistent/tesseract"));
    }
}
