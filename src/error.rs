use std::path::PathBuf;

use thiserror::Error;

use crate::model::DocType;

#[derive(Debug, Error)]
pub enum KbError {
    #[error("OCR toolchain unavailable: `{binary}` not found on PATH")]
    OcrUnavailable { binary: String },

    #[error("page {page} failed to render: {reason}")]
    PageRender { page: u32, reason: String },

    #[error("no ARTICLE headings found in the {doc_type} segment")]
    Segmentation { doc_type: DocType },

    #[error("cache file {} unreadable: {reason}", path.display())]
    CacheRead { path: PathBuf, reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl KbError {
    /// Fatal errors abort the build; the rest are logged and skipped over.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, KbError::PageRender { .. } | KbError::CacheRead { .. })
    }
}

pub type Result<T> = std::result::Result<T, KbError>;
