use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{info, warn};

use crate::error::{KbError, Result};
use crate::kb::write_replacing;

/// On-disk layouts accepted when loading. Writes always use `Pages`.
#[derive(Deserialize)]
#[serde(untagged)]
enum CacheFile {
    /// `{"1": "...", "2": "..."}`
    Pages(BTreeMap<String, String>),
    /// Legacy `["page 1 text", "page 2 text"]`.
    List(Vec<String>),
}

/// Page number → raw OCR text, persisted as one JSON file and rewritten
/// after every stored page.
#[derive(Debug)]
pub struct PageCache {
    path: PathBuf,
    pages: BTreeMap<u32, String>,
}

impl PageCache {
    /// Load the cache file. A missing file is an empty cache; an unreadable
    /// one is logged and also treated as empty.
    pub fn open(path: &Path) -> Self {
        let pages = match read_pages(path) {
            Ok(Some(pages)) => {
                info!(path = %path.display(), pages = pages.len(), "Loaded OCR cache");
                pages
            }
            Ok(None) => BTreeMap::new(),
            Err(e) => {
                warn!("{}; falling back to full OCR", e);
                BTreeMap::new()
            }
        };
        PageCache {
            path: path.to_path_buf(),
            pages,
        }
    }

    pub fn load(&self, page_number: u32) -> Option<&str> {
        self.pages.get(&page_number).map(String::as_str)
    }

    /// Record a page and flush the whole map to disk before returning.
    pub fn store(&mut self, page_number: u32, raw_text: String) -> Result<()> {
        self.pages.insert(page_number, raw_text);
        self.flush()
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn max_page(&self) -> Option<u32> {
        self.pages.keys().next_back().copied()
    }

    fn flush(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.pages)?;
        write_replacing(&self.path, &json)
    }
}

fn read_pages(path: &Path) -> Result<Option<BTreeMap<u32, String>>> {
    if !path.exists() {
        return Ok(None);
    }
    let cache_err = |reason: String| KbError::CacheRead {
        path: path.to_path_buf(),
        reason,
    };
    let raw = fs::read_to_string(path).map_err(|e| cache_err(e.to_string()))?;
    let file: CacheFile = serde_json::from_str(&raw).map_err(|e| cache_err(e.to_string()))?;
    let pages = match file {
        CacheFile::Pages(pages) => {
            let mut out = BTreeMap::new();
            for (key, text) in pages {
                let page: u32 = key
                    .trim()
                    .parse()
                    .map_err(|_| cache_err(format!("bad page key {:?}", key)))?;
                if page == 0 {
                    return Err(cache_err("page numbers are 1-based".into()));
                }
                out.insert(page, text);
            }
            out
        }
        CacheFile::List(list) => (1u32..).zip(list).collect(),
    };
    Ok(Some(pages))
}
