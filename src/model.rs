use std::fmt;

use serde::{Deserialize, Serialize};

use crate::normalize::normalize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DocType {
    Declaration,
    Bylaws,
}

impl fmt::Display for DocType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocType::Declaration => f.write_str("Declaration"),
            DocType::Bylaws => f.write_str("Bylaws"),
        }
    }
}

/// One OCR'd PDF page.
#[derive(Debug, Clone)]
pub struct Page {
    pub page_number: u32,
    pub raw_text: String,
    pub normalized_text: String,
}

impl Page {
    pub fn new(page_number: u32, raw_text: String) -> Self {
        let normalized_text = normalize(&raw_text);
        Page {
            page_number,
            raw_text,
            normalized_text,
        }
    }
}

/// A terminal record of the knowledge base. Field order is the JSON order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionNode {
    pub doc_type: DocType,
    pub article_number: u32,
    pub article_title: String,
    pub section_number: String,
    pub section_title: String,
    pub page_start: u32,
    pub page_end: u32,
    pub text: String,
}

/// Sections grouped under one ARTICLE heading; flattened away on output.
#[derive(Debug, Clone)]
pub struct ArticleNode {
    pub doc_type: DocType,
    pub number: u32,
    pub title: String,
    pub page_start: u32,
    pub sections: Vec<SectionNode>,
}
