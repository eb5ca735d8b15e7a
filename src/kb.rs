use std::fs;
use std::io::Write;
use std::path::Path;

use tracing::info;

use crate::error::Result;
use crate::model::{ArticleNode, SectionNode};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KbMetadata {
    pub source_file: String,
    pub page_count: usize,
}

/// Flat, document-ordered section records plus where they came from.
#[derive(Debug, Clone)]
pub struct KnowledgeBase {
    pub metadata: KbMetadata,
    pub sections: Vec<SectionNode>,
}

impl KnowledgeBase {
    pub fn build(articles: Vec<ArticleNode>, metadata: KbMetadata) -> Self {
        let sections = articles
            .into_iter()
            .flat_map(|a| a.sections)
            .map(|mut s| {
                s.text = s.text.trim().to_string();
                s
            })
            .collect();
        KnowledgeBase { metadata, sections }
    }

    /// The on-disk form is the bare array of section records.
    pub fn to_json(&self) -> Result<String> {
        let mut json = serde_json::to_string_pretty(&self.sections)?;
        json.push('\n');
        Ok(json)
    }

    /// Overwrite `path` with the JSON array, creating parent directories.
    pub fn write(&self, path: &Path) -> Result<()> {
        write_replacing(path, &self.to_json()?)?;
        info!(
            "Wrote {} sections ({} pages of {}) to {}",
            self.sections.len(),
            self.metadata.page_count,
            self.metadata.source_file,
            path.display()
        );
        Ok(())
    }
}

/// Write to a temp file beside `path`, then rename over it, so readers see
/// either the old file or the complete new one.
pub(crate) fn write_replacing(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    fs::create_dir_all(parent)?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(contents.as_bytes())?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DocType;

    fn section(doc_type: DocType, article: u32, number: &str, text: &str) -> SectionNode {
        SectionNode {
            doc_type,
            article_number: article,
            article_title: "TITLE".into(),
            section_number: number.into(),
            section_title: "Title.".into(),
            page_start: 1,
            page_end: 1,
            text: text.into(),
        }
    }

    fn meta() -> KbMetadata {
        KbMetadata {
            source_file: "data/Riverwalk_CCRs.pdf".into(),
            page_count: 3,
        }
    }

    #[test]
    fn flattens_in_article_order() {
        let articles = vec![
            ArticleNode {
                doc_type: DocType::Declaration,
                number: 1,
                title: "DEFINITIONS".into(),
                page_start: 1,
                sections: vec![section(DocType::Declaration, 1, "1.1", "  a  "), section(DocType::Declaration, 1, "1.2", "b")],
            },
            ArticleNode {
                doc_type: DocType::Declaration,
                number: 2,
                title: "EMPTY".into(),
                page_start: 2,
                sections: vec![],
            },
            ArticleNode {
                doc_type: DocType::Bylaws,
                number: 1,
                title: "NAME".into(),
                page_start: 3,
                sections: vec![section(DocType::Bylaws, 1, "1.1", "c")],
            },
        ];
        let kb = KnowledgeBase::build(articles, meta());
        let numbers: Vec<_> = kb.sections.iter().map(|s| (s.doc_type, s.section_number.as_str())).collect();
        assert_eq!(
            numbers,
            [(DocType::Declaration, "1.1"), (DocType::Declaration, "1.2"), (DocType::Bylaws, "1.1")]
        );
        assert_eq!(kb.sections[0].text, "a");
    }

    #[test]
    fn json_has_exact_fields() {
        let kb = KnowledgeBase {
            metadata: meta(),
            sections: vec![section(DocType::Bylaws, 4, "4.3", "The Board may")],
        };
        let value: serde_json::Value = serde_json::from_str(&kb.to_json().unwrap()).unwrap();
        let obj = value[0].as_object().unwrap();
        let mut keys: Vec<&str> = obj.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            ["article_number", "article_title", "doc_type", "page_end", "page_start", "section_number", "section_title", "text"]
        );
        assert_eq!(obj["doc_type"], "Bylaws");
        assert_eq!(obj["article_number"], 4);
    }

    #[test]
    fn write_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/kb.json");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "stale").unwrap();
        let kb = KnowledgeBase {
            metadata: meta(),
            sections: vec![section(DocType::Declaration, 1, "1.1", "x")],
        };
        kb.write(&path).unwrap();
        let back: Vec<SectionNode> = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back, kb.sections);
    }

    #[test]
    fn write_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kb.json");
        let kb = KnowledgeBase {
            metadata: meta(),
            sections: vec![section(DocType::Declaration, 1, "1.1", "x")],
        };
        kb.write(&path).unwrap();
        kb.write(&path).unwrap();
        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, ["kb.json"]);
    }
}
