//! Project Snapshot Models
//!
//! Snapshots are written by the external ingestion pipeline and only read by
//! the conversation core.

use std::sync::LazyLock;
use std::time::Duration;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// A single project document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub filepath: String,
    #[serde(default)]
    pub version: i64,
    #[serde(default)]
    pub lines: Vec<String>,
}

impl Document {
    pub fn content(&self) -> String {
        self.lines.join("\n")
    }

    pub fn is_tex(&self) -> bool {
        self.filepath.ends_with(".tex")
    }

    pub fn is_bib(&self) -> bool {
        self.filepath.ends_with(".bib")
    }
}

/// A folder of documents and sub-folders.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Folder {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub documents: Vec<Document>,
    #[serde(default)]
    pub folders: Vec<Folder>,
}

impl Folder {
    /// Depth-first walk: a folder's own documents before its sub-folders.
    fn collect<'a>(&'a self, out: &mut Vec<&'a Document>) {
        out.extend(self.documents.iter());
        for folder in &self.folders {
            folder.collect(out);
        }
    }
}

/// Snapshot of a LaTeX project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectSnapshot {
    pub id: String,
    pub owner_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub root_doc_id: String,
    #[serde(default)]
    pub root_folder: Folder,
    /// Project-level instructions for the assistant
    #[serde(default)]
    pub instructions: String,
    pub updated_at: DateTime<Utc>,
}

/// Body of `PUT /projects/{id}`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectUpsert {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub root_doc_id: String,
    #[serde(default)]
    pub root_folder: Folder,
    #[serde(default)]
    pub instructions: String,
}

impl ProjectUpsert {
    pub fn into_snapshot(self, id: impl Into<String>, owner_id: impl Into<String>) -> ProjectSnapshot {
        ProjectSnapshot {
            id: id.into(),
            owner_id: owner_id.into(),
            name: self.name,
            root_doc_id: self.root_doc_id,
            root_folder: self.root_folder,
            instructions: self.instructions,
            updated_at: Utc::now(),
        }
    }
}

impl ProjectSnapshot {
    /// All documents in folder order.
    pub fn documents(&self) -> Vec<&Document> {
        let mut out = Vec::new();
        self.root_folder.collect(&mut out);
        out
    }

    pub fn find_document(&self, filepath: &str) -> Option<&Document> {
        let wanted = filepath.trim_start_matches('/');
        self.documents()
            .into_iter()
            .find(|doc| doc.filepath.trim_start_matches('/') == wanted)
    }

    /// The root document followed by every other `.tex` document, each
    /// preceded by a `% File:` marker line.
    pub fn full_content(&self) -> String {
        let documents = self.documents();
        let root = documents.iter().copied().find(|doc| doc.id == self.root_doc_id);

        let mut ordered: Vec<&Document> = Vec::with_capacity(documents.len());
        if let Some(root) = root {
            ordered.push(root);
        }
        ordered.extend(
            documents
                .iter()
                .copied()
                .filter(|doc| doc.is_tex() && doc.id != self.root_doc_id),
        );

        ordered
            .iter()
            .map(|doc| format!("% File: {}\n{}", doc.filepath, doc.content()))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    pub fn is_out_of_date(&self, now: DateTime<Utc>, stale_after: Duration) -> bool {
        match chrono::Duration::from_std(stale_after) {
            Ok(threshold) => now.signed_duration_since(self.updated_at) > threshold,
            Err(_) => false,
        }
    }

    /// Citation keys of every `.bib` document, in document order.
    pub fn citation_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = Vec::new();
        for doc in self.documents().into_iter().filter(|doc| doc.is_bib()) {
            for key in extract_citation_keys(&doc.content()) {
                if !keys.contains(&key) {
                    keys.push(key);
                }
            }
        }
        keys
    }
}

static BIB_ENTRY: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"@\s*([A-Za-z]+)\s*[{(]\s*([^,\s{}()]+)\s*,").ok());

/// Entry keys of a BibTeX source, skipping `@comment`, `@string` and `@preamble`.
pub fn extract_citation_keys(source: &str) -> Vec<String> {
    let Some(entry) = BIB_ENTRY.as_ref() else {
        return Vec::new();
    };
    entry
        .captures_iter(source)
        .filter(|caps| {
            let entry_type = caps[1].to_ascii_lowercase();
            !matches!(entry_type.as_str(), "comment" | "string" | "preamble")
        })
        .map(|caps| caps[2].to_string())
        .collect()
}
