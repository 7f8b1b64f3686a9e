//! JSON-document-backed section store
//!
//! Persists the report as a small JSON file: a title, a creation timestamp,
//! and one `{name, text}` entry per catalogue section. The file is created
//! with every section empty when absent and rewritten on each commit, so an
//! external viewer always sees the last committed state.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::store::{SectionStore, StoreError};
use crate::text::normalize;

const DOCUMENT_TITLE: &str = "First Trimester Ultrasound Report";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SectionEntry {
    name: String,
    text: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Document {
    title: String,
    created_unix: u64,
    sections: Vec<SectionEntry>,
}

impl Document {
    fn empty(catalogue: &[String]) -> Self {
        Self {
            title: DOCUMENT_TITLE.to_string(),
            created_unix: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
            sections: catalogue
                .iter()
                .map(|name| SectionEntry {
                    name: name.clone(),
                    text: String::new(),
                })
                .collect(),
        }
    }
}

/// Section store persisted as a JSON report document.
pub struct JsonDocumentStore {
    path: PathBuf,
    catalogue: Vec<String>,
    document: Document,
}

impl JsonDocumentStore {
    /// Open the document at `path`, creating it with every catalogue
    /// section empty if it does not exist.
    ///
    /// An existing document is reconciled against the catalogue: stored
    /// text is kept for sections still present, missing sections are added
    /// empty, and the catalogue order is restored.
    pub fn open(path: &Path, catalogue: &[String]) -> Result<Self, StoreError> {
        let document = if path.exists() {
            info!(?path, "existing report document found");
            let raw = std::fs::read_to_string(path)?;
            let on_disk: Document = serde_json::from_str(&raw)?;
            Self::reconcile(on_disk, catalogue)
        } else {
            info!(?path, "creating new report document");
            Document::empty(catalogue)
        };

        let mut store = Self {
            path: path.to_owned(),
            catalogue: catalogue.to_vec(),
            document,
        };
        store.persist()?;
        Ok(store)
    }

    fn reconcile(on_disk: Document, catalogue: &[String]) -> Document {
        let sections = catalogue
            .iter()
            .map(|name| {
                let wanted = normalize(name);
                let text = on_disk
                    .sections
                    .iter()
                    .find(|entry| normalize(&entry.name) == wanted)
                    .map(|entry| entry.text.clone())
                    .unwrap_or_default();
                SectionEntry {
                    name: name.clone(),
                    text,
                }
            })
            .collect();
        Document {
            title: on_disk.title,
            created_unix: on_disk.created_unix,
            sections,
        }
    }

    fn persist(&mut self) -> Result<(), StoreError> {
        let raw = serde_json::to_string_pretty(&self.document)?;
        std::fs::write(&self.path, raw)?;
        Ok(())
    }

    fn position(&self, name: &str) -> Option<usize> {
        let wanted = normalize(name);
        self.document
            .sections
            .iter()
            .position(|entry| normalize(&entry.name) == wanted)
    }
}

impl SectionStore for JsonDocumentStore {
    fn get(&self, name: &str) -> Result<String, StoreError> {
        self.position(name)
            .map(|i| self.document.sections[i].text.clone())
            .ok_or_else(|| StoreError::SectionNotFound {
                name: name.to_string(),
            })
    }

    fn set(&mut self, name: &str, text: &str) -> Result<(), StoreError> {
        let i = self
            .position(name)
            .ok_or_else(|| StoreError::SectionNotFound {
                name: name.to_string(),
            })?;
        self.document.sections[i].text = text.to_string();
        self.persist()
    }

    fn reset(&mut self) -> Result<(), StoreError> {
        // Keep the previous report around before starting over.
        if self.path.exists() {
            let backup = self.path.with_extension("json.bak");
            if let Err(e) = std::fs::rename(&self.path, &backup) {
                warn!(?e, "failed to back up report before reset");
            } else {
                info!(?backup, "previous report backed up");
            }
        }
        self.document = Document::empty(&self.catalogue);
        self.persist()
    }
}
