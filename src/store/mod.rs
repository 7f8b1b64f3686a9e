//! Section content storage
//!
//! Maps each catalogue section name to its current text. The router reads a
//! section's text when it becomes active and replaces it on every content
//! commit. Two implementations: an in-memory store for tests and a
//! JSON-document-backed store for the daemon.

mod document;
mod memory;

pub use document::JsonDocumentStore;
pub use memory::MemoryStore;

use thiserror::Error;

/// Store-level failures.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The named section is not in the catalogue.
    #[error("section not found: {name}")]
    SectionNotFound { name: String },

    /// The backing document could not be read or written.
    #[error("document I/O failed")]
    Io(#[from] std::io::Error),

    /// The backing document could not be parsed or serialized.
    #[error("document encoding failed")]
    Encoding(#[from] serde_json::Error),
}

/// Contract between the router and the section storage.
///
/// `set` must be visible to an immediately following `get` for the same
/// section and must not affect any other section's text.
pub trait SectionStore: Send {
    /// Current text of the named section.
    fn get(&self, name: &str) -> Result<String, StoreError>;

    /// Replace the named section's text.
    fn set(&mut self, name: &str, text: &str) -> Result<(), StoreError>;

    /// Reset every section to empty text (whole-document reset).
    fn reset(&mut self) -> Result<(), StoreError>;
}
