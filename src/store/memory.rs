//! In-memory section store

use crate::store::{SectionStore, StoreError};
use crate::text::normalize;

/// Section store backed by an ordered in-memory list.
///
/// Preserves catalogue order; lookup is by normalized name.
pub struct MemoryStore {
    entries: Vec<(String, String)>,
}

impl MemoryStore {
    /// Create a store with one empty entry per catalogue section.
    pub fn new(catalogue: &[String]) -> Self {
        Self {
            entries: catalogue
                .iter()
                .map(|name| (name.clone(), String::new()))
                .collect(),
        }
    }

    fn position(&self, name: &str) -> Option<usize> {
        let wanted = normalize(name);
        self.entries
            .iter()
            .position(|(entry_name, _)| normalize(entry_name) == wanted)
    }
}

impl SectionStore for MemoryStore {
    fn get(&self, name: &str) -> Result<String, StoreError> {
        self.position(name)
            .map(|i| self.entries[i].1.clone())
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
        self.entries[i].1 = text.to_string();
        Ok(())
    }

    fn reset(&mut self) -> Result<(), StoreError> {
        for entry in &mut self.entries {
            entry.1.clear();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalogue() -> Vec<String> {
        vec!["LMP".to_string(), "Gestational Age:".to_string()]
    }

    #[test]
    fn test_initialized_empty() {
        let store = MemoryStore::new(&catalogue());
        assert_eq!(store.get("LMP").unwrap(), "");
        assert_eq!(store.get("Gestational Age:").unwrap(), "");
    }

    #[test]
    fn test_set_visible_to_get() {
        let mut store = MemoryStore::new(&catalogue());
        store.set("Gestational Age:", "thirty two weeks").unwrap();
        assert_eq!(store.get("Gestational Age:").unwrap(), "thirty two weeks");
    }

    #[test]
    fn test_set_replaces_and_isolates() {
        let mut store = MemoryStore::new(&catalogue());
        store.set("LMP", "first of march").unwrap();
        store.set("LMP", "fifth of march").unwrap();
        assert_eq!(store.get("LMP").unwrap(), "fifth of march");
        assert_eq!(store.get("Gestational Age:").unwrap(), "");
    }

    #[test]
    fn test_lookup_is_normalized() {
        let mut store = MemoryStore::new(&catalogue());
        store.set("gestational age", "ok").unwrap();
        assert_eq!(store.get("Gestational Age:").unwrap(), "ok");
    }

    #[test]
    fn test_unknown_section() {
        let store = MemoryStore::new(&catalogue());
        assert!(matches!(
            store.get("Impression:"),
            Err(StoreError::SectionNotFound { .. })
        ));
    }

    #[test]
    fn test_reset_clears_all() {
        let mut store = MemoryStore::new(&catalogue());
        store.set("LMP", "something").unwrap();
        store.reset().unwrap();
        assert_eq!(store.get("LMP").unwrap(), "");
    }
}
