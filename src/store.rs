use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{CardreelError, CardreelResult};
use crate::model::DecisionCard;

/// Default backing file, relative to the working directory.
pub const DEFAULT_STORE_FILE: &str = "saved_entries.json";

/// Flat JSON store of saved decision cards keyed by title.
///
/// The file is loaded once and rewritten in full on every save. Saving an entry whose
/// title already exists overwrites it silently; that is the save semantics, not an
/// error. Single-user, synchronous use only; no locking.
#[derive(Clone, Debug, Default)]
pub struct EntryStore {
    path: PathBuf,
    entries: BTreeMap<String, DecisionCard>,
}

impl EntryStore {
    /// Load the store from `path`, or start empty when no file exists.
    pub fn load(path: impl Into<PathBuf>) -> CardreelResult<Self> {
        let path = path.into();
        let entries = match std::fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text).map_err(|e| {
                CardreelError::store(format!(
                    "failed to parse entry store '{}': {e}",
                    path.display()
                ))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                return Err(CardreelError::store(format!(
                    "failed to read entry store '{}': {e}",
                    path.display()
                )));
            }
        };
        Ok(Self { path, entries })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Titles of all saved entries, in key order.
    pub fn titles(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn get(&self, title: &str) -> Option<&DecisionCard> {
        self.entries.get(title)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert (or silently overwrite) an entry under its own title and persist.
    pub fn save_entry(&mut self, card: DecisionCard) -> CardreelResult<()> {
        self.entries.insert(card.title.clone(), card);
        self.persist()
    }

    /// Rewrite the backing file with the current mapping, pretty-printed UTF-8 JSON.
    pub fn persist(&self) -> CardreelResult<()> {
        let json = serde_json::to_string_pretty(&self.entries)
            .map_err(|e| CardreelError::store(format!("failed to serialize entries: {e}")))?;
        std::fs::write(&self.path, json).map_err(|e| {
            CardreelError::store(format!(
                "failed to write entry store '{}': {e}",
                self.path.display()
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Choice;

    fn sample(title: &str) -> DecisionCard {
        DecisionCard {
            category: "Lifestyle".into(),
            title: title.into(),
            description: "desc".into(),
            choices: vec![Choice::from_free_text("Dog", "Loyal", "Needs walks")],
        }
    }

    #[test]
    fn load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = EntryStore::load(dir.path().join("none.json")).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("entries.json");

        let mut store = EntryStore::load(&path).unwrap();
        store.save_entry(sample("What pet should I get?")).unwrap();

        let reloaded = EntryStore::load(&path).unwrap();
        assert_eq!(
            reloaded.get("What pet should I get?"),
            Some(&sample("What pet should I get?"))
        );
    }

    #[test]
    fn duplicate_title_overwrites_silently() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("entries.json");

        let mut store = EntryStore::load(&path).unwrap();
        store.save_entry(sample("t")).unwrap();

        let mut updated = sample("t");
        updated.description = "changed".into();
        store.save_entry(updated.clone()).unwrap();

        let reloaded = EntryStore::load(&path).unwrap();
        assert_eq!(reloaded.get("t"), Some(&updated));
        assert_eq!(reloaded.titles().count(), 1);
    }

    #[test]
    fn persist_after_load_is_a_content_noop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("entries.json");

        let mut store = EntryStore::load(&path).unwrap();
        store.save_entry(sample("a")).unwrap();
        store.save_entry(sample("b")).unwrap();
        let first = std::fs::read_to_string(&path).unwrap();

        EntryStore::load(&path).unwrap().persist().unwrap();
        let second = std::fs::read_to_string(&path).unwrap();

        let v1: serde_json::Value = serde_json::from_str(&first).unwrap();
        let v2: serde_json::Value = serde_json::from_str(&second).unwrap();
        assert_eq!(v1, v2);
    }
}
