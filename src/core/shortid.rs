//! Short ID system for easier entity selection
//!
//! Provides per-type numeric aliases like `PART@1` or `LOT@3` that map to full
//! entity IDs. Aliases are (re)assigned whenever entities are listed and kept in
//! `.partdb/shortids.json` so the next command can refer to them.

use std::collections::HashMap;
use std::fs;

use crate::core::identity::{EntityId, EntityPrefix};
use crate::core::workspace::Workspace;

/// Index file name within the .partdb directory
const INDEX_FILE: &str = "shortids.json";

/// A mapping of short IDs (PREFIX@N) to full entity IDs
#[derive(Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct ShortIdIndex {
    /// Maps "PREFIX@N" to full entity ID string
    entries: HashMap<String, String>,
    /// Maps full entity ID to its short form (reverse lookup)
    #[serde(skip)]
    reverse: HashMap<String, String>,
    /// Next available number per prefix
    next: HashMap<String, u32>,
}

impl ShortIdIndex {
    /// Create a new empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the index from a workspace, or create empty if not found
    pub fn load(workspace: &Workspace) -> Self {
        let path = workspace.partdb_dir().join(INDEX_FILE);
        if let Ok(content) = fs::read_to_string(&path) {
            if let Ok(mut index) = serde_json::from_str::<ShortIdIndex>(&content) {
                index.reverse = index
                    .entries
                    .iter()
                    .map(|(k, v)| (v.clone(), k.clone()))
                    .collect();
                return index;
            }
        }
        Self::new()
    }

    /// Save the index to a workspace
    pub fn save(&self, workspace: &Workspace) -> std::io::Result<()> {
        let path = workspace.partdb_dir().join(INDEX_FILE);
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)
    }

    /// Add an entity ID and return its short ID
    pub fn add(&mut self, id: &EntityId) -> String {
        let full = id.to_string();
        if let Some(short) = self.reverse.get(&full) {
            return short.clone();
        }

        let prefix = id.prefix().as_str().to_string();
        let counter = self.next.entry(prefix.clone()).or_insert(1);
        let short = format!("{}@{}", prefix, counter);
        *counter += 1;

        self.entries.insert(short.clone(), full.clone());
        self.reverse.insert(full, short.clone());
        short
    }

    /// Make sure every given ID has a short alias
    pub fn ensure_all<'a>(&mut self, ids: impl IntoIterator<Item = &'a EntityId>) {
        for id in ids {
            self.add(id);
        }
    }

    /// Resolve a reference to a full entity ID string
    ///
    /// Accepts `PREFIX@N` (case-insensitive) or a full/partial entity ID, which
    /// is passed through unchanged for later matching.
    pub fn resolve(&self, reference: &str) -> Option<String> {
        match reference.split_once('@') {
            Some((prefix, number)) => {
                let prefix: EntityPrefix = prefix.parse().ok()?;
                let number: u32 = number.parse().ok()?;
                self.entries
                    .get(&format!("{}@{}", prefix.as_str(), number))
                    .cloned()
            }
            None => Some(reference.to_string()),
        }
    }

    /// Short ID if known, otherwise the full ID
    pub fn display(&self, id: &EntityId) -> String {
        let full = id.to_string();
        self.reverse.get(&full).cloned().unwrap_or(full)
    }

    /// Number of entries in the index
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the index is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_id_add_and_resolve() {
        let mut index = ShortIdIndex::new();
        let part = EntityId::new(EntityPrefix::Part);
        let lot_a = EntityId::new(EntityPrefix::Lot);
        let lot_b = EntityId::new(EntityPrefix::Lot);

        assert_eq!(index.add(&part), "PART@1");
        assert_eq!(index.add(&lot_a), "LOT@1");
        assert_eq!(index.add(&lot_b), "LOT@2");

        assert_eq!(index.resolve("LOT@2"), Some(lot_b.to_string()));
        assert_eq!(index.resolve("part@1"), Some(part.to_string()));
        assert_eq!(index.resolve("LOT@99"), None);
        assert_eq!(index.resolve("BOGUS@1"), None);
    }

    #[test]
    fn test_short_id_passthrough() {
        let index = ShortIdIndex::new();
        assert_eq!(index.resolve("PART-01ABC"), Some("PART-01ABC".to_string()));
    }

    #[test]
    fn test_short_id_no_duplicates() {
        let mut index = ShortIdIndex::new();
        let id = EntityId::new(EntityPrefix::Prj);

        let first = index.add(&id);
        let second = index.add(&id);

        assert_eq!(first, second);
        assert_eq!(index.len(), 1);
        assert_eq!(index.display(&id), first);
    }

    #[test]
    fn test_save_and_load() {
        let tmp = tempfile::tempdir().unwrap();
        let workspace = Workspace::init(tmp.path()).unwrap();
        let id = EntityId::new(EntityPrefix::Loc);

        let mut index = ShortIdIndex::new();
        index.ensure_all([&id]);
        index.save(&workspace).unwrap();

        let loaded = ShortIdIndex::load(&workspace);
        assert_eq!(loaded.resolve("LOC@1"), Some(id.to_string()));
        assert_eq!(loaded.display(&id), "LOC@1");
    }
}
