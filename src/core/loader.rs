//! Entity file loading and saving
//!
//! Entity files are YAML documents named `<ID>.partdb.yaml`. Loading is strict:
//! a file that does not parse is reported with its source location instead of
//! being skipped, because silently dropping a part would make its stock
//! invisible to build calculations.

use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;

use crate::core::entity::Entity;
use crate::core::store::StoreError;
use crate::core::workspace::Workspace;
use crate::yaml::YamlSyntaxError;

/// Parse one entity file
pub fn load_file<T: DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
    let content = fs::read_to_string(path).map_err(|e| StoreError::io(path, e))?;
    serde_yml::from_str::<T>(&content).map_err(|e| {
        let filename = path
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        StoreError::Yaml(YamlSyntaxError::from_serde_error(&e, &content, &filename))
    })
}

/// Load all entities of type T from the workspace
pub fn load_all<T: Entity>(workspace: &Workspace) -> Result<Vec<T>, StoreError> {
    let mut entities = Vec::new();
    for path in workspace.iter_entity_files(T::PREFIX) {
        entities.push(load_file::<T>(&path)?);
    }
    Ok(entities)
}

/// Write an entity to its file, creating the directory if needed
pub fn save<T: Entity>(workspace: &Workspace, entity: &T) -> Result<(), StoreError> {
    let path = workspace.entity_path(entity.id());
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).map_err(|e| StoreError::io(dir, e))?;
    }
    let yaml = serde_yml::to_string(entity).map_err(|e| StoreError::Serialize {
        what: entity.id().to_string(),
        message: e.to_string(),
    })?;
    fs::write(&path, yaml).map_err(|e| StoreError::io(&path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{Part, StorageLocation};
    use tempfile::tempdir;

    #[test]
    fn test_load_all_empty_workspace() {
        let tmp = tempdir().unwrap();
        let workspace = Workspace::init(tmp.path()).unwrap();
        let parts: Vec<Part> = load_all(&workspace).unwrap();
        assert!(parts.is_empty());
    }

    #[test]
    fn test_save_then_load() {
        let tmp = tempdir().unwrap();
        let workspace = Workspace::init(tmp.path()).unwrap();

        let loc = StorageLocation::new("Drawer 1", "tester");
        save(&workspace, &loc).unwrap();

        let loaded: Vec<StorageLocation> = load_all(&workspace).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, loc.id);
        assert_eq!(loaded[0].name, "Drawer 1");
    }

    #[test]
    fn test_broken_file_is_reported() {
        let tmp = tempdir().unwrap();
        let workspace = Workspace::init(tmp.path()).unwrap();
        fs::write(
            tmp.path().join("parts/PART-01HC2JB7SMQX7RS1Y0GFKBHPTD.partdb.yaml"),
            "id: [broken\n",
        )
        .unwrap();

        let err = load_all::<Part>(&workspace).unwrap_err();
        assert!(matches!(err, StoreError::Yaml(_)));
    }
}
