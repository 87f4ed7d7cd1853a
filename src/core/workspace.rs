//! Workspace discovery and structure

use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::identity::{EntityId, EntityPrefix};

/// Name of the marker/configuration directory at the workspace root
pub const PARTDB_DIR: &str = ".partdb";

/// File extension used by every entity file
pub const ENTITY_SUFFIX: &str = ".partdb.yaml";

/// Represents a partdb workspace (an inventory rooted at a directory)
#[derive(Debug, Clone)]
pub struct Workspace {
    /// Root directory of the workspace (parent of .partdb/)
    root: PathBuf,
}

impl Workspace {
    /// Find workspace root by walking up from the current directory
    pub fn discover() -> Result<Self, WorkspaceError> {
        let current = std::env::current_dir().map_err(|e| WorkspaceError::IoError(e.to_string()))?;
        Self::discover_from(&current)
    }

    /// Find workspace root by walking up from the given directory
    pub fn discover_from(start: &Path) -> Result<Self, WorkspaceError> {
        let mut current = start
            .canonicalize()
            .map_err(|e| WorkspaceError::IoError(e.to_string()))?;

        loop {
            if current.join(PARTDB_DIR).is_dir() {
                return Ok(Self { root: current });
            }

            if !current.pop() {
                return Err(WorkspaceError::NotFound {
                    searched_from: start.to_path_buf(),
                });
            }
        }
    }

    /// Create a new workspace structure at the given path
    pub fn init(path: &Path) -> Result<Self, WorkspaceError> {
        let root = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());

        if root.join(PARTDB_DIR).exists() {
            return Err(WorkspaceError::AlreadyExists(root.clone()));
        }

        Self::write_structure(root)
    }

    /// Force initialization even if .partdb/ exists
    pub fn init_force(path: &Path) -> Result<Self, WorkspaceError> {
        let root = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        Self::write_structure(root)
    }

    fn write_structure(root: PathBuf) -> Result<Self, WorkspaceError> {
        let partdb_dir = root.join(PARTDB_DIR);
        std::fs::create_dir_all(&partdb_dir).map_err(|e| WorkspaceError::IoError(e.to_string()))?;

        std::fs::write(partdb_dir.join("config.yaml"), Self::default_config())
            .map_err(|e| WorkspaceError::IoError(e.to_string()))?;

        for prefix in Self::stored_prefixes() {
            std::fs::create_dir_all(root.join(Self::entity_directory(*prefix)))
                .map_err(|e| WorkspaceError::IoError(e.to_string()))?;
        }

        Ok(Self { root })
    }

    fn default_config() -> &'static str {
        r#"# partdb workspace configuration

# Name recorded on stock changes (default: git user.name, then $USER)
# author: ""

# Default output format (auto, yaml, tsv, json, csv, id)
# default_format: auto

# Remove a lot once a withdrawal empties it
# delete_empty_lots: false

# Log filter used when PARTDB_LOG is not set (error, warn, info, debug, trace)
# log_level: warn
"#
    }

    /// Entity kinds that are stored in their own files
    pub fn stored_prefixes() -> &'static [EntityPrefix] {
        &[
            EntityPrefix::Part,
            EntityPrefix::Loc,
            EntityPrefix::Prj,
            EntityPrefix::Asm,
        ]
    }

    /// Get the workspace root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the .partdb configuration directory
    pub fn partdb_dir(&self) -> PathBuf {
        self.root.join(PARTDB_DIR)
    }

    /// Path of the append-only stock change log
    pub fn stock_log_path(&self) -> PathBuf {
        self.partdb_dir().join("stock.log")
    }

    /// Get the path for an entity file
    pub fn entity_path(&self, id: &EntityId) -> PathBuf {
        self.root
            .join(Self::entity_directory(id.prefix()))
            .join(format!("{}{}", id, ENTITY_SUFFIX))
    }

    /// Get the directory for a given entity prefix
    ///
    /// Lots and BOM entries are embedded in their owning part/container file.
    pub fn entity_directory(prefix: EntityPrefix) -> &'static str {
        match prefix {
            EntityPrefix::Part | EntityPrefix::Lot => "parts",
            EntityPrefix::Loc => "locations",
            EntityPrefix::Prj | EntityPrefix::Bom => "projects",
            EntityPrefix::Asm => "assemblies",
        }
    }

    /// Iterate all entity files of a given prefix type
    pub fn iter_entity_files(&self, prefix: EntityPrefix) -> impl Iterator<Item = PathBuf> {
        let dir = self.root.join(Self::entity_directory(prefix));
        walkdir::WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| e.path().to_string_lossy().ends_with(ENTITY_SUFFIX))
            .map(|e| e.path().to_path_buf())
    }
}

/// Errors that can occur during workspace operations
#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("not a partdb workspace (searched from {searched_from:?}). Run 'partdb init' to create one.")]
    NotFound { searched_from: PathBuf },

    #[error("partdb workspace already exists at {0:?}")]
    AlreadyExists(PathBuf),

    #[error("IO error: {0}")]
    IoError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_workspace_init_creates_structure() {
        let tmp = tempdir().unwrap();
        let workspace = Workspace::init(tmp.path()).unwrap();

        assert!(workspace.partdb_dir().exists());
        assert!(workspace.partdb_dir().join("config.yaml").exists());
        assert!(workspace.root().join("parts").is_dir());
        assert!(workspace.root().join("locations").is_dir());
        assert!(workspace.root().join("projects").is_dir());
        assert!(workspace.root().join("assemblies").is_dir());
    }

    #[test]
    fn test_workspace_init_fails_if_exists() {
        let tmp = tempdir().unwrap();
        Workspace::init(tmp.path()).unwrap();

        let err = Workspace::init(tmp.path()).unwrap_err();
        assert!(matches!(err, WorkspaceError::AlreadyExists(_)));
    }

    #[test]
    fn test_workspace_discover_finds_partdb_dir() {
        let tmp = tempdir().unwrap();
        Workspace::init(tmp.path()).unwrap();

        let subdir = tmp.path().join("some/nested/dir");
        std::fs::create_dir_all(&subdir).unwrap();

        let workspace = Workspace::discover_from(&subdir).unwrap();
        assert_eq!(
            workspace.root().canonicalize().unwrap(),
            tmp.path().canonicalize().unwrap()
        );
    }

    #[test]
    fn test_workspace_discover_fails_without_partdb_dir() {
        let tmp = tempdir().unwrap();
        let err = Workspace::discover_from(tmp.path()).unwrap_err();
        assert!(matches!(err, WorkspaceError::NotFound { .. }));
    }

    #[test]
    fn test_entity_path_uses_prefix_directory() {
        let tmp = tempdir().unwrap();
        let workspace = Workspace::init(tmp.path()).unwrap();
        let id = EntityId::new(EntityPrefix::Asm);
        let path = workspace.entity_path(&id);
        assert!(path.starts_with(workspace.root().join("assemblies")));
        assert!(path.to_string_lossy().ends_with(ENTITY_SUFFIX));
    }
}
