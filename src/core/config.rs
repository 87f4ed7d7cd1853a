//! Configuration management with layered hierarchy

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::core::Workspace;

/// partdb configuration with layered hierarchy
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Name recorded on stock log entries
    pub author: Option<String>,

    /// Default output format
    pub default_format: Option<String>,

    /// Delete a lot once a withdrawal brings it to zero
    pub delete_empty_lots: Option<bool>,

    /// Default tracing filter (overridden by PARTDB_LOG)
    pub log_level: Option<String>,
}

impl Config {
    /// Load configuration from all sources, merging in priority order
    pub fn load() -> Self {
        let workspace = Workspace::discover().ok();
        Self::load_for(workspace.as_ref())
    }

    /// Load configuration for a known workspace (or none)
    pub fn load_for(workspace: Option<&Workspace>) -> Self {
        let mut config = Config::default();

        // 1. Global user config (~/.config/partdb/config.yaml)
        if let Some(global_path) = Self::global_config_path() {
            if let Some(global) = Self::read_file(&global_path) {
                config.merge(global);
            }
        }

        // 2. Workspace config (.partdb/config.yaml)
        if let Some(workspace) = workspace {
            if let Some(workspace_config) = Self::read_file(&workspace.partdb_dir().join("config.yaml")) {
                config.merge(workspace_config);
            }
        }

        // 3. Environment variables
        if let Ok(author) = std::env::var("PARTDB_AUTHOR") {
            config.author = Some(author);
        }
        if let Ok(format) = std::env::var("PARTDB_FORMAT") {
            config.default_format = Some(format);
        }

        config
    }

    fn read_file(path: &Path) -> Option<Config> {
        if !path.exists() {
            return None;
        }
        let contents = std::fs::read_to_string(path).ok()?;
        match serde_yml::from_str::<Config>(&contents) {
            Ok(config) => Some(config),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable config file");
                None
            }
        }
    }

    /// Get the path to the global config file
    fn global_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "partdb")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    /// Merge another config into this one (other takes precedence)
    fn merge(&mut self, other: Config) {
        if other.author.is_some() {
            self.author = other.author;
        }
        if other.default_format.is_some() {
            self.default_format = other.default_format;
        }
        if other.delete_empty_lots.is_some() {
            self.delete_empty_lots = other.delete_empty_lots;
        }
        if other.log_level.is_some() {
            self.log_level = other.log_level;
        }
    }

    /// Get the author name, falling back to git config or username
    pub fn author(&self) -> String {
        if let Some(ref author) = self.author {
            return author.clone();
        }

        if let Ok(output) = std::process::Command::new("git")
            .args(["config", "user.name"])
            .output()
        {
            if output.status.success() {
                let name = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if !name.is_empty() {
                    return name;
                }
            }
        }

        std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .unwrap_or_else(|_| "unknown".to_string())
    }

    /// Whether emptied lots are removed by default
    pub fn delete_empty_lots(&self) -> bool {
        self.delete_empty_lots.unwrap_or(false)
    }

    /// Tracing filter directive from config, if any
    pub fn log_level(&self) -> Option<&str> {
        self.log_level.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_prefers_other() {
        let mut base = Config {
            author: Some("alice".to_string()),
            default_format: Some("tsv".to_string()),
            delete_empty_lots: None,
            log_level: None,
        };
        base.merge(Config {
            author: None,
            default_format: Some("json".to_string()),
            delete_empty_lots: Some(true),
            log_level: Some("debug".to_string()),
        });

        assert_eq!(base.author.as_deref(), Some("alice"));
        assert_eq!(base.default_format.as_deref(), Some("json"));
        assert!(base.delete_empty_lots());
        assert_eq!(base.log_level(), Some("debug"));
    }

    #[test]
    fn test_workspace_config_file_is_read() {
        let tmp = tempfile::tempdir().unwrap();
        let workspace = Workspace::init(tmp.path()).unwrap();
        std::fs::write(
            workspace.partdb_dir().join("config.yaml"),
            "delete_empty_lots: true\nlog_level: info\n",
        )
        .unwrap();

        let config = Config::load_for(Some(&workspace));
        assert!(config.delete_empty_lots());
        assert_eq!(config.log_level(), Some("info"));
    }
}
