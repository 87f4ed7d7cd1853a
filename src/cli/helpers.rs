//! Shared helper functions for CLI commands
//!
//! This module contains utility functions that are used across multiple
//! command modules to avoid code duplication.

use clap::ValueEnum;
use console::style;
use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use std::io;
use tabled::{builder::Builder, settings::Style};

use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::identity::{EntityId, EntityPrefix};
use crate::core::shortid::ShortIdIndex;
use crate::core::store::Inventory;
use crate::core::workspace::Workspace;
use crate::core::Config;

/// Everything a command needs to work on a workspace
pub struct Session {
    pub workspace: Workspace,
    pub config: Config,
    pub inventory: Inventory,
    pub short_ids: ShortIdIndex,
}

impl Session {
    /// Discover the workspace and load its inventory
    pub fn open(global: &GlobalOpts) -> Result<Self> {
        let workspace = open_workspace(global)?;
        let config = Config::load_for(Some(&workspace));
        let inventory = Inventory::load(&workspace, config.author())?;
        let short_ids = ShortIdIndex::load(&workspace);
        Ok(Self {
            workspace,
            config,
            inventory,
            short_ids,
        })
    }

    /// Resolve a short ID, full ID, ID fragment or name
    pub fn resolve(&self, prefix: EntityPrefix, reference: &str) -> Result<EntityId> {
        let full = self
            .short_ids
            .resolve(reference)
            .ok_or_else(|| miette::miette!("Unknown short ID '{}'. List the entities first to assign short IDs.", reference))?;
        Ok(self.inventory.resolve(prefix, &full)?)
    }

    /// Resolve a project or assembly reference
    pub fn resolve_container(&self, reference: &str) -> Result<EntityId> {
        let full = self
            .short_ids
            .resolve(reference)
            .ok_or_else(|| miette::miette!("Unknown short ID '{}'", reference))?;
        Ok(self.inventory.resolve_container(&full)?)
    }

    /// Short ID for an entity, assigning one if needed
    pub fn short(&mut self, id: &EntityId) -> String {
        self.short_ids.add(id)
    }

    /// Output format after applying the configured default
    pub fn format(&self, global: &GlobalOpts) -> OutputFormat {
        resolve_format(global.format, &self.config)
    }

    /// Flush the inventory and remember short IDs
    pub fn commit(&mut self) -> Result<usize> {
        let written = self.inventory.flush()?;
        self.save_short_ids();
        Ok(written)
    }

    /// Persist the short ID index; failures only cost convenience
    pub fn save_short_ids(&self) {
        if let Err(e) = self.short_ids.save(&self.workspace) {
            tracing::warn!(error = %e, "could not save short ID index");
        }
    }
}

/// Find the workspace from `--project` or the current directory
pub fn open_workspace(global: &GlobalOpts) -> Result<Workspace> {
    let workspace = match &global.project {
        Some(path) => Workspace::discover_from(path),
        None => Workspace::discover(),
    };
    workspace.map_err(|e| miette::miette!("{}", e))
}

/// Replace `auto` with the configured default format, if any
pub fn resolve_format(requested: OutputFormat, config: &Config) -> OutputFormat {
    if requested != OutputFormat::Auto {
        return requested;
    }
    config
        .default_format
        .as_deref()
        .and_then(|name| OutputFormat::from_str(name, true).ok())
        .unwrap_or(OutputFormat::Auto)
}

/// Print `value` as JSON or YAML; returns false for other formats
pub fn print_structured<T: Serialize + ?Sized>(format: OutputFormat, value: &T) -> Result<bool> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(value).into_diagnostic()?);
            Ok(true)
        }
        OutputFormat::Yaml => {
            print!("{}", serde_yml::to_string(value).into_diagnostic()?);
            Ok(true)
        }
        _ => Ok(false),
    }
}

/// Rows of text output in one of the tabular formats
pub struct Table {
    headers: Vec<&'static str>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: &[&'static str]) -> Self {
        Self {
            headers: headers.to_vec(),
            rows: Vec::new(),
        }
    }

    pub fn row(&mut self, cells: Vec<String>) {
        self.rows.push(cells);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Print for tsv, csv and id; anything else gets a human table
    ///
    /// The id format prints the second column, which by convention holds the
    /// full ID (the first holds the short ID).
    pub fn print(&self, format: OutputFormat) -> Result<()> {
        match format {
            OutputFormat::Tsv => {
                println!("{}", self.headers.join("\t"));
                for row in &self.rows {
                    println!("{}", row.join("\t"));
                }
            }
            OutputFormat::Csv => {
                let mut writer = csv::Writer::from_writer(io::stdout());
                writer.write_record(&self.headers).into_diagnostic()?;
                for row in &self.rows {
                    writer.write_record(row).into_diagnostic()?;
                }
                writer.flush().into_diagnostic()?;
            }
            OutputFormat::Id => {
                for row in &self.rows {
                    if let Some(id) = row.get(1).or_else(|| row.first()) {
                        println!("{}", id);
                    }
                }
            }
            _ => println!("{}", self.render()),
        }
        Ok(())
    }

    /// Human readable rendering
    pub fn render(&self) -> String {
        let mut builder = Builder::default();
        builder.push_record(self.headers.iter().map(|h| style(h).bold().to_string()));
        for row in &self.rows {
            builder.push_record(row.iter().cloned());
        }
        builder.build().with(Style::psql()).to_string()
    }
}

/// Print a "N thing(s) found." summary line
pub fn print_summary(count: usize, noun: &str) {
    println!();
    println!("{} {}(s) found.", style(count).cyan(), noun);
}

/// Green check mark prefix for success messages
pub fn ok_mark() -> console::StyledObject<&'static str> {
    style("✓").green()
}

/// Truncate a string to max_len characters, adding "..." if truncated
pub fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
