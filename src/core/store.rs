//! Repository abstraction and the file-backed inventory
//!
//! Build calculations only depend on the [`Catalog`] (read) and
//! [`StockStore`] (stock mutation) traits. [`Inventory`] implements both on
//! top of the entity files of a [`Workspace`], acting as a unit of work:
//! changes stay in memory until [`Inventory::flush`] writes them.
//!
//! Flushing uses optimistic locking. The inventory remembers every lot's
//! `version` and every entity's `entity_revision` as loaded; before writing a
//! changed entity its file is read again and the flush is refused if anyone
//! else changed it in the meantime.

use miette::Diagnostic;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::core::identity::{EntityId, EntityPrefix};
use crate::core::loader;
use crate::core::stock_log::{self, StockLogEntry};
use crate::core::workspace::Workspace;
use crate::entities::{Assembly, BomContainer, Part, PartLot, Project, StorageLocation};
use crate::stock::error::StockError;
use crate::stock::withdraw::{self, ChangeOptions};
use crate::yaml::YamlSyntaxError;

/// Read access to parts, locations and buildable containers
pub trait Catalog {
    /// Look up a part
    fn part(&self, id: &EntityId) -> Option<&Part>;

    /// Look up a storage location
    fn location(&self, id: &EntityId) -> Option<&StorageLocation>;

    /// Look up a project or assembly
    fn container(&self, id: &EntityId) -> Option<&dyn BomContainer>;

    /// Look up a lot together with the part owning it
    fn lot(&self, id: &EntityId) -> Option<(&Part, &PartLot)>;
}

/// Stock mutations addressed by lot ID
pub trait StockStore: Catalog {
    /// Withdraw from a lot
    fn withdraw(&mut self, lot: &EntityId, amount: f64, options: &ChangeOptions) -> Result<StockLogEntry, StockError>;

    /// Add to a lot
    fn add(&mut self, lot: &EntityId, amount: f64, options: &ChangeOptions) -> Result<StockLogEntry, StockError>;

    /// Move stock between two lots of the same part
    fn move_stock(
        &mut self,
        source: &EntityId,
        target: &EntityId,
        amount: f64,
        options: &ChangeOptions,
    ) -> Result<StockLogEntry, StockError>;

    /// Attach a new lot to a part
    fn create_lot(&mut self, part: &EntityId, lot: PartLot) -> Result<EntityId, StockError>;

    /// Check that [`StockStore::withdraw`] would succeed, without changing anything
    fn check_withdraw(&self, lot: &EntityId, amount: f64, options: &ChangeOptions) -> Result<f64, StockError> {
        let (part, _) = self.lot(lot).ok_or_else(|| StockError::LotNotFound(lot.clone()))?;
        withdraw::check_withdraw(part, lot, amount, options)
    }

    /// Check that [`StockStore::add`] would succeed, without changing anything
    fn check_add(&self, lot: &EntityId, amount: f64, options: &ChangeOptions) -> Result<f64, StockError> {
        let (part, found) = self.lot(lot).ok_or_else(|| StockError::LotNotFound(lot.clone()))?;
        let location = found.storage_location.as_ref().and_then(|id| self.location(id));
        withdraw::check_add(part, lot, location, amount, options)
    }
}

/// Errors from loading, resolving and flushing entities
#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("IO error on {path:?}: {source}")]
    #[diagnostic(code(partdb::store::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Yaml(#[from] YamlSyntaxError),

    #[error("failed to serialize {what}: {message}")]
    #[diagnostic(code(partdb::store::serialize))]
    Serialize { what: String, message: String },

    #[error("invalid stock log line {line}: {message}")]
    #[diagnostic(code(partdb::store::log))]
    Log { line: usize, message: String },

    #[error("{id} was changed by someone else since it was loaded")]
    #[diagnostic(
        code(partdb::store::conflict),
        help("Nothing was written for it. Run the command again to work on the current data.")
    )]
    Conflict { id: EntityId },

    #[error("no {prefix} matches '{reference}'")]
    #[diagnostic(code(partdb::store::not_found))]
    NotFound { prefix: EntityPrefix, reference: String },

    #[error("'{reference}' matches several entities: {}", .candidates.join(", "))]
    #[diagnostic(code(partdb::store::ambiguous), help("Use more characters of the ID"))]
    Ambiguous {
        reference: String,
        candidates: Vec<String>,
    },
}

impl StoreError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// In-memory inventory, optionally backed by a workspace on disk
#[derive(Debug, Default)]
pub struct Inventory {
    workspace: Option<Workspace>,
    author: String,
    parts: HashMap<EntityId, Part>,
    locations: HashMap<EntityId, StorageLocation>,
    projects: HashMap<EntityId, Project>,
    assemblies: HashMap<EntityId, Assembly>,
    /// entity_revision of every entity as read from disk
    loaded_revisions: HashMap<EntityId, u32>,
    /// lot versions per part as read from disk
    loaded_lot_versions: HashMap<EntityId, HashMap<EntityId, u32>>,
    dirty: BTreeSet<EntityId>,
    pending_log: Vec<StockLogEntry>,
}

impl Inventory {
    /// Empty inventory that is never written anywhere
    pub fn in_memory(author: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            ..Default::default()
        }
    }

    /// Load every entity file of a workspace
    pub fn load(workspace: &Workspace, author: impl Into<String>) -> Result<Self, StoreError> {
        let mut inventory = Self {
            workspace: Some(workspace.clone()),
            author: author.into(),
            ..Default::default()
        };

        for part in loader::load_all::<Part>(workspace)? {
            inventory.remember(&part.id, part.entity_revision);
            inventory.loaded_lot_versions.insert(part.id.clone(), lot_versions(&part));
            inventory.parts.insert(part.id.clone(), part);
        }
        for location in loader::load_all::<StorageLocation>(workspace)? {
            inventory.locations.insert(location.id.clone(), location);
        }
        for project in loader::load_all::<Project>(workspace)? {
            inventory.remember(&project.id, project.entity_revision);
            inventory.projects.insert(project.id.clone(), project);
        }
        for assembly in loader::load_all::<Assembly>(workspace)? {
            inventory.remember(&assembly.id, assembly.entity_revision);
            inventory.assemblies.insert(assembly.id.clone(), assembly);
        }

        debug!(
            parts = inventory.parts.len(),
            locations = inventory.locations.len(),
            projects = inventory.projects.len(),
            assemblies = inventory.assemblies.len(),
            "loaded inventory"
        );
        Ok(inventory)
    }

    fn remember(&mut self, id: &EntityId, revision: u32) {
        self.loaded_revisions.insert(id.clone(), revision);
    }

    /// Workspace the inventory was loaded from
    pub fn workspace(&self) -> Option<&Workspace> {
        self.workspace.as_ref()
    }

    /// Name stamped on log entries
    pub fn author(&self) -> &str {
        &self.author
    }

    /// All parts (unordered)
    pub fn parts(&self) -> impl Iterator<Item = &Part> {
        self.parts.values()
    }

    /// All storage locations (unordered)
    pub fn locations(&self) -> impl Iterator<Item = &StorageLocation> {
        self.locations.values()
    }

    /// All projects (unordered)
    pub fn projects(&self) -> impl Iterator<Item = &Project> {
        self.projects.values()
    }

    /// All assemblies (unordered)
    pub fn assemblies(&self) -> impl Iterator<Item = &Assembly> {
        self.assemblies.values()
    }

    /// Look up a project
    pub fn project(&self, id: &EntityId) -> Option<&Project> {
        self.projects.get(id)
    }

    /// Look up an assembly
    pub fn assembly(&self, id: &EntityId) -> Option<&Assembly> {
        self.assemblies.get(id)
    }

    /// Mutable part access; the part will be written on flush
    pub fn part_mut(&mut self, id: &EntityId) -> Option<&mut Part> {
        let part = self.parts.get_mut(id)?;
        self.dirty.insert(id.clone());
        Some(part)
    }

    /// Mutable location access; the location will be written on flush
    pub fn location_mut(&mut self, id: &EntityId) -> Option<&mut StorageLocation> {
        let location = self.locations.get_mut(id)?;
        self.dirty.insert(id.clone());
        Some(location)
    }

    /// Mutable project access; the project will be written on flush
    pub fn project_mut(&mut self, id: &EntityId) -> Option<&mut Project> {
        let project = self.projects.get_mut(id)?;
        self.dirty.insert(id.clone());
        Some(project)
    }

    /// Mutable assembly access; the assembly will be written on flush
    pub fn assembly_mut(&mut self, id: &EntityId) -> Option<&mut Assembly> {
        let assembly = self.assemblies.get_mut(id)?;
        self.dirty.insert(id.clone());
        Some(assembly)
    }

    /// Add a new part
    pub fn insert_part(&mut self, part: Part) -> EntityId {
        let id = part.id.clone();
        self.dirty.insert(id.clone());
        self.parts.insert(id.clone(), part);
        id
    }

    /// Add a new storage location
    pub fn insert_location(&mut self, location: StorageLocation) -> EntityId {
        let id = location.id.clone();
        self.dirty.insert(id.clone());
        self.locations.insert(id.clone(), location);
        id
    }

    /// Add a new project
    pub fn insert_project(&mut self, project: Project) -> EntityId {
        let id = project.id.clone();
        self.dirty.insert(id.clone());
        self.projects.insert(id.clone(), project);
        id
    }

    /// Add a new assembly
    pub fn insert_assembly(&mut self, assembly: Assembly) -> EntityId {
        let id = assembly.id.clone();
        self.dirty.insert(id.clone());
        self.assemblies.insert(id.clone(), assembly);
        id
    }

    /// ID of the part owning a lot
    pub fn part_of_lot(&self, lot: &EntityId) -> Option<&EntityId> {
        self.parts
            .values()
            .find(|part| part.lot(lot).is_some())
            .map(|part| &part.id)
    }

    /// Resolve a full ID, a unique ID fragment, or a unique name
    pub fn resolve(&self, prefix: EntityPrefix, reference: &str) -> Result<EntityId, StoreError> {
        let candidates: Vec<(EntityId, String)> = match prefix {
            EntityPrefix::Part => self.parts.values().map(|p| (p.id.clone(), p.name.clone())).collect(),
            EntityPrefix::Loc => self.locations.values().map(|l| (l.id.clone(), l.name.clone())).collect(),
            EntityPrefix::Prj => self.projects.values().map(|p| (p.id.clone(), p.name.clone())).collect(),
            EntityPrefix::Asm => self.assemblies.values().map(|a| (a.id.clone(), a.name.clone())).collect(),
            EntityPrefix::Lot => self
                .parts
                .values()
                .flat_map(|p| p.lots.iter().map(|l| (l.id.clone(), l.description.clone().unwrap_or_default())))
                .collect(),
            EntityPrefix::Bom => Vec::new(),
        };

        if let Ok(id) = EntityId::parse(reference) {
            if candidates.iter().any(|(c, _)| c == &id) {
                return Ok(id);
            }
        }

        // Names win over ID fragments: short names like "R1" occur inside ULIDs
        let by_name: Vec<&EntityId> = candidates
            .iter()
            .filter(|(_, name)| !name.is_empty() && name.eq_ignore_ascii_case(reference))
            .map(|(id, _)| id)
            .collect();
        let matches = if by_name.is_empty() {
            let needle = reference.to_uppercase();
            candidates
                .iter()
                .filter(|(id, _)| id.to_string().contains(&needle))
                .map(|(id, _)| id)
                .collect()
        } else {
            by_name
        };

        match matches.as_slice() {
            [] => Err(StoreError::NotFound {
                prefix,
                reference: reference.to_string(),
            }),
            [id] => Ok((*id).clone()),
            many => Err(StoreError::Ambiguous {
                reference: reference.to_string(),
                candidates: many.iter().map(|id| id.to_string()).collect(),
            }),
        }
    }

    /// Resolve a reference to a project or assembly, whichever matches
    pub fn resolve_container(&self, reference: &str) -> Result<EntityId, StoreError> {
        let upper = reference.to_uppercase();
        if upper.starts_with("ASM") {
            return self.resolve(EntityPrefix::Asm, reference);
        }
        if upper.starts_with("PRJ") {
            return self.resolve(EntityPrefix::Prj, reference);
        }
        match self.resolve(EntityPrefix::Prj, reference) {
            Err(StoreError::NotFound { .. }) => self.resolve(EntityPrefix::Asm, reference),
            other => other,
        }
    }

    /// Stock log entries recorded since the last flush
    pub fn pending_log(&self) -> &[StockLogEntry] {
        &self.pending_log
    }

    /// Whether anything is waiting to be written
    pub fn is_dirty(&self) -> bool {
        !self.dirty.is_empty() || !self.pending_log.is_empty()
    }

    fn record(&mut self, part: &EntityId, mut entry: StockLogEntry) -> StockLogEntry {
        entry.author = self.author.clone();
        self.dirty.insert(part.clone());
        self.pending_log.push(entry.clone());
        entry
    }

    fn owning_part(&self, lot: &EntityId) -> Result<EntityId, StockError> {
        self.part_of_lot(lot)
            .cloned()
            .ok_or_else(|| StockError::LotNotFound(lot.clone()))
    }

    /// Write all changed entities and pending log entries
    ///
    /// Returns the number of entity files written. Nothing is written when a
    /// conflict is detected.
    pub fn flush(&mut self) -> Result<usize, StoreError> {
        let Some(workspace) = self.workspace.clone() else {
            self.dirty.clear();
            self.pending_log.clear();
            return Ok(0);
        };

        for id in &self.dirty {
            self.check_unchanged_on_disk(&workspace, id)?;
        }

        let dirty: Vec<EntityId> = std::mem::take(&mut self.dirty).into_iter().collect();
        for id in &dirty {
            self.write_entity(&workspace, id)?;
        }

        let mut log = std::mem::take(&mut self.pending_log);
        for entry in &mut log {
            if entry.author.is_empty() {
                entry.author = self.author.clone();
            }
        }
        stock_log::append(&workspace.stock_log_path(), &log)?;

        info!(entities = dirty.len(), stock_changes = log.len(), "flushed inventory");
        Ok(dirty.len())
    }

    fn check_unchanged_on_disk(&self, workspace: &Workspace, id: &EntityId) -> Result<(), StoreError> {
        let path = workspace.entity_path(id);
        let known = self.loaded_revisions.get(id);
        if !path.exists() {
            // only a conflict if the file existed when we loaded it
            return match known {
                Some(_) => Err(StoreError::Conflict { id: id.clone() }),
                None => Ok(()),
            };
        }

        let conflict = match id.prefix() {
            EntityPrefix::Part => {
                let on_disk: Part = loader::load_file(&path)?;
                Some(&on_disk.entity_revision) != known
                    || self.loaded_lot_versions.get(id) != Some(&lot_versions(&on_disk))
            }
            EntityPrefix::Prj => {
                let on_disk: Project = loader::load_file(&path)?;
                Some(&on_disk.entity_revision) != known
            }
            EntityPrefix::Asm => {
                let on_disk: Assembly = loader::load_file(&path)?;
                Some(&on_disk.entity_revision) != known
            }
            _ => false,
        };

        if conflict {
            Err(StoreError::Conflict { id: id.clone() })
        } else {
            Ok(())
        }
    }

    fn write_entity(&mut self, workspace: &Workspace, id: &EntityId) -> Result<(), StoreError> {
        match id.prefix() {
            EntityPrefix::Part => {
                if let Some(part) = self.parts.get_mut(id) {
                    if self.loaded_revisions.contains_key(id) {
                        part.entity_revision += 1;
                    }
                    loader::save(workspace, part)?;
                    self.loaded_revisions.insert(id.clone(), part.entity_revision);
                    self.loaded_lot_versions.insert(id.clone(), lot_versions(part));
                }
            }
            EntityPrefix::Prj => {
                if let Some(project) = self.projects.get_mut(id) {
                    if self.loaded_revisions.contains_key(id) {
                        project.entity_revision += 1;
                    }
                    loader::save(workspace, project)?;
                    self.loaded_revisions.insert(id.clone(), project.entity_revision);
                }
            }
            EntityPrefix::Asm => {
                if let Some(assembly) = self.assemblies.get_mut(id) {
                    if self.loaded_revisions.contains_key(id) {
                        assembly.entity_revision += 1;
                    }
                    loader::save(workspace, assembly)?;
                    self.loaded_revisions.insert(id.clone(), assembly.entity_revision);
                }
            }
            EntityPrefix::Loc => {
                if let Some(location) = self.locations.get(id) {
                    loader::save(workspace, location)?;
                }
            }
            EntityPrefix::Lot | EntityPrefix::Bom => {}
        }
        debug!(id = %id, "wrote entity");
        Ok(())
    }
}

fn lot_versions(part: &Part) -> HashMap<EntityId, u32> {
    part.lots.iter().map(|lot| (lot.id.clone(), lot.version)).collect()
}

impl Catalog for Inventory {
    fn part(&self, id: &EntityId) -> Option<&Part> {
        self.parts.get(id)
    }

    fn location(&self, id: &EntityId) -> Option<&StorageLocation> {
        self.locations.get(id)
    }

    fn container(&self, id: &EntityId) -> Option<&dyn BomContainer> {
        match id.prefix() {
            EntityPrefix::Prj => self.projects.get(id).map(|p| p as &dyn BomContainer),
            EntityPrefix::Asm => self.assemblies.get(id).map(|a| a as &dyn BomContainer),
            _ => None,
        }
    }

    fn lot(&self, id: &EntityId) -> Option<(&Part, &PartLot)> {
        self.parts
            .values()
            .find_map(|part| part.lot(id).map(|lot| (part, lot)))
    }
}

impl StockStore for Inventory {
    fn withdraw(&mut self, lot: &EntityId, amount: f64, options: &ChangeOptions) -> Result<StockLogEntry, StockError> {
        let part_id = self.owning_part(lot)?;
        let part = self
            .parts
            .get_mut(&part_id)
            .ok_or_else(|| StockError::PartNotFound(part_id.clone()))?;
        let entry = withdraw::withdraw(part, lot, amount, options)?;
        Ok(self.record(&part_id, entry))
    }

    fn add(&mut self, lot: &EntityId, amount: f64, options: &ChangeOptions) -> Result<StockLogEntry, StockError> {
        let part_id = self.owning_part(lot)?;
        let location_id = self
            .parts
            .get(&part_id)
            .and_then(|p| p.lot(lot))
            .and_then(|l| l.storage_location.clone());
        let location = location_id.as_ref().and_then(|id| self.locations.get(id));
        let part = self
            .parts
            .get_mut(&part_id)
            .ok_or_else(|| StockError::PartNotFound(part_id.clone()))?;
        let entry = withdraw::add(part, lot, location, amount, options)?;
        Ok(self.record(&part_id, entry))
    }

    fn move_stock(
        &mut self,
        source: &EntityId,
        target: &EntityId,
        amount: f64,
        options: &ChangeOptions,
    ) -> Result<StockLogEntry, StockError> {
        let part_id = self.owning_part(source)?;
        let target_part = self.owning_part(target)?;
        if part_id != target_part {
            return Err(StockError::DifferentParts {
                source_lot: source.clone(),
                target_lot: target.clone(),
            });
        }

        let location_id = self
            .parts
            .get(&part_id)
            .and_then(|p| p.lot(target))
            .and_then(|l| l.storage_location.clone());
        let location = location_id.as_ref().and_then(|id| self.locations.get(id));
        let part = self
            .parts
            .get_mut(&part_id)
            .ok_or_else(|| StockError::PartNotFound(part_id.clone()))?;
        let entry = withdraw::move_amount(part, source, target, location, amount, options)?;
        Ok(self.record(&part_id, entry))
    }

    fn create_lot(&mut self, part: &EntityId, lot: PartLot) -> Result<EntityId, StockError> {
        let owner = self
            .parts
            .get_mut(part)
            .ok_or_else(|| StockError::PartNotFound(part.clone()))?;
        let id = owner.add_lot(lot);
        self.dirty.insert(part.clone());
        Ok(id)
    }
}
