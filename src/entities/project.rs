//! Project entity - a buildable bill of materials

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::entity::{Entity, Status};
use crate::core::identity::{EntityId, EntityPrefix};
use crate::entities::bom::{BomContainer, BomEntry};

/// Project entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    /// Unique identifier (PRJ-...)
    pub id: EntityId,

    /// Project name
    pub name: String,

    /// Detailed description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Bill of materials
    #[serde(default)]
    pub bom: Vec<BomEntry>,

    /// Part that finished builds are stocked as
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub builds_part: Option<EntityId>,

    /// Current status
    #[serde(default)]
    pub status: Status,

    /// Creation timestamp
    pub created: DateTime<Utc>,

    /// Author name
    pub author: String,

    /// Revision counter for entity updates
    #[serde(default = "default_revision")]
    pub entity_revision: u32,
}

fn default_revision() -> u32 {
    1
}

impl Entity for Project {
    const PREFIX: EntityPrefix = EntityPrefix::Prj;

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn created(&self) -> DateTime<Utc> {
        self.created
    }

    fn author(&self) -> &str {
        &self.author
    }
}

impl BomContainer for Project {
    fn container_id(&self) -> &EntityId {
        &self.id
    }

    fn container_name(&self) -> &str {
        &self.name
    }

    fn bom(&self) -> &[BomEntry] {
        &self.bom
    }

    fn builds_part(&self) -> Option<&EntityId> {
        self.builds_part.as_ref()
    }

    fn kind_label(&self) -> &'static str {
        "Project"
    }
}

impl Project {
    /// Create a new project with an empty BOM
    pub fn new(name: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            id: EntityId::new(EntityPrefix::Prj),
            name: name.into(),
            description: None,
            bom: Vec::new(),
            builds_part: None,
            status: Status::default(),
            created: Utc::now(),
            author: author.into(),
            entity_revision: 1,
        }
    }

    /// Append a BOM entry and return its ID
    pub fn add_entry(&mut self, entry: BomEntry) -> EntityId {
        let id = entry.id.clone();
        self.bom.push(entry);
        id
    }
}
