//! Storage location entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::entity::Entity;
use crate::core::identity::{EntityId, EntityPrefix};

/// A place where part lots are kept (drawer, shelf, reel rack...)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageLocation {
    /// Unique identifier (LOC-...)
    pub id: EntityId,

    /// Location name
    pub name: String,

    /// Detailed description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Nothing more can be put here
    #[serde(default)]
    pub is_full: bool,

    /// Creation timestamp
    pub created: DateTime<Utc>,

    /// Author name
    pub author: String,
}

impl Entity for StorageLocation {
    const PREFIX: EntityPrefix = EntityPrefix::Loc;

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

impl StorageLocation {
    /// Create a new, not full, location
    pub fn new(name: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            id: EntityId::new(EntityPrefix::Loc),
            name: name.into(),
            description: None,
            is_full: false,
            created: Utc::now(),
            author: author.into(),
        }
    }
}
