//! Assembly entity - Groups of parts and sub-assemblies

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::entity::{Entity, Status};
use crate::core::identity::{EntityId, EntityPrefix};
use crate::entities::bom::{BomContainer, BomEntry};

/// Assembly entity - a reusable build that other builds can consume
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assembly {
    /// Unique identifier (ASM-...)
    pub id: EntityId,

    /// Assembly name
    pub name: String,

    /// Internal part number
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipn: Option<String>,

    /// Assembly revision
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,

    /// Detailed description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Bill of materials (parts and sub-assemblies with quantities)
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

impl Entity for Assembly {
    const PREFIX: EntityPrefix = EntityPrefix::Asm;

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

impl BomContainer for Assembly {
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
        "Assembly"
    }
}

impl Assembly {
    /// Create a new assembly with required fields
    pub fn new(name: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            id: EntityId::new(EntityPrefix::Asm),
            name: name.into(),
            ipn: None,
            revision: None,
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assembly_creation() {
        let asm = Assembly::new("Main Board", "Test Author");
        assert!(asm.id.to_string().starts_with("ASM-"));
        assert_eq!(asm.container_name(), "Main Board");
        assert_eq!(asm.kind_label(), "Assembly");
        assert!(asm.builds_part().is_none());
    }

    #[test]
    fn test_add_entries() {
        let mut asm = Assembly::new("PSU", "Test Author");
        asm.add_entry(BomEntry::for_part(EntityId::new(EntityPrefix::Part), 4.0));
        asm.add_entry(BomEntry::manual("Heatsink", 1.0));
        assert_eq!(asm.bom().len(), 2);
        assert_eq!(asm.bom()[1].kind(), crate::entities::BomEntryKind::Manual);
    }

    #[test]
    fn test_assembly_roundtrip() {
        let mut asm = Assembly::new("Sensor Head", "Test Author");
        asm.ipn = Some("SH-100".to_string());
        asm.add_entry(BomEntry::for_part(EntityId::new(EntityPrefix::Part), 2.0));

        let yaml = serde_yml::to_string(&asm).unwrap();
        let parsed: Assembly = serde_yml::from_str(&yaml).unwrap();

        assert_eq!(parsed.id, asm.id);
        assert_eq!(parsed.ipn.as_deref(), Some("SH-100"));
        assert_eq!(parsed.bom, asm.bom);
    }
}
