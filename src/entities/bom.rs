//! Bill of materials entries and the containers that own them

use serde::{Deserialize, Serialize};

use crate::core::identity::{EntityId, EntityPrefix};

/// BOM line item
///
/// References either a part (consumed `quantity` times per build), a
/// sub-project/sub-assembly (`quantity` sub-builds per build), or nothing at
/// all, in which case it is a manually tracked line such as a PCB ordered per
/// build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BomEntry {
    /// Unique identifier (BOM-...)
    pub id: EntityId,

    /// Amount needed per build, always positive
    pub quantity: f64,

    /// Part consumed by this entry (PART-...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part: Option<EntityId>,

    /// Project or assembly built as a sub-build (PRJ-... / ASM-...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subcontainer: Option<EntityId>,

    /// Name of a manual entry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Placement names (e.g., ["R1", "R2"])
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mountnames: Vec<String>,

    /// Free-text comment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// What a BOM entry draws from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BomEntryKind<'a> {
    Part(&'a EntityId),
    Container(&'a EntityId),
    Manual,
}

impl BomEntry {
    fn blank(quantity: f64) -> Self {
        Self {
            id: EntityId::new(EntityPrefix::Bom),
            quantity,
            part: None,
            subcontainer: None,
            name: None,
            mountnames: Vec::new(),
            comment: None,
        }
    }

    /// Entry consuming a part
    pub fn for_part(part: EntityId, quantity: f64) -> Self {
        Self {
            part: Some(part),
            ..Self::blank(quantity)
        }
    }

    /// Entry requiring builds of another project or assembly
    pub fn for_container(container: EntityId, quantity: f64) -> Self {
        Self {
            subcontainer: Some(container),
            ..Self::blank(quantity)
        }
    }

    /// Manually tracked entry without stock
    pub fn manual(name: impl Into<String>, quantity: f64) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::blank(quantity)
        }
    }

    /// Classify the entry; a part reference wins over a container reference
    pub fn kind(&self) -> BomEntryKind<'_> {
        match (&self.part, &self.subcontainer) {
            (Some(part), _) => BomEntryKind::Part(part),
            (None, Some(container)) => BomEntryKind::Container(container),
            (None, None) => BomEntryKind::Manual,
        }
    }

    /// Check the entry's own invariants
    pub fn validate(&self) -> Result<(), String> {
        if !(self.quantity > 0.0) {
            return Err(format!("BOM entry {} must have a positive quantity", self.id));
        }
        if self.part.is_some() && self.subcontainer.is_some() {
            return Err(format!(
                "BOM entry {} references both a part and a sub-build",
                self.id
            ));
        }
        if let Some(sub) = &self.subcontainer {
            if !sub.prefix().is_container() {
                return Err(format!("{} is not a project or assembly", sub));
            }
        }
        Ok(())
    }
}

/// Anything with a bill of materials that can be built
pub trait BomContainer {
    /// Container ID (PRJ-... / ASM-...)
    fn container_id(&self) -> &EntityId;

    /// Display name
    fn container_name(&self) -> &str;

    /// BOM entries in order
    fn bom(&self) -> &[BomEntry];

    /// Part that represents finished builds, if any
    fn builds_part(&self) -> Option<&EntityId>;

    /// Human label of the container kind ("Project", "Assembly")
    fn kind_label(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_kinds() {
        let part = EntityId::new(EntityPrefix::Part);
        let asm = EntityId::new(EntityPrefix::Asm);

        assert_eq!(BomEntry::for_part(part.clone(), 2.0).kind(), BomEntryKind::Part(&part));
        assert_eq!(
            BomEntry::for_container(asm.clone(), 1.0).kind(),
            BomEntryKind::Container(&asm)
        );
        assert_eq!(BomEntry::manual("PCB", 1.0).kind(), BomEntryKind::Manual);
    }

    #[test]
    fn test_entry_validation() {
        let part = EntityId::new(EntityPrefix::Part);
        assert!(BomEntry::for_part(part.clone(), 1.0).validate().is_ok());
        assert!(BomEntry::for_part(part.clone(), 0.0).validate().is_err());
        assert!(BomEntry::for_part(part.clone(), -1.0).validate().is_err());

        let mut both = BomEntry::for_part(part.clone(), 1.0);
        both.subcontainer = Some(EntityId::new(EntityPrefix::Prj));
        assert!(both.validate().is_err());

        assert!(BomEntry::for_container(part, 1.0).validate().is_err());
    }
}
