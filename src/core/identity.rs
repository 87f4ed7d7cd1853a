//! Entity identifiers: a type prefix plus a ULID, e.g. `LOT-01HC2JB7SMQX7RS1Y0GFKBHPTE`
//!
//! Lots and BOM entries get IDs of their own even though they are stored
//! inside their part or container file, so stock changes and build plans can
//! name them directly.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use ulid::Ulid;

/// Entity type prefixes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntityPrefix {
    Part,
    Lot,
    Loc,
    Prj,
    Asm,
    Bom,
}

const PREFIXES: [(EntityPrefix, &str); 6] = [
    (EntityPrefix::Part, "PART"),
    (EntityPrefix::Lot, "LOT"),
    (EntityPrefix::Loc, "LOC"),
    (EntityPrefix::Prj, "PRJ"),
    (EntityPrefix::Asm, "ASM"),
    (EntityPrefix::Bom, "BOM"),
];

impl EntityPrefix {
    pub fn as_str(&self) -> &'static str {
        PREFIXES
            .iter()
            .find(|(prefix, _)| prefix == self)
            .map(|(_, s)| *s)
            .unwrap_or("?")
    }

    /// Projects and assemblies own a bill of materials
    pub fn is_container(&self) -> bool {
        matches!(self, EntityPrefix::Prj | EntityPrefix::Asm)
    }
}

impl fmt::Display for EntityPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityPrefix {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PREFIXES
            .iter()
            .find(|(_, name)| name.eq_ignore_ascii_case(s))
            .map(|(prefix, _)| *prefix)
            .ok_or_else(|| IdParseError::InvalidPrefix(s.to_string()))
    }
}

/// Unique entity identifier, serialized as `PREFIX-ULID`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntityId {
    prefix: EntityPrefix,
    ulid: Ulid,
}

impl EntityId {
    /// Fresh ID; IDs created later sort after earlier ones
    pub fn new(prefix: EntityPrefix) -> Self {
        Self {
            prefix,
            ulid: Ulid::new(),
        }
    }

    pub fn prefix(&self) -> EntityPrefix {
        self.prefix
    }

    pub fn parse(s: &str) -> Result<Self, IdParseError> {
        s.parse()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.prefix, self.ulid)
    }
}

impl FromStr for EntityId {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (prefix, ulid) = s
            .trim()
            .split_once('-')
            .ok_or_else(|| IdParseError::MissingDelimiter(s.to_string()))?;
        Ok(Self {
            prefix: prefix.parse()?,
            ulid: Ulid::from_string(ulid)
                .map_err(|e| IdParseError::InvalidUlid(ulid.to_string(), e.to_string()))?,
        })
    }
}

impl TryFrom<String> for EntityId {
    type Error = IdParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<EntityId> for String {
    fn from(id: EntityId) -> Self {
        id.to_string()
    }
}

#[derive(Debug, Error)]
pub enum IdParseError {
    #[error("invalid entity prefix '{0}' (expected PART, LOT, LOC, PRJ, ASM or BOM)")]
    InvalidPrefix(String),

    #[error("'{0}' is not an entity ID (expected PREFIX-ULID)")]
    MissingDelimiter(String),

    #[error("invalid ULID '{0}': {1}")]
    InvalidUlid(String, String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_id_format() {
        let id = EntityId::new(EntityPrefix::Lot);
        let text = id.to_string();
        assert!(text.starts_with("LOT-"));
        assert_eq!(text.len(), 4 + 26);
        assert_eq!(EntityId::parse(&text).unwrap(), id);
    }

    #[test]
    fn test_prefix_is_case_insensitive() {
        assert_eq!("asm".parse::<EntityPrefix>().unwrap(), EntityPrefix::Asm);
        assert_eq!(EntityPrefix::Bom.to_string(), "BOM");
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            EntityId::parse("XXX-01HQ3K4N5M6P7R8S9T0UVWXYZ"),
            Err(IdParseError::InvalidPrefix(_))
        ));
        assert!(matches!(
            EntityId::parse("PART01HQ3K4N5M6P7R8S9T0UVWXYZ"),
            Err(IdParseError::MissingDelimiter(_))
        ));
        assert!(matches!(EntityId::parse("LOT-notaulid"), Err(IdParseError::InvalidUlid(_, _))));
    }

    #[test]
    fn test_serializes_as_string() {
        let id = EntityId::new(EntityPrefix::Part);
        let yaml = serde_yml::to_string(&id).unwrap();
        assert_eq!(yaml.trim(), id.to_string());
        let back: EntityId = serde_yml::from_str(&yaml).unwrap();
        assert_eq!(back, id);
        assert!(serde_yml::from_str::<EntityId>("PART-nope").is_err());
    }

    #[test]
    fn test_container_prefixes() {
        assert!(EntityPrefix::Prj.is_container());
        assert!(EntityPrefix::Asm.is_container());
        assert!(!EntityPrefix::Part.is_container());
    }
}
