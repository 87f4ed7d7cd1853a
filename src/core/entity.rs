//! Entity trait - common interface for all stored entity types

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};

use crate::core::identity::{EntityId, EntityPrefix};

/// Common trait for all partdb entities that live in their own file
pub trait Entity: Serialize + DeserializeOwned {
    /// The entity type prefix (e.g., PART, PRJ)
    const PREFIX: EntityPrefix;

    /// Get the entity's unique ID
    fn id(&self) -> &EntityId;

    /// Get the entity's display name
    fn name(&self) -> &str;

    /// Get the creation timestamp
    fn created(&self) -> DateTime<Utc>;

    /// Get the author
    fn author(&self) -> &str;
}

/// Lifecycle status of a project or assembly
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[derive(Default)]
pub enum Status {
    #[default]
    Draft,
    Planning,
    InProduction,
    Finished,
    Archived,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::Draft => write!(f, "draft"),
            Status::Planning => write!(f, "planning"),
            Status::InProduction => write!(f, "in_production"),
            Status::Finished => write!(f, "finished"),
            Status::Archived => write!(f, "archived"),
        }
    }
}

impl std::str::FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "draft" => Ok(Status::Draft),
            "planning" => Ok(Status::Planning),
            "in_production" | "inproduction" => Ok(Status::InProduction),
            "finished" => Ok(Status::Finished),
            "archived" => Ok(Status::Archived),
            _ => Err(format!(
                "Unknown status: {}. Use draft, planning, in_production, finished, or archived",
                s
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parse_and_display() {
        assert_eq!("in_production".parse::<Status>().unwrap(), Status::InProduction);
        assert_eq!("Finished".parse::<Status>().unwrap(), Status::Finished);
        assert_eq!(Status::Planning.to_string(), "planning");
        assert!("shipped".parse::<Status>().is_err());
    }
}
