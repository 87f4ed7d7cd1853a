//! Errors raised by stock primitives and build calculations

use miette::Diagnostic;
use thiserror::Error;

use crate::core::identity::EntityId;

/// Errors from withdraw/add/move on part lots
#[derive(Debug, Clone, PartialEq, Error, Diagnostic)]
pub enum StockError {
    #[error("amount must be greater than 0 (got {0})")]
    #[diagnostic(code(partdb::stock::invalid_amount))]
    InvalidAmount(f64),

    #[error("cannot withdraw from lot {0}: it is empty or its stock is unknown")]
    #[diagnostic(code(partdb::stock::not_withdrawable))]
    NotWithdrawable(EntityId),

    #[error("cannot add to lot {0}: its stock is unknown or its storage location is full")]
    #[diagnostic(code(partdb::stock::not_addable))]
    NotAddable(EntityId),

    #[error("cannot withdraw {requested} from lot {lot}: only {available} in stock")]
    #[diagnostic(code(partdb::stock::insufficient))]
    InsufficientStock {
        lot: EntityId,
        requested: f64,
        available: f64,
    },

    #[error("lot {0} not found")]
    #[diagnostic(code(partdb::stock::unknown_lot))]
    LotNotFound(EntityId),

    #[error("part {0} not found")]
    #[diagnostic(code(partdb::stock::unknown_part))]
    PartNotFound(EntityId),

    #[error("cannot move stock from lot {0} onto itself")]
    #[diagnostic(code(partdb::stock::same_lot))]
    SameLot(EntityId),

    #[error("lots {source_lot} and {target_lot} belong to different parts")]
    #[diagnostic(code(partdb::stock::different_parts))]
    DifferentParts {
        source_lot: EntityId,
        target_lot: EntityId,
    },

    #[error("lot {lot} changed since it was read (expected version {expected}, found {found})")]
    #[diagnostic(
        code(partdb::stock::version_conflict),
        help("Reload the inventory and plan the change again")
    )]
    VersionConflict {
        lot: EntityId,
        expected: u32,
        found: u32,
    },
}

/// Errors from build capacity calculations and build requests
#[derive(Debug, Clone, PartialEq, Error, Diagnostic)]
pub enum BuildError {
    #[error("BOM entry {0} does not reference a part")]
    #[diagnostic(code(partdb::build::no_part))]
    EntryWithoutPart(EntityId),

    #[error("BOM entry {entry} has quantity {quantity}; a positive quantity is required")]
    #[diagnostic(code(partdb::build::quantity))]
    NonPositiveQuantity { entry: EntityId, quantity: f64 },

    #[error("number of builds must be at least 1 (got {0})")]
    #[diagnostic(code(partdb::build::count))]
    InvalidBuildCount(u64),

    #[error("sub-build cycle detected: {}", format_cycle(.0))]
    #[diagnostic(
        code(partdb::build::cycle),
        help("A project or assembly must not contain itself, directly or through its sub-builds")
    )]
    Cycle(Vec<EntityId>),

    #[error("{0} referenced by a BOM does not exist")]
    #[diagnostic(code(partdb::build::unknown))]
    UnknownEntity(EntityId),

    #[error("lot {0} is not part of this build request")]
    #[diagnostic(code(partdb::build::unknown_lot))]
    UnknownLot(String),

    #[error("{0} has no builds part to stock finished builds in")]
    #[diagnostic(code(partdb::build::no_builds_part))]
    NoBuildsPart(EntityId),

    #[error("build request is {state} and cannot be {action}")]
    #[diagnostic(code(partdb::build::state))]
    InvalidState { state: String, action: &'static str },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Stock(#[from] StockError),
}

fn format_cycle(path: &[EntityId]) -> String {
    path.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::identity::EntityPrefix;

    #[test]
    fn test_cycle_message_lists_path() {
        let a = EntityId::new(EntityPrefix::Prj);
        let b = EntityId::new(EntityPrefix::Asm);
        let msg = BuildError::Cycle(vec![a.clone(), b.clone(), a.clone()]).to_string();
        assert!(msg.contains(&format!("{} -> {} -> {}", a, b, a)));
    }

    #[test]
    fn test_stock_error_converts() {
        let lot = EntityId::new(EntityPrefix::Lot);
        let err: BuildError = StockError::NotWithdrawable(lot.clone()).into();
        assert_eq!(err, BuildError::Stock(StockError::NotWithdrawable(lot)));
    }
}
