//! Withdraw, add and move stock on part lots
//!
//! These are the only functions that change a lot's amount. Each successful
//! call bumps the lot's `version` and returns a [`StockLogEntry`] describing
//! the change; recording and persisting that entry is up to the caller.
//!
//! Amounts are rounded with the owning part's unit before they are applied,
//! so integer parts never end up with fractional stock.

use chrono::Utc;
use tracing::debug;

use crate::core::identity::EntityId;
use crate::core::stock_log::{StockAction, StockLogEntry};
use crate::entities::{Part, PartLot, StorageLocation};
use crate::stock::error::StockError;
use crate::stock::AMOUNT_EPSILON;

/// Per-call options of a stock change
#[derive(Debug, Clone, Default)]
pub struct ChangeOptions {
    /// Comment stored with the log entry
    pub comment: Option<String>,

    /// Reject the change unless the lot still has this version
    pub expected_version: Option<u32>,

    /// Remove the lot when a withdrawal empties it
    pub delete_lot_if_empty: bool,
}

impl ChangeOptions {
    /// Options with just a comment
    pub fn with_comment(comment: impl Into<String>) -> Self {
        Self {
            comment: Some(comment.into()),
            ..Default::default()
        }
    }

    /// Builder: require the lot to be at `version`
    pub fn expecting_version(mut self, version: u32) -> Self {
        self.expected_version = Some(version);
        self
    }
}

/// A lot can be withdrawn from when it holds trusted, positive stock.
///
/// A full storage location does not prevent withdrawing.
pub fn can_withdraw(lot: &PartLot) -> bool {
    lot.amount > 0.0 && !lot.instock_unknown
}

/// A lot can be added to when its stock is trusted and its location is not full
pub fn can_add(lot: &PartLot, location: Option<&StorageLocation>) -> bool {
    !lot.instock_unknown && !location.is_some_and(|loc| loc.is_full)
}

fn check_amount(amount: f64) -> Result<(), StockError> {
    if amount > 0.0 && amount.is_finite() {
        Ok(())
    } else {
        Err(StockError::InvalidAmount(amount))
    }
}

fn check_version(lot: &PartLot, expected: Option<u32>) -> Result<(), StockError> {
    match expected {
        Some(expected) if expected != lot.version => Err(StockError::VersionConflict {
            lot: lot.id.clone(),
            expected,
            found: lot.version,
        }),
        _ => Ok(()),
    }
}

fn lot_index(part: &Part, lot_id: &EntityId) -> Result<usize, StockError> {
    part.lots
        .iter()
        .position(|lot| &lot.id == lot_id)
        .ok_or_else(|| StockError::LotNotFound(lot_id.clone()))
}

/// Check a withdrawal without applying it, returning the rounded amount
fn prepare_withdraw(part: &Part, idx: usize, amount: f64, options: &ChangeOptions) -> Result<f64, StockError> {
    let lot = &part.lots[idx];
    check_version(lot, options.expected_version)?;
    if !can_withdraw(lot) {
        return Err(StockError::NotWithdrawable(lot.id.clone()));
    }

    let amount = part.round_amount(amount);
    check_amount(amount)?;

    if amount > lot.amount + AMOUNT_EPSILON {
        return Err(StockError::InsufficientStock {
            lot: lot.id.clone(),
            requested: amount,
            available: lot.amount,
        });
    }
    Ok(amount)
}

/// Check an addition without applying it, returning the rounded amount
fn prepare_add(
    part: &Part,
    idx: usize,
    location: Option<&StorageLocation>,
    amount: f64,
    options: &ChangeOptions,
) -> Result<f64, StockError> {
    let lot = &part.lots[idx];
    check_version(lot, options.expected_version)?;
    if !can_add(lot, location) {
        return Err(StockError::NotAddable(lot.id.clone()));
    }

    let amount = part.round_amount(amount);
    check_amount(amount)?;
    Ok(amount)
}

/// Check a withdrawal from a lot of `part` without changing anything
///
/// Returns the amount [`withdraw`] would take after rounding.
pub fn check_withdraw(part: &Part, lot_id: &EntityId, amount: f64, options: &ChangeOptions) -> Result<f64, StockError> {
    prepare_withdraw(part, lot_index(part, lot_id)?, amount, options)
}

/// Check an addition to a lot of `part` without changing anything
pub fn check_add(
    part: &Part,
    lot_id: &EntityId,
    location: Option<&StorageLocation>,
    amount: f64,
    options: &ChangeOptions,
) -> Result<f64, StockError> {
    prepare_add(part, lot_index(part, lot_id)?, location, amount, options)
}

fn log_entry(part: &Part, lot: &EntityId, action: StockAction, amount: f64, old: f64, new: f64, comment: &Option<String>) -> StockLogEntry {
    StockLogEntry {
        timestamp: Utc::now(),
        author: String::new(),
        action,
        part: part.id.clone(),
        lot: lot.clone(),
        target_lot: None,
        amount,
        old_amount: old,
        new_amount: new,
        new_total: part.amount_sum(),
        lot_deleted: false,
        comment: comment.clone(),
    }
}

/// Withdraw `amount` from a lot of `part`
pub fn withdraw(
    part: &mut Part,
    lot_id: &EntityId,
    amount: f64,
    options: &ChangeOptions,
) -> Result<StockLogEntry, StockError> {
    let idx = lot_index(part, lot_id)?;
    let amount = prepare_withdraw(part, idx, amount, options)?;

    let lot = &mut part.lots[idx];
    let old_amount = lot.amount;
    // Clamp float noise so the amount never goes below zero
    lot.amount = (old_amount - amount).max(0.0);
    lot.version += 1;
    let new_amount = lot.amount;

    debug!(part = %part.id, lot = %lot_id, amount, old_amount, new_amount, "withdrew stock");

    let mut entry = log_entry(part, lot_id, StockAction::Withdraw, amount, old_amount, new_amount, &options.comment);
    if options.delete_lot_if_empty && new_amount == 0.0 {
        part.remove_lot(lot_id);
        entry.lot_deleted = true;
        debug!(part = %part.id, lot = %lot_id, "removed empty lot");
    }
    Ok(entry)
}

/// Add `amount` to a lot of `part`; `location` is the lot's storage location
pub fn add(
    part: &mut Part,
    lot_id: &EntityId,
    location: Option<&StorageLocation>,
    amount: f64,
    options: &ChangeOptions,
) -> Result<StockLogEntry, StockError> {
    let idx = lot_index(part, lot_id)?;
    let amount = prepare_add(part, idx, location, amount, options)?;

    let lot = &mut part.lots[idx];
    let old_amount = lot.amount;
    lot.amount = old_amount + amount;
    lot.version += 1;
    let new_amount = lot.amount;

    debug!(part = %part.id, lot = %lot_id, amount, old_amount, new_amount, "added stock");

    Ok(log_entry(part, lot_id, StockAction::Add, amount, old_amount, new_amount, &options.comment))
}

/// Move `amount` between two lots of the same part
///
/// Both sides are checked before anything changes, so a rejected move leaves
/// both lots untouched. `options.expected_version` applies to the source lot.
pub fn move_amount(
    part: &mut Part,
    source: &EntityId,
    target: &EntityId,
    target_location: Option<&StorageLocation>,
    amount: f64,
    options: &ChangeOptions,
) -> Result<StockLogEntry, StockError> {
    if source == target {
        return Err(StockError::SameLot(source.clone()));
    }
    let source_idx = lot_index(part, source)?;
    let target_idx = lot_index(part, target)?;

    let amount = prepare_withdraw(part, source_idx, amount, options)?;
    let target_options = ChangeOptions {
        expected_version: None,
        ..options.clone()
    };
    prepare_add(part, target_idx, target_location, amount, &target_options)?;

    let withdraw_options = ChangeOptions {
        expected_version: None,
        delete_lot_if_empty: false,
        ..options.clone()
    };
    let withdrawn = withdraw(part, source, amount, &withdraw_options)?;
    add(part, target, target_location, amount, &target_options)?;

    debug!(part = %part.id, source = %source, target = %target, amount, "moved stock");

    let mut entry = StockLogEntry {
        action: StockAction::Move,
        target_lot: Some(target.clone()),
        new_total: part.amount_sum(),
        ..withdrawn
    };
    if options.delete_lot_if_empty && entry.new_amount == 0.0 {
        part.remove_lot(source);
        entry.lot_deleted = true;
    }
    Ok(entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::MeasurementUnit;

    fn part_with(amounts: &[f64]) -> (Part, Vec<EntityId>) {
        let mut part = Part::new("Resistor 10k", "tester");
        let ids = amounts.iter().map(|a| part.add_lot(PartLot::new(*a))).collect();
        (part, ids)
    }

    #[test]
    fn test_can_withdraw() {
        assert!(can_withdraw(&PartLot::new(5.0)));
        assert!(!can_withdraw(&PartLot::new(0.0)));
        assert!(!can_withdraw(&PartLot::new(5.0).with_unknown_instock()));
    }

    #[test]
    fn test_can_add_respects_full_location() {
        let mut loc = StorageLocation::new("Box", "tester");
        let lot = PartLot::new(0.0).at_location(loc.id.clone());
        assert!(can_add(&lot, Some(&loc)));
        assert!(can_add(&lot, None));

        loc.is_full = true;
        assert!(!can_add(&lot, Some(&loc)));
        assert!(!can_add(&PartLot::new(1.0).with_unknown_instock(), None));

        // full location still allows withdrawing
        let stocked = PartLot::new(3.0).at_location(loc.id.clone());
        assert!(can_withdraw(&stocked));
    }

    #[test]
    fn test_withdraw_decreases_amount_and_bumps_version() {
        let (mut part, ids) = part_with(&[10.0]);
        let entry = withdraw(&mut part, &ids[0], 4.0, &ChangeOptions::with_comment("test")).unwrap();

        let lot = part.lot(&ids[0]).unwrap();
        assert_eq!(lot.amount, 6.0);
        assert_eq!(lot.version, 1);
        assert_eq!(entry.action, StockAction::Withdraw);
        assert_eq!(entry.old_amount, 10.0);
        assert_eq!(entry.new_amount, 6.0);
        assert_eq!(entry.new_total, 6.0);
        assert_eq!(entry.comment.as_deref(), Some("test"));
    }

    #[test]
    fn test_withdraw_then_add_restores_amount() {
        let (mut part, ids) = part_with(&[10.0]);
        withdraw(&mut part, &ids[0], 3.0, &ChangeOptions::default()).unwrap();
        add(&mut part, &ids[0], None, 3.0, &ChangeOptions::default()).unwrap();
        assert_eq!(part.lot(&ids[0]).unwrap().amount, 10.0);
    }

    #[test]
    fn test_withdraw_rejects_overdraw_and_bad_amounts() {
        let (mut part, ids) = part_with(&[5.0]);
        let err = withdraw(&mut part, &ids[0], 6.0, &ChangeOptions::default()).unwrap_err();
        assert!(matches!(err, StockError::InsufficientStock { .. }));

        let err = withdraw(&mut part, &ids[0], 0.0, &ChangeOptions::default()).unwrap_err();
        assert_eq!(err, StockError::InvalidAmount(0.0));

        let err = withdraw(&mut part, &ids[0], -1.0, &ChangeOptions::default()).unwrap_err();
        assert_eq!(err, StockError::InvalidAmount(-1.0));

        assert_eq!(part.lot(&ids[0]).unwrap().amount, 5.0);
        assert_eq!(part.lot(&ids[0]).unwrap().version, 0);
    }

    #[test]
    fn test_unknown_stock_lot_is_frozen() {
        let mut part = Part::new("Capacitor", "tester");
        let id = part.add_lot(PartLot::new(10.0).with_unknown_instock());

        let err = withdraw(&mut part, &id, 1.0, &ChangeOptions::default()).unwrap_err();
        assert_eq!(err, StockError::NotWithdrawable(id.clone()));

        let err = add(&mut part, &id, None, 1.0, &ChangeOptions::default()).unwrap_err();
        assert_eq!(err, StockError::NotAddable(id));
    }

    #[test]
    fn test_integer_part_rounds_amount() {
        let (mut part, ids) = part_with(&[10.0]);
        let entry = withdraw(&mut part, &ids[0], 2.6, &ChangeOptions::default()).unwrap();
        assert_eq!(entry.amount, 3.0);
        assert_eq!(part.lot(&ids[0]).unwrap().amount, 7.0);

        // rounds to zero, which is not a valid amount
        let err = add(&mut part, &ids[0], None, 0.2, &ChangeOptions::default()).unwrap_err();
        assert_eq!(err, StockError::InvalidAmount(0.0));
    }

    #[test]
    fn test_check_leaves_lot_untouched() {
        let (part, ids) = part_with(&[10.0]);
        let options = ChangeOptions::default().expecting_version(0);
        assert_eq!(check_withdraw(&part, &ids[0], 3.6, &options).unwrap(), 4.0);
        assert_eq!(
            check_withdraw(&part, &ids[0], 0.4, &options).unwrap_err(),
            StockError::InvalidAmount(0.0)
        );
        assert_eq!(check_add(&part, &ids[0], None, 2.0, &options).unwrap(), 2.0);
        assert_eq!(part.lot(&ids[0]).unwrap().amount, 10.0);
        assert_eq!(part.lot(&ids[0]).unwrap().version, 0);
    }

    #[test]
    fn test_float_part_keeps_fraction() {
        let mut part = Part::new("Solder wire", "tester")
            .with_unit(MeasurementUnit::new("Meters", Some("m".into()), false));
        let id = part.add_lot(PartLot::new(2.0));
        withdraw(&mut part, &id, 0.25, &ChangeOptions::default()).unwrap();
        assert_eq!(part.lot(&id).unwrap().amount, 1.75);
    }

    #[test]
    fn test_delete_lot_if_empty() {
        let (mut part, ids) = part_with(&[4.0, 1.0]);
        let options = ChangeOptions {
            delete_lot_if_empty: true,
            ..Default::default()
        };

        let entry = withdraw(&mut part, &ids[0], 2.0, &options).unwrap();
        assert!(!entry.lot_deleted);

        let entry = withdraw(&mut part, &ids[0], 2.0, &options).unwrap();
        assert!(entry.lot_deleted);
        assert!(part.lot(&ids[0]).is_none());
        assert_eq!(part.lots.len(), 1);
    }

    #[test]
    fn test_version_conflict() {
        let (mut part, ids) = part_with(&[10.0]);
        withdraw(&mut part, &ids[0], 1.0, &ChangeOptions::default()).unwrap();

        let stale = ChangeOptions::default().expecting_version(0);
        let err = withdraw(&mut part, &ids[0], 1.0, &stale).unwrap_err();
        assert_eq!(
            err,
            StockError::VersionConflict {
                lot: ids[0].clone(),
                expected: 0,
                found: 1
            }
        );

        let current = ChangeOptions::default().expecting_version(1);
        assert!(withdraw(&mut part, &ids[0], 1.0, &current).is_ok());
    }

    #[test]
    fn test_move_between_lots() {
        let (mut part, ids) = part_with(&[10.0, 2.0]);
        let entry = move_amount(&mut part, &ids[0], &ids[1], None, 4.0, &ChangeOptions::with_comment("restock")).unwrap();

        assert_eq!(part.lot(&ids[0]).unwrap().amount, 6.0);
        assert_eq!(part.lot(&ids[1]).unwrap().amount, 6.0);
        assert_eq!(entry.action, StockAction::Move);
        assert_eq!(entry.target_lot.as_ref(), Some(&ids[1]));
        assert_eq!(entry.new_total, 12.0);
        assert_eq!(entry.comment.as_deref(), Some("restock"));
    }

    #[test]
    fn test_move_checks_target_before_withdrawing() {
        let mut part = Part::new("Diode", "tester");
        let mut loc = StorageLocation::new("Full bin", "tester");
        loc.is_full = true;
        let source = part.add_lot(PartLot::new(10.0));
        let target = part.add_lot(PartLot::new(1.0).at_location(loc.id.clone()));

        let err = move_amount(&mut part, &source, &target, Some(&loc), 4.0, &ChangeOptions::default()).unwrap_err();
        assert_eq!(err, StockError::NotAddable(target.clone()));
        assert_eq!(part.lot(&source).unwrap().amount, 10.0);
        assert_eq!(part.lot(&source).unwrap().version, 0);

        let err = move_amount(&mut part, &source, &source, None, 1.0, &ChangeOptions::default()).unwrap_err();
        assert_eq!(err, StockError::SameLot(source));
    }
}
