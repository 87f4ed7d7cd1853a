//! Planning and committing builds
//!
//! A [`BuildRequest`] holds, for every lot of every part a container's BOM
//! consumes, how much to withdraw for N builds. It starts with a greedy
//! first-fit allocation that can be adjusted, must be validated, and is then
//! committed with [`do_build`].
//!
//! Lots are snapshotted when the request is created. Each slot keeps the
//! lot's version at that time and the commit passes it as the expected
//! version, so a lot changed in between aborts the build instead of
//! withdrawing from stock that was never looked at.
//!
//! The same part may appear in several BOM entries. Its lots then form one
//! shared pool: allocation continues where the previous entry stopped, and
//! quantities are checked per part.

use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;
use tracing::{debug, info};

use crate::core::identity::EntityId;
use crate::core::stock_log::StockLogEntry;
use crate::core::store::{Catalog, StockStore};
use crate::entities::{BomEntry, PartLot};
use crate::stock::build_helper::check_quantity;
use crate::stock::error::{BuildError, StockError};
use crate::stock::withdraw::{can_add, can_withdraw, ChangeOptions};
use crate::stock::AMOUNT_EPSILON;

/// Position of a lot within one build request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LotHandle(usize);

impl LotHandle {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Any way of naming a lot of a request
#[derive(Debug, Clone, Copy)]
pub enum LotKey<'a> {
    Handle(LotHandle),
    Id(&'a EntityId),
}

impl From<LotHandle> for LotKey<'_> {
    fn from(handle: LotHandle) -> Self {
        LotKey::Handle(handle)
    }
}

impl<'a> From<&'a EntityId> for LotKey<'a> {
    fn from(id: &'a EntityId) -> Self {
        LotKey::Id(id)
    }
}

impl<'a> From<&'a PartLot> for LotKey<'a> {
    fn from(lot: &'a PartLot) -> Self {
        LotKey::Id(&lot.id)
    }
}

impl fmt::Display for LotKey<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LotKey::Handle(handle) => write!(f, "#{}", handle.0),
            LotKey::Id(id) => write!(f, "{}", id),
        }
    }
}

/// One lot of a build request with its planned withdrawal
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedLot {
    pub handle: LotHandle,
    pub lot_id: EntityId,
    pub part_id: EntityId,
    pub storage_location: Option<EntityId>,
    /// Amount to withdraw
    pub planned: f64,
    /// Lot amount when the request was created
    pub available: f64,
    /// Lot version when the request was created
    pub version: u32,
    pub withdrawable: bool,
    pub expired: bool,
}

/// Lifecycle of a build request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildRequestState {
    Created,
    Adjusted,
    Validated,
    Committed,
    Discarded,
}

impl BuildRequestState {
    fn is_open(&self) -> bool {
        !matches!(self, BuildRequestState::Committed | BuildRequestState::Discarded)
    }
}

impl fmt::Display for BuildRequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BuildRequestState::Created => "created",
            BuildRequestState::Adjusted => "adjusted",
            BuildRequestState::Validated => "validated",
            BuildRequestState::Committed => "committed",
            BuildRequestState::Discarded => "discarded",
        };
        write!(f, "{}", s)
    }
}

/// Reasons a build request cannot be committed
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BuildViolation {
    #[error("lot {lot}: withdraw amount {amount} is negative")]
    NegativeAmount { lot: EntityId, amount: f64 },

    #[error("lot {lot}: withdraw amount {amount} exceeds the {available} in stock")]
    ExceedsStock {
        lot: EntityId,
        amount: f64,
        available: f64,
    },

    #[error("lot {lot}: withdraw amount {amount} is not a whole number of pieces")]
    FractionalAmount { lot: EntityId, amount: f64 },

    #[error("lot {lot} cannot be withdrawn from (empty or unknown stock)")]
    NotWithdrawable { lot: EntityId },

    #[error("lot {lot} no longer exists")]
    LotMissing { lot: EntityId },

    #[error("part {part}: {planned} planned but {needed} needed")]
    QuantityMismatch {
        part: EntityId,
        needed: f64,
        planned: f64,
    },

    #[error("{container} has no builds part to add the builds to")]
    NoBuildsPart { container: EntityId },

    #[error("builds lot {lot} does not belong to the builds part")]
    BuildsLotWrongPart { lot: EntityId },

    #[error("builds lot {lot} cannot be added to (unknown stock or full location)")]
    BuildsLotNotAddable { lot: EntityId },

    #[error("build request is already {state}")]
    Closed { state: BuildRequestState },
}

/// Result of a committed build
#[derive(Debug, Clone)]
pub struct BuildOutcome {
    /// Withdrawals first, then the builds addition if any
    pub log: Vec<StockLogEntry>,
    /// Lot the finished builds were added to
    pub builds_lot: Option<EntityId>,
}

/// Planned withdrawals for building a project or assembly N times
#[derive(Debug, Clone)]
pub struct BuildRequest {
    container: EntityId,
    container_name: String,
    kind_label: &'static str,
    builds_part: Option<EntityId>,
    number_of_builds: u64,
    entries: Vec<BomEntry>,
    needed: BTreeMap<EntityId, f64>,
    lots: Vec<PlannedLot>,
    comment: Option<String>,
    dont_check_quantity: bool,
    add_builds_to_builds_part: bool,
    builds_part_lot: Option<EntityId>,
    state: BuildRequestState,
}

impl BuildRequest {
    /// Plan `number_of_builds` builds of a container from current stock
    ///
    /// Only part entries are planned; sub-builds and manual entries are
    /// expected to be handled separately.
    pub fn new<C: Catalog + ?Sized>(
        catalog: &C,
        container: &EntityId,
        number_of_builds: u64,
    ) -> Result<Self, BuildError> {
        if number_of_builds == 0 {
            return Err(BuildError::InvalidBuildCount(number_of_builds));
        }
        let source = catalog
            .container(container)
            .ok_or_else(|| BuildError::UnknownEntity(container.clone()))?;

        let mut request = Self {
            container: container.clone(),
            container_name: source.container_name().to_string(),
            kind_label: source.kind_label(),
            builds_part: source.builds_part().cloned(),
            number_of_builds,
            entries: Vec::new(),
            needed: BTreeMap::new(),
            lots: Vec::new(),
            comment: None,
            dont_check_quantity: false,
            add_builds_to_builds_part: false,
            builds_part_lot: None,
            state: BuildRequestState::Created,
        };

        let today = chrono::Utc::now().date_naive();
        for entry in source.bom() {
            let Some(part_id) = &entry.part else { continue };
            check_quantity(entry)?;
            let part = catalog
                .part(part_id)
                .ok_or_else(|| BuildError::UnknownEntity(part_id.clone()))?;

            let raw = entry.quantity * number_of_builds as f64;
            let needed = if part.use_float_amount() {
                raw
            } else {
                (raw - AMOUNT_EPSILON).ceil()
            };
            request.needed.insert(entry.id.clone(), needed);
            request.entries.push(entry.clone());

            if request.lots.iter().all(|slot| &slot.part_id != part_id) {
                for lot in &part.lots {
                    request.lots.push(PlannedLot {
                        handle: LotHandle(request.lots.len()),
                        lot_id: lot.id.clone(),
                        part_id: part_id.clone(),
                        storage_location: lot.storage_location.clone(),
                        planned: 0.0,
                        available: lot.amount,
                        version: lot.version,
                        withdrawable: can_withdraw(lot),
                        expired: lot.is_expired_on(today),
                    });
                }
            }
            request.allocate(part_id, needed);
        }

        debug!(
            container = %request.container,
            builds = number_of_builds,
            entries = request.entries.len(),
            lots = request.lots.len(),
            "planned build request"
        );
        Ok(request)
    }

    /// Greedy first fit over the part's lots in order
    fn allocate(&mut self, part_id: &EntityId, needed: f64) {
        let mut remaining = needed;
        for slot in self.lots.iter_mut().filter(|slot| &slot.part_id == part_id) {
            if remaining <= AMOUNT_EPSILON {
                break;
            }
            if !slot.withdrawable || slot.expired {
                continue;
            }
            let free = slot.available - slot.planned;
            if free <= AMOUNT_EPSILON {
                continue;
            }
            let take = remaining.min(free);
            slot.planned += take;
            remaining -= take;
        }
    }

    pub fn container(&self) -> &EntityId {
        &self.container
    }

    pub fn container_name(&self) -> &str {
        &self.container_name
    }

    pub fn number_of_builds(&self) -> u64 {
        self.number_of_builds
    }

    pub fn state(&self) -> BuildRequestState {
        self.state
    }

    /// BOM entries consuming parts, in BOM order
    pub fn part_entries(&self) -> &[BomEntry] {
        &self.entries
    }

    /// Every lot slot of the request
    pub fn lots(&self) -> &[PlannedLot] {
        &self.lots
    }

    /// Lots that can serve an entry (all lots of its part)
    pub fn lots_for_entry(&self, entry: &BomEntry) -> Vec<&PlannedLot> {
        match &entry.part {
            Some(part) => self.lots.iter().filter(|slot| &slot.part_id == part).collect(),
            None => Vec::new(),
        }
    }

    /// `quantity * number_of_builds`, rounded up for parts counted in pieces
    pub fn needed_amount_for_entry(&self, entry: &BomEntry) -> Result<f64, BuildError> {
        if entry.part.is_none() {
            return Err(BuildError::EntryWithoutPart(entry.id.clone()));
        }
        self.needed
            .get(&entry.id)
            .copied()
            .ok_or_else(|| BuildError::UnknownEntity(entry.id.clone()))
    }

    /// Planned withdrawal over all lots of the entry's part
    pub fn withdraw_amount_sum(&self, entry: &BomEntry) -> f64 {
        self.lots_for_entry(entry).iter().map(|slot| slot.planned).sum()
    }

    fn position<'k>(&self, key: impl Into<LotKey<'k>>) -> Result<usize, BuildError> {
        let key = key.into();
        let found = match key {
            LotKey::Handle(handle) => (handle.0 < self.lots.len()).then_some(handle.0),
            LotKey::Id(id) => self.lots.iter().position(|slot| &slot.lot_id == id),
        };
        found.ok_or_else(|| BuildError::UnknownLot(key.to_string()))
    }

    /// Look up a lot slot
    pub fn lot<'k>(&self, key: impl Into<LotKey<'k>>) -> Option<&PlannedLot> {
        self.position(key).ok().map(|idx| &self.lots[idx])
    }

    /// Planned withdrawal from a lot
    pub fn lot_withdraw_amount<'k>(&self, key: impl Into<LotKey<'k>>) -> Result<f64, BuildError> {
        Ok(self.lots[self.position(key)?].planned)
    }

    /// Change the planned withdrawal from a lot
    ///
    /// Any amount is accepted here; [`BuildRequest::validate`] reports
    /// amounts that cannot be committed.
    pub fn set_lot_withdraw_amount<'k>(&mut self, key: impl Into<LotKey<'k>>, amount: f64) -> Result<(), BuildError> {
        self.adjust("adjusted")?;
        let idx = self.position(key)?;
        self.lots[idx].planned = amount;
        Ok(())
    }

    fn adjust(&mut self, action: &'static str) -> Result<(), BuildError> {
        if !self.state.is_open() {
            return Err(BuildError::InvalidState {
                state: self.state.to_string(),
                action,
            });
        }
        self.state = BuildRequestState::Adjusted;
        Ok(())
    }

    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    pub fn set_comment(&mut self, comment: Option<String>) -> Result<(), BuildError> {
        self.adjust("adjusted")?;
        self.comment = comment.filter(|c| !c.trim().is_empty());
        Ok(())
    }

    pub fn dont_check_quantity(&self) -> bool {
        self.dont_check_quantity
    }

    /// Allow per-part sums that differ from the needed amount
    pub fn set_dont_check_quantity(&mut self, value: bool) -> Result<(), BuildError> {
        self.adjust("adjusted")?;
        self.dont_check_quantity = value;
        Ok(())
    }

    pub fn add_builds_to_builds_part(&self) -> bool {
        self.add_builds_to_builds_part
    }

    /// Add the finished builds to the container's builds part on commit
    pub fn set_add_builds_to_builds_part(&mut self, value: bool) -> Result<(), BuildError> {
        self.adjust("adjusted")?;
        self.add_builds_to_builds_part = value;
        Ok(())
    }

    pub fn builds_part_lot(&self) -> Option<&EntityId> {
        self.builds_part_lot.as_ref()
    }

    /// Lot receiving the builds; `None` creates a new lot on commit
    pub fn set_builds_part_lot(&mut self, lot: Option<EntityId>) -> Result<(), BuildError> {
        self.adjust("adjusted")?;
        self.builds_part_lot = lot;
        Ok(())
    }

    /// Comment stored with every stock change of the build
    pub fn build_comment(&self) -> String {
        let origin = format!("{} build: {}", self.kind_label, self.container_name);
        match &self.comment {
            Some(comment) => format!("{} ({})", comment, origin),
            None => origin,
        }
    }

    /// Check the request against current stock
    ///
    /// All violations are returned at once. On success the request becomes
    /// `Validated` and can be committed.
    pub fn validate<C: Catalog + ?Sized>(&mut self, catalog: &C) -> Result<(), Vec<BuildViolation>> {
        if !self.state.is_open() {
            return Err(vec![BuildViolation::Closed { state: self.state }]);
        }

        let mut violations = Vec::new();
        for slot in &self.lots {
            if slot.planned < 0.0 {
                violations.push(BuildViolation::NegativeAmount {
                    lot: slot.lot_id.clone(),
                    amount: slot.planned,
                });
                continue;
            }
            if slot.planned <= AMOUNT_EPSILON {
                continue;
            }
            let Some((part, lot)) = catalog.lot(&slot.lot_id) else {
                violations.push(BuildViolation::LotMissing { lot: slot.lot_id.clone() });
                continue;
            };
            if (part.round_amount(slot.planned) - slot.planned).abs() > AMOUNT_EPSILON {
                violations.push(BuildViolation::FractionalAmount {
                    lot: slot.lot_id.clone(),
                    amount: slot.planned,
                });
            }
            if !can_withdraw(lot) {
                violations.push(BuildViolation::NotWithdrawable { lot: slot.lot_id.clone() });
            } else if slot.planned > lot.amount + AMOUNT_EPSILON {
                violations.push(BuildViolation::ExceedsStock {
                    lot: slot.lot_id.clone(),
                    amount: slot.planned,
                    available: lot.amount,
                });
            }
        }

        if !self.dont_check_quantity {
            let mut per_part: BTreeMap<&EntityId, f64> = BTreeMap::new();
            for entry in &self.entries {
                if let (Some(part), Some(needed)) = (&entry.part, self.needed.get(&entry.id)) {
                    *per_part.entry(part).or_default() += needed;
                }
            }
            for (part, needed) in per_part {
                let planned: f64 = self
                    .lots
                    .iter()
                    .filter(|slot| &slot.part_id == part)
                    .map(|slot| slot.planned)
                    .sum();
                if (planned - needed).abs() > AMOUNT_EPSILON {
                    violations.push(BuildViolation::QuantityMismatch {
                        part: part.clone(),
                        needed,
                        planned,
                    });
                }
            }
        }

        if self.add_builds_to_builds_part {
            match &self.builds_part {
                None => violations.push(BuildViolation::NoBuildsPart {
                    container: self.container.clone(),
                }),
                Some(builds_part) => {
                    if let Some(lot_id) = &self.builds_part_lot {
                        match catalog.lot(lot_id) {
                            None => violations.push(BuildViolation::LotMissing { lot: lot_id.clone() }),
                            Some((part, _)) if &part.id != builds_part => {
                                violations.push(BuildViolation::BuildsLotWrongPart { lot: lot_id.clone() })
                            }
                            Some((_, lot)) => {
                                let location = lot.storage_location.as_ref().and_then(|id| catalog.location(id));
                                if !can_add(lot, location) {
                                    violations.push(BuildViolation::BuildsLotNotAddable { lot: lot_id.clone() });
                                }
                            }
                        }
                    }
                }
            }
        }

        if violations.is_empty() {
            self.state = BuildRequestState::Validated;
            Ok(())
        } else {
            debug!(container = %self.container, violations = violations.len(), "build request rejected");
            Err(violations)
        }
    }

    /// Drop the request without touching stock
    pub fn discard(&mut self) -> Result<(), BuildError> {
        if self.state == BuildRequestState::Committed {
            return Err(BuildError::InvalidState {
                state: self.state.to_string(),
                action: "discarded",
            });
        }
        self.state = BuildRequestState::Discarded;
        Ok(())
    }
}

/// Commit a validated request to a stock store
///
/// Every planned withdrawal is checked against the lot version seen at
/// planning time, and against the lot's current stock, before anything
/// changes; an error leaves the store untouched. The store is not flushed.
pub fn do_build<S: StockStore + ?Sized>(request: &mut BuildRequest, store: &mut S) -> Result<BuildOutcome, BuildError> {
    if request.state != BuildRequestState::Validated {
        return Err(BuildError::InvalidState {
            state: request.state.to_string(),
            action: "committed",
        });
    }

    let withdrawals: Vec<&PlannedLot> = request
        .lots
        .iter()
        .filter(|slot| slot.planned > AMOUNT_EPSILON)
        .collect();

    let options = ChangeOptions::with_comment(request.build_comment());
    for slot in &withdrawals {
        let withdrawn = store.check_withdraw(&slot.lot_id, slot.planned, &options.clone().expecting_version(slot.version))?;
        if (withdrawn - slot.planned).abs() > AMOUNT_EPSILON {
            return Err(StockError::InvalidAmount(slot.planned).into());
        }
    }
    if request.add_builds_to_builds_part {
        let builds = request.number_of_builds as f64;
        match (&request.builds_part_lot, &request.builds_part) {
            (Some(lot), _) => {
                store.check_add(lot, builds, &options)?;
            }
            (None, Some(part)) if store.part(part).is_none() => {
                return Err(StockError::PartNotFound(part.clone()).into());
            }
            (None, Some(_)) => {}
            (None, None) => return Err(BuildError::NoBuildsPart(request.container.clone())),
        }
    }

    let mut log = Vec::with_capacity(withdrawals.len() + 1);
    for slot in &withdrawals {
        let entry = store.withdraw(
            &slot.lot_id,
            slot.planned,
            &options.clone().expecting_version(slot.version),
        )?;
        log.push(entry);
    }

    let mut builds_lot = None;
    if request.add_builds_to_builds_part {
        let builds_part = request
            .builds_part
            .clone()
            .ok_or_else(|| BuildError::NoBuildsPart(request.container.clone()))?;
        let lot_id = match &request.builds_part_lot {
            Some(lot) => lot.clone(),
            None => {
                let mut lot = PartLot::new(0.0);
                lot.description = Some(request.build_comment());
                store.create_lot(&builds_part, lot)?
            }
        };
        log.push(store.add(&lot_id, request.number_of_builds as f64, &options)?);
        builds_lot = Some(lot_id);
    }

    request.state = BuildRequestState::Committed;
    info!(
        container = %request.container,
        builds = request.number_of_builds,
        withdrawals = withdrawals.len(),
        "committed build"
    );
    Ok(BuildOutcome { log, builds_lot })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::stock_log::StockAction;
    use crate::core::store::Inventory;
    use crate::entities::{Part, Project, StorageLocation};

    struct Fixture {
        inventory: Inventory,
        project: EntityId,
        part: EntityId,
        lots: Vec<EntityId>,
    }

    /// One project needing `quantity` of a part per build, stocked in `lots`
    fn fixture(quantity: f64, lots: &[f64]) -> Fixture {
        let mut inventory = Inventory::in_memory("tester");
        let mut part = Part::new("R 10k", "tester");
        let lot_ids = lots.iter().map(|a| part.add_lot(PartLot::new(*a))).collect();
        let part_id = inventory.insert_part(part);

        let mut project = Project::new("Amplifier", "tester");
        project.add_entry(BomEntry::for_part(part_id.clone(), quantity));
        project.add_entry(BomEntry::manual("PCB", 1.0));
        let project_id = inventory.insert_project(project);

        Fixture {
            inventory,
            project: project_id,
            part: part_id,
            lots: lot_ids,
        }
    }

    fn amount(inventory: &Inventory, lot: &EntityId) -> f64 {
        inventory.lot(lot).map(|(_, l)| l.amount).unwrap()
    }

    #[test]
    fn test_greedy_allocation_first_fit() {
        let f = fixture(2.0, &[10.0, 15.0]);
        let request = BuildRequest::new(&f.inventory, &f.project, 10).unwrap();

        assert_eq!(request.state(), BuildRequestState::Created);
        assert_eq!(request.part_entries().len(), 1);
        let entry = &request.part_entries()[0];
        assert_eq!(request.needed_amount_for_entry(entry).unwrap(), 20.0);
        assert_eq!(request.lot_withdraw_amount(&f.lots[0]).unwrap(), 10.0);
        assert_eq!(request.lot_withdraw_amount(&f.lots[1]).unwrap(), 10.0);
        assert_eq!(request.withdraw_amount_sum(entry), 20.0);
    }

    #[test]
    fn test_allocation_skips_unusable_lots() {
        let mut f = fixture(1.0, &[]);
        {
            let part = f.inventory.part_mut(&f.part).unwrap();
            f.lots.push(part.add_lot(PartLot::new(50.0).with_unknown_instock()));
            f.lots.push(part.add_lot(PartLot::new(0.0)));
            let long_ago = chrono::NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
            f.lots.push(part.add_lot(PartLot::new(20.0).expiring(long_ago)));
            f.lots.push(part.add_lot(PartLot::new(5.0)));
        }

        let request = BuildRequest::new(&f.inventory, &f.project, 3).unwrap();
        assert_eq!(request.lots().len(), 4);
        assert_eq!(request.lot_withdraw_amount(&f.lots[0]).unwrap(), 0.0);
        assert_eq!(request.lot_withdraw_amount(&f.lots[1]).unwrap(), 0.0);
        assert_eq!(request.lot_withdraw_amount(&f.lots[2]).unwrap(), 0.0);
        assert_eq!(request.lot_withdraw_amount(&f.lots[3]).unwrap(), 3.0);
        assert!(!request.lot(&f.lots[0]).unwrap().withdrawable);
        let expired = request.lot(&f.lots[2]).unwrap();
        assert!(expired.expired);
        assert!(expired.withdrawable);
    }

    #[test]
    fn test_lot_keys_are_interchangeable() {
        let f = fixture(2.0, &[10.0, 15.0]);
        let mut request = BuildRequest::new(&f.inventory, &f.project, 10).unwrap();

        let (_, lot) = f.inventory.lot(&f.lots[1]).unwrap();
        let handle = request.lot(&f.lots[1]).unwrap().handle;
        assert_eq!(request.lot(lot).unwrap().handle, handle);

        request.set_lot_withdraw_amount(handle, 7.0).unwrap();
        assert_eq!(request.lot_withdraw_amount(lot).unwrap(), 7.0);
        assert_eq!(request.lot_withdraw_amount(&f.lots[1]).unwrap(), 7.0);
        assert_eq!(request.state(), BuildRequestState::Adjusted);

        let stranger = EntityId::new(crate::core::identity::EntityPrefix::Lot);
        assert!(matches!(
            request.lot_withdraw_amount(&stranger),
            Err(BuildError::UnknownLot(_))
        ));
        assert!(request.lot(LotHandle(99)).is_none());
    }

    #[test]
    fn test_shared_part_pool() {
        let mut f = fixture(3.0, &[4.0, 10.0]);
        f.inventory
            .project_mut(&f.project)
            .unwrap()
            .add_entry(BomEntry::for_part(f.part.clone(), 2.0));

        let mut request = BuildRequest::new(&f.inventory, &f.project, 2).unwrap();
        assert_eq!(request.lots().len(), 2);
        // 6 for the first entry, 4 more for the second
        assert_eq!(request.lot_withdraw_amount(&f.lots[0]).unwrap(), 4.0);
        assert_eq!(request.lot_withdraw_amount(&f.lots[1]).unwrap(), 6.0);
        assert!(request.validate(&f.inventory).is_ok());
    }

    #[test]
    fn test_validate_reports_all_violations() {
        let f = fixture(2.0, &[10.0, 15.0]);
        let mut request = BuildRequest::new(&f.inventory, &f.project, 10).unwrap();
        request.set_lot_withdraw_amount(&f.lots[0], -1.0).unwrap();
        request.set_lot_withdraw_amount(&f.lots[1], 16.0).unwrap();
        request.set_add_builds_to_builds_part(true).unwrap();

        let violations = request.validate(&f.inventory).unwrap_err();
        assert_eq!(violations.len(), 4);
        assert!(violations.contains(&BuildViolation::NegativeAmount {
            lot: f.lots[0].clone(),
            amount: -1.0
        }));
        assert!(violations.contains(&BuildViolation::ExceedsStock {
            lot: f.lots[1].clone(),
            amount: 16.0,
            available: 15.0
        }));
        assert!(violations.contains(&BuildViolation::QuantityMismatch {
            part: f.part.clone(),
            needed: 20.0,
            planned: 15.0
        }));
        assert!(violations.contains(&BuildViolation::NoBuildsPart {
            container: f.project.clone()
        }));
        assert_eq!(request.state(), BuildRequestState::Adjusted);
    }

    #[test]
    fn test_insufficient_stock_fails_validation() {
        let f = fixture(2.0, &[5.0]);
        let mut request = BuildRequest::new(&f.inventory, &f.project, 10).unwrap();
        assert_eq!(request.lot_withdraw_amount(&f.lots[0]).unwrap(), 5.0);

        let violations = request.validate(&f.inventory).unwrap_err();
        assert_eq!(
            violations,
            vec![BuildViolation::QuantityMismatch {
                part: f.part.clone(),
                needed: 20.0,
                planned: 5.0
            }]
        );

        request.set_dont_check_quantity(true).unwrap();
        assert!(request.validate(&f.inventory).is_ok());
    }

    #[test]
    fn test_do_build_withdraws_with_comment() {
        let mut f = fixture(2.0, &[10.0, 15.0]);
        let mut request = BuildRequest::new(&f.inventory, &f.project, 10).unwrap();
        request.set_comment(Some("Batch 7".into())).unwrap();
        request.validate(&f.inventory).unwrap();

        let outcome = do_build(&mut request, &mut f.inventory).unwrap();
        assert_eq!(request.state(), BuildRequestState::Committed);
        assert_eq!(outcome.log.len(), 2);
        assert!(outcome.builds_lot.is_none());
        for entry in &outcome.log {
            assert_eq!(entry.action, StockAction::Withdraw);
            assert_eq!(entry.comment.as_deref(), Some("Batch 7 (Project build: Amplifier)"));
        }
        assert_eq!(amount(&f.inventory, &f.lots[0]), 0.0);
        assert_eq!(amount(&f.inventory, &f.lots[1]), 5.0);
        assert_eq!(f.inventory.pending_log().len(), 2);

        assert!(matches!(
            do_build(&mut request, &mut f.inventory),
            Err(BuildError::InvalidState { .. })
        ));
    }

    #[test]
    fn test_do_build_requires_validation() {
        let mut f = fixture(1.0, &[10.0]);
        let mut request = BuildRequest::new(&f.inventory, &f.project, 1).unwrap();
        assert!(matches!(
            do_build(&mut request, &mut f.inventory),
            Err(BuildError::InvalidState { .. })
        ));

        request.validate(&f.inventory).unwrap();
        request.set_lot_withdraw_amount(&f.lots[0], 1.0).unwrap();
        assert_eq!(request.state(), BuildRequestState::Adjusted);
        assert!(do_build(&mut request, &mut f.inventory).is_err());
        assert_eq!(amount(&f.inventory, &f.lots[0]), 10.0);
    }

    #[test]
    fn test_do_build_detects_changed_lot() {
        let mut f = fixture(2.0, &[10.0, 15.0]);
        let mut request = BuildRequest::new(&f.inventory, &f.project, 10).unwrap();
        request.validate(&f.inventory).unwrap();

        f.inventory
            .withdraw(&f.lots[1], 1.0, &ChangeOptions::default())
            .unwrap();

        let err = do_build(&mut request, &mut f.inventory).unwrap_err();
        assert_eq!(
            err,
            BuildError::Stock(StockError::VersionConflict {
                lot: f.lots[1].clone(),
                expected: 0,
                found: 1
            })
        );
        // nothing was withdrawn by the build
        assert_eq!(amount(&f.inventory, &f.lots[0]), 10.0);
        assert_eq!(amount(&f.inventory, &f.lots[1]), 14.0);
        assert_eq!(request.state(), BuildRequestState::Validated);
    }

    #[test]
    fn test_fractional_pieces_are_rejected_before_commit() {
        let mut f = fixture(4.0, &[10.0, 10.0]);
        let mut request = BuildRequest::new(&f.inventory, &f.project, 1).unwrap();
        request.set_lot_withdraw_amount(&f.lots[0], 3.6).unwrap();
        request.set_lot_withdraw_amount(&f.lots[1], 0.4).unwrap();

        let violations = request.validate(&f.inventory).unwrap_err();
        assert_eq!(
            violations,
            vec![
                BuildViolation::FractionalAmount {
                    lot: f.lots[0].clone(),
                    amount: 3.6
                },
                BuildViolation::FractionalAmount {
                    lot: f.lots[1].clone(),
                    amount: 0.4
                },
            ]
        );

        // force the request through; the commit must still refuse it whole
        request.state = BuildRequestState::Validated;
        let err = do_build(&mut request, &mut f.inventory).unwrap_err();
        assert_eq!(err, BuildError::Stock(StockError::InvalidAmount(3.6)));
        assert_eq!(amount(&f.inventory, &f.lots[0]), 10.0);
        assert_eq!(amount(&f.inventory, &f.lots[1]), 10.0);
        assert!(f.inventory.pending_log().is_empty());
        assert_eq!(request.state(), BuildRequestState::Validated);
    }

    #[test]
    fn test_float_part_accepts_fractional_plan() {
        let mut inventory = Inventory::in_memory("tester");
        let mut wire = Part::new("Solder wire", "tester")
            .with_unit(crate::entities::MeasurementUnit::new("Meters", Some("m".into()), false));
        let lots: Vec<EntityId> = [10.0, 10.0].iter().map(|a| wire.add_lot(PartLot::new(*a))).collect();
        let wire_id = inventory.insert_part(wire);
        let mut project = Project::new("Harness", "tester");
        project.add_entry(BomEntry::for_part(wire_id, 4.0));
        let project_id = inventory.insert_project(project);

        let mut request = BuildRequest::new(&inventory, &project_id, 1).unwrap();
        request.set_lot_withdraw_amount(&lots[0], 3.6).unwrap();
        request.set_lot_withdraw_amount(&lots[1], 0.4).unwrap();
        request.validate(&inventory).unwrap();
        do_build(&mut request, &mut inventory).unwrap();
        assert!((amount(&inventory, &lots[0]) - 6.4).abs() < 1e-9);
        assert!((amount(&inventory, &lots[1]) - 9.6).abs() < 1e-9);
    }

    #[test]
    fn test_do_build_checks_builds_lot_before_withdrawing() {
        let mut f = fixture(1.0, &[10.0]);
        let shelf = f.inventory.insert_location(StorageLocation::new("Shelf", "tester"));
        let mut built = Part::new("Amplifier (built)", "tester");
        let builds_lot = built.add_lot(PartLot::new(2.0).at_location(shelf.clone()));
        let builds_part = f.inventory.insert_part(built);
        f.inventory.project_mut(&f.project).unwrap().builds_part = Some(builds_part);

        let mut request = BuildRequest::new(&f.inventory, &f.project, 1).unwrap();
        request.set_add_builds_to_builds_part(true).unwrap();
        request.set_builds_part_lot(Some(builds_lot.clone())).unwrap();
        request.validate(&f.inventory).unwrap();

        f.inventory.location_mut(&shelf).unwrap().is_full = true;
        let err = do_build(&mut request, &mut f.inventory).unwrap_err();
        assert_eq!(err, BuildError::Stock(StockError::NotAddable(builds_lot)));
        assert_eq!(amount(&f.inventory, &f.lots[0]), 10.0);
        assert!(f.inventory.pending_log().is_empty());
    }

    #[test]
    fn test_do_build_adds_builds_to_new_lot() {
        let mut f = fixture(1.0, &[10.0]);
        let builds_part = f.inventory.insert_part(Part::new("Amplifier (built)", "tester"));
        f.inventory.project_mut(&f.project).unwrap().builds_part = Some(builds_part.clone());

        let mut request = BuildRequest::new(&f.inventory, &f.project, 3).unwrap();
        request.set_add_builds_to_builds_part(true).unwrap();
        request.validate(&f.inventory).unwrap();

        let outcome = do_build(&mut request, &mut f.inventory).unwrap();
        let lot = outcome.builds_lot.unwrap();
        assert_eq!(outcome.log.last().unwrap().action, StockAction::Add);
        assert_eq!(amount(&f.inventory, &lot), 3.0);
        assert_eq!(f.inventory.part(&builds_part).unwrap().amount_sum(), 3.0);
        assert_eq!(outcome.log.last().unwrap().comment.as_deref(), Some("Project build: Amplifier"));
    }

    #[test]
    fn test_builds_lot_must_be_addable() {
        let mut f = fixture(1.0, &[10.0]);
        let mut full = StorageLocation::new("Full shelf", "tester");
        full.is_full = true;
        let full_id = f.inventory.insert_location(full);

        let mut built = Part::new("Amplifier (built)", "tester");
        let builds_lot = built.add_lot(PartLot::new(2.0).at_location(full_id));
        let builds_part = f.inventory.insert_part(built);
        f.inventory.project_mut(&f.project).unwrap().builds_part = Some(builds_part);

        let mut request = BuildRequest::new(&f.inventory, &f.project, 1).unwrap();
        request.set_add_builds_to_builds_part(true).unwrap();
        request.set_builds_part_lot(Some(builds_lot.clone())).unwrap();
        assert_eq!(
            request.validate(&f.inventory).unwrap_err(),
            vec![BuildViolation::BuildsLotNotAddable { lot: builds_lot }]
        );

        request.set_builds_part_lot(Some(f.lots[0].clone())).unwrap();
        assert_eq!(
            request.validate(&f.inventory).unwrap_err(),
            vec![BuildViolation::BuildsLotWrongPart { lot: f.lots[0].clone() }]
        );
    }

    #[test]
    fn test_discard_closes_request() {
        let f = fixture(1.0, &[10.0]);
        let mut request = BuildRequest::new(&f.inventory, &f.project, 1).unwrap();
        request.discard().unwrap();
        assert_eq!(request.state(), BuildRequestState::Discarded);
        assert!(request.set_lot_withdraw_amount(&f.lots[0], 1.0).is_err());
        assert_eq!(
            request.validate(&f.inventory).unwrap_err(),
            vec![BuildViolation::Closed {
                state: BuildRequestState::Discarded
            }]
        );
    }

    #[test]
    fn test_invalid_construction() {
        let f = fixture(1.0, &[10.0]);
        assert_eq!(
            BuildRequest::new(&f.inventory, &f.project, 0).unwrap_err(),
            BuildError::InvalidBuildCount(0)
        );
        assert!(matches!(
            BuildRequest::new(&f.inventory, &f.part, 1),
            Err(BuildError::UnknownEntity(_))
        ));
    }

    #[test]
    fn test_integer_part_needs_whole_pieces() {
        let f = fixture(0.5, &[10.0]);
        let request = BuildRequest::new(&f.inventory, &f.project, 3).unwrap();
        let entry = &request.part_entries()[0];
        assert_eq!(request.needed_amount_for_entry(entry).unwrap(), 2.0);

        let manual = BomEntry::manual("PCB", 1.0);
        assert_eq!(
            request.needed_amount_for_entry(&manual).unwrap_err(),
            BuildError::EntryWithoutPart(manual.id.clone())
        );
    }
}
