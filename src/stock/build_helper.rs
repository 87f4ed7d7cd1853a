//! Build capacity of projects and assemblies
//!
//! Answers "how many times can this be built from current stock" and "which
//! entries are short for N builds". Only trusted stock counts (see
//! [`Part::amount_sum`](crate::entities::Part::amount_sum)). Sub-projects and
//! sub-assemblies are followed recursively; a container that (indirectly)
//! contains itself is reported as [`BuildError::Cycle`].

use std::fmt;

use crate::core::identity::EntityId;
use crate::core::store::Catalog;
use crate::entities::{BomContainer, BomEntry, BomEntryKind};
use crate::stock::error::BuildError;
use crate::stock::AMOUNT_EPSILON;

/// Maximum number of builds a container allows
///
/// `Unconstrained` sorts above every limit, so the weakest entry of a BOM is
/// simply the minimum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BuildCapacity {
    Limited(u64),
    /// No entry limits the count (only manual entries, or an empty BOM)
    Unconstrained,
}

impl BuildCapacity {
    /// Whether `builds` builds fit within this capacity
    pub fn covers(&self, builds: u64) -> bool {
        match self {
            BuildCapacity::Limited(max) => *max >= builds,
            BuildCapacity::Unconstrained => true,
        }
    }

    /// The limit, if there is one
    pub fn as_limit(&self) -> Option<u64> {
        match self {
            BuildCapacity::Limited(max) => Some(*max),
            BuildCapacity::Unconstrained => None,
        }
    }
}

impl fmt::Display for BuildCapacity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildCapacity::Limited(max) => write!(f, "{}", max),
            BuildCapacity::Unconstrained => write!(f, "unlimited"),
        }
    }
}

/// A part entry without enough stock for the requested builds
#[derive(Debug, Clone, PartialEq)]
pub struct NonBuildableEntry {
    /// Container owning the entry (may be a sub-build)
    pub container: EntityId,
    /// The BOM entry
    pub entry: EntityId,
    /// Part consumed by the entry
    pub part: EntityId,
    /// Amount required for the requested builds
    pub needed: f64,
    /// Trusted stock of the part
    pub available: f64,
}

/// Capacity queries against a catalog
pub struct BuildHelper<'a, C: Catalog + ?Sized> {
    catalog: &'a C,
}

/// `floor(amount / quantity)` tolerant of float noise, never negative
fn floor_div(amount: f64, quantity: f64) -> u64 {
    let ratio = amount / quantity + AMOUNT_EPSILON;
    if ratio <= 0.0 {
        0
    } else {
        ratio.floor() as u64
    }
}

pub(crate) fn check_quantity(entry: &BomEntry) -> Result<(), BuildError> {
    if entry.quantity > 0.0 && entry.quantity.is_finite() {
        Ok(())
    } else {
        Err(BuildError::NonPositiveQuantity {
            entry: entry.id.clone(),
            quantity: entry.quantity,
        })
    }
}

fn check_builds(builds: u64) -> Result<(), BuildError> {
    if builds == 0 {
        Err(BuildError::InvalidBuildCount(builds))
    } else {
        Ok(())
    }
}

/// Push `id` on the visiting path, failing if it is already on it
fn enter(path: &mut Vec<EntityId>, id: &EntityId) -> Result<(), BuildError> {
    if let Some(pos) = path.iter().position(|p| p == id) {
        let mut cycle = path[pos..].to_vec();
        cycle.push(id.clone());
        return Err(BuildError::Cycle(cycle));
    }
    path.push(id.clone());
    Ok(())
}

impl<'a, C: Catalog + ?Sized> BuildHelper<'a, C> {
    pub fn new(catalog: &'a C) -> Self {
        Self { catalog }
    }

    fn part_stock(&self, entry: &BomEntry) -> Result<(EntityId, f64), BuildError> {
        let part_id = entry
            .part
            .as_ref()
            .ok_or_else(|| BuildError::EntryWithoutPart(entry.id.clone()))?;
        check_quantity(entry)?;
        let part = self
            .catalog
            .part(part_id)
            .ok_or_else(|| BuildError::UnknownEntity(part_id.clone()))?;
        Ok((part_id.clone(), part.amount_sum()))
    }

    fn sub_container(&self, id: &EntityId) -> Result<&'a dyn BomContainer, BuildError> {
        self.catalog
            .container(id)
            .ok_or_else(|| BuildError::UnknownEntity(id.clone()))
    }

    /// How many builds the stock of a part entry allows
    pub fn maximum_buildable_count_for_entry(&self, entry: &BomEntry) -> Result<u64, BuildError> {
        let (_, available) = self.part_stock(entry)?;
        Ok(floor_div(available, entry.quantity))
    }

    /// How many builds of the container the current stock allows
    pub fn maximum_buildable_count(&self, container: &dyn BomContainer) -> Result<BuildCapacity, BuildError> {
        self.capacity(container, &mut Vec::new())
    }

    fn capacity(&self, container: &dyn BomContainer, path: &mut Vec<EntityId>) -> Result<BuildCapacity, BuildError> {
        enter(path, container.container_id())?;

        let mut capacity = BuildCapacity::Unconstrained;
        for entry in container.bom() {
            let limit = match entry.kind() {
                BomEntryKind::Manual => continue,
                BomEntryKind::Part(_) => BuildCapacity::Limited(self.maximum_buildable_count_for_entry(entry)?),
                BomEntryKind::Container(sub_id) => {
                    check_quantity(entry)?;
                    let sub = self.sub_container(sub_id)?;
                    match self.capacity(sub, path)? {
                        BuildCapacity::Limited(max) => BuildCapacity::Limited(floor_div(max as f64, entry.quantity)),
                        BuildCapacity::Unconstrained => BuildCapacity::Unconstrained,
                    }
                }
            };
            capacity = capacity.min(limit);
        }

        path.pop();
        Ok(capacity)
    }

    /// Whether the container can be built `builds` times
    pub fn is_buildable(&self, container: &dyn BomContainer, builds: u64) -> Result<bool, BuildError> {
        check_builds(builds)?;
        Ok(self.maximum_buildable_count(container)?.covers(builds))
    }

    /// Whether a part entry has enough stock for `builds` builds
    pub fn is_entry_buildable(&self, entry: &BomEntry, builds: u64) -> Result<bool, BuildError> {
        check_builds(builds)?;
        let (_, available) = self.part_stock(entry)?;
        Ok(available + AMOUNT_EPSILON >= entry.quantity * builds as f64)
    }

    /// Part entries short of stock for `builds` builds, sub-builds included
    pub fn non_buildable_entries(
        &self,
        container: &dyn BomContainer,
        builds: u64,
    ) -> Result<Vec<NonBuildableEntry>, BuildError> {
        check_builds(builds)?;
        let mut shortages = Vec::new();
        self.collect_shortages(container, builds, &mut Vec::new(), &mut shortages)?;
        Ok(shortages)
    }

    fn collect_shortages(
        &self,
        container: &dyn BomContainer,
        builds: u64,
        path: &mut Vec<EntityId>,
        out: &mut Vec<NonBuildableEntry>,
    ) -> Result<(), BuildError> {
        enter(path, container.container_id())?;

        for entry in container.bom() {
            match entry.kind() {
                BomEntryKind::Manual => {}
                BomEntryKind::Part(_) => {
                    let (part, available) = self.part_stock(entry)?;
                    let needed = entry.quantity * builds as f64;
                    if available + AMOUNT_EPSILON < needed {
                        out.push(NonBuildableEntry {
                            container: container.container_id().clone(),
                            entry: entry.id.clone(),
                            part,
                            needed,
                            available,
                        });
                    }
                }
                BomEntryKind::Container(sub_id) => {
                    check_quantity(entry)?;
                    let sub = self.sub_container(sub_id)?;
                    let sub_builds = (entry.quantity * builds as f64 - AMOUNT_EPSILON).ceil() as u64;
                    self.collect_shortages(sub, sub_builds.max(1), path, out)?;
                }
            }
        }

        path.pop();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::Inventory;
    use crate::entities::{Assembly, Part, PartLot, Project};

    fn stocked_part(inventory: &mut Inventory, name: &str, lots: &[f64]) -> EntityId {
        let mut part = Part::new(name, "tester");
        for amount in lots {
            part.add_lot(PartLot::new(*amount));
        }
        inventory.insert_part(part)
    }

    fn project_with(inventory: &mut Inventory, entries: Vec<BomEntry>) -> EntityId {
        let mut project = Project::new("Amplifier", "tester");
        for entry in entries {
            project.add_entry(entry);
        }
        inventory.insert_project(project)
    }

    #[test]
    fn test_entry_capacity_floors() {
        let mut inventory = Inventory::in_memory("tester");
        let part = stocked_part(&mut inventory, "R 10k", &[100.0, 25.0]);
        let helper = BuildHelper::new(&inventory);

        let entry = BomEntry::for_part(part, 10.0);
        assert_eq!(helper.maximum_buildable_count_for_entry(&entry).unwrap(), 12);
        assert!(helper.is_entry_buildable(&entry, 12).unwrap());
        assert!(!helper.is_entry_buildable(&entry, 13).unwrap());
    }

    #[test]
    fn test_weakest_entry_limits_container() {
        let mut inventory = Inventory::in_memory("tester");
        let a = stocked_part(&mut inventory, "A", &[4.0]);
        let b = stocked_part(&mut inventory, "B", &[125.0]);
        let prj = project_with(
            &mut inventory,
            vec![
                BomEntry::for_part(a, 2.0),
                BomEntry::for_part(b, 10.0),
                BomEntry::manual("PCB", 1.0),
            ],
        );

        let helper = BuildHelper::new(&inventory);
        let container = inventory.container(&prj).unwrap();
        assert_eq!(helper.maximum_buildable_count(container).unwrap(), BuildCapacity::Limited(2));
        assert!(helper.is_buildable(container, 2).unwrap());
        assert!(!helper.is_buildable(container, 3).unwrap());
    }

    #[test]
    fn test_zero_stock_builds_nothing() {
        let mut inventory = Inventory::in_memory("tester");
        let a = stocked_part(&mut inventory, "A", &[]);
        let prj = project_with(&mut inventory, vec![BomEntry::for_part(a, 1.0)]);

        let helper = BuildHelper::new(&inventory);
        let container = inventory.container(&prj).unwrap();
        assert_eq!(helper.maximum_buildable_count(container).unwrap(), BuildCapacity::Limited(0));
        assert!(!helper.is_buildable(container, 1).unwrap());
    }

    #[test]
    fn test_manual_only_bom_is_unconstrained() {
        let mut inventory = Inventory::in_memory("tester");
        let prj = project_with(&mut inventory, vec![BomEntry::manual("Case", 1.0)]);

        let helper = BuildHelper::new(&inventory);
        let container = inventory.container(&prj).unwrap();
        let capacity = helper.maximum_buildable_count(container).unwrap();
        assert_eq!(capacity, BuildCapacity::Unconstrained);
        assert_eq!(capacity.to_string(), "unlimited");
        assert!(helper.is_buildable(container, 1_000_000).unwrap());
        assert!(helper.non_buildable_entries(container, 50).unwrap().is_empty());
    }

    #[test]
    fn test_unknown_and_expired_stock_ignored() {
        let mut inventory = Inventory::in_memory("tester");
        let mut part = Part::new("Cap", "tester");
        part.add_lot(PartLot::new(10.0));
        part.add_lot(PartLot::new(50.0).with_unknown_instock());
        part.add_lot(PartLot::new(50.0).expiring(chrono::NaiveDate::from_ymd_opt(2000, 1, 1).unwrap()));
        let id = inventory.insert_part(part);

        let helper = BuildHelper::new(&inventory);
        let entry = BomEntry::for_part(id, 5.0);
        assert_eq!(helper.maximum_buildable_count_for_entry(&entry).unwrap(), 2);
    }

    #[test]
    fn test_sub_assembly_scales_capacity() {
        let mut inventory = Inventory::in_memory("tester");
        let x = stocked_part(&mut inventory, "X", &[10.0]);
        let y = stocked_part(&mut inventory, "Y", &[100.0]);

        let mut asm = Assembly::new("Power board", "tester");
        asm.add_entry(BomEntry::for_part(x.clone(), 3.0));
        let asm_id = inventory.insert_assembly(asm);

        let prj = project_with(
            &mut inventory,
            vec![
                BomEntry::for_part(y, 1.0),
                BomEntry::for_container(asm_id.clone(), 2.0),
            ],
        );

        let helper = BuildHelper::new(&inventory);
        let container = inventory.container(&prj).unwrap();
        // sub-assembly: floor(10 / 3) = 3, per build 2 => 1
        assert_eq!(helper.maximum_buildable_count(container).unwrap(), BuildCapacity::Limited(1));

        let shortages = helper.non_buildable_entries(container, 2).unwrap();
        assert_eq!(shortages.len(), 1);
        assert_eq!(shortages[0].container, asm_id);
        assert_eq!(shortages[0].part, x);
        assert_eq!(shortages[0].needed, 12.0);
        assert_eq!(shortages[0].available, 10.0);
    }

    #[test]
    fn test_non_buildable_entries_lists_short_parts() {
        let mut inventory = Inventory::in_memory("tester");
        let a = stocked_part(&mut inventory, "A", &[4.0]);
        let b = stocked_part(&mut inventory, "B", &[125.0]);
        let prj = project_with(
            &mut inventory,
            vec![BomEntry::for_part(a.clone(), 2.0), BomEntry::for_part(b, 10.0)],
        );

        let helper = BuildHelper::new(&inventory);
        let container = inventory.container(&prj).unwrap();
        assert!(helper.non_buildable_entries(container, 2).unwrap().is_empty());

        let shortages = helper.non_buildable_entries(container, 3).unwrap();
        assert_eq!(shortages.len(), 1);
        assert_eq!(shortages[0].part, a);
        assert_eq!(shortages[0].needed, 6.0);
    }

    #[test]
    fn test_cycle_is_reported() {
        let mut inventory = Inventory::in_memory("tester");
        let asm_a = Assembly::new("A", "tester");
        let asm_b = Assembly::new("B", "tester");
        let a_id = asm_a.id.clone();
        let b_id = asm_b.id.clone();
        inventory.insert_assembly(asm_a);
        inventory.insert_assembly(asm_b);
        inventory
            .assembly_mut(&a_id)
            .unwrap()
            .add_entry(BomEntry::for_container(b_id.clone(), 1.0));
        inventory
            .assembly_mut(&b_id)
            .unwrap()
            .add_entry(BomEntry::for_container(a_id.clone(), 1.0));

        let helper = BuildHelper::new(&inventory);
        let container = inventory.container(&a_id).unwrap();
        let err = helper.maximum_buildable_count(container).unwrap_err();
        assert_eq!(err, BuildError::Cycle(vec![a_id.clone(), b_id, a_id]));
        assert!(matches!(
            helper.non_buildable_entries(container, 1),
            Err(BuildError::Cycle(_))
        ));
    }

    #[test]
    fn test_invalid_arguments() {
        let mut inventory = Inventory::in_memory("tester");
        let a = stocked_part(&mut inventory, "A", &[4.0]);
        let prj = project_with(&mut inventory, vec![BomEntry::for_part(a.clone(), 1.0)]);
        let helper = BuildHelper::new(&inventory);
        let container = inventory.container(&prj).unwrap();

        assert_eq!(
            helper.is_buildable(container, 0).unwrap_err(),
            BuildError::InvalidBuildCount(0)
        );

        let manual = BomEntry::manual("PCB", 1.0);
        assert_eq!(
            helper.maximum_buildable_count_for_entry(&manual).unwrap_err(),
            BuildError::EntryWithoutPart(manual.id.clone())
        );

        let zero = BomEntry::for_part(a, 0.0);
        assert!(matches!(
            helper.maximum_buildable_count_for_entry(&zero),
            Err(BuildError::NonPositiveQuantity { .. })
        ));
    }
}
