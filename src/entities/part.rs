//! Part entity - a catalog entry with its stock lots

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::core::entity::Entity;
use crate::core::identity::{EntityId, EntityPrefix};

/// Unit a part's stock is counted in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementUnit {
    /// Unit name (e.g., "Meters")
    pub name: String,

    /// Unit symbol (e.g., "m")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,

    /// Only whole amounts can be stored
    #[serde(default)]
    pub is_integer: bool,
}

impl MeasurementUnit {
    /// Create a new unit
    pub fn new(name: impl Into<String>, symbol: Option<String>, is_integer: bool) -> Self {
        Self {
            name: name.into(),
            symbol,
            is_integer,
        }
    }
}

/// A quantity of a part stored at one place
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartLot {
    /// Unique identifier (LOT-...)
    pub id: EntityId,

    /// Short description (e.g., "Reel from 2024 order")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Stored amount, never negative
    #[serde(default)]
    pub amount: f64,

    /// Storage location (LOC-...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_location: Option<EntityId>,

    /// Date after which the stock must not be counted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<NaiveDate>,

    /// The stored amount is not known and must not be trusted
    #[serde(default)]
    pub instock_unknown: bool,

    /// Lot should be refilled
    #[serde(default)]
    pub needs_refill: bool,

    /// Free-text comment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,

    /// Incremented on every stock change; used to detect concurrent edits
    #[serde(default)]
    pub version: u32,
}

impl PartLot {
    /// Create a new lot holding `amount`
    pub fn new(amount: f64) -> Self {
        Self {
            id: EntityId::new(EntityPrefix::Lot),
            description: None,
            amount,
            storage_location: None,
            expiration_date: None,
            instock_unknown: false,
            needs_refill: false,
            comment: None,
            version: 0,
        }
    }

    /// Builder: place the lot at a storage location
    pub fn at_location(mut self, location: EntityId) -> Self {
        self.storage_location = Some(location);
        self
    }

    /// Builder: mark the lot's amount as unknown
    pub fn with_unknown_instock(mut self) -> Self {
        self.instock_unknown = true;
        self
    }

    /// Builder: set an expiration date
    pub fn expiring(mut self, date: NaiveDate) -> Self {
        self.expiration_date = Some(date);
        self
    }

    /// Whether the lot is expired on the given day
    pub fn is_expired_on(&self, today: NaiveDate) -> bool {
        self.expiration_date.is_some_and(|date| date < today)
    }

    /// Whether the lot is expired today
    pub fn is_expired(&self) -> bool {
        self.is_expired_on(Utc::now().date_naive())
    }
}

/// Part entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Part {
    /// Unique identifier (PART-...)
    pub id: EntityId,

    /// Part name
    pub name: String,

    /// Detailed description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Category (e.g., "Resistors")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    /// Measurement unit; parts without one are counted in pieces
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<MeasurementUnit>,

    /// Stock lots, in insertion order
    #[serde(default)]
    pub lots: Vec<PartLot>,

    /// Classification tags
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

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

impl Entity for Part {
    const PREFIX: EntityPrefix = EntityPrefix::Part;

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

impl Part {
    /// Create a new part without stock
    pub fn new(name: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            id: EntityId::new(EntityPrefix::Part),
            name: name.into(),
            description: None,
            category: None,
            unit: None,
            lots: Vec::new(),
            tags: Vec::new(),
            created: Utc::now(),
            author: author.into(),
            entity_revision: 1,
        }
    }

    /// Builder: set the measurement unit
    pub fn with_unit(mut self, unit: MeasurementUnit) -> Self {
        self.unit = Some(unit);
        self
    }

    /// Whether amounts of this part may be fractional
    pub fn use_float_amount(&self) -> bool {
        self.unit.as_ref().is_some_and(|u| !u.is_integer)
    }

    /// Round an amount according to the part's unit
    pub fn round_amount(&self, amount: f64) -> f64 {
        if self.use_float_amount() {
            amount
        } else {
            amount.round()
        }
    }

    /// Total trusted stock: lots with unknown or expired stock are not counted
    pub fn amount_sum(&self) -> f64 {
        let today = Utc::now().date_naive();
        let sum: f64 = self
            .lots
            .iter()
            .filter(|lot| !lot.instock_unknown && !lot.is_expired_on(today))
            .map(|lot| lot.amount)
            .sum();
        self.round_amount(sum)
    }

    /// Whether any lot's stock is unknown
    pub fn has_unknown_stock(&self) -> bool {
        self.lots.iter().any(|lot| lot.instock_unknown)
    }

    /// Look up a lot by ID
    pub fn lot(&self, id: &EntityId) -> Option<&PartLot> {
        self.lots.iter().find(|lot| &lot.id == id)
    }

    /// Look up a lot by ID for modification
    pub fn lot_mut(&mut self, id: &EntityId) -> Option<&mut PartLot> {
        self.lots.iter_mut().find(|lot| &lot.id == id)
    }

    /// Append a lot and return its ID
    pub fn add_lot(&mut self, lot: PartLot) -> EntityId {
        let id = lot.id.clone();
        self.lots.push(lot);
        id
    }

    /// Remove a lot, returning it if it existed
    pub fn remove_lot(&mut self, id: &EntityId) -> Option<PartLot> {
        let pos = self.lots.iter().position(|lot| &lot.id == id)?;
        Some(self.lots.remove(pos))
    }

    /// Format an amount with the part's unit symbol
    pub fn format_amount(&self, amount: f64) -> String {
        let number = if self.use_float_amount() {
            format!("{}", amount)
        } else {
            format!("{}", amount.round() as i64)
        };
        match self.unit.as_ref().and_then(|u| u.symbol.as_deref()) {
            Some(symbol) => format!("{} {}", number, symbol),
            None => number,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn float_part() -> Part {
        Part::new("Wire", "tester").with_unit(MeasurementUnit::new("Meters", Some("m".into()), false))
    }

    #[test]
    fn test_amount_sum_adds_lots() {
        let mut part = Part::new("R 10k", "tester");
        part.add_lot(PartLot::new(10.0));
        part.add_lot(PartLot::new(20.0));
        assert_eq!(part.amount_sum(), 30.0);
    }

    #[test]
    fn test_amount_sum_skips_unknown_and_expired() {
        let mut part = Part::new("C 100n", "tester");
        part.add_lot(PartLot::new(10.0));
        part.add_lot(PartLot::new(50.0).with_unknown_instock());
        part.add_lot(PartLot::new(5.0).expiring(NaiveDate::from_ymd_opt(2000, 1, 1).unwrap()));
        part.add_lot(PartLot::new(7.0).expiring(NaiveDate::from_ymd_opt(9999, 1, 1).unwrap()));
        assert_eq!(part.amount_sum(), 17.0);
        assert!(part.has_unknown_stock());
    }

    #[test]
    fn test_integer_parts_round() {
        let part = Part::new("LED", "tester");
        assert!(!part.use_float_amount());
        assert_eq!(part.round_amount(2.6), 3.0);

        let wire = float_part();
        assert!(wire.use_float_amount());
        assert_eq!(wire.round_amount(2.6), 2.6);
        assert_eq!(wire.format_amount(1.5), "1.5 m");
    }

    #[test]
    fn test_lot_lookup_and_removal() {
        let mut part = Part::new("Fuse", "tester");
        let id = part.add_lot(PartLot::new(3.0));
        assert_eq!(part.lot(&id).map(|l| l.amount), Some(3.0));

        part.lot_mut(&id).unwrap().amount = 4.0;
        let removed = part.remove_lot(&id).unwrap();
        assert_eq!(removed.amount, 4.0);
        assert!(part.lot(&id).is_none());
    }

    #[test]
    fn test_part_deserialization() {
        let yaml = r#"
id: PART-01HC2JB7SMQX7RS1Y0GFKBHPTD
name: "ATmega328P"
unit:
  name: Pieces
  is_integer: true
lots:
  - id: LOT-01HC2JB7SMQX7RS1Y0GFKBHPTE
    amount: 12
    instock_unknown: false
  - id: LOT-01HC2JB7SMQX7RS1Y0GFKBHPTF
    amount: 3
    version: 4
created: 2024-01-15T10:00:00Z
author: "Test Author"
"#;
        let part: Part = serde_yml::from_str(yaml).unwrap();
        assert_eq!(part.name, "ATmega328P");
        assert_eq!(part.lots.len(), 2);
        assert_eq!(part.lots[1].version, 4);
        assert_eq!(part.amount_sum(), 15.0);
        assert_eq!(part.entity_revision, 1);
    }
}
