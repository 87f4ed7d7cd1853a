//! Stock change log
//!
//! Every withdraw/add/move produces one [`StockLogEntry`]. Entries are kept in
//! memory until the inventory is flushed and then appended to
//! `.partdb/stock.log` as JSON Lines.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use crate::core::identity::EntityId;
use crate::core::store::StoreError;

/// Kind of stock change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockAction {
    Withdraw,
    Add,
    Move,
}

impl std::fmt::Display for StockAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StockAction::Withdraw => write!(f, "withdraw"),
            StockAction::Add => write!(f, "add"),
            StockAction::Move => write!(f, "move"),
        }
    }
}

/// One recorded stock change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockLogEntry {
    /// When the change happened
    pub timestamp: DateTime<Utc>,

    /// Who made the change (filled in by the inventory)
    #[serde(default)]
    pub author: String,

    /// What happened
    pub action: StockAction,

    /// Part whose stock changed
    pub part: EntityId,

    /// Lot that was changed (source lot for moves)
    pub lot: EntityId,

    /// Target lot of a move
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_lot: Option<EntityId>,

    /// Changed amount (always positive)
    pub amount: f64,

    /// Lot amount before the change
    pub old_amount: f64,

    /// Lot amount after the change
    pub new_amount: f64,

    /// Part total after the change
    pub new_total: f64,

    /// The lot was removed because it became empty
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub lot_deleted: bool,

    /// User comment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// Append entries to a JSON Lines log file
pub fn append(path: &Path, entries: &[StockLogEntry]) -> Result<(), StoreError> {
    if entries.is_empty() {
        return Ok(());
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| StoreError::io(path, e))?;

    for entry in entries {
        let line = serde_json::to_string(entry).map_err(|e| StoreError::Serialize {
            what: "stock log entry".to_string(),
            message: e.to_string(),
        })?;
        writeln!(file, "{}", line).map_err(|e| StoreError::io(path, e))?;
    }

    Ok(())
}

/// Read all entries of a log file (a missing file is an empty log)
pub fn read(path: &Path) -> Result<Vec<StockLogEntry>, StoreError> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let content = fs::read_to_string(path).map_err(|e| StoreError::io(path, e))?;
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line).map_err(|e| StoreError::Log {
                line: i + 1,
                message: e.to_string(),
            })
        })
        .collect()
}
