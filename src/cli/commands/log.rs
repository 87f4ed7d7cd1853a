//! `partdb log` command - Stock change history

use console::style;
use miette::Result;

use crate::cli::helpers::{print_structured, Session, Table};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::identity::{EntityId, EntityPrefix};
use crate::core::stock_log::{self, StockLogEntry};
use crate::core::store::Catalog;

#[derive(clap::Args, Debug)]
pub struct LogArgs {
    /// Only changes of this part
    #[arg(long, short = 'p')]
    pub part: Option<String>,

    /// Only changes touching this lot (as source or target)
    #[arg(long, short = 'l')]
    pub lot: Option<String>,

    /// Show only the most recent N changes
    #[arg(long, short = 'n')]
    pub limit: Option<usize>,
}

/// Does the entry involve the filters given
fn matches(entry: &StockLogEntry, part: Option<&EntityId>, lot: Option<&EntityId>) -> bool {
    part.map_or(true, |p| &entry.part == p)
        && lot.map_or(true, |l| &entry.lot == l || entry.target_lot.as_ref() == Some(l))
}

pub fn run(args: LogArgs, global: &GlobalOpts) -> Result<()> {
    let mut session = Session::open(global)?;
    let part = args
        .part
        .as_deref()
        .map(|p| session.resolve(EntityPrefix::Part, p))
        .transpose()?;
    // Deleted lots no longer resolve through the inventory, so accept raw IDs too
    let lot = match args.lot.as_deref() {
        Some(reference) => Some(
            session
                .resolve(EntityPrefix::Lot, reference)
                .or_else(|_| reference.parse::<EntityId>().map_err(|e| miette::miette!("{}", e)))?,
        ),
        None => None,
    };

    let entries = stock_log::read(&session.workspace.stock_log_path())?;
    let mut entries: Vec<StockLogEntry> = entries
        .into_iter()
        .filter(|e| matches(e, part.as_ref(), lot.as_ref()))
        .collect();
    if let Some(limit) = args.limit {
        let skip = entries.len().saturating_sub(limit);
        entries.drain(..skip);
    }

    let format = session.format(global);
    if print_structured(format, &entries)? {
        return Ok(());
    }
    if entries.is_empty() {
        println!("No stock changes recorded.");
        return Ok(());
    }

    let lot_ids: Vec<EntityId> = entries
        .iter()
        .flat_map(|e| std::iter::once(e.lot.clone()).chain(e.target_lot.clone()))
        .filter(|id| session.inventory.lot(id).is_some())
        .collect();
    session.short_ids.ensure_all(lot_ids.iter());

    let mut table = Table::new(&["TIME", "ACTION", "PART", "LOT", "AMOUNT", "NEW", "AUTHOR", "COMMENT"]);
    for entry in &entries {
        let part = session.inventory.part(&entry.part);
        let fmt = |amount: f64| match part {
            Some(part) => part.format_amount(amount),
            None => amount.to_string(),
        };
        let mut lot = session.short_ids.display(&entry.lot);
        if let Some(target) = &entry.target_lot {
            lot = format!("{} → {}", lot, session.short_ids.display(target));
        }
        table.row(vec![
            entry.timestamp.format("%Y-%m-%d %H:%M").to_string(),
            entry.action.to_string(),
            part.map(|p| p.name.clone()).unwrap_or_else(|| entry.part.to_string()),
            lot,
            fmt(entry.amount),
            fmt(entry.new_amount),
            entry.author.clone(),
            entry.comment.clone().unwrap_or_default(),
        ]);
    }
    table.print(format)?;
    if format == OutputFormat::Auto {
        println!();
        println!("{} change(s)", style(entries.len()).cyan());
    }

    session.save_short_ids();
    Ok(())
}
