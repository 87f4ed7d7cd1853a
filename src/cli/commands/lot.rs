//! `partdb lot` command - Part lot and stock management

use chrono::NaiveDate;
use clap::Subcommand;
use console::style;
use miette::Result;
use serde::Serialize;

use crate::cli::helpers::{ok_mark, print_structured, print_summary, Session, Table};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::identity::{EntityId, EntityPrefix};
use crate::core::stock_log::StockLogEntry;
use crate::core::store::{Catalog, StockStore};
use crate::entities::{Part, PartLot};
use crate::stock::ChangeOptions;

#[derive(Subcommand, Debug)]
pub enum LotCommands {
    /// Create a new lot for a part
    New(NewArgs),

    /// List lots
    List(ListArgs),

    /// Take stock out of a lot
    Withdraw(WithdrawArgs),

    /// Put stock into a lot
    Add(AddArgs),

    /// Move stock between two lots of the same part
    Move(MoveArgs),
}

#[derive(clap::Args, Debug)]
pub struct NewArgs {
    /// Part ID, short ID (PART@N) or name
    pub part: String,

    /// Initial amount
    #[arg(long, short = 'a', default_value = "0")]
    pub amount: f64,

    /// Storage location ID, short ID (LOC@N) or name
    #[arg(long, short = 'l')]
    pub location: Option<String>,

    /// The amount in stock is not known
    #[arg(long)]
    pub unknown: bool,

    /// Expiration date (YYYY-MM-DD)
    #[arg(long)]
    pub expires: Option<NaiveDate>,

    /// Description
    #[arg(long, short = 'd')]
    pub description: Option<String>,

    /// Mark the lot as needing a refill
    #[arg(long)]
    pub needs_refill: bool,
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Only lots of this part
    #[arg(long, short = 'p')]
    pub part: Option<String>,

    /// Only lots in this storage location
    #[arg(long, short = 'l')]
    pub location: Option<String>,

    /// Show only count
    #[arg(long)]
    pub count: bool,
}

/// Options shared by all stock changes
#[derive(clap::Args, Debug)]
pub struct ChangeArgs {
    /// Comment recorded in the stock log
    #[arg(long, short = 'm')]
    pub comment: Option<String>,

    /// Fail unless the lot is still at this version
    #[arg(long)]
    pub expect_version: Option<u32>,
}

#[derive(clap::Args, Debug)]
pub struct WithdrawArgs {
    /// Lot ID or short ID (LOT@N)
    pub lot: String,

    /// Amount to withdraw
    pub amount: f64,

    #[command(flatten)]
    pub change: ChangeArgs,

    /// Delete the lot if it becomes empty
    #[arg(long)]
    pub delete_if_empty: bool,
}

#[derive(clap::Args, Debug)]
pub struct AddArgs {
    /// Lot ID or short ID (LOT@N)
    pub lot: String,

    /// Amount to add
    pub amount: f64,

    #[command(flatten)]
    pub change: ChangeArgs,
}

#[derive(clap::Args, Debug)]
pub struct MoveArgs {
    /// Source lot ID or short ID
    pub source: String,

    /// Target lot ID or short ID
    pub target: String,

    /// Amount to move
    pub amount: f64,

    #[command(flatten)]
    pub change: ChangeArgs,

    /// Delete the source lot if it becomes empty
    #[arg(long)]
    pub delete_if_empty: bool,
}

impl ChangeArgs {
    fn options(&self, delete_lot_if_empty: bool) -> ChangeOptions {
        ChangeOptions {
            comment: self.comment.clone(),
            expected_version: self.expect_version,
            delete_lot_if_empty,
        }
    }
}

/// A lot together with the part it belongs to
#[derive(Serialize)]
struct LotView<'a> {
    part: &'a EntityId,
    part_name: &'a str,
    #[serde(flatten)]
    lot: &'a PartLot,
}

pub fn run(cmd: LotCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        LotCommands::New(args) => run_new(args, global),
        LotCommands::List(args) => run_list(args, global),
        LotCommands::Withdraw(args) => run_withdraw(args, global),
        LotCommands::Add(args) => run_add(args, global),
        LotCommands::Move(args) => run_move(args, global),
    }
}

fn run_new(args: NewArgs, global: &GlobalOpts) -> Result<()> {
    let mut session = Session::open(global)?;
    let part_id = session.resolve(EntityPrefix::Part, &args.part)?;
    let location = args
        .location
        .as_deref()
        .map(|loc| session.resolve(EntityPrefix::Loc, loc))
        .transpose()?;

    if args.amount < 0.0 || !args.amount.is_finite() {
        return Err(miette::miette!("Amount must not be negative (got {})", args.amount));
    }
    let amount = session
        .inventory
        .part(&part_id)
        .map(|p| p.round_amount(args.amount))
        .unwrap_or(args.amount);

    let mut lot = PartLot::new(amount);
    lot.storage_location = location;
    lot.instock_unknown = args.unknown;
    lot.expiration_date = args.expires;
    lot.description = args.description;
    lot.needs_refill = args.needs_refill;

    let lot_id = session.inventory.create_lot(&part_id, lot)?;
    let short_id = session.short(&lot_id);
    session.commit()?;

    if global.format == OutputFormat::Id {
        println!("{}", lot_id);
    } else if !global.quiet {
        let part = session.inventory.part(&part_id);
        println!(
            "{} Created lot {} for {}",
            ok_mark(),
            style(&short_id).cyan(),
            style(part.map(|p| p.name.as_str()).unwrap_or_default()).yellow()
        );
        if let Some(part) = part {
            let shown = if args.unknown {
                "unknown".to_string()
            } else {
                part.format_amount(amount)
            };
            println!("   {} | amount {}", style(&lot_id).dim(), shown);
        }
    }
    Ok(())
}

fn run_list(args: ListArgs, global: &GlobalOpts) -> Result<()> {
    let mut session = Session::open(global)?;
    let part_filter = args
        .part
        .as_deref()
        .map(|p| session.resolve(EntityPrefix::Part, p))
        .transpose()?;
    let location_filter = args
        .location
        .as_deref()
        .map(|l| session.resolve(EntityPrefix::Loc, l))
        .transpose()?;

    let mut parts: Vec<&Part> = session
        .inventory
        .parts()
        .filter(|p| part_filter.as_ref().map_or(true, |id| &p.id == id))
        .collect();
    parts.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));

    let views: Vec<LotView> = parts
        .iter()
        .copied()
        .flat_map(|part| {
            part.lots.iter().map(move |lot| LotView {
                part: &part.id,
                part_name: &part.name,
                lot,
            })
        })
        .filter(|view| match &location_filter {
            Some(loc) => view.lot.storage_location.as_ref() == Some(loc),
            None => true,
        })
        .collect();

    if args.count {
        println!("{}", views.len());
        return Ok(());
    }

    let format = session.format(global);
    if print_structured(format, &views)? {
        return Ok(());
    }
    if views.is_empty() {
        println!("No lots found.");
        return Ok(());
    }

    let ids: Vec<EntityId> = views.iter().map(|v| v.lot.id.clone()).collect();
    session.short_ids.ensure_all(ids.iter());

    let mut table = Table::new(&["SHORT", "ID", "PART", "AMOUNT", "LOCATION", "EXPIRES", "VERSION"]);
    for view in &views {
        let part = session.inventory.part(view.part);
        let amount = match part {
            _ if view.lot.instock_unknown => "?".to_string(),
            Some(part) => part.format_amount(view.lot.amount),
            None => view.lot.amount.to_string(),
        };
        let location = view
            .lot
            .storage_location
            .as_ref()
            .and_then(|id| session.inventory.location(id))
            .map(|l| l.name.clone())
            .unwrap_or_default();
        let mut expires = view.lot.expiration_date.map(|d| d.to_string()).unwrap_or_default();
        if view.lot.is_expired() {
            expires.push_str(" (expired)");
        }
        table.row(vec![
            session.short_ids.display(&view.lot.id),
            view.lot.id.to_string(),
            view.part_name.to_string(),
            amount,
            location,
            expires,
            view.lot.version.to_string(),
        ]);
    }
    table.print(format)?;
    if format == OutputFormat::Auto {
        print_summary(table.len(), "lot");
    }

    session.save_short_ids();
    Ok(())
}

fn delete_if_empty(session: &Session, flag: bool) -> bool {
    flag || session.config.delete_empty_lots()
}

fn run_withdraw(args: WithdrawArgs, global: &GlobalOpts) -> Result<()> {
    let mut session = Session::open(global)?;
    let lot = session.resolve(EntityPrefix::Lot, &args.lot)?;
    let options = args.change.options(delete_if_empty(&session, args.delete_if_empty));

    let entry = session.inventory.withdraw(&lot, args.amount, &options)?;
    session.commit()?;
    report(&session, global, "Withdrew", &entry);
    Ok(())
}

fn run_add(args: AddArgs, global: &GlobalOpts) -> Result<()> {
    let mut session = Session::open(global)?;
    let lot = session.resolve(EntityPrefix::Lot, &args.lot)?;
    let options = args.change.options(false);

    let entry = session.inventory.add(&lot, args.amount, &options)?;
    session.commit()?;
    report(&session, global, "Added", &entry);
    Ok(())
}

fn run_move(args: MoveArgs, global: &GlobalOpts) -> Result<()> {
    let mut session = Session::open(global)?;
    let source = session.resolve(EntityPrefix::Lot, &args.source)?;
    let target = session.resolve(EntityPrefix::Lot, &args.target)?;
    let options = args.change.options(delete_if_empty(&session, args.delete_if_empty));

    let entry = session
        .inventory
        .move_stock(&source, &target, args.amount, &options)?;
    session.commit()?;
    report(&session, global, "Moved", &entry);
    Ok(())
}

fn report(session: &Session, global: &GlobalOpts, verb: &str, entry: &StockLogEntry) {
    if global.quiet {
        return;
    }
    if global.format == OutputFormat::Json {
        if let Ok(json) = serde_json::to_string_pretty(entry) {
            println!("{}", json);
        }
        return;
    }

    let part = session.inventory.part(&entry.part);
    let fmt = |amount: f64| match part {
        Some(part) => part.format_amount(amount),
        None => amount.to_string(),
    };
    let lot = session.short_ids.display(&entry.lot);
    let target = entry
        .target_lot
        .as_ref()
        .map(|t| format!(" to {}", session.short_ids.display(t)))
        .unwrap_or_default();

    println!(
        "{} {} {} {} {}{}",
        ok_mark(),
        verb,
        style(fmt(entry.amount)).cyan(),
        if entry.target_lot.is_some() { "from" } else { "on" },
        style(&lot).cyan(),
        target
    );
    println!(
        "   {} → {} | part total {}",
        fmt(entry.old_amount),
        fmt(entry.new_amount),
        style(fmt(entry.new_total)).yellow()
    );
    if entry.lot_deleted {
        println!("   {} lot {} was empty and has been removed", style("→").dim(), lot);
    }
}
