//! `partdb build` command - Build capacity, planning and execution

use clap::Subcommand;
use console::style;
use miette::Result;
use serde::Serialize;

use crate::cli::helpers::{ok_mark, print_structured, Session, Table};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::identity::{EntityId, EntityPrefix};
use crate::core::stock_log::{StockAction, StockLogEntry};
use crate::core::store::Catalog;
use crate::stock::{do_build, BuildHelper, BuildRequest, NonBuildableEntry};

#[derive(Subcommand, Debug)]
pub enum BuildCommands {
    /// How many builds current stock allows, and what is short
    Check(CheckArgs),

    /// Show which lots a build would withdraw from
    Plan(PlanArgs),

    /// Build and withdraw the parts from stock
    Run(RunArgs),
}

#[derive(clap::Args, Debug)]
pub struct CheckArgs {
    /// Project or assembly (PRJ@N, ASM@N, ID or name)
    pub container: String,

    /// Number of builds to check for
    #[arg(long, short = 'n', default_value = "1")]
    pub builds: u64,
}

#[derive(clap::Args, Debug)]
pub struct PlanArgs {
    /// Project or assembly (PRJ@N, ASM@N, ID or name)
    pub container: String,

    /// Number of builds
    #[arg(long, short = 'n', default_value = "1")]
    pub builds: u64,

    /// Override the planned withdrawal of a lot (e.g., --take LOT@3=20)
    #[arg(long, value_name = "LOT=AMOUNT")]
    pub take: Vec<String>,
}

#[derive(clap::Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub plan: PlanArgs,

    /// Comment recorded with every stock change of the build
    #[arg(long, short = 'm')]
    pub comment: Option<String>,

    /// Add the finished builds to the builds part
    #[arg(long)]
    pub add_builds: bool,

    /// Lot of the builds part receiving the builds (default: a new lot)
    #[arg(long, requires = "add_builds")]
    pub builds_lot: Option<String>,

    /// Accept withdrawals that differ from the BOM quantities
    #[arg(long)]
    pub dont_check_quantity: bool,

    /// Validate and show the plan without changing stock
    #[arg(long)]
    pub dry_run: bool,
}

/// Serializable result of `build check`
#[derive(Serialize)]
struct CheckReport<'a> {
    container: &'a EntityId,
    name: &'a str,
    builds: u64,
    /// `None` when no BOM entry limits the builds
    max_builds: Option<u64>,
    buildable: bool,
    shortages: Vec<ShortageView<'a>>,
}

#[derive(Serialize)]
struct ShortageView<'a> {
    container: &'a EntityId,
    entry: &'a EntityId,
    part: &'a EntityId,
    needed: f64,
    available: f64,
}

impl<'a> From<&'a NonBuildableEntry> for ShortageView<'a> {
    fn from(s: &'a NonBuildableEntry) -> Self {
        Self {
            container: &s.container,
            entry: &s.entry,
            part: &s.part,
            needed: s.needed,
            available: s.available,
        }
    }
}

/// Serializable lot line of `build plan`
#[derive(Serialize)]
struct PlanLine<'a> {
    lot: &'a EntityId,
    part: &'a EntityId,
    planned: f64,
    available: f64,
    version: u32,
}

pub fn run(cmd: BuildCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        BuildCommands::Check(args) => run_check(args, global),
        BuildCommands::Plan(args) => run_plan(args, global),
        BuildCommands::Run(args) => run_build(args, global),
    }
}

/// Split "LOT=AMOUNT"
pub fn parse_take(input: &str) -> Result<(&str, f64)> {
    let (lot, amount) = input
        .split_once('=')
        .ok_or_else(|| miette::miette!("Invalid --take '{}'. Expected LOT=AMOUNT", input))?;
    let amount: f64 = amount
        .trim()
        .parse()
        .map_err(|_| miette::miette!("Invalid amount in --take '{}'", input))?;
    if lot.trim().is_empty() || !amount.is_finite() {
        return Err(miette::miette!("Invalid --take '{}'. Expected LOT=AMOUNT", input));
    }
    Ok((lot.trim(), amount))
}

fn part_name(session: &Session, id: &EntityId) -> String {
    session
        .inventory
        .part(id)
        .map(|p| p.name.clone())
        .unwrap_or_else(|| id.to_string())
}

fn format_amount(session: &Session, part: &EntityId, amount: f64) -> String {
    match session.inventory.part(part) {
        Some(part) => part.format_amount(amount),
        None => amount.to_string(),
    }
}

fn run_check(args: CheckArgs, global: &GlobalOpts) -> Result<()> {
    let session = Session::open(global)?;
    let id = session.resolve_container(&args.container)?;
    let container = session
        .inventory
        .container(&id)
        .ok_or_else(|| miette::miette!("{} not found", id))?;

    let helper = BuildHelper::new(&session.inventory);
    let capacity = helper.maximum_buildable_count(container)?;
    let shortages = helper.non_buildable_entries(container, args.builds)?;
    let buildable = shortages.is_empty();

    let report = CheckReport {
        container: &id,
        name: container.container_name(),
        builds: args.builds,
        max_builds: capacity.as_limit(),
        buildable,
        shortages: shortages.iter().map(ShortageView::from).collect(),
    };
    let format = session.format(global);
    if print_structured(format, &report)? {
        return Ok(());
    }

    if !global.quiet {
        println!(
            "{}: can be built {} time(s)",
            style(container.container_name()).yellow(),
            style(capacity).cyan()
        );
    }
    if buildable {
        if !global.quiet {
            println!("{} Enough stock for {} build(s)", ok_mark(), args.builds);
        }
        return Ok(());
    }

    if !global.quiet {
        println!(
            "{} Not enough stock for {} build(s):",
            style("✗").red(),
            args.builds
        );
    }
    let mut table = Table::new(&["PART", "NEEDED", "IN STOCK", "MISSING", "VIA"]);
    for shortage in &shortages {
        let via = if shortage.container == id {
            String::new()
        } else {
            session
                .inventory
                .container(&shortage.container)
                .map(|c| c.container_name().to_string())
                .unwrap_or_else(|| shortage.container.to_string())
        };
        table.row(vec![
            part_name(&session, &shortage.part),
            format_amount(&session, &shortage.part, shortage.needed),
            format_amount(&session, &shortage.part, shortage.available),
            format_amount(&session, &shortage.part, shortage.needed - shortage.available),
            via,
        ]);
    }
    table.print(format)?;
    Ok(())
}

/// Plan a request and apply the `--take` overrides
fn plan_request(session: &Session, args: &PlanArgs) -> Result<BuildRequest> {
    let id = session.resolve_container(&args.container)?;
    let mut request = BuildRequest::new(&session.inventory, &id, args.builds)?;
    for take in &args.take {
        let (lot, amount) = parse_take(take)?;
        let lot = session.resolve(EntityPrefix::Lot, lot)?;
        request.set_lot_withdraw_amount(&lot, amount)?;
    }
    Ok(request)
}

fn print_plan(session: &mut Session, request: &BuildRequest, format: OutputFormat) -> Result<()> {
    let lines: Vec<PlanLine> = request
        .lots()
        .iter()
        .map(|slot| PlanLine {
            lot: &slot.lot_id,
            part: &slot.part_id,
            planned: slot.planned,
            available: slot.available,
            version: slot.version,
        })
        .collect();
    if print_structured(format, &lines)? {
        return Ok(());
    }

    let lot_ids: Vec<EntityId> = request.lots().iter().map(|slot| slot.lot_id.clone()).collect();
    session.short_ids.ensure_all(lot_ids.iter());
    session.save_short_ids();

    println!(
        "{} build(s) of {}",
        style(request.number_of_builds()).cyan(),
        style(request.container_name()).yellow()
    );
    let mut table = Table::new(&["PART", "NEEDED", "LOT", "LOCATION", "IN STOCK", "TAKE"]);
    for entry in request.part_entries() {
        let Some(part) = &entry.part else { continue };
        let needed = request.needed_amount_for_entry(entry)?;
        let slots = request.lots_for_entry(entry);
        if slots.is_empty() {
            table.row(vec![
                part_name(session, part),
                format_amount(session, part, needed),
                "-".to_string(),
                String::new(),
                String::new(),
                String::new(),
            ]);
            continue;
        }
        for (i, slot) in slots.iter().enumerate() {
            let location = slot
                .storage_location
                .as_ref()
                .and_then(|loc| session.inventory.location(loc))
                .map(|l| l.name.clone())
                .unwrap_or_default();
            let mut stock = format_amount(session, part, slot.available);
            if slot.expired {
                stock.push_str(" (expired)");
            } else if !slot.withdrawable {
                stock.push_str(" (unavailable)");
            }
            table.row(vec![
                if i == 0 { part_name(session, part) } else { String::new() },
                if i == 0 { format_amount(session, part, needed) } else { String::new() },
                session.short_ids.display(&slot.lot_id),
                location,
                stock,
                format_amount(session, part, slot.planned),
            ]);
        }
    }
    table.print(format)?;
    Ok(())
}

fn run_plan(args: PlanArgs, global: &GlobalOpts) -> Result<()> {
    let mut session = Session::open(global)?;
    let mut request = plan_request(&session, &args)?;
    let format = session.format(global);
    print_plan(&mut session, &request, format)?;

    if matches!(format, OutputFormat::Json | OutputFormat::Yaml) {
        return Ok(());
    }
    match request.validate(&session.inventory) {
        Ok(()) => {
            if !global.quiet {
                println!("{} Plan is valid", ok_mark());
            }
        }
        Err(violations) => print_violations(&violations),
    }
    Ok(())
}

fn print_violations(violations: &[crate::stock::BuildViolation]) {
    eprintln!("{} The build cannot be committed:", style("✗").red());
    for violation in violations {
        eprintln!("   - {}", violation);
    }
}

fn run_build(args: RunArgs, global: &GlobalOpts) -> Result<()> {
    let mut session = Session::open(global)?;
    let mut request = plan_request(&session, &args.plan)?;

    request.set_comment(args.comment.clone())?;
    request.set_dont_check_quantity(args.dont_check_quantity)?;
    if args.add_builds {
        request.set_add_builds_to_builds_part(true)?;
        let lot = args
            .builds_lot
            .as_deref()
            .map(|lot| session.resolve(EntityPrefix::Lot, lot))
            .transpose()?;
        request.set_builds_part_lot(lot)?;
    }

    if let Err(violations) = request.validate(&session.inventory) {
        print_violations(&violations);
        return Err(miette::miette!(
            "Build of {} rejected ({} problem{})",
            request.container_name(),
            violations.len(),
            if violations.len() == 1 { "" } else { "s" }
        ));
    }

    let format = session.format(global);
    if args.dry_run {
        print_plan(&mut session, &request, format)?;
        if !global.quiet {
            println!("{} Dry run: nothing was withdrawn", ok_mark());
        }
        request.discard()?;
        return Ok(());
    }

    let outcome = do_build(&mut request, &mut session.inventory)?;
    session.commit()?;

    if format == OutputFormat::Json {
        println!(
            "{}",
            serde_json::to_string_pretty(&outcome.log).map_err(|e| miette::miette!("{}", e))?
        );
        return Ok(());
    }
    if global.quiet {
        return Ok(());
    }

    let ids: Vec<EntityId> = outcome.log.iter().map(|e| e.lot.clone()).collect();
    session.short_ids.ensure_all(ids.iter());
    session.save_short_ids();

    println!(
        "{} Built {} × {}",
        ok_mark(),
        style(request.number_of_builds()).cyan(),
        style(request.container_name()).yellow()
    );
    for entry in &outcome.log {
        print_change(&session, entry);
    }
    Ok(())
}

fn print_change(session: &Session, entry: &StockLogEntry) {
    let sign = match entry.action {
        StockAction::Withdraw => style("-").red(),
        _ => style("+").green(),
    };
    println!(
        "   {} {} {} ({} → {})",
        sign,
        format_amount(session, &entry.part, entry.amount),
        part_name(session, &entry.part),
        session.short_ids.display(&entry.lot),
        format_amount(session, &entry.part, entry.new_amount)
    );
}
