//! `partdb part` command - Part management

use clap::Subcommand;
use console::style;
use miette::Result;

use crate::cli::helpers::{ok_mark, print_structured, print_summary, truncate_str, Session, Table};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::identity::EntityPrefix;
use crate::core::store::Catalog;
use crate::entities::{MeasurementUnit, Part};

#[derive(Subcommand, Debug)]
pub enum PartCommands {
    /// Create a new part
    New(NewArgs),

    /// List parts with their trusted stock
    List(ListArgs),

    /// Show a part with its lots
    Show(ShowArgs),
}

#[derive(clap::Args, Debug)]
pub struct NewArgs {
    /// Part name
    pub name: String,

    /// Description
    #[arg(long, short = 'd')]
    pub description: Option<String>,

    /// Category (e.g., "Resistors")
    #[arg(long, short = 'c')]
    pub category: Option<String>,

    /// Measurement unit name (e.g., "Meters"); parts without one are counted in pieces
    #[arg(long, short = 'u')]
    pub unit: Option<String>,

    /// Unit symbol (e.g., "m")
    #[arg(long, requires = "unit")]
    pub symbol: Option<String>,

    /// Allow fractional amounts for the unit
    #[arg(long, requires = "unit")]
    pub float: bool,

    /// Tags (comma-separated)
    #[arg(long, short = 't', value_delimiter = ',')]
    pub tags: Vec<String>,
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Search in name, category and description
    #[arg(long)]
    pub search: Option<String>,

    /// Filter by category
    #[arg(long, short = 'c')]
    pub category: Option<String>,

    /// Only parts without trusted stock
    #[arg(long)]
    pub empty: bool,

    /// Limit number of results
    #[arg(long, short = 'n')]
    pub limit: Option<usize>,

    /// Show only count
    #[arg(long)]
    pub count: bool,
}

#[derive(clap::Args, Debug)]
pub struct ShowArgs {
    /// Part ID, short ID (PART@N) or name
    pub id: String,
}

pub fn run(cmd: PartCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        PartCommands::New(args) => run_new(args, global),
        PartCommands::List(args) => run_list(args, global),
        PartCommands::Show(args) => run_show(args, global),
    }
}

fn run_new(args: NewArgs, global: &GlobalOpts) -> Result<()> {
    let mut session = Session::open(global)?;

    let mut part = Part::new(&args.name, session.config.author());
    part.description = args.description;
    part.category = args.category;
    part.tags = args.tags;
    if let Some(unit) = args.unit {
        part = part.with_unit(MeasurementUnit::new(unit, args.symbol, !args.float));
    }

    let id = session.inventory.insert_part(part);
    let short_id = session.short(&id);
    session.commit()?;

    if global.format == OutputFormat::Id {
        println!("{}", id);
    } else if !global.quiet {
        println!("{} Created part {}", ok_mark(), style(&short_id).cyan());
        println!("   {} | {}", style(&id).dim(), style(&args.name).yellow());
    }
    Ok(())
}

fn run_list(args: ListArgs, global: &GlobalOpts) -> Result<()> {
    let mut session = Session::open(global)?;

    let search = args.search.as_ref().map(|s| s.to_lowercase());
    let mut parts: Vec<&Part> = session
        .inventory
        .parts()
        .filter(|p| match &args.category {
            Some(category) => p.category.as_deref().is_some_and(|c| c.eq_ignore_ascii_case(category)),
            None => true,
        })
        .filter(|p| match &search {
            Some(search) => {
                p.name.to_lowercase().contains(search)
                    || p.category.as_ref().is_some_and(|c| c.to_lowercase().contains(search))
                    || p.description.as_ref().is_some_and(|d| d.to_lowercase().contains(search))
            }
            None => true,
        })
        .filter(|p| !args.empty || p.amount_sum() <= 0.0)
        .collect();

    parts.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
    if let Some(limit) = args.limit {
        parts.truncate(limit);
    }

    if args.count {
        println!("{}", parts.len());
        return Ok(());
    }

    let format = session.format(global);
    if print_structured(format, &parts)? {
        return Ok(());
    }
    if parts.is_empty() {
        println!("No parts found.");
        return Ok(());
    }

    let ids: Vec<_> = parts.iter().map(|p| p.id.clone()).collect();
    session.short_ids.ensure_all(ids.iter());

    let mut table = Table::new(&["SHORT", "ID", "NAME", "CATEGORY", "STOCK", "LOTS"]);
    for part in &parts {
        let mut stock = part.format_amount(part.amount_sum());
        if part.has_unknown_stock() {
            stock.push_str(" +?");
        }
        table.row(vec![
            session.short_ids.display(&part.id),
            part.id.to_string(),
            truncate_str(&part.name, 40),
            part.category.clone().unwrap_or_default(),
            stock,
            part.lots.len().to_string(),
        ]);
    }
    table.print(format)?;
    if format == OutputFormat::Auto {
        print_summary(table.len(), "part");
    }

    session.save_short_ids();
    Ok(())
}

fn run_show(args: ShowArgs, global: &GlobalOpts) -> Result<()> {
    let mut session = Session::open(global)?;
    let id = session.resolve(EntityPrefix::Part, &args.id)?;
    let lot_ids: Vec<_> = match session.inventory.part(&id) {
        Some(part) => part.lots.iter().map(|l| l.id.clone()).collect(),
        None => return Err(miette::miette!("No part found matching '{}'", args.id)),
    };
    session.short_ids.ensure_all(lot_ids.iter());
    session.save_short_ids();

    let part = session
        .inventory
        .part(&id)
        .ok_or_else(|| miette::miette!("No part found matching '{}'", args.id))?;

    let format = match session.format(global) {
        OutputFormat::Auto => OutputFormat::Tsv,
        f => f,
    };
    if print_structured(format, part)? {
        return Ok(());
    }
    if format == OutputFormat::Id {
        println!("{}", part.id);
        return Ok(());
    }

    println!("{}", style("─".repeat(60)).dim());
    println!("{}: {}", style("ID").bold(), style(&part.id).cyan());
    println!("{}: {}", style("Name").bold(), style(&part.name).yellow());
    if let Some(ref category) = part.category {
        println!("{}: {}", style("Category").bold(), category);
    }
    let unit = match &part.unit {
        Some(unit) if unit.is_integer => format!("{} (whole numbers)", unit.name),
        Some(unit) => unit.name.clone(),
        None => "pieces".to_string(),
    };
    println!("{}: {}", style("Unit").bold(), unit);
    println!(
        "{}: {}",
        style("Stock").bold(),
        style(part.format_amount(part.amount_sum())).green()
    );
    println!("{}", style("─".repeat(60)).dim());

    if !part.lots.is_empty() {
        println!();
        println!("{}", style("Lots:").bold());
        let mut table = Table::new(&["SHORT", "AMOUNT", "LOCATION", "EXPIRES", "FLAGS", "DESCRIPTION"]);
        for lot in &part.lots {
            let location = lot
                .storage_location
                .as_ref()
                .map(|loc| {
                    session
                        .inventory
                        .location(loc)
                        .map(|l| l.name.clone())
                        .unwrap_or_else(|| loc.to_string())
                })
                .unwrap_or_default();
            let mut flags = Vec::new();
            if lot.instock_unknown {
                flags.push("unknown");
            }
            if lot.is_expired() {
                flags.push("expired");
            }
            if lot.needs_refill {
                flags.push("refill");
            }
            table.row(vec![
                session.short_ids.display(&lot.id),
                part.format_amount(lot.amount),
                location,
                lot.expiration_date.map(|d| d.to_string()).unwrap_or_default(),
                flags.join(","),
                lot.description.clone().unwrap_or_default(),
            ]);
        }
        println!("{}", table.render());
    }

    if !part.tags.is_empty() {
        println!();
        println!("{}: {}", style("Tags").bold(), part.tags.join(", "));
    }
    if let Some(ref desc) = part.description {
        println!();
        println!("{}", style("Description:").bold());
        println!("{}", desc);
    }

    println!("{}", style("─".repeat(60)).dim());
    println!(
        "{}: {} | {}: {} | {}: {}",
        style("Author").dim(),
        part.author,
        style("Created").dim(),
        part.created.format("%Y-%m-%d %H:%M"),
        style("Revision").dim(),
        part.entity_revision
    );
    Ok(())
}
