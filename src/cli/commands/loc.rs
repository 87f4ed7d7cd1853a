//! `partdb loc` command - Storage location management

use clap::Subcommand;
use console::style;
use miette::Result;

use crate::cli::helpers::{ok_mark, print_structured, print_summary, Session, Table};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::identity::EntityPrefix;
use crate::entities::StorageLocation;

#[derive(Subcommand, Debug)]
pub enum LocCommands {
    /// Create a new storage location
    New(NewArgs),

    /// List storage locations
    List(ListArgs),

    /// Mark a location as full (no more stock can be added to its lots) or not
    Full(FullArgs),
}

#[derive(clap::Args, Debug)]
pub struct NewArgs {
    /// Location name
    pub name: String,

    /// Description
    #[arg(long, short = 'd')]
    pub description: Option<String>,

    /// The location is already full
    #[arg(long)]
    pub full: bool,
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Show only count
    #[arg(long)]
    pub count: bool,
}

#[derive(clap::Args, Debug)]
pub struct FullArgs {
    /// Location ID, short ID (LOC@N) or name
    pub id: String,

    /// Clear the full flag instead of setting it
    #[arg(long)]
    pub clear: bool,
}

pub fn run(cmd: LocCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        LocCommands::New(args) => run_new(args, global),
        LocCommands::List(args) => run_list(args, global),
        LocCommands::Full(args) => run_full(args, global),
    }
}

fn run_new(args: NewArgs, global: &GlobalOpts) -> Result<()> {
    let mut session = Session::open(global)?;

    let mut location = StorageLocation::new(&args.name, session.config.author());
    location.description = args.description;
    location.is_full = args.full;

    let id = session.inventory.insert_location(location);
    let short_id = session.short(&id);
    session.commit()?;

    if global.format == OutputFormat::Id {
        println!("{}", id);
    } else if !global.quiet {
        println!("{} Created location {}", ok_mark(), style(&short_id).cyan());
        println!("   {} | {}", style(&id).dim(), style(&args.name).yellow());
    }
    Ok(())
}

fn run_list(args: ListArgs, global: &GlobalOpts) -> Result<()> {
    let mut session = Session::open(global)?;

    let mut locations: Vec<&StorageLocation> = session.inventory.locations().collect();
    locations.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));

    if args.count {
        println!("{}", locations.len());
        return Ok(());
    }

    let format = session.format(global);
    if print_structured(format, &locations)? {
        return Ok(());
    }
    if locations.is_empty() {
        println!("No locations found.");
        return Ok(());
    }

    let ids: Vec<_> = locations.iter().map(|l| l.id.clone()).collect();
    session.short_ids.ensure_all(ids.iter());

    let mut table = Table::new(&["SHORT", "ID", "NAME", "FULL", "DESCRIPTION"]);
    for location in &locations {
        table.row(vec![
            session.short_ids.display(&location.id),
            location.id.to_string(),
            location.name.clone(),
            if location.is_full { "yes".into() } else { String::new() },
            location.description.clone().unwrap_or_default(),
        ]);
    }
    table.print(format)?;
    if format == OutputFormat::Auto {
        print_summary(table.len(), "location");
    }

    session.save_short_ids();
    Ok(())
}

fn run_full(args: FullArgs, global: &GlobalOpts) -> Result<()> {
    let mut session = Session::open(global)?;
    let id = session.resolve(EntityPrefix::Loc, &args.id)?;

    let location = session
        .inventory
        .location_mut(&id)
        .ok_or_else(|| miette::miette!("No location found matching '{}'", args.id))?;
    location.is_full = !args.clear;
    let name = location.name.clone();
    session.commit()?;

    if !global.quiet {
        let state = if args.clear { "no longer full" } else { "full" };
        println!("{} {} is {}", ok_mark(), style(name).cyan(), state);
    }
    Ok(())
}
