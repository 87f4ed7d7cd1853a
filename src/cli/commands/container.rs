//! Commands shared by `partdb prj` and `partdb asm`
//!
//! Projects and assemblies are both BOM containers; they only differ in a
//! few descriptive fields, so one set of subcommands serves both.

use clap::Subcommand;
use console::style;
use miette::Result;

use crate::cli::helpers::{ok_mark, print_structured, print_summary, truncate_str, Session, Table};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::entity::Status;
use crate::core::identity::{EntityId, EntityPrefix};
use crate::core::store::{Catalog, StoreError};
use crate::entities::{Assembly, BomContainer, BomEntry, BomEntryKind, Project};
use crate::stock::{BuildError, BuildHelper};

/// Which kind of container a command works on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    Project,
    Assembly,
}

impl ContainerKind {
    fn prefix(self) -> EntityPrefix {
        match self {
            ContainerKind::Project => EntityPrefix::Prj,
            ContainerKind::Assembly => EntityPrefix::Asm,
        }
    }

    fn noun(self) -> &'static str {
        match self {
            ContainerKind::Project => "project",
            ContainerKind::Assembly => "assembly",
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum ContainerCommands {
    /// Create a new container
    New(NewArgs),

    /// List containers with how often they can be built
    List(ListArgs),

    /// Show a container and its BOM
    Show(ShowArgs),

    /// Add entries to the BOM
    Add(AddArgs),

    /// Remove an entry from the BOM
    Rm(RmArgs),

    /// Change the lifecycle status
    Status(StatusArgs),
}

#[derive(clap::Args, Debug)]
pub struct NewArgs {
    /// Name
    pub name: String,

    /// Description
    #[arg(long, short = 'd')]
    pub description: Option<String>,

    /// Part that receives finished builds (PART@N, ID or name)
    #[arg(long)]
    pub builds_part: Option<String>,

    /// BOM items as ID:QTY pairs (e.g., --bom "PART@1:2,ASM@1:1")
    #[arg(long, short = 'b', value_delimiter = ',')]
    pub bom: Vec<String>,

    /// Internal part number (assemblies only)
    #[arg(long)]
    pub ipn: Option<String>,

    /// Revision (assemblies only)
    #[arg(long)]
    pub revision: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Filter by status
    #[arg(long, short = 's')]
    pub status: Option<Status>,

    /// Show only count
    #[arg(long)]
    pub count: bool,
}

#[derive(clap::Args, Debug)]
pub struct ShowArgs {
    /// ID, short ID or name
    pub id: String,
}

#[derive(clap::Args, Debug)]
pub struct AddArgs {
    /// Container ID, short ID or name
    pub container: String,

    /// Items as ID:QTY pairs (e.g., PART@1:2 ASM@1:1) or single IDs (quantity 1)
    #[arg(value_name = "ITEM")]
    pub items: Vec<String>,

    /// Add a manual entry with this name instead (not tracked in stock)
    #[arg(long, conflicts_with = "items")]
    pub manual: Option<String>,

    /// Quantity of the manual entry
    #[arg(long, default_value = "1", requires = "manual")]
    pub qty: f64,

    /// Mount names (comma-separated, e.g., "R1,R2") - only for a single item
    #[arg(long, value_delimiter = ',')]
    pub mount: Vec<String>,

    /// Comment on the entry - only for a single item
    #[arg(long, short = 'm')]
    pub comment: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct RmArgs {
    /// Container ID, short ID or name
    pub container: String,

    /// BOM entry (BOM@N or ID), or the part/sub-build it references
    pub entry: String,
}

#[derive(clap::Args, Debug)]
pub struct StatusArgs {
    /// Container ID, short ID or name
    pub container: String,

    /// New status (draft, planning, in_production, finished, archived)
    pub status: Status,
}

pub fn run(kind: ContainerKind, cmd: ContainerCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        ContainerCommands::New(args) => run_new(kind, args, global),
        ContainerCommands::List(args) => run_list(kind, args, global),
        ContainerCommands::Show(args) => run_show(kind, args, global),
        ContainerCommands::Add(args) => run_add(kind, args, global),
        ContainerCommands::Rm(args) => run_rm(kind, args, global),
        ContainerCommands::Status(args) => run_status(kind, args, global),
    }
}

/// Split "REF:QTY" into its parts; a bare reference means quantity 1
pub fn parse_bom_item(input: &str) -> Result<(&str, f64)> {
    let (reference, qty) = match input.rsplit_once(':') {
        Some((reference, qty)) => {
            let qty: f64 = qty
                .trim()
                .parse()
                .map_err(|_| miette::miette!("Invalid quantity in '{}'. Expected ID:QTY", input))?;
            (reference.trim(), qty)
        }
        None => (input.trim(), 1.0),
    };
    if reference.is_empty() {
        return Err(miette::miette!("Missing ID in '{}'", input));
    }
    if !(qty > 0.0) || !qty.is_finite() {
        return Err(miette::miette!("Quantity must be positive in '{}'", input));
    }
    Ok((reference, qty))
}

/// Turn "REF:QTY" into a BOM entry for a part or a sub-build
fn bom_entry_for(session: &Session, item: &str) -> Result<BomEntry> {
    let (reference, qty) = parse_bom_item(item)?;
    let upper = reference.to_uppercase();
    if ["PRJ@", "PRJ-", "ASM@", "ASM-"].iter().any(|p| upper.starts_with(p)) {
        let id = session.resolve_container(reference)?;
        return Ok(BomEntry::for_container(id, qty));
    }
    let id = session.resolve(EntityPrefix::Part, reference)?;
    Ok(BomEntry::for_part(id, qty))
}

fn container<'a>(session: &'a Session, id: &EntityId) -> Result<&'a dyn BomContainer> {
    session
        .inventory
        .container(id)
        .ok_or_else(|| miette::miette!("{} not found", id))
}

/// Apply `f` to the BOM of a project or assembly
fn edit_bom<R>(session: &mut Session, id: &EntityId, f: impl FnOnce(&mut Vec<BomEntry>) -> R) -> Result<R> {
    let bom = match id.prefix() {
        EntityPrefix::Prj => session.inventory.project_mut(id).map(|p| &mut p.bom),
        EntityPrefix::Asm => session.inventory.assembly_mut(id).map(|a| &mut a.bom),
        _ => None,
    };
    bom.map(f).ok_or_else(|| miette::miette!("{} not found", id))
}

/// Refuse BOMs that contain themselves
fn check_no_cycle(session: &Session, id: &EntityId) -> Result<()> {
    let container = container(session, id)?;
    match BuildHelper::new(&session.inventory).maximum_buildable_count(container) {
        Err(e @ BuildError::Cycle(_)) => Err(e.into()),
        _ => Ok(()),
    }
}

fn run_new(kind: ContainerKind, args: NewArgs, global: &GlobalOpts) -> Result<()> {
    let mut session = Session::open(global)?;
    let author = session.config.author();

    let builds_part = args
        .builds_part
        .as_deref()
        .map(|p| session.resolve(EntityPrefix::Part, p))
        .transpose()?;
    let entries = args
        .bom
        .iter()
        .map(|item| bom_entry_for(&session, item))
        .collect::<Result<Vec<_>>>()?;

    let id = match kind {
        ContainerKind::Project => {
            if args.ipn.is_some() || args.revision.is_some() {
                return Err(miette::miette!("--ipn and --revision only apply to assemblies"));
            }
            let mut project = Project::new(&args.name, author);
            project.description = args.description;
            project.builds_part = builds_part;
            project.bom = entries;
            session.inventory.insert_project(project)
        }
        ContainerKind::Assembly => {
            let mut assembly = Assembly::new(&args.name, author);
            assembly.description = args.description;
            assembly.builds_part = builds_part;
            assembly.ipn = args.ipn;
            assembly.revision = args.revision;
            assembly.bom = entries;
            session.inventory.insert_assembly(assembly)
        }
    };
    check_no_cycle(&session, &id)?;

    let short_id = session.short(&id);
    session.commit()?;

    if global.format == OutputFormat::Id {
        println!("{}", id);
    } else if !global.quiet {
        println!("{} Created {} {}", ok_mark(), kind.noun(), style(&short_id).cyan());
        println!("   {} | {}", style(&id).dim(), style(&args.name).yellow());
        if !args.bom.is_empty() {
            println!(
                "   {} Added {} BOM item{}",
                style("→").dim(),
                style(args.bom.len()).cyan(),
                if args.bom.len() == 1 { "" } else { "s" }
            );
        }
    }
    Ok(())
}

fn run_list(kind: ContainerKind, args: ListArgs, global: &GlobalOpts) -> Result<()> {
    let mut session = Session::open(global)?;

    let mut rows: Vec<(&dyn BomContainer, Status, String)> = match kind {
        ContainerKind::Project => session
            .inventory
            .projects()
            .map(|p| (p as &dyn BomContainer, p.status, p.author.clone()))
            .collect(),
        ContainerKind::Assembly => session
            .inventory
            .assemblies()
            .map(|a| (a as &dyn BomContainer, a.status, a.author.clone()))
            .collect(),
    };
    if let Some(status) = args.status {
        rows.retain(|(_, s, _)| *s == status);
    }
    rows.sort_by(|a, b| a.0.container_name().to_lowercase().cmp(&b.0.container_name().to_lowercase()));

    if args.count {
        println!("{}", rows.len());
        return Ok(());
    }

    let format = session.format(global);
    let structured = match kind {
        ContainerKind::Project => {
            let projects: Vec<&Project> = rows
                .iter()
                .filter_map(|(c, _, _)| session.inventory.project(c.container_id()))
                .collect();
            print_structured(format, &projects)?
        }
        ContainerKind::Assembly => {
            let assemblies: Vec<&Assembly> = rows
                .iter()
                .filter_map(|(c, _, _)| session.inventory.assembly(c.container_id()))
                .collect();
            print_structured(format, &assemblies)?
        }
    };
    if structured {
        return Ok(());
    }
    if rows.is_empty() {
        println!("No {} found.", if kind == ContainerKind::Project { "projects" } else { "assemblies" });
        return Ok(());
    }

    let ids: Vec<EntityId> = rows.iter().map(|(c, _, _)| c.container_id().clone()).collect();
    session.short_ids.ensure_all(ids.iter());

    let helper = BuildHelper::new(&session.inventory);
    let mut table = Table::new(&["SHORT", "ID", "NAME", "STATUS", "ENTRIES", "BUILDABLE", "AUTHOR"]);
    for (container, status, author) in &rows {
        let buildable = match helper.maximum_buildable_count(*container) {
            Ok(capacity) => capacity.to_string(),
            Err(BuildError::Cycle(_)) => "cycle".to_string(),
            Err(_) => "error".to_string(),
        };
        table.row(vec![
            session.short_ids.display(container.container_id()),
            container.container_id().to_string(),
            truncate_str(container.container_name(), 40),
            status.to_string(),
            container.bom().len().to_string(),
            buildable,
            author.clone(),
        ]);
    }
    table.print(format)?;
    if format == OutputFormat::Auto {
        print_summary(table.len(), kind.noun());
    }

    session.save_short_ids();
    Ok(())
}

fn run_show(kind: ContainerKind, args: ShowArgs, global: &GlobalOpts) -> Result<()> {
    let mut session = Session::open(global)?;
    let id = session.resolve(kind.prefix(), &args.id)?;

    let entry_ids: Vec<EntityId> = container(&session, &id)?.bom().iter().map(|e| e.id.clone()).collect();
    session.short_ids.ensure_all(entry_ids.iter());
    session.save_short_ids();

    let format = match session.format(global) {
        OutputFormat::Auto => OutputFormat::Tsv,
        f => f,
    };
    let structured = match kind {
        ContainerKind::Project => print_structured(format, &session.inventory.project(&id))?,
        ContainerKind::Assembly => print_structured(format, &session.inventory.assembly(&id))?,
    };
    if structured {
        return Ok(());
    }
    if format == OutputFormat::Id {
        println!("{}", id);
        return Ok(());
    }

    let container = container(&session, &id)?;
    let helper = BuildHelper::new(&session.inventory);

    println!("{}", style("─".repeat(60)).dim());
    println!("{}: {}", style("ID").bold(), style(&id).cyan());
    println!("{}: {}", style("Name").bold(), style(container.container_name()).yellow());
    if let Some(part) = container.builds_part() {
        let name = session.inventory.part(part).map(|p| p.name.as_str()).unwrap_or("?");
        println!("{}: {} ({})", style("Builds part").bold(), name, session.short_ids.display(part));
    }
    let capacity = match helper.maximum_buildable_count(container) {
        Ok(capacity) => style(capacity.to_string()).green().to_string(),
        Err(e) => style(e.to_string()).red().to_string(),
    };
    println!("{}: {}", style("Buildable").bold(), capacity);
    println!("{}", style("─".repeat(60)).dim());

    if !container.bom().is_empty() {
        println!();
        println!("{}", style("Bill of Materials:").bold());
        let mut table = Table::new(&["ENTRY", "KIND", "ITEM", "QTY", "STOCK", "BUILDS", "MOUNT"]);
        for entry in container.bom() {
            let (kind, item, stock, builds) = match entry.kind() {
                BomEntryKind::Part(part_id) => match session.inventory.part(part_id) {
                    Some(part) => (
                        "part",
                        part.name.clone(),
                        part.format_amount(part.amount_sum()),
                        helper
                            .maximum_buildable_count_for_entry(entry)
                            .map(|n| n.to_string())
                            .unwrap_or_else(|_| "-".to_string()),
                    ),
                    None => ("part", format!("{} (missing)", part_id), "-".into(), "-".into()),
                },
                BomEntryKind::Container(sub_id) => match session.inventory.container(sub_id) {
                    Some(sub) => (
                        "sub-build",
                        sub.container_name().to_string(),
                        "-".to_string(),
                        helper
                            .maximum_buildable_count(sub)
                            .map(|c| c.to_string())
                            .unwrap_or_else(|_| "-".to_string()),
                    ),
                    None => ("sub-build", format!("{} (missing)", sub_id), "-".into(), "-".into()),
                },
                BomEntryKind::Manual => (
                    "manual",
                    entry.name.clone().unwrap_or_default(),
                    "-".to_string(),
                    "-".to_string(),
                ),
            };
            table.row(vec![
                session.short_ids.display(&entry.id),
                kind.to_string(),
                item,
                entry.quantity.to_string(),
                stock,
                builds,
                entry.mountnames.join(","),
            ]);
        }
        println!("{}", table.render());
    }

    let description = match kind {
        ContainerKind::Project => session.inventory.project(&id).and_then(|p| p.description.clone()),
        ContainerKind::Assembly => session.inventory.assembly(&id).and_then(|a| a.description.clone()),
    };
    if let Some(desc) = description {
        println!();
        println!("{}", style("Description:").bold());
        println!("{}", desc);
    }
    Ok(())
}

fn run_add(kind: ContainerKind, args: AddArgs, global: &GlobalOpts) -> Result<()> {
    let mut session = Session::open(global)?;
    let id = session.resolve(kind.prefix(), &args.container)?;

    let mut entries = match &args.manual {
        Some(name) => {
            if !(args.qty > 0.0) {
                return Err(miette::miette!("Quantity must be positive"));
            }
            vec![BomEntry::manual(name, args.qty)]
        }
        None => args
            .items
            .iter()
            .map(|item| bom_entry_for(&session, item))
            .collect::<Result<Vec<_>>>()?,
    };
    if entries.is_empty() {
        return Err(miette::miette!("Nothing to add. Give ITEMs or --manual NAME"));
    }
    if entries.len() == 1 {
        entries[0].mountnames = args.mount.clone();
        entries[0].comment = args.comment.clone();
    }
    if entries.iter().any(|e| e.subcontainer.as_ref() == Some(&id)) {
        return Err(BuildError::Cycle(vec![id.clone(), id.clone()]).into());
    }

    let count = entries.len();
    let added: Vec<EntityId> = entries.iter().map(|e| e.id.clone()).collect();
    edit_bom(&mut session, &id, |bom| bom.extend(entries))?;
    check_no_cycle(&session, &id)?;

    session.short_ids.ensure_all(added.iter());
    session.commit()?;

    if !global.quiet {
        println!(
            "{} Added {} BOM item{} to {}",
            ok_mark(),
            style(count).cyan(),
            if count == 1 { "" } else { "s" },
            style(session.short_ids.display(&id)).cyan()
        );
    }
    Ok(())
}

fn run_rm(kind: ContainerKind, args: RmArgs, global: &GlobalOpts) -> Result<()> {
    let mut session = Session::open(global)?;
    let id = session.resolve(kind.prefix(), &args.container)?;
    let reference = session
        .short_ids
        .resolve(&args.entry)
        .unwrap_or_else(|| args.entry.clone())
        .to_uppercase();

    let matches = |entry: &BomEntry| {
        entry.id.to_string().contains(&reference)
            || entry.part.as_ref().is_some_and(|p| p.to_string().contains(&reference))
            || entry.subcontainer.as_ref().is_some_and(|c| c.to_string().contains(&reference))
    };
    let found: Vec<String> = container(&session, &id)?
        .bom()
        .iter()
        .filter(|e| matches(e))
        .map(|e| e.id.to_string())
        .collect();
    match found.len() {
        0 => return Err(miette::miette!("No BOM entry matches '{}'", args.entry)),
        1 => {}
        _ => {
            return Err(StoreError::Ambiguous {
                reference: args.entry.clone(),
                candidates: found,
            }
            .into())
        }
    }

    edit_bom(&mut session, &id, |bom| bom.retain(|e| !matches(e)))?;
    session.commit()?;

    if !global.quiet {
        println!(
            "{} Removed BOM entry from {}",
            ok_mark(),
            style(session.short_ids.display(&id)).cyan()
        );
    }
    Ok(())
}

fn run_status(kind: ContainerKind, args: StatusArgs, global: &GlobalOpts) -> Result<()> {
    let mut session = Session::open(global)?;
    let id = session.resolve(kind.prefix(), &args.container)?;

    let updated = match kind {
        ContainerKind::Project => session.inventory.project_mut(&id).map(|p| p.status = args.status),
        ContainerKind::Assembly => session.inventory.assembly_mut(&id).map(|a| a.status = args.status),
    };
    updated.ok_or_else(|| miette::miette!("{} not found", id))?;
    session.commit()?;

    if !global.quiet {
        println!(
            "{} {} is now {}",
            ok_mark(),
            style(session.short_ids.display(&id)).cyan(),
            style(args.status).yellow()
        );
    }
    Ok(())
}
