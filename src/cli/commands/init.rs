//! `partdb init` command - Initialize a new partdb workspace

use console::style;
use miette::{IntoDiagnostic, Result};
use std::path::Path;

use crate::cli::helpers::ok_mark;
use crate::core::workspace::{Workspace, WorkspaceError};

#[derive(clap::Args, Debug)]
pub struct InitArgs {
    /// Directory to initialize (default: current directory)
    #[arg(default_value = ".")]
    pub path: std::path::PathBuf,

    /// Force initialization even if .partdb/ already exists
    #[arg(long)]
    pub force: bool,
}

pub fn run(args: InitArgs) -> Result<()> {
    let path = if args.path.as_os_str() == "." {
        std::env::current_dir().into_diagnostic()?
    } else {
        args.path.clone()
    };

    // Create directory if it doesn't exist
    if !path.exists() {
        std::fs::create_dir_all(&path).into_diagnostic()?;
        println!("{} Created directory {}", ok_mark(), style(path.display()).cyan());
    }

    let workspace = if args.force {
        Workspace::init_force(&path)
    } else {
        Workspace::init(&path)
    };

    match workspace {
        Ok(workspace) => {
            tracing::info!(root = %workspace.root().display(), "initialized workspace");
            println!(
                "{} Initialized partdb workspace at {}",
                ok_mark(),
                style(workspace.root().display()).cyan()
            );
            println!();
            println!("Created workspace structure:");
            print_structure(workspace.root());
            println!();
            println!("Next steps:");
            println!("  {} Add a storage location", style("partdb loc new \"Drawer 1\"").yellow());
            println!("  {} Add a part", style("partdb part new \"NE555\"").yellow());
            println!("  {} Put stock into a lot", style("partdb lot new PART@1 --amount 100").yellow());
            Ok(())
        }
        Err(WorkspaceError::AlreadyExists(path)) => {
            println!(
                "{} partdb workspace already exists at {}",
                style("!").yellow(),
                style(path.display()).cyan()
            );
            println!();
            println!("Use {} to reinitialize", style("partdb init --force").yellow());
            Ok(())
        }
        Err(e) => Err(miette::miette!("{}", e)),
    }
}

fn print_structure(root: &Path) {
    let entries = [
        ".partdb/",
        ".partdb/config.yaml",
        "parts/",
        "locations/",
        "projects/",
        "assemblies/",
    ];

    for entry in entries {
        if root.join(entry).exists() {
            let kind = if entry.ends_with('/') { "dir " } else { "file" };
            println!("  {} {}", style(kind).dim(), entry);
        }
    }
}
