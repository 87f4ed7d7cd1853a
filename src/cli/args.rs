//! CLI argument definitions using clap derive

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::cli::commands::{
    asm::AsmCommands, build::BuildCommands, completions::CompletionsArgs, init::InitArgs,
    loc::LocCommands, log::LogArgs, lot::LotCommands, part::PartCommands, prj::PrjCommands,
};

#[derive(Parser)]
#[command(name = "partdb")]
#[command(author, version, about = "Parts inventory and build planning")]
#[command(long_about = "Track electronic parts, their stock lots and storage locations as plain YAML files, and build projects and assemblies from that stock.")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalOpts,
}

#[derive(clap::Args, Clone, Debug)]
pub struct GlobalOpts {
    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "auto")]
    pub format: OutputFormat,

    /// Suppress non-essential output (and log only errors)
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Enable verbose output (debug logging)
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Workspace root (default: auto-detect by finding .partdb/)
    #[arg(long, global = true)]
    pub project: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new partdb workspace
    Init(InitArgs),

    /// Part management
    #[command(subcommand)]
    Part(PartCommands),

    /// Storage location management
    #[command(subcommand)]
    Loc(LocCommands),

    /// Part lot management (stock withdraw, add, move)
    #[command(subcommand)]
    Lot(LotCommands),

    /// Project management (BOM containers)
    #[command(subcommand)]
    Prj(PrjCommands),

    /// Assembly management (BOM containers usable as sub-builds)
    #[command(subcommand)]
    Asm(AsmCommands),

    /// Check, plan and run builds of projects and assemblies
    #[command(subcommand)]
    Build(BuildCommands),

    /// Show the stock change log
    Log(LogArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Automatically detect based on context (yaml for show, tsv for list)
    #[default]
    Auto,
    /// YAML format (full fidelity)
    Yaml,
    /// Tab-separated values (for piping)
    Tsv,
    /// JSON format (for programming)
    Json,
    /// CSV format (for spreadsheets)
    Csv,
    /// Just IDs, one per line
    Id,
}
