//! `partdb asm` command - Assembly management
//!
//! Assemblies are reusable sub-builds: a project BOM can require builds of an
//! assembly the same way it requires parts.

use miette::Result;

use crate::cli::commands::container::{self, ContainerCommands, ContainerKind};
use crate::cli::GlobalOpts;

pub type AsmCommands = ContainerCommands;

pub fn run(cmd: AsmCommands, global: &GlobalOpts) -> Result<()> {
    container::run(ContainerKind::Assembly, cmd, global)
}
