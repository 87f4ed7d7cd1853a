//! `partdb prj` command - Project management

use miette::Result;

use crate::cli::commands::container::{self, ContainerCommands, ContainerKind};
use crate::cli::GlobalOpts;

pub type PrjCommands = ContainerCommands;

pub fn run(cmd: PrjCommands, global: &GlobalOpts) -> Result<()> {
    container::run(ContainerKind::Project, cmd, global)
}
