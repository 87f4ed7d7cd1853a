//! CLI command implementations

pub mod asm;
pub mod build;
pub mod completions;
pub mod container;
pub mod init;
pub mod loc;
pub mod log;
pub mod lot;
pub mod part;
pub mod prj;
