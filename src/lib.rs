//! partdb: parts inventory, stock lots and build allocation
//!
//! Parts, storage locations, projects and assemblies are kept as plain YAML
//! files in a workspace. Stock lives in part lots; projects and assemblies
//! consume it through their bills of materials when they are built.

pub mod cli;
pub mod core;
pub mod entities;
pub mod stock;
pub mod yaml;
