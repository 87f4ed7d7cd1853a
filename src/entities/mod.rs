//! Entity type definitions
//!
//! **Stock:**
//! - [`Part`] - Catalog entries with their [`PartLot`]s
//! - [`StorageLocation`] - Places where lots are kept
//!
//! **Builds:**
//! - [`Project`] - Buildable bill of materials
//! - [`Assembly`] - Reusable sub-build with its own bill of materials
//! - [`BomEntry`] - Line item of either

pub mod assembly;
pub mod bom;
pub mod part;
pub mod project;
pub mod storage_location;

pub use assembly::Assembly;
pub use bom::{BomContainer, BomEntry, BomEntryKind};
pub use part::{MeasurementUnit, Part, PartLot};
pub use project::Project;
pub use storage_location::StorageLocation;
