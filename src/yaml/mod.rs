//! YAML helpers shared by the entity store

pub mod diagnostics;

pub use diagnostics::YamlSyntaxError;
