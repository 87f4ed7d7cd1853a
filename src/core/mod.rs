//! Core module - identifiers, workspace layout, configuration and storage

pub mod config;
pub mod entity;
pub mod identity;
pub mod loader;
pub mod shortid;
pub mod stock_log;
pub mod store;
pub mod workspace;

pub use config::Config;
pub use entity::{Entity, Status};
pub use identity::{EntityId, EntityPrefix, IdParseError};
pub use shortid::ShortIdIndex;
pub use stock_log::{StockAction, StockLogEntry};
pub use store::{Catalog, Inventory, StockStore, StoreError};
pub use workspace::{Workspace, WorkspaceError};
