//! Stock arithmetic: lot primitives, build capacity and build requests

pub mod build_helper;
pub mod build_request;
pub mod error;
pub mod withdraw;

pub use build_helper::{BuildCapacity, BuildHelper, NonBuildableEntry};
pub use build_request::{
    do_build, BuildOutcome, BuildRequest, BuildRequestState, BuildViolation, LotHandle, LotKey,
    PlannedLot,
};
pub use error::{BuildError, StockError};
pub use withdraw::{can_add, can_withdraw, ChangeOptions};

/// Tolerance used when comparing stock amounts
pub const AMOUNT_EPSILON: f64 = 1e-9;
