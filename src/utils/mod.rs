//! Shared utilities
//!
//! Logging setup and timing helpers.

mod logger;
mod timer;

pub use logger::{init_logger, LogLevel};
pub use timer::UnitTimer;
