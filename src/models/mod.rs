//! Data models for test orchestration
//!
//! This module contains all data structures used throughout the application.

mod outcome;
mod run;
mod test_case;

pub use outcome::{ApiResponse, ExecutionReport, Outcome, OutcomeStatus};
pub use run::{RunSnapshot, RunStatus, RunSummary};
pub(crate) use test_case::is_yaml_file;
pub use test_case::{Priority, TestCase, TestSuite, TestType};
