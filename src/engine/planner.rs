//! Execution strategy planner
//!
//! Turns an unordered list of test cases into the ordered list of execution
//! units a run dispatches.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

use crate::models::{TestCase, TestType};

/// Ordering policy applied to units before dispatch
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Strategy {
    /// Round-robin across UI and API cases
    #[default]
    Balanced,
    /// API cases first, then UI cases
    TypeGrouped,
    /// HIGH, then MEDIUM, then LOW; ties keep input order
    PriorityBased,
    /// Input order, meant for a single worker
    Sequential,
}

impl Strategy {
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::Balanced => "BALANCED",
            Strategy::TypeGrouped => "TYPE_GROUPED",
            Strategy::PriorityBased => "PRIORITY_BASED",
            Strategy::Sequential => "SEQUENTIAL",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Strategy::Balanced => "Interleave UI and API cases so neither monopolizes the queue",
            Strategy::TypeGrouped => "Run all API cases before UI cases for quick feedback",
            Strategy::PriorityBased => "Run HIGH, then MEDIUM, then LOW priority cases",
            Strategy::Sequential => "Keep input order on a single worker",
        }
    }

    pub fn all() -> Vec<Strategy> {
        vec![
            Strategy::Balanced,
            Strategy::TypeGrouped,
            Strategy::PriorityBased,
            Strategy::Sequential,
        ]
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "balanced" => Some(Strategy::Balanced),
            "type_grouped" | "grouped" => Some(Strategy::TypeGrouped),
            "priority_based" | "priority" => Some(Strategy::PriorityBased),
            "sequential" | "serial" => Some(Strategy::Sequential),
            _ => None,
        }
    }

    /// Parse a strategy name, falling back to `Balanced` for unknown values
    pub fn parse_lenient(s: &str) -> Self {
        Self::from_str(s).unwrap_or_else(|| {
            warn!(strategy = %s, "Unknown strategy, falling back to BALANCED");
            Strategy::Balanced
        })
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// One test case bound to one run
#[derive(Clone, Debug, PartialEq)]
pub struct ExecutionUnit {
    pub run_id: String,
    /// Position in the planned order
    pub sequence: usize,
    pub case: TestCase,
}

impl fmt::Display for ExecutionUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {}", self.sequence, self.case)
    }
}

/// Order test cases for a run according to `strategy`
pub fn plan(run_id: &str, cases: &[TestCase], strategy: Strategy) -> Vec<ExecutionUnit> {
    let ordered: Vec<&TestCase> = match strategy {
        Strategy::Balanced => interleave_by_type(cases),
        Strategy::TypeGrouped => cases
            .iter()
            .filter(|c| c.test_type == TestType::Api)
            .chain(cases.iter().filter(|c| c.test_type == TestType::Ui))
            .collect(),
        Strategy::PriorityBased => {
            let mut sorted: Vec<&TestCase> = cases.iter().collect();
            // sort_by is stable
            sorted.sort_by(|a, b| b.priority.cmp(&a.priority));
            sorted
        }
        Strategy::Sequential => cases.iter().collect(),
    };

    debug!(run_id = %run_id, strategy = %strategy, units = ordered.len(), "Planned run");

    ordered
        .into_iter()
        .enumerate()
        .map(|(sequence, case)| ExecutionUnit {
            run_id: run_id.to_string(),
            sequence,
            case: case.clone(),
        })
        .collect()
}

fn interleave_by_type(cases: &[TestCase]) -> Vec<&TestCase> {
    let ui: Vec<&TestCase> = cases.iter().filter(|c| c.test_type == TestType::Ui).collect();
    let api: Vec<&TestCase> = cases.iter().filter(|c| c.test_type == TestType::Api).collect();

    let mut ordered = Vec::with_capacity(cases.len());
    for i in 0..ui.len().max(api.len()) {
        if let Some(case) = ui.get(i) {
            ordered.push(*case);
        }
        if let Some(case) = api.get(i) {
            ordered.push(*case);
        }
    }
    ordered
}
