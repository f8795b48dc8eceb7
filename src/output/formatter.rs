//! Output formatters for run results
//!
//! Provides JSON, Table, and summary output formats.

use std::io::Write;

use crate::engine::{ExecutionUnit, Strategy};
use crate::models::{Outcome, OutcomeStatus, RunSnapshot, RunStatus, RunSummary};
use crate::results::RunInfo;

/// Output format options
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    JsonPretty,
    Summary,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "table" => Some(OutputFormat::Table),
            "json" => Some(OutputFormat::Json),
            "json-pretty" | "jsonpretty" => Some(OutputFormat::JsonPretty),
            "summary" => Some(OutputFormat::Summary),
            _ => None,
        }
    }
}

/// Result formatter
pub struct ResultFormatter {
    format: OutputFormat,
    colorize: bool,
}

impl ResultFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            colorize: true,
        }
    }

    pub fn no_color(mut self) -> Self {
        self.colorize = false;
        self
    }

    fn to_json<T: serde::Serialize>(&self, value: &T) -> String {
        if self.format == OutputFormat::JsonPretty {
            serde_json::to_string_pretty(value).unwrap_or_default()
        } else {
            serde_json::to_string(value).unwrap_or_default()
        }
    }

    fn paint(&self, text: &str, color: &str) -> String {
        if self.colorize {
            format!("\x1b[{color}m{text}\x1b[0m")
        } else {
            text.to_string()
        }
    }

    fn status_label(&self, status: OutcomeStatus) -> String {
        match status {
            OutcomeStatus::Passed => self.paint("✓ PASS", "32"),
            OutcomeStatus::Failed => self.paint("✗ FAIL", "31"),
        }
    }

    fn run_status_label(&self, status: RunStatus) -> String {
        let text = format!("{} {}", status.symbol(), status);
        match status {
            RunStatus::Completed => self.paint(&text, "32"),
            RunStatus::Running => self.paint(&text, "36"),
            RunStatus::Cancelled | RunStatus::Interrupted => self.paint(&text, "33"),
            RunStatus::Failed | RunStatus::NotFound => self.paint(&text, "31"),
        }
    }

    /// Format a single unit outcome
    pub fn format_outcome(&self, outcome: &Outcome) -> String {
        match self.format {
            OutputFormat::Table => self.format_outcome_table(outcome),
            OutputFormat::Json | OutputFormat::JsonPretty => self.to_json(outcome),
            OutputFormat::Summary => outcome.to_string(),
        }
    }

    fn format_outcome_table(&self, outcome: &Outcome) -> String {
        let mut line = format!(
            "{:24} {:4} {:24} {} [{:>6}ms x{}]",
            truncate(&outcome.test_case_id, 24),
            outcome.test_type.name(),
            truncate(&outcome.functionality, 24),
            self.status_label(outcome.status),
            outcome.duration_ms,
            outcome.attempts
        );
        if let Some(err) = &outcome.error_message {
            line.push_str(&format!("\n{:>32} {}", "└─", truncate(err, 80)));
        }
        line
    }

    /// Format a run snapshot
    pub fn format_snapshot(&self, snapshot: &RunSnapshot) -> String {
        match self.format {
            OutputFormat::Table => self.format_snapshot_table(snapshot),
            OutputFormat::Json | OutputFormat::JsonPretty => self.to_json(snapshot),
            OutputFormat::Summary => self.format_summary_brief(&snapshot.summary()),
        }
    }

    fn format_snapshot_table(&self, snapshot: &RunSnapshot) -> String {
        let summary = snapshot.summary();
        let mut output = String::new();

        output.push_str("\n═══════════════════════════════════════════════════════════════════════════\n");
        output.push_str(&format!(
            " Run {}  {}\n",
            snapshot.run_id,
            self.run_status_label(snapshot.status)
        ));
        output.push_str(&format!(
            " Strategy: {} | Pool: {} | Units: {}/{}\n",
            snapshot.strategy, snapshot.pool_size, snapshot.completed_units, snapshot.total_units
        ));
        if let Some(reason) = &snapshot.failure_reason {
            output.push_str(&format!(" Reason: {}\n", self.paint(reason, "31")));
        }
        output.push_str("═══════════════════════════════════════════════════════════════════════════\n");

        for outcome in &snapshot.outcomes {
            output.push_str(&format!(" {}\n", self.format_outcome_table(outcome)));
        }

        output.push_str("───────────────────────────────────────────────────────────────────────────\n");
        output.push_str(&format!(
            " Passed: {} | Failed: {} | Pass Rate: {:5.1}% | Duration: {}ms | Avg unit: {}ms\n",
            self.paint(&summary.passed.to_string(), "32"),
            if summary.failed > 0 {
                self.paint(&summary.failed.to_string(), "31")
            } else {
                summary.failed.to_string()
            },
            summary.pass_rate(),
            summary.total_duration_ms,
            summary.avg_unit_duration_ms
        ));

        output
    }

    /// Format a run summary
    pub fn format_summary(&self, summary: &RunSummary) -> String {
        match self.format {
            OutputFormat::Table => summary.to_string(),
            OutputFormat::Json | OutputFormat::JsonPretty => self.to_json(summary),
            OutputFormat::Summary => self.format_summary_brief(summary),
        }
    }

    fn format_summary_brief(&self, summary: &RunSummary) -> String {
        format!(
            "{} {}: {}/{} passed ({:.1}%) in {}ms",
            summary.run_id,
            summary.status,
            summary.passed,
            summary.total,
            summary.pass_rate(),
            summary.total_duration_ms
        )
    }

    /// One-line progress for a running run
    pub fn format_progress(&self, snapshot: &RunSnapshot) -> String {
        let filled = (snapshot.progress() / 5.0) as usize;
        format!(
            "{} {}{} {:5.1}% ({}/{})",
            snapshot.run_id,
            "█".repeat(filled.min(20)),
            "░".repeat(20 - filled.min(20)),
            snapshot.progress(),
            snapshot.completed_units,
            snapshot.total_units
        )
    }

    /// Format a planned dispatch order
    pub fn format_plan(&self, units: &[ExecutionUnit], strategy: Strategy, pool_size: usize) -> String {
        match self.format {
            OutputFormat::Json | OutputFormat::JsonPretty => {
                #[derive(serde::Serialize)]
                struct PlanJson<'a> {
                    strategy: Strategy,
                    pool_size: usize,
                    order: Vec<&'a str>,
                }

                self.to_json(&PlanJson {
                    strategy,
                    pool_size,
                    order: units.iter().map(|u| u.case.id.as_str()).collect(),
                })
            }
            OutputFormat::Summary => format!(
                "{} units, strategy {}, {} worker(s)",
                units.len(),
                strategy,
                pool_size
            ),
            OutputFormat::Table => {
                let mut output = format!(
                    "\nStrategy: {} ({})\nWorkers:  {}\n\n",
                    strategy,
                    strategy.description(),
                    pool_size
                );
                for unit in units {
                    output.push_str(&format!(
                        "{:4}. {:24} {:4} {:6} {}\n",
                        unit.sequence + 1,
                        truncate(&unit.case.id, 24),
                        unit.case.test_type.name(),
                        unit.case.priority.name(),
                        unit.case.functionality
                    ));
                }
                output
            }
        }
    }

    /// Format stored runs
    pub fn format_runs(&self, runs: &[RunInfo]) -> String {
        if runs.is_empty() {
            return "No stored runs.".to_string();
        }

        let mut output = String::new();
        output.push_str(&format!(
            "{:36} {:14} {:20} {:>6} {:>7}\n",
            "RUN", "STATUS", "STARTED", "UNITS", "PASS"
        ));
        for run in runs {
            let started = run
                .started_at
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| "-".to_string());
            output.push_str(&format!(
                "{:36} {:14} {:20} {:>6} {:>6.1}%\n",
                run.run_id,
                run.status.to_string(),
                started,
                run.total_units,
                run.pass_rate
            ));
        }
        output
    }
}

impl Default for ResultFormatter {
    fn default() -> Self {
        Self::new(OutputFormat::Table)
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{head}…")
    }
}

/// Write a run snapshot to a file
pub fn write_snapshot_to_file(
    path: &str,
    snapshot: &RunSnapshot,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let formatter = ResultFormatter::new(format).no_color();
    let content = formatter.format_snapshot(snapshot);

    let mut file = std::fs::File::create(path)?;
    file.write_all(content.as_bytes())?;

    Ok(())
}
