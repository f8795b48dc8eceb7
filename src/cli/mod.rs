//! CLI argument parsing
//!
//! Defines command-line interface using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Concurrent UI and API test run orchestrator
#[derive(Parser, Debug)]
#[command(name = "qa-orchestrator")]
#[command(version)]
#[command(about = "Plan and run UI/API test suites on a bounded worker pool")]
#[command(long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    /// Configuration file (defaults to the standard locations)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a test suite
    Run(RunArgs),

    /// Show the planned dispatch order without executing
    Plan(PlanArgs),

    /// View stored run results
    Results(ResultsArgs),

    /// Configuration management
    Config(ConfigArgs),
}

/// Arguments for run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Test suite file (YAML or JSON)
    pub suite: PathBuf,

    /// Execution strategy (balanced, type_grouped, priority_based, sequential)
    #[arg(short, long)]
    pub strategy: Option<String>,

    /// Run units concurrently
    #[arg(short, long, conflicts_with = "serial")]
    pub parallel: bool,

    /// Run units one at a time
    #[arg(long)]
    pub serial: bool,

    /// Requested worker count for parallel runs
    #[arg(short = 'n', long)]
    pub pool_size: Option<usize>,

    /// Submit one PRIORITY_BASED run per priority tier
    #[arg(long)]
    pub tiers: bool,

    /// With --tiers, wait for each tier before submitting the next
    #[arg(long, requires = "tiers")]
    pub wait_tiers: bool,

    /// Output format (table, json, json-pretty, summary)
    #[arg(short, long)]
    pub format: Option<String>,

    /// Write the final snapshot to a file
    #[arg(short, long)]
    pub output: Option<String>,

    /// Keep outcomes in memory instead of the results directory
    #[arg(long)]
    pub no_store: bool,

    /// Cancel the run if it is still going after this many seconds
    #[arg(long)]
    pub deadline: Option<u64>,
}

/// Arguments for plan command
#[derive(Parser, Debug)]
pub struct PlanArgs {
    /// Test suite file (YAML or JSON)
    pub suite: PathBuf,

    /// Execution strategy
    #[arg(short, long)]
    pub strategy: Option<String>,

    /// Plan for a parallel run
    #[arg(short, long)]
    pub parallel: bool,

    /// Requested worker count
    #[arg(short = 'n', long)]
    pub pool_size: Option<usize>,

    /// Output format (table, json, summary)
    #[arg(short, long, default_value = "table")]
    pub format: String,
}

/// Arguments for results command
#[derive(Parser, Debug)]
pub struct ResultsArgs {
    #[command(subcommand)]
    pub action: ResultsAction,
}

#[derive(Subcommand, Debug)]
pub enum ResultsAction {
    /// List stored runs, newest first
    List {
        /// Maximum runs to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Show one stored run
    Show {
        /// Run ID (defaults to the latest run)
        run_id: Option<String>,

        /// Output format
        #[arg(short, long, default_value = "table")]
        format: String,

        /// Only show failed outcomes
        #[arg(long)]
        failed: bool,
    },

    /// Delete a stored run
    Delete {
        /// Run ID
        run_id: String,
    },
}

/// Arguments for config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Create an example configuration file
    Init {
        /// Output file path
        #[arg(short, long, default_value = "./qa-orchestrator.yaml")]
        output: String,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },

    /// Show the effective configuration
    Show {
        /// Show environment variables instead
        #[arg(long)]
        env: bool,

        /// Output format (yaml, json)
        #[arg(short, long, default_value = "yaml")]
        format: String,
    },

    /// Validate a configuration file
    Validate {
        /// Configuration file path
        file: Option<String>,
    },

    /// Show help for environment variables
    EnvHelp,
}
