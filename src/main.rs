//! QA Orchestrator - concurrent UI and API test runs
//!
//! A CLI tool that plans test suites into execution units, runs them on a
//! bounded worker pool with per-unit retries, and stores every outcome.
//!
//! ## Features
//!
//! - Four execution strategies (balanced, type-grouped, priority-based, sequential)
//! - Pool sizing bounded by hardware concurrency, with caller-runs backpressure
//! - Live progress, cancellation on Ctrl-C or deadline
//! - API checks over HTTP and UI checks through a W3C WebDriver endpoint
//! - JSON-lines result storage with table, JSON and summary output
//!
//! ## Usage
//!
//! ```bash
//! # Run a suite in parallel on up to 8 workers
//! qa-orchestrator run suite.yaml --parallel -n 8
//!
//! # Run priority tiers one after another
//! qa-orchestrator run suite.yaml --parallel --tiers --wait-tiers
//!
//! # Preview the dispatch order
//! qa-orchestrator plan suite.yaml --strategy type_grouped
//!
//! # Inspect stored runs
//! qa-orchestrator results list
//! qa-orchestrator results show --failed
//! ```

use anyhow::Result;
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

mod cli;
mod config;
mod engine;
mod executors;
mod http;
mod models;
mod output;
mod results;
mod utils;

use cli::Args;
use config::{AppConfig, ConfigFile, EnvConfig};
use engine::{EngineSettings, PoolPolicy, RunCoordinator, RunRegistry, Strategy};
use executors::ExecutorSet;
use models::{RunSnapshot, RunStatus, TestSuite, TestType};
use output::{OutputFormat, ResultFormatter};
use results::{MemorySink, ResultSink, ResultsStorage};
use utils::{init_logger, LogLevel};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose {
        LogLevel::Debug
    } else {
        LogLevel::from_str(&args.log_level).unwrap_or(LogLevel::Info)
    };
    init_logger(level);

    match args.command {
        cli::Command::Run(run_args) => {
            let config = AppConfig::resolve(args.config.as_deref())?;
            run_suite(run_args, config).await?;
        }
        cli::Command::Plan(plan_args) => {
            let config = AppConfig::resolve(args.config.as_deref())?;
            show_plan(plan_args, &config)?;
        }
        cli::Command::Results(results_args) => {
            let config = AppConfig::resolve(args.config.as_deref())?;
            show_results(results_args, &config)?;
        }
        cli::Command::Config(config_args) => {
            manage_config(config_args, args.config.as_deref())?;
        }
    }

    Ok(())
}

fn storage_for(config: &AppConfig) -> ResultsStorage {
    match &config.results_dir {
        Some(dir) => ResultsStorage::new(dir),
        None => ResultsStorage::default_dir(),
    }
}

fn output_format(requested: Option<&str>) -> OutputFormat {
    let name = requested
        .map(str::to_string)
        .unwrap_or_else(|| EnvConfig::load().format_or("table"));
    OutputFormat::from_str(&name).unwrap_or_else(|| {
        warn!("Unknown output format '{}', using table", name);
        OutputFormat::Table
    })
}

async fn run_suite(args: cli::RunArgs, config: AppConfig) -> Result<()> {
    let suite = TestSuite::load(&args.suite)?;
    let strategy = args
        .strategy
        .as_deref()
        .map(Strategy::parse_lenient)
        .unwrap_or(config.default_strategy);
    let parallel = !args.serial && (args.parallel || config.parallel);
    let pool_size = args.pool_size.unwrap_or(config.pool_size);
    let format = output_format(args.format.as_deref());
    let formatter = ResultFormatter::new(format);

    info!(
        "Running suite '{}' ({} UI, {} API cases)",
        suite.name,
        suite.count_by_type(TestType::Ui),
        suite.count_by_type(TestType::Api)
    );

    let storage = Arc::new(storage_for(&config));
    let sink: Arc<dyn ResultSink> = if args.no_store {
        Arc::new(MemorySink::new())
    } else {
        storage.ensure_dir()?;
        storage.clone()
    };

    let settings = EngineSettings::from_config(&config);
    let poll = settings.status_poll;
    let policy = PoolPolicy::detect();
    debug!(
        strategy = %strategy,
        ceiling = policy.ceiling(strategy),
        "Worker ceiling for this host"
    );
    let coordinator = RunCoordinator::new(RunRegistry::new(), ExecutorSet::from_config(&config)?, sink)
        .with_policy(policy)
        .with_settings(settings);

    let deadline = args.deadline.map(Duration::from_secs);
    let run_ids = if args.tiers {
        let tiers = {
            let coordinator = coordinator.clone();
            let cases = suite.test_cases;
            let wait = args.wait_tiers;
            tokio::spawn(async move {
                coordinator
                    .run_priority_tiers(cases, parallel, pool_size, wait)
                    .await
            })
        };
        watch_tiers(&coordinator, tiers, deadline, poll, &formatter).await?
    } else {
        vec![
            coordinator
                .submit(suite.test_cases, parallel, pool_size, strategy)
                .await,
        ]
    };

    // Progress bars only make sense for a single run
    let progress = (run_ids.len() == 1).then_some(&formatter);
    let snapshots = futures::future::join_all(
        run_ids
            .iter()
            .map(|run_id| watch_run(&coordinator, run_id, deadline, poll, progress)),
    )
    .await;

    let mut failing = 0;
    for snapshot in &snapshots {
        if !args.no_store {
            storage.save_snapshot(snapshot)?;
        }
        if let Some(path) = &args.output {
            output::write_snapshot_to_file(path, snapshot, format)?;
            info!("Results written to {}", path);
        }

        println!("{}", formatter.format_snapshot(snapshot));
        if !snapshot.summary().is_all_passed() {
            failing += 1;
        }
    }

    coordinator.shutdown().await;

    if failing > 0 {
        anyhow::bail!("{} of {} run(s) did not pass", failing, run_ids.len());
    }
    Ok(())
}

/// Poll a run until it ends, cancelling it on Ctrl-C or when `deadline` passes
async fn watch_run(
    coordinator: &RunCoordinator,
    run_id: &str,
    deadline: Option<Duration>,
    poll: Duration,
    progress: Option<&ResultFormatter>,
) -> RunSnapshot {
    let started = Instant::now();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut cancelled = false;

    loop {
        let snapshot = coordinator.status(run_id).await;
        if snapshot.status.is_terminal() || !snapshot.is_found() {
            if progress.is_some() {
                eprintln!();
            }
            return snapshot;
        }
        if let Some(formatter) = progress {
            eprint!("\r{}", formatter.format_progress(&snapshot));
        }

        if !cancelled && deadline.map(|d| started.elapsed() >= d).unwrap_or(false) {
            warn!(run_id = %run_id, "Deadline reached, cancelling run");
            coordinator.cancel(run_id).await;
            cancelled = true;
            continue;
        }

        tokio::select! {
            _ = tokio::time::sleep(poll) => {}
            _ = &mut ctrl_c, if !cancelled => {
                warn!(run_id = %run_id, "Interrupted, cancelling run");
                coordinator.cancel(run_id).await;
                cancelled = true;
            }
        }
    }
}

/// Follow a tier sequence running on its own task
///
/// On Ctrl-C or once `deadline` passes, the active tier is cancelled on every
/// poll until the sequence gives up, so a tier submitted in between is
/// stopped too.
async fn watch_tiers(
    coordinator: &RunCoordinator,
    mut tiers: JoinHandle<Vec<String>>,
    deadline: Option<Duration>,
    poll: Duration,
    formatter: &ResultFormatter,
) -> Result<Vec<String>> {
    let started = Instant::now();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut stopping = false;

    loop {
        tokio::select! {
            joined = &mut tiers => {
                eprintln!();
                return Ok(joined?);
            }
            _ = tokio::time::sleep(poll) => {}
            _ = &mut ctrl_c, if !stopping => {
                warn!("Interrupted, cancelling the active tier");
                stopping = true;
            }
        }

        if !stopping && deadline.map(|d| started.elapsed() >= d).unwrap_or(false) {
            warn!("Deadline reached, cancelling the active tier");
            stopping = true;
        }
        if stopping {
            coordinator.cancel_active().await;
            continue;
        }

        let runs = coordinator.list().await;
        if let Some(active) = runs.iter().find(|r| r.status == RunStatus::Running) {
            eprint!("\r{}", formatter.format_progress(active));
        }
    }
}

fn show_plan(args: cli::PlanArgs, config: &AppConfig) -> Result<()> {
    let suite = TestSuite::load(&args.suite)?;
    let strategy = args
        .strategy
        .as_deref()
        .map(Strategy::parse_lenient)
        .unwrap_or(config.default_strategy);
    let pool_size = PoolPolicy::detect().effective_size(
        args.parallel,
        args.pool_size.unwrap_or(config.pool_size),
        strategy,
    );

    let units = engine::plan("plan", &suite.test_cases, strategy);
    let formatter = ResultFormatter::new(output_format(Some(&args.format)));
    println!("{}", formatter.format_plan(&units, strategy, pool_size));
    Ok(())
}

fn show_results(args: cli::ResultsArgs, config: &AppConfig) -> Result<()> {
    let storage = storage_for(config);

    match args.action {
        cli::ResultsAction::List { limit } => {
            let runs = storage.list_runs()?;
            let shown: Vec<_> = runs.into_iter().take(limit).collect();
            println!("{}", ResultFormatter::default().format_runs(&shown));
        }

        cli::ResultsAction::Show {
            run_id,
            format,
            failed,
        } => {
            let snapshot = match run_id {
                Some(id) => storage.load(&id)?,
                None => match storage.latest()? {
                    Some(snapshot) => snapshot,
                    None => {
                        println!("No stored runs in {}", storage.base_dir().display());
                        println!("   Run a suite with: qa-orchestrator run <suite.yaml>");
                        return Ok(());
                    }
                },
            };

            let mut snapshot = snapshot;
            if snapshot.outcomes.len() < snapshot.completed_units {
                // Snapshot written mid-run; the outcome log is more complete
                snapshot.outcomes = storage.load_outcomes(&snapshot.run_id)?;
            }
            if failed {
                snapshot.outcomes.retain(|o| !o.is_success());
            }

            let formatter = ResultFormatter::new(output_format(Some(&format)));
            println!("{}", formatter.format_snapshot(&snapshot));
        }

        cli::ResultsAction::Delete { run_id } => {
            storage.delete(&run_id)?;
            println!("✓ Deleted run {run_id}");
        }
    }

    Ok(())
}

fn manage_config(args: cli::ConfigArgs, explicit: Option<&Path>) -> Result<()> {
    match args.action {
        cli::ConfigAction::Init { output, force } => {
            let path = Path::new(&output);
            if path.exists() && !force {
                anyhow::bail!(
                    "Configuration file already exists: {output}. Use --force to overwrite."
                );
            }

            ConfigFile::example().save(path)?;
            println!("✓ Configuration file created: {output}");
            println!("\nEdit the file to customize your settings.");
        }

        cli::ConfigAction::Show { env, format } => {
            if env {
                EnvConfig::load().print_summary();
            } else {
                let effective = ConfigFile {
                    app: AppConfig::resolve(explicit)?,
                    ..ConfigFile::default()
                };
                let output = if format == "json" {
                    serde_json::to_string_pretty(&effective)?
                } else {
                    serde_yaml::to_string(&effective)?
                };
                println!("{output}");
            }
        }

        cli::ConfigAction::Validate { file } => {
            let path = file
                .map(std::path::PathBuf::from)
                .or_else(|| explicit.map(Path::to_path_buf))
                .or_else(ConfigFile::find)
                .ok_or_else(|| anyhow::anyhow!("No configuration file found"))?;

            match ConfigFile::load(&path) {
                Ok(_) => println!("✓ Configuration file is valid: {}", path.display()),
                Err(e) => {
                    println!("✗ Configuration file is invalid: {}", path.display());
                    println!("  Error: {e:#}");
                    return Err(e);
                }
            }
        }

        cli::ConfigAction::EnvHelp => config::print_env_help(),
    }

    Ok(())
}
