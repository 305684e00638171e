//! Match-Harvester main entry point
//!
//! This is the command-line interface for the Match-Harvester collector.

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use match_harvester::config::{load_config_with_hash, Config};
use match_harvester::fetch::FetcherSet;
use match_harvester::harvester::{ControllerSettings, JobProgress};
use match_harvester::output::{export_results, ExportFormat};
use match_harvester::storage::{CheckpointStore, JsonFileStore};
use match_harvester::{JobController, JobHandle, JobOptions, JobRequest, JobStatus};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Match-Harvester: a resumable, rate-limited match record collector
///
/// Match-Harvester fetches match records one identifier at a time, either
/// through an isolated browsing session or the structured query interface,
/// and checkpoints progress so interrupted jobs can be resumed.
#[derive(Parser, Debug)]
#[command(name = "match-harvester")]
#[command(version = "1.0.0")]
#[command(about = "A resumable, rate-limited match record collector", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Harvest every identifier from START to END
    Range {
        #[arg(allow_hyphen_values = true)]
        start: i64,
        #[arg(allow_hyphen_values = true)]
        end: i64,
        #[command(flatten)]
        job: JobArgs,
    },

    /// Harvest a comma or newline separated list (`@path` reads a file)
    List {
        #[arg(value_name = "IDS|@FILE")]
        ids: String,
        #[command(flatten)]
        job: JobArgs,
    },

    /// Continue the saved unfinished job
    Resume {
        /// Re-drive failed identifiers once the job completes
        #[arg(long)]
        retry_failed: bool,
    },

    /// Show the saved job and exit
    Status,

    /// Write saved results to a file
    Export {
        /// csv or json
        format: ExportFormat,
        /// Destination file
        output: PathBuf,
    },

    /// Discard the saved job and its results
    Clear,
}

#[derive(Args, Debug)]
struct JobArgs {
    /// Use the structured query interface
    #[arg(long, conflicts_with = "session")]
    structured: bool,

    /// Use isolated browsing sessions
    #[arg(long)]
    session: bool,

    /// Skip match events
    #[arg(long)]
    no_events: bool,

    /// Include per-minute timeline ratings
    #[arg(long)]
    timeline: bool,

    /// Skip formation ratings
    #[arg(long)]
    no_ratings: bool,

    /// Delay between items in milliseconds
    #[arg(long, value_name = "MS")]
    interval_ms: Option<u64>,

    /// Discard an unfinished saved job instead of refusing to start
    #[arg(long)]
    fresh: bool,

    /// Re-drive failed identifiers once the job completes
    #[arg(long)]
    retry_failed: bool,
}

impl JobArgs {
    fn options(&self, defaults: JobOptions) -> JobOptions {
        let use_structured_api = if self.structured {
            true
        } else if self.session {
            false
        } else {
            defaults.use_structured_api
        };

        JobOptions {
            include_events: defaults.include_events && !self.no_events,
            include_timeline: defaults.include_timeline || self.timeline,
            include_ratings: defaults.include_ratings && !self.no_ratings,
            use_structured_api,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    let store = Arc::new(JsonFileStore::new(
        &config.output.checkpoint_path,
        &config.output.results_path,
    ));

    match cli.command {
        Command::Status => handle_status(&store).await,
        Command::Export { format, output } => handle_export(&store, format, &output).await,
        Command::Clear => {
            build_controller(&config, config_hash, store)?.clear().await;
            println!("✓ Saved job and results discarded");
            Ok(())
        }
        Command::Resume { retry_failed } => {
            let controller = build_controller(&config, config_hash, store)?;
            handle_resume(&controller, retry_failed).await
        }
        Command::Range { start, end, job } => {
            let controller = build_controller(&config, config_hash, store)?;
            handle_start(&controller, &config, JobRequest::Range { start, end }, &job).await
        }
        Command::List { ids, job } => {
            let text = match ids.strip_prefix('@') {
                Some(path) => tokio::fs::read_to_string(path)
                    .await
                    .with_context(|| format!("Failed to read identifier list {}", path))?,
                None => ids,
            };
            let controller = build_controller(&config, config_hash, store)?;
            handle_start(&controller, &config, JobRequest::ExplicitList(text), &job).await
        }
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("match_harvester=info,warn"),
            1 => EnvFilter::new("match_harvester=debug,info"),
            2 => EnvFilter::new("match_harvester=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

fn build_controller(
    config: &Config,
    config_hash: String,
    store: Arc<JsonFileStore>,
) -> anyhow::Result<JobController> {
    let fetchers = FetcherSet::from_config(config).context("Failed to build HTTP client")?;
    let settings = ControllerSettings::from_config(&config.job, Some(config_hash));
    Ok(JobController::new(fetchers, store, settings))
}

/// Starts a range or list job, refusing to overwrite an unfinished one
async fn handle_start(
    controller: &JobController,
    config: &Config,
    request: JobRequest,
    args: &JobArgs,
) -> anyhow::Result<()> {
    match controller.load_on_startup().await {
        Ok(Some(offer)) if !args.fresh => bail!(
            "An unfinished job exists ({}/{} processed). Run `resume` to continue it or pass --fresh to discard it.",
            offer.cursor(),
            offer.total()
        ),
        Err(e) if !args.fresh => {
            return Err(e).context("Saved checkpoint is unreadable; pass --fresh to discard it")
        }
        _ => {}
    }

    if args.fresh {
        controller.clear().await;
    }

    let options = args.options(JobOptions::from(&config.job));
    let interval = args.interval_ms.map(Duration::from_millis);
    let handle = controller.start(request, options, interval).await?;
    let progress = handle.progress();
    println!("Started job over {} identifiers", progress.total);

    run_to_end(controller, handle, args.retry_failed).await
}

/// Restores the saved job and continues it
async fn handle_resume(controller: &JobController, retry_failed: bool) -> anyhow::Result<()> {
    let Some(offer) = controller.load_on_startup().await? else {
        println!("No unfinished job to resume.");
        return Ok(());
    };

    println!(
        "Resuming job: {}/{} processed ({} completed, {} failed)",
        offer.cursor(),
        offer.total(),
        offer.completed(),
        offer.failed()
    );

    let restored = controller.restore(offer).await?;
    if restored.cursor > 0 {
        tracing::info!("Continuing from identifier index {}", restored.cursor);
    }
    let handle = controller.resume().await?;

    run_to_end(controller, handle, retry_failed).await
}

/// Waits for the job, pausing cooperatively on Ctrl-C
async fn run_to_end(
    controller: &JobController,
    mut handle: JobHandle,
    retry_failed: bool,
) -> anyhow::Result<()> {
    let pauser = controller.clone();
    let signal = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!("\nPausing after the current item...");
            if let Err(e) = pauser.pause() {
                tracing::warn!("Could not pause: {}", e);
            }
        }
    });

    let mut progress = handle.wait().await;
    report(&progress);

    if retry_failed && progress.status == JobStatus::Completed && progress.failed > 0 {
        println!("Retrying {} failed identifiers", progress.failed);
        handle = controller.retry_failed().await?;
        progress = handle.wait().await;
        report(&progress);
    }

    signal.abort();

    let failures = controller.failures();
    if !failures.is_empty() {
        println!("\nFailed identifiers:");
        for failure in &failures {
            println!("  {}: {}", failure.match_id, failure.message);
        }
    }

    match progress.status {
        JobStatus::Paused => println!("\nJob paused. Run `resume` to continue."),
        JobStatus::Completed => println!(
            "\n✓ {} records collected",
            controller.results().len()
        ),
        _ => {}
    }

    if let Some(error) = progress.last_error {
        bail!("Job stopped: {}", error);
    }

    Ok(())
}

fn report(progress: &JobProgress) {
    println!(
        "Job {}: {}/{} processed, {} completed, {} failed",
        progress.status, progress.cursor, progress.total, progress.completed, progress.failed
    );
}

/// Shows the saved checkpoint without starting anything
async fn handle_status(store: &JsonFileStore) -> anyhow::Result<()> {
    println!("Checkpoint: {}", store.checkpoint_path().display());
    println!("Results: {}\n", store.results_path().display());

    match store.load_checkpoint().await? {
        None => println!("No saved job."),
        Some(state) => {
            println!(
                "Saved job: {}/{} processed ({} completed, {} failed)",
                state.current_index,
                state.match_ids.len(),
                state.completed_matches,
                state.failed_matches.len()
            );
            println!(
                "  Strategy: {}",
                if state.options.use_structured_api {
                    "structured query"
                } else {
                    "isolated session"
                }
            );
            println!(
                "  Events: {}, timeline: {}, ratings: {}",
                state.options.include_events,
                state.options.include_timeline,
                state.options.include_ratings
            );
            println!("  Interval: {}ms", state.interval);
            if state.is_resumable() {
                println!("  Run `resume` to continue it.");
            }
            for failure in &state.failed_matches {
                println!("  failed {}: {}", failure.match_id, failure.message);
            }
        }
    }

    let results = store.load_results().await?;
    println!("\nSaved records: {}", results.len());
    Ok(())
}

/// Exports saved results to a file
async fn handle_export(
    store: &JsonFileStore,
    format: ExportFormat,
    output: &Path,
) -> anyhow::Result<()> {
    let records = store.load_results().await?;
    let bytes = export_results(&records, format)?;
    tokio::fs::write(output, bytes)
        .await
        .with_context(|| format!("Failed to write {}", output.display()))?;

    println!(
        "✓ Exported {} records as {} to: {}",
        records.len(),
        format,
        output.display()
    );
    Ok(())
}
