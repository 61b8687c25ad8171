//! High-level runner API for the parallel worker pool.
//!
//! This module provides a simplified public interface that encapsulates the
//! setup of the job source, command template, coordinator and result sink.
//!
//! This is the primary API for external users and for the CLI.

use anyhow::{Result, anyhow};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::config::PLACEHOLDER;
use crate::coordination::{CommandTemplate, Coordinator, Destination, RunConfigBuilder};
use crate::io::LineFileJobSource;

pub use crate::config::DEFAULT_WORKER_COUNT;

/// Arguments for running a pool
#[derive(Debug, Clone)]
pub struct RunArgs {
    /// Number of concurrent workers, at least 1
    pub worker_count: usize,
    /// Newline-delimited file with one job per line
    pub arg_list: PathBuf,
    /// Executable followed by its argument tokens
    pub command: Vec<String>,
    /// Output file; results go to the console when unset
    pub output: Option<PathBuf>,
    pub quiet: bool,
}

/// Result of a completed pool run
#[derive(Debug)]
pub struct RunSummary {
    pub run_id: String,
    pub jobs_total: usize,
    pub jobs_succeeded: usize,
    pub jobs_failed: usize,
    pub records_written: usize,
    pub duration: Duration,
    /// Where the records went: a file path, or "console"
    pub output: String,
    /// True when the requested output file could not be created
    pub output_fell_back: bool,
    /// p50, p90, p99 job durations in milliseconds
    pub job_duration_percentiles_ms: (Option<u64>, Option<u64>, Option<u64>),
}

/// Run the command once per line of the argument list
///
/// Individual job failures are reported inside their result blocks and never
/// fail the run. Errors are returned only for invalid arguments or an
/// unreadable argument list.
///
/// # Example
///
/// ```no_run
/// use parallel_worker::runner::{RunArgs, run_pool};
/// use std::path::PathBuf;
///
/// # async fn example() -> anyhow::Result<()> {
/// let args = RunArgs {
///     worker_count: 4,
///     arg_list: PathBuf::from("hosts.txt"),
///     command: vec!["ping".to_string(), "-c1 %arg".to_string()],
///     output: Some(PathBuf::from("results.txt")),
///     quiet: true,
/// };
///
/// let summary = run_pool(args).await?;
/// println!("{} of {} jobs failed", summary.jobs_failed, summary.jobs_total);
/// # Ok(())
/// # }
/// ```
pub async fn run_pool(args: RunArgs) -> Result<RunSummary> {
    if args.worker_count == 0 {
        return Err(anyhow!("Number of workers must be at least 1"));
    }

    let template = CommandTemplate::parse(&args.command)?;
    if !template.has_placeholder() {
        warn!(
            "Command template '{}' has no {} placeholder, every job runs the same command",
            template, PLACEHOLDER
        );
    }
    let requested = Destination::from_option(args.output);

    let config = RunConfigBuilder::default()
        .worker_count(args.worker_count)
        .template(template)
        .destination(requested.clone())
        .quiet(args.quiet)
        .build()?;

    let job_source = Arc::new(LineFileJobSource::new(&args.arg_list));
    let coordinator = Coordinator::new(job_source);

    let result = coordinator.run(&config).await?;

    Ok(RunSummary {
        run_id: result.run_id,
        jobs_total: result.jobs_total,
        jobs_succeeded: result.stats.jobs_succeeded,
        jobs_failed: result.stats.jobs_failed,
        records_written: result.stats.records_written(),
        duration: result.duration,
        output: result.destination.to_string(),
        output_fell_back: result.destination != requested,
        job_duration_percentiles_ms: result.stats.get_percentiles(),
    })
}
