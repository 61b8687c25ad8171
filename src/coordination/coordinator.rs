use anyhow::{Context, Result};
use derive_builder::Builder;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use super::queue::{JobFeeder, JobQueue};
use super::sink::{Destination, DestinationSink};
use super::template::CommandTemplate;
use super::worker::{ResultRecord, Worker};
use crate::config::{DEFAULT_WORKER_COUNT, JOB_QUEUE_CAPACITY};
use crate::io::{Job, JobSource};
use crate::telemetry::ProgressStats;

/// Immutable configuration for a single pool run
#[derive(Debug, Clone, Builder)]
pub struct RunConfig {
    #[builder(default = "DEFAULT_WORKER_COUNT")]
    pub worker_count: usize,
    pub template: CommandTemplate,
    #[builder(default = "Destination::Console")]
    pub destination: Destination,
    #[builder(default)]
    pub quiet: bool,
}

/// Result of a completed pool run
#[derive(Debug)]
pub struct RunResult {
    pub run_id: String,
    pub jobs_total: usize,
    pub stats: ProgressStats,
    pub duration: Duration,
    /// Destination the records were actually written to
    pub destination: Destination,
}

/// The Coordinator drives a run from job source to result sink.
pub struct Coordinator {
    job_source: Arc<dyn JobSource>,
}

impl Coordinator {
    pub fn new(job_source: Arc<dyn JobSource>) -> Self {
        Self { job_source }
    }

    /// Run the complete pool
    ///
    /// 1. Read every job (fatal on failure, before any worker starts)
    /// 2. Open the result destination and start the sink
    /// 3. Spawn the workers
    /// 4. Feed jobs into the shared queue, then close it
    /// 5. Wait for the workers, then for the sink to drain
    pub async fn run(&self, config: &RunConfig) -> Result<RunResult> {
        let start_time = Instant::now();
        let run_id = Uuid::new_v4().to_string();
        info!("Starting run: {}", run_id);

        // 1. Read jobs
        let jobs = self
            .job_source
            .read_jobs()
            .await
            .with_context(|| format!("Invalid argument list {}", self.job_source.describe()))?;
        let jobs_total = jobs.len();
        info!(
            "Read {} jobs from {}",
            jobs_total,
            self.job_source.describe()
        );

        // 2. Open destination and start the sink
        let (sink, destination) = DestinationSink::open(&config.destination).await;
        let sink = match Self::setup_progress_tracking(config, &destination, jobs_total) {
            Some(bar) => sink.with_progress(bar),
            None => sink,
        };

        let (result_tx, result_rx) = mpsc::unbounded_channel::<ResultRecord>();
        let sink_handle = tokio::spawn(sink.drain(result_rx));

        // 3. Spawn workers
        let (feeder, queue) = JobQueue::bounded(JOB_QUEUE_CAPACITY);
        let worker_handles = Self::spawn_worker_pool(config, queue, result_tx);

        // 4. Feed jobs, closing the queue when done
        Self::feed_jobs(feeder, jobs).await;

        // 5. Join workers; the result channel closes once the last one exits
        let worker_results = futures::future::join_all(worker_handles).await;
        for (i, result) in worker_results.iter().enumerate() {
            match result {
                Ok(Ok(processed)) => {
                    info!("Worker {} processed {} jobs", i, processed);
                }
                Ok(Err(e)) => {
                    warn!("Worker {} failed: {:#}", i, e);
                }
                Err(e) => {
                    warn!("Worker {} panicked: {:#}", i, e);
                }
            }
        }

        let (_writer, stats) = sink_handle.await.context("Result sink task failed")?;
        let duration = start_time.elapsed();

        info!(
            "Run {} complete: {} jobs, {} succeeded, {} failed in {:.2}s",
            run_id,
            stats.jobs_completed,
            stats.jobs_succeeded,
            stats.jobs_failed,
            duration.as_secs_f64()
        );

        Ok(RunResult {
            run_id,
            jobs_total,
            stats,
            duration,
            destination,
        })
    }

    /// Spawn worker tasks pulling from the shared queue
    fn spawn_worker_pool(
        config: &RunConfig,
        queue: JobQueue,
        result_tx: mpsc::UnboundedSender<ResultRecord>,
    ) -> Vec<tokio::task::JoinHandle<Result<usize>>> {
        let worker_count = config.worker_count.max(1);
        info!("Spawning {} workers...", worker_count);

        let template = Arc::new(config.template.clone());
        let mut worker_handles = Vec::with_capacity(worker_count);

        for worker_id in 0..worker_count {
            let worker = Worker::new(worker_id, Arc::clone(&template), result_tx.clone());
            let queue = queue.clone();

            let handle = tokio::spawn(async move { worker.run(queue).await });

            worker_handles.push(handle);
        }

        worker_handles
    }

    /// Push every job onto the queue in order, then close it
    async fn feed_jobs(feeder: JobFeeder, jobs: Vec<Job>) {
        for job in jobs {
            if feeder.send(job).await.is_err() {
                warn!("All workers exited before the job queue was drained");
                break;
            }
        }
    }

    /// Progress bar over completed jobs, shown only when results go to a file
    fn setup_progress_tracking(
        config: &RunConfig,
        destination: &Destination,
        jobs_total: usize,
    ) -> Option<ProgressBar> {
        if config.quiet || *destination == Destination::Console {
            return None;
        }

        let bar = ProgressBar::new(jobs_total as u64);
        let style = ProgressStyle::default_bar()
            .template("[{elapsed_precise}] Jobs: [{bar:30.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
            .map(|style| style.progress_chars("=>-"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        bar.set_style(style);

        Some(bar)
    }
}
