//! Result sink: the single consumer of result records
//!
//! Records are rendered into self-contained blocks and written one at a time.
//! Only one task ever owns the writer, so blocks from different jobs cannot
//! interleave.

use indicatif::ProgressBar;
use std::fmt;
use std::path::PathBuf;
use tokio::fs::File;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::worker::ResultRecord;
use crate::telemetry::ProgressStats;

/// Where result blocks are written
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    Console,
    File(PathBuf),
}

impl Destination {
    pub fn from_option(path: Option<PathBuf>) -> Self {
        match path {
            Some(path) => Destination::File(path),
            None => Destination::Console,
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Console => write!(f, "console"),
            Destination::File(path) => write!(f, "{}", path.display()),
        }
    }
}

pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Sink bound to the console or an output file
pub type DestinationSink = ResultSink<BoxedWriter>;

/// Serializes result records to a single writer
pub struct ResultSink<W> {
    writer: W,
    stats: ProgressStats,
    progress: Option<ProgressBar>,
}

impl DestinationSink {
    /// Open the destination, falling back to the console if the file cannot
    /// be created. Returns the sink and the destination actually in use.
    pub async fn open(destination: &Destination) -> (Self, Destination) {
        match destination {
            Destination::Console => (
                Self::new(Box::new(tokio::io::stdout()) as BoxedWriter),
                Destination::Console,
            ),
            Destination::File(path) => match File::create(path).await {
                Ok(file) => {
                    info!("Writing results to {}", path.display());
                    (
                        Self::new(Box::new(file) as BoxedWriter),
                        destination.clone(),
                    )
                }
                Err(e) => {
                    warn!(
                        "Unable to open output file {}: {}. Writing results to console",
                        path.display(),
                        e
                    );
                    (
                        Self::new(Box::new(tokio::io::stdout()) as BoxedWriter),
                        Destination::Console,
                    )
                }
            },
        }
    }
}

impl<W: AsyncWrite + Unpin> ResultSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            stats: ProgressStats::new(),
            progress: None,
        }
    }

    /// Advance `bar` once per record written
    pub fn with_progress(mut self, bar: ProgressBar) -> Self {
        self.progress = Some(bar);
        self
    }

    /// Consume records until every sender has been dropped
    ///
    /// Returns the writer, flushed, together with the run statistics.
    pub async fn drain(
        mut self,
        mut result_rx: mpsc::UnboundedReceiver<ResultRecord>,
    ) -> (W, ProgressStats) {
        while let Some(record) = result_rx.recv().await {
            self.stats.update(&record);

            if let Err(e) = self.write_record(&record).await {
                warn!(
                    "Failed to write result for '{}': {}",
                    record.command_line, e
                );
                self.stats.record_write_failure();
            }

            if let Some(ref bar) = self.progress {
                bar.inc(1);
            }
        }

        if let Err(e) = self.writer.flush().await {
            warn!("Failed to flush results: {}", e);
        }

        if let Some(bar) = self.progress.take() {
            bar.finish_with_message("All jobs completed");
        }

        (self.writer, self.stats)
    }

    async fn write_record(&mut self, record: &ResultRecord) -> std::io::Result<()> {
        let block = format_record(record);
        self.writer.write_all(block.as_bytes()).await?;
        self.writer.flush().await
    }
}

/// Render a record as a labeled block followed by a blank line
pub fn format_record(record: &ResultRecord) -> String {
    format!(
        "Worker id: {}\n\
         Command: {}\n\
         Start at: {}\n\
         Duration: {:?}\n\
         Exit code: {}\n\
         Error: {}\n\
         StdOut: {}\n\
         StdErr: {}\n\n",
        record.worker_id,
        record.command_line,
        record.started_at.format("%Y-%m-%d %H:%M:%S%.9f %:z"),
        record.duration,
        record.exit_code,
        record.error,
        record.stdout.trim(),
        record.stderr.trim(),
    )
}
