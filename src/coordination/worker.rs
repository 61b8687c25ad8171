use anyhow::{Result, anyhow};
use chrono::{DateTime, Local};
use std::ffi::OsStr;
use std::process::{Output, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::queue::JobQueue;
use super::template::{CommandTemplate, ResolvedCommand};
use crate::config::SIGNALED_EXIT_CODE;

/// Outcome of running one job, sent from a worker to the result sink
#[derive(Debug, Clone)]
pub struct ResultRecord {
    pub worker_id: usize,
    pub started_at: DateTime<Local>,
    pub duration: Duration,
    /// Command line after placeholder substitution
    pub command_line: String,
    /// Child exit code, 0 when not otherwise determined
    pub exit_code: i32,
    /// Empty when the job succeeded
    pub error: String,
    pub stdout: String,
    pub stderr: String,
}

impl ResultRecord {
    pub fn is_success(&self) -> bool {
        self.exit_code == 0 && self.error.is_empty()
    }
}

/// Worker that runs jobs from the shared queue until it is closed
pub struct Worker {
    pub worker_id: usize,
    template: Arc<CommandTemplate>,
    result_tx: mpsc::UnboundedSender<ResultRecord>,
}

impl Worker {
    pub fn new(
        worker_id: usize,
        template: Arc<CommandTemplate>,
        result_tx: mpsc::UnboundedSender<ResultRecord>,
    ) -> Self {
        Self {
            worker_id,
            template,
            result_tx,
        }
    }

    /// Run the worker loop until the queue is exhausted and closed
    ///
    /// Returns the number of jobs this worker processed.
    pub async fn run(&self, queue: JobQueue) -> Result<usize> {
        let mut processed = 0;

        while let Some(job) = queue.claim().await {
            let record = self.execute(&job).await;

            if !record.is_success() {
                debug!(
                    worker_id = self.worker_id,
                    command = %record.command_line,
                    exit_code = record.exit_code,
                    error = %record.error,
                    "Job failed"
                );
            }

            self.result_tx.send(record).map_err(|_| {
                anyhow!(
                    "Result channel closed before worker {} finished",
                    self.worker_id
                )
            })?;
            processed += 1;
        }

        debug!(
            worker_id = self.worker_id,
            processed, "Job queue closed, worker exiting"
        );
        Ok(processed)
    }

    /// Execute a single job and capture its outcome
    pub async fn execute(&self, job: impl AsRef<OsStr>) -> ResultRecord {
        let resolved = self.template.resolve(job);
        let command_line = resolved.to_string();

        debug!(worker_id = self.worker_id, command = %command_line, "Executing job");

        let started_at = Local::now();
        let start_instant = Instant::now();
        let result = Self::spawn(&resolved).output().await;
        let duration = start_instant.elapsed();

        let (exit_code, error, stdout, stderr) = Self::process_output(result);

        if error.is_empty() {
            debug!(
                worker_id = self.worker_id,
                command = %command_line,
                duration_ms = duration.as_millis() as u64,
                "Job completed"
            );
        } else if exit_code == 0 {
            warn!(
                worker_id = self.worker_id,
                command = %command_line,
                error = %error,
                "Job could not be started"
            );
        }

        ResultRecord {
            worker_id: self.worker_id,
            started_at,
            duration,
            command_line,
            exit_code,
            error,
            stdout,
            stderr,
        }
    }

    /// Build the child process. The environment is inherited as is.
    fn spawn(resolved: &ResolvedCommand) -> Command {
        let mut command = Command::new(&resolved.program);
        if let Some(ref argument) = resolved.argument {
            command.arg(argument);
        }
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        command
    }

    /// Map the raw process result to (exit code, error, stdout, stderr)
    fn process_output(result: std::io::Result<Output>) -> (i32, String, String, String) {
        match result {
            Ok(output) => {
                let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
                let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

                if output.status.success() {
                    (0, String::new(), stdout, stderr)
                } else {
                    let exit_code = output.status.code().unwrap_or(SIGNALED_EXIT_CODE);
                    (exit_code, output.status.to_string(), stdout, stderr)
                }
            }
            Err(e) => (0, e.to_string(), String::new(), String::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn worker_for(tokens: &[&str]) -> (Worker, mpsc::UnboundedReceiver<ResultRecord>) {
        let tokens: Vec<String> = tokens.iter().map(|s| s.to_string()).collect();
        let template = Arc::new(CommandTemplate::parse(&tokens).unwrap());
        let (tx, rx) = mpsc::unbounded_channel();
        (Worker::new(7, template, tx), rx)
    }

    fn script(body: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{}", body).unwrap();
        file.flush().unwrap();
        file
    }

    #[tokio::test]
    async fn test_execute_success_captures_stdout() {
        let (worker, _rx) = worker_for(&["echo", "val=%arg"]);

        let record = worker.execute("5").await;

        assert_eq!(record.worker_id, 7);
        assert_eq!(record.command_line, "echo val=5");
        assert_eq!(record.exit_code, 0);
        assert!(record.error.is_empty());
        assert_eq!(record.stdout, "val=5\n");
        assert!(record.stderr.is_empty());
        assert!(record.is_success());
    }

    #[tokio::test]
    async fn test_execute_nonzero_exit() {
        let exit_two = script("echo oops >&2\nexit 2");
        let (worker, _rx) = worker_for(&["sh", "%arg"]);

        let record = worker.execute(exit_two.path().to_str().unwrap()).await;

        assert_eq!(record.exit_code, 2);
        assert!(!record.error.is_empty());
        assert!(record.error.contains('2'));
        assert_eq!(record.stderr.trim(), "oops");
        assert!(!record.is_success());
    }

    #[tokio::test]
    async fn test_execute_killed_by_signal() {
        let killed = script("kill -9 $$");
        let (worker, _rx) = worker_for(&["sh", "%arg"]);

        let record = worker.execute(killed.path().to_str().unwrap()).await;

        assert_eq!(record.exit_code, SIGNALED_EXIT_CODE);
        assert_eq!(record.exit_code, -1);
        assert!(!record.error.is_empty());
        assert!(!record.is_success());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_execute_passes_non_utf8_job_unchanged() {
        use std::os::unix::ffi::OsStringExt;
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::TempDir::new().unwrap();
        let check = dir.path().join("check.sh");
        std::fs::write(
            &check,
            "#!/bin/sh\n[ \"$1\" = \"$(printf 'caf\\351')\" ] || exit 3\n",
        )
        .unwrap();
        std::fs::set_permissions(&check, std::fs::Permissions::from_mode(0o755)).unwrap();

        let (worker, _rx) = worker_for(&[check.to_str().unwrap(), "%arg"]);
        let job = std::ffi::OsString::from_vec(b"caf\xe9".to_vec());

        let record = worker.execute(&job).await;

        assert_eq!(record.exit_code, 0, "error: {}", record.error);
        assert!(record.error.is_empty());
        assert!(record.command_line.ends_with("caf\u{FFFD}"));
    }

    #[tokio::test]
    async fn test_execute_launch_failure() {
        let (worker, _rx) = worker_for(&["/nonexistent/binary/for-tests", "%arg"]);

        let record = worker.execute("x").await;

        assert_eq!(record.exit_code, 0);
        assert!(!record.error.is_empty());
        assert_eq!(record.command_line, "/nonexistent/binary/for-tests x");
        assert!(record.stdout.is_empty());
    }

    #[tokio::test]
    async fn test_child_inherits_environment() {
        let env_script = script("printf '%s' \"$PATH\"");
        let (worker, _rx) = worker_for(&["sh", "%arg"]);

        let record = worker.execute(env_script.path().to_str().unwrap()).await;

        assert_eq!(record.exit_code, 0);
        assert_eq!(record.stdout, std::env::var("PATH").unwrap_or_default());
    }

    #[tokio::test]
    async fn test_run_emits_one_record_per_job() {
        let (worker, mut rx) = worker_for(&["printf", "%arg"]);
        let (feeder, queue) = JobQueue::bounded(8);
        for job in ["a", "b", "c"] {
            feeder.send(job.into()).await.unwrap();
        }
        drop(feeder);

        let processed = worker.run(queue).await.unwrap();
        drop(worker);

        let mut outputs = Vec::new();
        while let Some(record) = rx.recv().await {
            outputs.push(record.stdout);
        }

        assert_eq!(processed, 3);
        assert_eq!(outputs, vec!["a", "b", "c"]);
    }
}
