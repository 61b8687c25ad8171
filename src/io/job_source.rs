use anyhow::{Context, Result};
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};

/// One unit of work: a single line of the argument list, bytes as read
pub type Job = OsString;

/// Produces the finite, ordered list of jobs for a run
#[async_trait]
pub trait JobSource: Send + Sync {
    /// Read every job, preserving source order
    async fn read_jobs(&self) -> Result<Vec<Job>>;

    /// Human readable location of the jobs, used in logs
    fn describe(&self) -> String;
}

/// JobSource implementation for local newline-delimited files
#[derive(Clone)]
pub struct LineFileJobSource {
    file_path: PathBuf,
}

impl LineFileJobSource {
    pub fn new(file_path: impl AsRef<Path>) -> Self {
        Self {
            file_path: file_path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl JobSource for LineFileJobSource {
    async fn read_jobs(&self) -> Result<Vec<Job>> {
        let file = File::open(&self.file_path).await.with_context(|| {
            format!(
                "Failed to open argument list {}",
                self.file_path.display()
            )
        })?;

        let mut segments = BufReader::new(file).split(b'\n');
        let mut jobs = Vec::new();

        while let Some(mut segment) = segments
            .next_segment()
            .await
            .context("Failed to read argument list")?
        {
            if segment.last() == Some(&b'\r') {
                segment.pop();
            }
            jobs.push(job_from_bytes(segment));
        }

        Ok(jobs)
    }

    fn describe(&self) -> String {
        self.file_path.display().to_string()
    }
}

#[cfg(unix)]
fn job_from_bytes(bytes: Vec<u8>) -> Job {
    use std::os::unix::ffi::OsStringExt;
    OsString::from_vec(bytes)
}

#[cfg(not(unix))]
fn job_from_bytes(bytes: Vec<u8>) -> Job {
    OsString::from(String::from_utf8_lossy(&bytes).into_owned())
}
