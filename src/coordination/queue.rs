//! Shared FIFO job queue
//!
//! A bounded tokio channel whose receiving half is shared by every worker.
//! Workers call [`JobQueue::claim`] and never see the lock guarding the
//! receiver; each job is handed to exactly one caller.

use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};

use crate::io::Job;

/// Producer half of the job queue. Dropping it closes the queue.
pub type JobFeeder = mpsc::Sender<Job>;

/// Consumer half of the job queue, cloneable across workers
#[derive(Clone)]
pub struct JobQueue {
    receiver: Arc<Mutex<mpsc::Receiver<Job>>>,
}

impl JobQueue {
    /// Create a queue holding at most `capacity` pending jobs
    pub fn bounded(capacity: usize) -> (JobFeeder, JobQueue) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            tx,
            JobQueue {
                receiver: Arc::new(Mutex::new(rx)),
            },
        )
    }

    /// Claim the next job in enqueue order
    ///
    /// Waits while the queue is empty but still open. Returns `None` once the
    /// feeder has been dropped and every queued job has been claimed.
    pub async fn claim(&self) -> Option<Job> {
        self.receiver.lock().await.recv().await
    }
}
