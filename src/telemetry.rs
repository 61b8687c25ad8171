use crate::coordination::ResultRecord;

/// Statistics aggregated by the result sink as records arrive
#[derive(Debug, Default, Clone)]
pub struct ProgressStats {
    pub jobs_completed: usize,
    pub jobs_succeeded: usize,
    pub jobs_failed: usize,
    /// Records that could not be written to the destination
    pub write_failures: usize,
    pub job_durations_ms: Vec<u64>,
}

impl ProgressStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update stats with a finished job
    pub fn update(&mut self, record: &ResultRecord) {
        self.jobs_completed += 1;
        if record.is_success() {
            self.jobs_succeeded += 1;
        } else {
            self.jobs_failed += 1;
        }
        self.job_durations_ms.push(record.duration.as_millis() as u64);
    }

    pub fn record_write_failure(&mut self) {
        self.write_failures += 1;
    }

    /// Records successfully written to the destination
    pub fn records_written(&self) -> usize {
        self.jobs_completed - self.write_failures
    }

    /// Calculate percentile from job durations
    pub fn percentile(&self, p: f64) -> Option<u64> {
        if self.job_durations_ms.is_empty() {
            return None;
        }

        let mut sorted = self.job_durations_ms.clone();
        sorted.sort_unstable();

        let index = ((p / 100.0) * sorted.len() as f64).ceil() as usize;
        let index = index.saturating_sub(1).min(sorted.len() - 1);

        Some(sorted[index])
    }

    /// Get p50, p90, p99 percentiles
    pub fn get_percentiles(&self) -> (Option<u64>, Option<u64>, Option<u64>) {
        (
            self.percentile(50.0),
            self.percentile(90.0),
            self.percentile(99.0),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Local;
    use std::time::Duration;

    fn record(exit_code: i32, millis: u64) -> ResultRecord {
        ResultRecord {
            worker_id: 0,
            started_at: Local::now(),
            duration: Duration::from_millis(millis),
            command_line: "true".to_string(),
            exit_code,
            error: if exit_code == 0 {
                String::new()
            } else {
                format!("exit status: {}", exit_code)
            },
            stdout: String::new(),
            stderr: String::new(),
        }
    }

    #[test]
    fn test_update_counts_outcomes() {
        let mut stats = ProgressStats::new();
        stats.update(&record(0, 5));
        stats.update(&record(2, 7));
        stats.update(&record(0, 9));
        stats.record_write_failure();

        assert_eq!(stats.jobs_completed, 3);
        assert_eq!(stats.jobs_succeeded, 2);
        assert_eq!(stats.jobs_failed, 1);
        assert_eq!(stats.records_written(), 2);
    }

    #[test]
    fn test_percentiles() {
        let mut stats = ProgressStats::new();
        assert_eq!(stats.percentile(50.0), None);

        for millis in 1..=100 {
            stats.update(&record(0, millis));
        }

        let (p50, p90, p99) = stats.get_percentiles();
        assert_eq!(p50, Some(50));
        assert_eq!(p90, Some(90));
        assert_eq!(p99, Some(99));
        assert_eq!(stats.percentile(0.0), Some(1));
    }
}
