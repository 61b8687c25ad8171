//! Configuration constants for the worker pool
//!
//! This module centralizes the fixed parameters used throughout the
//! application.

// ============================================================================
// Command Template Configuration
// ============================================================================

/// Marker replaced by the job's line in the joined argument string
pub const PLACEHOLDER: &str = "%arg";

// ============================================================================
// Worker Configuration
// ============================================================================

pub const DEFAULT_WORKER_COUNT: usize = 1;

/// Capacity of the shared job queue
///
/// Kept at 1 so the producer hands jobs over one at a time and blocks while
/// every worker is busy. Producer speed is throttled by consumer throughput.
pub const JOB_QUEUE_CAPACITY: usize = 1;

/// Exit code recorded when a child was terminated by a signal
pub const SIGNALED_EXIT_CODE: i32 = -1;
