//! I/O abstraction layer for reading job lists from different sources

pub mod job_source;

pub use job_source::{Job, JobSource, LineFileJobSource};
