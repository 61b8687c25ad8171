//! Worker pool coordination: job queue, workers and the result sink

pub mod coordinator;
pub mod queue;
pub mod sink;
pub mod template;
pub mod worker;

pub use coordinator::{Coordinator, RunConfigBuilder};
pub use sink::Destination;
pub use template::CommandTemplate;
pub use worker::ResultRecord;
