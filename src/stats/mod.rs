//! Pipeline statistics

pub mod metrics;

pub use metrics::{PipelineCounters, PipelineStats};
