//! Per-connection streaming pipeline
//!
//! - [`geometry`]: output size selection
//! - [`sink`]: multipart writer over the connection's write half
//! - [`controller`]: capture, encode and send with single-slot backpressure

pub mod controller;
pub mod geometry;
pub mod sink;

pub use controller::{PipelineController, PipelineState};
pub use geometry::target_dimensions;
pub use sink::{multipart_chunk, OutputSink, SendCallback};
