//! mjpeg-relay: live screen content over HTTP as motion JPEG
//!
//! A client connects, sends one request, and either gets a JSON/static
//! response or a `multipart/x-mixed-replace` stream of JPEG frames pulled
//! from a [`CaptureSource`] and compressed by an [`Encoder`].
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use mjpeg_relay::{RelayContext, RelayServer, ServerConfig, SettingsStore, SoftwareJpegEncoder, TestPatternSource};
//!
//! # async fn run() -> mjpeg_relay::Result<()> {
//! let context = RelayContext::new(
//!     Arc::new(TestPatternSource::default()),
//!     Arc::new(SoftwareJpegEncoder::new()),
//!     Arc::new(SettingsStore::default()),
//! );
//! let server = RelayServer::new(ServerConfig::default(), context);
//! server.run().await
//! # }
//! ```

pub mod capture;
pub mod encoder;
pub mod error;
pub mod http;
pub mod registry;
pub mod server;
pub mod session;
pub mod settings;
pub mod stats;
pub mod stream;

#[cfg(test)]
mod test_support;

pub use capture::{CaptureSource, DisplayInfo, Frame, TestPatternSource};
pub use encoder::{Encoder, SoftwareJpegEncoder};
pub use error::{Error, Result};
pub use server::{RelayServer, ServerConfig};
pub use session::RelayContext;
pub use settings::{Settings, SettingsStore};
pub use stats::PipelineStats;
pub use stream::{PipelineController, PipelineState};
