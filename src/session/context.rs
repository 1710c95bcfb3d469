//! Shared service context
//!
//! Handles every session needs to serve a request: the capture source, the
//! encoder, the settings store, and the optional static asset root.

use std::sync::Arc;

use crate::capture::CaptureSource;
use crate::encoder::Encoder;
use crate::http::StaticFiles;
use crate::settings::SettingsStore;

/// Context cloned into each connection task
pub struct RelayContext<C: CaptureSource, E: Encoder> {
    pub capture: Arc<C>,
    pub encoder: Arc<E>,
    pub settings: Arc<SettingsStore>,
    pub static_files: Option<Arc<StaticFiles>>,
}

impl<C: CaptureSource, E: Encoder> RelayContext<C, E> {
    pub fn new(capture: Arc<C>, encoder: Arc<E>, settings: Arc<SettingsStore>) -> Self {
        Self {
            capture,
            encoder,
            settings,
            static_files: None,
        }
    }

    /// Serve static assets from `files`
    pub fn with_static_files(mut self, files: StaticFiles) -> Self {
        self.static_files = Some(Arc::new(files));
        self
    }
}

impl<C: CaptureSource, E: Encoder> Clone for RelayContext<C, E> {
    fn clone(&self) -> Self {
        Self {
            capture: Arc::clone(&self.capture),
            encoder: Arc::clone(&self.encoder),
            settings: Arc::clone(&self.settings),
            static_files: self.static_files.clone(),
        }
    }
}
