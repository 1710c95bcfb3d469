//! Capture source boundary
//!
//! A capture source enumerates displays and, once subscribed, pushes raw
//! frames into a [`FrameHandler`] from its own execution context at its own
//! cadence. The relay never pulls frames; backpressure is applied by the
//! pipeline controller dropping frames inside the handler.
//!
//! [`TestPatternSource`] is a synthetic implementation used by the binary and
//! the end-to-end tests.

pub mod frame;
pub mod pattern;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::error::CaptureError;

pub use frame::{DisplayInfo, Frame, PixelFormat};
pub use pattern::{PatternSubscription, TestPatternSource};

/// Callback invoked for every captured frame
pub type FrameHandler = Arc<dyn Fn(Frame) + Send + Sync>;

/// Parameters for a capture subscription
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureOptions {
    /// Output width (frames are scaled to this size by the source)
    pub width: u32,
    /// Output height
    pub height: u32,
    /// Lower bound on the spacing between delivered frames
    pub minimum_frame_interval: Duration,
    /// Frames the source may keep in flight internally
    pub queue_depth: u32,
}

/// A live capture feed. Frames stop arriving once [`stop`](Self::stop) resolves.
pub trait CaptureSubscription: Send + 'static {
    fn stop(self) -> impl Future<Output = ()> + Send;
}

/// Provider of displays and raw frames
pub trait CaptureSource: Send + Sync + 'static {
    type Subscription: CaptureSubscription;

    /// List capturable displays with their native pixel size
    fn displays(&self) -> impl Future<Output = Result<Vec<DisplayInfo>, CaptureError>> + Send;

    /// Look up one display by id
    fn find_display(&self, id: u32) -> impl Future<Output = Result<DisplayInfo, CaptureError>> + Send {
        async move {
            self.displays()
                .await?
                .into_iter()
                .find(|display| display.id == id)
                .ok_or(CaptureError::DisplayNotFound(id))
        }
    }

    /// Start delivering frames of `display` to `handler`
    fn subscribe(
        &self,
        display: DisplayInfo,
        options: CaptureOptions,
        handler: FrameHandler,
    ) -> impl Future<Output = Result<Self::Subscription, CaptureError>> + Send;
}
