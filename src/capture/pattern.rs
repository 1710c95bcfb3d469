//! Synthetic capture source
//!
//! Produces a moving RGB test pattern for a fixed list of virtual displays.
//! Each subscription runs a ticker task on the tokio runtime that renders a
//! frame at the requested output size every `minimum_frame_interval`.

use std::time::Duration;

use bytes::Bytes;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::{CaptureOptions, CaptureSource, CaptureSubscription, DisplayInfo, Frame, FrameHandler, PixelFormat};
use crate::error::CaptureError;

/// Capture source backed by generated test patterns
#[derive(Debug, Clone)]
pub struct TestPatternSource {
    displays: Vec<DisplayInfo>,
}

impl TestPatternSource {
    pub fn new(displays: Vec<DisplayInfo>) -> Self {
        Self { displays }
    }

    /// One virtual display with id 1
    pub fn single(width: u32, height: u32) -> Self {
        Self::new(vec![DisplayInfo::new(1, width, height)])
    }
}

impl Default for TestPatternSource {
    fn default() -> Self {
        Self::single(1920, 1080)
    }
}

impl CaptureSource for TestPatternSource {
    type Subscription = PatternSubscription;

    async fn displays(&self) -> Result<Vec<DisplayInfo>, CaptureError> {
        Ok(self.displays.clone())
    }

    async fn subscribe(
        &self,
        display: DisplayInfo,
        options: CaptureOptions,
        handler: FrameHandler,
    ) -> Result<PatternSubscription, CaptureError> {
        if options.width == 0 || options.height == 0 {
            return Err(CaptureError::Unavailable(format!(
                "cannot capture display {} at {}x{}",
                display.id, options.width, options.height
            )));
        }

        let display_id = display.id;
        let token = CancellationToken::new();
        let task = tokio::spawn(run_pattern(display_id, options, handler, token.clone()));

        tracing::debug!(
            display_id,
            width = options.width,
            height = options.height,
            interval_ms = options.minimum_frame_interval.as_millis() as u64,
            "Test pattern capture started"
        );

        Ok(PatternSubscription { token, task })
    }
}

/// Handle to a running test pattern feed
///
/// Dropping the handle also stops the feed.
#[derive(Debug)]
pub struct PatternSubscription {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl CaptureSubscription for PatternSubscription {
    async fn stop(mut self) {
        self.token.cancel();
        let _ = (&mut self.task).await;
    }
}

impl Drop for PatternSubscription {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

async fn run_pattern(display_id: u32, options: CaptureOptions, handler: FrameHandler, token: CancellationToken) {
    let interval = options.minimum_frame_interval.max(Duration::from_millis(1));
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let started = Instant::now();
    let mut index: u64 = 0;

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = ticker.tick() => {
                let data = render(options.width, options.height, index);
                let frame = Frame::new(options.width, options.height, PixelFormat::Rgb8, data)
                    .with_timing(started.elapsed(), interval);
                handler(frame);
                index = index.wrapping_add(1);
            }
        }
    }

    tracing::debug!(display_id, frames = index, "Test pattern capture stopped");
}

/// Horizontal gradient with a bar sweeping left to right
fn render(width: u32, height: u32, index: u64) -> Bytes {
    let (w, h) = (width as usize, height as usize);
    let bar_width = (w / 16).max(1);
    let bar_start = (index as usize * 4) % w.max(1);

    let mut data = Vec::with_capacity(w * h * 3);
    for y in 0..h {
        let green = (y * 255 / h.max(1)) as u8;
        for x in 0..w {
            let red = (x * 255 / w.max(1)) as u8;
            let in_bar = x >= bar_start && x < bar_start + bar_width;
            let blue = if in_bar { 255 } else { (index % 256) as u8 };
            data.extend_from_slice(&[red, green, blue]);
        }
    }

    Bytes::from(data)
}
