//! Manually driven capture source and encoder for unit tests

use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::Notify;

use crate::capture::{
    CaptureOptions, CaptureSource, CaptureSubscription, DisplayInfo, Frame, FrameHandler, PixelFormat,
};
use crate::encoder::{EncodeCallback, Encoder, EncoderParams, EncoderSession};
use crate::error::{CaptureError, EncodeError};

/// 2x2 frame tagged with `index` milliseconds as its timestamp
pub fn frame(index: u64) -> Frame {
    Frame::new(2, 2, PixelFormat::Rgb8, Bytes::from(vec![0u8; 12]))
        .with_timing(Duration::from_millis(index), Duration::from_millis(16))
}

/// Poll `condition` until it holds or two seconds pass
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !condition() {
        assert!(tokio::time::Instant::now() < deadline, "condition not reached in time");
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
}

#[derive(Default)]
struct CaptureShared {
    displays: Mutex<Vec<DisplayInfo>>,
    handler: Mutex<Option<FrameHandler>>,
    options: Mutex<Option<CaptureOptions>>,
    fail_enumeration: AtomicBool,
    hold_subscribe: AtomicBool,
    release: Notify,
    subscribes: AtomicUsize,
    stops: AtomicUsize,
}

/// Capture source whose frames are pushed by the test with [`emit`](Self::emit)
#[derive(Clone, Default)]
pub struct ManualCapture {
    shared: Arc<CaptureShared>,
}

impl ManualCapture {
    pub fn with_displays(displays: Vec<DisplayInfo>) -> Self {
        let capture = Self::default();
        *capture.shared.displays.lock().unwrap() = displays;
        capture
    }

    pub fn fail_enumeration(&self) {
        self.shared.fail_enumeration.store(true, Ordering::SeqCst);
    }

    /// Make `subscribe` wait until [`release_subscribe`](Self::release_subscribe)
    pub fn hold_subscribe(&self) {
        self.shared.hold_subscribe.store(true, Ordering::SeqCst);
    }

    pub fn release_subscribe(&self) {
        self.shared.hold_subscribe.store(false, Ordering::SeqCst);
        self.shared.release.notify_one();
    }

    /// Deliver a frame; returns false if nothing is subscribed
    pub fn emit(&self, frame: Frame) -> bool {
        let handler = self.shared.handler.lock().unwrap().clone();
        match handler {
            Some(handler) => {
                handler(frame);
                true
            }
            None => false,
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.shared.handler.lock().unwrap().is_some()
    }

    pub fn last_options(&self) -> Option<CaptureOptions> {
        *self.shared.options.lock().unwrap()
    }

    pub fn subscribes(&self) -> usize {
        self.shared.subscribes.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.shared.stops.load(Ordering::SeqCst)
    }
}

pub struct ManualSubscription {
    shared: Arc<CaptureShared>,
}

impl CaptureSubscription for ManualSubscription {
    async fn stop(self) {
        self.shared.handler.lock().unwrap().take();
        self.shared.stops.fetch_add(1, Ordering::SeqCst);
    }
}

impl CaptureSource for ManualCapture {
    type Subscription = ManualSubscription;

    async fn displays(&self) -> Result<Vec<DisplayInfo>, CaptureError> {
        if self.shared.fail_enumeration.load(Ordering::SeqCst) {
            return Err(CaptureError::Unavailable("scripted failure".into()));
        }
        Ok(self.shared.displays.lock().unwrap().clone())
    }

    fn subscribe(
        &self,
        _display: DisplayInfo,
        options: CaptureOptions,
        handler: FrameHandler,
    ) -> impl Future<Output = Result<ManualSubscription, CaptureError>> + Send {
        let shared = Arc::clone(&self.shared);
        async move {
            if shared.hold_subscribe.load(Ordering::SeqCst) {
                shared.release.notified().await;
            }
            *shared.options.lock().unwrap() = Some(options);
            *shared.handler.lock().unwrap() = Some(handler);
            shared.subscribes.fetch_add(1, Ordering::SeqCst);
            Ok(ManualSubscription { shared })
        }
    }
}

#[derive(Default)]
struct EncoderShared {
    queued: Mutex<VecDeque<(Frame, EncodeCallback)>>,
    created: Mutex<Vec<EncoderParams>>,
    fail_create: AtomicBool,
    fail_encode: AtomicBool,
    hold_create: AtomicBool,
    release: Notify,
    invalidated: AtomicUsize,
}

/// Encoder that queues frames until the test completes them
#[derive(Clone, Default)]
pub struct ManualEncoder {
    shared: Arc<EncoderShared>,
}

impl ManualEncoder {
    pub fn fail_create(&self) {
        self.shared.fail_create.store(true, Ordering::SeqCst);
    }

    pub fn fail_encode(&self, fail: bool) {
        self.shared.fail_encode.store(fail, Ordering::SeqCst);
    }

    pub fn hold_create(&self) {
        self.shared.hold_create.store(true, Ordering::SeqCst);
    }

    pub fn release_create(&self) {
        self.shared.hold_create.store(false, Ordering::SeqCst);
        self.shared.release.notify_one();
    }

    pub fn created(&self) -> Vec<EncoderParams> {
        self.shared.created.lock().unwrap().clone()
    }

    pub fn invalidated(&self) -> usize {
        self.shared.invalidated.load(Ordering::SeqCst)
    }

    /// Timestamps of frames waiting for completion, oldest first
    pub fn queued(&self) -> Vec<Duration> {
        self.shared
            .queued
            .lock()
            .unwrap()
            .iter()
            .map(|(frame, _)| frame.timestamp)
            .collect()
    }

    /// Finish the oldest queued frame with `output`
    pub fn complete_next(&self, output: Result<Bytes, EncodeError>) -> Option<Frame> {
        let (frame, callback) = self.shared.queued.lock().unwrap().pop_front()?;
        callback(output);
        Some(frame)
    }
}

pub struct ManualSession {
    shared: Arc<EncoderShared>,
    invalidated: AtomicBool,
}

impl EncoderSession for ManualSession {
    fn encode(&self, frame: Frame, on_output: EncodeCallback) -> Result<(), EncodeError> {
        if self.invalidated.load(Ordering::SeqCst) {
            return Err(EncodeError::Invalidated);
        }
        if self.shared.fail_encode.load(Ordering::SeqCst) {
            return Err(EncodeError::Compression("scripted failure".into()));
        }
        self.shared.queued.lock().unwrap().push_back((frame, on_output));
        Ok(())
    }

    fn invalidate(&self) {
        if !self.invalidated.swap(true, Ordering::SeqCst) {
            self.shared.invalidated.fetch_add(1, Ordering::SeqCst);
        }
    }
}

impl Encoder for ManualEncoder {
    type Session = ManualSession;

    fn create_session(
        &self,
        params: EncoderParams,
    ) -> impl Future<Output = Result<ManualSession, EncodeError>> + Send {
        let shared = Arc::clone(&self.shared);
        async move {
            if shared.hold_create.load(Ordering::SeqCst) {
                shared.release.notified().await;
            }
            if shared.fail_create.load(Ordering::SeqCst) {
                return Err(EncodeError::SessionCreate("scripted failure".into()));
            }
            shared.created.lock().unwrap().push(params);
            Ok(ManualSession {
                shared,
                invalidated: AtomicBool::new(false),
            })
        }
    }
}
