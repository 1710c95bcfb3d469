//! Frame pipeline controller
//!
//! Owns one capture subscription and one encoder session for a single
//! stream and moves frames from the capture source, through the encoder, to
//! the connection's [`OutputSink`].
//!
//! ```text
//!   capture ctx          controller lock            encoder ctx      runtime
//!   ───────────          ───────────────            ───────────      ───────
//!   frame ──► admit ──► busy? ──no──► busy = true ──► encode ──► bytes ──► sink.send
//!                         │                                                   │
//!                        yes ──► pending = frame (drop policy)                │
//!                                                                             ▼
//!               encode(pending) ◄── pending? ◄── processing_finished ◄── write done
//!                                       │
//!                                       └── none ──► busy = false
//! ```
//!
//! At most one frame is in flight (encoding or being written) and at most
//! one frame waits in `pending`. When the drop policy is enabled the pending
//! slot always holds the newest frame, so latency stays bounded instead of
//! growing with a queue.
//!
//! Every start bumps a generation number. Capture, encoder and sink
//! callbacks carry the generation they were created under and are ignored
//! once it changes, so a stop followed by a fresh start can never be
//! disturbed by callbacks from the previous run.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::geometry::target_dimensions;
use super::sink::OutputSink;
use crate::capture::{CaptureOptions, CaptureSource, CaptureSubscription, Frame, FrameHandler};
use crate::encoder::{Encoder, EncoderParams, EncoderSession};
use crate::error::{CaptureError, EncodeError};
use crate::session::RelayContext;
use crate::settings::SettingsStore;
use crate::stats::{PipelineCounters, PipelineStats};

/// Frames the capture source may hold in flight
const CAPTURE_QUEUE_DEPTH: u32 = 2;

/// Controller lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// Created, never started
    Idle,
    /// Start task is resolving the display and creating resources
    Starting,
    /// Capturing and encoding
    Active,
    /// Stop in progress
    Stopping,
    /// Stopped; may be started again
    Stopped,
}

struct StartTask {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

struct ControllerState<S, V> {
    phase: PipelineState,
    generation: u64,
    subscription: Option<S>,
    encoder_session: Option<Arc<V>>,
    start_task: Option<StartTask>,
    busy: bool,
    pending: Option<Frame>,
}

struct Inner<C: CaptureSource, E: Encoder> {
    session_id: u64,
    display_id: u32,
    capture: Arc<C>,
    encoder: Arc<E>,
    settings: Arc<SettingsStore>,
    sink: OutputSink,
    runtime: Handle,
    counters: PipelineCounters,
    state: Mutex<ControllerState<C::Subscription, E::Session>>,
}

/// Encode-and-send pipeline for one streaming connection
pub struct PipelineController<C: CaptureSource, E: Encoder> {
    inner: Arc<Inner<C, E>>,
}

impl<C: CaptureSource, E: Encoder> Clone for PipelineController<C, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: CaptureSource, E: Encoder> PipelineController<C, E> {
    /// Create an idle controller for `display_id` writing to `sink`.
    /// Must be called from within a tokio runtime.
    pub fn new(context: &RelayContext<C, E>, session_id: u64, display_id: u32, sink: OutputSink) -> Self {
        Self {
            inner: Arc::new(Inner {
                session_id,
                display_id,
                capture: Arc::clone(&context.capture),
                encoder: Arc::clone(&context.encoder),
                settings: Arc::clone(&context.settings),
                sink,
                runtime: Handle::current(),
                counters: PipelineCounters::new(),
                state: Mutex::new(ControllerState {
                    phase: PipelineState::Idle,
                    generation: 0,
                    subscription: None,
                    encoder_session: None,
                    start_task: None,
                    busy: false,
                    pending: None,
                }),
            }),
        }
    }

    /// Spawn the start task. Ignored unless the controller is idle or stopped.
    pub fn start(&self) {
        let mut state = self.inner.lock();

        match state.phase {
            PipelineState::Idle | PipelineState::Stopped => {}
            phase => {
                tracing::debug!(
                    session_id = self.inner.session_id,
                    phase = ?phase,
                    "Start ignored"
                );
                return;
            }
        }

        state.generation += 1;
        state.phase = PipelineState::Starting;

        let token = CancellationToken::new();
        let handle = self.inner.runtime.spawn(Arc::clone(&self.inner).run_start(state.generation, token.clone()));
        state.start_task = Some(StartTask { token, handle });
    }

    /// Tear the pipeline down. Idempotent and safe to call while the start
    /// task is still running; never waits for that task.
    pub fn stop(&self) {
        self.inner.stop();
    }

    pub fn state(&self) -> PipelineState {
        self.inner.lock().phase
    }

    /// True while a frame is being encoded or written
    pub fn is_busy(&self) -> bool {
        self.inner.lock().busy
    }

    pub fn has_pending(&self) -> bool {
        self.inner.lock().pending.is_some()
    }

    /// True if a capture subscription or encoder session is referenced
    pub fn holds_resources(&self) -> bool {
        let state = self.inner.lock();
        state.subscription.is_some() || state.encoder_session.is_some()
    }

    pub fn display_id(&self) -> u32 {
        self.inner.display_id
    }

    pub fn stats(&self) -> PipelineStats {
        self.inner.counters.snapshot()
    }
}

impl<C: CaptureSource, E: Encoder> Inner<C, E> {
    fn lock(&self) -> MutexGuard<'_, ControllerState<C::Subscription, E::Session>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn run_start(self: Arc<Self>, generation: u64, token: CancellationToken) {
        let found = tokio::select! {
            biased;
            _ = token.cancelled() => return,
            found = self.capture.find_display(self.display_id) => found,
        };

        let display = match found {
            Ok(display) => display,
            Err(e) => {
                match e {
                    CaptureError::DisplayNotFound(_) => tracing::warn!(
                        session_id = self.session_id,
                        display_id = self.display_id,
                        "Display not found, closing stream"
                    ),
                    CaptureError::Unavailable(_) => tracing::warn!(
                        session_id = self.session_id,
                        display_id = self.display_id,
                        error = %e,
                        "Capture unavailable, closing stream"
                    ),
                }
                self.abandon_start(generation);
                self.sink.cancel();
                return;
            }
        };

        let settings = self.settings.get();
        let (width, height) = target_dimensions(display.width, display.height, settings.max_dimension);
        let params = EncoderParams {
            width,
            height,
            quality: settings.video_quality,
        };

        let created = tokio::select! {
            biased;
            _ = token.cancelled() => return,
            created = self.encoder.create_session(params) => created,
        };

        let session = match created {
            Ok(session) => Arc::new(session),
            Err(e) => {
                tracing::warn!(
                    session_id = self.session_id,
                    display_id = self.display_id,
                    width,
                    height,
                    error = %e,
                    "Encoder session unavailable, stream will not produce frames"
                );
                self.abandon_start(generation);
                return;
            }
        };

        let options = CaptureOptions {
            width,
            height,
            minimum_frame_interval: settings.minimum_frame_interval(),
            queue_depth: CAPTURE_QUEUE_DEPTH,
        };

        let subscribed = tokio::select! {
            biased;
            _ = token.cancelled() => {
                session.invalidate();
                return;
            }
            subscribed = self.capture.subscribe(display, options, self.frame_handler(generation)) => subscribed,
        };

        let subscription = match subscribed {
            Ok(subscription) => subscription,
            Err(e) => {
                tracing::warn!(
                    session_id = self.session_id,
                    display_id = self.display_id,
                    error = %e,
                    "Failed to start capture"
                );
                session.invalidate();
                self.abandon_start(generation);
                return;
            }
        };

        // Commit point: a stop that raced the awaits above wins.
        let rejected = {
            let mut state = self.lock();
            if token.is_cancelled() || state.generation != generation || state.phase != PipelineState::Starting {
                Some(subscription)
            } else {
                state.subscription = Some(subscription);
                state.encoder_session = Some(Arc::clone(&session));
                state.phase = PipelineState::Active;
                None
            }
        };

        if let Some(subscription) = rejected {
            tracing::debug!(session_id = self.session_id, "Stopped during start, releasing resources");
            session.invalidate();
            subscription.stop().await;
            return;
        }

        tracing::info!(
            session_id = self.session_id,
            display_id = self.display_id,
            width,
            height,
            fps = settings.target_fps,
            quality = settings.video_quality,
            "Stream active"
        );
    }

    fn is_current(&self, generation: u64) -> bool {
        self.lock().generation == generation
    }

    /// Return to idle after a start that failed before acquiring anything
    fn abandon_start(&self, generation: u64) {
        let mut state = self.lock();
        if state.generation == generation && state.phase == PipelineState::Starting {
            state.phase = PipelineState::Idle;
            state.start_task = None;
        }
    }

    fn frame_handler(self: &Arc<Self>, generation: u64) -> FrameHandler {
        let inner = Arc::clone(self);
        Arc::new(move |frame| inner.admit(generation, frame))
    }

    fn admit(self: &Arc<Self>, generation: u64, frame: Frame) {
        let drop_when_busy = self.settings.get().drop_frames_when_busy;

        let session = {
            let mut state = self.lock();
            if state.generation != generation || state.phase != PipelineState::Active {
                return;
            }
            self.counters.frame_captured();

            if state.busy {
                if drop_when_busy {
                    if state.pending.replace(frame).is_some() {
                        self.counters.frame_dropped();
                    }
                } else {
                    self.counters.frame_dropped();
                }
                return;
            }

            let Some(session) = state.encoder_session.clone() else {
                return;
            };
            state.busy = true;
            session
        };

        self.drive(generation, session, frame);
    }

    /// Encode `frame`, falling through to the pending frame for as long as
    /// the encoder rejects frames synchronously
    fn drive(self: &Arc<Self>, generation: u64, session: Arc<E::Session>, frame: Frame) {
        let mut session = session;
        let mut frame = frame;

        loop {
            let inner = Arc::clone(self);
            let submitted = session.encode(frame, Box::new(move |output| inner.on_encoded(generation, output)));

            let Err(e) = submitted else {
                return;
            };

            self.counters.encode_failed();
            tracing::warn!(session_id = self.session_id, error = %e, "Encoding failed");

            match self.finish_frame(generation) {
                Some((next_frame, next_session)) => {
                    frame = next_frame;
                    session = next_session;
                }
                None => return,
            }
        }
    }

    fn on_encoded(self: Arc<Self>, generation: u64, output: Result<Bytes, EncodeError>) {
        if !self.is_current(generation) {
            return;
        }

        let jpeg = match output {
            Ok(jpeg) => jpeg,
            Err(e) => {
                self.counters.encode_failed();
                tracing::debug!(session_id = self.session_id, error = %e, "Encoder reported failure");
                self.processing_finished(generation);
                return;
            }
        };

        self.counters.frame_encoded();

        let len = jpeg.len();
        let inner = Arc::clone(&self);
        self.sink.send(
            jpeg,
            Box::new(move |written| {
                match written {
                    Ok(()) => inner.counters.frame_sent(len),
                    Err(e) if inner.is_current(generation) => {
                        tracing::debug!(session_id = inner.session_id, error = %e, "Output failed, stopping stream");
                        inner.stop();
                    }
                    Err(_) => {}
                }
                inner.processing_finished(generation);
            }),
        );
    }

    fn processing_finished(self: &Arc<Self>, generation: u64) {
        if let Some((frame, session)) = self.finish_frame(generation) {
            self.drive(generation, session, frame);
        }
    }

    /// Take the pending frame (staying busy) or go idle
    fn finish_frame(&self, generation: u64) -> Option<(Frame, Arc<E::Session>)> {
        let drop_when_busy = self.settings.get().drop_frames_when_busy;

        let mut state = self.lock();
        if state.generation != generation {
            return None;
        }

        if drop_when_busy {
            if let Some(session) = state.encoder_session.clone() {
                if let Some(frame) = state.pending.take() {
                    return Some((frame, session));
                }
            }
        }

        state.pending = None;
        state.busy = false;
        None
    }

    fn stop(&self) {
        let (subscription, session, start_task) = {
            let mut state = self.lock();
            if matches!(state.phase, PipelineState::Stopping | PipelineState::Stopped) {
                return;
            }

            state.phase = PipelineState::Stopping;
            state.generation += 1;
            state.busy = false;
            state.pending = None;
            (
                state.subscription.take(),
                state.encoder_session.take(),
                state.start_task.take(),
            )
        };

        if let Some(task) = start_task {
            if !task.handle.is_finished() {
                tracing::debug!(session_id = self.session_id, "Cancelling stream start");
            }
            task.token.cancel();
        }

        if let Some(subscription) = subscription {
            self.runtime.spawn(subscription.stop());
        }

        if let Some(session) = session {
            session.invalidate();
        }

        self.lock().phase = PipelineState::Stopped;

        let stats = self.counters.snapshot();
        tracing::info!(
            session_id = self.session_id,
            display_id = self.display_id,
            captured = stats.frames_captured,
            sent = stats.frames_sent,
            dropped = stats.frames_dropped,
            encode_failures = stats.encode_failures,
            bytes = stats.bytes_sent,
            "Stream stopped"
        );
    }
}
