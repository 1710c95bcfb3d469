//! Session state machine
//!
//! Tracks a connection from accept to close. Only the first close is
//! honoured so teardown runs exactly once.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Waiting for the request head
    Reading,
    /// Request routed; a response is being written or a stream is live
    Dispatched,
    /// Session closed
    Closed,
}

/// Complete session state
#[derive(Debug)]
pub struct SessionState {
    /// Unique session ID
    pub id: u64,

    /// Remote peer address
    pub peer_addr: SocketAddr,

    /// Current phase
    pub phase: SessionPhase,

    /// Connection start time
    pub connected_at: Instant,

    /// Time when the request was routed
    pub dispatched_at: Option<Instant>,

    /// Request line, once read
    pub request_line: Option<(String, String)>,
}

impl SessionState {
    /// Create a new session state
    pub fn new(id: u64, peer_addr: SocketAddr) -> Self {
        Self {
            id,
            peer_addr,
            phase: SessionPhase::Reading,
            connected_at: Instant::now(),
            dispatched_at: None,
            request_line: None,
        }
    }

    /// Record the routed request
    pub fn dispatch(&mut self, method: &str, path: &str) {
        if self.phase == SessionPhase::Reading {
            self.phase = SessionPhase::Dispatched;
            self.dispatched_at = Some(Instant::now());
            self.request_line = Some((method.to_string(), path.to_string()));
        }
    }

    /// Mark the session closed. Returns true only for the first call.
    pub fn close(&mut self) -> bool {
        if self.phase == SessionPhase::Closed {
            return false;
        }
        self.phase = SessionPhase::Closed;
        true
    }

    pub fn is_closed(&self) -> bool {
        self.phase == SessionPhase::Closed
    }

    /// Get session duration
    pub fn duration(&self) -> Duration {
        self.connected_at.elapsed()
    }
}
