//! Per-session registry entry

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

/// Registry view of one live connection
#[derive(Debug, Clone)]
pub struct SessionEntry {
    /// Unique session ID
    pub session_id: u64,

    /// Remote peer address
    pub peer_addr: SocketAddr,

    /// When the connection was accepted
    pub connected_at: Instant,

    /// Display being streamed, once the request was routed to a stream
    pub display_id: Option<u32>,

    /// Cancelling this closes the connection
    pub(super) cancel: CancellationToken,
}

impl SessionEntry {
    pub fn new(session_id: u64, peer_addr: SocketAddr, cancel: CancellationToken) -> Self {
        Self {
            session_id,
            peer_addr,
            connected_at: Instant::now(),
            display_id: None,
            cancel,
        }
    }

    pub fn is_streaming(&self) -> bool {
        self.display_id.is_some()
    }

    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}
