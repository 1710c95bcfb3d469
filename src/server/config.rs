//! Server configuration

use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

/// Default listening port
pub const DEFAULT_PORT: u16 = 65532;

/// Multipart boundary token used by the stream route
pub const DEFAULT_BOUNDARY: &str = "meDisplayBoundary";

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Maximum concurrent connections (0 = unlimited)
    pub max_connections: usize,

    /// Enable TCP_NODELAY (disable Nagle's algorithm)
    pub tcp_nodelay: bool,

    /// Largest request (head plus body) accepted, in bytes
    pub max_request_size: usize,

    /// Initial request buffer size
    pub read_buffer_size: usize,

    /// The request head must arrive within this time
    pub request_timeout: Duration,

    /// Boundary token for `multipart/x-mixed-replace` streams
    pub boundary: String,

    /// Directory holding the frontend's static assets
    pub public_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            max_connections: 0, // Unlimited
            tcp_nodelay: true,  // Frames are written as soon as they are encoded
            max_request_size: 64 * 1024,
            read_buffer_size: 4 * 1024,
            request_timeout: Duration::from_secs(10),
            boundary: DEFAULT_BOUNDARY.to_string(),
            public_dir: None,
        }
    }
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set maximum connections
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the request size limit
    pub fn max_request_size(mut self, size: usize) -> Self {
        self.max_request_size = size.max(1);
        self
    }

    /// Set request timeout
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the multipart boundary token
    pub fn boundary(mut self, boundary: impl Into<String>) -> Self {
        self.boundary = boundary.into();
        self
    }

    /// Serve static assets from `dir`
    pub fn public_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.public_dir = Some(dir.into());
        self
    }
}
