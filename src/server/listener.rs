//! Relay server listener
//!
//! Handles the TCP accept loop and spawns one task per connection.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::capture::CaptureSource;
use crate::encoder::Encoder;
use crate::error::Result;
use crate::http::StaticFiles;
use crate::registry::{SessionEntry, SessionRegistry};
use crate::server::config::ServerConfig;
use crate::server::connection::Connection;
use crate::session::RelayContext;

/// MJPEG relay server
pub struct RelayServer<C: CaptureSource, E: Encoder> {
    config: Arc<ServerConfig>,
    context: RelayContext<C, E>,
    registry: Arc<SessionRegistry>,
    next_session_id: AtomicU64,
    connection_semaphore: Option<Arc<Semaphore>>,
}

impl<C: CaptureSource, E: Encoder> RelayServer<C, E> {
    /// Create a new server. If the config names a public directory (or
    /// `./public` exists) and the context has no static root yet, static
    /// assets are served from it.
    pub fn new(config: ServerConfig, context: RelayContext<C, E>) -> Self {
        let connection_semaphore = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };

        let context = match (context.static_files.is_some(), StaticFiles::discover(config.public_dir.as_deref())) {
            (false, Some(files)) => {
                tracing::info!(path = %files.root().display(), "Serving static files");
                context.with_static_files(files)
            }
            _ => context,
        };

        Self {
            config: Arc::new(config),
            context,
            registry: Arc::new(SessionRegistry::new()),
            next_session_id: AtomicU64::new(1),
            connection_semaphore,
        }
    }

    /// Get a reference to the session registry
    pub fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Number of live sessions
    pub fn session_count(&self) -> usize {
        self.registry.len()
    }

    /// Bind the configured address
    pub async fn bind(&self) -> Result<TcpListener> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!(addr = %listener.local_addr()?, "Relay server listening");
        Ok(listener)
    }

    /// Run the server
    ///
    /// This method blocks until the server is shut down.
    pub async fn run(&self) -> Result<()> {
        let listener = self.bind().await?;
        self.serve(listener).await
    }

    /// Serve connections from an already-bound listener
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        self.accept_loop(&listener).await
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let result = tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown signal received");
                Ok(())
            }
            result = self.accept_loop(&listener) => result,
        };

        // Live streams end when their sessions observe the cancellation.
        self.registry.cancel_all();

        result
    }

    async fn accept_loop(&self, listener: &TcpListener) -> Result<()> {
        loop {
            match listener.accept().await {
                Ok((socket, peer_addr)) => {
                    self.handle_connection(socket, peer_addr);
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }

    fn handle_connection(&self, socket: TcpStream, peer_addr: SocketAddr) {
        // Check connection limit
        let permit: Option<OwnedSemaphorePermit> = match self.connection_semaphore {
            Some(ref sem) => match Arc::clone(sem).try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    tracing::warn!(peer = %peer_addr, "Connection rejected: limit reached");
                    return;
                }
            },
            None => None,
        };

        let session_id = self.next_session_id.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(session_id, peer = %peer_addr, "New connection");

        if let Err(e) = self.configure_socket(&socket) {
            tracing::error!(session_id, error = %e, "Failed to configure socket");
            return;
        }

        let cancel = CancellationToken::new();
        if let Err(e) = self.registry.insert(SessionEntry::new(session_id, peer_addr, cancel.clone())) {
            tracing::error!(error = %e, "Failed to register session");
            return;
        }

        let mut connection = Connection::new(
            session_id,
            socket,
            peer_addr,
            Arc::clone(&self.config),
            self.context.clone(),
            Arc::clone(&self.registry),
            cancel,
        );

        tokio::spawn(async move {
            let _permit = permit;

            if let Err(e) = connection.run().await {
                tracing::debug!(session_id, error = %e, "Connection error");
            }

            tracing::debug!(session_id, "Connection closed");
        });
    }

    fn configure_socket(&self, socket: &TcpStream) -> std::io::Result<()> {
        if self.config.tcp_nodelay {
            socket.set_nodelay(true)?;
        }
        Ok(())
    }

    /// Get the configured bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }
}
