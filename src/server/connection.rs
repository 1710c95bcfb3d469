//! Per-connection session
//!
//! Reads one request, routes it, and either answers it and closes, or turns
//! the connection into a multipart stream driven by a
//! [`PipelineController`]. A streaming session stays open until the peer
//! closes, a read fails, or the connection's cancellation token fires
//! (write failure, unknown display, server shutdown).

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, ReadHalf};
use tokio_util::sync::CancellationToken;

use crate::capture::CaptureSource;
use crate::encoder::Encoder;
use crate::error::{Error, Result};
use crate::http::{read_request, stream_headers, Response, Route};
use crate::registry::SessionRegistry;
use crate::server::config::ServerConfig;
use crate::server::handler;
use crate::session::{RelayContext, SessionState};
use crate::stream::{OutputSink, PipelineController};

/// Bytes discarded per read while waiting for a streaming peer to close
const DRAIN_BUFFER_SIZE: usize = 1024;

/// A single client connection
pub struct Connection<S, C: CaptureSource, E: Encoder> {
    state: SessionState,
    reader: ReadHalf<S>,
    sink: OutputSink,
    config: Arc<ServerConfig>,
    context: RelayContext<C, E>,
    registry: Arc<SessionRegistry>,
    cancel: CancellationToken,
    controller: Option<PipelineController<C, E>>,
}

impl<S, C, E> Connection<S, C, E>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
    C: CaptureSource,
    E: Encoder,
{
    /// Wrap an accepted stream. `cancel` is the token registered for this
    /// session; the session removes itself from `registry` when it closes.
    pub fn new(
        session_id: u64,
        stream: S,
        peer_addr: SocketAddr,
        config: Arc<ServerConfig>,
        context: RelayContext<C, E>,
        registry: Arc<SessionRegistry>,
        cancel: CancellationToken,
    ) -> Self {
        let (reader, writer) = tokio::io::split(stream);
        let sink = OutputSink::new(session_id, writer, config.boundary.clone(), cancel.clone());

        Self {
            state: SessionState::new(session_id, peer_addr),
            reader,
            sink,
            config,
            context,
            registry,
            cancel,
            controller: None,
        }
    }

    pub fn session_id(&self) -> u64 {
        self.state.id
    }

    /// Serve the connection to completion and close it
    pub async fn run(&mut self) -> Result<()> {
        let result = self.serve().await;
        self.close();
        result
    }

    async fn serve(&mut self) -> Result<()> {
        let read = tokio::time::timeout(
            self.config.request_timeout,
            read_request(&mut self.reader, self.config.max_request_size, self.config.read_buffer_size),
        );

        let request = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Ok(()),
            read = read => match read {
                Ok(request) => request?,
                Err(_) => {
                    tracing::debug!(session_id = self.state.id, "Request timed out");
                    return Err(Error::ConnectionClosed);
                }
            },
        };

        self.state.dispatch(&request.method, &request.path);
        tracing::debug!(
            session_id = self.state.id,
            peer = %self.state.peer_addr,
            method = %request.method,
            path = %request.path,
            "Request"
        );

        let response = match Route::resolve(&request.method, &request.path) {
            Route::Stream(display_id) => return self.stream(display_id).await,
            Route::Preflight => Response::preflight(),
            Route::ListDisplays => handler::list_displays(&self.context).await,
            Route::GetConfig => handler::get_config(&self.context),
            Route::UpdateConfig => handler::update_config(&self.context, request.body.as_deref()),
            Route::Static(path) => match self.context.static_files {
                Some(ref files) => files.serve(&path).await,
                None => Response::not_found(),
            },
            Route::NotFound => Response::not_found(),
        };

        self.sink.write_all(&response.to_bytes()).await?;
        self.sink.shutdown().await;
        Ok(())
    }

    async fn stream(&mut self, display_id: u32) -> Result<()> {
        self.sink.write_all(&stream_headers(self.sink.boundary())).await?;

        let controller = PipelineController::new(&self.context, self.state.id, display_id, self.sink.clone());
        controller.start();
        self.controller = Some(controller);
        self.registry.mark_streaming(self.state.id, display_id);

        tracing::info!(
            session_id = self.state.id,
            peer = %self.state.peer_addr,
            display_id,
            "Stream opened"
        );

        self.wait_for_close().await;
        self.close();
        self.sink.shutdown().await;
        Ok(())
    }

    /// Discard inbound bytes until the peer closes, a read fails, or the
    /// connection is cancelled
    async fn wait_for_close(&mut self) {
        let mut scratch = vec![0u8; DRAIN_BUFFER_SIZE];

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    tracing::debug!(session_id = self.state.id, "Connection cancelled");
                    return;
                }
                read = self.reader.read(&mut scratch) => match read {
                    Ok(0) => {
                        tracing::debug!(session_id = self.state.id, "Peer closed connection");
                        return;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::debug!(session_id = self.state.id, error = %e, "Read failed");
                        return;
                    }
                },
            }
        }
    }
}

impl<S, C: CaptureSource, E: Encoder> Connection<S, C, E> {
    /// Stop the pipeline, cancel the connection and deregister. Only the
    /// first call has any effect.
    pub fn close(&mut self) {
        if !self.state.close() {
            return;
        }

        if let Some(controller) = self.controller.take() {
            controller.stop();
        }
        self.cancel.cancel();
        self.registry.remove(self.state.id);

        tracing::debug!(
            session_id = self.state.id,
            duration_ms = self.state.duration().as_millis() as u64,
            "Session closed"
        );
    }
}

impl<S, C: CaptureSource, E: Encoder> Drop for Connection<S, C, E> {
    fn drop(&mut self) {
        self.close();
    }
}
