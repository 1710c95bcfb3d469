//! Output sink
//!
//! Thin wrapper around one connection's write half. The sink keeps no queue:
//! [`OutputSink::send`] issues exactly one write and reports its completion,
//! and the caller must wait for that completion before sending again. This
//! is what lets the pipeline's busy flag cover wire latency as well as
//! encode latency.
//!
//! The sink also carries the connection's cancellation token. A failed write
//! cancels it, which the owning session observes as the peer going away.

use std::io;
use std::sync::Arc;

use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::runtime::Handle;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Completion callback for [`OutputSink::send`]
pub type SendCallback = Box<dyn FnOnce(io::Result<()>) + Send>;

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Write path of one connection
#[derive(Clone)]
pub struct OutputSink {
    inner: Arc<SinkInner>,
}

struct SinkInner {
    session_id: u64,
    writer: Mutex<BoxedWriter>,
    boundary: String,
    runtime: Handle,
    cancel: CancellationToken,
}

impl OutputSink {
    /// Wrap `writer`. Must be called from within a tokio runtime; sends are
    /// spawned onto that runtime.
    pub fn new<W>(session_id: u64, writer: W, boundary: impl Into<String>, cancel: CancellationToken) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            inner: Arc::new(SinkInner {
                session_id,
                writer: Mutex::new(Box::new(writer)),
                boundary: boundary.into(),
                runtime: Handle::current(),
                cancel,
            }),
        }
    }

    pub fn boundary(&self) -> &str {
        &self.inner.boundary
    }

    /// Write raw bytes (response head or a complete response) and flush
    pub async fn write_all(&self, bytes: &[u8]) -> io::Result<()> {
        if self.is_cancelled() {
            return Err(cancelled_error());
        }
        self.inner.write(bytes).await
    }

    /// Send one JPEG as a multipart chunk.
    ///
    /// `on_complete` runs exactly once, after the write finished or failed.
    /// On failure the connection is cancelled before `on_complete` runs.
    pub fn send(&self, jpeg: Bytes, on_complete: SendCallback) {
        let chunk = multipart_chunk(&self.inner.boundary, &jpeg);
        let inner = Arc::clone(&self.inner);

        self.inner.runtime.spawn(async move {
            let result = tokio::select! {
                biased;
                _ = inner.cancel.cancelled() => Err(cancelled_error()),
                written = inner.write(&chunk) => written,
            };

            if let Err(ref e) = result {
                tracing::debug!(session_id = inner.session_id, error = %e, "Chunk write failed");
                inner.cancel.cancel();
            }

            on_complete(result);
        });
    }

    /// Shut down the write direction after a complete response
    pub async fn shutdown(&self) {
        let mut writer = self.inner.writer.lock().await;
        if let Err(e) = writer.shutdown().await {
            tracing::trace!(session_id = self.inner.session_id, error = %e, "Shutdown failed");
        }
    }

    /// Cancel the connection this sink writes to
    pub fn cancel(&self) {
        self.inner.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.inner.cancel
    }
}

impl std::fmt::Debug for OutputSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputSink")
            .field("session_id", &self.inner.session_id)
            .field("boundary", &self.inner.boundary)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

impl SinkInner {
    async fn write(&self, bytes: &[u8]) -> io::Result<()> {
        let mut writer = self.writer.lock().await;
        writer.write_all(bytes).await?;
        writer.flush().await
    }
}

fn cancelled_error() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "connection cancelled")
}

/// Format one `multipart/x-mixed-replace` part
pub fn multipart_chunk(boundary: &str, jpeg: &[u8]) -> Bytes {
    let head = format!(
        "--{boundary}\r\nContent-Type: image/jpeg\r\nContent-Length: {}\r\n\r\n",
        jpeg.len()
    );

    let mut chunk = BytesMut::with_capacity(head.len() + jpeg.len() + 2);
    chunk.put_slice(head.as_bytes());
    chunk.put_slice(jpeg);
    chunk.put_slice(b"\r\n");
    chunk.freeze()
}
