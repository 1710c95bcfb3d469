//! Still-image encoder boundary
//!
//! An [`Encoder`] creates one stateful [`EncoderSession`] per stream. A
//! session accepts one frame at a time through [`EncoderSession::encode`]:
//! a synchronous `Err` means the frame was rejected and the callback is
//! dropped unused; `Ok(())` means the callback will be invoked exactly once,
//! later and possibly on another thread, with the compressed bytes or an
//! error.

pub mod jpeg;

use std::future::Future;

use bytes::Bytes;

use crate::capture::Frame;
use crate::error::EncodeError;

pub use jpeg::{JpegSession, SoftwareJpegEncoder};

/// Continuation receiving one encoded frame
pub type EncodeCallback = Box<dyn FnOnce(Result<Bytes, EncodeError>) + Send>;

/// Session parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EncoderParams {
    pub width: u32,
    pub height: u32,
    /// Quality in (0, 1]
    pub quality: f64,
}

pub trait EncoderSession: Send + Sync + 'static {
    /// Submit one frame for compression
    fn encode(&self, frame: Frame, on_output: EncodeCallback) -> Result<(), EncodeError>;

    /// Release the session; later `encode` calls fail with
    /// [`EncodeError::Invalidated`]
    fn invalidate(&self);
}

pub trait Encoder: Send + Sync + 'static {
    type Session: EncoderSession;

    fn create_session(
        &self,
        params: EncoderParams,
    ) -> impl Future<Output = Result<Self::Session, EncodeError>> + Send;
}
