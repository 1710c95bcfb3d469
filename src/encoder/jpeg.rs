//! Software JPEG encoder
//!
//! Compression runs on the tokio blocking pool so capture and network tasks
//! are never stalled by it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;
use tokio::runtime::Handle;

use super::{EncodeCallback, Encoder, EncoderParams, EncoderSession};
use crate::capture::{Frame, PixelFormat};
use crate::error::EncodeError;

/// Encoder producing baseline JPEG with the `image` crate
#[derive(Debug, Clone, Copy, Default)]
pub struct SoftwareJpegEncoder;

impl SoftwareJpegEncoder {
    pub fn new() -> Self {
        Self
    }
}

impl Encoder for SoftwareJpegEncoder {
    type Session = JpegSession;

    async fn create_session(&self, params: EncoderParams) -> Result<JpegSession, EncodeError> {
        if params.width == 0 || params.height == 0 {
            return Err(EncodeError::SessionCreate(format!(
                "invalid dimensions {}x{}",
                params.width, params.height
            )));
        }

        let runtime = Handle::try_current().map_err(|e| EncodeError::SessionCreate(e.to_string()))?;

        tracing::debug!(
            width = params.width,
            height = params.height,
            quality = params.quality,
            "JPEG session created"
        );

        Ok(JpegSession {
            params,
            quality: jpeg_quality(params.quality),
            invalidated: Arc::new(AtomicBool::new(false)),
            runtime,
        })
    }
}

/// One stream's JPEG session
#[derive(Debug)]
pub struct JpegSession {
    params: EncoderParams,
    quality: u8,
    invalidated: Arc<AtomicBool>,
    runtime: Handle,
}

impl JpegSession {
    pub fn params(&self) -> EncoderParams {
        self.params
    }
}

impl EncoderSession for JpegSession {
    fn encode(&self, frame: Frame, on_output: EncodeCallback) -> Result<(), EncodeError> {
        if self.invalidated.load(Ordering::Acquire) {
            return Err(EncodeError::Invalidated);
        }
        if frame.width != self.params.width || frame.height != self.params.height {
            return Err(EncodeError::InvalidFrame(format!(
                "frame is {}x{}, session expects {}x{}",
                frame.width, frame.height, self.params.width, self.params.height
            )));
        }
        if !frame.is_complete() {
            return Err(EncodeError::InvalidFrame(format!(
                "frame has {} bytes, expected {}",
                frame.data.len(),
                frame.expected_len()
            )));
        }

        let quality = self.quality;
        let invalidated = Arc::clone(&self.invalidated);

        self.runtime.spawn_blocking(move || {
            let output = if invalidated.load(Ordering::Acquire) {
                Err(EncodeError::Invalidated)
            } else {
                compress(&frame, quality)
            };
            on_output(output);
        });

        Ok(())
    }

    fn invalidate(&self) {
        self.invalidated.store(true, Ordering::Release);
    }
}

/// Map (0, 1] onto the 1..=100 scale used by the JPEG encoder
pub fn jpeg_quality(quality: f64) -> u8 {
    (quality * 100.0).round().clamp(1.0, 100.0) as u8
}

fn compress(frame: &Frame, quality: u8) -> Result<Bytes, EncodeError> {
    let color = match frame.format {
        PixelFormat::Luma8 => ExtendedColorType::L8,
        PixelFormat::Rgb8 => ExtendedColorType::Rgb8,
    };

    let mut out = Vec::with_capacity(frame.expected_len() / 8);
    JpegEncoder::new_with_quality(&mut out, quality)
        .encode(&frame.data[..frame.expected_len()], frame.width, frame.height, color)
        .map_err(|e| EncodeError::Compression(e.to_string()))?;

    Ok(Bytes::from(out))
}
