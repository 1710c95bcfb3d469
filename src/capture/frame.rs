//! Raw frame and display types shared by capture sources and encoders

use std::time::Duration;

use bytes::Bytes;
use serde::Serialize;

/// Pixel layout of a raw frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// 8-bit greyscale
    Luma8,
    /// Packed 8-bit RGB
    Rgb8,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Luma8 => 1,
            PixelFormat::Rgb8 => 3,
        }
    }
}

/// A raw captured frame
///
/// Cheap to clone: pixel data is reference counted.
#[derive(Debug, Clone)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    /// Tightly packed rows, no padding
    pub data: Bytes,
    /// Presentation timestamp relative to the start of capture
    pub timestamp: Duration,
    pub duration: Duration,
}

impl Frame {
    pub fn new(width: u32, height: u32, format: PixelFormat, data: Bytes) -> Self {
        Self {
            width,
            height,
            format,
            data,
            timestamp: Duration::ZERO,
            duration: Duration::ZERO,
        }
    }

    /// Set presentation timestamp and duration
    pub fn with_timing(mut self, timestamp: Duration, duration: Duration) -> Self {
        self.timestamp = timestamp;
        self.duration = duration;
        self
    }

    /// Number of bytes a complete frame of this size and format occupies
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * self.format.bytes_per_pixel()
    }

    pub fn is_complete(&self) -> bool {
        self.data.len() >= self.expected_len()
    }
}

/// A capturable display, as reported by `GET /api/displays`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DisplayInfo {
    pub id: u32,
    /// Native width in pixels
    pub width: u32,
    /// Native height in pixels
    pub height: u32,
}

impl DisplayInfo {
    pub fn new(id: u32, width: u32, height: u32) -> Self {
        Self { id, width, height }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expected_len() {
        let frame = Frame::new(4, 2, PixelFormat::Rgb8, Bytes::from(vec![0u8; 24]));
        assert_eq!(frame.expected_len(), 24);
        assert!(frame.is_complete());

        let short = Frame::new(4, 2, PixelFormat::Rgb8, Bytes::from(vec![0u8; 10]));
        assert!(!short.is_complete());
    }

    #[test]
    fn test_display_json() {
        let json = serde_json::to_string(&[DisplayInfo::new(1, 1920, 1080)]).unwrap();
        assert_eq!(json, r#"[{"id":1,"width":1920,"height":1080}]"#);
    }
}
