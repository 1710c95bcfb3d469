//! Statistics for frame pipelines

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Live counters for one pipeline, updated from capture, encoder and sink
/// callbacks without taking the controller lock
#[derive(Debug)]
pub struct PipelineCounters {
    started_at: Instant,
    frames_captured: AtomicU64,
    frames_encoded: AtomicU64,
    frames_dropped: AtomicU64,
    encode_failures: AtomicU64,
    frames_sent: AtomicU64,
    bytes_sent: AtomicU64,
}

impl PipelineCounters {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            frames_captured: AtomicU64::new(0),
            frames_encoded: AtomicU64::new(0),
            frames_dropped: AtomicU64::new(0),
            encode_failures: AtomicU64::new(0),
            frames_sent: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
        }
    }

    pub fn frame_captured(&self) {
        self.frames_captured.fetch_add(1, Ordering::Relaxed);
    }

    pub fn frame_encoded(&self) {
        self.frames_encoded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn frame_dropped(&self) {
        self.frames_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn encode_failed(&self) {
        self.encode_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn frame_sent(&self, bytes: usize) {
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Point-in-time copy of the counters
    pub fn snapshot(&self) -> PipelineStats {
        PipelineStats {
            frames_captured: self.frames_captured.load(Ordering::Relaxed),
            frames_encoded: self.frames_encoded.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            encode_failures: self.encode_failures.load(Ordering::Relaxed),
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            duration: self.started_at.elapsed(),
        }
    }
}

impl Default for PipelineCounters {
    fn default() -> Self {
        Self::new()
    }
}

/// Pipeline statistics snapshot
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineStats {
    /// Frames delivered by the capture source while active
    pub frames_captured: u64,
    /// Frames the encoder turned into JPEG bytes
    pub frames_encoded: u64,
    /// Frames discarded by backpressure (never encoded)
    pub frames_dropped: u64,
    /// Synchronous and asynchronous encoder failures
    pub encode_failures: u64,
    /// Multipart chunks fully written to the client
    pub frames_sent: u64,
    /// JPEG payload bytes written to the client
    pub bytes_sent: u64,
    /// Time since the counters were created
    pub duration: Duration,
}

impl PipelineStats {
    /// Delivered frames per second
    pub fn delivered_fps(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            self.frames_sent as f64 / secs
        } else {
            0.0
        }
    }

    /// Output bitrate in bits per second
    pub fn bitrate(&self) -> u64 {
        let millis = self.duration.as_millis() as u64;
        if millis > 0 {
            self.bytes_sent * 8 * 1000 / millis
        } else {
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_new() {
        let stats = PipelineCounters::new().snapshot();
        assert_eq!(stats.frames_captured, 0);
        assert_eq!(stats.frames_encoded, 0);
        assert_eq!(stats.frames_dropped, 0);
        assert_eq!(stats.encode_failures, 0);
        assert_eq!(stats.frames_sent, 0);
        assert_eq!(stats.bytes_sent, 0);
    }

    #[test]
    fn test_counters_accumulate() {
        let counters = PipelineCounters::new();
        counters.frame_captured();
        counters.frame_captured();
        counters.frame_dropped();
        counters.frame_encoded();
        counters.encode_failed();
        counters.frame_sent(1500);

        let stats = counters.snapshot();
        assert_eq!(stats.frames_captured, 2);
        assert_eq!(stats.frames_dropped, 1);
        assert_eq!(stats.frames_encoded, 1);
        assert_eq!(stats.encode_failures, 1);
        assert_eq!(stats.frames_sent, 1);
        assert_eq!(stats.bytes_sent, 1500);
    }

    #[test]
    fn test_bitrate() {
        let stats = PipelineStats {
            bytes_sent: 1_000_000,
            duration: Duration::from_secs(10),
            ..Default::default()
        };

        // 1,000,000 bytes * 8 bits / 10 seconds = 800,000 bps
        assert_eq!(stats.bitrate(), 800_000);
    }

    #[test]
    fn test_rates_zero_duration() {
        let stats = PipelineStats {
            bytes_sent: 1_000_000,
            frames_sent: 30,
            ..Default::default()
        };

        assert_eq!(stats.bitrate(), 0);
        assert_eq!(stats.delivered_fps(), 0.0);
    }

    #[test]
    fn test_delivered_fps() {
        let stats = PipelineStats {
            frames_sent: 300,
            duration: Duration::from_secs(10),
            ..Default::default()
        };

        assert_eq!(stats.delivered_fps(), 30.0);
    }
}
