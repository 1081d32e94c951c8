//! Bridge statistics

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Snapshot of a bridge's counters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BridgeStats {
    /// Frames read from the input interface
    pub frames_received: u64,
    /// Frames accepted by the selector
    pub frames_matched: u64,
    /// Frames sent on the output interface
    pub frames_forwarded: u64,
    /// Frames rejected by the selector
    pub dropped_unmatched: u64,
    /// Frames dropped because no selector is configured
    pub dropped_no_selector: u64,
    /// Matched frames dropped because no transform is configured
    pub dropped_no_mangle: u64,
    /// Matched frames the transform failed on
    pub mangle_failures: u64,
    /// Bytes received on the input interface
    pub bytes_received: u64,
    /// Bytes sent on the output interface
    pub bytes_forwarded: u64,
    /// Time since the counters started
    pub duration: Duration,
    /// Frames received per second
    pub frames_per_second: f64,
    /// Bytes forwarded per second
    pub bytes_per_second: f64,
}

impl BridgeStats {
    /// Total frames not forwarded
    pub fn dropped(&self) -> u64 {
        self.dropped_unmatched + self.dropped_no_selector + self.dropped_no_mangle + self.mangle_failures
    }
}

impl fmt::Display for BridgeStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Received: {} frames ({} bytes)\n\
             Matched: {} frames\n\
             Forwarded: {} frames ({} bytes)\n\
             Dropped: {} (unmatched {}, no selector {}, no transform {}, failed {})\n\
             Duration: {:.2}s\n\
             Rate: {:.2} fps, {:.2} KB/s",
            self.frames_received,
            self.bytes_received,
            self.frames_matched,
            self.frames_forwarded,
            self.bytes_forwarded,
            self.dropped(),
            self.dropped_unmatched,
            self.dropped_no_selector,
            self.dropped_no_mangle,
            self.mangle_failures,
            self.duration.as_secs_f64(),
            self.frames_per_second,
            self.bytes_per_second / 1024.0
        )
    }
}

#[derive(Debug, Default)]
struct Counters {
    frames_received: AtomicU64,
    frames_matched: AtomicU64,
    frames_forwarded: AtomicU64,
    dropped_unmatched: AtomicU64,
    dropped_no_selector: AtomicU64,
    dropped_no_mangle: AtomicU64,
    mangle_failures: AtomicU64,
    bytes_received: AtomicU64,
    bytes_forwarded: AtomicU64,
}

/// Why a frame was not forwarded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    Unmatched,
    NoSelector,
    NoMangle,
    MangleFailed,
}

/// Thread-safe counters shared between a bridge handle and its worker
#[derive(Debug, Clone)]
pub struct StatsAccumulator {
    counters: Arc<Counters>,
    start_time: Instant,
}

impl StatsAccumulator {
    pub fn new() -> Self {
        Self {
            counters: Arc::new(Counters::default()),
            start_time: Instant::now(),
        }
    }

    pub fn record_received(&self, size: usize) {
        self.counters.frames_received.fetch_add(1, Ordering::Relaxed);
        self.counters
            .bytes_received
            .fetch_add(size as u64, Ordering::Relaxed);
    }

    pub fn record_matched(&self) {
        self.counters.frames_matched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_forwarded(&self, size: usize) {
        self.counters.frames_forwarded.fetch_add(1, Ordering::Relaxed);
        self.counters
            .bytes_forwarded
            .fetch_add(size as u64, Ordering::Relaxed);
    }

    pub fn record_dropped(&self, reason: DropReason) {
        let counter = match reason {
            DropReason::Unmatched => &self.counters.dropped_unmatched,
            DropReason::NoSelector => &self.counters.dropped_no_selector,
            DropReason::NoMangle => &self.counters.dropped_no_mangle,
            DropReason::MangleFailed => &self.counters.mangle_failures,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current statistics snapshot
    pub fn snapshot(&self) -> BridgeStats {
        let c = &self.counters;
        let frames_received = c.frames_received.load(Ordering::Relaxed);
        let bytes_forwarded = c.bytes_forwarded.load(Ordering::Relaxed);
        let duration = self.start_time.elapsed();

        let secs = duration.as_secs_f64();
        let (frames_per_second, bytes_per_second) = if secs > 0.0 {
            (frames_received as f64 / secs, bytes_forwarded as f64 / secs)
        } else {
            (0.0, 0.0)
        };

        BridgeStats {
            frames_received,
            frames_matched: c.frames_matched.load(Ordering::Relaxed),
            frames_forwarded: c.frames_forwarded.load(Ordering::Relaxed),
            dropped_unmatched: c.dropped_unmatched.load(Ordering::Relaxed),
            dropped_no_selector: c.dropped_no_selector.load(Ordering::Relaxed),
            dropped_no_mangle: c.dropped_no_mangle.load(Ordering::Relaxed),
            mangle_failures: c.mangle_failures.load(Ordering::Relaxed),
            bytes_received: c.bytes_received.load(Ordering::Relaxed),
            bytes_forwarded,
            duration,
            frames_per_second,
            bytes_per_second,
        }
    }

    /// Get elapsed time since start
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}

impl Default for StatsAccumulator {
    fn default() -> Self {
        Self::new()
    }
}
