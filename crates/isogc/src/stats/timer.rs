//! GC Timer - Timing Utilities
//!
//! Measures collection phases with `Instant`. A disabled timer reports zero,
//! which is what `GcConfig::stats_enabled = false` relies on.

use std::time::{Duration, Instant};

/// GcTimer - timer for measuring region operations
pub struct GcTimer {
    start: Option<Instant>,
}

impl GcTimer {
    /// Create and start a timer
    pub fn new() -> Self {
        Self {
            start: Some(Instant::now()),
        }
    }

    /// Timer that always reports zero
    pub fn disabled() -> Self {
        Self { start: None }
    }

    /// Start a timer only when `enabled`
    pub fn start_if(enabled: bool) -> Self {
        if enabled {
            Self::new()
        } else {
            Self::disabled()
        }
    }

    /// Get elapsed time
    pub fn elapsed(&self) -> Duration {
        self.start.map(|s| s.elapsed()).unwrap_or_default()
    }

    /// Get elapsed nanoseconds
    pub fn elapsed_ns(&self) -> u64 {
        self.elapsed().as_nanos() as u64
    }

    /// Get elapsed microseconds
    pub fn elapsed_us(&self) -> u64 {
        self.elapsed().as_micros() as u64
    }

    /// Get elapsed milliseconds
    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed().as_secs_f64() * 1000.0
    }
}

impl Default for GcTimer {
    fn default() -> Self {
        Self::new()
    }
}
