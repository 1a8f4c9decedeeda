//! Tunable parameters for a [`crate::client::Client`].

use std::time::Duration;

/// Configuration applied at [`crate::client::Client::connect`] time.
///
/// Values outside the sane range are clamped rather than rejected, matching
/// the rest of this crate's preference for self-healing behavior over
/// construction-time errors for anything that isn't fatal.
#[derive(Debug, Clone, Copy)]
pub struct Settings {
    /// Depth of each history ring (round-trips, samples, offsets, accuracy probes).
    pub capacity: usize,
    /// Interval between probes sent by the emitter thread.
    pub interval: Duration,
    /// Multiplier applied to every time/duration value at the read boundary.
    pub scale: f64,
    /// Whether to compute and retain accuracy probes on each accepted sample.
    pub measure_accuracy: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            capacity: 10,
            interval: Duration::from_millis(100),
            scale: 1.0,
            measure_accuracy: true,
        }
    }
}

impl Settings {
    pub fn clamp(mut self) -> Self {
        self.capacity = self.capacity.clamp(1, 256);
        if self.interval < Duration::from_millis(1) {
            self.interval = Duration::from_millis(1);
        }
        if self.interval > Duration::from_secs(60) {
            self.interval = Duration::from_secs(60);
        }
        if !self.scale.is_finite() || self.scale == 0.0 {
            self.scale = 1.0;
        }
        self
    }
}
