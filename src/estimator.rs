//! Pure math over the locked history: offset/rate aggregation, global-time
//! projection, and playback-rate suggestion.

use crate::ring::Ring;
use crate::wire::Packet;

/// One admitted `(local, remote)` observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample {
    pub local: i64,
    pub remote: i64,
}

impl Sample {
    pub fn from_reply(reply: &Packet) -> Self {
        Sample {
            local: reply.local,
            remote: reply.remote,
        }
    }
}

/// Recompute the clock-rate slope from the oldest and newest retained
/// samples. Requires at least two samples; callers keep the previous rate
/// otherwise.
pub fn clock_rate(samples: &Ring<Sample>) -> Option<f64> {
    if samples.len() < 2 {
        return None;
    }
    let first = samples.oldest().unwrap();
    let last = samples.newest().unwrap();
    let dt_local = last.local - first.local;
    if dt_local == 0 {
        return None;
    }
    Some((last.remote - first.remote) as f64 / dt_local as f64)
}

/// Project current local time into remote-clock space.
///
/// Returns 0 if no sample has ever been admitted.
pub fn global_time(samples: &Ring<Sample>, average_offset: i64, clock_rate: f64, now: i64) -> i64 {
    let Some(reference) = samples.newest() else {
        return 0;
    };
    let elapsed = now - reference.local;
    reference.local + average_offset + (elapsed as f64 * clock_rate).round() as i64
}

/// `|1 + delta/1_000_000|`-style proportional playback rate, dead-banded and
/// clamped to `[0.5, 2.0]`. Operates on unscaled (raw microsecond) values;
/// callers working in a scaled unit must divide back out by `scale` first.
pub fn suggest_playback_rate(global_start: f64, playback_position: f64, global_now: f64) -> f64 {
    let delta = global_now - global_start - playback_position;
    if delta.abs() < 5_000.0 {
        return 1.0;
    }
    (1.0 + delta / 1_000_000.0).clamp(0.5, 2.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring_of(samples: &[Sample]) -> Ring<Sample> {
        let mut r = Ring::new(samples.len().max(1));
        for s in samples {
            r.push(*s);
        }
        r
    }

    #[test]
    fn clock_rate_needs_two_samples() {
        let r = ring_of(&[Sample {
            local: 0,
            remote: 0,
        }]);
        assert_eq!(clock_rate(&r), None);
    }

    #[test]
    fn clock_rate_is_the_slope() {
        let r = ring_of(&[
            Sample {
                local: 0,
                remote: 0,
            },
            Sample {
                local: 1_000_000,
                remote: 2_000_000,
            },
        ]);
        assert_eq!(clock_rate(&r), Some(2.0));
    }

    #[test]
    fn global_time_zero_without_samples() {
        let r: Ring<Sample> = Ring::new(4);
        assert_eq!(global_time(&r, 0, 1.0, 100), 0);
    }

    #[test]
    fn global_time_projects_from_newest_sample() {
        let r = ring_of(&[Sample {
            local: 1_000,
            remote: 5_000,
        }]);
        // average_offset baked in separately from the per-sample offset
        let g = global_time(&r, 4_000, 1.0, 1_500);
        // ref.local + avg_offset + (now - ref.local) * rate
        assert_eq!(g, 1_000 + 4_000 + 500);
    }

    #[test]
    fn playback_rate_dead_band() {
        assert_eq!(suggest_playback_rate(0.0, 0.0, 4_999.0), 1.0);
        assert_eq!(suggest_playback_rate(0.0, 0.0, -4_999.0), 1.0);
    }

    #[test]
    fn playback_rate_saturates() {
        assert_eq!(suggest_playback_rate(0.0, 0.0, 10_000_000.0), 2.0);
        assert_eq!(suggest_playback_rate(0.0, 0.0, -10_000_000.0), 0.5);
    }

    #[test]
    fn playback_rate_proportional() {
        let rate = suggest_playback_rate(0.0, 0.0, 100_000.0);
        assert!((rate - 1.1).abs() < 1e-9);
    }
}
