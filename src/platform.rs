//! Monotonic time source shared by the client and server.

use std::sync::OnceLock;
use std::time::Instant;

/// Process-wide monotonic reference instant. All timestamps exchanged on the
/// wire are microseconds elapsed since this instant, so two processes never
/// need to agree on an epoch — only on elapsed durations.
fn reference() -> &'static Instant {
    static REFERENCE: OnceLock<Instant> = OnceLock::new();
    REFERENCE.get_or_init(Instant::now)
}

/// Current monotonic time in microseconds since process start.
///
/// `std::time::Instant` is monotonic on every platform we target, so unlike
/// a wall-clock source there is no risk of NTP step adjustments or leap
/// seconds moving the reported time backwards.
pub fn local_time_us() -> i64 {
    reference().elapsed().as_micros() as i64
}
