//! Counters and summaries read through [`crate::client::Client`]'s query surface.

/// Running counts of probes sent, replies received, and replies rejected by
/// the round-trip filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Statistics {
    pub sent: u64,
    pub received: u64,
    pub rejected: u64,
}

impl Statistics {
    pub fn format_display(&self) -> String {
        format!(
            "sent={} received={} rejected={}",
            self.sent, self.received, self.rejected
        )
    }
}

/// Summary of recent accuracy probes, already scaled to the caller's unit.
/// All fields are zero when no probes have been collected.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AccuracySummary {
    pub min: f64,
    pub avg: f64,
    pub max: f64,
}

impl AccuracySummary {
    pub fn format_display(&self) -> String {
        format!(
            "accuracy min={:.3} avg={:.3} max={:.3}",
            self.min, self.avg, self.max
        )
    }
}
