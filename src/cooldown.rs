// src/cooldown.rs
use chrono::{DateTime, Duration as ChronoDuration, Utc};

/// Minimum spacing between successive dispatches.
/// - A zero interval disables the gate entirely.
/// - Inside the window, signals are dropped; the cursor still advances, so a
///   suppressed message is never revisited.
/// - State is updated explicitly via `record` after a dispatch pass.
#[derive(Debug, Clone)]
pub struct CooldownGate {
    interval: ChronoDuration,
    last_dispatch_at: Option<DateTime<Utc>>,
}

impl CooldownGate {
    /// `interval_secs` < 0 is treated as 0 (no cooldown).
    pub fn new(interval_secs: i64) -> Self {
        Self {
            interval: ChronoDuration::seconds(interval_secs.max(0)),
            last_dispatch_at: None,
        }
    }

    /// Rehydrate from the persisted cursor (unix seconds; 0 = never
    /// dispatched), so the window survives restarts.
    pub fn with_last_dispatch(mut self, unix_secs: f64) -> Self {
        if unix_secs > 0.0 {
            self.last_dispatch_at = DateTime::from_timestamp(unix_secs as i64, 0);
        }
        self
    }

    /// Check whether dispatch is permitted at `now`. Does NOT mutate state.
    pub fn permits(&self, now: DateTime<Utc>) -> bool {
        if self.interval == ChronoDuration::zero() {
            return true;
        }
        match self.last_dispatch_at {
            None => true,
            Some(ts) => now.signed_duration_since(ts) >= self.interval,
        }
    }

    /// Record a dispatch pass at `now`.
    pub fn record(&mut self, now: DateTime<Utc>) {
        self.last_dispatch_at = Some(now);
    }
}
