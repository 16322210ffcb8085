// libs/consultation-cell/src/services/server_clock.rs
use std::time::{SystemTime, UNIX_EPOCH};

/// Most recent authoritative server timestamp, paired with the client time
/// at which it was captured. Overwritten on every successful fetch and never
/// persisted across process restarts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerTimeSample {
    pub server_now_ms: i64,
    pub captured_at_client_ms: i64,
}

/// Drift-corrected clock. A plain value passed into each refresh rather than
/// process-wide state, so admission decisions stay testable and one screen
/// cannot contaminate another.
///
/// Output is non-decreasing as long as the client clock is monotonic; after
/// the process is backgrounded the client clock may jump, so callers
/// re-sample on every refresh.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServerClock {
    sample: Option<ServerTimeSample>,
}

impl ServerClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a fresh sample. Non-positive server timestamps are ignored; the
    /// previous sample (if any) stays in effect.
    pub fn record_sample(&mut self, server_now_ms: i64, client_now_ms: i64) {
        if server_now_ms > 0 {
            self.sample = Some(ServerTimeSample {
                server_now_ms,
                captured_at_client_ms: client_now_ms,
            });
        }
    }

    /// Corrected "now": the last server timestamp advanced by the client
    /// time elapsed since it was captured, or plain client time when no
    /// sample exists. Pure and always available.
    pub fn corrected_now(&self, client_now_ms: i64) -> i64 {
        match self.sample {
            Some(sample) => sample.server_now_ms + (client_now_ms - sample.captured_at_client_ms),
            None => client_now_ms,
        }
    }

    pub fn sample(&self) -> Option<ServerTimeSample> {
        self.sample
    }

    pub fn has_sample(&self) -> bool {
        self.sample.is_some()
    }
}

/// Wall-clock millis of the client device.
pub fn client_now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
