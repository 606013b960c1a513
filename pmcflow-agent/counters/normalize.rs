/// Canonical reporting interval all rates are expressed against
pub const REPORTING_INTERVAL_MS: f64 = 1000.0;

/// Scale that turns a delta taken over `elapsed_ms` into a per-second value
///
/// A non-positive interval falls back to the canonical interval (factor 1.0).
pub fn normalization_factor(elapsed_ms: f64) -> f64 {
    if elapsed_ms > 0.0 && elapsed_ms.is_finite() {
        REPORTING_INTERVAL_MS / elapsed_ms
    } else {
        1.0
    }
}

pub fn normalize(raw: u64, elapsed_ms: f64) -> f64 {
    raw as f64 * normalization_factor(elapsed_ms)
}

/// Which "previous time" a domain threads through normalization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerScope {
    /// Each unit keeps its own last sample time
    PerUnit,
    /// One last sample time for the whole domain
    Shared,
}

/// Last sample time of a unit or of a whole domain
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IntervalTimer {
    last_ms: Option<i64>,
}

impl IntervalTimer {
    pub fn seeded(now_ms: i64) -> Self {
        Self {
            last_ms: Some(now_ms),
        }
    }

    pub fn seed(&mut self, now_ms: i64) {
        self.last_ms = Some(now_ms);
    }

    pub fn last_ms(&self) -> Option<i64> {
        self.last_ms
    }

    /// Milliseconds since the previous sample, or `None` when never seeded
    pub fn elapsed_ms(&self, now_ms: i64) -> Option<f64> {
        self.last_ms.map(|last| (now_ms - last) as f64)
    }

    /// Factor for a sample taken at `now_ms`, without moving the timer
    pub fn factor_at(&self, now_ms: i64) -> f64 {
        self.elapsed_ms(now_ms)
            .map(normalization_factor)
            .unwrap_or(1.0)
    }

    /// Factor for a sample taken at `now_ms`; `now_ms` becomes the new baseline
    pub fn advance(&mut self, now_ms: i64) -> f64 {
        let factor = self.factor_at(now_ms);
        self.last_ms = Some(now_ms);
        factor
    }
}
