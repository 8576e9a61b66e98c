use std::time::Instant;

/// Smallest step used to keep consecutive timestamps distinct.
const MIN_STEP_MS: f64 = 0.001;

/// Source of per-frame detection timestamps in milliseconds.
///
/// Successive values must be strictly increasing; video-mode landmark
/// models reject (or misbehave on) repeated timestamps.
pub trait TimestampClock: Send {
    fn now_ms(&mut self) -> f64;
}

/// Wall-clock milliseconds since the clock was created, nudged forward when
/// two reads land on the same instant.
pub struct MonotonicClock {
    origin: Instant,
    last_ms: Option<f64>,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            last_ms: None,
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TimestampClock for MonotonicClock {
    fn now_ms(&mut self) -> f64 {
        let elapsed = self.origin.elapsed().as_secs_f64() * 1000.0;
        let now = match self.last_ms {
            Some(last) if elapsed <= last => last + MIN_STEP_MS,
            _ => elapsed,
        };
        self.last_ms = Some(now);
        now
    }
}
