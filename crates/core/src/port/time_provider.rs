// Time Provider Port (for testability)
// Used to measure run duration

use std::sync::atomic::{AtomicI64, Ordering};

/// Time provider interface (allows mocking in tests)
pub trait TimeProvider: Send + Sync {
    /// Get current time in milliseconds since epoch
    fn now_millis(&self) -> i64;
}

/// Wall clock provider (production)
pub struct SystemTimeProvider;

impl TimeProvider for SystemTimeProvider {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Clock that advances by a fixed step on every read (tests)
pub struct SteppingTimeProvider {
    now: AtomicI64,
    step_ms: i64,
}

impl SteppingTimeProvider {
    pub fn new(start_ms: i64, step_ms: i64) -> Self {
        Self {
            now: AtomicI64::new(start_ms),
            step_ms,
        }
    }
}

impl TimeProvider for SteppingTimeProvider {
    fn now_millis(&self) -> i64 {
        self.now.fetch_add(self.step_ms, Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stepping_clock() {
        let clock = SteppingTimeProvider::new(1_000, 250);

        assert_eq!(clock.now_millis(), 1_000);
        assert_eq!(clock.now_millis(), 1_250);
        assert_eq!(clock.now_millis(), 1_500);
    }
}
