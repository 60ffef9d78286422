// Termination Guard
// Single test-and-set flag so a run issues at most one kill

use std::sync::atomic::{AtomicBool, Ordering};

/// Tracks whether termination was already issued for a run
#[derive(Debug, Default)]
pub struct TerminationGuard {
    issued: AtomicBool,
}

impl TerminationGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the right to terminate
    ///
    /// Returns true for exactly one caller; every later call returns false.
    pub fn try_arm(&self) -> bool {
        self.issued
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Check if termination was issued
    pub fn is_armed(&self) -> bool {
        self.issued.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_arms_once() {
        let guard = TerminationGuard::new();
        assert!(!guard.is_armed());

        assert!(guard.try_arm());
        assert!(!guard.try_arm());
        assert!(guard.is_armed());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_arming_has_single_winner() {
        let guard = Arc::new(TerminationGuard::new());

        let mut handles = Vec::new();
        for _ in 0..32 {
            let guard = Arc::clone(&guard);
            handles.push(tokio::spawn(async move { guard.try_arm() }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }
}
