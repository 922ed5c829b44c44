//! Per-object failure tracking for the controller error policy

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;

use crate::config::OperatorConfig;

/// Consecutive reconcile failures per object key.
///
/// Lives in the controller, not in the engine: a pass knows nothing about
/// earlier passes.
#[derive(Debug, Default)]
pub struct Backoff {
    failures: Mutex<HashMap<String, u32>>,
}

impl Backoff {
    /// Record a failure for `key` and return the delay before the retry
    pub fn next_delay(&self, key: &str, config: &OperatorConfig) -> Duration {
        let mut failures = self.failures.lock();
        let count = failures.entry(key.to_string()).or_insert(0);
        *count = count.saturating_add(1);
        config.error_backoff(*count)
    }

    /// Forget the failures of `key` after a successful pass
    pub fn reset(&self, key: &str) {
        self.failures.lock().remove(key);
    }

    pub fn failures(&self, key: &str) -> u32 {
        self.failures.lock().get(key).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_grows_until_capped_and_resets() {
        let config = OperatorConfig::default();
        let backoff = Backoff::default();

        let delays: Vec<u64> = (0..8)
            .map(|_| backoff.next_delay("ns/b", &config).as_secs())
            .collect();
        assert_eq!(delays, vec![5, 10, 20, 40, 80, 160, 300, 300]);

        backoff.reset("ns/b");
        assert_eq!(backoff.failures("ns/b"), 0);
        assert_eq!(backoff.next_delay("ns/b", &config).as_secs(), 5);
    }
}
