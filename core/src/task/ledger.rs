use std::num::NonZeroUsize;
use std::sync::Mutex;

use lru::LruCache;

use super::types::TaskStatus;

/// Remembers which (commit, status) notifications were already sent.
pub struct NotificationLedger {
    seen: Mutex<LruCache<(String, TaskStatus), ()>>,
}

impl NotificationLedger {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            seen: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// True the first time a pair is seen (until it is evicted).
    pub fn first_delivery(&self, sha: &str, status: TaskStatus) -> bool {
        let mut seen = match self.seen.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        seen.put((sha.to_string(), status), ()).is_none()
    }

    pub fn len(&self) -> usize {
        self.seen.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_delivery_once() {
        let ledger = NotificationLedger::new(8);
        assert!(ledger.first_delivery("abc", TaskStatus::CIPass));
        assert!(!ledger.first_delivery("abc", TaskStatus::CIPass));
        // a flipped verdict is a new notification
        assert!(ledger.first_delivery("abc", TaskStatus::CIFail));
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn test_eviction_forgets_oldest() {
        let ledger = NotificationLedger::new(1);
        assert!(ledger.first_delivery("a", TaskStatus::CIPass));
        assert!(ledger.first_delivery("b", TaskStatus::CIPass));
        assert!(ledger.first_delivery("a", TaskStatus::CIPass));
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let ledger = NotificationLedger::new(0);
        assert!(ledger.first_delivery("a", TaskStatus::CIFail));
        assert!(!ledger.first_delivery("a", TaskStatus::CIFail));
    }
}
