use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

/// Duplicate-delivery suppression for gateway events.
pub trait MessageGate: Send + Sync {
    /// Returns `true` the first time a message id is seen, `false` afterwards.
    fn first_sighting(&self, message_id: &str) -> bool;
}

/// Bounded set of recently handled message ids.
#[derive(Clone)]
pub struct RecentMessages {
    seen: Arc<Mutex<LruCache<String, ()>>>,
}

impl RecentMessages {
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            seen: Arc::new(Mutex::new(LruCache::new(cap))),
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.seen.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl MessageGate for RecentMessages {
    fn first_sighting(&self, message_id: &str) -> bool {
        let mut seen = self.seen.lock().unwrap_or_else(|e| e.into_inner());
        if seen.contains(message_id) {
            return false;
        }
        seen.put(message_id.to_string(), ());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_is_rejected() {
        let gate = RecentMessages::new(10);
        assert!(gate.first_sighting("1"));
        assert!(!gate.first_sighting("1"));
        assert!(gate.first_sighting("2"));
    }

    #[test]
    fn test_bounded() {
        let gate = RecentMessages::new(2);
        assert!(gate.first_sighting("1"));
        assert!(gate.first_sighting("2"));
        assert!(gate.first_sighting("3"));
        assert_eq!(gate.len(), 2);

        // "1" was evicted, so it reads as new again
        assert!(gate.first_sighting("1"));
        assert!(!gate.first_sighting("3"));
    }
}
