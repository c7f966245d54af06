use std::time::{Duration, Instant};

/// A cached value stamped with its insertion time. Entries are never evicted
/// by the container itself; readers decide freshness against their own TTL,
/// which lets one map serve both the strict and the grace-window read paths.
#[derive(Debug, Clone)]
pub(crate) struct CacheEntry<T> {
    value: T,
    at: Instant,
}

impl<T> CacheEntry<T> {
    pub(crate) fn new(value: T) -> CacheEntry<T> {
        CacheEntry {
            value,
            at: Instant::now(),
        }
    }

    pub(crate) fn fresh(&self, ttl: Duration) -> bool {
        self.at.elapsed() < ttl
    }

    pub(crate) fn value(&self) -> &T {
        &self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_expire_against_a_caller_ttl() {
        let entry = CacheEntry::new(42);

        assert!(entry.fresh(Duration::from_secs(60)));
        assert!(!entry.fresh(Duration::ZERO));
        assert_eq!(*entry.value(), 42);
    }
}
