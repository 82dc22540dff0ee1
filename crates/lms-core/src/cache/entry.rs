//! Cache entries and the shared expiry rule

use std::time::Duration;
use tokio::time::Instant;

/// Expiry rule shared by lazy lookups and the background sweep
pub fn is_expired<T: PartialOrd>(now: T, expires_at: T) -> bool {
    now >= expires_at
}

/// A stored value with its bookkeeping
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub expires_at: Instant,
    pub created_at: Instant,
    pub access_count: u64,
    pub last_accessed: Instant,
    /// Monotonic access sequence; orders entries touched at the same instant
    pub(crate) sequence: u64,
}

impl<V> CacheEntry<V> {
    pub(crate) fn new(value: V, now: Instant, ttl: Duration, sequence: u64) -> Self {
        Self {
            value,
            expires_at: now + ttl,
            created_at: now,
            access_count: 0,
            last_accessed: now,
            sequence,
        }
    }

    pub fn is_expired_at(&self, now: Instant) -> bool {
        is_expired(now, self.expires_at)
    }

    pub(crate) fn touch(&mut self, now: Instant, sequence: u64) {
        self.access_count += 1;
        self.last_accessed = now;
        self.sequence = sequence;
    }

    /// LRU ordering key; smaller is older
    pub(crate) fn recency(&self) -> (Instant, u64) {
        (self.last_accessed, self.sequence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiry_boundary_is_inclusive() {
        assert!(!is_expired(99, 100));
        assert!(is_expired(100, 100));
        assert!(is_expired(101, 100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_touch() {
        let start = Instant::now();
        let mut entry = CacheEntry::new("v", start, Duration::from_secs(10), 1);
        assert!(!entry.is_expired_at(start));

        tokio::time::advance(Duration::from_secs(3)).await;
        entry.touch(Instant::now(), 7);

        assert_eq!(entry.access_count, 1);
        assert_eq!(entry.recency(), (start + Duration::from_secs(3), 7));
        assert_eq!(entry.created_at, start);
        assert!(entry.is_expired_at(start + Duration::from_secs(10)));
    }
}
