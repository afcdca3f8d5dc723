use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

/// A cached value and the instant it was stored
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub value: T,
    pub created: Instant,
}

impl<T> CacheEntry<T> {
    pub fn new(value: T, created: Instant) -> Self {
        Self { value, created }
    }

    /// Visible only while strictly younger than `ttl`
    pub fn is_fresh(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.created) < ttl
    }
}

/// Time-bounded map. Expiry is evaluated on read against a caller-supplied
/// TTL, so one store can serve different freshness requirements.
#[derive(Debug)]
pub struct TtlCache<K, V> {
    entries: HashMap<K, CacheEntry<V>>,
}

impl<K, V> Default for TtlCache<K, V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash + Clone, V> TtlCache<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &K, now: Instant, ttl: Duration) -> Option<&V> {
        self.entries
            .get(key)
            .filter(|entry| entry.is_fresh(now, ttl))
            .map(|entry| &entry.value)
    }

    pub fn insert(&mut self, key: K, value: V, now: Instant) {
        self.entries.insert(key, CacheEntry::new(value, now));
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.entries.remove(key).map(|entry| entry.value)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Drop every entry no longer fresh under `ttl`; returns how many went
    pub fn prune_expired(&mut self, now: Instant, ttl: Duration) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_fresh(now, ttl));
        before - self.entries.len()
    }

    /// Drop oldest-created entries until at most `capacity` remain
    pub fn evict_oldest_until(&mut self, capacity: usize) -> usize {
        if self.entries.len() <= capacity {
            return 0;
        }
        let mut by_age: Vec<(K, Instant)> = self
            .entries
            .iter()
            .map(|(key, entry)| (key.clone(), entry.created))
            .collect();
        by_age.sort_by_key(|(_, created)| *created);

        let excess = self.entries.len() - capacity;
        for (key, _) in by_age.into_iter().take(excess) {
            self.entries.remove(&key);
        }
        excess
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_expire_at_exactly_ttl() {
        let start = Instant::now();
        let ttl = Duration::from_millis(400);
        let mut cache = TtlCache::new();
        cache.insert(1, "a", start);

        assert_eq!(cache.get(&1, start + Duration::from_millis(399), ttl), Some(&"a"));
        assert_eq!(cache.get(&1, start + ttl, ttl), None);
        // A longer TTL still sees the same entry.
        assert_eq!(cache.get(&1, start + ttl, ttl * 2), Some(&"a"));
    }

    #[test]
    fn evicts_oldest_first() {
        let start = Instant::now();
        let mut cache = TtlCache::new();
        for i in 0..5u32 {
            cache.insert(i, i, start + Duration::from_millis(i as u64));
        }

        assert_eq!(cache.evict_oldest_until(3), 2);
        assert!(!cache.contains_key(&0));
        assert!(!cache.contains_key(&1));
        assert!(cache.contains_key(&4));
    }

    #[test]
    fn prune_removes_only_stale_entries() {
        let start = Instant::now();
        let mut cache = TtlCache::new();
        cache.insert("old", 1, start);
        cache.insert("new", 2, start + Duration::from_secs(4));

        let removed = cache.prune_expired(start + Duration::from_secs(5), Duration::from_secs(5));
        assert_eq!(removed, 1);
        assert!(cache.contains_key(&"new"));
    }
}
