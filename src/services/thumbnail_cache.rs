//! Time- and size-bounded cache of scaled window captures.

use crate::models::{Thumbnail, WindowId};
use crate::services::ttl_cache::TtlCache;
use std::time::{Duration, Instant};
use tracing::trace;

pub struct ThumbnailCache {
    entries: TtlCache<WindowId, Thumbnail>,
    ttl: Duration,
    visible_ttl: Duration,
    capacity: usize,
    preview_visible: bool,
}

impl ThumbnailCache {
    pub fn new(ttl: Duration, visible_ttl: Duration, capacity: usize) -> Self {
        Self {
            entries: TtlCache::new(),
            ttl,
            visible_ttl,
            capacity,
            preview_visible: false,
        }
    }

    /// Lifetime currently applied to entries
    pub fn active_ttl(&self) -> Duration {
        if self.preview_visible {
            self.visible_ttl
        } else {
            self.ttl
        }
    }

    pub fn set_preview_visible(&mut self, visible: bool) {
        self.preview_visible = visible;
    }

    pub fn get(&self, window_id: WindowId, now: Instant) -> Option<Thumbnail> {
        self.entries.get(&window_id, now, self.active_ttl()).cloned()
    }

    /// Store `thumbnail`, then bring the cache back under capacity: expired
    /// entries go first, then the oldest survivors.
    pub fn insert(&mut self, window_id: WindowId, thumbnail: Thumbnail, now: Instant) {
        self.entries.insert(window_id, thumbnail, now);
        if self.entries.len() <= self.capacity {
            return;
        }

        let expired = self.entries.prune_expired(now, self.active_ttl());
        let evicted = self.entries.evict_oldest_until(self.capacity);
        trace!(expired, evicted, remaining = self.entries.len(), "thumbnail cache trimmed");
    }

    pub fn remove(&mut self, window_id: WindowId) {
        self.entries.remove(&window_id);
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

    pub fn contains(&self, window_id: WindowId) -> bool {
        self.entries.contains_key(&window_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;

    fn thumb() -> Thumbnail {
        Thumbnail::new(RgbaImage::new(4, 4))
    }

    fn cache() -> ThumbnailCache {
        ThumbnailCache::new(Duration::from_secs(5), Duration::from_secs(30), 3)
    }

    #[test]
    fn visible_preview_extends_lifetime() {
        let start = Instant::now();
        let mut cache = cache();
        cache.insert(1, thumb(), start);

        let later = start + Duration::from_secs(10);
        assert!(cache.get(1, later).is_none());

        cache.set_preview_visible(true);
        assert!(cache.get(1, later).is_some());
        assert!(cache.get(1, start + Duration::from_secs(30)).is_none());
    }

    #[test]
    fn expired_entries_are_evicted_before_fresh_ones() {
        let start = Instant::now();
        let mut cache = cache();
        cache.insert(1, thumb(), start);
        cache.insert(2, thumb(), start + Duration::from_secs(4));
        cache.insert(3, thumb(), start + Duration::from_secs(5));
        // Entry 1 has expired; inserting a fourth drops only it.
        cache.insert(4, thumb(), start + Duration::from_secs(6));

        assert_eq!(cache.len(), 3);
        assert!(!cache.contains(1));
        assert!(cache.contains(2) && cache.contains(3) && cache.contains(4));
    }

    #[test]
    fn oldest_fresh_entries_go_when_nothing_expired() {
        let start = Instant::now();
        let mut cache = cache();
        for id in 1..=5 {
            cache.insert(id, thumb(), start + Duration::from_millis(id as u64 * 10));
        }

        assert_eq!(cache.len(), 3);
        assert!(!cache.contains(1) && !cache.contains(2));
        assert!(cache.contains(5));
    }
}
