// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Decoded-frame caching.
//!
//! A fixed-capacity LRU cache maps frame indices to decoded images. It
//! backs both the pre-fetched per-frame images of a tracked movie and the
//! on-demand video decoder. Lookups and insertions both refresh recency,
//! so the entry evicted on overflow is always the least recently touched.

pub mod decoder;

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;

use crate::io::media::DecodedImage;

/// LRU cache of decoded frames, keyed by frame index.
pub struct FrameCache {
    inner: LruCache<usize, Arc<DecodedImage>>,
}

impl FrameCache {
    /// Create a cache holding at most `capacity` frames (clamped to 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: LruCache::new(capacity),
        }
    }

    /// Look up a frame, refreshing its recency on a hit.
    pub fn get(&mut self, frame: usize) -> Option<Arc<DecodedImage>> {
        self.inner.get(&frame).cloned()
    }

    /// Insert a frame, evicting the least-recently-used entry on overflow.
    pub fn insert(&mut self, frame: usize, image: Arc<DecodedImage>) {
        self.inner.put(frame, image);
    }

    pub fn contains(&self, frame: usize) -> bool {
        self.inner.contains(&frame)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.inner.cap().get()
    }

    /// Drop every cached frame (frame indices change meaning on reload).
    pub fn clear(&mut self) {
        self.inner.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(tag: u8) -> Arc<DecodedImage> {
        Arc::new(DecodedImage {
            width: 2,
            height: 2,
            pixels: vec![tag; 16],
        })
    }

    #[test]
    fn test_overflow_evicts_least_recently_used() {
        let mut cache = FrameCache::new(3);
        cache.insert(0, image(0));
        cache.insert(1, image(1));
        cache.insert(2, image(2));

        // Inserting a fourth frame evicts frame 0, the oldest untouched.
        cache.insert(3, image(3));
        assert!(!cache.contains(0));
        assert!(cache.contains(1));
        assert!(cache.contains(2));
        assert!(cache.contains(3));
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn test_get_refreshes_recency() {
        let mut cache = FrameCache::new(3);
        cache.insert(0, image(0));
        cache.insert(1, image(1));
        cache.insert(2, image(2));

        // Touch frame 0 so frame 1 becomes the eviction candidate.
        assert!(cache.get(0).is_some());
        cache.insert(3, image(3));
        assert!(cache.contains(0));
        assert!(!cache.contains(1));
    }

    #[test]
    fn test_insert_refreshes_recency() {
        let mut cache = FrameCache::new(2);
        cache.insert(0, image(0));
        cache.insert(1, image(1));

        // Re-inserting frame 0 makes frame 1 the LRU entry.
        cache.insert(0, image(9));
        cache.insert(2, image(2));
        assert!(cache.contains(0));
        assert!(!cache.contains(1));
        assert_eq!(cache.get(0).unwrap().pixels[0], 9);
    }

    #[test]
    fn test_zero_capacity_clamps_to_one() {
        let mut cache = FrameCache::new(0);
        assert_eq!(cache.capacity(), 1);
        cache.insert(0, image(0));
        cache.insert(1, image(1));
        assert_eq!(cache.len(), 1);
    }
}
