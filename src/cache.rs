// Cache module
// This module implements an LRU (Least Recently Used) cache for decoded frames.
// Decoded frames are immutable `Arc<[u8]>` buffers, so handing one out is a refcount bump.

use lru::LruCache;
use std::io::{Read, Seek};
use std::num::NonZeroUsize;
use std::sync::{Arc, RwLock};

use crate::codec::{BlockDecompressor, TextureDecoder};
use crate::formats::GvError;
use crate::video::GvVideo;

/// Thread-safe LRU cache of decoded RGBA frames keyed by frame id.
/// Clones share the same underlying cache.
#[derive(Clone)]
pub struct FrameCache {
    cache: Arc<RwLock<LruCache<u32, Arc<[u8]>>>>,
}

impl FrameCache {
    /// Create a new FrameCache holding up to `capacity` frames (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: Arc::new(RwLock::new(LruCache::new(capacity))),
        }
    }

    /// Insert a frame, evicting the least recently used one when full.
    pub fn insert(&self, frame: u32, pixels: Arc<[u8]>) {
        let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
        cache.put(frame, pixels);
    }

    /// Get a frame and mark it as recently used.
    pub fn get(&self, frame: u32) -> Option<Arc<[u8]>> {
        let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
        cache.get(&frame).cloned()
    }

    /// Check if a frame is cached without marking it as recently used.
    pub fn contains(&self, frame: u32) -> bool {
        let cache = self.cache.read().unwrap_or_else(|e| e.into_inner());
        cache.contains(&frame)
    }

    pub fn remove(&self, frame: u32) -> Option<Arc<[u8]>> {
        let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
        cache.pop(&frame)
    }

    pub fn len(&self) -> usize {
        let cache = self.cache.read().unwrap_or_else(|e| e.into_inner());
        cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
        cache.clear();
    }

    pub fn capacity(&self) -> usize {
        let cache = self.cache.read().unwrap_or_else(|e| e.into_inner());
        cache.cap().get()
    }

    /// Return the cached frame, decoding it through `video` on a miss.
    /// Failed decodes are not cached.
    pub fn get_or_decode<R, D, T>(&self, video: &mut GvVideo<R, D, T>, frame: u32) -> Result<Arc<[u8]>, GvError>
    where
        R: Read + Seek,
        D: BlockDecompressor,
        T: TextureDecoder,
    {
        if let Some(pixels) = self.get(frame) {
            return Ok(pixels);
        }
        let pixels: Arc<[u8]> = video.read_frame(frame)?.into();
        self.insert(frame, Arc::clone(&pixels));
        Ok(pixels)
    }
}

impl Default for FrameCache {
    /// A cache sized for a few seconds of playback
    fn default() -> Self {
        Self::new(64)
    }
}
