//! # Vertex Buffer Cache
//!
//! Keeps fast-path TriMesh vertex data resident on the device between
//! frames. Entries are keyed by geometry identity plus a part index (for
//! decomposed geometry) and remember the edit index of the data they were
//! built from.
//!
//! - A lookup whose edit index matches is a hit: no upload happens.
//! - A lookup with a different edit index drops the stale entry and misses.
//! - Before an insert, least-recently-used entries are evicted until the
//!   new data fits the byte budget, even ones drawn earlier in the frame.
//!   Their draws have already been issued.
//! - Data larger than the whole budget is not cached at all.
//!
//! Cached buffers are never modified in place. An edited mesh always gets a
//! fresh buffer.

use std::collections::HashMap;

use super::gpu::{BufferId, DeviceError, GpuDevice, GpuVertex};
use crate::scene::ObjectId;

/// Identity of a cached buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Geometry object
    pub object: ObjectId,
    /// Part index, 0 for undivided geometry
    pub part: u32,
}

impl CacheKey {
    /// Key of an undivided geometry
    pub const fn whole(object: ObjectId) -> Self {
        Self { object, part: 0 }
    }
}

/// A resident buffer ready to draw
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachedBuffer {
    /// Device buffer
    pub buffer: BufferId,
    /// Number of indices
    pub index_count: u32,
}

#[derive(Debug, Clone, Copy)]
struct CacheEntry {
    edit_index: u32,
    cached: CachedBuffer,
    bytes: usize,
    last_used_tick: u64,
}

/// Cumulative cache counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VboCacheStats {
    /// Lookups answered from the cache
    pub hits: u64,
    /// Lookups that required an upload
    pub misses: u64,
    /// Entries evicted to stay within budget
    pub evictions: u64,
}

/// Edit-index validated, LRU-evicted buffer cache
#[derive(Debug)]
pub struct VboCache {
    entries: HashMap<CacheKey, CacheEntry>,
    budget_bytes: usize,
    used_bytes: usize,
    tick: u64,
    stats: VboCacheStats,
}

/// Bytes a buffer occupies on the device
pub fn buffer_bytes(vertices: &[GpuVertex], indices: &[u32]) -> usize {
    vertices.len() * GpuVertex::STRIDE + std::mem::size_of_val(indices)
}

impl VboCache {
    /// Create a cache with a byte budget
    pub fn new(budget_bytes: usize) -> Self {
        Self {
            entries: HashMap::new(),
            budget_bytes,
            used_bytes: 0,
            tick: 0,
            stats: VboCacheStats::default(),
        }
    }

    fn touch(&mut self, key: &CacheKey) -> Option<CachedBuffer> {
        self.tick += 1;
        let tick = self.tick;
        let entry = self.entries.get_mut(key)?;
        entry.last_used_tick = tick;
        Some(entry.cached)
    }

    fn remove<D: GpuDevice + ?Sized>(&mut self, device: &mut D, key: &CacheKey) -> bool {
        match self.entries.remove(key) {
            Some(entry) => {
                device.delete_buffer(entry.cached.buffer);
                self.used_bytes -= entry.bytes;
                true
            }
            None => false,
        }
    }

    /// Look up a buffer, dropping it if the geometry has been edited
    ///
    /// Counts a hit or a miss.
    pub fn lookup<D: GpuDevice + ?Sized>(&mut self, device: &mut D, key: CacheKey, edit_index: u32) -> Option<CachedBuffer> {
        match self.entries.get(&key).map(|e| e.edit_index) {
            Some(stored) if stored == edit_index => {
                self.stats.hits += 1;
                self.touch(&key)
            }
            Some(stored) => {
                log::trace!("VBO for {:?} stale (edit {} -> {})", key, stored, edit_index);
                self.remove(device, &key);
                self.stats.misses += 1;
                None
            }
            None => {
                self.stats.misses += 1;
                None
            }
        }
    }

    /// Upload data and cache it, evicting old entries to make room
    ///
    /// # Arguments
    /// * `device` - Device that owns the buffers
    /// * `key` - Cache key
    /// * `edit_index` - Edit index the data was built from
    /// * `vertices` - Vertex data
    /// * `indices` - Triangle indices into `vertices`
    ///
    /// # Returns
    /// The new buffer, or an error if the data exceeds the budget or the
    /// upload failed. Nothing is cached on failure.
    pub fn insert<D: GpuDevice + ?Sized>(
        &mut self,
        device: &mut D,
        key: CacheKey,
        edit_index: u32,
        vertices: &[GpuVertex],
        indices: &[u32],
    ) -> Result<CachedBuffer, DeviceError> {
        self.remove(device, &key);

        let bytes = buffer_bytes(vertices, indices);
        if bytes > self.budget_bytes {
            return Err(DeviceError::BufferAllocation(format!(
                "{} bytes exceed the {} byte cache budget",
                bytes, self.budget_bytes
            )));
        }
        self.evict_for(device, bytes);

        let buffer = device.create_buffer(vertices, indices)?;
        let cached = CachedBuffer { buffer, index_count: indices.len() as u32 };
        self.entries.insert(
            key,
            CacheEntry { edit_index, cached, bytes, last_used_tick: 0 },
        );
        self.used_bytes += bytes;
        self.touch(&key);
        Ok(cached)
    }

    /// Return the cached buffer, building and uploading it on a miss
    pub fn get_or_create<D, F>(
        &mut self,
        device: &mut D,
        key: CacheKey,
        edit_index: u32,
        build: F,
    ) -> Result<CachedBuffer, DeviceError>
    where
        D: GpuDevice + ?Sized,
        F: FnOnce() -> (Vec<GpuVertex>, Vec<u32>),
    {
        if let Some(cached) = self.lookup(device, key, edit_index) {
            return Ok(cached);
        }
        let (vertices, indices) = build();
        self.insert(device, key, edit_index, &vertices, &indices)
    }

    fn evict_for<D: GpuDevice + ?Sized>(&mut self, device: &mut D, incoming: usize) {
        while self.used_bytes + incoming > self.budget_bytes {
            let victim = self
                .entries
                .iter()
                .min_by_key(|(_, e)| e.last_used_tick)
                .map(|(k, _)| *k);
            let Some(victim) = victim else {
                break;
            };
            self.remove(device, &victim);
            self.stats.evictions += 1;
            log::debug!("Evicted VBO {:?}, {} bytes in use", victim, self.used_bytes);
        }
    }

    /// Release every buffer
    pub fn clear<D: GpuDevice + ?Sized>(&mut self, device: &mut D) {
        for (_, entry) in self.entries.drain() {
            device.delete_buffer(entry.cached.buffer);
        }
        self.used_bytes = 0;
    }

    /// True if a key has a resident entry, whatever its edit index
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of resident entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if nothing is resident
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Bytes resident on the device
    pub const fn used_bytes(&self) -> usize {
        self.used_bytes
    }

    /// Configured budget
    pub const fn budget_bytes(&self) -> usize {
        self.budget_bytes
    }

    /// Cumulative counters
    pub const fn stats(&self) -> VboCacheStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::gpu::recording::RecordingDevice;
    use crate::scene::{ObjectKind, ObjectRegistry};

    fn mesh_data() -> (Vec<GpuVertex>, Vec<u32>) {
        (vec![GpuVertex::default(); 3], vec![0, 1, 2])
    }

    fn mesh_bytes() -> usize {
        let (v, i) = mesh_data();
        buffer_bytes(&v, &i)
    }

    fn keys(n: usize) -> Vec<CacheKey> {
        let mut registry = ObjectRegistry::new();
        (0..n).map(|_| CacheKey::whole(registry.register(ObjectKind::Geometry))).collect()
    }

    #[test]
    fn test_second_lookup_hits() {
        let mut device = RecordingDevice::new();
        let mut cache = VboCache::new(1 << 20);
        let key = keys(1)[0];

        let first = cache.get_or_create(&mut device, key, 0, mesh_data).unwrap();
        let second = cache.get_or_create(&mut device, key, 0, || panic!("must not rebuild")).unwrap();

        assert_eq!(first, second);
        assert_eq!(device.buffer_uploads(), 1);
        assert_eq!(cache.stats(), VboCacheStats { hits: 1, misses: 1, evictions: 0 });
    }

    #[test]
    fn test_edit_index_change_misses_and_replaces() {
        let mut device = RecordingDevice::new();
        let mut cache = VboCache::new(1 << 20);
        let key = keys(1)[0];

        let old = cache.get_or_create(&mut device, key, 0, mesh_data).unwrap();
        let new = cache.get_or_create(&mut device, key, 1, mesh_data).unwrap();

        assert_ne!(old.buffer, new.buffer);
        assert_eq!(device.buffer_uploads(), 2);
        assert_eq!(device.live_buffers(), 1);
        assert_eq!(cache.stats().misses, 2);
        assert_eq!(cache.used_bytes(), mesh_bytes());
    }

    #[test]
    fn test_lru_eviction_under_budget() {
        let mut device = RecordingDevice::new();
        let mut cache = VboCache::new(2 * mesh_bytes());
        let k = keys(3);

        cache.get_or_create(&mut device, k[0], 0, mesh_data).unwrap();
        cache.get_or_create(&mut device, k[1], 0, mesh_data).unwrap();

        // Touch k[0] so k[1] becomes least recently used
        cache.get_or_create(&mut device, k[0], 0, mesh_data).unwrap();
        cache.get_or_create(&mut device, k[2], 0, mesh_data).unwrap();

        assert!(cache.contains(&k[0]));
        assert!(!cache.contains(&k[1]));
        assert!(cache.contains(&k[2]));
        assert_eq!(cache.stats().evictions, 1);
        assert!(cache.used_bytes() <= cache.budget_bytes());
    }

    #[test]
    fn test_budget_holds_when_one_frame_needs_more() {
        let mut device = RecordingDevice::new();
        let mut cache = VboCache::new(mesh_bytes());
        let k = keys(3);

        for key in &k {
            cache.get_or_create(&mut device, *key, 0, mesh_data).unwrap();
            assert!(cache.used_bytes() <= cache.budget_bytes());
        }

        assert_eq!(cache.len(), 1);
        assert!(cache.contains(&k[2]));
        assert_eq!(cache.stats().evictions, 2);
        assert_eq!(device.live_buffers(), 1);
    }

    #[test]
    fn test_data_larger_than_budget_is_not_cached() {
        let mut device = RecordingDevice::new();
        let mut cache = VboCache::new(mesh_bytes() - 1);
        let key = keys(1)[0];

        let result = cache.get_or_create(&mut device, key, 0, mesh_data);
        assert!(matches!(result, Err(DeviceError::BufferAllocation(_))));
        assert!(cache.is_empty());
        assert_eq!(device.buffer_uploads(), 0);
    }

    #[test]
    fn test_failed_upload_caches_nothing() {
        let mut device = RecordingDevice::new();
        device.fail_buffer_allocations = true;
        let mut cache = VboCache::new(1 << 20);
        let key = keys(1)[0];

        assert!(cache.get_or_create(&mut device, key, 0, mesh_data).is_err());
        assert!(cache.is_empty());
        assert_eq!(cache.used_bytes(), 0);
    }

    #[test]
    fn test_clear_releases_buffers() {
        let mut device = RecordingDevice::new();
        let mut cache = VboCache::new(1 << 20);
        for key in keys(3) {
            cache.get_or_create(&mut device, key, 0, mesh_data).unwrap();
        }
        cache.clear(&mut device);
        assert_eq!(device.live_buffers(), 0);
        assert!(cache.is_empty());
    }
}
