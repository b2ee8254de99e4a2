//! The write-back object cache the engine core consumes as its persistence
//! collaborator (§6): `put`/`get`/`mark_dirty`/`flush`/`flush_all`, LRU
//! eviction that flushes dirty entries before dropping them, and hit/miss
//! statistics for diagnostics.
//!
//! Grounded in the reference implementation's own datastore: a mutex-guarded
//! cache in front of a backing key-value store, with a most-recently-used
//! ordering list and a dirty bit per entry.

use std::any::Any;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::entity::{self, Entity};
use crate::error::StorageError;

/// The backing key-value store behind the cache. The engine core never
/// talks to this directly — only the cache does. A production deployment
/// swaps in a disk-backed implementation; [`MemoryBackend`] is the
/// in-process reference implementation used by tests and by default.
pub trait Backend: Send + Sync {
    /// Load a previously stored JSON payload, if any.
    fn load(&self, id: u64) -> Result<Option<String>, StorageError>;
    /// Persist a JSON payload under `id`, overwriting any previous value.
    fn store(&self, id: u64, json: &str) -> Result<(), StorageError>;
    /// Remove any stored payload for `id`. Not an error if absent.
    fn remove(&self, id: u64) -> Result<(), StorageError>;
}

/// In-process, `HashMap`-backed store. Not persisted across process
/// restarts; stands in for an embedded key-value store in tests and in
/// deployments that don't need disk durability.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    data: Mutex<HashMap<u64, String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of payloads currently held, for diagnostics and tests.
    pub fn len(&self) -> usize {
        self.data.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Backend for MemoryBackend {
    fn load(&self, id: u64) -> Result<Option<String>, StorageError> {
        Ok(self.data.lock().get(&id).cloned())
    }

    fn store(&self, id: u64, json: &str) -> Result<(), StorageError> {
        self.data.lock().insert(id, json.to_string());
        Ok(())
    }

    fn remove(&self, id: u64) -> Result<(), StorageError> {
        self.data.lock().remove(&id);
        Ok(())
    }
}

/// Snapshot of cache hit/miss counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

/// A deserialization callback for one `type` tag: turns a JSON payload back
/// into a typed entity handle. Installed via
/// [`PersistenceCache::register_factory`].
pub type FactoryFn = Box<dyn Fn(&str) -> Result<Arc<dyn Entity>, StorageError> + Send + Sync>;

struct CacheEntry {
    object: Arc<dyn Entity>,
    dirty: bool,
}

struct Inner {
    entries: HashMap<u64, CacheEntry>,
    /// Most-recently-used order, back = most recent. A id can appear at
    /// most once; re-touches remove-then-push rather than leaving stale
    /// duplicates, keeping eviction O(capacity) worst case, not unbounded.
    lru: VecDeque<u64>,
    stats: CacheStats,
}

impl Inner {
    fn touch(&mut self, id: u64) {
        if let Some(pos) = self.lru.iter().position(|&x| x == id) {
            self.lru.remove(pos);
        }
        self.lru.push_back(id);
    }
}

/// LRU object cache over a [`Backend`], matching the persistence
/// collaborator contract of §6.
pub struct PersistenceCache<B: Backend = MemoryBackend> {
    backend: B,
    capacity: usize,
    inner: Mutex<Inner>,
    factories: Mutex<HashMap<String, FactoryFn>>,
}

impl<B: Backend> PersistenceCache<B> {
    /// Build a cache over `backend` holding at most `capacity` resident
    /// entries before evicting the least-recently-used one.
    pub fn new(backend: B, capacity: usize) -> Self {
        assert!(capacity > 0, "persistence cache capacity must be positive");
        Self {
            backend,
            capacity,
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                lru: VecDeque::new(),
                stats: CacheStats::default(),
            }),
            factories: Mutex::new(HashMap::new()),
        }
    }

    /// Install a deserialization callback for one `type` tag. Re-registering
    /// a type name replaces the previous callback.
    pub fn register_factory(&self, type_name: impl Into<String>, factory: FactoryFn) {
        self.factories.lock().insert(type_name.into(), factory);
    }

    /// Cache a writable handle. Does not mark it dirty — callers that
    /// mutate a handle after caching it must call [`Self::mark_dirty`].
    pub fn put(&self, object: Arc<dyn Entity>) -> Result<(), StorageError> {
        let id = object.entity_id();
        let mut inner = self.inner.lock();
        inner.entries.insert(id, CacheEntry { object, dirty: false });
        inner.touch(id);
        self.evict_if_needed(&mut inner)
    }

    /// Return the handle for `id`, loading it from the backend on a miss.
    pub fn get(&self, id: u64) -> Result<Option<Arc<dyn Entity>>, StorageError> {
        {
            let mut inner = self.inner.lock();
            if let Some(entry) = inner.entries.get(&id) {
                let object = entry.object.clone();
                inner.stats.hits += 1;
                inner.touch(id);
                return Ok(Some(object));
            }
        }

        // Miss: consult the backend, then rehydrate through the registered
        // factory for the payload's own `type` tag.
        let loaded = self.backend.load(id)?;
        let mut inner = self.inner.lock();
        inner.stats.misses += 1;
        let Some(json) = loaded else {
            return Ok(None);
        };
        let type_name = entity::peek_type(&json)?;
        let factories = self.factories.lock();
        let factory = factories
            .get(&type_name)
            .ok_or_else(|| StorageError::UnregisteredType { type_name: type_name.clone() })?;
        let object = factory(&json)?;
        drop(factories);
        inner.entries.insert(id, CacheEntry { object: object.clone(), dirty: false });
        inner.touch(id);
        self.evict_if_needed(&mut inner)?;
        Ok(Some(object))
    }

    /// Typed convenience wrapper: resolve `id` and downcast to `T`.
    /// Returns `Ok(None)` both when the id is unknown and when the cached
    /// object is of a different concrete type.
    pub fn get_as<T: Entity + 'static>(&self, id: u64) -> Result<Option<Arc<T>>, StorageError> {
        match self.get(id)? {
            None => Ok(None),
            Some(object) => {
                let any: Arc<dyn Any + Send + Sync> = object.into_any();
                Ok(any.downcast::<T>().ok())
            }
        }
    }

    /// Flag a resident entry for write-back. Logs and does nothing if the
    /// id is not currently cached.
    pub fn mark_dirty(&self, id: u64) {
        let mut inner = self.inner.lock();
        match inner.entries.get_mut(&id) {
            Some(entry) => entry.dirty = true,
            None => log::warn!("mark_dirty({id}) on an id that is not cached"),
        }
    }

    /// Write back `id` if it is resident and dirty. No-op otherwise.
    pub fn flush(&self, id: u64) -> Result<(), StorageError> {
        let mut inner = self.inner.lock();
        if let Some(entry) = inner.entries.get_mut(&id) {
            if entry.dirty {
                let json = entry.object.to_json()?;
                self.backend.store(id, &json)?;
                entry.dirty = false;
            }
        }
        Ok(())
    }

    /// Write back every dirty resident entry. Returns the number flushed.
    pub fn flush_all(&self) -> Result<usize, StorageError> {
        let mut inner = self.inner.lock();
        let dirty_ids: Vec<u64> = inner
            .entries
            .iter()
            .filter(|(_, entry)| entry.dirty)
            .map(|(&id, _)| id)
            .collect();
        for id in &dirty_ids {
            let entry = inner.entries.get_mut(id).expect("id collected above is present");
            let json = entry.object.to_json()?;
            self.backend.store(*id, &json)?;
            entry.dirty = false;
        }
        Ok(dirty_ids.len())
    }

    /// Drop `id` from the cache and the backend entirely.
    pub fn remove(&self, id: u64) -> Result<(), StorageError> {
        let mut inner = self.inner.lock();
        inner.entries.remove(&id);
        if let Some(pos) = inner.lru.iter().position(|&x| x == id) {
            inner.lru.remove(pos);
        }
        drop(inner);
        self.backend.remove(id)
    }

    /// Current hit/miss counters.
    pub fn stats(&self) -> CacheStats {
        self.inner.lock().stats
    }

    fn evict_if_needed(&self, inner: &mut Inner) -> Result<(), StorageError> {
        while inner.entries.len() > self.capacity {
            let Some(victim) = inner.lru.pop_front() else { break };
            if let Some(entry) = inner.entries.get(&victim) {
                if entry.dirty {
                    let json = entry.object.to_json()?;
                    self.backend.store(victim, &json)?;
                }
            }
            inner.entries.remove(&victim);
        }
        Ok(())
    }
}

impl PersistenceCache<MemoryBackend> {
    /// Convenience constructor over the in-process reference backend.
    pub fn in_memory(capacity: usize) -> Self {
        Self::new(MemoryBackend::new(), capacity)
    }
}
