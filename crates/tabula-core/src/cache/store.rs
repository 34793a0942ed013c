//! Result cache storage.
//!
//! [`CacheStore`] is the seam to an external key-value cache.
//! [`MemoryCacheStore`] is a bounded in-process implementation, and
//! [`QueryCache`] ties a store to a [`CacheCodec`].

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tabula_proto::Row;
use tracing::{debug, trace};

use super::codec::{CacheCodec, CacheKey, DecodedPayload};
use crate::catalog::Registry;
use crate::config::MemoryCacheConfig;
use crate::error::Error;
use crate::query::QueryDescriptor;

/// A cached payload and what it depends on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// Encoded payload.
    pub payload: String,
    /// Entities read by the query.
    pub entities: Vec<String>,
    /// Registry version the payload was produced under.
    pub registry_version: u64,
}

/// Key-value storage for encoded query results.
pub trait CacheStore: Send + Sync {
    /// Payload stored under `key`, if it was produced under `registry_version`.
    fn get(&self, key: &CacheKey, registry_version: u64) -> Option<String>;

    /// Store an entry, replacing any previous one.
    fn put(&self, key: CacheKey, entry: CacheEntry);

    /// Remove one entry. Returns whether it existed.
    fn remove(&self, key: &CacheKey) -> bool;

    /// Remove every entry that read `entity`. Returns the number removed.
    fn invalidate_entity(&self, entity: &str) -> usize;

    /// Remove everything.
    fn clear(&self);
}

/// Cache statistics.
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    invalidations: AtomicU64,
}

impl CacheStats {
    /// Get hit count.
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Get miss count.
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Get eviction count.
    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    /// Entries dropped as stale or by entity invalidation.
    pub fn invalidations(&self) -> u64 {
        self.invalidations.load(Ordering::Relaxed)
    }

    /// Calculate hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits() as f64;
        let total = hits + self.misses() as f64;
        if total > 0.0 {
            hits / total
        } else {
            0.0
        }
    }
}

#[derive(Debug)]
struct StoredEntry {
    entry: CacheEntry,
    hits: AtomicU64,
}

/// Bounded in-memory [`CacheStore`].
///
/// When full, the entry with the fewest hits is evicted. Entries produced
/// under another registry version are dropped on access.
pub struct MemoryCacheStore {
    entries: DashMap<CacheKey, StoredEntry>,
    max_entries: usize,
    stats: CacheStats,
}

impl MemoryCacheStore {
    pub fn new(config: MemoryCacheConfig) -> Self {
        Self {
            entries: DashMap::new(),
            max_entries: config.max_entries.max(1),
            stats: CacheStats::default(),
        }
    }

    /// Get cache statistics.
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains_key(key)
    }

    fn evict_least_hit(&self) {
        let victim = self
            .entries
            .iter()
            .min_by_key(|e| e.value().hits.load(Ordering::Relaxed))
            .map(|e| e.key().clone());

        if let Some(key) = victim {
            if self.entries.remove(&key).is_some() {
                self.stats.evictions.fetch_add(1, Ordering::Relaxed);
                trace!(key = %key, "cache entry evicted");
            }
        }
    }
}

impl Default for MemoryCacheStore {
    fn default() -> Self {
        Self::new(MemoryCacheConfig::default())
    }
}

impl CacheStore for MemoryCacheStore {
    fn get(&self, key: &CacheKey, registry_version: u64) -> Option<String> {
        let stale = match self.entries.get(key) {
            Some(stored) if stored.entry.registry_version == registry_version => {
                stored.hits.fetch_add(1, Ordering::Relaxed);
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                trace!(key = %key, "cache hit");
                return Some(stored.entry.payload.clone());
            }
            Some(_) => true,
            None => false,
        };

        if stale && self.entries.remove(key).is_some() {
            self.stats.invalidations.fetch_add(1, Ordering::Relaxed);
        }
        self.stats.misses.fetch_add(1, Ordering::Relaxed);
        trace!(key = %key, stale, "cache miss");
        None
    }

    fn put(&self, key: CacheKey, entry: CacheEntry) {
        if self.entries.len() >= self.max_entries && !self.entries.contains_key(&key) {
            self.evict_least_hit();
        }
        self.entries.insert(
            key,
            StoredEntry {
                entry,
                hits: AtomicU64::new(0),
            },
        );
    }

    fn remove(&self, key: &CacheKey) -> bool {
        self.entries.remove(key).is_some()
    }

    fn invalidate_entity(&self, entity: &str) -> usize {
        let keys: Vec<CacheKey> = self
            .entries
            .iter()
            .filter(|e| e.value().entry.entities.iter().any(|name| name == entity))
            .map(|e| e.key().clone())
            .collect();

        let removed = keys
            .iter()
            .filter(|key| self.entries.remove(*key).is_some())
            .count();
        self.stats
            .invalidations
            .fetch_add(removed as u64, Ordering::Relaxed);
        debug!(entity, removed, "cache entries invalidated");
        removed
    }

    fn clear(&self) {
        self.entries.clear();
    }
}

/// Caches query results under their derived keys.
///
/// Queries that are not cacheable bypass the store entirely.
pub struct QueryCache<S: CacheStore = MemoryCacheStore> {
    codec: CacheCodec,
    store: S,
}

impl<S: CacheStore> QueryCache<S> {
    pub fn new(codec: CacheCodec, store: S) -> Self {
        Self { codec, store }
    }

    pub fn codec(&self) -> &CacheCodec {
        &self.codec
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Store the result of `query`. Returns the key, or `None` when the query
    /// is not cacheable.
    pub fn store_result(
        &self,
        registry: &Registry,
        query: &QueryDescriptor,
        rows: &[Row],
        total_count: u64,
    ) -> Result<Option<CacheKey>, Error> {
        if !query.cacheable() {
            trace!(root = %query.root_entity(), "query not cacheable, result not stored");
            return Ok(None);
        }

        let key = self.codec.cache_key(query);
        let payload = self.codec.encode(rows, total_count)?;
        let entry = CacheEntry {
            payload,
            entities: query.entities().into_iter().map(String::from).collect(),
            registry_version: registry.version(),
        };
        debug!(key = %key, root = %query.root_entity(), rows = rows.len(), "query result cached");
        self.store.put(key.clone(), entry);
        Ok(Some(key))
    }

    /// Cached result of `query`, if present and produced under the current
    /// registry version.
    pub fn load_result(
        &self,
        registry: &Registry,
        query: &QueryDescriptor,
    ) -> Result<Option<DecodedPayload>, Error> {
        if !query.cacheable() {
            return Ok(None);
        }
        let key = self.codec.cache_key(query);
        match self.store.get(&key, registry.version()) {
            Some(payload) => self.codec.decode(&payload).map(Some),
            None => Ok(None),
        }
    }

    /// Drop every cached result that read `entity`.
    pub fn invalidate_entity(&self, entity: &str) -> usize {
        self.store.invalidate_entity(entity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ColumnDescriptor, SqlType, TableDescriptor};
    use crate::config::CodecConfig;
    use crate::query::QueryBuilder;

    fn key(prefix: &str) -> CacheKey {
        let codec = CacheCodec::new(CodecConfig::new().with_key_prefix(prefix)).unwrap();
        let registry = Registry::new();
        registry
            .register(
                TableDescriptor::new("Order", "orders")
                    .with_column(ColumnDescriptor::field("id", SqlType::BigInt).primary_key()),
            )
            .unwrap();
        let query = QueryBuilder::new(&registry, "Order").unwrap().seal().unwrap();
        codec.cache_key(&query)
    }

    fn entry(payload: &str, entities: &[&str], version: u64) -> CacheEntry {
        CacheEntry {
            payload: payload.to_string(),
            entities: entities.iter().map(|e| e.to_string()).collect(),
            registry_version: version,
        }
    }

    #[test]
    fn test_get_put_and_stats() {
        let store = MemoryCacheStore::default();
        let k = key("a:");

        assert!(store.get(&k, 1).is_none());
        store.put(k.clone(), entry("payload", &["Order"], 1));
        assert_eq!(store.get(&k, 1).as_deref(), Some("payload"));

        assert_eq!(store.stats().hits(), 1);
        assert_eq!(store.stats().misses(), 1);
        assert!((store.stats().hit_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_stale_version_is_dropped() {
        let store = MemoryCacheStore::default();
        let k = key("a:");
        store.put(k.clone(), entry("payload", &["Order"], 1));

        assert!(store.get(&k, 2).is_none());
        assert!(!store.contains(&k));
        assert_eq!(store.stats().invalidations(), 1);
    }

    #[test]
    fn test_least_hit_eviction() {
        let store = MemoryCacheStore::new(MemoryCacheConfig::new().with_max_entries(2));
        let (a, b, c) = (key("a:"), key("b:"), key("c:"));

        store.put(a.clone(), entry("a", &["Order"], 1));
        store.put(b.clone(), entry("b", &["Order"], 1));
        store.get(&a, 1);
        store.put(c.clone(), entry("c", &["Order"], 1));

        assert_eq!(store.len(), 2);
        assert!(store.contains(&a));
        assert!(!store.contains(&b));
        assert!(store.contains(&c));
        assert_eq!(store.stats().evictions(), 1);
    }

    #[test]
    fn test_invalidate_entity() {
        let store = MemoryCacheStore::default();
        store.put(key("a:"), entry("a", &["Order", "Customer"], 1));
        store.put(key("b:"), entry("b", &["Order"], 1));
        store.put(key("c:"), entry("c", &["Invoice"], 1));

        assert_eq!(store.invalidate_entity("Customer"), 1);
        assert_eq!(store.invalidate_entity("Order"), 1);
        assert_eq!(store.len(), 1);

        store.clear();
        assert!(store.is_empty());
    }
}
