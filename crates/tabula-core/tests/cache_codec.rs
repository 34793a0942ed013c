//! Integration tests for cache payloads and the query cache.

use pretty_assertions::assert_eq;
use tabula_core::catalog::{ColumnDescriptor, Registry, SqlType, TableDescriptor};
use tabula_core::proto::{Row, Value};
use tabula_core::query::QueryBuilder;
use tabula_core::{
    CacheCodec, CacheStore, CodecConfig, Error, LockOption, MemoryCacheConfig, MemoryCacheStore,
    QueryCache,
};

fn setup_registry() -> Registry {
    let registry = Registry::new();
    registry
        .register(
            TableDescriptor::new("Order", "orders")
                .cacheable(true)
                .with_column(ColumnDescriptor::field("id", SqlType::BigInt).primary_key())
                .with_column(ColumnDescriptor::field("status", SqlType::Varchar)),
        )
        .unwrap();
    registry
}

fn sample_rows() -> Vec<Row> {
    (1..=5i64)
        .map(|id| {
            Row::new()
                .with("id", id)
                .with("status", if id % 2 == 0 { "PAID" } else { "OPEN" })
                .with("ref", Value::Uuid([id as u8; 16]))
        })
        .collect()
}

/// Replace record `index` of an encoded payload with `replacement`.
fn corrupt_record(payload: &str, index: usize, replacement: &str) -> String {
    let mut envelope: serde_json::Value = serde_json::from_str(payload).unwrap();
    let body = envelope["body"].as_str().unwrap().to_string();
    let mut parts: Vec<&str> = body.split('|').collect();
    parts[index + 1] = replacement;
    envelope["body"] = serde_json::Value::String(parts.join("|"));
    envelope.to_string()
}

#[test]
fn test_payload_roundtrip() {
    let codec = CacheCodec::new(CodecConfig::default()).unwrap();
    let rows = sample_rows();

    let decoded = codec.decode(&codec.encode(&rows, 120).unwrap()).unwrap();
    assert_eq!(decoded.total_count, 120);
    assert_eq!(decoded.rows, rows);
    assert!(!decoded.count_mismatch());
}

#[test]
fn test_one_corrupted_record_drops_one_row() {
    let codec = CacheCodec::new(CodecConfig::default()).unwrap();
    let rows = sample_rows();
    let payload = codec.encode(&rows, rows.len() as u64).unwrap();

    // Valid base64, invalid JSON.
    let payload = corrupt_record(&payload, 3, "bm90IGEgcm93");
    let decoded = codec.decode(&payload).unwrap();

    assert_eq!(decoded.rows.len(), rows.len() - 1);
    assert_eq!(decoded.total_count, rows.len() as u64);
    assert_eq!(decoded.skipped.len(), 1);
    assert_eq!(decoded.skipped[0].index, 3);
    assert!(decoded.count_mismatch());
    assert_eq!(decoded.rows[3], rows[4]);
}

#[test]
fn test_payload_version_is_checked() {
    let writer = CacheCodec::new(CodecConfig::new().with_payload_version(2)).unwrap();
    let reader = CacheCodec::new(CodecConfig::default()).unwrap();
    let payload = writer.encode(&sample_rows(), 5).unwrap();

    assert!(matches!(
        reader.decode(&payload),
        Err(Error::VersionMismatch { expected: 1, actual: 2 })
    ));
}

#[test]
fn test_query_cache_store_and_load() {
    let registry = setup_registry();
    let codec = CacheCodec::new(CodecConfig::default()).unwrap();
    let cache = QueryCache::new(codec, MemoryCacheStore::default());

    let mut builder = QueryBuilder::new(&registry, "Order").unwrap();
    builder.equal_to("Order", "status", "OPEN").unwrap();
    let query = builder.seal().unwrap();

    assert!(cache.load_result(&registry, &query).unwrap().is_none());

    let key = cache
        .store_result(&registry, &query, &sample_rows(), 5)
        .unwrap()
        .expect("cacheable query is stored");
    assert!(cache.store().contains(&key));

    let loaded = cache.load_result(&registry, &query).unwrap().unwrap();
    assert_eq!(loaded.rows, sample_rows());
    assert_eq!(cache.store().stats().hits(), 1);
}

#[test]
fn test_registration_invalidates_cached_results() {
    let registry = setup_registry();
    let codec = CacheCodec::new(CodecConfig::default()).unwrap();
    let cache = QueryCache::new(codec, MemoryCacheStore::default());
    let query = QueryBuilder::new(&registry, "Order").unwrap().seal().unwrap();

    cache.store_result(&registry, &query, &sample_rows(), 5).unwrap();
    registry
        .register(
            TableDescriptor::new("Customer", "customers")
                .with_column(ColumnDescriptor::field("id", SqlType::BigInt).primary_key()),
        )
        .unwrap();

    assert!(cache.load_result(&registry, &query).unwrap().is_none());
    assert!(cache.store().is_empty());
}

#[test]
fn test_locking_reads_bypass_the_cache() {
    let registry = setup_registry();
    let codec = CacheCodec::new(CodecConfig::default()).unwrap();
    let cache = QueryCache::new(codec, MemoryCacheStore::new(MemoryCacheConfig::new()));

    let mut builder = QueryBuilder::new(&registry, "Order").unwrap();
    builder.lock(LockOption::NoWait).unwrap();
    let query = builder.seal().unwrap();

    assert!(cache
        .store_result(&registry, &query, &sample_rows(), 5)
        .unwrap()
        .is_none());
    assert!(cache.store().is_empty());
}

#[test]
fn test_entity_invalidation() {
    let registry = setup_registry();
    let codec = CacheCodec::new(CodecConfig::default()).unwrap();
    let cache = QueryCache::new(codec, MemoryCacheStore::default());
    let query = QueryBuilder::new(&registry, "Order").unwrap().seal().unwrap();

    let key = cache
        .store_result(&registry, &query, &sample_rows(), 5)
        .unwrap()
        .unwrap();
    assert_eq!(cache.invalidate_entity("Order"), 1);
    assert!(!cache.store().remove(&key));
}
