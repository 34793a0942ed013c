//! Tabula Core - entity registry, validated query construction and result caching.
//!
//! Entities are registered once in a [`Registry`]. Queries are then built
//! with a [`QueryBuilder`], which validates every column, condition and join
//! against the registry and seals into an immutable [`QueryDescriptor`]. A
//! [`CacheCodec`] derives a deterministic [`CacheKey`] for a sealed query and
//! encodes its result rows into a cache payload.

pub mod cache;
pub mod catalog;
pub mod config;
pub mod error;
pub mod loader;
pub mod query;

pub use cache::{
    CacheCodec, CacheEntry, CacheKey, CacheStats, CacheStore, DecodedPayload, MemoryCacheStore,
    QueryCache, SkippedRecord,
};
pub use catalog::{
    Cascade, ColumnDescriptor, Connective, DropPolicy, GeneratorPolicy, IndexDescriptor,
    JoinColumn, LockPolicy, ReferenceDescriptor, RegisterOutcome, Registry, SqlType,
    TableDescriptor,
};
pub use config::{CodecConfig, MemoryCacheConfig, QueryConfig};
pub use error::Error;
pub use loader::{LazyField, LazyLoader, LazyRow};
pub use query::{
    BuilderState, ColumnRef, ConditionNode, Conditions, JoinEdge, JoinKey, JoinResolver,
    JoinType, LockOption, OrderDirection, Operator, ParameterExpr, Projection, QueryBuilder,
    QueryDescriptor,
};

/// Re-export value and row types.
pub use tabula_proto as proto;
