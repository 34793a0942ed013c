//! Cache keys, payload codec and result stores.

mod canonical;
mod codec;
mod store;

pub use canonical::{CanonicalHash, CanonicalHasher};
pub use codec::{CacheCodec, CacheKey, DecodedPayload, SkippedRecord};
pub use store::{CacheEntry, CacheStats, CacheStore, MemoryCacheStore, QueryCache};
