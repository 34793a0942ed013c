//! Query and codec configuration.

use crate::error::Error;

/// Default upper bound for a page size.
pub const DEFAULT_MAX_PAGE_SIZE: u32 = 1000;

/// Default maximum nesting of sub-queries.
pub const DEFAULT_MAX_SUBQUERY_DEPTH: usize = 8;

/// Default record delimiter inside a cache payload body.
pub const DEFAULT_PAYLOAD_DELIMITER: char = '|';

/// Current cache payload envelope version.
pub const PAYLOAD_VERSION: u32 = 1;

/// Default capacity of the in-memory cache store.
pub const DEFAULT_CACHE_ENTRIES: usize = 1024;

/// Limits applied while building queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryConfig {
    /// Largest page size accepted by the builder.
    pub max_page_size: u32,

    /// Deepest sub-query nesting accepted as an operand or projection.
    pub max_subquery_depth: usize,

    /// Whether descriptors of cacheable tables are cacheable unless the
    /// caller says otherwise.
    pub default_cacheable: bool,
}

impl QueryConfig {
    /// Create a configuration with default limits.
    pub fn new() -> Self {
        Self {
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
            max_subquery_depth: DEFAULT_MAX_SUBQUERY_DEPTH,
            default_cacheable: true,
        }
    }

    /// Set the maximum page size.
    pub fn with_max_page_size(mut self, size: u32) -> Self {
        self.max_page_size = size.max(1);
        self
    }

    /// Set the maximum sub-query depth.
    pub fn with_max_subquery_depth(mut self, depth: usize) -> Self {
        self.max_subquery_depth = depth;
        self
    }

    /// Set the default cacheable flag.
    pub fn with_default_cacheable(mut self, cacheable: bool) -> Self {
        self.default_cacheable = cacheable;
        self
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Cache key and payload codec settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecConfig {
    /// Separator between the total count and the encoded records.
    pub delimiter: char,

    /// Prefix prepended to every derived cache key.
    pub key_prefix: Option<String>,

    /// Envelope version written and accepted.
    pub payload_version: u32,
}

impl CodecConfig {
    /// Create a configuration with default settings.
    pub fn new() -> Self {
        Self {
            delimiter: DEFAULT_PAYLOAD_DELIMITER,
            key_prefix: None,
            payload_version: PAYLOAD_VERSION,
        }
    }

    /// Set the record delimiter.
    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Set the cache key prefix.
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }

    /// Set the payload version.
    pub fn with_payload_version(mut self, version: u32) -> Self {
        self.payload_version = version;
        self
    }

    /// Reject delimiters that can occur inside hex or base64 text.
    pub fn validate(&self) -> Result<(), Error> {
        let d = self.delimiter;
        if d.is_ascii_alphanumeric() || matches!(d, '+' | '/' | '=') || d.is_whitespace() {
            return Err(Error::InvalidConfig(format!(
                "delimiter {d:?} collides with the base64 alphabet"
            )));
        }
        Ok(())
    }
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// In-memory cache store settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryCacheConfig {
    /// Maximum number of cached payloads.
    pub max_entries: usize,
}

impl MemoryCacheConfig {
    /// Create a configuration with the default capacity.
    pub fn new() -> Self {
        Self {
            max_entries: DEFAULT_CACHE_ENTRIES,
        }
    }

    /// Set the capacity.
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries.max(1);
        self
    }
}

impl Default for MemoryCacheConfig {
    fn default() -> Self {
        Self::new()
    }
}
