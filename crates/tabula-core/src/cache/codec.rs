//! Cache keys and cache payloads.
//!
//! A payload is a JSON envelope `{"version", "rows", "body"}`. The body is the
//! hex-encoded total count followed by one base64 JSON record per row, all
//! joined by the configured delimiter:
//!
//! ```text
//! 000000000000002a|eyJmaWVsZHMiOltbImlkIix7IkludDY0Ijo3fV1dfQ==|...
//! ```
//!
//! A record that fails to decode is skipped and reported; a broken envelope,
//! version or total count fails the whole payload.

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use tabula_proto::Row;
use tracing::warn;

use super::canonical::{CanonicalHash, CanonicalHasher};
use crate::config::CodecConfig;
use crate::error::Error;
use crate::query::QueryDescriptor;

/// Key under which a query's result is cached.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A record that could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRecord {
    /// Zero-based position among the encoded records.
    pub index: usize,
    pub reason: String,
}

/// Result of decoding a payload.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedPayload {
    /// Total count stored alongside the rows, e.g. for paging.
    pub total_count: u64,
    /// Rows that decoded, in encoded order.
    pub rows: Vec<Row>,
    /// Records that were dropped.
    pub skipped: Vec<SkippedRecord>,
    /// Number of rows the writer encoded.
    pub expected_rows: usize,
}

impl DecodedPayload {
    /// Check if fewer (or more) rows came back than were written.
    pub fn count_mismatch(&self) -> bool {
        self.rows.len() != self.expected_rows
    }

    /// Check if every record decoded.
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty() && !self.count_mismatch()
    }
}

#[derive(Serialize, Deserialize)]
struct Envelope {
    version: u32,
    rows: usize,
    body: String,
}

/// Derives cache keys and encodes result payloads.
#[derive(Debug, Clone)]
pub struct CacheCodec {
    config: CodecConfig,
}

impl CacheCodec {
    /// Create a codec, rejecting delimiters that collide with the encodings.
    pub fn new(config: CodecConfig) -> Result<Self, Error> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// Deterministic key of a sealed query.
    pub fn cache_key(&self, query: &QueryDescriptor) -> CacheKey {
        let mut hasher = CanonicalHasher::new();
        query.canonical_hash(&mut hasher);
        let digest = hex::encode(hasher.finish());
        match &self.config.key_prefix {
            Some(prefix) => CacheKey(format!("{prefix}{digest}")),
            None => CacheKey(digest),
        }
    }

    /// Encode rows and the total count into a payload.
    pub fn encode(&self, rows: &[Row], total_count: u64) -> Result<String, Error> {
        let mut body = hex::encode(total_count.to_be_bytes());
        for row in rows {
            body.push(self.config.delimiter);
            body.push_str(&STANDARD.encode(row.to_json()?));
        }

        let envelope = Envelope {
            version: self.config.payload_version,
            rows: rows.len(),
            body,
        };
        serde_json::to_string(&envelope).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Decode a payload, skipping records that do not decode.
    pub fn decode(&self, payload: &str) -> Result<DecodedPayload, Error> {
        let envelope: Envelope = serde_json::from_str(payload)
            .map_err(|e| Error::Deserialization(format!("payload envelope: {e}")))?;
        if envelope.version != self.config.payload_version {
            return Err(Error::VersionMismatch {
                expected: self.config.payload_version,
                actual: envelope.version,
            });
        }

        let mut parts = envelope.body.split(self.config.delimiter);
        let total_count = parts
            .next()
            .ok_or_else(|| Error::Deserialization("payload body is empty".into()))
            .and_then(decode_total)?;

        let records: Vec<&str> = parts.collect();
        let mut rows = Vec::with_capacity(records.len());
        let mut skipped = Vec::new();
        for (index, record) in records.into_iter().enumerate() {
            match decode_record(record) {
                Ok(row) => rows.push(row),
                Err(reason) => {
                    warn!(index, reason = %reason, "skipping undecodable cache record");
                    skipped.push(SkippedRecord { index, reason });
                }
            }
        }

        Ok(DecodedPayload {
            total_count,
            rows,
            skipped,
            expected_rows: envelope.rows,
        })
    }
}

fn decode_total(text: &str) -> Result<u64, Error> {
    let bytes = hex::decode(text)
        .map_err(|e| Error::Deserialization(format!("total count: {e}")))?;
    let bytes: [u8; 8] = bytes
        .try_into()
        .map_err(|_| Error::Deserialization("total count is not 8 bytes".into()))?;
    Ok(u64::from_be_bytes(bytes))
}

fn decode_record(record: &str) -> Result<Row, String> {
    let json = STANDARD
        .decode(record)
        .map_err(|e| format!("base64: {e}"))?;
    Row::from_json(&json).map_err(|e| e.to_string())
}
