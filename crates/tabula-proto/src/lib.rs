//! tabula protocol types.
//!
//! This crate defines the data that leaves the query layer: runtime
//! [`Value`]s used as operands and result cells, and result [`Row`]s handed
//! to the cache codec and the execution engine.
//!
//! # Modules
//!
//! - [`value`] - Runtime value types for query operands and results
//! - [`row`] - Result rows
//! - [`error`] - Protocol error types
//!
//! # Serialization
//!
//! All types derive `serde::Serialize` and `serde::Deserialize`; the cache
//! payload codec stores rows as JSON.

pub mod error;
pub mod row;
pub mod value;

pub use error::Error;
pub use row::Row;
pub use value::Value;
