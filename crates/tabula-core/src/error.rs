//! Core error types.

use thiserror::Error;

/// Errors raised while registering metadata, building queries and decoding
/// cache payloads.
///
/// Structural errors are raised when the offending node is constructed; a
/// failed construction never yields a partially valid value.
#[derive(Debug, Error)]
pub enum Error {
    /// Entity identity is not registered.
    #[error("entity '{0}' is not registered")]
    UnregisteredEntity(String),

    /// Identity key does not resolve to a column of the entity.
    #[error("unknown column '{key}' on entity '{entity}'")]
    UnknownColumn { entity: String, key: String },

    /// A condition group was built without children.
    #[error("condition group has no children")]
    EmptyConditionGroup,

    /// A join could not be resolved from explicit keys or registry references.
    #[error("cannot join '{source_entity}' to '{target}': {reason}")]
    UnresolvedJoin {
        source_entity: String,
        target: String,
        reason: String,
    },

    /// Sub-query operand is unsealed, foreign to the registry or nested too deep.
    #[error("invalid sub-query: {0}")]
    InvalidSubQuery(String),

    /// Table descriptor is structurally invalid and was not registered.
    #[error("invalid descriptor for entity '{entity}': {reason}")]
    InvalidDescriptor { entity: String, reason: String },

    /// Operand kind does not fit the operator.
    #[error("operator {operator} does not accept {reason}")]
    InvalidOperand {
        operator: &'static str,
        reason: String,
    },

    /// Argument outside its accepted domain.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An item references an entity that is neither the root nor joined.
    #[error("entity '{0}' is referenced but neither the query root nor joined")]
    EntityNotInQuery(String),

    /// The builder was already sealed.
    #[error("query builder is sealed")]
    BuilderSealed,

    /// Configuration rejected.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization error.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// Cache payload written by an incompatible codec.
    #[error("payload version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: u32, actual: u32 },

    /// Protocol error.
    #[error("protocol error: {0}")]
    Protocol(#[from] tabula_proto::Error),
}

impl Error {
    pub(crate) fn unknown_column(entity: &str, key: &str) -> Self {
        Error::UnknownColumn {
            entity: entity.to_string(),
            key: key.to_string(),
        }
    }

    pub(crate) fn unresolved_join(source: &str, target: &str, reason: impl Into<String>) -> Self {
        Error::UnresolvedJoin {
            source_entity: source.to_string(),
            target: target.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_descriptor(entity: &str, reason: impl Into<String>) -> Self {
        Error::InvalidDescriptor {
            entity: entity.to_string(),
            reason: reason.into(),
        }
    }
}
