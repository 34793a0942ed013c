//! Reference (foreign-key) descriptors between entities.

use super::types::{Cascade, Connective};
use serde::{Deserialize, Serialize};

/// One local ↔ referenced column pair of a reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JoinColumn {
    /// Column key on the owning entity.
    pub local: String,
    /// Column key on the referenced entity.
    pub referenced: String,
    /// How this pair combines with the pairs before it.
    #[serde(default)]
    pub connective: Connective,
}

impl JoinColumn {
    /// Create an AND-combined pair.
    pub fn new(local: impl Into<String>, referenced: impl Into<String>) -> Self {
        Self {
            local: local.into(),
            referenced: referenced.into(),
            connective: Connective::And,
        }
    }

    /// The same pair seen from the referenced side.
    pub fn inverse(&self) -> Self {
        Self {
            local: self.referenced.clone(),
            referenced: self.local.clone(),
            connective: self.connective,
        }
    }
}

/// A reference from an owning entity to a target entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceDescriptor {
    /// Field on the owning entity that holds the reference.
    pub field: String,
    /// Referenced entity identity.
    pub target_entity: String,
    /// Cascade behavior.
    #[serde(default)]
    pub cascade: Cascade,
    /// Resolved on first access.
    #[serde(default)]
    pub lazy_load: bool,
    /// The field holds a collection of targets.
    #[serde(default)]
    pub collection: bool,
    /// Ordered join-column pairs.
    pub join_columns: Vec<JoinColumn>,
}

impl ReferenceDescriptor {
    /// Create a reference with no join columns yet.
    pub fn new(field: impl Into<String>, target_entity: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            target_entity: target_entity.into(),
            cascade: Cascade::None,
            lazy_load: false,
            collection: false,
            join_columns: Vec::new(),
        }
    }

    /// Add an AND-combined join pair.
    pub fn on(mut self, local: impl Into<String>, referenced: impl Into<String>) -> Self {
        self.join_columns.push(JoinColumn::new(local, referenced));
        self
    }

    /// Add an OR-combined join pair.
    pub fn or_on(mut self, local: impl Into<String>, referenced: impl Into<String>) -> Self {
        let mut pair = JoinColumn::new(local, referenced);
        pair.connective = Connective::Or;
        self.join_columns.push(pair);
        self
    }

    /// Set cascade behavior.
    pub fn with_cascade(mut self, cascade: Cascade) -> Self {
        self.cascade = cascade;
        self
    }

    /// Mark lazily loaded.
    pub fn lazy(mut self) -> Self {
        self.lazy_load = true;
        self
    }

    /// Mark as a collection-valued reference.
    pub fn collection(mut self) -> Self {
        self.collection = true;
        self
    }

    /// Check if this reference points at `entity`.
    pub fn targets(&self, entity: &str) -> bool {
        self.target_entity == entity
    }
}
