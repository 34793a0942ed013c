//! Table descriptors.

use std::collections::HashMap;

use super::column::ColumnDescriptor;
use super::reference::ReferenceDescriptor;
use super::types::{DropPolicy, LockPolicy};
use crate::error::Error;
use serde::{Deserialize, Serialize};

/// An index over one or more columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDescriptor {
    /// Index name.
    pub name: String,
    /// Ordered column keys.
    pub columns: Vec<String>,
    /// Unique index.
    #[serde(default)]
    pub unique: bool,
}

impl IndexDescriptor {
    /// Create a non-unique index.
    pub fn new(name: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            columns,
            unique: false,
        }
    }

    /// Create a unique index.
    pub fn unique(name: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            columns,
            unique: true,
        }
    }
}

/// Metadata of one registered entity.
///
/// Produced by an external metadata scanner, validated and frozen by
/// [`Registry::register`](super::Registry::register).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDescriptor {
    /// Entity identity (stable string key).
    pub entity: String,
    /// Schema name.
    #[serde(default)]
    pub schema: Option<String>,
    /// Physical table name.
    pub table: String,
    /// More than one primary-key column. Recomputed at registration.
    #[serde(default)]
    pub composite_key: bool,
    /// Update concurrency control.
    #[serde(default)]
    pub lock_policy: LockPolicy,
    /// Schema tooling policy.
    #[serde(default)]
    pub drop_policy: DropPolicy,
    /// Query results over this entity may be cached.
    #[serde(default)]
    pub cacheable: bool,
    /// Result-set projection without its own primary key.
    #[serde(default)]
    pub projection_view: bool,
    /// Columns in declaration order.
    pub columns: Vec<ColumnDescriptor>,
    /// Indexes.
    #[serde(default)]
    pub indexes: Vec<IndexDescriptor>,
    /// References to other entities.
    #[serde(default)]
    pub references: Vec<ReferenceDescriptor>,
}

impl TableDescriptor {
    /// Create a descriptor for `entity` stored in `table`.
    pub fn new(entity: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            schema: None,
            table: table.into(),
            composite_key: false,
            lock_policy: LockPolicy::None,
            drop_policy: DropPolicy::Keep,
            cacheable: false,
            projection_view: false,
            columns: Vec::new(),
            indexes: Vec::new(),
            references: Vec::new(),
        }
    }

    /// Set the schema.
    pub fn in_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Add a column.
    pub fn with_column(mut self, column: ColumnDescriptor) -> Self {
        self.columns.push(column);
        self
    }

    /// Add multiple columns.
    pub fn with_columns(mut self, columns: impl IntoIterator<Item = ColumnDescriptor>) -> Self {
        self.columns.extend(columns);
        self
    }

    /// Add an index.
    pub fn with_index(mut self, index: IndexDescriptor) -> Self {
        self.indexes.push(index);
        self
    }

    /// Add a reference.
    pub fn with_reference(mut self, reference: ReferenceDescriptor) -> Self {
        self.references.push(reference);
        self
    }

    /// Set the lock policy.
    pub fn with_lock_policy(mut self, policy: LockPolicy) -> Self {
        self.lock_policy = policy;
        self
    }

    /// Set the drop policy.
    pub fn with_drop_policy(mut self, policy: DropPolicy) -> Self {
        self.drop_policy = policy;
        self
    }

    /// Set the cacheable flag.
    pub fn cacheable(mut self, cacheable: bool) -> Self {
        self.cacheable = cacheable;
        self
    }

    /// Mark as a projection view.
    pub fn projection_view(mut self) -> Self {
        self.projection_view = true;
        self
    }

    /// Resolve a column by field identity or physical name, ignoring case.
    pub fn column(&self, key: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.matches_key(key))
    }

    /// Position of a column in declaration order.
    pub fn column_position(&self, key: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.matches_key(key))
    }

    /// Primary-key columns in declaration order.
    pub fn primary_keys(&self) -> impl Iterator<Item = &ColumnDescriptor> {
        self.columns.iter().filter(|c| c.primary_key)
    }

    /// Check if at least one column is a primary key.
    pub fn has_primary_key(&self) -> bool {
        self.columns.iter().any(|c| c.primary_key)
    }

    /// The optimistic-lock version column.
    pub fn version_column(&self) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.version)
    }

    /// Columns fetched together with the row.
    pub fn eager_columns(&self) -> impl Iterator<Item = &ColumnDescriptor> {
        self.columns.iter().filter(|c| !c.lazy_load)
    }

    /// First reference whose target is `entity`.
    pub fn reference_to(&self, entity: &str) -> Option<&ReferenceDescriptor> {
        self.references.iter().find(|r| r.targets(entity))
    }

    /// Reference held by `field`, ignoring case.
    pub fn reference_by_field(&self, field: &str) -> Option<&ReferenceDescriptor> {
        self.references
            .iter()
            .find(|r| r.field.eq_ignore_ascii_case(field))
    }

    /// `schema.table`, or `table` without a schema.
    pub fn qualified_name(&self) -> String {
        match &self.schema {
            Some(schema) => format!("{}.{}", schema, self.table),
            None => self.table.clone(),
        }
    }

    /// Validate structure and derive registration-time flags.
    pub(crate) fn finalize(mut self) -> Result<Self, Error> {
        if self.entity.trim().is_empty() {
            return Err(Error::invalid_descriptor(&self.entity, "empty entity identity"));
        }
        if self.table.trim().is_empty() {
            return Err(Error::invalid_descriptor(&self.entity, "empty table name"));
        }
        if self.columns.is_empty() {
            return Err(Error::invalid_descriptor(&self.entity, "no columns"));
        }
        if !self.projection_view && !self.has_primary_key() {
            return Err(Error::invalid_descriptor(
                &self.entity,
                "no primary key column and not a projection view",
            ));
        }

        let mut seen: HashMap<String, &str> = HashMap::new();
        for column in &self.columns {
            for key in column.identity_keys() {
                if let Some(other) = seen.insert(key.clone(), &column.field) {
                    return Err(Error::invalid_descriptor(
                        &self.entity,
                        format!(
                            "identity key '{}' is shared by '{}' and '{}'",
                            key, other, column.field
                        ),
                    ));
                }
            }
        }

        if self.columns.iter().filter(|c| c.version).count() > 1 {
            return Err(Error::invalid_descriptor(&self.entity, "more than one version column"));
        }
        if self.lock_policy == LockPolicy::Optimistic && self.version_column().is_none() {
            return Err(Error::invalid_descriptor(
                &self.entity,
                "optimistic locking requires a version column",
            ));
        }

        for index in &self.indexes {
            if index.columns.is_empty() {
                return Err(Error::invalid_descriptor(
                    &self.entity,
                    format!("index '{}' has no columns", index.name),
                ));
            }
            if let Some(missing) = index.columns.iter().find(|k| self.column(k).is_none()) {
                return Err(Error::invalid_descriptor(
                    &self.entity,
                    format!("index '{}' names unknown column '{}'", index.name, missing),
                ));
            }
        }

        for reference in &self.references {
            if reference.join_columns.is_empty() {
                return Err(Error::invalid_descriptor(
                    &self.entity,
                    format!("reference '{}' has no join columns", reference.field),
                ));
            }
            // Referenced columns are checked at join time; the target may register later.
            if let Some(pair) = reference
                .join_columns
                .iter()
                .find(|pair| self.column(&pair.local).is_none())
            {
                return Err(Error::invalid_descriptor(
                    &self.entity,
                    format!(
                        "reference '{}' joins on unknown local column '{}'",
                        reference.field, pair.local
                    ),
                ));
            }
        }

        self.composite_key = self.primary_keys().count() > 1;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ColumnDescriptor, SqlType};

    fn order_table() -> TableDescriptor {
        TableDescriptor::new("Order", "orders")
            .in_schema("sales")
            .with_column(ColumnDescriptor::field("id", SqlType::BigInt).primary_key())
            .with_column(ColumnDescriptor::new("customerId", "customer_id", SqlType::BigInt))
            .with_column(ColumnDescriptor::field("amount", SqlType::Decimal).with_precision(12, 2))
            .with_column(ColumnDescriptor::field("status", SqlType::Varchar))
            .with_column(ColumnDescriptor::field("notes", SqlType::Clob).lazy())
            .with_reference(ReferenceDescriptor::new("customer", "Customer").on("customerId", "id"))
    }

    #[test]
    fn test_table_builder() {
        let table = order_table();

        assert_eq!(table.entity, "Order");
        assert_eq!(table.qualified_name(), "sales.orders");
        assert_eq!(table.columns.len(), 5);
        assert!(table.has_primary_key());
        assert_eq!(table.eager_columns().count(), 4);
    }

    #[test]
    fn test_column_resolution() {
        let table = order_table();

        assert_eq!(table.column("CUSTOMER_ID").map(|c| c.field.as_str()), Some("customerId"));
        assert_eq!(table.column_position("Status"), Some(3));
        assert!(table.column("missing").is_none());
        assert!(table.reference_by_field("Customer").is_some());
        assert!(table.reference_to("Customer").is_some());
        assert!(table.reference_to("Invoice").is_none());
    }

    #[test]
    fn test_finalize_derives_composite_key() {
        let table = TableDescriptor::new("OrderLine", "order_lines")
            .with_column(ColumnDescriptor::field("orderId", SqlType::BigInt).primary_key())
            .with_column(ColumnDescriptor::field("lineNo", SqlType::Integer).primary_key())
            .finalize()
            .unwrap();

        assert!(table.composite_key);
        assert!(!order_table().finalize().unwrap().composite_key);
    }

    #[test]
    fn test_finalize_requires_primary_key() {
        let table = TableDescriptor::new("Report", "report")
            .with_column(ColumnDescriptor::field("total", SqlType::Decimal));
        assert!(matches!(table.clone().finalize(), Err(Error::InvalidDescriptor { .. })));

        assert!(table.projection_view().finalize().is_ok());
    }

    #[test]
    fn test_finalize_rejects_colliding_keys() {
        let table = TableDescriptor::new("Order", "orders")
            .with_column(ColumnDescriptor::field("id", SqlType::BigInt).primary_key())
            .with_column(ColumnDescriptor::new("status", "state", SqlType::Varchar))
            .with_column(ColumnDescriptor::new("state", "state_code", SqlType::Varchar));

        let err = table.finalize().unwrap_err();
        assert!(err.to_string().contains("'state'"), "{err}");
    }

    #[test]
    fn test_finalize_checks_lock_index_and_reference_columns() {
        let base = TableDescriptor::new("Order", "orders")
            .with_column(ColumnDescriptor::field("id", SqlType::BigInt).primary_key());

        let optimistic = base.clone().with_lock_policy(LockPolicy::Optimistic);
        assert!(optimistic.finalize().is_err());

        let versioned = base
            .clone()
            .with_column(ColumnDescriptor::field("rev", SqlType::Integer).version())
            .with_lock_policy(LockPolicy::Optimistic);
        assert!(versioned.finalize().is_ok());

        let bad_index = base
            .clone()
            .with_index(IndexDescriptor::new("idx_missing", vec!["missing".into()]));
        assert!(bad_index.finalize().is_err());

        let bad_reference = base
            .clone()
            .with_reference(
                ReferenceDescriptor::new("customer", "Customer").on("customerId", "id"),
            );
        assert!(bad_reference.finalize().is_err());

        let no_pairs = base.with_reference(ReferenceDescriptor::new("customer", "Customer"));
        assert!(no_pairs.finalize().is_err());
    }
}
