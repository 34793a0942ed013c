//! Column descriptors.

use super::types::{GeneratorPolicy, SqlType};
use serde::{Deserialize, Serialize};

/// A column of a registered table.
///
/// A column is addressed by its logical `field` identity or by its physical
/// `column` name; both compare case-insensitively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    /// Logical field identity.
    pub field: String,
    /// Physical column name.
    pub column: String,
    /// Column type.
    pub sql_type: SqlType,
    /// Whether the column accepts NULL.
    #[serde(default = "default_true")]
    pub nullable: bool,
    /// Character or binary length.
    #[serde(default)]
    pub length: Option<u32>,
    /// Numeric precision.
    #[serde(default)]
    pub precision: Option<u8>,
    /// Numeric scale.
    #[serde(default)]
    pub scale: Option<u8>,
    /// Default value expression.
    #[serde(default)]
    pub default_value: Option<String>,
    /// Part of the primary key.
    #[serde(default)]
    pub primary_key: bool,
    /// Included in UPDATE statements.
    #[serde(default = "default_true")]
    pub updatable: bool,
    /// Unique constraint on this column alone.
    #[serde(default)]
    pub unique: bool,
    /// Fetched on first access instead of with the row.
    #[serde(default)]
    pub lazy_load: bool,
    /// Optimistic-lock version column.
    #[serde(default)]
    pub version: bool,
    /// Holds sensitive data.
    #[serde(default)]
    pub sensitive: bool,
    /// Field that receives the encrypted form of a sensitive value.
    #[serde(default)]
    pub encrypted_field: Option<String>,
    /// Value generation on insert.
    #[serde(default)]
    pub generator: GeneratorPolicy,
}

fn default_true() -> bool {
    true
}

impl ColumnDescriptor {
    /// Create a column whose field identity differs from its physical name.
    pub fn new(field: impl Into<String>, column: impl Into<String>, sql_type: SqlType) -> Self {
        Self {
            field: field.into(),
            column: column.into(),
            sql_type,
            nullable: true,
            length: None,
            precision: None,
            scale: None,
            default_value: None,
            primary_key: false,
            updatable: true,
            unique: false,
            lazy_load: false,
            version: false,
            sensitive: false,
            encrypted_field: None,
            generator: GeneratorPolicy::None,
        }
    }

    /// Create a column whose physical name equals its field identity.
    pub fn field(name: impl Into<String>, sql_type: SqlType) -> Self {
        let name = name.into();
        Self::new(name.clone(), name, sql_type)
    }

    /// Mark as (part of) the primary key. Primary keys are not nullable.
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    /// Set nullability.
    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// Set the length.
    pub fn with_length(mut self, length: u32) -> Self {
        self.length = Some(length);
        self
    }

    /// Set precision and scale.
    pub fn with_precision(mut self, precision: u8, scale: u8) -> Self {
        self.precision = Some(precision);
        self.scale = Some(scale);
        self
    }

    /// Set the default value expression.
    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default_value = Some(default.into());
        self
    }

    /// Exclude from updates.
    pub fn not_updatable(mut self) -> Self {
        self.updatable = false;
        self
    }

    /// Mark unique.
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Mark lazily loaded.
    pub fn lazy(mut self) -> Self {
        self.lazy_load = true;
        self
    }

    /// Mark as the optimistic-lock version column.
    pub fn version(mut self) -> Self {
        self.version = true;
        self
    }

    /// Mark sensitive, naming the field that stores the encrypted value.
    pub fn sensitive(mut self, encrypted_field: impl Into<String>) -> Self {
        self.sensitive = true;
        self.encrypted_field = Some(encrypted_field.into());
        self
    }

    /// Set the generator policy.
    pub fn with_generator(mut self, generator: GeneratorPolicy) -> Self {
        self.generator = generator;
        self
    }

    /// Check if `key` names this column, by field identity or physical name.
    pub fn matches_key(&self, key: &str) -> bool {
        self.field.eq_ignore_ascii_case(key) || self.column.eq_ignore_ascii_case(key)
    }

    /// Identity keys of this column, lowercased.
    pub(crate) fn identity_keys(&self) -> impl Iterator<Item = String> + '_ {
        let field = self.field.to_ascii_lowercase();
        let column = self.column.to_ascii_lowercase();
        let column = (column != field).then_some(column);
        std::iter::once(field).chain(column)
    }
}
