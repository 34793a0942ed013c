//! Lazy field loading.
//!
//! Columns and references flagged `lazy_load` are not part of the projected
//! row. [`LazyRow`] serves the fields a row already carries and asks a
//! [`LazyLoader`] for lazy ones on first access, memoizing the answer.

use std::collections::HashMap;

use tabula_proto::{Row, Value};
use tracing::trace;

use crate::catalog::Registry;
use crate::error::Error;

/// A field of an entity that is loaded on first access.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LazyField {
    /// Lazily loaded column, by field identity.
    Column(String),
    /// Lazily resolved reference, by owning field.
    Reference(String),
}

impl LazyField {
    /// Field identity.
    pub fn name(&self) -> &str {
        match self {
            LazyField::Column(name) | LazyField::Reference(name) => name,
        }
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, LazyField::Reference(_))
    }
}

/// Fetches lazy fields from the backing store.
pub trait LazyLoader: Send + Sync {
    /// Load `field` of the `entity` row `owner`.
    fn load(&self, entity: &str, field: &LazyField, owner: &Row) -> Result<Value, Error>;
}

/// A result row whose lazy fields are fetched on demand.
pub struct LazyRow<'a, L: LazyLoader + ?Sized> {
    entity: String,
    row: Row,
    lazy: Vec<LazyField>,
    loaded: HashMap<String, Value>,
    loader: &'a L,
}

impl<'a, L: LazyLoader + ?Sized> LazyRow<'a, L> {
    /// Wrap a row of `entity`.
    pub fn new(registry: &Registry, entity: &str, row: Row, loader: &'a L) -> Result<Self, Error> {
        if !registry.contains(entity) {
            return Err(Error::UnregisteredEntity(entity.to_string()));
        }
        Ok(Self {
            entity: entity.to_string(),
            row,
            lazy: registry.lazy_fields(entity),
            loaded: HashMap::new(),
            loader,
        })
    }

    /// Entity the row belongs to.
    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// The eagerly projected row.
    pub fn row(&self) -> &Row {
        &self.row
    }

    /// Check if a lazy field was already fetched.
    pub fn is_loaded(&self, field: &str) -> bool {
        self.loaded.keys().any(|k| k.eq_ignore_ascii_case(field))
    }

    /// Get a field, loading it when it is lazy and not yet fetched.
    pub fn get(&mut self, field: &str) -> Result<&Value, Error> {
        if let Some(pos) = self
            .row
            .fields
            .iter()
            .position(|(name, _)| name.eq_ignore_ascii_case(field))
        {
            return Ok(&self.row.fields[pos].1);
        }

        let lazy = self
            .lazy
            .iter()
            .find(|f| f.name().eq_ignore_ascii_case(field))
            .cloned()
            .ok_or_else(|| Error::unknown_column(&self.entity, field))?;
        let key = lazy.name().to_string();

        if !self.loaded.contains_key(&key) {
            trace!(entity = %self.entity, field = %key, "loading lazy field");
            let value = self.loader.load(&self.entity, &lazy, &self.row)?;
            self.loaded.insert(key.clone(), value);
        }

        self.loaded
            .get(&key)
            .ok_or_else(|| Error::unknown_column(&self.entity, field))
    }

    /// The row with every fetched lazy field appended.
    pub fn into_row(self) -> Row {
        let mut row = self.row;
        for field in &self.lazy {
            if let Some(value) = self.loaded.get(field.name()) {
                row.set(field.name(), value.clone());
            }
        }
        row
    }
}
