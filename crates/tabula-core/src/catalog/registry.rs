//! Registry of table descriptors.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};

use super::{ColumnDescriptor, ReferenceDescriptor, TableDescriptor};
use crate::config::QueryConfig;
use crate::error::Error;
use crate::loader::LazyField;

/// Result of a successful registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome {
    /// The entity was not registered before.
    Inserted,
    /// A previous descriptor for the entity was replaced.
    Replaced,
}

/// Immutable view of the registry at one point in time.
#[derive(Debug, Default, Clone)]
struct Snapshot {
    /// Descriptors keyed by entity identity.
    tables: HashMap<String, Arc<TableDescriptor>>,
    /// Lowercased `schema.table` and `table` → entity identity.
    by_table: HashMap<String, String>,
}

impl Snapshot {
    fn table_keys(table: &TableDescriptor) -> Vec<String> {
        let mut keys = vec![table.table.to_ascii_lowercase()];
        if table.schema.is_some() {
            keys.push(table.qualified_name().to_ascii_lowercase());
        }
        keys
    }
}

/// Entity metadata registry.
///
/// Lifecycle is `new → register* → lookups/queries → drop`; independent
/// registries do not share state. Registration builds a new snapshot and
/// publishes it by swapping one pointer, so concurrent readers see either the
/// old or the new descriptor, never a partial one.
pub struct Registry {
    /// Current snapshot.
    snapshot: RwLock<Arc<Snapshot>>,
    /// Serializes writers so no registration is lost.
    write_lock: Mutex<()>,
    /// Bumped on every registration.
    version: AtomicU64,
    /// Builder limits.
    config: QueryConfig,
}

impl Registry {
    /// Create an empty registry with default query limits.
    pub fn new() -> Self {
        Self::with_config(QueryConfig::default())
    }

    /// Create an empty registry with custom query limits.
    pub fn with_config(config: QueryConfig) -> Self {
        Self {
            snapshot: RwLock::new(Arc::new(Snapshot::default())),
            write_lock: Mutex::new(()),
            version: AtomicU64::new(0),
            config,
        }
    }

    /// Query limits used by builders created over this registry.
    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    /// Registration counter. Cached results keyed under an older version are stale.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }

    fn current(&self) -> Arc<Snapshot> {
        self.snapshot.read().clone()
    }

    /// Register a table descriptor.
    ///
    /// Re-registering an entity replaces the previous descriptor and logs a
    /// warning. Fails only when the descriptor is structurally invalid.
    pub fn register(&self, descriptor: TableDescriptor) -> Result<RegisterOutcome, Error> {
        let table = Arc::new(descriptor.finalize()?);
        let entity = table.entity.clone();

        let _writer = self.write_lock.lock();
        let mut next = Snapshot::clone(&self.current());

        let previous = next.tables.insert(entity.clone(), Arc::clone(&table));
        if previous.is_some() {
            next.by_table.retain(|_, owner| *owner != entity);
        }
        for key in Snapshot::table_keys(&table) {
            if let Some(owner) = next.by_table.insert(key.clone(), entity.clone()) {
                if owner != entity {
                    warn!(
                        table = %key,
                        previous = %owner,
                        entity = %entity,
                        "table name re-bound to another entity"
                    );
                }
            }
        }

        *self.snapshot.write() = Arc::new(next);
        let version = self.version.fetch_add(1, Ordering::SeqCst) + 1;

        match previous {
            Some(_) => {
                warn!(
                    entity = %entity,
                    version,
                    "entity re-registered, previous descriptor replaced"
                );
                Ok(RegisterOutcome::Replaced)
            }
            None => {
                debug!(
                    entity = %entity,
                    table = %table.qualified_name(),
                    columns = table.columns.len(),
                    references = table.references.len(),
                    version,
                    "entity registered"
                );
                Ok(RegisterOutcome::Inserted)
            }
        }
    }

    /// Look up an entity's descriptor.
    pub fn lookup(&self, entity: &str) -> Option<Arc<TableDescriptor>> {
        self.current().tables.get(entity).cloned()
    }

    /// Look up an entity by its physical table name, ignoring case.
    pub fn lookup_by_table(&self, table: &str) -> Option<Arc<TableDescriptor>> {
        let snapshot = self.current();
        snapshot
            .by_table
            .get(&table.to_ascii_lowercase())
            .and_then(|entity| snapshot.tables.get(entity).cloned())
    }

    /// Look up an entity by schema-qualified table name, ignoring case.
    pub fn lookup_by_table_in(&self, schema: &str, table: &str) -> Option<Arc<TableDescriptor>> {
        self.lookup_by_table(&format!("{schema}.{table}"))
    }

    /// Check if `key` resolves to a column of `entity`.
    pub fn column_exists(&self, entity: &str, key: &str) -> bool {
        self.current()
            .tables
            .get(entity)
            .is_some_and(|t| t.column(key).is_some())
    }

    /// Resolve a column of `entity`.
    pub fn resolve_column(&self, entity: &str, key: &str) -> Option<ColumnDescriptor> {
        self.current()
            .tables
            .get(entity)
            .and_then(|t| t.column(key).cloned())
    }

    /// Reference declared on `entity` that points at `target`.
    pub fn resolve_reference(&self, entity: &str, target: &str) -> Option<ReferenceDescriptor> {
        self.current()
            .tables
            .get(entity)
            .and_then(|t| t.reference_to(target).cloned())
    }

    /// Check if an entity is registered.
    pub fn contains(&self, entity: &str) -> bool {
        self.current().tables.contains_key(entity)
    }

    /// Registered entity identities, sorted.
    pub fn entities(&self) -> Vec<String> {
        let mut names: Vec<String> = self.current().tables.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registered entities.
    pub fn len(&self) -> usize {
        self.current().tables.len()
    }

    /// Check if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Columns and references of `entity` that load on first access.
    pub fn lazy_fields(&self, entity: &str) -> Vec<LazyField> {
        let Some(table) = self.lookup(entity) else {
            return Vec::new();
        };
        let columns = table
            .columns
            .iter()
            .filter(|c| c.lazy_load)
            .map(|c| LazyField::Column(c.field.clone()));
        let references = table
            .references
            .iter()
            .filter(|r| r.lazy_load)
            .map(|r| LazyField::Reference(r.field.clone()));
        columns.chain(references).collect()
    }

    /// Columns of `entity` flagged as sensitive.
    pub fn sensitive_columns(&self, entity: &str) -> Vec<ColumnDescriptor> {
        self.lookup(entity)
            .map(|t| t.columns.iter().filter(|c| c.sensitive).cloned().collect())
            .unwrap_or_default()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("entities", &self.entities())
            .field("version", &self.version())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ColumnDescriptor, SqlType};

    fn order() -> TableDescriptor {
        TableDescriptor::new("Order", "orders")
            .in_schema("sales")
            .with_column(ColumnDescriptor::field("id", SqlType::BigInt).primary_key())
            .with_column(ColumnDescriptor::new("customerId", "customer_id", SqlType::BigInt))
            .with_column(ColumnDescriptor::field("status", SqlType::Varchar))
            .with_column(ColumnDescriptor::field("notes", SqlType::Clob).lazy())
            .with_column(ColumnDescriptor::field("cardNo", SqlType::Varchar).sensitive("cardNoEnc"))
            .with_reference(
                ReferenceDescriptor::new("customer", "Customer")
                    .on("customerId", "id")
                    .lazy(),
            )
    }

    fn customer() -> TableDescriptor {
        TableDescriptor::new("Customer", "customers")
            .with_column(ColumnDescriptor::field("id", SqlType::BigInt).primary_key())
            .with_column(ColumnDescriptor::field("name", SqlType::Varchar))
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = Registry::new();
        assert!(registry.is_empty());

        assert_eq!(registry.register(order()).unwrap(), RegisterOutcome::Inserted);
        assert_eq!(registry.register(customer()).unwrap(), RegisterOutcome::Inserted);

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.entities(), vec!["Customer", "Order"]);
        assert_eq!(registry.version(), 2);
        assert_eq!(registry.lookup("Order").unwrap().table, "orders");
        assert!(registry.lookup("Invoice").is_none());
        assert!(registry.lookup("order").is_none());
    }

    #[test]
    fn test_column_exists_any_case_either_form() {
        let registry = Registry::new();
        registry.register(order()).unwrap();

        for key in ["customerId", "CUSTOMERID", "customer_id", "Customer_ID"] {
            assert!(registry.column_exists("Order", key), "{key}");
            assert_eq!(registry.resolve_column("Order", key).unwrap().field, "customerId");
        }
        assert!(!registry.column_exists("Order", "customer"));
        assert!(!registry.column_exists("Invoice", "id"));
    }

    #[test]
    fn test_invalid_descriptor_is_not_published() {
        let registry = Registry::new();
        let invalid = TableDescriptor::new("Audit", "audit")
            .with_column(ColumnDescriptor::field("message", SqlType::Varchar));

        assert!(matches!(
            registry.register(invalid),
            Err(Error::InvalidDescriptor { .. })
        ));
        assert!(registry.is_empty());
        assert_eq!(registry.version(), 0);
    }

    #[test]
    fn test_reregistration_replaces_and_reindexes() {
        let registry = Registry::new();
        registry.register(order()).unwrap();
        assert!(registry.lookup_by_table("orders").is_some());

        let renamed = TableDescriptor::new("Order", "purchase_orders")
            .with_column(ColumnDescriptor::field("id", SqlType::BigInt).primary_key());
        assert_eq!(registry.register(renamed).unwrap(), RegisterOutcome::Replaced);

        assert_eq!(registry.len(), 1);
        assert!(registry.lookup_by_table("orders").is_none());
        assert!(registry.lookup_by_table_in("sales", "orders").is_none());
        assert_eq!(registry.lookup_by_table("PURCHASE_ORDERS").unwrap().entity, "Order");
        assert!(!registry.column_exists("Order", "status"));
    }

    #[test]
    fn test_reverse_lookup_by_table() {
        let registry = Registry::new();
        registry.register(order()).unwrap();

        assert_eq!(registry.lookup_by_table("ORDERS").unwrap().entity, "Order");
        assert_eq!(registry.lookup_by_table_in("Sales", "Orders").unwrap().entity, "Order");
        assert!(registry.lookup_by_table("customers").is_none());
    }

    #[test]
    fn test_resolve_reference() {
        let registry = Registry::new();
        registry.register(order()).unwrap();
        registry.register(customer()).unwrap();

        let reference = registry.resolve_reference("Order", "Customer").unwrap();
        assert_eq!(reference.join_columns[0].local, "customerId");
        assert!(registry.resolve_reference("Customer", "Order").is_none());
        assert!(registry.resolve_reference("Invoice", "Order").is_none());
    }

    #[test]
    fn test_lazy_and_sensitive_metadata() {
        let registry = Registry::new();
        registry.register(order()).unwrap();

        assert_eq!(
            registry.lazy_fields("Order"),
            vec![
                LazyField::Column("notes".into()),
                LazyField::Reference("customer".into())
            ]
        );
        let sensitive = registry.sensitive_columns("Order");
        assert_eq!(sensitive.len(), 1);
        assert_eq!(sensitive[0].encrypted_field.as_deref(), Some("cardNoEnc"));
        assert!(registry.lazy_fields("Invoice").is_empty());
    }

    #[test]
    fn test_concurrent_readers_see_whole_descriptors() {
        let registry = Arc::new(Registry::new());
        registry.register(customer()).unwrap();

        std::thread::scope(|scope| {
            for _ in 0..4 {
                let registry = Arc::clone(&registry);
                scope.spawn(move || {
                    for _ in 0..200 {
                        if let Some(order) = registry.lookup("Order") {
                            assert_eq!(order.columns.len(), 5);
                            assert!(order.reference_to("Customer").is_some());
                        }
                        assert!(registry.column_exists("Customer", "name"));
                    }
                });
            }
            scope.spawn(|| {
                for _ in 0..20 {
                    registry.register(order()).unwrap();
                }
            });
        });

        assert_eq!(registry.version(), 21);
    }
}
