//! Fluent query builder.

use std::collections::HashSet;
use std::sync::Arc;

use tabula_proto::Value;
use tracing::debug;

use super::condition::{sort_descending, ConditionNode, Conditions};
use super::descriptor::{
    GroupItem, LockOption, OrderDirection, OrderItem, Page, Projection, QueryDescriptor,
};
use super::join::{JoinEdge, JoinKey, JoinResolver, JoinType};
use super::param::{ColumnRef, ParameterExpr};
use crate::catalog::{Registry, TableDescriptor};
use crate::error::Error;

/// Lifecycle of a [`QueryBuilder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuilderState {
    /// Nothing added yet.
    Empty,
    /// At least one item added.
    Configuring,
    /// [`QueryBuilder::seal`] succeeded; every further call fails.
    Sealed,
}

/// Builds a [`QueryDescriptor`] rooted at one registered entity.
///
/// Every item is validated against the registry as it is added. Projections,
/// conditions, order-by and group-by items are added at most once under
/// structural equality.
///
/// ```ignore
/// let mut builder = QueryBuilder::new(&registry, "Order")?;
/// builder
///     .join("Customer")?
///     .equal_to("Order", "status", "OPEN")?
///     .order_by_desc("Order", "amount")?;
/// let query = builder.seal()?;
/// ```
#[derive(Debug)]
pub struct QueryBuilder<'r> {
    registry: &'r Registry,
    root: Arc<TableDescriptor>,
    state: BuilderState,
    name: Option<String>,
    joins: Vec<JoinEdge>,
    projections: Vec<Projection>,
    conditions: Vec<ConditionNode>,
    order_by: Vec<OrderItem>,
    group_by: Vec<GroupItem>,
    cacheable: bool,
    for_update: bool,
    lock: LockOption,
    page: Option<Page>,
}

impl<'r> QueryBuilder<'r> {
    /// Start a query over `root`.
    pub fn new(registry: &'r Registry, root: &str) -> Result<Self, Error> {
        let root = registry
            .lookup(root)
            .ok_or_else(|| Error::UnregisteredEntity(root.to_string()))?;
        let cacheable = registry.config().default_cacheable && root.cacheable;
        Ok(Self {
            registry,
            root,
            state: BuilderState::Empty,
            name: None,
            joins: Vec::new(),
            projections: Vec::new(),
            conditions: Vec::new(),
            order_by: Vec::new(),
            group_by: Vec::new(),
            cacheable,
            for_update: false,
            lock: LockOption::Default,
            page: None,
        })
    }

    pub fn state(&self) -> BuilderState {
        self.state
    }

    /// Root entity identity.
    pub fn root(&self) -> &str {
        &self.root.entity
    }

    /// Condition factory over the same registry, for building groups.
    pub fn conditions(&self) -> Conditions<'r> {
        Conditions::new(self.registry)
    }

    fn touch(&mut self) -> Result<(), Error> {
        if self.state == BuilderState::Sealed {
            return Err(Error::BuilderSealed);
        }
        self.state = BuilderState::Configuring;
        Ok(())
    }

    fn column(&self, entity: &str, key: &str) -> Result<ColumnRef, Error> {
        ColumnRef::resolve(self.registry, entity, key)
    }

    /// Name the query. The name is not part of the cache key.
    pub fn name(&mut self, name: impl Into<String>) -> Result<&mut Self, Error> {
        self.touch()?;
        self.name = Some(name.into());
        Ok(self)
    }

    // Projections

    pub fn add_projection(&mut self, projection: Projection) -> Result<&mut Self, Error> {
        self.touch()?;
        if !self.projections.contains(&projection) {
            self.projections.push(projection);
        }
        Ok(self)
    }

    pub fn select(&mut self, entity: &str, key: &str) -> Result<&mut Self, Error> {
        let column = self.column(entity, key)?;
        self.add_projection(Projection::column(column))
    }

    pub fn select_as(
        &mut self,
        entity: &str,
        key: &str,
        alias: impl Into<String>,
    ) -> Result<&mut Self, Error> {
        let column = self.column(entity, key)?.with_alias(alias);
        self.add_projection(Projection::column(column))
    }

    pub fn select_function(
        &mut self,
        name: &str,
        args: Vec<ParameterExpr>,
        alias: impl Into<String>,
    ) -> Result<&mut Self, Error> {
        let call = ParameterExpr::function_as(name, args, alias)?;
        self.add_projection(Projection::new(call, 0)?)
    }

    pub fn select_sub_query(&mut self, query: QueryDescriptor) -> Result<&mut Self, Error> {
        let sub_query = ParameterExpr::sub_query(self.registry, query)?;
        self.add_projection(Projection::new(sub_query, 0)?)
    }

    // Joins

    /// Inner join from the root to `target` on registered references.
    pub fn join(&mut self, target: &str) -> Result<&mut Self, Error> {
        let root = self.root.entity.clone();
        self.join_on(&root, target, JoinType::Inner, &[])
    }

    /// Join from `source` to `target` on registered references.
    pub fn join_table(
        &mut self,
        source: &str,
        target: &str,
        join_type: JoinType,
    ) -> Result<&mut Self, Error> {
        self.join_on(source, target, join_type, &[])
    }

    /// Join from `source` to `target` on explicit keys.
    pub fn join_on(
        &mut self,
        source: &str,
        target: &str,
        join_type: JoinType,
        keys: &[JoinKey],
    ) -> Result<&mut Self, Error> {
        self.touch()?;
        JoinResolver::new(self.registry).attach(
            &self.root.entity,
            &mut self.joins,
            source,
            target,
            join_type,
            keys,
        )?;
        Ok(self)
    }

    // Conditions

    pub fn add_condition(&mut self, condition: ConditionNode) -> Result<&mut Self, Error> {
        self.touch()?;
        if !self.conditions.contains(&condition) {
            self.conditions.push(condition);
        }
        Ok(self)
    }

    pub fn equal_to(
        &mut self,
        entity: &str,
        key: &str,
        operand: impl Into<ParameterExpr>,
    ) -> Result<&mut Self, Error> {
        let node = self.conditions().equal_to(entity, key, operand)?;
        self.add_condition(node)
    }

    pub fn not_equal(
        &mut self,
        entity: &str,
        key: &str,
        operand: impl Into<ParameterExpr>,
    ) -> Result<&mut Self, Error> {
        let node = self.conditions().not_equal(entity, key, operand)?;
        self.add_condition(node)
    }

    pub fn greater(
        &mut self,
        entity: &str,
        key: &str,
        operand: impl Into<ParameterExpr>,
    ) -> Result<&mut Self, Error> {
        let node = self.conditions().greater(entity, key, operand)?;
        self.add_condition(node)
    }

    pub fn greater_equal(
        &mut self,
        entity: &str,
        key: &str,
        operand: impl Into<ParameterExpr>,
    ) -> Result<&mut Self, Error> {
        let node = self.conditions().greater_equal(entity, key, operand)?;
        self.add_condition(node)
    }

    pub fn less(
        &mut self,
        entity: &str,
        key: &str,
        operand: impl Into<ParameterExpr>,
    ) -> Result<&mut Self, Error> {
        let node = self.conditions().less(entity, key, operand)?;
        self.add_condition(node)
    }

    pub fn less_equal(
        &mut self,
        entity: &str,
        key: &str,
        operand: impl Into<ParameterExpr>,
    ) -> Result<&mut Self, Error> {
        let node = self.conditions().less_equal(entity, key, operand)?;
        self.add_condition(node)
    }

    pub fn like(
        &mut self,
        entity: &str,
        key: &str,
        pattern: impl Into<String>,
    ) -> Result<&mut Self, Error> {
        let node = self.conditions().like(entity, key, pattern)?;
        self.add_condition(node)
    }

    pub fn not_like(
        &mut self,
        entity: &str,
        key: &str,
        pattern: impl Into<String>,
    ) -> Result<&mut Self, Error> {
        let node = self.conditions().not_like(entity, key, pattern)?;
        self.add_condition(node)
    }

    pub fn is_null(&mut self, entity: &str, key: &str) -> Result<&mut Self, Error> {
        let node = self.conditions().is_null(entity, key)?;
        self.add_condition(node)
    }

    pub fn not_null(&mut self, entity: &str, key: &str) -> Result<&mut Self, Error> {
        let node = self.conditions().not_null(entity, key)?;
        self.add_condition(node)
    }

    pub fn in_values(
        &mut self,
        entity: &str,
        key: &str,
        values: Vec<Value>,
    ) -> Result<&mut Self, Error> {
        let node = self.conditions().in_values(entity, key, values)?;
        self.add_condition(node)
    }

    pub fn not_in(
        &mut self,
        entity: &str,
        key: &str,
        values: Vec<Value>,
    ) -> Result<&mut Self, Error> {
        let node = self.conditions().not_in(entity, key, values)?;
        self.add_condition(node)
    }

    pub fn in_sub_query(
        &mut self,
        entity: &str,
        key: &str,
        query: QueryDescriptor,
    ) -> Result<&mut Self, Error> {
        let node = self.conditions().in_sub_query(entity, key, query)?;
        self.add_condition(node)
    }

    pub fn between(
        &mut self,
        entity: &str,
        key: &str,
        begin: impl Into<Value>,
        end: impl Into<Value>,
    ) -> Result<&mut Self, Error> {
        let node = self.conditions().between(entity, key, begin, end)?;
        self.add_condition(node)
    }

    pub fn not_between(
        &mut self,
        entity: &str,
        key: &str,
        begin: impl Into<Value>,
        end: impl Into<Value>,
    ) -> Result<&mut Self, Error> {
        let node = self.conditions().not_between(entity, key, begin, end)?;
        self.add_condition(node)
    }

    // Ordering and grouping

    pub fn add_order(&mut self, item: OrderItem) -> Result<&mut Self, Error> {
        self.touch()?;
        if !self.order_by.contains(&item) {
            self.order_by.push(item);
        }
        Ok(self)
    }

    pub fn order_by(&mut self, entity: &str, key: &str) -> Result<&mut Self, Error> {
        let column = self.column(entity, key)?;
        self.add_order(OrderItem::new(column, OrderDirection::Asc, 0))
    }

    pub fn order_by_desc(&mut self, entity: &str, key: &str) -> Result<&mut Self, Error> {
        let column = self.column(entity, key)?;
        self.add_order(OrderItem::new(column, OrderDirection::Desc, 0))
    }

    pub fn add_group(&mut self, item: GroupItem) -> Result<&mut Self, Error> {
        self.touch()?;
        if !self.group_by.contains(&item) {
            self.group_by.push(item);
        }
        Ok(self)
    }

    pub fn group_by(&mut self, entity: &str, key: &str) -> Result<&mut Self, Error> {
        let column = self.column(entity, key)?;
        self.add_group(GroupItem::new(column, 0))
    }

    // Paging, locking, caching

    /// Request the 1-based page `number` of `size` rows.
    pub fn page(&mut self, number: u32, size: u32) -> Result<&mut Self, Error> {
        let page = Page::new(number, size, self.registry.config().max_page_size)?;
        self.touch()?;
        self.page = Some(page);
        Ok(self)
    }

    /// Make this a locking read.
    pub fn for_update(&mut self, for_update: bool) -> Result<&mut Self, Error> {
        self.touch()?;
        self.for_update = for_update;
        Ok(self)
    }

    /// Set the row-lock behavior. Anything but [`LockOption::Default`] also
    /// makes this a locking read.
    pub fn lock(&mut self, lock: LockOption) -> Result<&mut Self, Error> {
        self.touch()?;
        self.lock = lock;
        if lock != LockOption::Default {
            self.for_update = true;
        }
        Ok(self)
    }

    pub fn cacheable(&mut self, cacheable: bool) -> Result<&mut Self, Error> {
        self.touch()?;
        self.cacheable = cacheable;
        Ok(self)
    }

    /// Validate and freeze the query.
    ///
    /// On failure the builder stays open so the caller can fix the query.
    pub fn seal(&mut self) -> Result<QueryDescriptor, Error> {
        if self.state == BuilderState::Sealed {
            return Err(Error::BuilderSealed);
        }

        self.check_entities()?;

        if self.projections.is_empty() {
            let entity = self.root.entity.clone();
            self.projections = self
                .root
                .eager_columns()
                .map(|c| Projection::column(ColumnRef::from_column(&entity, c)))
                .collect();
        }

        sort_descending(&mut self.projections, Projection::sort_code);
        sort_descending(&mut self.conditions, ConditionNode::sort_code);
        sort_descending(&mut self.order_by, OrderItem::sort_code);
        sort_descending(&mut self.group_by, GroupItem::sort_code);

        let depth = self
            .projections
            .iter()
            .map(|p| p.expr().depth())
            .chain(self.conditions.iter().map(|c| c.depth()))
            .max()
            .unwrap_or(0);

        self.state = BuilderState::Sealed;
        let descriptor = QueryDescriptor {
            name: self.name.take(),
            root_entity: self.root.entity.clone(),
            root_table: self.root.table.clone(),
            root_schema: self.root.schema.clone(),
            joins: std::mem::take(&mut self.joins),
            projections: std::mem::take(&mut self.projections),
            conditions: std::mem::take(&mut self.conditions),
            order_by: std::mem::take(&mut self.order_by),
            group_by: std::mem::take(&mut self.group_by),
            cacheable: self.cacheable && !self.for_update,
            for_update: self.for_update,
            lock: self.lock,
            page: self.page,
            depth,
        };

        debug!(
            root = %descriptor.root_entity,
            joins = descriptor.joins.len(),
            projections = descriptor.projections.len(),
            conditions = descriptor.conditions.len(),
            cacheable = descriptor.cacheable,
            "query sealed"
        );
        Ok(descriptor)
    }

    fn check_entities(&self) -> Result<(), Error> {
        let in_query: HashSet<&str> = std::iter::once(self.root.entity.as_str())
            .chain(self.joins.iter().map(|j| j.target()))
            .collect();

        let projected = self.projections.iter().flat_map(|p| p.expr().columns());
        let filtered = self.conditions.iter().flat_map(|c| c.columns());
        let ordered = self.order_by.iter().map(|o| o.column());
        let grouped = self.group_by.iter().map(|g| g.column());

        for column in projected.chain(filtered).chain(ordered).chain(grouped) {
            if !in_query.contains(column.entity()) {
                return Err(Error::EntityNotInQuery(column.entity().to_string()));
            }
        }
        Ok(())
    }
}
