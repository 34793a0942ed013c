//! Sealed query descriptors and their items.

use serde::Serialize;

use super::condition::ConditionNode;
use super::join::JoinEdge;
use super::param::{ColumnRef, ParameterExpr};
use crate::error::Error;

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum OrderDirection {
    #[default]
    Asc,
    Desc,
}

impl OrderDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderDirection::Asc => "ASC",
            OrderDirection::Desc => "DESC",
        }
    }
}

/// Row-lock behavior of a locking read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum LockOption {
    /// Block until the lock is granted.
    #[default]
    Default,
    /// Fail immediately when a row is locked.
    NoWait,
    /// Skip locked rows.
    SkipLocked,
    /// Wait at most this many seconds.
    Wait(u32),
}

/// 1-based page of results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Page {
    pub number: u32,
    pub size: u32,
}

impl Page {
    /// Validate and build a page.
    pub fn new(number: u32, size: u32, max_size: u32) -> Result<Self, Error> {
        if number == 0 {
            return Err(Error::InvalidArgument("page number starts at 1".into()));
        }
        if size == 0 || size > max_size {
            return Err(Error::InvalidArgument(format!(
                "page size {size} is outside 1..={max_size}"
            )));
        }
        Ok(Self { number, size })
    }

    /// Rows skipped before this page.
    pub fn offset(&self) -> u64 {
        (self.number as u64 - 1) * self.size as u64
    }
}

/// A projected item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Projection {
    expr: ParameterExpr,
    sort_code: i32,
}

impl Projection {
    /// Project a column, function call or sub-query.
    pub fn new(expr: ParameterExpr, sort_code: i32) -> Result<Self, Error> {
        match expr {
            ParameterExpr::Column(_) | ParameterExpr::Function(_) | ParameterExpr::SubQuery(_) => {
                Ok(Self { expr, sort_code })
            }
            other => Err(Error::InvalidArgument(format!(
                "a {} cannot be projected",
                other.kind()
            ))),
        }
    }

    pub(crate) fn column(column: ColumnRef) -> Self {
        Self {
            expr: ParameterExpr::Column(column),
            sort_code: 0,
        }
    }

    pub fn expr(&self) -> &ParameterExpr {
        &self.expr
    }

    pub fn sort_code(&self) -> i32 {
        self.sort_code
    }
}

/// An ORDER BY item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct OrderItem {
    column: ColumnRef,
    direction: OrderDirection,
    sort_code: i32,
}

impl OrderItem {
    pub fn new(column: ColumnRef, direction: OrderDirection, sort_code: i32) -> Self {
        Self {
            column,
            direction,
            sort_code,
        }
    }

    pub fn column(&self) -> &ColumnRef {
        &self.column
    }

    pub fn direction(&self) -> OrderDirection {
        self.direction
    }

    pub fn sort_code(&self) -> i32 {
        self.sort_code
    }
}

/// A GROUP BY item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct GroupItem {
    column: ColumnRef,
    sort_code: i32,
}

impl GroupItem {
    pub fn new(column: ColumnRef, sort_code: i32) -> Self {
        Self { column, sort_code }
    }

    pub fn column(&self) -> &ColumnRef {
        &self.column
    }

    pub fn sort_code(&self) -> i32 {
        self.sort_code
    }
}

/// An immutable, validated query.
///
/// Only produced by [`QueryBuilder::seal`](super::QueryBuilder::seal).
/// Every list is in descending sort-code order except the joins, which keep
/// attachment order so that each edge's source precedes it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryDescriptor {
    pub(crate) name: Option<String>,
    pub(crate) root_entity: String,
    pub(crate) root_table: String,
    pub(crate) root_schema: Option<String>,
    pub(crate) joins: Vec<JoinEdge>,
    pub(crate) projections: Vec<Projection>,
    pub(crate) conditions: Vec<ConditionNode>,
    pub(crate) order_by: Vec<OrderItem>,
    pub(crate) group_by: Vec<GroupItem>,
    pub(crate) cacheable: bool,
    pub(crate) for_update: bool,
    pub(crate) lock: LockOption,
    pub(crate) page: Option<Page>,
    #[serde(skip)]
    pub(crate) depth: usize,
}

impl QueryDescriptor {
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn root_entity(&self) -> &str {
        &self.root_entity
    }

    /// Physical table of the root entity.
    pub fn root_table(&self) -> &str {
        &self.root_table
    }

    pub fn root_schema(&self) -> Option<&str> {
        self.root_schema.as_deref()
    }

    pub fn joins(&self) -> &[JoinEdge] {
        &self.joins
    }

    pub fn projections(&self) -> &[Projection] {
        &self.projections
    }

    pub fn conditions(&self) -> &[ConditionNode] {
        &self.conditions
    }

    pub fn order_by(&self) -> &[OrderItem] {
        &self.order_by
    }

    pub fn group_by(&self) -> &[GroupItem] {
        &self.group_by
    }

    /// Results may be cached. Always false for locking reads.
    pub fn cacheable(&self) -> bool {
        self.cacheable
    }

    pub fn for_update(&self) -> bool {
        self.for_update
    }

    pub fn lock(&self) -> LockOption {
        self.lock
    }

    pub fn page(&self) -> Option<Page> {
        self.page
    }

    /// Deepest sub-query nesting below this query; `0` without sub-queries.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// The root entity followed by every joined entity.
    pub fn entities(&self) -> Vec<&str> {
        std::iter::once(self.root_entity.as_str())
            .chain(self.joins.iter().map(|j| j.target()))
            .collect()
    }
}
