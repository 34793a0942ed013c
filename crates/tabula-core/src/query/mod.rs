//! Query model: parameters, conditions, joins and the builder that seals
//! them into a [`QueryDescriptor`].

mod builder;
mod condition;
mod descriptor;
mod join;
mod param;

pub use builder::{BuilderState, QueryBuilder};
pub use condition::{Condition, ConditionGroup, ConditionNode, Conditions, Operator};
pub use descriptor::{
    GroupItem, LockOption, OrderDirection, OrderItem, Page, Projection, QueryDescriptor,
};
pub use join::{JoinEdge, JoinKey, JoinResolver, JoinType};
pub use param::{ColumnRef, FunctionCall, ParameterExpr};
