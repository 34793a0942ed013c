//! Condition trees.
//!
//! A condition is a leaf comparing a resolved column with an operand, or a
//! group of nested conditions. Every node carries the connective that joins it
//! to the sibling before it and a sort code; groups keep their children in
//! descending sort-code order.

use serde::Serialize;
use tabula_proto::Value;

use super::descriptor::QueryDescriptor;
use super::param::{ColumnRef, ParameterExpr};
use crate::catalog::{Connective, Registry};
use crate::error::Error;

/// Comparison operator of a condition leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Operator {
    Equal,
    NotEqual,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,
    Like,
    NotLike,
    IsNull,
    NotNull,
    In,
    NotIn,
    Between,
    NotBetween,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Equal => "EQUAL",
            Operator::NotEqual => "NOT_EQUAL",
            Operator::Greater => "GREATER",
            Operator::GreaterEqual => "GREATER_EQUAL",
            Operator::Less => "LESS",
            Operator::LessEqual => "LESS_EQUAL",
            Operator::Like => "LIKE",
            Operator::NotLike => "NOT_LIKE",
            Operator::IsNull => "IS_NULL",
            Operator::NotNull => "NOT_NULL",
            Operator::In => "IN",
            Operator::NotIn => "NOT_IN",
            Operator::Between => "BETWEEN",
            Operator::NotBetween => "NOT_BETWEEN",
        }
    }

    /// Stable one-byte discriminant.
    pub fn tag(&self) -> u8 {
        match self {
            Operator::Equal => 0x01,
            Operator::NotEqual => 0x02,
            Operator::Greater => 0x03,
            Operator::GreaterEqual => 0x04,
            Operator::Less => 0x05,
            Operator::LessEqual => 0x06,
            Operator::Like => 0x07,
            Operator::NotLike => 0x08,
            Operator::IsNull => 0x09,
            Operator::NotNull => 0x0A,
            Operator::In => 0x0B,
            Operator::NotIn => 0x0C,
            Operator::Between => 0x0D,
            Operator::NotBetween => 0x0E,
        }
    }

    /// Check that `operand` has a shape this operator accepts.
    pub fn check_operand(&self, operand: Option<&ParameterExpr>) -> Result<(), Error> {
        let reject = |reason: String| Error::InvalidOperand {
            operator: self.as_str(),
            reason,
        };

        match (self, operand) {
            (Operator::IsNull | Operator::NotNull, None) => Ok(()),
            (Operator::IsNull | Operator::NotNull, Some(op)) => {
                Err(reject(format!("a {} operand", op.kind())))
            }
            (_, None) => Err(reject("a missing operand".into())),

            (Operator::In | Operator::NotIn, Some(op)) => match op {
                ParameterExpr::SubQuery(_) => Ok(()),
                ParameterExpr::Array(values) if !values.is_empty() => Ok(()),
                ParameterExpr::Constant(value) if value.array_len().is_some_and(|n| n > 0) => {
                    Ok(())
                }
                ParameterExpr::Array(_) => Err(reject("an empty array".into())),
                ParameterExpr::Constant(value) if value.is_array() => {
                    Err(reject("an empty array".into()))
                }
                other => Err(reject(format!("a {} operand", other.kind()))),
            },

            (Operator::Between | Operator::NotBetween, Some(op)) => match op {
                ParameterExpr::Range { .. } => Ok(()),
                other => Err(reject(format!("a {} operand", other.kind()))),
            },

            (_, Some(op)) => match op {
                ParameterExpr::Range { .. } | ParameterExpr::Array(_) => {
                    Err(reject(format!("a {} operand", op.kind())))
                }
                ParameterExpr::Constant(Value::Null) => {
                    Err(reject("a null constant; use IS_NULL or NOT_NULL".into()))
                }
                ParameterExpr::Constant(value)
                    if matches!(self, Operator::Like | Operator::NotLike)
                        && value.as_str().is_none() =>
                {
                    Err(reject("a non-string pattern".into()))
                }
                _ => Ok(()),
            },
        }
    }
}

/// A leaf comparing one column with an operand.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Condition {
    connective: Connective,
    operator: Operator,
    column: ColumnRef,
    operand: Option<ParameterExpr>,
    sort_code: i32,
}

impl Condition {
    pub fn connective(&self) -> Connective {
        self.connective
    }

    pub fn operator(&self) -> Operator {
        self.operator
    }

    /// The resolved column.
    pub fn column(&self) -> &ColumnRef {
        &self.column
    }

    /// Entity the column key was declared against.
    pub fn entity(&self) -> &str {
        self.column.entity()
    }

    /// Canonical identity key.
    pub fn key(&self) -> String {
        self.column.key()
    }

    /// Operand; `None` for null checks.
    pub fn operand(&self) -> Option<&ParameterExpr> {
        self.operand.as_ref()
    }

    pub fn sort_code(&self) -> i32 {
        self.sort_code
    }
}

/// A group of nested conditions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConditionGroup {
    connective: Connective,
    sort_code: i32,
    children: Vec<ConditionNode>,
}

impl ConditionGroup {
    pub fn connective(&self) -> Connective {
        self.connective
    }

    pub fn sort_code(&self) -> i32 {
        self.sort_code
    }

    /// Children in descending sort-code order. Never empty.
    pub fn children(&self) -> &[ConditionNode] {
        &self.children
    }
}

/// A node of a condition tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ConditionNode {
    Leaf(Condition),
    Group(ConditionGroup),
}

impl ConditionNode {
    pub fn connective(&self) -> Connective {
        match self {
            ConditionNode::Leaf(leaf) => leaf.connective,
            ConditionNode::Group(group) => group.connective,
        }
    }

    pub fn sort_code(&self) -> i32 {
        match self {
            ConditionNode::Leaf(leaf) => leaf.sort_code,
            ConditionNode::Group(group) => group.sort_code,
        }
    }

    /// Number of leaves in this subtree.
    pub fn leaf_count(&self) -> usize {
        match self {
            ConditionNode::Leaf(_) => 1,
            ConditionNode::Group(group) => group.children.iter().map(|c| c.leaf_count()).sum(),
        }
    }

    /// Deepest sub-query nesting inside this subtree.
    pub fn depth(&self) -> usize {
        match self {
            ConditionNode::Leaf(leaf) => leaf.operand.as_ref().map_or(0, |op| op.depth()),
            ConditionNode::Group(group) => {
                group.children.iter().map(|c| c.depth()).max().unwrap_or(0)
            }
        }
    }

    /// Column references of this subtree, outside sub-queries.
    pub fn columns(&self) -> Vec<&ColumnRef> {
        let mut out = Vec::new();
        self.collect_columns(&mut out);
        out
    }

    fn collect_columns<'a>(&'a self, out: &mut Vec<&'a ColumnRef>) {
        match self {
            ConditionNode::Leaf(leaf) => {
                out.push(&leaf.column);
                if let Some(operand) = &leaf.operand {
                    out.extend(operand.columns());
                }
            }
            ConditionNode::Group(group) => {
                for child in &group.children {
                    child.collect_columns(out);
                }
            }
        }
    }
}

/// Sorts nodes by descending sort code, keeping insertion order among equals.
pub(crate) fn sort_descending<T>(items: &mut [T], code: impl Fn(&T) -> i32) {
    items.sort_by(|a, b| code(b).cmp(&code(a)));
}

/// Condition factory bound to a registry.
///
/// [`Conditions::leaf`] is the one validating constructor; the named
/// wrappers build AND-connected leaves with sort code `0`.
#[derive(Debug, Clone, Copy)]
pub struct Conditions<'r> {
    registry: &'r Registry,
}

impl<'r> Conditions<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Self { registry }
    }

    /// Build a validated leaf.
    pub fn leaf(
        &self,
        sort_code: i32,
        connective: Connective,
        operator: Operator,
        entity: &str,
        key: &str,
        operand: Option<ParameterExpr>,
    ) -> Result<ConditionNode, Error> {
        let column = ColumnRef::resolve(self.registry, entity, key)?;
        operator.check_operand(operand.as_ref())?;
        Ok(ConditionNode::Leaf(Condition {
            connective,
            operator,
            column,
            operand,
            sort_code,
        }))
    }

    /// Build a group. Children are ordered by descending sort code.
    pub fn group(
        &self,
        sort_code: i32,
        connective: Connective,
        mut children: Vec<ConditionNode>,
    ) -> Result<ConditionNode, Error> {
        if children.is_empty() {
            return Err(Error::EmptyConditionGroup);
        }
        sort_descending(&mut children, ConditionNode::sort_code);
        Ok(ConditionNode::Group(ConditionGroup {
            connective,
            sort_code,
            children,
        }))
    }

    fn compare(
        &self,
        operator: Operator,
        entity: &str,
        key: &str,
        operand: ParameterExpr,
    ) -> Result<ConditionNode, Error> {
        self.leaf(0, Connective::And, operator, entity, key, Some(operand))
    }

    pub fn equal_to(
        &self,
        entity: &str,
        key: &str,
        operand: impl Into<ParameterExpr>,
    ) -> Result<ConditionNode, Error> {
        self.compare(Operator::Equal, entity, key, operand.into())
    }

    pub fn not_equal(
        &self,
        entity: &str,
        key: &str,
        operand: impl Into<ParameterExpr>,
    ) -> Result<ConditionNode, Error> {
        self.compare(Operator::NotEqual, entity, key, operand.into())
    }

    pub fn greater(
        &self,
        entity: &str,
        key: &str,
        operand: impl Into<ParameterExpr>,
    ) -> Result<ConditionNode, Error> {
        self.compare(Operator::Greater, entity, key, operand.into())
    }

    pub fn greater_equal(
        &self,
        entity: &str,
        key: &str,
        operand: impl Into<ParameterExpr>,
    ) -> Result<ConditionNode, Error> {
        self.compare(Operator::GreaterEqual, entity, key, operand.into())
    }

    pub fn less(
        &self,
        entity: &str,
        key: &str,
        operand: impl Into<ParameterExpr>,
    ) -> Result<ConditionNode, Error> {
        self.compare(Operator::Less, entity, key, operand.into())
    }

    pub fn less_equal(
        &self,
        entity: &str,
        key: &str,
        operand: impl Into<ParameterExpr>,
    ) -> Result<ConditionNode, Error> {
        self.compare(Operator::LessEqual, entity, key, operand.into())
    }

    pub fn like(
        &self,
        entity: &str,
        key: &str,
        pattern: impl Into<String>,
    ) -> Result<ConditionNode, Error> {
        self.compare(Operator::Like, entity, key, ParameterExpr::constant(pattern.into()))
    }

    pub fn not_like(
        &self,
        entity: &str,
        key: &str,
        pattern: impl Into<String>,
    ) -> Result<ConditionNode, Error> {
        self.compare(Operator::NotLike, entity, key, ParameterExpr::constant(pattern.into()))
    }

    pub fn is_null(&self, entity: &str, key: &str) -> Result<ConditionNode, Error> {
        self.leaf(0, Connective::And, Operator::IsNull, entity, key, None)
    }

    pub fn not_null(&self, entity: &str, key: &str) -> Result<ConditionNode, Error> {
        self.leaf(0, Connective::And, Operator::NotNull, entity, key, None)
    }

    /// `IN` over a non-empty value list.
    pub fn in_values(
        &self,
        entity: &str,
        key: &str,
        values: Vec<Value>,
    ) -> Result<ConditionNode, Error> {
        let operand = ParameterExpr::array(values)?;
        self.compare(Operator::In, entity, key, operand)
    }

    pub fn not_in(
        &self,
        entity: &str,
        key: &str,
        values: Vec<Value>,
    ) -> Result<ConditionNode, Error> {
        let operand = ParameterExpr::array(values)?;
        self.compare(Operator::NotIn, entity, key, operand)
    }

    /// `IN` over the rows of a sealed sub-query.
    pub fn in_sub_query(
        &self,
        entity: &str,
        key: &str,
        query: QueryDescriptor,
    ) -> Result<ConditionNode, Error> {
        let operand = ParameterExpr::sub_query(self.registry, query)?;
        self.compare(Operator::In, entity, key, operand)
    }

    pub fn between(
        &self,
        entity: &str,
        key: &str,
        begin: impl Into<Value>,
        end: impl Into<Value>,
    ) -> Result<ConditionNode, Error> {
        self.compare(Operator::Between, entity, key, ParameterExpr::range(begin, end))
    }

    pub fn not_between(
        &self,
        entity: &str,
        key: &str,
        begin: impl Into<Value>,
        end: impl Into<Value>,
    ) -> Result<ConditionNode, Error> {
        self.compare(Operator::NotBetween, entity, key, ParameterExpr::range(begin, end))
    }
}
