//! Parameter expressions: the operands of conditions and the items of
//! projections.
//!
//! Column references and function calls are validated against the registry
//! when they are built; a value of these types is always resolvable.

use serde::Serialize;
use tabula_proto::Value;

use super::descriptor::QueryDescriptor;
use crate::catalog::{ColumnDescriptor, Registry};
use crate::error::Error;

/// A resolved reference to a column.
///
/// Stores the declared field identity rather than the key it was resolved
/// from, so `"STATUS"`, `"status"` and the physical column name produce equal
/// references.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ColumnRef {
    entity: String,
    reference: Option<String>,
    target: String,
    field: String,
    alias: Option<String>,
}

impl ColumnRef {
    /// Resolve `key` on `entity`.
    ///
    /// `key` is a field identity, a physical column name, or a
    /// `referenceField.column` path whose column resolves on the reference
    /// target.
    pub fn resolve(registry: &Registry, entity: &str, key: &str) -> Result<Self, Error> {
        let table = registry
            .lookup(entity)
            .ok_or_else(|| Error::UnregisteredEntity(entity.to_string()))?;
        if let Some(column) = table.column(key) {
            return Ok(Self::from_column(&table.entity, column));
        }

        let Some((path, column_key)) = key.split_once('.') else {
            return Err(Error::unknown_column(entity, key));
        };
        let reference = table
            .reference_by_field(path)
            .ok_or_else(|| Error::unknown_column(entity, key))?;
        let target = registry
            .lookup(&reference.target_entity)
            .ok_or_else(|| Error::UnregisteredEntity(reference.target_entity.clone()))?;
        let column = target
            .column(column_key)
            .ok_or_else(|| Error::unknown_column(&target.entity, column_key))?;

        Ok(Self {
            entity: table.entity.clone(),
            reference: Some(reference.field.clone()),
            target: target.entity.clone(),
            field: column.field.clone(),
            alias: None,
        })
    }

    pub(crate) fn from_column(entity: &str, column: &ColumnDescriptor) -> Self {
        Self {
            entity: entity.to_string(),
            reference: None,
            target: entity.to_string(),
            field: column.field.clone(),
            alias: None,
        }
    }

    /// Attach an output alias.
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Entity the key was resolved against.
    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// Reference field traversed by a dotted path.
    pub fn reference(&self) -> Option<&str> {
        self.reference.as_deref()
    }

    /// Entity that owns the column.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Declared field identity of the column.
    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    /// Canonical key: `field` or `reference.field`.
    pub fn key(&self) -> String {
        match &self.reference {
            Some(reference) => format!("{reference}.{}", self.field),
            None => self.field.clone(),
        }
    }
}

/// A call of a named SQL function.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionCall {
    name: String,
    args: Vec<ParameterExpr>,
    alias: Option<String>,
}

impl FunctionCall {
    /// Upper-cased function name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn args(&self) -> &[ParameterExpr] {
        &self.args
    }

    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }
}

/// An operand or projection item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ParameterExpr {
    /// Literal value.
    Constant(Value),
    /// Column of a registered entity.
    Column(ColumnRef),
    /// Function call.
    Function(FunctionCall),
    /// Nested sealed query.
    SubQuery(Box<QueryDescriptor>),
    /// Inclusive bounds for `BETWEEN`.
    Range { begin: Value, end: Value },
    /// Value list for `IN`.
    Array(Vec<Value>),
}

impl ParameterExpr {
    /// Literal value.
    pub fn constant(value: impl Into<Value>) -> Self {
        ParameterExpr::Constant(value.into())
    }

    /// Column of `entity` resolved from `key`.
    pub fn column(registry: &Registry, entity: &str, key: &str) -> Result<Self, Error> {
        ColumnRef::resolve(registry, entity, key).map(ParameterExpr::Column)
    }

    /// Column of `entity` under an output alias.
    pub fn column_as(
        registry: &Registry,
        entity: &str,
        key: &str,
        alias: impl Into<String>,
    ) -> Result<Self, Error> {
        let column = ColumnRef::resolve(registry, entity, key)?;
        Ok(ParameterExpr::Column(column.with_alias(alias)))
    }

    /// Function call. The name is upper-cased; ranges are not valid arguments
    /// at any nesting level.
    pub fn function(name: &str, args: Vec<ParameterExpr>) -> Result<Self, Error> {
        Self::build_function(name, args, None)
    }

    /// Function call under an output alias.
    pub fn function_as(
        name: &str,
        args: Vec<ParameterExpr>,
        alias: impl Into<String>,
    ) -> Result<Self, Error> {
        Self::build_function(name, args, Some(alias.into()))
    }

    fn build_function(
        name: &str,
        args: Vec<ParameterExpr>,
        alias: Option<String>,
    ) -> Result<Self, Error> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidArgument("function name is empty".into()));
        }
        for arg in &args {
            arg.check_function_arg(name)?;
        }
        Ok(ParameterExpr::Function(FunctionCall {
            name: name.to_ascii_uppercase(),
            args,
            alias,
        }))
    }

    fn check_function_arg(&self, function: &str) -> Result<(), Error> {
        match self {
            ParameterExpr::Range { .. } => Err(Error::InvalidArgument(format!(
                "range is not a valid argument of {function}"
            ))),
            ParameterExpr::Function(call) => call
                .args
                .iter()
                .try_for_each(|arg| arg.check_function_arg(&call.name)),
            _ => Ok(()),
        }
    }

    /// Nested sealed query.
    ///
    /// The root entity must be registered in `registry` and the resulting
    /// nesting must stay within the configured sub-query depth.
    pub fn sub_query(registry: &Registry, query: QueryDescriptor) -> Result<Self, Error> {
        if !registry.contains(query.root_entity()) {
            return Err(Error::InvalidSubQuery(format!(
                "root entity '{}' is not registered",
                query.root_entity()
            )));
        }
        let depth = query.depth() + 1;
        let max = registry.config().max_subquery_depth;
        if depth > max {
            return Err(Error::InvalidSubQuery(format!(
                "nesting depth {depth} exceeds the limit of {max}"
            )));
        }
        Ok(ParameterExpr::SubQuery(Box::new(query)))
    }

    /// Inclusive range.
    pub fn range(begin: impl Into<Value>, end: impl Into<Value>) -> Self {
        ParameterExpr::Range {
            begin: begin.into(),
            end: end.into(),
        }
    }

    /// Non-empty value list.
    pub fn array(values: Vec<Value>) -> Result<Self, Error> {
        if values.is_empty() {
            return Err(Error::InvalidArgument("array operand has no values".into()));
        }
        Ok(ParameterExpr::Array(values))
    }

    /// Short name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            ParameterExpr::Constant(_) => "constant",
            ParameterExpr::Column(_) => "column",
            ParameterExpr::Function(_) => "function",
            ParameterExpr::SubQuery(_) => "sub-query",
            ParameterExpr::Range { .. } => "range",
            ParameterExpr::Array(_) => "array",
        }
    }

    /// Deepest sub-query nesting inside this expression.
    pub fn depth(&self) -> usize {
        match self {
            ParameterExpr::SubQuery(query) => query.depth() + 1,
            ParameterExpr::Function(call) => call.args.iter().map(|a| a.depth()).max().unwrap_or(0),
            _ => 0,
        }
    }

    /// Column references reachable without entering a sub-query.
    pub fn columns(&self) -> Vec<&ColumnRef> {
        let mut out = Vec::new();
        self.collect_columns(&mut out);
        out
    }

    fn collect_columns<'a>(&'a self, out: &mut Vec<&'a ColumnRef>) {
        match self {
            ParameterExpr::Column(column) => out.push(column),
            ParameterExpr::Function(call) => {
                for arg in &call.args {
                    arg.collect_columns(out);
                }
            }
            _ => {}
        }
    }
}

macro_rules! constant_from {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for ParameterExpr {
                fn from(value: $ty) -> Self {
                    ParameterExpr::Constant(value.into())
                }
            }
        )*
    };
}

constant_from!(Value, bool, i32, i64, f32, f64, String, &str);

impl From<ColumnRef> for ParameterExpr {
    fn from(column: ColumnRef) -> Self {
        ParameterExpr::Column(column)
    }
}
