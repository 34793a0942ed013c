//! Join edges between the root entity and the entities joined to it.

use serde::Serialize;
use tracing::debug;

use crate::catalog::{Connective, Registry, TableDescriptor};
use crate::error::Error;

/// SQL join type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum JoinType {
    #[default]
    Inner,
    Left,
    Right,
    Full,
}

impl JoinType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JoinType::Inner => "INNER",
            JoinType::Left => "LEFT",
            JoinType::Right => "RIGHT",
            JoinType::Full => "FULL",
        }
    }
}

/// One `local = remote` key pair of a join.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct JoinKey {
    /// Column key on the source entity.
    pub local: String,
    /// Column key on the target entity.
    pub remote: String,
    /// How this pair combines with the pairs before it.
    pub connective: Connective,
}

impl JoinKey {
    pub fn new(local: impl Into<String>, remote: impl Into<String>) -> Self {
        Self {
            local: local.into(),
            remote: remote.into(),
            connective: Connective::And,
        }
    }

    /// OR-combined pair.
    pub fn or(local: impl Into<String>, remote: impl Into<String>) -> Self {
        Self {
            connective: Connective::Or,
            ..Self::new(local, remote)
        }
    }
}

/// A resolved join from `source` to `target`.
///
/// Keys hold declared field identities.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct JoinEdge {
    source: String,
    target: String,
    target_table: String,
    join_type: JoinType,
    keys: Vec<JoinKey>,
}

impl JoinEdge {
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Qualified physical table of the target.
    pub fn target_table(&self) -> &str {
        &self.target_table
    }

    pub fn join_type(&self) -> JoinType {
        self.join_type
    }

    pub fn keys(&self) -> &[JoinKey] {
        &self.keys
    }
}

/// Attaches join edges to a query, resolving keys from the registry.
#[derive(Debug, Clone, Copy)]
pub struct JoinResolver<'r> {
    registry: &'r Registry,
}

impl<'r> JoinResolver<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Self { registry }
    }

    /// Attach `source → target` to `edges`.
    ///
    /// The source must be `root` or the target of an earlier edge. An already
    /// attached target has its edge updated in place. Without explicit `keys`
    /// the reference from source to target is used, then the reference from
    /// target to source with its pairs swapped.
    pub fn attach(
        &self,
        root: &str,
        edges: &mut Vec<JoinEdge>,
        source: &str,
        target: &str,
        join_type: JoinType,
        keys: &[JoinKey],
    ) -> Result<(), Error> {
        let source_table = self
            .registry
            .lookup(source)
            .ok_or_else(|| Error::UnregisteredEntity(source.to_string()))?;
        let target_table = self
            .registry
            .lookup(target)
            .ok_or_else(|| Error::unresolved_join(source, target, "target is not registered"))?;

        if target == root {
            return Err(Error::unresolved_join(source, target, "target is the query root"));
        }
        if source == target {
            return Err(Error::unresolved_join(source, target, "an entity cannot join itself"));
        }

        let source_pos = edges.iter().position(|e| e.target == source);
        if source != root && source_pos.is_none() {
            return Err(Error::unresolved_join(
                source,
                target,
                "source is neither the query root nor joined",
            ));
        }

        let existing = edges.iter().position(|e| e.target == target);
        if let (Some(at), Some(source_at)) = (existing, source_pos) {
            if source_at > at {
                return Err(Error::unresolved_join(
                    source,
                    target,
                    "source is joined after the edge it would feed",
                ));
            }
        }

        let keys = if keys.is_empty() {
            self.reference_keys(&source_table, &target_table)?
        } else {
            keys.to_vec()
        };
        let keys = canonical_keys(&source_table, &target_table, keys)?;

        let edge = JoinEdge {
            source: source_table.entity.clone(),
            target: target_table.entity.clone(),
            target_table: target_table.qualified_name(),
            join_type,
            keys,
        };

        match existing {
            Some(at) => {
                debug!(
                    source = %source,
                    join_target = %target,
                    join_type = edge.join_type.as_str(),
                    "join edge updated"
                );
                edges[at] = edge;
            }
            None => {
                debug!(
                    source = %source,
                    join_target = %target,
                    join_type = edge.join_type.as_str(),
                    keys = edge.keys.len(),
                    "join edge attached"
                );
                edges.push(edge);
            }
        }
        Ok(())
    }

    fn reference_keys(
        &self,
        source: &TableDescriptor,
        target: &TableDescriptor,
    ) -> Result<Vec<JoinKey>, Error> {
        if let Some(reference) = source.reference_to(&target.entity) {
            return Ok(reference
                .join_columns
                .iter()
                .map(|pair| JoinKey {
                    local: pair.local.clone(),
                    remote: pair.referenced.clone(),
                    connective: pair.connective,
                })
                .collect());
        }
        if let Some(reference) = target.reference_to(&source.entity) {
            return Ok(reference
                .join_columns
                .iter()
                .map(|pair| {
                    let pair = pair.inverse();
                    JoinKey {
                        local: pair.local,
                        remote: pair.referenced,
                        connective: pair.connective,
                    }
                })
                .collect());
        }
        Err(Error::unresolved_join(
            &source.entity,
            &target.entity,
            "no reference between the entities",
        ))
    }
}

fn canonical_keys(
    source: &TableDescriptor,
    target: &TableDescriptor,
    keys: Vec<JoinKey>,
) -> Result<Vec<JoinKey>, Error> {
    keys.into_iter()
        .map(|key| {
            let local = source
                .column(&key.local)
                .ok_or_else(|| Error::unknown_column(&source.entity, &key.local))?;
            let remote = target
                .column(&key.remote)
                .ok_or_else(|| Error::unknown_column(&target.entity, &key.remote))?;
            Ok(JoinKey {
                local: local.field.clone(),
                remote: remote.field.clone(),
                connective: key.connective,
            })
        })
        .collect()
}
