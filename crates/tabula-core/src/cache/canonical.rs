//! Deterministic hash encoding of query descriptors.
//!
//! Every item writes a tag byte followed by length-prefixed fields into a
//! SHA-256 stream. Unordered collections (joins, projections, conditions,
//! group-by items) hash each member separately and feed the sorted member
//! digests, so insertion order never changes the result.

use sha2::{Digest, Sha256};
use tabula_proto::Value;

use crate::catalog::Connective;
use crate::query::{
    ColumnRef, ConditionNode, GroupItem, JoinEdge, JoinKey, LockOption, OrderItem, Page,
    ParameterExpr, Projection, QueryDescriptor,
};

/// SHA-256 stream with canonical field encoding.
pub struct CanonicalHasher {
    inner: Sha256,
}

impl CanonicalHasher {
    pub fn new() -> Self {
        Self {
            inner: Sha256::new(),
        }
    }

    pub fn tag(&mut self, tag: u8) {
        self.inner.update([tag]);
    }

    pub fn u32(&mut self, value: u32) {
        self.inner.update(value.to_be_bytes());
    }

    pub fn u64(&mut self, value: u64) {
        self.inner.update(value.to_be_bytes());
    }

    pub fn i32(&mut self, value: i32) {
        self.inner.update(value.to_be_bytes());
    }

    pub fn i64(&mut self, value: i64) {
        self.inner.update(value.to_be_bytes());
    }

    pub fn bool(&mut self, value: bool) {
        self.tag(u8::from(value));
    }

    pub fn bytes(&mut self, bytes: &[u8]) {
        self.u32(bytes.len() as u32);
        self.inner.update(bytes);
    }

    pub fn str(&mut self, value: &str) {
        self.bytes(value.as_bytes());
    }

    pub fn opt_str(&mut self, value: Option<&str>) {
        match value {
            Some(value) => {
                self.tag(1);
                self.str(value);
            }
            None => self.tag(0),
        }
    }

    pub fn value(&mut self, value: &Value) {
        self.tag(value.tag());
        match value {
            Value::Null => {}
            Value::Bool(v) => self.bool(*v),
            Value::Int32(v) => self.i32(*v),
            Value::Int64(v) | Value::Timestamp(v) => self.i64(*v),
            Value::Float32(v) => self.u32(v.to_bits()),
            Value::Float64(v) => self.u64(v.to_bits()),
            Value::String(v) => self.str(v),
            Value::Bytes(v) => self.bytes(v),
            Value::Uuid(v) => self.inner.update(v),
            Value::BoolArray(v) => {
                self.u32(v.len() as u32);
                v.iter().for_each(|x| self.bool(*x));
            }
            Value::Int32Array(v) => {
                self.u32(v.len() as u32);
                v.iter().for_each(|x| self.i32(*x));
            }
            Value::Int64Array(v) => {
                self.u32(v.len() as u32);
                v.iter().for_each(|x| self.i64(*x));
            }
            Value::Float64Array(v) => {
                self.u32(v.len() as u32);
                v.iter().for_each(|x| self.u64(x.to_bits()));
            }
            Value::StringArray(v) => {
                self.u32(v.len() as u32);
                v.iter().for_each(|x| self.str(x));
            }
            Value::UuidArray(v) => {
                self.u32(v.len() as u32);
                v.iter().for_each(|x| self.inner.update(x));
            }
        }
    }

    /// Feed an ordered list.
    pub fn list<T: CanonicalHash>(&mut self, items: &[T]) {
        self.u32(items.len() as u32);
        for item in items {
            item.canonical_hash(self);
        }
    }

    /// Feed an unordered set: member digests are sorted first.
    pub fn set<T: CanonicalHash>(&mut self, items: &[T]) {
        let mut digests: Vec<[u8; 32]> = items.iter().map(|i| i.canonical_digest()).collect();
        digests.sort_unstable();
        self.u32(digests.len() as u32);
        for digest in &digests {
            self.inner.update(digest);
        }
    }

    pub fn finish(self) -> [u8; 32] {
        self.inner.finalize().into()
    }
}

impl Default for CanonicalHasher {
    fn default() -> Self {
        Self::new()
    }
}

/// A value with a canonical hash contribution.
pub trait CanonicalHash {
    /// Write this value into the stream.
    fn canonical_hash(&self, hasher: &mut CanonicalHasher);

    /// Digest of this value alone.
    fn canonical_digest(&self) -> [u8; 32] {
        let mut hasher = CanonicalHasher::new();
        self.canonical_hash(&mut hasher);
        hasher.finish()
    }
}

fn connective(hasher: &mut CanonicalHasher, connective: Connective) {
    hasher.tag(match connective {
        Connective::And => 0x01,
        Connective::Or => 0x02,
    });
}

impl CanonicalHash for ColumnRef {
    fn canonical_hash(&self, hasher: &mut CanonicalHasher) {
        hasher.tag(0x30);
        hasher.str(self.entity());
        hasher.opt_str(self.reference());
        hasher.str(self.target());
        hasher.str(self.field());
        hasher.opt_str(self.alias());
    }
}

impl CanonicalHash for ParameterExpr {
    fn canonical_hash(&self, hasher: &mut CanonicalHasher) {
        match self {
            ParameterExpr::Constant(value) => {
                hasher.tag(0x40);
                hasher.value(value);
            }
            ParameterExpr::Column(column) => {
                hasher.tag(0x41);
                column.canonical_hash(hasher);
            }
            ParameterExpr::Function(call) => {
                hasher.tag(0x42);
                hasher.str(call.name());
                hasher.list(call.args());
                hasher.opt_str(call.alias());
            }
            ParameterExpr::SubQuery(query) => {
                hasher.tag(0x43);
                query.canonical_hash(hasher);
            }
            ParameterExpr::Range { begin, end } => {
                hasher.tag(0x44);
                hasher.value(begin);
                hasher.value(end);
            }
            ParameterExpr::Array(values) => {
                hasher.tag(0x45);
                hasher.u32(values.len() as u32);
                values.iter().for_each(|v| hasher.value(v));
            }
        }
    }
}

impl CanonicalHash for ConditionNode {
    fn canonical_hash(&self, hasher: &mut CanonicalHasher) {
        match self {
            ConditionNode::Leaf(leaf) => {
                hasher.tag(0x50);
                connective(hasher, leaf.connective());
                hasher.tag(leaf.operator().tag());
                leaf.column().canonical_hash(hasher);
                match leaf.operand() {
                    Some(operand) => {
                        hasher.tag(1);
                        operand.canonical_hash(hasher);
                    }
                    None => hasher.tag(0),
                }
                hasher.i32(leaf.sort_code());
            }
            ConditionNode::Group(group) => {
                hasher.tag(0x51);
                connective(hasher, group.connective());
                hasher.i32(group.sort_code());
                // Connectives make child order significant.
                hasher.list(group.children());
            }
        }
    }
}

impl CanonicalHash for JoinKey {
    fn canonical_hash(&self, hasher: &mut CanonicalHasher) {
        hasher.str(&self.local);
        hasher.str(&self.remote);
        connective(hasher, self.connective);
    }
}

impl CanonicalHash for JoinEdge {
    fn canonical_hash(&self, hasher: &mut CanonicalHasher) {
        hasher.tag(0x60);
        hasher.str(self.source());
        hasher.str(self.target());
        hasher.str(self.target_table());
        hasher.str(self.join_type().as_str());
        hasher.list(self.keys());
    }
}

impl CanonicalHash for Projection {
    fn canonical_hash(&self, hasher: &mut CanonicalHasher) {
        hasher.tag(0x70);
        self.expr().canonical_hash(hasher);
        hasher.i32(self.sort_code());
    }
}

impl CanonicalHash for OrderItem {
    fn canonical_hash(&self, hasher: &mut CanonicalHasher) {
        hasher.tag(0x71);
        self.column().canonical_hash(hasher);
        hasher.str(self.direction().as_str());
        hasher.i32(self.sort_code());
    }
}

impl CanonicalHash for GroupItem {
    fn canonical_hash(&self, hasher: &mut CanonicalHasher) {
        hasher.tag(0x72);
        self.column().canonical_hash(hasher);
        hasher.i32(self.sort_code());
    }
}

fn page(hasher: &mut CanonicalHasher, page: Option<Page>) {
    match page {
        Some(page) => {
            hasher.tag(1);
            hasher.u32(page.number);
            hasher.u32(page.size);
        }
        None => hasher.tag(0),
    }
}

fn lock(hasher: &mut CanonicalHasher, lock: LockOption) {
    match lock {
        LockOption::Default => hasher.tag(0x00),
        LockOption::NoWait => hasher.tag(0x01),
        LockOption::SkipLocked => hasher.tag(0x02),
        LockOption::Wait(seconds) => {
            hasher.tag(0x03);
            hasher.u32(seconds);
        }
    }
}

/// Covers everything that changes the result set. The query name and the
/// cacheable flag are left out.
impl CanonicalHash for QueryDescriptor {
    fn canonical_hash(&self, hasher: &mut CanonicalHasher) {
        hasher.tag(0x80);
        hasher.str(self.root_table());
        hasher.opt_str(self.root_schema());
        hasher.set(self.joins());
        hasher.set(self.projections());
        hasher.set(self.conditions());
        hasher.set(self.group_by());
        hasher.list(self.order_by());
        page(hasher, self.page());
        hasher.bool(self.for_update());
        lock(hasher, self.lock());
    }
}
