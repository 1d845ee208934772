//! Storage primitives the isolation layer wraps.
//!
//! A [`Session`] executes row-level reads and writes; it knows nothing about
//! tenants. Scoping is layered on top by [`ScopedQuery`](crate::query::ScopedQuery)
//! and the lifecycle hooks.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::entity::{EntityKey, Row};

/// Comparison operators supported by [`Predicate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PredicateOp {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
}

/// A single `field <op> value` condition. Predicates in a [`QuerySpec`] are
/// conjoined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Predicate {
    pub field: String,
    pub op: PredicateOp,
    pub value: Value,
}

impl Predicate {
    #[must_use]
    pub fn new(field: impl Into<String>, op: PredicateOp, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    #[must_use]
    pub fn equals(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, PredicateOp::Eq, value)
    }

    /// Evaluate against a row. A missing field only satisfies `Neq`;
    /// ordering operators only compare numbers with numbers and strings with
    /// strings.
    #[must_use]
    pub fn matches(&self, row: &Row) -> bool {
        let Some(actual) = row.get(&self.field) else {
            return self.op == PredicateOp::Neq;
        };
        match self.op {
            PredicateOp::Eq => values_equal(actual, &self.value),
            PredicateOp::Neq => !values_equal(actual, &self.value),
            PredicateOp::Gt => compare(actual, &self.value) == Some(Ordering::Greater),
            PredicateOp::Gte => matches!(
                compare(actual, &self.value),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            PredicateOp::Lt => compare(actual, &self.value) == Some(Ordering::Less),
            PredicateOp::Lte => matches!(
                compare(actual, &self.value),
                Some(Ordering::Less | Ordering::Equal)
            ),
        }
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) => compare(a, b) == Some(Ordering::Equal),
        _ => a == b,
    }
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => x.as_f64()?.partial_cmp(&y.as_f64()?),
        },
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// What to read: a table, an optional key, conjoined predicates, and a
/// window over the key-ordered result.
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySpec {
    pub table: &'static str,
    pub key: Option<EntityKey>,
    pub predicates: Vec<Predicate>,
    pub limit: Option<usize>,
    pub offset: usize,
}

impl QuerySpec {
    #[must_use]
    pub fn new(table: &'static str) -> Self {
        Self {
            table,
            key: None,
            predicates: Vec::new(),
            limit: None,
            offset: 0,
        }
    }

    /// Whether `key`/`row` satisfies the key constraint and every predicate.
    /// Windowing is the session's job.
    #[must_use]
    pub fn matches(&self, key: EntityKey, row: &Row) -> bool {
        !matches!(self.key, Some(k) if k != key) && self.predicates.iter().all(|p| p.matches(row))
    }
}

/// Row-level storage session.
///
/// Results of `select` are ordered by key. Implementations are shared
/// across request tasks.
pub trait Session: Send + Sync {
    /// Rows matching `spec`, windowed by its limit and offset.
    fn select(&self, spec: &QuerySpec) -> anyhow::Result<Vec<(EntityKey, Row)>>;

    /// Number of rows matching `spec`, ignoring its window.
    fn count(&self, spec: &QuerySpec) -> anyhow::Result<usize>;

    fn get(&self, table: &'static str, key: EntityKey) -> anyhow::Result<Option<Row>>;

    /// Store a new row and return its assigned key.
    fn insert(&self, table: &'static str, row: Row) -> anyhow::Result<EntityKey>;

    /// Store every row or none of them.
    fn insert_batch(&self, table: &'static str, rows: Vec<Row>) -> anyhow::Result<Vec<EntityKey>>;

    /// Replace an existing row. Returns `false` if the key is unknown.
    fn update(&self, table: &'static str, key: EntityKey, row: Row) -> anyhow::Result<bool>;

    /// Remove a row. Returns `false` if the key is unknown.
    fn delete(&self, table: &'static str, key: EntityKey) -> anyhow::Result<bool>;
}
