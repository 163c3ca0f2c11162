//! Persistence port: the narrow document-store contract the core depends on.

use std::cmp::Ordering;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::documents::{DocRef, Fields, Snapshot, Value};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("document `{0}` not found")]
    NotFound(DocRef),
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("document store timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

impl Filter {
    /// Whether a document's field satisfies the filter. Missing fields never match.
    pub fn matches(&self, fields: &Fields) -> bool {
        let Some(actual) = fields.get(&self.field) else {
            return false;
        };
        match (self.op, compare_values(actual, &self.value)) {
            (FilterOp::Eq, Some(Ordering::Equal)) => true,
            (FilterOp::Lt, Some(Ordering::Less)) => true,
            (FilterOp::Le, Some(Ordering::Less | Ordering::Equal)) => true,
            (FilterOp::Gt, Some(Ordering::Greater)) => true,
            (FilterOp::Ge, Some(Ordering::Greater | Ordering::Equal)) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

/// Filter, ordering and limit for a collection scan.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filters: Vec<Filter>,
    pub order_by: Option<OrderBy>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, field: impl Into<String>, op: FilterOp, value: impl Into<Value>) -> Self {
        self.filters.push(Filter {
            field: field.into(),
            op,
            value: value.into(),
        });
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order_by = Some(OrderBy {
            field: field.into(),
            direction,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Total-ish ordering over comparable scalar values; `None` for mismatched kinds.
pub fn compare_values(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
        (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
        (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
        (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
        (Value::Ref(a), Value::Ref(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, reference: &DocRef) -> Result<Option<Snapshot>, RepoError>;

    async fn query(&self, collection: &str, query: &Query) -> Result<Vec<Snapshot>, RepoError>;

    /// Insert under a store-generated id.
    async fn add(&self, collection: &str, fields: Fields) -> Result<DocRef, RepoError>;

    /// Write a document. With `merge`, only the supplied fields are replaced.
    async fn set(&self, reference: &DocRef, fields: Fields, merge: bool) -> Result<(), RepoError>;

    /// Merge fields into an existing document; `RepoError::NotFound` when absent.
    async fn update(&self, reference: &DocRef, fields: Fields) -> Result<(), RepoError>;

    async fn delete(&self, reference: &DocRef) -> Result<(), RepoError>;
}
