//! Module: source
//! Responsibility: the boundary traits consumed from the external relational
//! engine and the record/value contracts crossing it.
//! Does not own: query construction, pagination policy, or serialization.

pub mod memory;

pub use memory::MemorySource;

use crate::{registry::EntityDef, spec::QuerySpec, value::Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Debug;
use thiserror::Error as ThisError;

///
/// SourceError
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum SourceError {
    #[error("data source failure: {message}")]
    Backend { message: String },

    #[error("unknown column '{column}' for table '{table}'")]
    UnknownColumn { table: String, column: String },

    #[error("operation not supported by this source: {what}")]
    Unsupported { what: String },
}

///
/// Record
///
/// One materialized row: an ordered column→value mapping. Identity is read
/// through the entity definition's primary key.
///

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct Record {
    values: BTreeMap<String, Value>,
}

impl Record {
    #[must_use]
    pub fn from_pairs<I, S, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, V)>,
        S: Into<String>,
        V: Into<Value>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(column, value)| (column.into(), value.into()))
                .collect(),
        }
    }

    #[must_use]
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    /// Column value, or `Null` when the column is absent.
    #[must_use]
    pub fn value(&self, column: &str) -> Value {
        self.values.get(column).cloned().unwrap_or(Value::Null)
    }

    /// The record's identity under the given entity definition.
    #[must_use]
    pub fn identity(&self, entity: &EntityDef) -> Value {
        self.value(entity.primary_key())
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Keep only the listed columns (the select projection).
    #[must_use]
    pub fn project<'a, I>(&self, columns: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut values = BTreeMap::new();
        for column in columns {
            if let Some(value) = self.values.get(column) {
                values.insert(column.to_string(), value.clone());
            }
        }
        Self { values }
    }
}

///
/// QueryOpResult
///
/// Outcome of forwarding an operation to the data source's query
/// capability: either a transformed spec (wrapped back into a collection by
/// the caller) or a terminal value.
///

#[derive(Clone, Debug, PartialEq)]
pub enum QueryOpResult {
    Spec(QuerySpec),
    Value(Value),
}

///
/// DataSource
///
/// The external relational collaborator. All calls are synchronous and
/// blocking; the collection drives at most one page/batch at a time.
///
/// `query_op` is the query-construction capability seam: sources may accept
/// operations the collection does not define natively and return either a
/// transformed spec or concrete data. The default accepts nothing.
///

pub trait DataSource: Debug {
    /// Materialize the spec into an ordered sequence of records.
    fn fetch(&self, entity: &EntityDef, spec: &QuerySpec) -> Result<Vec<Record>, SourceError>;

    /// Row count for the spec as given (window included).
    fn count(&self, entity: &EntityDef, spec: &QuerySpec) -> Result<u64, SourceError>;

    /// Single-column fetch for the spec as given.
    fn pluck(
        &self,
        entity: &EntityDef,
        spec: &QuerySpec,
        column: &str,
    ) -> Result<Vec<Value>, SourceError>;

    /// Query-construction capability forwarding. `None` means the source
    /// does not understand `op`.
    fn query_op(
        &self,
        _entity: &EntityDef,
        _spec: &QuerySpec,
        _op: &str,
        _args: &[Value],
    ) -> Option<QueryOpResult> {
        None
    }
}

///
/// RecordOps
///
/// Per-record operation capability attached to an entity definition.
/// `None` means the entity does not understand `op`.
///

pub trait RecordOps: Send + Sync {
    fn record_op(&self, record: &Record, op: &str, args: &[Value]) -> Option<Value>;
}
