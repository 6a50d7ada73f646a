//! Module: collection::delegate
//! Responsibility: capability forwarding for operations the collection does
//! not define natively — the query capability of the data source first,
//! then the per-record capability of the entity type; fails closed.

use crate::{
    collection::Collection,
    error::Error,
    source::QueryOpResult,
    value::Value,
};
use std::sync::Arc;
use thiserror::Error as ThisError;

///
/// DelegateError
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum DelegateError {
    #[error("no capability understands operation '{op}'")]
    UnsupportedOperation { op: String },
}

///
/// Delegated
///
/// Outcome of a forwarded operation: a reshaped collection (the source
/// returned a new query object), a terminal value, or per-batch value lists
/// from a record-level operation.
///

#[derive(Debug)]
pub enum Delegated {
    Collection(Collection),
    Value(Value),
    Batches(Vec<Vec<Value>>),
}

impl Delegated {
    /// Flatten per-batch results into one list.
    #[must_use]
    pub fn into_values(self) -> Option<Vec<Value>> {
        match self {
            Self::Value(value) => Some(vec![value]),
            Self::Batches(batches) => Some(batches.into_iter().flatten().collect()),
            Self::Collection(_) => None,
        }
    }
}

impl Collection {
    /// Forward an operation the collection does not define natively.
    ///
    /// Query-construction operations understood by the data source come
    /// first; a returned query object is wrapped back into a collection.
    /// Then per-record operations understood by the entity type, applied
    /// across the materialized records batch-by-batch — a bare column name
    /// short-circuits to a batched pluck. Anything else fails closed.
    pub fn delegate(&self, op: &str, args: &[Value]) -> Result<Delegated, Error> {
        let entity = self.binding()?;

        if let Some(outcome) = self.source().query_op(&entity, self.spec(), op, args) {
            return Ok(match outcome {
                QueryOpResult::Spec(spec) => Delegated::Collection(self.fork_replace_spec(spec)),
                QueryOpResult::Value(value) => Delegated::Value(value),
            });
        }

        if entity.has_column(op) {
            return Ok(Delegated::Batches(self.batched_pluck(op)?));
        }

        if let Some(ops) = entity.record_ops() {
            let ops = Arc::clone(ops);
            let batches = self.batch_map(|batch| {
                batch
                    .iter()
                    .map(|record| ops.record_op(record, op, args))
                    .collect::<Vec<_>>()
            })?;

            let mut out = Vec::with_capacity(batches.len());
            let mut supported = true;
            'batches: for batch in batches {
                let mut values = Vec::with_capacity(batch.len());
                for value in batch {
                    match value {
                        Some(value) => values.push(value),
                        None => {
                            supported = false;
                            break 'batches;
                        }
                    }
                }
                out.push(values);
            }
            if supported {
                return Ok(Delegated::Batches(out));
            }
        }

        Err(DelegateError::UnsupportedOperation { op: op.to_string() }.into())
    }

    /// Column fetch batch-by-batch, without materializing whole records.
    fn batched_pluck(&self, column: &str) -> Result<Vec<Vec<Value>>, Error> {
        let (base, pages) = self.batch_plan()?;
        if pages <= 1 {
            return Ok(vec![base.pluck(column)?]);
        }
        (1..=pages)
            .map(|index| base.jump_to(index).pluck(column))
            .collect()
    }
}
