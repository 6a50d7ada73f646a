//! Module: spec
//! Responsibility: the immutable query-spec value and criteria lowering.
//! Does not own: predicate semantics, pagination math, or execution.
//! Boundary: every builder verb is a consuming `with_x` constructor; shared
//! snapshots never observe each other's changes.

mod criteria;


pub use criteria::{Criteria, Criterion};

use crate::{
    predicate::{CompareOp, Comparison, Predicate},
    value::Value,
};
use derive_more::{Deref, IntoIterator};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error as ThisError;

///
/// SpecError
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum SpecError {
    #[error("raw fragment has {placeholders} placeholder(s) but {values} bind value(s)")]
    PlaceholderMismatch { placeholders: usize, values: usize },

    #[error("bind list does not match predicate references: {detail}")]
    BindMismatch { detail: String },
}

///
/// Bind
///
/// One named bound parameter. Names are unique within a spec; structured
/// criteria derive them from the column name, suffixing on collision.
///

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Bind {
    pub name: String,
    pub value: Value,
}

///
/// Bindings
///

#[derive(Clone, Debug, Default, Deref, IntoIterator, PartialEq)]
pub struct Bindings(#[into_iterator(owned, ref)] Vec<Bind>);

impl Bindings {
    /// Append a value under a unique name derived from `hint`, returning the
    /// name actually assigned.
    pub fn push_unique(&mut self, hint: &str, value: Value) -> String {
        let mut name = hint.to_string();
        let mut n = 1;
        while self.0.iter().any(|b| b.name == name) {
            n += 1;
            name = format!("{hint}_{n}");
        }
        self.0.push(Bind {
            name: name.clone(),
            value,
        });
        name
    }

    /// Remove and return the first entry with the given name.
    pub fn take(&mut self, name: &str) -> Option<Value> {
        let idx = self.0.iter().position(|b| b.name == name)?;
        Some(self.0.remove(idx).value)
    }

    /// The set of names currently bound.
    #[must_use]
    pub fn names(&self) -> BTreeSet<String> {
        self.0.iter().map(|b| b.name.clone()).collect()
    }
}

///
/// QuerySpec
///
/// Immutable bundle of query facets. Every verb consumes the spec and
/// returns a new value; collections clone before applying, so no snapshot
/// shares backing state with another.
///

#[derive(Clone, Debug, Default, PartialEq)]
pub struct QuerySpec {
    select: Vec<String>,
    distinct: bool,
    joins: Vec<String>,
    includes: Vec<String>,
    references: Vec<String>,
    predicate: Option<Predicate>,
    bind: Bindings,
    group: Vec<String>,
    order: Vec<String>,
    limit: Option<u64>,
    offset: Option<u64>,
}

impl QuerySpec {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    //
    // Accessors
    //

    #[must_use]
    pub fn select(&self) -> &[String] {
        &self.select
    }

    #[must_use]
    pub const fn distinct(&self) -> bool {
        self.distinct
    }

    #[must_use]
    pub fn joins(&self) -> &[String] {
        &self.joins
    }

    #[must_use]
    pub fn includes(&self) -> &[String] {
        &self.includes
    }

    #[must_use]
    pub fn references(&self) -> &[String] {
        &self.references
    }

    #[must_use]
    pub const fn predicate(&self) -> Option<&Predicate> {
        self.predicate.as_ref()
    }

    #[must_use]
    pub const fn bind(&self) -> &Bindings {
        &self.bind
    }

    #[must_use]
    pub fn group(&self) -> &[String] {
        &self.group
    }

    #[must_use]
    pub fn order(&self) -> &[String] {
        &self.order
    }

    #[must_use]
    pub const fn limit(&self) -> Option<u64> {
        self.limit
    }

    #[must_use]
    pub const fn offset(&self) -> Option<u64> {
        self.offset
    }

    /// True when a raw limit or offset is applied.
    #[must_use]
    pub const fn is_windowed(&self) -> bool {
        self.limit.is_some() || self.offset.is_some()
    }

    //
    // Verbs (in-place forms; the collection clones first)
    //

    #[must_use]
    pub fn with_select<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select.extend(columns.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub const fn with_distinct(mut self, distinct: bool) -> Self {
        self.distinct = distinct;
        self
    }

    #[must_use]
    pub fn with_joins<I, S>(mut self, joins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.joins.extend(joins.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn with_includes<I, S>(mut self, includes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.includes.extend(includes.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn with_references<I, S>(mut self, references: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.references
            .extend(references.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn with_group<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.group.extend(columns.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn with_order<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.order.extend(columns.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub const fn with_limit(mut self, limit: Option<u64>) -> Self {
        self.limit = limit;
        self
    }

    #[must_use]
    pub const fn with_offset(mut self, offset: Option<u64>) -> Self {
        self.offset = offset;
        self
    }

    /// Strip limit and offset, keeping every other facet. Used for total
    /// counts and the `all` verb.
    #[must_use]
    pub const fn without_window(mut self) -> Self {
        self.limit = None;
        self.offset = None;
        self
    }

    /// AND-merge structured criteria into the predicate, appending fresh
    /// uniquely-named bound parameters.
    #[must_use]
    pub fn with_criteria(mut self, criteria: Criteria) -> Self {
        let lowered = lower_criteria(&mut self.bind, criteria);
        self.merge_and(lowered);
        self
    }

    /// AND-merge the negation of each criterion individually, so
    /// `not(a: 1, b: 2)` means `NOT a AND NOT b`.
    #[must_use]
    pub fn with_criteria_not(mut self, criteria: Criteria) -> Self {
        let negated = criteria
            .into_iter()
            .map(|criterion| Predicate::not(lower_criterion(&mut self.bind, criterion)))
            .collect::<Vec<_>>();
        self.merge_and(flatten_and(negated));
        self
    }

    /// OR the lowered criteria against the entire existing predicate.
    #[must_use]
    pub fn with_criteria_or(mut self, criteria: Criteria) -> Self {
        let lowered = lower_criteria(&mut self.bind, criteria);
        self.predicate = Some(match self.predicate.take() {
            Some(existing) => Predicate::or(existing, lowered),
            None => lowered,
        });
        self
    }

    /// AND-merge an already-built predicate tree. Bound references must be
    /// paired by the caller; literal comparisons need no bind entries.
    #[must_use]
    pub fn with_predicate(mut self, predicate: Predicate) -> Self {
        self.merge_and(predicate);
        self
    }

    /// AND-merge a raw textual fragment. Placeholders (`?`) are consumed
    /// left-to-right and paired with `values`; a count mismatch fails
    /// immediately.
    pub fn with_raw(mut self, sql: &str, values: Vec<Value>) -> Result<Self, SpecError> {
        let placeholders = sql.matches('?').count();
        if placeholders != values.len() {
            return Err(SpecError::PlaceholderMismatch {
                placeholders,
                values: values.len(),
            });
        }
        self.merge_and(Predicate::raw(sql, values));
        Ok(self)
    }

    fn merge_and(&mut self, lowered: Predicate) {
        self.predicate = Some(match self.predicate.take() {
            Some(existing) => existing.push_and(lowered),
            None => lowered,
        });
    }

    /// Check the bind invariant: every bound reference in the predicate has
    /// exactly one bind entry, and vice versa.
    pub fn validate_binds(&self) -> Result<(), SpecError> {
        let mut referenced = BTreeSet::new();
        if let Some(predicate) = &self.predicate {
            predicate.bound_names(&mut referenced);
        }
        let bound = self.bind.names();

        if referenced == bound {
            return Ok(());
        }
        let missing: Vec<_> = referenced.difference(&bound).cloned().collect();
        let dangling: Vec<_> = bound.difference(&referenced).cloned().collect();
        Err(SpecError::BindMismatch {
            detail: format!("missing {missing:?}, dangling {dangling:?}"),
        })
    }
}

/// Lower a criteria list into a conjunction, appending bound parameters.
fn lower_criteria(bind: &mut Bindings, criteria: Criteria) -> Predicate {
    let lowered = criteria
        .into_iter()
        .map(|criterion| lower_criterion(bind, criterion))
        .collect::<Vec<_>>();
    flatten_and(lowered)
}

fn lower_criterion(bind: &mut Bindings, criterion: Criterion) -> Predicate {
    match criterion {
        Criterion::Column(column, value) => {
            let name = bind.push_unique(&column, value);
            Predicate::Compare(Comparison::bound(column, CompareOp::Eq, name))
        }
        Criterion::Table(table, pairs) => {
            let comparisons = pairs
                .into_iter()
                .map(|(column, value)| {
                    let name = bind.push_unique(&column, value);
                    Predicate::Compare(Comparison::new(
                        Some(table.clone()),
                        column,
                        CompareOp::Eq,
                        crate::predicate::Operand::Bound(name),
                    ))
                })
                .collect::<Vec<_>>();
            flatten_and(comparisons)
        }
        Criterion::Not(inner) => {
            let negated = inner
                .into_iter()
                .map(|criterion| Predicate::not(lower_criterion(bind, criterion)))
                .collect::<Vec<_>>();
            flatten_and(negated)
        }
        Criterion::Any(branches) => {
            let mut lowered = branches
                .into_iter()
                .map(|branch| lower_criteria(bind, branch));
            let first = lowered
                .next()
                .unwrap_or(Predicate::And(Vec::new()));
            lowered.fold(first, Predicate::or)
        }
    }
}

fn flatten_and(mut preds: Vec<Predicate>) -> Predicate {
    if preds.len() == 1 {
        preds.remove(0)
    } else {
        Predicate::And(preds)
    }
}
