//! Module: collection
//! Responsibility: the immutable collection facade — builder verbs, memoized
//! materialization, pagination state, and capability delegation.
//! Does not own: page math, predicate semantics, or the wire format.

mod batch;
mod delegate;


pub use batch::Batches;
pub use delegate::{DelegateError, Delegated};

use crate::{
    DEFAULT_PAGE_SIZE,
    error::Error,
    obs,
    page::{self, PageCursor},
    registry::{CollectionDef, EntityDef, Registry, RegistryError},
    source::{DataSource, Record},
    spec::{Criteria, QuerySpec},
    value::Value,
};
use std::cell::OnceCell;
use std::sync::Arc;

///
/// Collection
///
/// Immutable query-builder facade over an external relational source. Every
/// value-form verb returns a new snapshot; the receiver is never observably
/// changed and derived snapshots never share caches.
///
/// The entity binding resolves lazily: building criteria needs no binding,
/// the first materializing call does.
///

#[derive(Clone, Debug)]
pub struct Collection {
    registry: Arc<Registry>,
    source: Arc<dyn DataSource>,
    def: Arc<CollectionDef>,
    binding: OnceCell<Arc<EntityDef>>,
    spec: QuerySpec,
    cursor: Option<PageCursor>,
    total: OnceCell<u64>,
    records: OnceCell<Arc<[Record]>>,
}

impl Collection {
    /// Collection of a registered collection type.
    pub fn new(
        registry: Arc<Registry>,
        source: Arc<dyn DataSource>,
        collection_type: &str,
    ) -> Result<Self, Error> {
        let def = registry.collection(collection_type).ok_or_else(|| {
            RegistryError::UnknownCollection {
                collection: collection_type.to_string(),
            }
        })?;
        Ok(Self::from_parts(registry, source, def))
    }

    /// Ad-hoc collection bound directly to a registered entity type.
    pub fn over(
        registry: Arc<Registry>,
        source: Arc<dyn DataSource>,
        entity_type: &str,
    ) -> Result<Self, Error> {
        if registry.entity(entity_type).is_none() {
            return Err(RegistryError::UnknownEntity {
                entity: entity_type.to_string(),
            }
            .into());
        }
        let def = Arc::new(CollectionDef::over(entity_type));
        Ok(Self::from_parts(registry, source, def))
    }

    pub(crate) fn from_parts(
        registry: Arc<Registry>,
        source: Arc<dyn DataSource>,
        def: Arc<CollectionDef>,
    ) -> Self {
        Self {
            registry,
            source,
            def,
            binding: OnceCell::new(),
            spec: QuerySpec::new(),
            cursor: None,
            total: OnceCell::new(),
            records: OnceCell::new(),
        }
    }

    //
    // Inspection
    //

    #[must_use]
    pub fn def(&self) -> &CollectionDef {
        &self.def
    }

    #[must_use]
    pub const fn spec(&self) -> &QuerySpec {
        &self.spec
    }

    #[must_use]
    pub const fn cursor(&self) -> Option<&PageCursor> {
        self.cursor.as_ref()
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    #[must_use]
    pub fn source(&self) -> &Arc<dyn DataSource> {
        &self.source
    }

    /// The spec the source actually sees: the cursor projected as a
    /// limit/offset window when one is active.
    #[must_use]
    pub fn effective_spec(&self) -> QuerySpec {
        match &self.cursor {
            Some(cursor) => cursor.apply(self.spec.clone()),
            None => self.spec.clone(),
        }
    }

    /// Resolve (and memoize) the entity binding.
    pub fn binding(&self) -> Result<Arc<EntityDef>, Error> {
        if let Some(entity) = self.binding.get() {
            return Ok(entity.clone());
        }
        let entity = self.registry.resolve_def(&self.def)?;
        let _ = self.binding.set(entity.clone());
        Ok(entity)
    }

    //
    // Builder verbs (value forms)
    //

    #[must_use]
    pub fn select<I, S>(&self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fork_spec(true, |spec| spec.with_select(columns))
    }

    #[must_use]
    pub fn distinct(&self, distinct: bool) -> Self {
        self.fork_spec(false, |spec| spec.with_distinct(distinct))
    }

    /// AND structured criteria into the predicate (the `where` verb).
    #[must_use]
    pub fn filter(&self, criteria: impl Into<Criteria>) -> Self {
        self.fork_spec(false, |spec| spec.with_criteria(criteria.into()))
    }

    /// AND the negation of each criterion into the predicate.
    #[must_use]
    pub fn not(&self, criteria: impl Into<Criteria>) -> Self {
        self.fork_spec(false, |spec| spec.with_criteria_not(criteria.into()))
    }

    /// OR the criteria against the entire existing predicate.
    #[must_use]
    pub fn or(&self, criteria: impl Into<Criteria>) -> Self {
        self.fork_spec(false, |spec| spec.with_criteria_or(criteria.into()))
    }

    /// AND an already-built predicate tree (literal comparisons, ranges,
    /// `IN` lists) into the spec.
    #[must_use]
    pub fn filter_predicate(&self, predicate: crate::predicate::Predicate) -> Self {
        self.fork_spec(false, |spec| spec.with_predicate(predicate))
    }

    /// AND a raw textual fragment with positional placeholders.
    pub fn filter_raw(&self, sql: &str, values: Vec<Value>) -> Result<Self, Error> {
        let spec = self.spec.clone().with_raw(sql, values)?;
        Ok(self.fork_with(false, spec))
    }

    #[must_use]
    pub fn order<I, S>(&self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fork_spec(true, |spec| spec.with_order(columns))
    }

    #[must_use]
    pub fn group<I, S>(&self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fork_spec(true, |spec| spec.with_group(columns))
    }

    #[must_use]
    pub fn joins<I, S>(&self, joins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fork_spec(false, |spec| spec.with_joins(joins))
    }

    #[must_use]
    pub fn includes<I, S>(&self, includes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fork_spec(false, |spec| spec.with_includes(includes))
    }

    #[must_use]
    pub fn references<I, S>(&self, references: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fork_spec(false, |spec| spec.with_references(references))
    }

    /// Explicit window override. An active page/batch cursor is silently
    /// cleared; the raw window wins.
    #[must_use]
    pub fn limit(&self, limit: Option<u64>) -> Self {
        let mut next = self.fork_spec(false, |spec| spec.with_limit(limit));
        next.cursor = None;
        next
    }

    /// Explicit window override; clears the cursor like `limit`.
    #[must_use]
    pub fn offset(&self, offset: Option<u64>) -> Self {
        let mut next = self.fork_spec(false, |spec| spec.with_offset(offset));
        next.cursor = None;
        next
    }

    /// Drop the window and any cursor, keeping every other facet.
    #[must_use]
    pub fn all(&self) -> Self {
        let mut next = self.fork_spec(false, QuerySpec::without_window);
        next.cursor = None;
        next
    }

    //
    // Pagination / batching verbs
    //

    #[must_use]
    pub fn page(&self, index: u64) -> Self {
        let cursor = match self.cursor {
            Some(cursor) => cursor.jump_to(index),
            None => PageCursor::new(index, DEFAULT_PAGE_SIZE),
        };
        self.with_cursor(cursor)
    }

    #[must_use]
    pub fn per(&self, size: u64) -> Self {
        let cursor = match self.cursor {
            Some(cursor) => cursor.resize(size),
            None => PageCursor::new(1, size),
        };
        self.with_cursor(cursor)
    }

    /// Like `page`, but a missing cursor starts at the collection type's
    /// batch size instead of the page default.
    #[must_use]
    pub fn batch(&self, index: u64) -> Self {
        let cursor = match self.cursor {
            Some(cursor) => cursor.jump_to(index),
            None => PageCursor::new(index, self.def.default_batch_size()),
        };
        self.with_cursor(cursor)
    }

    #[must_use]
    pub fn batch_sized(&self, size: u64) -> Self {
        self.per(size)
    }

    #[must_use]
    pub fn first_page(&self) -> Self {
        self.page(1)
    }

    pub fn next_page(&self) -> Result<Self, Error> {
        let pages = self.total_pages()?;
        Ok(match self.cursor {
            Some(cursor) if cursor.has_next(pages) => self.with_cursor(cursor.next(pages)),
            Some(_) => self.clone(),
            None if pages > 1 => self.page(2),
            None => self.clone(),
        })
    }

    #[must_use]
    pub fn prev_page(&self) -> Self {
        match self.cursor {
            Some(cursor) if cursor.has_prev() => self.with_cursor(cursor.prev()),
            _ => self.clone(),
        }
    }

    pub fn last_page(&self) -> Result<Self, Error> {
        let pages = self.total_pages()?.max(1);
        Ok(self.page(pages))
    }

    #[must_use]
    pub fn jump_to(&self, index: u64) -> Self {
        self.page(index)
    }

    #[must_use]
    pub const fn is_paginated(&self) -> bool {
        self.cursor.is_some()
    }

    #[must_use]
    pub fn current_page(&self) -> u64 {
        self.cursor.map_or(1, |cursor| cursor.index())
    }

    /// Rows per page: the cursor size, else the raw limit, if either is set.
    #[must_use]
    pub fn page_size(&self) -> Option<u64> {
        self.cursor.map(|c| c.size()).or_else(|| self.spec.limit())
    }

    pub fn total_pages(&self) -> Result<u64, Error> {
        let total = self.total_count()?;
        let size = self.page_size().unwrap_or(total);
        Ok(page::total_pages(total, size))
    }

    pub fn has_next_page(&self) -> Result<bool, Error> {
        Ok(self.current_page() < self.total_pages()?)
    }

    #[must_use]
    pub fn has_prev_page(&self) -> bool {
        self.current_page() > 1
    }

    pub fn out_of_range(&self) -> Result<bool, Error> {
        Ok(self.current_page() > self.total_pages()?)
    }

    //
    // Materialization
    //

    /// Total rows of the window-stripped query. Memoized; count-preserving
    /// verbs carry the memo into derived snapshots.
    pub fn total_count(&self) -> Result<u64, Error> {
        if let Some(total) = self.total.get() {
            obs::record_total_cache_hit();
            return Ok(*total);
        }
        let entity = self.binding()?;
        obs::record_count();
        let total = self
            .source
            .count(&entity, &self.spec.clone().without_window())?;
        let _ = self.total.set(total);
        Ok(total)
    }

    /// Alias for `total_count`.
    pub fn count(&self) -> Result<u64, Error> {
        self.total_count()
    }

    /// Rows in the current window (cursor or raw limit/offset applied).
    pub fn size(&self) -> Result<u64, Error> {
        let entity = self.binding()?;
        obs::record_count();
        Ok(self.source.count(&entity, &self.effective_spec())?)
    }

    pub fn is_empty(&self) -> Result<bool, Error> {
        Ok(self.size()? == 0)
    }

    /// Materialize (and memoize) the current window. Never auto-batches;
    /// the whole-set operations layer on top of this.
    pub fn records(&self) -> Result<Arc<[Record]>, Error> {
        if let Some(records) = self.records.get() {
            obs::record_record_cache_hit();
            return Ok(records.clone());
        }
        let entity = self.binding()?;
        obs::record_fetch();
        let rows: Arc<[Record]> = self.source.fetch(&entity, &self.effective_spec())?.into();
        let _ = self.records.set(rows.clone());
        Ok(rows)
    }

    /// Whole-set materialization; engages auto-batching when the policy
    /// applies.
    pub fn to_vec(&self) -> Result<Vec<Record>, Error> {
        if self.should_batch()? {
            return self.flat_batch_map(|batch| batch.to_vec());
        }
        Ok(self.records()?.to_vec())
    }

    /// Visit every record; batch-wise when the auto-batching policy applies.
    pub fn each(&self, mut f: impl FnMut(&Record)) -> Result<(), Error> {
        if self.should_batch()? {
            return self.each_batch(|batch| {
                for record in batch {
                    f(record);
                }
            });
        }
        for record in self.records()?.iter() {
            f(record);
        }
        Ok(())
    }

    /// Map every record; batch-wise when the auto-batching policy applies.
    pub fn map<T>(&self, mut f: impl FnMut(&Record) -> T) -> Result<Vec<T>, Error> {
        if self.should_batch()? {
            return self.flat_batch_map(|batch| batch.iter().map(&mut f).collect());
        }
        Ok(self.records()?.iter().map(f).collect())
    }

    /// Single-column fetch over the current window.
    pub fn pluck(&self, column: &str) -> Result<Vec<Value>, Error> {
        let entity = self.binding()?;
        obs::record_pluck();
        Ok(self.source.pluck(&entity, &self.effective_spec(), column)?)
    }

    /// Identity values of the current window.
    pub fn record_ids(&self) -> Result<Vec<Value>, Error> {
        let entity = self.binding()?;
        let key = entity.primary_key().to_string();
        self.pluck(&key)
    }

    //
    // Internals
    //

    /// Derive a snapshot with a transformed spec. `keep_total` marks the
    /// count-preserving verbs (order, group, select); the records memo never
    /// survives a verb.
    fn fork_spec(&self, keep_total: bool, map: impl FnOnce(QuerySpec) -> QuerySpec) -> Self {
        let spec = map(self.spec.clone());
        self.fork_with(keep_total, spec)
    }

    fn fork_with(&self, keep_total: bool, spec: QuerySpec) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            source: Arc::clone(&self.source),
            def: Arc::clone(&self.def),
            binding: self.binding.clone(),
            spec,
            cursor: self.cursor,
            total: if keep_total {
                self.total.clone()
            } else {
                OnceCell::new()
            },
            records: OnceCell::new(),
        }
    }

    /// Replace the spec wholesale (delegated query ops), keeping cursor and
    /// total like the other relation-reshaping paths.
    pub(crate) fn fork_replace_spec(&self, spec: QuerySpec) -> Self {
        self.fork_with(true, spec)
    }

    /// Moving the cursor keeps the total memo (the window-stripped count is
    /// unaffected) and drops any raw window; the cursor owns the window now.
    pub(crate) fn with_cursor(&self, cursor: PageCursor) -> Self {
        let mut next = self.fork_spec(true, QuerySpec::without_window);
        next.cursor = Some(cursor);
        next
    }
}
