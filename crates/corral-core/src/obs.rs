//! Ephemeral, in-memory counters for collection operations; private to no
//! one, exported read-only through `snapshot`.
//!
//! NOTE:
//! The facade itself is single-threaded, but the counters are atomics to
//! make shared mutability explicit and to stay correct when collections are
//! read from multiple threads (tests, tooling).

use std::sync::atomic::{AtomicU64, Ordering};

static SOURCE_FETCHES: AtomicU64 = AtomicU64::new(0);
static SOURCE_COUNTS: AtomicU64 = AtomicU64::new(0);
static SOURCE_PLUCKS: AtomicU64 = AtomicU64::new(0);
static AUTO_BATCHES: AtomicU64 = AtomicU64::new(0);
static RECORD_CACHE_HITS: AtomicU64 = AtomicU64::new(0);
static TOTAL_CACHE_HITS: AtomicU64 = AtomicU64::new(0);

///
/// ObsSnapshot
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ObsSnapshot {
    pub source_fetches: u64,
    pub source_counts: u64,
    pub source_plucks: u64,
    pub auto_batches: u64,
    pub record_cache_hits: u64,
    pub total_cache_hits: u64,
}

pub(crate) fn record_fetch() {
    SOURCE_FETCHES.fetch_add(1, Ordering::Relaxed);
}

pub(crate) fn record_count() {
    SOURCE_COUNTS.fetch_add(1, Ordering::Relaxed);
}

pub(crate) fn record_pluck() {
    SOURCE_PLUCKS.fetch_add(1, Ordering::Relaxed);
}

pub(crate) fn record_auto_batch() {
    AUTO_BATCHES.fetch_add(1, Ordering::Relaxed);
}

pub(crate) fn record_record_cache_hit() {
    RECORD_CACHE_HITS.fetch_add(1, Ordering::Relaxed);
}

pub(crate) fn record_total_cache_hit() {
    TOTAL_CACHE_HITS.fetch_add(1, Ordering::Relaxed);
}

/// Current counter values.
#[must_use]
pub fn snapshot() -> ObsSnapshot {
    ObsSnapshot {
        source_fetches: SOURCE_FETCHES.load(Ordering::Relaxed),
        source_counts: SOURCE_COUNTS.load(Ordering::Relaxed),
        source_plucks: SOURCE_PLUCKS.load(Ordering::Relaxed),
        auto_batches: AUTO_BATCHES.load(Ordering::Relaxed),
        record_cache_hits: RECORD_CACHE_HITS.load(Ordering::Relaxed),
        total_cache_hits: TOTAL_CACHE_HITS.load(Ordering::Relaxed),
    }
}

/// Zero every counter. Intended for tests and tooling.
pub fn reset() {
    SOURCE_FETCHES.store(0, Ordering::Relaxed);
    SOURCE_COUNTS.store(0, Ordering::Relaxed);
    SOURCE_PLUCKS.store(0, Ordering::Relaxed);
    AUTO_BATCHES.store(0, Ordering::Relaxed);
    RECORD_CACHE_HITS.store(0, Ordering::Relaxed);
    TOTAL_CACHE_HITS.store(0, Ordering::Relaxed);
}
