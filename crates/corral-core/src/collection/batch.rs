//! Module: collection::batch
//! Responsibility: chunked iteration over a collection — the batch engine.
//! Does not own: page math (see `page`) or the auto-batching thresholds
//! (declared on the collection def).
//!
//! Partitioning is offset-based: concurrent mutation of the underlying data
//! source during iteration can skip or repeat rows. Known limitation, not
//! handled here.

use crate::{collection::Collection, error::Error, obs, page, source::Record};

impl Collection {
    /// True when a whole-set operation should engage batching first: the
    /// policy is enabled, the total reaches the threshold, no cursor is
    /// active, and this collection is not itself an isolated batch.
    pub fn should_batch(&self) -> Result<bool, Error> {
        if self.is_explicit_batch() || self.cursor().is_some() {
            return Ok(false);
        }
        let threshold = self.def().batching_threshold();
        if threshold == 0 {
            return Ok(false);
        }
        Ok(self.total_count()? >= threshold)
    }

    /// True when this collection is flagged as one isolated batch.
    #[must_use]
    pub fn is_explicit_batch(&self) -> bool {
        self.cursor().is_some_and(page::PageCursor::is_explicit_batch)
    }

    /// Snapshot flagged as one isolated batch; a missing cursor engages one
    /// at the collection type's batch size first.
    #[must_use]
    pub fn as_batch(&self) -> Self {
        let cursor = self.cursor().copied().unwrap_or_else(|| {
            page::PageCursor::new(1, self.def().default_batch_size())
        });
        self.with_cursor(cursor.as_explicit_batch())
    }

    /// Pages in the batch partition: `1` for an explicit batch regardless
    /// of the underlying total, `0` for an empty unbatched collection.
    /// Iteration still yields a single (possibly empty) chunk when this is
    /// at most `1`.
    pub fn total_batches(&self) -> Result<u64, Error> {
        Ok(self.batch_plan()?.1)
    }

    /// Lazy, restartable sequence of result chunks, one per page of the
    /// partition, visited strictly ascending with no gaps or overlap under
    /// a static dataset.
    pub fn batches(&self) -> Result<Batches, Error> {
        let (base, pages) = self.batch_plan()?;
        Ok(Batches::new(base, pages))
    }

    /// Visit each chunk in order.
    pub fn each_batch(&self, mut f: impl FnMut(&[Record])) -> Result<(), Error> {
        for chunk in self.batches()? {
            f(&chunk?);
        }
        Ok(())
    }

    /// Map each chunk in order.
    pub fn batch_map<T>(&self, mut f: impl FnMut(&[Record]) -> T) -> Result<Vec<T>, Error> {
        let mut out = Vec::new();
        for chunk in self.batches()? {
            out.push(f(&chunk?));
        }
        Ok(out)
    }

    /// Map each chunk and flatten the results.
    pub fn flat_batch_map<T>(
        &self,
        mut f: impl FnMut(&[Record]) -> Vec<T>,
    ) -> Result<Vec<T>, Error> {
        let mut out = Vec::new();
        for chunk in self.batches()? {
            out.extend(f(&chunk?));
        }
        Ok(out)
    }

    /// Every chunk as an isolated-batch snapshot.
    pub fn to_batches(&self) -> Result<Vec<Self>, Error> {
        let (base, pages) = self.batch_plan()?;
        if pages <= 1 {
            return Ok(vec![base.as_batch()]);
        }
        Ok((1..=pages)
            .map(|index| base.jump_to(index).as_batch())
            .collect())
    }

    /// Decide the iteration base and its chunk count.
    ///
    /// An explicit batch iterates itself exactly once. A cursor partitions
    /// at the cursor size. Otherwise the auto-batching policy may engage a
    /// batch cursor; failing that, the whole window is one chunk.
    pub(crate) fn batch_plan(&self) -> Result<(Self, u64), Error> {
        if self.is_explicit_batch() {
            return Ok((self.clone(), 1));
        }
        if let Some(cursor) = self.cursor() {
            let pages = page::total_pages(self.total_count()?, cursor.size());
            return Ok((self.clone(), pages));
        }
        if self.should_batch()? {
            obs::record_auto_batch();
            let base = self.batch(1);
            let pages = page::total_pages(base.total_count()?, base.def().default_batch_size());
            return Ok((base, pages));
        }
        let pages = u64::from(self.total_count()? > 0);
        Ok((self.clone(), pages))
    }
}

///
/// Batches
///
/// Lazy chunk iterator. Restartable by calling `Collection::batches` again;
/// the source collection's cursor is never touched.
///

#[derive(Debug)]
pub struct Batches {
    base: Collection,
    pages: u64,
    next_index: u64,
}

impl Batches {
    pub(crate) const fn new(base: Collection, pages: u64) -> Self {
        Self {
            base,
            pages,
            next_index: 1,
        }
    }

    /// Chunks this iterator will yield in total.
    #[must_use]
    pub const fn len(&self) -> u64 {
        if self.pages <= 1 { 1 } else { self.pages }
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        false
    }
}

impl Iterator for Batches {
    type Item = Result<Vec<Record>, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pages <= 1 {
            // Single chunk: the base window as-is, cursor untouched.
            if self.next_index > 1 {
                return None;
            }
            self.next_index = 2;
            return Some(self.base.records().map(|rows| rows.to_vec()));
        }

        if self.next_index > self.pages {
            return None;
        }
        let chunk = self.base.jump_to(self.next_index);
        self.next_index += 1;
        Some(chunk.records().map(|rows| rows.to_vec()))
    }
}
