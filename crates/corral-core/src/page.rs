//! Module: page
//! Responsibility: pure page/batch math and the cursor value.
//! Does not own: counting, fetching, or auto-batching policy.

use crate::spec::QuerySpec;

/// Number of pages needed to cover `total_count` rows at `page_size` rows
/// per page. Zero when there is nothing to cover.
#[must_use]
pub const fn total_pages(total_count: u64, page_size: u64) -> u64 {
    if total_count == 0 || page_size == 0 {
        0
    } else {
        total_count.div_ceil(page_size)
    }
}

///
/// PageCursor
///
/// `(index, size)` state driving limit/offset computation for one page or
/// batch. `index` is 1-based and never below 1; `size` is clamped to at
/// least 1. `explicit_batch` marks a collection that already *is* one batch
/// and must not be re-batched by the automatic policy.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PageCursor {
    index: u64,
    size: u64,
    explicit_batch: bool,
}

impl PageCursor {
    #[must_use]
    pub const fn new(index: u64, size: u64) -> Self {
        Self {
            index: if index == 0 { 1 } else { index },
            size: if size == 0 { 1 } else { size },
            explicit_batch: false,
        }
    }

    #[must_use]
    pub const fn index(&self) -> u64 {
        self.index
    }

    #[must_use]
    pub const fn size(&self) -> u64 {
        self.size
    }

    #[must_use]
    pub const fn is_explicit_batch(&self) -> bool {
        self.explicit_batch
    }

    /// Flag this cursor as an isolated batch.
    #[must_use]
    pub const fn as_explicit_batch(mut self) -> Self {
        self.explicit_batch = true;
        self
    }

    /// Offset of the first row of this page.
    #[must_use]
    pub const fn offset(&self) -> u64 {
        (self.index - 1) * self.size
    }

    #[must_use]
    pub const fn first(self) -> Self {
        self.jump_to(1)
    }

    /// Advance one page; unchanged when already on the last page.
    #[must_use]
    pub const fn next(self, total_pages: u64) -> Self {
        if self.index < total_pages {
            self.jump_to(self.index + 1)
        } else {
            self
        }
    }

    /// Step back one page; unchanged when already on the first page.
    #[must_use]
    pub const fn prev(self) -> Self {
        if self.index > 1 {
            self.jump_to(self.index - 1)
        } else {
            self
        }
    }

    #[must_use]
    pub const fn jump_to(mut self, index: u64) -> Self {
        self.index = if index == 0 { 1 } else { index };
        self
    }

    /// Resize, keeping position and batch flag.
    #[must_use]
    pub const fn resize(mut self, size: u64) -> Self {
        self.size = if size == 0 { 1 } else { size };
        self
    }

    #[must_use]
    pub const fn has_next(&self, total_pages: u64) -> bool {
        self.index < total_pages
    }

    #[must_use]
    pub const fn has_prev(&self) -> bool {
        self.index > 1
    }

    /// True when the index points past the last page.
    #[must_use]
    pub const fn out_of_range(&self, total_pages: u64) -> bool {
        self.index > total_pages
    }

    /// Project this cursor onto a spec as a limit/offset window.
    #[must_use]
    pub const fn apply(&self, spec: QuerySpec) -> QuerySpec {
        spec.with_limit(Some(self.size)).with_offset(Some(self.offset()))
    }
}
