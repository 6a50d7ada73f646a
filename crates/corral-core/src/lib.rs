//! Core runtime for Corral: the value model, predicate trees, query specs,
//! page/batch math, entity registry, source boundary, the collection facade,
//! and the portable serializer exported via the `prelude`.

pub mod collection;
pub mod error;
pub mod obs;
pub mod page;
pub mod predicate;
pub mod registry;
pub mod serial;
pub mod source;
pub mod spec;
pub mod value;

pub use error::Error;

///
/// CONSTANTS
///

/// Page size used when `page(n)` is called before any `per(size)`.
pub const DEFAULT_PAGE_SIZE: u64 = 25;

/// Batch size used by collection types that do not declare their own.
pub const DEFAULT_BATCH_SIZE: u64 = 500;

///
/// Prelude
///
/// Prelude contains only domain vocabulary.
/// No serializer internals, source adapters, or counters are re-exported here.
///

pub mod prelude {
    pub use crate::{
        collection::{Collection, Delegated},
        error::Error,
        registry::{CollectionDef, EntityDef, Registry},
        source::{DataSource, Record},
        spec::{Criteria, QuerySpec},
        value::Value,
    };
}
