//! ## Crate layout
//! - `core`: the engine — value model, predicate trees, query specs,
//!   page/batch math, the entity registry, the source boundary, the
//!   collection facade, and the portable serializer.
//!
//! This crate is the public face: it re-exports the runtime surface used by
//! applications and pins the workspace version for downstream tooling.

pub use corral_core as core;

pub use corral_core::Error;

//
// Consts
//

/// Workspace version re-export for downstream tooling/tests.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

///
/// Prelude
/// using _ brings traits into scope and avoids name conflicts
///

pub mod prelude {
    pub use crate::core::{
        collection::{Batches, Collection, Delegated},
        error::Error,
        registry::{CollectionDef, EntityDef, Registry},
        serial::CollectionRepr,
        source::{DataSource, MemorySource, QueryOpResult, Record, RecordOps},
        spec::{Criteria, QuerySpec},
        value::Value,
    };
    pub use serde::{Deserialize, Serialize};
}
