use crate::{
    collection::DelegateError, registry::RegistryError, serial::SerialError, source::SourceError,
    spec::SpecError,
};
use thiserror::Error as ThisError;

///
/// Error
///
/// Top-level error for the crate. Each layer keeps its own structured error
/// type; this enum only aggregates them so callers can use one `Result`
/// alias across the fluent API.
///

#[derive(Debug, ThisError)]
pub enum Error {
    #[error(transparent)]
    Delegate(#[from] DelegateError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Serial(#[from] SerialError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Spec(#[from] SpecError),
}
