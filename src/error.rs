//! Error types for the `swiss-hash` crate.

/// Errors surfaced by the result-returning lookup operations.
///
/// Only [`HashMap::try_get`], [`HashMap::try_erase`], and their set
/// counterparts produce these; plain lookups report misses through
/// `Option`, and allocation failure aborts.
///
/// [`HashMap::try_get`]: crate::HashMap::try_get
/// [`HashMap::try_erase`]: crate::HashMap::try_erase
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The key was not present in the container.
    #[error("key not found")]
    NotFound,
}
