//! Fetcher errors.

/// What can go wrong while listing or fetching objects.
///
/// Normal pool saturation is not an error — the fetcher blocks. An error
/// is raised only for invalid construction, an object that could never fit
/// the memory pool, or a failure reported by the store itself.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("invalid fetcher configuration: {0}")]
    Config(&'static str),

    #[error("object needs {need} memory chunks but the pool holds {have}")]
    PoolExhausted { need: usize, have: usize },

    #[error("object store: {0}")]
    Store(#[source] anyhow::Error),
}
