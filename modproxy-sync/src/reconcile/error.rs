//! Errors surfaced on the reconciliation output stream.

use thiserror::Error;

use modproxy_core::{CoordinateError, StoreError};

use crate::proxy::ProxyError;

/// Failure modes of a reconciliation run.
///
/// `Coordinate` and `Proxy` are per-item: they appear on the output stream
/// and the run continues. `Store` and `Cancelled` end the run after being
/// emitted.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SyncError {
    /// A configured dependency string failed validation.
    #[error(transparent)]
    Coordinate(#[from] CoordinateError),
    /// The module proxies could not resolve a coordinate.
    #[error(transparent)]
    Proxy(#[from] ProxyError),
    /// The dependency store could not be queried.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The run was cancelled before completion.
    #[error("reconciliation run cancelled")]
    Cancelled,
}
