//! Read-only contract for the persisted dependency store.
//!
//! The store itself is external infrastructure; this subsystem only pages
//! through it. Pagination is keyed by row identifier so that rows inserted
//! at the newest end of the table during a run never shift pages already
//! visited.

use async_trait::async_trait;
use thiserror::Error;

/// One persisted dependency row.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DependencyRepo {
    /// Opaque, strictly increasing row identifier.
    pub id: u64,
    /// Ecosystem scheme tag, e.g. `go`.
    pub scheme: String,
    /// Module path as stored, without a version suffix.
    pub name: String,
    /// Tracked version for this row.
    pub version: String,
}

/// Options for one [`DependencyStore::list_dependency_repos`] page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListDependencyReposOpts {
    /// Only rows with this scheme tag are returned.
    pub scheme: String,
    /// Pagination cursor. `0` starts from the first row in the requested
    /// order; otherwise only rows strictly beyond the cursor are returned
    /// (`id < after` when `newest_first`, `id > after` otherwise).
    pub after: u64,
    /// Maximum number of rows in the page.
    pub limit: usize,
    /// Order rows by decreasing identifier (newest insertions first).
    pub newest_first: bool,
}

/// Error raised when a store query fails.
///
/// Store access is required infrastructure: the reconciliation engine
/// treats this error as fatal for the whole run.
#[derive(Debug, Error)]
#[error("dependency store query failed: {message}")]
pub struct StoreError {
    /// Human-readable description from the underlying store.
    pub message: String,
}

impl StoreError {
    /// Construct an error with the given description.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Read-only access to persisted dependency rows.
///
/// Implementations must provide stable pagination for a given snapshot:
/// repeating a query with the same options yields the same rows, and the
/// `after` cursor advances strictly through the identifier space.
#[async_trait]
pub trait DependencyStore: Send + Sync {
    /// Return the next page of rows matching `opts`.
    async fn list_dependency_repos(
        &self,
        opts: ListDependencyReposOpts,
    ) -> Result<Vec<DependencyRepo>, StoreError>;
}

/// Apply the [`ListDependencyReposOpts`] paging rules to an in-memory row
/// set. Shared by the in-memory stores backing tests and the CLI.
#[must_use]
pub fn paginate(rows: &[DependencyRepo], opts: &ListDependencyReposOpts) -> Vec<DependencyRepo> {
    let mut page: Vec<DependencyRepo> = rows
        .iter()
        .filter(|row| row.scheme == opts.scheme)
        .filter(|row| {
            if opts.after == 0 {
                return true;
            }
            if opts.newest_first {
                row.id < opts.after
            } else {
                row.id > opts.after
            }
        })
        .cloned()
        .collect();
    if opts.newest_first {
        page.sort_unstable_by(|a, b| b.id.cmp(&a.id));
    } else {
        page.sort_unstable_by_key(|row| row.id);
    }
    page.truncate(opts.limit);
    page
}
