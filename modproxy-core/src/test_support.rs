//! Shared in-memory dependency store used by tests across the workspace.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::store::{DependencyRepo, DependencyStore, ListDependencyReposOpts, StoreError, paginate};

/// In-memory [`DependencyStore`] with optional failure injection and a
/// fetch counter for pagination assertions.
#[derive(Debug, Default)]
pub struct MemoryDependencyStore {
    rows: Vec<DependencyRepo>,
    failure: Option<String>,
    fetches: AtomicUsize,
}

impl MemoryDependencyStore {
    /// Construct a store holding the given rows.
    #[must_use]
    pub fn new(rows: Vec<DependencyRepo>) -> Self {
        Self {
            rows,
            failure: None,
            fetches: AtomicUsize::new(0),
        }
    }

    /// Construct a store whose every query fails with `message`.
    #[must_use]
    pub fn failing(message: &str) -> Self {
        Self {
            rows: Vec::new(),
            failure: Some(message.to_owned()),
            fetches: AtomicUsize::new(0),
        }
    }

    /// Number of pages requested so far.
    #[must_use]
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DependencyStore for MemoryDependencyStore {
    async fn list_dependency_repos(
        &self,
        opts: ListDependencyReposOpts,
    ) -> Result<Vec<DependencyRepo>, StoreError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.failure {
            return Err(StoreError::new(message));
        }
        Ok(paginate(&self.rows, &opts))
    }
}

/// Build a `go`-scheme dependency row, keeping test fixtures terse.
#[must_use]
pub fn go_row(id: u64, name: &str, version: &str) -> DependencyRepo {
    DependencyRepo {
        id,
        scheme: "go".to_owned(),
        name: name.to_owned(),
        version: version.to_owned(),
    }
}
