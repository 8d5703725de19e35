//! Reconciliation of configured and persisted dependencies into records.
//!
//! One [`Reconciler::run`] call is one run: the statically configured
//! dependency list is resolved first, then the persisted store is paged
//! through newest-first. Every resolved dependency becomes a
//! [`RepoRecord`] on the output channel; per-item failures become
//! [`SyncError`] values on the same channel so a single bad coordinate
//! never hides the rest of the run.

mod error;

pub use error::SyncError;

use std::collections::{HashMap, HashSet};
use std::ops::ControlFlow;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use modproxy_core::{
    DependencyStore, GO_MODULES_SCHEME, ListDependencyReposOpts, ModuleCoordinate, RepoRecord,
};

use crate::config::GoModulesConnection;
use crate::proxy::{LimiterRegistry, ProxyClient, ProxyError, ProxyTransport};

/// Rows requested per dependency-store page.
pub const STORE_PAGE_SIZE: usize = 100;

/// One item on the reconciliation output stream.
pub type SyncResult = Result<RepoRecord, SyncError>;

/// Versions known upstream for the module paths seen so far in this run.
///
/// A failed `@v/list` fetch is cached as an empty set so each distinct
/// module path is fetched at most once per run.
type VersionCache = HashMap<String, HashSet<String>>;

/// Drives one reconciliation run against a connection and a store.
#[derive(Debug)]
pub struct Reconciler<T, S> {
    connection: GoModulesConnection,
    urn: String,
    client: ProxyClient<T>,
    store: S,
}

impl<T: ProxyTransport, S: DependencyStore> Reconciler<T, S> {
    /// Construct a reconciler for the given connection.
    ///
    /// `urn` identifies the external service on every emitted record.
    /// The limiter registry is shared with any other client talking to the
    /// same endpoints.
    pub fn new(
        connection: GoModulesConnection,
        urn: impl Into<String>,
        transport: T,
        limiters: Arc<LimiterRegistry>,
        store: S,
    ) -> Self {
        let client = ProxyClient::new(&connection, transport, limiters);
        Self {
            connection,
            urn: urn.into(),
            client,
            store,
        }
    }

    /// Access the proxy client backing this reconciler.
    pub fn client(&self) -> &ProxyClient<T> {
        &self.client
    }

    /// Run one full reconciliation, emitting results on `results`.
    ///
    /// Configured dependencies are resolved first, in configured order;
    /// tracked store rows follow in newest-first page order. The send on
    /// the bounded channel blocks when the consumer lags. A dropped
    /// receiver ends the run quietly; cancellation ends it with a
    /// best-effort [`SyncError::Cancelled`] on the stream.
    pub async fn run(&self, cancel: &CancellationToken, results: &mpsc::Sender<SyncResult>) {
        if let ControlFlow::Break(()) = self.resolve_configured(cancel, results).await {
            return;
        }
        let _ = self.resolve_tracked(cancel, results).await;
    }

    /// Resolve one repository name (`go/<module>[@version]`) into a record.
    ///
    /// The module must exist upstream: its version list is fetched and a
    /// record is only produced when the proxies know the module at all.
    pub async fn resolve_repo(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<RepoRecord, SyncError> {
        let coordinate = ModuleCoordinate::parse_repo_name(name)?;
        self.client
            .list_versions(coordinate.path(), cancel)
            .await
            .map_err(|error| {
                if matches!(error, ProxyError::Cancelled) {
                    SyncError::Cancelled
                } else {
                    SyncError::Proxy(error)
                }
            })?;
        Ok(RepoRecord::from_coordinate(&coordinate, &self.urn))
    }

    /// Phase 1: the statically configured dependency list.
    async fn resolve_configured(
        &self,
        cancel: &CancellationToken,
        results: &mpsc::Sender<SyncResult>,
    ) -> ControlFlow<()> {
        for dependency in &self.connection.dependencies {
            let resolved = self.resolve_dependency(dependency, cancel).await;
            let halt = matches!(resolved, Err(SyncError::Cancelled));
            self.emit(resolved, cancel, results).await?;
            if halt {
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    async fn resolve_dependency(
        &self,
        dependency: &str,
        cancel: &CancellationToken,
    ) -> SyncResult {
        let coordinate = ModuleCoordinate::parse(dependency)?;
        self.client
            .get_version(coordinate.path(), coordinate.version(), cancel)
            .await
            .map_err(|error| {
                if matches!(error, ProxyError::Cancelled) {
                    SyncError::Cancelled
                } else {
                    SyncError::Proxy(error)
                }
            })?;
        Ok(RepoRecord::from_coordinate(&coordinate, &self.urn))
    }

    /// Phase 2: page through the persisted dependency rows.
    async fn resolve_tracked(
        &self,
        cancel: &CancellationToken,
        results: &mpsc::Sender<SyncResult>,
    ) -> ControlFlow<()> {
        let mut versions = VersionCache::new();
        let mut cursor = 0_u64;
        loop {
            if cancel.is_cancelled() {
                return self.emit(Err(SyncError::Cancelled), cancel, results).await;
            }
            let opts = ListDependencyReposOpts {
                scheme: GO_MODULES_SCHEME.to_owned(),
                after: cursor,
                limit: STORE_PAGE_SIZE,
                newest_first: true,
            };
            let page = tokio::select! {
                () = cancel.cancelled() => {
                    return self.emit(Err(SyncError::Cancelled), cancel, results).await;
                }
                page = self.store.list_dependency_repos(opts) => page,
            };
            let page = match page {
                Ok(page) => page,
                Err(error) => {
                    // Store access is required infrastructure; report and
                    // end the run.
                    self.emit(Err(SyncError::Store(error)), cancel, results)
                        .await?;
                    return ControlFlow::Break(());
                }
            };
            let Some(last) = page.last() else {
                return ControlFlow::Continue(());
            };
            cursor = last.id;

            for row in &page {
                let Ok(coordinate) = ModuleCoordinate::new(&row.name, &row.version) else {
                    log::warn!(
                        "skipping malformed dependency row {id}: {name}@{version}",
                        id = row.id,
                        name = row.name,
                        version = row.version,
                    );
                    continue;
                };
                let known = match self.known_versions(&mut versions, &coordinate, cancel).await {
                    Ok(known) => known,
                    Err(SyncError::Cancelled) => {
                        return self.emit(Err(SyncError::Cancelled), cancel, results).await;
                    }
                    Err(error) => {
                        self.emit(Err(error), cancel, results).await?;
                        continue;
                    }
                };
                if !known.contains(coordinate.version()) {
                    // Stale or retracted row; the store will catch up.
                    continue;
                }
                let record = RepoRecord::from_coordinate(&coordinate, &self.urn);
                self.emit(Ok(record), cancel, results).await?;
            }
        }
    }

    /// Fetch-once lookup of the upstream version set for a module path.
    async fn known_versions<'c>(
        &self,
        cache: &'c mut VersionCache,
        coordinate: &ModuleCoordinate,
        cancel: &CancellationToken,
    ) -> Result<&'c HashSet<String>, SyncError> {
        if !cache.contains_key(coordinate.path()) {
            let listed = match self.client.list_versions(coordinate.path(), cancel).await {
                Ok(listed) => listed.into_iter().collect(),
                Err(ProxyError::Cancelled) => return Err(SyncError::Cancelled),
                Err(error) => {
                    log::warn!(
                        "failed to list versions of {path}: {error}",
                        path = coordinate.path(),
                    );
                    HashSet::new()
                }
            };
            cache.insert(coordinate.path().to_owned(), listed);
        }
        Ok(&cache[coordinate.path()])
    }

    /// Send one result, honouring cancellation and a dropped receiver.
    ///
    /// On cancellation a final [`SyncError::Cancelled`] is offered without
    /// blocking before the run breaks off.
    async fn emit(
        &self,
        result: SyncResult,
        cancel: &CancellationToken,
        results: &mpsc::Sender<SyncResult>,
    ) -> ControlFlow<()> {
        tokio::select! {
            () = cancel.cancelled() => {
                let _ = results.try_send(Err(SyncError::Cancelled));
                ControlFlow::Break(())
            }
            sent = results.send(result) => match sent {
                Ok(()) => ControlFlow::Continue(()),
                Err(_) => ControlFlow::Break(()),
            },
        }
    }
}

#[cfg(test)]
mod tests;
