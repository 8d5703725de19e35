//! Facade crate for the Go module dependency synchronization subsystem.
//!
//! This crate re-exports the core domain types and the synchronization
//! entry points so most consumers depend on a single crate.

#![forbid(unsafe_code)]

pub use modproxy_core::{
    CoordinateError, DependencyRepo, DependencyStore, GO_MODULES_SCHEME, LATEST_VERSION,
    ListDependencyReposOpts, ModuleCoordinate, RepoName, RepoRecord, SERVICE_TYPE_GO_MODULES,
    SourceInfo, StoreError, ValidityError,
};

pub use modproxy_sync::{
    GoModulesConnection, HttpTransport, LimiterRegistry, ProxyClient, ProxyError, ProxyTransport,
    RateLimitConfig, RateLimiter, Reconciler, STORE_PAGE_SIZE, SyncError, SyncResult,
    TransportError, TransportReply, VersionInfo,
};
