//! Synchronization of Go module dependencies into repository records.
//!
//! Responsibilities:
//! - Query GOPROXY-protocol mirrors for version metadata and archives,
//!   throttled per endpoint and failing over only on "not found".
//! - Reconcile the statically configured dependency list and the persisted
//!   dependency store into a stream of canonical repository records.
//!
//! Boundaries:
//! - Domain rules (coordinate validation, record shapes, the store
//!   contract) live in `modproxy-core`.
//! - The store behind the contract and the consumer of the record stream
//!   are external collaborators.
//!
//! Invariants:
//! - No global mutable state: the per-endpoint limiter registry is an
//!   explicitly owned object injected by the caller.
//! - Per-item failures surface on the output stream; only store failures
//!   and cancellation end a run early.

#![forbid(unsafe_code)]

pub mod config;
pub mod proxy;
pub mod reconcile;

pub use config::{GoModulesConnection, RateLimitConfig};
pub use proxy::{
    HttpTransport, LimiterRegistry, ProxyClient, ProxyError, ProxyTransport, RateLimiter,
    TransportError, TransportReply, VersionInfo,
};
pub use reconcile::{Reconciler, STORE_PAGE_SIZE, SyncError, SyncResult};
