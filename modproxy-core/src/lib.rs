//! Core domain types for Go module dependency synchronization.
//!
//! These models provide basic validation to keep downstream components
//! honest: coordinates are parsed and checked once, at the boundary, and
//! are immutable afterwards. The crate also defines the read-only contract
//! for the persisted dependency store consumed by the reconciliation
//! engine.

#![forbid(unsafe_code)]

mod coordinate;
mod record;
mod store;

pub mod test_support;

pub use coordinate::{
    CoordinateError, GO_MODULES_SCHEME, LATEST_VERSION, ModuleCoordinate, ValidityError,
};
pub use record::{RepoName, RepoRecord, SERVICE_TYPE_GO_MODULES, SourceInfo};
pub use store::{
    DependencyRepo, DependencyStore, ListDependencyReposOpts, StoreError, paginate,
};
