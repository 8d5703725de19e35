//! Canonical repository records derived from module coordinates.

use std::fmt;
use std::ops::Deref;

use crate::coordinate::{GO_MODULES_SCHEME, ModuleCoordinate};

/// Service type recorded on every emitted repository record.
pub const SERVICE_TYPE_GO_MODULES: &str = "goModules";

/// Globally unique repository name for a module: `go/<path>`.
///
/// # Examples
/// ```
/// use modproxy_core::RepoName;
///
/// let name = RepoName::for_module("github.com/user/repo");
/// assert_eq!(name.as_ref(), "go/github.com/user/repo");
/// assert_eq!(name.module_path(), "github.com/user/repo");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct RepoName(String);

impl RepoName {
    /// Construct the canonical name for the given module path.
    #[must_use]
    pub fn for_module(path: &str) -> Self {
        Self(format!("{GO_MODULES_SCHEME}/{path}"))
    }

    /// Strip the scheme prefix back off, recovering the module path.
    ///
    /// Names without the prefix are returned unchanged.
    #[must_use]
    pub fn module_path(&self) -> &str {
        self.0
            .strip_prefix(GO_MODULES_SCHEME)
            .and_then(|rest| rest.strip_prefix('/'))
            .unwrap_or(&self.0)
    }

    /// Consume the wrapper and return the inner [`String`].
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl AsRef<str> for RepoName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Deref for RepoName {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Display for RepoName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Provenance attached to a repository record.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct SourceInfo {
    /// URN of the external service this record was resolved for.
    pub urn: String,
    /// URL the repository should be cloned from.
    pub clone_url: String,
}

/// A repository record emitted for one resolved dependency.
///
/// Records are derived, never persisted by this subsystem: re-resolving the
/// same coordinate always yields byte-identical `name` and `uri` values.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct RepoRecord {
    /// Canonical repository name.
    pub name: RepoName,
    /// Repository URI; identical to `name` for module repositories.
    pub uri: String,
    /// External identifier; identical to `name` for module repositories.
    pub external_id: String,
    /// Always [`SERVICE_TYPE_GO_MODULES`] for records from this subsystem.
    pub service_type: String,
    /// Module repositories are always public.
    pub private: bool,
    /// Provenance of the record.
    pub source: SourceInfo,
}

impl RepoRecord {
    /// Build the record for a resolved coordinate.
    #[must_use]
    pub fn from_coordinate(coordinate: &ModuleCoordinate, urn: &str) -> Self {
        let name = coordinate.repo_name();
        Self {
            uri: name.to_string(),
            external_id: name.to_string(),
            service_type: SERVICE_TYPE_GO_MODULES.to_owned(),
            private: false,
            source: SourceInfo {
                urn: urn.to_owned(),
                clone_url: name.to_string(),
            },
            name,
        }
    }
}
