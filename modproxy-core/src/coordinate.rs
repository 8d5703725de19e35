//! Module coordinates: parsing, validation, and repository-name mapping.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::record::RepoName;

/// Scheme tag identifying Go module rows in the dependency store and
/// prefixing repository names.
pub const GO_MODULES_SCHEME: &str = "go";

/// Sentinel version used when a dependency is declared without an explicit
/// `@version` suffix.
pub const LATEST_VERSION: &str = "latest";

/// A single Go module release: a validated `(path, version)` pair.
///
/// Coordinates are immutable once constructed. Equality is structural and
/// byte-exact; no normalisation is applied beyond what parsing enforces.
///
/// # Examples
/// ```
/// use modproxy_core::ModuleCoordinate;
///
/// let coordinate = ModuleCoordinate::parse("github.com/user/repo@v1.2.3")?;
/// assert_eq!(coordinate.path(), "github.com/user/repo");
/// assert_eq!(coordinate.version(), "v1.2.3");
/// # Ok::<(), modproxy_core::CoordinateError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModuleCoordinate {
    path: String,
    version: String,
}

/// Errors returned when a coordinate string fails validation.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum CoordinateError {
    /// The input did not satisfy the module path or version rules.
    #[error("invalid module coordinate {input:?}: {source}")]
    Invalid {
        /// The original, unmodified input string.
        input: String,
        /// The rule the input violated.
        #[source]
        source: ValidityError,
    },
}

/// Individual path and version rules a coordinate can violate.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ValidityError {
    /// The module path was empty.
    #[error("module path is empty")]
    EmptyPath,
    /// The module path started or ended with a separator.
    #[error("module path must not start or end with '/'")]
    UnanchoredPath,
    /// A path segment between separators was empty.
    #[error("module path contains an empty segment")]
    EmptySegment,
    /// A path segment was `.` or `..`.
    #[error("module path contains a relative segment {segment:?}")]
    RelativeSegment {
        /// The offending segment.
        segment: String,
    },
    /// A path segment contained a character outside the canonical charset.
    #[error("module path segment {segment:?} contains disallowed characters")]
    DisallowedCharacter {
        /// The offending segment.
        segment: String,
    },
    /// The version was neither `latest` nor a semantic version.
    #[error("version {version:?} is not 'latest' or a semantic version")]
    InvalidVersion {
        /// The offending version string.
        version: String,
    },
}

impl ModuleCoordinate {
    /// Parse a `<path>@<version>` dependency string.
    ///
    /// The input is split on the **last** `@`; everything before it is the
    /// module path and everything after it the version. An input without an
    /// `@` is accepted and defaults the version to [`LATEST_VERSION`] — this
    /// default is part of the public contract.
    ///
    /// # Examples
    /// ```
    /// use modproxy_core::{LATEST_VERSION, ModuleCoordinate};
    ///
    /// let pinned = ModuleCoordinate::parse("example.org/mod@v0.3.1")?;
    /// assert_eq!(pinned.version(), "v0.3.1");
    ///
    /// let floating = ModuleCoordinate::parse("example.org/mod")?;
    /// assert_eq!(floating.version(), LATEST_VERSION);
    /// # Ok::<(), modproxy_core::CoordinateError>(())
    /// ```
    pub fn parse(input: &str) -> Result<Self, CoordinateError> {
        let (path, version) = match input.rsplit_once('@') {
            Some((path, version)) => (path, version),
            None => (input, LATEST_VERSION),
        };
        validate(path, version).map_err(|source| CoordinateError::Invalid {
            input: input.to_owned(),
            source,
        })?;
        Ok(Self {
            path: path.to_owned(),
            version: version.to_owned(),
        })
    }

    /// Parse a repository name previously produced by [`Self::repo_name`],
    /// i.e. a `go/<path>[@version]` string, back into a coordinate.
    pub fn parse_repo_name(name: &str) -> Result<Self, CoordinateError> {
        let trimmed = name
            .strip_prefix(GO_MODULES_SCHEME)
            .and_then(|rest| rest.strip_prefix('/'))
            .unwrap_or(name);
        Self::parse(trimmed)
    }

    /// Validating constructor for path and version arriving separately,
    /// as they do in persisted dependency rows.
    pub fn new(path: &str, version: &str) -> Result<Self, CoordinateError> {
        validate(path, version).map_err(|source| CoordinateError::Invalid {
            input: format!("{path}@{version}"),
            source,
        })?;
        Ok(Self {
            path: path.to_owned(),
            version: version.to_owned(),
        })
    }

    /// The module path, e.g. `github.com/user/repo`.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The module version, e.g. `v1.2.3` or [`LATEST_VERSION`].
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Whether the version is the floating [`LATEST_VERSION`] sentinel.
    #[must_use]
    pub fn is_latest(&self) -> bool {
        self.version == LATEST_VERSION
    }

    /// Deterministic repository name for this module: `go/<path>`.
    ///
    /// This is a pure function of the coordinate; the same coordinate always
    /// yields a byte-identical name.
    #[must_use]
    pub fn repo_name(&self) -> RepoName {
        RepoName::for_module(&self.path)
    }

    /// Canonical `path@version` round-trip string.
    ///
    /// For every valid coordinate `c`,
    /// `ModuleCoordinate::parse(&c.package_manager_syntax())` equals `c`.
    #[must_use]
    pub fn package_manager_syntax(&self) -> String {
        format!("{}@{}", self.path, self.version)
    }
}

impl fmt::Display for ModuleCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.path, self.version)
    }
}

impl FromStr for ModuleCoordinate {
    type Err = CoordinateError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        Self::parse(input)
    }
}

fn validate(path: &str, version: &str) -> Result<(), ValidityError> {
    check_path(path)?;
    check_version(version)
}

/// Module paths use the canonical lowercase charset so requests never need
/// GOPROXY case-escaping, and must not be able to traverse out of the
/// proxy's namespace.
fn check_path(path: &str) -> Result<(), ValidityError> {
    if path.is_empty() {
        return Err(ValidityError::EmptyPath);
    }
    if path.starts_with('/') || path.ends_with('/') {
        return Err(ValidityError::UnanchoredPath);
    }
    for segment in path.split('/') {
        if segment.is_empty() {
            return Err(ValidityError::EmptySegment);
        }
        if segment == "." || segment == ".." {
            return Err(ValidityError::RelativeSegment {
                segment: segment.to_owned(),
            });
        }
        let allowed = segment
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || "-._~".contains(c));
        if !allowed {
            return Err(ValidityError::DisallowedCharacter {
                segment: segment.to_owned(),
            });
        }
    }
    Ok(())
}

/// Versions are either the `latest` sentinel or a semantic version with an
/// optional leading `v` and optional pre-release/build metadata.
fn check_version(version: &str) -> Result<(), ValidityError> {
    if version == LATEST_VERSION {
        return Ok(());
    }
    let invalid = || ValidityError::InvalidVersion {
        version: version.to_owned(),
    };
    let rest = version.strip_prefix('v').unwrap_or(version);
    let (rest, build) = match rest.split_once('+') {
        Some((head, build)) => (head, Some(build)),
        None => (rest, None),
    };
    let (base, pre_release) = match rest.split_once('-') {
        Some((head, pre)) => (head, Some(pre)),
        None => (rest, None),
    };
    for extension in [pre_release, build].into_iter().flatten() {
        let well_formed = !extension.is_empty()
            && extension
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.');
        if !well_formed {
            return Err(invalid());
        }
    }
    let numbers = base.split('.').collect::<Vec<_>>();
    if numbers.len() != 3 {
        return Err(invalid());
    }
    for number in numbers {
        if number.is_empty() || !number.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
    }
    Ok(())
}
