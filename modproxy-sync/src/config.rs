//! Connection configuration consumed from the external-service settings.

use serde::Deserialize;

/// Configuration for one Go module proxies connection.
///
/// Deserialised from the external service's JSON settings:
///
/// ```
/// use modproxy_sync::GoModulesConnection;
///
/// let connection: GoModulesConnection = serde_json::from_str(
///     r#"{
///         "urls": ["https://proxy.golang.org"],
///         "rateLimit": {"enabled": true, "requestsPerHour": 3600.0},
///         "dependencies": ["github.com/user/repo@v1.2.3"]
///     }"#,
/// )?;
/// assert_eq!(connection.urls.len(), 1);
/// # Ok::<(), serde_json::Error>(())
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoModulesConnection {
    /// Module proxy base URLs, tried in order.
    pub urls: Vec<String>,
    /// Optional self-enforced request rate; absent means unbounded.
    #[serde(default)]
    pub rate_limit: Option<RateLimitConfig>,
    /// Dependencies to track explicitly, as `path@version` strings.
    #[serde(default)]
    pub dependencies: Vec<String>,
}

/// Self-enforced request rate shared by every endpoint of a connection.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitConfig {
    /// Whether the limit is applied at all.
    pub enabled: bool,
    /// Sustained request budget per hour.
    pub requests_per_hour: f64,
}

impl GoModulesConnection {
    /// Effective request budget: the configured rate when enabled,
    /// unbounded otherwise.
    #[must_use]
    pub fn requests_per_hour(&self) -> f64 {
        match self.rate_limit {
            Some(limit) if limit.enabled => limit.requests_per_hour,
            _ => f64::INFINITY,
        }
    }
}
