//! Client for the GOPROXY protocol with rate limiting and endpoint failover.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use url::Url;

use modproxy_core::LATEST_VERSION;

use crate::config::GoModulesConnection;

use super::error::ProxyError;
use super::limit::{LimiterRegistry, RateLimitCancelled};
use super::transport::{ProxyTransport, TransportReply};

/// Rate-limit waits longer than this are logged as diagnostics.
const SLOW_PERMIT_THRESHOLD: Duration = Duration::from_millis(200);

/// Version metadata returned by `@v/{version}.info` and `@latest`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct VersionInfo {
    /// Canonical version string.
    #[serde(rename = "Version")]
    pub version: String,
    /// Commit timestamp in RFC 3339 format, when the proxy reports one.
    #[serde(rename = "Time", default)]
    pub time: Option<String>,
}

/// A client to Go module proxies.
///
/// Endpoints are tried in configured order. A 404 or 410 from one endpoint
/// means "absent from this mirror, may exist elsewhere" and moves on to the
/// next; any other failure is returned immediately so that a systemic
/// outage is never masked as "not found".
#[derive(Debug)]
pub struct ProxyClient<T> {
    urls: Vec<String>,
    transport: T,
    limiters: Arc<LimiterRegistry>,
    requests_per_hour: f64,
}

impl<T: ProxyTransport> ProxyClient<T> {
    /// Construct a client for the given connection.
    ///
    /// Configured URLs are normalised (trailing slashes trimmed); entries
    /// that do not parse as absolute URLs are dropped with a warning.
    pub fn new(
        connection: &GoModulesConnection,
        transport: T,
        limiters: Arc<LimiterRegistry>,
    ) -> Self {
        let urls = connection
            .urls
            .iter()
            .map(|url| url.trim_end_matches('/').to_owned())
            .filter(|url| match Url::parse(url) {
                Ok(_) => true,
                Err(error) => {
                    log::warn!("dropping malformed module proxy URL {url:?}: {error}");
                    false
                }
            })
            .collect();
        Self {
            urls,
            transport,
            limiters,
            requests_per_hour: connection.requests_per_hour(),
        }
    }

    /// Access the underlying transport.
    ///
    /// Tests use this to assert on the requests a stub transport recorded.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Fetch metadata for a single version of `module`, if it exists.
    ///
    /// The [`LATEST_VERSION`] sentinel is resolved through the protocol's
    /// `@latest` endpoint, which returns the same JSON shape.
    pub async fn get_version(
        &self,
        module: &str,
        version: &str,
        cancel: &CancellationToken,
    ) -> Result<VersionInfo, ProxyError> {
        let path = if version == LATEST_VERSION {
            format!("{module}/@latest")
        } else {
            format!("{module}/@v/{version}.info")
        };
        let body = self.get(&path, cancel).await?;
        serde_json::from_slice(&body).map_err(|source| ProxyError::Decode { path, source })
    }

    /// List all versions of `module` known to the proxies.
    ///
    /// The newline-delimited body is consumed in a single pass.
    pub async fn list_versions(
        &self,
        module: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, ProxyError> {
        let body = self.get(&format!("{module}/@v/list"), cancel).await?;
        let text = String::from_utf8_lossy(&body);
        Ok(text
            .lines()
            .filter(|line| !line.is_empty())
            .map(str::to_owned)
            .collect())
    }

    /// Fetch the zip archive of `module` at `version`.
    pub async fn get_archive(
        &self,
        module: &str,
        version: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, ProxyError> {
        self.get(&format!("{module}/@v/{version}.zip"), cancel).await
    }

    async fn get(&self, path: &str, cancel: &CancellationToken) -> Result<Vec<u8>, ProxyError> {
        let mut not_found = None;
        for base_url in &self.urls {
            if cancel.is_cancelled() {
                return Err(ProxyError::Cancelled);
            }
            let limiter = self.limiters.get_or_create(base_url, self.requests_per_hour);
            let waited = limiter
                .acquire(cancel)
                .await
                .map_err(|RateLimitCancelled| ProxyError::Cancelled)?;
            if waited > SLOW_PERMIT_THRESHOLD {
                log::warn!(
                    "module proxy request to {base_url} delayed {waited:?} by the self-enforced rate limit"
                );
            }

            let url = format!("{base_url}/{path}");
            let reply = tokio::select! {
                () = cancel.cancelled() => return Err(ProxyError::Cancelled),
                reply = self.transport.get(&url) => reply?,
            };
            match reply.status {
                200 => return Ok(reply.body),
                404 | 410 => {
                    not_found = Some(status_error(&url, reply));
                }
                _ => return Err(status_error(&url, reply)),
            }
        }
        Err(not_found.unwrap_or(ProxyError::NoEndpoints))
    }
}

fn status_error(url: &str, reply: TransportReply) -> ProxyError {
    ProxyError::Status {
        path: url.to_owned(),
        status: reply.status,
        message: String::from_utf8_lossy(&reply.body).into_owned(),
    }
}
