//! Errors produced by the proxy client and its transport.

use std::io;

use thiserror::Error;

/// Transport-level errors encountered while issuing HTTP requests.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TransportError {
    /// The request failed before a status code was received.
    #[error("network error contacting {url}: {source}")]
    Network {
        /// Fully qualified request URL.
        url: String,
        /// I/O error reported by the transport.
        source: io::Error,
    },
}

/// Errors returned by [`ProxyClient`](super::ProxyClient) operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProxyError {
    /// An endpoint answered with a non-success status.
    ///
    /// 404 and 410 mean "not present at this mirror" and trigger failover;
    /// every other status is a hard error returned immediately.
    #[error("bad module proxy response with status code {status} for {path}: {message}")]
    Status {
        /// Request URL that produced the status.
        path: String,
        /// HTTP status code.
        status: u16,
        /// Error body supplied by the proxy, expected to be short plaintext.
        message: String,
    },
    /// The request never produced a status code.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// Version metadata did not decode as the expected JSON shape.
    #[error("malformed version info from {path}: {source}")]
    Decode {
        /// Request URL that produced the payload.
        path: String,
        /// Decoder failure.
        #[source]
        source: serde_json::Error,
    },
    /// The caller's cancellation signal fired during the request.
    #[error("request cancelled while contacting the module proxy")]
    Cancelled,
    /// The connection has no endpoints configured.
    #[error("no module proxy endpoints are configured")]
    NoEndpoints,
}

impl ProxyError {
    /// Whether this error means "absent from the queried mirrors" rather
    /// than a systemic failure.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::Status {
                status: 404 | 410,
                ..
            }
        )
    }
}
