//! Client plumbing for the GOPROXY protocol.
//!
//! The [`ProxyClient`] sits above a [`ProxyTransport`] seam so that rate
//! limiting, status classification, and endpoint failover are tested
//! independently of HTTP.

mod client;
mod error;
mod limit;
mod transport;

pub mod test_support;
pub use test_support::{StubTransport, block_on_for_tests};

pub use client::{ProxyClient, VersionInfo};
pub use error::{ProxyError, TransportError};
pub use limit::{LimiterRegistry, RateLimitCancelled, RateLimiter};
pub use transport::{DEFAULT_USER_AGENT, HttpTransport, ProxyTransport, TransportReply};
