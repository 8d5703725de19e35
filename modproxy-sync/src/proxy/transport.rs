//! HTTP seam used by the proxy client.

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::USER_AGENT;

use super::error::TransportError;

/// User agent sent with every upstream request.
pub const DEFAULT_USER_AGENT: &str = "modproxy-sync/0.1";

/// Raw reply from one endpoint, before status classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportReply {
    /// HTTP status code.
    pub status: u16,
    /// Fully buffered response body.
    pub body: Vec<u8>,
}

/// Issues a single GET against a fully qualified URL.
///
/// Implementations report transport failures only; non-success status
/// codes are returned as ordinary replies because the
/// [`ProxyClient`](super::ProxyClient) decides which of them fail over to
/// the next endpoint.
#[async_trait]
pub trait ProxyTransport: Send + Sync {
    /// Issue the request and buffer the whole response.
    async fn get(&self, url: &str) -> Result<TransportReply, TransportError>;
}

/// reqwest-backed [`ProxyTransport`].
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    user_agent: String,
}

impl HttpTransport {
    /// Construct a transport with a shared connection pool.
    #[must_use]
    pub fn new() -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()
            .expect("client builder only fails with invalid configuration");
        Self {
            client,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
        }
    }

    /// Override the default user agent string.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProxyTransport for HttpTransport {
    async fn get(&self, url: &str) -> Result<TransportReply, TransportError> {
        let response = self
            .client
            .get(url)
            .header(USER_AGENT, self.user_agent.as_str())
            .send()
            .await
            .map_err(|err| convert_reqwest_error(err, url))?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|err| convert_reqwest_error(err, url))?
            .to_vec();
        Ok(TransportReply { status, body })
    }
}

fn convert_reqwest_error(error: reqwest::Error, url: &str) -> TransportError {
    let kind = if error.is_timeout() {
        io::ErrorKind::TimedOut
    } else {
        io::ErrorKind::Other
    };
    TransportError::Network {
        url: url.to_owned(),
        source: io::Error::new(kind, error),
    }
}
