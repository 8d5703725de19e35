//! Shared fixtures for proxy and reconciliation tests.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;

use async_trait::async_trait;

use super::error::TransportError;
use super::transport::{ProxyTransport, TransportReply};

/// Scripted [`ProxyTransport`] backed by an in-memory URL table.
///
/// Unscripted URLs answer 404 so tests only describe the replies they care
/// about. Every request URL is recorded for ordering and counting
/// assertions.
#[derive(Debug, Default)]
pub struct StubTransport {
    replies: HashMap<String, TransportReply>,
    requests: Mutex<Vec<String>>,
}

impl StubTransport {
    /// Construct an empty stub; every request answers 404.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Script a reply for the exact request URL.
    #[must_use]
    pub fn reply(mut self, url: &str, status: u16, body: &[u8]) -> Self {
        self.replies.insert(
            url.to_owned(),
            TransportReply {
                status,
                body: body.to_vec(),
            },
        );
        self
    }

    /// Every request URL issued so far, in order.
    pub fn requests(&self) -> Vec<String> {
        self.requests
            .lock()
            .expect("stub transport mutex poisoned")
            .clone()
    }

    /// Number of requests whose URL contains `needle`.
    pub fn requests_matching(&self, needle: &str) -> usize {
        self.requests()
            .iter()
            .filter(|url| url.contains(needle))
            .count()
    }
}

#[async_trait]
impl ProxyTransport for StubTransport {
    async fn get(&self, url: &str) -> Result<TransportReply, TransportError> {
        self.requests
            .lock()
            .expect("stub transport mutex poisoned")
            .push(url.to_owned());
        Ok(self
            .replies
            .get(url)
            .cloned()
            .unwrap_or(TransportReply {
                status: 404,
                body: b"not found".to_vec(),
            }))
    }
}

/// Drive a future to completion on a fresh current-thread runtime.
///
/// A current-thread runtime keeps `tokio::time::pause` available to tests
/// that assert on rate-limit spacing.
pub fn block_on_for_tests<F: Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("failed to build test runtime")
        .block_on(future)
}
