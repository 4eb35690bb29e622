//! Proxy-routed page fetching with bounded retry
//!
//! Two layers:
//! - `HttpTransport`: exactly one GET attempt. `ProxyTransport` is the reqwest
//!   implementation routing every attempt through a randomly picked gateway port.
//! - `PageFetcher`: drives attempts under a `RetryPolicy`. Only a 200 is a success;
//!   any other status, network error or timeout is retried until the policy is
//!   exhausted and then surfaced as a classified `FetchError`.

#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result};
use async_trait::async_trait;
use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, direct::NotKeyed},
};
use reqwest::{
    Client,
    header::{ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, HeaderMap, HeaderValue, PRAGMA, USER_AGENT},
};
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::infrastructure::config::{CrawlConfig, ProxyConfig};
use crate::infrastructure::proxy::ProxyPool;
use crate::infrastructure::retry_policy::{RetryPolicy, Sleeper, TokioSleeper};

/// Final, classified failure of a page fetch. The display string is the
/// message recorded in the error ledger.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("HTTP error! status: {status}")]
    HttpStatus { status: u16 },

    #[error("No response received from the server{}", detail_suffix(.detail))]
    NoResponse { detail: String },

    #[error("Request timed out after {}s", .after.as_secs())]
    Timeout { after: Duration },

    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    Timeout,
    /// Connection, proxy or send failure: no response came back
    Network,
    Other,
}

#[derive(Error, Debug, Clone)]
#[error("{message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
    pub timeout: Option<Duration>,
}

impl TransportError {
    pub fn network(message: impl Into<String>) -> Self {
        Self {
            kind: TransportErrorKind::Network,
            message: message.into(),
            timeout: None,
        }
    }

    pub fn timeout(after: Duration) -> Self {
        Self {
            kind: TransportErrorKind::Timeout,
            message: format!("timed out after {:?}", after),
            timeout: Some(after),
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self {
            kind: TransportErrorKind::Other,
            message: message.into(),
            timeout: None,
        }
    }
}

fn detail_suffix(detail: &str) -> String {
    if detail.trim().is_empty() {
        String::new()
    } else {
        format!(" ({})", detail.trim())
    }
}

impl From<TransportError> for FetchError {
    fn from(error: TransportError) -> Self {
        match error.kind {
            TransportErrorKind::Timeout => Self::Timeout {
                after: error.timeout.unwrap_or_default(),
            },
            TransportErrorKind::Network => Self::NoResponse {
                detail: error.message,
            },
            TransportErrorKind::Other => Self::Other(error.message),
        }
    }
}

/// One completed HTTP exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

/// A single GET attempt
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(&self, url: &str) -> Result<TransportResponse, TransportError>;
}

/// reqwest transport routed through the proxy pool
pub struct ProxyTransport {
    pool: Option<ProxyPool>,
    direct: Client,
    /// One client per gateway port, built on first use
    proxied: Mutex<HashMap<u16, Client>>,
    headers: HeaderMap,
    timeout: Duration,
    pacer: Option<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
}

impl ProxyTransport {
    pub fn new(proxy: &ProxyConfig, crawl: &CrawlConfig) -> Result<Self> {
        let headers = browser_headers(&crawl.user_agent)?;
        let timeout = crawl.request_timeout();
        let direct = build_client(&headers, timeout, None)?;

        let pacer = NonZeroU32::new(crawl.requests_per_second)
            .map(|rps| RateLimiter::direct(Quota::per_second(rps)));

        let pool = ProxyPool::from_config(proxy);
        if let Some(pool) = &pool {
            debug!("Proxy pool enabled on ports {:?}", pool.ports());
        }

        Ok(Self {
            pool,
            direct,
            proxied: Mutex::new(HashMap::new()),
            headers,
            timeout,
            pacer,
        })
    }

    fn client_for_attempt(&self) -> Result<Client, TransportError> {
        let Some(pool) = &self.pool else {
            return Ok(self.direct.clone());
        };

        let port = pool.pick_port();
        let mut clients = self
            .proxied
            .lock()
            .map_err(|_| TransportError::other("proxy client cache poisoned"))?;
        if let Some(client) = clients.get(&port) {
            return Ok(client.clone());
        }

        let endpoint = pool
            .endpoint(port)
            .map_err(|e| TransportError::other(format!("Invalid proxy endpoint: {}", e)))?;
        let mut proxy = reqwest::Proxy::all(endpoint)
            .map_err(|e| TransportError::other(format!("Invalid proxy: {}", e)))?;
        if let Some((user, pass)) = pool.credentials() {
            proxy = proxy.basic_auth(user, pass);
        }
        let client = build_client(&self.headers, self.timeout, Some(proxy))
            .map_err(|e| TransportError::other(e.to_string()))?;
        clients.insert(port, client.clone());
        Ok(client)
    }

    fn classify(&self, error: &reqwest::Error) -> TransportError {
        if error.is_timeout() {
            TransportError::timeout(self.timeout)
        } else if error.is_connect() || error.is_request() {
            TransportError::network(error.to_string())
        } else {
            TransportError::other(error.to_string())
        }
    }
}

#[async_trait]
impl HttpTransport for ProxyTransport {
    async fn get(&self, url: &str) -> Result<TransportResponse, TransportError> {
        if let Some(pacer) = &self.pacer {
            pacer.until_ready().await;
        }

        let client = self.client_for_attempt()?;
        let response = client
            .get(url)
            .send()
            .await
            .map_err(|e| self.classify(&e))?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| self.classify(&e))?;

        debug!("Fetched {} ({})", url, status);
        Ok(TransportResponse { status, body })
    }
}

pub fn browser_headers(user_agent: &str) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(
        USER_AGENT,
        HeaderValue::from_str(user_agent).context("Invalid user agent")?,
    );
    headers.insert(
        ACCEPT,
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
        ),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
    Ok(headers)
}

pub fn build_client(headers: &HeaderMap, timeout: Duration, proxy: Option<reqwest::Proxy>) -> Result<Client> {
    let mut builder = Client::builder()
        .timeout(timeout)
        .default_headers(headers.clone())
        .redirect(reqwest::redirect::Policy::limited(10));
    builder = match proxy {
        Some(proxy) => builder.proxy(proxy),
        None => builder.no_proxy(),
    };
    builder.build().context("Failed to create HTTP client")
}

/// Bounded-retry fetcher
pub struct PageFetcher {
    transport: Arc<dyn HttpTransport>,
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl PageFetcher {
    pub fn new(transport: Arc<dyn HttpTransport>, policy: RetryPolicy) -> Self {
        Self {
            transport,
            policy,
            sleeper: Arc::new(TokioSleeper),
        }
    }

    #[must_use]
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Fetch a page body, retrying per policy
    pub async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let mut attempt = 1;
        loop {
            let error = match self.transport.get(url).await {
                Ok(response) if response.status == 200 => return Ok(response.body),
                Ok(response) => FetchError::HttpStatus {
                    status: response.status,
                },
                Err(error) => FetchError::from(error),
            };

            if !self.policy.should_retry(attempt) {
                return Err(error);
            }

            let delay = self.policy.delay_after(attempt);
            warn!(
                "🔄 Attempt {}/{} failed for {}: {}. Retrying in {:?}",
                attempt, self.policy.max_attempts, url, error, delay
            );
            self.sleeper.sleep(delay).await;
            attempt += 1;
        }
    }
}
