//! Single-attempt HTTP fetching
//!
//! This module handles the raw requests behind the retrying [`Transport`]:
//! - Building reqwest clients, optionally bound to a SOCKS proxy
//! - One GET per call with a per-request timeout
//! - Capping the body size while streaming
//! - Classifying failures into [`TransportErrorKind`]
//!
//! [`Transport`]: super::Transport

use crate::config::CrawlerConfig;
use crate::identity::Identity;
use crate::transport::agents::anonymous_headers;
use crate::transport::error::{TransportError, TransportErrorKind};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::{redirect::Policy, Client, Proxy};
use std::time::Duration;
use url::Url;

/// Settings shared by every client this process builds
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// User agent for direct (non-anonymous) requests
    pub user_agent: String,
    pub connect_timeout: Duration,
    pub max_redirects: usize,
}

impl ClientOptions {
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            connect_timeout: config.page_timeout(),
            max_redirects: 10,
        }
    }
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self::from_config(&CrawlerConfig::default())
    }
}

/// Builds an HTTP client
///
/// # Arguments
///
/// * `options` - Shared client settings
/// * `proxy` - Route everything through this proxy; `None` connects directly
///   and ignores proxy environment variables
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_client(options: &ClientOptions, proxy: Option<Proxy>) -> Result<Client, reqwest::Error> {
    let builder = Client::builder()
        .user_agent(options.user_agent.clone())
        .connect_timeout(options.connect_timeout)
        .redirect(Policy::limited(options.max_redirects))
        .gzip(true)
        .brotli(true);

    let builder = match proxy {
        Some(proxy) => builder.proxy(proxy),
        None => builder.no_proxy(),
    };

    builder.build()
}

/// One fetch to perform
#[derive(Debug, Clone)]
pub struct FetchRequest<'a> {
    pub url: &'a Url,
    pub timeout: Duration,
    pub max_body_bytes: u64,
}

/// A fully buffered HTTP response
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// URL after redirects
    pub final_url: Url,
    pub status: u16,
    pub content_type: Option<String>,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl FetchResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Turns a non-2xx response into `HttpError`
    pub fn error_for_status(self) -> Result<Self, TransportError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(TransportError::new(
                &self.final_url,
                TransportErrorKind::HttpError(self.status),
            ))
        }
    }

    /// Lowercased media type without parameters
    pub fn media_type(&self) -> Option<String> {
        self.content_type.as_deref().map(|value| {
            value
                .split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase()
        })
    }
}

/// Performs exactly one request attempt
#[async_trait]
pub trait HttpFetch: Send + Sync {
    /// Fetches `request.url`, through `identity` when one is given
    ///
    /// Any HTTP status is a successful fetch; only connectivity, timeouts and
    /// oversize bodies are errors.
    async fn fetch_once(
        &self,
        identity: Option<&Identity>,
        request: &FetchRequest<'_>,
    ) -> Result<FetchResponse, TransportError>;
}

/// reqwest-backed fetcher
#[derive(Debug, Clone)]
pub struct ReqwestFetch {
    direct: Client,
}

impl ReqwestFetch {
    pub fn new(options: &ClientOptions) -> Result<Self, reqwest::Error> {
        Ok(Self {
            direct: build_client(options, None)?,
        })
    }
}

#[async_trait]
impl HttpFetch for ReqwestFetch {
    async fn fetch_once(
        &self,
        identity: Option<&Identity>,
        request: &FetchRequest<'_>,
    ) -> Result<FetchResponse, TransportError> {
        let url = request.url;

        let builder = match identity {
            Some(identity) => identity
                .client()
                .get(url.clone())
                .headers(anonymous_headers()),
            None => self.direct.get(url.clone()),
        };

        let mut response = builder
            .timeout(request.timeout)
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(url, &e))?;

        let final_url = response.url().clone();
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        if let Some(length) = response.content_length() {
            if length > request.max_body_bytes {
                return Err(oversize(url, request.max_body_bytes));
            }
        }

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| TransportError::from_reqwest(url, &e))?
        {
            if (body.len() + chunk.len()) as u64 > request.max_body_bytes {
                return Err(oversize(url, request.max_body_bytes));
            }
            body.extend_from_slice(&chunk);
        }

        Ok(FetchResponse {
            final_url,
            status,
            content_type,
            headers,
            body,
        })
    }
}

fn oversize(url: &Url, limit: u64) -> TransportError {
    TransportError::new(
        url,
        TransportErrorKind::Other(format!("body exceeds {} bytes", limit)),
    )
}
