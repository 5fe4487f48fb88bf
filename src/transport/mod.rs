//! Retrying, identity-aware HTTP transport
//!
//! # Components
//!
//! - `client`: single-attempt fetches and client construction
//! - `retry`: the escalation ladder (immediate, backoff, rotate)
//! - `agents`: browser fingerprints for anonymous requests
//! - `error`: transport error classification
//!
//! [`Transport::fetch`] is the only entry point the orchestrator uses. It
//! retries connectivity failures and timeouts up to the configured budget,
//! rotating the Tor identity on the third and later attempts when anonymity
//! is on. Non-2xx responses are returned as-is and never retried.

mod agents;
mod client;
mod error;
mod retry;

pub use agents::{anonymous_headers, random_user_agent, USER_AGENTS};
pub use client::{build_client, ClientOptions, FetchRequest, FetchResponse, HttpFetch, ReqwestFetch};
pub use error::{classify_reqwest_error, TransportError, TransportErrorKind};
pub use retry::{Escalation, RetryPolicy};

use crate::identity::{IdentityProvider, Rotation};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Counters for one transport over its lifetime
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransportStats {
    pub requests: u64,
    pub retries: u64,
    pub rotations: u64,
}

/// Fetches URLs with retry and identity rotation
pub struct Transport {
    fetcher: Arc<dyn HttpFetch>,
    identity: Option<Arc<dyn IdentityProvider>>,
    policy: RetryPolicy,
    max_body_bytes: u64,
    requests: AtomicU64,
    retries: AtomicU64,
    rotations: AtomicU64,
}

impl Transport {
    /// Creates a transport
    ///
    /// # Arguments
    ///
    /// * `fetcher` - Performs single request attempts
    /// * `identity` - Tor identity source; `None` means direct connections
    /// * `policy` - Retry budget and backoff
    /// * `max_body_bytes` - Responses larger than this fail
    pub fn new(
        fetcher: Arc<dyn HttpFetch>,
        identity: Option<Arc<dyn IdentityProvider>>,
        policy: RetryPolicy,
        max_body_bytes: u64,
    ) -> Self {
        Self {
            fetcher,
            identity,
            policy,
            max_body_bytes,
            requests: AtomicU64::new(0),
            retries: AtomicU64::new(0),
            rotations: AtomicU64::new(0),
        }
    }

    pub fn is_anonymous(&self) -> bool {
        self.identity.is_some()
    }

    pub fn stats(&self) -> TransportStats {
        TransportStats {
            requests: self.requests.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            rotations: self.rotations.load(Ordering::Relaxed),
        }
    }

    /// Fetches a URL, retrying per the policy
    ///
    /// # Returns
    ///
    /// * `Ok(FetchResponse)` - Any HTTP response, 2xx or not
    /// * `Err(TransportError)` - Every attempt failed, or an identity
    ///   rotation failed (no further attempt can be anonymous, so the
    ///   remaining budget is forfeited)
    pub async fn fetch(&self, url: &Url, timeout: Duration) -> Result<FetchResponse, TransportError> {
        let request = FetchRequest {
            url,
            timeout,
            max_body_bytes: self.max_body_bytes,
        };
        let mut last_error = None;
        // Generation the last failed attempt went out on
        let mut failed_generation = 0;

        for attempt in 1..=self.policy.max_attempts {
            if attempt > 1 {
                self.retries.fetch_add(1, Ordering::Relaxed);
            }

            match self.policy.escalation(attempt, self.is_anonymous()) {
                Escalation::Immediate => {}
                Escalation::Backoff(delay) => tokio::time::sleep(delay).await,
                Escalation::RotateIdentity => {
                    if let Some(provider) = &self.identity {
                        match provider.rotate_from(failed_generation).await {
                            Ok(Rotation::Rotated(identity)) => {
                                self.rotations.fetch_add(1, Ordering::Relaxed);
                                tracing::info!(
                                    "Rotated to identity generation {} for {}",
                                    identity.generation(),
                                    url
                                );
                            }
                            Ok(Rotation::Joined(identity)) => {
                                tracing::debug!(
                                    "Retrying {} on generation {} rotated by another worker",
                                    url,
                                    identity.generation()
                                );
                            }
                            Err(e) => {
                                tracing::warn!("Identity rotation failed for {}: {}", url, e);
                                return Err(TransportError::new(
                                    url,
                                    TransportErrorKind::Other(e.to_string()),
                                ));
                            }
                        }
                    }
                }
            }

            let identity = match &self.identity {
                Some(provider) => Some(provider.current().await),
                None => None,
            };

            self.requests.fetch_add(1, Ordering::Relaxed);
            match self.fetcher.fetch_once(identity.as_ref(), &request).await {
                Ok(response) => return Ok(response),
                Err(e) => {
                    failed_generation = identity.as_ref().map_or(0, |i| i.generation());
                    tracing::debug!(
                        "Attempt {}/{} for {} failed: {}",
                        attempt,
                        self.policy.max_attempts,
                        url,
                        e.kind
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            TransportError::new(url, TransportErrorKind::Other("no attempts made".to_string()))
        }))
    }
}
