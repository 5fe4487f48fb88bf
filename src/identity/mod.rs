//! Anonymity overlay identities
//!
//! An [`Identity`] is one Tor path: a SOCKS route plus the connection pool
//! bound to it. Workers only ever see the current identity; rotating asks Tor
//! for fresh circuits and publishes the next generation. Requests already in
//! flight on an older generation are left to finish on their own.
//!
//! When anonymity is disabled there is no provider at all and the transport
//! talks to targets directly.

mod control;
mod launch;
mod tor;

pub use control::{AuthInfo, TorController};
pub use launch::{launch_tor, check_socks, TorProcess};
pub use tor::TorIdentityProvider;

use async_trait::async_trait;
use reqwest::Client;
use std::fmt;
use thiserror::Error;

/// Raised when no anonymity path can be established or renewed
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("anonymity overlay unavailable: {reason}")]
pub struct IdentityUnavailable {
    pub reason: String,
}

impl IdentityUnavailable {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// An opaque anonymity-overlay session
///
/// Cloning is cheap; the underlying connection pool is shared.
#[derive(Clone)]
pub struct Identity {
    generation: u64,
    client: Client,
}

impl Identity {
    /// Wraps a client that routes through one overlay path
    pub fn new(generation: u64, client: Client) -> Self {
        Self { generation, client }
    }

    /// Monotonically increasing rotation counter, starting at 1
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn client(&self) -> &Client {
        &self.client
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

/// Source of anonymity-overlay identities
///
/// Implementations must serialize `rotate` so that concurrent callers never
/// observe the generation counter going backwards.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Returns the identity new requests should use
    async fn current(&self) -> Identity;

    /// Tears down the current path and returns the next generation
    async fn rotate(&self) -> Result<Identity, IdentityUnavailable>;

    /// Rotates only if `seen` is still the live generation
    ///
    /// `seen` is the generation a failed request used. When another caller
    /// has already moved past it, the newer identity is returned without a
    /// second rotation.
    async fn rotate_from(&self, seen: u64) -> Result<Rotation, IdentityUnavailable> {
        let current = self.current().await;
        if current.generation() > seen {
            return Ok(Rotation::Joined(current));
        }
        self.rotate().await.map(Rotation::Rotated)
    }
}

/// Outcome of [`IdentityProvider::rotate_from`]
#[derive(Debug, Clone)]
pub enum Rotation {
    /// This call built the new generation
    Rotated(Identity),
    /// Another caller already rotated past the failed generation
    Joined(Identity),
}

