use crate::config::AnonymityConfig;
use crate::identity::{
    check_socks, Identity, IdentityProvider, IdentityUnavailable, Rotation, TorController,
};
use crate::transport::{build_client, ClientOptions};
use async_trait::async_trait;
use reqwest::Proxy;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};

/// Identities backed by a Tor daemon
///
/// Each generation gets its own SOCKS credentials. With Tor's default
/// `IsolateSOCKSAuth` that alone puts the generation on separate circuits;
/// `SIGNAL NEWNYM` additionally retires every circuit built so far. A new
/// reqwest client per generation makes sure no pooled connection from the
/// previous path is reused.
pub struct TorIdentityProvider {
    socks_endpoint: String,
    controller: TorController,
    settle: Duration,
    options: ClientOptions,
    current: RwLock<Identity>,
    rotation: Mutex<()>,
}

impl TorIdentityProvider {
    /// Verifies Tor is reachable and builds the first identity
    ///
    /// # Errors
    ///
    /// Returns `IdentityUnavailable` if nothing listens on the SOCKS endpoint
    /// or the client cannot be built.
    pub async fn connect(
        config: &AnonymityConfig,
        options: ClientOptions,
    ) -> Result<Self, IdentityUnavailable> {
        check_socks(&config.socks_endpoint).await?;

        let first = build_identity(&config.socks_endpoint, &options, 1)?;
        tracing::info!("Routing through Tor at {}", config.socks_endpoint);

        Ok(Self {
            socks_endpoint: config.socks_endpoint.clone(),
            controller: TorController::new(
                config.control_endpoint.clone(),
                config.control_password.clone(),
            ),
            settle: config.newnym_settle(),
            options,
            current: RwLock::new(first),
            rotation: Mutex::new(()),
        })
    }

    /// Caller holds the rotation gate
    async fn rotate_locked(&self) -> Result<Identity, IdentityUnavailable> {
        let previous = self.current.read().await.generation();
        self.controller.signal_newnym().await?;

        // Tor rate-limits NEWNYM and needs a moment to build fresh circuits
        tokio::time::sleep(self.settle).await;

        let next = build_identity(&self.socks_endpoint, &self.options, previous + 1)?;
        *self.current.write().await = next.clone();

        tracing::info!("Tor identity rotated: generation {} -> {}", previous, next.generation());
        Ok(next)
    }
}

#[async_trait]
impl IdentityProvider for TorIdentityProvider {
    async fn current(&self) -> Identity {
        self.current.read().await.clone()
    }

    async fn rotate(&self) -> Result<Identity, IdentityUnavailable> {
        let _gate = self.rotation.lock().await;
        self.rotate_locked().await
    }

    async fn rotate_from(&self, seen: u64) -> Result<Rotation, IdentityUnavailable> {
        let _gate = self.rotation.lock().await;

        let current = self.current.read().await.clone();
        if current.generation() > seen {
            tracing::debug!(
                "Generation {} already replaced by {}",
                seen,
                current.generation()
            );
            return Ok(Rotation::Joined(current));
        }
        self.rotate_locked().await.map(Rotation::Rotated)
    }
}

/// SOCKS5 URL with per-generation credentials; `socks5h` keeps DNS inside Tor
fn proxy_url(socks_endpoint: &str, generation: u64) -> String {
    format!("socks5h://docscoop-{0}:{0}@{1}", generation, socks_endpoint)
}

fn build_identity(
    socks_endpoint: &str,
    options: &ClientOptions,
    generation: u64,
) -> Result<Identity, IdentityUnavailable> {
    let proxy = Proxy::all(proxy_url(socks_endpoint, generation))
        .map_err(|e| IdentityUnavailable::new(format!("invalid SOCKS proxy: {}", e)))?;
    let client = build_client(options, Some(proxy))
        .map_err(|e| IdentityUnavailable::new(format!("cannot build Tor client: {}", e)))?;
    Ok(Identity::new(generation, client))
}
