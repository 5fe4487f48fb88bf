//! Starting and probing the local Tor daemon

use crate::config::AnonymityConfig;
use crate::identity::IdentityUnavailable;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;
use tokio::process::{Child, Command};
use tokio::time::{timeout, Instant};

const SOCKS_CHECK_TIMEOUT: Duration = Duration::from_secs(2);

/// Checks that something accepts TCP connections on the SOCKS endpoint
pub async fn check_socks(endpoint: &str) -> Result<(), IdentityUnavailable> {
    match timeout(SOCKS_CHECK_TIMEOUT, TcpStream::connect(endpoint)).await {
        Ok(Ok(_)) => Ok(()),
        Ok(Err(e)) => Err(IdentityUnavailable::new(format!(
            "Tor SOCKS proxy not reachable at {}: {}",
            endpoint, e
        ))),
        Err(_) => Err(IdentityUnavailable::new(format!(
            "timed out probing Tor SOCKS proxy at {}",
            endpoint
        ))),
    }
}

/// A Tor daemon spawned by this process
///
/// The child is killed when this handle is dropped.
#[derive(Debug)]
pub struct TorProcess {
    child: Child,
}

impl TorProcess {
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Stops the daemon and waits for it to exit
    pub async fn shutdown(mut self) {
        if let Err(e) = self.child.kill().await {
            tracing::warn!("Failed to stop Tor: {}", e);
        } else {
            tracing::info!("Tor process stopped");
        }
    }
}

/// Spawns `tor` and waits until it reports a complete bootstrap
///
/// The daemon listens on the configured SOCKS and control endpoints with
/// cookie authentication enabled. Its stdout keeps being drained into the
/// debug log after bootstrap so the pipe never fills.
///
/// # Errors
///
/// Returns `IdentityUnavailable` if the binary cannot be started, exits
/// early, or does not reach 100% within the bootstrap timeout.
pub async fn launch_tor(config: &AnonymityConfig) -> Result<TorProcess, IdentityUnavailable> {
    let socks_port = port_of(&config.socks_endpoint)?;
    let control_port = port_of(&config.control_endpoint)?;

    let mut command = Command::new(&config.tor_binary);
    command
        .arg("--SocksPort")
        .arg(socks_port)
        .arg("--ControlPort")
        .arg(control_port)
        .arg("--CookieAuthentication")
        .arg("1")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true);

    if let Some(dir) = config.resolved_data_directory() {
        tokio::fs::create_dir_all(&dir).await.map_err(|e| {
            IdentityUnavailable::new(format!(
                "cannot create Tor data directory {}: {}",
                dir.display(),
                e
            ))
        })?;
        command.arg("--DataDirectory").arg(dir);
    }

    tracing::info!("Launching Tor ({})", config.tor_binary);

    let mut child = command.spawn().map_err(|e| {
        IdentityUnavailable::new(format!("cannot start {}: {}", config.tor_binary, e))
    })?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| IdentityUnavailable::new("Tor stdout was not captured"))?;
    let mut lines = BufReader::new(stdout).lines();

    let deadline = Instant::now() + config.bootstrap_timeout();

    loop {
        let line = match tokio::time::timeout_at(deadline, lines.next_line()).await {
            Err(_) => {
                return Err(IdentityUnavailable::new(format!(
                    "Tor did not bootstrap within {}s",
                    config.bootstrap_timeout_secs
                )))
            }
            Ok(Err(e)) => {
                return Err(IdentityUnavailable::new(format!(
                    "failed reading Tor output: {}",
                    e
                )))
            }
            Ok(Ok(None)) => {
                return Err(IdentityUnavailable::new(
                    "Tor exited before finishing bootstrap",
                ))
            }
            Ok(Ok(Some(line))) => line,
        };

        if let Some(progress) = bootstrap_progress(&line) {
            tracing::info!("Tor bootstrap: {}", progress);
            if progress.starts_with("100%") {
                break;
            }
        } else {
            tracing::debug!("tor: {}", line);
        }
    }

    tokio::spawn(async move {
        while let Ok(Some(line)) = lines.next_line().await {
            tracing::debug!("tor: {}", line);
        }
    });

    Ok(TorProcess { child })
}

/// Returns the text after `Bootstrapped ` if the log line reports progress
fn bootstrap_progress(line: &str) -> Option<&str> {
    line.find("Bootstrapped ")
        .map(|idx| line[idx + "Bootstrapped ".len()..].trim())
}

fn port_of(endpoint: &str) -> Result<&str, IdentityUnavailable> {
    endpoint
        .rsplit_once(':')
        .map(|(_, port)| port)
        .filter(|port| port.parse::<u16>().is_ok())
        .ok_or_else(|| IdentityUnavailable::new(format!("no port in endpoint {}", endpoint)))
}
