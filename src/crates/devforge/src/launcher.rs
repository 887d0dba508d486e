//! Starts a local service when none is answering

use crate::client::ServiceClient;
use crate::error::{CliError, Result};
use devforge_core::DevforgeConfig;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use tracing::{debug, info};

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Make sure the service behind `client` is up, spawning `devforge serve` if allowed
///
/// A service named by an explicit URL is never spawned.
pub async fn ensure_running(client: &ServiceClient, config: &DevforgeConfig) -> Result<()> {
    let may_start = config.client.auto_start && config.client.server_url.is_none();
    match client.health().await {
        Ok(health) => {
            debug!(version = %health.version, url = client.base_url(), "Service is up");
            return Ok(());
        }
        Err(CliError::ServiceUnavailable { url, reason }) if !may_start => {
            return Err(CliError::ServiceUnavailable { url, reason });
        }
        Err(CliError::ServiceUnavailable { .. }) => {}
        Err(e) => return Err(e),
    }

    spawn_service(config)?;
    wait_until_ready(client, Duration::from_secs(config.client.startup_timeout_secs)).await
}

fn spawn_service(config: &DevforgeConfig) -> Result<()> {
    let exe = std::env::current_exe()?;
    info!(
        host = %config.server.host,
        port = config.server.port,
        "Starting DevForge service in the background"
    );
    Command::new(exe)
        .arg("serve")
        .arg("--host")
        .arg(&config.server.host)
        .arg("--port")
        .arg(config.server.port.to_string())
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;
    Ok(())
}

/// Poll `/health` until it answers or `timeout` elapses
pub async fn wait_until_ready(client: &ServiceClient, timeout: Duration) -> Result<()> {
    let started = Instant::now();
    loop {
        if client.health().await.is_ok() {
            debug!(elapsed_ms = started.elapsed().as_millis() as u64, "Service ready");
            return Ok(());
        }
        if started.elapsed() >= timeout {
            return Err(CliError::StartupTimeout {
                url: client.base_url().to_string(),
                secs: timeout.as_secs(),
            });
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}
