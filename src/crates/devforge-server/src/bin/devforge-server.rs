//! DevForge service binary
//!
//! Usage: devforge-server [--host HOST] [--port PORT] [-v]
//!
//! Configuration comes from `~/.devforge/devforge.toml`,
//! `./.devforge/devforge.toml` and `DEVFORGE_*` variables. Flags win.

use anyhow::Context;
use devforge_core::{logging, ConfigLoader};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let verbose = args.iter().any(|a| a == "-v" || a == "--verbose");
    logging::init_tracing(verbose);

    let mut config = ConfigLoader::new()
        .load()
        .await
        .context("Failed to load configuration")?;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--host" => {
                if let Some(host) = iter.next() {
                    config.server.host = host.clone();
                }
            }
            "--port" => {
                if let Some(port) = iter.next() {
                    config.server.port = port.parse().with_context(|| format!("Invalid port: {}", port))?;
                }
            }
            _ => {}
        }
    }

    tracing::info!(
        version = devforge_server::version::VERSION,
        address = %config.server.bind_address(),
        "Starting DevForge service"
    );
    devforge_server::run(&config).await
}
