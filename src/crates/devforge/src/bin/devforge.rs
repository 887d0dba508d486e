//! DevForge CLI
//!
//! Main entry point for the devforge command-line tool.

use clap::{Parser, Subcommand};
use colored::Colorize;
use devforge::cli::{self, RunOptions};
use devforge::{launcher, CliError, ExitCode, ServiceClient, TerminalPrompt, VersionInfo};
use devforge_core::{logging, ConfigLoader, DevforgeConfig};
use llm::CommandParser;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "devforge")]
#[command(about = "DevForge - AI-powered development assistant. Just type what you want!", long_about = None)]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Service URL (defaults to the configured host and port)
    #[arg(long, global = true, env = "DEVFORGE_SERVER_URL")]
    server: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a request in plain English, e.g. "get me docker" or "remove node"
    Run {
        /// The request
        text: String,
        /// Output file for generated code
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Start the DevForge service in the foreground
    Serve {
        /// Address to bind
        #[arg(long)]
        host: Option<String>,
        /// Port to bind
        #[arg(long)]
        port: Option<u16>,
    },

    /// Show service logs
    Logs {
        /// Number of log lines to show
        #[arg(short = 'n', long, default_value_t = 50)]
        lines: usize,
        /// Follow log output
        #[arg(short, long)]
        follow: bool,
    },

    /// Show information about the host the service runs on
    Info,

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() {
    let args = Cli::parse();
    logging::init_tracing(args.verbose);

    let code = match execute(args).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}", format!("✗ {}", e).red().bold());
            if let Some(hint) = e.hint() {
                eprintln!("  {}", hint.yellow());
            }
            e.exit_code()
        }
    };
    std::process::exit(code.code());
}

async fn execute(args: Cli) -> Result<ExitCode, CliError> {
    if let Commands::Version = args.command {
        println!("{}", VersionInfo::get());
        return Ok(ExitCode::Success);
    }

    let mut config = ConfigLoader::new().load().await?;
    if let Some(server) = &args.server {
        config.client.server_url = Some(server.clone());
    }

    match args.command {
        Commands::Run { text, output } => {
            // Credential problems surface before any service call
            let parser = CommandParser::from_settings(&config.llm)?;
            let client = connect(&config).await?;
            let options = RunOptions {
                output,
                verbose: args.verbose,
            };
            cli::handle_run(&parser, &client, &TerminalPrompt, &text, &options).await
        }
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            devforge_server::run(&config)
                .await
                .map_err(|e| CliError::Serve(format!("{:#}", e)))?;
            Ok(ExitCode::Success)
        }
        Commands::Logs { lines, follow } => {
            let client = connect(&config).await?;
            cli::handle_logs(&client, lines, follow).await?;
            Ok(ExitCode::Success)
        }
        Commands::Info => {
            let client = connect(&config).await?;
            cli::print_info(&client.system_info().await?);
            Ok(ExitCode::Success)
        }
        Commands::Version => Ok(ExitCode::Success),
    }
}

/// Client for the configured service, started on demand
async fn connect(config: &DevforgeConfig) -> Result<ServiceClient, CliError> {
    let client = ServiceClient::new(
        config.server_url(),
        Duration::from_secs(config.client.request_timeout_secs),
    )?;
    launcher::ensure_running(&client, config).await?;
    Ok(client)
}
