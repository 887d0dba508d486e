//! # DevForge CLI
//!
//! Turns plain-English requests such as "get me docker" or "is port 8080
//! open" into actions executed by the DevForge service. The service is
//! started in the background on first use.
//!
//! ```text
//! devforge run "install java"
//! devforge run "write a python script that prints primes" -o primes.py
//! devforge logs -n 20 -f
//! ```

pub mod cli;
pub mod client;
pub mod error;
pub mod launcher;
pub mod output;
pub mod selection;
pub mod version;

pub use client::ServiceClient;
pub use error::{CliError, ExitCode, Result};
pub use selection::{NonInteractive, SelectionPrompt, TerminalPrompt};
pub use version::VersionInfo;
