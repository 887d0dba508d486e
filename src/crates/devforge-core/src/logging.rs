//! Logging helpers
//!
//! Structured logging goes through `tracing`. Binaries call [`init_tracing`]
//! once; library code only emits events.

use regex::Regex;
use std::sync::OnceLock;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is unset
pub fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        "devforge=debug,devforge_core=debug,devforge_server=debug,llm=debug,tower_http=debug"
    } else {
        "devforge=info,devforge_core=info,devforge_server=info,llm=warn,tower_http=info"
    }
}

/// Install a global `fmt` subscriber. `RUST_LOG` wins over `verbose`.
///
/// Safe to call more than once; later calls are ignored.
pub fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter(verbose)));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbose)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Whether an environment variable name looks like it holds a secret
pub fn is_secret_key(name: &str) -> bool {
    let upper = name.to_ascii_uppercase();
    ["KEY", "TOKEN", "SECRET", "PASSWORD", "PASSWD", "CREDENTIAL", "PAT"]
        .iter()
        .any(|marker| upper.split(|c: char| !c.is_ascii_alphanumeric()).any(|part| part == *marker))
}

fn secret_patterns() -> &'static [(Regex, &'static str)] {
    static PATTERNS: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            (r"(?i)(api[\s_-]?key|apikey)\s*[:=]\s*\S+", "$1: [REDACTED]"),
            (r"(?i)(password|passwd|pwd)\s*[:=]\s*\S+", "$1: [REDACTED]"),
            (r"(?i)(token|pat)\s*[:=]\s*\S+", "$1: [REDACTED]"),
            (r"(?i)(secret)\s*[:=]\s*\S+", "$1: [REDACTED]"),
            (r"(?i)(authorization|auth)\s*:\s*(bearer|token)\s+\S+", "$1: $2 [REDACTED]"),
            (r"\b(sk-[A-Za-z0-9_-]{8,}|gh[pousr]_[A-Za-z0-9]{16,})", "[REDACTED]"),
        ]
        .into_iter()
        .filter_map(|(pattern, replacement)| Regex::new(pattern).ok().map(|re| (re, replacement)))
        .collect()
    })
}

/// Redact credentials from text before it is logged or stored
pub fn redact_secrets(input: &str) -> String {
    secret_patterns()
        .iter()
        .fold(input.to_string(), |acc, (re, replacement)| {
            re.replace_all(&acc, *replacement).to_string()
        })
}

/// Format duration in human-readable form
pub fn format_duration(duration: Duration) -> String {
    let micros = duration.as_micros();
    if micros < 1_000 {
        format!("{}μs", micros)
    } else if micros < 1_000_000 {
        format!("{}ms", duration.as_millis())
    } else if duration.as_secs() < 60 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        format!("{}m{}s", duration.as_secs() / 60, duration.as_secs() % 60)
    }
}
