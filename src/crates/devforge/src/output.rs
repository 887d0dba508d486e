//! Terminal rendering of service responses

use colored::Colorize;
use devforge_core::{ResponseEnvelope, Status};
use serde_json::Value;
use std::path::Path;
use tabled::builder::Builder;
use tabled::settings::Style;

/// Print the outcome line and, when verbose, the raw data
pub fn print_envelope(envelope: &ResponseEnvelope, verbose: bool) {
    let line = match envelope.status {
        Status::Success => format!("✓ {}", envelope.message).green().bold(),
        Status::NotFound => format!("✗ {}", envelope.message).yellow().bold(),
        Status::Ambiguous => format!("? {}", envelope.message).cyan().bold(),
        Status::Error => format!("✗ {}", envelope.message).red().bold(),
    };
    println!("{}", line);

    if let Some(data) = &envelope.data {
        if let Some(output) = data.get("output").and_then(Value::as_str).filter(|s| !s.trim().is_empty()) {
            println!("{}", output.trim_end());
        }
        if verbose {
            if let Ok(pretty) = serde_json::to_string_pretty(data) {
                println!("{}", pretty.dimmed());
            }
        }
    }
}

/// Code carried by a `generate_code` result
pub fn generated_code(envelope: &ResponseEnvelope) -> Option<&str> {
    envelope.data.as_ref()?.get("code")?.as_str()
}

/// Write generated code to `path` or print it framed on stdout
pub fn emit_code(code: &str, path: Option<&Path>) -> std::io::Result<()> {
    match path {
        Some(path) => {
            std::fs::write(path, code)?;
            println!("{}", format!("Code written to {}", path.display()).green());
        }
        None => {
            println!("{}", "--- Generated Code ---".green().bold());
            println!("{}", code.trim_end());
            println!("{}", "----------------------".green().bold());
        }
    }
    Ok(())
}

/// Two-column key/value table without a header
pub fn key_value_table<'a>(rows: impl IntoIterator<Item = (&'a str, String)>) -> String {
    let mut builder = Builder::default();
    for (key, value) in rows {
        builder.push_record([key.to_string(), value]);
    }
    let mut table = builder.build();
    table.with(Style::blank());
    table.to_string()
}
