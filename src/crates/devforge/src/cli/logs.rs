//! `devforge logs [-n N] [-f]`

use crate::client::ServiceClient;
use crate::error::Result;
use colored::{ColoredString, Colorize};
use devforge_server::{LogEntry, LogLevel};
use std::time::Duration;
use tabled::{Table, Tabled};

const FOLLOW_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Tabled)]
struct LogRow {
    #[tabled(rename = "Timestamp")]
    timestamp: String,
    #[tabled(rename = "Level")]
    level: String,
    #[tabled(rename = "Message")]
    message: String,
}

fn level_label(level: LogLevel) -> ColoredString {
    match level {
        LogLevel::Info => level.to_string().green(),
        LogLevel::Warn => level.to_string().yellow(),
        LogLevel::Error => level.to_string().red(),
    }
}

pub fn log_table(entries: &[LogEntry]) -> String {
    let rows: Vec<LogRow> = entries
        .iter()
        .map(|e| LogRow {
            timestamp: e.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            level: e.level.to_string(),
            message: e.message.clone(),
        })
        .collect();
    Table::new(rows).to_string()
}

pub async fn handle_logs(client: &ServiceClient, lines: usize, follow: bool) -> Result<()> {
    let entries = client.logs(lines, None).await?;
    if entries.is_empty() {
        println!("{}", "No logs available yet. Try running a command first.".yellow());
    } else {
        println!("{}", format!("Service log (last {} entries)", entries.len()).bold());
        println!("{}", log_table(&entries));
    }

    if !follow {
        return Ok(());
    }

    println!("{}", "Following log output, press Ctrl+C to stop".yellow());
    let mut last_seq = entries.last().map(|e| e.seq);
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!("\n{}", "Stopped following logs".yellow());
                return Ok(());
            }
            _ = tokio::time::sleep(FOLLOW_INTERVAL) => {}
        }

        for entry in client.logs(lines.max(1), last_seq).await? {
            println!(
                "[{}] {} {}",
                entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
                level_label(entry.level),
                entry.message
            );
            last_seq = Some(entry.seq);
        }
    }
}
