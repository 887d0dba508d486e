//! In-memory request log
//!
//! Bounded ring buffer of the service's recent activity, served by
//! `GET /api/v1/logs`. Nothing is persisted.

use chrono::{DateTime, Utc};
use devforge_core::logging::redact_secrets;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

/// Default number of retained entries
pub const DEFAULT_LOG_CAPACITY: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warn => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Monotonic sequence number, used by followers
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:5} {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.level.to_string(),
            self.message
        )
    }
}

struct Inner {
    entries: VecDeque<LogEntry>,
    next_seq: u64,
}

pub struct ServerLog {
    inner: Mutex<Inner>,
    capacity: usize,
}

impl ServerLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Mutex::new(Inner {
                entries: VecDeque::with_capacity(capacity),
                next_seq: 1,
            }),
            capacity,
        }
    }

    /// Append an entry. Credentials are redacted first.
    pub fn record(&self, level: LogLevel, message: impl AsRef<str>) {
        let message = redact_secrets(message.as_ref());
        let mut inner = self.inner.lock();
        let seq = inner.next_seq;
        inner.next_seq += 1;
        if inner.entries.len() == self.capacity {
            inner.entries.pop_front();
        }
        inner.entries.push_back(LogEntry {
            seq,
            timestamp: Utc::now(),
            level,
            message,
        });
    }

    pub fn info(&self, message: impl AsRef<str>) {
        self.record(LogLevel::Info, message);
    }

    pub fn warn(&self, message: impl AsRef<str>) {
        self.record(LogLevel::Warn, message);
    }

    pub fn error(&self, message: impl AsRef<str>) {
        self.record(LogLevel::Error, message);
    }

    /// Last `lines` entries, oldest first, optionally only those after `since`
    pub fn tail(&self, lines: usize, since: Option<u64>) -> Vec<LogEntry> {
        let inner = self.inner.lock();
        let matching: Vec<&LogEntry> = inner
            .entries
            .iter()
            .filter(|e| since.map_or(true, |s| e.seq > s))
            .collect();
        let skip = matching.len().saturating_sub(lines);
        matching.into_iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ServerLog {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_buffer_drops_oldest() {
        let log = ServerLog::new(3);
        for i in 0..5 {
            log.info(format!("entry {}", i));
        }
        let tail = log.tail(10, None);
        assert_eq!(tail.len(), 3);
        assert_eq!(tail[0].message, "entry 2");
        assert_eq!(tail[2].seq, 5);
    }

    #[test]
    fn test_tail_limits_and_since() {
        let log = ServerLog::default();
        for i in 0..10 {
            log.info(format!("entry {}", i));
        }
        assert_eq!(log.tail(2, None)[0].message, "entry 8");
        let after = log.tail(100, Some(7));
        assert_eq!(after.len(), 3);
        assert_eq!(after[0].seq, 8);
    }

    #[test]
    fn test_secrets_redacted() {
        let log = ServerLog::default();
        log.warn("token=ghp_abcdefghijklmnopqrstuv failed");
        assert!(!log.tail(1, None)[0].message.contains("ghp_abcdefghijklmnopqrstuv"));
    }
}
