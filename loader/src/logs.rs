//! Load progress reporting.
//!
//! Every entry is echoed to stderr (stdout is reserved for command output such
//! as DDL and stats) and published on a broadcast channel, so an embedding
//! application can follow a load as it happens:
//!
//! ```text
//!   Wordlist-metadata.json: 2 tables
//!    ✓ FormTable: 2 rows
//!    ✓ LanguageTable: 2 rows
//! ✓ Loaded 2 tables
//! ```

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Entries kept for subscribers that fall behind.
const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl LogLevel {
    fn marker(self) -> &'static str {
        match self {
            LogLevel::Info => " ",
            LogLevel::Success => "✓",
            LogLevel::Warning => "!",
            LogLevel::Error => "✗",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    /// Canonical name of the table the entry is about, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
}

impl LogEntry {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            table: None,
        }
    }

    pub fn for_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }
}

/// Table entries are nested one level below dataset entries.
impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.table {
            Some(table) => write!(f, "   {} {}: {}", self.level.marker(), table, self.message),
            None => write!(f, "{} {}", self.level.marker(), self.message),
        }
    }
}

/// Process-wide logger used by the `log_*` helpers.
pub static LOGGER: Lazy<LoadLogger> = Lazy::new(LoadLogger::new);

pub struct LoadLogger {
    sender: broadcast::Sender<LogEntry>,
    quiet: AtomicBool,
}

impl LoadLogger {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            sender,
            quiet: AtomicBool::new(false),
        }
    }

    pub fn log(&self, entry: LogEntry) {
        if !self.quiet.load(Ordering::Relaxed) {
            eprintln!("{}", entry);
        }
        // Sending fails only when nobody subscribed.
        let _ = self.sender.send(entry);
    }

    /// Stop echoing to stderr. Subscribers still receive every entry.
    pub fn set_quiet(&self, quiet: bool) {
        self.quiet.store(quiet, Ordering::Relaxed);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.sender.subscribe()
    }
}

impl Default for LoadLogger {
    fn default() -> Self {
        Self::new()
    }
}

pub fn log_info(msg: impl Into<String>) {
    LOGGER.log(LogEntry::new(LogLevel::Info, msg));
}

pub fn log_success(msg: impl Into<String>) {
    LOGGER.log(LogEntry::new(LogLevel::Success, msg));
}

pub fn log_warning(msg: impl Into<String>) {
    LOGGER.log(LogEntry::new(LogLevel::Warning, msg));
}

pub fn log_error(msg: impl Into<String>) {
    LOGGER.log(LogEntry::new(LogLevel::Error, msg));
}

/// Log an entry about one table.
pub fn log_table(level: LogLevel, table: &str, msg: impl Into<String>) {
    LOGGER.log(LogEntry::new(level, msg).for_table(table));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let entry = LogEntry::new(LogLevel::Success, "2 rows").for_table("FormTable");
        assert_eq!(entry.to_string(), "   ✓ FormTable: 2 rows");
        assert_eq!(LogEntry::new(LogLevel::Warning, "empty").to_string(), "! empty");
        assert_eq!(LogEntry::new(LogLevel::Error, "rolled back").to_string(), "✗ rolled back");
    }

    #[test]
    fn test_subscriber_receives_quiet_entries() {
        let logger = LoadLogger::new();
        logger.set_quiet(true);
        let mut rx = logger.subscribe();
        logger.log(LogEntry::new(LogLevel::Info, "3 rows").for_table("ValueTable"));
        let entry = rx.try_recv().unwrap();
        assert_eq!(entry.level, LogLevel::Info);
        assert_eq!(entry.table.as_deref(), Some("ValueTable"));
    }

    #[test]
    fn test_entry_json() {
        let entry = LogEntry::new(LogLevel::Warning, "no rows").for_table("CognateTable");
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["level"], "warning");
        assert_eq!(json["table"], "CognateTable");
        assert_eq!(serde_json::to_value(LogLevel::Error).unwrap(), "error");
        let plain = serde_json::to_value(LogEntry::new(LogLevel::Info, "x")).unwrap();
        assert!(plain.get("table").is_none());
    }
}
