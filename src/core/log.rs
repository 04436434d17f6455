//! Append-only processing log handed back to whoever drives a run.
//!
//! Every entry is mirrored to `tracing`, so the same events show up on stderr
//! and in the `processing.log` the `process` command writes.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub scope: String,
    pub message: String,
}

impl LogEntry {
    pub fn render(&self) -> String {
        format!(
            "[{}] {} {}: {}",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            self.level.as_str(),
            self.scope,
            self.message
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProcessingLog {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl ProcessingLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn info(&self, scope: &str, message: impl Into<String>) {
        self.push(LogLevel::Info, scope, message.into());
    }

    pub fn warn(&self, scope: &str, message: impl Into<String>) {
        self.push(LogLevel::Warn, scope, message.into());
    }

    pub fn error(&self, scope: &str, message: impl Into<String>) {
        self.push(LogLevel::Error, scope, message.into());
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Whole log as newline-terminated lines.
    pub fn render(&self) -> String {
        self.lock()
            .iter()
            .map(|entry| format!("{}\n", entry.render()))
            .collect()
    }

    fn push(&self, level: LogLevel, scope: &str, message: String) {
        match level {
            LogLevel::Info => tracing::info!(scope, "{message}"),
            LogLevel::Warn => tracing::warn!(scope, "{message}"),
            LogLevel::Error => tracing::error!(scope, "{message}"),
        }
        self.lock().push(LogEntry {
            timestamp: Utc::now(),
            level,
            scope: scope.to_string(),
            message,
        });
    }

    fn lock(&self) -> MutexGuard<'_, Vec<LogEntry>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
