//! Settings type definitions.
//!
//! Every section uses `#[serde(rename_all = "camelCase", default)]`, so a
//! settings file may name any subset of fields; the rest keep their compiled
//! defaults.

use serde::{Deserialize, Serialize};

/// Default maximum database size hint, in KiB (2 GiB).
pub const DEFAULT_MAX_SIZE_KIB: u64 = 2_097_152;

/// Default busy timeout for each connection, in milliseconds.
pub const DEFAULT_BUSY_TIMEOUT_MS: u32 = 5_000;

/// Root settings type.
///
/// ```json
/// {
///   "database": { "busyTimeoutMs": 10000, "journalMode": "delete" },
///   "logging": { "level": "debug" }
/// }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StructDbSettings {
    /// Database file and connection settings.
    pub database: DatabaseSettings,
    /// Background worker settings.
    pub worker: WorkerSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

/// `SQLite` journal mode applied to every new connection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JournalMode {
    /// Write-ahead log.
    #[default]
    Wal,
    /// Rollback journal deleted after each transaction.
    Delete,
    /// Rollback journal truncated after each transaction.
    Truncate,
    /// Rollback journal kept in memory.
    Memory,
}

impl JournalMode {
    /// Value for `PRAGMA journal_mode`.
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
            Self::Truncate => "truncate",
            Self::Memory => "memory",
        }
    }

    /// Parse a pragma value, case-insensitively.
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "wal" => Some(Self::Wal),
            "delete" => Some(Self::Delete),
            "truncate" => Some(Self::Truncate),
            "memory" => Some(Self::Memory),
            _ => None,
        }
    }
}

/// Database file and connection settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DatabaseSettings {
    /// Default database path, used when a caller does not supply one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Maximum size hint in KiB. Not enforced; eviction is explicit.
    pub max_size_kib: u64,
    /// Busy timeout for each connection, in milliseconds.
    pub busy_timeout_ms: u32,
    /// Journal mode for each connection.
    pub journal_mode: JournalMode,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: None,
            max_size_kib: DEFAULT_MAX_SIZE_KIB,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: JournalMode::Wal,
        }
    }
}

/// Background worker settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkerSettings {
    /// OS thread name of the worker.
    pub thread_name: String,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            thread_name: "structdb-worker".to_string(),
        }
    }
}

/// Logging configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default level directive when `RUST_LOG` is unset.
    pub level: String,
    /// Emit JSON lines instead of compact text.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let s = StructDbSettings::default();
        assert_eq!(s.database.path, None);
        assert_eq!(s.database.max_size_kib, 2_097_152);
        assert_eq!(s.database.busy_timeout_ms, 5_000);
        assert_eq!(s.database.journal_mode, JournalMode::Wal);
        assert_eq!(s.worker.thread_name, "structdb-worker");
        assert_eq!(s.logging.level, "info");
        assert!(!s.logging.json);
    }

    #[test]
    fn json_field_names_are_camel_case() {
        let json = serde_json::to_value(StructDbSettings::default()).unwrap();
        let db = json.get("database").unwrap();
        assert!(db.get("maxSizeKib").is_some());
        assert!(db.get("busyTimeoutMs").is_some());
        assert_eq!(db["journalMode"], "wal");
        assert!(db.get("path").is_none());
        assert!(json["worker"].get("threadName").is_some());
    }

    #[test]
    fn empty_json_produces_defaults() {
        let s: StructDbSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(s, StructDbSettings::default());
    }

    #[test]
    fn partial_json_overrides() {
        let s: StructDbSettings = serde_json::from_value(serde_json::json!({
            "database": { "journalMode": "truncate", "path": "/tmp/a.db" },
            "logging": { "json": true }
        }))
        .unwrap();
        assert_eq!(s.database.journal_mode, JournalMode::Truncate);
        assert_eq!(s.database.path.as_deref(), Some("/tmp/a.db"));
        assert_eq!(s.database.busy_timeout_ms, 5_000);
        assert!(s.logging.json);
        assert_eq!(s.logging.level, "info");
    }

    #[test]
    fn journal_mode_parse() {
        assert_eq!(JournalMode::parse("WAL"), Some(JournalMode::Wal));
        assert_eq!(JournalMode::parse("memory"), Some(JournalMode::Memory));
        assert_eq!(JournalMode::parse("off"), None);
        for mode in [
            JournalMode::Wal,
            JournalMode::Delete,
            JournalMode::Truncate,
            JournalMode::Memory,
        ] {
            assert_eq!(JournalMode::parse(mode.pragma_value()), Some(mode));
        }
    }
}
