//! Error types for the store subsystem.
//!
//! [`StoreError`] is returned by every `try_*` operation. The plain
//! operations (`add`, `read`, `update`, ...) fail closed instead: they log
//! the error and return `false`, an empty sequence, or a negative sentinel.

use structdb_core::DecodeError;
use thiserror::Error;

/// Disagreement between an existing file and the declared table list.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SchemaMismatch {
    /// The file holds a different number of tables.
    #[error("expected {expected} tables, found {found}")]
    TableCount {
        /// Declared table count.
        expected: usize,
        /// Tables present in the file.
        found: usize,
    },

    /// A declared table is absent.
    #[error("table {table} is missing")]
    MissingTable {
        /// Expected table name.
        table: String,
    },

    /// A table has a different number of columns.
    #[error("{table}: expected {expected} columns, found {found}")]
    ColumnCount {
        /// Table name.
        table: String,
        /// Declared column count.
        expected: usize,
        /// Columns present in the file.
        found: usize,
    },

    /// A column has a different name at the same position.
    #[error("{table} column {index}: expected {expected}, found {found}")]
    ColumnName {
        /// Table name.
        table: String,
        /// Column position.
        index: usize,
        /// Derived column name.
        expected: String,
        /// Column name in the file.
        found: String,
    },

    /// A column is declared with an incompatible SQL type.
    #[error("{table}.{column}: expected type {expected}, found {found}")]
    ColumnType {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
        /// Declared SQL type.
        expected: String,
        /// SQL type in the file.
        found: String,
    },
}

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// `SQLite` error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// The file layout disagrees with the declared tables.
    #[error("schema mismatch: {0}")]
    Schema(#[from] SchemaMismatch),

    /// The store failed validation at open and rejects every operation.
    #[error("store is invalid")]
    Invalid,

    /// Decoded values do not fit the record layout.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// A stored value cannot be converted to its column's field type.
    #[error("corrupt row in {table}.{column}: {detail}")]
    CorruptRow {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
        /// What was wrong with the value.
        detail: String,
    },

    /// No row has the given identifier.
    #[error("row not found: {0}")]
    RowNotFound(i64),

    /// The worker was shut down and accepts no more tasks.
    #[error("worker stopped")]
    WorkerStopped,

    /// A submitted task was discarded before it ran.
    #[error("task dropped before completion")]
    TaskDropped,

    /// The worker thread could not be spawned.
    #[error("failed to spawn worker thread: {0}")]
    Spawn(std::io::Error),

    /// Filesystem error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for store results.
pub type Result<T> = std::result::Result<T, StoreError>;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
