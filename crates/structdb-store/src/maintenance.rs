//! Table-level statements shared by the typed store and by tools that only
//! know a file, not its record types.
//!
//! [`StoreFile`] opens an existing store file and runs count, eviction,
//! clear and compaction statements by table name, rendering the same SQL as
//! [`TypedStore`](crate::TypedStore).

use std::path::Path;

use rusqlite::Connection;
use structdb_core::schema;
use tracing::{debug, info};

use crate::connection::{ConnectionOptions, ConnectionRegistry};
use crate::errors::{Result, StoreError};
use crate::layout::{TableLayout, read_layout};

/// `SELECT count(*)` with an optional `WHERE` fragment.
pub fn count_rows(conn: &Connection, table: &str, filter: &str) -> Result<i64> {
    let sql = schema::count_sql(table, filter);
    debug!(%sql, "count");
    Ok(conn.query_row(&sql, [], |row| row.get(0))?)
}

/// Largest row identifier, `0` for an empty table.
pub fn max_row_id(conn: &Connection, table: &str) -> Result<i64> {
    let sql = schema::max_row_id_sql(table);
    let max: Option<i64> = conn.query_row(&sql, [], |row| row.get(0))?;
    Ok(max.unwrap_or(0))
}

/// Delete rows with identifier at most half the maximum, then compact.
///
/// Returns the number of deleted rows. A compaction failure is reported as
/// an error even though the delete already took effect.
pub fn remove_half(conn: &Connection, table: &str) -> Result<usize> {
    let deleted = conn.execute(&schema::remove_half_sql(table), [])?;
    debug!(table, deleted, "evicted rows");
    vacuum(conn)?;
    Ok(deleted)
}

/// Delete every row of one table. Does not compact.
pub fn clear_table(conn: &Connection, table: &str) -> Result<usize> {
    let deleted = conn.execute(&schema::clear_sql(table), [])?;
    debug!(table, deleted, "cleared table");
    Ok(deleted)
}

/// Delete every row of every listed table, then compact.
///
/// Keeps going after a failed table; the first error is returned once all
/// tables were attempted and the file was compacted.
pub fn clear_tables<'a>(conn: &Connection, tables: impl IntoIterator<Item = &'a str>) -> Result<()> {
    let mut first_error = None;
    for table in tables {
        if let Err(e) = clear_table(conn, table) {
            tracing::warn!(table, error = %e, "failed to clear table");
            let _ = first_error.get_or_insert(e);
        }
    }
    let vacuumed = vacuum(conn);
    match first_error {
        Some(e) => Err(e),
        None => vacuumed,
    }
}

/// Compact the database file.
///
/// Runs an incremental vacuum: a full `VACUUM` would renumber the rowids of
/// these tables, which have no `INTEGER PRIMARY KEY`. Files created without
/// incremental auto-vacuum are left as they are.
pub fn vacuum(conn: &Connection) -> Result<()> {
    let mut stmt = conn.prepare(schema::INCREMENTAL_VACUUM_SQL)?;
    let mut rows = stmt.query([])?;
    let mut freed = 0usize;
    while rows.next()?.is_some() {
        freed += 1;
    }
    debug!(freed, "incremental vacuum");
    Ok(())
}

/// An existing store file opened without its record types.
#[derive(Debug)]
pub struct StoreFile {
    connections: ConnectionRegistry,
}

impl StoreFile {
    /// Open an existing store file. A missing file is an error; nothing is
    /// created.
    pub fn open(path: &Path, options: ConnectionOptions) -> Result<Self> {
        if !path.exists() {
            return Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} does not exist", path.display()),
            )));
        }
        Ok(Self {
            connections: ConnectionRegistry::new(path, options),
        })
    }

    /// File path.
    pub fn path(&self) -> &Path {
        self.connections.path()
    }

    /// Tables and columns in the file.
    pub fn layout(&self) -> Result<Vec<TableLayout>> {
        self.connections.with_conn(read_layout)
    }

    /// Row count of `table`.
    pub fn row_count(&self, table: &str) -> Result<i64> {
        self.connections.with_conn(|conn| count_rows(conn, table, ""))
    }

    /// Largest row identifier of `table`, `0` when empty.
    pub fn max_row_id(&self, table: &str) -> Result<i64> {
        self.connections.with_conn(|conn| max_row_id(conn, table))
    }

    /// Evict the older half of `table`, then compact.
    pub fn remove_half(&self, table: &str) -> Result<usize> {
        self.connections.with_conn(|conn| remove_half(conn, table))
    }

    /// Delete every row of `table`, then compact.
    pub fn clear(&self, table: &str) -> Result<usize> {
        self.connections.with_conn(|conn| {
            let deleted = clear_table(conn, table)?;
            vacuum(conn)?;
            Ok(deleted)
        })
    }

    /// Delete every row of every table, then compact.
    pub fn clear_all(&self) -> Result<()> {
        self.connections.with_conn(|conn| {
            let layout = read_layout(conn)?;
            clear_tables(conn, layout.iter().map(|t| t.name.as_str()))?;
            info!(path = %self.path().display(), tables = layout.len(), "cleared all tables");
            Ok(())
        })
    }

    /// Compact the file.
    pub fn vacuum(&self) -> Result<()> {
        self.connections.with_conn(vacuum)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn seeded(dir: &tempfile::TempDir, rows: i64) -> StoreFile {
        let path = dir.path().join("file.db");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE table0(_0i32 INTEGER, _1String TEXT);
             CREATE TABLE table1(_0f64 REAL);",
        )
        .unwrap();
        for i in 0..rows {
            let _ = conn
                .execute(
                    "INSERT INTO table0(_0i32,_1String) VALUES(?,?)",
                    rusqlite::params![i, format!("r{i}")],
                )
                .unwrap();
        }
        drop(conn);
        StoreFile::open(&path, ConnectionOptions::default()).unwrap()
    }

    #[test]
    fn open_missing_file_fails_without_creating() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.db");
        assert_matches!(
            StoreFile::open(&path, ConnectionOptions::default()),
            Err(StoreError::Io(_))
        );
        assert!(!path.exists());
    }

    #[test]
    fn counts_and_max() {
        let dir = tempfile::tempdir().unwrap();
        let file = seeded(&dir, 7);
        assert_eq!(file.row_count("table0").unwrap(), 7);
        assert_eq!(file.max_row_id("table0").unwrap(), 7);
        assert_eq!(file.row_count("table1").unwrap(), 0);
        assert_eq!(file.max_row_id("table1").unwrap(), 0);
    }

    #[test]
    fn remove_half_keeps_newer_rows() {
        let dir = tempfile::tempdir().unwrap();
        let file = seeded(&dir, 7);
        assert_eq!(file.remove_half("table0").unwrap(), 3);
        assert_eq!(file.row_count("table0").unwrap(), 4);
        assert_eq!(file.max_row_id("table0").unwrap(), 7);
    }

    #[test]
    fn clear_all_empties_every_table() {
        let dir = tempfile::tempdir().unwrap();
        let file = seeded(&dir, 3);
        file.clear_all().unwrap();
        assert_eq!(file.row_count("table0").unwrap(), 0);
        assert_eq!(file.layout().unwrap().len(), 2);
    }

    #[test]
    fn unknown_table_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let file = seeded(&dir, 1);
        assert_matches!(file.row_count("table9"), Err(StoreError::Sqlite(_)));
        assert_matches!(file.clear("table9"), Err(StoreError::Sqlite(_)));
    }

    #[test]
    fn eviction_keeps_row_ids_and_frees_pages() {
        let dir = tempfile::tempdir().unwrap();
        let registry =
            ConnectionRegistry::new(dir.path().join("fresh.db"), ConnectionOptions::default());
        registry
            .with_conn(|conn| {
                conn.execute_batch("CREATE TABLE table0(_0String TEXT);")?;
                for i in 0..200 {
                    let _ = conn.execute(
                        "INSERT INTO table0(_0String) VALUES(?)",
                        [format!("{i:0>2000}")],
                    )?;
                }
                Ok(())
            })
            .unwrap();

        let deleted = registry.with_conn(|conn| remove_half(conn, "table0")).unwrap();
        assert_eq!(deleted, 100);

        registry
            .with_conn(|conn| {
                let mode: i64 = conn.query_row("PRAGMA auto_vacuum", [], |r| r.get(0))?;
                assert_eq!(mode, 2);
                let free: i64 = conn.query_row("PRAGMA freelist_count", [], |r| r.get(0))?;
                assert_eq!(free, 0);
                let mut stmt = conn.prepare("SELECT rowid FROM table0")?;
                let ids: Vec<i64> = stmt
                    .query_map([], |r| r.get(0))?
                    .collect::<rusqlite::Result<_>>()?;
                assert_eq!(ids, (101..=200).collect::<Vec<_>>());
                Ok(())
            })
            .unwrap();
        assert_eq!(registry.with_conn(|conn| max_row_id(conn, "table0")).unwrap(), 200);
    }

    #[test]
    fn vacuum_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let file = seeded(&dir, 2);
        file.vacuum().unwrap();
    }
}
