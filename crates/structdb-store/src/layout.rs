//! On-disk table layout: reading it back and checking it against the
//! declared tables.
//!
//! Only user tables are considered (`sqlite_*` internals are skipped).
//! Tables are ordered by the position encoded in their name, so `table10`
//! sorts after `table2`; names that are not positional sort last, by name.

use std::path::Path;

use rusqlite::{Connection, OpenFlags};
use structdb_core::TableSchema;

use crate::errors::{Result, SchemaMismatch};

/// One column as declared in the file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnLayout {
    /// Column name.
    pub name: String,
    /// Declared SQL type, as written in `CREATE TABLE`.
    pub declared_type: String,
}

/// One table as found in the file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableLayout {
    /// Table name.
    pub name: String,
    /// Columns in declaration order.
    pub columns: Vec<ColumnLayout>,
}

/// Position encoded in a `table<p>` name.
pub fn table_position(name: &str) -> Option<usize> {
    name.strip_prefix("table")?.parse().ok()
}

/// Read every user table and its columns over an open connection.
pub fn read_layout(conn: &Connection) -> Result<Vec<TableLayout>> {
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
    )?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut tables = names
        .into_iter()
        .map(|name| {
            let columns = read_columns(conn, &name)?;
            Ok(TableLayout { name, columns })
        })
        .collect::<Result<Vec<_>>>()?;
    tables.sort_by(|a, b| {
        let key = |t: &TableLayout| (table_position(&t.name).unwrap_or(usize::MAX), t.name.clone());
        key(a).cmp(&key(b))
    });
    Ok(tables)
}

fn read_columns(conn: &Connection, table: &str) -> Result<Vec<ColumnLayout>> {
    let mut stmt = conn.prepare(&format!(
        "PRAGMA table_info(\"{}\")",
        table.replace('"', "\"\"")
    ))?;
    let columns = stmt
        .query_map([], |row| {
            Ok(ColumnLayout {
                name: row.get(1)?,
                declared_type: row.get(2)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(columns)
}

/// Read the layout of an existing file without creating or modifying it.
pub fn inspect_layout(path: &Path) -> Result<Vec<TableLayout>> {
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;
    read_layout(&conn)
}

/// Check a non-empty file layout against the declared tables.
///
/// Compares the table count, then per declared table: presence by name,
/// column count, the ordered column names, and declared types.
pub fn validate_layout(
    found: &[TableLayout],
    expected: &[TableSchema],
) -> std::result::Result<(), SchemaMismatch> {
    if found.len() != expected.len() {
        return Err(SchemaMismatch::TableCount {
            expected: expected.len(),
            found: found.len(),
        });
    }

    for schema in expected {
        let table = found
            .iter()
            .find(|t| t.name == schema.name)
            .ok_or_else(|| SchemaMismatch::MissingTable {
                table: schema.name.clone(),
            })?;

        if table.columns.len() != schema.columns.len() {
            return Err(SchemaMismatch::ColumnCount {
                table: schema.name.clone(),
                expected: schema.columns.len(),
                found: table.columns.len(),
            });
        }

        for (index, (want, have)) in schema.columns.iter().zip(&table.columns).enumerate() {
            if want.name != have.name {
                return Err(SchemaMismatch::ColumnName {
                    table: schema.name.clone(),
                    index,
                    expected: want.name.clone(),
                    found: have.name.clone(),
                });
            }
            if !want.field_type.accepts_declared(&have.declared_type) {
                return Err(SchemaMismatch::ColumnType {
                    table: schema.name.clone(),
                    column: want.name.clone(),
                    expected: want.field_type.sql_type().to_string(),
                    found: have.declared_type.clone(),
                });
            }
        }
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
