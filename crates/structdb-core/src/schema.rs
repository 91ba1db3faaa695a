//! Schema Mapper: positional table/column naming and SQL rendering.
//!
//! Naming is purely positional and is the on-disk format:
//!
//! - table at position `p` is `table<p>`
//! - field `i` of type `t` is column `_<i><t>` (e.g. `_0i32`, `_1String`)
//!
//! Reordering the declared table list, or the fields of a record, is a
//! breaking schema change. Every renderer exists both as a [`TableSchema`]
//! method and as a free function over a table name, so tools that only know
//! the file (not the record types) render identical SQL.

use std::fmt::Write as _;

use crate::field::FieldType;
use crate::record::Record;

/// Name of the table at `position`.
pub fn table_name(position: usize) -> String {
    format!("table{position}")
}

/// Name of the column for field `index` of type `ty`.
pub fn column_name(index: usize, ty: FieldType) -> String {
    format!("_{index}{}", ty.type_name())
}

/// Ordered column names for a field list.
pub fn column_names(fields: &[FieldType]) -> Vec<String> {
    fields
        .iter()
        .enumerate()
        .map(|(i, ty)| column_name(i, *ty))
        .collect()
}

/// One column of a derived table layout.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Column {
    /// Positional column name.
    pub name: String,
    /// Field type the column stores.
    pub field_type: FieldType,
}

/// Derived layout of one table: its name and ordered columns.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableSchema {
    /// Table position in the declared type list.
    pub position: usize,
    /// Positional table name.
    pub name: String,
    /// Columns in field declaration order.
    pub columns: Vec<Column>,
}

impl TableSchema {
    /// Derive the layout of record type `R` stored at `position`.
    pub fn of<R: Record>(position: usize) -> Self {
        Self::from_fields(position, R::FIELDS)
    }

    /// Derive a layout from an explicit field list.
    pub fn from_fields(position: usize, fields: &[FieldType]) -> Self {
        Self {
            position,
            name: table_name(position),
            columns: fields
                .iter()
                .enumerate()
                .map(|(i, ty)| Column {
                    name: column_name(i, *ty),
                    field_type: *ty,
                })
                .collect(),
        }
    }

    /// Column names in order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// `CREATE TABLE table<p>(_0i32 INTEGER, _1String TEXT);`
    pub fn create_table_sql(&self) -> String {
        let mut sql = format!("CREATE TABLE {}(", self.name);
        for (i, column) in self.columns.iter().enumerate() {
            if i != 0 {
                sql.push_str(", ");
            }
            let _ = write!(sql, "{} {}", column.name, column.field_type.sql_type());
        }
        sql.push_str(");");
        sql
    }

    /// `INSERT INTO table<p>(_0i32,_1String) VALUES(?,?)`
    pub fn insert_sql(&self) -> String {
        let names = self.column_names();
        format!(
            "INSERT INTO {}({}) VALUES({})",
            self.name,
            names.join(","),
            vec!["?"; names.len()].join(",")
        )
    }

    /// `UPDATE table<p> SET _0i32=?,_1String=? WHERE rowid=<id>`
    pub fn update_sql(&self, row_id: i64) -> String {
        format!(
            "UPDATE {} SET {}=? WHERE rowid={row_id}",
            self.name,
            self.column_names().join("=?,")
        )
    }

    /// See [`read_sql`].
    pub fn read_sql(&self, offset: u32, count: u32, filter: &str) -> String {
        read_sql(&self.name, offset, count, filter)
    }

    /// See [`count_sql`].
    pub fn count_sql(&self, filter: &str) -> String {
        count_sql(&self.name, filter)
    }

    /// See [`max_row_id_sql`].
    pub fn max_row_id_sql(&self) -> String {
        max_row_id_sql(&self.name)
    }

    /// See [`remove_half_sql`].
    pub fn remove_half_sql(&self) -> String {
        remove_half_sql(&self.name)
    }

    /// See [`clear_sql`].
    pub fn clear_sql(&self) -> String {
        clear_sql(&self.name)
    }
}

/// `SELECT rowid, * FROM <table>[ WHERE ..][ LIMIT n][ OFFSET m]`.
///
/// `count == 0` means unbounded. SQLite has no bare `OFFSET`, so an
/// unbounded read with a non-zero offset renders `LIMIT -1`.
pub fn read_sql(table: &str, offset: u32, count: u32, filter: &str) -> String {
    let mut sql = format!("SELECT rowid, * FROM {table}{filter}");
    if count != 0 {
        let _ = write!(sql, " LIMIT {count}");
    } else if offset != 0 {
        sql.push_str(" LIMIT -1");
    }
    if offset != 0 {
        let _ = write!(sql, " OFFSET {offset}");
    }
    sql
}

/// `SELECT count(*) FROM <table>[ WHERE ..]`.
pub fn count_sql(table: &str, filter: &str) -> String {
    format!("SELECT count(*) FROM {table}{filter}")
}

/// `SELECT max(rowid) FROM <table>`.
pub fn max_row_id_sql(table: &str) -> String {
    format!("SELECT max(rowid) FROM {table}")
}

/// Delete rows whose identifier is at most half the current maximum.
pub fn remove_half_sql(table: &str) -> String {
    format!("DELETE FROM {table} WHERE rowid <= (SELECT max(rowid) FROM {table})/2")
}

/// Unconditional delete of every row.
pub fn clear_sql(table: &str) -> String {
    format!("DELETE FROM {table}")
}

/// Enables incremental compaction. Effective only before the first table
/// is created.
pub const AUTO_VACUUM_SQL: &str = "PRAGMA auto_vacuum = INCREMENTAL;";

/// Returns free pages to the file system without rebuilding tables, so row
/// identifiers survive compaction. Yields one row per freed page.
pub const INCREMENTAL_VACUUM_SQL: &str = "PRAGMA incremental_vacuum";

// ── Compile-time layout checks ──────────────────────────────────────────────

/// Whether field `index` exists and has type `ty`.
pub const fn column_has_type(fields: &[FieldType], index: usize, ty: FieldType) -> bool {
    index < fields.len() && fields[index].same_as(ty)
}

/// Number of fields of type `ty`.
pub const fn count_of_type(fields: &[FieldType], ty: FieldType) -> usize {
    let mut count = 0;
    let mut i = 0;
    while i < fields.len() {
        if fields[i].same_as(ty) {
            count += 1;
        }
        i += 1;
    }
    count
}

/// Position of the first field of type `ty`, or `fields.len()` if absent.
pub const fn index_of_type(fields: &[FieldType], ty: FieldType) -> usize {
    let mut i = 0;
    while i < fields.len() {
        if fields[i].same_as(ty) {
            return i;
        }
        i += 1;
    }
    fields.len()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
