//! Typed store over one database file.
//!
//! [`TypedStore<S>`] owns the tables declared by the tuple `S`. At open it
//! either creates every table (file without tables) or validates the file's
//! layout against the derived schemas. A failed validation leaves the store
//! permanently invalid: every later operation returns at once, without
//! touching the database.
//!
//! Operations are addressed by table position, `store.add::<0>(&record)`,
//! or by record type when it occurs once in the table list,
//! `store.add_record(&record)`. Each comes in two forms:
//!
//! - `try_*` returns `Result<_, StoreError>`
//! - the plain form fails closed (`false`, an empty `Vec`, or `-1`) and logs
//!   the swallowed error at `warn`
//!
//! The store does no locking of its own. Each thread gets its own
//! connection; callers that need ordering between threads go through
//! [`AsyncStore`](crate::AsyncStore).

use std::marker::PhantomData;
use std::path::Path;

use chrono::DateTime;
use rusqlite::types::{Value, ValueRef};
use rusqlite::{Row, params_from_iter};
use structdb_core::{
    Blank, Comparand, FieldType, FieldValue, Filter, Record, RecordAt, StoredRow, TableAt, TableOf,
    TableSchema, Tables,
};
use structdb_settings::DatabaseSettings;
use tracing::{debug, info, warn};

use crate::connection::{ConnectionOptions, ConnectionRegistry};
use crate::errors::{Result, StoreError};
use crate::layout::{read_layout, validate_layout};
use crate::maintenance;

/// A validated set of typed tables in one database file.
pub struct TypedStore<S: Tables> {
    connections: ConnectionRegistry,
    max_size_kib: u64,
    schemas: Vec<TableSchema>,
    validation_error: Option<StoreError>,
    _tables: PhantomData<fn() -> S>,
}

impl<S: Tables> TypedStore<S> {
    /// Open (creating if needed) the store at `path` with default settings.
    ///
    /// Never fails: a store that cannot be prepared is returned invalid.
    pub fn open(path: impl AsRef<Path>) -> Self {
        Self::open_with(path, &DatabaseSettings::default())
    }

    /// Open the store at `path` with explicit database settings.
    pub fn open_with(path: impl AsRef<Path>, settings: &DatabaseSettings) -> Self {
        let path = path.as_ref();
        let connections =
            ConnectionRegistry::new(path, ConnectionOptions::from_settings(settings));
        let schemas = S::schemas();
        let validation_error = match prepare_file(&connections, &schemas) {
            Ok(()) => {
                info!(path = %path.display(), tables = schemas.len(), "store opened");
                None
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "store invalid");
                Some(e)
            }
        };
        Self {
            connections,
            max_size_kib: settings.max_size_kib,
            schemas,
            validation_error,
            _tables: PhantomData,
        }
    }

    /// Whether the store passed creation/validation at open.
    pub fn is_valid(&self) -> bool {
        self.validation_error.is_none()
    }

    /// Why the store is invalid, if it is.
    pub fn validation_error(&self) -> Option<&StoreError> {
        self.validation_error.as_ref()
    }

    /// Whether the database file exists on disk.
    pub fn exists(&self) -> bool {
        self.path().exists()
    }

    /// Database file path.
    pub fn path(&self) -> &Path {
        self.connections.path()
    }

    /// Maximum size hint in KiB. Not enforced; call
    /// [`remove_half_records`](Self::remove_half_records) to bound growth.
    pub fn max_size_kib(&self) -> u64 {
        self.max_size_kib
    }

    /// Number of open per-thread connections.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Derived layouts of every table.
    pub fn schemas(&self) -> &[TableSchema] {
        &self.schemas
    }

    fn table(&self, position: usize) -> Result<&TableSchema> {
        if self.validation_error.is_some() {
            return Err(StoreError::Invalid);
        }
        self.schemas.get(position).ok_or(StoreError::Invalid)
    }

    fn add_at<R: Record>(&self, position: usize, record: &R) -> Result<i64> {
        let schema = self.table(position)?;
        let values: Vec<Value> = record.to_values().into_iter().map(to_sql_value).collect();
        self.connections.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(&schema.insert_sql())?;
            let _ = stmt.execute(params_from_iter(values))?;
            Ok(conn.last_insert_rowid())
        })
    }

    fn read_at<R: Record>(
        &self,
        position: usize,
        offset: u32,
        count: u32,
        filter: &Filter<R, impl Comparand>,
    ) -> Result<Vec<StoredRow<R>>> {
        let schema = self.table(position)?;
        let sql = schema.read_sql(offset, count, &filter.query());
        debug!(%sql, "read");
        self.connections.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query([])?;
            let mut out = Vec::new();
            while let Some(row) = rows.next()? {
                out.push(decode_row::<R>(schema, row)?);
            }
            Ok(out)
        })
    }

    fn update_at<R: Record>(&self, position: usize, row: &StoredRow<R>) -> Result<()> {
        let schema = self.table(position)?;
        let values: Vec<Value> = row.record.to_values().into_iter().map(to_sql_value).collect();
        let changed = self.connections.with_conn(|conn| {
            Ok(conn.execute(&schema.update_sql(row.row_id), params_from_iter(values))?)
        })?;
        if changed == 0 {
            return Err(StoreError::RowNotFound(row.row_id));
        }
        Ok(())
    }

    fn count_at<R: Record>(&self, position: usize, filter: &Filter<R, impl Comparand>) -> Result<i64> {
        let schema = self.table(position)?;
        let fragment = filter.query();
        self.connections
            .with_conn(|conn| maintenance::count_rows(conn, &schema.name, &fragment))
    }

    // ── Add ─────────────────────────────────────────────────────────

    /// Insert a record into table `N`. Returns the new row identifier.
    pub fn try_add<const N: usize>(&self, record: &RecordAt<S, N>) -> Result<i64>
    where
        S: TableAt<N>,
    {
        self.add_at(N, record)
    }

    /// Insert a record into table `N`; `false` on any failure.
    pub fn add<const N: usize>(&self, record: &RecordAt<S, N>) -> bool
    where
        S: TableAt<N>,
    {
        fail_closed("add", N, self.try_add::<N>(record)).is_some()
    }

    // ── Read ────────────────────────────────────────────────────────

    /// Read rows of table `N` matching `filter`.
    ///
    /// `count == 0` reads without limit. Rows come back in storage (row
    /// identifier) order.
    pub fn try_read<const N: usize>(
        &self,
        offset: u32,
        count: u32,
        filter: &Filter<RecordAt<S, N>, impl Comparand>,
    ) -> Result<Vec<StoredRow<RecordAt<S, N>>>>
    where
        S: TableAt<N>,
    {
        self.read_at(N, offset, count, filter)
    }

    /// Read rows of table `N`; empty on any failure.
    pub fn read<const N: usize>(
        &self,
        offset: u32,
        count: u32,
        filter: &Filter<RecordAt<S, N>, impl Comparand>,
    ) -> Vec<StoredRow<RecordAt<S, N>>>
    where
        S: TableAt<N>,
    {
        fail_closed("read", N, self.try_read::<N>(offset, count, filter)).unwrap_or_default()
    }

    /// Read rows of table `N` without a filter; empty on any failure.
    pub fn read_all<const N: usize>(&self, offset: u32, count: u32) -> Vec<StoredRow<RecordAt<S, N>>>
    where
        S: TableAt<N>,
    {
        self.read::<N>(offset, count, &Filter::blank())
    }

    // ── Update ──────────────────────────────────────────────────────

    /// Replace every field of the row with `row.row_id`.
    pub fn try_update<const N: usize>(&self, row: &StoredRow<RecordAt<S, N>>) -> Result<()>
    where
        S: TableAt<N>,
    {
        self.update_at(N, row)
    }

    /// Replace a row; `false` on failure or when the row does not exist.
    pub fn update<const N: usize>(&self, row: &StoredRow<RecordAt<S, N>>) -> bool
    where
        S: TableAt<N>,
    {
        fail_closed("update", N, self.try_update::<N>(row)).is_some()
    }

    // ── Aggregates ──────────────────────────────────────────────────

    /// Count rows of table `N` matching `filter`.
    pub fn try_number_of_records<const N: usize>(
        &self,
        filter: &Filter<RecordAt<S, N>, impl Comparand>,
    ) -> Result<i64>
    where
        S: TableAt<N>,
    {
        self.count_at(N, filter)
    }

    /// Count rows of table `N` matching `filter`; `-1` on failure.
    pub fn number_of_records<const N: usize>(
        &self,
        filter: &Filter<RecordAt<S, N>, impl Comparand>,
    ) -> i64
    where
        S: TableAt<N>,
    {
        fail_closed("number_of_records", N, self.try_number_of_records::<N>(filter)).unwrap_or(-1)
    }

    /// Count every row of table `N`; `-1` on failure.
    pub fn count_all<const N: usize>(&self) -> i64
    where
        S: TableAt<N>,
    {
        self.number_of_records::<N>(&Filter::blank())
    }

    /// Largest row identifier of table `N`, `0` when empty.
    pub fn try_max_row_id<const N: usize>(&self) -> Result<i64>
    where
        S: TableAt<N>,
    {
        let schema = self.table(N)?;
        self.connections
            .with_conn(|conn| maintenance::max_row_id(conn, &schema.name))
    }

    /// Largest row identifier of table `N`; `0` when empty, `-1` on failure.
    pub fn max_row_id<const N: usize>(&self) -> i64
    where
        S: TableAt<N>,
    {
        fail_closed("max_row_id", N, self.try_max_row_id::<N>()).unwrap_or(-1)
    }

    // ── By record type ──────────────────────────────────────────────

    /// Insert a record into the table holding `R`. Returns the new row
    /// identifier.
    pub fn try_add_record<R: Record, P>(&self, record: &R) -> Result<i64>
    where
        S: TableOf<R, P>,
    {
        self.add_at(S::POSITION, record)
    }

    /// Insert a record into the table holding `R`; `false` on any failure.
    pub fn add_record<R: Record, P>(&self, record: &R) -> bool
    where
        S: TableOf<R, P>,
    {
        fail_closed("add", S::POSITION, self.try_add_record(record)).is_some()
    }

    /// Read rows of the table holding `R` matching `filter`.
    pub fn try_read_records<R: Record, P>(
        &self,
        offset: u32,
        count: u32,
        filter: &Filter<R, impl Comparand>,
    ) -> Result<Vec<StoredRow<R>>>
    where
        S: TableOf<R, P>,
    {
        self.read_at(S::POSITION, offset, count, filter)
    }

    /// Read rows of the table holding `R`; empty on any failure.
    pub fn read_records<R: Record, P>(
        &self,
        offset: u32,
        count: u32,
        filter: &Filter<R, impl Comparand>,
    ) -> Vec<StoredRow<R>>
    where
        S: TableOf<R, P>,
    {
        fail_closed("read", S::POSITION, self.try_read_records(offset, count, filter))
            .unwrap_or_default()
    }

    /// Every row of the table holding `R`; empty on any failure.
    pub fn all_records<R: Record, P>(&self) -> Vec<StoredRow<R>>
    where
        S: TableOf<R, P>,
    {
        self.read_records(0, 0, &Filter::<R, Blank>::blank())
    }

    /// Replace a row of the table holding `R`.
    pub fn try_update_record<R: Record, P>(&self, row: &StoredRow<R>) -> Result<()>
    where
        S: TableOf<R, P>,
    {
        self.update_at(S::POSITION, row)
    }

    /// Replace a row of the table holding `R`; `false` on failure.
    pub fn update_record<R: Record, P>(&self, row: &StoredRow<R>) -> bool
    where
        S: TableOf<R, P>,
    {
        fail_closed("update", S::POSITION, self.try_update_record(row)).is_some()
    }

    /// Count rows of the table holding `R` matching `filter`; `-1` on
    /// failure.
    pub fn count_records<R: Record, P>(&self, filter: &Filter<R, impl Comparand>) -> i64
    where
        S: TableOf<R, P>,
    {
        fail_closed("number_of_records", S::POSITION, self.count_at(S::POSITION, filter))
            .unwrap_or(-1)
    }

    // ── Eviction and clearing ───────────────────────────────────────

    /// Delete rows of table `N` with identifier at most half the maximum,
    /// then compact the file. Returns the number of deleted rows.
    pub fn try_remove_half_records<const N: usize>(&self) -> Result<usize>
    where
        S: TableAt<N>,
    {
        let schema = self.table(N)?;
        self.connections
            .with_conn(|conn| maintenance::remove_half(conn, &schema.name))
    }

    /// Evict the older half of table `N`. `false` if the delete or the
    /// compaction failed.
    pub fn remove_half_records<const N: usize>(&self) -> bool
    where
        S: TableAt<N>,
    {
        fail_closed("remove_half_records", N, self.try_remove_half_records::<N>()).is_some()
    }

    /// Delete every row of table `N`. Returns the number of deleted rows.
    pub fn try_clear_table<const N: usize>(&self) -> Result<usize>
    where
        S: TableAt<N>,
    {
        let schema = self.table(N)?;
        self.connections
            .with_conn(|conn| maintenance::clear_table(conn, &schema.name))
    }

    /// Delete every row of table `N`; `false` on failure.
    pub fn clear_table<const N: usize>(&self) -> bool
    where
        S: TableAt<N>,
    {
        fail_closed("clear_table", N, self.try_clear_table::<N>()).is_some()
    }

    /// Delete every row of every table, then compact the file.
    ///
    /// All tables are attempted even if one fails.
    pub fn try_clear_all(&self) -> Result<()> {
        if self.validation_error.is_some() {
            return Err(StoreError::Invalid);
        }
        self.connections.with_conn(|conn| {
            maintenance::clear_tables(conn, self.schemas.iter().map(|s| s.name.as_str()))
        })
    }

    /// Delete every row of every table; `false` if any step failed.
    pub fn clear_all(&self) -> bool {
        match self.try_clear_all() {
            Ok(()) => true,
            Err(e) => {
                log_swallowed("clear_all", None, &e);
                false
            }
        }
    }
}

impl<S: Tables> std::fmt::Debug for TypedStore<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypedStore")
            .field("path", &self.path())
            .field("tables", &self.schemas.len())
            .field("valid", &self.is_valid())
            .finish_non_exhaustive()
    }
}

/// Create every table in an empty file, or validate an existing layout.
fn prepare_file(connections: &ConnectionRegistry, schemas: &[TableSchema]) -> Result<()> {
    connections.with_conn(|conn| {
        let layout = read_layout(conn)?;
        if layout.is_empty() {
            for schema in schemas {
                conn.execute_batch(&schema.create_table_sql())?;
                info!(table = %schema.name, columns = schema.columns.len(), "created table");
            }
            return Ok(());
        }
        validate_layout(&layout, schemas)?;
        for table in &layout {
            for column in &table.columns {
                if column.declared_type.eq_ignore_ascii_case("STRING") {
                    warn!(
                        table = %table.name,
                        column = %column.name,
                        "legacy STRING column has NUMERIC affinity; numeric-looking text is stored as a number"
                    );
                }
            }
        }
        Ok(())
    })
}

fn fail_closed<T>(op: &'static str, table: usize, result: Result<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            log_swallowed(op, Some(table), &e);
            None
        }
    }
}

fn log_swallowed(op: &'static str, table: Option<usize>, error: &StoreError) {
    if matches!(error, StoreError::Invalid) {
        debug!(op, ?table, "rejected by invalid store");
    } else {
        warn!(op, ?table, error = %error, "store operation failed");
    }
}

fn to_sql_value(value: FieldValue) -> Value {
    match value {
        FieldValue::Int32(v) => Value::Integer(i64::from(v)),
        FieldValue::Int64(v) => Value::Integer(v),
        FieldValue::Real(v) => Value::Real(v),
        FieldValue::Bool(v) => Value::Integer(i64::from(v)),
        FieldValue::Text(v) => Value::Text(v),
        FieldValue::Timestamp(v) => Value::Integer(v.timestamp_millis()),
    }
}

/// Convert one stored value to a field value of type `ty`.
///
/// Follows SQLite's loose typing where the conversion is lossless: integers
/// read as reals, numbers read as text. SQLite stores a NaN real as NULL, so
/// NULL in a real column reads back as NaN.
fn from_sql_value(value: ValueRef<'_>, ty: FieldType) -> std::result::Result<FieldValue, String> {
    match (ty, value) {
        (FieldType::Real, ValueRef::Null) => Ok(FieldValue::Real(f64::NAN)),
        (_, ValueRef::Null) => Err("unexpected NULL".to_string()),
        (FieldType::Int32, ValueRef::Integer(v)) => i32::try_from(v)
            .map(FieldValue::Int32)
            .map_err(|_| format!("{v} does not fit in i32")),
        (FieldType::Int64, ValueRef::Integer(v)) => Ok(FieldValue::Int64(v)),
        (FieldType::Real, ValueRef::Real(v)) => Ok(FieldValue::Real(v)),
        (FieldType::Real, ValueRef::Integer(v)) => Ok(FieldValue::Real(v as f64)),
        (FieldType::Bool, ValueRef::Integer(v)) => Ok(FieldValue::Bool(v != 0)),
        (FieldType::Text, ValueRef::Text(bytes)) => std::str::from_utf8(bytes)
            .map(|s| FieldValue::Text(s.to_string()))
            .map_err(|e| format!("invalid UTF-8: {e}")),
        (FieldType::Text, ValueRef::Integer(v)) => Ok(FieldValue::Text(v.to_string())),
        (FieldType::Text, ValueRef::Real(v)) => Ok(FieldValue::Text(v.to_string())),
        (FieldType::Timestamp, ValueRef::Integer(ms)) => DateTime::from_timestamp_millis(ms)
            .map(FieldValue::Timestamp)
            .ok_or_else(|| format!("{ms} ms is out of timestamp range")),
        (_, other) => Err(format!("unexpected {} value", other.data_type())),
    }
}

/// Decode a `SELECT rowid, *` row.
fn decode_row<R: Record>(schema: &TableSchema, row: &Row<'_>) -> Result<StoredRow<R>> {
    let row_id: i64 = row.get(0)?;
    let mut values = Vec::with_capacity(schema.columns.len());
    for (i, column) in schema.columns.iter().enumerate() {
        let value = from_sql_value(row.get_ref(i + 1)?, column.field_type).map_err(|detail| {
            StoreError::CorruptRow {
                table: schema.name.clone(),
                column: column.name.clone(),
                detail,
            }
        })?;
        values.push(value);
    }
    Ok(StoredRow::new(row_id, R::from_values(values)?))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::Utc;
    use rusqlite::Connection;
    use structdb_logging::capture_logs;

    use super::*;

    structdb_core::record! {
        #[derive(Clone, Debug, PartialEq)]
        struct Note {
            x: i32,
            y: String,
        }
    }

    structdb_core::record! {
        #[derive(Clone, Debug, PartialEq)]
        struct Sample {
            at: chrono::DateTime<Utc>,
            level: f64,
            ok: bool,
            big: i64,
        }
    }

    type Tables2 = (Note, Sample);

    fn note(x: i32) -> Note {
        Note {
            x,
            y: format!("n{x}"),
        }
    }

    fn open(dir: &tempfile::TempDir) -> TypedStore<Tables2> {
        TypedStore::open(dir.path().join("store.db"))
    }

    #[test]
    fn fresh_file_is_created_and_valid() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir);
        assert!(store.is_valid());
        assert!(store.exists());
        assert_eq!(store.max_size_kib(), 2_097_152);
        assert_eq!(store.connection_count(), 1);
        assert_eq!(store.count_all::<0>(), 0);
        assert_eq!(store.max_row_id::<1>(), 0);
    }

    #[test]
    fn reopen_validates_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        drop(open(&dir));
        let store = open(&dir);
        assert!(store.is_valid(), "{:?}", store.validation_error());
    }

    #[test]
    fn legacy_string_column_warns_on_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legacy.db");
        Connection::open(&path)
            .unwrap()
            .execute_batch("CREATE TABLE table0(_0i32 INTEGER, _1String STRING);")
            .unwrap();

        let (logs, _guard) = capture_logs();
        let store = TypedStore::<(Note,)>::open(&path);
        assert!(store.is_valid(), "{:?}", store.validation_error());
        assert!(logs.has_event(tracing::Level::WARN, "NUMERIC affinity"));
        assert!(store.add::<0>(&note(1)));
        assert_eq!(store.read_all::<0>(0, 0)[0].record, note(1));
    }

    #[test]
    fn add_returns_increasing_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir);
        assert_eq!(store.try_add::<0>(&note(1)).unwrap(), 1);
        assert_eq!(store.try_add::<0>(&note(2)).unwrap(), 2);
        assert!(store.add::<0>(&note(3)));
        assert_eq!(store.max_row_id::<0>(), 3);
    }

    #[test]
    fn all_field_types_survive_storage() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir);
        let sample = Sample {
            at: DateTime::from_timestamp_millis(1_700_000_000_123).unwrap(),
            level: -2.25,
            ok: true,
            big: i64::MAX,
        };
        assert!(store.add::<1>(&sample));
        let rows = store.read_all::<1>(0, 0);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].record, sample);
    }

    #[test]
    fn read_window_and_filter() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir);
        for x in 0..10 {
            assert!(store.add::<0>(&note(x)));
        }
        let window = store.read_all::<0>(2, 3);
        let xs: Vec<_> = window.iter().map(|r| r.x).collect();
        assert_eq!(xs, [2, 3, 4]);

        let tail = store.read_all::<0>(7, 0);
        assert_eq!(tail.len(), 3);

        let filter = Filter::<Note, i32>::column::<0>().greater_or_equal().value(6);
        let rows = store.read::<0>(0, 0, &filter);
        assert_eq!(rows.iter().map(|r| r.row_id).collect::<Vec<_>>(), [7, 8, 9, 10]);
        assert_eq!(store.number_of_records::<0>(&filter), 4);
    }

    #[test]
    fn record_type_selects_table() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir);
        assert_eq!(store.try_add_record(&note(4)).unwrap(), 1);
        assert!(store.add_record(&note(5)));
        assert!(store.add_record(&Sample {
            at: Utc::now(),
            level: 0.5,
            ok: true,
            big: 9,
        }));
        assert_eq!(store.count_all::<0>(), 2);
        assert_eq!(store.count_all::<1>(), 1);

        let mut rows = store.all_records::<Note, _>();
        assert_eq!(rows.iter().map(|r| r.x).collect::<Vec<_>>(), [4, 5]);

        let filter = Filter::<Note, i32>::column::<0>().greater().value(4);
        assert_eq!(store.count_records(&filter), 1);
        assert_eq!(store.read_records(0, 0, &filter)[0].row_id, 2);

        rows[0].y = "renamed".into();
        assert!(store.update_record(&rows[0]));
        assert_eq!(store.read_all::<0>(0, 1)[0].y, "renamed");
        assert_matches!(
            store.try_update_record(&StoredRow::new(40, note(0))),
            Err(StoreError::RowNotFound(40))
        );
    }

    #[test]
    fn single_table_store_by_type() {
        let dir = tempfile::tempdir().unwrap();
        let store = TypedStore::<(Note,)>::open(dir.path().join("one.db"));
        assert!(store.add_record(&note(1)));
        assert_eq!(store.all_records::<Note, _>()[0].record, note(1));
        assert!(store.try_read_records(0, 0, &Filter::<Note, Blank>::blank()).is_ok());
    }

    #[test]
    fn update_replaces_fields() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir);
        assert!(store.add::<0>(&note(1)));
        let mut row = store.read_all::<0>(0, 1).remove(0);
        row.y = "changed".into();
        assert!(store.update::<0>(&row));
        assert_eq!(store.read_all::<0>(0, 0)[0].y, "changed");
    }

    #[test]
    fn update_of_missing_row_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir);
        let row = StoredRow::new(99, note(1));
        assert_matches!(store.try_update::<0>(&row), Err(StoreError::RowNotFound(99)));
        assert!(!store.update::<0>(&row));
    }

    #[test]
    fn remove_half_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir);
        for x in 0..6 {
            assert!(store.add::<0>(&note(x)));
        }
        assert_eq!(store.try_remove_half_records::<0>().unwrap(), 3);
        assert_eq!(store.count_all::<0>(), 3);
        assert!(store.clear_table::<0>());
        assert_eq!(store.count_all::<0>(), 0);
        assert_eq!(store.max_row_id::<0>(), 0);
    }

    #[test]
    fn clear_all_empties_every_table() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir);
        assert!(store.add::<0>(&note(1)));
        assert!(store.add::<1>(&Sample {
            at: Utc::now(),
            level: 0.0,
            ok: false,
            big: 0,
        }));
        assert!(store.clear_all());
        assert_eq!(store.count_all::<0>(), 0);
        assert_eq!(store.count_all::<1>(), 0);
    }

    #[test]
    fn wrong_layout_makes_store_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.db");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch("CREATE TABLE table0(_0i32 INTEGER);").unwrap();
        drop(conn);

        let store = TypedStore::<(Note,)>::open(&path);
        assert!(!store.is_valid());
        assert_matches!(
            store.validation_error(),
            Some(StoreError::Schema(crate::SchemaMismatch::ColumnCount { .. }))
        );
        assert_matches!(store.try_add::<0>(&note(1)), Err(StoreError::Invalid));
        assert!(!store.add::<0>(&note(1)));
        assert!(store.read_all::<0>(0, 0).is_empty());
        assert_eq!(store.count_all::<0>(), -1);
        assert_eq!(store.max_row_id::<0>(), -1);
        assert!(!store.remove_half_records::<0>());
        assert!(!store.clear_table::<0>());
        assert!(!store.clear_all());
    }

    #[test]
    fn corrupt_value_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir);
        let conn = Connection::open(store.path()).unwrap();
        let _ = conn
            .execute("INSERT INTO table0(_0i32,_1String) VALUES(NULL,'x')", [])
            .unwrap();
        assert_matches!(
            store.try_read::<0>(0, 0, &Filter::blank()),
            Err(StoreError::CorruptRow { column, .. }) if column == "_0i32"
        );
        assert!(store.read_all::<0>(0, 0).is_empty());
    }

    #[test]
    fn nan_real_reads_back_as_nan() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir);
        let at = Utc::now();
        for level in [1.0, f64::NAN, 3.0] {
            assert!(store.add::<1>(&Sample {
                at,
                level,
                ok: true,
                big: 0,
            }));
        }

        let rows = store.try_read::<1>(0, 0, &Filter::blank()).unwrap();
        let levels: Vec<f64> = rows.iter().map(|r| r.level).collect();
        assert_eq!(levels.len(), 3);
        assert_eq!(levels[0], 1.0);
        assert!(levels[1].is_nan());
        assert_eq!(levels[2], 3.0);

        let below = Filter::<Sample, f64>::of_type().less().value(10.0);
        assert_eq!(store.number_of_records::<1>(&below), 2);
        assert!(!below.try_pass(&rows[1]));
    }

    #[test]
    fn swallowed_errors_are_logged() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir);
        let (logs, _guard) = capture_logs();
        assert!(!store.update::<0>(&StoredRow::new(5, note(0))));
        assert!(logs.has_event(tracing::Level::WARN, "store operation failed"));
    }

    #[test]
    fn integer_text_is_read_as_text() {
        let value = from_sql_value(ValueRef::Integer(42), FieldType::Text).unwrap();
        assert_eq!(value, FieldValue::Text("42".into()));
        assert!(from_sql_value(ValueRef::Integer(1 << 40), FieldType::Int32).is_err());
        assert_eq!(
            from_sql_value(ValueRef::Integer(3), FieldType::Real).unwrap(),
            FieldValue::Real(3.0)
        );
        assert!(from_sql_value(ValueRef::Null, FieldType::Int64).is_err());
    }
}
