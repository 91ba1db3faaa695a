//! Per-(file, thread) `SQLite` connection registry.
//!
//! A `rusqlite::Connection` must not be used from two threads at once, so
//! each thread that touches a store gets its own connection to the store's
//! file, created on first use and cached under `(path, thread id)`. Lookups
//! go through a thread-local fast path first; the registry mutex is only
//! taken to create a connection or to miss the fast path.
//!
//! The registry owns every connection it created. [`ConnectionRegistry::close_all`]
//! (also run on drop) releases them; a thread that still holds a handle
//! keeps its connection alive until it lets go.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};
use std::time::Duration;

use parking_lot::Mutex;
use rusqlite::Connection;
use structdb_core::schema;
use structdb_settings::{DatabaseSettings, JournalMode};
use tracing::debug;

use crate::errors::Result;

/// A connection shared between the registry and its owning thread.
pub type SharedConnection = Arc<Mutex<Connection>>;

static NEXT_REGISTRY_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    // registry id -> (registry generation, connection)
    static LOCAL_CONNECTIONS: RefCell<HashMap<u64, (u64, Weak<Mutex<Connection>>)>> =
        RefCell::new(HashMap::new());
}

/// Pragmas applied to every new connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConnectionOptions {
    /// Busy timeout in milliseconds.
    pub busy_timeout_ms: u32,
    /// Journal mode.
    pub journal_mode: JournalMode,
}

impl ConnectionOptions {
    /// Options taken from database settings.
    pub fn from_settings(settings: &DatabaseSettings) -> Self {
        Self {
            busy_timeout_ms: settings.busy_timeout_ms,
            journal_mode: settings.journal_mode,
        }
    }
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self::from_settings(&DatabaseSettings::default())
    }
}

/// Registry key: one connection per file and thread.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ConnectionKey {
    /// Database file path.
    pub path: PathBuf,
    /// Owning thread.
    pub thread: ThreadId,
}

/// Lazily created, per-thread connections to one database file.
pub struct ConnectionRegistry {
    id: u64,
    generation: AtomicU64,
    path: PathBuf,
    options: ConnectionOptions,
    connections: Mutex<HashMap<ConnectionKey, SharedConnection>>,
}

impl ConnectionRegistry {
    /// Create an empty registry for `path`. No connection is opened yet.
    pub fn new(path: impl Into<PathBuf>, options: ConnectionOptions) -> Self {
        Self {
            id: NEXT_REGISTRY_ID.fetch_add(1, Ordering::Relaxed),
            generation: AtomicU64::new(0),
            path: path.into(),
            options,
            connections: Mutex::new(HashMap::new()),
        }
    }

    /// Database file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Options applied to new connections.
    pub fn options(&self) -> ConnectionOptions {
        self.options
    }

    /// The calling thread's connection, created on first use.
    pub fn connection(&self) -> Result<SharedConnection> {
        if let Some(conn) = self.cached() {
            return Ok(conn);
        }

        let key = ConnectionKey {
            path: self.path.clone(),
            thread: thread::current().id(),
        };
        let conn = {
            let mut connections = self.connections.lock();
            if let Some(existing) = connections.get(&key) {
                Arc::clone(existing)
            } else {
                let conn = Arc::new(Mutex::new(self.open_connection()?));
                let _ = connections.insert(key, Arc::clone(&conn));
                debug!(
                    path = %self.path.display(),
                    thread = ?thread::current().id(),
                    total = connections.len(),
                    "opened connection"
                );
                conn
            }
        };
        self.remember(&conn);
        Ok(conn)
    }

    /// Run `f` with the calling thread's connection locked.
    pub fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self.connection()?;
        let guard = conn.lock();
        f(&guard)
    }

    /// Number of registered connections.
    pub fn len(&self) -> usize {
        self.connections.lock().len()
    }

    /// Whether no connection has been opened (or all were closed).
    pub fn is_empty(&self) -> bool {
        self.connections.lock().is_empty()
    }

    /// Release every registered connection. Returns how many were released.
    pub fn close_all(&self) -> usize {
        let drained: Vec<SharedConnection> = {
            let mut connections = self.connections.lock();
            let _ = self.generation.fetch_add(1, Ordering::AcqRel);
            connections.drain().map(|(_, conn)| conn).collect()
        };
        let closed = drained.len();
        if closed > 0 {
            debug!(path = %self.path.display(), closed, "closed connections");
        }
        closed
    }

    fn cached(&self) -> Option<SharedConnection> {
        let generation = self.generation.load(Ordering::Acquire);
        LOCAL_CONNECTIONS
            .try_with(|local| {
                local
                    .borrow()
                    .get(&self.id)
                    .filter(|(seen, _)| *seen == generation)
                    .and_then(|(_, weak)| weak.upgrade())
            })
            .ok()
            .flatten()
    }

    fn remember(&self, conn: &SharedConnection) {
        let generation = self.generation.load(Ordering::Acquire);
        let _ = LOCAL_CONNECTIONS.try_with(|local| {
            let mut local = local.borrow_mut();
            local.retain(|_, (_, weak)| weak.strong_count() > 0);
            let _ = local.insert(self.id, (generation, Arc::downgrade(conn)));
        });
    }

    fn open_connection(&self) -> Result<Connection> {
        if let Some(parent) = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty() && !p.exists())
        {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(Duration::from_millis(u64::from(self.options.busy_timeout_ms)))?;
        // No-op once the file has tables.
        conn.execute_batch(schema::AUTO_VACUUM_SQL)?;
        conn.execute_batch(&format!(
            "PRAGMA journal_mode = {};",
            self.options.journal_mode.pragma_value()
        ))?;
        Ok(conn)
    }
}

impl Drop for ConnectionRegistry {
    fn drop(&mut self) {
        let _ = self.close_all();
    }
}

impl std::fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionRegistry")
            .field("path", &self.path)
            .field("options", &self.options)
            .field("connections", &self.len())
            .finish_non_exhaustive()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
