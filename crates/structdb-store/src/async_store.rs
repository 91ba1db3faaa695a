//! A [`TypedStore`] behind a single [`Worker`].
//!
//! Every operation submitted through an [`AsyncStore`] runs on the worker
//! thread, one at a time, in submission order. That total order is what
//! makes a write followed by a read observe the write, since the store
//! itself does no locking.
//!
//! Two surfaces are offered:
//!
//! - callback methods (`add`, `read`, ...) mirror the blocking fail-closed
//!   operations; the callback runs on the worker thread
//! - [`AsyncStore::call`] runs any closure on the worker and returns a
//!   future resolving to its result
//!
//! Dropping the `AsyncStore` shuts the worker down first (discarding queued
//! tasks without calling their callbacks), then closes the store.

use std::path::Path;
use std::sync::Arc;

use structdb_core::{Comparand, Filter, RecordAt, StoredRow, TableAt, Tables};
use structdb_settings::StructDbSettings;
use tokio::sync::oneshot;

use crate::errors::{Result, StoreError};
use crate::store::TypedStore;
use crate::worker::Worker;

/// A typed store whose operations are serialized on one worker thread.
pub struct AsyncStore<S: Tables> {
    // Dropped first: the worker must stop before the store it serves.
    worker: Worker,
    store: Arc<TypedStore<S>>,
}

impl<S: Tables> AsyncStore<S> {
    /// Open the store at `path` with default settings.
    pub fn open(path: impl AsRef<Path>) -> Self {
        Self::open_with(path, &StructDbSettings::default())
    }

    /// Open the store at `path` with explicit settings.
    ///
    /// Validation runs on the calling thread; the worker starts with the
    /// first submitted task.
    pub fn open_with(path: impl AsRef<Path>, settings: &StructDbSettings) -> Self {
        Self {
            worker: Worker::from_settings(&settings.worker),
            store: Arc::new(TypedStore::open_with(path, &settings.database)),
        }
    }

    /// The wrapped store, for direct (unserialized) calls.
    pub fn store(&self) -> &Arc<TypedStore<S>> {
        &self.store
    }

    /// The worker serving this store.
    pub fn worker(&self) -> &Worker {
        &self.worker
    }

    /// Whether the wrapped store passed validation.
    pub fn is_valid(&self) -> bool {
        self.store.is_valid()
    }

    /// Run `task` against the store on the worker thread.
    pub fn submit(&self, task: impl FnOnce(&TypedStore<S>) + Send + 'static) -> Result<()> {
        let store = Arc::clone(&self.store);
        self.worker.submit(move || task(&store))
    }

    /// Run `f` on the worker and await its result.
    ///
    /// Resolves to [`StoreError::TaskDropped`] if the worker shut down
    /// before the task ran.
    pub async fn call<T>(&self, f: impl FnOnce(&TypedStore<S>) -> T + Send + 'static) -> Result<T>
    where
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.submit(move |store| {
            let _ = tx.send(f(store));
        })?;
        rx.await.map_err(|_| StoreError::TaskDropped)
    }

    /// Insert `record` into table `N`; `callback` receives the outcome.
    pub fn add<const N: usize>(
        &self,
        record: RecordAt<S, N>,
        callback: impl FnOnce(bool) + Send + 'static,
    ) -> Result<()>
    where
        S: TableAt<N>,
    {
        self.submit(move |store| callback(store.add::<N>(&record)))
    }

    /// Read rows of table `N`; `callback` receives them (empty on failure).
    pub fn read<const N: usize>(
        &self,
        offset: u32,
        count: u32,
        filter: Filter<RecordAt<S, N>, impl Comparand>,
        callback: impl FnOnce(Vec<StoredRow<RecordAt<S, N>>>) + Send + 'static,
    ) -> Result<()>
    where
        S: TableAt<N>,
    {
        self.submit(move |store| callback(store.read::<N>(offset, count, &filter)))
    }

    /// Replace a row of table `N`; `callback` receives the outcome.
    pub fn update<const N: usize>(
        &self,
        row: StoredRow<RecordAt<S, N>>,
        callback: impl FnOnce(bool) + Send + 'static,
    ) -> Result<()>
    where
        S: TableAt<N>,
    {
        self.submit(move |store| callback(store.update::<N>(&row)))
    }

    /// Count rows of table `N` matching `filter`; `-1` on failure.
    pub fn number_of_records<const N: usize>(
        &self,
        filter: Filter<RecordAt<S, N>, impl Comparand>,
        callback: impl FnOnce(i64) + Send + 'static,
    ) -> Result<()>
    where
        S: TableAt<N>,
    {
        self.submit(move |store| callback(store.number_of_records::<N>(&filter)))
    }

    /// Largest row identifier of table `N`; `-1` on failure.
    pub fn max_row_id<const N: usize>(&self, callback: impl FnOnce(i64) + Send + 'static) -> Result<()>
    where
        S: TableAt<N>,
    {
        self.submit(move |store| callback(store.max_row_id::<N>()))
    }

    /// Evict the older half of table `N`.
    pub fn remove_half_records<const N: usize>(
        &self,
        callback: impl FnOnce(bool) + Send + 'static,
    ) -> Result<()>
    where
        S: TableAt<N>,
    {
        self.submit(move |store| callback(store.remove_half_records::<N>()))
    }

    /// Delete every row of table `N`.
    pub fn clear_table<const N: usize>(&self, callback: impl FnOnce(bool) + Send + 'static) -> Result<()>
    where
        S: TableAt<N>,
    {
        self.submit(move |store| callback(store.clear_table::<N>()))
    }

    /// Delete every row of every table, then compact.
    pub fn clear_all(&self, callback: impl FnOnce(bool) + Send + 'static) -> Result<()> {
        self.submit(move |store| callback(store.clear_all()))
    }

    /// Stop the worker. Queued tasks are discarded; the store stays usable
    /// through [`store`](Self::store).
    pub fn shutdown(&self) {
        self.worker.shutdown();
    }
}

impl<S: Tables> std::fmt::Debug for AsyncStore<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncStore")
            .field("store", &self.store)
            .field("worker", &self.worker)
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
