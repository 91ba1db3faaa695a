//! # structdb-store
//!
//! `SQLite` execution for structdb tables.
//!
//! - **Connection registry**: one lazily opened connection per (file, thread), thread-local fast path
//! - **Typed store**: create-or-validate at open, then add/read/update/count/evict/clear by table position
//! - **Layout**: read a file's tables and columns back, validate them against derived schemas
//! - **Maintenance**: the same statements by table name, for tools without record types
//! - **Worker / async store**: a single background thread running store operations in submission order
//!
//! ```ignore
//! structdb_core::record! {
//!     pub struct Reading { pub sensor: i32, pub label: String }
//! }
//!
//! let store = TypedStore::<(Reading,)>::open("readings.db");
//! store.add::<0>(&Reading { sensor: 1, label: "a".into() });
//! let rows = store.read::<0>(0, 10, &Filter::<Reading, i32>::column::<0>().equal().value(1));
//! ```

#![deny(unsafe_code)]

pub mod async_store;
pub mod connection;
pub mod errors;
pub mod layout;
pub mod maintenance;
pub mod store;
pub mod worker;

pub use async_store::AsyncStore;
pub use connection::{ConnectionKey, ConnectionOptions, ConnectionRegistry, SharedConnection};
pub use errors::{Result, SchemaMismatch, StoreError};
pub use layout::{ColumnLayout, TableLayout, inspect_layout, table_position, validate_layout};
pub use maintenance::StoreFile;
pub use store::TypedStore;
pub use worker::{Worker, WorkerState};
