//! # structdb-core
//!
//! Record declaration, positional schema mapping, and dual-form filters.
//!
//! This crate holds everything about a store that is decided at compile time:
//!
//! - **Fields**: the closed set of storable types (`i32`, `i64`, `f64`, `bool`, `String`, `DateTime<Utc>`)
//! - **Records**: the `record!` macro declares a struct and its ordered field list
//! - **Tables**: a tuple of record types fixes table positions; `TableAt<N>` resolves them
//! - **Schema mapping**: `table<p>` / `_<i><type>` naming and SQL rendering for every operation
//! - **Filters**: one-shot predicates with a SQL fragment form and an in-memory evaluation form
//!
//! Nothing here touches a database; `structdb-store` executes the rendered SQL.

#![deny(unsafe_code)]

pub mod errors;
pub mod field;
pub mod filter;
pub mod record;
pub mod schema;
pub mod tables;

pub use errors::DecodeError;
pub use field::{Field, FieldType, FieldValue};
pub use filter::{Blank, Comparand, Comparison, Filter, FilterTarget};
pub use record::{ActivationKeyed, Record, StoredRow};
pub use schema::{Column, TableSchema};
pub use tables::{At, RecordAt, TableAt, TableOf, Tables};
