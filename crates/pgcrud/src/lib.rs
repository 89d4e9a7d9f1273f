//! # pgcrud
//!
//! A key-value CRUD convenience layer over `tokio-postgres`.
//!
//! ## Features
//!
//! - **Field maps, not models**: select/insert/update/delete driven by plain
//!   column-to-value maps (the [`fields!`] macro), no derive layer
//! - **Soft deletes**: an optional status-column convention turns deletes
//!   into status flips and filters to active rows by default
//! - **Schema-aware sanitization**: writes can validate and coerce fields
//!   against the live schema, and skip updates whose values are unchanged
//! - **Index-by-column**: reshape result rows into a map keyed by one column
//! - **Transaction-friendly**: pass a transaction anywhere a
//!   [`GenericClient`] is expected
//!
//! ## Usage
//!
//! ```ignore
//! use pgcrud::{fields, Crud, CrudConfig, OnConflict, StatusConvention, UpdateKey};
//!
//! let crud = Crud::new(
//!     client,
//!     CrudConfig::new()
//!         .status(StatusConvention::numeric("status"))
//!         .sanitize_fields(true),
//! );
//!
//! // INSERT ... RETURNING usersid
//! let id = crud.insert("users", &fields! { "name" => "Alice" }, None).await?;
//!
//! // SELECT with an implicit active-status predicate
//! let rows = crud.select("users", &fields! { "name" => "Alice" }, None).await?;
//!
//! // UPDATE, skipped entirely when nothing changed
//! let outcome = crud
//!     .update("users", &UpdateKey::Id(id.clone()), &fields! { "name" => "Alice" })
//!     .await?;
//! assert!(!outcome.updated);
//!
//! // Soft delete (UPDATE status, not DELETE)
//! crud.delete("users", &id, None).await?;
//! ```

pub mod builder;
pub mod client;
pub mod config;
pub mod crud;
pub mod error;
pub mod row;
pub mod schema;
pub mod value;

pub use builder::{primary_key_column, OnConflict, UpdateKey};
pub use client::GenericClient;
pub use config::{CrudConfig, Status, StatusConvention};
pub use crud::{Crud, UpdateOutcome};
pub use error::{CrudError, CrudResult};
pub use row::{index_by, row_to_fields, rows_to_fields, RowExt};
pub use schema::{ColumnMeta, Sanitized};
pub use value::{FieldMap, Value};

#[cfg(feature = "pool")]
pub mod pool;

#[cfg(feature = "pool")]
pub use pool::{create_pool, create_pool_with_config, crud_from_pool};
