//! inventory-query - relational persistence for the inventory storage provider
//!
//! Entity types declare their table once; everything else (DDL, parameter
//! binding, row mapping, filtering, paging and tenant scoping) is derived from
//! that declaration and implemented once for every entity.
//!
//! # Architecture
//!
//! - **Schema Model**: [`Entity::describe`] builds a [`TableDescriptor`], cached per type
//! - **Schema Sync**: missing tables and columns are created at startup, forward-only
//! - **Value Codec / Binder / Mapper**: records travel through serde to and from rows
//! - **Predicates**: typed filters translated to parameterized SQL
//! - **Paging & Tenant Scope**: allow-listed sorting and a uniform ownership clause
//! - **Backends**: SQLite and PostgreSQL through sqlx
//!
//! # Example
//!
//! ```rust,no_run
//! use inventory_query::prelude::*;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Default, Serialize, Deserialize)]
//! struct Item {
//!     id: i64,
//!     name: String,
//!     quantity: i32,
//!     tags: Vec<String>,
//!     owner_id: Option<uuid::Uuid>,
//! }
//!
//! impl Entity for Item {
//!     fn describe() -> TableBuilder {
//!         TableBuilder::new("Items")
//!             .key("id", FieldType::Int64)
//!             .field("name", FieldType::Text)
//!             .max_length(200)
//!             .field("quantity", FieldType::Int32)
//!             .list("tags")
//!             .owned_by("owner_id")
//!             .sortable(&["name", "quantity"])
//!     }
//! }
//!
//! # #[cfg(feature = "sqlite")]
//! # async fn run() -> Result<()> {
//! let generator = SchemaGenerator::new().with::<Item>()?;
//! let provider: StorageProvider<SqliteBackend> =
//!     StorageProvider::connect(&StoreConfig::new("sqlite://inventory.db"), generator).await?;
//!
//! let items = provider.repository::<Item>()?;
//! let scope = OwnerScope::owned_by(uuid::Uuid::new_v4());
//! items.add(&scope, &Item { name: "M4 bolt".into(), quantity: 40, ..Default::default() }).await?;
//!
//! let low_stock = items.find(&scope, &Predicate::lt("quantity", 50)).await?;
//! let page = items
//!     .page(&scope, &PageRequest::new(1, 10).sort_by("name", SortDirection::Asc))
//!     .await?;
//! println!("{} low, {} total", low_stock.len(), page.total_items);
//! # Ok(())
//! # }
//! ```
//!
//! # Backend Support
//!
//! Enable backends via Cargo features (SQLite is on by default):
//!
//! ```toml
//! [dependencies]
//! inventory-query = { version = "0.1", features = ["postgres"] }
//! ```

pub mod backend;
pub mod codec;
pub mod config;
pub mod error;
pub mod executor;
pub mod mapper;
pub mod params;
pub mod predicate;
pub mod provider;
pub mod query;
pub mod repository;
pub mod schema;
pub mod sync;

#[cfg(feature = "postgres")]
pub mod postgres;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use backend::{DatabaseBackend, QueryResult, QueryRow};
pub use codec::{SqlValue, ValueKind};
pub use config::StoreConfig;
pub use error::{QueryError, Result};
pub use executor::Executor;
pub use params::ParameterSet;
pub use predicate::{CompareOp, Filter, LogicalOp, Predicate};
pub use provider::StorageProvider;
pub use query::{
    OwnerScope, OwnershipContext, Page, PageLimits, PageRequest, QueryBuilder, SortDirection,
};
pub use repository::Repository;
pub use schema::{
    Dialect, Entity, FieldDescriptor, FieldType, SchemaGenerator, TableBuilder, TableDescriptor,
};
pub use sync::{SchemaSync, SyncReport};

#[cfg(feature = "postgres")]
pub use postgres::PostgresBackend;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteBackend;

/// Prelude for common imports
pub mod prelude {
    pub use crate::backend::DatabaseBackend;
    pub use crate::config::StoreConfig;
    pub use crate::error::{QueryError, Result};
    pub use crate::predicate::Predicate;
    pub use crate::provider::StorageProvider;
    pub use crate::query::{OwnerScope, OwnershipContext, Page, PageRequest, SortDirection};
    pub use crate::repository::Repository;
    pub use crate::schema::{Entity, FieldType, SchemaGenerator, TableBuilder};

    #[cfg(feature = "postgres")]
    pub use crate::postgres::PostgresBackend;

    #[cfg(feature = "sqlite")]
    pub use crate::sqlite::SqliteBackend;
}
