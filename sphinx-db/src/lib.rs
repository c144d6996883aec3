//! # Sphinx DB
//!
//! Entity reflection and persistence mapping for PostgreSQL.
//!
//! Entities are plain structs annotated with `#[derive(Entity)]`. The derive
//! describes each table as an ordered list of typed, tagged columns, and the
//! rest of the crate uses that metadata to build parameterized SQL, hydrate
//! rows, map entities to and from JSON, and create nested one-to-many trees.
//!
//! ```rust,ignore
//! use sphinx_db::{Database, Entity, Registry};
//!
//! #[derive(Entity)]
//! #[orm(table = "users")]
//! struct User {
//!     #[orm(primary_key)]
//!     id: u64,
//!     username: String,
//!     student_id: Option<String>,
//! }
//!
//! let registry = Registry::builder().register::<User>().build()?;
//! let db = Database::connect(&url, registry).await?;
//! let users: Vec<User> = db.model::<User>().list().await?;
//! ```

extern crate self as sphinx_db;

pub mod condition;
pub mod database;
pub mod entity;
pub mod error;
pub mod hydrate;
pub mod json;
pub mod link;
pub mod postgres;
pub mod query;
pub mod registry;
pub mod value;

pub use condition::{Condition, Op};
pub use database::{Connection, Database, DatabaseBuilder, ExecStatus, QueryResult, Repository};
pub use entity::{Column, ColumnInfo, Entity, Reference, Trait, Traits};
pub use error::{Error, Result};
pub use hydrate::{ColumnsId, RawRow};
pub use link::{ChildBatch, LinkManyInfo, Outcome};
pub use query::Statement;
pub use registry::{EntityMeta, Registry, RegistryBuilder};
pub use value::{ColumnValue, SqlType, SqlValue};

pub use sphinx_db_macro::Entity;

#[doc(hidden)]
pub use serde_json;
