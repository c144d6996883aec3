//! # Database Module
//!
//! This module provides the execution engine of Sphinx DB: the `Connection`
//! trait that abstracts the database primitive, the classified `QueryResult`
//! it returns, the `Database` handle that runs statements built by the
//! [`query`](crate::query) module, and the per-entity `Repository` surface.

// ============================================================================
// External Crate Imports
// ============================================================================

use futures::future::BoxFuture;
use std::{fmt, marker::PhantomData, sync::Arc, time::{Duration, Instant}};

// ============================================================================
// Internal Crate Imports
// ============================================================================

use crate::{
    condition::Condition,
    entity::{Column, Entity},
    hydrate::{hydrate_all, ColumnsId, RawRow},
    link::Outcome,
    postgres::PgConnection,
    query::{self, Statement},
    registry::Registry,
    value::{ColumnValue, SqlValue},
    Error, Result,
};

// ============================================================================
// Connection Trait
// ============================================================================

/// The database primitive: run one statement with bound parameters and hand
/// back the fully materialized result.
///
/// Implementations never fail at the Rust level; driver errors are reported
/// through [`ExecStatus::Error`] so that classification happens in one place.
pub trait Connection: Send + Sync {
    fn execute<'a>(&'a self, sql: &'a str, params: &'a [SqlValue]) -> BoxFuture<'a, QueryResult>;
}

/// Outcome class of an executed statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecStatus {
    /// Completed without a result set.
    CommandOk,
    /// Completed with a (possibly empty) result set.
    RowsOk,
    /// Rejected by the driver, with its message.
    Error(String),
}

/// A materialized result: field names and text cells, one `Vec` per row.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    status: ExecStatus,
    fields: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
    rows_affected: u64,
}

impl QueryResult {
    pub fn command(rows_affected: u64) -> Self {
        Self { status: ExecStatus::CommandOk, fields: Vec::new(), rows: Vec::new(), rows_affected }
    }

    pub fn with_rows(fields: Vec<String>, rows: Vec<Vec<Option<String>>>) -> Self {
        let rows_affected = rows.len() as u64;
        Self { status: ExecStatus::RowsOk, fields, rows, rows_affected }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { status: ExecStatus::Error(message.into()), fields: Vec::new(), rows: Vec::new(), rows_affected: 0 }
    }

    pub fn status(&self) -> &ExecStatus {
        &self.status
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn rows(&self) -> &[Vec<Option<String>>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn rows_affected(&self) -> u64 {
        self.rows_affected
    }
}

// ============================================================================
// Database Struct
// ============================================================================

/// The main entry point for Sphinx DB operations.
///
/// `Database` is cheap to clone and is meant to be shared across request
/// handlers. Every operation requires its entity to be part of the registry
/// the handle was built with.
#[derive(Clone)]
pub struct Database {
    conn: Arc<dyn Connection>,
    registry: Arc<Registry>,
    query_timeout: Option<Duration>,
    log_target: Arc<str>,
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("registry", &self.registry)
            .field("query_timeout", &self.query_timeout)
            .field("log_target", &self.log_target)
            .finish_non_exhaustive()
    }
}

impl Database {
    /// Creates a new DatabaseBuilder for configuring the connection.
    pub fn builder() -> DatabaseBuilder {
        DatabaseBuilder::new()
    }

    /// Connects to PostgreSQL with default settings.
    pub async fn connect(url: &str, registry: Registry) -> Result<Self> {
        DatabaseBuilder::new().connect(url, registry).await
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Starts working with the specified entity.
    pub fn model<E: Entity>(&self) -> Repository<'_, E> {
        Repository { db: self, _entity: PhantomData }
    }

    pub(crate) fn log_target(&self) -> &str {
        &self.log_target
    }

    pub(crate) fn ensure_registered<E: Entity>(&self) -> Result<()> {
        match self.registry.entity(E::TABLE) {
            Some(_) => Ok(()),
            None => Err(Error::Schema(format!("entity {} is not registered", E::TABLE))),
        }
    }

    /// Runs a statement and classifies the result. Driver errors become
    /// `Error::Query`; nothing of a failed result escapes.
    pub async fn execute(&self, statement: &Statement) -> Result<QueryResult> {
        let target = self.log_target();
        let started = Instant::now();
        let pending = self.conn.execute(&statement.sql, &statement.params);

        let result = match self.query_timeout {
            Some(limit) => match tokio::time::timeout(limit, pending).await {
                Ok(result) => result,
                Err(_) => {
                    log::error!(target: target, "{} timed out after {:?}", statement.sql, limit);
                    return Err(Error::Timeout(limit));
                }
            },
            None => pending.await,
        };

        match result.status() {
            ExecStatus::Error(message) => {
                log::error!(target: target, "{} failed: {}", statement.sql, message);
                Err(Error::Query(message.clone()))
            }
            status => {
                log::debug!(
                    target: target,
                    "{} {:?} -> {:?}, {} row(s) in {:?}",
                    statement.sql,
                    statement.params,
                    status,
                    result.row_count(),
                    started.elapsed()
                );
                Ok(result)
            }
        }
    }

    /// Returns every row of the entity's table.
    pub async fn select_all<E: Entity>(&self) -> Result<Vec<E>> {
        self.ensure_registered::<E>()?;
        let result = self.execute(&query::select_all::<E>()).await?;
        hydrate_all(&result)
    }

    /// Returns the rows matching a single-column condition.
    pub async fn select_where<E: Entity>(&self, condition: Condition<E>) -> Result<Vec<E>> {
        self.ensure_registered::<E>()?;
        let result = self.execute(&query::select_where(condition)).await?;
        hydrate_all(&result)
    }

    /// Looks up one entity by primary key.
    ///
    /// More than one row for a primary key is a consistency fault, not a
    /// result.
    pub async fn find_by_id<E: Entity>(&self, id: &E::Id) -> Result<Option<E>> {
        let pk = E::primary_key();
        let condition = Condition::eq(Column::<E, E::Id>::new(pk.index, pk.name), id.clone())?;
        let mut rows = self.select_where(condition).await?;
        match rows.len() {
            0 => Ok(None),
            1 => Ok(rows.pop()),
            n => {
                log::error!(target: self.log_target(), "{} rows in {} share primary key {:?}", n, E::TABLE, id);
                Err(Error::Consistency(format!("{} rows in {} for {} = {:?}", n, E::TABLE, pk.name, id)))
            }
        }
    }

    pub async fn exists<E: Entity>(&self, id: &E::Id) -> Result<bool> {
        self.ensure_registered::<E>()?;
        let result = self.execute(&query::exists::<E>(id)?).await?;
        let cell = match result.rows() {
            [row] if row.len() == 1 => row[0].as_deref(),
            _ => {
                log::error!(target: self.log_target(), "EXISTS on {} returned {} row(s)", E::TABLE, result.row_count());
                return Err(Error::Consistency(format!("EXISTS on {} did not return a single value", E::TABLE)));
            }
        };
        match cell {
            Some(raw) => bool::from_cell(raw).map_err(|e| Error::conversion("exists", e)),
            None => Err(Error::Consistency(format!("EXISTS on {} returned NULL", E::TABLE))),
        }
    }

    /// Inserts one entity and returns the id assigned by the database.
    ///
    /// The entity is left untouched; callers that keep it set the id themselves.
    pub async fn insert<E: Entity>(&self, entity: &E) -> Result<E::Id> {
        self.ensure_registered::<E>()?;
        let statement = query::insert(entity)?;
        let result = self.execute(&statement).await?;

        if *result.status() == ExecStatus::CommandOk {
            log::error!(target: self.log_target(), "INSERT into {} returned no result set", E::TABLE);
            return Err(Error::Consistency(format!("INSERT into {} returned no result set", E::TABLE)));
        }
        if result.row_count() != 1 {
            log::error!(target: self.log_target(), "INSERT into {} returned {} rows", E::TABLE, result.row_count());
            return Err(Error::Consistency(format!("INSERT into {} returned {} rows, expected 1", E::TABLE, result.row_count())));
        }

        let pk = E::primary_key();
        let ids = ColumnsId::resolve::<E>(result.fields());
        let field = ids.field(pk).unwrap_or(0);
        match RawRow::new(&result.rows()[0]).cell(field) {
            Some(raw) => E::Id::from_cell(raw).map_err(|e| Error::conversion(pk.qualified_name(), e)),
            None => Err(Error::Consistency(format!("INSERT into {} returned a NULL {}", E::TABLE, pk.name))),
        }
    }
}

// ============================================================================
// DatabaseBuilder Struct
// ============================================================================

pub struct DatabaseBuilder {
    max_connections: u32,
    query_timeout: Option<Duration>,
    log_target: String,
}

impl Default for DatabaseBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DatabaseBuilder {
    pub fn new() -> Self {
        Self { max_connections: 5, query_timeout: None, log_target: "sphinx_db".to_string() }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Fails any statement that takes longer than `limit` with `Error::Timeout`.
    pub fn query_timeout(mut self, limit: Duration) -> Self {
        self.query_timeout = Some(limit);
        self
    }

    /// Target used for every log record emitted by this handle.
    pub fn log_target(mut self, target: impl Into<String>) -> Self {
        self.log_target = target.into();
        self
    }

    pub async fn connect(self, url: &str, registry: Registry) -> Result<Database> {
        let conn = PgConnection::connect(url, self.max_connections).await?;
        log::info!(target: self.log_target.as_str(), "connected to PostgreSQL (max {} connections)", self.max_connections);
        Ok(self.with_connection(Arc::new(conn), registry))
    }

    /// Builds a handle over any [`Connection`] implementation.
    pub fn with_connection(self, conn: Arc<dyn Connection>, registry: Registry) -> Database {
        Database {
            conn,
            registry: Arc::new(registry),
            query_timeout: self.query_timeout,
            log_target: Arc::from(self.log_target),
        }
    }
}

// ============================================================================
// Repository
// ============================================================================

/// Per-entity operations, obtained with [`Database::model`].
pub struct Repository<'a, E> {
    db: &'a Database,
    _entity: PhantomData<fn() -> E>,
}

impl<'a, E: Entity> Repository<'a, E> {
    pub async fn list(&self) -> Result<Vec<E>> {
        self.db.select_all::<E>().await
    }

    pub async fn find(&self, id: &E::Id) -> Result<Option<E>> {
        self.db.find_by_id::<E>(id).await
    }

    /// Like [`find`](Self::find), but a missing row is `Error::NotFound`.
    pub async fn get(&self, id: &E::Id) -> Result<E> {
        match self.find(id).await? {
            Some(entity) => Ok(entity),
            None => Err(Error::NotFound { table: E::TABLE, id: format!("{:?}", id) }),
        }
    }

    pub async fn exists(&self, id: &E::Id) -> Result<bool> {
        self.db.exists::<E>(id).await
    }

    pub async fn filter(&self, condition: Condition<E>) -> Result<Vec<E>> {
        self.db.select_where(condition).await
    }

    pub async fn find_by_column<T: ColumnValue>(&self, column: Column<E, T>, value: T) -> Result<Vec<E>> {
        self.filter(Condition::eq(column, value)?).await
    }

    /// Deserializes and creates one entity or an array of entities, with
    /// their nested collections.
    pub async fn create(&self, body: &serde_json::Value) -> Result<Vec<Outcome>> {
        self.db.create::<E>(body).await
    }

    /// Resolves a foreign key of `entity` to the referenced entity.
    ///
    /// `None` when the key is unset or NULL, or when the referenced row is gone.
    pub async fn referenced<P: Entity>(&self, entity: &E, column: Column<E, P::Id>) -> Result<Option<P>> {
        let info = column.info();
        match info.references {
            Some(target) if target.table == P::TABLE => {}
            _ => return Err(Error::Schema(format!("{} does not reference {}", info.qualified_name(), P::TABLE))),
        }
        let value = match entity.value(info.index) {
            Ok(value) if !value.is_null() => value,
            Ok(_) | Err(Error::Validation(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        let id = P::Id::from_sql(value).map_err(|e| Error::conversion(info.qualified_name(), e))?;
        self.db.find_by_id::<P>(&id).await
    }
}
