//! SQL text builders.
//!
//! Every builder returns a [`Statement`]: the SQL text with `$n` placeholders
//! and the values to bind, in placeholder order. Values never appear inside
//! the text.

use crate::{
    condition::Condition,
    entity::Entity,
    value::{ColumnValue, SqlValue},
    Error, Result,
};

#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl Statement {
    fn new(sql: String, params: Vec<SqlValue>) -> Self {
        Self { sql, params }
    }
}

/// `SELECT * FROM <table>`
pub fn select_all<E: Entity>() -> Statement {
    Statement::new(format!("SELECT * FROM {}", E::TABLE), Vec::new())
}

/// `SELECT * FROM <table> WHERE <column> <op> $1`
pub fn select_where<E: Entity>(condition: Condition<E>) -> Statement {
    let sql = format!("SELECT * FROM {} WHERE {}", E::TABLE, condition.render(1));
    let (_, _, value) = condition.into_parts();
    Statement::new(sql, vec![value])
}

/// `SELECT EXISTS(SELECT 1 FROM <table> WHERE <pk> = $1)`
pub fn exists<E: Entity>(id: &E::Id) -> Result<Statement> {
    let pk = E::primary_key();
    let value = id.to_sql().map_err(|e| Error::conversion(pk.qualified_name(), e))?;
    Ok(Statement::new(format!("SELECT EXISTS(SELECT 1 FROM {} WHERE {} = $1)", E::TABLE, pk.name), vec![value]))
}

/// Column names written by INSERT, in declaration order.
pub fn insert_columns<E: Entity>() -> Vec<&'static str> {
    E::insert_columns().map(|c| c.name).collect()
}

/// `INSERT INTO <table> (<columns>) VALUES ($1, ..., $n) RETURNING <pk>`
///
/// Reading the values is where unset required foreign keys are caught, so
/// this fails before any SQL is sent.
pub fn insert<E: Entity>(entity: &E) -> Result<Statement> {
    let mut names = Vec::with_capacity(E::COLUMNS.len());
    let mut placeholders = Vec::with_capacity(E::COLUMNS.len());
    let mut params = Vec::with_capacity(E::COLUMNS.len());

    for column in E::insert_columns() {
        params.push(entity.value(column.index)?);
        names.push(column.name);
        placeholders.push(format!("${}", params.len()));
    }

    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
        E::TABLE,
        names.join(", "),
        placeholders.join(", "),
        E::primary_key().name
    );
    Ok(Statement::new(sql, params))
}
