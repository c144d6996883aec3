//! PostgreSQL implementation of [`Connection`] over a `sqlx` pool.

use chrono::{DateTime, NaiveDateTime, Utc};
use futures::future::BoxFuture;
use sqlx::{
    error::BoxDynError,
    postgres::{PgArguments, PgPool, PgPoolOptions, PgRow},
    Arguments, Column, Row, TypeInfo,
};
use uuid::Uuid;

use crate::{
    database::{Connection, QueryResult},
    value::{SqlType, SqlValue},
    Result,
};

/// Pooled PostgreSQL connection. The pool serializes concurrent callers per
/// physical connection.
#[derive(Debug, Clone)]
pub struct PgConnection {
    pool: PgPool,
}

impl PgConnection {
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new().max_connections(max_connections).connect(url).await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn run(&self, sql: &str, params: &[SqlValue]) -> std::result::Result<QueryResult, sqlx::Error> {
        let mut args = PgArguments::default();
        for value in params {
            bind(&mut args, value).map_err(sqlx::Error::Encode)?;
        }

        if !returns_rows(sql) {
            let done = sqlx::query_with(sql, args).execute(&self.pool).await?;
            return Ok(QueryResult::command(done.rows_affected()));
        }

        let rows = sqlx::query_with(sql, args).fetch_all(&self.pool).await?;
        let fields = rows
            .first()
            .map(|row| row.columns().iter().map(|c| c.name().to_string()).collect())
            .unwrap_or_default();
        let cells = rows.iter().map(row_cells).collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(QueryResult::with_rows(fields, cells))
    }
}

impl Connection for PgConnection {
    fn execute<'a>(&'a self, sql: &'a str, params: &'a [SqlValue]) -> BoxFuture<'a, QueryResult> {
        Box::pin(async move {
            match self.run(sql, params).await {
                Ok(result) => result,
                Err(sqlx::Error::Database(e)) => QueryResult::error(e.message()),
                Err(e) => QueryResult::error(e.to_string()),
            }
        })
    }
}

fn returns_rows(sql: &str) -> bool {
    let head = sql.trim_start();
    head.get(..6).is_some_and(|s| s.eq_ignore_ascii_case("select")) || sql.contains(" RETURNING ")
}

fn bind(args: &mut PgArguments, value: &SqlValue) -> std::result::Result<(), BoxDynError> {
    match value {
        SqlValue::Null(sql_type) => match sql_type {
            SqlType::Integer => args.add(None::<i32>),
            SqlType::BigInt => args.add(None::<i64>),
            SqlType::Boolean => args.add(None::<bool>),
            SqlType::Double => args.add(None::<f64>),
            SqlType::Text => args.add(None::<String>),
            SqlType::Timestamp => args.add(None::<DateTime<Utc>>),
            SqlType::Uuid => args.add(None::<Uuid>),
        },
        SqlValue::Bool(v) => args.add(*v),
        SqlValue::Int(v) => args.add(*v),
        SqlValue::BigInt(v) => args.add(*v),
        SqlValue::Double(v) => args.add(*v),
        SqlValue::Text(v) => args.add(v.clone()),
        SqlValue::Timestamp(v) => args.add(*v),
        SqlValue::Uuid(v) => args.add(*v),
    }
}

/// Renders every cell in PostgreSQL text format, so hydration is identical
/// whichever driver produced the row.
fn row_cells(row: &PgRow) -> std::result::Result<Vec<Option<String>>, sqlx::Error> {
    (0..row.len()).map(|i| cell(row, i)).collect()
}

fn cell(row: &PgRow, i: usize) -> std::result::Result<Option<String>, sqlx::Error> {
    let text = match row.column(i).type_info().name() {
        "INT2" => row.try_get::<Option<i16>, _>(i)?.map(|v| v.to_string()),
        "INT4" => row.try_get::<Option<i32>, _>(i)?.map(|v| v.to_string()),
        "INT8" => row.try_get::<Option<i64>, _>(i)?.map(|v| v.to_string()),
        "FLOAT4" => row.try_get::<Option<f32>, _>(i)?.map(|v| v.to_string()),
        "FLOAT8" => row.try_get::<Option<f64>, _>(i)?.map(|v| v.to_string()),
        "BOOL" => row.try_get::<Option<bool>, _>(i)?.map(|v| if v { "t" } else { "f" }.to_string()),
        "TIMESTAMPTZ" => row.try_get::<Option<DateTime<Utc>>, _>(i)?.map(|v| v.to_rfc3339()),
        "TIMESTAMP" => row.try_get::<Option<NaiveDateTime>, _>(i)?.map(|v| v.and_utc().to_rfc3339()),
        "UUID" => row.try_get::<Option<Uuid>, _>(i)?.map(|v| v.to_string()),
        _ => row.try_get::<Option<String>, _>(i)?,
    };
    Ok(text)
}
