#![allow(dead_code)]

use std::{
    collections::{HashMap, VecDeque},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use futures::future::BoxFuture;
use sphinx_db::{ColumnInfo, Connection, Database, Entity, QueryResult, Registry, SqlValue};

// ============================================================================
// Entities
// ============================================================================

#[derive(Debug, Clone, PartialEq, Entity)]
#[orm(table = "users")]
pub struct User {
    #[orm(primary_key, auto_increment)]
    pub id: u64,
    pub firstname: String,
    pub lastname: String,
    pub username: String,
    pub student_id: Option<String>,
    pub email: String,
    pub role: String,
}

#[derive(Debug, Clone, PartialEq, Entity)]
#[orm(table = "courses")]
pub struct Course {
    #[orm(primary_key, auto_increment)]
    pub id: u64,
    pub title: String,
    pub description: Option<String>,
    #[orm(foreign_key = "User::id", optional)]
    pub owner_id: Option<u64>,
    #[orm(link_many = "course_id")]
    pub modules: Option<Vec<Module>>,
}

#[derive(Debug, Clone, PartialEq, Entity)]
#[orm(table = "modules")]
pub struct Module {
    #[orm(primary_key, auto_increment)]
    pub id: u64,
    #[orm(foreign_key = "Course::id")]
    pub course_id: Option<u64>,
    pub title: String,
    pub description: Option<String>,
}

pub fn registry() -> Registry {
    Registry::builder()
        .register::<User>()
        .register::<Course>()
        .register::<Module>()
        .build()
        .expect("test entities are consistent")
}

pub fn user(username: &str) -> User {
    User {
        id: 0,
        firstname: "Ada".to_string(),
        lastname: "Lovelace".to_string(),
        username: username.to_string(),
        student_id: None,
        email: format!("{}@example.com", username),
        role: "student".to_string(),
    }
}

/// A `Database` over a fresh in-memory store holding the three test tables.
pub fn memory_db() -> (Arc<MemoryDb>, Database) {
    let mem = Arc::new(MemoryDb::new().with_table::<User>().with_table::<Course>().with_table::<Module>());
    let db = Database::builder().with_connection(mem.clone(), registry());
    (mem, db)
}

// ============================================================================
// In-memory connection
// ============================================================================

type Fault = Box<dyn Fn(&str, &[SqlValue]) -> Option<String> + Send + Sync>;

struct Table {
    columns: &'static [ColumnInfo],
    primary_key: usize,
    rows: Vec<Vec<Option<String>>>,
    next_id: u64,
}

/// Interprets the statements built by `sphinx_db::query` against in-memory
/// tables. Result sets list their fields in reverse declaration order so that
/// hydration has to go through field names. NOT NULL and foreign key
/// constraints are enforced with PostgreSQL's wording.
#[derive(Default)]
pub struct MemoryDb {
    tables: Mutex<HashMap<&'static str, Table>>,
    log: Mutex<Vec<String>>,
    fault: Mutex<Option<Fault>>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table<E: Entity>(self) -> Self {
        let table = Table { columns: E::COLUMNS, primary_key: E::PRIMARY_KEY, rows: Vec::new(), next_id: 1 };
        self.tables.lock().unwrap().insert(E::TABLE, table);
        self
    }

    /// Makes every statement for which `rule` returns a message fail with it.
    pub fn fail_when(&self, rule: impl Fn(&str, &[SqlValue]) -> Option<String> + Send + Sync + 'static) {
        *self.fault.lock().unwrap() = Some(Box::new(rule));
    }

    /// Stores a raw row, cells in declaration order, bypassing constraints.
    pub fn seed<E: Entity>(&self, cells: &[Option<&str>]) {
        let mut tables = self.tables.lock().unwrap();
        let table = tables.get_mut(E::TABLE).expect("table exists");
        table.rows.push(cells.iter().map(|c| c.map(str::to_string)).collect());
    }

    /// Rows of a table as column name → cell maps.
    pub fn rows<E: Entity>(&self) -> Vec<HashMap<&'static str, Option<String>>> {
        let tables = self.tables.lock().unwrap();
        let table = &tables[E::TABLE];
        table.rows.iter().map(|row| table.columns.iter().map(|c| c.name).zip(row.iter().cloned()).collect()).collect()
    }

    pub fn statements(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    fn run(&self, sql: &str, params: &[SqlValue]) -> Result<QueryResult, String> {
        self.log.lock().unwrap().push(sql.to_string());
        if let Some(message) = self.fault.lock().unwrap().as_ref().and_then(|rule| rule(sql, params)) {
            return Err(message);
        }

        let mut tables = self.tables.lock().unwrap();
        if let Some(rest) = sql.strip_prefix("SELECT EXISTS(SELECT 1 FROM ") {
            let (name, predicate) = rest.split_once(" WHERE ").ok_or("malformed EXISTS")?;
            let table = lookup(&tables, name)?;
            let predicate = predicate.strip_suffix(')').ok_or("malformed EXISTS")?;
            let found = !filter(table, Some(predicate), params)?.is_empty();
            return Ok(QueryResult::with_rows(vec!["exists".to_string()], vec![vec![Some(if found { "t" } else { "f" }.to_string())]]));
        }
        if let Some(rest) = sql.strip_prefix("SELECT * FROM ") {
            let (name, predicate) = match rest.split_once(" WHERE ") {
                Some((name, predicate)) => (name, Some(predicate)),
                None => (rest, None),
            };
            let table = lookup(&tables, name)?;
            let fields = table.columns.iter().rev().map(|c| c.name.to_string()).collect();
            let rows = filter(table, predicate, params)?
                .into_iter()
                .map(|row| row.iter().rev().cloned().collect())
                .collect();
            return Ok(QueryResult::with_rows(fields, rows));
        }
        if let Some(rest) = sql.strip_prefix("INSERT INTO ") {
            return insert(&mut tables, rest, params);
        }
        Err(format!("syntax error at or near \"{}\"", sql.split_whitespace().next().unwrap_or("")))
    }
}

impl Connection for MemoryDb {
    fn execute<'a>(&'a self, sql: &'a str, params: &'a [SqlValue]) -> BoxFuture<'a, QueryResult> {
        Box::pin(async move { self.run(sql, params).unwrap_or_else(QueryResult::error) })
    }
}

fn lookup<'t>(tables: &'t HashMap<&'static str, Table>, name: &str) -> Result<&'t Table, String> {
    tables.get(name.trim()).ok_or_else(|| format!("relation \"{}\" does not exist", name.trim()))
}

fn position(table: &Table, column: &str) -> Result<usize, String> {
    table.columns.iter().position(|c| c.name == column).ok_or_else(|| format!("column \"{}\" does not exist", column))
}

fn filter<'t>(table: &'t Table, predicate: Option<&str>, params: &[SqlValue]) -> Result<Vec<&'t Vec<Option<String>>>, String> {
    let Some(predicate) = predicate else {
        return Ok(table.rows.iter().collect());
    };
    let parts: Vec<&str> = predicate.split_whitespace().collect();
    let [column, op, "$1"] = parts.as_slice() else {
        return Err(format!("unsupported predicate {}", predicate));
    };
    let index = position(table, column)?;
    let value = params.first().ok_or("there is no parameter $1")?.to_cell();
    Ok(table.rows.iter().filter(|row| matches(row[index].as_deref(), op, value.as_deref())).collect())
}

fn matches(cell: Option<&str>, op: &str, value: Option<&str>) -> bool {
    let (Some(cell), Some(value)) = (cell, value) else {
        return false;
    };
    if op == "LIKE" {
        return like(cell, value);
    }
    let ordering = match (cell.parse::<f64>(), value.parse::<f64>()) {
        (Ok(a), Ok(b)) => a.partial_cmp(&b),
        _ => Some(cell.cmp(value)),
    };
    let Some(ordering) = ordering else {
        return false;
    };
    match op {
        "=" => ordering.is_eq(),
        "<>" => ordering.is_ne(),
        "<" => ordering.is_lt(),
        "<=" => ordering.is_le(),
        _ => false,
    }
}

/// `%` wildcards at either end only.
fn like(cell: &str, pattern: &str) -> bool {
    match (pattern.strip_prefix('%'), pattern.strip_suffix('%')) {
        (Some(rest), Some(_)) if rest.ends_with('%') => cell.contains(&rest[..rest.len() - 1]),
        (Some(suffix), None) => cell.ends_with(suffix),
        (None, Some(prefix)) => cell.starts_with(prefix),
        _ => cell == pattern,
    }
}

fn insert(tables: &mut HashMap<&'static str, Table>, rest: &str, params: &[SqlValue]) -> Result<QueryResult, String> {
    let (name, rest) = rest.split_once(" (").ok_or("malformed INSERT")?;
    let (columns, rest) = rest.split_once(") VALUES (").ok_or("malformed INSERT")?;
    let (placeholders, returning) = rest.split_once(") RETURNING ").ok_or("malformed INSERT")?;
    let columns: Vec<&str> = columns.split(", ").collect();
    let placeholders: Vec<&str> = placeholders.split(", ").collect();
    if columns.len() != placeholders.len() || placeholders.len() != params.len() {
        return Err(format!("INSERT has {} columns, {} placeholders and {} parameters", columns.len(), placeholders.len(), params.len()));
    }

    let table = lookup(tables, name)?;
    let mut row: Vec<Option<String>> = vec![None; table.columns.len()];
    for (column, value) in columns.iter().zip(params) {
        row[position(table, column)?] = value.to_cell();
    }
    for column in table.columns {
        let cell = row[column.index].as_deref();
        if cell.is_none() && !column.is_optional() && !column.is_primary_key() {
            return Err(format!("null value in column \"{}\" of relation \"{}\" violates not-null constraint", column.name, name));
        }
        if let (Some(target), Some(cell)) = (column.references, cell) {
            let referenced = lookup(tables, target.table)?;
            let pk = referenced.primary_key;
            if !referenced.rows.iter().any(|r| r[pk].as_deref() == Some(cell)) {
                return Err(format!("insert or update on table \"{}\" violates foreign key constraint on \"{}\"", name, column.name));
            }
        }
    }
    if position(table, returning)? != table.primary_key {
        return Err(format!("RETURNING {} is not the primary key", returning));
    }

    let table = tables.get_mut(name).ok_or("table vanished")?;
    let id = table.next_id.to_string();
    table.next_id += 1;
    row[table.primary_key] = Some(id.clone());
    table.rows.push(row);
    Ok(QueryResult::with_rows(vec![returning.to_string()], vec![vec![Some(id)]]))
}

// ============================================================================
// Scripted connection
// ============================================================================

/// Replays canned results in order, optionally after a delay.
#[derive(Default)]
pub struct Scripted {
    responses: Mutex<VecDeque<QueryResult>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl Scripted {
    pub fn new(responses: Vec<QueryResult>) -> Self {
        Self { responses: Mutex::new(responses.into()), ..Default::default() }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn into_db(self) -> (Arc<Scripted>, Database) {
        let conn = Arc::new(self);
        let db = Database::builder().with_connection(conn.clone(), registry());
        (conn, db)
    }
}

impl Connection for Scripted {
    fn execute<'a>(&'a self, _sql: &'a str, _params: &'a [SqlValue]) -> BoxFuture<'a, QueryResult> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.responses.lock().unwrap().pop_front().unwrap_or_else(|| QueryResult::error("no scripted response left"))
        })
    }
}
