//! # Link Module
//!
//! One-to-many cascade create. A parent entity declares nested collections
//! with `#[orm(link_many = "remote_key")]` on an `Option<Vec<Child>>` field.
//! Creating the parent inserts it, copies the generated id into the
//! `remote_key` column of every child, and then creates the children, depth
//! first. Each item gets its own [`Outcome`]; one failure never aborts its
//! siblings.

use futures::future::BoxFuture;
use serde_json::{json, Value};

use crate::{
    database::Database,
    entity::Entity,
    json::expect_object,
    value::{ColumnValue, SqlValue},
    Error, Result,
};

/// A one-to-many relation from a parent entity to a child collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkManyInfo {
    /// Name of the nested array in the parent's JSON.
    pub field: &'static str,
    pub child_table: &'static str,
    /// Foreign key column of the child that points back to the parent.
    pub remote_key: &'static str,
    /// Primary key column of the parent.
    pub local_key: &'static str,
}

/// Type-erased access to one transient child collection of a parent.
pub trait ChildBatch: Send {
    fn child_table(&self) -> &'static str;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Replaces the collection with the children described by `value`
    /// (an array, a single object, or absent/null for none).
    fn load(&mut self, value: Option<&Value>) -> Result<()>;

    /// Checks that every child can be inserted once `remote_key` is filled in.
    fn validate(&mut self, remote_key: &str) -> Result<()>;

    fn assign_parent(&mut self, remote_key: &str, id: &SqlValue) -> Result<()>;

    fn create<'a>(&'a mut self, db: &'a Database) -> BoxFuture<'a, Vec<Outcome>>;
}

impl<E: Entity> ChildBatch for Option<Vec<E>> {
    fn child_table(&self) -> &'static str {
        E::TABLE
    }

    fn len(&self) -> usize {
        self.as_ref().map_or(0, Vec::len)
    }

    fn load(&mut self, value: Option<&Value>) -> Result<()> {
        *self = match value {
            None | Some(Value::Null) => None,
            Some(v) => Some(deserialize_all::<E>(v)?),
        };
        Ok(())
    }

    fn validate(&mut self, remote_key: &str) -> Result<()> {
        for child in self.iter_mut().flatten() {
            validate_entity(child, Some(remote_key))?;
        }
        Ok(())
    }

    fn assign_parent(&mut self, remote_key: &str, id: &SqlValue) -> Result<()> {
        let Some(children) = self else {
            return Ok(());
        };
        let column = E::COLUMNS
            .iter()
            .find(|c| c.name == remote_key)
            .ok_or_else(|| Error::Schema(format!("{} has no column {}", E::TABLE, remote_key)))?;
        for child in children.iter_mut() {
            child.set_value(column.index, id.clone())?;
        }
        Ok(())
    }

    fn create<'a>(&'a mut self, db: &'a Database) -> BoxFuture<'a, Vec<Outcome>> {
        Box::pin(async move {
            match self.as_mut() {
                Some(children) => db.create_all(children).await,
                None => Vec::new(),
            }
        })
    }
}

// ============================================================================
// Deserialization
// ============================================================================

/// Builds an entity and, recursively, its nested collections.
pub fn from_json_with_links<E: Entity>(value: &Value) -> Result<E> {
    let obj = expect_object::<E>(value)?;
    let mut entity = E::from_json(value)?;
    for (info, batch) in E::LINKS.iter().zip(entity.links_mut()) {
        batch.load(obj.get(info.field))?;
    }
    Ok(entity)
}

/// Accepts a single object or an array of objects.
pub fn deserialize_all<E: Entity>(value: &Value) -> Result<Vec<E>> {
    match value {
        Value::Array(items) => items.iter().map(from_json_with_links::<E>).collect(),
        Value::Object(_) => Ok(vec![from_json_with_links::<E>(value)?]),
        other => Err(Error::Validation(format!("{}: expected an object or an array, got {}", E::TABLE, other))),
    }
}

/// Reads every insertable column so that unset required foreign keys and
/// unrepresentable values are caught before anything is written. `pending`
/// names the column the linker will fill in from the parent.
fn validate_entity<E: Entity>(entity: &mut E, pending: Option<&str>) -> Result<()> {
    for column in E::insert_columns() {
        if Some(column.name) == pending {
            continue;
        }
        entity.value(column.index)?;
    }
    for (info, batch) in E::LINKS.iter().zip(entity.links_mut()) {
        batch.validate(info.remote_key)?;
    }
    Ok(())
}

// ============================================================================
// Outcome
// ============================================================================

/// Result of creating one entity and its nested collections.
#[derive(Debug)]
pub struct Outcome {
    pub table: &'static str,
    /// The generated primary key, or why the insert failed.
    pub result: Result<SqlValue, Error>,
    /// Outcomes of the nested children. Empty when the parent failed.
    pub children: Vec<Outcome>,
}

impl Outcome {
    fn failed(table: &'static str, error: Error) -> Self {
        Self { table, result: Err(error), children: Vec::new() }
    }

    /// Whether this item and all of its descendants were created.
    pub fn is_success(&self) -> bool {
        self.result.is_ok() && self.children.iter().all(Outcome::is_success)
    }

    pub fn id(&self) -> Option<&SqlValue> {
        self.result.as_ref().ok()
    }

    pub fn to_json(&self) -> Value {
        let mut out = json!({ "table": self.table });
        match &self.result {
            Ok(id) => out["id"] = id.to_json(),
            Err(e) => out["error"] = Value::String(e.to_string()),
        }
        if !self.children.is_empty() {
            out["children"] = Value::Array(self.children.iter().map(Outcome::to_json).collect());
        }
        out
    }
}

// ============================================================================
// Cascade Create
// ============================================================================

impl Database {
    /// Deserializes `body` (one object or an array) and creates every item
    /// with its nested collections.
    ///
    /// The whole tree is deserialized and validated first; a validation
    /// failure rejects the request before any statement runs.
    pub async fn create<E: Entity>(&self, body: &Value) -> Result<Vec<Outcome>> {
        self.ensure_registered::<E>()?;
        let mut items = deserialize_all::<E>(body)?;
        for item in items.iter_mut() {
            validate_entity(item, None)?;
        }
        Ok(self.create_all(&mut items).await)
    }

    pub(crate) fn create_all<'a, E: Entity>(&'a self, items: &'a mut [E]) -> BoxFuture<'a, Vec<Outcome>> {
        Box::pin(async move {
            let mut outcomes = Vec::with_capacity(items.len());
            for item in items.iter_mut() {
                outcomes.push(self.create_entity(item).await);
            }
            outcomes
        })
    }

    async fn create_entity<E: Entity>(&self, entity: &mut E) -> Outcome {
        let id = match self.insert(entity).await {
            Ok(id) => id,
            Err(e) => {
                log::warn!(target: self.log_target(), "failed to create {}: {}", E::TABLE, e);
                return Outcome::failed(E::TABLE, e);
            }
        };
        let key = match id.to_sql() {
            Ok(key) => key,
            Err(e) => return Outcome::failed(E::TABLE, Error::conversion(E::primary_key().qualified_name(), e)),
        };
        entity.set_id(id);

        let mut children = Vec::new();
        for (link, batch) in E::LINKS.iter().zip(entity.links_mut()) {
            let Some(info) = self.registry().relation(E::TABLE, link.field) else {
                let e = Error::Schema(format!("{}.{} is not a registered relation", E::TABLE, link.field));
                children.push(Outcome::failed(link.child_table, e));
                continue;
            };
            if let Err(e) = batch.assign_parent(info.remote_key, &key) {
                log::warn!(target: self.log_target(), "cannot link {} to {}: {}", info.child_table, E::TABLE, e);
                children.push(Outcome::failed(info.child_table, e));
                continue;
            }
            children.extend(batch.create(self).await);
        }

        Outcome { table: E::TABLE, result: Ok(key), children }
    }
}
