//! Entity ⇄ JSON object mapping.
//!
//! Every column appears in the output, with `null` for absent optional values.
//! On input the primary key is never read, optional columns and foreign keys
//! default to `None`, and every other column is required.

use serde_json::{Map, Value};

use crate::{
    entity::{ColumnInfo, Entity},
    value::ColumnValue,
    Error, Result,
};

pub fn expect_object<E: Entity>(value: &Value) -> Result<&Map<String, Value>> {
    value.as_object().ok_or_else(|| Error::Validation(format!("{}: expected a JSON object", E::TABLE)))
}

#[doc(hidden)]
pub fn put<T: ColumnValue>(map: &mut Map<String, Value>, column: &ColumnInfo, value: &T) {
    map.insert(column.name.to_string(), value.to_json());
}

#[doc(hidden)]
pub fn put_optional<T: ColumnValue>(map: &mut Map<String, Value>, column: &ColumnInfo, value: &Option<T>) {
    let json = value.as_ref().map(ColumnValue::to_json).unwrap_or(Value::Null);
    map.insert(column.name.to_string(), json);
}

#[doc(hidden)]
pub fn take_required<T: ColumnValue>(obj: &Map<String, Value>, column: &ColumnInfo) -> Result<T> {
    match obj.get(column.name) {
        None => Err(Error::Validation(format!("{}: missing field", column.qualified_name()))),
        Some(Value::Null) => Err(Error::Validation(format!("{}: must not be null", column.qualified_name()))),
        Some(v) => T::deserialize(v).map_err(|e| Error::Validation(format!("{}: {}", column.qualified_name(), e))),
    }
}

#[doc(hidden)]
pub fn take_optional<T: ColumnValue>(obj: &Map<String, Value>, column: &ColumnInfo) -> Result<Option<T>> {
    match obj.get(column.name) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => T::deserialize(v).map(Some).map_err(|e| Error::Validation(format!("{}: {}", column.qualified_name(), e))),
    }
}

/// Primary keys are assigned by the database; a client-supplied one is dropped.
#[doc(hidden)]
pub fn ignore_primary_key(obj: &Map<String, Value>, column: &ColumnInfo) {
    if let Some(v) = obj.get(column.name).filter(|v| !v.is_null()) {
        log::warn!("ignoring client-supplied primary key {}={}", column.qualified_name(), v);
    }
}

pub fn to_json_array<E: Entity>(entities: &[E]) -> Value {
    Value::Array(entities.iter().map(Entity::to_json).collect())
}
