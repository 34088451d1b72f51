//! Converts a raw mirror row into a JSON object (§4.5 "JSON-ready page").
//! SQLite columns are dynamically typed per value, so this reads each
//! value's own `TypeInfo` rather than trusting the declared column type.

use serde_json::{Map, Value};
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Row, TypeInfo, ValueRef};

/// Converts every column of `row` into a `name -> value` JSON map.
pub fn row_to_json(row: &SqliteRow) -> Map<String, Value> {
    let mut map = Map::with_capacity(row.columns().len());
    for (i, column) in row.columns().iter().enumerate() {
        map.insert(column.name().to_string(), column_value(row, i));
    }
    map
}

fn column_value(row: &SqliteRow, i: usize) -> Value {
    let Ok(raw) = row.try_get_raw(i) else {
        return Value::Null;
    };
    if raw.is_null() {
        return Value::Null;
    }
    match raw.type_info().name() {
        "INTEGER" | "BOOLEAN" => row.try_get::<i64, _>(i).map(Value::from).unwrap_or(Value::Null),
        "REAL" | "FLOAT" | "DOUBLE" => row.try_get::<f64, _>(i).map(Value::from).unwrap_or(Value::Null),
        _ => row.try_get::<String, _>(i).map(Value::from).unwrap_or(Value::Null),
    }
}
