//! Row mapping utilities: typed access, dynamic decoding, and grouping.

use std::collections::BTreeMap;

use tokio_postgres::Row;
use tokio_postgres::types::FromSql;

use crate::error::{CrudError, CrudResult};
use crate::value::{FieldMap, Value};

/// Extension trait for Row to provide typed access
pub trait RowExt {
    /// Try to get a column value, returning CrudError::Decode on failure
    fn try_get_column<T>(&self, column: &str) -> CrudResult<T>
    where
        T: for<'a> FromSql<'a>;
}

impl RowExt for Row {
    fn try_get_column<T>(&self, column: &str) -> CrudResult<T>
    where
        T: for<'a> FromSql<'a>,
    {
        self.try_get(column)
            .map_err(|e| CrudError::decode(column, e.to_string()))
    }
}

/// Decode a row into a [`FieldMap`], dispatching on each column's declared type.
///
/// Timestamps, dates, UUIDs, numerics, and bytea decode to their text
/// representation; NULLs decode to [`Value::Null`]. A column of a type outside
/// the supported scalar set decodes as text when the wire value allows it and
/// as [`Value::Null`] otherwise, so one exotic column never poisons the row.
pub fn row_to_fields(row: &Row) -> CrudResult<FieldMap> {
    let mut map = FieldMap::new();
    for (idx, col) in row.columns().iter().enumerate() {
        map.insert(col.name().to_string(), decode_column(row, idx)?);
    }
    Ok(map)
}

/// Decode every row via [`row_to_fields`], preserving row order.
pub fn rows_to_fields(rows: &[Row]) -> CrudResult<Vec<FieldMap>> {
    rows.iter().map(row_to_fields).collect()
}

fn decode_column(row: &Row, idx: usize) -> CrudResult<Value> {
    let col = &row.columns()[idx];
    let name = col.name();
    let err = |e: tokio_postgres::Error| CrudError::decode(name, e.to_string());

    let value = match col.type_().name() {
        "bool" => row.try_get::<_, Option<bool>>(idx).map_err(err)?.map(Value::Bool),
        "int2" => row
            .try_get::<_, Option<i16>>(idx)
            .map_err(err)?
            .map(|i| Value::Int(i as i64)),
        "int4" => row
            .try_get::<_, Option<i32>>(idx)
            .map_err(err)?
            .map(|i| Value::Int(i as i64)),
        "int8" => row.try_get::<_, Option<i64>>(idx).map_err(err)?.map(Value::Int),
        "oid" => row
            .try_get::<_, Option<u32>>(idx)
            .map_err(err)?
            .map(|i| Value::Int(i as i64)),
        "float4" => row
            .try_get::<_, Option<f32>>(idx)
            .map_err(err)?
            .map(|f| Value::Float(f as f64)),
        "float8" => row.try_get::<_, Option<f64>>(idx).map_err(err)?.map(Value::Float),
        "text" | "varchar" | "bpchar" | "name" | "unknown" => row
            .try_get::<_, Option<String>>(idx)
            .map_err(err)?
            .map(Value::Text),
        "json" | "jsonb" => row
            .try_get::<_, Option<serde_json::Value>>(idx)
            .map_err(err)?
            .map(Value::Json),
        "uuid" => row
            .try_get::<_, Option<uuid::Uuid>>(idx)
            .map_err(err)?
            .map(|u| Value::Text(u.to_string())),
        "timestamptz" => row
            .try_get::<_, Option<chrono::DateTime<chrono::Utc>>>(idx)
            .map_err(err)?
            .map(|dt| Value::Text(dt.to_rfc3339())),
        "timestamp" => row
            .try_get::<_, Option<chrono::NaiveDateTime>>(idx)
            .map_err(err)?
            .map(|dt| Value::Text(dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string())),
        "date" => row
            .try_get::<_, Option<chrono::NaiveDate>>(idx)
            .map_err(err)?
            .map(|d| Value::Text(d.format("%Y-%m-%d").to_string())),
        "numeric" => row
            .try_get::<_, Option<rust_decimal::Decimal>>(idx)
            .map_err(err)?
            .map(|d| Value::Text(d.to_string())),
        "bytea" => row
            .try_get::<_, Option<Vec<u8>>>(idx)
            .map_err(err)?
            .map(|bytes| Value::Text(hex_bytes(&bytes))),
        _ => match row.try_get::<_, Option<String>>(idx) {
            Ok(text) => text.map(Value::Text),
            Err(_) => None,
        },
    };

    Ok(value.unwrap_or(Value::Null))
}

/// Postgres text form of a bytea value: `\x` followed by lowercase hex.
fn hex_bytes(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(2 + bytes.len() * 2);
    out.push_str("\\x");
    for byte in bytes {
        out.push_str(&format!("{:02x}", byte));
    }
    out
}

/// Reshape a flat row list into a map keyed by one column's value.
///
/// Rows sharing a key keep their relative order within each group. Rows where
/// the index column is absent or NULL group under the `"null"` key.
pub fn index_by(rows: Vec<FieldMap>, column: &str) -> BTreeMap<String, Vec<FieldMap>> {
    let mut grouped: BTreeMap<String, Vec<FieldMap>> = BTreeMap::new();
    for row in rows {
        let key = row.get(column).unwrap_or(&Value::Null).to_string();
        grouped.entry(key).or_default().push(row);
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields;

    #[test]
    fn hex_bytes_matches_postgres_text_form() {
        assert_eq!(hex_bytes(&[]), "\\x");
        assert_eq!(hex_bytes(&[0x00, 0xde, 0xad, 0x0f]), "\\x00dead0f");
    }

    #[test]
    fn index_by_groups_rows_by_column_value() {
        let rows = vec![
            fields! { "cat" => "x", "id" => 1 },
            fields! { "cat" => "x", "id" => 2 },
            fields! { "cat" => "y", "id" => 3 },
        ];
        let grouped = index_by(rows, "cat");

        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped["x"].len(), 2);
        assert_eq!(grouped["x"][0]["id"], Value::Int(1));
        assert_eq!(grouped["x"][1]["id"], Value::Int(2));
        assert_eq!(grouped["y"].len(), 1);
        assert_eq!(grouped["y"][0]["id"], Value::Int(3));
    }

    #[test]
    fn index_by_missing_column_groups_under_null() {
        let rows = vec![fields! { "id" => 1 }, fields! { "id" => 2 }];
        let grouped = index_by(rows, "cat");
        assert_eq!(grouped.len(), 1);
        assert_eq!(grouped["null"].len(), 2);
    }

    #[test]
    fn index_by_preserves_group_order() {
        let rows = vec![
            fields! { "cat" => "b", "id" => 1 },
            fields! { "cat" => "a", "id" => 2 },
            fields! { "cat" => "b", "id" => 3 },
        ];
        let grouped = index_by(rows, "cat");
        let ids: Vec<_> = grouped["b"].iter().map(|r| r["id"].clone()).collect();
        assert_eq!(ids, vec![Value::Int(1), Value::Int(3)]);
    }
}
