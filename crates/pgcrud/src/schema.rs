//! Schema-aware field sanitization.
//!
//! When enabled, writes first validate their field map against the table's
//! live column metadata: unknown columns are dropped and values are coerced
//! by declared type (booleans to `'1'`/`'0'` text, character columns to
//! strings, JSON columns to serialized text). With a compare id, the existing
//! row is fetched and an update whose sanitized fields deep-equal the stored
//! values is signalled as [`Sanitized::Unchanged`] so the caller can skip the
//! write. Sanitization is a pure transform; the caller's map is never mutated.

use serde::{Deserialize, Serialize};

use crate::builder::primary_key_column;
use crate::client::GenericClient;
use crate::error::{CrudError, CrudResult};
use crate::row::{row_to_fields, RowExt};
use crate::value::{FieldMap, Value};

// The information_schema view columns are domain-typed; cast to base types so
// they decode with the stock FromSql impls.
const COLUMNS_SQL: &str = "SELECT column_name::text AS column_name, \
     data_type::text AS data_type, \
     is_nullable::text AS is_nullable \
     FROM information_schema.columns \
     WHERE table_schema = 'public' AND table_name = $1 \
     ORDER BY ordinal_position";

/// Declared metadata for one column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMeta {
    pub name: String,
    /// information_schema `data_type` (e.g. "boolean", "character varying", "jsonb").
    pub data_type: String,
    pub is_nullable: bool,
}

/// Outcome of sanitizing a field map.
#[derive(Debug, Clone, PartialEq)]
pub enum Sanitized {
    /// Sanitized fields, ready to write.
    Fields(FieldMap),
    /// The sanitized fields deep-equal the existing row; no write needed.
    /// Carries the existing row so the caller can return it.
    Unchanged(FieldMap),
}

/// Fetch the live column metadata for a table.
pub async fn fetch_columns<C: GenericClient>(
    client: &C,
    table: &str,
) -> CrudResult<Vec<ColumnMeta>> {
    let rows = client
        .query(COLUMNS_SQL, &[&table])
        .await
        .map_err(|e| CrudError::schema_lookup(table, e.to_string()))?;

    let mut columns = Vec::with_capacity(rows.len());
    for row in &rows {
        columns.push(ColumnMeta {
            name: row.try_get_column("column_name")?,
            data_type: row.try_get_column("data_type")?,
            is_nullable: row.try_get_column::<String>("is_nullable")? == "YES",
        });
    }
    Ok(columns)
}

/// Drop fields not present in the schema and coerce the rest by declared type.
///
/// NULLs pass through untouched regardless of column type.
pub fn apply_schema(fields: &FieldMap, columns: &[ColumnMeta]) -> FieldMap {
    let mut sanitized = FieldMap::new();
    for (name, value) in fields {
        let Some(column) = columns.iter().find(|c| &c.name == name) else {
            continue;
        };
        sanitized.insert(name.clone(), coerce(value, &column.data_type));
    }
    sanitized
}

fn coerce(value: &Value, data_type: &str) -> Value {
    if value.is_null() {
        return Value::Null;
    }
    match data_type {
        "boolean" => Value::Text(if value.is_truthy() { "1" } else { "0" }.to_string()),
        "character varying" | "character" | "text" => Value::Text(value.to_string()),
        "json" | "jsonb" => match value {
            Value::Text(_) => value.clone(),
            Value::Json(v) => Value::Text(v.to_string()),
            other => Value::Text(other.to_string()),
        },
        _ => value.clone(),
    }
}

/// Canonical text form used for loose cross-type comparison: a sanitized
/// `'1'` compares equal to a stored boolean `true`, `'5'` to integer `5`.
fn canonical(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Bool(b) => Some(if *b { "1" } else { "0" }.to_string()),
        other => Some(other.to_string()),
    }
}

/// Whether every sanitized field deep-equals the existing row's value for
/// the same column.
pub fn fields_match(sanitized: &FieldMap, existing: &FieldMap) -> bool {
    sanitized.iter().all(|(name, value)| {
        existing
            .get(name)
            .is_some_and(|current| canonical(current) == canonical(value))
    })
}

/// Sanitize `fields` for a write to `table`.
///
/// Identity pass-through when sanitization is disabled in config (the caller
/// checks the toggle and skips this call). With `compare_id`, the existing
/// row is fetched by primary key and unchanged values short-circuit to
/// [`Sanitized::Unchanged`].
pub async fn sanitize_fields<C: GenericClient>(
    client: &C,
    table: &str,
    fields: &FieldMap,
    compare_id: Option<&Value>,
) -> CrudResult<Sanitized> {
    let columns = fetch_columns(client, table).await?;
    if columns.is_empty() {
        return Err(CrudError::schema_lookup(table, "table has no columns"));
    }

    let sanitized = apply_schema(fields, &columns);

    if let Some(id) = compare_id {
        let sql = format!(
            "SELECT * FROM \"{}\" WHERE {} = $1",
            table,
            primary_key_column(table)
        );
        if let Some(row) = client.query_opt(&sql, &[id]).await? {
            let existing = row_to_fields(&row)?;
            if fields_match(&sanitized, &existing) {
                return Ok(Sanitized::Unchanged(existing));
            }
        }
    }

    Ok(Sanitized::Fields(sanitized))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields;

    fn columns() -> Vec<ColumnMeta> {
        vec![
            ColumnMeta {
                name: "qty".into(),
                data_type: "integer".into(),
                is_nullable: false,
            },
            ColumnMeta {
                name: "name".into(),
                data_type: "character varying".into(),
                is_nullable: true,
            },
            ColumnMeta {
                name: "active".into(),
                data_type: "boolean".into(),
                is_nullable: false,
            },
            ColumnMeta {
                name: "meta".into(),
                data_type: "jsonb".into(),
                is_nullable: true,
            },
        ]
    }

    #[test]
    fn drops_unknown_columns() {
        let fields = fields! { "bogus_col" => 1, "qty" => 5 };
        let sanitized = apply_schema(&fields, &columns());
        assert_eq!(sanitized, fields! { "qty" => 5 });
    }

    #[test]
    fn does_not_mutate_input() {
        let fields = fields! { "bogus_col" => 1, "qty" => 5 };
        let _ = apply_schema(&fields, &columns());
        assert!(fields.contains_key("bogus_col"));
    }

    #[test]
    fn coerces_booleans_to_flag_text() {
        let sanitized = apply_schema(&fields! { "active" => true }, &columns());
        assert_eq!(sanitized["active"], Value::Text("1".into()));

        let sanitized = apply_schema(&fields! { "active" => 0 }, &columns());
        assert_eq!(sanitized["active"], Value::Text("0".into()));
    }

    #[test]
    fn coerces_character_columns_to_string_unless_null() {
        let sanitized = apply_schema(&fields! { "name" => 42 }, &columns());
        assert_eq!(sanitized["name"], Value::Text("42".into()));

        let sanitized = apply_schema(&fields! { "name" => Value::Null }, &columns());
        assert_eq!(sanitized["name"], Value::Null);
    }

    #[test]
    fn serializes_json_columns_unless_already_text() {
        let sanitized = apply_schema(
            &fields! { "meta" => serde_json::json!({"a": 1}) },
            &columns(),
        );
        assert_eq!(sanitized["meta"], Value::Text("{\"a\":1}".into()));

        let sanitized = apply_schema(&fields! { "meta" => "{\"b\":2}" }, &columns());
        assert_eq!(sanitized["meta"], Value::Text("{\"b\":2}".into()));
    }

    #[test]
    fn fields_match_is_loose_across_representations() {
        let sanitized = fields! { "active" => "1", "name" => "Alice", "qty" => "5" };
        let existing = fields! { "active" => true, "name" => "Alice", "qty" => 5, "extra" => 9 };
        assert!(fields_match(&sanitized, &existing));
    }

    #[test]
    fn fields_match_detects_changes() {
        let sanitized = fields! { "name" => "Bob" };
        let existing = fields! { "name" => "Alice" };
        assert!(!fields_match(&sanitized, &existing));
    }

    #[test]
    fn fields_match_null_only_equals_null() {
        let existing = fields! { "name" => "Alice" };
        assert!(!fields_match(&fields! { "name" => Value::Null }, &existing));

        let existing_null = fields! { "name" => Value::Null };
        assert!(fields_match(&fields! { "name" => Value::Null }, &existing_null));
    }
}
