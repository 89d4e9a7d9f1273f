//! SQL fragment assembly for the CRUD operations.
//!
//! Pure functions from logical intent to `(sql, params)` pairs with 1-based
//! positional placeholders. The fragment shapes are part of the crate's
//! compatibility contract; the unit tests below pin them exactly.

use crate::config::StatusConvention;
use crate::value::{FieldMap, Value};

/// Conventional primary key column: `{table}id`.
pub fn primary_key_column(table: &str) -> String {
    format!("{}id", table)
}

/// Upsert directive for [`Crud::insert`](crate::Crud::insert).
#[derive(Debug, Clone, Default)]
pub struct OnConflict {
    /// Conflict target columns.
    pub columns: Vec<String>,
    /// Columns updated from EXCLUDED on conflict.
    pub update_columns: Vec<String>,
}

impl OnConflict {
    pub fn new(
        columns: impl IntoIterator<Item = impl Into<String>>,
        update_columns: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            update_columns: update_columns.into_iter().map(Into::into).collect(),
        }
    }
}

/// WHERE target for [`Crud::update`](crate::Crud::update).
#[derive(Debug, Clone)]
pub enum UpdateKey {
    /// Single scalar primary key, matched against `{table}id`.
    Id(Value),
    /// Composite key: every pair ANDed.
    Composite(FieldMap),
}

impl UpdateKey {
    /// The scalar id, when this is a single-column key.
    pub fn as_id(&self) -> Option<&Value> {
        match self {
            UpdateKey::Id(id) => Some(id),
            UpdateKey::Composite(_) => None,
        }
    }
}

/// `SELECT * FROM "<table>" [WHERE <col> = $n AND ...] [ORDER BY <expr>]`
///
/// Filter equalities are ANDed in map order. When a status column is
/// configured and the filter does not set it, an implicit active-status
/// predicate is appended. `order_by` is appended verbatim.
pub fn build_select(
    table: &str,
    filter: &FieldMap,
    order_by: Option<&str>,
    status: &StatusConvention,
) -> (String, Vec<Value>) {
    let mut params: Vec<Value> = Vec::new();
    let mut predicates: Vec<String> = Vec::new();

    for (col, value) in filter {
        params.push(value.clone());
        predicates.push(format!("{} = ${}", col, params.len()));
    }

    if let Some(status_col) = &status.column {
        if !filter.contains_key(status_col) {
            params.push(status.active.clone());
            predicates.push(format!("{} = ${}", status_col, params.len()));
        }
    }

    let mut sql = format!("SELECT * FROM \"{}\"", table);
    if !predicates.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&predicates.join(" AND "));
    }
    if let Some(order) = order_by {
        sql.push_str(" ORDER BY ");
        sql.push_str(order);
    }

    (sql, params)
}

/// `INSERT INTO "<table>" (<cols>) VALUES ($1, ...) [ON CONFLICT (<cols>)
/// DO UPDATE SET <col>=EXCLUDED.<col>, ...] RETURNING <table>id`
///
/// On conflict, exactly the named update columns are set from EXCLUDED; when
/// a status column is configured and absent from the inserted fields, active
/// status is re-asserted as an extra SET.
pub fn build_insert(
    table: &str,
    data: &FieldMap,
    on_conflict: Option<&OnConflict>,
    status: &StatusConvention,
) -> (String, Vec<Value>) {
    let mut params: Vec<Value> = Vec::new();
    let mut columns: Vec<&str> = Vec::new();
    let mut placeholders: Vec<String> = Vec::new();

    for (col, value) in data {
        params.push(value.clone());
        columns.push(col);
        placeholders.push(format!("${}", params.len()));
    }

    // Sanitization can drop every field; fall back to column defaults.
    let mut sql = if columns.is_empty() {
        format!("INSERT INTO \"{}\" DEFAULT VALUES", table)
    } else {
        format!(
            "INSERT INTO \"{}\" ({}) VALUES ({})",
            table,
            columns.join(", "),
            placeholders.join(", ")
        )
    };

    if let Some(conflict) = on_conflict {
        let mut sets: Vec<String> = conflict
            .update_columns
            .iter()
            .map(|col| format!("{}=EXCLUDED.{}", col, col))
            .collect();

        if let Some(status_col) = &status.column {
            if !data.contains_key(status_col) {
                params.push(status.active.clone());
                sets.push(format!("{}=${}", status_col, params.len()));
            }
        }

        // No update columns and no status to re-assert: DO UPDATE SET with an
        // empty list is invalid SQL, so degrade to DO NOTHING.
        if sets.is_empty() {
            sql.push_str(&format!(
                " ON CONFLICT ({}) DO NOTHING",
                conflict.columns.join(", ")
            ));
        } else {
            sql.push_str(&format!(
                " ON CONFLICT ({}) DO UPDATE SET {}",
                conflict.columns.join(", "),
                sets.join(", ")
            ));
        }
    }

    sql.push_str(&format!(" RETURNING {}", primary_key_column(table)));

    (sql, params)
}

/// `UPDATE "<table>" SET modified = now(), <col>=$n, ... WHERE <keycol>=$n[ AND ...] RETURNING *`
///
/// Every update stamps `modified = now()` first.
pub fn build_update(table: &str, key: &UpdateKey, data: &FieldMap) -> (String, Vec<Value>) {
    let mut params: Vec<Value> = Vec::new();
    let mut sets: Vec<String> = vec!["modified = now()".to_string()];

    for (col, value) in data {
        params.push(value.clone());
        sets.push(format!("{}=${}", col, params.len()));
    }

    let mut predicates: Vec<String> = Vec::new();
    match key {
        UpdateKey::Id(id) => {
            params.push(id.clone());
            predicates.push(format!("{}=${}", primary_key_column(table), params.len()));
        }
        UpdateKey::Composite(pairs) => {
            for (col, value) in pairs {
                params.push(value.clone());
                predicates.push(format!("{}=${}", col, params.len()));
            }
        }
    }

    let sql = format!(
        "UPDATE \"{}\" SET {} WHERE {} RETURNING *",
        table,
        sets.join(", "),
        predicates.join(" AND ")
    );

    (sql, params)
}

/// Soft delete: `UPDATE "<table>" SET <statusCol> = $1 WHERE <idField> = $2`;
/// hard delete (no status column): `DELETE FROM "<table>" WHERE <idField> = $1`.
///
/// `id_field` defaults to `{table}id`.
pub fn build_delete(
    table: &str,
    id: &Value,
    id_field: Option<&str>,
    status: &StatusConvention,
) -> (String, Vec<Value>) {
    let id_field = id_field
        .map(str::to_string)
        .unwrap_or_else(|| primary_key_column(table));

    match &status.column {
        Some(status_col) => (
            format!(
                "UPDATE \"{}\" SET {} = $1 WHERE {} = $2",
                table, status_col, id_field
            ),
            vec![status.deleted.clone(), id.clone()],
        ),
        None => (
            format!("DELETE FROM \"{}\" WHERE {} = $1", table, id_field),
            vec![id.clone()],
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields;

    #[test]
    fn select_no_filter_no_status() {
        let (sql, params) = build_select("users", &fields! {}, None, &StatusConvention::disabled());
        assert_eq!(sql, "SELECT * FROM \"users\"");
        assert!(params.is_empty());
    }

    #[test]
    fn select_filter_ands_equalities_in_map_order() {
        let filter = fields! { "age" => 30, "name" => "Alice" };
        let (sql, params) = build_select("users", &filter, None, &StatusConvention::disabled());
        assert_eq!(sql, "SELECT * FROM \"users\" WHERE age = $1 AND name = $2");
        assert_eq!(params, vec![Value::Int(30), Value::Text("Alice".into())]);
    }

    #[test]
    fn select_appends_implicit_active_status() {
        let filter = fields! { "name" => "Alice" };
        let (sql, params) = build_select("users", &filter, None, &StatusConvention::numeric("status"));
        assert_eq!(
            sql,
            "SELECT * FROM \"users\" WHERE name = $1 AND status = $2"
        );
        assert_eq!(params[1], Value::Int(1));
    }

    #[test]
    fn select_explicit_status_suppresses_implicit_predicate() {
        let filter = fields! { "status" => 2 };
        let (sql, params) = build_select("users", &filter, None, &StatusConvention::numeric("status"));
        assert_eq!(sql, "SELECT * FROM \"users\" WHERE status = $1");
        assert_eq!(params, vec![Value::Int(2)]);
    }

    #[test]
    fn select_order_by_appended_verbatim() {
        let (sql, _) = build_select(
            "users",
            &fields! {},
            Some("created DESC, name"),
            &StatusConvention::disabled(),
        );
        assert_eq!(sql, "SELECT * FROM \"users\" ORDER BY created DESC, name");
    }

    #[test]
    fn insert_plain_never_emits_on_conflict() {
        let data = fields! { "a" => 1, "b" => "x" };
        let (sql, params) = build_insert("orders", &data, None, &StatusConvention::disabled());
        assert_eq!(
            sql,
            "INSERT INTO \"orders\" (a, b) VALUES ($1, $2) RETURNING ordersid"
        );
        assert_eq!(params.len(), 2);
        assert!(!sql.contains("ON CONFLICT"));
    }

    #[test]
    fn insert_upsert_updates_exactly_the_named_columns() {
        let data = fields! { "email" => "a@example.com", "username" => "alice" };
        let conflict = OnConflict::new(["username"], ["email"]);
        let (sql, _) = build_insert("users", &data, Some(&conflict), &StatusConvention::disabled());
        assert_eq!(
            sql,
            "INSERT INTO \"users\" (email, username) VALUES ($1, $2) \
             ON CONFLICT (username) DO UPDATE SET email=EXCLUDED.email \
             RETURNING usersid"
        );
    }

    #[test]
    fn insert_upsert_reasserts_active_status_when_absent() {
        let data = fields! { "username" => "alice" };
        let conflict = OnConflict::new(["username"], ["username"]);
        let (sql, params) = build_insert(
            "users",
            &data,
            Some(&conflict),
            &StatusConvention::numeric("status"),
        );
        assert_eq!(
            sql,
            "INSERT INTO \"users\" (username) VALUES ($1) \
             ON CONFLICT (username) DO UPDATE SET username=EXCLUDED.username, status=$2 \
             RETURNING usersid"
        );
        assert_eq!(params[1], Value::Int(1));
    }

    #[test]
    fn insert_upsert_skips_status_reassert_when_inserted() {
        let data = fields! { "status" => 3, "username" => "alice" };
        let conflict = OnConflict::new(["username"], ["status"]);
        let (sql, params) = build_insert(
            "users",
            &data,
            Some(&conflict),
            &StatusConvention::numeric("status"),
        );
        assert_eq!(
            sql,
            "INSERT INTO \"users\" (status, username) VALUES ($1, $2) \
             ON CONFLICT (username) DO UPDATE SET status=EXCLUDED.status \
             RETURNING usersid"
        );
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn insert_upsert_without_update_columns_does_nothing() {
        let data = fields! { "username" => "alice" };
        let conflict = OnConflict::new(["username"], Vec::<String>::new());
        let (sql, params) = build_insert("users", &data, Some(&conflict), &StatusConvention::disabled());
        assert_eq!(
            sql,
            "INSERT INTO \"users\" (username) VALUES ($1) \
             ON CONFLICT (username) DO NOTHING \
             RETURNING usersid"
        );
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn insert_upsert_without_update_columns_still_reasserts_status() {
        let data = fields! { "username" => "alice" };
        let conflict = OnConflict::new(["username"], Vec::<String>::new());
        let (sql, params) = build_insert(
            "users",
            &data,
            Some(&conflict),
            &StatusConvention::numeric("status"),
        );
        assert_eq!(
            sql,
            "INSERT INTO \"users\" (username) VALUES ($1) \
             ON CONFLICT (username) DO UPDATE SET status=$2 \
             RETURNING usersid"
        );
        assert_eq!(params[1], Value::Int(1));
    }

    #[test]
    fn insert_empty_data_uses_default_values() {
        let (sql, params) = build_insert("audit", &fields! {}, None, &StatusConvention::disabled());
        assert_eq!(sql, "INSERT INTO \"audit\" DEFAULT VALUES RETURNING auditid");
        assert!(params.is_empty());
    }

    #[test]
    fn update_by_scalar_id_stamps_modified() {
        let data = fields! { "name" => "Bob" };
        let (sql, params) = build_update("users", &UpdateKey::Id(Value::Int(7)), &data);
        assert_eq!(
            sql,
            "UPDATE \"users\" SET modified = now(), name=$1 WHERE usersid=$2 RETURNING *"
        );
        assert_eq!(params, vec![Value::Text("Bob".into()), Value::Int(7)]);
    }

    #[test]
    fn update_by_composite_key_ands_pairs() {
        let data = fields! { "qty" => 5 };
        let key = UpdateKey::Composite(fields! { "orderid" => 1, "productid" => 2 });
        let (sql, params) = build_update("orderitems", &key, &data);
        assert_eq!(
            sql,
            "UPDATE \"orderitems\" SET modified = now(), qty=$1 \
             WHERE orderid=$2 AND productid=$3 RETURNING *"
        );
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn delete_soft_emits_update_never_delete() {
        let (sql, params) = build_delete(
            "users",
            &Value::Int(9),
            None,
            &StatusConvention::numeric("status"),
        );
        assert_eq!(sql, "UPDATE \"users\" SET status = $1 WHERE usersid = $2");
        assert_eq!(params, vec![Value::Int(2), Value::Int(9)]);
        assert!(!sql.starts_with("DELETE"));
    }

    #[test]
    fn delete_hard_when_no_status_column() {
        let (sql, params) = build_delete(
            "users",
            &Value::Int(9),
            Some("uid"),
            &StatusConvention::disabled(),
        );
        assert_eq!(sql, "DELETE FROM \"users\" WHERE uid = $1");
        assert_eq!(params, vec![Value::Int(9)]);
    }
}
