//! The CRUD facade: logical intents in, reshaped rows out.

use std::collections::BTreeMap;
use std::time::Instant;

use tokio_postgres::types::ToSql;
use tokio_postgres::Row;

use crate::builder::{
    build_delete, build_insert, build_select, build_update, primary_key_column, OnConflict,
    UpdateKey,
};
use crate::client::GenericClient;
use crate::config::CrudConfig;
use crate::error::{CrudError, CrudResult};
use crate::row::{index_by, row_to_fields, rows_to_fields};
use crate::schema::{sanitize_fields, Sanitized};
use crate::value::{FieldMap, Value};

/// Result of [`Crud::update`]: the affected (or pre-existing) rows plus
/// whether a write actually occurred.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateOutcome {
    pub rows: Vec<FieldMap>,
    /// `false` when the no-op optimization skipped the UPDATE.
    pub updated: bool,
}

/// A CRUD convenience layer over a database execution handle.
///
/// Wraps (never extends) any [`GenericClient`] — a direct client, a pooled
/// client, or a transaction — together with an immutable [`CrudConfig`].
/// Each operation is stateless given its inputs; construct one per
/// connection handle and drop it when done.
///
/// # Example
/// ```ignore
/// use pgcrud::{fields, Crud, CrudConfig, StatusConvention};
///
/// let crud = Crud::new(client, CrudConfig::new()
///     .status(StatusConvention::numeric("status"))
///     .sanitize_fields(true));
///
/// let id = crud.insert("users", &fields! { "name" => "Alice" }, None).await?;
/// let row = crud.select_one("users", &fields! { "usersid" => id }).await?;
/// ```
pub struct Crud<C> {
    client: C,
    config: CrudConfig,
}

impl<C: GenericClient> Crud<C> {
    /// Wrap a client handle with the given configuration.
    pub fn new(client: C, config: CrudConfig) -> Self {
        Self { client, config }
    }

    /// The wrapped execution handle.
    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn config(&self) -> &CrudConfig {
        &self.config
    }

    /// Select all rows matching the filter equalities (ANDed).
    ///
    /// When a status column is configured and the filter does not set it, an
    /// implicit active-status predicate is appended. `order_by` is appended
    /// verbatim when given.
    pub async fn select(
        &self,
        table: &str,
        filter: &FieldMap,
        order_by: Option<&str>,
    ) -> CrudResult<Vec<FieldMap>> {
        let (sql, params) = build_select(table, filter, order_by, &self.config.status);
        let rows = self.run_query("select", &sql, &params).await?;
        rows_to_fields(&rows)
    }

    /// [`select`](Self::select), then group the rows by one column's value.
    pub async fn select_indexed(
        &self,
        table: &str,
        filter: &FieldMap,
        order_by: Option<&str>,
        index_column: &str,
    ) -> CrudResult<BTreeMap<String, Vec<FieldMap>>> {
        let rows = self.select(table, filter, order_by).await?;
        Ok(index_by(rows, index_column))
    }

    /// First row matching the filter, or `None`. Zero matches is not an error.
    pub async fn select_one(&self, table: &str, filter: &FieldMap) -> CrudResult<Option<FieldMap>> {
        let (sql, params) = build_select(table, filter, None, &self.config.status);
        let row = self.run_query_opt("select_one", &sql, &params).await?;
        row.as_ref().map(row_to_fields).transpose()
    }

    /// Insert a row, returning the `{table}id` primary key.
    ///
    /// With an [`OnConflict`] directive this becomes an upsert that updates
    /// exactly the named columns (re-asserting active status when a status
    /// column is configured and absent from `data`). Fields pass through
    /// sanitization when enabled.
    pub async fn insert(
        &self,
        table: &str,
        data: &FieldMap,
        on_conflict: Option<&OnConflict>,
    ) -> CrudResult<Value> {
        let data = match self.sanitize(table, data, None).await? {
            Sanitized::Fields(fields) => fields,
            // No compare id was passed, so Unchanged cannot occur here.
            Sanitized::Unchanged(_) => unreachable!("insert sanitization has no compare id"),
        };

        let (sql, params) = build_insert(table, &data, on_conflict, &self.config.status);
        let row = self.run_query_opt("insert", &sql, &params).await?;
        let row = row.ok_or_else(|| {
            CrudError::Other(format!("insert into \"{}\" returned no row", table))
        })?;

        let pk = primary_key_column(table);
        row_to_fields(&row)?
            .remove(&pk)
            .ok_or_else(|| CrudError::decode(pk, "missing primary key in RETURNING row"))
    }

    /// Update the row(s) addressed by `key` with a SET clause built from
    /// `data`, stamping `modified = now()`.
    ///
    /// With sanitization enabled and a scalar key, values identical to the
    /// existing row skip the UPDATE and return the existing row with
    /// `updated: false`.
    pub async fn update(
        &self,
        table: &str,
        key: &UpdateKey,
        data: &FieldMap,
    ) -> CrudResult<UpdateOutcome> {
        let sanitized = self.sanitize(table, data, key.as_id()).await?;
        self.finish_update(table, key, sanitized).await
    }

    /// Second half of [`update`](Self::update): issue the UPDATE for sanitized
    /// fields, or return the existing row untouched when nothing changed.
    async fn finish_update(
        &self,
        table: &str,
        key: &UpdateKey,
        sanitized: Sanitized,
    ) -> CrudResult<UpdateOutcome> {
        let data = match sanitized {
            Sanitized::Fields(fields) => fields,
            Sanitized::Unchanged(existing) => {
                return Ok(UpdateOutcome {
                    rows: vec![existing],
                    updated: false,
                });
            }
        };

        let (sql, params) = build_update(table, key, &data);
        let rows = self.run_query("update", &sql, &params).await?;
        Ok(UpdateOutcome {
            rows: rows_to_fields(&rows)?,
            updated: true,
        })
    }

    /// [`update`](Self::update), discarding the `updated` flag.
    pub async fn update_rows(
        &self,
        table: &str,
        key: &UpdateKey,
        data: &FieldMap,
    ) -> CrudResult<Vec<FieldMap>> {
        Ok(self.update(table, key, data).await?.rows)
    }

    /// Delete a row by id: a soft delete (status UPDATE) when a status column
    /// is configured, a physical DELETE otherwise.
    ///
    /// `id_field` defaults to `{table}id`. Returns whether a row was affected.
    pub async fn delete(
        &self,
        table: &str,
        id: &Value,
        id_field: Option<&str>,
    ) -> CrudResult<bool> {
        let (sql, params) = build_delete(table, id, id_field, &self.config.status);
        let affected = self.run_execute("delete", &sql, &params).await?;
        Ok(affected > 0)
    }

    /// Start a transaction on the wrapped connection. Pass-through statement;
    /// no client-side depth tracking.
    pub async fn begin(&self) -> CrudResult<()> {
        self.run_execute("begin", "BEGIN", &[]).await.map(|_| ())
    }

    /// Commit the current transaction.
    pub async fn commit(&self) -> CrudResult<()> {
        self.run_execute("commit", "COMMIT", &[]).await.map(|_| ())
    }

    /// Roll back the current transaction.
    pub async fn rollback(&self) -> CrudResult<()> {
        self.run_execute("rollback", "ROLLBACK", &[])
            .await
            .map(|_| ())
    }

    async fn sanitize(
        &self,
        table: &str,
        fields: &FieldMap,
        compare_id: Option<&Value>,
    ) -> CrudResult<Sanitized> {
        if !self.config.sanitize_fields {
            return Ok(Sanitized::Fields(fields.clone()));
        }
        sanitize_fields(&self.client, table, fields, compare_id).await
    }

    async fn run_query(&self, tag: &str, sql: &str, params: &[Value]) -> CrudResult<Vec<Row>> {
        let refs = param_refs(params);
        let started = Instant::now();
        let result = self.client.query(sql, &refs).await;
        self.log(tag, sql, params.len(), started, result.is_ok());
        result
    }

    async fn run_query_opt(
        &self,
        tag: &str,
        sql: &str,
        params: &[Value],
    ) -> CrudResult<Option<Row>> {
        let refs = param_refs(params);
        let started = Instant::now();
        let result = self.client.query_opt(sql, &refs).await;
        self.log(tag, sql, params.len(), started, result.is_ok());
        result
    }

    async fn run_execute(&self, tag: &str, sql: &str, params: &[Value]) -> CrudResult<u64> {
        let refs = param_refs(params);
        let started = Instant::now();
        let result = self.client.execute(sql, &refs).await;
        self.log(tag, sql, params.len(), started, result.is_ok());
        result
    }

    fn log(&self, tag: &str, sql: &str, params: usize, started: Instant, ok: bool) {
        if !self.config.log_queries {
            return;
        }
        let elapsed_ms = started.elapsed().as_millis() as u64;
        tracing::debug!(target: "pgcrud", tag, params, elapsed_ms, ok, sql);
    }
}

fn param_refs(params: &[Value]) -> Vec<&(dyn ToSql + Sync)> {
    params.iter().map(|p| p as &(dyn ToSql + Sync)).collect()
}
