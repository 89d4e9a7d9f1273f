//! Configuration for the CRUD layer: status convention and toggles.

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Row status values used by the soft-delete convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Active,
    Deleted,
    Archived,
}

/// The soft-delete/status-flag convention.
///
/// When `column` is set, `select` appends an implicit `status = Active`
/// predicate to filters that do not mention the column, upserts re-assert
/// Active status, and `delete` becomes an UPDATE to the Deleted value.
/// With `column = None` the convention is entirely disabled and `delete`
/// issues a physical DELETE.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusConvention {
    /// Status column name; `None` disables the convention.
    pub column: Option<String>,
    /// Value stored for active rows.
    pub active: Value,
    /// Value stored for soft-deleted rows.
    pub deleted: Value,
    /// Value stored for archived rows.
    pub archived: Value,
}

impl StatusConvention {
    /// Convention with a status column storing small-integer codes
    /// (1 = Active, 2 = Deleted, 3 = Archived).
    pub fn numeric(column: impl Into<String>) -> Self {
        Self {
            column: Some(column.into()),
            active: Value::Int(1),
            deleted: Value::Int(2),
            archived: Value::Int(3),
        }
    }

    /// Convention with a status column storing lowercase text values.
    pub fn text(column: impl Into<String>) -> Self {
        Self {
            column: Some(column.into()),
            active: Value::Text("active".into()),
            deleted: Value::Text("deleted".into()),
            archived: Value::Text("archived".into()),
        }
    }

    /// Disabled convention: no status column, physical deletes.
    pub fn disabled() -> Self {
        Self {
            column: None,
            active: Value::Null,
            deleted: Value::Null,
            archived: Value::Null,
        }
    }

    /// Whether a status column is configured.
    pub fn is_enabled(&self) -> bool {
        self.column.is_some()
    }

    /// The stored value for a given status.
    pub fn value_for(&self, status: Status) -> &Value {
        match status {
            Status::Active => &self.active,
            Status::Deleted => &self.deleted,
            Status::Archived => &self.archived,
        }
    }
}

impl Default for StatusConvention {
    fn default() -> Self {
        Self::disabled()
    }
}

/// Configuration for a [`Crud`](crate::Crud) instance.
#[derive(Debug, Clone, Default)]
pub struct CrudConfig {
    /// Soft-delete/status-flag convention.
    pub status: StatusConvention,
    /// Validate and coerce fields against the live schema before writes.
    pub sanitize_fields: bool,
    /// Log every statement, its parameter count, and elapsed time at debug level.
    pub log_queries: bool,
}

impl CrudConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the status convention.
    pub fn status(mut self, status: StatusConvention) -> Self {
        self.status = status;
        self
    }

    /// Enable or disable schema-aware field sanitization.
    pub fn sanitize_fields(mut self, enabled: bool) -> Self {
        self.sanitize_fields = enabled;
        self
    }

    /// Enable or disable query logging.
    pub fn log_queries(mut self, enabled: bool) -> Self {
        self.log_queries = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_by_default() {
        let config = CrudConfig::default();
        assert!(!config.status.is_enabled());
        assert!(!config.sanitize_fields);
        assert!(!config.log_queries);
    }

    #[test]
    fn numeric_convention_values() {
        let convention = StatusConvention::numeric("status");
        assert!(convention.is_enabled());
        assert_eq!(convention.value_for(Status::Active), &Value::Int(1));
        assert_eq!(convention.value_for(Status::Deleted), &Value::Int(2));
        assert_eq!(convention.value_for(Status::Archived), &Value::Int(3));
    }
}
