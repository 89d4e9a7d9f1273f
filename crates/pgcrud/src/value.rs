//! Dynamic scalar values for key-value field maps.
//!
//! CRUD operations here are driven by plain maps from column name to value
//! rather than typed structs, so parameters need a runtime representation.
//! [`Value`] covers the scalar shapes a field map can carry (null, bool,
//! integer, float, text, JSON) and implements `ToSql` by dispatching on the
//! *declared* parameter type. That keeps the text-leaning conventions of the
//! sanitizer working against typed columns: `'1'`/`'0'` binds to a boolean
//! column, serialized JSON text binds to `json`/`jsonb`, and so on.

use std::collections::BTreeMap;
use std::fmt;

use bytes::BytesMut;
use tokio_postgres::types::{to_sql_checked, IsNull, ToSql, Type};

/// Mapping from column name to scalar value.
///
/// `BTreeMap` keeps iteration order deterministic, so the SQL generated from
/// a given map is stable across runs.
pub type FieldMap = BTreeMap<String, Value>;

/// A dynamic scalar value.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Json(serde_json::Value),
}

impl Value {
    /// Whether this is the SQL NULL value.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Text content, if this is a text value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Integer content, if this is an integer value.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Loose truthiness, mirroring the sanitizer's boolean coercion:
    /// null, `false`, `0`, `0.0`, `""`, `"0"` and `"false"` are falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Text(s) => !s.is_empty() && s != "0" && s != "false",
            Value::Json(v) => !v.is_null(),
        }
    }
}

fn mismatch(value: &Value, ty: &Type) -> Box<dyn std::error::Error + Sync + Send> {
    format!("cannot bind {:?} to a column of type {}", value, ty).into()
}

impl ToSql for Value {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn std::error::Error + Sync + Send>> {
        // `Type` constants are not usable as match patterns, so dispatch on
        // the type name instead.
        match self {
            Value::Null => Ok(IsNull::Yes),

            Value::Bool(b) => match ty.name() {
                "bool" => b.to_sql(ty, out),
                "text" | "varchar" | "bpchar" | "name" => {
                    (if *b { "1" } else { "0" }).to_sql(ty, out)
                }
                "int2" => (*b as i16).to_sql(ty, out),
                "int4" => (*b as i32).to_sql(ty, out),
                "int8" => (*b as i64).to_sql(ty, out),
                "json" | "jsonb" => serde_json::Value::Bool(*b).to_sql(ty, out),
                _ => Err(mismatch(self, ty)),
            },

            Value::Int(i) => match ty.name() {
                "int8" => i.to_sql(ty, out),
                "int4" => i32::try_from(*i)?.to_sql(ty, out),
                "int2" => i16::try_from(*i)?.to_sql(ty, out),
                "oid" => u32::try_from(*i)?.to_sql(ty, out),
                "float4" => (*i as f32).to_sql(ty, out),
                "float8" => (*i as f64).to_sql(ty, out),
                "bool" => (*i != 0).to_sql(ty, out),
                "numeric" => rust_decimal::Decimal::from(*i).to_sql(ty, out),
                "text" | "varchar" | "bpchar" | "name" => i.to_string().to_sql(ty, out),
                "json" | "jsonb" => serde_json::Value::from(*i).to_sql(ty, out),
                _ => Err(mismatch(self, ty)),
            },

            Value::Float(f) => match ty.name() {
                "float8" => f.to_sql(ty, out),
                "float4" => (*f as f32).to_sql(ty, out),
                "numeric" => rust_decimal::Decimal::try_from(*f)?.to_sql(ty, out),
                "text" | "varchar" | "bpchar" | "name" => f.to_string().to_sql(ty, out),
                "json" | "jsonb" => serde_json::Number::from_f64(*f)
                    .map(serde_json::Value::Number)
                    .ok_or_else(|| mismatch(self, ty))?
                    .to_sql(ty, out),
                _ => Err(mismatch(self, ty)),
            },

            Value::Text(s) => match ty.name() {
                "text" | "varchar" | "bpchar" | "name" | "unknown" => s.to_sql(ty, out),
                "bool" => {
                    let b = matches!(s.as_str(), "1" | "t" | "true" | "TRUE" | "y" | "yes");
                    b.to_sql(ty, out)
                }
                "int2" => s.parse::<i16>()?.to_sql(ty, out),
                "int4" => s.parse::<i32>()?.to_sql(ty, out),
                "int8" => s.parse::<i64>()?.to_sql(ty, out),
                "float4" => s.parse::<f32>()?.to_sql(ty, out),
                "float8" => s.parse::<f64>()?.to_sql(ty, out),
                "numeric" => s.parse::<rust_decimal::Decimal>()?.to_sql(ty, out),
                "json" | "jsonb" => serde_json::from_str::<serde_json::Value>(s)?.to_sql(ty, out),
                "uuid" => uuid::Uuid::parse_str(s)?.to_sql(ty, out),
                "timestamptz" => chrono::DateTime::parse_from_rfc3339(s)?
                    .with_timezone(&chrono::Utc)
                    .to_sql(ty, out),
                "timestamp" => {
                    let dt = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
                        .or_else(|_| {
                            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
                        })?;
                    dt.to_sql(ty, out)
                }
                "date" => chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d")?.to_sql(ty, out),
                _ => Err(mismatch(self, ty)),
            },

            Value::Json(v) => match ty.name() {
                "json" | "jsonb" => v.to_sql(ty, out),
                "text" | "varchar" | "bpchar" | "name" => {
                    serde_json::to_string(v)?.to_sql(ty, out)
                }
                _ => Err(mismatch(self, ty)),
            },
        }
    }

    fn accepts(_ty: &Type) -> bool {
        // Binding is dynamic; mismatches surface from to_sql at encode time.
        true
    }

    to_sql_checked!();
}

/// Stringification used for index-by-column grouping keys and diagnostics.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{}", v),
            Value::Text(s) => write!(f, "{}", s),
            Value::Json(v) => write!(f, "{}", v),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i16> for Value {
    fn from(i: i16) -> Self {
        Value::Int(i as i64)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f32> for Value {
    fn from(f: f32) -> Self {
        Value::Float(f as f64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Value::Json(v)
    }
}

impl From<uuid::Uuid> for Value {
    fn from(u: uuid::Uuid) -> Self {
        Value::Text(u.to_string())
    }
}

impl From<chrono::DateTime<chrono::Utc>> for Value {
    fn from(dt: chrono::DateTime<chrono::Utc>) -> Self {
        Value::Text(dt.to_rfc3339())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        match opt {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

/// Build a [`FieldMap`] from `key => value` pairs.
///
/// # Example
/// ```
/// use pgcrud::{fields, Value};
///
/// let map = fields! { "name" => "Alice", "qty" => 5 };
/// assert_eq!(map["name"], Value::Text("Alice".into()));
/// assert_eq!(map["qty"], Value::Int(5));
/// ```
#[macro_export]
macro_rules! fields {
    () => { $crate::FieldMap::new() };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut map = $crate::FieldMap::new();
        $( map.insert(($key).to_string(), $crate::Value::from($value)); )+
        map
    }};
}
