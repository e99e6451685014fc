//! Bind-parameter values.
//!
//! Every value that reaches the rendered SQL does so as a positional `?` placeholder paired
//! with a [`Value`] in the parameter list. Values are never inlined into SQL text, except by
//! [`Value::to_literal`] which exists only for debug output.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A dynamically typed bind parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    Json(serde_json::Value),
    Uuid(Uuid),
    Timestamp(DateTime<Utc>),
    Date(NaiveDate),
}

impl Value {
    /// Check if this is SQL NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Short type name used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::Bytes(_) => "bytes",
            Self::Json(_) => "json",
            Self::Uuid(_) => "uuid",
            Self::Timestamp(_) => "timestamp",
            Self::Date(_) => "date",
        }
    }

    /// Integer view of the value, parsing text and truncating floats.
    ///
    /// Aggregates come back in driver-specific shapes: `COUNT(*)` is `bigint` on Postgres but
    /// may arrive as text elsewhere.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Float(v) => Some(*v as i64),
            Self::Bool(v) => Some(i64::from(*v)),
            Self::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Text view of the value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Render the value as an SQL literal for debug output.
    pub fn to_literal(&self) -> String {
        match self {
            Self::Null => "NULL".to_string(),
            Self::Bool(true) => "TRUE".to_string(),
            Self::Bool(false) => "FALSE".to_string(),
            Self::Int(v) => v.to_string(),
            Self::Float(v) => v.to_string(),
            Self::Text(s) => quote_literal(s),
            Self::Bytes(b) => {
                let mut out = String::with_capacity(b.len() * 2 + 4);
                out.push_str("'\\x");
                for byte in b {
                    out.push_str(&format!("{byte:02x}"));
                }
                out.push('\'');
                out
            }
            Self::Json(v) => quote_literal(&v.to_string()),
            Self::Uuid(v) => quote_literal(&v.to_string()),
            Self::Timestamp(v) => quote_literal(&v.to_rfc3339()),
            Self::Date(v) => quote_literal(&v.to_string()),
        }
    }
}

fn quote_literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

macro_rules! impl_from_int {
    ($($t:ty),* $(,)?) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Value::Int(i64::from(v))
                }
            }
        )*
    };
}

impl_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(f64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Value::Text(v.clone())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Bytes(v.to_vec())
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Value::Json(v)
    }
}

impl From<Uuid> for Value {
    fn from(v: Uuid) -> Self {
        Value::Uuid(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Timestamp(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// Implement `From<scalar>` for a type that wraps [`Value`].
///
/// `$v` is bound to the converted [`Value`] inside `$body`.
macro_rules! impl_scalar_conversions {
    ($target:ty, |$v:ident| $body:expr) => {
        impl_scalar_conversions!(@each $target, |$v| $body;
            bool, i8, i16, i32, i64, u8, u16, u32, f32, f64,
            ::uuid::Uuid, ::chrono::DateTime<::chrono::Utc>, ::chrono::NaiveDate);
    };
    (@each $target:ty, |$v:ident| $body:expr; $($t:ty),*) => {
        $(
            impl From<$t> for $target {
                fn from(raw: $t) -> Self {
                    let $v = $crate::value::Value::from(raw);
                    $body
                }
            }
        )*
    };
}

pub(crate) use impl_scalar_conversions;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn option_maps_to_null() {
        assert_eq!(Value::from(None::<i32>), Value::Null);
        assert_eq!(Value::from(Some(5i32)), Value::Int(5));
    }

    #[test]
    fn literal_escapes_quotes() {
        assert_eq!(Value::from("O'Brien").to_literal(), "'O''Brien'");
        assert_eq!(Value::Bytes(vec![0xde, 0xad]).to_literal(), "'\\xdead'");
        assert_eq!(Value::Null.to_literal(), "NULL");
    }

    #[test]
    fn as_i64_is_lenient() {
        assert_eq!(Value::Text(" 42 ".into()).as_i64(), Some(42));
        assert_eq!(Value::Float(3.9).as_i64(), Some(3));
        assert_eq!(Value::Json(serde_json::json!(1)).as_i64(), None);
    }
}
