//! PostgreSQL connection collaborator on top of `tokio-postgres`.
//!
//! Rendered SQL uses `?` placeholders; [`number_placeholders`] rewrites them to `$1, $2, ..`
//! before the statement reaches the server. [`Value`] implements [`ToSql`] and adapts its
//! integer / float width to the parameter type the server inferred.

use std::error::Error;

use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use tokio_postgres::types::{IsNull, ToSql, Type, to_sql_checked};
use tokio_postgres::{Client, Row, Transaction};
use uuid::Uuid;

use crate::client::{Connection, ValueRow};
use crate::error::{DbalError, DbalResult};
use crate::expr::replace_placeholders;
use crate::value::Value;

/// Rewrite `?` placeholders outside quoted regions to `$n`.
pub fn number_placeholders(sql: &str) -> String {
    replace_placeholders(sql, |idx| format!("${}", idx + 1))
}

fn bind_params(params: &[Value]) -> Vec<&(dyn ToSql + Sync)> {
    params.iter().map(|v| v as &(dyn ToSql + Sync)).collect()
}

impl ToSql for Value {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        match self {
            Self::Null => Ok(IsNull::Yes),
            Self::Bool(v) => v.to_sql_checked(ty, out),
            Self::Int(v) => int_to_sql(*v, ty, out),
            Self::Float(v) => match *ty {
                Type::FLOAT4 => (*v as f32).to_sql_checked(ty, out),
                _ => v.to_sql_checked(ty, out),
            },
            Self::Text(v) => match *ty {
                Type::JSON | Type::JSONB => {
                    serde_json::from_str::<serde_json::Value>(v)?.to_sql_checked(ty, out)
                }
                Type::UUID => Uuid::parse_str(v)?.to_sql_checked(ty, out),
                _ => v.as_str().to_sql_checked(ty, out),
            },
            Self::Bytes(v) => v.as_slice().to_sql_checked(ty, out),
            Self::Json(v) => v.to_sql_checked(ty, out),
            Self::Uuid(v) => v.to_sql_checked(ty, out),
            Self::Timestamp(v) => match *ty {
                Type::TIMESTAMP => v.naive_utc().to_sql_checked(ty, out),
                _ => v.to_sql_checked(ty, out),
            },
            Self::Date(v) => v.to_sql_checked(ty, out),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

fn int_to_sql(v: i64, ty: &Type, out: &mut BytesMut) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
    match *ty {
        Type::INT2 => i16::try_from(v)?.to_sql_checked(ty, out),
        Type::INT4 => i32::try_from(v)?.to_sql_checked(ty, out),
        Type::OID => u32::try_from(v)?.to_sql_checked(ty, out),
        Type::FLOAT4 => (v as f32).to_sql_checked(ty, out),
        Type::FLOAT8 => (v as f64).to_sql_checked(ty, out),
        Type::NUMERIC => Decimal::from(v).to_sql_checked(ty, out),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR => v.to_string().to_sql_checked(ty, out),
        _ => v.to_sql_checked(ty, out),
    }
}

impl ValueRow for Row {
    fn column_count(&self) -> usize {
        self.len()
    }

    fn value(&self, idx: usize) -> DbalResult<Value> {
        let Some(column) = self.columns().get(idx) else {
            return Err(DbalError::decode(
                idx.to_string(),
                format!("row has {} columns", self.len()),
            ));
        };
        decode(self, idx, column.name(), column.type_())
    }

    fn value_by_name(&self, name: &str) -> DbalResult<Value> {
        let Some(idx) = self.columns().iter().position(|c| c.name() == name) else {
            return Err(DbalError::decode(name, "no such column"));
        };
        self.value(idx)
    }
}

fn decode(row: &Row, idx: usize, name: &str, ty: &Type) -> DbalResult<Value> {
    fn get<'a, T>(row: &'a Row, idx: usize, name: &str) -> DbalResult<Option<T>>
    where
        T: tokio_postgres::types::FromSql<'a>,
    {
        row.try_get(idx)
            .map_err(|e| DbalError::decode(name, e.to_string()))
    }

    let value = match *ty {
        Type::BOOL => get::<bool>(row, idx, name)?.map(Value::Bool),
        Type::INT2 => get::<i16>(row, idx, name)?.map(Value::from),
        Type::INT4 => get::<i32>(row, idx, name)?.map(Value::from),
        Type::INT8 => get::<i64>(row, idx, name)?.map(Value::Int),
        Type::OID => get::<u32>(row, idx, name)?.map(Value::from),
        Type::FLOAT4 => get::<f32>(row, idx, name)?.map(Value::from),
        Type::FLOAT8 => get::<f64>(row, idx, name)?.map(Value::Float),
        // Kept as text so no precision is lost.
        Type::NUMERIC => get::<Decimal>(row, idx, name)?.map(|d| Value::Text(d.to_string())),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME => {
            get::<String>(row, idx, name)?.map(Value::Text)
        }
        Type::BYTEA => get::<Vec<u8>>(row, idx, name)?.map(Value::Bytes),
        Type::JSON | Type::JSONB => get::<serde_json::Value>(row, idx, name)?.map(Value::Json),
        Type::UUID => get::<Uuid>(row, idx, name)?.map(Value::Uuid),
        Type::TIMESTAMPTZ => get::<DateTime<Utc>>(row, idx, name)?.map(Value::Timestamp),
        Type::TIMESTAMP => {
            get::<NaiveDateTime>(row, idx, name)?.map(|ts| Value::Timestamp(ts.and_utc()))
        }
        Type::DATE => get::<NaiveDate>(row, idx, name)?.map(Value::Date),
        _ => {
            return Err(DbalError::decode(
                name,
                format!("unsupported column type {ty}"),
            ));
        }
    };
    Ok(value.unwrap_or(Value::Null))
}

impl Connection for Client {
    type Row = Row;

    async fn execute_query(&self, sql: &str, params: &[Value]) -> DbalResult<Vec<Row>> {
        let sql = number_placeholders(sql);
        Ok(Client::query(self, sql.as_str(), &bind_params(params)).await?)
    }

    async fn execute_statement(&self, sql: &str, params: &[Value]) -> DbalResult<u64> {
        let sql = number_placeholders(sql);
        Ok(Client::execute(self, sql.as_str(), &bind_params(params)).await?)
    }
}

impl Connection for Transaction<'_> {
    type Row = Row;

    async fn execute_query(&self, sql: &str, params: &[Value]) -> DbalResult<Vec<Row>> {
        let sql = number_placeholders(sql);
        Ok(Transaction::query(self, sql.as_str(), &bind_params(params)).await?)
    }

    async fn execute_statement(&self, sql: &str, params: &[Value]) -> DbalResult<u64> {
        let sql = number_placeholders(sql);
        Ok(Transaction::execute(self, sql.as_str(), &bind_params(params)).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_placeholders_outside_literals() {
        assert_eq!(
            number_placeholders("SELECT * FROM t WHERE a = ? AND b = '?' AND \"c?\" = ?"),
            "SELECT * FROM t WHERE a = $1 AND b = '?' AND \"c?\" = $2"
        );
        assert_eq!(number_placeholders("SELECT 1"), "SELECT 1");
    }

    #[test]
    fn int_adapts_to_parameter_width() {
        let mut out = BytesMut::new();
        Value::Int(7).to_sql(&Type::INT4, &mut out).unwrap();
        assert_eq!(out.as_ref(), &7i32.to_be_bytes());

        let mut out = BytesMut::new();
        Value::Int(7).to_sql(&Type::INT8, &mut out).unwrap();
        assert_eq!(out.as_ref(), &7i64.to_be_bytes());

        let mut out = BytesMut::new();
        assert!(Value::Int(i64::MAX).to_sql(&Type::INT2, &mut out).is_err());
    }

    #[test]
    fn null_and_mismatched_types() {
        let mut out = BytesMut::new();
        assert!(matches!(
            Value::Null.to_sql(&Type::INT4, &mut out).unwrap(),
            IsNull::Yes
        ));
        assert!(Value::Bool(true).to_sql(&Type::INT4, &mut out).is_err());
    }

    #[test]
    fn text_parses_into_json_and_uuid_columns() {
        let mut out = BytesMut::new();
        Value::from(r#"{"a":1}"#).to_sql(&Type::JSONB, &mut out).unwrap();
        assert!(!out.is_empty());

        let mut out = BytesMut::new();
        let id = Uuid::new_v4();
        Value::from(id.to_string()).to_sql(&Type::UUID, &mut out).unwrap();
        assert_eq!(out.as_ref(), id.as_bytes());
    }
}
