//! Value translation between [`SqlValue`] and the PostgreSQL driver.
//!
//! The server types results strictly, so the decode dispatches on the
//! declared type name first and only falls back to a try-get cascade for
//! types outside the unified set.

use sqlx::postgres::{PgArguments, PgRow, Postgres};
use sqlx::{Column, Row as _, TypeInfo, ValueRef};

use crate::Result;
use crate::error::ConduitError;
use crate::row::RowSet;
use crate::value::SqlValue;

type PgQuery<'q> = sqlx::query::Query<'q, Postgres, PgArguments>;

/// Binds one parameter onto a prepared statement.
pub(super) fn bind_value<'q>(query: PgQuery<'q>, value: &SqlValue) -> Result<PgQuery<'q>> {
    Ok(match value {
        SqlValue::Null => query.bind(None::<i64>),
        SqlValue::Integer(v) => query.bind(*v),
        SqlValue::Float(v) => query.bind(*v),
        SqlValue::Text(v) => query.bind(v.clone()),
        SqlValue::Boolean(v) => query.bind(*v),
        SqlValue::Timestamp(v) => query.bind(*v),
        SqlValue::Blob(v) => query.bind(v.clone()),
        SqlValue::List(_) => {
            return Err(ConduitError::parameter(
                "list values cannot be bound as statement parameters; render them with escape_value",
            ));
        }
    })
}

/// Builds an empty result set with this row's column layout.
pub(super) fn row_set_for(row: &PgRow) -> RowSet {
    RowSet::with_columns(
        row.columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect(),
    )
}

/// Decodes one driver row into unified values.
pub(super) fn decode_row(row: &PgRow) -> Result<Vec<SqlValue>> {
    let mut values = Vec::with_capacity(row.columns().len());
    for (index, _column) in row.columns().iter().enumerate() {
        values.push(decode_column(row, index)?);
    }
    Ok(values)
}

fn decode_column(row: &PgRow, index: usize) -> Result<SqlValue> {
    let raw = row
        .try_get_raw(index)
        .map_err(|e| ConduitError::parameter(format!("reading column {index}: {e}")))?;
    if raw.is_null() {
        return Ok(SqlValue::Null);
    }
    let type_name = raw.type_info().name().to_ascii_uppercase();

    let decoded = match type_name.as_str() {
        "INT2" => row
            .try_get::<i16, _>(index)
            .map(|v| SqlValue::Integer(i64::from(v)))
            .ok(),
        "INT4" => row
            .try_get::<i32, _>(index)
            .map(|v| SqlValue::Integer(i64::from(v)))
            .ok(),
        "INT8" | "OID" => row.try_get::<i64, _>(index).map(SqlValue::Integer).ok(),
        "FLOAT4" => row
            .try_get::<f32, _>(index)
            .map(|v| SqlValue::Float(f64::from(v)))
            .ok(),
        "FLOAT8" => row.try_get::<f64, _>(index).map(SqlValue::Float).ok(),
        "BOOL" => row.try_get::<bool, _>(index).map(SqlValue::Boolean).ok(),
        "TEXT" | "VARCHAR" | "CHAR" | "BPCHAR" | "NAME" => {
            row.try_get::<String, _>(index).map(SqlValue::Text).ok()
        }
        "TIMESTAMP" => row
            .try_get::<chrono::NaiveDateTime, _>(index)
            .map(SqlValue::Timestamp)
            .ok(),
        "TIMESTAMPTZ" => row
            .try_get::<chrono::DateTime<chrono::Utc>, _>(index)
            .map(|v| SqlValue::Timestamp(v.naive_utc()))
            .ok(),
        "DATE" => row
            .try_get::<chrono::NaiveDate, _>(index)
            .and_then(|v| {
                v.and_hms_opt(0, 0, 0)
                    .ok_or(sqlx::Error::Decode("invalid date".into()))
            })
            .map(SqlValue::Timestamp)
            .ok(),
        "BYTEA" => row.try_get::<Vec<u8>, _>(index).map(SqlValue::Blob).ok(),
        _ => None,
    };

    Ok(decoded.unwrap_or_else(|| decode_fallback(row, index)))
}

fn decode_fallback(row: &PgRow, index: usize) -> SqlValue {
    if let Ok(v) = row.try_get::<i64, _>(index) {
        return SqlValue::Integer(v);
    }
    if let Ok(v) = row.try_get::<f64, _>(index) {
        return SqlValue::Float(v);
    }
    if let Ok(v) = row.try_get::<String, _>(index) {
        return SqlValue::Text(v);
    }
    if let Ok(v) = row.try_get::<Vec<u8>, _>(index) {
        return SqlValue::Blob(v);
    }
    SqlValue::Null
}
