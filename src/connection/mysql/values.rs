//! Value translation between [`SqlValue`] and the MySQL driver.

use sqlx::mysql::{MySql, MySqlArguments, MySqlRow};
use sqlx::{Column, Row as _, TypeInfo, ValueRef};

use crate::Result;
use crate::error::ConduitError;
use crate::row::RowSet;
use crate::value::SqlValue;

type MySqlQuery<'q> = sqlx::query::Query<'q, MySql, MySqlArguments>;

/// Binds one parameter onto a prepared statement.
pub(super) fn bind_value<'q>(query: MySqlQuery<'q>, value: &SqlValue) -> Result<MySqlQuery<'q>> {
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
pub(super) fn row_set_for(row: &MySqlRow) -> RowSet {
    RowSet::with_columns(
        row.columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect(),
    )
}

/// Decodes one driver row into unified values.
///
/// Text columns under binary collations arrive typed as byte strings, so
/// string decoding always has a bytes-then-utf8 second attempt.
pub(super) fn decode_row(row: &MySqlRow) -> Result<Vec<SqlValue>> {
    let mut values = Vec::with_capacity(row.columns().len());
    for (index, _column) in row.columns().iter().enumerate() {
        values.push(decode_column(row, index)?);
    }
    Ok(values)
}

fn decode_column(row: &MySqlRow, index: usize) -> Result<SqlValue> {
    let raw = row
        .try_get_raw(index)
        .map_err(|e| ConduitError::parameter(format!("reading column {index}: {e}")))?;
    if raw.is_null() {
        return Ok(SqlValue::Null);
    }
    let type_name = raw.type_info().name().to_ascii_uppercase();

    let decoded = match type_name.as_str() {
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" | "TINYINT UNSIGNED"
        | "SMALLINT UNSIGNED" | "MEDIUMINT UNSIGNED" | "INT UNSIGNED" => {
            decode_integer(row, index)
        }
        "BIGINT UNSIGNED" => row
            .try_get::<u64, _>(index)
            .ok()
            .and_then(|v| i64::try_from(v).ok())
            .map(SqlValue::Integer),
        "BOOLEAN" => row.try_get::<bool, _>(index).map(SqlValue::Boolean).ok(),
        "FLOAT" => row
            .try_get::<f32, _>(index)
            .map(|v| SqlValue::Float(f64::from(v)))
            .ok(),
        "DOUBLE" => row.try_get::<f64, _>(index).map(SqlValue::Float).ok(),
        "CHAR" | "VARCHAR" | "TEXT" | "TINYTEXT" | "MEDIUMTEXT" | "LONGTEXT" | "ENUM" => {
            decode_text(row, index)
        }
        "DATETIME" | "TIMESTAMP" => row
            .try_get::<chrono::NaiveDateTime, _>(index)
            .map(SqlValue::Timestamp)
            .ok(),
        "DATE" => row
            .try_get::<chrono::NaiveDate, _>(index)
            .ok()
            .and_then(|v| v.and_hms_opt(0, 0, 0))
            .map(SqlValue::Timestamp),
        "BINARY" | "VARBINARY" | "BLOB" | "TINYBLOB" | "MEDIUMBLOB" | "LONGBLOB" => {
            row.try_get::<Vec<u8>, _>(index).map(SqlValue::Blob).ok()
        }
        _ => None,
    };

    Ok(decoded.unwrap_or_else(|| decode_fallback(row, index)))
}

fn decode_integer(row: &MySqlRow, index: usize) -> Option<SqlValue> {
    if let Ok(v) = row.try_get::<i64, _>(index) {
        return Some(SqlValue::Integer(v));
    }
    row.try_get::<u64, _>(index)
        .ok()
        .and_then(|v| i64::try_from(v).ok())
        .map(SqlValue::Integer)
}

fn decode_text(row: &MySqlRow, index: usize) -> Option<SqlValue> {
    if let Ok(v) = row.try_get::<String, _>(index) {
        return Some(SqlValue::Text(v));
    }
    row.try_get::<Vec<u8>, _>(index)
        .ok()
        .map(|bytes| SqlValue::Text(String::from_utf8_lossy(&bytes).into_owned()))
}

fn decode_fallback(row: &MySqlRow, index: usize) -> SqlValue {
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
