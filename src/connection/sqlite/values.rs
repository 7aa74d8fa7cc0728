//! Value translation between [`SqlValue`] and the SQLite driver.

use sqlx::sqlite::{Sqlite, SqliteArguments, SqliteRow};
use sqlx::{Column, Row as _, TypeInfo, ValueRef};

use crate::Result;
use crate::error::ConduitError;
use crate::row::RowSet;
use crate::value::SqlValue;

type SqliteQuery<'q> = sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>;

/// Binds one parameter onto a prepared statement.
pub(super) fn bind_value<'q>(query: SqliteQuery<'q>, value: &SqlValue) -> Result<SqliteQuery<'q>> {
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
pub(super) fn row_set_for(row: &SqliteRow) -> RowSet {
    RowSet::with_columns(
        row.columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect(),
    )
}

/// Decodes one driver row into unified values.
///
/// SQLite is dynamically typed, so the declared column type is advisory at
/// best; the raw value's storage class drives the decode, with a try-get
/// cascade as the fallback for affinity surprises.
pub(super) fn decode_row(row: &SqliteRow) -> Result<Vec<SqlValue>> {
    let mut values = Vec::with_capacity(row.columns().len());
    for (index, _column) in row.columns().iter().enumerate() {
        values.push(decode_column(row, index)?);
    }
    Ok(values)
}

fn decode_column(row: &SqliteRow, index: usize) -> Result<SqlValue> {
    let raw = row
        .try_get_raw(index)
        .map_err(|e| ConduitError::parameter(format!("reading column {index}: {e}")))?;
    if raw.is_null() {
        return Ok(SqlValue::Null);
    }
    let type_name = raw.type_info().name().to_ascii_uppercase();

    let decoded = match type_name.as_str() {
        "INTEGER" | "INT" | "INT4" | "INT8" | "BIGINT" => {
            row.try_get::<i64, _>(index).map(SqlValue::Integer).ok()
        }
        "REAL" | "FLOAT" | "DOUBLE" | "NUMERIC" => {
            row.try_get::<f64, _>(index).map(SqlValue::Float).ok()
        }
        "BOOLEAN" => row.try_get::<bool, _>(index).map(SqlValue::Boolean).ok(),
        "DATETIME" | "TIMESTAMP" => row
            .try_get::<chrono::NaiveDateTime, _>(index)
            .map(SqlValue::Timestamp)
            .ok(),
        "TEXT" | "VARCHAR" | "CHAR" => row.try_get::<String, _>(index).map(SqlValue::Text).ok(),
        "BLOB" => row.try_get::<Vec<u8>, _>(index).map(SqlValue::Blob).ok(),
        _ => None,
    };

    Ok(decoded.unwrap_or_else(|| decode_fallback(row, index)))
}

// Storage class and declared affinity can disagree; try the concrete types
// in order of likelihood, as the driver will happily coerce.
fn decode_fallback(row: &SqliteRow, index: usize) -> SqlValue {
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
