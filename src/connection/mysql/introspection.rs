//! MySQL catalog queries.
//!
//! Column facts come from `SHOW FULL COLUMNS`, declared lengths from
//! `INFORMATION_SCHEMA.COLUMNS`, foreign keys from
//! `INFORMATION_SCHEMA.KEY_COLUMN_USAGE`, and indexes from `SHOW INDEX`.
//! `SHOW` output frequently arrives under a binary collation, so every text
//! field is read through a bytes-tolerant helper.

use std::collections::HashMap;

use sqlx::Row as _;
use sqlx::mysql::{MySqlConnection, MySqlRow};

use crate::Result;
use crate::connection::helpers::quote_ident_backtick;
use crate::error::ConduitError;
use crate::models::{ColumnInfo, ForeignKeyRef, IndexInfo, TableInfo};

/// Reads a text field that may be typed as bytes.
fn text_at(row: &MySqlRow, column: &str) -> Option<String> {
    if let Ok(v) = row.try_get::<Option<String>, _>(column) {
        return v;
    }
    row.try_get::<Option<Vec<u8>>, _>(column)
        .ok()
        .flatten()
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
}

fn int_at(row: &MySqlRow, column: &str) -> Option<i64> {
    if let Ok(v) = row.try_get::<i64, _>(column) {
        return Some(v);
    }
    row.try_get::<u64, _>(column)
        .ok()
        .and_then(|v| i64::try_from(v).ok())
}

/// True for the SQLSTATE MySQL reports when a table does not exist.
fn is_missing_table(error: &sqlx::Error) -> bool {
    matches!(
        error,
        sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("42S02")
    )
}

/// Introspects one table in the current database, `None` when it does not
/// exist.
pub(super) async fn table_info(
    conn: &mut MySqlConnection,
    table: &str,
) -> Result<Option<TableInfo>> {
    let show_columns = format!("SHOW FULL COLUMNS FROM {}", quote_ident_backtick(table));
    let column_rows = match sqlx::query(&show_columns).fetch_all(&mut *conn).await {
        Ok(rows) => rows,
        Err(e) if is_missing_table(&e) => return Ok(None),
        Err(e) => {
            return Err(ConduitError::introspection_failed(
                format!("columns for {table}"),
                e,
            ));
        }
    };

    let max_lengths = declared_lengths(conn, table).await?;

    let mut info = TableInfo::new(table);
    for row in &column_rows {
        let name = text_at(row, "Field").ok_or_else(|| {
            ConduitError::introspection_failed(
                "reading column name",
                sqlx::Error::ColumnNotFound("Field".to_string()),
            )
        })?;
        let data_type = text_at(row, "Type").unwrap_or_default();
        let nullable = text_at(row, "Null").unwrap_or_default();
        let key = text_at(row, "Key").unwrap_or_default();
        let default_value = text_at(row, "Default");
        let extra = text_at(row, "Extra").unwrap_or_default();

        let mut column = ColumnInfo::new(&name, &data_type);
        column.is_nullable = nullable.eq_ignore_ascii_case("YES");
        column.is_primary_key = key == "PRI";
        column.is_unique = key == "PRI" || key == "UNI";
        column.default_value = default_value;
        column.max_length = max_lengths.get(&name).copied();
        column.is_auto_increment = extra.to_ascii_lowercase().contains("auto_increment");
        info.columns.push(column);
    }

    collect_foreign_keys(conn, table, &mut info).await?;
    collect_indexes(conn, table, &mut info).await?;

    // Key order comes from the PRIMARY index group; the PRI flags alone do
    // not carry it.
    if let Some(primary) = info.indexes.iter().find(|i| i.name == "PRIMARY") {
        info.primary_keys = primary.columns.clone();
    } else {
        info.primary_keys = info
            .columns
            .iter()
            .filter(|c| c.is_primary_key)
            .map(|c| c.name.clone())
            .collect();
    }

    Ok(Some(info))
}

async fn declared_lengths(
    conn: &mut MySqlConnection,
    table: &str,
) -> Result<HashMap<String, i64>> {
    let rows = sqlx::query(
        "SELECT COLUMN_NAME, CHARACTER_MAXIMUM_LENGTH \
         FROM INFORMATION_SCHEMA.COLUMNS \
         WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?",
    )
    .bind(table)
    .fetch_all(&mut *conn)
    .await
    .map_err(|e| ConduitError::introspection_failed(format!("column lengths for {table}"), e))?;

    let mut lengths = HashMap::new();
    for row in &rows {
        if let (Some(name), Some(length)) = (
            text_at(row, "COLUMN_NAME"),
            int_at(row, "CHARACTER_MAXIMUM_LENGTH"),
        ) {
            lengths.insert(name, length);
        }
    }
    Ok(lengths)
}

async fn collect_foreign_keys(
    conn: &mut MySqlConnection,
    table: &str,
    info: &mut TableInfo,
) -> Result<()> {
    let rows = sqlx::query(
        "SELECT COLUMN_NAME, REFERENCED_TABLE_NAME, REFERENCED_COLUMN_NAME \
         FROM INFORMATION_SCHEMA.KEY_COLUMN_USAGE \
         WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ? \
           AND REFERENCED_TABLE_NAME IS NOT NULL \
         ORDER BY ORDINAL_POSITION",
    )
    .bind(table)
    .fetch_all(&mut *conn)
    .await
    .map_err(|e| ConduitError::introspection_failed(format!("foreign keys for {table}"), e))?;

    for row in &rows {
        let Some(column) = text_at(row, "COLUMN_NAME") else {
            continue;
        };
        let referenced_table = text_at(row, "REFERENCED_TABLE_NAME").unwrap_or_default();
        let referenced_column = text_at(row, "REFERENCED_COLUMN_NAME").unwrap_or_default();

        if let Some(col) = info.columns.iter_mut().find(|c| c.name == column) {
            col.is_foreign_key = true;
            col.ref_table = Some(referenced_table.clone());
            col.ref_column = Some(referenced_column.clone());
        }
        info.foreign_keys.push(ForeignKeyRef {
            column,
            referenced_table,
            referenced_column,
        });
    }
    Ok(())
}

/// Folds one-member-per-row `SHOW INDEX` output into index groups.
///
/// Groups appear in the order their first member arrives, and columns within
/// a group keep their arrival order exactly (the server emits them ordered
/// by `Seq_in_index`). No sorting and no deduplication.
fn fold_index_groups(members: Vec<(String, String, bool)>) -> Vec<IndexInfo> {
    let mut groups: Vec<IndexInfo> = Vec::new();
    for (index_name, column_name, is_unique) in members {
        match groups.iter_mut().find(|g| g.name == index_name) {
            Some(group) => group.columns.push(column_name),
            None => groups.push(IndexInfo {
                name: index_name,
                columns: vec![column_name],
                is_unique,
            }),
        }
    }
    groups
}

async fn collect_indexes(
    conn: &mut MySqlConnection,
    table: &str,
    info: &mut TableInfo,
) -> Result<()> {
    let show_index = format!("SHOW INDEX FROM {}", quote_ident_backtick(table));
    let rows = sqlx::query(&show_index)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| ConduitError::introspection_failed(format!("indexes for {table}"), e))?;

    let members = rows
        .iter()
        .filter_map(|row| {
            let index_name = text_at(row, "Key_name")?;
            let column_name = text_at(row, "Column_name")?;
            let non_unique = int_at(row, "Non_unique").unwrap_or(1);
            Some((index_name, column_name, non_unique == 0))
        })
        .collect();

    for group in fold_index_groups(members) {
        for name in &group.columns {
            if let Some(col) = info.columns.iter_mut().find(|c| &c.name == name) {
                col.is_indexed = true;
                if group.is_unique && group.columns.len() == 1 {
                    col.is_unique = true;
                }
            }
        }
        info.indexes.push(group);
    }
    Ok(())
}

/// Lists base tables in the current database.
pub(super) async fn table_list(conn: &mut MySqlConnection) -> Result<Vec<String>> {
    let rows = sqlx::query(
        "SELECT TABLE_NAME FROM INFORMATION_SCHEMA.TABLES \
         WHERE TABLE_SCHEMA = DATABASE() AND TABLE_TYPE = 'BASE TABLE' \
         ORDER BY TABLE_NAME",
    )
    .fetch_all(&mut *conn)
    .await
    .map_err(|e| ConduitError::introspection_failed("listing tables", e))?;

    Ok(rows
        .iter()
        .filter_map(|row| text_at(row, "TABLE_NAME"))
        .collect())
}
