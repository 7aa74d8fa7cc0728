//! SQLite catalog queries.
//!
//! SQLite exposes schema metadata through pragmas rather than catalog
//! tables, and each pragma reports one facet. The facets are
//! cross-referenced here: `table_info` drives the column list,
//! `foreign_key_list` and `index_list`/`index_info` fill in the
//! relationship and index flags.

use sqlx::Row as _;
use sqlx::sqlite::SqliteConnection;

use crate::Result;
use crate::error::ConduitError;
use crate::models::{ColumnInfo, ForeignKeyRef, IndexInfo, TableInfo};

// Pragma arguments cannot be bound, so the table name is embedded as a
// single-quoted literal with '' doubling.
fn pragma_arg(name: &str) -> String {
    name.replace('\'', "''")
}

async fn table_exists(conn: &mut SqliteConnection, table: &str) -> Result<bool> {
    let row = sqlx::query("SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?")
        .bind(table)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| ConduitError::introspection_failed("checking table existence", e))?;
    Ok(row.is_some())
}

/// Introspects one table, `None` when it does not exist.
pub(super) async fn table_info(
    conn: &mut SqliteConnection,
    table: &str,
) -> Result<Option<TableInfo>> {
    if !table_exists(conn, table).await? {
        return Ok(None);
    }

    let column_rows = sqlx::query(&format!("PRAGMA table_info('{}')", pragma_arg(table)))
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| ConduitError::introspection_failed(format!("table_info for {table}"), e))?;

    let mut info = TableInfo::new(table);
    // (pk ordinal, column name) pairs; pk > 0 marks key membership.
    let mut pk_order: Vec<(i64, String)> = Vec::new();

    for row in &column_rows {
        let name: String = row
            .try_get("name")
            .map_err(|e| ConduitError::introspection_failed("reading column name", e))?;
        let declared_type: String = row.try_get("type").unwrap_or_default();
        let not_null: i64 = row.try_get("notnull").unwrap_or(0);
        let default_value: Option<String> = row.try_get("dflt_value").unwrap_or(None);
        let pk: i64 = row.try_get("pk").unwrap_or(0);

        let mut column = ColumnInfo::new(&name, &declared_type);
        column.is_nullable = not_null == 0 && pk == 0;
        column.default_value = default_value;
        column.max_length = parse_declared_length(&declared_type);
        column.is_primary_key = pk > 0;
        if pk > 0 {
            pk_order.push((pk, name));
        }
        info.columns.push(column);
    }

    pk_order.sort_by_key(|(ordinal, _)| *ordinal);
    info.primary_keys = pk_order.into_iter().map(|(_, name)| name).collect();

    // Rowid aliasing: a lone INTEGER primary key auto-assigns values.
    if info.primary_keys.len() == 1
        && let Some(col) = info
            .columns
            .iter_mut()
            .find(|c| c.name == info.primary_keys[0])
        && col.data_type.eq_ignore_ascii_case("INTEGER")
    {
        col.is_auto_increment = true;
    }

    collect_foreign_keys(conn, table, &mut info).await?;
    collect_indexes(conn, table, &mut info).await?;

    Ok(Some(info))
}

async fn collect_foreign_keys(
    conn: &mut SqliteConnection,
    table: &str,
    info: &mut TableInfo,
) -> Result<()> {
    let rows = sqlx::query(&format!(
        "PRAGMA foreign_key_list('{}')",
        pragma_arg(table)
    ))
    .fetch_all(&mut *conn)
    .await
    .map_err(|e| ConduitError::introspection_failed(format!("foreign_key_list for {table}"), e))?;

    for row in &rows {
        let column: String = row
            .try_get("from")
            .map_err(|e| ConduitError::introspection_failed("reading foreign key column", e))?;
        let referenced_table: String = row.try_get("table").unwrap_or_default();
        // A null "to" means the reference targets the parent's primary key.
        let referenced_column: Option<String> = row.try_get("to").unwrap_or(None);

        if let Some(col) = info.columns.iter_mut().find(|c| c.name == column) {
            col.is_foreign_key = true;
            col.ref_table = Some(referenced_table.clone());
            col.ref_column = referenced_column.clone();
        }
        info.foreign_keys.push(ForeignKeyRef {
            column,
            referenced_table,
            referenced_column: referenced_column.unwrap_or_default(),
        });
    }
    Ok(())
}

async fn collect_indexes(
    conn: &mut SqliteConnection,
    table: &str,
    info: &mut TableInfo,
) -> Result<()> {
    let index_rows = sqlx::query(&format!("PRAGMA index_list('{}')", pragma_arg(table)))
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| ConduitError::introspection_failed(format!("index_list for {table}"), e))?;

    for index_row in &index_rows {
        let index_name: String = index_row
            .try_get("name")
            .map_err(|e| ConduitError::introspection_failed("reading index name", e))?;
        let is_unique: i64 = index_row.try_get("unique").unwrap_or(0);

        let member_rows = sqlx::query(&format!(
            "PRAGMA index_info('{}')",
            pragma_arg(&index_name)
        ))
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| {
            ConduitError::introspection_failed(format!("index_info for {index_name}"), e)
        })?;

        // Expression index members have no column name and are skipped.
        let columns: Vec<String> = member_rows
            .iter()
            .filter_map(|r| r.try_get::<Option<String>, _>("name").ok().flatten())
            .collect();

        for name in &columns {
            if let Some(col) = info.columns.iter_mut().find(|c| &c.name == name) {
                col.is_indexed = true;
                if is_unique != 0 && columns.len() == 1 {
                    col.is_unique = true;
                }
            }
        }

        info.indexes.push(IndexInfo {
            name: index_name,
            columns,
            is_unique: is_unique != 0,
        });
    }
    Ok(())
}

/// Lists user tables, excluding SQLite's internal `sqlite_*` tables.
pub(super) async fn table_list(conn: &mut SqliteConnection) -> Result<Vec<String>> {
    let rows = sqlx::query(
        "SELECT name FROM sqlite_master \
         WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
    )
    .fetch_all(&mut *conn)
    .await
    .map_err(|e| ConduitError::introspection_failed("listing tables", e))?;

    rows.iter()
        .map(|row| {
            row.try_get::<String, _>("name")
                .map_err(|e| ConduitError::introspection_failed("reading table name", e))
        })
        .collect()
}

/// Parses a declared length out of a type like `VARCHAR(255)`.
fn parse_declared_length(declared_type: &str) -> Option<i64> {
    let open = declared_type.find('(')?;
    let close = declared_type[open..].find(')')? + open;
    declared_type[open + 1..close]
        .split(',')
        .next()?
        .trim()
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_declared_length() {
        assert_eq!(parse_declared_length("VARCHAR(255)"), Some(255));
        assert_eq!(parse_declared_length("DECIMAL(10, 2)"), Some(10));
        assert_eq!(parse_declared_length("INTEGER"), None);
        assert_eq!(parse_declared_length("TEXT()"), None);
    }

    #[test]
    fn test_pragma_arg_doubling() {
        assert_eq!(pragma_arg("it's"), "it''s");
        assert_eq!(pragma_arg("plain"), "plain");
    }
}
