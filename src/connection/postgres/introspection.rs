//! PostgreSQL catalog queries.
//!
//! Columns, keys, and constraints come from `information_schema`; indexes
//! come from `pg_indexes`, whose `indexdef` text is parsed for the column
//! list and uniqueness. Only the `public` schema is inspected.

use sqlx::Row as _;
use sqlx::postgres::PgConnection;

use crate::Result;
use crate::error::ConduitError;
use crate::models::{ColumnInfo, ForeignKeyRef, IndexInfo, TableInfo};

async fn table_exists(conn: &mut PgConnection, table: &str) -> Result<bool> {
    let row = sqlx::query(
        "SELECT 1 FROM information_schema.tables \
         WHERE table_schema = 'public' AND table_name = $1",
    )
    .bind(table)
    .fetch_optional(&mut *conn)
    .await
    .map_err(|e| ConduitError::introspection_failed("checking table existence", e))?;
    Ok(row.is_some())
}

/// Introspects one table in the public schema, `None` when it does not exist.
pub(super) async fn table_info(
    conn: &mut PgConnection,
    table: &str,
) -> Result<Option<TableInfo>> {
    if !table_exists(conn, table).await? {
        return Ok(None);
    }

    let column_rows = sqlx::query(
        "SELECT column_name, data_type, is_nullable, column_default, \
                character_maximum_length \
         FROM information_schema.columns \
         WHERE table_schema = 'public' AND table_name = $1 \
         ORDER BY ordinal_position",
    )
    .bind(table)
    .fetch_all(&mut *conn)
    .await
    .map_err(|e| ConduitError::introspection_failed(format!("columns for {table}"), e))?;

    let mut info = TableInfo::new(table);
    for row in &column_rows {
        let name: String = row
            .try_get("column_name")
            .map_err(|e| ConduitError::introspection_failed("reading column name", e))?;
        let data_type: String = row.try_get("data_type").unwrap_or_default();
        let is_nullable: String = row.try_get("is_nullable").unwrap_or_default();
        let default_value: Option<String> = row.try_get("column_default").unwrap_or(None);
        let max_length: Option<i32> = row.try_get("character_maximum_length").unwrap_or(None);

        let mut column = ColumnInfo::new(&name, &data_type);
        column.is_nullable = is_nullable == "YES";
        // Sequence-backed defaults mark serial/identity columns.
        column.is_auto_increment = default_value
            .as_deref()
            .is_some_and(|d| d.starts_with("nextval("));
        column.default_value = default_value;
        column.max_length = max_length.map(i64::from);
        info.columns.push(column);
    }

    collect_primary_keys(conn, table, &mut info).await?;
    collect_foreign_keys(conn, table, &mut info).await?;
    collect_indexes(conn, table, &mut info).await?;

    Ok(Some(info))
}

async fn collect_primary_keys(
    conn: &mut PgConnection,
    table: &str,
    info: &mut TableInfo,
) -> Result<()> {
    let rows = sqlx::query(
        "SELECT kcu.column_name \
         FROM information_schema.table_constraints tc \
         JOIN information_schema.key_column_usage kcu \
           ON tc.constraint_name = kcu.constraint_name \
          AND tc.table_schema = kcu.table_schema \
         WHERE tc.constraint_type = 'PRIMARY KEY' \
           AND tc.table_schema = 'public' AND tc.table_name = $1 \
         ORDER BY kcu.ordinal_position",
    )
    .bind(table)
    .fetch_all(&mut *conn)
    .await
    .map_err(|e| ConduitError::introspection_failed(format!("primary keys for {table}"), e))?;

    for row in &rows {
        let name: String = row
            .try_get("column_name")
            .map_err(|e| ConduitError::introspection_failed("reading primary key column", e))?;
        if let Some(col) = info.columns.iter_mut().find(|c| c.name == name) {
            col.is_primary_key = true;
            col.is_nullable = false;
        }
        info.primary_keys.push(name);
    }
    Ok(())
}

async fn collect_foreign_keys(
    conn: &mut PgConnection,
    table: &str,
    info: &mut TableInfo,
) -> Result<()> {
    let rows = sqlx::query(
        "SELECT kcu.column_name, \
                ccu.table_name AS referenced_table, \
                ccu.column_name AS referenced_column \
         FROM information_schema.table_constraints tc \
         JOIN information_schema.key_column_usage kcu \
           ON tc.constraint_name = kcu.constraint_name \
          AND tc.table_schema = kcu.table_schema \
         JOIN information_schema.constraint_column_usage ccu \
           ON tc.constraint_name = ccu.constraint_name \
          AND tc.table_schema = ccu.table_schema \
         WHERE tc.constraint_type = 'FOREIGN KEY' \
           AND tc.table_schema = 'public' AND tc.table_name = $1 \
         ORDER BY kcu.ordinal_position",
    )
    .bind(table)
    .fetch_all(&mut *conn)
    .await
    .map_err(|e| ConduitError::introspection_failed(format!("foreign keys for {table}"), e))?;

    for row in &rows {
        let column: String = row
            .try_get("column_name")
            .map_err(|e| ConduitError::introspection_failed("reading foreign key column", e))?;
        let referenced_table: String = row.try_get("referenced_table").unwrap_or_default();
        let referenced_column: String = row.try_get("referenced_column").unwrap_or_default();

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

async fn collect_indexes(
    conn: &mut PgConnection,
    table: &str,
    info: &mut TableInfo,
) -> Result<()> {
    let rows = sqlx::query(
        "SELECT indexname, indexdef FROM pg_indexes \
         WHERE schemaname = 'public' AND tablename = $1 \
         ORDER BY indexname",
    )
    .bind(table)
    .fetch_all(&mut *conn)
    .await
    .map_err(|e| ConduitError::introspection_failed(format!("indexes for {table}"), e))?;

    for row in &rows {
        let name: String = row
            .try_get("indexname")
            .map_err(|e| ConduitError::introspection_failed("reading index name", e))?;
        let definition: String = row.try_get("indexdef").unwrap_or_default();

        let is_unique = definition.starts_with("CREATE UNIQUE INDEX");
        let columns = parse_index_columns(&definition);

        for col_name in &columns {
            if let Some(col) = info.columns.iter_mut().find(|c| &c.name == col_name) {
                col.is_indexed = true;
                if is_unique && columns.len() == 1 {
                    col.is_unique = true;
                }
            }
        }

        info.indexes.push(IndexInfo {
            name,
            columns,
            is_unique,
        });
    }
    Ok(())
}

/// Lists user tables in the public schema.
pub(super) async fn table_list(conn: &mut PgConnection) -> Result<Vec<String>> {
    let rows = sqlx::query(
        "SELECT table_name FROM information_schema.tables \
         WHERE table_schema = 'public' AND table_type = 'BASE TABLE' \
         ORDER BY table_name",
    )
    .fetch_all(&mut *conn)
    .await
    .map_err(|e| ConduitError::introspection_failed("listing tables", e))?;

    rows.iter()
        .map(|row| {
            row.try_get::<String, _>("table_name")
                .map_err(|e| ConduitError::introspection_failed("reading table name", e))
        })
        .collect()
}

/// Pulls the column list out of a `CREATE [UNIQUE] INDEX ... (a, b)` text.
///
/// Expression members (anything with nested parentheses or function calls)
/// are kept verbatim; simple names are unquoted.
fn parse_index_columns(indexdef: &str) -> Vec<String> {
    let Some(open) = indexdef.find('(') else {
        return Vec::new();
    };
    let Some(close) = indexdef.rfind(')') else {
        return Vec::new();
    };
    if close <= open {
        return Vec::new();
    }
    indexdef[open + 1..close]
        .split(',')
        .map(|part| {
            // Ordering qualifiers are not part of the column name.
            part.trim()
                .trim_end_matches(" DESC")
                .trim_end_matches(" ASC")
                .trim()
                .trim_matches('"')
                .to_string()
        })
        .filter(|part| !part.is_empty())
        .collect()
}
