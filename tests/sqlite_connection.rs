//! SQLite end-to-end tests for the connection contract.
//!
//! This suite covers:
//! - Connect/disconnect lifecycle and state-error strictness
//! - Execute with bound parameters, generated keys, affected rows
//! - Fetch semantics over the buffered cursor
//! - Transaction begin/commit/rollback atomicity
//! - Table introspection and listing
//!
//! Note: in-memory databases throughout, plus one file-backed case for
//! parent-directory creation.

#![cfg(feature = "sqlite")]

use dbconduit::{
    ConnectionConfig, DatabaseConnection, DatabaseKind, IsolationLevel, Result, SqlValue,
    create_connection,
};

/// Helper that returns a connected in-memory adapter.
async fn connected() -> Result<Box<dyn DatabaseConnection>> {
    let mut conn = create_connection(ConnectionConfig::sqlite(":memory:"))?;
    conn.connect().await?;
    Ok(conn)
}

/// Helper that additionally creates the users table from the contract
/// scenarios.
async fn connected_with_users() -> Result<Box<dyn DatabaseConnection>> {
    let mut conn = connected().await?;
    conn.execute(
        "CREATE TABLE users (\
             id INTEGER PRIMARY KEY, \
             name TEXT NOT NULL, \
             email TEXT UNIQUE, \
             age INTEGER DEFAULT 0\
         )",
        &[],
    )
    .await?;
    Ok(conn)
}

// =============================================================================
// Lifecycle
// =============================================================================

#[tokio::test]
async fn test_connect_and_disconnect() -> Result<()> {
    let mut conn = create_connection(ConnectionConfig::sqlite(":memory:"))?;
    assert!(!conn.is_connected());
    assert_eq!(conn.backend(), DatabaseKind::Sqlite);

    conn.connect().await?;
    assert!(conn.is_connected());

    assert!(conn.disconnect().await?);
    assert!(!conn.is_connected());
    // A second disconnect reports that nothing was open.
    assert!(!conn.disconnect().await?);
    Ok(())
}

#[tokio::test]
async fn test_double_connect_is_a_state_error() -> Result<()> {
    let mut conn = connected().await?;
    let err = conn.connect().await.unwrap_err();
    assert!(err.is_state_error());
    Ok(())
}

#[tokio::test]
async fn test_operations_require_connection() -> Result<()> {
    let mut conn = create_connection(ConnectionConfig::sqlite(":memory:"))?;
    assert!(conn.execute("SELECT 1", &[]).await.unwrap_err().is_state_error());
    assert!(conn.fetch_one().await.unwrap_err().is_state_error());
    assert!(
        conn.begin_transaction(None)
            .await
            .unwrap_err()
            .is_state_error()
    );
    assert!(conn.last_insert_id().await.unwrap_err().is_state_error());
    assert!(
        conn.get_table_info("users")
            .await
            .unwrap_err()
            .is_state_error()
    );
    Ok(())
}

#[tokio::test]
async fn test_file_backed_database_creates_parent_directories() -> Result<()> {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir
        .path()
        .join("nested/deeper/test.db")
        .to_string_lossy()
        .into_owned();

    let mut conn = create_connection(ConnectionConfig::sqlite(&path))?;
    conn.connect().await?;
    conn.execute("CREATE TABLE t (id INTEGER)", &[]).await?;
    conn.disconnect().await?;

    assert!(std::path::Path::new(&path).exists());
    Ok(())
}

// =============================================================================
// Execute and fetch
// =============================================================================

#[tokio::test]
async fn test_insert_reports_generated_key_and_affected_rows() -> Result<()> {
    let mut conn = connected_with_users().await?;

    let outcome = conn
        .execute(
            "INSERT INTO users (name, email) VALUES (?, ?)",
            &[
                SqlValue::Text("alice".into()),
                SqlValue::Text("alice@example.com".into()),
            ],
        )
        .await?;

    assert_eq!(outcome.rows_affected, 1);
    assert_eq!(outcome.last_insert_id, Some(1));
    assert_eq!(conn.last_insert_id().await?, Some(1));
    assert_eq!(conn.affected_rows(), 1);
    Ok(())
}

#[tokio::test]
async fn test_update_does_not_report_a_generated_key() -> Result<()> {
    let mut conn = connected_with_users().await?;
    conn.execute("INSERT INTO users (name) VALUES ('a')", &[])
        .await?;

    let outcome = conn
        .execute("UPDATE users SET name = 'b' WHERE id = 1", &[])
        .await?;
    assert_eq!(outcome.rows_affected, 1);
    assert_eq!(outcome.last_insert_id, None);

    // The connection-level accessor stays sticky on the last INSERT.
    assert_eq!(conn.last_insert_id().await?, Some(1));

    let outcome = conn
        .execute("INSERT INTO users (name) VALUES ('c')", &[])
        .await?;
    assert_eq!(outcome.last_insert_id, Some(2));
    Ok(())
}

#[tokio::test]
async fn test_fetch_semantics() -> Result<()> {
    let mut conn = connected_with_users().await?;
    for name in ["a", "b", "c", "d"] {
        conn.execute(
            "INSERT INTO users (name) VALUES (?)",
            &[SqlValue::Text(name.into())],
        )
        .await?;
    }

    conn.execute("SELECT id, name FROM users ORDER BY id", &[])
        .await?;

    let first = conn.fetch_one().await?.expect("row");
    assert_eq!(first.get("name"), Some(&SqlValue::Text("a".into())));
    assert_eq!(first.column_names(), ["id", "name"]);

    let two = conn.fetch_many(2).await?;
    assert_eq!(two.len(), 2);
    assert_eq!(two[0].get("name"), Some(&SqlValue::Text("b".into())));

    let rest = conn.fetch_all().await?;
    assert_eq!(rest.len(), 1);
    assert_eq!(rest[0].get("name"), Some(&SqlValue::Text("d".into())));

    // Exhausted cursor yields None, not an error.
    assert!(conn.fetch_one().await?.is_none());
    Ok(())
}

#[tokio::test]
async fn test_new_execute_invalidates_previous_cursor() -> Result<()> {
    let mut conn = connected_with_users().await?;
    conn.execute("INSERT INTO users (name) VALUES ('x'), ('y')", &[])
        .await?;

    conn.execute("SELECT name FROM users", &[]).await?;
    conn.execute("SELECT 42 AS answer", &[]).await?;

    let rows = conn.fetch_all().await?;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("answer"), Some(&SqlValue::Integer(42)));
    Ok(())
}

#[tokio::test]
async fn test_statement_error_carries_query_text() -> Result<()> {
    let mut conn = connected().await?;
    let err = conn
        .execute("SELECT * FROM does_not_exist", &[])
        .await
        .unwrap_err();
    assert!(err.to_string().contains("does_not_exist"));
    assert!(!err.is_state_error());
    Ok(())
}

#[tokio::test]
async fn test_list_parameter_is_rejected() -> Result<()> {
    let mut conn = connected_with_users().await?;
    let err = conn
        .execute(
            "SELECT * FROM users WHERE id IN ?",
            &[SqlValue::List(vec![SqlValue::Integer(1)])],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, dbconduit::ConduitError::Parameter { .. }));
    Ok(())
}

#[tokio::test]
async fn test_value_round_trip() -> Result<()> {
    let mut conn = connected().await?;
    conn.execute(
        "CREATE TABLE vals (i INTEGER, f REAL, t TEXT, b BLOB)",
        &[],
    )
    .await?;
    conn.execute(
        "INSERT INTO vals VALUES (?, ?, ?, ?)",
        &[
            SqlValue::Integer(-5),
            SqlValue::Float(2.5),
            SqlValue::Text("O'Brien".into()),
            SqlValue::Blob(vec![0, 1, 2]),
        ],
    )
    .await?;

    conn.execute("SELECT i, f, t, b FROM vals", &[]).await?;
    let row = conn.fetch_one().await?.expect("row");
    assert_eq!(row.get("i"), Some(&SqlValue::Integer(-5)));
    assert_eq!(row.get("f"), Some(&SqlValue::Float(2.5)));
    assert_eq!(row.get("t"), Some(&SqlValue::Text("O'Brien".into())));
    assert_eq!(row.get("b"), Some(&SqlValue::Blob(vec![0, 1, 2])));
    Ok(())
}

#[tokio::test]
async fn test_escaped_value_survives_literal_sql() -> Result<()> {
    let mut conn = connected_with_users().await?;
    let literal = conn.escape_value(&SqlValue::Text("it's ok".into()));
    conn.execute(
        &format!("INSERT INTO users (name) VALUES ({literal})"),
        &[],
    )
    .await?;

    conn.execute("SELECT name FROM users", &[]).await?;
    let row = conn.fetch_one().await?.expect("row");
    assert_eq!(row.get("name"), Some(&SqlValue::Text("it's ok".into())));
    Ok(())
}

// =============================================================================
// Transactions
// =============================================================================

#[tokio::test]
async fn test_rollback_discards_writes() -> Result<()> {
    let mut conn = connected_with_users().await?;

    conn.begin_transaction(None).await?;
    assert!(conn.in_transaction());
    conn.execute("INSERT INTO users (name) VALUES ('ghost')", &[])
        .await?;
    conn.rollback_transaction().await?;
    assert!(!conn.in_transaction());

    conn.execute("SELECT COUNT(*) AS n FROM users", &[]).await?;
    let row = conn.fetch_one().await?.expect("row");
    assert_eq!(row.get("n"), Some(&SqlValue::Integer(0)));
    Ok(())
}

#[tokio::test]
async fn test_commit_persists_writes() -> Result<()> {
    let mut conn = connected_with_users().await?;

    conn.begin_transaction(Some(IsolationLevel::Serializable))
        .await?;
    conn.execute("INSERT INTO users (name) VALUES ('kept')", &[])
        .await?;
    conn.commit_transaction().await?;

    conn.execute("SELECT COUNT(*) AS n FROM users", &[]).await?;
    let row = conn.fetch_one().await?.expect("row");
    assert_eq!(row.get("n"), Some(&SqlValue::Integer(1)));
    Ok(())
}

#[tokio::test]
async fn test_transaction_state_errors() -> Result<()> {
    let mut conn = connected().await?;

    assert!(
        conn.commit_transaction()
            .await
            .unwrap_err()
            .is_state_error()
    );
    assert!(
        conn.rollback_transaction()
            .await
            .unwrap_err()
            .is_state_error()
    );

    conn.begin_transaction(None).await?;
    let err = conn.begin_transaction(None).await.unwrap_err();
    assert!(err.is_state_error());
    conn.rollback_transaction().await?;
    Ok(())
}

// =============================================================================
// Introspection
// =============================================================================

#[tokio::test]
async fn test_table_info_for_users() -> Result<()> {
    let mut conn = connected_with_users().await?;
    let info = conn.get_table_info("users").await?.expect("table info");

    assert_eq!(info.name, "users");
    assert_eq!(info.primary_keys, ["id"]);
    assert!(info.is_consistent());

    let id = info.column("id").expect("id column");
    assert!(id.is_primary_key);
    assert!(id.is_auto_increment);
    assert!(!id.is_nullable);

    let email = info.column("email").expect("email column");
    assert!(email.is_unique);
    assert!(email.is_indexed);
    assert!(email.is_nullable);

    let age = info.column("age").expect("age column");
    assert_eq!(age.default_value.as_deref(), Some("0"));
    Ok(())
}

#[tokio::test]
async fn test_table_info_foreign_keys() -> Result<()> {
    let mut conn = connected_with_users().await?;
    conn.execute(
        "CREATE TABLE posts (\
             id INTEGER PRIMARY KEY, \
             author_id INTEGER REFERENCES users(id)\
         )",
        &[],
    )
    .await?;

    let info = conn.get_table_info("posts").await?.expect("table info");
    assert_eq!(info.foreign_keys.len(), 1);
    assert_eq!(info.foreign_keys[0].column, "author_id");
    assert_eq!(info.foreign_keys[0].referenced_table, "users");

    let author = info.column("author_id").expect("author_id column");
    assert!(author.is_foreign_key);
    assert_eq!(author.ref_table.as_deref(), Some("users"));
    Ok(())
}

#[tokio::test]
async fn test_missing_table_is_none_not_error() -> Result<()> {
    let mut conn = connected().await?;
    assert!(conn.get_table_info("nope").await?.is_none());
    Ok(())
}

#[tokio::test]
async fn test_table_list_excludes_internal_tables() -> Result<()> {
    let mut conn = connected_with_users().await?;
    conn.execute("CREATE TABLE b_table (id INTEGER)", &[])
        .await?;

    let tables = conn.get_table_list().await?;
    assert_eq!(tables, ["b_table", "users"]);
    Ok(())
}
