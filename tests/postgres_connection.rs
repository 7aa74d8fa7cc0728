//! PostgreSQL end-to-end tests for the connection contract.
//!
//! This suite covers:
//! - Placeholder translation (`?` accepted on every backend)
//! - Generated-key emulation via lastval()
//! - Transactions with explicit isolation
//! - information_schema / pg_indexes introspection
//!
//! Requires Docker; run with `cargo test -- --ignored`.

#![cfg(feature = "postgres")]

use std::time::Duration;

use dbconduit::{
    ConnectionConfig, DatabaseConnection, DatabaseKind, IsolationLevel, Result, SqlValue,
    create_connection,
};
use testcontainers_modules::{postgres::Postgres, testcontainers::runners::AsyncRunner};

fn config_for_port(port: u16) -> ConnectionConfig {
    ConnectionConfig::new(DatabaseKind::Postgres)
        .with_host("localhost")
        .with_port(port)
        .with_database("postgres")
        .with_username("postgres")
        .with_password("postgres")
        .with_connect_timeout(Duration::from_secs(5))
}

/// Waits until the server accepts connections, then returns a connected
/// adapter.
async fn connect_when_ready(port: u16) -> Result<Box<dyn DatabaseConnection>> {
    let mut last_err = None;
    for _ in 0..30 {
        let mut conn = create_connection(config_for_port(port))?;
        match conn.connect().await {
            Ok(()) => return Ok(conn),
            Err(e) => last_err = Some(e),
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    }
    Err(last_err.expect("at least one connect attempt"))
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_postgres_execute_fetch_and_last_insert_id() -> Result<()> {
    let server = Postgres::default().start().await.expect("start postgres");
    let port = server.get_host_port_ipv4(5432).await.expect("mapped port");
    let mut conn = connect_when_ready(port).await?;

    conn.execute(
        "CREATE TABLE users (\
             id SERIAL PRIMARY KEY, \
             name TEXT NOT NULL, \
             email TEXT UNIQUE\
         )",
        &[],
    )
    .await?;

    // lastval() is undefined before any insert in this session.
    assert_eq!(conn.last_insert_id().await?, None);

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
    assert_eq!(conn.last_insert_id().await?, Some(1));

    // Same logical query shape as the other backends.
    conn.execute(
        "SELECT id, name FROM users WHERE name = ?",
        &[SqlValue::Text("alice".into())],
    )
    .await?;
    let row = conn.fetch_one().await?.expect("row");
    assert_eq!(row.column_names(), ["id", "name"]);
    assert_eq!(row.get("id"), Some(&SqlValue::Integer(1)));
    assert_eq!(row.get("name"), Some(&SqlValue::Text("alice".into())));
    assert!(conn.fetch_one().await?.is_none());

    conn.disconnect().await?;
    Ok(())
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_postgres_transactions() -> Result<()> {
    let server = Postgres::default().start().await.expect("start postgres");
    let port = server.get_host_port_ipv4(5432).await.expect("mapped port");
    let mut conn = connect_when_ready(port).await?;

    conn.execute("CREATE TABLE t (v TEXT)", &[]).await?;

    conn.begin_transaction(Some(IsolationLevel::Serializable))
        .await?;
    conn.execute("INSERT INTO t (v) VALUES (?)", &[SqlValue::Text("x".into())])
        .await?;
    conn.rollback_transaction().await?;

    conn.begin_transaction(Some(IsolationLevel::ReadCommitted))
        .await?;
    conn.execute("INSERT INTO t (v) VALUES (?)", &[SqlValue::Text("y".into())])
        .await?;
    conn.commit_transaction().await?;

    conn.execute("SELECT v FROM t", &[]).await?;
    let rows = conn.fetch_all().await?;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("v"), Some(&SqlValue::Text("y".into())));

    conn.disconnect().await?;
    Ok(())
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_postgres_introspection() -> Result<()> {
    let server = Postgres::default().start().await.expect("start postgres");
    let port = server.get_host_port_ipv4(5432).await.expect("mapped port");
    let mut conn = connect_when_ready(port).await?;

    conn.execute(
        "CREATE TABLE authors (\
             id SERIAL PRIMARY KEY, \
             handle VARCHAR(64) UNIQUE NOT NULL\
         )",
        &[],
    )
    .await?;
    conn.execute(
        "CREATE TABLE posts (\
             id SERIAL PRIMARY KEY, \
             author_id INTEGER NOT NULL REFERENCES authors(id), \
             title VARCHAR(200)\
         )",
        &[],
    )
    .await?;
    conn.execute("CREATE INDEX idx_posts_title ON posts (title)", &[])
        .await?;

    let info = conn.get_table_info("posts").await?.expect("table info");
    assert_eq!(info.primary_keys, ["id"]);
    assert!(info.is_consistent());

    let id = info.column("id").expect("id column");
    assert!(id.is_auto_increment);

    let author = info.column("author_id").expect("author_id column");
    assert!(author.is_foreign_key);
    assert_eq!(author.ref_table.as_deref(), Some("authors"));
    assert_eq!(author.ref_column.as_deref(), Some("id"));

    let title = info.column("title").expect("title column");
    assert!(title.is_indexed);
    assert!(!title.is_unique);
    assert_eq!(title.max_length, Some(200));

    assert!(conn.get_table_info("missing").await?.is_none());

    let tables = conn.get_table_list().await?;
    assert_eq!(tables, ["authors", "posts"]);

    conn.disconnect().await?;
    Ok(())
}
