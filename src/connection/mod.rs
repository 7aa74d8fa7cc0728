//! The database connection contract and its backend factory.
//!
//! This module defines the object-safe trait every backend adapter
//! implements, plus the factory that selects an adapter from a
//! [`ConnectionConfig`]. Backend selection happens exactly once, at
//! construction; after that every call dispatches through the trait.

use async_trait::async_trait;
use std::sync::Arc;

use crate::Result;
use crate::config::{ConnectionConfig, DatabaseKind};
use crate::logging::{DiagnosticSink, default_sink};
use crate::models::TableInfo;
use crate::row::Row;
use crate::value::SqlValue;

pub mod helpers;

#[cfg(feature = "mysql")]
pub mod mysql;
#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(feature = "sqlite")]
pub mod sqlite;

/// Standard transaction isolation levels.
///
/// Each backend maps these onto its own BEGIN syntax; levels a backend
/// cannot express fall back to its default with a logged warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    /// SQL keyword form, as used in PostgreSQL and MySQL statements.
    #[must_use]
    pub fn as_sql(self) -> &'static str {
        match self {
            IsolationLevel::ReadUncommitted => "READ UNCOMMITTED",
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        }
    }
}

impl std::fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Result of executing one statement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecuteOutcome {
    /// Rows changed by the statement (0 for pure queries)
    pub rows_affected: u64,
    /// Generated key for INSERTs where the backend reports one natively
    pub last_insert_id: Option<i64>,
}

/// Unified contract for one database connection.
///
/// Implementations hold exactly one native handle. Every operation resolves
/// only when the native driver has finished; nothing runs in the background.
///
/// # Object Safety
/// This trait is object-safe, allowing dynamic dispatch through
/// `Box<dyn DatabaseConnection>`.
#[async_trait]
pub trait DatabaseConnection: Send + Sync {
    /// Establishes the native handle, enforcing the configured connect
    /// timeout.
    ///
    /// # Errors
    /// State error if already connected; connection error on failure, in
    /// which case no handle is retained and no retry is attempted.
    async fn connect(&mut self) -> Result<()>;

    /// Closes the native handle if one is open.
    ///
    /// Returns `Ok(true)` when a handle was closed, `Ok(false)` when the
    /// connection was already disconnected. Clears cursor and transaction
    /// state either way.
    ///
    /// # Errors
    /// Connection error if the native close fails.
    async fn disconnect(&mut self) -> Result<bool>;

    /// Executes one statement with driver-bound parameters and buffers its
    /// result as the current cursor, replacing any previous one.
    ///
    /// # Errors
    /// State error if not connected; parameter error for unbindable values;
    /// statement error when the backend rejects the statement.
    async fn execute(&mut self, query: &str, params: &[SqlValue]) -> Result<ExecuteOutcome>;

    /// Takes the next unconsumed row of the current cursor, `None` when
    /// exhausted.
    ///
    /// # Errors
    /// State error if no statement has been executed on this connection.
    async fn fetch_one(&mut self) -> Result<Option<Row>>;

    /// Takes up to `count` unconsumed rows of the current cursor.
    ///
    /// # Errors
    /// State error if no statement has been executed on this connection.
    async fn fetch_many(&mut self, count: usize) -> Result<Vec<Row>>;

    /// Takes all unconsumed rows of the current cursor.
    ///
    /// # Errors
    /// State error if no statement has been executed on this connection.
    async fn fetch_all(&mut self) -> Result<Vec<Row>>;

    /// Opens a transaction, optionally at the given isolation level.
    ///
    /// Levels the backend cannot express fall back to its default with a
    /// logged warning rather than an error.
    ///
    /// # Errors
    /// State error if not connected or a transaction is already open.
    async fn begin_transaction(&mut self, isolation: Option<IsolationLevel>) -> Result<()>;

    /// Commits the open transaction.
    ///
    /// The in-transaction flag clears even when the native commit fails.
    ///
    /// # Errors
    /// State error without an open transaction.
    async fn commit_transaction(&mut self) -> Result<()>;

    /// Rolls back the open transaction.
    ///
    /// The in-transaction flag clears even when the native rollback fails.
    ///
    /// # Errors
    /// State error without an open transaction.
    async fn rollback_transaction(&mut self) -> Result<()>;

    /// Generated key of the most recent INSERT, if the backend reports one.
    ///
    /// # Errors
    /// State error if not connected.
    async fn last_insert_id(&mut self) -> Result<Option<i64>>;

    /// Affected-row count of the current cursor, 0 without one.
    fn affected_rows(&self) -> u64;

    /// Quotes an identifier in the backend's dialect. Pure.
    fn escape_identifier(&self, identifier: &str) -> String;

    /// Renders a value as a safe SQL literal in the backend's dialect. Pure.
    fn escape_value(&self, value: &SqlValue) -> String;

    /// Introspects one table, `Ok(None)` when it does not exist.
    ///
    /// # Errors
    /// State error if not connected; introspection error when a catalog
    /// query fails. Never returns a partially populated `TableInfo`.
    async fn get_table_info(&mut self, table: &str) -> Result<Option<TableInfo>>;

    /// Lists user tables, excluding backend system tables.
    ///
    /// # Errors
    /// State error if not connected; introspection error when the catalog
    /// query fails.
    async fn get_table_list(&mut self) -> Result<Vec<String>>;

    /// The backend this connection targets.
    fn backend(&self) -> DatabaseKind;

    /// True while a native handle is open.
    fn is_connected(&self) -> bool;

    /// True while a transaction is open.
    fn in_transaction(&self) -> bool;
}

/// Creates an unconnected adapter for the backend named by `config.kind`,
/// reporting diagnostics through the process-default sink.
///
/// # Errors
/// Configuration error for invalid configs; unsupported-feature error when
/// the backend was compiled out.
pub fn create_connection(config: ConnectionConfig) -> Result<Box<dyn DatabaseConnection>> {
    create_connection_with_sink(config, default_sink())
}

/// Creates an unconnected adapter reporting diagnostics through `sink`.
///
/// # Errors
/// Configuration error for invalid configs; unsupported-feature error when
/// the backend was compiled out.
pub fn create_connection_with_sink(
    config: ConnectionConfig,
    sink: Arc<dyn DiagnosticSink>,
) -> Result<Box<dyn DatabaseConnection>> {
    config.validate()?;

    match config.kind {
        #[cfg(feature = "sqlite")]
        DatabaseKind::Sqlite => Ok(Box::new(sqlite::SqliteAdapter::new(config, sink))),
        #[cfg(not(feature = "sqlite"))]
        DatabaseKind::Sqlite => {
            let _ = sink;
            Err(crate::error::ConduitError::unsupported_feature(
                "SQLite adapter",
                "this build (enable the sqlite feature)",
            ))
        }
        #[cfg(feature = "postgres")]
        DatabaseKind::Postgres => Ok(Box::new(postgres::PostgresAdapter::new(config, sink))),
        #[cfg(not(feature = "postgres"))]
        DatabaseKind::Postgres => {
            let _ = sink;
            Err(crate::error::ConduitError::unsupported_feature(
                "PostgreSQL adapter",
                "this build (enable the postgres feature)",
            ))
        }
        #[cfg(feature = "mysql")]
        DatabaseKind::MySql => Ok(Box::new(mysql::MySqlAdapter::new(config, sink))),
        #[cfg(not(feature = "mysql"))]
        DatabaseKind::MySql => {
            let _ = sink;
            Err(crate::error::ConduitError::unsupported_feature(
                "MySQL adapter",
                "this build (enable the mysql feature)",
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_isolation_level_sql() {
        assert_eq!(IsolationLevel::ReadCommitted.as_sql(), "READ COMMITTED");
        assert_eq!(IsolationLevel::Serializable.as_sql(), "SERIALIZABLE");
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn test_factory_selects_backend_once() {
        let conn = create_connection(ConnectionConfig::sqlite(":memory:")).unwrap();
        assert_eq!(conn.backend(), DatabaseKind::Sqlite);
        assert!(!conn.is_connected());
        assert!(!conn.in_transaction());
    }

    #[test]
    fn test_factory_rejects_invalid_config() {
        let config = ConnectionConfig::new(DatabaseKind::Sqlite);
        assert!(create_connection(config).is_err());
    }
}
