//! Unified connection, transaction, and schema-introspection layer over
//! SQLite, PostgreSQL, and MySQL.
//!
//! One trait, [`DatabaseConnection`], covers the whole lifecycle: connect,
//! execute with bound parameters, fetch from the buffered cursor, manage
//! transactions, escape literals, and introspect table metadata. Backend
//! selection happens exactly once, when [`create_connection`] reads
//! [`ConnectionConfig::kind`]; everything after that is dynamic dispatch
//! over a sealed, feature-gated adapter set.
//!
//! # Guarantees
//! - One physical connection per instance; no pooling, no background tasks
//! - Identical row shape (ordered column-name/value association) on every
//!   backend
//! - Credentials never appear in logs or error messages
//! - Programmer errors (wrong-state calls) are distinguishable from backend
//!   failures
//!
//! # Example
//! ```rust,no_run
//! use dbconduit::{ConnectionConfig, SqlValue, create_connection};
//!
//! # async fn demo() -> dbconduit::Result<()> {
//! let mut conn = create_connection(ConnectionConfig::sqlite(":memory:"))?;
//! conn.connect().await?;
//! conn.execute(
//!     "INSERT INTO users (name) VALUES (?)",
//!     &[SqlValue::Text("alice".into())],
//! )
//! .await?;
//! let id = conn.last_insert_id().await?;
//! # let _ = id;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod logging;
pub mod models;
pub mod row;
pub mod value;

// Re-export commonly used types
pub use config::{ConnectionConfig, DatabaseKind};
pub use connection::{
    DatabaseConnection, ExecuteOutcome, IsolationLevel, create_connection,
    create_connection_with_sink,
};
pub use error::{ConduitError, Result};
pub use logging::{DiagnosticEvent, DiagnosticSink, Severity, TracingSink, init_logging};
pub use models::{ColumnInfo, ForeignKeyRef, IndexInfo, TableInfo};
pub use row::{Row, RowSet};
pub use value::SqlValue;
