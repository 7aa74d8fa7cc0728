//! SQLite adapter.
//!
//! SQLite is file-based, so connect handles filesystem concerns the server
//! backends never see: parent directories are created for file paths, and
//! `:memory:` opens a private in-memory database. Foreign-key enforcement is
//! switched on at connect because SQLite defaults it off.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::{ConnectOptions, Connection, Either, Executor};

use crate::Result;
use crate::config::{ConnectionConfig, DatabaseKind};
use crate::connection::helpers::{
    BlobStyle, BooleanStyle, LiteralStyle, quote_ident_double, render_literal,
};
use crate::connection::{DatabaseConnection, ExecuteOutcome, IsolationLevel};
use crate::error::ConduitError;
use crate::logging::{DiagnosticEvent, DiagnosticSink, Severity};
use crate::models::TableInfo;
use crate::row::{Row, RowSet};
use crate::value::{SqlValue, render_params};

mod introspection;
mod values;

const LITERAL_STYLE: LiteralStyle = LiteralStyle {
    boolean: BooleanStyle::Numeric,
    blob: BlobStyle::HexString,
};

/// SQLite implementation of the connection contract.
pub struct SqliteAdapter {
    config: ConnectionConfig,
    sink: Arc<dyn DiagnosticSink>,
    conn: Option<SqliteConnection>,
    cursor: Option<RowSet>,
    in_transaction: bool,
    last_insert_id: Option<i64>,
}

impl SqliteAdapter {
    /// Builds an unconnected adapter.
    #[must_use]
    pub fn new(config: ConnectionConfig, sink: Arc<dyn DiagnosticSink>) -> Self {
        Self {
            config,
            sink,
            conn: None,
            cursor: None,
            in_transaction: false,
            last_insert_id: None,
        }
    }

    fn require_conn(&mut self) -> Result<&mut SqliteConnection> {
        self.conn
            .as_mut()
            .ok_or_else(|| ConduitError::state("not connected"))
    }

    fn emit_error(&self, operation: &'static str, message: String, query: Option<&str>) {
        let mut event = DiagnosticEvent::new(Severity::Error, "sqlite", operation, message);
        if let Some(query) = query {
            event = event.with_field("query", query);
        }
        self.sink.emit(event);
    }

    fn connect_options(&self) -> Result<SqliteConnectOptions> {
        let path = self
            .config
            .database
            .as_deref()
            .ok_or_else(|| ConduitError::configuration("SQLite requires a database path"))?;

        let mut options = if path == ":memory:" {
            SqliteConnectOptions::new().in_memory(true)
        } else {
            if let Some(parent) = Path::new(path).parent()
                && !parent.as_os_str().is_empty()
                && !parent.exists()
            {
                std::fs::create_dir_all(parent).map_err(|e| ConduitError::Io {
                    context: format!("creating parent directory for {path}"),
                    source: e,
                })?;
            }
            SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
        };

        options = options.foreign_keys(true);
        for (key, value) in &self.config.options {
            options = options.pragma(key.clone(), value.clone());
        }
        Ok(options)
    }

    /// Maps the standard isolation levels onto SQLite's lock-acquisition
    /// variants of BEGIN.
    fn begin_statement(isolation: Option<IsolationLevel>) -> &'static str {
        match isolation {
            None => "BEGIN",
            Some(IsolationLevel::ReadCommitted) => "BEGIN DEFERRED",
            Some(IsolationLevel::ReadUncommitted | IsolationLevel::RepeatableRead) => {
                "BEGIN IMMEDIATE"
            }
            Some(IsolationLevel::Serializable) => "BEGIN EXCLUSIVE",
        }
    }

    async fn run_raw(&mut self, sql: &'static str) -> Result<()> {
        let conn = self.require_conn()?;
        if let Err(e) = conn.execute(sql).await {
            self.emit_error("transaction", e.to_string(), Some(sql));
            return Err(ConduitError::statement_failed(sql, "[]", e));
        }
        Ok(())
    }
}

#[async_trait]
impl DatabaseConnection for SqliteAdapter {
    async fn connect(&mut self) -> Result<()> {
        if self.conn.is_some() {
            return Err(ConduitError::state("already connected"));
        }

        let options = self.connect_options()?;
        let attempt = tokio::time::timeout(self.config.connect_timeout, options.connect()).await;
        match attempt {
            Ok(Ok(conn)) => {
                self.conn = Some(conn);
                tracing::debug!(database = %self.config, "sqlite connection established");
                Ok(())
            }
            Ok(Err(e)) => {
                self.emit_error("connect", e.to_string(), None);
                Err(ConduitError::connection_failed(
                    format!("opening {}", self.config),
                    e,
                ))
            }
            Err(elapsed) => {
                self.emit_error("connect", "connect timed out".to_string(), None);
                Err(ConduitError::connection_failed(
                    format!("opening {} timed out", self.config),
                    elapsed,
                ))
            }
        }
    }

    async fn disconnect(&mut self) -> Result<bool> {
        self.cursor = None;
        self.in_transaction = false;
        self.last_insert_id = None;
        match self.conn.take() {
            Some(conn) => {
                conn.close()
                    .await
                    .map_err(|e| ConduitError::connection_failed("closing connection", e))?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn execute(&mut self, query: &str, params: &[SqlValue]) -> Result<ExecuteOutcome> {
        // Any previous cursor is invalidated before the statement runs.
        self.cursor = None;
        let previous_rowid = self.last_insert_id;
        let conn = self.require_conn()?;

        let mut prepared = sqlx::query(query);
        for param in params {
            prepared = values::bind_value(prepared, param)?;
        }

        let mut set: Option<RowSet> = None;
        let mut rows_affected = 0_u64;
        let mut insert_id = None;
        {
            let mut stream = conn.fetch_many(prepared);
            loop {
                let item = match stream.try_next().await {
                    Ok(item) => item,
                    Err(e) => {
                        drop(stream);
                        self.emit_error("execute", e.to_string(), Some(query));
                        return Err(ConduitError::statement_failed(
                            query,
                            render_params(params),
                            e,
                        ));
                    }
                };
                let Some(item) = item else { break };
                match item {
                    Either::Left(done) => {
                        rows_affected += done.rows_affected();
                        // last_insert_rowid() is connection-sticky, so an
                        // UPDATE or DELETE echoes the previous INSERT's
                        // rowid; only a changed rowid marks this statement
                        // as the inserting one.
                        let rowid = done.last_insert_rowid();
                        if done.rows_affected() > 0
                            && rowid != 0
                            && Some(rowid) != previous_rowid
                        {
                            insert_id = Some(rowid);
                        }
                    }
                    Either::Right(row) => {
                        let set = set.get_or_insert_with(|| values::row_set_for(&row));
                        set.push_row(values::decode_row(&row)?);
                    }
                }
            }
        }

        let mut set = set.unwrap_or_default();
        set.set_rows_affected(rows_affected);
        self.cursor = Some(set);
        if insert_id.is_some() {
            self.last_insert_id = insert_id;
        }

        Ok(ExecuteOutcome {
            rows_affected,
            last_insert_id: insert_id,
        })
    }

    async fn fetch_one(&mut self) -> Result<Option<Row>> {
        let cursor = self
            .cursor
            .as_mut()
            .ok_or_else(|| ConduitError::state("no statement has been executed"))?;
        Ok(cursor.take_next())
    }

    async fn fetch_many(&mut self, count: usize) -> Result<Vec<Row>> {
        let cursor = self
            .cursor
            .as_mut()
            .ok_or_else(|| ConduitError::state("no statement has been executed"))?;
        Ok(cursor.take_many(count))
    }

    async fn fetch_all(&mut self) -> Result<Vec<Row>> {
        let cursor = self
            .cursor
            .as_mut()
            .ok_or_else(|| ConduitError::state("no statement has been executed"))?;
        Ok(cursor.take_all())
    }

    async fn begin_transaction(&mut self, isolation: Option<IsolationLevel>) -> Result<()> {
        if self.conn.is_none() {
            return Err(ConduitError::state("not connected"));
        }
        if self.in_transaction {
            return Err(ConduitError::state("transaction already open"));
        }
        self.run_raw(Self::begin_statement(isolation)).await?;
        self.in_transaction = true;
        Ok(())
    }

    async fn commit_transaction(&mut self) -> Result<()> {
        if !self.in_transaction {
            return Err(ConduitError::state("no open transaction to commit"));
        }
        // The flag clears regardless of the native outcome.
        self.in_transaction = false;
        self.run_raw("COMMIT").await
    }

    async fn rollback_transaction(&mut self) -> Result<()> {
        if !self.in_transaction {
            return Err(ConduitError::state("no open transaction to roll back"));
        }
        self.in_transaction = false;
        self.run_raw("ROLLBACK").await
    }

    async fn last_insert_id(&mut self) -> Result<Option<i64>> {
        self.require_conn()?;
        Ok(self.last_insert_id)
    }

    fn affected_rows(&self) -> u64 {
        self.cursor.as_ref().map_or(0, RowSet::rows_affected)
    }

    fn escape_identifier(&self, identifier: &str) -> String {
        quote_ident_double(identifier)
    }

    fn escape_value(&self, value: &SqlValue) -> String {
        render_literal(value, LITERAL_STYLE)
    }

    async fn get_table_info(&mut self, table: &str) -> Result<Option<TableInfo>> {
        let conn = self.require_conn()?;
        introspection::table_info(conn, table).await
    }

    async fn get_table_list(&mut self) -> Result<Vec<String>> {
        let conn = self.require_conn()?;
        introspection::table_list(conn).await
    }

    fn backend(&self) -> DatabaseKind {
        DatabaseKind::Sqlite
    }

    fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    fn in_transaction(&self) -> bool {
        self.in_transaction
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_begin_statement_mapping() {
        assert_eq!(SqliteAdapter::begin_statement(None), "BEGIN");
        assert_eq!(
            SqliteAdapter::begin_statement(Some(IsolationLevel::ReadCommitted)),
            "BEGIN DEFERRED"
        );
        assert_eq!(
            SqliteAdapter::begin_statement(Some(IsolationLevel::ReadUncommitted)),
            "BEGIN IMMEDIATE"
        );
        assert_eq!(
            SqliteAdapter::begin_statement(Some(IsolationLevel::RepeatableRead)),
            "BEGIN IMMEDIATE"
        );
        assert_eq!(
            SqliteAdapter::begin_statement(Some(IsolationLevel::Serializable)),
            "BEGIN EXCLUSIVE"
        );
    }

    #[test]
    fn test_escaping_is_pure() {
        let adapter = SqliteAdapter::new(
            ConnectionConfig::sqlite(":memory:"),
            crate::logging::default_sink(),
        );
        assert_eq!(adapter.escape_identifier("order"), "\"order\"");
        assert_eq!(
            adapter.escape_value(&SqlValue::Text("O'Brien".into())),
            "'O''Brien'"
        );
        assert_eq!(adapter.escape_value(&SqlValue::Boolean(true)), "1");
    }
}
