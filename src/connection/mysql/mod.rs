//! MySQL adapter.
//!
//! Isolation must be chosen before the transaction opens, so begin issues
//! `SET TRANSACTION ISOLATION LEVEL` followed by `START TRANSACTION`. The
//! configured charset goes onto the native options at connect.

use std::sync::Arc;

use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection};
use sqlx::{ConnectOptions, Connection, Either, Executor};

use crate::Result;
use crate::config::{ConnectionConfig, DatabaseKind};
use crate::connection::helpers::{
    BlobStyle, BooleanStyle, LiteralStyle, quote_ident_backtick, render_literal,
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

/// MySQL implementation of the connection contract.
pub struct MySqlAdapter {
    config: ConnectionConfig,
    sink: Arc<dyn DiagnosticSink>,
    conn: Option<MySqlConnection>,
    cursor: Option<RowSet>,
    in_transaction: bool,
    last_insert_id: Option<i64>,
}

impl MySqlAdapter {
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

    fn require_conn(&mut self) -> Result<&mut MySqlConnection> {
        self.conn
            .as_mut()
            .ok_or_else(|| ConduitError::state("not connected"))
    }

    fn emit_error(&self, operation: &'static str, message: String, query: Option<&str>) {
        let mut event = DiagnosticEvent::new(Severity::Error, "mysql", operation, message);
        if let Some(query) = query {
            event = event.with_field("query", query);
        }
        self.sink.emit(event);
    }

    fn connect_options(&self) -> MySqlConnectOptions {
        let mut options = MySqlConnectOptions::new()
            .host(self.config.host.as_deref().unwrap_or("localhost"))
            .port(self.config.port.unwrap_or(3306));
        if let Some(database) = &self.config.database {
            options = options.database(database);
        }
        if let Some(username) = &self.config.username {
            options = options.username(username);
        }
        if let Some(password) = &self.config.password {
            options = options.password(password);
        }
        if let Some(charset) = &self.config.charset {
            options = options.charset(charset);
        }
        options
    }

    async fn run_raw(&mut self, sql: &str) -> Result<()> {
        let conn = self.require_conn()?;
        if let Err(e) = conn.execute(sql).await {
            self.emit_error("transaction", e.to_string(), Some(sql));
            return Err(ConduitError::statement_failed(sql, "[]", e));
        }
        Ok(())
    }
}

#[async_trait]
impl DatabaseConnection for MySqlAdapter {
    async fn connect(&mut self) -> Result<()> {
        if self.conn.is_some() {
            return Err(ConduitError::state("already connected"));
        }

        let options = self.connect_options();
        let attempt = tokio::time::timeout(self.config.connect_timeout, options.connect()).await;
        match attempt {
            Ok(Ok(conn)) => {
                self.conn = Some(conn);
                tracing::debug!(database = %self.config, "mysql connection established");
                Ok(())
            }
            Ok(Err(e)) => {
                self.emit_error("connect", e.to_string(), None);
                Err(ConduitError::connection_failed(
                    format!("connecting to {}", self.config),
                    e,
                ))
            }
            Err(elapsed) => {
                self.emit_error("connect", "connect timed out".to_string(), None);
                Err(ConduitError::connection_failed(
                    format!("connecting to {} timed out", self.config),
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
        self.cursor = None;
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
                        if done.last_insert_id() != 0 {
                            insert_id = i64::try_from(done.last_insert_id()).ok();
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
        if let Some(level) = isolation {
            // Applies to the next transaction only.
            let sql = format!("SET TRANSACTION ISOLATION LEVEL {}", level.as_sql());
            self.run_raw(&sql).await?;
        }
        self.run_raw("START TRANSACTION").await?;
        self.in_transaction = true;
        Ok(())
    }

    async fn commit_transaction(&mut self) -> Result<()> {
        if !self.in_transaction {
            return Err(ConduitError::state("no open transaction to commit"));
        }
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
        quote_ident_backtick(identifier)
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
        DatabaseKind::MySql
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
    fn test_escaping() {
        let adapter = MySqlAdapter::new(
            ConnectionConfig::new(DatabaseKind::MySql).with_database("db"),
            crate::logging::default_sink(),
        );
        assert_eq!(adapter.escape_identifier("order"), "`order`");
        assert_eq!(adapter.escape_value(&SqlValue::Boolean(false)), "0");
        assert_eq!(
            adapter.escape_value(&SqlValue::Blob(vec![0xDE, 0xAD])),
            "X'DEAD'"
        );
    }
}
