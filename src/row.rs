//! Materialized result rows and the per-connection cursor buffer.
//!
//! A [`Row`] is an ordered association of column names to values: the
//! column-name vector is shared across all rows of one result via `Arc`, and
//! values are stored positionally, so iteration order is the backend's
//! column order and is identical for every backend. A [`RowSet`] is the
//! buffered result of the most recent statement on a connection; the fetch
//! operations drain it from the front.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use crate::value::SqlValue;

/// One result row with named, ordered columns.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    column_names: Arc<Vec<String>>,
    column_index: Arc<HashMap<String, usize>>,
    values: Vec<SqlValue>,
}

impl Row {
    /// Builds a row over a shared column layout.
    #[must_use]
    pub fn new(
        column_names: Arc<Vec<String>>,
        column_index: Arc<HashMap<String, usize>>,
        values: Vec<SqlValue>,
    ) -> Self {
        Self {
            column_names,
            column_index,
            values,
        }
    }

    /// Column names in result order.
    #[must_use]
    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    /// Looks up a value by column name.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.column_index
            .get(column)
            .and_then(|&idx| self.values.get(idx))
    }

    /// Looks up a value by position.
    #[must_use]
    pub fn get_index(&self, index: usize) -> Option<&SqlValue> {
        self.values.get(index)
    }

    /// Values in column order.
    #[must_use]
    pub fn values(&self) -> &[SqlValue] {
        &self.values
    }

    /// Number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True if the row has no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates `(name, value)` pairs in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.column_names
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }
}

impl Serialize for Row {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (name, value) in self.iter() {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// The buffered result of the most recent statement on a connection.
///
/// Executing a new statement replaces the connection's `RowSet` wholesale,
/// which is what invalidates any unconsumed rows of the previous statement.
#[derive(Debug, Default)]
pub struct RowSet {
    column_names: Arc<Vec<String>>,
    column_index: Arc<HashMap<String, usize>>,
    rows: std::collections::VecDeque<Row>,
    /// Rows affected by the statement (0 for pure queries)
    rows_affected: u64,
}

impl RowSet {
    /// Creates an empty result with the given affected-row count.
    #[must_use]
    pub fn empty(rows_affected: u64) -> Self {
        Self {
            rows_affected,
            ..Self::default()
        }
    }

    /// Creates a result set from a column layout.
    #[must_use]
    pub fn with_columns(column_names: Vec<String>) -> Self {
        let column_index = column_names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect::<HashMap<_, _>>();
        Self {
            column_names: Arc::new(column_names),
            column_index: Arc::new(column_index),
            rows: std::collections::VecDeque::new(),
            rows_affected: 0,
        }
    }

    /// Appends a row of positional values.
    pub fn push_row(&mut self, values: Vec<SqlValue>) {
        self.rows.push_back(Row::new(
            Arc::clone(&self.column_names),
            Arc::clone(&self.column_index),
            values,
        ));
    }

    /// Records the affected-row count reported by the driver.
    pub fn set_rows_affected(&mut self, rows_affected: u64) {
        self.rows_affected = rows_affected;
    }

    /// Rows affected by the statement that produced this set.
    #[must_use]
    pub fn rows_affected(&self) -> u64 {
        self.rows_affected
    }

    /// Removes and returns the next unconsumed row.
    pub fn take_next(&mut self) -> Option<Row> {
        self.rows.pop_front()
    }

    /// Removes and returns up to `count` unconsumed rows.
    pub fn take_many(&mut self, count: usize) -> Vec<Row> {
        let take = count.min(self.rows.len());
        self.rows.drain(..take).collect()
    }

    /// Removes and returns all unconsumed rows.
    pub fn take_all(&mut self) -> Vec<Row> {
        self.rows.drain(..).collect()
    }

    /// Number of unconsumed rows.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.rows.len()
    }
}
