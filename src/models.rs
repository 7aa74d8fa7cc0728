//! Schema metadata returned by table introspection.
//!
//! These are plain values assembled by the per-backend catalog queries and
//! handed to callers; nothing here talks to a database.

use serde::{Deserialize, Serialize};

/// Metadata for one table column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    /// Column name as the backend reports it
    pub name: String,
    /// Declared type string, backend-native (e.g. `INTEGER`, `varchar`)
    pub data_type: String,
    /// True if the column is part of the primary key
    pub is_primary_key: bool,
    /// True if the column participates in a foreign-key constraint
    pub is_foreign_key: bool,
    /// Referenced table, set when `is_foreign_key`
    pub ref_table: Option<String>,
    /// Referenced column, set when `is_foreign_key`
    pub ref_column: Option<String>,
    /// True if NULL values are allowed
    pub is_nullable: bool,
    /// Default value expression as the backend reports it
    pub default_value: Option<String>,
    /// Declared maximum length for character types
    pub max_length: Option<i64>,
    /// True if a unique constraint or unique index covers exactly this column
    pub is_unique: bool,
    /// True if any index includes this column
    pub is_indexed: bool,
    /// True if the backend generates values automatically
    pub is_auto_increment: bool,
}

impl ColumnInfo {
    /// A column with the given name and type and every flag cleared.
    #[must_use]
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            is_primary_key: false,
            is_foreign_key: false,
            ref_table: None,
            ref_column: None,
            is_nullable: true,
            default_value: None,
            max_length: None,
            is_unique: false,
            is_indexed: false,
            is_auto_increment: false,
        }
    }
}

/// One column-level foreign-key reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyRef {
    /// Referencing column in this table
    pub column: String,
    /// Referenced table
    pub referenced_table: String,
    /// Referenced column
    pub referenced_column: String,
}

/// One index over a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexInfo {
    /// Index name as the backend reports it
    pub name: String,
    /// Indexed columns in the backend's native order
    pub columns: Vec<String>,
    /// True for unique indexes and unique constraints
    pub is_unique: bool,
}

/// Complete introspected metadata for one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableInfo {
    /// Table name
    pub name: String,
    /// Columns in declaration order
    pub columns: Vec<ColumnInfo>,
    /// Primary-key column names in key order
    pub primary_keys: Vec<String>,
    /// Foreign-key references
    pub foreign_keys: Vec<ForeignKeyRef>,
    /// Indexes, with column order preserved as reported
    pub indexes: Vec<IndexInfo>,
}

impl TableInfo {
    /// An empty table description.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            primary_keys: Vec::new(),
            foreign_keys: Vec::new(),
            indexes: Vec::new(),
        }
    }

    /// Looks up a column by name.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Checks the cross-reference invariants between the aggregate lists and
    /// the per-column flags.
    ///
    /// Every primary-key name must be a column with `is_primary_key` set,
    /// every foreign-key column must exist with `is_foreign_key` set, and
    /// every index column must name a real column.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        for pk in &self.primary_keys {
            match self.column(pk) {
                Some(col) if col.is_primary_key => {}
                _ => return false,
            }
        }
        for fk in &self.foreign_keys {
            match self.column(&fk.column) {
                Some(col) if col.is_foreign_key => {}
                _ => return false,
            }
        }
        for index in &self.indexes {
            if index
                .columns
                .iter()
                .any(|name| self.column(name).is_none())
            {
                return false;
            }
        }
        // Flags must also be backed by the aggregate lists.
        for col in &self.columns {
            if col.is_primary_key && !self.primary_keys.contains(&col.name) {
                return false;
            }
            if col.is_foreign_key && !self.foreign_keys.iter().any(|fk| fk.column == col.name) {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users_table() -> TableInfo {
        let mut id = ColumnInfo::new("id", "INTEGER");
        id.is_primary_key = true;
        id.is_nullable = false;
        id.is_auto_increment = true;

        let mut email = ColumnInfo::new("email", "TEXT");
        email.is_unique = true;
        email.is_indexed = true;

        TableInfo {
            name: "users".to_string(),
            columns: vec![id, email],
            primary_keys: vec!["id".to_string()],
            foreign_keys: Vec::new(),
            indexes: vec![IndexInfo {
                name: "idx_users_email".to_string(),
                columns: vec!["email".to_string()],
                is_unique: true,
            }],
        }
    }

    #[test]
    fn test_consistent_table() {
        assert!(users_table().is_consistent());
    }

    #[test]
    fn test_primary_key_mismatch_detected() {
        let mut table = users_table();
        table.primary_keys.push("missing".to_string());
        assert!(!table.is_consistent());

        let mut table = users_table();
        table.columns[0].is_primary_key = false;
        assert!(!table.is_consistent());
    }

    #[test]
    fn test_foreign_key_flag_requires_aggregate_entry() {
        let mut table = users_table();
        table.columns[1].is_foreign_key = true;
        assert!(!table.is_consistent());

        table.foreign_keys.push(ForeignKeyRef {
            column: "email".to_string(),
            referenced_table: "accounts".to_string(),
            referenced_column: "email".to_string(),
        });
        assert!(table.is_consistent());
    }

    #[test]
    fn test_index_over_unknown_column_detected() {
        let mut table = users_table();
        table.indexes[0].columns.push("ghost".to_string());
        assert!(!table.is_consistent());
    }
}
