//! The unified scalar value passed across the backend boundary.
//!
//! One enum covers both directions: parameter values bound into statements
//! and column values decoded out of result rows. Backends translate between
//! [`SqlValue`] and their native representations at the adapter edge, so
//! callers never see a driver type.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A database value in the unified representation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SqlValue {
    /// SQL NULL
    Null,
    /// Signed 64-bit integer
    Integer(i64),
    /// Double-precision float
    Float(f64),
    /// Text value
    Text(String),
    /// Boolean value (stored as 0/1 where the backend has no native boolean)
    Boolean(bool),
    /// Date-and-time value without timezone
    Timestamp(NaiveDateTime),
    /// Raw binary value
    Blob(Vec<u8>),
    /// A sequence of values, valid only for literal rendering (IN lists);
    /// not bindable as a statement parameter
    List(Vec<SqlValue>),
}

impl SqlValue {
    /// Returns true for [`SqlValue::Null`].
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Returns the integer if this value is an `Integer`.
    #[must_use]
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            SqlValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the float if this value is a `Float`.
    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            SqlValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the text if this value is a `Text`.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            SqlValue::Text(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the boolean if this value is a `Boolean`.
    #[must_use]
    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            SqlValue::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the timestamp if this value is a `Timestamp`.
    #[must_use]
    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            SqlValue::Timestamp(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the bytes if this value is a `Blob`.
    #[must_use]
    pub fn as_blob(&self) -> Option<&[u8]> {
        match self {
            SqlValue::Blob(v) => Some(v),
            _ => None,
        }
    }

    /// Short name of the variant, used in parameter error messages.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            SqlValue::Null => "null",
            SqlValue::Integer(_) => "integer",
            SqlValue::Float(_) => "float",
            SqlValue::Text(_) => "text",
            SqlValue::Boolean(_) => "boolean",
            SqlValue::Timestamp(_) => "timestamp",
            SqlValue::Blob(_) => "blob",
            SqlValue::List(_) => "list",
        }
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Integer(v)
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        SqlValue::Integer(i64::from(v))
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::Float(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Boolean(v)
    }
}

impl From<NaiveDateTime> for SqlValue {
    fn from(v: NaiveDateTime) -> Self {
        SqlValue::Timestamp(v)
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(v: Vec<u8>) -> Self {
        SqlValue::Blob(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(SqlValue::Null, Into::into)
    }
}

impl std::fmt::Display for SqlValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlValue::Null => write!(f, "NULL"),
            SqlValue::Integer(v) => write!(f, "{v}"),
            SqlValue::Float(v) => write!(f, "{v}"),
            SqlValue::Text(v) => write!(f, "{v}"),
            SqlValue::Boolean(v) => write!(f, "{v}"),
            SqlValue::Timestamp(v) => write!(f, "{}", v.format("%Y-%m-%d %H:%M:%S%.f")),
            SqlValue::Blob(v) => write!(f, "<{} bytes>", v.len()),
            SqlValue::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
        }
    }
}

/// Renders a parameter slice for inclusion in statement error messages.
#[must_use]
pub fn render_params(params: &[SqlValue]) -> String {
    let rendered = params
        .iter()
        .map(|p| match p {
            SqlValue::Text(s) => format!("'{s}'"),
            other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join(", ");
    format!("[{rendered}]")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessors() {
        assert!(SqlValue::Null.is_null());
        assert_eq!(SqlValue::Integer(7).as_integer(), Some(7));
        assert_eq!(SqlValue::Text("x".into()).as_text(), Some("x"));
        assert_eq!(SqlValue::Boolean(true).as_boolean(), Some(true));
        assert_eq!(SqlValue::Integer(7).as_text(), None);
    }

    #[test]
    fn test_from_option() {
        assert_eq!(SqlValue::from(None::<i64>), SqlValue::Null);
        assert_eq!(SqlValue::from(Some(3_i64)), SqlValue::Integer(3));
    }

    #[test]
    fn test_render_params() {
        let params = vec![
            SqlValue::Integer(1),
            SqlValue::Text("bob".into()),
            SqlValue::Null,
        ];
        assert_eq!(render_params(&params), "[1, 'bob', NULL]");
    }

    #[test]
    fn test_display_timestamp() {
        let ts = chrono::NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(12, 30, 45)
            .unwrap();
        assert_eq!(SqlValue::Timestamp(ts).to_string(), "2024-03-01 12:30:45");
    }
}
