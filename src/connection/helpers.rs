//! Shared escaping and query-rewriting helpers used by all adapters.
//!
//! Everything here is a pure function over strings and values; the adapters
//! supply the dialect choices (quote character, boolean style, blob style).

use crate::value::SqlValue;

/// How a dialect renders boolean literals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BooleanStyle {
    /// `1` / `0`
    Numeric,
    /// `TRUE` / `FALSE`
    Keyword,
}

/// How a dialect renders binary literals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobStyle {
    /// `X'DEADBEEF'`
    HexString,
    /// `'\xDEADBEEF'::bytea`
    Bytea,
}

/// Literal-rendering choices for one dialect.
#[derive(Debug, Clone, Copy)]
pub struct LiteralStyle {
    pub boolean: BooleanStyle,
    pub blob: BlobStyle,
}

/// Quotes an identifier with double quotes, doubling embedded quotes.
#[must_use]
pub fn quote_ident_double(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

/// Quotes an identifier with backticks, doubling embedded backticks.
#[must_use]
pub fn quote_ident_backtick(identifier: &str) -> String {
    format!("`{}`", identifier.replace('`', "``"))
}

/// Single-quotes a string, doubling embedded single quotes.
#[must_use]
pub fn quote_string_literal(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02X}")).collect()
}

/// Renders a value as a safe SQL literal in the given dialect.
///
/// Lists render recursively as parenthesized comma-separated groups, which
/// makes `col IN ?` style interpolation work when callers build literal SQL.
#[must_use]
pub fn render_literal(value: &SqlValue, style: LiteralStyle) -> String {
    match value {
        SqlValue::Null => "NULL".to_string(),
        SqlValue::Integer(v) => v.to_string(),
        SqlValue::Float(v) => v.to_string(),
        SqlValue::Text(v) => quote_string_literal(v),
        SqlValue::Boolean(v) => match style.boolean {
            BooleanStyle::Numeric => if *v { "1" } else { "0" }.to_string(),
            BooleanStyle::Keyword => if *v { "TRUE" } else { "FALSE" }.to_string(),
        },
        SqlValue::Timestamp(v) => {
            quote_string_literal(&v.format("%Y-%m-%d %H:%M:%S%.f").to_string())
        }
        SqlValue::Blob(bytes) => match style.blob {
            BlobStyle::HexString => format!("X'{}'", hex_encode(bytes)),
            BlobStyle::Bytea => format!("'\\x{}'::bytea", hex_encode(bytes)),
        },
        SqlValue::List(items) => {
            let rendered = items
                .iter()
                .map(|item| render_literal(item, style))
                .collect::<Vec<_>>()
                .join(", ");
            format!("({rendered})")
        }
    }
}

/// Rewrites `?` placeholders to `$1`, `$2`, ... for PostgreSQL.
///
/// Question marks inside single-quoted strings, double-quoted identifiers,
/// line comments, and block comments are left alone. Quote doubling (`''`,
/// `""`) is handled by treating the second quote as reopening the region.
#[must_use]
pub fn translate_placeholders(query: &str) -> String {
    #[derive(PartialEq)]
    enum Region {
        Plain,
        SingleQuote,
        DoubleQuote,
        LineComment,
        BlockComment,
    }

    let mut out = String::with_capacity(query.len() + 8);
    let mut region = Region::Plain;
    let mut index = 1_u32;
    let mut chars = query.chars().peekable();

    while let Some(c) = chars.next() {
        match region {
            Region::Plain => match c {
                '?' => {
                    out.push('$');
                    out.push_str(&index.to_string());
                    index += 1;
                    continue;
                }
                '\'' => region = Region::SingleQuote,
                '"' => region = Region::DoubleQuote,
                '-' if chars.peek() == Some(&'-') => region = Region::LineComment,
                '/' if chars.peek() == Some(&'*') => region = Region::BlockComment,
                _ => {}
            },
            Region::SingleQuote => {
                if c == '\'' {
                    region = Region::Plain;
                }
            }
            Region::DoubleQuote => {
                if c == '"' {
                    region = Region::Plain;
                }
            }
            Region::LineComment => {
                if c == '\n' {
                    region = Region::Plain;
                }
            }
            Region::BlockComment => {
                if c == '*' && chars.peek() == Some(&'/') {
                    out.push(c);
                    if let Some(slash) = chars.next() {
                        out.push(slash);
                    }
                    region = Region::Plain;
                    continue;
                }
            }
        }
        out.push(c);
    }

    out
}
