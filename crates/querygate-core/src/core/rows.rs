// crates/querygate-core/src/core/rows.rs
// ============================================================================
// Module: QueryGate Rows
// Description: Engine values, rows, fetch orientations, and row pages.
// Purpose: Shared row vocabulary between the engine, cursors, and clients.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Engines produce rows of [`Value`]s. Scalar values travel to clients as-is;
//! composite values (arrays, maps, structs) are rendered to a canonical string
//! by the column readers compiled in [`crate::core::schema`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::fmt::Write as _;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Values
// ============================================================================

/// A single column value produced by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Value {
    /// SQL NULL.
    Null,
    /// Boolean value.
    Boolean(bool),
    /// Any integral value.
    Int(i64),
    /// Floating point value.
    Double(f64),
    /// Decimal value in its canonical text form.
    Decimal(String),
    /// Character data.
    String(String),
    /// Raw bytes.
    Binary(Vec<u8>),
    /// Calendar date (`YYYY-MM-DD`).
    Date(String),
    /// Timestamp in engine text form.
    Timestamp(String),
    /// Ordered collection.
    Array(Vec<Self>),
    /// Key/value pairs in engine order.
    Map(Vec<(Self, Self)>),
    /// Named fields in declaration order.
    Struct(Vec<(String, Self)>),
}

impl Value {
    /// Returns true for NULL.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Renders the value in canonical string form.
    ///
    /// Top-level strings are rendered bare; nested strings are quoted so that
    /// `["a","b"]` and `{"k":1}` stay unambiguous.
    #[must_use]
    pub fn to_canonical_string(&self) -> String {
        let mut out = String::new();
        self.write_canonical(&mut out, false);
        out
    }

    /// Writes the canonical form into `out`.
    fn write_canonical(&self, out: &mut String, nested: bool) {
        match self {
            Self::Null => out.push_str(if nested { "null" } else { "NULL" }),
            Self::Boolean(value) => {
                let _ = write!(out, "{value}");
            }
            Self::Int(value) => {
                let _ = write!(out, "{value}");
            }
            Self::Double(value) => {
                let _ = write!(out, "{value}");
            }
            Self::Decimal(text) | Self::Date(text) | Self::Timestamp(text) => out.push_str(text),
            Self::String(text) => {
                if nested {
                    push_quoted(out, text);
                } else {
                    out.push_str(text);
                }
            }
            Self::Binary(bytes) => {
                let text = String::from_utf8_lossy(bytes);
                if nested {
                    push_quoted(out, &text);
                } else {
                    out.push_str(&text);
                }
            }
            Self::Array(items) => {
                out.push('[');
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        out.push(',');
                    }
                    item.write_canonical(out, true);
                }
                out.push(']');
            }
            Self::Map(entries) => {
                out.push('{');
                for (index, (key, value)) in entries.iter().enumerate() {
                    if index > 0 {
                        out.push(',');
                    }
                    key.write_canonical(out, true);
                    out.push(':');
                    value.write_canonical(out, true);
                }
                out.push('}');
            }
            Self::Struct(fields) => {
                out.push('{');
                for (index, (name, value)) in fields.iter().enumerate() {
                    if index > 0 {
                        out.push(',');
                    }
                    push_quoted(out, name);
                    out.push(':');
                    value.write_canonical(out, true);
                }
                out.push('}');
            }
        }
    }
}

/// Appends `text` as a double-quoted string with `"` and `\` escaped.
fn push_quoted(out: &mut String, text: &str) {
    out.push('"');
    for ch in text.chars() {
        if matches!(ch, '"' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('"');
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_canonical_string())
    }
}

/// One result row; values are addressed positionally.
pub type Row = Vec<Value>;

// ============================================================================
// SECTION: Fetching
// ============================================================================

/// Fetch orientation requested by a client.
///
/// Only [`FetchOrientation::First`] and [`FetchOrientation::Next`] are served;
/// the remaining variants exist so protocol adapters can pass requests through
/// and receive a typed rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchOrientation {
    /// Continue from the current position.
    Next,
    /// Step backwards.
    Prior,
    /// Move relative to the current position.
    Relative,
    /// Move to an absolute position.
    Absolute,
    /// Restart from the first row.
    First,
    /// Jump to the last row.
    Last,
}

impl FetchOrientation {
    /// Returns a stable label for the orientation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Next => "next",
            Self::Prior => "prior",
            Self::Relative => "relative",
            Self::Absolute => "absolute",
            Self::First => "first",
            Self::Last => "last",
        }
    }
}

impl fmt::Display for FetchOrientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A page of rows returned by a fetch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RowSet {
    /// Rows in result order.
    pub rows: Vec<Row>,
    /// Whether more rows remain after this page.
    pub has_more: bool,
}

impl RowSet {
    /// Returns an empty, exhausted page.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            rows: Vec::new(),
            has_more: false,
        }
    }

    /// Returns true when the page has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
