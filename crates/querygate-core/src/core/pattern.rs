// crates/querygate-core/src/core/pattern.rs
// ============================================================================
// Module: QueryGate Catalog Patterns
// Description: Client wildcard translation and catalog-native matching.
// Purpose: Bridge JDBC-style search patterns to the catalog's pattern syntax.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Clients send JDBC search patterns: `%` matches any sequence, `_` matches a
//! single character, and `\%` / `\_` are literals. The catalog speaks a native
//! syntax where `*` matches any sequence, `.` matches one character and `|`
//! separates alternatives. Native matching is case-insensitive and each
//! alternative is trimmed before use.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Native Pattern
// ============================================================================

/// Pattern in the catalog's native syntax.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NativePattern(String);

impl NativePattern {
    /// Wraps a pattern already in native syntax.
    #[must_use]
    pub fn new(pattern: impl Into<String>) -> Self {
        Self(pattern.into())
    }

    /// Returns the pattern matching every name.
    #[must_use]
    pub fn any() -> Self {
        Self("*".to_string())
    }

    /// Returns the native pattern text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true when `name` matches any alternative.
    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        let name: Vec<char> = name.chars().flat_map(char::to_lowercase).collect();
        self.0.split('|').map(str::trim).any(|alternative| {
            let pattern: Vec<char> = alternative.chars().flat_map(char::to_lowercase).collect();
            match_glob(&pattern, &name)
        })
    }
}

impl fmt::Display for NativePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Iterative wildcard match with single-star backtracking.
fn match_glob(pattern: &[char], name: &[char]) -> bool {
    let mut p = 0;
    let mut n = 0;
    let mut star: Option<(usize, usize)> = None;
    while n < name.len() {
        match pattern.get(p) {
            Some('*') => {
                star = Some((p, n));
                p += 1;
            }
            Some(&expected) if expected == '.' || expected == name[n] => {
                p += 1;
                n += 1;
            }
            _ => match star {
                Some((star_p, star_n)) => {
                    p = star_p + 1;
                    n = star_n + 1;
                    star = Some((star_p, star_n + 1));
                }
                None => return false,
            },
        }
    }
    pattern[p ..].iter().all(|ch| *ch == '*')
}

// ============================================================================
// SECTION: Client Pattern Translation
// ============================================================================

/// Translates a client schema pattern; absent or empty means every schema.
#[must_use]
pub fn convert_schema_pattern(pattern: Option<&str>) -> NativePattern {
    match pattern {
        None | Some("") => NativePattern::any(),
        Some(pattern) => NativePattern(convert_wildcards(pattern)),
    }
}

/// Translates a client identifier pattern; absent means every identifier.
#[must_use]
pub fn convert_identifier_pattern(pattern: Option<&str>) -> NativePattern {
    pattern.map_or_else(NativePattern::any, |pattern| NativePattern(convert_wildcards(pattern)))
}

/// Rewrites `%` and `_` wildcards, honoring `\` escapes.
fn convert_wildcards(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut chars = pattern.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' if matches!(chars.peek(), Some('%' | '_')) => {
                if let Some(literal) = chars.next() {
                    out.push(literal);
                }
            }
            '%' => out.push('*'),
            '_' => out.push('.'),
            other => out.push(other),
        }
    }
    out
}
