//! Shared helper functions for SQL dialect implementations.
//!
//! This module provides reusable building blocks that dialects can compose
//! to implement the `SqlDialect` trait with minimal duplication.

use std::collections::HashSet;

use once_cell::sync::Lazy;

use super::super::token::{Token, TokenStream};
use super::PageTokens;

// =============================================================================
// Identifier Quoting
// =============================================================================

/// Quote identifier with double quotes (ANSI style).
/// Used by: ANSI, Postgres, Oracle, H2, DB2, Teradata, SQLite
pub fn quote_double(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Quote identifier with backticks.
/// Used by: MySQL, MariaDB
pub fn quote_backtick(ident: &str) -> String {
    format!("`{}`", ident.replace('`', "``"))
}

/// Quote identifier with square brackets.
/// Used by: T-SQL (SQL Server)
pub fn quote_bracket(ident: &str) -> String {
    format!("[{}]", ident.replace(']', "]]"))
}

/// A name that needs no quoting apart from keyword clashes: a letter or
/// underscore followed by letters, digits and underscores.
pub fn is_plain_identifier(ident: &str) -> bool {
    let mut chars = ident.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

// =============================================================================
// Reserved Keywords
// =============================================================================

/// SQL:2003 reserved words every dialect quotes when used as a name.
static ANSI_RESERVED: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "all", "alter", "and", "any", "as", "asc", "between", "both", "by", "case", "cast",
        "check", "column", "constraint", "create", "cross", "current", "current_date",
        "current_time", "current_timestamp", "current_user", "default", "delete", "desc",
        "distinct", "drop", "else", "end", "escape", "except", "exists", "false", "fetch",
        "for", "foreign", "from", "full", "grant", "group", "having", "in", "inner", "insert",
        "intersect", "interval", "into", "is", "join", "leading", "left", "like", "natural",
        "not", "null", "of", "offset", "on", "only", "or", "order", "outer", "primary",
        "references", "right", "row", "rows", "select", "session_user", "set", "some",
        "table", "then", "to", "trailing", "true", "union", "unique", "update", "user",
        "using", "values", "when", "where", "with",
    ]
    .into_iter()
    .collect()
});

/// Whether `ident` is an ANSI reserved word (case-insensitive).
pub fn is_ansi_reserved(ident: &str) -> bool {
    ANSI_RESERVED.contains(ident.to_ascii_lowercase().as_str())
}

// =============================================================================
// String Quoting
// =============================================================================

/// Quote string with single quotes (standard SQL).
/// Used by: All dialects
pub fn quote_string_single(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// Quote string with N prefix for Unicode (T-SQL).
/// Used by: T-SQL for non-ASCII strings
pub fn quote_string_unicode(s: &str) -> String {
    format!("N'{}'", s.replace('\'', "''"))
}

// =============================================================================
// Boolean Formatting
// =============================================================================

/// Format boolean as literal true/false.
/// Used by: ANSI, Postgres, H2, DB2
pub fn format_bool_literal(b: bool) -> &'static str {
    if b {
        "true"
    } else {
        "false"
    }
}

/// Format boolean as numeric 1/0.
/// Used by: T-SQL, MySQL, MariaDB, Oracle, Teradata, SQLite
pub fn format_bool_numeric(b: bool) -> &'static str {
    if b {
        "1"
    } else {
        "0"
    }
}

// =============================================================================
// Pagination
// =============================================================================

/// Emit OFFSET ... ROWS FETCH FIRST ... ROWS ONLY (SQL:2008).
/// Used by: ANSI, Oracle, DB2
pub fn emit_offset_fetch_standard(page: &PageTokens) -> TokenStream {
    let mut ts = TokenStream::new();

    if let Some(offset) = &page.offset {
        ts.push(Token::Offset)
            .space()
            .append(offset)
            .space()
            .push(Token::Rows);
    }

    if let Some(fetch) = &page.fetch {
        if page.offset.is_some() {
            ts.space();
        }
        ts.push(Token::Fetch)
            .space()
            .push(Token::First)
            .space()
            .append(fetch)
            .space();
        if page.percent {
            ts.push(Token::Percent).space();
        }
        ts.push(Token::Rows).space();
        if page.with_ties {
            ts.push(Token::WithTies);
        } else {
            ts.push(Token::Only);
        }
    }

    ts
}

/// Emit LIMIT ... OFFSET ....
/// Used by: Postgres, MySQL, MariaDB, H2, SQLite
///
/// `unbounded` is the limit written when only an offset is present, for
/// engines that reject a bare OFFSET.
pub fn emit_limit_offset_standard(page: &PageTokens, unbounded: Option<&str>) -> TokenStream {
    let mut ts = TokenStream::new();

    match (&page.fetch, unbounded) {
        (Some(fetch), _) => {
            ts.push(Token::Limit).space().append(fetch);
        }
        (None, Some(limit)) if page.offset.is_some() => {
            ts.push(Token::Limit)
                .space()
                .push(Token::Raw(limit.to_string()));
        }
        _ => {}
    }

    if let Some(offset) = &page.offset {
        if !ts.is_empty() {
            ts.space();
        }
        ts.push(Token::Offset).space().append(offset);
    }

    ts
}

/// Emit OFFSET ... ROWS FETCH NEXT ... ROWS ONLY (T-SQL style).
/// Used by: T-SQL (SQL Server)
/// Note: Requires ORDER BY clause in T-SQL
pub fn emit_offset_fetch_tsql(page: &PageTokens) -> TokenStream {
    let mut ts = TokenStream::new();

    ts.push(Token::Offset).space();
    match &page.offset {
        Some(offset) => ts.append(offset),
        None => ts.push(Token::LitInt(0)),
    };
    ts.space().push(Token::Rows);

    if let Some(fetch) = &page.fetch {
        ts.space()
            .push(Token::Fetch)
            .space()
            .push(Token::Next)
            .space()
            .append(fetch)
            .space()
            .push(Token::Rows)
            .space()
            .push(Token::Only);
    }

    ts
}

// =============================================================================
// Temporal Literals
// =============================================================================

/// `DATE '...'`, `TIME '...'`, `TIMESTAMP '...'`.
pub fn typed_literal(keyword: &str, value: &str) -> String {
    format!("{} {}", keyword, quote_string_single(value))
}
