//! SQL Dialect definitions and formatting rules.
//!
//! This module provides a trait-based abstraction for SQL dialect differences.
//! Each dialect implements `SqlDialect` to handle its specific syntax:
//!
//! - Identifier quoting: `"` (ANSI/PG/Oracle/H2/DB2), `` ` `` (MySQL), `[]` (T-SQL),
//!   applied only to reserved words and names that are not plain identifiers
//! - Pagination: OFFSET FETCH vs LIMIT/OFFSET vs TOP
//! - Boolean literals: true/false vs 1/0
//! - String concatenation: `||` vs `+` vs CONCAT()
//! - Type names, with `$l`, `$p` and `$s` size placeholders
//! - Function overrides on top of the standard function set
//! - Temporal arithmetic (`timestampadd`, `timestampdiff`, `extract`)
//!
//! # Usage
//!
//! ```ignore
//! use sqm::sql::dialect::{Dialect, SqlDialect};
//!
//! let dialect = Dialect::Postgres;
//! let quoted = dialect.render_identifier("user");  // "user"
//! ```
//!
//! # Feature Matrix
//!
//! | Feature | ANSI | PG | MySQL | T-SQL | Oracle | H2 | DB2 | Teradata | SQLite |
//! |---------|------|----|-------|-------|--------|----|-----|----------|--------|
//! | OFFSET | ✓ | ✓ | ✓ | ✓ | ✓ | ✓ | ✓ | ❌ | ✓ |
//! | FULL JOIN | ✓ | ✓ | ❌ | ✓ | ✓ | ✓ | ✓ | ✓ | ✓ |
//! | NULLS FIRST/LAST | ✓ | ✓ | ❌ | ❌ | ✓ | ✓ | ✓ | ❌ | ✓ |
//! | IN list limit | - | - | - | - | 1000 | - | - | 1024 | - |
//!
//! Check dialect feature flags (e.g., `supports_offset()`, `supports_full_outer_join()`)
//! before relying on a feature; the translator reports unsupported ones as errors.

mod ansi;
mod db2;
mod h2;
pub mod helpers;
mod mariadb;
mod mysql;
mod oracle;
mod postgres;
mod sqlite;
mod teradata;
mod tsql;

pub use ansi::Ansi;
pub use db2::Db2;
pub use h2::H2;
pub use mariadb::MariaDb;
pub use mysql::MySql;
pub use oracle::Oracle;
pub use postgres::Postgres;
pub use sqlite::Sqlite;
pub use teradata::Teradata;
pub use tsql::TSql;

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::token::TokenStream;
use super::types::{Size, SqlTypeCode, TypeNames};
use crate::function::FunctionRegistry;
use crate::temporal::{convert_unit, IllegalUnitConversion, TemporalUnit};

/// Already-rendered operands of a pagination clause.
#[derive(Debug, Clone, Default)]
pub struct PageTokens {
    pub offset: Option<TokenStream>,
    pub fetch: Option<TokenStream>,
    pub with_ties: bool,
    pub percent: bool,
}

/// SQL dialect trait - defines how SQL constructs are rendered.
///
/// Implementations handle dialect-specific syntax differences.
/// The default implementations follow ANSI SQL where possible.
pub trait SqlDialect: std::fmt::Debug {
    /// Dialect name for display/logging.
    fn name(&self) -> &'static str;

    // =========================================================================
    // Identifier and Literal Quoting
    // =========================================================================

    /// Quote an identifier (table, column, alias).
    ///
    /// - ANSI/PostgreSQL/Oracle: `"identifier"`
    /// - MySQL: `` `identifier` ``
    /// - T-SQL: `[identifier]`
    fn quote_identifier(&self, ident: &str) -> String;

    /// Whether `ident` clashes with a reserved word of this dialect.
    fn is_reserved_keyword(&self, ident: &str) -> bool {
        helpers::is_ansi_reserved(ident)
    }

    /// Write an identifier, quoting it only when it is reserved or not plain.
    fn render_identifier(&self, ident: &str) -> String {
        if helpers::is_plain_identifier(ident) && !self.is_reserved_keyword(ident) {
            ident.to_string()
        } else {
            self.quote_identifier(ident)
        }
    }

    /// Quote a string literal.
    ///
    /// All dialects use single quotes with `''` for escaping.
    /// Override for Unicode prefix (T-SQL N'...').
    fn quote_string(&self, s: &str) -> String {
        helpers::quote_string_single(s)
    }

    /// Format a boolean literal.
    ///
    /// - ANSI/PostgreSQL/H2/DB2: `true`/`false`
    /// - MySQL/T-SQL/Oracle/Teradata/SQLite: `1`/`0`
    fn format_bool(&self, b: bool) -> &'static str;

    /// Format a NULL literal.
    fn format_null(&self) -> &'static str {
        "NULL"
    }

    /// Format a date literal.
    ///
    /// - ANSI/PostgreSQL: `DATE 'YYYY-MM-DD'`
    /// - T-SQL/SQLite: `'YYYY-MM-DD'` (no DATE keyword)
    fn format_date_literal(&self, date: &str) -> String {
        helpers::typed_literal("DATE", date)
    }

    fn format_time_literal(&self, time: &str) -> String {
        helpers::typed_literal("TIME", time)
    }

    fn format_timestamp_literal(&self, timestamp: &str) -> String {
        helpers::typed_literal("TIMESTAMP", timestamp)
    }

    /// Bind placeholder.
    fn parameter_marker(&self) -> &'static str {
        "?"
    }

    // =========================================================================
    // Pagination
    // =========================================================================

    /// Emit the pagination clause that follows ORDER BY.
    ///
    /// - ANSI/Oracle/DB2: `OFFSET m ROWS FETCH FIRST n ROWS ONLY` (default)
    /// - PostgreSQL/MySQL/H2/SQLite: `LIMIT n OFFSET m`
    /// - T-SQL: `OFFSET m ROWS FETCH NEXT n ROWS ONLY`
    /// - Teradata: nothing (uses `TOP n` after SELECT)
    fn emit_pagination(&self, page: &PageTokens) -> TokenStream {
        helpers::emit_offset_fetch_standard(page)
    }

    /// Whether this dialect requires ORDER BY for OFFSET/FETCH.
    ///
    /// T-SQL requires ORDER BY when using OFFSET FETCH.
    fn requires_order_by_for_offset(&self) -> bool {
        false
    }

    /// Whether a row offset can be expressed at all.
    fn supports_offset(&self) -> bool {
        true
    }

    /// Whether the row limit is written as `SELECT TOP n`.
    fn uses_top(&self) -> bool {
        false
    }

    /// Whether `FETCH ... WITH TIES` is available.
    fn supports_fetch_with_ties(&self) -> bool {
        false
    }

    /// Whether `FETCH ... PERCENT` is available.
    fn supports_fetch_percent(&self) -> bool {
        false
    }

    // =========================================================================
    // Operators
    // =========================================================================

    /// String concatenation operator or function.
    ///
    /// - ANSI/PostgreSQL/Oracle: `||`
    /// - T-SQL: `+`
    /// - MySQL: `CONCAT()` (|| is OR by default)
    fn concat_operator(&self) -> &'static str {
        "||"
    }

    /// Whether this dialect supports the concat operator.
    ///
    /// MySQL uses `||` as logical OR by default.
    fn supports_concat_operator(&self) -> bool {
        true
    }

    /// Keyword for set difference. Oracle spells it MINUS.
    fn except_keyword(&self) -> &'static str {
        "EXCEPT"
    }

    /// Whether set operation operands may be wrapped in parentheses.
    ///
    /// SQLite rejects `(SELECT ...) UNION (SELECT ...)`.
    fn supports_parenthesized_set_operands(&self) -> bool {
        true
    }

    /// Whether a boolean expression may stand alone as a predicate.
    ///
    /// Dialects without a boolean type need `expr = 1`.
    fn supports_boolean_predicate(&self) -> bool {
        true
    }

    // =========================================================================
    // JOIN Syntax
    // =========================================================================

    /// Whether this dialect supports FULL OUTER JOIN.
    fn supports_full_outer_join(&self) -> bool {
        true
    }

    /// Whether a table alias may be introduced with AS.
    ///
    /// Oracle only accepts `table alias`.
    fn table_alias_keyword(&self) -> bool {
        true
    }

    // =========================================================================
    // NULLS Ordering
    // =========================================================================

    /// Whether this dialect supports NULLS FIRST/LAST in ORDER BY.
    ///
    /// MySQL, T-SQL and Teradata get a CASE emulation instead.
    fn supports_nulls_ordering(&self) -> bool {
        true
    }

    // =========================================================================
    // IN Lists
    // =========================================================================

    /// Largest number of values in one IN list, 0 for unlimited.
    fn in_expression_count_limit(&self) -> usize {
        0
    }

    /// Whether `x IN ()` is valid.
    fn supports_empty_in_list(&self) -> bool {
        false
    }

    // =========================================================================
    // Types
    // =========================================================================

    /// Type-name registry for this dialect.
    fn type_names(&self) -> &'static TypeNames;

    /// Column type name for a type code and size.
    fn type_name(&self, code: SqlTypeCode, size: Size) -> Option<String> {
        self.type_names().get(code, size)
    }

    /// Type name used as a CAST target.
    fn cast_type_name(&self, code: SqlTypeCode, size: Size) -> Option<String> {
        self.type_name(code, size)
    }

    // =========================================================================
    // Functions
    // =========================================================================

    /// Register the standard functions, then this dialect's overrides.
    fn initialize_function_registry(&self, registry: &mut FunctionRegistry) {
        crate::function::standard::register_standard_functions(registry);
        self.contribute_functions(registry);
    }

    /// Register or replace functions for this dialect.
    fn contribute_functions(&self, _registry: &mut FunctionRegistry) {}

    // =========================================================================
    // Temporal Arithmetic
    // =========================================================================

    /// Pattern for `timestampadd(unit, magnitude, base)`.
    ///
    /// `?1` is the unit name, `?2` the magnitude and `?3` the base value.
    /// `timestamp` is false when the base is a plain date.
    fn timestampadd_pattern(
        &self,
        unit: TemporalUnit,
        _timestamp: bool,
    ) -> Result<String, IllegalUnitConversion> {
        Ok(match unit {
            TemporalUnit::Nanosecond => format!(
                "timestampadd(second, (?2){}, ?3)",
                convert_unit(unit, TemporalUnit::Second)?
            ),
            TemporalUnit::Quarter => format!(
                "timestampadd(month, (?2){}, ?3)",
                convert_unit(unit, TemporalUnit::Month)?
            ),
            _ => "timestampadd(?1, ?2, ?3)".to_string(),
        })
    }

    /// Pattern for `timestampdiff(unit, from, to)`.
    ///
    /// `?1` is the unit name, `?2` the start and `?3` the end value.
    fn timestampdiff_pattern(
        &self,
        unit: TemporalUnit,
        _from_timestamp: bool,
        _to_timestamp: bool,
    ) -> Result<String, IllegalUnitConversion> {
        Ok(match unit {
            TemporalUnit::Nanosecond => format!(
                "timestampdiff(second, ?2, ?3){}",
                convert_unit(TemporalUnit::Second, unit)?
            ),
            TemporalUnit::Quarter => format!(
                "timestampdiff(month, ?2, ?3){}",
                convert_unit(TemporalUnit::Month, unit)?
            ),
            _ => "timestampdiff(?1, ?2, ?3)".to_string(),
        })
    }

    /// Pattern for `extract(unit from value)`, `?1` unit and `?2` value.
    ///
    /// `None` when the database has no way to extract the field.
    fn extract_pattern(&self, unit: TemporalUnit) -> Option<String> {
        let pattern = match unit {
            TemporalUnit::DayOfMonth => "extract(day from ?2)",
            _ => "extract(?1 from ?2)",
        };
        Some(pattern.to_string())
    }

    // =========================================================================
    // DDL Support
    // =========================================================================

    /// Whether `ALTER TABLE ... DROP CONSTRAINT IF EXISTS name` is accepted.
    fn supports_if_exists_before_constraint_name(&self) -> bool {
        false
    }
}

/// Supported SQL dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    Ansi,
    #[serde(alias = "postgresql")]
    Postgres,
    MySql,
    MariaDb,
    #[serde(alias = "sqlserver")]
    TSql,
    Oracle,
    H2,
    Db2,
    Teradata,
    Sqlite,
}

/// A dialect name that matches no supported dialect.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown dialect '{0}' (expected one of: ansi, postgres, mysql, mariadb, tsql, oracle, h2, db2, teradata, sqlite)")]
pub struct UnknownDialect(pub String);

impl Dialect {
    pub const ALL: [Dialect; 10] = [
        Dialect::Ansi,
        Dialect::Postgres,
        Dialect::MySql,
        Dialect::MariaDb,
        Dialect::TSql,
        Dialect::Oracle,
        Dialect::H2,
        Dialect::Db2,
        Dialect::Teradata,
        Dialect::Sqlite,
    ];

    /// Get the dialect implementation.
    pub fn dialect(&self) -> &'static dyn SqlDialect {
        match self {
            Dialect::Ansi => &Ansi,
            Dialect::Postgres => &Postgres,
            Dialect::MySql => &MySql,
            Dialect::MariaDb => &MariaDb,
            Dialect::TSql => &TSql,
            Dialect::Oracle => &Oracle,
            Dialect::H2 => &H2,
            Dialect::Db2 => &Db2,
            Dialect::Teradata => &Teradata,
            Dialect::Sqlite => &Sqlite,
        }
    }
}

impl FromStr for Dialect {
    type Err = UnknownDialect;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ansi" => Ok(Dialect::Ansi),
            "postgres" | "postgresql" => Ok(Dialect::Postgres),
            "mysql" => Ok(Dialect::MySql),
            "mariadb" => Ok(Dialect::MariaDb),
            "tsql" | "sqlserver" | "mssql" => Ok(Dialect::TSql),
            "oracle" => Ok(Dialect::Oracle),
            "h2" => Ok(Dialect::H2),
            "db2" => Ok(Dialect::Db2),
            "teradata" => Ok(Dialect::Teradata),
            "sqlite" => Ok(Dialect::Sqlite),
            _ => Err(UnknownDialect(s.to_string())),
        }
    }
}

// Implement SqlDialect for Dialect enum by delegating to concrete types
impl SqlDialect for Dialect {
    fn name(&self) -> &'static str {
        self.dialect().name()
    }

    fn quote_identifier(&self, ident: &str) -> String {
        self.dialect().quote_identifier(ident)
    }

    fn is_reserved_keyword(&self, ident: &str) -> bool {
        self.dialect().is_reserved_keyword(ident)
    }

    fn render_identifier(&self, ident: &str) -> String {
        self.dialect().render_identifier(ident)
    }

    fn quote_string(&self, s: &str) -> String {
        self.dialect().quote_string(s)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        self.dialect().format_bool(b)
    }

    fn format_null(&self) -> &'static str {
        self.dialect().format_null()
    }

    fn format_date_literal(&self, date: &str) -> String {
        self.dialect().format_date_literal(date)
    }

    fn format_time_literal(&self, time: &str) -> String {
        self.dialect().format_time_literal(time)
    }

    fn format_timestamp_literal(&self, timestamp: &str) -> String {
        self.dialect().format_timestamp_literal(timestamp)
    }

    fn parameter_marker(&self) -> &'static str {
        self.dialect().parameter_marker()
    }

    fn emit_pagination(&self, page: &PageTokens) -> TokenStream {
        self.dialect().emit_pagination(page)
    }

    fn requires_order_by_for_offset(&self) -> bool {
        self.dialect().requires_order_by_for_offset()
    }

    fn supports_offset(&self) -> bool {
        self.dialect().supports_offset()
    }

    fn uses_top(&self) -> bool {
        self.dialect().uses_top()
    }

    fn supports_fetch_with_ties(&self) -> bool {
        self.dialect().supports_fetch_with_ties()
    }

    fn supports_fetch_percent(&self) -> bool {
        self.dialect().supports_fetch_percent()
    }

    fn concat_operator(&self) -> &'static str {
        self.dialect().concat_operator()
    }

    fn supports_concat_operator(&self) -> bool {
        self.dialect().supports_concat_operator()
    }

    fn except_keyword(&self) -> &'static str {
        self.dialect().except_keyword()
    }

    fn supports_parenthesized_set_operands(&self) -> bool {
        self.dialect().supports_parenthesized_set_operands()
    }

    fn supports_boolean_predicate(&self) -> bool {
        self.dialect().supports_boolean_predicate()
    }

    fn supports_full_outer_join(&self) -> bool {
        self.dialect().supports_full_outer_join()
    }

    fn table_alias_keyword(&self) -> bool {
        self.dialect().table_alias_keyword()
    }

    fn supports_nulls_ordering(&self) -> bool {
        self.dialect().supports_nulls_ordering()
    }

    fn in_expression_count_limit(&self) -> usize {
        self.dialect().in_expression_count_limit()
    }

    fn supports_empty_in_list(&self) -> bool {
        self.dialect().supports_empty_in_list()
    }

    fn type_names(&self) -> &'static TypeNames {
        self.dialect().type_names()
    }

    fn type_name(&self, code: SqlTypeCode, size: Size) -> Option<String> {
        self.dialect().type_name(code, size)
    }

    fn cast_type_name(&self, code: SqlTypeCode, size: Size) -> Option<String> {
        self.dialect().cast_type_name(code, size)
    }

    fn initialize_function_registry(&self, registry: &mut FunctionRegistry) {
        self.dialect().initialize_function_registry(registry)
    }

    fn contribute_functions(&self, registry: &mut FunctionRegistry) {
        self.dialect().contribute_functions(registry)
    }

    fn timestampadd_pattern(
        &self,
        unit: TemporalUnit,
        timestamp: bool,
    ) -> Result<String, IllegalUnitConversion> {
        self.dialect().timestampadd_pattern(unit, timestamp)
    }

    fn timestampdiff_pattern(
        &self,
        unit: TemporalUnit,
        from_timestamp: bool,
        to_timestamp: bool,
    ) -> Result<String, IllegalUnitConversion> {
        self.dialect()
            .timestampdiff_pattern(unit, from_timestamp, to_timestamp)
    }

    fn extract_pattern(&self, unit: TemporalUnit) -> Option<String> {
        self.dialect().extract_pattern(unit)
    }

    fn supports_if_exists_before_constraint_name(&self) -> bool {
        self.dialect().supports_if_exists_before_constraint_name()
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.dialect().name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dialect_display() {
        assert_eq!(Dialect::Ansi.to_string(), "ansi");
        assert_eq!(Dialect::Postgres.to_string(), "postgres");
        assert_eq!(Dialect::TSql.to_string(), "tsql");
        assert_eq!(Dialect::MySql.to_string(), "mysql");
        assert_eq!(Dialect::MariaDb.to_string(), "mariadb");
        assert_eq!(Dialect::Teradata.to_string(), "teradata");
    }

    #[test]
    fn test_display_round_trips_through_from_str() {
        for dialect in Dialect::ALL {
            assert_eq!(dialect.to_string().parse::<Dialect>().unwrap(), dialect);
        }
        assert_eq!("SQLServer".parse::<Dialect>().unwrap(), Dialect::TSql);
        assert!("bigquery".parse::<Dialect>().is_err());
    }

    #[test]
    fn test_quote_identifier() {
        assert_eq!(Dialect::Ansi.quote_identifier("users"), "\"users\"");
        assert_eq!(Dialect::Postgres.quote_identifier("users"), "\"users\"");
        assert_eq!(Dialect::TSql.quote_identifier("users"), "[users]");
        assert_eq!(Dialect::MySql.quote_identifier("users"), "`users`");
    }

    #[test]
    fn test_quote_identifier_escaping() {
        assert_eq!(
            Dialect::Oracle.quote_identifier("weird\"name"),
            "\"weird\"\"name\""
        );
        assert_eq!(
            Dialect::TSql.quote_identifier("weird]name"),
            "[weird]]name]"
        );
        assert_eq!(
            Dialect::MariaDb.quote_identifier("weird`name"),
            "`weird``name`"
        );
    }

    #[test]
    fn test_reserved_words_are_quoted() {
        assert_eq!(Dialect::Postgres.render_identifier("person"), "person");
        assert_eq!(Dialect::Postgres.render_identifier("select"), "\"select\"");
        // Teradata reserves a few common column names
        assert_eq!(Dialect::Teradata.render_identifier("title"), "\"title\"");
        assert_eq!(Dialect::Postgres.render_identifier("title"), "title");
    }

    #[test]
    fn test_format_bool() {
        assert_eq!(Dialect::Ansi.format_bool(true), "true");
        assert_eq!(Dialect::Postgres.format_bool(false), "false");
        assert_eq!(Dialect::TSql.format_bool(true), "1");
        assert_eq!(Dialect::MySql.format_bool(false), "0");
        assert_eq!(Dialect::Oracle.format_bool(true), "1");
    }

    #[test]
    fn test_concat_operator() {
        assert_eq!(Dialect::Ansi.concat_operator(), "||");
        assert_eq!(Dialect::Postgres.concat_operator(), "||");
        assert_eq!(Dialect::TSql.concat_operator(), "+");
        // MySQL uses CONCAT() function, operator returns || but shouldn't be used
        assert!(!Dialect::MySql.supports_concat_operator());
    }

    #[test]
    fn test_in_list_limits() {
        assert_eq!(Dialect::Oracle.in_expression_count_limit(), 1000);
        assert_eq!(Dialect::Teradata.in_expression_count_limit(), 1024);
        assert_eq!(Dialect::Postgres.in_expression_count_limit(), 0);
    }

    #[test]
    fn test_feature_flags() {
        assert!(!Dialect::MySql.supports_full_outer_join());
        assert!(!Dialect::MySql.supports_nulls_ordering());
        assert!(!Dialect::Teradata.supports_offset());
        assert!(Dialect::Teradata.uses_top());
        assert!(Dialect::TSql.requires_order_by_for_offset());
        assert!(!Dialect::Oracle.table_alias_keyword());
        assert!(!Dialect::Sqlite.supports_parenthesized_set_operands());
        assert!(Dialect::MariaDb.supports_if_exists_before_constraint_name());
        assert!(!Dialect::MySql.supports_if_exists_before_constraint_name());
    }

    #[test]
    fn test_every_dialect_names_common_types() {
        for dialect in Dialect::ALL {
            for code in [
                SqlTypeCode::Integer,
                SqlTypeCode::BigInt,
                SqlTypeCode::Varchar,
                SqlTypeCode::Numeric,
                SqlTypeCode::Date,
                SqlTypeCode::Timestamp,
            ] {
                assert!(
                    dialect.type_name(code, Size::default()).is_some(),
                    "{dialect} has no name for {code}"
                );
            }
        }
    }

    #[test]
    fn test_ansi_temporal_defaults() {
        assert_eq!(
            Dialect::Ansi
                .timestampadd_pattern(TemporalUnit::Quarter, true)
                .unwrap(),
            "timestampadd(month, (?2)*3, ?3)"
        );
        assert_eq!(
            Dialect::Ansi
                .timestampdiff_pattern(TemporalUnit::Nanosecond, true, true)
                .unwrap(),
            "timestampdiff(second, ?2, ?3)*1e9"
        );
        assert_eq!(
            Dialect::Ansi
                .timestampdiff_pattern(TemporalUnit::Day, true, true)
                .unwrap(),
            "timestampdiff(?1, ?2, ?3)"
        );
    }
}
