//! MySQL SQL dialect.
//!
//! MySQL differences from ANSI:
//! - Backtick identifier quoting (`` `name` ``)
//! - Boolean is TINYINT(1), returns 1/0
//! - `||` is logical OR by default (use CONCAT())
//! - LIMIT ... OFFSET ... for pagination
//! - No FULL OUTER JOIN
//! - No NULLS FIRST/LAST
//! - CAST only accepts a handful of target names (`signed`, `char`, `datetime`...)
//! - Native `timestampadd`/`timestampdiff` down to microseconds

use once_cell::sync::Lazy;

use super::helpers;
use super::{PageTokens, SqlDialect};
use crate::function::FunctionRegistry;
use crate::sql::token::TokenStream;
use crate::sql::types::{Size, SqlTypeCode, TypeNames};
use crate::temporal::{IllegalUnitConversion, TemporalUnit};

/// Largest row count MySQL accepts, written when only an offset is given.
const MAX_ROWS: &str = "18446744073709551615";

pub(super) static TYPE_NAMES: Lazy<TypeNames> = Lazy::new(|| {
    let mut names = TypeNames::standard();
    names
        .put(SqlTypeCode::Boolean, "bit")
        .put(SqlTypeCode::Float, "float")
        .put(SqlTypeCode::Double, "double precision")
        .put(SqlTypeCode::Timestamp, "datetime(6)")
        .put(SqlTypeCode::TimestampWithTimeZone, "timestamp(6)")
        .put_with_capacity(SqlTypeCode::Varchar, 65_535, "varchar($l)")
        .put(SqlTypeCode::Varchar, "longtext")
        .put(SqlTypeCode::LongVarchar, "longtext")
        .put(SqlTypeCode::Clob, "longtext")
        .put_with_capacity(SqlTypeCode::Varbinary, 65_535, "varbinary($l)")
        .put(SqlTypeCode::Varbinary, "longblob")
        .put(SqlTypeCode::LongVarbinary, "longblob")
        .put(SqlTypeCode::Blob, "longblob");
    names
});

/// MySQL SQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct MySql;

impl SqlDialect for MySql {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_backtick(ident)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        helpers::format_bool_numeric(b)
    }

    fn emit_pagination(&self, page: &PageTokens) -> TokenStream {
        helpers::emit_limit_offset_standard(page, Some(MAX_ROWS))
    }

    fn concat_operator(&self) -> &'static str {
        // MySQL || is OR by default, but we return it anyway
        // Callers should check supports_concat_operator()
        "||"
    }

    fn supports_concat_operator(&self) -> bool {
        // MySQL || is OR by default, use CONCAT() instead
        false
    }

    fn supports_full_outer_join(&self) -> bool {
        false
    }

    fn supports_nulls_ordering(&self) -> bool {
        false
    }

    fn type_names(&self) -> &'static TypeNames {
        &TYPE_NAMES
    }

    fn cast_type_name(&self, code: SqlTypeCode, size: Size) -> Option<String> {
        cast_type_name(code, size)
    }

    fn contribute_functions(&self, registry: &mut FunctionRegistry) {
        contribute_functions(registry)
    }

    fn timestampadd_pattern(
        &self,
        unit: TemporalUnit,
        _timestamp: bool,
    ) -> Result<String, IllegalUnitConversion> {
        Ok(timestampadd_pattern(unit))
    }

    fn timestampdiff_pattern(
        &self,
        unit: TemporalUnit,
        _from_timestamp: bool,
        _to_timestamp: bool,
    ) -> Result<String, IllegalUnitConversion> {
        Ok(timestampdiff_pattern(unit))
    }

    fn extract_pattern(&self, unit: TemporalUnit) -> Option<String> {
        Some(extract_pattern(unit))
    }
}

// Shared with MariaDB.

pub(super) fn cast_type_name(code: SqlTypeCode, size: Size) -> Option<String> {
    let name = match code {
        SqlTypeCode::Boolean
        | SqlTypeCode::Bit
        | SqlTypeCode::TinyInt
        | SqlTypeCode::SmallInt
        | SqlTypeCode::Integer
        | SqlTypeCode::BigInt => "signed".to_string(),
        SqlTypeCode::Float | SqlTypeCode::Real | SqlTypeCode::Double => "double".to_string(),
        SqlTypeCode::Numeric | SqlTypeCode::Decimal => format!(
            "decimal({},{})",
            size.precision_or_default(),
            size.scale_or_default()
        ),
        SqlTypeCode::Char | SqlTypeCode::Varchar => {
            format!("char({})", size.length_or_default())
        }
        SqlTypeCode::LongVarchar | SqlTypeCode::Clob => "char".to_string(),
        SqlTypeCode::Date => "date".to_string(),
        SqlTypeCode::Time => "time".to_string(),
        SqlTypeCode::Timestamp | SqlTypeCode::TimestampWithTimeZone => "datetime".to_string(),
        SqlTypeCode::Binary
        | SqlTypeCode::Varbinary
        | SqlTypeCode::LongVarbinary
        | SqlTypeCode::Blob => "binary".to_string(),
    };
    Some(name)
}

pub(super) fn contribute_functions(registry: &mut FunctionRegistry) {
    // mod and locate are native; only the spelling of a few differs
    registry
        .named_descriptor_builder("char_length")
        .set_exact_argument_count(1)
        .set_invariant_type(crate::sqm::types::SqmType::Integer)
        .register_as("length");
}

pub(super) fn timestampadd_pattern(unit: TemporalUnit) -> String {
    match unit {
        TemporalUnit::Nanosecond => "timestampadd(microsecond, (?2)/1e3, ?3)".to_string(),
        _ => "timestampadd(?1, ?2, ?3)".to_string(),
    }
}

pub(super) fn timestampdiff_pattern(unit: TemporalUnit) -> String {
    match unit {
        TemporalUnit::Nanosecond => "timestampdiff(microsecond, ?2, ?3)*1e3".to_string(),
        _ => "timestampdiff(?1, ?2, ?3)".to_string(),
    }
}

pub(super) fn extract_pattern(unit: TemporalUnit) -> String {
    match unit {
        TemporalUnit::DayOfWeek => "dayofweek(?2)".to_string(),
        TemporalUnit::DayOfYear => "dayofyear(?2)".to_string(),
        TemporalUnit::DayOfMonth => "dayofmonth(?2)".to_string(),
        TemporalUnit::WeekOfYear | TemporalUnit::Week => "weekofyear(?2)".to_string(),
        TemporalUnit::Nanosecond => "extract(microsecond from ?2)*1e3".to_string(),
        TemporalUnit::Epoch => "unix_timestamp(?2)".to_string(),
        _ => "extract(?1 from ?2)".to_string(),
    }
}
