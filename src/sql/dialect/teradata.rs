//! Teradata dialect.
//!
//! Teradata differences from ANSI:
//! - `TOP n` instead of LIMIT/FETCH; no row offset at all
//! - `BYTEINT` for bits, tiny integers and booleans; `NUMERIC(18,0)` for BIGINT
//! - Decimal precision capped at 18, the scale shrinking proportionally
//! - Reserves several common column names (`title`, `year`, `value`...)
//! - Interval arithmetic with explicit interval precision
//! - At most 1024 values per IN list
//! - No NULLS FIRST/LAST
//! - `td_*` calendar functions for the fields `EXTRACT` does not know

use once_cell::sync::Lazy;

use super::helpers;
use super::{PageTokens, SqlDialect};
use crate::function::FunctionRegistry;
use crate::sql::token::TokenStream;
use crate::sql::types::{Size, SqlTypeCode, TypeNames};
use crate::sqm::types::SqmType;
use crate::temporal::{IllegalUnitConversion, TemporalUnit};

const MAX_PRECISION: u32 = 18;

static TYPE_NAMES: Lazy<TypeNames> = Lazy::new(|| {
    let mut names = TypeNames::standard();
    names
        .put(SqlTypeCode::Numeric, "NUMERIC($p,$s)")
        .put(SqlTypeCode::Double, "DOUBLE PRECISION")
        .put(SqlTypeCode::BigInt, "NUMERIC(18,0)")
        .put(SqlTypeCode::Bit, "BYTEINT")
        .put(SqlTypeCode::TinyInt, "BYTEINT")
        .put(SqlTypeCode::Varbinary, "VARBYTE($l)")
        .put(SqlTypeCode::Binary, "BYTEINT")
        .put(SqlTypeCode::LongVarchar, "LONG VARCHAR")
        .put(SqlTypeCode::Char, "CHAR(1)")
        .put(SqlTypeCode::Decimal, "DECIMAL")
        .put(SqlTypeCode::Integer, "INTEGER")
        .put(SqlTypeCode::SmallInt, "SMALLINT")
        .put(SqlTypeCode::Float, "FLOAT")
        .put(SqlTypeCode::Varchar, "VARCHAR($l)")
        .put(SqlTypeCode::Date, "DATE")
        .put(SqlTypeCode::Time, "TIME")
        .put(SqlTypeCode::Timestamp, "TIMESTAMP")
        .put(SqlTypeCode::Boolean, "BYTEINT")
        .put(SqlTypeCode::Blob, "BLOB")
        .put(SqlTypeCode::Clob, "CLOB");
    names
});

const RESERVED: [&str; 12] = [
    "password", "type", "title", "year", "month", "summary", "alias", "value", "first", "role",
    "account", "class",
];

/// Teradata dialect.
#[derive(Debug, Clone, Copy)]
pub struct Teradata;

impl SqlDialect for Teradata {
    fn name(&self) -> &'static str {
        "teradata"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_double(ident)
    }

    fn is_reserved_keyword(&self, ident: &str) -> bool {
        helpers::is_ansi_reserved(ident) || RESERVED.contains(&ident.to_ascii_lowercase().as_str())
    }

    fn format_bool(&self, b: bool) -> &'static str {
        helpers::format_bool_numeric(b)
    }

    fn emit_pagination(&self, _page: &PageTokens) -> TokenStream {
        // the limit is written as TOP after SELECT
        TokenStream::new()
    }

    fn supports_offset(&self) -> bool {
        false
    }

    fn uses_top(&self) -> bool {
        true
    }

    fn supports_boolean_predicate(&self) -> bool {
        false
    }

    fn supports_nulls_ordering(&self) -> bool {
        false
    }

    fn in_expression_count_limit(&self) -> usize {
        1024
    }

    fn type_names(&self) -> &'static TypeNames {
        &TYPE_NAMES
    }

    fn type_name(&self, code: SqlTypeCode, size: Size) -> Option<String> {
        self.type_names().get(code, clamp_precision(size))
    }

    fn contribute_functions(&self, registry: &mut FunctionRegistry) {
        if let Ok(builder) =
            registry.pattern_descriptor_builder("substring", "substring(?1 from ?2 for ?3)")
        {
            builder.set_invariant_type(SqmType::String).register();
        }
        if let Ok(builder) = registry.pattern_descriptor_builder("mod", "(?1 mod ?2)") {
            builder.register();
        }
        if let Ok(builder) = registry.pattern_descriptor_builder("locate", "position(?1 in ?2)") {
            builder.set_invariant_type(SqmType::Integer).register();
        }
        registry
            .named_descriptor_builder("octet_length")
            .set_exact_argument_count(1)
            .set_invariant_type(SqmType::Integer)
            .register();
    }

    fn timestampadd_pattern(
        &self,
        unit: TemporalUnit,
        _timestamp: bool,
    ) -> Result<String, IllegalUnitConversion> {
        Ok(match unit {
            TemporalUnit::Nanosecond => "(?3 + (?2)/1e9 * interval '1' second)".to_string(),
            TemporalUnit::Quarter => "(?3 + (?2) * interval '3' month)".to_string(),
            TemporalUnit::Week => "(?3 + (?2) * interval '7' day)".to_string(),
            _ => "(?3 + (?2) * interval '1' ?1)".to_string(),
        })
    }

    fn timestampdiff_pattern(
        &self,
        unit: TemporalUnit,
        _from_timestamp: bool,
        _to_timestamp: bool,
    ) -> Result<String, IllegalUnitConversion> {
        Ok(match unit {
            TemporalUnit::Nanosecond => "1e9*((?3 - ?2) second(19,9))".to_string(),
            TemporalUnit::Week => "((?3 - ?2) day(19,0))/7".to_string(),
            TemporalUnit::Quarter => "((?3 - ?2) month(19,0))/3".to_string(),
            _ => "((?3 - ?2) ?1(19,0))".to_string(),
        })
    }

    fn extract_pattern(&self, unit: TemporalUnit) -> Option<String> {
        let pattern = match unit {
            TemporalUnit::Year
            | TemporalUnit::Month
            | TemporalUnit::Day
            | TemporalUnit::Hour
            | TemporalUnit::Minute
            | TemporalUnit::Second
            | TemporalUnit::TimezoneHour
            | TemporalUnit::TimezoneMinute => "extract(?1 from ?2)",
            TemporalUnit::DayOfMonth => "extract(day from ?2)",
            TemporalUnit::DayOfWeek => "td_day_of_week(?2)",
            TemporalUnit::DayOfYear => "td_day_of_year(?2)",
            TemporalUnit::Week | TemporalUnit::WeekOfYear => "td_week_of_year(?2)",
            TemporalUnit::WeekOfMonth => "td_week_of_month(?2)",
            TemporalUnit::Quarter => "td_quarter_of_year(?2)",
            TemporalUnit::Date => "cast(?2 as date)",
            TemporalUnit::Nanosecond
            | TemporalUnit::Offset
            | TemporalUnit::Time
            | TemporalUnit::Epoch => return None,
        };
        Some(pattern.to_string())
    }
}

/// Cap precision at 18, keeping the scale's share of it.
fn clamp_precision(size: Size) -> Size {
    let precision = size.precision_or_default();
    let scale = size.scale_or_default();
    let (p, s) = if precision > MAX_PRECISION {
        let share = scale as f32 / precision as f32;
        (MAX_PRECISION, (MAX_PRECISION as f32 * share) as u32)
    } else {
        (precision, scale.min(MAX_PRECISION))
    };
    Size {
        precision: Some(p),
        scale: Some(s),
        ..size
    }
}
