//! SQLite dialect.
//!
//! SQLite differences from ANSI:
//! - Type affinities instead of sized types; temporal values are text
//! - `LIMIT -1 OFFSET n` when only an offset is given
//! - Set operation operands cannot be parenthesized
//! - `x IN ()` is valid
//! - `datetime()` modifiers and `julianday()` for temporal arithmetic,
//!   `strftime()` for field extraction

use once_cell::sync::Lazy;

use super::helpers;
use super::{PageTokens, SqlDialect};
use crate::function::FunctionRegistry;
use crate::sql::token::TokenStream;
use crate::sql::types::{Size, SqlTypeCode, TypeNames};
use crate::sqm::types::SqmType;
use crate::temporal::{convert_unit, IllegalUnitConversion, TemporalUnit};

static TYPE_NAMES: Lazy<TypeNames> = Lazy::new(|| {
    let mut names = TypeNames::new();
    names
        .put(SqlTypeCode::Boolean, "integer")
        .put(SqlTypeCode::Bit, "integer")
        .put(SqlTypeCode::TinyInt, "tinyint")
        .put(SqlTypeCode::SmallInt, "smallint")
        .put(SqlTypeCode::Integer, "integer")
        .put(SqlTypeCode::BigInt, "bigint")
        .put(SqlTypeCode::Float, "float")
        .put(SqlTypeCode::Real, "real")
        .put(SqlTypeCode::Double, "double")
        .put(SqlTypeCode::Numeric, "numeric")
        .put(SqlTypeCode::Decimal, "decimal")
        .put(SqlTypeCode::Char, "char")
        .put(SqlTypeCode::Varchar, "varchar")
        .put(SqlTypeCode::LongVarchar, "longvarchar")
        .put(SqlTypeCode::Clob, "clob")
        .put(SqlTypeCode::Date, "date")
        .put(SqlTypeCode::Time, "time")
        .put(SqlTypeCode::Timestamp, "timestamp")
        .put(SqlTypeCode::TimestampWithTimeZone, "timestamp")
        .put(SqlTypeCode::Binary, "blob")
        .put(SqlTypeCode::Varbinary, "blob")
        .put(SqlTypeCode::LongVarbinary, "blob")
        .put(SqlTypeCode::Blob, "blob");
    names
});

/// Whole months from ?2 to ?3.
const MONTHS_BETWEEN: &str = "((cast(strftime('%Y', ?3) as integer) - cast(strftime('%Y', ?2) as integer))*12 + cast(strftime('%m', ?3) as integer) - cast(strftime('%m', ?2) as integer))";

/// SQLite dialect.
#[derive(Debug, Clone, Copy)]
pub struct Sqlite;

impl SqlDialect for Sqlite {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_double(ident)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        helpers::format_bool_numeric(b)
    }

    fn format_date_literal(&self, date: &str) -> String {
        helpers::quote_string_single(date)
    }

    fn format_time_literal(&self, time: &str) -> String {
        helpers::quote_string_single(time)
    }

    fn format_timestamp_literal(&self, timestamp: &str) -> String {
        helpers::quote_string_single(timestamp)
    }

    fn emit_pagination(&self, page: &PageTokens) -> TokenStream {
        helpers::emit_limit_offset_standard(page, Some("-1"))
    }

    fn supports_parenthesized_set_operands(&self) -> bool {
        false
    }

    fn supports_empty_in_list(&self) -> bool {
        true
    }

    fn type_names(&self) -> &'static TypeNames {
        &TYPE_NAMES
    }

    fn cast_type_name(&self, code: SqlTypeCode, size: Size) -> Option<String> {
        match code {
            // a date affinity would turn '2020-01-31' into 2020
            SqlTypeCode::Date
            | SqlTypeCode::Time
            | SqlTypeCode::Timestamp
            | SqlTypeCode::TimestampWithTimeZone => Some("text".to_string()),
            _ => self.type_name(code, size),
        }
    }

    fn contribute_functions(&self, registry: &mut FunctionRegistry) {
        registry
            .named_descriptor_builder("substr")
            .set_argument_count_between(2, 3)
            .set_invariant_type(SqmType::String)
            .register_as("substring");
        let patterns = [
            ("mod", "(?1 % ?2)", None),
            ("locate", "instr(?2, ?1)", Some(SqmType::Integer)),
            // floor and ceiling only exist when built with math functions
            ("floor", "(cast(?1 as integer) - (cast(?1 as integer) > ?1))", None),
            ("ceiling", "(-(cast(-(?1) as integer) - (cast(-(?1) as integer) > -(?1))))", None),
            ("current_date", "date('now')", Some(SqmType::Date)),
            ("current_time", "time('now')", Some(SqmType::Time)),
            ("current_timestamp", "datetime('now')", Some(SqmType::Timestamp)),
        ];
        for (name, pattern, ty) in patterns {
            if let Ok(builder) = registry.pattern_descriptor_builder(name, pattern) {
                match ty {
                    Some(ty) => builder.set_invariant_type(ty).register(),
                    None => builder.register(),
                };
            }
        }
    }

    fn timestampadd_pattern(
        &self,
        unit: TemporalUnit,
        timestamp: bool,
    ) -> Result<String, IllegalUnitConversion> {
        let function = if timestamp { "datetime" } else { "date" };
        // `||` binds tighter than `*` and `/`, so scaled amounts need parentheses.
        let (magnitude, modifier) = match unit {
            TemporalUnit::Week => (
                format!("((?2){})", convert_unit(unit, TemporalUnit::Day)?),
                "day",
            ),
            TemporalUnit::Quarter => (
                format!("((?2){})", convert_unit(unit, TemporalUnit::Month)?),
                "month",
            ),
            // modifiers do not accept exponent notation
            TemporalUnit::Nanosecond => (
                format!(
                    "printf('%.9f', (?2){})",
                    convert_unit(unit, TemporalUnit::Second)?
                ),
                "second",
            ),
            other => ("(?2)".to_string(), other.name()),
        };
        Ok(format!("{function}(?3, {magnitude} || ' {modifier}')"))
    }

    fn timestampdiff_pattern(
        &self,
        unit: TemporalUnit,
        _from_timestamp: bool,
        _to_timestamp: bool,
    ) -> Result<String, IllegalUnitConversion> {
        Ok(match unit {
            TemporalUnit::Year | TemporalUnit::Quarter | TemporalUnit::Month => format!(
                "({MONTHS_BETWEEN}{})",
                convert_unit(TemporalUnit::Month, unit)?
            ),
            _ => format!(
                "cast((julianday(?3) - julianday(?2)){} as integer)",
                convert_unit(TemporalUnit::Day, unit)?
            ),
        })
    }

    fn extract_pattern(&self, unit: TemporalUnit) -> Option<String> {
        let field = match unit {
            TemporalUnit::Year => "%Y",
            TemporalUnit::Month => "%m",
            TemporalUnit::Day | TemporalUnit::DayOfMonth => "%d",
            TemporalUnit::Hour => "%H",
            TemporalUnit::Minute => "%M",
            TemporalUnit::Second => "%S",
            TemporalUnit::DayOfYear => "%j",
            TemporalUnit::Week | TemporalUnit::WeekOfYear => "%W",
            TemporalUnit::Epoch => "%s",
            TemporalUnit::DayOfWeek => {
                return Some("(cast(strftime('%w', ?2) as integer)+1)".to_string())
            }
            TemporalUnit::Quarter => {
                return Some("((cast(strftime('%m', ?2) as integer)+2)/3)".to_string())
            }
            TemporalUnit::Date => return Some("date(?2)".to_string()),
            TemporalUnit::Time => return Some("time(?2)".to_string()),
            // no sub-second or zone fields, and no extract()
            _ => return None,
        };
        Some(format!("cast(strftime('{field}', ?2) as integer)"))
    }
}
