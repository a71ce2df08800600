//! T-SQL (SQL Server / Azure SQL) dialect.
//!
//! T-SQL has significant differences from ANSI:
//! - Square bracket identifier quoting (`[name]`)
//! - No native boolean in predicates (`flag = 1`)
//! - OFFSET FETCH for pagination (requires ORDER BY)
//! - N'...' prefix for Unicode strings
//! - String concatenation with `+`
//! - `len`, `charindex`, `%` instead of `length`, `locate`, `mod`
//! - `dateadd`/`datediff`/`datepart` for temporal arithmetic

use once_cell::sync::Lazy;

use super::helpers;
use super::{PageTokens, SqlDialect};
use crate::function::FunctionRegistry;
use crate::sql::token::TokenStream;
use crate::sql::types::{SqlTypeCode, TypeNames};
use crate::sqm::types::SqmType;
use crate::temporal::{IllegalUnitConversion, TemporalUnit};

static TYPE_NAMES: Lazy<TypeNames> = Lazy::new(|| {
    let mut names = TypeNames::standard();
    names
        .put(SqlTypeCode::Boolean, "bit")
        .put(SqlTypeCode::TinyInt, "smallint")
        .put(SqlTypeCode::Float, "float")
        .put(SqlTypeCode::Double, "float")
        .put(SqlTypeCode::Timestamp, "datetime2(6)")
        .put(SqlTypeCode::TimestampWithTimeZone, "datetimeoffset(6)")
        .put_with_capacity(SqlTypeCode::Varchar, 8000, "varchar($l)")
        .put(SqlTypeCode::Varchar, "varchar(max)")
        .put(SqlTypeCode::LongVarchar, "varchar(max)")
        .put(SqlTypeCode::Clob, "varchar(max)")
        .put_with_capacity(SqlTypeCode::Varbinary, 8000, "varbinary($l)")
        .put(SqlTypeCode::Varbinary, "varbinary(max)")
        .put(SqlTypeCode::LongVarbinary, "varbinary(max)")
        .put(SqlTypeCode::Blob, "varbinary(max)");
    names
});

/// T-SQL (SQL Server) dialect.
#[derive(Debug, Clone, Copy)]
pub struct TSql;

impl SqlDialect for TSql {
    fn name(&self) -> &'static str {
        "tsql"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_bracket(ident)
    }

    fn quote_string(&self, s: &str) -> String {
        // T-SQL uses N'...' for Unicode strings
        if !s.is_ascii() {
            helpers::quote_string_unicode(s)
        } else {
            helpers::quote_string_single(s)
        }
    }

    fn format_bool(&self, b: bool) -> &'static str {
        helpers::format_bool_numeric(b)
    }

    fn format_date_literal(&self, date: &str) -> String {
        // T-SQL doesn't support DATE 'YYYY-MM-DD' syntax
        helpers::quote_string_single(date)
    }

    fn format_time_literal(&self, time: &str) -> String {
        helpers::quote_string_single(time)
    }

    fn format_timestamp_literal(&self, timestamp: &str) -> String {
        helpers::quote_string_single(timestamp)
    }

    fn emit_pagination(&self, page: &PageTokens) -> TokenStream {
        helpers::emit_offset_fetch_tsql(page)
    }

    fn requires_order_by_for_offset(&self) -> bool {
        true
    }

    fn concat_operator(&self) -> &'static str {
        "+"
    }

    fn supports_boolean_predicate(&self) -> bool {
        false
    }

    fn supports_nulls_ordering(&self) -> bool {
        // T-SQL 2022+ supports NULLS FIRST/LAST, but older versions don't
        false
    }

    fn type_names(&self) -> &'static TypeNames {
        &TYPE_NAMES
    }

    fn contribute_functions(&self, registry: &mut FunctionRegistry) {
        registry
            .named_descriptor_builder("len")
            .set_exact_argument_count(1)
            .set_invariant_type(SqmType::Integer)
            .register_as("length");
        registry
            .named_descriptor_builder("log")
            .set_exact_argument_count(1)
            .set_invariant_type(SqmType::Double)
            .register_as("ln");
        let patterns = [
            ("mod", "(?1 % ?2)", None),
            ("locate", "charindex(?1, ?2)", Some(SqmType::Integer)),
            ("current_date", "cast(current_timestamp as date)", Some(SqmType::Date)),
            ("current_time", "cast(current_timestamp as time)", Some(SqmType::Time)),
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
        _unit: TemporalUnit,
        _timestamp: bool,
    ) -> Result<String, IllegalUnitConversion> {
        Ok("dateadd(?1, ?2, ?3)".to_string())
    }

    fn timestampdiff_pattern(
        &self,
        unit: TemporalUnit,
        _from_timestamp: bool,
        _to_timestamp: bool,
    ) -> Result<String, IllegalUnitConversion> {
        Ok(match unit {
            // nanosecond counts overflow int after about two seconds
            TemporalUnit::Nanosecond => "datediff_big(?1, ?2, ?3)".to_string(),
            _ => "datediff(?1, ?2, ?3)".to_string(),
        })
    }

    fn extract_pattern(&self, unit: TemporalUnit) -> Option<String> {
        let pattern = match unit {
            TemporalUnit::DayOfWeek => "datepart(weekday, ?2)",
            TemporalUnit::DayOfYear => "datepart(dayofyear, ?2)",
            TemporalUnit::DayOfMonth => "datepart(day, ?2)",
            TemporalUnit::WeekOfYear => "datepart(week, ?2)",
            TemporalUnit::Offset => "datepart(tz, ?2)",
            TemporalUnit::Epoch => "datediff_big(second, '1970-01-01', ?2)",
            _ => "datepart(?1, ?2)",
        };
        Some(pattern.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::FunctionRendering;

    #[test]
    fn test_length_is_len() {
        let mut registry = FunctionRegistry::new();
        TSql.initialize_function_registry(&mut registry);
        assert_eq!(
            registry.find("length").unwrap().rendering,
            FunctionRendering::Named {
                name: "len".into(),
                parens_when_no_args: false
            }
        );
    }

    #[test]
    fn test_unicode_strings_are_prefixed() {
        assert_eq!(TSql.quote_string("abc"), "'abc'");
        assert_eq!(TSql.quote_string("größe"), "N'größe'");
    }

    #[test]
    fn test_varchar_max() {
        use crate::sql::types::Size;
        assert_eq!(
            TSql.type_name(SqlTypeCode::Varchar, Size::length(100)).unwrap(),
            "varchar(100)"
        );
        assert_eq!(
            TSql.type_name(SqlTypeCode::Varchar, Size::length(10_000)).unwrap(),
            "varchar(max)"
        );
    }
}
