//! PostgreSQL dialect.
//!
//! PostgreSQL differences from ANSI:
//! - LIMIT ... OFFSET ... for pagination (FETCH ... WITH TIES since 13)
//! - `bytea` for binary, `text` for long strings
//! - Interval arithmetic instead of `timestampadd`
//! - `age()` and `extract(epoch ...)` instead of `timestampdiff`

use once_cell::sync::Lazy;

use super::helpers;
use super::{PageTokens, SqlDialect};
use crate::function::FunctionRegistry;
use crate::sql::token::TokenStream;
use crate::sql::types::{SqlTypeCode, TypeNames};
use crate::sqm::types::SqmType;
use crate::temporal::{convert_unit, IllegalUnitConversion, TemporalUnit};

static TYPE_NAMES: Lazy<TypeNames> = Lazy::new(|| {
    let mut names = TypeNames::standard();
    names
        .put(SqlTypeCode::Bit, "boolean")
        .put(SqlTypeCode::TinyInt, "smallint")
        .put(SqlTypeCode::Float, "float4")
        .put(SqlTypeCode::Double, "float8")
        .put(SqlTypeCode::LongVarchar, "text")
        .put(SqlTypeCode::Clob, "text")
        .put(SqlTypeCode::Binary, "bytea")
        .put(SqlTypeCode::Varbinary, "bytea")
        .put(SqlTypeCode::LongVarbinary, "bytea")
        .put(SqlTypeCode::Blob, "bytea");
    names
});

/// Months between two values, as a whole number of months.
const MONTHS_BETWEEN: &str = "(extract(year from age(?3, ?2))*12+extract(month from age(?3, ?2)))";

/// PostgreSQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct Postgres;

impl SqlDialect for Postgres {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_double(ident)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        helpers::format_bool_literal(b)
    }

    fn emit_pagination(&self, page: &PageTokens) -> TokenStream {
        if page.with_ties {
            helpers::emit_offset_fetch_standard(page)
        } else {
            helpers::emit_limit_offset_standard(page, None)
        }
    }

    fn supports_fetch_with_ties(&self) -> bool {
        true
    }

    fn type_names(&self) -> &'static TypeNames {
        &TYPE_NAMES
    }

    fn contribute_functions(&self, registry: &mut FunctionRegistry) {
        registry
            .named_descriptor_builder("ceil")
            .set_exact_argument_count(1)
            .register_as("ceiling");
        if let Ok(builder) = registry.pattern_descriptor_builder("locate", "position(?1 in ?2)") {
            builder.set_invariant_type(SqmType::Integer).register();
        }
    }

    fn timestampadd_pattern(
        &self,
        unit: TemporalUnit,
        _timestamp: bool,
    ) -> Result<String, IllegalUnitConversion> {
        Ok(match unit {
            TemporalUnit::Nanosecond => format!(
                "(?3 + (?2){} * interval '1 second')",
                convert_unit(unit, TemporalUnit::Second)?
            ),
            TemporalUnit::Quarter => format!(
                "(?3 + (?2){} * interval '1 month')",
                convert_unit(unit, TemporalUnit::Month)?
            ),
            _ => "(?3 + (?2) * interval '1 ?1')".to_string(),
        })
    }

    fn timestampdiff_pattern(
        &self,
        unit: TemporalUnit,
        from_timestamp: bool,
        to_timestamp: bool,
    ) -> Result<String, IllegalUnitConversion> {
        Ok(match unit {
            TemporalUnit::Year | TemporalUnit::Quarter | TemporalUnit::Month => format!(
                "trunc({MONTHS_BETWEEN}{})",
                convert_unit(TemporalUnit::Month, unit)?
            ),
            // date minus date is already a day count
            TemporalUnit::Day | TemporalUnit::Week if !from_timestamp && !to_timestamp => format!(
                "trunc((?3 - ?2){})",
                convert_unit(TemporalUnit::Day, unit)?
            ),
            _ => format!(
                "trunc(extract(epoch from ?3 - ?2){})",
                convert_unit(TemporalUnit::Second, unit)?
            ),
        })
    }

    fn extract_pattern(&self, unit: TemporalUnit) -> Option<String> {
        let pattern = match unit {
            TemporalUnit::DayOfWeek => "(extract(dow from ?2)+1)",
            TemporalUnit::DayOfYear => "extract(doy from ?2)",
            TemporalUnit::DayOfMonth => "extract(day from ?2)",
            TemporalUnit::WeekOfYear => "extract(week from ?2)",
            TemporalUnit::Nanosecond => "extract(microseconds from ?2)*1e3",
            TemporalUnit::Offset => "extract(timezone from ?2)",
            _ => "extract(?1 from ?2)",
        };
        Some(pattern.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_arithmetic() {
        assert_eq!(
            Postgres.timestampadd_pattern(TemporalUnit::Day, true).unwrap(),
            "(?3 + (?2) * interval '1 ?1')"
        );
        assert_eq!(
            Postgres
                .timestampadd_pattern(TemporalUnit::Nanosecond, true)
                .unwrap(),
            "(?3 + (?2)/1e9 * interval '1 second')"
        );
    }

    #[test]
    fn test_diff_scales_from_seconds() {
        assert_eq!(
            Postgres
                .timestampdiff_pattern(TemporalUnit::Hour, true, true)
                .unwrap(),
            "trunc(extract(epoch from ?3 - ?2)/3600)"
        );
        assert_eq!(
            Postgres
                .timestampdiff_pattern(TemporalUnit::Week, false, false)
                .unwrap(),
            "trunc((?3 - ?2)/7)"
        );
    }

    #[test]
    fn test_diff_calendar_units() {
        assert_eq!(
            Postgres
                .timestampdiff_pattern(TemporalUnit::Year, true, true)
                .unwrap(),
            format!("trunc({MONTHS_BETWEEN}/12)")
        );
    }
}
