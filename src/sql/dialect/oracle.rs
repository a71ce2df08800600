//! Oracle dialect.
//!
//! Oracle differences from ANSI:
//! - `MINUS` instead of `EXCEPT`
//! - No `AS` before a table alias
//! - No boolean type: `number(1,0)`, `flag = 1` in predicates
//! - `varchar2`/`number`/`raw` type names
//! - At most 1000 values per IN list
//! - `substr`, `instr` and `add_months`/`numtodsinterval`/`months_between`

use once_cell::sync::Lazy;

use super::helpers;
use super::SqlDialect;
use crate::function::FunctionRegistry;
use crate::sql::types::{SqlTypeCode, TypeNames};
use crate::sqm::types::SqmType;
use crate::temporal::{convert_unit, IllegalUnitConversion, TemporalUnit};

static TYPE_NAMES: Lazy<TypeNames> = Lazy::new(|| {
    let mut names = TypeNames::standard();
    names
        .put(SqlTypeCode::Boolean, "number(1,0)")
        .put(SqlTypeCode::Bit, "number(1,0)")
        .put(SqlTypeCode::TinyInt, "number(3,0)")
        .put(SqlTypeCode::SmallInt, "number(5,0)")
        .put(SqlTypeCode::Integer, "number(10,0)")
        .put(SqlTypeCode::BigInt, "number(19,0)")
        .put(SqlTypeCode::Numeric, "number($p,$s)")
        .put(SqlTypeCode::Decimal, "number($p,$s)")
        .put(SqlTypeCode::Char, "char($l char)")
        .put_with_capacity(SqlTypeCode::Varchar, 4000, "varchar2($l char)")
        .put(SqlTypeCode::Varchar, "clob")
        .put(SqlTypeCode::LongVarchar, "clob")
        .put(SqlTypeCode::Time, "date")
        .put(SqlTypeCode::Binary, "raw($l)")
        .put_with_capacity(SqlTypeCode::Varbinary, 2000, "raw($l)")
        .put(SqlTypeCode::Varbinary, "blob")
        .put(SqlTypeCode::LongVarbinary, "blob");
    names
});

/// Oracle dialect.
#[derive(Debug, Clone, Copy)]
pub struct Oracle;

impl SqlDialect for Oracle {
    fn name(&self) -> &'static str {
        "oracle"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_double(ident)
    }

    fn is_reserved_keyword(&self, ident: &str) -> bool {
        helpers::is_ansi_reserved(ident)
            || matches!(
                ident.to_ascii_lowercase().as_str(),
                "level" | "number" | "rownum" | "size" | "uid" | "comment" | "date"
            )
    }

    fn format_bool(&self, b: bool) -> &'static str {
        helpers::format_bool_numeric(b)
    }

    fn format_time_literal(&self, time: &str) -> String {
        format!("to_date({}, 'hh24:mi:ss')", helpers::quote_string_single(time))
    }

    fn supports_fetch_with_ties(&self) -> bool {
        true
    }

    fn supports_fetch_percent(&self) -> bool {
        true
    }

    fn except_keyword(&self) -> &'static str {
        "MINUS"
    }

    fn supports_boolean_predicate(&self) -> bool {
        false
    }

    fn table_alias_keyword(&self) -> bool {
        false
    }

    fn in_expression_count_limit(&self) -> usize {
        1000
    }

    fn type_names(&self) -> &'static TypeNames {
        &TYPE_NAMES
    }

    fn contribute_functions(&self, registry: &mut FunctionRegistry) {
        registry
            .named_descriptor_builder("substr")
            .set_argument_count_between(2, 3)
            .set_invariant_type(SqmType::String)
            .register_as("substring");
        registry
            .named_descriptor_builder("ceil")
            .set_exact_argument_count(1)
            .register_as("ceiling");
        registry
            .named_descriptor_builder("current_timestamp")
            .set_exact_argument_count(0)
            .set_invariant_type(SqmType::Timestamp)
            .register_as("current_time");
        if let Ok(builder) = registry.pattern_descriptor_builder("locate", "instr(?2, ?1)") {
            builder.set_invariant_type(SqmType::Integer).register();
        }
        registry.register_alternate_key("nvl", "coalesce");
    }

    fn timestampadd_pattern(
        &self,
        unit: TemporalUnit,
        _timestamp: bool,
    ) -> Result<String, IllegalUnitConversion> {
        Ok(match unit {
            TemporalUnit::Year | TemporalUnit::Quarter | TemporalUnit::Month => format!(
                "add_months(?3, (?2){})",
                convert_unit(unit, TemporalUnit::Month)?
            ),
            TemporalUnit::Week => format!(
                "(?3 + numtodsinterval((?2){}, 'day'))",
                convert_unit(unit, TemporalUnit::Day)?
            ),
            TemporalUnit::Nanosecond => format!(
                "(?3 + numtodsinterval((?2){}, 'second'))",
                convert_unit(unit, TemporalUnit::Second)?
            ),
            _ => "(?3 + numtodsinterval(?2, '?1'))".to_string(),
        })
    }

    fn timestampdiff_pattern(
        &self,
        unit: TemporalUnit,
        _from_timestamp: bool,
        _to_timestamp: bool,
    ) -> Result<String, IllegalUnitConversion> {
        Ok(match unit {
            TemporalUnit::Year | TemporalUnit::Quarter | TemporalUnit::Month => format!(
                "trunc(months_between(?3, ?2){})",
                convert_unit(TemporalUnit::Month, unit)?
            ),
            // date arithmetic yields days
            _ => format!(
                "trunc((cast(?3 as date) - cast(?2 as date)){})",
                convert_unit(TemporalUnit::Day, unit)?
            ),
        })
    }

    fn extract_pattern(&self, unit: TemporalUnit) -> Option<String> {
        let pattern = match unit {
            TemporalUnit::DayOfWeek => "to_number(to_char(?2, 'D'))",
            TemporalUnit::DayOfYear => "to_number(to_char(?2, 'DDD'))",
            TemporalUnit::DayOfMonth => "extract(day from ?2)",
            TemporalUnit::WeekOfYear | TemporalUnit::Week => "to_number(to_char(?2, 'IW'))",
            _ => "extract(?1 from ?2)",
        };
        Some(pattern.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::types::Size;

    #[test]
    fn test_calendar_units_use_add_months() {
        assert_eq!(
            Oracle.timestampadd_pattern(TemporalUnit::Year, true).unwrap(),
            "add_months(?3, (?2)*12)"
        );
        assert_eq!(
            Oracle
                .timestampdiff_pattern(TemporalUnit::Quarter, true, true)
                .unwrap(),
            "trunc(months_between(?3, ?2)/3)"
        );
    }

    #[test]
    fn test_number_types() {
        assert_eq!(
            Oracle.type_name(SqlTypeCode::BigInt, Size::default()).unwrap(),
            "number(19,0)"
        );
        assert_eq!(
            Oracle.type_name(SqlTypeCode::Varchar, Size::length(50)).unwrap(),
            "varchar2(50 char)"
        );
    }
}
