//! DB2 dialect.
//!
//! DB2 uses labeled durations (`ts + 3 days`) for addition and the
//! `*_between` functions for differences. Binary columns are character
//! columns `for bit data`.

use once_cell::sync::Lazy;

use super::helpers;
use super::SqlDialect;
use crate::function::FunctionRegistry;
use crate::sql::types::{SqlTypeCode, TypeNames};
use crate::temporal::{convert_unit, IllegalUnitConversion, TemporalUnit};

static TYPE_NAMES: Lazy<TypeNames> = Lazy::new(|| {
    let mut names = TypeNames::standard();
    names
        .put(SqlTypeCode::Bit, "smallint")
        .put(SqlTypeCode::TinyInt, "smallint")
        .put(SqlTypeCode::Double, "double")
        .put(SqlTypeCode::Float, "float")
        .put(SqlTypeCode::Numeric, "decimal($p,$s)")
        .put(SqlTypeCode::LongVarchar, "long varchar")
        .put(SqlTypeCode::Binary, "char($l) for bit data")
        .put(SqlTypeCode::Varbinary, "varchar($l) for bit data")
        .put(SqlTypeCode::LongVarbinary, "long varchar for bit data");
    names
});

/// DB2 dialect.
#[derive(Debug, Clone, Copy)]
pub struct Db2;

impl SqlDialect for Db2 {
    fn name(&self) -> &'static str {
        "db2"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_double(ident)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        helpers::format_bool_literal(b)
    }

    fn type_names(&self) -> &'static TypeNames {
        &TYPE_NAMES
    }

    fn contribute_functions(&self, registry: &mut FunctionRegistry) {
        registry.register_alternate_key("value", "coalesce");
    }

    fn timestampadd_pattern(
        &self,
        unit: TemporalUnit,
        _timestamp: bool,
    ) -> Result<String, IllegalUnitConversion> {
        Ok(match unit {
            TemporalUnit::Nanosecond => "(?3 + ((?2)/1e3) microseconds)".to_string(),
            TemporalUnit::Week => format!(
                "(?3 + ((?2){}) days)",
                convert_unit(unit, TemporalUnit::Day)?
            ),
            TemporalUnit::Quarter => format!(
                "(?3 + ((?2){}) months)",
                convert_unit(unit, TemporalUnit::Month)?
            ),
            _ => format!("(?3 + (?2) {}s)", unit.name()),
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
                "trunc(months_between(?3, ?2){})",
                convert_unit(TemporalUnit::Month, unit)?
            ),
            TemporalUnit::Day | TemporalUnit::Week if !from_timestamp && !to_timestamp => format!(
                "(days_between(?3, ?2){})",
                convert_unit(TemporalUnit::Day, unit)?
            ),
            _ => format!(
                "(seconds_between(?3, ?2){})",
                convert_unit(TemporalUnit::Second, unit)?
            ),
        })
    }

    fn extract_pattern(&self, unit: TemporalUnit) -> Option<String> {
        let pattern = match unit {
            TemporalUnit::DayOfWeek => "dayofweek(?2)",
            TemporalUnit::DayOfYear => "dayofyear(?2)",
            TemporalUnit::DayOfMonth => "day(?2)",
            TemporalUnit::WeekOfYear | TemporalUnit::Week => "week(?2)",
            _ => "extract(?1 from ?2)",
        };
        Some(pattern.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labeled_durations() {
        assert_eq!(
            Db2.timestampadd_pattern(TemporalUnit::Day, true).unwrap(),
            "(?3 + (?2) days)"
        );
        assert_eq!(
            Db2.timestampadd_pattern(TemporalUnit::Week, true).unwrap(),
            "(?3 + ((?2)*7) days)"
        );
    }

    #[test]
    fn test_diff_in_minutes() {
        assert_eq!(
            Db2.timestampdiff_pattern(TemporalUnit::Minute, true, true)
                .unwrap(),
            "(seconds_between(?3, ?2)/60)"
        );
    }
}
