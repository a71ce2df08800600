//! H2 dialect.
//!
//! H2 is close to ANSI. It supports LIMIT/OFFSET, `dateadd`/`datediff`
//! for every duration unit including quarter, week and nanosecond, and
//! extract fields such as `day_of_week` under their own names.

use once_cell::sync::Lazy;

use super::helpers;
use super::{PageTokens, SqlDialect};
use crate::sql::token::TokenStream;
use crate::sql::types::{SqlTypeCode, TypeNames};
use crate::temporal::{IllegalUnitConversion, TemporalUnit};

static TYPE_NAMES: Lazy<TypeNames> = Lazy::new(|| {
    let mut names = TypeNames::standard();
    names
        .put(SqlTypeCode::LongVarchar, "character varying")
        .put(SqlTypeCode::LongVarbinary, "binary varying");
    names
});

/// H2 dialect.
#[derive(Debug, Clone, Copy)]
pub struct H2;

impl SqlDialect for H2 {
    fn name(&self) -> &'static str {
        "h2"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_double(ident)
    }

    fn is_reserved_keyword(&self, ident: &str) -> bool {
        helpers::is_ansi_reserved(ident)
            || matches!(
                ident.to_ascii_lowercase().as_str(),
                "limit" | "minus" | "qualify" | "rownum" | "top" | "year" | "month" | "day"
                    | "hour" | "minute" | "second" | "value"
            )
    }

    fn format_bool(&self, b: bool) -> &'static str {
        helpers::format_bool_literal(b)
    }

    fn emit_pagination(&self, page: &PageTokens) -> TokenStream {
        if page.with_ties || page.percent {
            helpers::emit_offset_fetch_standard(page)
        } else {
            helpers::emit_limit_offset_standard(page, None)
        }
    }

    fn supports_fetch_with_ties(&self) -> bool {
        true
    }

    fn supports_fetch_percent(&self) -> bool {
        true
    }

    fn type_names(&self) -> &'static TypeNames {
        &TYPE_NAMES
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
        _unit: TemporalUnit,
        _from_timestamp: bool,
        _to_timestamp: bool,
    ) -> Result<String, IllegalUnitConversion> {
        Ok("datediff(?1, ?2, ?3)".to_string())
    }

    fn extract_pattern(&self, unit: TemporalUnit) -> Option<String> {
        let pattern = match unit {
            TemporalUnit::DayOfMonth => "extract(day from ?2)",
            TemporalUnit::WeekOfYear => "extract(iso_week from ?2)",
            TemporalUnit::Offset => "extract(timezone_hour from ?2)",
            _ => "extract(?1 from ?2)",
        };
        Some(pattern.to_string())
    }
}
