//! MariaDB dialect.
//!
//! MariaDB renders like MySQL. It additionally accepts
//! `DROP CONSTRAINT IF EXISTS name`.

use super::mysql;
use super::helpers;
use super::{PageTokens, SqlDialect};
use crate::function::FunctionRegistry;
use crate::sql::token::TokenStream;
use crate::sql::types::{Size, SqlTypeCode, TypeNames};
use crate::temporal::{IllegalUnitConversion, TemporalUnit};

/// MariaDB dialect.
#[derive(Debug, Clone, Copy)]
pub struct MariaDb;

impl SqlDialect for MariaDb {
    fn name(&self) -> &'static str {
        "mariadb"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_backtick(ident)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        helpers::format_bool_numeric(b)
    }

    fn emit_pagination(&self, page: &PageTokens) -> TokenStream {
        mysql::MySql.emit_pagination(page)
    }

    fn supports_concat_operator(&self) -> bool {
        false
    }

    fn supports_full_outer_join(&self) -> bool {
        false
    }

    fn supports_nulls_ordering(&self) -> bool {
        false
    }

    fn type_names(&self) -> &'static TypeNames {
        &mysql::TYPE_NAMES
    }

    fn cast_type_name(&self, code: SqlTypeCode, size: Size) -> Option<String> {
        mysql::cast_type_name(code, size)
    }

    fn contribute_functions(&self, registry: &mut FunctionRegistry) {
        mysql::contribute_functions(registry)
    }

    fn timestampadd_pattern(
        &self,
        unit: TemporalUnit,
        _timestamp: bool,
    ) -> Result<String, IllegalUnitConversion> {
        Ok(mysql::timestampadd_pattern(unit))
    }

    fn timestampdiff_pattern(
        &self,
        unit: TemporalUnit,
        _from_timestamp: bool,
        _to_timestamp: bool,
    ) -> Result<String, IllegalUnitConversion> {
        Ok(mysql::timestampdiff_pattern(unit))
    }

    fn extract_pattern(&self, unit: TemporalUnit) -> Option<String> {
        Some(mysql::extract_pattern(unit))
    }

    fn supports_if_exists_before_constraint_name(&self) -> bool {
        true
    }
}
