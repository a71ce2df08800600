//! ANSI SQL dialect - base reference implementation.
//!
//! This provides the ANSI SQL standard behavior as a reference.
//! Most dialects derive from ANSI with specific overrides; the trait
//! defaults already follow SQL:2008, so this dialect only supplies the
//! required pieces.

use once_cell::sync::Lazy;

use super::helpers;
use super::SqlDialect;
use crate::sql::types::TypeNames;

static TYPE_NAMES: Lazy<TypeNames> = Lazy::new(TypeNames::standard);

/// ANSI SQL dialect (reference implementation).
#[derive(Debug, Clone, Copy)]
pub struct Ansi;

impl SqlDialect for Ansi {
    fn name(&self) -> &'static str {
        "ansi"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_double(ident)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        helpers::format_bool_literal(b)
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
}
