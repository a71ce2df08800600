//! SQL type codes and per-dialect type-name registries.
//!
//! A dialect registers a template for each type code. Templates may contain
//! `$l` (length), `$p` (precision) and `$s` (scale), which are filled from
//! the requested [`Size`]:
//!
//! ```ignore
//! let mut names = TypeNames::new();
//! names.put(SqlTypeCode::Numeric, "numeric($p,$s)");
//! names.put_with_capacity(SqlTypeCode::Varchar, 4000, "varchar2($l char)");
//! names.put(SqlTypeCode::Varchar, "clob");
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::sqm::types::{CastTarget, SqmType};

/// Generic SQL type codes, modelled on JDBC's `java.sql.Types`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlTypeCode {
    Boolean,
    Bit,
    TinyInt,
    SmallInt,
    Integer,
    BigInt,
    Float,
    Real,
    Double,
    Numeric,
    Decimal,
    Char,
    Varchar,
    LongVarchar,
    Clob,
    Date,
    Time,
    Timestamp,
    TimestampWithTimeZone,
    Binary,
    Varbinary,
    LongVarbinary,
    Blob,
}

impl fmt::Display for SqlTypeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Requested column size. Missing parts take the defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Size {
    pub length: Option<u32>,
    pub precision: Option<u32>,
    pub scale: Option<u32>,
}

impl Size {
    pub const DEFAULT_LENGTH: u32 = 255;
    pub const DEFAULT_PRECISION: u32 = 19;
    pub const DEFAULT_SCALE: u32 = 2;

    pub fn length(length: u32) -> Self {
        Self {
            length: Some(length),
            ..Self::default()
        }
    }

    pub fn precision(precision: u32, scale: u32) -> Self {
        Self {
            precision: Some(precision),
            scale: Some(scale),
            ..Self::default()
        }
    }

    pub fn length_or_default(&self) -> u32 {
        self.length.unwrap_or(Self::DEFAULT_LENGTH)
    }

    pub fn precision_or_default(&self) -> u32 {
        self.precision.unwrap_or(Self::DEFAULT_PRECISION)
    }

    pub fn scale_or_default(&self) -> u32 {
        self.scale.unwrap_or(Self::DEFAULT_SCALE)
    }
}

/// Type code and size for a cast target.
pub fn cast_type_code(target: &CastTarget) -> Option<(SqlTypeCode, Size)> {
    let size = Size {
        length: target.length,
        precision: target.precision,
        scale: target.scale,
    };
    let code = match &target.ty {
        SqmType::Boolean => SqlTypeCode::Boolean,
        SqmType::Integer => SqlTypeCode::Integer,
        SqmType::Long => SqlTypeCode::BigInt,
        SqmType::BigInteger => {
            return Some((
                SqlTypeCode::Numeric,
                Size {
                    scale: Some(0),
                    ..size
                },
            ))
        }
        SqmType::Float => SqlTypeCode::Float,
        SqmType::Double => SqlTypeCode::Double,
        SqmType::BigDecimal => SqlTypeCode::Numeric,
        SqmType::String => SqlTypeCode::Varchar,
        SqmType::Character => {
            return Some((
                SqlTypeCode::Char,
                Size {
                    length: Some(target.length.unwrap_or(1)),
                    ..size
                },
            ))
        }
        SqmType::Date => SqlTypeCode::Date,
        SqmType::Time => SqlTypeCode::Time,
        SqmType::Timestamp => SqlTypeCode::Timestamp,
        SqmType::Binary => SqlTypeCode::Varbinary,
        SqmType::Entity(_) | SqmType::Unknown => return None,
    };
    Some((code, size))
}

/// Type-name templates keyed by type code, optionally bounded by capacity.
#[derive(Debug, Clone, Default)]
pub struct TypeNames {
    defaults: HashMap<SqlTypeCode, String>,
    weighted: HashMap<SqlTypeCode, BTreeMap<u32, String>>,
}

impl TypeNames {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names every dialect starts from before its own registrations.
    pub fn standard() -> Self {
        let mut names = Self::new();
        names.put(SqlTypeCode::Boolean, "boolean");
        names.put(SqlTypeCode::Bit, "bit");
        names.put(SqlTypeCode::TinyInt, "tinyint");
        names.put(SqlTypeCode::SmallInt, "smallint");
        names.put(SqlTypeCode::Integer, "integer");
        names.put(SqlTypeCode::BigInt, "bigint");
        names.put(SqlTypeCode::Float, "float($p)");
        names.put(SqlTypeCode::Real, "real");
        names.put(SqlTypeCode::Double, "double precision");
        names.put(SqlTypeCode::Numeric, "numeric($p,$s)");
        names.put(SqlTypeCode::Decimal, "decimal($p,$s)");
        names.put(SqlTypeCode::Char, "char($l)");
        names.put(SqlTypeCode::Varchar, "varchar($l)");
        names.put(SqlTypeCode::LongVarchar, "varchar($l)");
        names.put(SqlTypeCode::Clob, "clob");
        names.put(SqlTypeCode::Date, "date");
        names.put(SqlTypeCode::Time, "time");
        names.put(SqlTypeCode::Timestamp, "timestamp");
        names.put(SqlTypeCode::TimestampWithTimeZone, "timestamp with time zone");
        names.put(SqlTypeCode::Binary, "binary($l)");
        names.put(SqlTypeCode::Varbinary, "varbinary($l)");
        names.put(SqlTypeCode::LongVarbinary, "varbinary($l)");
        names.put(SqlTypeCode::Blob, "blob");
        names
    }

    /// Register the template used when no capacity-bounded entry fits.
    pub fn put(&mut self, code: SqlTypeCode, template: &str) -> &mut Self {
        self.defaults.insert(code, template.to_string());
        self
    }

    /// Register a template for sizes up to `capacity`.
    pub fn put_with_capacity(&mut self, code: SqlTypeCode, capacity: u32, template: &str) -> &mut Self {
        self.weighted
            .entry(code)
            .or_default()
            .insert(capacity, template.to_string());
        self
    }

    /// The type name for `code`, with size placeholders filled in.
    pub fn get(&self, code: SqlTypeCode, size: Size) -> Option<String> {
        let length = size.length_or_default();
        let template = self
            .weighted
            .get(&code)
            .and_then(|by_capacity| by_capacity.range(length..).next().map(|(_, t)| t))
            .or_else(|| self.defaults.get(&code))?;
        Some(fill(template, size))
    }
}

fn fill(template: &str, size: Size) -> String {
    template
        .replace("$l", &size.length_or_default().to_string())
        .replace("$p", &size.precision_or_default().to_string())
        .replace("$s", &size.scale_or_default().to_string())
}
