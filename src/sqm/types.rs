//! Expression types carried by SQM nodes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The type of an SQM expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SqmType {
    Boolean,
    Integer,
    Long,
    BigInteger,
    Float,
    Double,
    BigDecimal,
    String,
    Character,
    Date,
    Time,
    Timestamp,
    Binary,
    /// A reference to an entity of the named type.
    Entity(String),
    /// Not yet inferred (untyped parameters, `null`).
    Unknown,
}

impl SqmType {
    pub fn is_numeric(&self) -> bool {
        self.numeric_rank().is_some()
    }

    pub fn is_temporal(&self) -> bool {
        matches!(self, SqmType::Date | SqmType::Time | SqmType::Timestamp)
    }

    pub fn is_textual(&self) -> bool {
        matches!(self, SqmType::String | SqmType::Character)
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, SqmType::Unknown)
    }

    pub fn entity_name(&self) -> Option<&str> {
        match self {
            SqmType::Entity(name) => Some(name),
            _ => None,
        }
    }

    fn numeric_rank(&self) -> Option<u8> {
        match self {
            SqmType::Integer => Some(0),
            SqmType::Long => Some(1),
            SqmType::BigInteger => Some(2),
            SqmType::Float => Some(3),
            SqmType::Double => Some(4),
            SqmType::BigDecimal => Some(5),
            _ => None,
        }
    }

    /// Result type of an arithmetic operation over `self` and `other`.
    ///
    /// The wider numeric type wins; an unknown operand adopts the other
    /// operand's type.
    pub fn promote(&self, other: &SqmType) -> SqmType {
        match (self.numeric_rank(), other.numeric_rank()) {
            (Some(a), Some(b)) => {
                if a >= b {
                    self.clone()
                } else {
                    other.clone()
                }
            }
            _ if self.is_unknown() => other.clone(),
            _ => self.clone(),
        }
    }

    /// Name used in diagnostics and the tree printer.
    pub fn name(&self) -> String {
        match self {
            SqmType::Boolean => "Boolean".into(),
            SqmType::Integer => "Integer".into(),
            SqmType::Long => "Long".into(),
            SqmType::BigInteger => "BigInteger".into(),
            SqmType::Float => "Float".into(),
            SqmType::Double => "Double".into(),
            SqmType::BigDecimal => "BigDecimal".into(),
            SqmType::String => "String".into(),
            SqmType::Character => "Character".into(),
            SqmType::Date => "Date".into(),
            SqmType::Time => "Time".into(),
            SqmType::Timestamp => "Timestamp".into(),
            SqmType::Binary => "Binary".into(),
            SqmType::Entity(name) => name.clone(),
            SqmType::Unknown => "?".into(),
        }
    }
}

impl fmt::Display for SqmType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// A type name that cannot be used as a cast target.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown cast target type: {0}")]
pub struct UnknownCastType(pub String);

impl FromStr for SqmType {
    type Err = UnknownCastType;

    /// Parse a cast target name as written in a query (`String`, `Integer`, `LocalDate`, ...).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ty = match s.to_ascii_lowercase().as_str() {
            "boolean" => SqmType::Boolean,
            "integer" | "int" => SqmType::Integer,
            "long" => SqmType::Long,
            "biginteger" | "big_integer" => SqmType::BigInteger,
            "float" => SqmType::Float,
            "double" => SqmType::Double,
            "bigdecimal" | "big_decimal" => SqmType::BigDecimal,
            "string" => SqmType::String,
            "character" | "char" => SqmType::Character,
            "date" | "localdate" => SqmType::Date,
            "time" | "localtime" => SqmType::Time,
            "timestamp" | "localdatetime" | "instant" => SqmType::Timestamp,
            "binary" => SqmType::Binary,
            _ => return Err(UnknownCastType(s.to_string())),
        };
        Ok(ty)
    }
}

/// Target of a `cast(x as T)` expression, with optional size.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CastTarget {
    pub ty: SqmType,
    pub length: Option<u32>,
    pub precision: Option<u32>,
    pub scale: Option<u32>,
}

impl CastTarget {
    pub fn new(ty: SqmType) -> Self {
        Self {
            ty,
            length: None,
            precision: None,
            scale: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_promotion_picks_wider() {
        assert_eq!(SqmType::Integer.promote(&SqmType::Long), SqmType::Long);
        assert_eq!(SqmType::Double.promote(&SqmType::Long), SqmType::Double);
        assert_eq!(SqmType::BigDecimal.promote(&SqmType::Float), SqmType::BigDecimal);
    }

    #[test]
    fn test_promotion_with_unknown() {
        assert_eq!(SqmType::Unknown.promote(&SqmType::Integer), SqmType::Integer);
        assert_eq!(SqmType::Integer.promote(&SqmType::Unknown), SqmType::Integer);
    }

    #[test]
    fn test_parse_cast_type() {
        assert_eq!("String".parse::<SqmType>().unwrap(), SqmType::String);
        assert_eq!("LocalDate".parse::<SqmType>().unwrap(), SqmType::Date);
        assert_eq!("big_decimal".parse::<SqmType>().unwrap(), SqmType::BigDecimal);
        assert!("Person".parse::<SqmType>().is_err());
    }
}
