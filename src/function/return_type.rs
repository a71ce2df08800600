//! Return-type resolution for function descriptors.

use std::fmt;
use std::sync::Arc;

use crate::sqm::types::SqmType;

pub type ResolverFn = Arc<dyn Fn(&[SqmType]) -> SqmType + Send + Sync>;

/// Computes the type of a function invocation from its argument types.
#[derive(Clone, Default)]
pub enum ReturnTypeResolver {
    Invariant(SqmType),
    /// The first argument type that is known.
    #[default]
    UseFirstNonNull,
    /// The type of the argument at a 1-based position, matching pattern slots.
    UseArgument(usize),
    Custom(ResolverFn),
}

impl ReturnTypeResolver {
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&[SqmType]) -> SqmType + Send + Sync + 'static,
    {
        ReturnTypeResolver::Custom(Arc::new(f))
    }

    pub fn resolve(&self, args: &[SqmType]) -> SqmType {
        match self {
            ReturnTypeResolver::Invariant(ty) => ty.clone(),
            ReturnTypeResolver::UseFirstNonNull => args
                .iter()
                .find(|ty| !ty.is_unknown())
                .cloned()
                .unwrap_or(SqmType::Unknown),
            ReturnTypeResolver::UseArgument(position) => position
                .checked_sub(1)
                .and_then(|i| args.get(i))
                .cloned()
                .unwrap_or(SqmType::Unknown),
            ReturnTypeResolver::Custom(f) => f(args),
        }
    }
}

impl fmt::Debug for ReturnTypeResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReturnTypeResolver::Invariant(ty) => write!(f, "Invariant({ty})"),
            ReturnTypeResolver::UseFirstNonNull => write!(f, "UseFirstNonNull"),
            ReturnTypeResolver::UseArgument(i) => write!(f, "UseArgument({i})"),
            ReturnTypeResolver::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

/// `sum` widens integral arguments to `Long` and floating ones to `Double`.
pub fn sum_type(args: &[SqmType]) -> SqmType {
    match args.first() {
        Some(SqmType::Integer | SqmType::Long) => SqmType::Long,
        Some(SqmType::Float | SqmType::Double) => SqmType::Double,
        Some(SqmType::BigInteger) => SqmType::BigInteger,
        Some(SqmType::BigDecimal) => SqmType::BigDecimal,
        _ => SqmType::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_non_null() {
        let r = ReturnTypeResolver::UseFirstNonNull;
        assert_eq!(
            r.resolve(&[SqmType::Unknown, SqmType::String, SqmType::Long]),
            SqmType::String
        );
        assert_eq!(r.resolve(&[]), SqmType::Unknown);
    }

    #[test]
    fn test_use_argument_is_one_based() {
        let r = ReturnTypeResolver::UseArgument(3);
        assert_eq!(
            r.resolve(&[SqmType::Unknown, SqmType::Integer, SqmType::Timestamp]),
            SqmType::Timestamp
        );
        assert_eq!(ReturnTypeResolver::UseArgument(0).resolve(&[SqmType::Long]), SqmType::Unknown);
    }

    #[test]
    fn test_sum_type() {
        assert_eq!(sum_type(&[SqmType::Integer]), SqmType::Long);
        assert_eq!(sum_type(&[SqmType::Float]), SqmType::Double);
        assert_eq!(sum_type(&[SqmType::BigDecimal]), SqmType::BigDecimal);
    }
}
