//! Argument validation for function descriptors.

use std::fmt;
use std::sync::Arc;

use crate::sqm::types::SqmType;

/// Custom validation over the argument types.
pub type ValidatorFn = Arc<dyn Fn(&[SqmType]) -> Result<(), String> + Send + Sync>;

/// Broad category an argument must belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterType {
    Any,
    Numeric,
    String,
    Temporal,
    Boolean,
}

impl ParameterType {
    fn accepts(self, ty: &SqmType) -> bool {
        // Untyped arguments (parameters, null) are checked at execution time.
        if ty.is_unknown() {
            return true;
        }
        match self {
            ParameterType::Any => true,
            ParameterType::Numeric => ty.is_numeric(),
            ParameterType::String => ty.is_textual(),
            ParameterType::Temporal => ty.is_temporal(),
            ParameterType::Boolean => matches!(ty, SqmType::Boolean),
        }
    }
}

impl fmt::Display for ParameterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParameterType::Any => "any",
            ParameterType::Numeric => "numeric",
            ParameterType::String => "string",
            ParameterType::Temporal => "temporal",
            ParameterType::Boolean => "boolean",
        };
        f.write_str(name)
    }
}

/// Checks the arguments of a function invocation.
#[derive(Clone, Default)]
pub enum ArgumentsValidator {
    #[default]
    Any,
    Exactly(usize),
    Between(usize, usize),
    Min(usize),
    /// One argument per listed category.
    Types(Vec<ParameterType>),
    Custom(ValidatorFn),
}

impl ArgumentsValidator {
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&[SqmType]) -> Result<(), String> + Send + Sync + 'static,
    {
        ArgumentsValidator::Custom(Arc::new(f))
    }

    /// Validate `args` for an invocation of `function`, returning a message on failure.
    pub fn validate(&self, function: &str, args: &[SqmType]) -> Result<(), String> {
        let count = args.len();
        match self {
            ArgumentsValidator::Any => Ok(()),
            ArgumentsValidator::Exactly(n) => {
                if count == *n {
                    Ok(())
                } else {
                    Err(format!(
                        "Function {function}() has {n} parameter(s), but {count} argument(s) given"
                    ))
                }
            }
            ArgumentsValidator::Between(min, max) => {
                if count >= *min && count <= *max {
                    Ok(())
                } else {
                    Err(format!(
                        "Function {function}() requires between {min} and {max} arguments, but {count} argument(s) given"
                    ))
                }
            }
            ArgumentsValidator::Min(min) => {
                if count >= *min {
                    Ok(())
                } else {
                    Err(format!(
                        "Function {function}() requires at least {min} argument(s), but {count} argument(s) given"
                    ))
                }
            }
            ArgumentsValidator::Types(types) => {
                if count != types.len() {
                    return Err(format!(
                        "Function {function}() has {} parameter(s), but {count} argument(s) given",
                        types.len()
                    ));
                }
                for (i, (expected, actual)) in types.iter().zip(args).enumerate() {
                    if !expected.accepts(actual) {
                        return Err(format!(
                            "Parameter {} of function {function}() requires a {expected} argument, but argument is of type {actual}",
                            i + 1
                        ));
                    }
                }
                Ok(())
            }
            ArgumentsValidator::Custom(f) => f(args),
        }
    }
}

impl fmt::Debug for ArgumentsValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgumentsValidator::Any => write!(f, "Any"),
            ArgumentsValidator::Exactly(n) => write!(f, "Exactly({n})"),
            ArgumentsValidator::Between(min, max) => write!(f, "Between({min}, {max})"),
            ArgumentsValidator::Min(n) => write!(f, "Min({n})"),
            ArgumentsValidator::Types(types) => f.debug_tuple("Types").field(types).finish(),
            ArgumentsValidator::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}
