//! Function descriptors and their fluent builders.

use std::sync::Arc;

use super::pattern::{PatternError, PatternTemplate};
use super::return_type::ReturnTypeResolver;
use super::validator::ArgumentsValidator;
use super::FunctionRegistry;
use crate::sqm::types::SqmType;

/// Whether a function aggregates rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FunctionKind {
    #[default]
    Normal,
    Aggregate,
}

/// Forms whose SQL is produced by the dialect rather than a fixed template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Emulation {
    TimestampAdd,
    TimestampDiff,
    Extract,
    Cast,
}

/// How an invocation is written in SQL.
#[derive(Debug, Clone, PartialEq)]
pub enum FunctionRendering {
    /// `name(arg, ...)`, or a bare `name` when there are no arguments and
    /// `parens_when_no_args` is off.
    Named {
        name: String,
        parens_when_no_args: bool,
    },
    Pattern(PatternTemplate),
    Emulated(Emulation),
}

/// An immutable, registered function.
#[derive(Debug, Clone)]
pub struct FunctionDescriptor {
    pub name: String,
    pub kind: FunctionKind,
    pub arguments: ArgumentsValidator,
    pub return_type: ReturnTypeResolver,
    pub rendering: FunctionRendering,
}

impl FunctionDescriptor {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: FunctionKind::Normal,
            arguments: ArgumentsValidator::Any,
            return_type: ReturnTypeResolver::UseFirstNonNull,
            rendering: FunctionRendering::Named {
                name: name.to_string(),
                parens_when_no_args: true,
            },
        }
    }

    pub fn is_aggregate(&self) -> bool {
        self.kind == FunctionKind::Aggregate
    }

    pub fn validate(&self, args: &[SqmType]) -> Result<(), String> {
        self.arguments.validate(&self.name, args)
    }

    pub fn resolve_type(&self, args: &[SqmType]) -> SqmType {
        self.return_type.resolve(args)
    }
}

/// Builds a descriptor rendered as `name(args)`.
///
/// The return type defaults to the first non-null argument type and the
/// argument count is unchecked until set.
#[must_use = "builders have no effect until used"]
pub struct NamedDescriptorBuilder<'r> {
    registry: &'r mut FunctionRegistry,
    name: String,
    kind: FunctionKind,
    arguments: ArgumentsValidator,
    return_type: ReturnTypeResolver,
    parens_when_no_args: bool,
}

impl<'r> NamedDescriptorBuilder<'r> {
    pub(super) fn new(registry: &'r mut FunctionRegistry, name: &str) -> Self {
        Self {
            registry,
            name: name.to_string(),
            kind: FunctionKind::Normal,
            arguments: ArgumentsValidator::Any,
            return_type: ReturnTypeResolver::UseFirstNonNull,
            parens_when_no_args: false,
        }
    }

    pub fn set_arguments_validator(mut self, validator: ArgumentsValidator) -> Self {
        self.arguments = validator;
        self
    }

    pub fn set_exact_argument_count(self, count: usize) -> Self {
        self.set_arguments_validator(ArgumentsValidator::Exactly(count))
    }

    pub fn set_argument_count_between(self, min: usize, max: usize) -> Self {
        self.set_arguments_validator(ArgumentsValidator::Between(min, max))
    }

    pub fn set_return_type_resolver(mut self, resolver: ReturnTypeResolver) -> Self {
        self.return_type = resolver;
        self
    }

    pub fn set_invariant_type(self, ty: SqmType) -> Self {
        self.set_return_type_resolver(ReturnTypeResolver::Invariant(ty))
    }

    pub fn set_use_parentheses_when_no_args(mut self, parens: bool) -> Self {
        self.parens_when_no_args = parens;
        self
    }

    pub fn set_aggregate(mut self) -> Self {
        self.kind = FunctionKind::Aggregate;
        self
    }

    pub fn build(&self) -> FunctionDescriptor {
        FunctionDescriptor {
            name: self.name.clone(),
            kind: self.kind,
            arguments: self.arguments.clone(),
            return_type: self.return_type.clone(),
            rendering: FunctionRendering::Named {
                name: self.name.clone(),
                parens_when_no_args: self.parens_when_no_args,
            },
        }
    }

    /// Register under the function's own name.
    pub fn register(self) -> Arc<FunctionDescriptor> {
        let key = self.name.clone();
        self.register_as(&key)
    }

    /// Register under a different key, keeping the rendered name.
    pub fn register_as(self, key: &str) -> Arc<FunctionDescriptor> {
        let descriptor = self.build();
        self.registry.register(key, descriptor)
    }
}

/// Builds a descriptor rendered from a pattern template.
#[must_use = "builders have no effect until used"]
pub struct PatternDescriptorBuilder<'r> {
    registry: &'r mut FunctionRegistry,
    name: String,
    pattern: PatternTemplate,
    kind: FunctionKind,
    arguments: ArgumentsValidator,
    return_type: ReturnTypeResolver,
}

impl<'r> PatternDescriptorBuilder<'r> {
    pub(super) fn new(
        registry: &'r mut FunctionRegistry,
        name: &str,
        pattern: &str,
    ) -> Result<Self, PatternError> {
        let pattern = PatternTemplate::parse(pattern)?;
        let arguments = ArgumentsValidator::Exactly(pattern.arity());
        Ok(Self {
            registry,
            name: name.to_string(),
            pattern,
            kind: FunctionKind::Normal,
            arguments,
            return_type: ReturnTypeResolver::UseFirstNonNull,
        })
    }

    pub fn set_arguments_validator(mut self, validator: ArgumentsValidator) -> Self {
        self.arguments = validator;
        self
    }

    pub fn set_exact_argument_count(self, count: usize) -> Self {
        self.set_arguments_validator(ArgumentsValidator::Exactly(count))
    }

    pub fn set_argument_count_between(self, min: usize, max: usize) -> Self {
        self.set_arguments_validator(ArgumentsValidator::Between(min, max))
    }

    pub fn set_return_type_resolver(mut self, resolver: ReturnTypeResolver) -> Self {
        self.return_type = resolver;
        self
    }

    pub fn set_invariant_type(self, ty: SqmType) -> Self {
        self.set_return_type_resolver(ReturnTypeResolver::Invariant(ty))
    }

    pub fn set_aggregate(mut self) -> Self {
        self.kind = FunctionKind::Aggregate;
        self
    }

    pub fn build(&self) -> FunctionDescriptor {
        FunctionDescriptor {
            name: self.name.clone(),
            kind: self.kind,
            arguments: self.arguments.clone(),
            return_type: self.return_type.clone(),
            rendering: FunctionRendering::Pattern(self.pattern.clone()),
        }
    }

    pub fn register(self) -> Arc<FunctionDescriptor> {
        let key = self.name.clone();
        self.register_as(&key)
    }

    pub fn register_as(self, key: &str) -> Arc<FunctionDescriptor> {
        let descriptor = self.build();
        self.registry.register(key, descriptor)
    }
}
