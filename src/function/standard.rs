//! Functions registered for every dialect before dialect overrides apply.

use super::descriptor::{Emulation, FunctionDescriptor, FunctionKind, FunctionRendering};
use super::return_type::{sum_type, ReturnTypeResolver};
use super::validator::{ArgumentsValidator, ParameterType};
use super::FunctionRegistry;
use crate::sqm::types::SqmType;

pub fn register_standard_functions(registry: &mut FunctionRegistry) {
    aggregates(registry);
    strings(registry);
    numerics(registry);
    null_handling(registry);
    current_date_time(registry);
    emulations(registry);
}

fn aggregates(registry: &mut FunctionRegistry) {
    registry
        .named_descriptor_builder("count")
        .set_exact_argument_count(1)
        .set_invariant_type(SqmType::Long)
        .set_aggregate()
        .register();
    registry
        .named_descriptor_builder("sum")
        .set_exact_argument_count(1)
        .set_return_type_resolver(ReturnTypeResolver::custom(sum_type))
        .set_aggregate()
        .register();
    registry
        .named_descriptor_builder("avg")
        .set_arguments_validator(ArgumentsValidator::Types(vec![ParameterType::Numeric]))
        .set_invariant_type(SqmType::Double)
        .set_aggregate()
        .register();
    for name in ["min", "max"] {
        registry
            .named_descriptor_builder(name)
            .set_exact_argument_count(1)
            .set_aggregate()
            .register();
    }
}

fn strings(registry: &mut FunctionRegistry) {
    for name in ["upper", "lower", "trim"] {
        registry
            .named_descriptor_builder(name)
            .set_arguments_validator(ArgumentsValidator::Types(vec![ParameterType::String]))
            .set_invariant_type(SqmType::String)
            .register();
    }
    registry
        .named_descriptor_builder("length")
        .set_arguments_validator(ArgumentsValidator::Types(vec![ParameterType::String]))
        .set_invariant_type(SqmType::Integer)
        .register();
    registry
        .named_descriptor_builder("concat")
        .set_arguments_validator(ArgumentsValidator::Min(1))
        .set_invariant_type(SqmType::String)
        .register();
    registry
        .named_descriptor_builder("substring")
        .set_argument_count_between(2, 3)
        .set_invariant_type(SqmType::String)
        .register();
    registry
        .named_descriptor_builder("locate")
        .set_argument_count_between(2, 3)
        .set_invariant_type(SqmType::Integer)
        .register();
    registry
        .named_descriptor_builder("replace")
        .set_exact_argument_count(3)
        .set_invariant_type(SqmType::String)
        .register();
    for name in ["left", "right"] {
        registry
            .named_descriptor_builder(name)
            .set_exact_argument_count(2)
            .set_invariant_type(SqmType::String)
            .register();
    }
}

fn numerics(registry: &mut FunctionRegistry) {
    for name in ["abs", "floor", "ceiling"] {
        registry
            .named_descriptor_builder(name)
            .set_arguments_validator(ArgumentsValidator::Types(vec![ParameterType::Numeric]))
            .register();
    }
    for name in ["sqrt", "exp", "ln"] {
        registry
            .named_descriptor_builder(name)
            .set_arguments_validator(ArgumentsValidator::Types(vec![ParameterType::Numeric]))
            .set_invariant_type(SqmType::Double)
            .register();
    }
    registry
        .named_descriptor_builder("power")
        .set_arguments_validator(ArgumentsValidator::Types(vec![
            ParameterType::Numeric,
            ParameterType::Numeric,
        ]))
        .set_invariant_type(SqmType::Double)
        .register();
    registry
        .named_descriptor_builder("mod")
        .set_arguments_validator(ArgumentsValidator::Types(vec![
            ParameterType::Numeric,
            ParameterType::Numeric,
        ]))
        .register();
    registry
        .named_descriptor_builder("round")
        .set_argument_count_between(1, 2)
        .register();
}

fn null_handling(registry: &mut FunctionRegistry) {
    registry
        .named_descriptor_builder("coalesce")
        .set_arguments_validator(ArgumentsValidator::Min(1))
        .register();
    registry
        .named_descriptor_builder("nullif")
        .set_exact_argument_count(2)
        .register();
}

fn current_date_time(registry: &mut FunctionRegistry) {
    for (name, ty) in [
        ("current_date", SqmType::Date),
        ("current_time", SqmType::Time),
        ("current_timestamp", SqmType::Timestamp),
    ] {
        registry
            .named_descriptor_builder(name)
            .set_exact_argument_count(0)
            .set_invariant_type(ty)
            .register();
    }
}

fn emulations(registry: &mut FunctionRegistry) {
    let emulated = |name: &str,
                    emulation: Emulation,
                    arguments: ArgumentsValidator,
                    return_type: ReturnTypeResolver| FunctionDescriptor {
        name: name.to_string(),
        kind: FunctionKind::Normal,
        arguments,
        return_type,
        rendering: FunctionRendering::Emulated(emulation),
    };
    registry.register(
        "timestampadd",
        emulated(
            "timestampadd",
            Emulation::TimestampAdd,
            ArgumentsValidator::Exactly(3),
            ReturnTypeResolver::UseArgument(3),
        ),
    );
    registry.register(
        "timestampdiff",
        emulated(
            "timestampdiff",
            Emulation::TimestampDiff,
            ArgumentsValidator::Exactly(3),
            ReturnTypeResolver::Invariant(SqmType::Long),
        ),
    );
    registry.register(
        "extract",
        emulated(
            "extract",
            Emulation::Extract,
            ArgumentsValidator::Exactly(2),
            ReturnTypeResolver::Invariant(SqmType::Integer),
        ),
    );
    registry.register(
        "cast",
        emulated(
            "cast",
            Emulation::Cast,
            ArgumentsValidator::Exactly(2),
            ReturnTypeResolver::UseArgument(2),
        ),
    );
}
