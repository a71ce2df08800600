//! Node identity and the shared node builder.
//!
//! A [`NodeBuilder`] hands out [`NodeId`]s and gives every tree access to
//! the domain model, the function registry and the creation options. It is
//! cheap to clone and can be shared across threads; ids are allocated from
//! an atomic counter.
//!
//! The builder is also the expression and predicate factory of the query
//! builder API:
//!
//! ```ignore
//! let nb = engine.node_builder();
//! let mut query = SelectStatement::criteria(&nb, ResultType::Object);
//! let p = query.from_entity("Person")?;
//! let name = query.get(p, "name")?;
//! query.select(name.clone())?;
//! query.where_(nb.equal(name, nb.literal("Ada")));
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use serde::Serialize;

use super::expr::{
    ArithmeticOperator, ComparisonOperator, ParameterKind, SqmCase, SqmCaseBranches, SqmExpr,
    SqmFunction, SqmLiteral, SqmParameter, SqmPath, SqmPredicate, SqmSubquery,
};
use super::from::FromKind;
use super::select::{QueryPart, SelectStatement};
use super::types::{CastTarget, SqmType};
use crate::domain::{Cardinality, DomainModel};
use crate::function::{Emulation, FunctionRegistry, FunctionRendering};
use crate::semantic::{SemanticError, SemanticResult};
use crate::temporal::TemporalUnit;

/// Identity of an SQM node (statement, subquery, from-element, parameter).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(u32);

impl NodeId {
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Options fixed when trees are created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, serde::Deserialize)]
pub struct CreationOptions {
    /// Reject constructs the JPA specification does not allow.
    pub jpa_compliance: bool,
}

struct BuilderInner {
    domain: Arc<dyn DomainModel>,
    functions: Arc<FunctionRegistry>,
    options: CreationOptions,
    next_id: AtomicU32,
}

#[derive(Clone)]
pub struct NodeBuilder {
    inner: Arc<BuilderInner>,
}

impl fmt::Debug for NodeBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeBuilder")
            .field("options", &self.inner.options)
            .field("next_id", &self.inner.next_id.load(Ordering::Relaxed))
            .finish()
    }
}

impl NodeBuilder {
    pub fn new(
        domain: Arc<dyn DomainModel>,
        functions: Arc<FunctionRegistry>,
        options: CreationOptions,
    ) -> Self {
        Self {
            inner: Arc::new(BuilderInner {
                domain,
                functions,
                options,
                next_id: AtomicU32::new(1),
            }),
        }
    }

    pub fn next_id(&self) -> NodeId {
        NodeId(self.inner.next_id.fetch_add(1, Ordering::Relaxed))
    }

    pub fn domain(&self) -> &dyn DomainModel {
        self.inner.domain.as_ref()
    }

    pub fn functions(&self) -> &FunctionRegistry {
        &self.inner.functions
    }

    pub fn options(&self) -> CreationOptions {
        self.inner.options
    }

    pub fn jpa_compliance(&self) -> bool {
        self.inner.options.jpa_compliance
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    pub fn literal(&self, value: impl Into<SqmLiteral>) -> SqmExpr {
        SqmExpr::Literal(value.into())
    }

    pub fn null_literal(&self) -> SqmExpr {
        SqmExpr::Literal(SqmLiteral::Null)
    }

    /// A new named parameter. Reuse the returned expression for further
    /// occurrences of the same parameter.
    pub fn parameter(&self, name: &str, ty: SqmType) -> SqmExpr {
        SqmExpr::Parameter(SqmParameter {
            id: self.next_id(),
            kind: ParameterKind::Named(name.to_string()),
            ty,
        })
    }

    pub fn positional_parameter(&self, position: u32, ty: SqmType) -> SqmExpr {
        SqmExpr::Parameter(SqmParameter {
            id: self.next_id(),
            kind: ParameterKind::Positional(position),
            ty,
        })
    }

    /// The from-element `source` itself.
    pub fn entity_path(&self, source: NodeId, kind: &FromKind) -> SqmPath {
        let (entity, ty) = match kind {
            FromKind::Entity(name) => (Some(name.clone()), SqmType::Entity(name.clone())),
            FromKind::Derived(_) => (None, SqmType::Unknown),
        };
        SqmPath {
            source,
            entity,
            attribute: None,
            ty,
            nullable: false,
            collection: false,
        }
    }

    /// An attribute of the from-element `source`. `display` names the path
    /// in error messages.
    pub fn attribute_path(
        &self,
        source: NodeId,
        kind: &FromKind,
        attribute: &str,
        display: &str,
    ) -> SemanticResult<SqmPath> {
        match kind {
            FromKind::Entity(name) => {
                let entity = self
                    .domain()
                    .entity(name)
                    .ok_or_else(|| SemanticError::UnknownEntity(name.clone()))?;
                let resolved = entity
                    .attribute(attribute)
                    .ok_or_else(|| SemanticError::path_resolution(display, attribute))?;
                Ok(SqmPath {
                    source,
                    entity: Some(name.clone()),
                    attribute: Some(attribute.to_string()),
                    ty: resolved.ty(),
                    nullable: resolved.nullable(),
                    collection: resolved.cardinality() == Cardinality::Collection,
                })
            }
            FromKind::Derived(columns) => {
                let column = columns
                    .iter()
                    .find(|column| column.name.eq_ignore_ascii_case(attribute))
                    .ok_or_else(|| SemanticError::path_resolution(display, attribute))?;
                Ok(SqmPath {
                    source,
                    entity: None,
                    attribute: Some(column.name.clone()),
                    ty: column.ty.clone(),
                    nullable: true,
                    collection: false,
                })
            }
        }
    }

    pub fn unit(&self, unit: TemporalUnit) -> SqmExpr {
        SqmExpr::Unit(unit)
    }

    /// Invoke a registered function, validating its arguments.
    pub fn function(&self, name: &str, arguments: Vec<SqmExpr>) -> SemanticResult<SqmExpr> {
        self.function_call(name, arguments, false)
    }

    pub fn function_distinct(
        &self,
        name: &str,
        arguments: Vec<SqmExpr>,
    ) -> SemanticResult<SqmExpr> {
        self.function_call(name, arguments, true)
    }

    fn function_call(
        &self,
        name: &str,
        arguments: Vec<SqmExpr>,
        distinct: bool,
    ) -> SemanticResult<SqmExpr> {
        let descriptor = self
            .functions()
            .find(name)
            .ok_or_else(|| SemanticError::UnknownFunction(name.to_string()))?;

        if let FunctionRendering::Emulated(emulation) = &descriptor.rendering {
            check_emulated_arguments(name, *emulation, &arguments)?;
        }

        let types: Vec<SqmType> = arguments.iter().map(SqmExpr::ty).collect();
        descriptor
            .validate(&types)
            .map_err(|message| SemanticError::function_argument(name, message))?;
        let ty = descriptor.resolve_type(&types);

        Ok(SqmExpr::Function(SqmFunction {
            name: name.to_ascii_lowercase(),
            descriptor,
            arguments,
            distinct,
            ty,
        }))
    }

    pub fn count_star(&self) -> SemanticResult<SqmExpr> {
        self.function("count", vec![SqmExpr::Star])
    }

    pub fn count(&self, expr: SqmExpr) -> SemanticResult<SqmExpr> {
        self.function("count", vec![expr])
    }

    pub fn count_distinct(&self, expr: SqmExpr) -> SemanticResult<SqmExpr> {
        self.function_distinct("count", vec![expr])
    }

    pub fn cast(&self, expr: SqmExpr, target: CastTarget) -> SemanticResult<SqmExpr> {
        self.function("cast", vec![expr, SqmExpr::CastTarget(target)])
    }

    pub fn timestampadd(
        &self,
        unit: TemporalUnit,
        magnitude: SqmExpr,
        base: SqmExpr,
    ) -> SemanticResult<SqmExpr> {
        self.function("timestampadd", vec![SqmExpr::Unit(unit), magnitude, base])
    }

    pub fn timestampdiff(
        &self,
        unit: TemporalUnit,
        from: SqmExpr,
        to: SqmExpr,
    ) -> SemanticResult<SqmExpr> {
        self.function("timestampdiff", vec![SqmExpr::Unit(unit), from, to])
    }

    pub fn extract(&self, unit: TemporalUnit, source: SqmExpr) -> SemanticResult<SqmExpr> {
        self.function("extract", vec![SqmExpr::Unit(unit), source])
    }

    pub fn arithmetic(
        &self,
        op: ArithmeticOperator,
        mut left: SqmExpr,
        mut right: SqmExpr,
    ) -> SqmExpr {
        infer_pair(&mut left, &mut right);
        let ty = left.ty().promote(&right.ty());
        SqmExpr::Arithmetic {
            op,
            left: Box::new(left),
            right: Box::new(right),
            ty,
        }
    }

    pub fn concat(&self, mut left: SqmExpr, mut right: SqmExpr) -> SqmExpr {
        left.infer_parameter_type(&SqmType::String);
        right.infer_parameter_type(&SqmType::String);
        SqmExpr::Concat {
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn negate(&self, expr: SqmExpr) -> SqmExpr {
        SqmExpr::Negate(Box::new(expr))
    }

    /// `case when .. then .. else .. end`, typed by the first typed branch.
    pub fn searched_case(
        &self,
        whens: Vec<(SqmPredicate, SqmExpr)>,
        otherwise: Option<SqmExpr>,
    ) -> SqmExpr {
        let ty = case_type(whens.iter().map(|(_, e)| e), otherwise.as_ref());
        SqmExpr::Case(SqmCase {
            branches: SqmCaseBranches::Searched(whens),
            otherwise: otherwise.map(Box::new),
            ty,
        })
    }

    pub fn simple_case(
        &self,
        operand: SqmExpr,
        whens: Vec<(SqmExpr, SqmExpr)>,
        otherwise: Option<SqmExpr>,
    ) -> SqmExpr {
        let ty = case_type(whens.iter().map(|(_, e)| e), otherwise.as_ref());
        SqmExpr::Case(SqmCase {
            branches: SqmCaseBranches::Simple {
                operand: Box::new(operand),
                whens,
            },
            otherwise: otherwise.map(Box::new),
            ty,
        })
    }

    /// Wrap a query part as a subquery typed by its single selection.
    pub fn subquery_of(&self, query: QueryPart) -> SqmSubquery {
        let ty = query.single_selection_type().unwrap_or(SqmType::Unknown);
        SqmSubquery {
            id: self.next_id(),
            query,
            ty,
        }
    }

    pub fn subquery(&self, statement: SelectStatement) -> SqmSubquery {
        self.subquery_of(statement.query_part)
    }

    // ========================================================================
    // Predicates
    // ========================================================================

    pub fn compare(
        &self,
        mut left: SqmExpr,
        op: ComparisonOperator,
        mut right: SqmExpr,
    ) -> SqmPredicate {
        infer_pair(&mut left, &mut right);
        SqmPredicate::Comparison { left, op, right }
    }

    pub fn equal(&self, left: SqmExpr, right: SqmExpr) -> SqmPredicate {
        self.compare(left, ComparisonOperator::Equal, right)
    }

    pub fn not_equal(&self, left: SqmExpr, right: SqmExpr) -> SqmPredicate {
        self.compare(left, ComparisonOperator::NotEqual, right)
    }

    pub fn less_than(&self, left: SqmExpr, right: SqmExpr) -> SqmPredicate {
        self.compare(left, ComparisonOperator::LessThan, right)
    }

    pub fn greater_than(&self, left: SqmExpr, right: SqmExpr) -> SqmPredicate {
        self.compare(left, ComparisonOperator::GreaterThan, right)
    }

    pub fn is_null(&self, expr: SqmExpr) -> SqmPredicate {
        SqmPredicate::IsNull {
            expr,
            negated: false,
        }
    }

    pub fn is_not_null(&self, expr: SqmExpr) -> SqmPredicate {
        SqmPredicate::IsNull {
            expr,
            negated: true,
        }
    }

    pub fn between(&self, expr: SqmExpr, mut low: SqmExpr, mut high: SqmExpr) -> SqmPredicate {
        let ty = expr.ty();
        low.infer_parameter_type(&ty);
        high.infer_parameter_type(&ty);
        SqmPredicate::Between {
            expr,
            low,
            high,
            negated: false,
        }
    }

    pub fn like(&self, expr: SqmExpr, mut pattern: SqmExpr) -> SqmPredicate {
        pattern.infer_parameter_type(&SqmType::String);
        SqmPredicate::Like {
            expr,
            pattern,
            escape: None,
            negated: false,
        }
    }

    pub fn in_list(&self, expr: SqmExpr, mut values: Vec<SqmExpr>) -> SqmPredicate {
        let ty = expr.ty();
        for value in &mut values {
            value.infer_parameter_type(&ty);
        }
        SqmPredicate::InList {
            expr,
            values,
            negated: false,
        }
    }

    pub fn exists(&self, subquery: SqmSubquery) -> SqmPredicate {
        SqmPredicate::Exists {
            subquery: Box::new(subquery),
            negated: false,
        }
    }

    /// `collection is empty`; `collection` must be a to-many path.
    pub fn is_empty(&self, collection: SqmExpr) -> SemanticResult<SqmPredicate> {
        Ok(SqmPredicate::IsEmpty {
            collection: collection_path(collection, "is empty")?,
            negated: false,
        })
    }

    pub fn member_of(&self, mut expr: SqmExpr, collection: SqmExpr) -> SemanticResult<SqmPredicate> {
        let collection = collection_path(collection, "member of")?;
        expr.infer_parameter_type(&collection.ty);
        Ok(SqmPredicate::MemberOf {
            expr,
            collection,
            negated: false,
        })
    }

    /// Conjunction of `predicates`; `None` when empty.
    pub fn and(&self, predicates: Vec<SqmPredicate>) -> Option<SqmPredicate> {
        predicates.into_iter().reduce(SqmPredicate::and)
    }

    pub fn or(&self, predicates: Vec<SqmPredicate>) -> Option<SqmPredicate> {
        predicates.into_iter().reduce(SqmPredicate::or)
    }

    pub fn not(&self, predicate: SqmPredicate) -> SqmPredicate {
        predicate.not()
    }
}

/// Give an untyped parameter on one side the type of the other side.
pub(crate) fn infer_pair(left: &mut SqmExpr, right: &mut SqmExpr) {
    let (left_ty, right_ty) = (left.ty(), right.ty());
    left.infer_parameter_type(&right_ty);
    right.infer_parameter_type(&left_ty);
}

pub(crate) fn case_type<'a>(
    results: impl Iterator<Item = &'a SqmExpr>,
    otherwise: Option<&'a SqmExpr>,
) -> SqmType {
    results
        .chain(otherwise)
        .map(SqmExpr::ty)
        .find(|ty| !ty.is_unknown())
        .unwrap_or(SqmType::Unknown)
}

fn collection_path(expr: SqmExpr, operator: &str) -> SemanticResult<SqmPath> {
    match expr {
        SqmExpr::Path(path) if path.collection => Ok(path),
        other => Err(SemanticError::function_argument(
            operator,
            format!("expected a collection path, got {}", other.ty()),
        )),
    }
}

fn check_emulated_arguments(
    name: &str,
    emulation: Emulation,
    arguments: &[SqmExpr],
) -> SemanticResult<()> {
    match emulation {
        Emulation::TimestampAdd | Emulation::TimestampDiff => match arguments.first() {
            Some(SqmExpr::Unit(unit)) if unit.is_duration_unit() => Ok(()),
            Some(SqmExpr::Unit(unit)) => Err(SemanticError::function_argument(
                name,
                format!("'{unit}' is not a duration unit"),
            )),
            _ => Err(SemanticError::function_argument(
                name,
                "first argument must be a temporal unit",
            )),
        },
        Emulation::Extract => match arguments.first() {
            Some(SqmExpr::Unit(_)) => Ok(()),
            _ => Err(SemanticError::function_argument(
                name,
                "first argument must be a temporal unit",
            )),
        },
        Emulation::Cast => match arguments.get(1) {
            Some(SqmExpr::CastTarget(_)) => Ok(()),
            _ => Err(SemanticError::function_argument(
                name,
                "second argument must be a type",
            )),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::StaticDomainModel;

    fn builder() -> NodeBuilder {
        NodeBuilder::new(
            Arc::new(StaticDomainModel::new()),
            Arc::new(FunctionRegistry::standard()),
            CreationOptions::default(),
        )
    }

    #[test]
    fn test_ids_are_unique_across_clones() {
        let nb = builder();
        let other = nb.clone();
        let a = nb.next_id();
        let b = other.next_id();
        assert_ne!(a, b);
    }

    #[test]
    fn test_builder_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<NodeBuilder>();
    }

    #[test]
    fn test_unknown_function() {
        let nb = builder();
        assert_eq!(
            nb.function("no_such_function", vec![]),
            Err(SemanticError::UnknownFunction("no_such_function".into()))
        );
    }

    #[test]
    fn test_function_type_from_descriptor() {
        let nb = builder();
        let upper = nb.function("upper", vec![nb.literal("abc")]).unwrap();
        assert_eq!(upper.ty(), SqmType::String);
        let count = nb.count_star().unwrap();
        assert_eq!(count.ty(), SqmType::Long);
    }

    #[test]
    fn test_timestampadd_rejects_calendar_field() {
        let nb = builder();
        let err = nb
            .timestampadd(
                TemporalUnit::DayOfWeek,
                nb.literal(1),
                nb.literal(SqmLiteral::Date("2024-01-01".into())),
            )
            .unwrap_err();
        assert!(matches!(err, SemanticError::FunctionArgument { .. }));
    }

    #[test]
    fn test_comparison_types_parameter() {
        let nb = builder();
        let predicate = nb.equal(nb.literal("x"), nb.parameter("p", SqmType::Unknown));
        match predicate {
            SqmPredicate::Comparison { right, .. } => assert_eq!(right.ty(), SqmType::String),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_case_type_skips_null_branches() {
        let nb = builder();
        let case = nb.searched_case(
            vec![(
                nb.is_null(nb.literal(1)),
                nb.null_literal(),
            )],
            Some(nb.literal("fallback")),
        );
        assert_eq!(case.ty(), SqmType::String);
    }
}
