//! SQM expressions and predicates.
//!
//! Every expression carries its inferred [`SqmType`]. Paths point at the
//! from-element they start from by [`NodeId`]; they do not own it.

use std::fmt;
use std::sync::Arc;

use super::node::NodeId;
use super::select::QueryPart;
use super::types::{CastTarget, SqmType};
use crate::function::FunctionDescriptor;
use crate::temporal::TemporalUnit;

// ============================================================================
// Leaves
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum SqmLiteral {
    Integer(i64),
    Long(i64),
    BigInteger(String),
    Float(f64),
    Double(f64),
    BigDecimal(String),
    String(String),
    Boolean(bool),
    Null,
    Date(String),
    Time(String),
    Timestamp(String),
}

impl SqmLiteral {
    pub fn ty(&self) -> SqmType {
        match self {
            SqmLiteral::Integer(_) => SqmType::Integer,
            SqmLiteral::Long(_) => SqmType::Long,
            SqmLiteral::BigInteger(_) => SqmType::BigInteger,
            SqmLiteral::Float(_) => SqmType::Float,
            SqmLiteral::Double(_) => SqmType::Double,
            SqmLiteral::BigDecimal(_) => SqmType::BigDecimal,
            SqmLiteral::String(_) => SqmType::String,
            SqmLiteral::Boolean(_) => SqmType::Boolean,
            SqmLiteral::Null => SqmType::Unknown,
            SqmLiteral::Date(_) => SqmType::Date,
            SqmLiteral::Time(_) => SqmType::Time,
            SqmLiteral::Timestamp(_) => SqmType::Timestamp,
        }
    }
}

impl From<i64> for SqmLiteral {
    fn from(value: i64) -> Self {
        SqmLiteral::Long(value)
    }
}

impl From<i32> for SqmLiteral {
    fn from(value: i32) -> Self {
        SqmLiteral::Integer(value.into())
    }
}

impl From<&str> for SqmLiteral {
    fn from(value: &str) -> Self {
        SqmLiteral::String(value.to_string())
    }
}

impl From<String> for SqmLiteral {
    fn from(value: String) -> Self {
        SqmLiteral::String(value)
    }
}

impl From<bool> for SqmLiteral {
    fn from(value: bool) -> Self {
        SqmLiteral::Boolean(value)
    }
}

impl From<f64> for SqmLiteral {
    fn from(value: f64) -> Self {
        SqmLiteral::Double(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParameterKind {
    Named(String),
    Positional(u32),
}

/// A query parameter. Occurrences of the same parameter share one id.
#[derive(Debug, Clone, PartialEq)]
pub struct SqmParameter {
    pub id: NodeId,
    pub kind: ParameterKind,
    pub ty: SqmType,
}

impl SqmParameter {
    /// `:name` or `?n`.
    pub fn label(&self) -> String {
        match &self.kind {
            ParameterKind::Named(name) => format!(":{name}"),
            ParameterKind::Positional(position) => format!("?{position}"),
        }
    }
}

/// Navigation from a from-element to one of its attributes, or the
/// from-element itself when `attribute` is `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct SqmPath {
    pub source: NodeId,
    /// Entity the source from-element ranges over, `None` for derived roots.
    pub entity: Option<String>,
    pub attribute: Option<String>,
    pub ty: SqmType,
    pub nullable: bool,
    /// Whether the attribute is a to-many association.
    pub collection: bool,
}

impl SqmPath {
    /// Whether the path denotes a whole entity rather than a single column.
    pub fn is_entity_reference(&self) -> bool {
        self.attribute.is_none() && self.entity.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct SqmFunction {
    pub name: String,
    pub descriptor: Arc<FunctionDescriptor>,
    pub arguments: Vec<SqmExpr>,
    pub distinct: bool,
    pub ty: SqmType,
}

impl PartialEq for SqmFunction {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && Arc::ptr_eq(&self.descriptor, &other.descriptor)
            && self.arguments == other.arguments
            && self.distinct == other.distinct
            && self.ty == other.ty
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
}

impl fmt::Display for ArithmeticOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ArithmeticOperator::Add => "+",
            ArithmeticOperator::Subtract => "-",
            ArithmeticOperator::Multiply => "*",
            ArithmeticOperator::Divide => "/",
            ArithmeticOperator::Modulo => "%",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SqmCaseBranches {
    Searched(Vec<(SqmPredicate, SqmExpr)>),
    Simple {
        operand: Box<SqmExpr>,
        whens: Vec<(SqmExpr, SqmExpr)>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SqmCase {
    pub branches: SqmCaseBranches,
    pub otherwise: Option<Box<SqmExpr>>,
    pub ty: SqmType,
}

/// A nested query used as an expression or predicate operand.
#[derive(Debug, Clone, PartialEq)]
pub struct SqmSubquery {
    pub id: NodeId,
    pub query: QueryPart,
    pub ty: SqmType,
}

// ============================================================================
// Expressions
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum SqmExpr {
    Literal(SqmLiteral),
    Parameter(SqmParameter),
    Path(SqmPath),
    Function(SqmFunction),
    /// A temporal unit passed to `timestampadd`, `timestampdiff` or `extract`.
    Unit(TemporalUnit),
    /// The target type passed to `cast`.
    CastTarget(CastTarget),
    /// `*` inside `count(*)`.
    Star,
    Arithmetic {
        op: ArithmeticOperator,
        left: Box<SqmExpr>,
        right: Box<SqmExpr>,
        ty: SqmType,
    },
    Concat {
        left: Box<SqmExpr>,
        right: Box<SqmExpr>,
    },
    Negate(Box<SqmExpr>),
    Case(SqmCase),
    Subquery(Box<SqmSubquery>),
}

impl SqmExpr {
    pub fn ty(&self) -> SqmType {
        match self {
            SqmExpr::Literal(literal) => literal.ty(),
            SqmExpr::Parameter(parameter) => parameter.ty.clone(),
            SqmExpr::Path(path) => path.ty.clone(),
            SqmExpr::Function(function) => function.ty.clone(),
            SqmExpr::Unit(_) | SqmExpr::Star => SqmType::Unknown,
            SqmExpr::CastTarget(target) => target.ty.clone(),
            SqmExpr::Arithmetic { ty, .. } => ty.clone(),
            SqmExpr::Concat { .. } => SqmType::String,
            SqmExpr::Negate(inner) => inner.ty(),
            SqmExpr::Case(case) => case.ty.clone(),
            SqmExpr::Subquery(subquery) => subquery.ty.clone(),
        }
    }

    /// Whether this is an aggregate function call.
    pub fn is_aggregate(&self) -> bool {
        matches!(self, SqmExpr::Function(f) if f.descriptor.is_aggregate())
    }

    /// Adopt `ty` if this is a parameter whose type is still unknown.
    pub fn infer_parameter_type(&mut self, ty: &SqmType) -> Option<(NodeId, SqmType)> {
        match self {
            SqmExpr::Parameter(parameter) if parameter.ty.is_unknown() && !ty.is_unknown() => {
                parameter.ty = ty.clone();
                Some((parameter.id, ty.clone()))
            }
            _ => None,
        }
    }
}

impl From<SqmLiteral> for SqmExpr {
    fn from(literal: SqmLiteral) -> Self {
        SqmExpr::Literal(literal)
    }
}

impl From<SqmPath> for SqmExpr {
    fn from(path: SqmPath) -> Self {
        SqmExpr::Path(path)
    }
}

// ============================================================================
// Predicates
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOperator {
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
}

impl ComparisonOperator {
    pub fn negated(self) -> Self {
        match self {
            ComparisonOperator::Equal => ComparisonOperator::NotEqual,
            ComparisonOperator::NotEqual => ComparisonOperator::Equal,
            ComparisonOperator::LessThan => ComparisonOperator::GreaterThanOrEqual,
            ComparisonOperator::LessThanOrEqual => ComparisonOperator::GreaterThan,
            ComparisonOperator::GreaterThan => ComparisonOperator::LessThanOrEqual,
            ComparisonOperator::GreaterThanOrEqual => ComparisonOperator::LessThan,
        }
    }
}

impl fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ComparisonOperator::Equal => "=",
            ComparisonOperator::NotEqual => "<>",
            ComparisonOperator::LessThan => "<",
            ComparisonOperator::LessThanOrEqual => "<=",
            ComparisonOperator::GreaterThan => ">",
            ComparisonOperator::GreaterThanOrEqual => ">=",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JunctionKind {
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SqmPredicate {
    Junction {
        kind: JunctionKind,
        predicates: Vec<SqmPredicate>,
    },
    Not(Box<SqmPredicate>),
    Comparison {
        left: SqmExpr,
        op: ComparisonOperator,
        right: SqmExpr,
    },
    IsNull {
        expr: SqmExpr,
        negated: bool,
    },
    /// `collection is [not] empty`
    IsEmpty {
        collection: SqmPath,
        negated: bool,
    },
    Between {
        expr: SqmExpr,
        low: SqmExpr,
        high: SqmExpr,
        negated: bool,
    },
    Like {
        expr: SqmExpr,
        pattern: SqmExpr,
        escape: Option<SqmExpr>,
        negated: bool,
    },
    InList {
        expr: SqmExpr,
        values: Vec<SqmExpr>,
        negated: bool,
    },
    InSubquery {
        expr: SqmExpr,
        subquery: Box<SqmSubquery>,
        negated: bool,
    },
    /// `value [not] member of collection`
    MemberOf {
        expr: SqmExpr,
        collection: SqmPath,
        negated: bool,
    },
    Exists {
        subquery: Box<SqmSubquery>,
        negated: bool,
    },
    /// A boolean expression used as a predicate.
    BooleanExpr(SqmExpr),
}

impl SqmPredicate {
    /// Combine with `other` under AND, flattening nested conjunctions.
    pub fn and(self, other: SqmPredicate) -> SqmPredicate {
        Self::junction(JunctionKind::And, self, other)
    }

    /// Combine with `other` under OR, flattening nested disjunctions.
    pub fn or(self, other: SqmPredicate) -> SqmPredicate {
        Self::junction(JunctionKind::Or, self, other)
    }

    fn junction(kind: JunctionKind, left: SqmPredicate, right: SqmPredicate) -> SqmPredicate {
        let mut predicates = Vec::new();
        for side in [left, right] {
            match side {
                SqmPredicate::Junction {
                    kind: inner,
                    predicates: nested,
                } if inner == kind => predicates.extend(nested),
                other => predicates.push(other),
            }
        }
        SqmPredicate::Junction { kind, predicates }
    }

    pub fn not(self) -> SqmPredicate {
        SqmPredicate::Not(Box::new(self))
    }
}

// ============================================================================
// Ordering
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullPrecedence {
    First,
    Last,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortSpecification {
    pub expr: SqmExpr,
    pub direction: SortDirection,
    pub nulls: Option<NullPrecedence>,
}

impl SortSpecification {
    pub fn asc(expr: SqmExpr) -> Self {
        Self {
            expr,
            direction: SortDirection::Ascending,
            nulls: None,
        }
    }

    pub fn desc(expr: SqmExpr) -> Self {
        Self {
            expr,
            direction: SortDirection::Descending,
            nulls: None,
        }
    }

    pub fn nulls(mut self, nulls: NullPrecedence) -> Self {
        self.nulls = Some(nulls);
        self
    }
}
