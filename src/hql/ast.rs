//! Parse tree for query text.
//!
//! The tree mirrors the grammar closely and is discarded once the semantic
//! builder has produced an SQM tree. Names are kept as written; resolving
//! them against the domain model is the builder's job.

use super::span::Span;

/// An identifier as written, with its position.
#[derive(Debug, Clone, PartialEq)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}

impl Ident {
    pub fn new(name: impl Into<String>, span: Span) -> Self {
        Self {
            name: name.into(),
            span,
        }
    }
}

// ============================================================================
// Statements and Queries
// ============================================================================

/// A complete statement: optional CTEs and a query expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub ctes: Vec<CteDef>,
    pub query: QueryExpr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CteDef {
    pub name: Ident,
    pub query: QueryExpr,
}

/// Set operator between two query expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOperator {
    Union,
    Intersect,
    Except,
}

/// One or more ordered queries combined by set operators.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryExpr {
    Ordered(Box<OrderedQuery>),
    SetOp {
        left: Box<QueryExpr>,
        op: SetOperator,
        all: bool,
        right: Box<QueryExpr>,
    },
}

/// A query body with its own ordering and pagination.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderedQuery {
    pub body: QueryBody,
    pub order_by: Vec<SortSpec>,
    pub limit: Option<Expr>,
    pub offset: Option<Expr>,
    pub fetch: Option<FetchClause>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryBody {
    Spec(Box<QuerySpec>),
    /// A parenthesized query expression.
    Nested(QueryExpr),
}

/// `FETCH FIRST n [PERCENT] ROWS ONLY | WITH TIES`
#[derive(Debug, Clone, PartialEq)]
pub struct FetchClause {
    pub count: Expr,
    pub percent: bool,
    pub with_ties: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuerySpec {
    pub select: Option<SelectClause>,
    pub from: Vec<FromRoot>,
    pub where_clause: Option<Predicate>,
    pub group_by: Vec<Expr>,
    pub having: Option<Predicate>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectClause {
    pub distinct: bool,
    pub selections: Vec<Selection>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub item: SelectItem,
    pub alias: Option<Ident>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectItem {
    Expr(Expr),
    /// `new com.acme.Dto(a, b)`
    Instantiation {
        class: Vec<Ident>,
        arguments: Vec<Selection>,
    },
}

// ============================================================================
// From Clause
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct FromRoot {
    pub source: RootSource,
    pub alias: Option<Ident>,
    pub joins: Vec<JoinDef>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RootSource {
    Entity(Vec<Ident>),
    Subquery(QueryExpr),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Full,
    Cross,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JoinDef {
    pub kind: JoinKind,
    pub fetch: bool,
    pub target: JoinTarget,
    pub alias: Option<Ident>,
    pub condition: Option<Predicate>,
}

/// What a join navigates to.
///
/// A dotted name may be an attribute path (`p.address`) or an entity name;
/// the semantic builder tells them apart.
#[derive(Debug, Clone, PartialEq)]
pub enum JoinTarget {
    Named(Vec<Ident>),
    Subquery(QueryExpr),
}

// ============================================================================
// Ordering
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullPrecedence {
    First,
    Last,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortSpec {
    pub expr: Expr,
    pub direction: Option<SortDirection>,
    pub nulls: Option<NullPrecedence>,
}

// ============================================================================
// Expressions
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
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

#[derive(Debug, Clone, PartialEq)]
pub enum Parameter {
    Named(String),
    Positional(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
}

/// Size arguments of a cast target, as written.
#[derive(Debug, Clone, PartialEq)]
pub struct CastType {
    pub name: Ident,
    pub arguments: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CaseBranches {
    /// `case when <predicate> then ...`
    Searched(Vec<(Predicate, Expr)>),
    /// `case <operand> when <value> then ...`
    Simple {
        operand: Box<Expr>,
        whens: Vec<(Expr, Expr)>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal, Span),
    Parameter(Parameter, Span),
    /// Dotted identifier path.
    Path(Vec<Ident>),
    /// A temporal unit in a function argument position.
    Unit(Ident),
    Function {
        name: Ident,
        distinct: bool,
        arguments: Vec<Expr>,
    },
    /// `count(*)` and friends.
    FunctionStar { name: Ident },
    Cast {
        expr: Box<Expr>,
        target: CastType,
    },
    Arithmetic {
        op: ArithmeticOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Concat {
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Negate(Box<Expr>),
    Case {
        branches: CaseBranches,
        otherwise: Option<Box<Expr>>,
    },
    Subquery(Box<QueryExpr>),
}

// ============================================================================
// Predicates
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InList {
    Values(Vec<Expr>),
    Subquery(QueryExpr),
    Parameter(Parameter, Span),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
    Not(Box<Predicate>),
    Comparison {
        left: Expr,
        op: ComparisonOp,
        right: Expr,
    },
    IsNull {
        expr: Expr,
        negated: bool,
    },
    IsEmpty {
        expr: Expr,
        negated: bool,
    },
    Between {
        expr: Expr,
        low: Expr,
        high: Expr,
        negated: bool,
    },
    Like {
        expr: Expr,
        pattern: Expr,
        escape: Option<Expr>,
        negated: bool,
    },
    In {
        expr: Expr,
        list: InList,
        negated: bool,
    },
    MemberOf {
        expr: Expr,
        collection: Vec<Ident>,
        negated: bool,
    },
    Exists(Box<QueryExpr>),
    /// A boolean-valued expression used as a predicate.
    Boolean(Expr),
}
