//! The semantic query model (SQM).
//!
//! A typed, mutable tree describing a select statement independently of
//! any SQL dialect. Trees are produced by semantic analysis of query text
//! or assembled through the builder API; both routes go through a
//! [`NodeBuilder`] and yield the same node types.

pub mod copy;
pub mod count;
pub mod criteria;
pub mod expr;
pub mod from;
pub mod node;
pub mod printer;
pub mod select;
pub mod types;
pub mod walk;

pub use copy::{CopyContext, SqmCopy};
pub use expr::{
    ArithmeticOperator, ComparisonOperator, JunctionKind, NullPrecedence, ParameterKind,
    SortDirection, SortSpecification, SqmCase, SqmCaseBranches, SqmExpr, SqmFunction,
    SqmLiteral, SqmParameter, SqmPath, SqmPredicate, SqmSubquery,
};
pub use from::{
    DerivedColumn, FromKind, JoinTarget, RootSource, SqmJoin, SqmJoinKind, SqmRoot,
};
pub use node::{CreationOptions, NodeBuilder, NodeId};
pub use printer::SqmTreePrinter;
pub use select::{
    FetchSpec, ParameterTracking, QueryGroup, QueryPart, QuerySource, QuerySpec, ResultType,
    SelectClause, SelectStatement, Selectable, Selection, SetOperator,
};
pub use types::{CastTarget, SqmType};
