//! SQL generation module.
//!
//! Lowered SQM trees become a small, type-safe SQL AST that serializes to
//! multi-dialect SQL:
//!
//! - [`query`] - SELECT statements, joins, set operations, pagination
//! - [`expr`] - Expression AST and builder DSL
//! - [`token`] - Token types for SQL generation
//! - [`types`] - Type codes and per-dialect type names
//! - [`dialect`] - SQL dialect implementations

pub mod dialect;
pub mod expr;
pub mod query;
pub mod token;
pub mod types;

#[cfg(test)]
pub mod test_utils;

// Re-export commonly used types at the sql module level
pub use dialect::{Dialect, SqlDialect, UnknownDialect};
pub use expr::{
    col, count_star, func, lit_bool, lit_int, lit_null, lit_str, star, table_col, BinaryOperator,
    Expr, ExprExt, Literal, UnaryOperator,
};
pub use query::{
    Cte, FromItem, Join, JoinType, NullsOrder, OrderByExpr, Pagination, Query, SelectExpr,
    SetOpType, SetOperation, SortDir, TableFactor,
};
pub use token::{ParameterSlot, Token, TokenStream};
pub use types::{Size, SqlTypeCode, TypeNames};
