//! SELECT statement AST - the target of SQM lowering.
//!
//! A [`Query`] is either a single SELECT or a container for a set operation,
//! in which case its ORDER BY and pagination apply to the combined result.
//! Rendering is infallible: anything a dialect cannot express has been
//! rejected while lowering.

use super::dialect::{Dialect, PageTokens, SqlDialect};
use super::expr::{Expr, ExprExt};
use super::token::{Token, TokenStream};

// =============================================================================
// Select Expression (column with optional alias)
// =============================================================================

/// A SELECT list item: expression with optional alias.
#[derive(Debug, Clone, PartialEq)]
#[must_use = "builders have no effect until used"]
pub struct SelectExpr {
    pub expr: Expr,
    pub alias: Option<String>,
}

impl SelectExpr {
    pub fn new(expr: Expr) -> Self {
        Self { expr, alias: None }
    }

    pub fn with_alias(mut self, alias: &str) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn to_tokens_for_dialect(&self, dialect: Dialect) -> TokenStream {
        let mut ts = self.expr.to_tokens_for_dialect(dialect);
        if let Some(alias) = &self.alias {
            ts.space()
                .push(Token::As)
                .space()
                .push(Token::Ident(alias.clone()));
        }
        ts
    }
}

impl From<Expr> for SelectExpr {
    fn from(expr: Expr) -> Self {
        SelectExpr::new(expr)
    }
}

// =============================================================================
// Table References
// =============================================================================

/// Something rows come from: a table or a derived table.
#[derive(Debug, Clone, PartialEq)]
pub enum TableFactor {
    Table { name: String, alias: Option<String> },
    Derived { query: Box<Query>, alias: String },
}

impl TableFactor {
    pub fn table(name: &str, alias: &str) -> Self {
        TableFactor::Table {
            name: name.into(),
            alias: Some(alias.into()),
        }
    }

    pub fn derived(query: Query, alias: &str) -> Self {
        TableFactor::Derived {
            query: Box::new(query),
            alias: alias.into(),
        }
    }

    pub fn to_tokens_for_dialect(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();
        let alias = match self {
            TableFactor::Table { name, alias } => {
                ts.push(Token::Ident(name.clone()));
                alias.as_deref()
            }
            TableFactor::Derived { query, alias } => {
                ts.lparen()
                    .append(&query.to_tokens_for_dialect(dialect))
                    .rparen();
                Some(alias.as_str())
            }
        };
        if let Some(alias) = alias {
            ts.space();
            if dialect.table_alias_keyword() {
                ts.push(Token::As).space();
            }
            ts.push(Token::Ident(alias.to_string()));
        }
        ts
    }
}

// =============================================================================
// Joins
// =============================================================================

/// Type of join.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
    Cross,
}

/// A JOIN clause.
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub join_type: JoinType,
    pub table: TableFactor,
    pub on: Option<Expr>,
}

impl Join {
    pub fn to_tokens_for_dialect(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();

        match self.join_type {
            JoinType::Inner => ts.push(Token::Inner),
            JoinType::Left => ts.push(Token::Left),
            JoinType::Right => ts.push(Token::Right),
            JoinType::Full => ts.push(Token::Full).space().push(Token::Outer),
            JoinType::Cross => ts.push(Token::Cross),
        };

        ts.space().push(Token::Join).space();
        ts.append(&self.table.to_tokens_for_dialect(dialect));

        if let Some(on) = &self.on {
            ts.space().push(Token::On).space();
            ts.append(&on.to_tokens_for_dialect(dialect));
        }

        ts
    }
}

/// A FROM clause entry: a table factor and the joins hanging off it.
#[derive(Debug, Clone, PartialEq)]
pub struct FromItem {
    pub table: TableFactor,
    pub joins: Vec<Join>,
}

impl FromItem {
    pub fn new(table: TableFactor) -> Self {
        Self {
            table,
            joins: vec![],
        }
    }

    pub fn join(mut self, join_type: JoinType, table: TableFactor, on: Option<Expr>) -> Self {
        self.joins.push(Join {
            join_type,
            table,
            on,
        });
        self
    }

    pub fn to_tokens_for_dialect(&self, dialect: Dialect) -> TokenStream {
        let mut ts = self.table.to_tokens_for_dialect(dialect);
        for join in &self.joins {
            ts.space().append(&join.to_tokens_for_dialect(dialect));
        }
        ts
    }
}

// =============================================================================
// ORDER BY
// =============================================================================

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDir {
    #[default]
    Asc,
    Desc,
}

/// NULLS ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullsOrder {
    First,
    Last,
}

/// An ORDER BY expression.
#[derive(Debug, Clone, PartialEq)]
#[must_use = "builders have no effect until used"]
pub struct OrderByExpr {
    pub expr: Expr,
    pub dir: Option<SortDir>,
    pub nulls: Option<NullsOrder>,
}

impl OrderByExpr {
    pub fn new(expr: Expr) -> Self {
        Self {
            expr,
            dir: None,
            nulls: None,
        }
    }

    pub fn asc(expr: Expr) -> Self {
        Self {
            expr,
            dir: Some(SortDir::Asc),
            nulls: None,
        }
    }

    pub fn desc(expr: Expr) -> Self {
        Self {
            expr,
            dir: Some(SortDir::Desc),
            nulls: None,
        }
    }

    pub fn nulls_first(mut self) -> Self {
        self.nulls = Some(NullsOrder::First);
        self
    }

    pub fn nulls_last(mut self) -> Self {
        self.nulls = Some(NullsOrder::Last);
        self
    }

    /// Convert to tokens for a specific dialect.
    ///
    /// Dialects without NULLS FIRST/LAST get a leading CASE sort key that
    /// puts nulls where requested.
    pub fn to_tokens_for_dialect(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();
        let expr = self.expr.to_tokens_for_dialect(dialect);

        if let Some(nulls) = self.nulls {
            if !dialect.supports_nulls_ordering() {
                let (null_rank, other_rank) = match nulls {
                    NullsOrder::First => (0, 1),
                    NullsOrder::Last => (1, 0),
                };
                let key = Expr::Case {
                    operand: None,
                    when_clauses: vec![(self.expr.clone().is_null(), Expr::from(null_rank))],
                    else_clause: Some(Box::new(Expr::from(other_rank))),
                };
                ts.append(&key.to_tokens_for_dialect(dialect)).comma().space();
            }
        }

        ts.append(&expr);

        if let Some(dir) = &self.dir {
            ts.space().push(match dir {
                SortDir::Asc => Token::Asc,
                SortDir::Desc => Token::Desc,
            });
        }

        if let Some(nulls) = &self.nulls {
            if dialect.supports_nulls_ordering() {
                ts.space().push(match nulls {
                    NullsOrder::First => Token::NullsFirst,
                    NullsOrder::Last => Token::NullsLast,
                });
            }
        }

        ts
    }
}

// =============================================================================
// Pagination
// =============================================================================

/// Row offset and fetch limit. Both are expressions so parameters can be bound.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pagination {
    pub offset: Option<Expr>,
    pub fetch: Option<Expr>,
    pub with_ties: bool,
    pub percent: bool,
}

impl Pagination {
    pub fn is_empty(&self) -> bool {
        self.offset.is_none() && self.fetch.is_none()
    }

    /// Convert to token stream using dialect-specific pagination.
    ///
    /// Delegates to `SqlDialect::emit_pagination()` for the actual formatting.
    pub fn to_tokens(&self, dialect: Dialect) -> TokenStream {
        let page = PageTokens {
            offset: self.offset.as_ref().map(|e| e.to_tokens_for_dialect(dialect)),
            fetch: self.fetch.as_ref().map(|e| e.to_tokens_for_dialect(dialect)),
            with_ties: self.with_ties,
            percent: self.percent,
        };
        dialect.emit_pagination(&page)
    }
}

// =============================================================================
// Set Operations (UNION, INTERSECT, EXCEPT)
// =============================================================================

/// Type of set operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOpType {
    Union,
    Intersect,
    Except,
}

/// A set operation combining two queries.
#[derive(Debug, Clone, PartialEq)]
pub struct SetOperation {
    pub left: Box<Query>,
    pub op: SetOpType,
    pub all: bool,
    pub right: Box<Query>,
}

impl SetOperation {
    pub fn new(left: Query, op: SetOpType, all: bool, right: Query) -> Self {
        Self {
            left: Box::new(left),
            op,
            all,
            right: Box::new(right),
        }
    }

    /// Chain another set operation (returns a new SetOperation with this as left).
    pub fn chain(self, op: SetOpType, all: bool, right: Query) -> Self {
        Self::new(Query::from_set_operation(self), op, all, right)
    }

    /// Convert to tokens for a specific dialect.
    pub fn to_tokens_for_dialect(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();

        // A left operand that is itself a bare set operation chains without parens
        if self.left.is_bare_set_operation() {
            ts.append(&self.left.to_tokens_for_dialect(dialect));
        } else {
            emit_set_operand(&mut ts, &self.left, dialect);
        }

        ts.space().push(match self.op {
            SetOpType::Union => Token::Union,
            SetOpType::Intersect => Token::Intersect,
            SetOpType::Except => Token::Except,
        });
        if self.all {
            ts.space().push(Token::All);
        }
        ts.space();

        emit_set_operand(&mut ts, &self.right, dialect);

        ts
    }
}

fn emit_set_operand(ts: &mut TokenStream, operand: &Query, dialect: Dialect) {
    if dialect.supports_parenthesized_set_operands() {
        ts.lparen()
            .append(&operand.to_tokens_for_dialect(dialect))
            .rparen();
    } else {
        ts.append(&operand.to_tokens_for_dialect(dialect));
    }
}

// =============================================================================
// CTE (Common Table Expression)
// =============================================================================

/// A Common Table Expression (WITH clause).
#[derive(Debug, Clone, PartialEq)]
pub struct Cte {
    pub name: String,
    pub query: Box<Query>,
}

impl Cte {
    pub fn new(name: &str, query: Query) -> Self {
        Self {
            name: name.into(),
            query: Box::new(query),
        }
    }

    pub fn to_tokens_for_dialect(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.push(Token::Ident(self.name.clone()))
            .space()
            .push(Token::As)
            .space()
            .lparen()
            .append(&self.query.to_tokens_for_dialect(dialect))
            .rparen();
        ts
    }
}

// =============================================================================
// Query
// =============================================================================

/// A SELECT query.
#[derive(Debug, Clone, Default, PartialEq)]
#[must_use = "Query has no effect until converted to SQL with to_sql() or to_tokens()"]
pub struct Query {
    pub with: Vec<Cte>,
    pub select: Vec<SelectExpr>,
    pub distinct: bool,
    pub from: Vec<FromItem>,
    pub where_clause: Option<Expr>,
    pub group_by: Vec<Expr>,
    pub having: Option<Expr>,
    pub order_by: Vec<OrderByExpr>,
    pub pagination: Option<Pagination>,
    /// Set operation (UNION, INTERSECT, EXCEPT) this query stands for.
    pub set_op: Option<Box<SetOperation>>,
}

impl Query {
    /// Create a new empty query.
    pub fn new() -> Self {
        Self::default()
    }

    /// A query whose body is the given set operation.
    pub fn from_set_operation(set_op: SetOperation) -> Self {
        Self {
            set_op: Some(Box::new(set_op)),
            ..Self::default()
        }
    }

    fn is_bare_set_operation(&self) -> bool {
        self.set_op.is_some()
            && self.with.is_empty()
            && self.order_by.is_empty()
            && self.pagination.is_none()
    }

    /// Add a CTE (WITH clause).
    pub fn with_cte(mut self, cte: Cte) -> Self {
        self.with.push(cte);
        self
    }

    /// Set the SELECT list.
    pub fn select(mut self, exprs: Vec<impl Into<SelectExpr>>) -> Self {
        self.select = exprs.into_iter().map(|e| e.into()).collect();
        self
    }

    /// Add DISTINCT.
    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    /// Add a FROM entry.
    pub fn from(mut self, item: FromItem) -> Self {
        self.from.push(item);
        self
    }

    /// Add a WHERE condition (ANDed with existing conditions).
    pub fn filter(mut self, condition: Expr) -> Self {
        self.where_clause = Some(match self.where_clause {
            Some(existing) => existing.and(condition),
            None => condition,
        });
        self
    }

    /// Set the GROUP BY clause.
    pub fn group_by(mut self, exprs: Vec<Expr>) -> Self {
        self.group_by = exprs;
        self
    }

    /// Set the HAVING clause.
    pub fn having(mut self, condition: Expr) -> Self {
        self.having = Some(condition);
        self
    }

    /// Set the ORDER BY clause.
    pub fn order_by(mut self, exprs: Vec<OrderByExpr>) -> Self {
        self.order_by = exprs;
        self
    }

    /// Set pagination.
    pub fn paginate(mut self, pagination: Pagination) -> Self {
        self.pagination = (!pagination.is_empty()).then_some(pagination);
        self
    }

    /// Convert to token stream for a specific dialect.
    pub fn to_tokens_for_dialect(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();

        // WITH clause
        if !self.with.is_empty() {
            ts.push(Token::With).space();
            for (i, cte) in self.with.iter().enumerate() {
                if i > 0 {
                    ts.comma().space();
                }
                ts.append(&cte.to_tokens_for_dialect(dialect));
            }
            ts.space();
        }

        if let Some(set_op) = &self.set_op {
            ts.append(&set_op.to_tokens_for_dialect(dialect));
        } else {
            self.emit_select(&mut ts, dialect);
        }

        // ORDER BY
        // T-SQL requires ORDER BY for OFFSET FETCH; `ORDER BY (SELECT NULL)` keeps
        // the statement valid without imposing an order.
        let paginated = self.pagination.is_some() && !dialect.uses_top();
        if !self.order_by.is_empty() {
            ts.space().push(Token::OrderBy).space();
            for (i, order_expr) in self.order_by.iter().enumerate() {
                if i > 0 {
                    ts.comma().space();
                }
                ts.append(&order_expr.to_tokens_for_dialect(dialect));
            }
        } else if paginated && dialect.requires_order_by_for_offset() {
            ts.space()
                .push(Token::OrderBy)
                .space()
                .lparen()
                .push(Token::Select)
                .space()
                .push(Token::Null)
                .rparen();
        }

        // Pagination
        if let Some(pagination) = &self.pagination {
            let page = pagination.to_tokens(dialect);
            if !page.is_empty() {
                ts.space().append(&page);
            }
        }

        ts
    }

    fn emit_select(&self, ts: &mut TokenStream, dialect: Dialect) {
        ts.push(Token::Select);
        if self.distinct {
            ts.space().push(Token::Distinct);
        }

        // TOP n for dialects without a trailing limit clause
        if dialect.uses_top() {
            if let Some(fetch) = self.pagination.as_ref().and_then(|p| p.fetch.as_ref()) {
                ts.space()
                    .push(Token::Top)
                    .space()
                    .append(&fetch.to_tokens_for_dialect(dialect));
            }
        }

        // Columns
        for (i, select_expr) in self.select.iter().enumerate() {
            if i > 0 {
                ts.comma();
            }
            ts.space();
            ts.append(&select_expr.to_tokens_for_dialect(dialect));
        }

        // FROM
        for (i, item) in self.from.iter().enumerate() {
            if i == 0 {
                ts.space().push(Token::From).space();
            } else {
                ts.comma().space();
            }
            ts.append(&item.to_tokens_for_dialect(dialect));
        }

        // WHERE
        if let Some(where_clause) = &self.where_clause {
            ts.space().push(Token::Where).space();
            ts.append(&where_clause.to_tokens_for_dialect(dialect));
        }

        // GROUP BY
        if !self.group_by.is_empty() {
            ts.space().push(Token::GroupBy).space();
            for (i, expr) in self.group_by.iter().enumerate() {
                if i > 0 {
                    ts.comma().space();
                }
                ts.append(&expr.to_tokens_for_dialect(dialect));
            }
        }

        // HAVING
        if let Some(having) = &self.having {
            ts.space().push(Token::Having).space();
            ts.append(&having.to_tokens_for_dialect(dialect));
        }
    }

    /// Generate SQL string for a specific dialect.
    pub fn to_sql(&self, dialect: Dialect) -> String {
        self.to_tokens_for_dialect(dialect).serialize(dialect)
    }
}

impl std::fmt::Display for Query {
    /// Formats the query using the default dialect (ANSI).
    ///
    /// For dialect-specific SQL, use [`Query::to_sql`] instead.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_sql(Dialect::default()))
    }
}

// =============================================================================
// Tests
// =============================================================================
