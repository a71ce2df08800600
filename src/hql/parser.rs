//! Recursive-descent parser producing an [`ast::Statement`].
//!
//! Parsing runs in one of two prediction modes:
//!
//! - [`PredictionMode::Fast`] commits at every decision and gives up with
//!   [`ParseSignal::Cancelled`] on any error, or when a soft keyword
//!   (`left`, `right`, `full`, `limit`, `offset`, `fetch`) sits where an
//!   alias could also be.
//! - [`PredictionMode::Exhaustive`] resolves those positions speculatively
//!   and recovers from errors: each is recorded, the parser skips to the
//!   next clause keyword, and parsing continues. The first recorded error
//!   is the one reported.
//!
//! [`super::parse`] runs the fast mode first and falls back to the
//! exhaustive one.

use super::ast::*;
use super::error::{IssueKind, ParseSignal, SyntaxIssue};
use super::lexer::Token;
use super::span::Span;
use super::stream::TokenCursor;

type PResult<T> = Result<T, ParseSignal>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredictionMode {
    Fast,
    Exhaustive,
}

/// Words that never start or name an identifier.
const RESERVED: &[&str] = &[
    "all", "and", "as", "between", "by", "case", "cross", "distinct", "else", "end", "escape",
    "except", "exists", "from", "group", "having", "in", "inner", "intersect", "is", "join",
    "like", "member", "new", "not", "on", "or", "order", "outer", "select", "then", "union",
    "when", "where", "with",
];

/// Words that may be an alias or begin the next clause.
const SOFT_CLAUSE_KEYWORDS: &[&str] = &["left", "right", "full", "limit", "offset", "fetch"];

/// Deepest nesting of parenthesized or prefixed constructs accepted.
const MAX_NESTING_DEPTH: u32 = 64;

/// Where error recovery stops skipping tokens.
const CLAUSE_KEYWORDS: &[&str] = &[
    "from", "where", "group", "having", "order", "limit", "offset", "fetch", "union",
    "intersect", "except",
];

fn is_reserved(word: &str) -> bool {
    RESERVED.iter().any(|r| r.eq_ignore_ascii_case(word))
}

fn is_soft_clause_keyword(word: &str) -> bool {
    SOFT_CLAUSE_KEYWORDS
        .iter()
        .any(|k| k.eq_ignore_ascii_case(word))
}

pub struct Parser<'src> {
    cursor: TokenCursor<'src>,
    mode: PredictionMode,
    /// Errors reported while recovering, in order.
    errors: Vec<SyntaxIssue>,
    speculating: u32,
    depth: u32,
}

impl<'src> Parser<'src> {
    pub fn new(
        source: &'src str,
        tokens: Vec<(Token<'src>, Span)>,
        mode: PredictionMode,
    ) -> Self {
        Self {
            cursor: TokenCursor::new(source, tokens),
            mode,
            errors: Vec::new(),
            speculating: 0,
            depth: 0,
        }
    }

    pub fn mode(&self) -> PredictionMode {
        self.mode
    }

    /// Errors recorded by recovery, first one first.
    pub fn errors(&self) -> &[SyntaxIssue] {
        &self.errors
    }

    /// Rewind to the first token and clear all state for another attempt.
    pub fn restart(&mut self, mode: PredictionMode) -> PResult<()> {
        self.cursor.reset(0).map_err(ParseSignal::Internal)?;
        self.mode = mode;
        self.errors.clear();
        self.speculating = 0;
        self.depth = 0;
        Ok(())
    }

    // ========================================================================
    // Error Reporting
    // ========================================================================

    fn issue(&self, kind: IssueKind) -> SyntaxIssue {
        SyntaxIssue {
            kind,
            token: Some(self.cursor.text()),
            span: self.cursor.span(),
        }
    }

    fn fail<T>(&self, kind: IssueKind) -> PResult<T> {
        if self.mode == PredictionMode::Fast && self.speculating == 0 {
            return Err(ParseSignal::Cancelled);
        }
        Err(ParseSignal::Syntax(self.issue(kind)))
    }

    fn no_viable<T>(&self) -> PResult<T> {
        let start = self.cursor.span().start;
        let line_start = self.cursor.source()[..start]
            .rfind('\n')
            .map(|i| i + 1)
            .unwrap_or(0);
        let input = &self.cursor.source()[line_start..self.cursor.span().end];
        self.fail(IssueKind::NoViableAlternative(format!(
            "no viable alternative at input '{}'",
            if input.is_empty() { "<EOF>" } else { input }
        )))
    }

    fn mismatch<T>(&self, expected: &[&str]) -> PResult<T> {
        let expecting = match expected {
            [single] => single.to_string(),
            many => format!("{{{}}}", many.join(", ")),
        };
        self.fail(IssueKind::InputMismatch(format!(
            "mismatched input '{}' expecting {}",
            self.cursor.text(),
            expecting
        )))
    }

    fn bump(&mut self) -> PResult<(Token<'src>, Span)> {
        self.cursor
            .advance()
            .ok_or_else(|| ParseSignal::Internal("advanced past the end of input".into()))
    }

    fn reset(&mut self, mark: usize) -> PResult<()> {
        self.cursor.reset(mark).map_err(ParseSignal::Internal)
    }

    fn expect(&mut self, token: Token<'_>, display: &str) -> PResult<Span> {
        if self.cursor.check(&token) {
            Ok(self.bump()?.1)
        } else {
            self.mismatch(&[display])
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> PResult<Span> {
        if self.cursor.check_keyword(keyword) {
            Ok(self.bump()?.1)
        } else {
            self.mismatch(&[&keyword.to_ascii_uppercase()])
        }
    }

    /// Run `f` as an attempt that may be abandoned.
    ///
    /// A syntax failure rewinds the cursor, discards errors recorded during
    /// the attempt and yields `None`. Cancellation and internal failures
    /// propagate.
    fn speculate<T>(&mut self, f: impl FnOnce(&mut Self) -> PResult<T>) -> PResult<Option<T>> {
        let mark = self.cursor.mark();
        let recorded = self.errors.len();
        self.speculating += 1;
        let result = f(self);
        self.speculating -= 1;
        match result {
            Ok(value) => Ok(Some(value)),
            Err(ParseSignal::Syntax(_)) => {
                self.reset(mark)?;
                self.errors.truncate(recorded);
                Ok(None)
            }
            Err(other) => Err(other),
        }
    }

    /// Run `f` one nesting level deeper, failing once the limit is reached.
    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> PResult<T>) -> PResult<T> {
        if self.depth >= MAX_NESTING_DEPTH {
            return self.fail(IssueKind::Other(format!(
                "maximum nesting depth of {MAX_NESTING_DEPTH} exceeded"
            )));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    /// Parse a clause, recovering from a syntax error when exhaustive.
    fn clause<T>(&mut self, f: impl FnOnce(&mut Self) -> PResult<T>) -> PResult<Option<T>> {
        match f(self) {
            Ok(value) => Ok(Some(value)),
            Err(ParseSignal::Syntax(issue))
                if self.mode == PredictionMode::Exhaustive && self.speculating == 0 =>
            {
                self.errors.push(issue);
                self.synchronize()?;
                Ok(None)
            }
            Err(other) => Err(other),
        }
    }

    /// Skip to the next clause keyword, closing parenthesis or end of input
    /// at the current nesting level.
    fn synchronize(&mut self) -> PResult<()> {
        let mut depth = 0usize;
        while let Some(token) = self.cursor.peek() {
            match token {
                Token::LParen => depth += 1,
                Token::RParen if depth == 0 => return Ok(()),
                Token::RParen => depth -= 1,
                Token::Word(w)
                    if depth == 0 && CLAUSE_KEYWORDS.iter().any(|k| k.eq_ignore_ascii_case(w)) =>
                {
                    return Ok(());
                }
                _ => {}
            }
            self.bump()?;
        }
        Ok(())
    }

    // ========================================================================
    // Statements
    // ========================================================================

    pub fn parse_statement(&mut self) -> PResult<Statement> {
        let mut ctes = Vec::new();
        if self.cursor.eat_keyword("with") {
            loop {
                let name = self.identifier()?;
                self.expect_keyword("as")?;
                self.expect(Token::LParen, "'('")?;
                let query = self.parse_query_expr()?;
                self.expect(Token::RParen, "')'")?;
                ctes.push(CteDef { name, query });
                if !self.cursor.eat(&Token::Comma) {
                    break;
                }
            }
        }

        let query = self.parse_query_expr()?;

        if !self.cursor.at_end() {
            let issue = self.issue(IssueKind::Other(format!(
                "extraneous input '{}' expecting <EOF>",
                self.cursor.text()
            )));
            if self.mode == PredictionMode::Fast {
                return Err(ParseSignal::Cancelled);
            }
            self.errors.push(issue);
        }

        Ok(Statement { ctes, query })
    }

    fn parse_query_expr(&mut self) -> PResult<QueryExpr> {
        self.nested(|p| Ok(lift_trailing_clauses(p.parse_set_operations()?)))
    }

    fn parse_set_operations(&mut self) -> PResult<QueryExpr> {
        let mut left = self.parse_intersection()?;
        loop {
            let op = if self.cursor.check_keyword("union") {
                SetOperator::Union
            } else if self.cursor.check_keyword("except") {
                SetOperator::Except
            } else {
                break;
            };
            self.bump()?;
            let all = self.cursor.eat_keyword("all");
            let right = self.parse_intersection()?;
            left = QueryExpr::SetOp {
                left: Box::new(left),
                op,
                all,
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_intersection(&mut self) -> PResult<QueryExpr> {
        let mut left = QueryExpr::Ordered(Box::new(self.parse_ordered_query()?));
        while self.cursor.eat_keyword("intersect") {
            let all = self.cursor.eat_keyword("all");
            let right = QueryExpr::Ordered(Box::new(self.parse_ordered_query()?));
            left = QueryExpr::SetOp {
                left: Box::new(left),
                op: SetOperator::Intersect,
                all,
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_ordered_query(&mut self) -> PResult<OrderedQuery> {
        let body = if self.cursor.eat(&Token::LParen) {
            let nested = self.parse_query_expr()?;
            self.expect(Token::RParen, "')'")?;
            QueryBody::Nested(nested)
        } else {
            QueryBody::Spec(Box::new(self.parse_query_spec()?))
        };

        let mut order_by = Vec::new();
        if self.cursor.check_keyword("order") {
            order_by = self
                .clause(|p| {
                    p.bump()?;
                    p.expect_keyword("by")?;
                    p.comma_separated(Self::parse_sort_spec)
                })?
                .unwrap_or_default();
        }

        let mut limit = None;
        if self.cursor.check_keyword("limit") {
            limit = self
                .clause(|p| {
                    p.bump()?;
                    p.parse_expr()
                })?;
        }

        let mut offset = None;
        if self.cursor.check_keyword("offset") {
            offset = self.clause(|p| {
                p.bump()?;
                let expr = p.parse_expr()?;
                if !p.cursor.eat_keyword("rows") {
                    p.cursor.eat_keyword("row");
                }
                Ok(expr)
            })?;
        }

        let mut fetch = None;
        if self.cursor.check_keyword("fetch") {
            fetch = self.clause(Self::parse_fetch_clause)?;
        }

        Ok(OrderedQuery {
            body,
            order_by,
            limit,
            offset,
            fetch,
        })
    }

    fn parse_fetch_clause(&mut self) -> PResult<FetchClause> {
        self.expect_keyword("fetch")?;
        if !self.cursor.eat_keyword("first") && !self.cursor.eat_keyword("next") {
            return self.mismatch(&["FIRST", "NEXT"]);
        }
        let count = self.parse_expr()?;
        let percent = self.cursor.eat_keyword("percent");
        if !self.cursor.eat_keyword("rows") && !self.cursor.eat_keyword("row") {
            return self.mismatch(&["ROW", "ROWS"]);
        }
        let with_ties = if self.cursor.eat_keyword("only") {
            false
        } else if self.cursor.eat_keyword("with") {
            self.expect_keyword("ties")?;
            true
        } else {
            return self.mismatch(&["ONLY", "WITH"]);
        };
        Ok(FetchClause {
            count,
            percent,
            with_ties,
        })
    }

    fn parse_sort_spec(&mut self) -> PResult<SortSpec> {
        let expr = self.parse_expr()?;
        let direction = if self.cursor.eat_keyword("asc") || self.cursor.eat_keyword("ascending") {
            Some(SortDirection::Ascending)
        } else if self.cursor.eat_keyword("desc") || self.cursor.eat_keyword("descending") {
            Some(SortDirection::Descending)
        } else {
            None
        };
        let nulls = if self.cursor.eat_keyword("nulls") {
            if self.cursor.eat_keyword("first") {
                Some(NullPrecedence::First)
            } else if self.cursor.eat_keyword("last") {
                Some(NullPrecedence::Last)
            } else {
                return self.mismatch(&["FIRST", "LAST"]);
            }
        } else {
            None
        };
        Ok(SortSpec {
            expr,
            direction,
            nulls,
        })
    }

    fn parse_query_spec(&mut self) -> PResult<QuerySpec> {
        let select = if self.cursor.check_keyword("select") {
            self.clause(Self::parse_select_clause)?
        } else {
            None
        };

        if !self.cursor.check_keyword("from") {
            // Without a select clause nothing at all matched here.
            if select.is_none() && self.errors.is_empty() {
                return self.no_viable();
            }
            return self.mismatch(&["FROM"]);
        }
        let from = self.clause(Self::parse_from_clause)?.unwrap_or_default();

        let mut where_clause = None;
        if self.cursor.eat_keyword("where") {
            where_clause = self.clause(Self::parse_predicate)?;
        }

        let mut group_by = Vec::new();
        if self.cursor.check_keyword("group") {
            group_by = self
                .clause(|p| {
                    p.bump()?;
                    p.expect_keyword("by")?;
                    p.comma_separated(Self::parse_expr)
                })?
                .unwrap_or_default();
        }

        let mut having = None;
        if self.cursor.eat_keyword("having") {
            having = self.clause(Self::parse_predicate)?;
        }

        Ok(QuerySpec {
            select,
            from,
            where_clause,
            group_by,
            having,
        })
    }

    // ========================================================================
    // Select Clause
    // ========================================================================

    fn parse_select_clause(&mut self) -> PResult<SelectClause> {
        self.expect_keyword("select")?;
        let distinct = self.cursor.eat_keyword("distinct");
        let selections = self.comma_separated(Self::parse_selection)?;
        Ok(SelectClause {
            distinct,
            selections,
        })
    }

    fn parse_selection(&mut self) -> PResult<Selection> {
        let item = if self.cursor.check_keyword("new")
            && matches!(self.cursor.peek_nth(1), Some(Token::Word(_)))
        {
            self.bump()?;
            let class = self.path_segments()?;
            self.expect(Token::LParen, "'('")?;
            let arguments = self.nested(|p| p.comma_separated(Self::parse_selection))?;
            self.expect(Token::RParen, "')'")?;
            SelectItem::Instantiation { class, arguments }
        } else {
            SelectItem::Expr(self.parse_expr()?)
        };
        let alias = self.parse_alias()?;
        Ok(Selection { item, alias })
    }

    /// `[AS] alias`, resolving soft keywords by mode.
    fn parse_alias(&mut self) -> PResult<Option<Ident>> {
        if self.cursor.eat_keyword("as") {
            return self.identifier().map(Some);
        }
        match self.cursor.peek() {
            Some(Token::QuotedIdent(_)) => self.identifier().map(Some),
            Some(Token::Word(word)) if !is_reserved(word) => {
                let word = *word;
                if is_soft_clause_keyword(word) {
                    if self.mode == PredictionMode::Fast {
                        return Err(ParseSignal::Cancelled);
                    }
                    if self.soft_keyword_starts_clause(word)? {
                        return Ok(None);
                    }
                }
                self.identifier().map(Some)
            }
            _ => Ok(None),
        }
    }

    fn soft_keyword_starts_clause(&mut self, word: &str) -> PResult<bool> {
        let word = word.to_ascii_lowercase();
        match word.as_str() {
            "left" | "right" | "full" => Ok(self.cursor.check_keyword_nth(1, "join")
                || (self.cursor.check_keyword_nth(1, "outer")
                    && self.cursor.check_keyword_nth(2, "join"))),
            "fetch" => Ok(self.cursor.check_keyword_nth(1, "first")
                || self.cursor.check_keyword_nth(1, "next")),
            _ => {
                let mark = self.cursor.mark();
                let parsed = self.speculate(|p| {
                    p.bump()?;
                    p.parse_expr()
                })?;
                self.reset(mark)?;
                Ok(parsed.is_some())
            }
        }
    }

    // ========================================================================
    // From Clause
    // ========================================================================

    fn parse_from_clause(&mut self) -> PResult<Vec<FromRoot>> {
        self.expect_keyword("from")?;
        self.comma_separated(Self::parse_from_root)
    }

    fn parse_from_root(&mut self) -> PResult<FromRoot> {
        let source = if self.cursor.eat(&Token::LParen) {
            let query = self.parse_query_expr()?;
            self.expect(Token::RParen, "')'")?;
            RootSource::Subquery(query)
        } else {
            RootSource::Entity(self.path_segments()?)
        };
        let alias = self.parse_alias()?;

        let mut joins = Vec::new();
        while let Some(kind) = self.join_kind()? {
            joins.push(self.parse_join(kind)?);
        }

        Ok(FromRoot {
            source,
            alias,
            joins,
        })
    }

    /// Consume a join prefix up to and including `JOIN`.
    fn join_kind(&mut self) -> PResult<Option<JoinKind>> {
        let c = &self.cursor;
        let (kind, length) = if c.check_keyword("join") {
            (JoinKind::Inner, 1)
        } else if c.check_keyword("inner") && c.check_keyword_nth(1, "join") {
            (JoinKind::Inner, 2)
        } else if c.check_keyword("cross") && c.check_keyword_nth(1, "join") {
            (JoinKind::Cross, 2)
        } else {
            let kind = if c.check_keyword("left") {
                JoinKind::Left
            } else if c.check_keyword("right") {
                JoinKind::Right
            } else if c.check_keyword("full") {
                JoinKind::Full
            } else {
                return Ok(None);
            };
            if c.check_keyword_nth(1, "join") {
                (kind, 2)
            } else if c.check_keyword_nth(1, "outer") && c.check_keyword_nth(2, "join") {
                (kind, 3)
            } else {
                return Ok(None);
            }
        };
        for _ in 0..length {
            self.bump()?;
        }
        Ok(Some(kind))
    }

    fn parse_join(&mut self, kind: JoinKind) -> PResult<JoinDef> {
        let fetch = self.cursor.check_keyword("fetch")
            && matches!(
                self.cursor.peek_nth(1),
                Some(Token::Word(_) | Token::QuotedIdent(_))
            );
        if fetch {
            self.bump()?;
        }

        let target = if self.cursor.eat(&Token::LParen) {
            let query = self.parse_query_expr()?;
            self.expect(Token::RParen, "')'")?;
            JoinTarget::Subquery(query)
        } else {
            JoinTarget::Named(self.path_segments()?)
        };
        let alias = self.parse_alias()?;

        let condition = if self.cursor.eat_keyword("on") || self.cursor.eat_keyword("with") {
            Some(self.parse_predicate()?)
        } else {
            None
        };

        Ok(JoinDef {
            kind,
            fetch,
            target,
            alias,
            condition,
        })
    }

    // ========================================================================
    // Predicates
    // ========================================================================

    pub(crate) fn parse_predicate(&mut self) -> PResult<Predicate> {
        self.nested(Self::parse_disjunction)
    }

    fn parse_disjunction(&mut self) -> PResult<Predicate> {
        let mut left = self.parse_conjunction()?;
        while self.cursor.eat_keyword("or") {
            let right = self.parse_conjunction()?;
            left = Predicate::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_conjunction(&mut self) -> PResult<Predicate> {
        let mut left = self.parse_negation()?;
        while self.cursor.eat_keyword("and") {
            let right = self.parse_negation()?;
            left = Predicate::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_negation(&mut self) -> PResult<Predicate> {
        if self.cursor.eat_keyword("not") {
            let inner = self.nested(Self::parse_negation)?;
            return Ok(Predicate::Not(Box::new(inner)));
        }
        self.parse_predicate_atom()
    }

    fn parse_predicate_atom(&mut self) -> PResult<Predicate> {
        if self.cursor.check_keyword("exists") && self.cursor.check_nth(1, &Token::LParen) {
            self.bump()?;
            self.bump()?;
            let query = self.parse_query_expr()?;
            self.expect(Token::RParen, "')'")?;
            return Ok(Predicate::Exists(Box::new(query)));
        }

        if self.cursor.check(&Token::LParen) {
            // `(a + b) = c` reads as an expression, `(a = b or c)` as a
            // nested predicate.
            if let Some(predicate) = self.speculate(Self::parse_expression_predicate)? {
                return Ok(predicate);
            }
            self.bump()?;
            let inner = self.parse_predicate()?;
            self.expect(Token::RParen, "')'")?;
            return Ok(inner);
        }

        self.parse_expression_predicate()
    }

    fn parse_expression_predicate(&mut self) -> PResult<Predicate> {
        let expr = self.parse_expr()?;

        if let Some(op) = self.comparison_operator() {
            self.bump()?;
            let right = self.parse_expr()?;
            return Ok(Predicate::Comparison {
                left: expr,
                op,
                right,
            });
        }

        if self.cursor.eat_keyword("is") {
            let negated = self.cursor.eat_keyword("not");
            if self.cursor.eat_keyword("null") {
                return Ok(Predicate::IsNull { expr, negated });
            }
            if self.cursor.eat_keyword("empty") {
                return Ok(Predicate::IsEmpty { expr, negated });
            }
            return self.mismatch(&["NULL", "EMPTY"]);
        }

        let negated = self.cursor.check_keyword("not")
            && ["between", "like", "in", "member"]
                .iter()
                .any(|k| self.cursor.check_keyword_nth(1, k));
        if negated {
            self.bump()?;
        }

        if self.cursor.eat_keyword("between") {
            let low = self.parse_expr()?;
            self.expect_keyword("and")?;
            let high = self.parse_expr()?;
            return Ok(Predicate::Between {
                expr,
                low,
                high,
                negated,
            });
        }

        if self.cursor.eat_keyword("like") {
            let pattern = self.parse_expr()?;
            let escape = if self.cursor.eat_keyword("escape") {
                Some(self.parse_expr()?)
            } else {
                None
            };
            return Ok(Predicate::Like {
                expr,
                pattern,
                escape,
                negated,
            });
        }

        if self.cursor.eat_keyword("in") {
            let list = self.parse_in_list()?;
            return Ok(Predicate::In {
                expr,
                list,
                negated,
            });
        }

        if self.cursor.eat_keyword("member") {
            self.cursor.eat_keyword("of");
            let collection = self.path_segments()?;
            return Ok(Predicate::MemberOf {
                expr,
                collection,
                negated,
            });
        }

        Ok(Predicate::Boolean(expr))
    }

    fn comparison_operator(&self) -> Option<ComparisonOp> {
        match self.cursor.peek()? {
            Token::Eq => Some(ComparisonOp::Eq),
            Token::Ne => Some(ComparisonOp::Ne),
            Token::Lt => Some(ComparisonOp::Lt),
            Token::Lte => Some(ComparisonOp::Lte),
            Token::Gt => Some(ComparisonOp::Gt),
            Token::Gte => Some(ComparisonOp::Gte),
            _ => None,
        }
    }

    fn parse_in_list(&mut self) -> PResult<InList> {
        if let Some(parameter) = self.try_parameter()? {
            return Ok(InList::Parameter(parameter.0, parameter.1));
        }
        self.expect(Token::LParen, "'('")?;
        let list = if self.starts_subquery(0) {
            InList::Subquery(self.parse_query_expr()?)
        } else if self.cursor.check(&Token::RParen) {
            InList::Values(Vec::new())
        } else {
            InList::Values(self.comma_separated(Self::parse_expr)?)
        };
        if !self.cursor.check(&Token::RParen) {
            return self.mismatch(&["','", "')'"]);
        }
        self.bump()?;
        Ok(list)
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    pub(crate) fn parse_expr(&mut self) -> PResult<Expr> {
        self.nested(Self::parse_concatenation)
    }

    fn parse_concatenation(&mut self) -> PResult<Expr> {
        let mut left = self.parse_additive()?;
        while self.cursor.eat(&Token::Concat) {
            let right = self.parse_additive()?;
            left = Expr::Concat {
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> PResult<Expr> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.cursor.peek() {
                Some(Token::Plus) => ArithmeticOp::Add,
                Some(Token::Minus) => ArithmeticOp::Subtract,
                _ => break,
            };
            self.bump()?;
            let right = self.parse_multiplicative()?;
            left = Expr::Arithmetic {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> PResult<Expr> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.cursor.peek() {
                Some(Token::Star) => ArithmeticOp::Multiply,
                Some(Token::Slash) => ArithmeticOp::Divide,
                Some(Token::Percent) => ArithmeticOp::Modulo,
                _ => break,
            };
            self.bump()?;
            let right = self.parse_unary()?;
            left = Expr::Arithmetic {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> PResult<Expr> {
        if self.cursor.eat(&Token::Minus) {
            let operand = self.nested(Self::parse_unary)?;
            return Ok(Expr::Negate(Box::new(operand)));
        }
        if self.cursor.eat(&Token::Plus) {
            return self.nested(Self::parse_unary);
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> PResult<Expr> {
        if let Some((parameter, span)) = self.try_parameter()? {
            return Ok(Expr::Parameter(parameter, span));
        }

        let Some(token) = self.cursor.peek().cloned() else {
            return self.no_viable();
        };

        match token {
            Token::Number(text) => {
                let literal = self.number_literal(text)?;
                let (_, span) = self.bump()?;
                Ok(Expr::Literal(literal, span))
            }
            Token::Str(value) => {
                let (_, span) = self.bump()?;
                Ok(Expr::Literal(Literal::String(value), span))
            }
            Token::LParen => {
                if self.starts_subquery(1) {
                    self.bump()?;
                    let query = self.parse_query_expr()?;
                    self.expect(Token::RParen, "')'")?;
                    return Ok(Expr::Subquery(Box::new(query)));
                }
                self.bump()?;
                let inner = self.parse_expr()?;
                self.expect(Token::RParen, "')'")?;
                Ok(inner)
            }
            Token::QuotedIdent(_) => Ok(Expr::Path(self.path_segments()?)),
            Token::Word(word) => self.parse_word_primary(word),
            _ => self.no_viable(),
        }
    }

    fn parse_word_primary(&mut self, word: &'src str) -> PResult<Expr> {
        let lower = word.to_ascii_lowercase();
        let called = self.cursor.check_nth(1, &Token::LParen);

        match lower.as_str() {
            "true" | "false" | "null" => {
                let (_, span) = self.bump()?;
                let literal = match lower.as_str() {
                    "true" => Literal::Boolean(true),
                    "false" => Literal::Boolean(false),
                    _ => Literal::Null,
                };
                return Ok(Expr::Literal(literal, span));
            }
            "date" | "time" | "timestamp" => {
                if let Some(Token::Str(value)) = self.cursor.peek_nth(1).cloned() {
                    let start = self.bump()?.1.start;
                    let end = self.bump()?.1.end;
                    let literal = match lower.as_str() {
                        "date" => Literal::Date(value),
                        "time" => Literal::Time(value),
                        _ => Literal::Timestamp(value),
                    };
                    return Ok(Expr::Literal(literal, start..end));
                }
            }
            "case" => return self.parse_case(),
            "cast" if called => return self.parse_cast(),
            "extract" if called => return self.parse_extract(),
            _ => {}
        }

        if is_reserved(word) {
            return self.no_viable();
        }
        if called {
            return self.parse_function();
        }
        Ok(Expr::Path(self.path_segments()?))
    }

    fn parse_function(&mut self) -> PResult<Expr> {
        let (_, span) = self.bump()?;
        let name = Ident::new(&self.cursor.source()[span.clone()], span);
        self.expect(Token::LParen, "'('")?;

        let lower = name.name.to_ascii_lowercase();
        if lower == "timestampadd" || lower == "timestampdiff" {
            let unit = self.unit()?;
            self.expect(Token::Comma, "','")?;
            let first = self.parse_expr()?;
            self.expect(Token::Comma, "','")?;
            let second = self.parse_expr()?;
            self.expect(Token::RParen, "')'")?;
            return Ok(Expr::Function {
                name,
                distinct: false,
                arguments: vec![unit, first, second],
            });
        }

        if self.cursor.check(&Token::Star) && self.cursor.check_nth(1, &Token::RParen) {
            self.bump()?;
            self.bump()?;
            return Ok(Expr::FunctionStar { name });
        }

        let distinct = self.cursor.eat_keyword("distinct");
        let arguments = if self.cursor.check(&Token::RParen) {
            Vec::new()
        } else {
            self.comma_separated(Self::parse_expr)?
        };
        if !self.cursor.check(&Token::RParen) {
            return self.mismatch(&["','", "')'"]);
        }
        self.bump()?;

        Ok(Expr::Function {
            name,
            distinct,
            arguments,
        })
    }

    fn parse_cast(&mut self) -> PResult<Expr> {
        self.bump()?;
        self.expect(Token::LParen, "'('")?;
        let expr = self.parse_expr()?;
        self.expect_keyword("as")?;
        let name = self.word()?;
        let mut arguments = Vec::new();
        if self.cursor.eat(&Token::LParen) {
            loop {
                arguments.push(self.size_argument()?);
                if !self.cursor.eat(&Token::Comma) {
                    break;
                }
            }
            self.expect(Token::RParen, "')'")?;
        }
        self.expect(Token::RParen, "')'")?;
        Ok(Expr::Cast {
            expr: Box::new(expr),
            target: CastType { name, arguments },
        })
    }

    fn size_argument(&mut self) -> PResult<u32> {
        if let Some(Token::Number(text)) = self.cursor.peek() {
            if let Ok(value) = text.parse::<u32>() {
                self.bump()?;
                return Ok(value);
            }
        }
        self.mismatch(&["INTEGER_LITERAL"])
    }

    fn parse_extract(&mut self) -> PResult<Expr> {
        let (_, span) = self.bump()?;
        let name = Ident::new(&self.cursor.source()[span.clone()], span);
        self.expect(Token::LParen, "'('")?;
        let unit = self.unit()?;
        self.expect_keyword("from")?;
        let source = self.parse_expr()?;
        self.expect(Token::RParen, "')'")?;
        Ok(Expr::Function {
            name,
            distinct: false,
            arguments: vec![unit, source],
        })
    }

    fn parse_case(&mut self) -> PResult<Expr> {
        self.expect_keyword("case")?;

        let branches = if self.cursor.check_keyword("when") {
            let mut whens = Vec::new();
            while self.cursor.eat_keyword("when") {
                let condition = self.parse_predicate()?;
                self.expect_keyword("then")?;
                whens.push((condition, self.parse_expr()?));
            }
            CaseBranches::Searched(whens)
        } else {
            let operand = self.parse_expr()?;
            let mut whens = Vec::new();
            while self.cursor.eat_keyword("when") {
                let value = self.parse_expr()?;
                self.expect_keyword("then")?;
                whens.push((value, self.parse_expr()?));
            }
            if whens.is_empty() {
                return self.mismatch(&["WHEN"]);
            }
            CaseBranches::Simple {
                operand: Box::new(operand),
                whens,
            }
        };

        let otherwise = if self.cursor.eat_keyword("else") {
            Some(Box::new(self.parse_expr()?))
        } else {
            None
        };
        self.expect_keyword("end")?;

        Ok(Expr::Case {
            branches,
            otherwise,
        })
    }

    // ========================================================================
    // Terminals
    // ========================================================================

    fn try_parameter(&mut self) -> PResult<Option<(Parameter, Span)>> {
        match self.cursor.peek() {
            Some(Token::NamedParam(name)) => {
                let name = name.to_string();
                let (_, span) = self.bump()?;
                Ok(Some((Parameter::Named(name), span)))
            }
            Some(Token::PositionalParam(Some(digits))) => match digits.parse::<u32>() {
                Ok(position) => {
                    let (_, span) = self.bump()?;
                    Ok(Some((Parameter::Positional(position), span)))
                }
                Err(_) => self.fail(IssueKind::Other(format!(
                    "invalid parameter position '?{digits}'"
                ))),
            },
            Some(Token::PositionalParam(None)) => self.fail(IssueKind::Other(
                "unlabeled ordinal parameter '?' (use ?1, ?2, ...)".into(),
            )),
            _ => Ok(None),
        }
    }

    fn number_literal(&self, text: &str) -> PResult<Literal> {
        let invalid = || IssueKind::Other(format!("invalid numeric literal '{text}'"));
        let finite = |value: &f64| value.is_finite();
        let lower = text.to_ascii_lowercase();

        let literal = if let Some(digits) = lower.strip_suffix("bd") {
            Some(Literal::BigDecimal(digits.to_string()))
        } else if let Some(digits) = lower.strip_suffix("bi") {
            Some(Literal::BigInteger(digits.to_string()))
        } else if let Some(digits) = lower.strip_suffix('l') {
            digits.parse().ok().map(Literal::Long)
        } else if let Some(digits) = lower.strip_suffix('f') {
            digits.parse().ok().filter(finite).map(Literal::Float)
        } else if let Some(digits) = lower.strip_suffix('d') {
            digits.parse().ok().filter(finite).map(Literal::Double)
        } else if lower.contains(['.', 'e']) {
            lower.parse().ok().filter(finite).map(Literal::Double)
        } else {
            match lower.parse::<i64>() {
                Ok(value) if i32::try_from(value).is_ok() => Some(Literal::Integer(value)),
                Ok(value) => Some(Literal::Long(value)),
                Err(_) => Some(Literal::BigInteger(lower.clone())),
            }
        };

        match literal {
            Some(literal) => Ok(literal),
            None => self.fail(invalid()),
        }
    }

    fn unit(&mut self) -> PResult<Expr> {
        Ok(Expr::Unit(self.word()?))
    }

    /// Any word, reserved or not.
    fn word(&mut self) -> PResult<Ident> {
        match self.cursor.peek() {
            Some(Token::Word(word)) => {
                let word = word.to_string();
                let (_, span) = self.bump()?;
                Ok(Ident::new(word, span))
            }
            _ => self.mismatch(&["IDENTIFIER"]),
        }
    }

    fn identifier(&mut self) -> PResult<Ident> {
        match self.cursor.peek() {
            Some(Token::Word(word)) if !is_reserved(word) => self.word(),
            Some(Token::QuotedIdent(name)) => {
                let name = name.to_string();
                let (_, span) = self.bump()?;
                Ok(Ident::new(name, span))
            }
            _ => self.mismatch(&["IDENTIFIER"]),
        }
    }

    /// `ident (. any-word)*`
    fn path_segments(&mut self) -> PResult<Vec<Ident>> {
        let mut segments = vec![self.identifier()?];
        while self.cursor.eat(&Token::Dot) {
            match self.cursor.peek() {
                Some(Token::QuotedIdent(_)) => segments.push(self.identifier()?),
                _ => segments.push(self.word()?),
            }
        }
        Ok(segments)
    }

    /// Whether the token `offset` ahead begins a query.
    fn starts_subquery(&self, offset: usize) -> bool {
        self.cursor.check_keyword_nth(offset, "select") || self.cursor.check_keyword_nth(offset, "from")
    }

    fn comma_separated<T>(&mut self, mut item: impl FnMut(&mut Self) -> PResult<T>) -> PResult<Vec<T>> {
        let mut items = vec![item(self)?];
        while self.cursor.eat(&Token::Comma) {
            items.push(item(self)?);
        }
        Ok(items)
    }
}

/// Move ordering and pagination written after the last operand of a set
/// operation onto the operation itself.
///
/// `a union b order by 1` orders the union. Clauses inside a parenthesized
/// operand stay where they are.
fn lift_trailing_clauses(mut expr: QueryExpr) -> QueryExpr {
    if let QueryExpr::Ordered(_) = expr {
        return expr;
    }
    let last = last_operand(&mut expr);
    if last.order_by.is_empty()
        && last.limit.is_none()
        && last.offset.is_none()
        && last.fetch.is_none()
    {
        return expr;
    }
    let order_by = std::mem::take(&mut last.order_by);
    let limit = last.limit.take();
    let offset = last.offset.take();
    let fetch = last.fetch.take();
    QueryExpr::Ordered(Box::new(OrderedQuery {
        body: QueryBody::Nested(expr),
        order_by,
        limit,
        offset,
        fetch,
    }))
}

fn last_operand(expr: &mut QueryExpr) -> &mut OrderedQuery {
    match expr {
        QueryExpr::Ordered(ordered) => ordered,
        QueryExpr::SetOp { right, .. } => last_operand(right),
    }
}
