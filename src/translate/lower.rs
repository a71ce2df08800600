//! Lowering of SQM nodes to the SQL AST.
//!
//! SQL aliases are allocated in traversal order, one counter per stem:
//! the first `Person` from-element becomes `p1_0`, a following `Phone`
//! becomes `p2_0`. The same statement therefore always renders the same way.

use std::collections::HashMap;

use crate::domain::{Attribute, DomainModel, EntityType};
use crate::function::{Emulation, FunctionRegistry, FunctionRendering, PatternTemplate};
use crate::semantic::builder::derived_column_name;
use crate::sql::dialect::{Dialect, SqlDialect};
use crate::sql::expr::{
    lit_int, table_col, BinaryOperator, Expr, ExprExt, Literal, UnaryOperator,
};
use crate::sql::query::{
    Cte, FromItem, JoinType, OrderByExpr, Pagination, Query, SelectExpr, SetOpType,
    SetOperation, TableFactor,
};
use crate::sql::token::ParameterSlot;
use crate::sql::types::cast_type_code;
use crate::sqm::expr::{
    ArithmeticOperator, ComparisonOperator, JunctionKind, NullPrecedence, SortDirection,
    SortSpecification, SqmCaseBranches, SqmExpr, SqmFunction, SqmLiteral, SqmPath, SqmPredicate,
};
use crate::sqm::from::{JoinTarget, RootSource, SqmJoin, SqmJoinKind, SqmRoot};
use crate::sqm::node::NodeId;
use crate::sqm::select::{
    FetchSpec, QueryGroup, QueryPart, QuerySpec, SelectStatement, Selectable, Selection,
    SetOperator,
};
use crate::sqm::types::{CastTarget, SqmType};

use super::{RenderError, RenderResult};

/// Where a query part's select list ends up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SelectionContext {
    /// The statement result: entity references expand to all columns.
    Top,
    /// A CTE or derived table: columns are aliased with their derived names.
    Derived,
    /// Any other subquery: entity references become their id.
    Nested,
}

#[derive(Debug)]
struct Source {
    alias: String,
    /// Entity the from-element ranges over, `None` for derived tables and CTEs.
    entity: Option<String>,
}

pub(super) struct Lowerer<'a> {
    dialect: Dialect,
    functions: &'a FunctionRegistry,
    domain: &'a dyn DomainModel,
    sources: HashMap<NodeId, Source>,
    counters: HashMap<char, u32>,
}

impl<'a> Lowerer<'a> {
    pub(super) fn new(
        dialect: Dialect,
        functions: &'a FunctionRegistry,
        domain: &'a dyn DomainModel,
    ) -> Self {
        Self {
            dialect,
            functions,
            domain,
            sources: HashMap::new(),
            counters: HashMap::new(),
        }
    }

    pub(super) fn statement(&mut self, statement: &SelectStatement) -> RenderResult<Query> {
        let mut ctes = Vec::with_capacity(statement.ctes.len());
        for (name, part) in &statement.ctes {
            let query = self.query_part(part, SelectionContext::Derived)?;
            ctes.push(Cte::new(name, query));
        }
        let query = self.query_part(&statement.query_part, SelectionContext::Top)?;
        Ok(ctes.into_iter().fold(query, Query::with_cte))
    }

    // ========================================================================
    // Query parts
    // ========================================================================

    fn query_part(&mut self, part: &QueryPart, context: SelectionContext) -> RenderResult<Query> {
        match part {
            QueryPart::Spec(spec) => self.query_spec(spec, context),
            QueryPart::Group(group) => self.query_group(group, context),
        }
    }

    fn query_group(&mut self, group: &QueryGroup, context: SelectionContext) -> RenderResult<Query> {
        let op = match group.operator {
            SetOperator::Union => SetOpType::Union,
            SetOperator::Intersect => SetOpType::Intersect,
            SetOperator::Except => SetOpType::Except,
        };
        let mut parts = group.parts.iter();
        let first = match parts.next() {
            Some(first) => self.query_part(first, context)?,
            None => {
                return Err(RenderError::IncompleteStatement(
                    "set operation without operands".to_string(),
                ))
            }
        };
        let Some(second) = parts.next() else {
            return Ok(first);
        };
        let second = self.query_part(second, context)?;
        let mut set_op = SetOperation::new(first, op, group.all, second);
        for part in parts {
            set_op = set_op.chain(op, group.all, self.query_part(part, context)?);
        }

        // TOP belongs to a single select list.
        if group.fetch.is_some() && self.dialect.uses_top() {
            return Err(self.unsupported("FETCH on a set operation"));
        }
        let order_by = self.order_by(&group.order_by)?;
        let pagination = self.pagination(group.offset.as_ref(), group.fetch.as_ref())?;
        Ok(Query::from_set_operation(set_op)
            .order_by(order_by)
            .paginate(pagination))
    }

    fn query_spec(&mut self, spec: &QuerySpec, context: SelectionContext) -> RenderResult<Query> {
        // From first so that alias numbering follows the from clause.
        let mut from = Vec::with_capacity(spec.roots.len());
        for root in &spec.roots {
            from.push(self.root(root)?);
        }

        let mut select = Vec::new();
        for (index, selection) in spec.select.selections.iter().enumerate() {
            match context {
                SelectionContext::Derived => {
                    let name = derived_column_name(index, selection);
                    let mut exprs = self.selection(selection, context)?;
                    if let [only] = exprs.as_mut_slice() {
                        only.alias = Some(name);
                    }
                    select.extend(exprs);
                }
                _ => select.extend(self.selection(selection, context)?),
            }
        }

        let mut query = Query::new().select(select);
        query.distinct = spec.select.distinct;
        query.from = from;
        if let Some(predicate) = &spec.where_clause {
            query = query.filter(self.predicate(predicate)?);
        }
        if !spec.group_by.is_empty() {
            let group_by = spec
                .group_by
                .iter()
                .map(|expr| self.expr(expr))
                .collect::<RenderResult<Vec<_>>>()?;
            query = query.group_by(group_by);
        }
        if let Some(predicate) = &spec.having {
            query = query.having(self.predicate(predicate)?);
        }
        let order_by = self.order_by(&spec.order_by)?;
        let pagination = self.pagination(spec.offset.as_ref(), spec.fetch.as_ref())?;
        Ok(query.order_by(order_by).paginate(pagination))
    }

    fn selection(
        &mut self,
        selection: &Selection,
        context: SelectionContext,
    ) -> RenderResult<Vec<SelectExpr>> {
        match &selection.item {
            Selectable::Expr(SqmExpr::Path(path))
                if context == SelectionContext::Top && path.is_entity_reference() =>
            {
                let alias = self.alias_of(path.source)?.to_string();
                let entity = self.entity_type(path.entity.as_deref().unwrap_or_default())?;
                Ok(entity
                    .columns()
                    .into_iter()
                    .map(|column| SelectExpr::new(table_col(&alias, column)))
                    .collect())
            }
            Selectable::Expr(expr) => Ok(vec![SelectExpr::new(self.expr(expr)?)]),
            Selectable::Tuple(items) | Selectable::Instantiation { arguments: items, .. } => {
                let mut exprs = Vec::new();
                for item in items {
                    exprs.extend(self.selection(item, context)?);
                }
                Ok(exprs)
            }
        }
    }

    fn order_by(&mut self, sorts: &[SortSpecification]) -> RenderResult<Vec<OrderByExpr>> {
        sorts
            .iter()
            .map(|sort| {
                let expr = self.expr(&sort.expr)?;
                let order = match sort.direction {
                    SortDirection::Ascending => OrderByExpr::new(expr),
                    SortDirection::Descending => OrderByExpr::desc(expr),
                };
                Ok(match sort.nulls {
                    Some(NullPrecedence::First) => order.nulls_first(),
                    Some(NullPrecedence::Last) => order.nulls_last(),
                    None => order,
                })
            })
            .collect()
    }

    fn pagination(
        &mut self,
        offset: Option<&SqmExpr>,
        fetch: Option<&FetchSpec>,
    ) -> RenderResult<Pagination> {
        if offset.is_some() && !self.dialect.supports_offset() {
            return Err(self.unsupported("OFFSET"));
        }
        if let Some(fetch) = fetch {
            if fetch.with_ties && !self.dialect.supports_fetch_with_ties() {
                return Err(self.unsupported("FETCH ... WITH TIES"));
            }
            if fetch.percent && !self.dialect.supports_fetch_percent() {
                return Err(self.unsupported("FETCH ... PERCENT"));
            }
        }
        Ok(Pagination {
            offset: offset.map(|expr| self.expr(expr)).transpose()?,
            fetch: fetch.map(|fetch| self.expr(&fetch.count)).transpose()?,
            with_ties: fetch.is_some_and(|fetch| fetch.with_ties),
            percent: fetch.is_some_and(|fetch| fetch.percent),
        })
    }

    // ========================================================================
    // From clause
    // ========================================================================

    fn root(&mut self, root: &SqmRoot) -> RenderResult<FromItem> {
        let table = match &root.source {
            RootSource::Entity(name) => {
                let table = self.entity_type(name)?.table.clone();
                let alias = self.register(root.id, name, Some(name.clone()));
                TableFactor::table(&table, &alias)
            }
            RootSource::Cte { name, .. } => {
                let alias = self.register(root.id, name, None);
                TableFactor::table(name, &alias)
            }
            RootSource::Derived { query, .. } => {
                let alias = self.register(root.id, "d", None);
                let query = self.query_part(query, SelectionContext::Derived)?;
                TableFactor::derived(query, &alias)
            }
        };

        let mut item = FromItem::new(table);
        for join in &root.joins {
            item = self.join(root.id, join, item)?;
        }
        Ok(item)
    }

    /// Append `join` and its nested joins to `item`, parents first.
    fn join(&mut self, parent: NodeId, join: &SqmJoin, item: FromItem) -> RenderResult<FromItem> {
        let join_type = match join.kind {
            SqmJoinKind::Inner => JoinType::Inner,
            SqmJoinKind::Left => JoinType::Left,
            SqmJoinKind::Right => JoinType::Right,
            SqmJoinKind::Full if !self.dialect.supports_full_outer_join() => {
                return Err(self.unsupported("FULL JOIN"))
            }
            SqmJoinKind::Full => JoinType::Full,
            SqmJoinKind::Cross => JoinType::Cross,
        };

        let (table, association) = match &join.target {
            JoinTarget::Attribute {
                attribute, entity, ..
            } => {
                let target = self.entity_type(entity)?.table.clone();
                let alias = self.register(join.id, entity, Some(entity.clone()));
                let on = self.association_condition(parent, attribute, &alias)?;
                (TableFactor::table(&target, &alias), Some(on))
            }
            JoinTarget::Entity(entity) => {
                let target = self.entity_type(entity)?.table.clone();
                let alias = self.register(join.id, entity, Some(entity.clone()));
                (TableFactor::table(&target, &alias), None)
            }
            JoinTarget::Derived { query, .. } => {
                let alias = self.register(join.id, "d", None);
                let query = self.query_part(query, SelectionContext::Derived)?;
                (TableFactor::derived(query, &alias), None)
            }
        };

        let condition = join
            .condition
            .as_ref()
            .map(|predicate| self.junction_operand(predicate))
            .transpose()?;
        let on = match (association, condition) {
            _ if join_type == JoinType::Cross => None,
            (Some(association), Some(condition)) => Some(association.and(condition)),
            (Some(on), None) | (None, Some(on)) => Some(on),
            (None, None) => Some(lit_int(1).eq(lit_int(1))),
        };

        let mut item = item.join(join_type, table, on);
        for nested in &join.joins {
            item = self.join(join.id, nested, item)?;
        }
        Ok(item)
    }

    /// `ON` condition linking an association target to its owner.
    fn association_condition(
        &self,
        parent: NodeId,
        attribute: &str,
        target_alias: &str,
    ) -> RenderResult<Expr> {
        let source = self.source(parent)?;
        let owner_alias = source.alias.clone();
        let owner = self.entity_type(source.entity.as_deref().unwrap_or_default())?;
        match self.attribute(owner, attribute)? {
            Attribute::ToOne {
                target,
                join_column,
                ..
            } => {
                let target = self.entity_type(target)?;
                Ok(table_col(target_alias, target.id_column())
                    .eq(table_col(&owner_alias, join_column)))
            }
            Attribute::ToMany { key_column, .. } => Ok(table_col(target_alias, key_column)
                .eq(table_col(&owner_alias, owner.id_column()))),
            Attribute::Basic { .. } => Err(RenderError::Unsupported {
                feature: format!("join on basic attribute '{attribute}'"),
                dialect: self.dialect.name(),
            }),
        }
    }

    /// Allocate the SQL alias of a from-element.
    fn register(&mut self, id: NodeId, name: &str, entity: Option<String>) -> String {
        let alias = self.next_alias(name);
        self.sources.insert(
            id,
            Source {
                alias: alias.clone(),
                entity,
            },
        );
        alias
    }

    fn next_alias(&mut self, name: &str) -> String {
        let stem = name
            .chars()
            .find(|c| c.is_ascii_alphabetic())
            .map(|c| c.to_ascii_lowercase())
            .unwrap_or('t');
        let counter = self.counters.entry(stem).or_insert(0);
        *counter += 1;
        format!("{stem}{counter}_0")
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    fn expr(&mut self, expr: &SqmExpr) -> RenderResult<Expr> {
        match expr {
            SqmExpr::Literal(literal) => literal_expr(literal),
            SqmExpr::Parameter(parameter) => Ok(Expr::Parameter(ParameterSlot {
                id: parameter.id,
                label: parameter.label(),
            })),
            SqmExpr::Path(path) => self.path(path),
            SqmExpr::Function(function) => self.function(function),
            SqmExpr::Unit(unit) => Ok(Expr::Raw(unit.to_string())),
            SqmExpr::CastTarget(target) => Ok(Expr::Raw(self.cast_type_name(target)?)),
            SqmExpr::Star => Ok(Expr::Star { table: None }),
            SqmExpr::Arithmetic {
                op: ArithmeticOperator::Modulo,
                left,
                right,
                ..
            } => {
                let arguments = vec![self.expr(left)?, self.expr(right)?];
                self.invoke("mod", false, arguments)
            }
            SqmExpr::Arithmetic {
                op, left, right, ..
            } => {
                let precedence = precedence(*op);
                let left = self.operand(left, |inner| inner < precedence)?;
                let right = self.operand(right, |inner| inner <= precedence)?;
                let op = match op {
                    ArithmeticOperator::Add => BinaryOperator::Plus,
                    ArithmeticOperator::Subtract => BinaryOperator::Minus,
                    ArithmeticOperator::Multiply => BinaryOperator::Mul,
                    _ => BinaryOperator::Div,
                };
                Ok(Expr::BinaryOp {
                    left: Box::new(left),
                    op,
                    right: Box::new(right),
                })
            }
            SqmExpr::Concat { left, right } => Ok(self.expr(left)?.concat(self.expr(right)?)),
            SqmExpr::Negate(inner) => Ok(Expr::UnaryOp {
                op: UnaryOperator::Minus,
                expr: Box::new(self.operand(inner, |_| true)?),
            }),
            SqmExpr::Case(case) => {
                let (operand, when_clauses) = match &case.branches {
                    SqmCaseBranches::Searched(whens) => {
                        let mut clauses = Vec::with_capacity(whens.len());
                        for (when, then) in whens {
                            clauses.push((self.predicate(when)?, self.expr(then)?));
                        }
                        (None, clauses)
                    }
                    SqmCaseBranches::Simple { operand, whens } => {
                        let operand = self.expr(operand)?;
                        let mut clauses = Vec::with_capacity(whens.len());
                        for (when, then) in whens {
                            clauses.push((self.expr(when)?, self.expr(then)?));
                        }
                        (Some(Box::new(operand)), clauses)
                    }
                };
                let else_clause = case
                    .otherwise
                    .as_deref()
                    .map(|otherwise| self.expr(otherwise).map(Box::new))
                    .transpose()?;
                Ok(Expr::Case {
                    operand,
                    when_clauses,
                    else_clause,
                })
            }
            SqmExpr::Subquery(subquery) => Ok(Expr::Subquery(Box::new(
                self.query_part(&subquery.query, SelectionContext::Nested)?,
            ))),
        }
    }

    /// Lower an arithmetic operand, parenthesized when `needs_parens`
    /// accepts the precedence of a nested arithmetic operator.
    fn operand(&mut self, expr: &SqmExpr, needs_parens: impl Fn(u8) -> bool) -> RenderResult<Expr> {
        let lowered = self.expr(expr)?;
        Ok(match expr {
            SqmExpr::Arithmetic { op, .. }
                if *op != ArithmeticOperator::Modulo && needs_parens(precedence(*op)) =>
            {
                lowered.paren()
            }
            _ => lowered,
        })
    }

    fn path(&self, path: &SqmPath) -> RenderResult<Expr> {
        let alias = self.alias_of(path.source)?;
        match (&path.entity, &path.attribute) {
            (Some(entity), Some(attribute)) => {
                let owner = self.entity_type(entity)?;
                match self.attribute(owner, attribute)?.column() {
                    Some(column) => Ok(table_col(alias, column)),
                    None => Err(RenderError::Unsupported {
                        feature: format!("collection-valued path '{attribute}' as a value"),
                        dialect: self.dialect.name(),
                    }),
                }
            }
            (Some(entity), None) => Ok(table_col(alias, self.entity_type(entity)?.id_column())),
            (None, Some(column)) => Ok(table_col(alias, column)),
            (None, None) => Ok(Expr::Star {
                table: Some(alias.to_string()),
            }),
        }
    }

    fn function(&mut self, function: &SqmFunction) -> RenderResult<Expr> {
        let descriptor = self
            .functions
            .find(&function.name)
            .ok_or_else(|| RenderError::UnknownFunction(function.name.clone()))?;

        let FunctionRendering::Emulated(emulation) = &descriptor.rendering else {
            let arguments = function
                .arguments
                .iter()
                .map(|argument| self.expr(argument))
                .collect::<RenderResult<Vec<_>>>()?;
            return self.invoke(&function.name, function.distinct, arguments);
        };

        let unit = match function.arguments.first() {
            Some(SqmExpr::Unit(unit)) => Some(*unit),
            _ => None,
        };
        let operand_type = |index: usize| function.arguments.get(index).map(SqmExpr::ty);
        let is_timestamp = |index: usize| operand_type(index) != Some(SqmType::Date);

        let template = match (emulation, unit) {
            (Emulation::TimestampAdd, Some(unit)) => {
                self.dialect.timestampadd_pattern(unit, is_timestamp(2))?
            }
            (Emulation::TimestampDiff, Some(unit)) => {
                self.dialect
                    .timestampdiff_pattern(unit, is_timestamp(1), is_timestamp(2))?
            }
            (Emulation::Extract, Some(unit)) => self
                .dialect
                .extract_pattern(unit)
                .ok_or_else(|| self.unsupported(&format!("extract({unit})")))?,
            (Emulation::Cast, _) => "cast(?1 as ?2)".to_string(),
            (_, None) => {
                return Err(RenderError::Unsupported {
                    feature: format!("{}() without a temporal unit", function.name),
                    dialect: self.dialect.name(),
                })
            }
        };
        let template = PatternTemplate::parse(&template)?;
        let args = function
            .arguments
            .iter()
            .map(|argument| self.expr(argument))
            .collect::<RenderResult<Vec<_>>>()?;
        Ok(Expr::Pattern { template, args })
    }

    /// Render a call of the registered function `name` over lowered arguments.
    fn invoke(&self, name: &str, distinct: bool, args: Vec<Expr>) -> RenderResult<Expr> {
        let descriptor = self
            .functions
            .find(name)
            .ok_or_else(|| RenderError::UnknownFunction(name.to_string()))?;
        match &descriptor.rendering {
            FunctionRendering::Named {
                name,
                parens_when_no_args,
            } => Ok(Expr::Function {
                name: name.clone(),
                args,
                distinct,
                parens: *parens_when_no_args,
            }),
            FunctionRendering::Pattern(template) => Ok(Expr::Pattern {
                template: template.clone(),
                args,
            }),
            FunctionRendering::Emulated(_) => Err(RenderError::Unsupported {
                feature: format!("{name}() as an operator"),
                dialect: self.dialect.name(),
            }),
        }
    }

    fn cast_type_name(&self, target: &CastTarget) -> RenderResult<String> {
        cast_type_code(target)
            .and_then(|(code, size)| self.dialect.cast_type_name(code, size))
            .ok_or_else(|| RenderError::TypeName {
                ty: target.ty.name(),
                dialect: self.dialect.name(),
            })
    }

    // ========================================================================
    // Predicates
    // ========================================================================

    fn predicate(&mut self, predicate: &SqmPredicate) -> RenderResult<Expr> {
        match predicate {
            SqmPredicate::Junction { kind, predicates } => {
                let op = match kind {
                    JunctionKind::And => BinaryOperator::And,
                    JunctionKind::Or => BinaryOperator::Or,
                };
                let mut lowered: Option<Expr> = None;
                for nested in predicates {
                    let right = self.junction_operand(nested)?;
                    lowered = Some(match lowered {
                        Some(left) => Expr::BinaryOp {
                            left: Box::new(left),
                            op,
                            right: Box::new(right),
                        },
                        None => right,
                    });
                }
                // An empty conjunction holds, an empty disjunction does not.
                Ok(lowered.unwrap_or_else(|| match kind {
                    JunctionKind::And => lit_int(1).eq(lit_int(1)),
                    JunctionKind::Or => lit_int(1).eq(lit_int(0)),
                }))
            }
            SqmPredicate::Not(inner) => Ok(Expr::UnaryOp {
                op: UnaryOperator::Not,
                expr: Box::new(self.predicate(inner)?.paren()),
            }),
            SqmPredicate::Comparison { left, op, right } => {
                let op = match op {
                    ComparisonOperator::Equal => BinaryOperator::Eq,
                    ComparisonOperator::NotEqual => BinaryOperator::Ne,
                    ComparisonOperator::LessThan => BinaryOperator::Lt,
                    ComparisonOperator::LessThanOrEqual => BinaryOperator::Lte,
                    ComparisonOperator::GreaterThan => BinaryOperator::Gt,
                    ComparisonOperator::GreaterThanOrEqual => BinaryOperator::Gte,
                };
                Ok(Expr::BinaryOp {
                    left: Box::new(self.expr(left)?),
                    op,
                    right: Box::new(self.expr(right)?),
                })
            }
            SqmPredicate::IsNull { expr, negated } => Ok(Expr::IsNull {
                expr: Box::new(self.expr(expr)?),
                negated: *negated,
            }),
            SqmPredicate::IsEmpty {
                collection,
                negated,
            } => {
                let subquery = self.collection_subquery(collection, |_, _| lit_int(1))?;
                Ok(Expr::Exists {
                    subquery: Box::new(subquery),
                    negated: !negated,
                })
            }
            SqmPredicate::Between {
                expr,
                low,
                high,
                negated,
            } => Ok(Expr::Between {
                expr: Box::new(self.expr(expr)?),
                low: Box::new(self.expr(low)?),
                high: Box::new(self.expr(high)?),
                negated: *negated,
            }),
            SqmPredicate::Like {
                expr,
                pattern,
                escape,
                negated,
            } => Ok(Expr::Like {
                expr: Box::new(self.expr(expr)?),
                pattern: Box::new(self.expr(pattern)?),
                escape: escape
                    .as_ref()
                    .map(|escape| self.expr(escape).map(Box::new))
                    .transpose()?,
                negated: *negated,
            }),
            SqmPredicate::InList {
                expr,
                values,
                negated,
            } => Ok(Expr::In {
                expr: Box::new(self.expr(expr)?),
                values: values
                    .iter()
                    .map(|value| self.expr(value))
                    .collect::<RenderResult<Vec<_>>>()?,
                negated: *negated,
            }),
            SqmPredicate::InSubquery {
                expr,
                subquery,
                negated,
            } => Ok(Expr::InSubquery {
                expr: Box::new(self.expr(expr)?),
                subquery: Box::new(self.query_part(&subquery.query, SelectionContext::Nested)?),
                negated: *negated,
            }),
            SqmPredicate::MemberOf {
                expr,
                collection,
                negated,
            } => {
                let expr = self.expr(expr)?;
                let subquery = self.collection_subquery(collection, |alias, target| {
                    table_col(alias, target.id_column())
                })?;
                Ok(Expr::InSubquery {
                    expr: Box::new(expr),
                    subquery: Box::new(subquery),
                    negated: *negated,
                })
            }
            SqmPredicate::Exists { subquery, negated } => Ok(Expr::Exists {
                subquery: Box::new(self.query_part(&subquery.query, SelectionContext::Nested)?),
                negated: *negated,
            }),
            SqmPredicate::BooleanExpr(expr) => {
                let lowered = self.expr(expr)?;
                if self.dialect.supports_boolean_predicate() {
                    Ok(lowered)
                } else {
                    Ok(lowered.eq(lit_int(1)))
                }
            }
        }
    }

    /// A predicate nested in a junction, parenthesized when it is itself one.
    fn junction_operand(&mut self, predicate: &SqmPredicate) -> RenderResult<Expr> {
        let lowered = self.predicate(predicate)?;
        Ok(match predicate {
            SqmPredicate::Junction { predicates, .. } if predicates.len() > 1 => lowered.paren(),
            _ => lowered,
        })
    }

    /// `SELECT <selected> FROM <element table> WHERE <key> = <owner id>` over
    /// the elements of a to-many path.
    fn collection_subquery(
        &mut self,
        collection: &SqmPath,
        selected: impl FnOnce(&str, &EntityType) -> Expr,
    ) -> RenderResult<Query> {
        let owner_alias = self.alias_of(collection.source)?.to_string();
        let owner_name = collection.entity.clone().unwrap_or_default();
        let attribute_name = collection.attribute.clone().unwrap_or_default();

        let domain = self.domain;
        let owner = domain
            .entity(&owner_name)
            .ok_or_else(|| RenderError::UnknownEntity(owner_name.clone()))?;
        let (target, key_column) = match self.attribute(owner, &attribute_name)? {
            Attribute::ToMany { target, key_column } => (target.as_str(), key_column.as_str()),
            _ => {
                return Err(RenderError::Unsupported {
                    feature: format!("'{attribute_name}' used as a collection"),
                    dialect: self.dialect.name(),
                })
            }
        };
        let target = domain
            .entity(target)
            .ok_or_else(|| RenderError::UnknownEntity(target.to_string()))?;

        let alias = self.next_alias(&target.name);
        Ok(Query::new()
            .select(vec![selected(&alias, target)])
            .from(FromItem::new(TableFactor::table(&target.table, &alias)))
            .filter(
                table_col(&alias, key_column).eq(table_col(&owner_alias, owner.id_column())),
            ))
    }

    // ========================================================================
    // Lookups
    // ========================================================================

    fn source(&self, id: NodeId) -> RenderResult<&Source> {
        self.sources.get(&id).ok_or(RenderError::UnknownSource(id))
    }

    fn alias_of(&self, id: NodeId) -> RenderResult<&str> {
        self.source(id).map(|source| source.alias.as_str())
    }

    fn entity_type(&self, name: &str) -> RenderResult<&'a EntityType> {
        self.domain
            .entity(name)
            .ok_or_else(|| RenderError::UnknownEntity(name.to_string()))
    }

    fn attribute<'e>(&self, owner: &'e EntityType, name: &str) -> RenderResult<&'e Attribute> {
        owner
            .attribute(name)
            .ok_or_else(|| RenderError::UnknownEntity(format!("{}.{name}", owner.name)))
    }

    fn unsupported(&self, feature: &str) -> RenderError {
        RenderError::Unsupported {
            feature: feature.to_string(),
            dialect: self.dialect.name(),
        }
    }
}

fn precedence(op: ArithmeticOperator) -> u8 {
    match op {
        ArithmeticOperator::Add | ArithmeticOperator::Subtract => 1,
        _ => 2,
    }
}

fn literal_expr(literal: &SqmLiteral) -> RenderResult<Expr> {
    Ok(Expr::Literal(match literal {
        SqmLiteral::Integer(value) | SqmLiteral::Long(value) => Literal::Int(*value),
        SqmLiteral::BigInteger(digits) | SqmLiteral::BigDecimal(digits) => {
            return Ok(Expr::Raw(digits.clone()))
        }
        SqmLiteral::Float(value) | SqmLiteral::Double(value) if !value.is_finite() => {
            return Err(RenderError::NonFiniteLiteral(*value))
        }
        SqmLiteral::Float(value) | SqmLiteral::Double(value) => Literal::Float(*value),
        SqmLiteral::String(value) => Literal::String(value.clone()),
        SqmLiteral::Boolean(value) => Literal::Bool(*value),
        SqmLiteral::Null => Literal::Null,
        SqmLiteral::Date(value) => Literal::Date(value.clone()),
        SqmLiteral::Time(value) => Literal::Time(value.clone()),
        SqmLiteral::Timestamp(value) => Literal::Timestamp(value.clone()),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::StaticDomainModel;
    use crate::sqm::expr::{ParameterKind, SqmParameter};
    use crate::sqm::select::SelectClause;

    fn domain() -> StaticDomainModel {
        StaticDomainModel::new()
            .with_entity(
                EntityType::new("Person", "person")
                    .id("id", SqmType::Long)
                    .basic("age", SqmType::Integer),
            )
            .with_entity(EntityType::new("Pet", "pet").id("id", SqmType::Long))
    }

    fn age(source: u32) -> SqmExpr {
        SqmExpr::Path(SqmPath {
            source: NodeId::new(source),
            entity: Some("Person".into()),
            attribute: Some("age".into()),
            ty: SqmType::Integer,
            nullable: false,
            collection: false,
        })
    }

    fn arithmetic(op: ArithmeticOperator, left: SqmExpr, right: SqmExpr) -> SqmExpr {
        SqmExpr::Arithmetic {
            op,
            left: Box::new(left),
            right: Box::new(right),
            ty: SqmType::Integer,
        }
    }

    fn lowered(expr: &SqmExpr, dialect: Dialect) -> String {
        let domain = domain();
        let functions = {
            let mut registry = FunctionRegistry::new();
            dialect.initialize_function_registry(&mut registry);
            registry
        };
        let mut lowerer = Lowerer::new(dialect, &functions, &domain);
        lowerer.register(NodeId::new(1), "Person", Some("Person".into()));
        lowerer
            .expr(expr)
            .unwrap()
            .to_tokens_for_dialect(dialect)
            .serialize(dialect)
    }

    #[test]
    fn test_alias_counters_are_per_stem() {
        let domain = domain();
        let functions = FunctionRegistry::standard();
        let mut lowerer = Lowerer::new(Dialect::Ansi, &functions, &domain);
        assert_eq!(lowerer.register(NodeId::new(1), "Person", None), "p1_0");
        assert_eq!(lowerer.register(NodeId::new(2), "Pet", None), "p2_0");
        assert_eq!(lowerer.register(NodeId::new(3), "adults", None), "a1_0");
        assert_eq!(lowerer.register(NodeId::new(4), "_tmp", None), "t1_0");
    }

    #[test]
    fn test_arithmetic_parenthesized_by_precedence() {
        let one = SqmExpr::Literal(SqmLiteral::Integer(1));
        let sum = arithmetic(ArithmeticOperator::Add, age(1), one);
        let product = arithmetic(ArithmeticOperator::Multiply, sum.clone(), age(1));
        assert_eq!(lowered(&product, Dialect::Ansi), "(p1_0.age + 1) * p1_0.age");

        let difference = arithmetic(ArithmeticOperator::Subtract, age(1), sum);
        assert_eq!(lowered(&difference, Dialect::Ansi), "p1_0.age - (p1_0.age + 1)");
    }

    #[test]
    fn test_modulo_uses_registered_form() {
        let two = SqmExpr::Literal(SqmLiteral::Integer(2));
        let modulo = arithmetic(ArithmeticOperator::Modulo, age(1), two);
        assert_eq!(lowered(&modulo, Dialect::Postgres), "MOD(p1_0.age, 2)");
        assert_eq!(lowered(&modulo, Dialect::Sqlite), "(p1_0.age % 2)");
    }

    #[test]
    fn test_big_numbers_render_verbatim() {
        let literal = SqmExpr::Literal(SqmLiteral::BigDecimal("12345678901234567890.5".into()));
        assert_eq!(lowered(&literal, Dialect::Ansi), "12345678901234567890.5");
    }

    #[test]
    fn test_unknown_source_is_an_error() {
        let domain = domain();
        let functions = FunctionRegistry::standard();
        let lowerer = Lowerer::new(Dialect::Ansi, &functions, &domain);
        assert_eq!(
            lowerer.path(match &age(7) {
                SqmExpr::Path(path) => path,
                _ => unreachable!(),
            }),
            Err(RenderError::UnknownSource(NodeId::new(7)))
        );
    }

    #[test]
    fn test_boolean_predicate_compared_to_one() {
        let domain = domain();
        let functions = FunctionRegistry::standard();
        let predicate = SqmPredicate::BooleanExpr(SqmExpr::Parameter(SqmParameter {
            id: NodeId::new(5),
            kind: ParameterKind::Named("flag".into()),
            ty: SqmType::Boolean,
        }));
        for (dialect, expected) in [(Dialect::Postgres, "?"), (Dialect::TSql, "? = 1")] {
            let mut lowerer = Lowerer::new(dialect, &functions, &domain);
            let sql = lowerer
                .predicate(&predicate)
                .unwrap()
                .to_tokens_for_dialect(dialect)
                .serialize(dialect);
            assert_eq!(sql, expected);
        }
    }

    #[test]
    fn test_derived_selections_are_aliased() {
        let domain = domain();
        let functions = FunctionRegistry::standard();
        let mut lowerer = Lowerer::new(Dialect::Postgres, &functions, &domain);
        let spec = QuerySpec {
            select: SelectClause {
                distinct: false,
                selections: vec![
                    Selection::new(age(1)),
                    Selection::new(SqmExpr::Literal(SqmLiteral::Integer(3))),
                ],
            },
            roots: vec![SqmRoot {
                id: NodeId::new(1),
                source: RootSource::Entity("Person".into()),
                alias: None,
                joins: Vec::new(),
            }],
            ..QuerySpec::default()
        };
        let query = lowerer.query_spec(&spec, SelectionContext::Derived).unwrap();
        assert_eq!(
            query.to_sql(Dialect::Postgres),
            "SELECT p1_0.age AS age, 3 AS c1 FROM person AS p1_0"
        );
    }
}
