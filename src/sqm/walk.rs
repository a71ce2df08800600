//! Read-only traversal of SQM trees.
//!
//! Implement [`SqmVisitor`] and override the hooks of interest; call the
//! matching `walk_*` function from an override to keep descending.

use super::expr::{SqmCaseBranches, SqmExpr, SqmParameter, SqmPath, SqmPredicate};
use super::from::{JoinTarget, RootSource, SqmJoin, SqmRoot};
use super::node::NodeId;
use super::select::{QueryPart, QuerySpec, SelectStatement, Selectable, Selection};

pub trait SqmVisitor {
    fn visit_query_part(&mut self, part: &QueryPart) {
        walk_query_part(self, part);
    }

    fn visit_query_spec(&mut self, spec: &QuerySpec) {
        walk_query_spec(self, spec);
    }

    fn visit_root(&mut self, root: &SqmRoot) {
        walk_root(self, root);
    }

    fn visit_join(&mut self, join: &SqmJoin) {
        walk_join(self, join);
    }

    fn visit_selection(&mut self, selection: &Selection) {
        walk_selection(self, selection);
    }

    fn visit_expr(&mut self, expr: &SqmExpr) {
        walk_expr(self, expr);
    }

    fn visit_predicate(&mut self, predicate: &SqmPredicate) {
        walk_predicate(self, predicate);
    }

    fn visit_path(&mut self, _path: &SqmPath) {}

    fn visit_parameter(&mut self, _parameter: &SqmParameter) {}
}

pub fn walk_statement<V: SqmVisitor + ?Sized>(visitor: &mut V, statement: &SelectStatement) {
    for cte in statement.ctes.values() {
        visitor.visit_query_part(cte);
    }
    visitor.visit_query_part(&statement.query_part);
}

pub fn walk_query_part<V: SqmVisitor + ?Sized>(visitor: &mut V, part: &QueryPart) {
    match part {
        QueryPart::Spec(spec) => visitor.visit_query_spec(spec),
        QueryPart::Group(group) => {
            for part in &group.parts {
                visitor.visit_query_part(part);
            }
            for sort in &group.order_by {
                visitor.visit_expr(&sort.expr);
            }
            if let Some(offset) = &group.offset {
                visitor.visit_expr(offset);
            }
            if let Some(fetch) = &group.fetch {
                visitor.visit_expr(&fetch.count);
            }
        }
    }
}

pub fn walk_query_spec<V: SqmVisitor + ?Sized>(visitor: &mut V, spec: &QuerySpec) {
    for selection in &spec.select.selections {
        visitor.visit_selection(selection);
    }
    for root in &spec.roots {
        visitor.visit_root(root);
    }
    if let Some(predicate) = &spec.where_clause {
        visitor.visit_predicate(predicate);
    }
    for expr in &spec.group_by {
        visitor.visit_expr(expr);
    }
    if let Some(predicate) = &spec.having {
        visitor.visit_predicate(predicate);
    }
    for sort in &spec.order_by {
        visitor.visit_expr(&sort.expr);
    }
    if let Some(offset) = &spec.offset {
        visitor.visit_expr(offset);
    }
    if let Some(fetch) = &spec.fetch {
        visitor.visit_expr(&fetch.count);
    }
}

pub fn walk_root<V: SqmVisitor + ?Sized>(visitor: &mut V, root: &SqmRoot) {
    if let RootSource::Derived { query, .. } = &root.source {
        visitor.visit_query_part(query);
    }
    for join in &root.joins {
        visitor.visit_join(join);
    }
}

pub fn walk_join<V: SqmVisitor + ?Sized>(visitor: &mut V, join: &SqmJoin) {
    if let JoinTarget::Derived { query, .. } = &join.target {
        visitor.visit_query_part(query);
    }
    if let Some(condition) = &join.condition {
        visitor.visit_predicate(condition);
    }
    for nested in &join.joins {
        visitor.visit_join(nested);
    }
}

pub fn walk_selection<V: SqmVisitor + ?Sized>(visitor: &mut V, selection: &Selection) {
    match &selection.item {
        Selectable::Expr(expr) => visitor.visit_expr(expr),
        Selectable::Tuple(items) | Selectable::Instantiation { arguments: items, .. } => {
            for item in items {
                visitor.visit_selection(item);
            }
        }
    }
}

pub fn walk_expr<V: SqmVisitor + ?Sized>(visitor: &mut V, expr: &SqmExpr) {
    match expr {
        SqmExpr::Literal(_) | SqmExpr::Unit(_) | SqmExpr::CastTarget(_) | SqmExpr::Star => {}
        SqmExpr::Parameter(parameter) => visitor.visit_parameter(parameter),
        SqmExpr::Path(path) => visitor.visit_path(path),
        SqmExpr::Function(function) => {
            for argument in &function.arguments {
                visitor.visit_expr(argument);
            }
        }
        SqmExpr::Arithmetic { left, right, .. } | SqmExpr::Concat { left, right } => {
            visitor.visit_expr(left);
            visitor.visit_expr(right);
        }
        SqmExpr::Negate(inner) => visitor.visit_expr(inner),
        SqmExpr::Case(case) => {
            match &case.branches {
                SqmCaseBranches::Searched(whens) => {
                    for (when, then) in whens {
                        visitor.visit_predicate(when);
                        visitor.visit_expr(then);
                    }
                }
                SqmCaseBranches::Simple { operand, whens } => {
                    visitor.visit_expr(operand);
                    for (when, then) in whens {
                        visitor.visit_expr(when);
                        visitor.visit_expr(then);
                    }
                }
            }
            if let Some(otherwise) = &case.otherwise {
                visitor.visit_expr(otherwise);
            }
        }
        SqmExpr::Subquery(subquery) => visitor.visit_query_part(&subquery.query),
    }
}

pub fn walk_predicate<V: SqmVisitor + ?Sized>(visitor: &mut V, predicate: &SqmPredicate) {
    match predicate {
        SqmPredicate::Junction { predicates, .. } => {
            for nested in predicates {
                visitor.visit_predicate(nested);
            }
        }
        SqmPredicate::Not(inner) => visitor.visit_predicate(inner),
        SqmPredicate::Comparison { left, right, .. } => {
            visitor.visit_expr(left);
            visitor.visit_expr(right);
        }
        SqmPredicate::IsNull { expr, .. } | SqmPredicate::BooleanExpr(expr) => {
            visitor.visit_expr(expr)
        }
        SqmPredicate::IsEmpty { collection, .. } => visitor.visit_path(collection),
        SqmPredicate::Between { expr, low, high, .. } => {
            visitor.visit_expr(expr);
            visitor.visit_expr(low);
            visitor.visit_expr(high);
        }
        SqmPredicate::Like {
            expr,
            pattern,
            escape,
            ..
        } => {
            visitor.visit_expr(expr);
            visitor.visit_expr(pattern);
            if let Some(escape) = escape {
                visitor.visit_expr(escape);
            }
        }
        SqmPredicate::InList { expr, values, .. } => {
            visitor.visit_expr(expr);
            for value in values {
                visitor.visit_expr(value);
            }
        }
        SqmPredicate::InSubquery { expr, subquery, .. } => {
            visitor.visit_expr(expr);
            visitor.visit_query_part(&subquery.query);
        }
        SqmPredicate::MemberOf {
            expr, collection, ..
        } => {
            visitor.visit_expr(expr);
            visitor.visit_path(collection);
        }
        SqmPredicate::Exists { subquery, .. } => visitor.visit_query_part(&subquery.query),
    }
}

// ============================================================================
// Collectors
// ============================================================================

/// Distinct parameters in first-occurrence order. A parameter takes the
/// first type inferred at any of its occurrences.
#[derive(Debug, Default)]
pub struct ParameterCollector {
    pub parameters: Vec<SqmParameter>,
}

impl SqmVisitor for ParameterCollector {
    fn visit_parameter(&mut self, parameter: &SqmParameter) {
        match self.parameters.iter_mut().find(|p| p.id == parameter.id) {
            Some(known) if known.ty.is_unknown() => known.ty = parameter.ty.clone(),
            Some(_) => {}
            None => self.parameters.push(parameter.clone()),
        }
    }
}

pub fn collect_parameters(statement: &SelectStatement) -> Vec<SqmParameter> {
    let mut collector = ParameterCollector::default();
    walk_statement(&mut collector, statement);
    collector.parameters
}

/// From-element ids referenced by paths, ignoring the conditions of fetch
/// joins.
#[derive(Debug, Default)]
pub struct PathSourceCollector {
    pub sources: Vec<NodeId>,
}

impl SqmVisitor for PathSourceCollector {
    fn visit_join(&mut self, join: &SqmJoin) {
        if join.fetch {
            for nested in &join.joins {
                self.visit_join(nested);
            }
        } else {
            walk_join(self, join);
        }
    }

    fn visit_path(&mut self, path: &SqmPath) {
        if !self.sources.contains(&path.source) {
            self.sources.push(path.source);
        }
    }
}

pub fn collect_path_sources(part: &QueryPart) -> Vec<NodeId> {
    let mut collector = PathSourceCollector::default();
    collector.visit_query_part(part);
    collector.sources
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqm::expr::ParameterKind;
    use crate::sqm::select::SelectClause;
    use crate::sqm::types::SqmType;

    fn param(id: u32) -> SqmExpr {
        SqmExpr::Parameter(SqmParameter {
            id: NodeId::new(id),
            kind: ParameterKind::Positional(id),
            ty: SqmType::Unknown,
        })
    }

    fn path(source: u32) -> SqmExpr {
        SqmExpr::Path(SqmPath {
            source: NodeId::new(source),
            entity: Some("Person".into()),
            attribute: Some("name".into()),
            ty: SqmType::String,
            nullable: true,
            collection: false,
        })
    }

    #[test]
    fn test_parameters_deduplicated_in_order() {
        let spec = QuerySpec {
            select: SelectClause {
                distinct: false,
                selections: vec![Selection::new(param(2))],
            },
            where_clause: Some(SqmPredicate::InList {
                expr: param(1),
                values: vec![param(2), param(3)],
                negated: false,
            }),
            ..QuerySpec::default()
        };
        let mut collector = ParameterCollector::default();
        collector.visit_query_spec(&spec);
        let ids: Vec<u32> = collector.parameters.iter().map(|p| p.id.get()).collect();
        assert_eq!(ids, vec![2, 1, 3]);
    }

    #[test]
    fn test_path_sources_skip_fetch_join_conditions() {
        let join = SqmJoin {
            id: NodeId::new(2),
            kind: crate::sqm::from::SqmJoinKind::Left,
            target: JoinTarget::Entity("Address".into()),
            alias: None,
            fetch: true,
            implicit: false,
            condition: Some(SqmPredicate::IsNull {
                expr: path(2),
                negated: false,
            }),
            joins: Vec::new(),
        };
        let spec = QuerySpec {
            select: SelectClause {
                distinct: false,
                selections: vec![Selection::new(path(1))],
            },
            roots: vec![SqmRoot {
                id: NodeId::new(1),
                source: RootSource::Entity("Person".into()),
                alias: None,
                joins: vec![join],
            }],
            ..QuerySpec::default()
        };
        let sources = collect_path_sources(&QueryPart::Spec(Box::new(spec)));
        assert_eq!(sources, vec![NodeId::new(1)]);
    }
}
