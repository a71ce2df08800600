//! Deep structural copies of SQM trees.
//!
//! Copies go through a [`CopyContext`]. Nodes with identity are remapped to
//! fresh ids, and a node copied twice under the same context yields the
//! same copy both times, so shared parameters stay shared and paths keep
//! pointing at the copied from-elements.

use std::collections::HashMap;

use super::expr::{
    SqmCase, SqmCaseBranches, SqmExpr, SqmFunction, SqmParameter, SqmPath, SqmPredicate,
    SqmSubquery, SortSpecification,
};
use super::from::{JoinTarget, RootSource, SqmJoin, SqmRoot};
use super::node::{NodeBuilder, NodeId};
use super::select::{
    FetchSpec, ParameterTracking, QueryGroup, QueryPart, QuerySpec, SelectClause,
    SelectStatement, Selectable, Selection,
};
use super::walk::{self, SqmVisitor};

#[derive(Debug)]
pub struct CopyContext {
    builder: NodeBuilder,
    parameter_blind: bool,
    /// From-elements of the tree being copied, old id to new id.
    from_ids: HashMap<NodeId, NodeId>,
    parameters: HashMap<NodeId, SqmParameter>,
    subqueries: HashMap<NodeId, SqmSubquery>,
}

impl CopyContext {
    pub fn new(builder: &NodeBuilder) -> Self {
        Self {
            builder: builder.clone(),
            parameter_blind: false,
            from_ids: HashMap::new(),
            parameters: HashMap::new(),
            subqueries: HashMap::new(),
        }
    }

    /// A context that keeps parameter identity, so bindings made against
    /// the original tree apply to the copy.
    pub fn parameter_blind(builder: &NodeBuilder) -> Self {
        Self {
            parameter_blind: true,
            ..Self::new(builder)
        }
    }

    pub fn is_parameter_blind(&self) -> bool {
        self.parameter_blind
    }

    /// The id a from-element received in the copy, if it was copied.
    pub fn copied_id(&self, original: NodeId) -> Option<NodeId> {
        self.from_ids.get(&original).copied()
    }

    /// Reserve new ids for every from-element reachable from `part`.
    fn register(&mut self, part: &QueryPart) {
        let mut collector = FromIdCollector::default();
        collector.visit_query_part(part);
        for id in collector.ids {
            if !self.from_ids.contains_key(&id) {
                let fresh = self.builder.next_id();
                self.from_ids.insert(id, fresh);
            }
        }
    }

    /// Paths into from-elements outside the copied tree keep their id.
    fn from_id(&self, original: NodeId) -> NodeId {
        self.copied_id(original).unwrap_or(original)
    }
}

#[derive(Default)]
struct FromIdCollector {
    ids: Vec<NodeId>,
}

impl SqmVisitor for FromIdCollector {
    fn visit_root(&mut self, root: &SqmRoot) {
        self.ids.push(root.id);
        walk::walk_root(self, root);
    }

    fn visit_join(&mut self, join: &SqmJoin) {
        self.ids.push(join.id);
        walk::walk_join(self, join);
    }
}

/// Deep copy under a [`CopyContext`].
pub trait SqmCopy {
    fn copy(&self, ctx: &mut CopyContext) -> Self;
}

impl<T: SqmCopy> SqmCopy for Vec<T> {
    fn copy(&self, ctx: &mut CopyContext) -> Self {
        self.iter().map(|item| item.copy(ctx)).collect()
    }
}

impl<T: SqmCopy> SqmCopy for Option<T> {
    fn copy(&self, ctx: &mut CopyContext) -> Self {
        self.as_ref().map(|item| item.copy(ctx))
    }
}

impl<T: SqmCopy> SqmCopy for Box<T> {
    fn copy(&self, ctx: &mut CopyContext) -> Self {
        Box::new(self.as_ref().copy(ctx))
    }
}

impl SelectStatement {
    /// Deep copy of the statement with fresh node ids.
    pub fn copy(&self, ctx: &mut CopyContext) -> SelectStatement {
        for cte in self.ctes.values() {
            ctx.register(cte);
        }
        ctx.register(&self.query_part);

        let ctes = self
            .ctes
            .iter()
            .map(|(name, cte)| (name.clone(), cte.copy(ctx)))
            .collect();
        let query_part = self.query_part.copy(ctx);
        let parameters = match &self.parameters {
            ParameterTracking::Tracked(parameters) => {
                ParameterTracking::Tracked(parameters.copy(ctx))
            }
            ParameterTracking::Discover => ParameterTracking::Discover,
        };

        SelectStatement {
            id: ctx.builder.next_id(),
            source: self.source,
            result_type: self.result_type.clone(),
            ctes,
            query_part,
            parameters,
            builder: self.builder.clone(),
        }
    }
}

impl SqmCopy for QueryPart {
    fn copy(&self, ctx: &mut CopyContext) -> Self {
        match self {
            QueryPart::Spec(spec) => QueryPart::Spec(spec.copy(ctx)),
            QueryPart::Group(group) => QueryPart::Group(QueryGroup {
                operator: group.operator,
                all: group.all,
                parts: group.parts.copy(ctx),
                order_by: group.order_by.copy(ctx),
                offset: group.offset.copy(ctx),
                fetch: group.fetch.copy(ctx),
            }),
        }
    }
}

impl SqmCopy for QuerySpec {
    fn copy(&self, ctx: &mut CopyContext) -> Self {
        // From-elements first so paths in the other clauses can be remapped.
        let roots = self.roots.copy(ctx);
        QuerySpec {
            select: SelectClause {
                distinct: self.select.distinct,
                selections: self.select.selections.copy(ctx),
            },
            roots,
            where_clause: self.where_clause.copy(ctx),
            group_by: self.group_by.copy(ctx),
            having: self.having.copy(ctx),
            order_by: self.order_by.copy(ctx),
            offset: self.offset.copy(ctx),
            fetch: self.fetch.copy(ctx),
        }
    }
}

impl SqmCopy for FetchSpec {
    fn copy(&self, ctx: &mut CopyContext) -> Self {
        FetchSpec {
            count: self.count.copy(ctx),
            percent: self.percent,
            with_ties: self.with_ties,
        }
    }
}

impl SqmCopy for Selection {
    fn copy(&self, ctx: &mut CopyContext) -> Self {
        let item = match &self.item {
            Selectable::Expr(expr) => Selectable::Expr(expr.copy(ctx)),
            Selectable::Tuple(items) => Selectable::Tuple(items.copy(ctx)),
            Selectable::Instantiation { class, arguments } => Selectable::Instantiation {
                class: class.clone(),
                arguments: arguments.copy(ctx),
            },
        };
        Selection {
            item,
            alias: self.alias.clone(),
        }
    }
}

impl SqmCopy for SqmRoot {
    fn copy(&self, ctx: &mut CopyContext) -> Self {
        ctx.register_missing(self.id);
        let source = match &self.source {
            RootSource::Entity(name) => RootSource::Entity(name.clone()),
            RootSource::Derived { query, columns } => RootSource::Derived {
                query: query.copy(ctx),
                columns: columns.clone(),
            },
            RootSource::Cte { name, columns } => RootSource::Cte {
                name: name.clone(),
                columns: columns.clone(),
            },
        };
        SqmRoot {
            id: ctx.from_id(self.id),
            source,
            alias: self.alias.clone(),
            joins: self.joins.copy(ctx),
        }
    }
}

impl SqmCopy for SqmJoin {
    fn copy(&self, ctx: &mut CopyContext) -> Self {
        ctx.register_missing(self.id);
        let target = match &self.target {
            JoinTarget::Derived { query, columns } => JoinTarget::Derived {
                query: query.copy(ctx),
                columns: columns.clone(),
            },
            other => other.clone(),
        };
        SqmJoin {
            id: ctx.from_id(self.id),
            kind: self.kind,
            target,
            alias: self.alias.clone(),
            fetch: self.fetch,
            implicit: self.implicit,
            condition: self.condition.copy(ctx),
            joins: self.joins.copy(ctx),
        }
    }
}

impl CopyContext {
    /// From-elements copied without a statement-level pre-pass still get a
    /// fresh id.
    fn register_missing(&mut self, id: NodeId) {
        if !self.from_ids.contains_key(&id) {
            let fresh = self.builder.next_id();
            self.from_ids.insert(id, fresh);
        }
    }
}

impl SqmCopy for SqmParameter {
    fn copy(&self, ctx: &mut CopyContext) -> Self {
        if ctx.parameter_blind {
            return self.clone();
        }
        if let Some(copied) = ctx.parameters.get(&self.id) {
            return copied.clone();
        }
        let copied = SqmParameter {
            id: ctx.builder.next_id(),
            kind: self.kind.clone(),
            ty: self.ty.clone(),
        };
        ctx.parameters.insert(self.id, copied.clone());
        copied
    }
}

impl SqmCopy for SqmPath {
    fn copy(&self, ctx: &mut CopyContext) -> Self {
        SqmPath {
            source: ctx.from_id(self.source),
            ..self.clone()
        }
    }
}

impl SqmCopy for SqmSubquery {
    fn copy(&self, ctx: &mut CopyContext) -> Self {
        if let Some(copied) = ctx.subqueries.get(&self.id) {
            return copied.clone();
        }
        let copied = SqmSubquery {
            id: ctx.builder.next_id(),
            query: self.query.copy(ctx),
            ty: self.ty.clone(),
        };
        ctx.subqueries.insert(self.id, copied.clone());
        copied
    }
}

impl SqmCopy for SortSpecification {
    fn copy(&self, ctx: &mut CopyContext) -> Self {
        SortSpecification {
            expr: self.expr.copy(ctx),
            direction: self.direction,
            nulls: self.nulls,
        }
    }
}

impl SqmCopy for SqmExpr {
    fn copy(&self, ctx: &mut CopyContext) -> Self {
        match self {
            SqmExpr::Literal(_) | SqmExpr::Unit(_) | SqmExpr::CastTarget(_) | SqmExpr::Star => {
                self.clone()
            }
            SqmExpr::Parameter(parameter) => SqmExpr::Parameter(parameter.copy(ctx)),
            SqmExpr::Path(path) => SqmExpr::Path(path.copy(ctx)),
            SqmExpr::Function(function) => SqmExpr::Function(SqmFunction {
                name: function.name.clone(),
                descriptor: function.descriptor.clone(),
                arguments: function.arguments.copy(ctx),
                distinct: function.distinct,
                ty: function.ty.clone(),
            }),
            SqmExpr::Arithmetic {
                op,
                left,
                right,
                ty,
            } => SqmExpr::Arithmetic {
                op: *op,
                left: left.copy(ctx),
                right: right.copy(ctx),
                ty: ty.clone(),
            },
            SqmExpr::Concat { left, right } => SqmExpr::Concat {
                left: left.copy(ctx),
                right: right.copy(ctx),
            },
            SqmExpr::Negate(inner) => SqmExpr::Negate(inner.copy(ctx)),
            SqmExpr::Case(case) => {
                let branches = match &case.branches {
                    SqmCaseBranches::Searched(whens) => SqmCaseBranches::Searched(
                        whens
                            .iter()
                            .map(|(when, then)| (when.copy(ctx), then.copy(ctx)))
                            .collect(),
                    ),
                    SqmCaseBranches::Simple { operand, whens } => SqmCaseBranches::Simple {
                        operand: operand.copy(ctx),
                        whens: whens
                            .iter()
                            .map(|(when, then)| (when.copy(ctx), then.copy(ctx)))
                            .collect(),
                    },
                };
                SqmExpr::Case(SqmCase {
                    branches,
                    otherwise: case.otherwise.copy(ctx),
                    ty: case.ty.clone(),
                })
            }
            SqmExpr::Subquery(subquery) => SqmExpr::Subquery(subquery.copy(ctx)),
        }
    }
}

impl SqmCopy for SqmPredicate {
    fn copy(&self, ctx: &mut CopyContext) -> Self {
        match self {
            SqmPredicate::Junction { kind, predicates } => SqmPredicate::Junction {
                kind: *kind,
                predicates: predicates.copy(ctx),
            },
            SqmPredicate::Not(inner) => SqmPredicate::Not(inner.copy(ctx)),
            SqmPredicate::Comparison { left, op, right } => SqmPredicate::Comparison {
                left: left.copy(ctx),
                op: *op,
                right: right.copy(ctx),
            },
            SqmPredicate::IsNull { expr, negated } => SqmPredicate::IsNull {
                expr: expr.copy(ctx),
                negated: *negated,
            },
            SqmPredicate::IsEmpty {
                collection,
                negated,
            } => SqmPredicate::IsEmpty {
                collection: collection.copy(ctx),
                negated: *negated,
            },
            SqmPredicate::Between {
                expr,
                low,
                high,
                negated,
            } => SqmPredicate::Between {
                expr: expr.copy(ctx),
                low: low.copy(ctx),
                high: high.copy(ctx),
                negated: *negated,
            },
            SqmPredicate::Like {
                expr,
                pattern,
                escape,
                negated,
            } => SqmPredicate::Like {
                expr: expr.copy(ctx),
                pattern: pattern.copy(ctx),
                escape: escape.copy(ctx),
                negated: *negated,
            },
            SqmPredicate::InList {
                expr,
                values,
                negated,
            } => SqmPredicate::InList {
                expr: expr.copy(ctx),
                values: values.copy(ctx),
                negated: *negated,
            },
            SqmPredicate::InSubquery {
                expr,
                subquery,
                negated,
            } => SqmPredicate::InSubquery {
                expr: expr.copy(ctx),
                subquery: subquery.copy(ctx),
                negated: *negated,
            },
            SqmPredicate::MemberOf {
                expr,
                collection,
                negated,
            } => SqmPredicate::MemberOf {
                expr: expr.copy(ctx),
                collection: collection.copy(ctx),
                negated: *negated,
            },
            SqmPredicate::Exists { subquery, negated } => SqmPredicate::Exists {
                subquery: subquery.copy(ctx),
                negated: *negated,
            },
            SqmPredicate::BooleanExpr(expr) => SqmPredicate::BooleanExpr(expr.copy(ctx)),
        }
    }
}
