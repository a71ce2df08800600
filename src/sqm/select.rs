//! Select statements, query parts and the select clause.

use std::fmt;

use indexmap::IndexMap;

use super::expr::{SortSpecification, SqmExpr, SqmParameter, SqmPredicate};
use super::from::{FromKind, SqmRoot};
use super::node::{NodeBuilder, NodeId};
use super::types::SqmType;
use super::walk;

// ============================================================================
// Statement
// ============================================================================

/// Where a statement came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuerySource {
    Hql,
    Criteria,
}

/// The Java-side shape a query's rows are expected in.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ResultType {
    /// Unspecified: one selection as-is, several as an array.
    #[default]
    Object,
    Tuple,
    Array,
    /// Rows instantiate the named class from the selections.
    Class(String),
}

/// How the statement's parameters are known.
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterTracking {
    /// Accumulated during semantic analysis, in first-occurrence order.
    Tracked(Vec<SqmParameter>),
    /// Found by walking the tree each time they are requested.
    Discover,
}

pub struct SelectStatement {
    pub id: NodeId,
    pub source: QuerySource,
    pub result_type: ResultType,
    /// Named common table expressions, in declaration order.
    pub ctes: IndexMap<String, QueryPart>,
    pub query_part: QueryPart,
    pub(crate) parameters: ParameterTracking,
    pub(crate) builder: NodeBuilder,
}

impl fmt::Debug for SelectStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectStatement")
            .field("id", &self.id)
            .field("source", &self.source)
            .field("result_type", &self.result_type)
            .field("ctes", &self.ctes)
            .field("query_part", &self.query_part)
            .field("parameters", &self.parameters)
            .finish()
    }
}

impl SelectStatement {
    /// A statement produced by semantic analysis of query text.
    pub fn hql(
        builder: &NodeBuilder,
        result_type: ResultType,
        ctes: IndexMap<String, QueryPart>,
        query_part: QueryPart,
        parameters: Vec<SqmParameter>,
    ) -> Self {
        Self {
            id: builder.next_id(),
            source: QuerySource::Hql,
            result_type,
            ctes,
            query_part,
            parameters: ParameterTracking::Tracked(parameters),
            builder: builder.clone(),
        }
    }

    /// An empty statement for the builder API. Its from and select clauses
    /// must be populated before it can be rendered.
    pub fn criteria(builder: &NodeBuilder, result_type: ResultType) -> Self {
        Self {
            id: builder.next_id(),
            source: QuerySource::Criteria,
            result_type,
            ctes: IndexMap::new(),
            query_part: QueryPart::Spec(Box::default()),
            parameters: ParameterTracking::Discover,
            builder: builder.clone(),
        }
    }

    pub fn node_builder(&self) -> &NodeBuilder {
        &self.builder
    }

    pub fn parameter_tracking(&self) -> &ParameterTracking {
        &self.parameters
    }

    /// The statement's parameters, one per distinct id.
    pub fn parameters(&self) -> Vec<SqmParameter> {
        match &self.parameters {
            ParameterTracking::Tracked(parameters) => parameters.clone(),
            ParameterTracking::Discover => walk::collect_parameters(self),
        }
    }

    pub fn produces_unique_results(&self) -> bool {
        self.query_part.produces_unique_results()
    }

    pub fn contains_collection_fetches(&self) -> bool {
        self.query_part.contains_collection_fetches()
    }

    pub fn uses_distinct(&self) -> bool {
        self.query_part.uses_distinct()
    }

    /// Whether the from and select clauses of every part are populated.
    pub fn is_complete(&self) -> bool {
        self.query_part.is_complete()
    }
}

// ============================================================================
// Query Parts
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOperator {
    Union,
    Intersect,
    Except,
}

impl SetOperator {
    pub fn name(self) -> &'static str {
        match self {
            SetOperator::Union => "union",
            SetOperator::Intersect => "intersect",
            SetOperator::Except => "except",
        }
    }
}

/// `fetch first n [percent] rows {only | with ties}`
#[derive(Debug, Clone, PartialEq)]
pub struct FetchSpec {
    pub count: SqmExpr,
    pub percent: bool,
    pub with_ties: bool,
}

impl FetchSpec {
    pub fn rows(count: SqmExpr) -> Self {
        Self {
            count,
            percent: false,
            with_ties: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryPart {
    Spec(Box<QuerySpec>),
    Group(QueryGroup),
}

/// Parts combined by one set operator, with their own ordering.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryGroup {
    pub operator: SetOperator,
    pub all: bool,
    pub parts: Vec<QueryPart>,
    pub order_by: Vec<SortSpecification>,
    pub offset: Option<SqmExpr>,
    pub fetch: Option<FetchSpec>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuerySpec {
    pub select: SelectClause,
    pub roots: Vec<SqmRoot>,
    pub where_clause: Option<SqmPredicate>,
    pub group_by: Vec<SqmExpr>,
    pub having: Option<SqmPredicate>,
    pub order_by: Vec<SortSpecification>,
    pub offset: Option<SqmExpr>,
    pub fetch: Option<FetchSpec>,
}

impl QueryPart {
    /// Combine two parts, extending `self` when it is already a plain group
    /// of the same operator.
    pub fn combine(self, operator: SetOperator, all: bool, right: QueryPart) -> QueryPart {
        match self {
            QueryPart::Group(mut group)
                if group.operator == operator
                    && group.all == all
                    && group.order_by.is_empty()
                    && group.offset.is_none()
                    && group.fetch.is_none() =>
            {
                group.parts.push(right);
                QueryPart::Group(group)
            }
            left => QueryPart::Group(QueryGroup {
                operator,
                all,
                parts: vec![left, right],
                order_by: Vec::new(),
                offset: None,
                fetch: None,
            }),
        }
    }

    /// The first query spec, descending into groups.
    pub fn first_spec(&self) -> Option<&QuerySpec> {
        match self {
            QueryPart::Spec(spec) => Some(spec),
            QueryPart::Group(group) => group.parts.first().and_then(QueryPart::first_spec),
        }
    }

    pub fn first_spec_mut(&mut self) -> Option<&mut QuerySpec> {
        match self {
            QueryPart::Spec(spec) => Some(spec),
            QueryPart::Group(group) => group
                .parts
                .first_mut()
                .and_then(QueryPart::first_spec_mut),
        }
    }

    /// Explicit DISTINCT, or aggregate-only selection without GROUP BY.
    /// A group is always considered unique.
    pub fn produces_unique_results(&self) -> bool {
        match self {
            QueryPart::Spec(spec) => spec.produces_unique_results(),
            QueryPart::Group(_) => true,
        }
    }

    pub fn contains_collection_fetches(&self) -> bool {
        match self {
            QueryPart::Spec(spec) => spec.roots.iter().any(SqmRoot::contains_collection_fetches),
            QueryPart::Group(group) => group
                .parts
                .first()
                .is_some_and(QueryPart::contains_collection_fetches),
        }
    }

    pub fn uses_distinct(&self) -> bool {
        match self {
            QueryPart::Spec(spec) => spec.select.distinct,
            QueryPart::Group(group) => group.parts.first().is_some_and(QueryPart::uses_distinct),
        }
    }

    pub fn is_complete(&self) -> bool {
        match self {
            QueryPart::Spec(spec) => !spec.roots.is_empty() && !spec.select.selections.is_empty(),
            QueryPart::Group(group) => group.parts.iter().all(QueryPart::is_complete),
        }
    }

    /// Type of the single selection of the first spec.
    pub fn single_selection_type(&self) -> Option<SqmType> {
        match self.first_spec()?.select.selections.as_slice() {
            [selection] => selection.item.ty(),
            _ => None,
        }
    }

    pub fn order_by(&self) -> &[SortSpecification] {
        match self {
            QueryPart::Spec(spec) => &spec.order_by,
            QueryPart::Group(group) => &group.order_by,
        }
    }

    pub fn has_offset_or_fetch(&self) -> bool {
        match self {
            QueryPart::Spec(spec) => spec.offset.is_some() || spec.fetch.is_some(),
            QueryPart::Group(group) => group.offset.is_some() || group.fetch.is_some(),
        }
    }
}

impl QuerySpec {
    pub fn produces_unique_results(&self) -> bool {
        if self.select.distinct {
            return true;
        }
        self.group_by.is_empty()
            && !self.select.selections.is_empty()
            && self.select.selections.iter().all(|selection| {
                matches!(&selection.item, Selectable::Expr(expr) if expr.is_aggregate())
            })
    }

    /// Look up a from-element of this spec by id.
    pub fn find_from(&self, id: NodeId) -> Option<FromKind> {
        self.roots.iter().find_map(|root| root.find(id))
    }
}

// ============================================================================
// Select Clause
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectClause {
    pub distinct: bool,
    pub selections: Vec<Selection>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub item: Selectable,
    pub alias: Option<String>,
}

impl Selection {
    pub fn new(item: impl Into<Selectable>) -> Self {
        Self {
            item: item.into(),
            alias: None,
        }
    }

    pub fn with_alias(mut self, alias: &str) -> Self {
        self.alias = Some(alias.to_string());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Selectable {
    Expr(SqmExpr),
    /// Several selections returned as one tuple or array row.
    Tuple(Vec<Selection>),
    /// `new Class(a, b)`
    Instantiation {
        class: String,
        arguments: Vec<Selection>,
    },
}

impl Selectable {
    /// Type of a single-valued selection.
    pub fn ty(&self) -> Option<SqmType> {
        match self {
            Selectable::Expr(expr) => Some(expr.ty()),
            Selectable::Tuple(_) => None,
            Selectable::Instantiation { class, .. } => Some(SqmType::Entity(class.clone())),
        }
    }
}

impl From<SqmExpr> for Selectable {
    fn from(expr: SqmExpr) -> Self {
        Selectable::Expr(expr)
    }
}
