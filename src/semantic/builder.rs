//! Builds SQM trees from parse trees.
//!
//! Each query spec gets a [`Scope`] holding its from-elements. Scopes stack
//! while subqueries are built, so paths can correlate to enclosing queries.
//! Implicit joins created by path navigation are collected in the scope
//! that owns the navigated from-element and attached when that scope closes.

use std::collections::HashMap;

use indexmap::IndexMap;

use crate::domain::Cardinality;
use crate::hql::ast;
use crate::sqm::expr::{
    ArithmeticOperator, ComparisonOperator, NullPrecedence, ParameterKind, SortDirection,
    SortSpecification, SqmExpr, SqmLiteral, SqmParameter, SqmPath, SqmPredicate,
};
use crate::sqm::from::{
    DerivedColumn, FromKind, JoinTarget, RootSource, SqmJoin, SqmJoinKind, SqmRoot,
};
use crate::sqm::node::{NodeBuilder, NodeId};
use crate::sqm::select::{
    FetchSpec, QueryPart, QuerySpec, ResultType, SelectClause, SelectStatement, Selectable,
    Selection, SetOperator,
};
use crate::sqm::types::{CastTarget, SqmType};
use crate::sqm::walk;
use crate::temporal::TemporalUnit;

use super::error::{SemanticError, SemanticResult};

/// Build a select statement from a parsed statement.
pub fn build(
    statement: &ast::Statement,
    result_type: ResultType,
    builder: &NodeBuilder,
) -> SemanticResult<SelectStatement> {
    SemanticBuilder::new(builder).statement(statement, result_type)
}

#[derive(Debug)]
struct FromElement {
    id: NodeId,
    alias: Option<String>,
    kind: FromKind,
    implicit: bool,
}

#[derive(Debug, Default)]
struct Scope {
    elements: Vec<FromElement>,
    /// (parent, attribute) -> implicit join id
    implicit: HashMap<(NodeId, String), NodeId>,
    pending: Vec<(NodeId, SqmJoin)>,
    /// Aliased selections, for ORDER BY references.
    selection_aliases: Vec<(String, SqmExpr)>,
}

impl Scope {
    fn by_alias(&self, alias: &str) -> Option<&FromElement> {
        self.elements.iter().find(|element| {
            element
                .alias
                .as_deref()
                .is_some_and(|a| a.eq_ignore_ascii_case(alias))
        })
    }

    fn kind_of(&self, id: NodeId) -> Option<&FromKind> {
        self.elements
            .iter()
            .find(|element| element.id == id)
            .map(|element| &element.kind)
    }
}

struct SemanticBuilder<'a> {
    nb: &'a NodeBuilder,
    scopes: Vec<Scope>,
    ctes: HashMap<String, Vec<DerivedColumn>>,
    parameters: HashMap<ParameterKind, NodeId>,
    saw_named: bool,
    saw_positional: bool,
}

impl<'a> SemanticBuilder<'a> {
    fn new(nb: &'a NodeBuilder) -> Self {
        Self {
            nb,
            scopes: Vec::new(),
            ctes: HashMap::new(),
            parameters: HashMap::new(),
            saw_named: false,
            saw_positional: false,
        }
    }

    fn statement(
        mut self,
        statement: &ast::Statement,
        result_type: ResultType,
    ) -> SemanticResult<SelectStatement> {
        let mut ctes = IndexMap::new();
        for cte in &statement.ctes {
            let part = self.query_expr(&cte.query)?;
            self.ctes
                .insert(cte.name.name.to_ascii_lowercase(), derived_columns(&part));
            ctes.insert(cte.name.name.clone(), part);
        }

        let query_part = self.query_expr(&statement.query)?;
        let mut built = SelectStatement::hql(self.nb, result_type, ctes, query_part, Vec::new());
        let parameters = walk::collect_parameters(&built);
        built.parameters = crate::sqm::select::ParameterTracking::Tracked(parameters);
        Ok(built)
    }

    // ========================================================================
    // Query Expressions
    // ========================================================================

    fn query_expr(&mut self, expr: &ast::QueryExpr) -> SemanticResult<QueryPart> {
        match expr {
            ast::QueryExpr::Ordered(ordered) => self.ordered_query(ordered),
            ast::QueryExpr::SetOp {
                left,
                op,
                all,
                right,
            } => {
                let left = self.query_expr(left)?;
                let right = self.query_expr(right)?;
                let operator = match op {
                    ast::SetOperator::Union => SetOperator::Union,
                    ast::SetOperator::Intersect => SetOperator::Intersect,
                    ast::SetOperator::Except => SetOperator::Except,
                };
                Ok(left.combine(operator, *all, right))
            }
        }
    }

    fn ordered_query(&mut self, ordered: &ast::OrderedQuery) -> SemanticResult<QueryPart> {
        match &ordered.body {
            ast::QueryBody::Spec(spec) => {
                self.scopes.push(Scope::default());
                let built = self.query_spec(spec, ordered);
                let scope = self.scopes.pop();
                let mut spec = built?;
                if let Some(scope) = scope {
                    attach_pending(&mut spec.roots, scope.pending)?;
                }
                Ok(QueryPart::Spec(Box::new(spec)))
            }
            ast::QueryBody::Nested(nested) => {
                let mut part = self.query_expr(nested)?;
                if !ordered.order_by.is_empty() {
                    let sorts = self.positional_sorts(&part, &ordered.order_by)?;
                    match &mut part {
                        QueryPart::Spec(spec) => spec.order_by = sorts,
                        QueryPart::Group(group) => group.order_by = sorts,
                    }
                }
                let (offset, fetch) = self.pagination(ordered)?;
                match &mut part {
                    QueryPart::Spec(spec) => {
                        spec.offset = offset.or(spec.offset.take());
                        spec.fetch = fetch.or(spec.fetch.take());
                    }
                    QueryPart::Group(group) => {
                        group.offset = offset.or(group.offset.take());
                        group.fetch = fetch.or(group.fetch.take());
                    }
                }
                Ok(part)
            }
        }
    }

    /// Sort items of a set operation, which can only name selections by
    /// alias or position.
    fn positional_sorts(
        &mut self,
        part: &QueryPart,
        sorts: &[ast::SortSpec],
    ) -> SemanticResult<Vec<SortSpecification>> {
        let aliases: Vec<Option<String>> = part
            .first_spec()
            .map(|spec| {
                spec.select
                    .selections
                    .iter()
                    .map(|s| s.alias.clone())
                    .collect()
            })
            .unwrap_or_default();

        sorts
            .iter()
            .map(|sort| {
                let expr = match &sort.expr {
                    ast::Expr::Path(segments) if segments.len() == 1 => {
                        let name = &segments[0].name;
                        let position = aliases
                            .iter()
                            .position(|a| a.as_deref().is_some_and(|a| a.eq_ignore_ascii_case(name)))
                            .ok_or_else(|| SemanticError::path_resolution(name, name))?;
                        SqmExpr::Literal(SqmLiteral::Integer(position as i64 + 1))
                    }
                    other => self.expr(other)?,
                };
                Ok(sort_specification(expr, sort))
            })
            .collect()
    }

    fn pagination(
        &mut self,
        ordered: &ast::OrderedQuery,
    ) -> SemanticResult<(Option<SqmExpr>, Option<FetchSpec>)> {
        let offset = match &ordered.offset {
            Some(offset) => Some(self.row_count(offset)?),
            None => None,
        };
        let fetch = match (&ordered.fetch, &ordered.limit) {
            (Some(fetch), _) => Some(FetchSpec {
                count: self.row_count(&fetch.count)?,
                percent: fetch.percent,
                with_ties: fetch.with_ties,
            }),
            (None, Some(limit)) => Some(FetchSpec::rows(self.row_count(limit)?)),
            (None, None) => None,
        };
        Ok((offset, fetch))
    }

    fn row_count(&mut self, expr: &ast::Expr) -> SemanticResult<SqmExpr> {
        let mut count = self.expr(expr)?;
        count.infer_parameter_type(&SqmType::Integer);
        Ok(count)
    }

    fn query_spec(
        &mut self,
        spec: &ast::QuerySpec,
        ordered: &ast::OrderedQuery,
    ) -> SemanticResult<QuerySpec> {
        let mut roots = Vec::new();
        for root in &spec.from {
            let built = self.from_root(root, &mut roots)?;
            roots.push(built);
        }

        let select = match &spec.select {
            Some(select) => SelectClause {
                distinct: select.distinct,
                selections: select
                    .selections
                    .iter()
                    .map(|s| self.selection(s))
                    .collect::<SemanticResult<_>>()?,
            },
            None => SelectClause {
                distinct: false,
                selections: self.implicit_selection(&roots)?,
            },
        };
        if select.selections.is_empty() {
            return Err(SemanticError::EmptySelection);
        }
        let aliases: Vec<(String, SqmExpr)> = select
            .selections
            .iter()
            .filter_map(|s| match (&s.alias, &s.item) {
                (Some(alias), Selectable::Expr(expr)) => Some((alias.clone(), expr.clone())),
                _ => None,
            })
            .collect();
        self.current_scope()?.selection_aliases = aliases;

        let where_clause = match &spec.where_clause {
            Some(predicate) => Some(self.predicate(predicate)?),
            None => None,
        };
        let group_by = spec
            .group_by
            .iter()
            .map(|e| self.expr(e))
            .collect::<SemanticResult<Vec<_>>>()?;
        let having = match &spec.having {
            Some(predicate) => Some(self.predicate(predicate)?),
            None => None,
        };
        let order_by = ordered
            .order_by
            .iter()
            .map(|sort| {
                let expr = self.sort_expr(&sort.expr)?;
                Ok(sort_specification(expr, sort))
            })
            .collect::<SemanticResult<Vec<_>>>()?;
        let (offset, fetch) = self.pagination(ordered)?;

        Ok(QuerySpec {
            select,
            roots,
            where_clause,
            group_by,
            having,
            order_by,
            offset,
            fetch,
        })
    }

    /// With no select clause, the roots themselves are selected.
    fn implicit_selection(&self, roots: &[SqmRoot]) -> SemanticResult<Vec<Selection>> {
        Ok(roots
            .iter()
            .map(|root| Selection::new(SqmExpr::Path(self.nb.entity_path(root.id, &root.kind()))))
            .collect())
    }

    fn selection(&mut self, selection: &ast::Selection) -> SemanticResult<Selection> {
        let item = match &selection.item {
            ast::SelectItem::Expr(expr) => {
                if matches!(expr, ast::Expr::Subquery(_)) && self.nb.jpa_compliance() {
                    return Err(SemanticError::JpaCompliance(
                        "subqueries in the select clause".to_string(),
                    ));
                }
                Selectable::Expr(self.expr(expr)?)
            }
            ast::SelectItem::Instantiation { class, arguments } => Selectable::Instantiation {
                class: dotted(class),
                arguments: arguments
                    .iter()
                    .map(|a| self.selection(a))
                    .collect::<SemanticResult<_>>()?,
            },
        };
        Ok(Selection {
            item,
            alias: selection.alias.as_ref().map(|a| a.name.clone()),
        })
    }

    fn sort_expr(&mut self, expr: &ast::Expr) -> SemanticResult<SqmExpr> {
        if let ast::Expr::Path(segments) = expr {
            if let [single] = segments.as_slice() {
                let scope = self.current_scope()?;
                if scope.by_alias(&single.name).is_none() {
                    let selected = scope
                        .selection_aliases
                        .iter()
                        .find(|(alias, _)| alias.eq_ignore_ascii_case(&single.name))
                        .map(|(_, expr)| expr.clone());
                    if let Some(selected) = selected {
                        return Ok(selected);
                    }
                }
            }
        }
        self.expr(expr)
    }

    // ========================================================================
    // From Clause
    // ========================================================================

    fn from_root(
        &mut self,
        root: &ast::FromRoot,
        previous: &mut [SqmRoot],
    ) -> SemanticResult<SqmRoot> {
        let id = self.nb.next_id();
        let source = match &root.source {
            ast::RootSource::Entity(name) => self.named_source(name)?,
            ast::RootSource::Subquery(query) => {
                let part = self.query_expr(query)?;
                let columns = derived_columns(&part);
                RootSource::Derived {
                    query: Box::new(part),
                    columns,
                }
            }
        };
        let alias = root.alias.as_ref().map(|a| a.name.clone());
        let mut built = SqmRoot {
            id,
            source,
            alias: alias.clone(),
            joins: Vec::new(),
        };
        self.register(id, alias, built.kind(), false)?;

        for join in &root.joins {
            self.join(join, &mut built, previous)?;
        }
        Ok(built)
    }

    /// Resolve a from-clause name to a CTE or an entity.
    fn named_source(&self, name: &[ast::Ident]) -> SemanticResult<RootSource> {
        let full = dotted(name);
        if let Some(columns) = self.ctes.get(&full.to_ascii_lowercase()) {
            return Ok(RootSource::Cte {
                name: full,
                columns: columns.clone(),
            });
        }
        Ok(RootSource::Entity(self.entity_name(&full)?))
    }

    /// Entity names may be written fully qualified.
    fn entity_name(&self, name: &str) -> SemanticResult<String> {
        let domain = self.nb.domain();
        if domain.entity(name).is_some() {
            return Ok(name.to_string());
        }
        let simple = name.rsplit('.').next().unwrap_or(name);
        if domain.entity(simple).is_some() {
            return Ok(simple.to_string());
        }
        Err(SemanticError::UnknownEntity(name.to_string()))
    }

    fn join(
        &mut self,
        join: &ast::JoinDef,
        root: &mut SqmRoot,
        previous: &mut [SqmRoot],
    ) -> SemanticResult<()> {
        let kind = match join.kind {
            ast::JoinKind::Inner => SqmJoinKind::Inner,
            ast::JoinKind::Left => SqmJoinKind::Left,
            ast::JoinKind::Right => SqmJoinKind::Right,
            ast::JoinKind::Full => SqmJoinKind::Full,
            ast::JoinKind::Cross => SqmJoinKind::Cross,
        };
        let alias = join.alias.as_ref().map(|a| a.name.clone());

        let (parent, target) = match &join.target {
            ast::JoinTarget::Named(segments) => self.join_target(segments, root.id)?,
            ast::JoinTarget::Subquery(query) => {
                let part = self.query_expr(query)?;
                let columns = derived_columns(&part);
                (
                    root.id,
                    JoinTarget::Derived {
                        query: Box::new(part),
                        columns,
                    },
                )
            }
        };

        let id = self.nb.next_id();
        let from_kind = match &target {
            JoinTarget::Attribute { entity, .. } | JoinTarget::Entity(entity) => {
                FromKind::Entity(entity.clone())
            }
            JoinTarget::Derived { columns, .. } => FromKind::Derived(columns.clone()),
        };
        self.register(id, alias.clone(), from_kind, false)?;

        let condition = match &join.condition {
            Some(condition) => Some(self.predicate(condition)?),
            None => None,
        };

        let built = SqmJoin {
            id,
            kind,
            target,
            alias,
            fetch: join.fetch,
            implicit: false,
            condition,
            joins: Vec::new(),
        };
        let mut built = match root.attach(parent, built) {
            Ok(()) => return Ok(()),
            Err(built) => built,
        };
        for other in previous.iter_mut() {
            match other.attach(parent, built) {
                Ok(()) => return Ok(()),
                Err(returned) => built = returned,
            }
        }
        // The parent is an implicit join still waiting to be attached.
        self.current_scope()?.pending.push((parent, built));
        Ok(())
    }

    /// Decide whether a join names an association path or an entity.
    fn join_target(
        &mut self,
        segments: &[ast::Ident],
        root: NodeId,
    ) -> SemanticResult<(NodeId, JoinTarget)> {
        let display = dotted(segments);
        let qualified = segments.len() > 1
            && self
                .scopes
                .last()
                .and_then(|scope| scope.by_alias(&segments[0].name))
                .is_some();

        if !qualified {
            let source = self.named_source(segments)?;
            return match source {
                RootSource::Entity(entity) => Ok((root, JoinTarget::Entity(entity))),
                RootSource::Cte { columns, name } => Ok((
                    root,
                    JoinTarget::Derived {
                        query: Box::new(self.cte_reference(&name)?),
                        columns,
                    },
                )),
                RootSource::Derived { .. } => Err(SemanticError::Internal(format!(
                    "unexpected derived source for '{display}'"
                ))),
            };
        }

        let mut source = self
            .scopes
            .last()
            .and_then(|scope| scope.by_alias(&segments[0].name))
            .map(|element| element.id)
            .ok_or_else(|| SemanticError::path_resolution(&display, &segments[0].name))?;
        let (last, middle) = match segments[1..].split_last() {
            Some(split) => split,
            None => return Err(SemanticError::path_resolution(&display, &segments[0].name)),
        };
        for segment in middle {
            source = self.navigate(source, &segment.name, &display)?;
        }

        let kind = self.kind_of(source)?;
        let path = self
            .nb
            .attribute_path(source, &kind, &last.name, &display)?;
        let entity = match path.ty.entity_name() {
            Some(entity) => entity.to_string(),
            None => {
                return Err(SemanticError::TerminalPath {
                    path: display,
                    attribute: last.name.clone(),
                })
            }
        };
        Ok((
            source,
            JoinTarget::Attribute {
                attribute: last.name.clone(),
                entity,
                collection: path.collection,
            },
        ))
    }

    /// A CTE joined by name: a spec selecting every CTE column.
    fn cte_reference(&self, name: &str) -> SemanticResult<QueryPart> {
        let columns = self
            .ctes
            .get(&name.to_ascii_lowercase())
            .cloned()
            .ok_or_else(|| SemanticError::UnknownEntity(name.to_string()))?;
        let id = self.nb.next_id();
        let selections = columns
            .iter()
            .map(|column| {
                Selection::new(SqmExpr::Path(SqmPath {
                    source: id,
                    entity: None,
                    attribute: Some(column.name.clone()),
                    ty: column.ty.clone(),
                    nullable: true,
                    collection: false,
                }))
                .with_alias(&column.name)
            })
            .collect();
        Ok(QueryPart::Spec(Box::new(QuerySpec {
            select: SelectClause {
                distinct: false,
                selections,
            },
            roots: vec![SqmRoot {
                id,
                source: RootSource::Cte {
                    name: name.to_string(),
                    columns,
                },
                alias: None,
                joins: Vec::new(),
            }],
            ..QuerySpec::default()
        })))
    }

    fn register(
        &mut self,
        id: NodeId,
        alias: Option<String>,
        kind: FromKind,
        implicit: bool,
    ) -> SemanticResult<()> {
        self.current_scope()?.elements.push(FromElement {
            id,
            alias,
            kind,
            implicit,
        });
        Ok(())
    }

    fn current_scope(&mut self) -> SemanticResult<&mut Scope> {
        self.scopes
            .last_mut()
            .ok_or_else(|| SemanticError::Internal("no open query scope".to_string()))
    }

    fn kind_of(&self, id: NodeId) -> SemanticResult<FromKind> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.kind_of(id))
            .cloned()
            .ok_or_else(|| SemanticError::Internal(format!("unknown from-element {id}")))
    }

    // ========================================================================
    // Paths
    // ========================================================================

    /// Navigate the to-one association `attribute` of `source`, reusing or
    /// creating an implicit inner join.
    fn navigate(&mut self, source: NodeId, attribute: &str, display: &str) -> SemanticResult<NodeId> {
        let kind = self.kind_of(source)?;
        let path = self.nb.attribute_path(source, &kind, attribute, display)?;
        if path.collection {
            return Err(SemanticError::PluralAttributeDereference {
                path: display.to_string(),
                attribute: attribute.to_string(),
            });
        }
        let Some(entity) = path.ty.entity_name().map(str::to_string) else {
            return Err(SemanticError::TerminalPath {
                path: display.to_string(),
                attribute: attribute.to_string(),
            });
        };

        let owner = self
            .scopes
            .iter()
            .rposition(|scope| scope.kind_of(source).is_some())
            .ok_or_else(|| SemanticError::Internal(format!("unknown from-element {source}")))?;
        let key = (source, attribute.to_string());
        if let Some(existing) = self.scopes[owner].implicit.get(&key) {
            return Ok(*existing);
        }

        let id = self.nb.next_id();
        let join = SqmJoin {
            id,
            kind: SqmJoinKind::Inner,
            target: JoinTarget::Attribute {
                attribute: attribute.to_string(),
                entity: entity.clone(),
                collection: false,
            },
            alias: None,
            fetch: false,
            implicit: true,
            condition: None,
            joins: Vec::new(),
        };
        let scope = &mut self.scopes[owner];
        scope.implicit.insert(key, id);
        scope.pending.push((source, join));
        scope.elements.push(FromElement {
            id,
            alias: None,
            kind: FromKind::Entity(entity),
            implicit: true,
        });
        Ok(id)
    }

    /// Resolve a dotted path. Collection-valued results are returned as-is;
    /// callers that cannot use them reject them.
    fn path(&mut self, segments: &[ast::Ident]) -> SemanticResult<SqmPath> {
        let display = dotted(segments);
        let first = &segments[0].name;

        let aliased = self
            .scopes
            .iter()
            .rev()
            .find_map(|scope| scope.by_alias(first))
            .map(|element| element.id);
        let (mut source, rest) = match aliased {
            Some(id) => (id, &segments[1..]),
            None => (self.declaring_element(first, &display)?, segments),
        };

        let Some((last, middle)) = rest.split_last() else {
            let kind = self.kind_of(source)?;
            return Ok(self.nb.entity_path(source, &kind));
        };

        for (index, segment) in middle.iter().enumerate() {
            // `p.address.id` reads the foreign key instead of joining.
            if index + 1 == middle.len() {
                if let Some(path) = self.foreign_key_path(source, &segment.name, &last.name)? {
                    return Ok(path);
                }
            }
            source = self.navigate(source, &segment.name, &display)?;
        }

        let kind = self.kind_of(source)?;
        self.nb.attribute_path(source, &kind, &last.name, &display)
    }

    fn foreign_key_path(
        &self,
        source: NodeId,
        association: &str,
        attribute: &str,
    ) -> SemanticResult<Option<SqmPath>> {
        let FromKind::Entity(name) = self.kind_of(source)? else {
            return Ok(None);
        };
        let domain = self.nb.domain();
        let Some(entity) = domain.entity(&name) else {
            return Ok(None);
        };
        let Some(resolved) = entity.attribute(association) else {
            return Ok(None);
        };
        if resolved.is_basic() || resolved.cardinality() == Cardinality::Collection {
            return Ok(None);
        }
        let Some(target) = resolved.target().and_then(|t| domain.entity(t)) else {
            return Ok(None);
        };
        if target.id != attribute {
            return Ok(None);
        }
        Ok(Some(SqmPath {
            source,
            entity: Some(name.clone()),
            attribute: Some(association.to_string()),
            ty: target.id_type(),
            nullable: resolved.nullable(),
            collection: false,
        }))
    }

    /// The unique explicit from-element declaring `attribute`, innermost
    /// scope first.
    fn declaring_element(&self, attribute: &str, display: &str) -> SemanticResult<NodeId> {
        let domain = self.nb.domain();
        for scope in self.scopes.iter().rev() {
            let candidates: Vec<NodeId> = scope
                .elements
                .iter()
                .filter(|element| !element.implicit)
                .filter(|element| match &element.kind {
                    FromKind::Entity(name) => domain
                        .entity(name)
                        .is_some_and(|e| e.attribute(attribute).is_some()),
                    FromKind::Derived(columns) => columns
                        .iter()
                        .any(|c| c.name.eq_ignore_ascii_case(attribute)),
                })
                .map(|element| element.id)
                .collect();
            match candidates.as_slice() {
                [single] => return Ok(*single),
                [] => continue,
                _ => return Err(SemanticError::path_resolution(display, attribute)),
            }
        }
        Err(SemanticError::path_resolution(display, attribute))
    }

    /// A path used as a single-valued expression.
    fn value_path(&mut self, segments: &[ast::Ident]) -> SemanticResult<SqmExpr> {
        let path = self.path(segments)?;
        if path.collection {
            return Err(SemanticError::PluralAttributeDereference {
                path: dotted(segments),
                attribute: path.attribute.clone().unwrap_or_default(),
            });
        }
        Ok(SqmExpr::Path(path))
    }

    fn collection_path(&mut self, expr: &ast::Expr) -> SemanticResult<SqmExpr> {
        match expr {
            ast::Expr::Path(segments) => Ok(SqmExpr::Path(self.path(segments)?)),
            other => self.expr(other),
        }
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    fn expr(&mut self, expr: &ast::Expr) -> SemanticResult<SqmExpr> {
        match expr {
            ast::Expr::Literal(literal, _) => Ok(SqmExpr::Literal(literal_value(literal))),
            ast::Expr::Parameter(parameter, _) => self.parameter(parameter),
            ast::Expr::Path(segments) => self.value_path(segments),
            ast::Expr::Unit(ident) => ident
                .name
                .parse::<TemporalUnit>()
                .map(SqmExpr::Unit)
                .map_err(|e| SemanticError::function_argument(&ident.name, e.to_string())),
            ast::Expr::Function {
                name,
                distinct,
                arguments,
            } => {
                let arguments = arguments
                    .iter()
                    .map(|a| self.expr(a))
                    .collect::<SemanticResult<Vec<_>>>()?;
                if *distinct {
                    self.nb.function_distinct(&name.name, arguments)
                } else {
                    self.nb.function(&name.name, arguments)
                }
            }
            ast::Expr::FunctionStar { name } => self.nb.function(&name.name, vec![SqmExpr::Star]),
            ast::Expr::Cast { expr, target } => {
                let operand = self.expr(expr)?;
                self.nb.cast(operand, cast_target(target)?)
            }
            ast::Expr::Arithmetic { op, left, right } => {
                let op = match op {
                    ast::ArithmeticOp::Add => ArithmeticOperator::Add,
                    ast::ArithmeticOp::Subtract => ArithmeticOperator::Subtract,
                    ast::ArithmeticOp::Multiply => ArithmeticOperator::Multiply,
                    ast::ArithmeticOp::Divide => ArithmeticOperator::Divide,
                    ast::ArithmeticOp::Modulo => ArithmeticOperator::Modulo,
                };
                let left = self.expr(left)?;
                let right = self.expr(right)?;
                Ok(self.nb.arithmetic(op, left, right))
            }
            ast::Expr::Concat { left, right } => {
                let left = self.expr(left)?;
                let right = self.expr(right)?;
                Ok(self.nb.concat(left, right))
            }
            ast::Expr::Negate(inner) => {
                let inner = self.expr(inner)?;
                Ok(self.nb.negate(inner))
            }
            ast::Expr::Case {
                branches,
                otherwise,
            } => {
                let otherwise = match otherwise {
                    Some(otherwise) => Some(self.expr(otherwise)?),
                    None => None,
                };
                match branches {
                    ast::CaseBranches::Searched(whens) => {
                        let whens = whens
                            .iter()
                            .map(|(when, then)| Ok((self.predicate(when)?, self.expr(then)?)))
                            .collect::<SemanticResult<Vec<_>>>()?;
                        Ok(self.nb.searched_case(whens, otherwise))
                    }
                    ast::CaseBranches::Simple { operand, whens } => {
                        let operand = self.expr(operand)?;
                        let operand_ty = operand.ty();
                        let whens = whens
                            .iter()
                            .map(|(when, then)| {
                                let mut when = self.expr(when)?;
                                when.infer_parameter_type(&operand_ty);
                                Ok((when, self.expr(then)?))
                            })
                            .collect::<SemanticResult<Vec<_>>>()?;
                        Ok(self.nb.simple_case(operand, whens, otherwise))
                    }
                }
            }
            ast::Expr::Subquery(query) => {
                let part = self.query_expr(query)?;
                Ok(SqmExpr::Subquery(Box::new(self.nb.subquery_of(part))))
            }
        }
    }

    fn parameter(&mut self, parameter: &ast::Parameter) -> SemanticResult<SqmExpr> {
        let kind = match parameter {
            ast::Parameter::Named(name) => {
                self.saw_named = true;
                ParameterKind::Named(name.clone())
            }
            ast::Parameter::Positional(position) => {
                self.saw_positional = true;
                ParameterKind::Positional(*position)
            }
        };
        if self.saw_named && self.saw_positional {
            return Err(SemanticError::MixedParameters);
        }
        let id = match self.parameters.get(&kind) {
            Some(id) => *id,
            None => {
                let id = self.nb.next_id();
                self.parameters.insert(kind.clone(), id);
                id
            }
        };
        Ok(SqmExpr::Parameter(SqmParameter {
            id,
            kind,
            ty: SqmType::Unknown,
        }))
    }

    // ========================================================================
    // Predicates
    // ========================================================================

    fn predicate(&mut self, predicate: &ast::Predicate) -> SemanticResult<SqmPredicate> {
        let built = match predicate {
            ast::Predicate::And(left, right) => {
                let left = self.predicate(left)?;
                left.and(self.predicate(right)?)
            }
            ast::Predicate::Or(left, right) => {
                let left = self.predicate(left)?;
                left.or(self.predicate(right)?)
            }
            ast::Predicate::Not(inner) => self.predicate(inner)?.not(),
            ast::Predicate::Comparison { left, op, right } => {
                let op = match op {
                    ast::ComparisonOp::Eq => ComparisonOperator::Equal,
                    ast::ComparisonOp::Ne => ComparisonOperator::NotEqual,
                    ast::ComparisonOp::Lt => ComparisonOperator::LessThan,
                    ast::ComparisonOp::Lte => ComparisonOperator::LessThanOrEqual,
                    ast::ComparisonOp::Gt => ComparisonOperator::GreaterThan,
                    ast::ComparisonOp::Gte => ComparisonOperator::GreaterThanOrEqual,
                };
                let left = self.expr(left)?;
                let right = self.expr(right)?;
                self.nb.compare(left, op, right)
            }
            ast::Predicate::IsNull { expr, negated } => SqmPredicate::IsNull {
                expr: self.expr(expr)?,
                negated: *negated,
            },
            ast::Predicate::IsEmpty { expr, negated } => {
                let collection = self.collection_path(expr)?;
                negate(self.nb.is_empty(collection)?, *negated)
            }
            ast::Predicate::Between {
                expr,
                low,
                high,
                negated,
            } => {
                let expr = self.expr(expr)?;
                let low = self.expr(low)?;
                let high = self.expr(high)?;
                negate(self.nb.between(expr, low, high), *negated)
            }
            ast::Predicate::Like {
                expr,
                pattern,
                escape,
                negated,
            } => {
                let expr = self.expr(expr)?;
                let pattern = self.expr(pattern)?;
                let escape = match escape {
                    Some(escape) => {
                        let mut escape = self.expr(escape)?;
                        escape.infer_parameter_type(&SqmType::Character);
                        Some(escape)
                    }
                    None => None,
                };
                let like = self.nb.like(expr, pattern);
                let like = match like {
                    SqmPredicate::Like {
                        expr,
                        pattern,
                        negated,
                        ..
                    } => SqmPredicate::Like {
                        expr,
                        pattern,
                        escape,
                        negated,
                    },
                    other => other,
                };
                negate(like, *negated)
            }
            ast::Predicate::In {
                expr,
                list,
                negated,
            } => {
                let expr = self.expr(expr)?;
                match list {
                    ast::InList::Values(values) => {
                        let values = values
                            .iter()
                            .map(|v| self.expr(v))
                            .collect::<SemanticResult<Vec<_>>>()?;
                        negate(self.nb.in_list(expr, values), *negated)
                    }
                    ast::InList::Parameter(parameter, _) => {
                        let parameter = self.parameter(parameter)?;
                        negate(self.nb.in_list(expr, vec![parameter]), *negated)
                    }
                    ast::InList::Subquery(query) => {
                        let part = self.query_expr(query)?;
                        SqmPredicate::InSubquery {
                            expr,
                            subquery: Box::new(self.nb.subquery_of(part)),
                            negated: *negated,
                        }
                    }
                }
            }
            ast::Predicate::MemberOf {
                expr,
                collection,
                negated,
            } => {
                let expr = self.expr(expr)?;
                let collection = SqmExpr::Path(self.path(collection)?);
                negate(self.nb.member_of(expr, collection)?, *negated)
            }
            ast::Predicate::Exists(query) => {
                let part = self.query_expr(query)?;
                self.nb.exists(self.nb.subquery_of(part))
            }
            ast::Predicate::Boolean(expr) => {
                let mut expr = self.expr(expr)?;
                expr.infer_parameter_type(&SqmType::Boolean);
                SqmPredicate::BooleanExpr(expr)
            }
        };
        Ok(built)
    }
}

/// Set the `negated` flag of predicates that carry one.
fn negate(predicate: SqmPredicate, negated: bool) -> SqmPredicate {
    if !negated {
        return predicate;
    }
    match predicate {
        SqmPredicate::IsEmpty { collection, .. } => SqmPredicate::IsEmpty {
            collection,
            negated: true,
        },
        SqmPredicate::Between {
            expr, low, high, ..
        } => SqmPredicate::Between {
            expr,
            low,
            high,
            negated: true,
        },
        SqmPredicate::Like {
            expr,
            pattern,
            escape,
            ..
        } => SqmPredicate::Like {
            expr,
            pattern,
            escape,
            negated: true,
        },
        SqmPredicate::InList { expr, values, .. } => SqmPredicate::InList {
            expr,
            values,
            negated: true,
        },
        SqmPredicate::MemberOf {
            expr, collection, ..
        } => SqmPredicate::MemberOf {
            expr,
            collection,
            negated: true,
        },
        other => other.not(),
    }
}

fn attach_pending(roots: &mut [SqmRoot], pending: Vec<(NodeId, SqmJoin)>) -> SemanticResult<()> {
    for (parent, join) in pending {
        let mut join = Some(join);
        for root in roots.iter_mut() {
            if let Some(candidate) = join.take() {
                if let Err(returned) = root.attach(parent, candidate) {
                    join = Some(returned);
                }
            }
        }
        if join.is_some() {
            return Err(SemanticError::Internal(format!(
                "join parent {parent} not found in from clause"
            )));
        }
    }
    Ok(())
}

/// Columns exposed by a query used as a derived table or CTE.
pub(crate) fn derived_columns(part: &QueryPart) -> Vec<DerivedColumn> {
    let Some(spec) = part.first_spec() else {
        return Vec::new();
    };
    spec.select
        .selections
        .iter()
        .enumerate()
        .map(|(index, selection)| DerivedColumn {
            name: derived_column_name(index, selection),
            ty: selection.item.ty().unwrap_or(SqmType::Unknown),
        })
        .collect()
}

/// Column name a selection exposes to an enclosing query.
pub(crate) fn derived_column_name(index: usize, selection: &Selection) -> String {
    selection
        .alias
        .clone()
        .or_else(|| match &selection.item {
            Selectable::Expr(SqmExpr::Path(path)) => path.attribute.clone(),
            _ => None,
        })
        .unwrap_or_else(|| format!("c{index}"))
}

fn sort_specification(expr: SqmExpr, sort: &ast::SortSpec) -> SortSpecification {
    SortSpecification {
        expr,
        direction: match sort.direction {
            Some(ast::SortDirection::Descending) => SortDirection::Descending,
            _ => SortDirection::Ascending,
        },
        nulls: sort.nulls.map(|nulls| match nulls {
            ast::NullPrecedence::First => NullPrecedence::First,
            ast::NullPrecedence::Last => NullPrecedence::Last,
        }),
    }
}

fn cast_target(target: &ast::CastType) -> SemanticResult<CastTarget> {
    let ty: SqmType = target
        .name
        .name
        .parse()
        .map_err(|e: crate::sqm::types::UnknownCastType| {
            SemanticError::function_argument("cast", e.to_string())
        })?;
    let mut cast = CastTarget::new(ty);
    match target.arguments.as_slice() {
        [] => {}
        [length] if cast.ty.is_textual() || cast.ty == SqmType::Binary => {
            cast.length = Some(*length)
        }
        [precision] => cast.precision = Some(*precision),
        [precision, scale] => {
            cast.precision = Some(*precision);
            cast.scale = Some(*scale);
        }
        _ => {
            return Err(SemanticError::function_argument(
                "cast",
                "expected at most two size arguments",
            ))
        }
    }
    Ok(cast)
}

fn literal_value(literal: &ast::Literal) -> SqmLiteral {
    match literal {
        ast::Literal::Integer(v) => SqmLiteral::Integer(*v),
        ast::Literal::Long(v) => SqmLiteral::Long(*v),
        ast::Literal::BigInteger(v) => SqmLiteral::BigInteger(v.clone()),
        ast::Literal::Float(v) => SqmLiteral::Float(*v),
        ast::Literal::Double(v) => SqmLiteral::Double(*v),
        ast::Literal::BigDecimal(v) => SqmLiteral::BigDecimal(v.clone()),
        ast::Literal::String(v) => SqmLiteral::String(v.clone()),
        ast::Literal::Boolean(v) => SqmLiteral::Boolean(*v),
        ast::Literal::Null => SqmLiteral::Null,
        ast::Literal::Date(v) => SqmLiteral::Date(v.clone()),
        ast::Literal::Time(v) => SqmLiteral::Time(v.clone()),
        ast::Literal::Timestamp(v) => SqmLiteral::Timestamp(v.clone()),
    }
}

fn dotted(segments: &[ast::Ident]) -> String {
    segments
        .iter()
        .map(|segment| segment.name.as_str())
        .collect::<Vec<_>>()
        .join(".")
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::domain::{EntityType, StaticDomainModel};
    use crate::function::FunctionRegistry;
    use crate::hql;
    use crate::sqm::node::CreationOptions;

    fn builder(jpa_compliance: bool) -> NodeBuilder {
        let model = StaticDomainModel::new()
            .with_entity(
                EntityType::new("Person", "person")
                    .id("id", SqmType::Long)
                    .basic("name", SqmType::String)
                    .basic("age", SqmType::Integer)
                    .to_one("address", "Address", "address_id")
                    .to_many("phones", "Phone", "person_id"),
            )
            .with_entity(
                EntityType::new("Address", "address")
                    .id("id", SqmType::Long)
                    .basic("city", SqmType::String)
                    .to_one("country", "Country", "country_id"),
            )
            .with_entity(
                EntityType::new("Country", "country")
                    .id("id", SqmType::Long)
                    .basic("code", SqmType::String),
            )
            .with_entity(
                EntityType::new("Phone", "phone")
                    .id("id", SqmType::Long)
                    .basic("number", SqmType::String),
            );
        NodeBuilder::new(
            Arc::new(model),
            Arc::new(FunctionRegistry::standard()),
            CreationOptions { jpa_compliance },
        )
    }

    fn analyze(query: &str) -> SemanticResult<SelectStatement> {
        analyze_with(query, false)
    }

    fn analyze_with(query: &str, jpa_compliance: bool) -> SemanticResult<SelectStatement> {
        let statement = hql::parse(query).expect("query should parse");
        build(&statement, ResultType::Object, &builder(jpa_compliance))
    }

    fn spec(statement: &SelectStatement) -> &QuerySpec {
        statement.query_part.first_spec().expect("spec")
    }

    #[test]
    fn test_absent_select_selects_root() {
        let statement = analyze("from Person p").unwrap();
        let spec = spec(&statement);
        match &spec.select.selections[0].item {
            Selectable::Expr(SqmExpr::Path(path)) => {
                assert!(path.is_entity_reference());
                assert_eq!(path.source, spec.roots[0].id);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_unqualified_attribute_resolves_to_declaring_root() {
        let statement = analyze("select name from Person").unwrap();
        let spec = spec(&statement);
        match &spec.select.selections[0].item {
            Selectable::Expr(SqmExpr::Path(path)) => {
                assert_eq!(path.attribute.as_deref(), Some("name"));
                assert_eq!(path.ty, SqmType::String);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_path_errors() {
        assert!(matches!(
            analyze("select p.nickname from Person p"),
            Err(SemanticError::PathResolution { segment, .. }) if segment == "nickname"
        ));
        assert!(matches!(
            analyze("select p.name.first from Person p"),
            Err(SemanticError::TerminalPath { attribute, .. }) if attribute == "name"
        ));
        assert!(matches!(
            analyze("select p.phones.number from Person p"),
            Err(SemanticError::PluralAttributeDereference { attribute, .. }) if attribute == "phones"
        ));
        assert_eq!(
            analyze("select a from Animal a").unwrap_err(),
            SemanticError::UnknownEntity("Animal".into())
        );
    }

    #[test]
    fn test_implicit_join_created_once() {
        let statement = analyze(
            "select p.address.city from Person p where p.address.city = 'Oslo' and p.address.country.code = 'NO'",
        )
        .unwrap();
        let root = &spec(&statement).roots[0];
        assert_eq!(root.joins.len(), 1);
        let address = &root.joins[0];
        assert!(address.implicit);
        assert_eq!(address.kind, SqmJoinKind::Inner);
        assert_eq!(address.joins.len(), 1);
    }

    #[test]
    fn test_foreign_key_access_does_not_join() {
        let statement = analyze("select p.address.id from Person p").unwrap();
        assert!(spec(&statement).roots[0].joins.is_empty());
    }

    #[test]
    fn test_explicit_joins() {
        let statement =
            analyze("select ph.number from Person p left join fetch p.phones ph").unwrap();
        let join = &spec(&statement).roots[0].joins[0];
        assert_eq!(join.kind, SqmJoinKind::Left);
        assert!(join.fetch);
        assert!(join.is_collection());
        assert!(statement.contains_collection_fetches());
    }

    #[test]
    fn test_parameters_tracked_and_typed() {
        let statement =
            analyze("select p from Person p where p.name = :name or :name is null and p.age > :age")
                .unwrap();
        let parameters = statement.parameters();
        assert_eq!(parameters.len(), 2);
        assert_eq!(parameters[0].label(), ":name");
        assert_eq!(parameters[0].ty, SqmType::String);
        assert_eq!(parameters[1].ty, SqmType::Integer);
    }

    #[test]
    fn test_mixed_parameters_rejected() {
        assert_eq!(
            analyze("from Person p where p.name = :name and p.age = ?1").unwrap_err(),
            SemanticError::MixedParameters
        );
    }

    #[test]
    fn test_order_by_selection_alias() {
        let statement = analyze("select p.name as n from Person p order by n desc").unwrap();
        let spec = spec(&statement);
        assert_eq!(spec.order_by[0].direction, SortDirection::Descending);
        assert!(matches!(
            &spec.order_by[0].expr,
            SqmExpr::Path(path) if path.attribute.as_deref() == Some("name")
        ));
    }

    #[test]
    fn test_jpa_compliance_rejects_select_subquery() {
        let query = "select (select max(x.age) from Person x) from Person p";
        assert!(analyze_with(query, false).is_ok());
        assert!(matches!(
            analyze_with(query, true),
            Err(SemanticError::JpaCompliance(_))
        ));
    }

    #[test]
    fn test_correlated_subquery() {
        let statement = analyze(
            "select p.name from Person p where exists (select 1 from Phone ph where ph.number = p.name)",
        )
        .unwrap();
        let root = spec(&statement).roots[0].id;
        let mut sources = walk::collect_path_sources(&statement.query_part);
        sources.sort();
        assert!(sources.contains(&root));
    }

    #[test]
    fn test_cte_root() {
        let statement =
            analyze("with adults as (select p.name as name from Person p where p.age >= 18) select a.name from adults a")
                .unwrap();
        assert_eq!(statement.ctes.len(), 1);
        let root = &spec(&statement).roots[0];
        assert!(matches!(&root.source, RootSource::Cte { name, .. } if name == "adults"));
    }

    #[test]
    fn test_unknown_function() {
        assert_eq!(
            analyze("select frobnicate(p.name) from Person p").unwrap_err(),
            SemanticError::UnknownFunction("frobnicate".into())
        );
    }

    #[test]
    fn test_typing() {
        let statement = analyze(
            "select p.age + 1.5, p.name || 'x', case when p.age > 1 then null else 'a' end, count(p) from Person p",
        )
        .unwrap();
        let types: Vec<_> = spec(&statement)
            .select
            .selections
            .iter()
            .filter_map(|s| s.item.ty())
            .collect();
        assert_eq!(
            types,
            vec![SqmType::Double, SqmType::String, SqmType::String, SqmType::Long]
        );
    }

    #[test]
    fn test_union_order_by_alias_is_positional() {
        let statement = analyze(
            "select p.name as n from Person p union select a.city from Address a order by n",
        )
        .unwrap();
        match &statement.query_part {
            QueryPart::Group(group) => assert_eq!(
                group.order_by[0].expr,
                SqmExpr::Literal(SqmLiteral::Integer(1))
            ),
            other => panic!("unexpected {other:?}"),
        }
    }
}
