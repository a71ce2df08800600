//! The query builder API.
//!
//! Criteria statements are plain [`SelectStatement`]s mutated in place. The
//! clause methods act on the first query spec; ordering and pagination act
//! on the whole query part, so they apply to a set operation as a whole
//! once one has been formed.

use super::expr::{SortSpecification, SqmExpr, SqmPredicate};
use super::from::{FromKind, JoinTarget, RootSource, SqmJoin, SqmJoinKind, SqmRoot};
use super::node::NodeId;
use super::select::{
    FetchSpec, ParameterTracking, QueryPart, QuerySpec, ResultType, SelectStatement, Selectable,
    Selection, SetOperator,
};
use super::walk;
use crate::semantic::{SemanticError, SemanticResult};

impl From<SqmExpr> for Selection {
    fn from(expr: SqmExpr) -> Self {
        Selection::new(expr)
    }
}

impl SelectStatement {
    // ========================================================================
    // From Clause
    // ========================================================================

    /// Add a root ranging over `entity`.
    pub fn from_entity(&mut self, entity: &str) -> SemanticResult<NodeId> {
        if self.builder.domain().entity(entity).is_none() {
            return Err(SemanticError::UnknownEntity(entity.to_string()));
        }
        let id = self.builder.next_id();
        self.spec_mut()?.roots.push(SqmRoot {
            id,
            source: RootSource::Entity(entity.to_string()),
            alias: None,
            joins: Vec::new(),
        });
        Ok(id)
    }

    /// Join the association `attribute` of the from-element `parent`.
    pub fn join(
        &mut self,
        parent: NodeId,
        attribute: &str,
        kind: SqmJoinKind,
    ) -> SemanticResult<NodeId> {
        self.attribute_join(parent, attribute, kind, false)
    }

    /// Join and fetch the association `attribute` of `parent`.
    pub fn fetch_join(
        &mut self,
        parent: NodeId,
        attribute: &str,
        kind: SqmJoinKind,
    ) -> SemanticResult<NodeId> {
        self.attribute_join(parent, attribute, kind, true)
    }

    fn attribute_join(
        &mut self,
        parent: NodeId,
        attribute: &str,
        kind: SqmJoinKind,
        fetch: bool,
    ) -> SemanticResult<NodeId> {
        let from = self.from_kind(parent)?;
        let path = self
            .builder
            .attribute_path(parent, &from, attribute, attribute)?;
        let entity = path.ty.entity_name().map(str::to_string).ok_or_else(|| {
            SemanticError::TerminalPath {
                path: attribute.to_string(),
                attribute: attribute.to_string(),
            }
        })?;

        let id = self.builder.next_id();
        let join = SqmJoin {
            id,
            kind,
            target: JoinTarget::Attribute {
                attribute: attribute.to_string(),
                entity,
                collection: path.collection,
            },
            alias: None,
            fetch,
            implicit: false,
            condition: None,
            joins: Vec::new(),
        };

        let spec = self.spec_mut()?;
        let mut pending = Some(join);
        for root in &mut spec.roots {
            if let Some(join) = pending.take() {
                if let Err(join) = root.attach(parent, join) {
                    pending = Some(join);
                }
            }
        }
        match pending {
            None => Ok(id),
            Some(_) => Err(SemanticError::Internal(format!(
                "from-element {parent} is not part of this query"
            ))),
        }
    }

    fn from_kind(&self, id: NodeId) -> SemanticResult<FromKind> {
        self.query_part
            .first_spec()
            .and_then(|spec| spec.find_from(id))
            .ok_or_else(|| {
                SemanticError::Internal(format!("from-element {id} is not part of this query"))
            })
    }

    /// The from-element `source` as an expression.
    pub fn entity(&self, source: NodeId) -> SemanticResult<SqmExpr> {
        let kind = self.from_kind(source)?;
        Ok(SqmExpr::Path(self.builder.entity_path(source, &kind)))
    }

    /// The attribute `attribute` of the from-element `source`.
    pub fn get(&self, source: NodeId, attribute: &str) -> SemanticResult<SqmExpr> {
        let kind = self.from_kind(source)?;
        let path = self
            .builder
            .attribute_path(source, &kind, attribute, attribute)?;
        Ok(SqmExpr::Path(path))
    }

    // ========================================================================
    // Select Clause
    // ========================================================================

    /// Select a single item, replacing any previous selection.
    pub fn select(&mut self, item: impl Into<Selection>) -> SemanticResult<()> {
        let selection = item.into();
        self.check_selection(&selection)?;
        self.spec_mut()?.select.selections = vec![selection];
        self.refresh_parameters();
        Ok(())
    }

    /// Select several items, shaped by the statement's result type.
    ///
    /// One item under [`ResultType::Object`] is selected as-is and several
    /// become a tuple. [`ResultType::Tuple`] and [`ResultType::Array`]
    /// always produce a tuple, and [`ResultType::Class`] a constructor call.
    pub fn multiselect(&mut self, items: Vec<Selection>) -> SemanticResult<()> {
        if items.is_empty() {
            return Err(SemanticError::EmptySelection);
        }
        for item in &items {
            self.check_selection(item)?;
        }
        let shaped = match &self.result_type {
            ResultType::Object if items.len() == 1 => items.into_iter().next(),
            ResultType::Object | ResultType::Tuple | ResultType::Array => {
                Some(Selection::new(Selectable::Tuple(items)))
            }
            ResultType::Class(class) => Some(Selection::new(Selectable::Instantiation {
                class: class.clone(),
                arguments: items,
            })),
        };
        self.spec_mut()?.select.selections = shaped.into_iter().collect();
        self.refresh_parameters();
        Ok(())
    }

    fn check_selection(&self, selection: &Selection) -> SemanticResult<()> {
        match &selection.item {
            Selectable::Expr(SqmExpr::Subquery(_)) if self.builder.jpa_compliance() => Err(
                SemanticError::JpaCompliance("subqueries in the select clause".to_string()),
            ),
            Selectable::Expr(SqmExpr::Path(path)) if path.collection => {
                let attribute = path.attribute.clone().unwrap_or_default();
                Err(SemanticError::PluralAttributeDereference {
                    path: attribute.clone(),
                    attribute,
                })
            }
            Selectable::Expr(_) => Ok(()),
            Selectable::Tuple(items) | Selectable::Instantiation { arguments: items, .. } => {
                items.iter().try_for_each(|item| self.check_selection(item))
            }
        }
    }

    pub fn distinct(&mut self, distinct: bool) -> SemanticResult<()> {
        self.spec_mut()?.select.distinct = distinct;
        Ok(())
    }

    // ========================================================================
    // Restriction And Grouping
    // ========================================================================

    /// Replace the where clause.
    pub fn where_(&mut self, predicate: SqmPredicate) -> SemanticResult<()> {
        self.spec_mut()?.where_clause = Some(predicate);
        self.refresh_parameters();
        Ok(())
    }

    /// Conjoin `predicate` with the existing where clause.
    pub fn and_where(&mut self, predicate: SqmPredicate) -> SemanticResult<()> {
        let spec = self.spec_mut()?;
        spec.where_clause = Some(match spec.where_clause.take() {
            Some(existing) => existing.and(predicate),
            None => predicate,
        });
        self.refresh_parameters();
        Ok(())
    }

    pub fn group_by(&mut self, expressions: Vec<SqmExpr>) -> SemanticResult<()> {
        self.spec_mut()?.group_by = expressions;
        self.refresh_parameters();
        Ok(())
    }

    pub fn having(&mut self, predicate: SqmPredicate) -> SemanticResult<()> {
        self.spec_mut()?.having = Some(predicate);
        self.refresh_parameters();
        Ok(())
    }

    // ========================================================================
    // Ordering And Pagination
    // ========================================================================

    pub fn order_by(&mut self, sorts: Vec<SortSpecification>) {
        match &mut self.query_part {
            QueryPart::Spec(spec) => spec.order_by = sorts,
            QueryPart::Group(group) => group.order_by = sorts,
        }
        self.refresh_parameters();
    }

    pub fn offset(&mut self, offset: SqmExpr) -> SemanticResult<()> {
        self.check_pagination("offset")?;
        match &mut self.query_part {
            QueryPart::Spec(spec) => spec.offset = Some(offset),
            QueryPart::Group(group) => group.offset = Some(offset),
        }
        self.refresh_parameters();
        Ok(())
    }

    pub fn fetch(&mut self, fetch: FetchSpec) -> SemanticResult<()> {
        self.check_pagination("fetch")?;
        match &mut self.query_part {
            QueryPart::Spec(spec) => spec.fetch = Some(fetch),
            QueryPart::Group(group) => group.fetch = Some(fetch),
        }
        self.refresh_parameters();
        Ok(())
    }

    /// `fetch first {rows} rows only`
    pub fn limit(&mut self, rows: i32) -> SemanticResult<()> {
        let count = self.builder.literal(rows);
        self.fetch(FetchSpec::rows(count))
    }

    fn check_pagination(&self, clause: &str) -> SemanticResult<()> {
        if self.builder.jpa_compliance() {
            return Err(SemanticError::JpaCompliance(format!(
                "'{clause}' on a criteria query"
            )));
        }
        Ok(())
    }

    // ========================================================================
    // Set Operations
    // ========================================================================

    pub fn union(self, other: SelectStatement) -> SelectStatement {
        self.set_operation(SetOperator::Union, false, other)
    }

    pub fn union_all(self, other: SelectStatement) -> SelectStatement {
        self.set_operation(SetOperator::Union, true, other)
    }

    pub fn intersect(self, other: SelectStatement) -> SelectStatement {
        self.set_operation(SetOperator::Intersect, false, other)
    }

    pub fn intersect_all(self, other: SelectStatement) -> SelectStatement {
        self.set_operation(SetOperator::Intersect, true, other)
    }

    pub fn except(self, other: SelectStatement) -> SelectStatement {
        self.set_operation(SetOperator::Except, false, other)
    }

    pub fn except_all(self, other: SelectStatement) -> SelectStatement {
        self.set_operation(SetOperator::Except, true, other)
    }

    fn set_operation(
        mut self,
        operator: SetOperator,
        all: bool,
        other: SelectStatement,
    ) -> SelectStatement {
        for (name, cte) in other.ctes {
            self.ctes.entry(name).or_insert(cte);
        }
        let left = std::mem::replace(&mut self.query_part, QueryPart::Spec(Box::default()));
        self.query_part = left.combine(operator, all, other.query_part);
        self.refresh_parameters();
        self
    }

    /// Re-collect the parameters of a statement that tracks them, after a
    /// mutation may have added or removed some.
    fn refresh_parameters(&mut self) {
        if let ParameterTracking::Tracked(_) = self.parameters {
            let parameters = walk::collect_parameters(self);
            self.parameters = ParameterTracking::Tracked(parameters);
        }
    }

    fn spec_mut(&mut self) -> SemanticResult<&mut QuerySpec> {
        self.query_part.first_spec_mut().ok_or_else(|| {
            SemanticError::Internal("query group without parts".to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::domain::{EntityType, StaticDomainModel};
    use crate::function::FunctionRegistry;
    use crate::sqm::node::{CreationOptions, NodeBuilder};
    use crate::sqm::types::SqmType;

    fn builder(jpa_compliance: bool) -> NodeBuilder {
        let model = StaticDomainModel::new()
            .with_entity(
                EntityType::new("Person", "person")
                    .id("id", SqmType::Long)
                    .basic("name", SqmType::String)
                    .to_one("address", "Address", "address_id")
                    .to_many("phones", "Phone", "person_id"),
            )
            .with_entity(
                EntityType::new("Address", "address")
                    .id("id", SqmType::Long)
                    .basic("city", SqmType::String),
            )
            .with_entity(EntityType::new("Phone", "phone").id("id", SqmType::Long));
        NodeBuilder::new(
            Arc::new(model),
            Arc::new(FunctionRegistry::standard()),
            CreationOptions { jpa_compliance },
        )
    }

    #[test]
    fn test_unknown_entity() {
        let nb = builder(false);
        let mut query = SelectStatement::criteria(&nb, ResultType::Object);
        assert_eq!(
            query.from_entity("Animal"),
            Err(SemanticError::UnknownEntity("Animal".into()))
        );
    }

    #[test]
    fn test_get_resolves_attribute_types() {
        let nb = builder(false);
        let mut query = SelectStatement::criteria(&nb, ResultType::Object);
        let p = query.from_entity("Person").unwrap();
        assert_eq!(query.get(p, "name").unwrap().ty(), SqmType::String);
        assert!(matches!(
            query.get(p, "nickname"),
            Err(SemanticError::PathResolution { .. })
        ));
    }

    #[test]
    fn test_join_basic_attribute_is_terminal() {
        let nb = builder(false);
        let mut query = SelectStatement::criteria(&nb, ResultType::Object);
        let p = query.from_entity("Person").unwrap();
        assert!(matches!(
            query.join(p, "name", SqmJoinKind::Inner),
            Err(SemanticError::TerminalPath { .. })
        ));
        let a = query.join(p, "address", SqmJoinKind::Left).unwrap();
        assert_eq!(query.get(a, "city").unwrap().ty(), SqmType::String);
    }

    #[test]
    fn test_multiselect_shapes_by_result_type() {
        let nb = builder(false);

        let mut single = SelectStatement::criteria(&nb, ResultType::Object);
        let p = single.from_entity("Person").unwrap();
        let name = single.get(p, "name").unwrap();
        single.multiselect(vec![name.clone().into()]).unwrap();
        let selections = &single.query_part.first_spec().unwrap().select.selections;
        assert!(matches!(selections[0].item, Selectable::Expr(_)));

        let mut tuple = SelectStatement::criteria(&nb, ResultType::Tuple);
        let p = tuple.from_entity("Person").unwrap();
        let name = tuple.get(p, "name").unwrap();
        tuple.multiselect(vec![name.into()]).unwrap();
        let selections = &tuple.query_part.first_spec().unwrap().select.selections;
        assert!(matches!(selections[0].item, Selectable::Tuple(_)));

        let mut dto = SelectStatement::criteria(&nb, ResultType::Class("PersonDto".into()));
        let p = dto.from_entity("Person").unwrap();
        let id = dto.get(p, "id").unwrap();
        let name = dto.get(p, "name").unwrap();
        dto.multiselect(vec![id.into(), name.into()]).unwrap();
        let selections = &dto.query_part.first_spec().unwrap().select.selections;
        assert!(matches!(
            &selections[0].item,
            Selectable::Instantiation { arguments, .. } if arguments.len() == 2
        ));

        assert_eq!(
            dto.multiselect(Vec::new()),
            Err(SemanticError::EmptySelection)
        );
    }

    #[test]
    fn test_strict_mode_rejects_pagination() {
        let nb = builder(true);
        let mut query = SelectStatement::criteria(&nb, ResultType::Object);
        query.from_entity("Person").unwrap();
        assert!(matches!(
            query.limit(10),
            Err(SemanticError::JpaCompliance(_))
        ));
        assert!(matches!(
            query.offset(nb.literal(5)),
            Err(SemanticError::JpaCompliance(_))
        ));
    }

    #[test]
    fn test_selecting_collection_is_rejected() {
        let nb = builder(false);
        let mut query = SelectStatement::criteria(&nb, ResultType::Object);
        let p = query.from_entity("Person").unwrap();
        let phones = query.get(p, "phones").unwrap();
        assert!(matches!(
            query.select(phones.clone()),
            Err(SemanticError::PluralAttributeDereference { .. })
        ));
        assert!(nb.is_empty(phones).is_ok());
    }

    #[test]
    fn test_and_where_conjoins() {
        let nb = builder(false);
        let mut query = SelectStatement::criteria(&nb, ResultType::Object);
        let p = query.from_entity("Person").unwrap();
        let name = query.get(p, "name").unwrap();
        query.and_where(nb.is_not_null(name.clone())).unwrap();
        query.and_where(nb.equal(name, nb.literal("Ada"))).unwrap();
        let spec = query.query_part.first_spec().unwrap();
        assert!(matches!(
            &spec.where_clause,
            Some(SqmPredicate::Junction { predicates, .. }) if predicates.len() == 2
        ));
    }
}
