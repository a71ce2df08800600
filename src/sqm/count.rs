//! Row-count variants of select statements.

use super::copy::CopyContext;
use super::from::{DerivedColumn, RootSource, SqmRoot};
use super::select::{
    QueryPart, QuerySpec, ResultType, SelectClause, SelectStatement, Selectable, Selection,
};
use super::types::SqmType;
use super::walk::collect_path_sources;
use crate::semantic::SemanticResult;

impl SelectStatement {
    /// A statement counting the rows this one returns.
    ///
    /// The copy is parameter-blind: bindings made for this statement apply
    /// to the count query unchanged.
    pub fn create_count_query(&self) -> SemanticResult<SelectStatement> {
        let nb = self.builder.clone();
        let mut ctx = CopyContext::parameter_blind(&nb);
        let mut copy = self.copy(&mut ctx);

        // A limit on `count(*)` would cut the single count row, so paginated
        // specs are counted through a derived table.
        if let QueryPart::Spec(spec) = &mut copy.query_part {
            if !spec.select.distinct
                && spec.group_by.is_empty()
                && spec.offset.is_none()
                && spec.fetch.is_none()
            {
                spec.select.selections = vec![Selection::new(nb.count_star()?)];
                spec.order_by.clear();
                let referenced = collect_path_sources(&copy.query_part);
                if let QueryPart::Spec(spec) = &mut copy.query_part {
                    for root in &mut spec.roots {
                        root.remove_left_fetch_joins(&referenced);
                    }
                }
                copy.result_type = ResultType::Object;
                return Ok(copy);
            }
        }

        let mut part = copy.query_part;
        alias_leaf_selections(&mut part);
        drop_unbounded_ordering(&mut part);
        let columns = part
            .first_spec()
            .map(|spec| {
                spec.select
                    .selections
                    .iter()
                    .map(|selection| DerivedColumn {
                        name: selection.alias.clone().unwrap_or_default(),
                        ty: selection.item.ty().unwrap_or(SqmType::Unknown),
                    })
                    .collect()
            })
            .unwrap_or_default();

        let mut count = SelectStatement::criteria(&nb, ResultType::Object);
        count.ctes = copy.ctes;
        count.query_part = QueryPart::Spec(Box::new(QuerySpec {
            select: SelectClause {
                distinct: false,
                selections: vec![Selection::new(nb.count_star()?)],
            },
            roots: vec![SqmRoot {
                id: nb.next_id(),
                source: RootSource::Derived {
                    query: Box::new(part),
                    columns,
                },
                alias: None,
                joins: Vec::new(),
            }],
            ..QuerySpec::default()
        }));
        Ok(count)
    }
}

/// Flatten tuple and constructor selections of every spec and alias the
/// leaves `c0, c1, ...`.
fn alias_leaf_selections(part: &mut QueryPart) {
    match part {
        QueryPart::Spec(spec) => {
            let mut leaves = Vec::new();
            for selection in spec.select.selections.drain(..) {
                flatten(selection, &mut leaves);
            }
            for (index, leaf) in leaves.iter_mut().enumerate() {
                leaf.alias = Some(format!("c{index}"));
            }
            spec.select.selections = leaves;
        }
        QueryPart::Group(group) => group.parts.iter_mut().for_each(alias_leaf_selections),
    }
}

fn flatten(selection: Selection, leaves: &mut Vec<Selection>) {
    match selection.item {
        Selectable::Expr(_) => leaves.push(selection),
        Selectable::Tuple(items) | Selectable::Instantiation { arguments: items, .. } => {
            for item in items {
                flatten(item, leaves);
            }
        }
    }
}

fn drop_unbounded_ordering(part: &mut QueryPart) {
    if part.has_offset_or_fetch() {
        return;
    }
    match part {
        QueryPart::Spec(spec) => spec.order_by.clear(),
        QueryPart::Group(group) => group.order_by.clear(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::domain::StaticDomainModel;
    use crate::function::FunctionRegistry;
    use crate::sqm::node::{CreationOptions, NodeBuilder};

    fn builder() -> NodeBuilder {
        NodeBuilder::new(
            Arc::new(StaticDomainModel::new()),
            Arc::new(FunctionRegistry::standard()),
            CreationOptions::default(),
        )
    }

    #[test]
    fn test_flatten_constructor_into_aliases() {
        let nb = builder();
        let mut part = QueryPart::Spec(Box::new(QuerySpec {
            select: SelectClause {
                distinct: true,
                selections: vec![
                    Selection::new(Selectable::Instantiation {
                        class: "Dto".into(),
                        arguments: vec![
                            Selection::new(nb.literal(1)),
                            Selection::new(nb.literal("a")),
                        ],
                    }),
                    Selection::new(nb.literal(2)).with_alias("x"),
                ],
            },
            ..QuerySpec::default()
        }));
        alias_leaf_selections(&mut part);
        let aliases: Vec<_> = part
            .first_spec()
            .map(|spec| {
                spec.select
                    .selections
                    .iter()
                    .filter_map(|s| s.alias.clone())
                    .collect()
            })
            .unwrap_or_default();
        assert_eq!(aliases, vec!["c0", "c1", "c2"]);
    }
}
