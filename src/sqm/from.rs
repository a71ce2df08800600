//! From-elements: roots and the join trees hanging off them.

use super::expr::SqmPredicate;
use super::node::NodeId;
use super::select::QueryPart;
use super::types::SqmType;

/// A named column exposed by a derived table or CTE.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedColumn {
    pub name: String,
    pub ty: SqmType,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RootSource {
    Entity(String),
    /// A subquery in the from clause.
    Derived {
        query: Box<QueryPart>,
        columns: Vec<DerivedColumn>,
    },
    /// A reference to a CTE of the enclosing statement.
    Cte {
        name: String,
        columns: Vec<DerivedColumn>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SqmRoot {
    pub id: NodeId,
    pub source: RootSource,
    pub alias: Option<String>,
    pub joins: Vec<SqmJoin>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqmJoinKind {
    Inner,
    Left,
    Right,
    Full,
    Cross,
}

impl SqmJoinKind {
    pub fn name(self) -> &'static str {
        match self {
            SqmJoinKind::Inner => "inner",
            SqmJoinKind::Left => "left",
            SqmJoinKind::Right => "right",
            SqmJoinKind::Full => "full",
            SqmJoinKind::Cross => "cross",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum JoinTarget {
    /// Navigation of an association of the parent from-element.
    Attribute {
        attribute: String,
        entity: String,
        collection: bool,
    },
    /// An unrelated entity joined on an explicit condition.
    Entity(String),
    Derived {
        query: Box<QueryPart>,
        columns: Vec<DerivedColumn>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SqmJoin {
    pub id: NodeId,
    pub kind: SqmJoinKind,
    pub target: JoinTarget,
    pub alias: Option<String>,
    pub fetch: bool,
    /// Created by navigating a path rather than written as a join.
    pub implicit: bool,
    pub condition: Option<SqmPredicate>,
    pub joins: Vec<SqmJoin>,
}

/// What a from-element ranges over, for path resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum FromKind {
    Entity(String),
    Derived(Vec<DerivedColumn>),
}

impl SqmRoot {
    pub fn entity_name(&self) -> Option<&str> {
        match &self.source {
            RootSource::Entity(name) => Some(name),
            _ => None,
        }
    }

    pub fn kind(&self) -> FromKind {
        match &self.source {
            RootSource::Entity(name) => FromKind::Entity(name.clone()),
            RootSource::Derived { columns, .. } | RootSource::Cte { columns, .. } => {
                FromKind::Derived(columns.clone())
            }
        }
    }

    /// Find the from-element with `id` in this root's tree.
    pub fn find(&self, id: NodeId) -> Option<FromKind> {
        if self.id == id {
            return Some(self.kind());
        }
        self.joins.iter().find_map(|join| join.find(id))
    }

    /// Attach `join` under the from-element `parent`. Returns the join back
    /// when `parent` is not in this tree.
    pub fn attach(&mut self, parent: NodeId, join: SqmJoin) -> Result<(), SqmJoin> {
        if self.id == parent {
            self.joins.push(join);
            return Ok(());
        }
        attach_into(&mut self.joins, parent, join)
    }

    pub fn contains_collection_fetches(&self) -> bool {
        self.joins.iter().any(SqmJoin::contains_collection_fetches)
    }

    /// Drop left fetch joins whose subtree is not in `referenced`.
    pub fn remove_left_fetch_joins(&mut self, referenced: &[NodeId]) {
        remove_left_fetch_joins(&mut self.joins, referenced);
    }

    /// Every from-element id in this tree, root first.
    pub fn ids(&self) -> Vec<NodeId> {
        let mut ids = vec![self.id];
        for join in &self.joins {
            join.collect_ids(&mut ids);
        }
        ids
    }
}

impl SqmJoin {
    pub fn kind_of_target(&self) -> FromKind {
        match &self.target {
            JoinTarget::Attribute { entity, .. } | JoinTarget::Entity(entity) => {
                FromKind::Entity(entity.clone())
            }
            JoinTarget::Derived { columns, .. } => FromKind::Derived(columns.clone()),
        }
    }

    pub fn find(&self, id: NodeId) -> Option<FromKind> {
        if self.id == id {
            return Some(self.kind_of_target());
        }
        self.joins.iter().find_map(|join| join.find(id))
    }

    pub fn is_collection(&self) -> bool {
        matches!(
            self.target,
            JoinTarget::Attribute {
                collection: true,
                ..
            }
        )
    }

    pub fn contains_collection_fetches(&self) -> bool {
        (self.fetch && self.is_collection())
            || self.joins.iter().any(SqmJoin::contains_collection_fetches)
    }

    fn collect_ids(&self, ids: &mut Vec<NodeId>) {
        ids.push(self.id);
        for join in &self.joins {
            join.collect_ids(ids);
        }
    }
}

fn attach_into(joins: &mut [SqmJoin], parent: NodeId, join: SqmJoin) -> Result<(), SqmJoin> {
    let mut join = join;
    for candidate in joins.iter_mut() {
        if candidate.id == parent {
            candidate.joins.push(join);
            return Ok(());
        }
        match attach_into(&mut candidate.joins, parent, join) {
            Ok(()) => return Ok(()),
            Err(returned) => join = returned,
        }
    }
    Err(join)
}

fn remove_left_fetch_joins(joins: &mut Vec<SqmJoin>, referenced: &[NodeId]) {
    joins.retain(|join| {
        let removable = join.fetch && join.kind == SqmJoinKind::Left;
        if !removable {
            return true;
        }
        let mut ids = Vec::new();
        join.collect_ids(&mut ids);
        ids.iter().any(|id| referenced.contains(id))
    });
    for join in joins.iter_mut() {
        remove_left_fetch_joins(&mut join.joins, referenced);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn join(id: u32, kind: SqmJoinKind, fetch: bool, collection: bool) -> SqmJoin {
        SqmJoin {
            id: NodeId::new(id),
            kind,
            target: JoinTarget::Attribute {
                attribute: format!("a{id}"),
                entity: "Address".into(),
                collection,
            },
            alias: None,
            fetch,
            implicit: false,
            condition: None,
            joins: Vec::new(),
        }
    }

    fn root() -> SqmRoot {
        SqmRoot {
            id: NodeId::new(1),
            source: RootSource::Entity("Person".into()),
            alias: Some("p".into()),
            joins: Vec::new(),
        }
    }

    #[test]
    fn test_attach_nested() {
        let mut root = root();
        root.attach(NodeId::new(1), join(2, SqmJoinKind::Inner, false, false))
            .unwrap();
        root.attach(NodeId::new(2), join(3, SqmJoinKind::Inner, false, false))
            .unwrap();
        assert_eq!(root.joins[0].joins[0].id, NodeId::new(3));
        assert!(root
            .attach(NodeId::new(9), join(4, SqmJoinKind::Inner, false, false))
            .is_err());
        assert_eq!(root.ids(), vec![NodeId::new(1), NodeId::new(2), NodeId::new(3)]);
    }

    #[test]
    fn test_collection_fetches_found_recursively() {
        let mut root = root();
        let mut parent = join(2, SqmJoinKind::Inner, false, false);
        parent.joins.push(join(3, SqmJoinKind::Left, true, true));
        root.joins.push(parent);
        assert!(root.contains_collection_fetches());
    }

    #[test]
    fn test_remove_left_fetch_joins_keeps_referenced() {
        let mut root = root();
        root.joins.push(join(2, SqmJoinKind::Left, true, true));
        root.joins.push(join(3, SqmJoinKind::Left, true, false));
        root.joins.push(join(4, SqmJoinKind::Inner, true, false));
        root.remove_left_fetch_joins(&[NodeId::new(3)]);
        let ids: Vec<_> = root.joins.iter().map(|j| j.id).collect();
        assert_eq!(ids, vec![NodeId::new(3), NodeId::new(4)]);
    }
}
