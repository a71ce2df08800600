//! SQM → SQL rendering.
//!
//! [`render`] lowers a [`SelectStatement`] into the SQL AST of [`crate::sql`]
//! and serializes it for one dialect. Every SQL alias, column and function
//! form is decided here; serialization itself cannot fail.
//!
//! ```ignore
//! let statement = engine.translate("select p.name from Person p where p.age > :age")?;
//! let rendered = render(&statement, Dialect::Postgres, &registry)?;
//! assert_eq!(rendered.sql, "SELECT p1_0.name FROM person AS p1_0 WHERE p1_0.age > ?");
//! ```

mod lower;

use serde::Serialize;
use tracing::debug;

use crate::function::{FunctionRegistry, PatternError};
use crate::sql::dialect::{Dialect, SqlDialect};
use crate::sqm::node::NodeId;
use crate::sqm::select::SelectStatement;
use crate::temporal::IllegalUnitConversion;

use lower::Lowerer;

pub type RenderResult<T> = Result<T, RenderError>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RenderError {
    /// A builder statement whose from or select clause is still empty.
    #[error("Statement is incomplete: {0}")]
    IncompleteStatement(String),

    /// A function that is not registered for the target dialect.
    #[error("Function '{0}' is not registered for this dialect")]
    UnknownFunction(String),

    #[error(transparent)]
    UnitConversion(#[from] IllegalUnitConversion),

    #[error("Dialect {dialect} has no type name for {ty}")]
    TypeName { ty: String, dialect: &'static str },

    #[error("{feature} is not supported by {dialect}")]
    Unsupported {
        feature: String,
        dialect: &'static str,
    },

    #[error(transparent)]
    Pattern(#[from] PatternError),

    /// Infinity or NaN, which SQL cannot spell.
    #[error("Literal {0} has no SQL representation")]
    NonFiniteLiteral(f64),

    /// The statement names an entity the domain model does not know.
    #[error("Unknown entity: {0}")]
    UnknownEntity(String),

    /// A path whose from-element is not part of the rendered statement.
    #[error("From-element {0} is not in scope")]
    UnknownSource(NodeId),
}

/// One bind placeholder of a rendered statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParameterBinding {
    /// 1-based placeholder position.
    pub position: usize,
    pub parameter: NodeId,
    /// `:name` or `?n` as written in the query.
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedQuery {
    pub sql: String,
    /// One entry per placeholder, in textual order. A parameter used twice
    /// appears twice.
    pub parameters: Vec<ParameterBinding>,
}

/// Render `statement` for `dialect`, resolving functions in `functions`.
pub fn render(
    statement: &SelectStatement,
    dialect: Dialect,
    functions: &FunctionRegistry,
) -> RenderResult<RenderedQuery> {
    if !statement.is_complete() {
        return Err(RenderError::IncompleteStatement(
            "every query part needs a from clause and a selection".to_string(),
        ));
    }

    let domain = statement.node_builder().domain();
    let query = Lowerer::new(dialect, functions, domain).statement(statement)?;
    let (sql, slots) = query
        .to_tokens_for_dialect(dialect)
        .serialize_with_parameters(dialect);
    let parameters: Vec<ParameterBinding> = slots
        .into_iter()
        .enumerate()
        .map(|(index, slot)| ParameterBinding {
            position: index + 1,
            parameter: slot.id,
            label: slot.label,
        })
        .collect();

    debug!(
        dialect = dialect.name(),
        sql = %sql,
        parameters = parameters.len(),
        "rendered statement"
    );
    Ok(RenderedQuery { sql, parameters })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::domain::{EntityType, StaticDomainModel};
    use crate::hql;
    use crate::semantic;
    use crate::sql::test_utils::validate_sql;
    use crate::sqm::node::{CreationOptions, NodeBuilder};
    use crate::sqm::select::ResultType;
    use crate::sqm::types::SqmType;

    fn model() -> StaticDomainModel {
        StaticDomainModel::new()
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
                    .basic("city", SqmType::String),
            )
            .with_entity(
                EntityType::new("Phone", "phone")
                    .id("id", SqmType::Long)
                    .basic("number", SqmType::String),
            )
    }

    fn render_as(query: &str, dialect: Dialect) -> RenderResult<RenderedQuery> {
        let mut registry = FunctionRegistry::new();
        dialect.initialize_function_registry(&mut registry);
        let registry = Arc::new(registry);
        let nb = NodeBuilder::new(Arc::new(model()), registry.clone(), CreationOptions::default());
        let statement = semantic::build(
            &hql::parse(query).expect("query should parse"),
            ResultType::Object,
            &nb,
        )
        .expect("query should analyze");
        render(&statement, dialect, &registry)
    }

    fn sql(query: &str, dialect: Dialect) -> String {
        render_as(query, dialect).unwrap().sql
    }

    #[test]
    fn test_simple_select() {
        let sql = sql("select p.name from Person p where p.age > 18", Dialect::Postgres);
        assert_eq!(sql, "SELECT p1_0.name FROM person AS p1_0 WHERE p1_0.age > 18");
        validate_sql(&sql, Dialect::Postgres).unwrap();
    }

    #[test]
    fn test_entity_selection_expands_columns() {
        assert_eq!(
            sql("from Address", Dialect::Ansi),
            "SELECT a1_0.id, a1_0.city FROM address AS a1_0"
        );
    }

    #[test]
    fn test_implicit_join() {
        let sql = sql("select p.address.city from Person p", Dialect::Oracle);
        assert_eq!(
            sql,
            "SELECT a1_0.city FROM person p1_0 INNER JOIN address a1_0 ON a1_0.id = p1_0.address_id"
        );
    }

    #[test]
    fn test_collection_join() {
        let sql = sql(
            "select ph.number from Person p join p.phones ph where p.name = 'Ada'",
            Dialect::Postgres,
        );
        assert_eq!(
            sql,
            "SELECT p2_0.number FROM person AS p1_0 INNER JOIN phone AS p2_0 ON p2_0.person_id = p1_0.id WHERE p1_0.name = 'Ada'"
        );
        validate_sql(&sql, Dialect::Postgres).unwrap();
    }

    #[test]
    fn test_parameters_in_textual_order() {
        let rendered = render_as(
            "select p.name from Person p where p.age between :low and :high or p.age = :low",
            Dialect::MySql,
        )
        .unwrap();
        let labels: Vec<_> = rendered.parameters.iter().map(|b| b.label.as_str()).collect();
        assert_eq!(labels, vec![":low", ":high", ":low"]);
        assert_eq!(rendered.parameters[0].parameter, rendered.parameters[2].parameter);
        assert_eq!(rendered.parameters[2].position, 3);
    }

    #[test]
    fn test_is_empty_renders_correlated_subquery() {
        let sql = sql("select p.name from Person p where p.phones is not empty", Dialect::H2);
        assert_eq!(
            sql,
            "SELECT p1_0.name FROM person AS p1_0 WHERE EXISTS (SELECT 1 FROM phone AS p2_0 WHERE p2_0.person_id = p1_0.id)"
        );
    }

    #[test]
    fn test_cast_uses_dialect_type_names() {
        assert_eq!(
            sql("select cast(p.age as String) from Person p", Dialect::Postgres),
            "SELECT cast(p1_0.age as varchar(255)) FROM person AS p1_0"
        );
        assert_eq!(
            sql("select cast(p.age as String) from Person p", Dialect::Sqlite),
            "SELECT cast(p1_0.age as varchar) FROM person AS p1_0"
        );
    }

    #[test]
    fn test_unsupported_offset() {
        let err = render_as("select p.name from Person p offset 5", Dialect::Teradata).unwrap_err();
        assert!(matches!(err, RenderError::Unsupported { .. }));
    }

    #[test]
    fn test_non_finite_literal_rejected() {
        let nb = NodeBuilder::new(
            Arc::new(model()),
            Arc::new(FunctionRegistry::standard()),
            CreationOptions::default(),
        );
        let mut statement = SelectStatement::criteria(&nb, ResultType::Object);
        let person = statement.from_entity("Person").unwrap();
        statement.select(statement.get(person, "name").unwrap()).unwrap();
        let age = statement.get(person, "age").unwrap();
        statement
            .where_(nb.greater_than(age, nb.literal(f64::INFINITY)))
            .unwrap();

        assert_eq!(
            render(&statement, Dialect::Ansi, &FunctionRegistry::standard()),
            Err(RenderError::NonFiniteLiteral(f64::INFINITY))
        );
    }

    #[test]
    fn test_incomplete_statement() {
        let nb = NodeBuilder::new(
            Arc::new(model()),
            Arc::new(FunctionRegistry::standard()),
            CreationOptions::default(),
        );
        let statement = SelectStatement::criteria(&nb, ResultType::Object);
        assert!(matches!(
            render(&statement, Dialect::Ansi, &FunctionRegistry::standard()),
            Err(RenderError::IncompleteStatement(_))
        ));
    }

    #[test]
    fn test_render_is_deterministic() {
        let query = "select p.name, count(ph) from Person p left join p.phones ph group by p.name order by 2 desc";
        assert_eq!(sql(query, Dialect::Db2), sql(query, Dialect::Db2));
    }
}
