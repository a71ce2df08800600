//! Statements assembled through the criteria API render exactly like the
//! equivalent query text.

#[path = "../common/mod.rs"]
mod common;

use common::{engine, sql, validate_sql};
use sqm::sqm::{ParameterKind, ResultType, Selection, SortSpecification, SqmJoinKind, SqmType};
use sqm::translate::RenderError;
use sqm::{Dialect, QueryError};

#[test]
fn test_restriction_and_ordering() {
    let engine = engine(Dialect::Postgres);
    let nb = engine.node_builder();

    let mut query = engine.criteria(ResultType::Object);
    let p = query.from_entity("Person").unwrap();
    let name = query.get(p, "name").unwrap();
    let age = query.get(p, "age").unwrap();
    query.select(name.clone()).unwrap();
    query.where_(nb.greater_than(age, nb.literal(18))).unwrap();
    query.order_by(vec![SortSpecification::desc(name)]);

    let rendered = engine.render(&query).unwrap();
    assert_eq!(
        rendered.sql,
        sql(
            "select p.name from Person p where p.age > 18 order by p.name desc",
            Dialect::Postgres
        )
    );
    insta::assert_snapshot!(
        rendered.sql,
        @"SELECT p1_0.name FROM person AS p1_0 WHERE p1_0.age > 18 ORDER BY p1_0.name DESC"
    );
}

#[test]
fn test_join_and_multiselect() {
    let engine = engine(Dialect::Postgres);

    let mut query = engine.criteria(ResultType::Tuple);
    let p = query.from_entity("Person").unwrap();
    let ph = query.join(p, "phones", SqmJoinKind::Left).unwrap();
    let name = query.get(p, "name").unwrap();
    let number = query.get(ph, "number").unwrap();
    query
        .multiselect(vec![Selection::from(name), Selection::from(number)])
        .unwrap();

    let sql_text = engine.render(&query).unwrap().sql;
    assert_eq!(
        sql_text,
        sql(
            "select p.name, ph.number from Person p left join p.phones ph",
            Dialect::Postgres
        )
    );
    validate_sql(&sql_text, Dialect::Postgres).unwrap();
}

#[test]
fn test_parameters_and_grouping() {
    let engine = engine(Dialect::Sqlite);
    let nb = engine.node_builder();

    let mut query = engine.criteria(ResultType::Object);
    let p = query.from_entity("Person").unwrap();
    let city = query.get(p, "city").unwrap();
    let entity = query.entity(p).unwrap();
    let count = nb.count(entity).unwrap();
    query
        .multiselect(vec![city.clone().into(), count.clone().into()])
        .unwrap();
    let age = query.get(p, "age").unwrap();
    query
        .where_(nb.greater_than(age, nb.parameter("age", sqm::sqm::SqmType::Integer)))
        .unwrap();
    query.group_by(vec![city]).unwrap();
    query.having(nb.greater_than(count, nb.literal(1))).unwrap();

    let rendered = engine.render(&query).unwrap();
    assert_eq!(
        rendered.sql,
        "SELECT p1_0.city, COUNT(p1_0.id) FROM person AS p1_0 WHERE p1_0.age > ? GROUP BY p1_0.city HAVING COUNT(p1_0.id) > 1"
    );
    assert_eq!(rendered.parameters.len(), 1);
    assert_eq!(rendered.parameters[0].label, ":age");
}

#[test]
fn test_limit() {
    let engine = engine(Dialect::Postgres);
    let mut query = engine.criteria(ResultType::Object);
    let p = query.from_entity("Person").unwrap();
    let name = query.get(p, "name").unwrap();
    query.select(name.clone()).unwrap();
    query.order_by(vec![SortSpecification::asc(name)]);
    query.limit(3).unwrap();

    assert_eq!(
        engine.render(&query).unwrap().sql,
        "SELECT p1_0.name FROM person AS p1_0 ORDER BY p1_0.name LIMIT 3"
    );
}

#[test]
fn test_restricting_translated_statement_tracks_new_parameters() {
    let engine = engine(Dialect::Postgres);
    let nb = engine.node_builder();

    let mut query = engine
        .translate("select p from Person p where p.age > :a", ResultType::Object)
        .unwrap();
    query
        .and_where(nb.equal(nb.literal(1), nb.parameter("b", SqmType::Integer)))
        .unwrap();

    let kinds: Vec<_> = query.parameters().into_iter().map(|p| p.kind).collect();
    assert_eq!(
        kinds,
        vec![
            ParameterKind::Named("a".into()),
            ParameterKind::Named("b".into())
        ]
    );
    assert_eq!(engine.render(&query).unwrap().parameters.len(), 2);
}

#[test]
fn test_union_of_criteria_queries() {
    let engine = engine(Dialect::Sqlite);

    let mut people = engine.criteria(ResultType::Object);
    let p = people.from_entity("Person").unwrap();
    people.select(people.get(p, "name").unwrap()).unwrap();

    let mut addresses = engine.criteria(ResultType::Object);
    let a = addresses.from_entity("Address").unwrap();
    addresses.select(addresses.get(a, "street").unwrap()).unwrap();

    let union = people.union(addresses);
    let sql_text = engine.render(&union).unwrap().sql;
    assert_eq!(
        sql_text,
        "SELECT p1_0.name FROM person AS p1_0 UNION SELECT a1_0.street FROM address AS a1_0"
    );
    validate_sql(&sql_text, Dialect::Sqlite).unwrap();
}

#[test]
fn test_count_query_of_criteria_statement() {
    let engine = engine(Dialect::Postgres);
    let mut query = engine.criteria(ResultType::Object);
    let p = query.from_entity("Person").unwrap();
    query.distinct(true).unwrap();
    query.select(query.get(p, "city").unwrap()).unwrap();

    let count = query.create_count_query().unwrap();
    assert_eq!(
        engine.render(&count).unwrap().sql,
        "SELECT COUNT(*) FROM (SELECT DISTINCT p1_0.city AS c0 FROM person AS p1_0) AS d1_0"
    );
}

#[test]
fn test_incomplete_statement_is_not_rendered() {
    let engine = engine(Dialect::Ansi);

    let empty = engine.criteria(ResultType::Object);
    assert!(matches!(
        engine.render(&empty),
        Err(QueryError::Render(RenderError::IncompleteStatement(_)))
    ));

    let mut no_selection = engine.criteria(ResultType::Object);
    no_selection.from_entity("Person").unwrap();
    assert!(matches!(
        engine.render(&no_selection),
        Err(QueryError::Render(RenderError::IncompleteStatement(_)))
    ));
}
