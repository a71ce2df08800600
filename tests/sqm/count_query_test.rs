//! Row-count variants of translated queries.

#[path = "../common/mod.rs"]
mod common;

use common::{engine, validate_sql};
use sqm::sqm::{QueryPart, ResultType, RootSource, Selectable};
use sqm::Dialect;

fn count_sql(query: &str, dialect: Dialect) -> String {
    engine(dialect)
        .count_query(query)
        .unwrap_or_else(|e| panic!("count query for '{query}' failed: {e}"))
        .sql
}

#[test]
fn test_simple_query_replaces_selection() {
    let sql = count_sql("select p.name from Person p where p.age > 18", Dialect::Postgres);
    insta::assert_snapshot!(sql, @"SELECT COUNT(*) FROM person AS p1_0 WHERE p1_0.age > 18");
    validate_sql(&sql, Dialect::Postgres).unwrap();
}

#[test]
fn test_unbounded_ordering_dropped() {
    assert_eq!(
        count_sql("from Person p order by p.name", Dialect::Postgres),
        "SELECT COUNT(*) FROM person AS p1_0"
    );
}

#[test]
fn test_paginated_query_counted_through_derived_table() {
    let sql = count_sql(
        "from Person p order by p.name fetch first 3 rows only",
        Dialect::Postgres,
    );
    assert_eq!(
        sql,
        "SELECT COUNT(*) FROM (SELECT p1_0.id AS c0 FROM person AS p1_0 ORDER BY p1_0.name LIMIT 3) AS d1_0"
    );
    validate_sql(&sql, Dialect::Postgres).unwrap();
}

#[test]
fn test_distinct_wraps_in_derived_table() {
    let sql = count_sql("select distinct p.city from Person p", Dialect::Postgres);
    insta::assert_snapshot!(
        sql,
        @"SELECT COUNT(*) FROM (SELECT DISTINCT p1_0.city AS c0 FROM person AS p1_0) AS d1_0"
    );
    validate_sql(&sql, Dialect::Postgres).unwrap();
}

#[test]
fn test_group_by_wraps_in_derived_table() {
    let sql = count_sql(
        "select p.city, count(p) from Person p group by p.city",
        Dialect::Postgres,
    );
    assert_eq!(
        sql,
        "SELECT COUNT(*) FROM (SELECT p1_0.city AS c0, COUNT(p1_0.id) AS c1 FROM person AS p1_0 GROUP BY p1_0.city) AS d1_0"
    );
    validate_sql(&sql, Dialect::Postgres).unwrap();
}

#[test]
fn test_constructor_flattened_to_aliases() {
    let statement = engine(Dialect::Ansi)
        .translate(
            "select distinct new PersonSummary(p.name, p.city) from Person p",
            ResultType::Object,
        )
        .unwrap();
    let count = statement.create_count_query().unwrap();

    let spec = count.query_part.first_spec().unwrap();
    let RootSource::Derived { query, columns } = &spec.roots[0].source else {
        panic!("count of a distinct query should range over a derived table");
    };
    let names: Vec<_> = columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["c0", "c1"]);

    let inner = query.first_spec().unwrap();
    assert_eq!(inner.select.selections.len(), 2);
    assert!(inner
        .select
        .selections
        .iter()
        .all(|s| matches!(s.item, Selectable::Expr(_))));
}

#[test]
fn test_left_fetch_joins_removed() {
    assert_eq!(
        count_sql(
            "select p from Person p left join fetch p.phones where p.age > 1",
            Dialect::Postgres
        ),
        "SELECT COUNT(*) FROM person AS p1_0 WHERE p1_0.age > 1"
    );
}

#[test]
fn test_parameters_shared_with_original() {
    let engine = engine(Dialect::Postgres);
    let statement = engine
        .translate(
            "select distinct p.city from Person p where p.age > :age",
            ResultType::Object,
        )
        .unwrap();
    let count = statement.create_count_query().unwrap();

    let original: Vec<_> = statement.parameters().into_iter().map(|p| p.id).collect();
    let copied: Vec<_> = count.parameters().into_iter().map(|p| p.id).collect();
    assert_eq!(original, copied);

    let rendered = engine.render(&count).unwrap();
    assert_eq!(rendered.parameters[0].parameter, original[0]);
}

#[test]
fn test_set_operation_counted_as_derived_table() {
    let statement = engine(Dialect::Sqlite)
        .translate(
            "select p.city from Person p union select a.street from Address a",
            ResultType::Object,
        )
        .unwrap();
    let count = statement.create_count_query().unwrap();
    let spec = count.query_part.first_spec().unwrap();
    assert!(matches!(
        &spec.roots[0].source,
        RootSource::Derived { query, .. } if matches!(**query, QueryPart::Group(_))
    ));
}

#[test]
fn test_original_unchanged() {
    let engine = engine(Dialect::Postgres);
    let statement = engine
        .translate("select p.name from Person p order by p.name", ResultType::Object)
        .unwrap();
    let before = engine.render(&statement).unwrap();
    let _ = statement.create_count_query().unwrap();
    assert_eq!(engine.render(&statement).unwrap(), before);
}
