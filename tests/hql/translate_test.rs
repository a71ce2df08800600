//! End-to-end tests: query text → semantic tree → SQL.

#[path = "../common/mod.rs"]
mod common;

use common::{engine, sql, validate_sql};
use sqm::semantic::SemanticError;
use sqm::translate::RenderError;
use sqm::sqm::{QueryPart, ResultType, SqmType};
use sqm::{Dialect, QueryError};

// ============================================================================
// Selection and paths
// ============================================================================

#[test]
fn test_simple_select_with_parameter() {
    let rendered = engine(Dialect::Postgres)
        .compile("select p.name from Person p where p.age >= :age")
        .unwrap();
    insta::assert_snapshot!(
        rendered.sql,
        @"SELECT p1_0.name FROM person AS p1_0 WHERE p1_0.age >= ?"
    );
    validate_sql(&rendered.sql, Dialect::Postgres).unwrap();
    assert_eq!(rendered.parameters.len(), 1);
    assert_eq!(rendered.parameters[0].position, 1);
    assert_eq!(rendered.parameters[0].label, ":age");
}

#[test]
fn test_root_selection_expands_columns() {
    insta::assert_snapshot!(
        sql("from Address", Dialect::Ansi),
        @"SELECT a1_0.id, a1_0.street FROM address AS a1_0"
    );
}

#[test]
fn test_foreign_key_read_without_join() {
    insta::assert_snapshot!(
        sql("select p.address.id from Person p", Dialect::Postgres),
        @"SELECT p1_0.address_id FROM person AS p1_0"
    );
}

#[test]
fn test_implicit_join_created_once() {
    let sql = sql(
        "select p.address.street from Person p where p.address.street like 'Main%'",
        Dialect::MySql,
    );
    assert_eq!(
        sql,
        "SELECT a1_0.street FROM person AS p1_0 INNER JOIN address AS a1_0 ON a1_0.id = p1_0.address_id WHERE a1_0.street LIKE 'Main%'"
    );
    validate_sql(&sql, Dialect::MySql).unwrap();
}

#[test]
fn test_explicit_left_join_with_condition() {
    let sql = sql(
        "select p.name, ph.number from Person p left join p.phones ph with ph.number like '+47%'",
        Dialect::Postgres,
    );
    assert_eq!(
        sql,
        "SELECT p1_0.name, p2_0.number FROM person AS p1_0 LEFT JOIN phone AS p2_0 ON p2_0.person_id = p1_0.id AND p2_0.number LIKE '+47%'"
    );
    validate_sql(&sql, Dialect::Postgres).unwrap();
}

#[test]
fn test_oracle_omits_table_alias_keyword() {
    let sql = sql("select p.name from Person p", Dialect::Oracle);
    assert_eq!(sql, "SELECT p1_0.name FROM person p1_0");
}

// ============================================================================
// Predicates
// ============================================================================

#[test]
fn test_member_of_renders_subquery() {
    let sql = sql(
        "select p.name from Person p where :phone member of p.phones",
        Dialect::Postgres,
    );
    assert_eq!(
        sql,
        "SELECT p1_0.name FROM person AS p1_0 WHERE ? IN (SELECT p2_0.id FROM phone AS p2_0 WHERE p2_0.person_id = p1_0.id)"
    );
    validate_sql(&sql, Dialect::Postgres).unwrap();
}

#[test]
fn test_is_empty() {
    let sql = sql("select p.name from Person p where p.phones is empty", Dialect::Sqlite);
    assert_eq!(
        sql,
        "SELECT p1_0.name FROM person AS p1_0 WHERE NOT EXISTS (SELECT 1 FROM phone AS p2_0 WHERE p2_0.person_id = p1_0.id)"
    );
    validate_sql(&sql, Dialect::Sqlite).unwrap();
}

#[test]
fn test_in_list_and_between() {
    let sql = sql(
        "select p.name from Person p where p.city in ('Oslo', 'Bergen') and p.age between 18 and 65",
        Dialect::Postgres,
    );
    assert_eq!(
        sql,
        "SELECT p1_0.name FROM person AS p1_0 WHERE p1_0.city IN ('Oslo', 'Bergen') AND p1_0.age BETWEEN 18 AND 65"
    );
    validate_sql(&sql, Dialect::Postgres).unwrap();
}

#[test]
fn test_correlated_exists() {
    let sql = sql(
        "select p.name from Person p where exists (select 1 from Phone ph where ph.number = p.name)",
        Dialect::Postgres,
    );
    validate_sql(&sql, Dialect::Postgres).unwrap();
    assert!(sql.contains("WHERE EXISTS (SELECT 1 FROM phone AS p2_0 WHERE p2_0.number = p1_0.name)"));
}

// ============================================================================
// Grouping, ordering, pagination
// ============================================================================

#[test]
fn test_group_by_having_order_by() {
    let sql = sql(
        "select p.city, count(p) from Person p group by p.city having count(p) > 1 order by p.city desc",
        Dialect::Postgres,
    );
    assert_eq!(
        sql,
        "SELECT p1_0.city, COUNT(p1_0.id) FROM person AS p1_0 GROUP BY p1_0.city HAVING COUNT(p1_0.id) > 1 ORDER BY p1_0.city DESC"
    );
    validate_sql(&sql, Dialect::Postgres).unwrap();
}

#[test]
fn test_limit_and_offset() {
    let query = "select p.name from Person p order by p.name offset 10 rows fetch first 5 rows only";
    assert_eq!(
        sql(query, Dialect::Postgres),
        "SELECT p1_0.name FROM person AS p1_0 ORDER BY p1_0.name LIMIT 5 OFFSET 10"
    );
    assert_eq!(
        sql(query, Dialect::Ansi),
        "SELECT p1_0.name FROM person AS p1_0 ORDER BY p1_0.name OFFSET 10 ROWS FETCH FIRST 5 ROWS ONLY"
    );
}

#[test]
fn test_null_precedence() {
    assert_eq!(
        sql("select p.name from Person p order by p.name desc nulls first", Dialect::Postgres),
        "SELECT p1_0.name FROM person AS p1_0 ORDER BY p1_0.name DESC NULLS FIRST"
    );
    assert_eq!(
        sql("select p.name from Person p order by p.name nulls last", Dialect::Postgres),
        "SELECT p1_0.name FROM person AS p1_0 ORDER BY p1_0.name NULLS LAST"
    );
}

// ============================================================================
// Set operations and CTEs
// ============================================================================

#[test]
fn test_trailing_fetch_limits_whole_union() {
    let query = "select p.name as n from Person p union select a.street from Address a order by n fetch first 2 rows only";
    let statement = engine(Dialect::Postgres)
        .translate(query, ResultType::Object)
        .unwrap();
    let QueryPart::Group(group) = &statement.query_part else {
        panic!("expected a query group");
    };
    assert!(group.fetch.is_some());
    assert!(!group.parts.iter().any(QueryPart::has_offset_or_fetch));

    assert_eq!(
        sql(query, Dialect::Postgres),
        "(SELECT p1_0.name FROM person AS p1_0) UNION (SELECT a1_0.street FROM address AS a1_0) ORDER BY 1 LIMIT 2"
    );
    assert!(matches!(
        engine(Dialect::Teradata).compile(query),
        Err(QueryError::Render(RenderError::Unsupported { .. }))
    ));
}

#[test]
fn test_union_orders_by_position() {
    let statement = engine(Dialect::Postgres)
        .translate(
            "select p.name as n from Person p union select a.street from Address a order by n",
            ResultType::Object,
        )
        .unwrap();
    assert!(matches!(statement.query_part, QueryPart::Group(_)));

    let sql = sql(
        "select p.name as n from Person p union select a.street from Address a order by n",
        Dialect::Postgres,
    );
    assert_eq!(
        sql,
        "(SELECT p1_0.name FROM person AS p1_0) UNION (SELECT a1_0.street FROM address AS a1_0) ORDER BY 1"
    );
}

#[test]
fn test_cte() {
    let sql = sql(
        "with adults as (select p.name as name from Person p where p.age >= 18) select a.name from adults a",
        Dialect::Postgres,
    );
    assert_eq!(
        sql,
        "WITH adults AS (SELECT p1_0.name AS name FROM person AS p1_0 WHERE p1_0.age >= 18) SELECT a1_0.name FROM adults AS a1_0"
    );
    validate_sql(&sql, Dialect::Postgres).unwrap();
}

// ============================================================================
// Semantic failures
// ============================================================================

#[test]
fn test_unknown_attribute() {
    let err = engine(Dialect::Ansi)
        .compile("select p.nickname from Person p")
        .unwrap_err();
    assert!(matches!(
        err,
        QueryError::Semantic(SemanticError::PathResolution { ref segment, .. }) if segment == "nickname"
    ));
}

#[test]
fn test_plural_attribute_dereference() {
    let err = engine(Dialect::Ansi)
        .compile("select p.phones.number from Person p")
        .unwrap_err();
    assert!(matches!(
        err,
        QueryError::Semantic(SemanticError::PluralAttributeDereference { .. })
    ));
}

#[test]
fn test_parameter_types_inferred() {
    let statement = engine(Dialect::Ansi)
        .translate(
            "select p from Person p where p.name = :name and p.born < :before",
            ResultType::Object,
        )
        .unwrap();
    let types: Vec<_> = statement.parameters().into_iter().map(|p| p.ty).collect();
    assert_eq!(types, vec![SqmType::String, SqmType::Date]);
}
