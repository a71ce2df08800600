//! Dialect differences in rendered SQL.

#[path = "../common/mod.rs"]
mod common;

use std::sync::Arc;

use common::{engine, sql, validate_sql};
use sqm::sqm::SqmType;
use sqm::translate::RenderError;
use sqm::{Dialect, EntityType, QueryEngine, QueryError, StaticDomainModel};

fn render_error(query: &str, dialect: Dialect) -> RenderError {
    match engine(dialect).compile(query) {
        Err(QueryError::Render(error)) => error,
        other => panic!("expected a render error for '{query}' on {dialect}, got {other:?}"),
    }
}

// ============================================================================
// Functions
// ============================================================================

#[test]
fn test_length_function_names() {
    let query = "select length(p.name) from Person p";
    assert_eq!(
        sql(query, Dialect::Postgres),
        "SELECT LENGTH(p1_0.name) FROM person AS p1_0"
    );
    assert_eq!(sql(query, Dialect::TSql), "SELECT LEN(p1_0.name) FROM person AS p1_0");
}

#[test]
fn test_modulo() {
    let query = "select mod(p.age, 2) from Person p";
    assert_eq!(
        sql(query, Dialect::Postgres),
        "SELECT MOD(p1_0.age, 2) FROM person AS p1_0"
    );
    assert_eq!(sql(query, Dialect::TSql), "SELECT (p1_0.age % 2) FROM person AS p1_0");
}

#[test]
fn test_locate_argument_order() {
    let query = "select locate('a', p.name) from Person p";
    assert_eq!(
        sql(query, Dialect::Oracle),
        "SELECT instr(p1_0.name, 'a') FROM person p1_0"
    );
    assert_eq!(
        sql(query, Dialect::TSql),
        "SELECT charindex('a', p1_0.name) FROM person AS p1_0"
    );
}

#[test]
fn test_oracle_alternate_key() {
    assert_eq!(
        sql("select nvl(p.city, 'none') from Person p", Dialect::Oracle),
        "SELECT COALESCE(p1_0.city, 'none') FROM person p1_0"
    );
}

#[test]
fn test_concatenation() {
    let query = "select p.name || p.city from Person p";
    assert_eq!(
        sql(query, Dialect::Postgres),
        "SELECT p1_0.name || p1_0.city FROM person AS p1_0"
    );
    assert_eq!(
        sql(query, Dialect::MySql),
        "SELECT CONCAT(p1_0.name, p1_0.city) FROM person AS p1_0"
    );
    assert_eq!(
        sql(query, Dialect::TSql),
        "SELECT p1_0.name + p1_0.city FROM person AS p1_0"
    );
}

// ============================================================================
// Pagination
// ============================================================================

#[test]
fn test_tsql_offset_needs_ordering() {
    let sql_text = sql(
        "select p.name from Person p offset 10 rows fetch first 5 rows only",
        Dialect::TSql,
    );
    assert_eq!(
        sql_text,
        "SELECT p1_0.name FROM person AS p1_0 ORDER BY (SELECT NULL) OFFSET 10 ROWS FETCH NEXT 5 ROWS ONLY"
    );
    validate_sql(&sql_text, Dialect::TSql).unwrap();
}

#[test]
fn test_teradata_top() {
    let sql_text = sql(
        "select p.name from Person p order by p.name desc fetch first 5 rows only",
        Dialect::Teradata,
    );
    assert!(sql_text.starts_with("SELECT TOP 5 p1_0.name FROM person"));
    assert!(sql_text.ends_with("ORDER BY p1_0.name DESC"));

    assert!(matches!(
        render_error("select p.name from Person p offset 5 rows", Dialect::Teradata),
        RenderError::Unsupported { ref feature, dialect: "teradata" } if feature == "OFFSET"
    ));
}

#[test]
fn test_sqlite_limit() {
    let sql_text = sql(
        "select p.name from Person p order by p.name fetch first 5 rows only",
        Dialect::Sqlite,
    );
    assert_eq!(
        sql_text,
        "SELECT p1_0.name FROM person AS p1_0 ORDER BY p1_0.name LIMIT 5"
    );
    validate_sql(&sql_text, Dialect::Sqlite).unwrap();
}

// ============================================================================
// Joins and set operations
// ============================================================================

#[test]
fn test_full_join_support() {
    let query = "select p.name, ph.number from Person p full join p.phones ph";
    assert_eq!(
        sql(query, Dialect::Postgres),
        "SELECT p1_0.name, p2_0.number FROM person AS p1_0 FULL OUTER JOIN phone AS p2_0 ON p2_0.person_id = p1_0.id"
    );
    assert!(matches!(
        render_error(query, Dialect::MySql),
        RenderError::Unsupported { ref feature, .. } if feature == "FULL JOIN"
    ));
}

#[test]
fn test_oracle_except_keyword() {
    let sql_text = sql(
        "select p.city from Person p except select a.street from Address a",
        Dialect::Oracle,
    );
    assert!(sql_text.contains(" MINUS "));
    assert!(!sql_text.contains("EXCEPT"));
}

// ============================================================================
// Identifiers
// ============================================================================

#[test]
fn test_reserved_names_quoted_per_dialect() {
    let model = StaticDomainModel::new().with_entity(
        EntityType::new("Purchase", "order")
            .id("id", SqmType::Long)
            .basic("user", SqmType::String),
    );
    let model = Arc::new(model);
    let query = "select x.user from Purchase x";
    let render = |dialect| {
        QueryEngine::new(dialect, model.clone())
            .compile(query)
            .unwrap()
            .sql
    };

    assert_eq!(
        render(Dialect::Postgres),
        r#"SELECT p1_0."user" FROM "order" AS p1_0"#
    );
    assert_eq!(render(Dialect::MySql), "SELECT p1_0.`user` FROM `order` AS p1_0");
    assert_eq!(render(Dialect::TSql), "SELECT p1_0.[user] FROM [order] AS p1_0");
}
