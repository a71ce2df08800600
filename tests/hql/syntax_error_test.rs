//! Syntax errors surfaced through the query engine.
//!
//! Messages carry a 1-based line, a 0-based column and the offending line
//! with a `*` at the failure position.

#[path = "../common/mod.rs"]
mod common;

use common::engine;
use sqm::hql::SyntaxError;
use sqm::{Dialect, QueryError};

fn syntax_error(query: &str) -> SyntaxError {
    match engine(Dialect::Ansi).compile(query) {
        Err(QueryError::Syntax(error)) => error,
        other => panic!("expected a syntax error for '{query}', got {other:?}"),
    }
}

#[test]
fn test_select_without_selection() {
    let error = syntax_error("select from");
    insta::assert_snapshot!(
        error.message,
        @"At 1:7 and token 'from', no viable alternative at input 'select *from'"
    );
    assert_eq!((error.line, error.column), (1, 7));
    assert_eq!(error.query, "select from");
}

#[test]
fn test_empty_query() {
    let error = syntax_error("");
    insta::assert_snapshot!(
        error.message,
        @"At 1:0 and token '<EOF>', no viable alternative at input '*' (empty query string)"
    );
}

#[test]
fn test_error_on_later_line() {
    let error = syntax_error("select p\nfrom Person p\nwhere p.name = ");
    assert_eq!(error.line, 3);
    assert_eq!(error.column, 15);
    assert!(error.message.starts_with("At 3:15"));
}

#[test]
fn test_unexpected_character() {
    let error = syntax_error("select p from Person p where p.id # 1");
    assert_eq!(error.message, "At 1:34, token recognition error at: '#'");
}

#[test]
fn test_mismatched_input_lists_expected_tokens() {
    let error = syntax_error("select count(p.id p.name) from Person p");
    assert_eq!(
        error.message,
        "At 1:18 and token 'p', mismatched input 'p', expecting one of the following tokens: ',', ')'"
    );
}

#[test]
fn test_syntax_errors_are_not_semantic_errors() {
    let err = engine(Dialect::Ansi).compile("from").unwrap_err();
    assert!(err.as_syntax().is_some());
    assert!(!matches!(err, QueryError::Semantic(_)));
}

#[test]
fn test_soft_keywords_as_identifiers() {
    // `left` is only a keyword before `join`
    let rendered = engine(Dialect::Postgres)
        .compile("select p.name from Person p left join p.phones ph")
        .unwrap();
    assert_eq!(
        rendered.sql,
        "SELECT p1_0.name FROM person AS p1_0 LEFT JOIN phone AS p2_0 ON p2_0.person_id = p1_0.id"
    );
}

#[test]
fn test_literal_beyond_double_range() {
    for dialect in [Dialect::Ansi, Dialect::Postgres, Dialect::Sqlite] {
        let err = engine(dialect)
            .compile("select 1e400 from Person p")
            .unwrap_err();
        let error = err.as_syntax().expect("a syntax error");
        assert_eq!(error.column, 7);
        assert!(error.message.ends_with("invalid numeric literal '1e400'"));
    }
}

#[test]
fn test_nesting_too_deep() {
    let query = format!(
        "select p.name from Person p where {}p.age > 1{}",
        "(".repeat(300),
        ")".repeat(300)
    );
    let error = syntax_error(&query);
    assert!(error.message.contains("maximum nesting depth"));
}
