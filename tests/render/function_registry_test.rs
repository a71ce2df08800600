//! Function registrations as seen through compiled SQL.

#[path = "../common/mod.rs"]
mod common;

use common::engine;
use sqm::function::{FunctionDescriptor, FunctionRegistry};
use sqm::semantic::SemanticError;
use sqm::sqm::{ResultType, SqmType};
use sqm::translate::RenderError;
use sqm::{render, Dialect, QueryError};

#[test]
fn test_last_registration_wins() {
    let mut engine = engine(Dialect::Postgres);
    engine.configure_functions(|registry| {
        registry
            .register_pattern("initial", "substring(?1, 1, 1)", SqmType::String)
            .unwrap();
        registry
            .register_pattern("initial", "left(?1, 1)", SqmType::String)
            .unwrap();
    });

    let rendered = engine.compile("select initial(p.name) from Person p").unwrap();
    insta::assert_snapshot!(rendered.sql, @"SELECT left(p1_0.name, 1) FROM person AS p1_0");
}

#[test]
fn test_registered_function_becomes_callable() {
    let mut engine = engine(Dialect::Postgres);
    let query = "select soundex(p.name) from Person p";
    assert!(matches!(
        engine.compile(query),
        Err(QueryError::Semantic(SemanticError::UnknownFunction(ref name))) if name == "soundex"
    ));

    engine.register_function("soundex", FunctionDescriptor::named("soundex"));
    assert_eq!(
        engine.compile(query).unwrap().sql,
        "SELECT SOUNDEX(p1_0.name) FROM person AS p1_0"
    );
}

#[test]
fn test_registration_replaces_dialect_contribution() {
    let mut engine = engine(Dialect::TSql);
    let query = "select length(p.name) from Person p";
    assert_eq!(
        engine.compile(query).unwrap().sql,
        "SELECT LEN(p1_0.name) FROM person AS p1_0"
    );

    engine.register_function("length", FunctionDescriptor::named("datalength"));
    assert_eq!(
        engine.compile(query).unwrap().sql,
        "SELECT DATALENGTH(p1_0.name) FROM person AS p1_0"
    );
}

#[test]
fn test_alternate_key_follows_dialect() {
    for (dialect, expected) in [
        (Dialect::Postgres, "SELECT LENGTH(p1_0.name) FROM person AS p1_0"),
        (Dialect::TSql, "SELECT LEN(p1_0.name) FROM person AS p1_0"),
    ] {
        let mut engine = engine(dialect);
        engine.configure_functions(|registry| {
            assert!(registry.register_alternate_key("strlen", "length"));
            assert!(!registry.register_alternate_key("nothing", "missing"));
        });
        assert_eq!(
            engine.compile("select strlen(p.name) from Person p").unwrap().sql,
            expected
        );
    }
}

#[test]
fn test_argument_count_checked() {
    let mut engine = engine(Dialect::Ansi);
    engine.configure_functions(|registry| {
        registry
            .named_descriptor_builder("soundex")
            .set_exact_argument_count(1)
            .set_invariant_type(SqmType::String)
            .register();
    });
    let err = engine
        .compile("select soundex(p.name, p.city) from Person p")
        .unwrap_err();
    assert!(matches!(
        err,
        QueryError::Semantic(SemanticError::FunctionArgument { ref function, .. }) if function == "soundex"
    ));
}

#[test]
fn test_clones_do_not_share_registrations() {
    let original = engine(Dialect::Postgres);
    let mut extended = original.clone();
    extended.register_function("soundex", FunctionDescriptor::named("soundex"));

    assert!(extended.functions().contains("soundex"));
    assert!(!original.functions().contains("soundex"));
    assert!(original.compile("select soundex(p.name) from Person p").is_err());
}

#[test]
fn test_rendering_with_empty_registry() {
    let engine = engine(Dialect::Postgres);
    let statement = engine
        .translate("select upper(p.name) from Person p", ResultType::Object)
        .unwrap();

    assert_eq!(
        render(&statement, Dialect::Postgres, &FunctionRegistry::new()),
        Err(RenderError::UnknownFunction("upper".to_string()))
    );
    assert_eq!(
        render(&statement, Dialect::Postgres, engine.functions())
            .unwrap()
            .sql,
        "SELECT UPPER(p1_0.name) FROM person AS p1_0"
    );
}
