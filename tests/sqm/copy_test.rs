//! Copies of semantic trees render like their originals and are
//! independent of them.

#[path = "../common/mod.rs"]
mod common;

use common::engine;
use sqm::sqm::{CopyContext, ResultType, SqmTreePrinter};
use sqm::Dialect;

const QUERIES: &[&str] = &[
    "select p.name from Person p where p.age > :age",
    "select p.address.street, count(ph) from Person p left join p.phones ph group by p.address.street",
    "select p.name from Person p where p.phones is not empty and :n member of p.phones",
    "with adults as (select p.name as name from Person p where p.age >= 18) select a.name from adults a",
    "select p.name as n from Person p union select a.street from Address a order by n",
    "select case when p.age < 18 then 'minor' else 'adult' end from Person p",
    "select p.name from Person p where exists (select 1 from Phone ph where ph.number = p.name)",
];

#[test]
fn test_copy_renders_identically() {
    for dialect in [Dialect::Postgres, Dialect::Oracle, Dialect::Sqlite] {
        let engine = engine(dialect);
        for query in QUERIES {
            let statement = engine.translate(query, ResultType::Object).unwrap();
            let mut ctx = CopyContext::new(engine.node_builder());
            let copy = statement.copy(&mut ctx);

            assert_eq!(
                engine.render(&copy).unwrap().sql,
                engine.render(&statement).unwrap().sql,
                "copy of '{query}' rendered differently for {dialect}"
            );
        }
    }
}

#[test]
fn test_copy_gets_fresh_ids() {
    let engine = engine(Dialect::Ansi);
    let statement = engine
        .translate("select p.name from Person p where p.age > :age", ResultType::Object)
        .unwrap();
    let mut ctx = CopyContext::new(engine.node_builder());
    let copy = statement.copy(&mut ctx);

    assert_ne!(copy.id, statement.id);
    let root = statement.query_part.first_spec().unwrap().roots[0].id;
    let copied_root = copy.query_part.first_spec().unwrap().roots[0].id;
    assert_ne!(copied_root, root);
    assert_eq!(ctx.copied_id(root), Some(copied_root));
    assert_ne!(copy.parameters()[0].id, statement.parameters()[0].id);
}

#[test]
fn test_parameter_blind_copy_keeps_parameter_ids() {
    let engine = engine(Dialect::Ansi);
    let statement = engine
        .translate(
            "select p.name from Person p where p.age > :age or p.age < :age",
            ResultType::Object,
        )
        .unwrap();
    let mut ctx = CopyContext::parameter_blind(engine.node_builder());
    let copy = statement.copy(&mut ctx);

    assert!(ctx.is_parameter_blind());
    assert_eq!(copy.parameters().len(), 1);
    assert_eq!(copy.parameters()[0].id, statement.parameters()[0].id);

    let rendered = engine.render(&copy).unwrap();
    assert_eq!(rendered.parameters.len(), 2);
    assert_eq!(rendered.parameters[0].parameter, rendered.parameters[1].parameter);
}

#[test]
fn test_mutating_copy_leaves_original() {
    let engine = engine(Dialect::Postgres);
    let statement = engine
        .translate("select p.name from Person p", ResultType::Object)
        .unwrap();
    let before = SqmTreePrinter::print(&statement);

    let mut ctx = CopyContext::new(engine.node_builder());
    let mut copy = statement.copy(&mut ctx);
    let root = copy.query_part.first_spec().unwrap().roots[0].id;
    let age = copy.get(root, "age").unwrap();
    let adult = engine.node_builder().greater_than(age, engine.node_builder().literal(17));
    copy.and_where(adult).unwrap();

    assert_eq!(SqmTreePrinter::print(&statement), before);
    assert_eq!(
        engine.render(&statement).unwrap().sql,
        "SELECT p1_0.name FROM person AS p1_0"
    );
    assert_eq!(
        engine.render(&copy).unwrap().sql,
        "SELECT p1_0.name FROM person AS p1_0 WHERE p1_0.age > 17"
    );
}
