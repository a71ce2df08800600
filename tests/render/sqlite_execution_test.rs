//! Rendered SQLite statements executed against an in-memory database.

#[path = "../common/mod.rs"]
mod common;

use common::engine;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection};
use sqm::{Dialect, QueryEngine, RenderedQuery};

fn database() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(
        "CREATE TABLE address (id INTEGER PRIMARY KEY, street TEXT NOT NULL);
         CREATE TABLE person (
             id INTEGER PRIMARY KEY,
             name TEXT NOT NULL,
             age INTEGER,
             city TEXT,
             born TEXT,
             address_id INTEGER REFERENCES address (id)
         );
         CREATE TABLE phone (
             id INTEGER PRIMARY KEY,
             number TEXT NOT NULL,
             person_id INTEGER REFERENCES person (id)
         );

         INSERT INTO address VALUES (1, 'Main Street'), (2, 'Harbour Road');
         INSERT INTO person VALUES
             (1, 'Ada', 36, 'Oslo', '1990-01-01', 1),
             (2, 'Brit', 17, 'Oslo', '2009-05-17', 1),
             (3, 'Cato', 52, 'Bergen', '1974-11-30', 2),
             (4, 'Dina', 29, 'Bergen', '1997-03-08', NULL),
             (5, 'Emil', 44, 'Tromso', '1990-07-21', NULL);
         INSERT INTO phone VALUES
             (1, '+47 111', 1),
             (2, '+47 222', 1),
             (3, '+47 333', 3);",
    )
    .unwrap();
    conn
}

fn sqlite() -> QueryEngine {
    engine(Dialect::Sqlite)
}

fn count(conn: &Connection, rendered: &RenderedQuery, values: &[Value]) -> i64 {
    conn.query_row(&rendered.sql, params_from_iter(values.iter()), |row| row.get(0))
        .unwrap_or_else(|e| panic!("'{}' failed: {e}", rendered.sql))
}

fn strings(conn: &Connection, rendered: &RenderedQuery, values: &[Value]) -> Vec<String> {
    let mut statement = conn
        .prepare(&rendered.sql)
        .unwrap_or_else(|e| panic!("'{}' failed to prepare: {e}", rendered.sql));
    statement
        .query_map(params_from_iter(values.iter()), |row| row.get(0))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap()
}

#[test]
fn test_count_of_all_rows() {
    let conn = database();
    let rendered = sqlite().count_query("from Person p").unwrap();
    assert_eq!(rendered.sql, "SELECT COUNT(*) FROM person AS p1_0");
    assert_eq!(count(&conn, &rendered, &[]), 5);
}

#[test]
fn test_count_of_distinct_selection() {
    let conn = database();
    let rendered = sqlite()
        .count_query("select distinct p.city from Person p")
        .unwrap();
    assert_eq!(count(&conn, &rendered, &[]), 3);
}

#[test]
fn test_count_of_grouped_query() {
    let conn = database();
    let rendered = sqlite()
        .count_query("select p.city, count(p) from Person p group by p.city having count(p) > 1")
        .unwrap();
    assert_eq!(count(&conn, &rendered, &[]), 2);
}

#[test]
fn test_count_matches_row_count_with_parameters() {
    let conn = database();
    let engine = sqlite();
    let query = "select p.name from Person p where p.age >= :age order by p.name";
    let bindings = [Value::Integer(30)];

    let rows = strings(&conn, &engine.compile(query).unwrap(), &bindings);
    assert_eq!(rows, vec!["Ada", "Cato", "Emil"]);

    let total = count(&conn, &engine.count_query(query).unwrap(), &bindings);
    assert_eq!(total, rows.len() as i64);
}

#[test]
fn test_count_of_paginated_query() {
    let conn = database();
    let engine = sqlite();
    for (query, expected) in [
        ("select p.name from Person p order by p.name limit 2", 2),
        ("select p.name from Person p order by p.name offset 3 rows", 2),
        ("select p.name from Person p order by p.name offset 4 rows fetch first 3 rows only", 1),
    ] {
        let rows = strings(&conn, &engine.compile(query).unwrap(), &[]);
        assert_eq!(rows.len(), expected, "{query}");
        let total = count(&conn, &engine.count_query(query).unwrap(), &[]);
        assert_eq!(total, expected as i64, "{query}");
    }
}

#[test]
fn test_repeated_parameter_bound_per_placeholder() {
    let conn = database();
    let rendered = sqlite()
        .compile("select p.name from Person p where p.city = :city or p.name = :city")
        .unwrap();
    assert_eq!(rendered.parameters.len(), 2);
    let values: Vec<Value> = rendered
        .parameters
        .iter()
        .map(|_| Value::Text("Bergen".into()))
        .collect();
    let mut rows = strings(&conn, &rendered, &values);
    rows.sort();
    assert_eq!(rows, vec!["Cato", "Dina"]);
}

#[test]
fn test_joins_and_collections() {
    let conn = database();
    let engine = sqlite();

    let rows = strings(
        &conn,
        &engine
            .compile("select p.name from Person p where p.phones is empty order by p.name")
            .unwrap(),
        &[],
    );
    assert_eq!(rows, vec!["Brit", "Dina", "Emil"]);

    let rows = strings(
        &conn,
        &engine
            .compile("select distinct p.address.street from Person p order by p.address.street")
            .unwrap(),
        &[],
    );
    assert_eq!(rows, vec!["Harbour Road", "Main Street"]);

    let rows = strings(
        &conn,
        &engine
            .compile("select ph.number from Person p join p.phones ph where p.name = 'Ada' order by ph.number")
            .unwrap(),
        &[],
    );
    assert_eq!(rows, vec!["+47 111", "+47 222"]);
}

#[test]
fn test_temporal_functions_execute() {
    let conn = database();
    let engine = sqlite();

    let rows = strings(
        &conn,
        &engine
            .compile("select p.name from Person p where extract(year from p.born) = 1990 order by p.name")
            .unwrap(),
        &[],
    );
    assert_eq!(rows, vec!["Ada", "Emil"]);

    let rows = strings(
        &conn,
        &engine
            .compile("select timestampadd(day, 2, p.born) from Person p where p.id = 1")
            .unwrap(),
        &[],
    );
    assert_eq!(rows, vec!["1990-01-03"]);

    let rows = strings(
        &conn,
        &engine
            .compile(
                "select timestampadd(week, 2, p.born) || ' ' || timestampadd(quarter, 1, p.born) \
                 from Person p where p.id = 1",
            )
            .unwrap(),
        &[],
    );
    assert_eq!(rows, vec!["1990-01-15 1990-04-01"]);

    let days: i64 = conn
        .query_row(
            &engine
                .compile("select timestampdiff(day, p.born, :until) from Person p where p.id = 1")
                .unwrap()
                .sql,
            params!["1990-02-01"],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(days, 31);
}

#[test]
fn test_union_and_pagination_execute() {
    let conn = database();
    let engine = sqlite();

    let rows = strings(
        &conn,
        &engine
            .compile("select p.city as place from Person p union select a.street from Address a order by place")
            .unwrap(),
        &[],
    );
    assert_eq!(rows, vec!["Bergen", "Harbour Road", "Main Street", "Oslo", "Tromso"]);

    let rows = strings(
        &conn,
        &engine
            .compile("select p.city as place from Person p union select a.street from Address a order by place fetch first 2 rows only")
            .unwrap(),
        &[],
    );
    assert_eq!(rows, vec!["Bergen", "Harbour Road"]);

    let rows = strings(
        &conn,
        &engine
            .compile("select p.name from Person p order by p.name offset 1 rows fetch first 2 rows only")
            .unwrap(),
        &[],
    );
    assert_eq!(rows, vec!["Brit", "Cato"]);
}
