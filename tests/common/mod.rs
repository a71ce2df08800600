//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use sqlparser::dialect::{
    AnsiDialect, GenericDialect, MsSqlDialect, MySqlDialect, PostgreSqlDialect, SQLiteDialect,
};
use sqlparser::parser::Parser;
use sqm::{Dialect, QueryEngine, StaticDomainModel};

pub const DOMAIN: &str = r#"
[entities.Person]
table = "person"
id = "id"

[entities.Person.attributes.id]
kind = "basic"
type = "long"

[entities.Person.attributes.name]
kind = "basic"
type = "string"

[entities.Person.attributes.age]
kind = "basic"
type = "integer"

[entities.Person.attributes.city]
kind = "basic"
type = "string"

[entities.Person.attributes.born]
kind = "basic"
type = "date"

[entities.Person.attributes.address]
kind = "to_one"
target = "Address"
join_column = "address_id"

[entities.Person.attributes.phones]
kind = "to_many"
target = "Phone"
key_column = "person_id"

[entities.Address]
table = "address"
id = "id"

[entities.Address.attributes.id]
kind = "basic"
type = "long"

[entities.Address.attributes.street]
kind = "basic"
type = "string"

[entities.Phone]
table = "phone"
id = "id"

[entities.Phone.attributes.id]
kind = "basic"
type = "long"

[entities.Phone.attributes.number]
kind = "basic"
type = "string"
"#;

pub fn domain() -> StaticDomainModel {
    StaticDomainModel::from_toml_str(DOMAIN).expect("fixture domain model should load")
}

pub fn engine(dialect: Dialect) -> QueryEngine {
    QueryEngine::new(dialect, Arc::new(domain()))
}

/// Compile `query` for `dialect`, panicking on failure.
pub fn sql(query: &str, dialect: Dialect) -> String {
    engine(dialect)
        .compile(query)
        .unwrap_or_else(|e| panic!("'{query}' should compile for {dialect}: {e}"))
        .sql
}

/// Parse `sql` with sqlparser's grammar for `dialect`.
pub fn validate_sql(sql: &str, dialect: Dialect) -> Result<(), String> {
    let parser_dialect: Box<dyn sqlparser::dialect::Dialect> = match dialect {
        // sqlparser's Postgres grammar reads `?` as a JSON operator.
        Dialect::Postgres if sql.contains('?') => Box::new(GenericDialect {}),
        Dialect::Postgres => Box::new(PostgreSqlDialect {}),
        Dialect::MySql | Dialect::MariaDb => Box::new(MySqlDialect {}),
        Dialect::TSql => Box::new(MsSqlDialect {}),
        Dialect::Sqlite => Box::new(SQLiteDialect {}),
        Dialect::Ansi => Box::new(AnsiDialect {}),
        Dialect::Oracle | Dialect::H2 | Dialect::Db2 | Dialect::Teradata => {
            Box::new(GenericDialect {})
        }
    };

    Parser::parse_sql(&*parser_dialect, sql)
        .map(|_| ())
        .map_err(|e| format!("Invalid SQL for {:?}: {}\nSQL: {}", dialect, e, sql))
}
