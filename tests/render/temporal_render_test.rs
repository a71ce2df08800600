//! Emulated temporal functions across dialects.

#[path = "../common/mod.rs"]
mod common;

use common::{engine, sql};
use sqm::semantic::SemanticError;
use sqm::temporal::{convert_unit, TemporalUnit};
use sqm::translate::RenderError;
use sqm::{Dialect, QueryError};

const ADD_TWO_DAYS: &str = "select timestampadd(day, 2, p.born) from Person p";

#[test]
fn test_timestampadd_per_dialect() {
    insta::assert_snapshot!(
        sql(ADD_TWO_DAYS, Dialect::Postgres),
        @"SELECT (p1_0.born + (2) * interval '1 day') FROM person AS p1_0"
    );
    assert_eq!(
        sql(ADD_TWO_DAYS, Dialect::Ansi),
        "SELECT timestampadd(day, 2, p1_0.born) FROM person AS p1_0"
    );
    assert_eq!(
        sql(ADD_TWO_DAYS, Dialect::H2),
        "SELECT dateadd(day, 2, p1_0.born) FROM person AS p1_0"
    );
    assert_eq!(
        sql(ADD_TWO_DAYS, Dialect::TSql),
        "SELECT dateadd(day, 2, p1_0.born) FROM person AS p1_0"
    );
}

#[test]
fn test_sqlite_timestampadd_depends_on_operand_type() {
    assert_eq!(
        sql(ADD_TWO_DAYS, Dialect::Sqlite),
        "SELECT date(p1_0.born, (2) || ' day') FROM person AS p1_0"
    );
    assert_eq!(
        sql(
            "select timestampadd(week, 1, p.born) from Person p",
            Dialect::Sqlite
        ),
        "SELECT date(p1_0.born, ((1)*7) || ' day') FROM person AS p1_0"
    );
}

#[test]
fn test_quarter_scaled_to_months() {
    assert_eq!(
        sql(
            "select timestampadd(quarter, 1, p.born) from Person p",
            Dialect::Postgres
        ),
        "SELECT (p1_0.born + (1)*3 * interval '1 month') FROM person AS p1_0"
    );
    assert_eq!(
        sql(
            "select timestampadd(quarter, 1, p.born) from Person p",
            Dialect::Ansi
        ),
        "SELECT timestampadd(month, (1)*3, p1_0.born) FROM person AS p1_0"
    );
}

#[test]
fn test_timestampdiff() {
    let query = "select timestampdiff(day, p.born, :today) from Person p";
    assert_eq!(
        sql(query, Dialect::Sqlite),
        "SELECT cast((julianday(?) - julianday(p1_0.born)) as integer) FROM person AS p1_0"
    );
    assert_eq!(
        sql(query, Dialect::H2),
        "SELECT datediff(day, p1_0.born, ?) FROM person AS p1_0"
    );
    assert_eq!(
        sql(
            "select timestampdiff(week, p.born, :today) from Person p",
            Dialect::Sqlite
        ),
        "SELECT cast((julianday(?) - julianday(p1_0.born))/7 as integer) FROM person AS p1_0"
    );
}

#[test]
fn test_extract() {
    let query = "select extract(year from p.born) from Person p";
    assert_eq!(
        sql(query, Dialect::Postgres),
        "SELECT extract(year from p1_0.born) FROM person AS p1_0"
    );
    assert_eq!(
        sql(query, Dialect::Sqlite),
        "SELECT cast(strftime('%Y', p1_0.born) as integer) FROM person AS p1_0"
    );
    assert_eq!(
        sql(query, Dialect::TSql),
        "SELECT datepart(year, p1_0.born) FROM person AS p1_0"
    );
    assert_eq!(
        sql(
            "select extract(day_of_week from p.born) from Person p",
            Dialect::Postgres
        ),
        "SELECT (extract(dow from p1_0.born)+1) FROM person AS p1_0"
    );
}

#[test]
fn test_extract_fields_without_emulation() {
    assert_eq!(
        sql(
            "select extract(day_of_week from p.born) from Person p",
            Dialect::Teradata
        ),
        "SELECT td_day_of_week(p1_0.born) FROM person AS p1_0"
    );

    for (query, dialect) in [
        ("select extract(nanosecond from p.born) from Person p", Dialect::Sqlite),
        ("select extract(epoch from p.born) from Person p", Dialect::Teradata),
    ] {
        let err = engine(dialect).compile(query).unwrap_err();
        assert!(
            matches!(
                err,
                QueryError::Render(RenderError::Unsupported { ref feature, .. }) if feature.starts_with("extract(")
            ),
            "{query} on {dialect}: {err:?}"
        );
    }
}

#[test]
fn test_field_units_rejected_as_durations() {
    let err = engine(Dialect::Postgres)
        .compile("select timestampadd(day_of_week, 1, p.born) from Person p")
        .unwrap_err();
    assert!(matches!(
        err,
        QueryError::Semantic(SemanticError::FunctionArgument { ref function, .. }) if function == "timestampadd"
    ));
}

#[test]
fn test_unit_conversion_factors() {
    assert_eq!(convert_unit(TemporalUnit::Second, TemporalUnit::Nanosecond).unwrap(), "*1e9");
    assert_eq!(convert_unit(TemporalUnit::Week, TemporalUnit::Day).unwrap(), "*7");
    assert_eq!(convert_unit(TemporalUnit::Day, TemporalUnit::Week).unwrap(), "/7");
    assert_eq!(convert_unit(TemporalUnit::Month, TemporalUnit::Year).unwrap(), "/12");
    assert!(convert_unit(TemporalUnit::Month, TemporalUnit::Day).is_err());
    assert!(convert_unit(TemporalUnit::DayOfWeek, TemporalUnit::Day).is_err());
}
