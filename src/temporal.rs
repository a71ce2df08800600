//! Temporal units and exact unit conversion factors.
//!
//! Units are used in three places: as the first argument of `timestampadd`
//! and `timestampdiff`, as the field of `extract`, and as the scaling input
//! when a dialect emulates a unit its engine does not support natively.
//!
//! Conversion is only defined inside two families:
//!
//! ```text
//! nanosecond <-> second <-> minute <-> hour <-> day <-> week
//! month <-> quarter <-> year
//! ```
//!
//! `epoch` counts seconds and converts like `second`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A unit of time or a calendar field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemporalUnit {
    Year,
    Quarter,
    Month,
    Week,
    Day,
    Hour,
    Minute,
    Second,
    Nanosecond,
    DayOfWeek,
    DayOfYear,
    DayOfMonth,
    WeekOfMonth,
    WeekOfYear,
    Offset,
    TimezoneHour,
    TimezoneMinute,
    Date,
    Time,
    Epoch,
}

/// Two units that do not belong to the same conversion family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("illegal unit conversion {from} to {to}")]
pub struct IllegalUnitConversion {
    pub from: TemporalUnit,
    pub to: TemporalUnit,
}

/// Text that does not name a temporal unit.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown temporal unit: {0}")]
pub struct UnknownTemporalUnit(pub String);

/// Length of each sub-day unit in nanoseconds.
const NANOS_PER_SECOND: u64 = 1_000_000_000;

impl TemporalUnit {
    pub const ALL: [TemporalUnit; 20] = [
        TemporalUnit::Year,
        TemporalUnit::Quarter,
        TemporalUnit::Month,
        TemporalUnit::Week,
        TemporalUnit::Day,
        TemporalUnit::Hour,
        TemporalUnit::Minute,
        TemporalUnit::Second,
        TemporalUnit::Nanosecond,
        TemporalUnit::DayOfWeek,
        TemporalUnit::DayOfYear,
        TemporalUnit::DayOfMonth,
        TemporalUnit::WeekOfMonth,
        TemporalUnit::WeekOfYear,
        TemporalUnit::Offset,
        TemporalUnit::TimezoneHour,
        TemporalUnit::TimezoneMinute,
        TemporalUnit::Date,
        TemporalUnit::Time,
        TemporalUnit::Epoch,
    ];

    /// Lowercase name, as rendered into SQL.
    pub fn name(self) -> &'static str {
        match self {
            TemporalUnit::Year => "year",
            TemporalUnit::Quarter => "quarter",
            TemporalUnit::Month => "month",
            TemporalUnit::Week => "week",
            TemporalUnit::Day => "day",
            TemporalUnit::Hour => "hour",
            TemporalUnit::Minute => "minute",
            TemporalUnit::Second => "second",
            TemporalUnit::Nanosecond => "nanosecond",
            TemporalUnit::DayOfWeek => "day_of_week",
            TemporalUnit::DayOfYear => "day_of_year",
            TemporalUnit::DayOfMonth => "day_of_month",
            TemporalUnit::WeekOfMonth => "week_of_month",
            TemporalUnit::WeekOfYear => "week_of_year",
            TemporalUnit::Offset => "offset",
            TemporalUnit::TimezoneHour => "timezone_hour",
            TemporalUnit::TimezoneMinute => "timezone_minute",
            TemporalUnit::Date => "date",
            TemporalUnit::Time => "time",
            TemporalUnit::Epoch => "epoch",
        }
    }

    /// Whether this unit addresses a part of a date (as opposed to a time of day or a zone).
    pub fn is_date_unit(self) -> bool {
        matches!(
            self,
            TemporalUnit::Year
                | TemporalUnit::Quarter
                | TemporalUnit::Month
                | TemporalUnit::Week
                | TemporalUnit::Day
                | TemporalUnit::DayOfWeek
                | TemporalUnit::DayOfYear
                | TemporalUnit::DayOfMonth
                | TemporalUnit::WeekOfMonth
                | TemporalUnit::WeekOfYear
                | TemporalUnit::Date
        )
    }

    /// Whether this unit is a duration that `timestampadd`/`timestampdiff` accept.
    pub fn is_duration_unit(self) -> bool {
        self.family().is_some()
    }

    /// Size of the unit within its conversion family, in the family's base unit.
    fn family(self) -> Option<(Family, u64)> {
        let second = NANOS_PER_SECOND;
        match self {
            TemporalUnit::Nanosecond => Some((Family::Time, 1)),
            TemporalUnit::Second | TemporalUnit::Epoch => Some((Family::Time, second)),
            TemporalUnit::Minute => Some((Family::Time, 60 * second)),
            TemporalUnit::Hour => Some((Family::Time, 60 * 60 * second)),
            TemporalUnit::Day => Some((Family::Time, 24 * 60 * 60 * second)),
            TemporalUnit::Week => Some((Family::Time, 7 * 24 * 60 * 60 * second)),
            TemporalUnit::Month => Some((Family::Calendar, 1)),
            TemporalUnit::Quarter => Some((Family::Calendar, 3)),
            TemporalUnit::Year => Some((Family::Calendar, 12)),
            _ => None,
        }
    }

    /// The factor that turns a quantity in `self` into a quantity in `to`.
    ///
    /// Returns `"*n"` or `"/n"`, or an empty string when the units are the
    /// same. Factors ending in more than two zeros use exponent shorthand,
    /// so seconds to nanoseconds is `"*1e9"`.
    pub fn conversion_factor(self, to: TemporalUnit) -> Result<String, IllegalUnitConversion> {
        if self == to {
            return Ok(String::new());
        }
        let illegal = IllegalUnitConversion { from: self, to };
        let ((from_family, from_size), (to_family, to_size)) =
            match (self.family(), to.family()) {
                (Some(from), Some(to)) => (from, to),
                _ => return Err(illegal),
            };
        if from_family != to_family {
            return Err(illegal);
        }
        if from_size == to_size {
            return Ok(String::new());
        }
        let (factor, reciprocal) = if from_size > to_size {
            (from_size / to_size, false)
        } else {
            (to_size / from_size, true)
        };
        let operator = if reciprocal { "/" } else { "*" };
        Ok(format!("{operator}{}", format_factor(factor)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Family {
    Time,
    Calendar,
}

/// Print a factor, shortening trailing zeros to an exponent when there are more than two.
fn format_factor(factor: u64) -> String {
    let digits = factor.to_string();
    let prefix = digits.trim_end_matches('0');
    let zeros = digits.len() - prefix.len();
    if zeros > 2 {
        format!("{prefix}e{zeros}")
    } else {
        digits
    }
}

/// Factor for converting a quantity in `from` units to `to` units.
pub fn convert_unit(from: TemporalUnit, to: TemporalUnit) -> Result<String, IllegalUnitConversion> {
    from.conversion_factor(to)
}

impl fmt::Display for TemporalUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TemporalUnit {
    type Err = UnknownTemporalUnit;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        TemporalUnit::ALL
            .iter()
            .copied()
            .find(|unit| unit.name() == lower)
            .ok_or_else(|| UnknownTemporalUnit(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_unit_is_empty() {
        assert_eq!(convert_unit(TemporalUnit::Day, TemporalUnit::Day).unwrap(), "");
        assert_eq!(convert_unit(TemporalUnit::Second, TemporalUnit::Epoch).unwrap(), "");
    }

    #[test]
    fn test_seconds_to_nanoseconds_uses_shorthand() {
        assert_eq!(
            convert_unit(TemporalUnit::Second, TemporalUnit::Nanosecond).unwrap(),
            "*1e9"
        );
        assert_eq!(
            convert_unit(TemporalUnit::Nanosecond, TemporalUnit::Second).unwrap(),
            "/1e9"
        );
    }

    #[test]
    fn test_week_and_day() {
        assert_eq!(convert_unit(TemporalUnit::Week, TemporalUnit::Day).unwrap(), "*7");
        assert_eq!(convert_unit(TemporalUnit::Day, TemporalUnit::Week).unwrap(), "/7");
    }

    #[test]
    fn test_two_trailing_zeros_are_kept() {
        assert_eq!(
            convert_unit(TemporalUnit::Day, TemporalUnit::Second).unwrap(),
            "*86400"
        );
        assert_eq!(
            convert_unit(TemporalUnit::Hour, TemporalUnit::Second).unwrap(),
            "*3600"
        );
    }

    #[test]
    fn test_week_to_nanoseconds() {
        assert_eq!(
            convert_unit(TemporalUnit::Week, TemporalUnit::Nanosecond).unwrap(),
            "*6048e11"
        );
        assert_eq!(
            convert_unit(TemporalUnit::Minute, TemporalUnit::Nanosecond).unwrap(),
            "*6e10"
        );
    }

    #[test]
    fn test_calendar_family() {
        assert_eq!(convert_unit(TemporalUnit::Year, TemporalUnit::Month).unwrap(), "*12");
        assert_eq!(convert_unit(TemporalUnit::Month, TemporalUnit::Year).unwrap(), "/12");
        assert_eq!(convert_unit(TemporalUnit::Quarter, TemporalUnit::Month).unwrap(), "*3");
        assert_eq!(convert_unit(TemporalUnit::Month, TemporalUnit::Quarter).unwrap(), "/3");
        assert_eq!(convert_unit(TemporalUnit::Year, TemporalUnit::Quarter).unwrap(), "*4");
    }

    #[test]
    fn test_cross_family_is_illegal() {
        let err = convert_unit(TemporalUnit::Month, TemporalUnit::Day).unwrap_err();
        assert_eq!(err.from, TemporalUnit::Month);
        assert_eq!(err.to, TemporalUnit::Day);
        assert_eq!(err.to_string(), "illegal unit conversion month to day");

        assert!(convert_unit(TemporalUnit::DayOfWeek, TemporalUnit::Day).is_err());
        assert!(convert_unit(TemporalUnit::Week, TemporalUnit::Month).is_err());
        assert!(convert_unit(TemporalUnit::Date, TemporalUnit::Time).is_err());
    }

    #[test]
    fn test_date_units() {
        assert!(TemporalUnit::Year.is_date_unit());
        assert!(TemporalUnit::WeekOfYear.is_date_unit());
        assert!(TemporalUnit::Date.is_date_unit());
        assert!(!TemporalUnit::Hour.is_date_unit());
        assert!(!TemporalUnit::TimezoneHour.is_date_unit());
        assert!(!TemporalUnit::Epoch.is_date_unit());
    }

    #[test]
    fn test_display_and_parse() {
        assert_eq!(TemporalUnit::DayOfWeek.to_string(), "day_of_week");
        assert_eq!("DAY_OF_WEEK".parse::<TemporalUnit>().unwrap(), TemporalUnit::DayOfWeek);
        assert_eq!("Quarter".parse::<TemporalUnit>().unwrap(), TemporalUnit::Quarter);
        assert!("fortnight".parse::<TemporalUnit>().is_err());
    }
}
