use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PeriodError {
    #[error("Invalid month key: '{0}' (expected MM/YYYY)")]
    Invalid(String),
}

/// A calendar month, rendered (and serialized) as `MM/YYYY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct MonthKey {
    year: i32,
    month: u32,
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}/{:04}", self.month, self.year)
    }
}

impl FromStr for MonthKey {
    type Err = PeriodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || PeriodError::Invalid(s.to_string());
        let (month, year) = s.trim().split_once('/').ok_or_else(invalid)?;
        let month: u32 = month.parse().map_err(|_| invalid())?;
        let year: i32 = year.parse().map_err(|_| invalid())?;
        MonthKey::new(year, month).ok_or_else(invalid)
    }
}

impl From<MonthKey> for String {
    fn from(month: MonthKey) -> Self {
        month.to_string()
    }
}

impl TryFrom<String> for MonthKey {
    type Error = PeriodError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl MonthKey {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        // Reject anything chrono can't represent as a first-of-month date.
        NaiveDate::from_ymd_opt(year, month, 1)?;
        Some(MonthKey { year, month })
    }

    pub fn of(date: NaiveDate) -> Self {
        MonthKey {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn of_datetime(dt: NaiveDateTime) -> Self {
        Self::of(dt.date())
    }

    pub fn year(self) -> i32 {
        self.year
    }

    pub fn month(self) -> u32 {
        self.month
    }

    pub fn next(self) -> Self {
        if self.month == 12 {
            MonthKey {
                year: self.year + 1,
                month: 1,
            }
        } else {
            MonthKey {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// Midnight on the first day of the month.
    pub fn start(self) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
            .unwrap_or(NaiveDate::MIN)
            .and_time(chrono::NaiveTime::MIN)
    }

    /// Midnight on the first day of the following month (exclusive bound).
    pub fn end(self) -> NaiveDateTime {
        self.next().start()
    }

    pub fn contains(self, dt: NaiveDateTime) -> bool {
        dt >= self.start() && dt < self.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dt(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    #[test]
    fn display_is_zero_padded() {
        assert_eq!(MonthKey::new(2025, 9).unwrap().to_string(), "09/2025");
        assert_eq!(MonthKey::new(2025, 12).unwrap().to_string(), "12/2025");
    }

    #[test]
    fn parse_roundtrip_and_rejects_bad_input() {
        let key: MonthKey = "10/2025".parse().unwrap();
        assert_eq!(key, MonthKey::new(2025, 10).unwrap());
        assert!("13/2025".parse::<MonthKey>().is_err());
        assert!("2025-10".parse::<MonthKey>().is_err());
        assert!("".parse::<MonthKey>().is_err());
    }

    #[test]
    fn of_datetime_takes_calendar_month() {
        assert_eq!(
            MonthKey::of_datetime(dt(2025, 9, 30, 23)).to_string(),
            "09/2025"
        );
    }

    #[test]
    fn serializes_as_display_string() {
        let oct = MonthKey::new(2025, 10).unwrap();
        assert_eq!(serde_json::to_string(&oct).unwrap(), "\"10/2025\"");
        assert_eq!(serde_json::from_str::<MonthKey>("\"10/2025\"").unwrap(), oct);
        assert!(serde_json::from_str::<MonthKey>("\"2025-10\"").is_err());
    }

    #[test]
    fn next_wraps_year() {
        let dec = MonthKey::new(2025, 12).unwrap();
        assert_eq!(dec.next(), MonthKey::new(2026, 1).unwrap());
    }

    #[test]
    fn bounds_are_half_open() {
        let sep = MonthKey::new(2025, 9).unwrap();
        assert_eq!(sep.start(), dt(2025, 9, 1, 0));
        assert_eq!(sep.end(), dt(2025, 10, 1, 0));
        assert!(sep.contains(dt(2025, 9, 1, 0)));
        assert!(sep.contains(dt(2025, 9, 30, 23)));
        assert!(!sep.contains(dt(2025, 10, 1, 0)));
    }
}
