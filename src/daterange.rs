// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Date filters for queries.
//!
//! Closed ranges are inclusive at the start and exclusive at the end. A
//! partial date used as a range bound stands for the first day of its period.

use std::ops::{Bound, RangeBounds};

use chrono::{Datelike, Months, NaiveDate};

use crate::errors::{Result, usage};

/// A calendar date known to year, month or day precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartialDate {
    year: i32,
    month: Option<u32>,
    day: Option<u32>,
}

impl PartialDate {
    /// Accepts `YYYY`, `YYYYMM`, `YYYY-MM`, `YYYYMMDD` and `YYYY-MM-DD`.
    pub fn parse(raw: &str) -> Result<Self> {
        let digits: String = raw.trim().chars().filter(|c| *c != '-').collect();
        if !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(usage(format!("Invalid date '{}'", raw)));
        }
        let num = |range: std::ops::Range<usize>| -> Result<u32> {
            digits[range]
                .parse::<u32>()
                .map_err(|_| usage(format!("Invalid date '{}'", raw)))
        };
        let pd = match digits.len() {
            4 => PartialDate {
                year: num(0..4)? as i32,
                month: None,
                day: None,
            },
            6 => PartialDate {
                year: num(0..4)? as i32,
                month: Some(num(4..6)?),
                day: None,
            },
            8 => PartialDate {
                year: num(0..4)? as i32,
                month: Some(num(4..6)?),
                day: Some(num(6..8)?),
            },
            _ => {
                return Err(usage(format!(
                    "Invalid date '{}', expected YYYY, YYYY-MM or YYYY-MM-DD",
                    raw
                )));
            }
        };
        if NaiveDate::from_ymd_opt(pd.year, pd.month.unwrap_or(1), pd.day.unwrap_or(1)).is_none()
        {
            return Err(usage(format!("Invalid date '{}'", raw)));
        }
        Ok(pd)
    }

    pub fn from_date(date: NaiveDate) -> Self {
        PartialDate {
            year: date.year(),
            month: Some(date.month()),
            day: Some(date.day()),
        }
    }

    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month.unwrap_or(1), self.day.unwrap_or(1))
            .unwrap_or(NaiveDate::MIN)
    }

    /// First day of the following period.
    pub fn next_start(&self) -> NaiveDate {
        let first = self.first_day();
        let next = match (self.month, self.day) {
            (_, Some(_)) => first.succ_opt(),
            (Some(_), None) => first.checked_add_months(Months::new(1)),
            (None, None) => first.checked_add_months(Months::new(12)),
        };
        next.unwrap_or(NaiveDate::MAX)
    }

    pub fn last_day(&self) -> NaiveDate {
        self.next_start().pred_opt().unwrap_or(NaiveDate::MAX)
    }
}

/// Date interval with explicit bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: Bound<NaiveDate>,
    pub end: Bound<NaiveDate>,
}

impl DateRange {
    pub fn all() -> Self {
        DateRange {
            start: Bound::Unbounded,
            end: Bound::Unbounded,
        }
    }

    /// The whole period a partial date covers.
    pub fn period(date: PartialDate) -> Self {
        DateRange {
            start: Bound::Included(date.first_day()),
            end: Bound::Excluded(date.next_start()),
        }
    }

    /// `[start, end)`; a missing side is unbounded.
    pub fn between(start: Option<PartialDate>, end: Option<PartialDate>) -> Self {
        DateRange {
            start: start.map_or(Bound::Unbounded, |s| Bound::Included(s.first_day())),
            end: end.map_or(Bound::Unbounded, |e| Bound::Excluded(e.first_day())),
        }
    }

    pub fn between_dates(start: NaiveDate, end: NaiveDate) -> Self {
        DateRange {
            start: Bound::Included(start),
            end: Bound::Excluded(end),
        }
    }

    /// Everything up to and including the last day of `date`'s period.
    pub fn through(date: PartialDate) -> Self {
        DateRange {
            start: Bound::Unbounded,
            end: Bound::Included(date.last_day()),
        }
    }

    pub fn since(date: PartialDate) -> Self {
        DateRange {
            start: Bound::Included(date.first_day()),
            end: Bound::Unbounded,
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        (self.start, self.end).contains(&date)
    }
}

/// Any of the date forms a query accepts, normalized lazily to a [`DateRange`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateSpec {
    Day(NaiveDate),
    Text(String),
    Between(Option<String>, Option<String>),
    Range(DateRange),
}

impl DateSpec {
    pub fn between(start: Option<&str>, end: Option<&str>) -> Self {
        DateSpec::Between(start.map(str::to_string), end.map(str::to_string))
    }

    pub fn normalize(&self) -> Result<DateRange> {
        match self {
            DateSpec::Day(d) => Ok(DateRange::period(PartialDate::from_date(*d))),
            DateSpec::Text(s) => Ok(DateRange::period(PartialDate::parse(s)?)),
            DateSpec::Between(start, end) => {
                if start.is_none() && end.is_none() {
                    return Ok(DateRange::all());
                }
                let start = start.as_deref().map(PartialDate::parse).transpose()?;
                let end = end.as_deref().map(PartialDate::parse).transpose()?;
                Ok(DateRange::between(start, end))
            }
            DateSpec::Range(r) => Ok(*r),
        }
    }
}

impl From<NaiveDate> for DateSpec {
    fn from(d: NaiveDate) -> Self {
        DateSpec::Day(d)
    }
}

impl From<&str> for DateSpec {
    fn from(s: &str) -> Self {
        DateSpec::Text(s.to_string())
    }
}

impl From<String> for DateSpec {
    fn from(s: String) -> Self {
        DateSpec::Text(s)
    }
}

impl From<DateRange> for DateSpec {
    fn from(r: DateRange) -> Self {
        DateSpec::Range(r)
    }
}

impl From<(NaiveDate, NaiveDate)> for DateSpec {
    fn from((start, end): (NaiveDate, NaiveDate)) -> Self {
        DateSpec::Range(DateRange::between_dates(start, end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn parses_all_precisions() {
        assert_eq!(PartialDate::parse("2024").unwrap().first_day(), ymd(2024, 1, 1));
        assert_eq!(PartialDate::parse("2024-02").unwrap().last_day(), ymd(2024, 2, 29));
        assert_eq!(PartialDate::parse("202410").unwrap().first_day(), ymd(2024, 10, 1));
        assert_eq!(PartialDate::parse("20241015").unwrap().last_day(), ymd(2024, 10, 15));
        assert!(PartialDate::parse("2024-13").is_err());
        assert!(PartialDate::parse("24").is_err());
        assert!(PartialDate::parse("2024-1x").is_err());
    }

    #[test]
    fn period_covers_whole_month() {
        let r = DateSpec::from("2024-12").normalize().unwrap();
        assert!(r.contains(ymd(2024, 12, 1)));
        assert!(r.contains(ymd(2024, 12, 31)));
        assert!(!r.contains(ymd(2025, 1, 1)));
        assert!(!r.contains(ymd(2024, 11, 30)));
    }

    #[test]
    fn between_is_start_inclusive_end_exclusive() {
        let r = DateSpec::between(Some("2024-01-10"), Some("2024-01-20"))
            .normalize()
            .unwrap();
        assert!(r.contains(ymd(2024, 1, 10)));
        assert!(r.contains(ymd(2024, 1, 19)));
        assert!(!r.contains(ymd(2024, 1, 20)));
        assert!(!r.contains(ymd(2024, 1, 9)));
    }

    #[test]
    fn through_includes_its_last_day() {
        let r = DateRange::through(PartialDate::parse("2024-01").unwrap());
        assert!(r.contains(ymd(1990, 5, 5)));
        assert!(r.contains(ymd(2024, 1, 31)));
        assert!(!r.contains(ymd(2024, 2, 1)));
    }

    #[test]
    fn open_between_is_everything() {
        let r = DateSpec::between(None, None).normalize().unwrap();
        assert_eq!(r, DateRange::all());
    }
}
