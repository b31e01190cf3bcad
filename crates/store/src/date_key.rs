//! Calendar dates in their persisted 8-digit form (`YYYYMMDD`).
//!
//! Only years 1 through 9999 fit that form, so every constructor refuses
//! dates outside them.

use std::fmt;

use chrono::{Datelike, Days, Months, NaiveDate};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

const MIN_YEAR: i32 = 1;
const MAX_YEAR: i32 = 9999;

/// A calendar date that sorts and serializes as `YYYYMMDD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DateKey(NaiveDate);

impl DateKey {
    /// `None` outside years 1..=9999.
    pub fn new(date: NaiveDate) -> Option<Self> {
        (MIN_YEAR..=MAX_YEAR).contains(&date.year()).then_some(Self(date))
    }

    /// Pins out-of-range dates to the first or last representable day.
    pub fn clamped(date: NaiveDate) -> Self {
        match date.year() {
            y if y < MIN_YEAR => Self::earliest(),
            y if y > MAX_YEAR => Self::latest(),
            _ => Self(date),
        }
    }

    pub fn earliest() -> Self {
        Self(NaiveDate::from_ymd_opt(MIN_YEAR, 1, 1).unwrap_or(NaiveDate::MIN))
    }

    pub fn latest() -> Self {
        Self(NaiveDate::from_ymd_opt(MAX_YEAR, 12, 31).unwrap_or(NaiveDate::MAX))
    }

    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).and_then(Self::new)
    }

    pub fn parse(s: &str) -> Option<Self> {
        if s.len() != 8 || !s.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        NaiveDate::parse_from_str(s, "%Y%m%d").ok().and_then(Self::new)
    }

    /// `YYYY-MM-DD`, four-digit years only.
    pub fn parse_iso(s: &str) -> Option<Self> {
        let b = s.as_bytes();
        if b.len() != 10 || b[4] != b'-' || b[7] != b'-' {
            return None;
        }
        NaiveDate::parse_from_str(s, "%Y-%m-%d").ok().and_then(Self::new)
    }

    pub fn date(self) -> NaiveDate {
        self.0
    }

    pub fn same_month(self, other: DateKey) -> bool {
        self.0.year() == other.0.year() && self.0.month() == other.0.month()
    }

    pub fn first_of_month(self) -> DateKey {
        Self(self.0 - Days::new(u64::from(self.0.day0())))
    }

    /// Last calendar day of the month before this one; `None` in January
    /// of year 1.
    pub fn end_of_previous_month(self) -> Option<DateKey> {
        self.first_of_month()
            .0
            .checked_sub_days(Days::new(1))
            .and_then(Self::new)
    }

    /// First day of the month that lies `months` calendar months earlier,
    /// never before [`DateKey::earliest`].
    pub fn months_back(self, months: u32) -> DateKey {
        let first = self.first_of_month().0;
        first
            .checked_sub_months(Months::new(months))
            .map_or_else(Self::earliest, Self::clamped)
    }
}

impl fmt::Display for DateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y%m%d"))
    }
}

impl Serialize for DateKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

struct DateKeyVisitor;

impl<'de> Visitor<'de> for DateKeyVisitor {
    type Value = DateKey;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a date as YYYYMMDD or YYYY-MM-DD")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<DateKey, E> {
        DateKey::parse(v)
            .or_else(|| DateKey::parse_iso(v))
            .ok_or_else(|| E::custom(format!("cannot parse date '{v}'")))
    }
}

impl<'de> Deserialize<'de> for DateKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<DateKey, D::Error> {
        deserializer.deserialize_str(DateKeyVisitor)
    }
}
