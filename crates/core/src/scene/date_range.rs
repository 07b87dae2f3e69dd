//! Closed acquisition date ranges

use crate::error::{Error, Result};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A closed date range `[start, end]`; both ends are included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawRange")]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

#[derive(Deserialize)]
struct RawRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl TryFrom<RawRange> for DateRange {
    type Error = Error;

    fn try_from(raw: RawRange) -> Result<Self> {
        DateRange::new(raw.start, raw.end)
    }
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(Error::InvalidDateRange {
                start: start.to_string(),
                end: end.to_string(),
            });
        }
        Ok(Self { start, end })
    }

    /// January 1st through December 31st of `year`
    pub fn calendar_year(year: i32) -> Result<Self> {
        let start = NaiveDate::from_ymd_opt(year, 1, 1);
        let end = NaiveDate::from_ymd_opt(year, 12, 31);
        match (start, end) {
            (Some(start), Some(end)) => Self::new(start, end),
            _ => Err(Error::InvalidParameter {
                name: "year",
                value: year.to_string(),
                reason: "outside the supported calendar".into(),
            }),
        }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Year of the range start, used to tag yearly composites
    pub fn year(&self) -> i32 {
        self.start.year()
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_range_is_closed() {
        let r = DateRange::new(date(2014, 1, 1), date(2014, 12, 31)).unwrap();
        assert!(r.contains(date(2014, 1, 1)));
        assert!(r.contains(date(2014, 12, 31)));
        assert!(!r.contains(date(2015, 1, 1)));
        assert!(!r.contains(date(2013, 12, 31)));
    }

    #[test]
    fn test_reversed_range_rejected() {
        assert!(DateRange::new(date(2024, 1, 2), date(2024, 1, 1)).is_err());
    }

    #[test]
    fn test_calendar_year() {
        let r = DateRange::calendar_year(2020).unwrap();
        assert_eq!(r.start(), date(2020, 1, 1));
        assert_eq!(r.end(), date(2020, 12, 31));
        assert_eq!(r.year(), 2020);
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: DateRange =
            serde_json::from_str(r#"{"start":"2014-01-01","end":"2014-12-31"}"#).unwrap();
        assert_eq!(ok.to_string(), "2014-01-01..2014-12-31");
        assert!(serde_json::from_str::<DateRange>(r#"{"start":"2015-01-01","end":"2014-12-31"}"#).is_err());
    }
}
