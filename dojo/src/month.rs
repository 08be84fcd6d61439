use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Local};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Calendar month a dues charge is keyed by, written `YYYY-MM` on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Month {
    year: i32,
    month: u32,
}

#[derive(Error, Debug, PartialEq)]
pub enum MonthParseError {
    #[error("month must look like YYYY-MM, got {0:?}")]
    Format(String),
    #[error("month out of range: {0}")]
    Range(u32),
}

impl Month {
    pub fn new(year: i32, month: u32) -> Result<Self, MonthParseError> {
        if !(1..=12).contains(&month) {
            return Err(MonthParseError::Range(month));
        }
        Ok(Self { year, month })
    }

    pub fn current() -> Self {
        let today = Local::now().date_naive();
        Self {
            year: today.year(),
            month: today.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn succ(self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    pub fn pred(self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    /// Every month from `self` through `last`, inclusive. Empty when `self`
    /// is after `last`.
    pub fn through(self, last: Month) -> Vec<Month> {
        let mut months = Vec::new();
        let mut cursor = self;
        while cursor <= last {
            months.push(cursor);
            cursor = cursor.succ();
        }
        months
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for Month {
    type Err = MonthParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || MonthParseError::Format(s.to_string());

        let (year, month) = s.split_once('-').ok_or_else(bad)?;
        if year.len() != 4 || month.len() != 2 {
            return Err(bad());
        }

        let year: i32 = year.parse().map_err(|_| bad())?;
        let month: u32 = month.parse().map_err(|_| bad())?;

        Month::new(year, month)
    }
}

impl TryFrom<String> for Month {
    type Error = MonthParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Month> for String {
    fn from(m: Month) -> Self {
        m.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let m: Month = "2026-03".parse().unwrap();
        assert_eq!(m, Month::new(2026, 3).unwrap());
        assert_eq!(m.to_string(), "2026-03");
    }

    #[test]
    fn test_rejects_garbage() {
        assert!("2026-13".parse::<Month>().is_err());
        assert!("2026-00".parse::<Month>().is_err());
        assert!("26-03".parse::<Month>().is_err());
        assert!("2026-3".parse::<Month>().is_err());
        assert!("march".parse::<Month>().is_err());
    }

    #[test]
    fn test_succ_wraps_year() {
        let dec = Month::new(2025, 12).unwrap();
        assert_eq!(dec.succ(), Month::new(2026, 1).unwrap());
        assert_eq!(dec.succ().pred(), dec);
    }

    #[test]
    fn test_through() {
        let from = Month::new(2025, 11).unwrap();
        let to = Month::new(2026, 2).unwrap();
        let range = from.through(to);
        assert_eq!(range.len(), 4);
        assert_eq!(range[0].to_string(), "2025-11");
        assert_eq!(range[3].to_string(), "2026-02");
        assert!(to.through(from).is_empty());
    }

    #[test]
    fn test_ordering() {
        let a = Month::new(2025, 12).unwrap();
        let b = Month::new(2026, 1).unwrap();
        assert!(a < b);
    }
}
