//! Resolution of the reporting period.
//!
//! A run covers either the calendar period preceding "today" (weekly,
//! monthly or quarterly) or an explicit inclusive range given on the command
//! line. Everything here is a pure function of its inputs; the caller reads
//! the process clock.

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Date format accepted for explicit ranges.
pub const INPUT_DATE_FORMAT: &str = "%Y-%m-%d";
/// Date format of the `timestamp` partition column in the log table.
pub const PARTITION_DATE_FORMAT: &str = "%Y/%m/%d";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DateRangeError {
    #[error("--frequency and --date_range are mutually exclusive")]
    ConflictingModes,

    #[error("either a frequency or an explicit date range is required")]
    MissingMode,

    #[error("invalid date '{value}': expected YYYY-MM-DD")]
    InvalidDate { value: String },

    #[error("start date {start} is after end date {end}")]
    StartAfterEnd { start: NaiveDate, end: NaiveDate },

    #[error("no previous {frequency} period before {today}")]
    OutOfRange { frequency: Frequency, today: NaiveDate },

    #[error("unknown frequency '{0}'. Supported: weekly, monthly, quarterly")]
    UnknownFrequency(String),
}

/// Implicit prior-period selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Weekly,
    Monthly,
    Quarterly,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Weekly => "weekly",
            Frequency::Monthly => "monthly",
            Frequency::Quarterly => "quarterly",
        }
    }

    /// The complete period of this kind immediately preceding the one that
    /// contains `today`.
    pub fn previous_period(self, today: NaiveDate) -> Result<DateRange, DateRangeError> {
        let out_of_range = || DateRangeError::OutOfRange {
            frequency: self,
            today,
        };

        let (start, end) = match self {
            Frequency::Weekly => {
                let monday = today
                    .checked_sub_signed(Duration::days(
                        today.weekday().num_days_from_monday() as i64,
                    ))
                    .ok_or_else(out_of_range)?;
                let start = monday
                    .checked_sub_signed(Duration::days(7))
                    .ok_or_else(out_of_range)?;
                let end = monday.pred_opt().ok_or_else(out_of_range)?;
                (start, end)
            }
            Frequency::Monthly => {
                let end = today
                    .with_day(1)
                    .and_then(|first| first.pred_opt())
                    .ok_or_else(out_of_range)?;
                let start = end.with_day(1).ok_or_else(out_of_range)?;
                (start, end)
            }
            Frequency::Quarterly => {
                let end = NaiveDate::from_ymd_opt(today.year(), quarter_start_month(today), 1)
                    .and_then(|first| first.pred_opt())
                    .ok_or_else(out_of_range)?;
                let start = NaiveDate::from_ymd_opt(end.year(), quarter_start_month(end), 1)
                    .ok_or_else(out_of_range)?;
                (start, end)
            }
        };

        Ok(DateRange { start, end })
    }
}

fn quarter_start_month(date: NaiveDate) -> u32 {
    (date.month0() / 3) * 3 + 1
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Frequency {
    type Err = DateRangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "weekly" => Ok(Frequency::Weekly),
            "monthly" => Ok(Frequency::Monthly),
            "quarterly" => Ok(Frequency::Quarterly),
            _ => Err(DateRangeError::UnknownFrequency(s.to_string())),
        }
    }
}

/// Inclusive calendar date range. `start <= end` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, DateRangeError> {
        if start > end {
            return Err(DateRangeError::StartAfterEnd { start, end });
        }
        Ok(Self { start, end })
    }

    /// Parse an explicit `YYYY-MM-DD` pair.
    pub fn parse(start: &str, end: &str) -> Result<Self, DateRangeError> {
        Self::new(parse_date(start)?, parse_date(end)?)
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Number of days covered, both ends included.
    pub fn num_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    /// Bounds formatted like the `timestamp` partition column (`YYYY/MM/DD`).
    pub fn partition_bounds(&self) -> (String, String) {
        (
            self.start.format(PARTITION_DATE_FORMAT).to_string(),
            self.end.format(PARTITION_DATE_FORMAT).to_string(),
        )
    }

    /// File stem used for per-period artifacts: `YYYY_MM_DD-YYYY_MM_DD`.
    pub fn file_stem(&self) -> String {
        format!(
            "{}-{}",
            self.start.format("%Y_%m_%d"),
            self.end.format("%Y_%m_%d")
        )
    }

    /// The `count` whole calendar months before this range's start month,
    /// most recent first.
    pub fn preceding_months(&self, count: usize) -> Vec<DateRange> {
        let mut periods = Vec::with_capacity(count);
        let mut cursor = self.start;
        for _ in 0..count {
            match Frequency::Monthly.previous_period(cursor) {
                Ok(period) => {
                    cursor = period.start;
                    periods.push(period);
                }
                Err(_) => break,
            }
        }
        periods
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

fn parse_date(value: &str) -> Result<NaiveDate, DateRangeError> {
    NaiveDate::parse_from_str(value.trim(), INPUT_DATE_FORMAT).map_err(|_| {
        DateRangeError::InvalidDate {
            value: value.to_string(),
        }
    })
}

/// Resolve the run's date range from exactly one of the two input modes.
pub fn resolve(
    frequency: Option<Frequency>,
    explicit: Option<(&str, &str)>,
    today: NaiveDate,
) -> Result<DateRange, DateRangeError> {
    match (frequency, explicit) {
        (Some(_), Some(_)) => Err(DateRangeError::ConflictingModes),
        (None, None) => Err(DateRangeError::MissingMode),
        (Some(frequency), None) => frequency.previous_period(today),
        (None, Some((start, end))) => DateRange::parse(start, end),
    }
}
