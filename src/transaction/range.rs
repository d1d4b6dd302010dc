//! Date-range and calendar-month helpers for calendars and trend reports.

use serde::Serialize;
use time::{Date, Duration, Month};

use crate::{
    Error,
    date::{format_iso_date, format_month_label},
};

/// An inclusive range of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct DateRange {
    /// The first day in the range.
    #[serde(with = "crate::date::iso_date")]
    pub start: Date,
    /// The last day in the range.
    #[serde(with = "crate::date::iso_date")]
    pub end: Date,
}

impl DateRange {
    /// Create a range from `start` to `end`, inclusive.
    ///
    /// # Errors
    /// Returns [Error::InvalidDateRange] if `end` is before `start`.
    pub fn new(start: Date, end: Date) -> Result<Self, Error> {
        if end < start {
            return Err(Error::InvalidDateRange {
                start: format_iso_date(start),
                end: format_iso_date(end),
            });
        }

        Ok(Self { start, end })
    }

    /// A range containing a single day.
    pub fn single_day(date: Date) -> Self {
        Self {
            start: date,
            end: date,
        }
    }

    /// The number of days in the range, counting both ends.
    pub fn len_days(&self) -> i64 {
        (self.end - self.start).whole_days() + 1
    }

    /// Whether `date` falls within the range.
    pub fn contains(&self, date: Date) -> bool {
        self.start <= date && date <= self.end
    }

    /// Iterate over every day in the range in order.
    pub fn days(&self) -> impl Iterator<Item = Date> + use<> {
        let end = self.end;
        std::iter::successors(Some(self.start), move |day| {
            day.next_day().filter(|next| *next <= end)
        })
    }
}

/// A calendar month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MonthRef {
    first: Date,
}

impl MonthRef {
    /// The month containing `date`.
    pub fn containing(date: Date) -> Self {
        Self {
            first: date - Duration::days(i64::from(date.day()) - 1),
        }
    }

    /// The month `offset` months away from the month containing `today`.
    ///
    /// Calendar views navigate by offset: 0 is the current month, -1 the
    /// previous one. Returns `None` if the result falls outside the supported
    /// date range.
    pub fn from_offset(today: Date, offset: i32) -> Option<Self> {
        Self::containing(today).offset_by(offset)
    }

    /// The month `months` months after this one (before, if negative).
    pub fn offset_by(self, months: i32) -> Option<Self> {
        let index = i64::from(self.year()) * 12 + i64::from(self.month() as u8) - 1 + i64::from(months);
        let year = i32::try_from(index.div_euclid(12)).ok()?;
        let month = Month::try_from(u8::try_from(index.rem_euclid(12) + 1).ok()?).ok()?;
        let first = Date::from_calendar_date(year, month, 1).ok()?;

        Some(Self { first })
    }

    /// The year of the month.
    pub fn year(&self) -> i32 {
        self.first.year()
    }

    /// The month of the year.
    pub fn month(&self) -> Month {
        self.first.month()
    }

    /// The number of days in the month.
    pub fn length(&self) -> u8 {
        self.month().length(self.year())
    }

    /// The first day of the month.
    pub fn first_day(&self) -> Date {
        self.first
    }

    /// The last day of the month.
    pub fn last_day(&self) -> Date {
        self.first + Duration::days(i64::from(self.length()) - 1)
    }

    /// The whole month as a date range.
    pub fn range(&self) -> DateRange {
        DateRange {
            start: self.first_day(),
            end: self.last_day(),
        }
    }

    /// The `YYYY-MM` key of the month.
    pub fn key(&self) -> String {
        format!("{:04}-{:02}", self.year(), self.month() as u8)
    }

    /// A label such as "Mar 2024".
    pub fn label(&self) -> String {
        format_month_label(self.first)
    }
}
