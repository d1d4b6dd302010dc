//! Calendar-complete month views over [DayBuckets].

use serde::Serialize;
use time::Date;

use crate::transaction::{DayBucket, DayBuckets, MonthRef};

/// Every day of one month, in order, including days without activity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthGrid {
    /// The `YYYY-MM` key of the month.
    pub month: String,
    /// A label such as "Mar 2024".
    pub label: String,
    /// How many months away from the current month this grid is.
    pub month_offset: i32,
    /// The day of the month salary is paid, clamped to the month's length.
    pub salary_day: Option<u8>,
    /// One bucket per day of the month.
    pub days: Vec<DayBucket>,
}

impl MonthGrid {
    /// Walk every day of `month`, filling days without records with empty buckets.
    ///
    /// A `salary_day` past the end of the month lands on its last day, e.g. the
    /// 31st becomes the 30th in April. A `salary_day` of zero is ignored.
    pub fn build(
        buckets: &DayBuckets,
        month: MonthRef,
        month_offset: i32,
        salary_day: Option<u8>,
    ) -> Self {
        let days = month
            .range()
            .days()
            .map(|day| buckets.get_or_empty(day))
            .collect();

        Self {
            month: month.key(),
            label: month.label(),
            month_offset,
            salary_day: salary_day
                .filter(|day| *day > 0)
                .map(|day| day.min(month.length())),
            days,
        }
    }

    /// The bucket for `date`, if it falls in this month.
    pub fn day(&self, date: Date) -> Option<&DayBucket> {
        self.days.iter().find(|bucket| bucket.date == date)
    }

    /// The month's total inflow, outflow and net.
    pub fn totals(&self) -> (f64, f64, f64) {
        self.days.iter().fold((0.0, 0.0, 0.0), |(inflow, outflow, net), day| {
            (
                inflow + day.inflow_total,
                outflow + day.outflow_total,
                net + day.net_total,
            )
        })
    }
}
