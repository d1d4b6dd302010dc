//! Gap-free daily or monthly trend series with running averages.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    date::{format_day_label, format_iso_date},
    heatmap::MagnitudeSource,
    transaction::{DateRange, DayBuckets, MonthRef},
};

/// The size of one point in a trend series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    /// One point per calendar day.
    Daily,
    /// One point per calendar month.
    Monthly,
}

impl Granularity {
    /// The longest range, in days, that is shown daily by default.
    pub const MAX_DAILY_RANGE_DAYS: i64 = 31;

    /// The longest range, in days, that is ever shown daily. Longer daily
    /// requests fall back to monthly points.
    pub const MAX_DAILY_POINTS: i64 = 3660;

    /// Daily for ranges of a month or less, monthly for anything longer.
    pub fn for_range(range: DateRange) -> Self {
        if range.len_days() <= Self::MAX_DAILY_RANGE_DAYS {
            Granularity::Daily
        } else {
            Granularity::Monthly
        }
    }
}

/// One point of a trend series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    /// A short label for chart axes, e.g. "Mar 01" or "Mar 2024".
    pub period_label: String,
    /// A sortable key, `YYYY-MM-DD` for days and `YYYY-MM` for months.
    pub period_key: String,
    /// The total for the period.
    pub amount: f64,
    /// The mean of this and all earlier amounts in the series, rounded to cents.
    pub running_average: f64,
}

/// Round to two decimal places.
pub fn round_to_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Build a trend series over `range` from `buckets`.
///
/// Every day (or month) in the range gets a point, with an amount of zero
/// when nothing happened, so the x-axis always represents elapsed time. For
/// monthly series the first and last months may be partial: only days inside
/// `range` are counted.
pub fn build_trend(
    buckets: &DayBuckets,
    range: DateRange,
    granularity: Granularity,
    source: MagnitudeSource,
) -> Vec<TrendPoint> {
    if range.end < range.start {
        tracing::warn!(
            "Ignoring trend request for inverted range {} to {}",
            range.start,
            range.end
        );
        return Vec::new();
    }

    let granularity = match granularity {
        Granularity::Daily if range.len_days() > Granularity::MAX_DAILY_POINTS => {
            tracing::warn!(
                "Daily trend over {} days exceeds the limit of {}, using monthly points",
                range.len_days(),
                Granularity::MAX_DAILY_POINTS
            );
            Granularity::Monthly
        }
        granularity => granularity,
    };

    let periods = match granularity {
        Granularity::Daily => daily_periods(buckets, range, source),
        Granularity::Monthly => monthly_periods(buckets, range, source),
    };

    with_running_average(periods)
}

/// (key, label, amount) for each day in `range`.
fn daily_periods(
    buckets: &DayBuckets,
    range: DateRange,
    source: MagnitudeSource,
) -> Vec<(String, String, f64)> {
    range
        .days()
        .map(|day| {
            let amount = buckets.get(day).map_or(0.0, |bucket| source.value(bucket));
            (format_iso_date(day), format_day_label(day), amount)
        })
        .collect()
}

/// (key, label, amount) for each month touched by `range`.
fn monthly_periods(
    buckets: &DayBuckets,
    range: DateRange,
    source: MagnitudeSource,
) -> Vec<(String, String, f64)> {
    let mut totals: BTreeMap<MonthRef, f64> = BTreeMap::new();
    for bucket in buckets.iter().filter(|bucket| range.contains(bucket.date)) {
        *totals.entry(MonthRef::containing(bucket.date)).or_insert(0.0) += source.value(bucket);
    }

    let last = MonthRef::containing(range.end);
    std::iter::successors(Some(MonthRef::containing(range.start)), |month| {
        month.offset_by(1).filter(|next| *next <= last)
    })
    .map(|month| {
        let amount = totals.get(&month).copied().unwrap_or(0.0);
        (month.key(), month.label(), amount)
    })
    .collect()
}

fn with_running_average(periods: Vec<(String, String, f64)>) -> Vec<TrendPoint> {
    let mut accumulator = 0.0;

    periods
        .into_iter()
        .enumerate()
        .map(|(i, (period_key, period_label, amount))| {
            accumulator += amount;
            TrendPoint {
                period_label,
                period_key,
                amount,
                running_average: round_to_cents(accumulator / (i + 1) as f64),
            }
        })
        .collect()
}
