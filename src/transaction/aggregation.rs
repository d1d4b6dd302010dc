//! Buckets transaction records into per-day totals.
//!
//! Calendars, heatmaps and trend reports are all built from the same
//! [DayBuckets], so every surface agrees on what happened on a given day.

use std::collections::BTreeMap;

use serde::{Serialize, ser::SerializeMap};
use time::Date;

use crate::{
    date::format_iso_date,
    transaction::{Direction, Label, LabelKey, TransactionRecord},
};

/// A record that could not be placed into a bucket.
///
/// Never fatal: the aggregator skips the record and keeps going.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("transaction {id} has {reason}")]
pub struct MalformedRecordError {
    /// The ID of the skipped record.
    pub id: i64,
    /// What was wrong with it.
    pub reason: String,
}

/// A set of labels keyed by their identity, so each appears at most once.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LabelSet(BTreeMap<LabelKey, Label>);

impl LabelSet {
    /// Add `label` unless a label with the same key is already present.
    ///
    /// The first label seen for a key is kept.
    pub fn insert(&mut self, label: &Label) {
        self.0.entry(label.key()).or_insert_with(|| label.clone());
    }

    /// The number of distinct labels.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over the labels in key order.
    pub fn iter(&self) -> impl Iterator<Item = &Label> {
        self.0.values()
    }
}

impl Serialize for LabelSet {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.0.values())
    }
}

/// The totals and membership of a single calendar day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayBucket {
    /// The day this bucket covers.
    #[serde(with = "crate::date::iso_date")]
    pub date: Date,
    /// The sum of money received.
    pub inflow_total: f64,
    /// The sum of money spent, as a positive number.
    pub outflow_total: f64,
    /// `inflow_total - outflow_total`.
    pub net_total: f64,
    /// The distinct categories of the day's transactions.
    pub member_categories: LabelSet,
    /// The distinct payment methods of the day's transactions.
    pub member_payment_methods: LabelSet,
}

impl DayBucket {
    /// A bucket with no activity.
    pub fn empty(date: Date) -> Self {
        Self {
            date,
            inflow_total: 0.0,
            outflow_total: 0.0,
            net_total: 0.0,
            member_categories: LabelSet::default(),
            member_payment_methods: LabelSet::default(),
        }
    }

    fn add(&mut self, record: &TransactionRecord) {
        let magnitude = record.amount.abs();

        match record.direction {
            Direction::Inflow => self.inflow_total += magnitude,
            Direction::Outflow => self.outflow_total += magnitude,
            Direction::Neutral => {}
        }
        self.net_total += record.signed_amount();

        if let Some(category) = &record.category {
            self.member_categories.insert(category);
        }

        if let Some(payment_method) = &record.payment_method {
            self.member_payment_methods.insert(payment_method);
        }
    }
}

/// Day buckets keyed by date, plus the records that had to be skipped.
///
/// Serializes as a JSON object keyed by ISO date.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DayBuckets {
    buckets: BTreeMap<Date, DayBucket>,
    skipped: Vec<MalformedRecordError>,
}

impl DayBuckets {
    /// The bucket for `date`, if any record fell on that day.
    pub fn get(&self, date: Date) -> Option<&DayBucket> {
        self.buckets.get(&date)
    }

    /// The bucket for `date`, or an empty one.
    pub fn get_or_empty(&self, date: Date) -> DayBucket {
        self.buckets
            .get(&date)
            .cloned()
            .unwrap_or_else(|| DayBucket::empty(date))
    }

    /// Iterate over the buckets in date order.
    pub fn iter(&self) -> impl Iterator<Item = &DayBucket> {
        self.buckets.values()
    }

    /// The number of days that had at least one record.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    /// Whether no record could be bucketed.
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// The records that were skipped because of a missing or malformed date.
    pub fn skipped(&self) -> &[MalformedRecordError] {
        &self.skipped
    }
}

impl Serialize for DayBuckets {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.buckets.len()))?;
        for (date, bucket) in &self.buckets {
            map.serialize_entry(&format_iso_date(*date), bucket)?;
        }
        map.end()
    }
}

/// Aggregate `records` into one bucket per calendar day.
///
/// Each record is bucketed by its own date, as stored. Records without a
/// valid date are skipped and listed in [DayBuckets::skipped]. Neutral and
/// zero-amount records do not change totals but still add their category and
/// payment method to the day's membership.
pub fn aggregate_by_day(records: &[TransactionRecord]) -> DayBuckets {
    let mut buckets: BTreeMap<Date, DayBucket> = BTreeMap::new();
    let mut skipped = Vec::new();

    for record in records {
        let Some(date) = record.parsed_date() else {
            let reason = match &record.date {
                None => "no date".to_owned(),
                Some(text) => format!("an unparseable date \"{text}\""),
            };
            skipped.push(MalformedRecordError {
                id: record.id,
                reason,
            });
            continue;
        };

        buckets
            .entry(date)
            .or_insert_with(|| DayBucket::empty(date))
            .add(record);
    }

    if !skipped.is_empty() {
        tracing::warn!(
            "Skipped {} of {} transactions with missing or malformed dates",
            skipped.len(),
            records.len()
        );
    }

    DayBuckets { buckets, skipped }
}
