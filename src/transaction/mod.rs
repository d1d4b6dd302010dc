//! Transaction records and the day-level aggregation built on them.
//!
//! This module contains:
//! - The [TransactionRecord] model, [Direction] normalisation and [Label] identity
//! - Database functions for storing and querying transactions
//! - [aggregate_by_day], which produces the [DayBuckets] every view is built from
//! - [MonthGrid], a calendar-complete walk over one month of buckets
//! - The endpoint for reading transactions

mod aggregation;
mod core;
mod direction;
mod month_grid;
mod range;
mod read_endpoint;

pub use aggregation::{DayBucket, DayBuckets, LabelSet, MalformedRecordError, aggregate_by_day};
pub use core::{
    Label, LabelKey, NewTransaction, TransactionQuery, TransactionRecord, count_transactions,
    create_transaction_table, get_transactions, insert_transactions, map_transaction_row,
};
pub use direction::Direction;
pub use month_grid::MonthGrid;
pub use range::{DateRange, MonthRef};

pub(crate) use read_endpoint::get_transactions_endpoint;
