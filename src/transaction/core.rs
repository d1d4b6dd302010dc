//! Defines the core data models and database queries for transactions.

use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};
use time::Date;

use crate::{
    Error,
    date::{format_iso_date, parse_iso_date},
    transaction::{DateRange, Direction},
};

// ============================================================================
// MODELS
// ============================================================================

/// A category or payment method attached to a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    /// The stable identifier of the category/payment method, if the source has one.
    #[serde(default)]
    pub id: Option<i64>,
    /// The key of the icon shown for this label, e.g. "groceries".
    #[serde(default)]
    pub icon: Option<String>,
    /// The display name.
    pub name: String,
}

/// The identity used to deduplicate labels within a day.
///
/// Ordered so that membership sets iterate deterministically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LabelKey {
    /// A genuine identifier from the source data.
    Id(i64),
    /// The icon key, used when no identifier is available.
    Icon(String),
    /// The display name, used as a last resort.
    Name(String),
}

impl Label {
    /// Create a label with just a display name.
    pub fn named(name: &str) -> Self {
        Self {
            id: None,
            icon: None,
            name: name.to_owned(),
        }
    }

    /// The key two labels must share to count as the same category or payment method.
    ///
    /// Prefers the identifier, then the icon key, then the display name.
    pub fn key(&self) -> LabelKey {
        if let Some(id) = self.id {
            return LabelKey::Id(id);
        }

        match self.icon.as_deref() {
            Some(icon) if !icon.is_empty() => LabelKey::Icon(icon.to_owned()),
            _ => LabelKey::Name(self.name.clone()),
        }
    }
}

/// An expense or income as read back from the store.
///
/// `date` is kept as the raw stored text: a record with a missing or
/// unparseable date is still a record, it just cannot be placed on a calendar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// The ID of the transaction.
    pub id: i64,
    /// The calendar day of the transaction as `YYYY-MM-DD`.
    pub date: Option<String>,
    /// The amount of money that moved. Only the magnitude is used, the sign
    /// comes from `direction`.
    pub amount: f64,
    /// Whether money came in, went out, or neither.
    pub direction: Direction,
    /// The category of the transaction, e.g. "Groceries".
    #[serde(default)]
    pub category: Option<Label>,
    /// How the transaction was paid, e.g. "Credit card".
    #[serde(default)]
    pub payment_method: Option<Label>,
}

impl TransactionRecord {
    /// The parsed calendar day of this record, if it has a valid one.
    pub fn parsed_date(&self) -> Option<Date> {
        self.date.as_deref().and_then(parse_iso_date)
    }

    /// The amount with the sign implied by its direction. Zero for neutral records.
    pub fn signed_amount(&self) -> f64 {
        self.amount.abs() * self.direction.sign()
    }
}

/// The payload for a transaction that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTransaction {
    /// The calendar day of the transaction as `YYYY-MM-DD`.
    pub date: Option<String>,
    /// The amount of money that moved.
    pub amount: f64,
    /// Whether money came in, went out, or neither. Accepts any of the
    /// synonyms understood by [Direction::classify].
    pub direction: Direction,
    /// The category of the transaction.
    #[serde(default)]
    pub category: Option<Label>,
    /// How the transaction was paid.
    #[serde(default)]
    pub payment_method: Option<Label>,
}

impl NewTransaction {
    /// Create a new transaction payload without a category or payment method.
    pub fn new(date: Date, amount: f64, direction: Direction) -> Self {
        Self {
            date: Some(format_iso_date(date)),
            amount,
            direction,
            category: None,
            payment_method: None,
        }
    }

    /// Set the category.
    pub fn category(mut self, category: Label) -> Self {
        self.category = Some(category);
        self
    }

    /// Set the payment method.
    pub fn payment_method(mut self, payment_method: Label) -> Self {
        self.payment_method = Some(payment_method);
        self
    }
}

/// Which transactions to read.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TransactionQuery {
    /// The shared ledger to read from. `None` reads the caller's own ledger.
    pub target_id: Option<i64>,
    /// Only include transactions dated within this range, inclusive.
    pub range: Option<DateRange>,
    /// Only include transactions with this direction.
    pub direction: Option<Direction>,
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

/// Insert a batch of transactions into `target_id`'s ledger.
///
/// Callers that need all-or-nothing behaviour should pass a
/// [rusqlite::Transaction], which derefs to a [Connection].
///
/// # Errors
/// Returns an [Error::SqlError] if any insert fails.
pub fn insert_transactions(
    transactions: &[NewTransaction],
    target_id: Option<i64>,
    connection: &Connection,
) -> Result<usize, Error> {
    let mut statement = connection.prepare_cached(
        "INSERT INTO \"transaction\" (
            target_id, date, amount, direction,
            category_id, category_icon, category_name,
            payment_method_id, payment_method_icon, payment_method_name
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
    )?;

    for transaction in transactions {
        let (category_id, category_icon, category_name) = label_columns(&transaction.category);
        let (method_id, method_icon, method_name) = label_columns(&transaction.payment_method);

        statement.execute((
            target_id,
            stored_date(transaction.date.as_deref()),
            transaction.amount,
            transaction.direction.as_str(),
            category_id,
            category_icon,
            category_name,
            method_id,
            method_icon,
            method_name,
        ))?;
    }

    Ok(transactions.len())
}

/// The text to store for a record's date: the canonical `YYYY-MM-DD` form
/// when it parses, so range queries compare like with like, otherwise the
/// raw text so the record is still kept and later skipped by aggregation.
fn stored_date(date: Option<&str>) -> Option<String> {
    date.map(|text| match parse_iso_date(text) {
        Some(parsed) => format_iso_date(parsed),
        None => text.to_owned(),
    })
}

fn label_columns(label: &Option<Label>) -> (Option<i64>, Option<&str>, Option<&str>) {
    match label {
        Some(label) => (label.id, label.icon.as_deref(), Some(label.name.as_str())),
        None => (None, None, None),
    }
}

/// Read the transactions matching `query`, ordered by date then ID.
///
/// # Errors
/// Returns an [Error::SqlError] if the query fails.
pub fn get_transactions(
    query: &TransactionQuery,
    connection: &Connection,
) -> Result<Vec<TransactionRecord>, Error> {
    let start = query.range.map(|range| format_iso_date(range.start));
    let end = query.range.map(|range| format_iso_date(range.end));
    let direction = query.direction.map(Direction::as_str);

    connection
        .prepare_cached(
            "SELECT id, date, amount, direction,
                category_id, category_icon, category_name,
                payment_method_id, payment_method_icon, payment_method_name
            FROM \"transaction\"
            WHERE target_id IS ?1
                AND (?2 IS NULL OR date >= ?2)
                AND (?3 IS NULL OR date <= ?3)
                AND (?4 IS NULL OR direction = ?4)
            ORDER BY date, id",
        )?
        .query_map((query.target_id, start, end, direction), map_transaction_row)?
        .map(|row| row.map_err(Error::from))
        .collect()
}

/// Get the number of transactions in `target_id`'s ledger.
///
/// # Errors
/// This function will return a [Error::SqlError] there is some SQL error.
pub fn count_transactions(target_id: Option<i64>, connection: &Connection) -> Result<u32, Error> {
    connection
        .query_row(
            "SELECT COUNT(id) FROM \"transaction\" WHERE target_id IS ?1",
            [target_id],
            |row| row.get(0),
        )
        .map_err(|error| error.into())
}

/// Create the transaction table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_transaction_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    // `date` is nullable text: imports may carry dates the aggregator has to skip.
    connection.execute(
        "CREATE TABLE IF NOT EXISTS \"transaction\" (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                target_id INTEGER,
                date TEXT,
                amount REAL NOT NULL,
                direction TEXT NOT NULL,
                category_id INTEGER,
                category_icon TEXT,
                category_name TEXT,
                payment_method_id INTEGER,
                payment_method_icon TEXT,
                payment_method_name TEXT
                )",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_transaction_target_date ON \"transaction\"(target_id, date);",
        (),
    )?;

    Ok(())
}

/// Map a database row to a [TransactionRecord].
pub fn map_transaction_row(row: &Row) -> Result<TransactionRecord, rusqlite::Error> {
    let direction: String = row.get(3)?;

    Ok(TransactionRecord {
        id: row.get(0)?,
        date: row.get(1)?,
        amount: row.get(2)?,
        direction: Direction::classify(&direction),
        category: map_label(row, 4)?,
        payment_method: map_label(row, 7)?,
    })
}

fn map_label(row: &Row, offset: usize) -> Result<Option<Label>, rusqlite::Error> {
    let name: Option<String> = row.get(offset + 2)?;

    Ok(match name {
        Some(name) => Some(Label {
            id: row.get(offset)?,
            icon: row.get(offset + 1)?,
            name,
        }),
        None => None,
    })
}

// ============================================================================
// TESTS
// ============================================================================
