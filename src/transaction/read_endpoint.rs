//! The endpoint for reading a ledger's transactions as JSON.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, Query, State},
};
use rusqlite::Connection;
use serde::Deserialize;

use crate::{
    AppState, Error,
    date::parse_query_date,
    transaction::{DateRange, Direction, TransactionQuery, TransactionRecord, get_transactions},
};

/// The state needed for reading transactions.
#[derive(Debug, Clone)]
pub struct TransactionState {
    /// The database connection for reading transactions.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for TransactionState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// Query string for [get_transactions_endpoint].
///
/// Either `date` or both `start` and `end` may be given, all as `YYYY-MM-DD`.
#[derive(Debug, Default, Deserialize)]
pub struct ReadTransactionsQuery {
    /// The shared ledger to read from. Omit for the caller's own ledger.
    pub target_id: Option<i64>,
    /// A single day to read.
    pub date: Option<String>,
    /// The first day of a range to read.
    pub start: Option<String>,
    /// The last day of a range to read.
    pub end: Option<String>,
    /// Only read transactions in this direction, e.g. "outflow" or "loss".
    #[serde(rename = "type")]
    pub direction: Option<String>,
}

impl ReadTransactionsQuery {
    pub(crate) fn range(&self) -> Result<Option<DateRange>, Error> {
        match (&self.date, &self.start, &self.end) {
            (Some(date), None, None) => Ok(Some(DateRange::single_day(parse_query_date(date)?))),
            (None, Some(start), Some(end)) => {
                DateRange::new(parse_query_date(start)?, parse_query_date(end)?).map(Some)
            }
            (None, None, None) => Ok(None),
            _ => Err(Error::IncompleteDateRange),
        }
    }

    fn into_query(self) -> Result<TransactionQuery, Error> {
        Ok(TransactionQuery {
            target_id: self.target_id,
            range: self.range()?,
            direction: self
                .direction
                .as_deref()
                .filter(|direction| !direction.trim().is_empty())
                .map(Direction::classify),
        })
    }
}

/// Route handler for reading transactions.
///
/// # Errors
/// Returns a 400 response for malformed dates or ranges, and a 500 response if
/// the database cannot be read.
pub async fn get_transactions_endpoint(
    State(state): State<TransactionState>,
    Query(query): Query<ReadTransactionsQuery>,
) -> Result<Json<Vec<TransactionRecord>>, Error> {
    let query = query.into_query()?;

    let connection = state.db_connection.lock().map_err(|error| {
        tracing::error!("could not acquire database lock: {error}");
        Error::DatabaseLockError
    })?;

    get_transactions(&query, &connection).map(Json)
}
