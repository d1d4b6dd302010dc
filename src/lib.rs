//! Moneygrid turns a flat list of transactions into calendars, heatmaps and
//! trend series, and runs bulk imports as asynchronous jobs whose progress can
//! be polled.
//!
//! The aggregation side ([transaction], [heatmap], [trend]) is made of pure
//! functions over already-fetched records. The import side ([import]) has a
//! server half (job registry and worker behind the HTTP endpoints) and a
//! client half ([import::BulkImportJobClient] and [import::JobProgressState]).

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_server::Handle;
use serde_json::json;
use tokio::signal;

mod app_state;
mod date;
mod db;
pub mod endpoints;
pub mod heatmap;
pub mod import;
mod logging;
mod reports;
mod routing;
mod timezone;
pub mod transaction;
pub mod trend;
pub mod view_state;

pub use app_state::AppState;
pub use date::{format_iso_date, parse_iso_date};
pub use db::initialize as initialize_db;
pub use logging::{LOG_BODY_LENGTH_LIMIT, logging_middleware};
pub use routing::build_router;

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        if let Err(error) = signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl+C: {error}");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(error) => {
                tracing::error!("failed to install terminate signal handler: {error}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}

/// The errors that may occur in the server half of the application.
///
/// Aggregation never produces these: malformed records are skipped and
/// reported through [transaction::MalformedRecordError] instead. Client-side
/// import failures are described by [import::ImportError].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The requested resource was not found.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// No import job exists with the given ID.
    ///
    /// Either the ID is wrong or the job finished long enough ago that it was
    /// pruned from the registry.
    #[error("no import job with the ID \"{0}\"")]
    JobNotFound(String),

    /// A bulk import was submitted without any records.
    #[error("there are no transactions to import")]
    EmptyImport,

    /// Tried to change the progress of a job that already completed or failed.
    #[error("import job \"{0}\" has already finished")]
    JobAlreadyFinished(String),

    /// The start of a date range was after its end.
    #[error("the date range {start} to {end} ends before it starts")]
    InvalidDateRange {
        /// The requested start date.
        start: String,
        /// The requested end date.
        end: String,
    },

    /// Only one of `start` and `end` was given, or a single `date` was mixed
    /// with a range.
    #[error("give either a single date, or both a start and an end date")]
    IncompleteDateRange,

    /// A date string in a request could not be parsed as `YYYY-MM-DD`.
    #[error("\"{0}\" is not a valid date, expected YYYY-MM-DD")]
    InvalidDate(String),

    /// The heatmap colour ramp was empty, had thresholds outside [0, 1] or
    /// thresholds that were not strictly ascending.
    #[error("invalid colour ramp: {0}")]
    InvalidColorRamp(String),

    /// An error occurred while getting the local timezone from a canonical timezone string.
    #[error("invalid timezone {0}")]
    InvalidTimezoneError(String),

    /// Could not acquire the database lock.
    #[error("could not acquire the database lock")]
    DatabaseLockError,

    /// Could not acquire the lock on the import job registry.
    #[error("could not acquire the import job registry lock")]
    JobRegistryLockError,

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Error::NotFound | Error::JobNotFound(_) => StatusCode::NOT_FOUND,
            Error::JobAlreadyFinished(_) => StatusCode::CONFLICT,
            Error::InvalidDateRange { .. }
            | Error::IncompleteDateRange
            | Error::EmptyImport
            | Error::InvalidDate(_)
            | Error::InvalidColorRamp(_) => StatusCode::BAD_REQUEST,
            Error::InvalidTimezoneError(_)
            | Error::DatabaseLockError
            | Error::JobRegistryLockError
            | Error::SqlError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let message = match self {
            Error::InvalidTimezoneError(timezone) => format!(
                "Could not get local timezone \"{timezone}\". Check your server settings and \
                ensure the timezone has been set to valid, canonical timezone string"
            ),
            // Details of these errors are only intended for the server logs.
            error @ (Error::SqlError(_)
            | Error::DatabaseLockError
            | Error::JobRegistryLockError) => {
                tracing::error!("An unexpected error occurred: {}", error);
                "An unexpected error occurred, check the server logs for more details.".to_owned()
            }
            error => error.to_string(),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
