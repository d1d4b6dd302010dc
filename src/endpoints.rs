//! The API endpoints URIs.
//!
//! For endpoints that take a parameter, e.g., '/api/import_jobs/{job_id}', use [format_endpoint].

use std::fmt::Display;

/// The route to read transactions.
pub const TRANSACTIONS_API: &str = "/api/transactions";
/// The route to submit a batch of transactions for import.
pub const BULK_IMPORT: &str = "/api/transactions/bulk";
/// The route to read the progress of an import job.
pub const IMPORT_JOB: &str = "/api/import_jobs/{job_id}";
/// The route for a month of day buckets and its heatmap.
pub const CALENDAR_API: &str = "/api/calendar";
/// The route for a trend series over a date range.
pub const TRENDS_API: &str = "/api/trends";

/// Replace the parameter in `endpoint_path` with `id`.
///
/// A parameter is a string that starts with a left brace, followed by
/// lowercase letters or underscores, and ends with a right brace.
/// For example, in the endpoint path '/import_jobs/{job_id}', '{job_id}' is the parameter.
///
/// This function assumes that an endpoint path only contains ASCII characters
/// and a single parameter.
///
/// If no parameter is found in `endpoint_path`, the function returns the
/// the original `endpoint_path`.
pub fn format_endpoint(endpoint_path: &str, id: impl Display) -> String {
    let param_start = match endpoint_path.find('{') {
        Some(start) => start,
        None => return endpoint_path.to_string(),
    };

    let param_end = endpoint_path[param_start..]
        .find('}')
        .map_or(endpoint_path.len(), |end| param_start + end + 1);

    format!(
        "{}{}{}",
        &endpoint_path[..param_start],
        id,
        &endpoint_path[param_end..]
    )
}
