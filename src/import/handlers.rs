//! HTTP endpoints for submitting bulk imports and reading job progress.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, Path, State},
    http::StatusCode,
};
use rusqlite::Connection;

use crate::{
    AppState, Error,
    import::{
        BulkCreateRequest, BulkCreateResponse, ImportConfig, JobId, JobProgress, JobRegistry,
        start_import,
    },
};

/// The state needed to run and report on import jobs.
#[derive(Debug, Clone)]
pub struct ImportState {
    /// The database connection the jobs write to.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The jobs known to the server.
    pub registry: JobRegistry,
    /// How jobs are run.
    pub config: ImportConfig,
}

impl FromRef<AppState> for ImportState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            registry: state.import_jobs.clone(),
            config: state.import_config,
        }
    }
}

/// Route handler for submitting a batch of transactions.
///
/// Responds with `202 Accepted` and the new job's ID as soon as the job is
/// registered. The records are imported in the background.
///
/// # Errors
/// Returns a 400 response if the batch is empty.
pub async fn bulk_create_endpoint(
    State(state): State<ImportState>,
    Json(request): Json<BulkCreateRequest>,
) -> Result<(StatusCode, Json<BulkCreateResponse>), Error> {
    let job_id = start_import(
        request.records,
        request.target_id,
        state.db_connection,
        state.registry,
        state.config,
    )?;

    Ok((StatusCode::ACCEPTED, Json(BulkCreateResponse { job_id })))
}

/// Route handler for reading an import job's progress.
///
/// # Errors
/// Returns a 404 response if no job has the given ID.
pub async fn get_job_progress_endpoint(
    State(state): State<ImportState>,
    Path(job_id): Path<String>,
) -> Result<Json<JobProgress>, Error> {
    state.registry.get(&JobId::from(job_id)).map(Json)
}
