//! Submitting bulk imports and following their progress.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tokio::time::MissedTickBehavior;

use crate::{
    AppState,
    import::{
        ImportConfig, ImportError, JobId, JobProgress, JobProgressState, JobRegistry, Transition,
        start_import,
    },
    transaction::NewTransaction,
};

/// The body of a bulk-create request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkCreateRequest {
    /// The transactions to create.
    pub records: Vec<NewTransaction>,
    /// The shared ledger to import into. Omit for the caller's own ledger.
    #[serde(default)]
    pub target_id: Option<i64>,
}

/// The body of a bulk-create response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkCreateResponse {
    /// The job that will import the records.
    pub job_id: JobId,
}

/// The two calls a client needs to run an import: create the job, then read
/// its progress.
///
/// Errors are plain strings describing what went wrong with the call;
/// [BulkImportJobClient] decides whether they are fatal.
pub trait ImportApi {
    /// Send the whole batch and return the job that will import it.
    fn submit(
        &self,
        request: BulkCreateRequest,
    ) -> impl Future<Output = Result<BulkCreateResponse, String>>;

    /// Read the job's current progress. Must not change the job.
    fn progress(&self, job_id: &JobId) -> impl Future<Output = Result<JobProgress, String>>;
}

/// An [ImportApi] that runs jobs in-process against a [JobRegistry].
#[derive(Debug, Clone)]
pub struct LocalImportApi {
    db_connection: Arc<Mutex<Connection>>,
    registry: JobRegistry,
    config: ImportConfig,
}

impl LocalImportApi {
    /// Create an API that imports into `db_connection` and tracks jobs in `registry`.
    pub fn new(
        db_connection: Arc<Mutex<Connection>>,
        registry: JobRegistry,
        config: ImportConfig,
    ) -> Self {
        Self {
            db_connection,
            registry,
            config,
        }
    }
}

impl From<&AppState> for LocalImportApi {
    fn from(state: &AppState) -> Self {
        Self::new(
            state.db_connection.clone(),
            state.import_jobs.clone(),
            state.import_config,
        )
    }
}

impl ImportApi for LocalImportApi {
    async fn submit(&self, request: BulkCreateRequest) -> Result<BulkCreateResponse, String> {
        start_import(
            request.records,
            request.target_id,
            self.db_connection.clone(),
            self.registry.clone(),
            self.config,
        )
        .map(|job_id| BulkCreateResponse { job_id })
        .map_err(|error| error.to_string())
    }

    async fn progress(&self, job_id: &JobId) -> Result<JobProgress, String> {
        self.registry.get(job_id).map_err(|error| error.to_string())
    }
}

/// How often and how patiently to poll a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// The time between polls. The first poll happens immediately.
    pub interval: Duration,
    /// Give up after this many polls in a row fail. `None` retries forever.
    pub max_consecutive_failures: Option<u32>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(500),
            max_consecutive_failures: Some(10),
        }
    }
}

/// Submits bulk imports and follows them until they finish.
#[derive(Debug, Clone)]
pub struct BulkImportJobClient<A> {
    api: A,
    config: PollConfig,
}

impl<A: ImportApi> BulkImportJobClient<A> {
    /// Create a client using the default [PollConfig].
    pub fn new(api: A) -> Self {
        Self::with_config(api, PollConfig::default())
    }

    /// Create a client with a custom polling configuration.
    pub fn with_config(api: A, config: PollConfig) -> Self {
        Self { api, config }
    }

    /// Submit `records` for import into `target_id`'s ledger.
    ///
    /// # Errors
    /// Returns [ImportError::EmptyBatch] without making a request if there is
    /// nothing to import, or [ImportError::Submit] if the request fails. No
    /// job exists after a failed submit; submit again from scratch.
    pub async fn submit(
        &self,
        records: Vec<NewTransaction>,
        target_id: Option<i64>,
    ) -> Result<JobId, ImportError> {
        if records.is_empty() {
            return Err(ImportError::EmptyBatch);
        }

        let count = records.len();
        let response = self
            .api
            .submit(BulkCreateRequest { records, target_id })
            .await
            .map_err(ImportError::Submit)?;

        tracing::info!("Submitted {count} transactions as import job {}", response.job_id);

        Ok(response.job_id)
    }

    /// Read a job's progress once.
    ///
    /// # Errors
    /// Returns [ImportError::Poll] if the request fails. This is transient:
    /// poll again later with the same ID.
    pub async fn poll(&self, job_id: &JobId) -> Result<JobProgress, ImportError> {
        self.api.progress(job_id).await.map_err(ImportError::Poll)
    }

    /// Poll `job_id` until it completes or fails, calling `on_progress` each
    /// time the observed state changes.
    ///
    /// Transient poll failures are retried on the next tick; any other error
    /// is returned immediately. Polling stops as soon as a
    /// terminal status is seen. Drop the returned future to stop early.
    ///
    /// # Errors
    /// Returns [ImportError::JobFailed] with the server's message if the job
    /// failed, or [ImportError::Unresponsive] after too many consecutive
    /// failed polls.
    pub async fn watch<F>(&self, job_id: JobId, mut on_progress: F) -> Result<JobProgress, ImportError>
    where
        F: FnMut(&JobProgressState),
    {
        let mut state = JobProgressState::submitted(job_id.clone());
        let mut interval = tokio::time::interval(self.config.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut consecutive_failures = 0;

        loop {
            interval.tick().await;

            match self.poll(&job_id).await {
                Ok(progress) => {
                    consecutive_failures = 0;
                    match state.apply(progress) {
                        Transition::Advanced | Transition::Finished => on_progress(&state),
                        Transition::Unchanged | Transition::Ignored => {}
                    }
                }
                Err(error) if !error.is_transient() => return Err(error),
                Err(error) => {
                    consecutive_failures += 1;
                    tracing::warn!(
                        "Poll {consecutive_failures} of import job {job_id} failed: {error}"
                    );

                    if let Some(max) = self.config.max_consecutive_failures {
                        if consecutive_failures >= max {
                            return Err(ImportError::Unresponsive {
                                job_id,
                                failures: consecutive_failures,
                            });
                        }
                    }
                }
            }

            match &state {
                JobProgressState::Completed(progress) => return Ok(progress.clone()),
                JobProgressState::Failed(progress) => {
                    let message = progress
                        .message
                        .clone()
                        .unwrap_or_else(|| "the import failed without a reason".to_owned());
                    return Err(ImportError::JobFailed(message));
                }
                JobProgressState::Submitted { .. } | JobProgressState::Running(_) => {}
            }
        }
    }

    /// Submit `records` and watch the resulting job until it finishes.
    ///
    /// # Errors
    /// See [BulkImportJobClient::submit] and [BulkImportJobClient::watch].
    pub async fn import<F>(
        &self,
        records: Vec<NewTransaction>,
        target_id: Option<i64>,
        on_progress: F,
    ) -> Result<JobProgress, ImportError>
    where
        F: FnMut(&JobProgressState),
    {
        let job_id = self.submit(records, target_id).await?;
        self.watch(job_id, on_progress).await
    }
}
