//! Bulk imports that run as background jobs.
//!
//! The server half registers a job per submitted batch, imports it chunk by
//! chunk on a background task and serves progress snapshots. The client half
//! submits a batch, then polls the job and folds each snapshot into a
//! [JobProgressState] until the job completes or fails.

mod client;
mod handlers;
mod job;
mod progress;
mod registry;
mod worker;

pub use client::{
    BulkCreateRequest, BulkCreateResponse, BulkImportJobClient, ImportApi, LocalImportApi,
    PollConfig,
};
pub use job::{ImportJob, JobId, JobProgress, JobStatus};
pub use progress::{JobProgressState, Transition};
pub use registry::JobRegistry;
pub use worker::{ImportConfig, run_import_job, start_import};

pub(crate) use handlers::{bulk_create_endpoint, get_job_progress_endpoint};

/// The ways a client-side import can fail.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ImportError {
    /// There was nothing to submit.
    #[error("there are no transactions to import")]
    EmptyBatch,

    /// The bulk-create request failed. No job was created.
    #[error("could not submit the import: {0}")]
    Submit(String),

    /// A progress request failed. The job may still be running.
    #[error("could not get the import progress: {0}")]
    Poll(String),

    /// The server reported that the job failed.
    #[error("the import failed: {0}")]
    JobFailed(String),

    /// Polling failed too many times in a row.
    #[error("gave up on import job {job_id} after {failures} failed progress requests")]
    Unresponsive {
        /// The job that could not be polled.
        job_id: JobId,
        /// The number of consecutive failed polls.
        failures: u32,
    },
}

impl ImportError {
    /// Whether retrying the same request later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, ImportError::Poll(_))
    }
}

#[cfg(test)]
mod tests {
    use crate::import::{ImportError, JobId};

    #[test]
    fn only_poll_failures_are_transient() {
        assert!(ImportError::Poll("timed out".to_owned()).is_transient());

        assert!(!ImportError::EmptyBatch.is_transient());
        assert!(!ImportError::Submit("connection refused".to_owned()).is_transient());
        assert!(!ImportError::JobFailed("row 42 is invalid".to_owned()).is_transient());
        assert!(
            !ImportError::Unresponsive {
                job_id: JobId::from("abc"),
                failures: 3,
            }
            .is_transient()
        );
    }
}
