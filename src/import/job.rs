//! The server-side model of a bulk import job.

use std::{fmt::Display, time::Instant};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Error;

/// An opaque identifier for an import job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Generate a new random job ID.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// The ID as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for JobId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for JobId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where an import job is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Created, but the worker has not picked it up yet.
    Pending,
    /// The worker is inserting records.
    Running,
    /// Every record was imported.
    Completed,
    /// The import stopped early; the message says why.
    Failed,
}

impl JobStatus {
    /// Whether no further transitions are possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// A snapshot of a job's progress, as returned by the job-progress endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobProgress {
    /// The job this snapshot belongs to.
    pub job_id: JobId,
    /// The number of records submitted.
    pub total: usize,
    /// The number of records processed so far.
    pub processed: usize,
    /// `round(processed / total * 100)`.
    pub percent: u8,
    /// The job's status.
    pub status: JobStatus,
    /// A human readable summary, set once the job finishes.
    pub message: Option<String>,
}

/// A bulk import job.
///
/// Jobs only move forward: `Pending -> Running -> Completed | Failed`, and the
/// processed count never decreases.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportJob {
    job_id: JobId,
    submitted_count: usize,
    processed_count: usize,
    status: JobStatus,
    message: Option<String>,
    finished_at: Option<Instant>,
}

impl ImportJob {
    /// Create a pending job for `submitted_count` records.
    pub fn new(job_id: JobId, submitted_count: usize) -> Self {
        Self {
            job_id,
            submitted_count,
            processed_count: 0,
            status: JobStatus::Pending,
            message: None,
            finished_at: None,
        }
    }

    /// The job's ID.
    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    /// The job's status.
    pub fn status(&self) -> JobStatus {
        self.status
    }

    /// When the job reached a terminal status.
    pub fn finished_at(&self) -> Option<Instant> {
        self.finished_at
    }

    /// The share of submitted records processed, as a whole percentage.
    pub fn percent(&self) -> u8 {
        if self.submitted_count == 0 {
            return if self.status == JobStatus::Completed { 100 } else { 0 };
        }

        let ratio = self.processed_count as f64 / self.submitted_count as f64;
        (ratio * 100.0).round().clamp(0.0, 100.0) as u8
    }

    /// Move a pending job to running. Starting a running job does nothing.
    ///
    /// # Errors
    /// Returns [Error::JobAlreadyFinished] if the job is terminal.
    pub fn start(&mut self) -> Result<(), Error> {
        self.ensure_not_finished()?;
        self.status = JobStatus::Running;
        Ok(())
    }

    /// Record that `processed` records have been handled in total.
    ///
    /// Starts the job if it is still pending. Counts lower than the current
    /// one are ignored and counts above the submitted total are clamped, so
    /// the percentage never decreases.
    ///
    /// # Errors
    /// Returns [Error::JobAlreadyFinished] if the job is terminal.
    pub fn record_progress(&mut self, processed: usize) -> Result<(), Error> {
        self.start()?;
        self.processed_count = self
            .processed_count
            .max(processed.min(self.submitted_count));
        Ok(())
    }

    /// Mark the job as completed.
    ///
    /// # Errors
    /// Returns [Error::JobAlreadyFinished] if the job is terminal.
    pub fn complete(&mut self, message: String) -> Result<(), Error> {
        self.finish(JobStatus::Completed, message)
    }

    /// Mark the job as failed with a message for the user.
    ///
    /// # Errors
    /// Returns [Error::JobAlreadyFinished] if the job is terminal.
    pub fn fail(&mut self, message: String) -> Result<(), Error> {
        self.finish(JobStatus::Failed, message)
    }

    /// A snapshot for the job-progress endpoint.
    pub fn progress(&self) -> JobProgress {
        JobProgress {
            job_id: self.job_id.clone(),
            total: self.submitted_count,
            processed: self.processed_count,
            percent: self.percent(),
            status: self.status,
            message: self.message.clone(),
        }
    }

    fn finish(&mut self, status: JobStatus, message: String) -> Result<(), Error> {
        self.ensure_not_finished()?;
        self.status = status;
        self.message = Some(message);
        self.finished_at = Some(Instant::now());
        Ok(())
    }

    fn ensure_not_finished(&self) -> Result<(), Error> {
        if self.status.is_terminal() {
            return Err(Error::JobAlreadyFinished(self.job_id.to_string()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        Error,
        import::{ImportJob, JobId, JobStatus},
    };

    fn new_job(submitted: usize) -> ImportJob {
        ImportJob::new(JobId::from("abc"), submitted)
    }

    #[test]
    fn new_jobs_are_pending_at_zero() {
        let job = new_job(100);

        let progress = job.progress();

        assert_eq!(progress.status, JobStatus::Pending);
        assert_eq!(progress.percent, 0);
        assert_eq!(progress.total, 100);
        assert_eq!(progress.message, None);
    }

    #[test]
    fn percent_is_rounded() {
        let mut job = new_job(3);

        job.record_progress(1).unwrap();
        assert_eq!(job.percent(), 33);
        job.record_progress(2).unwrap();
        assert_eq!(job.percent(), 67);
        assert_eq!(job.status(), JobStatus::Running);
    }

    #[test]
    fn progress_never_decreases_or_exceeds_total() {
        let mut job = new_job(100);

        job.record_progress(60).unwrap();
        job.record_progress(25).unwrap();
        assert_eq!(job.percent(), 60);
        job.record_progress(250).unwrap();
        assert_eq!(job.progress().processed, 100);
    }

    #[test]
    fn terminal_jobs_reject_transitions() {
        let mut job = new_job(10);
        job.record_progress(10).unwrap();
        job.complete("Imported 10 transactions".to_owned()).unwrap();
        let snapshot = job.progress();

        assert!(matches!(job.start(), Err(Error::JobAlreadyFinished(_))));
        assert!(matches!(job.record_progress(5), Err(Error::JobAlreadyFinished(_))));
        assert!(matches!(
            job.fail("too late".to_owned()),
            Err(Error::JobAlreadyFinished(_))
        ));
        assert_eq!(job.progress(), snapshot);
        assert!(job.finished_at().is_some());
    }

    #[test]
    fn failed_jobs_keep_their_message() {
        let mut job = new_job(10);
        job.record_progress(4).unwrap();

        job.fail("disk full".to_owned()).unwrap();

        let progress = job.progress();
        assert_eq!(progress.status, JobStatus::Failed);
        assert_eq!(progress.percent, 40);
        assert_eq!(progress.message.as_deref(), Some("disk full"));
    }

    #[test]
    fn generated_ids_are_unique() {
        assert_ne!(JobId::generate(), JobId::generate());
    }
}
