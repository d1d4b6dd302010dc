//! The client's view of an import job, driven by poll results.

use crate::import::{JobId, JobProgress, JobStatus};

/// What happened when a poll result was applied to a [JobProgressState].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The state moved forward.
    Advanced,
    /// The snapshot matched what was already known.
    Unchanged,
    /// The job reached a terminal state; stop polling.
    Finished,
    /// The snapshot was stale, for another job, or arrived after the job
    /// had already finished.
    Ignored,
}

/// The lifecycle of an import job as observed by the client.
///
/// `Submitted -> Running -> Completed | Failed`. The terminal states never
/// change, and the observed percentage never goes down while running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobProgressState {
    /// The job was accepted but has not reported any progress yet.
    Submitted {
        /// The job being tracked.
        job_id: JobId,
    },
    /// The job is importing records.
    Running(JobProgress),
    /// All records were imported.
    Completed(JobProgress),
    /// The job stopped early. The snapshot's message says why.
    Failed(JobProgress),
}

impl JobProgressState {
    /// Start tracking a job that was just submitted.
    pub fn submitted(job_id: JobId) -> Self {
        JobProgressState::Submitted { job_id }
    }

    /// The job being tracked.
    pub fn job_id(&self) -> &JobId {
        match self {
            JobProgressState::Submitted { job_id } => job_id,
            JobProgressState::Running(progress)
            | JobProgressState::Completed(progress)
            | JobProgressState::Failed(progress) => &progress.job_id,
        }
    }

    /// The latest accepted snapshot, if any.
    pub fn snapshot(&self) -> Option<&JobProgress> {
        match self {
            JobProgressState::Submitted { .. } => None,
            JobProgressState::Running(progress)
            | JobProgressState::Completed(progress)
            | JobProgressState::Failed(progress) => Some(progress),
        }
    }

    /// The percentage to display.
    pub fn percent(&self) -> u8 {
        self.snapshot().map_or(0, |progress| progress.percent)
    }

    /// The server's message, set once the job finishes.
    pub fn message(&self) -> Option<&str> {
        self.snapshot()
            .and_then(|progress| progress.message.as_deref())
    }

    /// Whether the job has completed or failed.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobProgressState::Completed(_) | JobProgressState::Failed(_)
        )
    }

    /// Apply a poll result.
    pub fn apply(&mut self, progress: JobProgress) -> Transition {
        if progress.job_id != *self.job_id() {
            tracing::warn!(
                "Ignoring progress for job {} while tracking job {}",
                progress.job_id,
                self.job_id()
            );
            return Transition::Ignored;
        }

        if self.is_terminal() {
            return Transition::Ignored;
        }

        match progress.status {
            JobStatus::Pending => match self {
                JobProgressState::Submitted { .. } => Transition::Unchanged,
                _ => Transition::Ignored,
            },
            JobStatus::Running => {
                if let JobProgressState::Running(current) = self {
                    if progress.percent < current.percent || progress.processed < current.processed
                    {
                        tracing::debug!(
                            "Ignoring stale progress {}% for job {}, already at {}%",
                            progress.percent,
                            progress.job_id,
                            current.percent
                        );
                        return Transition::Ignored;
                    }

                    if progress == *current {
                        return Transition::Unchanged;
                    }
                }

                *self = JobProgressState::Running(progress);
                Transition::Advanced
            }
            JobStatus::Completed => {
                *self = JobProgressState::Completed(progress);
                Transition::Finished
            }
            JobStatus::Failed => {
                *self = JobProgressState::Failed(progress);
                Transition::Finished
            }
        }
    }
}
