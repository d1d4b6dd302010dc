//! Shared, in-memory storage of import jobs.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
    time::{Duration, Instant},
};

use crate::{
    Error,
    import::{ImportJob, JobId, JobProgress},
};

/// The import jobs known to the server.
///
/// Cloning a registry gives another handle to the same jobs.
#[derive(Debug, Clone, Default)]
pub struct JobRegistry {
    jobs: Arc<Mutex<HashMap<JobId, ImportJob>>>,
}

impl JobRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new pending job for `submitted_count` records.
    ///
    /// # Errors
    /// Returns [Error::JobRegistryLockError] if the registry lock is poisoned.
    pub fn create(&self, submitted_count: usize) -> Result<JobId, Error> {
        let job_id = JobId::generate();
        self.lock()?
            .insert(job_id.clone(), ImportJob::new(job_id.clone(), submitted_count));

        Ok(job_id)
    }

    /// Get a snapshot of a job's progress.
    ///
    /// Reading never changes the job, so it is safe to call as often as needed.
    ///
    /// # Errors
    /// Returns [Error::JobNotFound] for an unknown ID.
    pub fn get(&self, job_id: &JobId) -> Result<JobProgress, Error> {
        self.lock()?
            .get(job_id)
            .map(ImportJob::progress)
            .ok_or_else(|| Error::JobNotFound(job_id.to_string()))
    }

    /// Apply `change` to a job and return its new progress.
    ///
    /// # Errors
    /// Returns [Error::JobNotFound] for an unknown ID, or the error returned by `change`.
    pub fn update<F>(&self, job_id: &JobId, change: F) -> Result<JobProgress, Error>
    where
        F: FnOnce(&mut ImportJob) -> Result<(), Error>,
    {
        let mut jobs = self.lock()?;
        let job = jobs
            .get_mut(job_id)
            .ok_or_else(|| Error::JobNotFound(job_id.to_string()))?;

        change(job)?;

        Ok(job.progress())
    }

    /// Remove jobs that finished more than `retention` before `now`.
    ///
    /// Returns the number of jobs removed.
    ///
    /// # Errors
    /// Returns [Error::JobRegistryLockError] if the registry lock is poisoned.
    pub fn prune_finished(&self, now: Instant, retention: Duration) -> Result<usize, Error> {
        let mut jobs = self.lock()?;
        let before = jobs.len();

        jobs.retain(|_, job| match job.finished_at() {
            Some(finished_at) => now.saturating_duration_since(finished_at) <= retention,
            None => true,
        });

        Ok(before - jobs.len())
    }

    /// The number of jobs in the registry.
    ///
    /// # Errors
    /// Returns [Error::JobRegistryLockError] if the registry lock is poisoned.
    pub fn len(&self) -> Result<usize, Error> {
        Ok(self.lock()?.len())
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<JobId, ImportJob>>, Error> {
        self.jobs.lock().map_err(|error| {
            tracing::error!("could not acquire job registry lock: {error}");
            Error::JobRegistryLockError
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use crate::{
        Error,
        import::{ImportJob, JobId, JobRegistry, JobStatus},
    };

    #[test]
    fn created_jobs_can_be_read() {
        let registry = JobRegistry::new();

        let job_id = registry.create(100).unwrap();
        let progress = registry.get(&job_id).unwrap();

        assert_eq!(progress.job_id, job_id);
        assert_eq!(progress.status, JobStatus::Pending);
        assert_eq!(progress.total, 100);
    }

    #[test]
    fn unknown_jobs_are_not_found() {
        let registry = JobRegistry::new();

        let result = registry.get(&JobId::from("missing"));

        assert!(matches!(result, Err(Error::JobNotFound(id)) if id == "missing"));
    }

    #[test]
    fn repeated_reads_do_not_change_the_job() {
        let registry = JobRegistry::new();
        let job_id = registry.create(4).unwrap();
        registry
            .update(&job_id, |job| job.record_progress(1))
            .unwrap();

        let first = registry.get(&job_id).unwrap();
        let second = registry.get(&job_id).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.percent, 25);
    }

    #[test]
    fn failed_updates_leave_the_job_untouched() {
        let registry = JobRegistry::new();
        let job_id = registry.create(2).unwrap();
        registry
            .update(&job_id, |job| job.complete("done".to_owned()))
            .unwrap();

        let result = registry.update(&job_id, ImportJob::start);

        assert!(matches!(result, Err(Error::JobAlreadyFinished(_))));
        assert_eq!(registry.get(&job_id).unwrap().status, JobStatus::Completed);
    }

    #[test]
    fn prunes_only_jobs_finished_before_the_retention_period() {
        let registry = JobRegistry::new();
        let finished = registry.create(1).unwrap();
        let running = registry.create(1).unwrap();
        registry
            .update(&finished, |job| job.complete("done".to_owned()))
            .unwrap();
        registry
            .update(&running, |job| job.record_progress(0))
            .unwrap();
        let retention = Duration::from_secs(60);

        let pruned_now = registry.prune_finished(Instant::now(), retention).unwrap();
        let pruned_later = registry
            .prune_finished(Instant::now() + Duration::from_secs(120), retention)
            .unwrap();

        assert_eq!(pruned_now, 0);
        assert_eq!(pruned_later, 1);
        assert!(registry.get(&finished).is_err());
        assert!(registry.get(&running).is_ok());
    }
}
