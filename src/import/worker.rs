//! Runs bulk imports in the background, chunk by chunk.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use rusqlite::Connection;

use crate::{
    Error,
    import::{ImportJob, JobId, JobRegistry},
    transaction::{NewTransaction, insert_transactions},
};

/// Settings for how the server runs import jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportConfig {
    /// The number of records inserted per database transaction. Progress is
    /// reported after each chunk.
    pub chunk_size: usize,
    /// How long finished jobs stay readable before they are pruned.
    pub job_retention: Duration,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            chunk_size: 50,
            job_retention: Duration::from_secs(60 * 60),
        }
    }
}

/// Register a job for `records` and start importing them on a background task.
///
/// Returns as soon as the job is registered; progress is then available
/// through [JobRegistry::get].
///
/// Must be called from within a tokio runtime.
///
/// # Errors
/// Returns [Error::EmptyImport] if `records` is empty, or an error if the job
/// could not be registered.
pub fn start_import(
    records: Vec<NewTransaction>,
    target_id: Option<i64>,
    db_connection: Arc<Mutex<Connection>>,
    registry: JobRegistry,
    config: ImportConfig,
) -> Result<JobId, Error> {
    if records.is_empty() {
        return Err(Error::EmptyImport);
    }

    let job_id = registry.create(records.len())?;
    tracing::info!("Created import job {job_id} for {} transactions", records.len());

    tokio::spawn(run_import_job(
        job_id.clone(),
        records,
        target_id,
        db_connection,
        registry,
        config.chunk_size,
    ));

    Ok(job_id)
}

/// Import `records` into the database, recording progress on the job `job_id`.
///
/// Each chunk is committed on its own, so a failure part way leaves the
/// earlier chunks imported; the failure message says how many.
pub async fn run_import_job(
    job_id: JobId,
    records: Vec<NewTransaction>,
    target_id: Option<i64>,
    db_connection: Arc<Mutex<Connection>>,
    registry: JobRegistry,
    chunk_size: usize,
) {
    let start_time = std::time::Instant::now();

    if let Err(error) = registry.update(&job_id, ImportJob::start) {
        tracing::error!("Could not start import job {job_id}: {error}");
        return;
    }

    let mut processed = 0;

    for chunk in records.chunks(chunk_size.max(1)) {
        match insert_chunk(chunk, target_id, &db_connection) {
            Ok(inserted) => processed += inserted,
            Err(error) => {
                tracing::error!(
                    "Import job {job_id} failed after {processed} of {} transactions: {error}",
                    records.len()
                );
                let message = format!(
                    "Imported {processed} of {} transactions before an error occurred: {error}",
                    records.len()
                );
                if let Err(error) = registry.update(&job_id, |job| job.fail(message)) {
                    tracing::error!("Could not mark import job {job_id} as failed: {error}");
                }
                return;
            }
        }

        match registry.update(&job_id, |job| job.record_progress(processed)) {
            Ok(progress) => tracing::debug!(
                "Import job {job_id}: {}/{} ({}%)",
                progress.processed,
                progress.total,
                progress.percent
            ),
            Err(error) => {
                tracing::error!("Could not record progress of import job {job_id}: {error}");
                return;
            }
        }

        tokio::task::yield_now().await;
    }

    let message = format!("Imported {processed} transactions");
    match registry.update(&job_id, |job| job.complete(message)) {
        Ok(_) => tracing::info!(
            "Import job {job_id} imported {processed} transactions in {:.1}ms",
            start_time.elapsed().as_secs_f64() * 1000.0
        ),
        Err(error) => tracing::error!("Could not mark import job {job_id} as completed: {error}"),
    }
}

fn insert_chunk(
    chunk: &[NewTransaction],
    target_id: Option<i64>,
    db_connection: &Mutex<Connection>,
) -> Result<usize, Error> {
    let mut connection = db_connection.lock().map_err(|error| {
        tracing::error!("could not acquire database lock: {error}");
        Error::DatabaseLockError
    })?;

    let tx = connection.transaction()?;
    let inserted = insert_transactions(chunk, target_id, &tx)?;
    tx.commit()?;

    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use rusqlite::Connection;
    use time::{Duration, macros::date};

    use crate::{
        Error,
        db::initialize,
        import::{ImportConfig, JobRegistry, JobStatus, run_import_job, start_import},
        transaction::{Direction, NewTransaction, count_transactions},
    };

    fn get_test_connection() -> Arc<Mutex<Connection>> {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        Arc::new(Mutex::new(conn))
    }

    fn records(count: usize) -> Vec<NewTransaction> {
        (0..count)
            .map(|i| {
                NewTransaction::new(
                    date!(2024 - 03 - 01) + Duration::days((i % 28) as i64),
                    i as f64,
                    Direction::Outflow,
                )
            })
            .collect()
    }

    #[tokio::test]
    async fn imports_every_record_and_completes() {
        let db = get_test_connection();
        let registry = JobRegistry::new();
        let job_id = registry.create(100).unwrap();

        run_import_job(job_id.clone(), records(100), None, db.clone(), registry.clone(), 30).await;

        let progress = registry.get(&job_id).unwrap();
        assert_eq!(progress.status, JobStatus::Completed);
        assert_eq!(progress.percent, 100);
        assert_eq!(progress.processed, 100);
        assert_eq!(progress.message.as_deref(), Some("Imported 100 transactions"));
        assert_eq!(count_transactions(None, &db.lock().unwrap()).unwrap(), 100);
    }

    #[tokio::test]
    async fn failure_marks_job_failed_with_message() {
        let db = get_test_connection();
        db.lock()
            .unwrap()
            .execute("DROP TABLE \"transaction\"", ())
            .unwrap();
        let registry = JobRegistry::new();
        let job_id = registry.create(10).unwrap();

        run_import_job(job_id.clone(), records(10), None, db, registry.clone(), 5).await;

        let progress = registry.get(&job_id).unwrap();
        assert_eq!(progress.status, JobStatus::Failed);
        assert_eq!(progress.percent, 0);
        assert!(
            progress
                .message
                .as_deref()
                .is_some_and(|message| message.starts_with("Imported 0 of 10 transactions"))
        );
    }

    #[tokio::test]
    async fn start_import_runs_in_the_background() {
        let db = get_test_connection();
        let registry = JobRegistry::new();

        let job_id = start_import(
            records(7),
            Some(3),
            db.clone(),
            registry.clone(),
            ImportConfig {
                chunk_size: 2,
                ..Default::default()
            },
        )
        .unwrap();

        let mut progress = registry.get(&job_id).unwrap();
        while !progress.status.is_terminal() {
            tokio::task::yield_now().await;
            progress = registry.get(&job_id).unwrap();
        }

        assert_eq!(progress.status, JobStatus::Completed);
        assert_eq!(count_transactions(Some(3), &db.lock().unwrap()).unwrap(), 7);
    }

    #[tokio::test]
    async fn empty_imports_are_rejected() {
        let registry = JobRegistry::new();

        let result = start_import(
            Vec::new(),
            None,
            get_test_connection(),
            registry.clone(),
            ImportConfig::default(),
        );

        assert!(matches!(result, Err(Error::EmptyImport)));
        assert_eq!(registry.len().unwrap(), 0);
    }
}
