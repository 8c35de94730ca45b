use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::stream::{self, StreamExt};
use log::{debug, error, info, warn};
use tokio::sync::Mutex;

use crate::bundle::{
    blocking, BundleJob, BundleRunner, BundleStatus, JobStatusUpdate, RecordStore,
    RunnerSettings, DEFAULT_ERROR_MESSAGE_LIMIT,
};
use crate::error::BundleError;
use crate::storage::BlobStore;
use crate::worker::job::JobResult;

#[derive(Debug, Clone)]
pub struct WorkerSettings {
    /// Jobs claimed per poll.
    pub batch_size: usize,
    /// Jobs processed at once.
    pub concurrency: usize,
    pub poll_interval: Duration,
    pub job_timeout: Duration,
    pub error_message_limit: usize,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            batch_size: 8,
            concurrency: num_cpus::get().max(1),
            poll_interval: Duration::from_millis(1000),
            job_timeout: Duration::from_secs(300),
            error_message_limit: DEFAULT_ERROR_MESSAGE_LIMIT,
        }
    }
}

/// Pulls queued bundle jobs from a [`RecordStore`] and drives them to a
/// terminal status.
pub struct BundleWorker {
    records: Arc<dyn RecordStore>,
    runner: BundleRunner,
    settings: WorkerSettings,
    shutdown: Arc<AtomicBool>,
}

impl BundleWorker {
    pub fn new(
        records: Arc<dyn RecordStore>,
        blobs: Arc<dyn BlobStore>,
        runner_settings: RunnerSettings,
        settings: WorkerSettings,
    ) -> Self {
        let runner = BundleRunner::new(Arc::clone(&records), blobs, runner_settings);
        Self {
            records,
            runner,
            settings,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn settings(&self) -> &WorkerSettings {
        &self.settings
    }

    /// Flag that stops [`BundleWorker::run`] after the current batch.
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    pub fn shutdown(&self) {
        info!("Shutting down bundle worker...");
        self.shutdown.store(true, Ordering::Relaxed);
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    /// Polls until shut down. Job failures never end the loop; a failed
    /// claim is logged and retried on the next poll.
    pub async fn run(&self) {
        info!(
            "Bundle worker started (batch {}, concurrency {}, timeout {}s)",
            self.settings.batch_size,
            self.settings.concurrency,
            self.settings.job_timeout.as_secs()
        );

        while !self.is_shutdown() {
            match self.run_once().await {
                Ok(results) if !results.is_empty() => {
                    let ready = results.iter().filter(|r| r.is_success()).count();
                    info!(
                        "Batch finished: {} ready, {} failed",
                        ready,
                        results.len() - ready
                    );
                    continue;
                }
                Ok(_) => {}
                Err(e) => error!("Failed to claim bundle jobs: {}", e),
            }
            self.idle().await;
        }

        info!("Bundle worker stopped");
    }

    /// Claims one batch and processes it with bounded parallelism.
    pub async fn run_once(&self) -> Result<Vec<JobResult>, BundleError> {
        let records = Arc::clone(&self.records);
        let limit = self.settings.batch_size;
        let jobs = blocking(move || records.claim_queued(limit)).await??;
        if jobs.is_empty() {
            return Ok(Vec::new());
        }
        debug!("Claimed {} bundle job(s)", jobs.len());

        let results = Mutex::new(Vec::with_capacity(jobs.len()));
        stream::iter(jobs)
            .for_each_concurrent(self.settings.concurrency.max(1), |job| {
                let results = &results;
                async move {
                    let result = self.process(job).await;
                    results.lock().await.push(result);
                }
            })
            .await;

        Ok(results.into_inner())
    }

    /// Runs one claimed job under the wall-clock timeout and records the
    /// terminal status.
    pub async fn process(&self, job: BundleJob) -> JobResult {
        let started = Instant::now();
        let timeout = self.settings.job_timeout;

        let outcome = match tokio::time::timeout(timeout, self.runner.run(job.clone())).await {
            Ok(outcome) => outcome,
            Err(_) => Err(BundleError::Timeout {
                seconds: timeout.as_secs(),
            }),
        };

        let (mut result, update) = match outcome {
            Ok(output) => {
                let update = JobStatusUpdate::ready(output.location.clone(), output.byte_size);
                info!(
                    "Bundle job {} ready: {} ({} bytes)",
                    job.id, output.location, output.byte_size
                );
                for warning in &output.warnings {
                    warn!("Bundle job {} finished with warning: {:?}", job.id, warning);
                }
                (JobResult::success(&job, output, started.elapsed()), update)
            }
            Err(e) => {
                error!("Bundle job {} failed: {}", job.id, e);
                let update = JobStatusUpdate::failed(&e.to_string(), self.settings.error_message_limit);
                let message = update.error.clone().unwrap_or_default();
                (JobResult::failure(&job, message, started.elapsed()), update)
            }
        };

        result.recorded = self.record(&job.id, result.status, update).await;
        result
    }

    async fn record(&self, job_id: &str, status: BundleStatus, update: JobStatusUpdate) -> bool {
        let records = Arc::clone(&self.records);
        let id = job_id.to_string();
        match blocking(move || records.update_job_status(&id, status, update)).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) | Err(e) => {
                error!(
                    "Failed to record status {} for bundle job {}: {}",
                    status, job_id, e
                );
                false
            }
        }
    }

    /// Sleeps for the poll interval, waking early on shutdown.
    async fn idle(&self) {
        let deadline = Instant::now() + self.settings.poll_interval;
        let tick = self.settings.poll_interval.min(Duration::from_millis(100));
        while !self.is_shutdown() && Instant::now() < deadline {
            tokio::time::sleep(tick).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::{BundleOptions, NewBundleJob, SourceRef};
    use crate::db::{Database, SqliteRecordStore};
    use crate::storage::MemoryBlobStore;
    use crate::test_support::{pdf_with_pages, Seeder};

    struct Harness {
        records: Arc<SqliteRecordStore>,
        blobs: Arc<MemoryBlobStore>,
        seeder: Seeder,
    }

    fn harness() -> Harness {
        let db = Database::open_in_memory().unwrap();
        let blobs = Arc::new(MemoryBlobStore::new());
        Harness {
            records: Arc::new(SqliteRecordStore::new(db.clone())),
            seeder: Seeder::new(db, blobs.clone()),
            blobs,
        }
    }

    fn worker(h: &Harness, settings: WorkerSettings) -> BundleWorker {
        BundleWorker::new(
            h.records.clone(),
            h.blobs.clone(),
            RunnerSettings::default(),
            settings,
        )
    }

    fn queue(h: &Harness, manifest: Vec<SourceRef>) -> String {
        h.records
            .create_job(NewBundleJob::new("c1", BundleOptions::default(), manifest))
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_run_once_with_empty_queue() {
        let h = harness();
        let results = worker(&h, WorkerSettings::default()).run_once().await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_run_once_drives_jobs_to_terminal_states() {
        let h = harness();
        let good = h.seeder.document("c1", "d1", "Lease", "lease.pdf", pdf_with_pages(2), 0);
        let ok_id = queue(&h, vec![good]);
        let bad_id = queue(&h, vec![SourceRef::Draft { id: "ghost".to_string() }]);

        let settings = WorkerSettings {
            concurrency: 2,
            ..Default::default()
        };
        let results = worker(&h, settings).run_once().await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.recorded));

        let ok = h.records.get_job(&ok_id).unwrap().unwrap();
        assert_eq!(ok.status, BundleStatus::Ready);
        let location = ok.output_location.unwrap();
        let archive = h.blobs.bytes(&location.bucket, &location.path).unwrap();
        assert_eq!(ok.output_byte_size, Some(archive.len() as u64));
        assert_eq!(
            h.blobs.content_type(&location.bucket, &location.path).as_deref(),
            Some("application/zip")
        );

        let bad = h.records.get_job(&bad_id).unwrap().unwrap();
        assert_eq!(bad.status, BundleStatus::Error);
        assert!(bad.error.unwrap().contains("ghost"));
        assert!(bad.output_location.is_none());
    }

    #[tokio::test]
    async fn test_batch_size_limits_claims() {
        let h = harness();
        for n in 0..3 {
            let id = format!("dr{}", n);
            let draft = h.seeder.draft("c1", &id, "Notice", "text", None);
            queue(&h, vec![draft]);
        }

        let settings = WorkerSettings {
            batch_size: 2,
            ..Default::default()
        };
        let worker = worker(&h, settings);
        assert_eq!(worker.run_once().await.unwrap().len(), 2);
        assert_eq!(worker.run_once().await.unwrap().len(), 1);
        assert!(worker.run_once().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_timeout_moves_job_to_error() {
        let h = harness();
        let doc = h.seeder.document("c1", "d1", "Lease", "lease.pdf", pdf_with_pages(40), 0);
        let id = queue(&h, vec![doc]);

        let settings = WorkerSettings {
            job_timeout: Duration::ZERO,
            ..Default::default()
        };
        let results = worker(&h, settings).run_once().await.unwrap();
        assert!(results[0].error.as_deref().unwrap().contains("timed out"));

        let job = h.records.get_job(&id).unwrap().unwrap();
        assert_eq!(job.status, BundleStatus::Error);
        assert!(job.error.unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_error_message_truncated() {
        let h = harness();
        let long_id = "x".repeat(200);
        let id = queue(&h, vec![SourceRef::Exhibit { id: long_id }]);

        let settings = WorkerSettings {
            error_message_limit: 40,
            ..Default::default()
        };
        worker(&h, settings).run_once().await.unwrap();

        let job = h.records.get_job(&id).unwrap().unwrap();
        assert_eq!(job.error.unwrap().chars().count(), 40);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let h = harness();
        let settings = WorkerSettings {
            poll_interval: Duration::from_millis(20),
            ..Default::default()
        };
        let worker = Arc::new(worker(&h, settings));
        let handle = worker.shutdown_handle();

        let running = tokio::spawn({
            let worker = Arc::clone(&worker);
            async move { worker.run().await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.store(true, Ordering::Relaxed);

        tokio::time::timeout(Duration::from_secs(5), running)
            .await
            .unwrap()
            .unwrap();
        assert!(worker.is_shutdown());
    }
}
