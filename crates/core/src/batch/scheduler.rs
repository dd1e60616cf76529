//! Batch job scheduler.
//!
//! At most one RUNNING record exists per job name. The guarantee comes from
//! the repository's conditional `start`, so it holds across processes that
//! share a database.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::MissedTickBehavior;
use vaultline_shared::types::{ActorId, BatchRecordId, PageRequest, PageResponse};

use crate::audit::{AuditEvent, AuditLog};
use crate::batch::error::BatchError;
use crate::batch::handler::{ConfigReader, JobContext, JobHandler};
use crate::batch::types::{BatchRecord, BatchStatus, TriggerSource};
use crate::error::RepositoryError;
use crate::repository::BatchRepository;

/// Registers, triggers and tracks batch jobs.
#[derive(Clone)]
pub struct JobScheduler {
    jobs: Arc<DashMap<String, Arc<dyn JobHandler>>>,
    repo: Arc<dyn BatchRepository>,
    config: ConfigReader,
    audit: AuditLog,
}

impl JobScheduler {
    /// Creates a scheduler with no jobs registered.
    #[must_use]
    pub fn new(repo: Arc<dyn BatchRepository>, config: ConfigReader, audit: AuditLog) -> Self {
        Self {
            jobs: Arc::new(DashMap::new()),
            repo,
            config,
            audit,
        }
    }

    /// Registers `handler` under `name`.
    ///
    /// Registering the same handler twice is a no-op; a different handler
    /// under an existing name is rejected.
    pub fn register(&self, name: &str, handler: Arc<dyn JobHandler>) -> Result<(), BatchError> {
        let name = Self::job_name(name)?;
        match self.jobs.entry(name.to_string()) {
            Entry::Occupied(existing) => {
                if Arc::ptr_eq(existing.get(), &handler) {
                    Ok(())
                } else {
                    Err(BatchError::HandlerConflict(name.to_string()))
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(handler);
                tracing::info!(job = %name, "Job registered");
                Ok(())
            }
        }
    }

    /// Registered job names, sorted.
    pub fn jobs(&self) -> Vec<String> {
        let mut names: Vec<String> = self.jobs.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Starts a run in the background and returns its RUNNING record.
    pub async fn trigger(&self, name: &str, actor: &ActorId) -> Result<BatchRecord, BatchError> {
        let (handler, record) = self.start(name, actor, TriggerSource::Manual).await?;
        let scheduler = self.clone();
        let started = record.clone();
        tokio::spawn(async move {
            scheduler.execute(handler, record).await;
        });
        Ok(started)
    }

    /// Runs a job to completion and returns its terminal record.
    pub async fn run(&self, name: &str, actor: &ActorId) -> Result<BatchRecord, BatchError> {
        let (handler, record) = self.start(name, actor, TriggerSource::Manual).await?;
        Ok(self.execute(handler, record).await)
    }

    /// Fires `name` every `every` until the returned handle is aborted.
    ///
    /// The first run happens one interval after the call. A tick that finds
    /// the job still RUNNING is skipped.
    pub fn schedule(&self, name: &str, every: Duration) -> Result<JoinHandle<()>, BatchError> {
        let name = Self::job_name(name)?.to_string();
        if !self.jobs.contains_key(&name) {
            return Err(BatchError::JobNotFound(name));
        }
        if every.is_zero() {
            return Err(BatchError::Validation(format!(
                "interval for job '{name}' must be positive"
            )));
        }

        tracing::info!(job = %name, every_secs = every.as_secs(), "Job timer armed");
        let scheduler = self.clone();
        Ok(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match scheduler
                    .start(&name, &ActorId::system(), TriggerSource::Timer)
                    .await
                {
                    Ok((handler, record)) => {
                        scheduler.execute(handler, record).await;
                    }
                    Err(BatchError::AlreadyRunning(_)) => {
                        tracing::warn!(job = %name, "Previous run still in progress; tick skipped");
                    }
                    Err(e) => {
                        tracing::error!(job = %name, error = %e, "Timer could not start job");
                    }
                }
            }
        }))
    }

    /// Fetches a run record.
    pub async fn get(&self, id: BatchRecordId) -> Result<BatchRecord, BatchError> {
        self.repo
            .find(id)
            .await?
            .ok_or(BatchError::RecordNotFound(id))
    }

    /// Run history, newest first, optionally for one job.
    pub async fn history(
        &self,
        job_name: Option<&str>,
        page: &PageRequest,
    ) -> Result<PageResponse<BatchRecord>, BatchError> {
        Ok(self.repo.history(job_name.map(str::trim), page).await?)
    }

    /// Marks a RUNNING record FAILED without waiting for its handler.
    ///
    /// Used to release the job after a process died mid-run.
    pub async fn abandon(
        &self,
        id: BatchRecordId,
        actor: &ActorId,
        reason: &str,
    ) -> Result<BatchRecord, BatchError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(BatchError::Validation("abandon reason is required".into()));
        }
        let record = self.get(id).await?;
        if record.status != BatchStatus::Running {
            return Err(BatchError::InvalidState {
                id,
                status: record.status,
            });
        }

        let failed = record.failed(format!("abandoned by {actor}: {reason}"));
        self.repo.finish(&failed).await?;
        tracing::warn!(record_id = %id, job = %failed.job_name, actor = %actor, "Run abandoned");
        self.audit_run(&failed, actor).await;
        Ok(failed)
    }

    fn job_name(name: &str) -> Result<&str, BatchError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(BatchError::Validation("job name must not be blank".into()));
        }
        Ok(name)
    }

    async fn start(
        &self,
        name: &str,
        actor: &ActorId,
        trigger: TriggerSource,
    ) -> Result<(Arc<dyn JobHandler>, BatchRecord), BatchError> {
        let name = Self::job_name(name)?;
        let handler = self
            .jobs
            .get(name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| BatchError::JobNotFound(name.to_string()))?;

        let record = BatchRecord::running(name, actor.clone(), trigger);
        self.repo.start(&record).await.map_err(|e| match e {
            RepositoryError::Conflict(_) => BatchError::AlreadyRunning(name.to_string()),
            other => BatchError::Storage(other),
        })?;

        tracing::info!(
            record_id = %record.id,
            job = %name,
            triggered_by = %actor,
            trigger = trigger.as_str(),
            "Job started"
        );
        Ok((handler, record))
    }

    async fn execute(&self, handler: Arc<dyn JobHandler>, record: BatchRecord) -> BatchRecord {
        let ctx = JobContext {
            record_id: record.id,
            job_name: record.job_name.clone(),
            triggered_by: record.triggered_by.clone(),
            config: self.config.clone(),
        };

        // The handler runs in its own task so a panic surfaces as a JoinError.
        let outcome = tokio::spawn(async move { handler.run(ctx).await }).await;
        let finished = match outcome {
            Ok(Ok(())) => record.completed(),
            Ok(Err(e)) => record.failed(format!("{e:#}")),
            Err(e) => record.failed(panic_message(e)),
        };

        if let Err(e) = self.repo.finish(&finished).await {
            tracing::warn!(
                record_id = %finished.id,
                job = %finished.job_name,
                error = %e,
                "Run outcome not recorded"
            );
            return match self.repo.find(finished.id).await {
                Ok(Some(stored)) => stored,
                _ => finished,
            };
        }

        match finished.status {
            BatchStatus::Failed => tracing::error!(
                record_id = %finished.id,
                job = %finished.job_name,
                error_log = finished.error_log.as_deref().unwrap_or_default(),
                "Job failed"
            ),
            _ => tracing::info!(record_id = %finished.id, job = %finished.job_name, "Job completed"),
        }
        let actor = finished.triggered_by.clone();
        self.audit_run(&finished, &actor).await;
        finished
    }

    async fn audit_run(&self, record: &BatchRecord, actor: &ActorId) {
        self.audit
            .record(
                actor,
                AuditEvent::JobRun {
                    record_id: record.id,
                    job_name: record.job_name.clone(),
                    status: record.status,
                    error_log: record.error_log.clone(),
                },
            )
            .await;
    }
}

fn panic_message(err: JoinError) -> String {
    if !err.is_panic() {
        return format!("job task cancelled: {err}");
    }
    let payload = err.into_panic();
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string());
    format!("job panicked: {detail}")
}
