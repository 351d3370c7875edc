/// Worker orchestrator
///
/// Polls the job queue and runs each claimed job on its own Tokio task.
///
/// ```text
/// Orchestrator
///   ├─> JobQueue: claim pending jobs (up to the free concurrency slots)
///   ├─> HandlerRegistry: handler for the job type
///   ├─> JobHandler: process the decoded payload
///   └─> JobQueue: mark succeeded / failed
/// ```
///
/// # Concurrency
///
/// A semaphore bounds the number of jobs running at once; the loop only claims
/// as many jobs as there are free permits.
///
/// # Shutdown
///
/// Cancelling the shutdown token stops claiming. Running jobs get the grace
/// period to finish; jobs still running after it are aborted and marked
/// failed.
///
/// # Example
///
/// ```no_run
/// use corpnet_worker::{config::OrchestratorConfig, handlers::HandlerRegistry, notifier::Notifier};
/// use corpnet_worker::orchestrator::WorkerOrchestrator;
/// use corpnet_shared::redis::{RedisClient, RedisConfig};
/// use sqlx::PgPool;
/// use std::sync::Arc;
///
/// # async fn example(pool: PgPool) -> anyhow::Result<()> {
/// let redis = RedisClient::new(RedisConfig::from_env()?).await?;
/// let notifier = Arc::new(Notifier::new(pool.clone(), redis));
/// let orchestrator = WorkerOrchestrator::new(
///     pool,
///     notifier,
///     HandlerRegistry::with_defaults(),
///     OrchestratorConfig::default(),
/// );
/// orchestrator.run().await?;
/// # Ok(())
/// # }
/// ```
use crate::config::OrchestratorConfig;
use crate::handlers::{HandlerRegistry, JobContext};
use crate::notifier::Notifier;
use crate::queue::JobQueue;
use corpnet_shared::models::job::Job;
use sqlx::PgPool;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration, Instant};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub struct WorkerOrchestrator {
    queue: JobQueue,
    registry: Arc<HandlerRegistry>,
    context: JobContext,
    config: OrchestratorConfig,
    slots: Arc<Semaphore>,
    shutdown_token: CancellationToken,
}

/// A job running on its own task
struct RunningJob {
    id: Uuid,
    handle: JoinHandle<()>,
}

impl WorkerOrchestrator {
    pub fn new(
        db: PgPool,
        notifier: Arc<Notifier>,
        registry: HandlerRegistry,
        config: OrchestratorConfig,
    ) -> Self {
        WorkerOrchestrator {
            queue: JobQueue::with_batch_size(db.clone(), config.batch_size),
            registry: Arc::new(registry),
            context: JobContext { db, notifier },
            slots: Arc::new(Semaphore::new(config.max_concurrent_jobs)),
            config,
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Token that stops the loop when cancelled
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// Runs until the shutdown token is cancelled
    pub async fn run(&self) -> anyhow::Result<()> {
        self.queue.fail_stale(self.config.stale_after()).await?;
        let pending = self.queue.pending_count().await?;

        tracing::info!(
            max_concurrent_jobs = self.config.max_concurrent_jobs,
            batch_size = self.config.batch_size,
            pending,
            "Worker orchestrator starting"
        );

        let mut running: Vec<RunningJob> = Vec::new();

        while !self.shutdown_token.is_cancelled() {
            running.retain(|job| !job.handle.is_finished());

            let free = self.slots.available_permits().min(self.config.batch_size);
            if free == 0 {
                self.pause(Duration::from_millis(100)).await;
                continue;
            }

            let jobs = match self.queue.claim_jobs(Some(free)).await {
                Ok(jobs) => jobs,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to claim jobs");
                    self.pause(self.config.poll_interval()).await;
                    continue;
                }
            };

            if jobs.is_empty() {
                self.pause(self.config.poll_interval()).await;
                continue;
            }

            for job in jobs {
                running.push(self.dispatch(job).await);
            }
        }

        self.drain(running).await;
        tracing::info!("Worker orchestrator shut down");
        Ok(())
    }

    /// Sleeps, waking early on shutdown
    async fn pause(&self, duration: Duration) {
        tokio::select! {
            _ = sleep(duration) => {}
            _ = self.shutdown_token.cancelled() => {}
        }
    }

    async fn dispatch(&self, job: Job) -> RunningJob {
        let id = job.id;
        let permit = self.slots.clone().acquire_owned().await;
        let queue = self.queue.clone();
        let registry = self.registry.clone();
        let context = self.context.clone();

        let handle = tokio::spawn(async move {
            let _permit = permit;
            execute_job(job, &registry, &context, &queue).await;
        });

        RunningJob { id, handle }
    }

    async fn drain(&self, mut running: Vec<RunningJob>) {
        running.retain(|job| !job.handle.is_finished());
        if running.is_empty() {
            return;
        }

        tracing::info!(count = running.len(), "Shutdown requested, waiting for running jobs");

        let deadline = Instant::now() + self.config.shutdown_grace();
        while !running.is_empty() && Instant::now() < deadline {
            sleep(Duration::from_millis(100)).await;
            running.retain(|job| !job.handle.is_finished());
        }

        for job in running {
            tracing::warn!(job_id = %job.id, "Aborting job after shutdown grace period");
            job.handle.abort();
            if let Err(e) = self.queue.mark_failed(job.id, "aborted by worker shutdown").await {
                tracing::error!(job_id = %job.id, error = %e, "Failed to mark aborted job");
            }
        }
    }
}

/// Runs one claimed job to completion and records the outcome
pub async fn execute_job(
    job: Job,
    registry: &HandlerRegistry,
    context: &JobContext,
    queue: &JobQueue,
) {
    let outcome = run_handler(&job, registry, context).await;

    let recorded = match outcome {
        Ok(()) => queue.mark_succeeded(job.id).await,
        Err(message) => queue.mark_failed(job.id, &message).await,
    };

    if let Err(e) = recorded {
        tracing::error!(job_id = %job.id, error = %e, "Failed to record job outcome");
    }
}

async fn run_handler(
    job: &Job,
    registry: &HandlerRegistry,
    context: &JobContext,
) -> Result<(), String> {
    let payload = job
        .decode_payload()
        .map_err(|e| format!("Invalid payload: {}", e))?;

    let handler = registry
        .get(&job.job_type)
        .ok_or_else(|| format!("No handler registered for {}", job.job_type))?;

    tracing::debug!(
        job_id = %job.id,
        job_type = %job.job_type,
        handler = handler.name(),
        "Executing job"
    );

    handler
        .handle(context, payload)
        .await
        .map_err(|e| e.to_string())
}
