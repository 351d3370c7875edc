/// Job queue backed by the `jobs` table
///
/// Workers claim pending jobs with `FOR UPDATE SKIP LOCKED`, so several worker
/// processes can poll the same table without handing out a job twice. A
/// claimed job is `running` until it is marked `succeeded` or `failed`.
/// Failed jobs are not retried. Jobs left `running` by a worker that died are
/// failed by [`JobQueue::fail_stale`] when a worker starts.
///
/// # Example
///
/// ```no_run
/// use corpnet_worker::queue::JobQueue;
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), Box<dyn std::error::Error>> {
/// let queue = JobQueue::new(pool);
/// for job in queue.claim_jobs(Some(5)).await? {
///     println!("Claimed {} ({})", job.id, job.job_type);
///     queue.mark_succeeded(job.id).await?;
/// }
/// # Ok(())
/// # }
/// ```
use corpnet_shared::models::job::{Job, JobState, JOB_COLUMNS};
use sqlx::PgPool;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The job does not exist or is not running
    #[error("Job not running: {0}")]
    NotRunning(Uuid),
}

#[derive(Clone)]
pub struct JobQueue {
    db: PgPool,

    /// Default claim size
    batch_size: usize,
}

impl JobQueue {
    pub fn new(db: PgPool) -> Self {
        JobQueue { db, batch_size: 10 }
    }

    pub fn with_batch_size(db: PgPool, batch_size: usize) -> Self {
        JobQueue { db, batch_size }
    }

    /// Claims up to `limit` pending jobs (oldest first) and marks them running
    pub async fn claim_jobs(&self, limit: Option<usize>) -> Result<Vec<Job>, QueueError> {
        let limit = limit.unwrap_or(self.batch_size) as i64;

        let sql = format!(
            r#"
            WITH pending_jobs AS (
                SELECT id
                FROM jobs
                WHERE state = $1
                ORDER BY created_at ASC
                LIMIT $2
                FOR UPDATE SKIP LOCKED
            )
            UPDATE jobs
            SET state = $3, started_at = NOW()
            FROM pending_jobs
            WHERE jobs.id = pending_jobs.id
            RETURNING {}
            "#,
            qualified_columns()
        );

        let jobs = sqlx::query_as::<_, Job>(&sql)
            .bind(JobState::Pending)
            .bind(limit)
            .bind(JobState::Running)
            .fetch_all(&self.db)
            .await?;

        if !jobs.is_empty() {
            tracing::debug!(count = jobs.len(), "Claimed jobs");
        }

        Ok(jobs)
    }

    pub async fn pending_count(&self) -> Result<i64, QueueError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM jobs WHERE state = $1")
            .bind(JobState::Pending)
            .fetch_one(&self.db)
            .await?;

        Ok(count)
    }

    /// Fails jobs that have been `running` for longer than `stale_after`
    pub async fn fail_stale(&self, stale_after: Duration) -> Result<u64, QueueError> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET state = $1, error = 'abandoned by a stopped worker', ended_at = NOW()
            WHERE state = $2 AND started_at < NOW() - make_interval(secs => $3)
            "#,
        )
        .bind(JobState::Failed)
        .bind(JobState::Running)
        .bind(stale_after.as_secs_f64())
        .execute(&self.db)
        .await?;

        if result.rows_affected() > 0 {
            tracing::warn!(count = result.rows_affected(), "Failed stale running jobs");
        }

        Ok(result.rows_affected())
    }

    pub async fn mark_succeeded(&self, job_id: Uuid) -> Result<(), QueueError> {
        self.finish(job_id, JobState::Succeeded, None).await?;
        tracing::debug!(job_id = %job_id, "Job succeeded");
        Ok(())
    }

    /// Records the error; the job stays failed
    pub async fn mark_failed(&self, job_id: Uuid, error: &str) -> Result<(), QueueError> {
        self.finish(job_id, JobState::Failed, Some(error)).await?;
        tracing::warn!(job_id = %job_id, error = %error, "Job failed");
        Ok(())
    }

    async fn finish(
        &self,
        job_id: Uuid,
        state: JobState,
        error: Option<&str>,
    ) -> Result<(), QueueError> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET state = $2, error = $3, ended_at = NOW()
            WHERE id = $1 AND state = $4
            "#,
        )
        .bind(job_id)
        .bind(state)
        .bind(error)
        .bind(JobState::Running)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(QueueError::NotRunning(job_id));
        }

        Ok(())
    }
}

/// `JOB_COLUMNS` prefixed with the table name, for `UPDATE ... FROM`
fn qualified_columns() -> String {
    JOB_COLUMNS
        .split(',')
        .map(|column| format!("jobs.{}", column.trim()))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qualified_columns() {
        let columns = qualified_columns();
        assert!(columns.starts_with("jobs.id, jobs.job_type, jobs.payload"));
        assert!(!columns.contains(" id,"));
        assert_eq!(columns.matches("jobs.").count(), JOB_COLUMNS.split(',').count());
    }
}
