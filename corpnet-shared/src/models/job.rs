//! Background job payloads and the enqueue side of the job queue
//!
//! Jobs live in the `jobs` table. The API inserts `pending` rows after its own
//! transaction commits; the worker claims them with `FOR UPDATE SKIP LOCKED`
//! (see the worker's `queue` module).
//!
//! # State Machine
//!
//! ```text
//! pending → running → succeeded
//!                   → failed
//! ```
//!
//! There are no retries: a failed job keeps its error message and stays failed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use super::event::EventKind;
use super::party::PartyRole;

/// Job lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "job_state", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::Running => "running",
            JobState::Succeeded => "succeeded",
            JobState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Succeeded | JobState::Failed)
    }

    pub fn can_transition_to(&self, target: JobState) -> bool {
        matches!(
            (self, target),
            (JobState::Pending, JobState::Running)
                | (JobState::Running, JobState::Succeeded)
                | (JobState::Running, JobState::Failed)
        )
    }
}

/// What a job does; stored as the `payload` column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobPayload {
    /// Recount the stats row of one event
    UpdateEventStats { kind: EventKind, event_id: Uuid },

    /// Tell users they were added to a party list
    NotifyEventParties {
        kind: EventKind,
        event_id: Uuid,
        role: PartyRole,
        user_ids: Vec<Uuid>,
    },

    /// Tell the recipient about a new contact request
    NotifyContactRequest { request_id: Uuid },

    /// Tell the sender their request was accepted
    NotifyContactAccepted { request_id: Uuid },
}

impl JobPayload {
    /// Value of the `job_type` column and handler registry key
    pub fn job_type(&self) -> &'static str {
        match self {
            JobPayload::UpdateEventStats { .. } => "update_event_stats",
            JobPayload::NotifyEventParties { .. } => "notify_event_parties",
            JobPayload::NotifyContactRequest { .. } => "notify_contact_request",
            JobPayload::NotifyContactAccepted { .. } => "notify_contact_accepted",
        }
    }
}

/// Job row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Job {
    pub id: Uuid,
    pub job_type: String,
    pub payload: JsonValue,
    pub state: JobState,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

pub const JOB_COLUMNS: &str =
    "id, job_type, payload, state, error, created_at, started_at, ended_at";

impl Job {
    pub fn decode_payload(&self) -> Result<JobPayload, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }

    /// Inserts a pending job
    pub async fn enqueue(pool: &PgPool, payload: &JobPayload) -> Result<Self, sqlx::Error> {
        let sql = format!(
            "INSERT INTO jobs (job_type, payload) VALUES ($1, $2) RETURNING {JOB_COLUMNS}"
        );

        let job = sqlx::query_as::<_, Job>(&sql)
            .bind(payload.job_type())
            .bind(Json(payload))
            .fetch_one(pool)
            .await?;

        tracing::debug!(job_id = %job.id, job_type = %job.job_type, "Job enqueued");

        Ok(job)
    }

    /// Enqueues a job, logging instead of failing
    ///
    /// Used after a request's transaction has committed: the primary change
    /// stands even if the follow-up job cannot be scheduled.
    pub async fn enqueue_or_warn(pool: &PgPool, payload: JobPayload) -> Option<Self> {
        match Self::enqueue(pool, &payload).await {
            Ok(job) => Some(job),
            Err(e) => {
                tracing::warn!(
                    job_type = payload.job_type(),
                    error = %e,
                    "Failed to enqueue follow-up job"
                );
                None
            }
        }
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = $1");

        sqlx::query_as::<_, Job>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn count_by_state(pool: &PgPool, state: JobState) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM jobs WHERE state = $1")
            .bind(state)
            .fetch_one(pool)
            .await
    }
}
