//! Stored user notifications
//!
//! The worker writes a row for every notification before pushing it over
//! Redis, so the API can list notifications even if the push was lost.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::PgPool;
use uuid::Uuid;

/// Notification row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub notification_type: String,
    pub title: String,
    pub body: String,
    pub payload: JsonValue,
    pub read: bool,
    pub created_date: DateTime<Utc>,
}

/// Input for creating a notification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateNotification {
    pub user_id: Uuid,
    pub notification_type: String,
    pub title: String,
    pub body: String,
    pub payload: JsonValue,
}

const NOTIFICATION_COLUMNS: &str =
    "id, user_id, notification_type, title, body, payload, read, created_date";

impl Notification {
    pub async fn create(pool: &PgPool, data: CreateNotification) -> Result<Self, sqlx::Error> {
        let sql = format!(
            r#"
            INSERT INTO notifications (user_id, notification_type, title, body, payload)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {NOTIFICATION_COLUMNS}
            "#
        );

        sqlx::query_as::<_, Notification>(&sql)
            .bind(data.user_id)
            .bind(data.notification_type)
            .bind(data.title)
            .bind(data.body)
            .bind(data.payload)
            .fetch_one(pool)
            .await
    }

    /// Newest first, at most `limit` rows
    pub async fn list_for_user(
        pool: &PgPool,
        user_id: Uuid,
        unread_only: bool,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let sql = format!(
            r#"
            SELECT {NOTIFICATION_COLUMNS}
            FROM notifications
            WHERE user_id = $1 AND ($2 = FALSE OR read = FALSE)
            ORDER BY created_date DESC
            LIMIT $3
            "#
        );

        sqlx::query_as::<_, Notification>(&sql)
            .bind(user_id)
            .bind(unread_only)
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    /// Marks a notification read; only its owner may do so
    ///
    /// Returns `None` when the notification does not exist or belongs to
    /// someone else.
    pub async fn mark_read(
        pool: &PgPool,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!(
            r#"
            UPDATE notifications SET read = TRUE
            WHERE id = $1 AND user_id = $2
            RETURNING {NOTIFICATION_COLUMNS}
            "#
        );

        sqlx::query_as::<_, Notification>(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn count_unread(pool: &PgPool, user_id: Uuid) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND read = FALSE",
        )
        .bind(user_id)
        .fetch_one(pool)
        .await
    }
}
