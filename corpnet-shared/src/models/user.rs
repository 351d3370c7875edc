//! User model and database operations
//!
//! Users belong to exactly one account. Deleting a user through the API only
//! sets `deleted = TRUE`; rows that reference the user (contacts, requests,
//! event parties, history) are kept, but every list query filters on
//! `deleted = FALSE`.
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE users (
//!     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
//!     account_id UUID NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
//!     email VARCHAR(255) NOT NULL,            -- unique on lower(email)
//!     password_hash VARCHAR(255) NOT NULL,
//!     first_name VARCHAR(128),
//!     last_name VARCHAR(128),
//!     role user_role NOT NULL DEFAULT 'user',
//!     deleted BOOLEAN NOT NULL DEFAULT FALSE,
//!     login_locked BOOLEAN NOT NULL DEFAULT FALSE,
//!     unsuccessful_login_count INTEGER NOT NULL DEFAULT 0,
//!     created_by UUID, updated_by UUID,
//!     created_date TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     updated_date TIMESTAMPTZ NOT NULL DEFAULT NOW()
//! );
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use super::account::AccountType;

/// Role of a user inside their account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    User,
    Manager,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::User => "user",
            UserRole::Manager => "manager",
            UserRole::Admin => "admin",
        }
    }
}

/// User account
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub account_id: Uuid,
    pub email: String,

    #[serde(skip_serializing)]
    pub password_hash: String,

    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: UserRole,
    pub deleted: bool,
    pub login_locked: bool,
    pub unsuccessful_login_count: i32,
    pub created_by: Option<Uuid>,
    pub updated_by: Option<Uuid>,
    pub created_date: DateTime<Utc>,
    pub updated_date: DateTime<Utc>,
}

/// Input for creating a user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUser {
    pub account_id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: UserRole,
    pub created_by: Option<Uuid>,
}

/// A user joined with the account fields needed for permission checks
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserWithAccount {
    pub id: Uuid,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub account_id: Uuid,
    pub account_type: AccountType,
    pub account_blocked: bool,
}

const USER_COLUMNS: &str = "id, account_id, email, password_hash, first_name, last_name, role, \
     deleted, login_locked, unsuccessful_login_count, created_by, updated_by, \
     created_date, updated_date";

impl User {
    /// Display name, falling back to the email address
    pub fn display_name(&self) -> String {
        match (&self.first_name, &self.last_name) {
            (Some(first), Some(last)) => format!("{} {}", first, last),
            (Some(first), None) => first.clone(),
            (None, Some(last)) => last.clone(),
            (None, None) => self.email.clone(),
        }
    }

    /// Creates a user
    ///
    /// # Errors
    ///
    /// Fails with a unique violation on `lower(email)` if the address is taken,
    /// including by a soft-deleted user.
    pub async fn create(pool: &PgPool, data: CreateUser) -> Result<Self, sqlx::Error> {
        let sql = format!(
            r#"
            INSERT INTO users
                (account_id, email, password_hash, first_name, last_name, role, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {USER_COLUMNS}
            "#
        );

        sqlx::query_as::<_, User>(&sql)
            .bind(data.account_id)
            .bind(data.email.trim())
            .bind(data.password_hash)
            .bind(data.first_name)
            .bind(data.last_name)
            .bind(data.role)
            .bind(data.created_by)
            .fetch_one(pool)
            .await
    }

    /// Finds a user by ID, including soft-deleted users
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");

        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Finds an active (not deleted) user by case-insensitive email
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE lower(email) = lower($1) AND deleted = FALSE"
        );

        sqlx::query_as::<_, User>(&sql)
            .bind(email.trim())
            .fetch_optional(pool)
            .await
    }

    /// Loads active users with their account flags
    ///
    /// Unknown and soft-deleted IDs are silently dropped; callers compare the
    /// result against their input to report missing users.
    pub async fn find_active_by_ids(
        pool: &PgPool,
        ids: &[Uuid],
    ) -> Result<Vec<UserWithAccount>, sqlx::Error> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        sqlx::query_as::<_, UserWithAccount>(
            r#"
            SELECT u.id, u.email, u.first_name, u.last_name,
                   a.id AS account_id, a.account_type,
                   (a.blocked OR a.deleted OR NOT a.is_active) AS account_blocked
            FROM users u
            JOIN accounts a ON a.id = u.account_id
            WHERE u.id = ANY($1) AND u.deleted = FALSE
            "#,
        )
        .bind(ids)
        .fetch_all(pool)
        .await
    }

    /// Lists active users of an account
    pub async fn list_active_by_account(
        pool: &PgPool,
        account_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users \
             WHERE account_id = $1 AND deleted = FALSE \
             ORDER BY created_date ASC"
        );

        sqlx::query_as::<_, User>(&sql)
            .bind(account_id)
            .fetch_all(pool)
            .await
    }

    /// Soft-deletes a user
    ///
    /// Returns false if the user does not exist or is already deleted.
    pub async fn soft_delete(
        pool: &PgPool,
        id: Uuid,
        deleted_by: Option<Uuid>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET deleted = TRUE, updated_by = $2, updated_date = NOW()
            WHERE id = $1 AND deleted = FALSE
            "#,
        )
        .bind(id)
        .bind(deleted_by)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// Per-user notification delivery settings
#[derive(Debug, Clone, Default, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserSettings {
    pub user_id: Uuid,
    pub android_device_ids: Vec<String>,
    pub ios_device_ids: Vec<String>,
    pub web_device_ids: Vec<String>,
    pub push_enabled: bool,
}

impl UserSettings {
    /// Settings for a user; users without a row get defaults with push enabled
    pub async fn find_or_default(pool: &PgPool, user_id: Uuid) -> Result<Self, sqlx::Error> {
        let settings = sqlx::query_as::<_, UserSettings>(
            r#"
            SELECT user_id, android_device_ids, ios_device_ids, web_device_ids, push_enabled
            FROM user_settings
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

        Ok(settings.unwrap_or(UserSettings {
            user_id,
            push_enabled: true,
            ..Default::default()
        }))
    }

    /// Stores the settings row
    pub async fn upsert(pool: &PgPool, settings: &UserSettings) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO user_settings
                (user_id, android_device_ids, ios_device_ids, web_device_ids, push_enabled)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id) DO UPDATE
               SET android_device_ids = EXCLUDED.android_device_ids,
                   ios_device_ids = EXCLUDED.ios_device_ids,
                   web_device_ids = EXCLUDED.web_device_ids,
                   push_enabled = EXCLUDED.push_enabled,
                   updated_date = NOW()
            "#,
        )
        .bind(settings.user_id)
        .bind(&settings.android_device_ids)
        .bind(&settings.ios_device_ids)
        .bind(&settings.web_device_ids)
        .bind(settings.push_enabled)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Every device id the user can be pushed to, empty when push is disabled
    pub fn device_ids(&self) -> Vec<String> {
        if !self.push_enabled {
            return Vec::new();
        }

        self.android_device_ids
            .iter()
            .chain(self.ios_device_ids.iter())
            .chain(self.web_device_ids.iter())
            .cloned()
            .collect()
    }
}
