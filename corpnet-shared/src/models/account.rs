//! Account (tenant) model and database operations
//!
//! An account is the company a user belongs to. Its `account_type` drives
//! who may create which kind of event and who may be invited to it.
//!
//! # Schema
//!
//! ```sql
//! CREATE TYPE account_type AS ENUM (
//!     'corporate', 'buy_side', 'sell_side', 'private', 'general', 'guest', 'admin'
//! );
//!
//! CREATE TABLE accounts (
//!     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
//!     name VARCHAR(255) NOT NULL,
//!     account_type account_type NOT NULL,
//!     is_active BOOLEAN NOT NULL DEFAULT TRUE,
//!     blocked BOOLEAN NOT NULL DEFAULT FALSE,
//!     deleted BOOLEAN NOT NULL DEFAULT FALSE,
//!     ...
//! );
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::fmt;
use uuid::Uuid;

use super::event::EventKind;

/// Classification of an account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "account_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    /// Listed company that hosts corporate access events
    Corporate,

    /// Asset manager / institutional investor
    BuySide,

    /// Broker or research house
    SellSide,

    /// Private investor
    Private,

    /// General investor profile
    General,

    /// Invited guest with a restricted account
    Guest,

    /// Platform administrator
    Admin,
}

impl AccountType {
    /// Database / wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Corporate => "corporate",
            AccountType::BuySide => "buy_side",
            AccountType::SellSide => "sell_side",
            AccountType::Private => "private",
            AccountType::General => "general",
            AccountType::Guest => "guest",
            AccountType::Admin => "admin",
        }
    }

    /// Guests may receive but never send contact requests
    pub fn can_send_contact_requests(&self) -> bool {
        !matches!(self, AccountType::Guest)
    }

    /// Whether users of this account type may create and edit events of `kind`
    pub fn can_manage(&self, kind: EventKind) -> bool {
        match (self, kind) {
            (AccountType::Admin, _) => true,
            (AccountType::Guest, _) => false,
            (AccountType::Corporate, EventKind::CorporateAccessEvent) => true,
            (_, EventKind::CorporateAccessEvent) => false,
            (_, EventKind::Webinar | EventKind::Webcast) => true,
        }
    }

    /// Whether users of this account type may appear in party lists of `kind`
    ///
    /// Corporate access events connect one issuer with investors, so other
    /// corporates and guests are excluded there.
    pub fn can_be_invited_to(&self, kind: EventKind) -> bool {
        match kind {
            EventKind::CorporateAccessEvent => {
                !matches!(self, AccountType::Corporate | AccountType::Guest)
            }
            EventKind::Webinar | EventKind::Webcast => true,
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Account row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Account {
    pub id: Uuid,
    pub name: String,
    pub account_type: AccountType,
    pub is_active: bool,
    pub blocked: bool,
    pub deleted: bool,
    pub created_date: DateTime<Utc>,
    pub updated_date: DateTime<Utc>,
}

/// Input for creating an account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAccount {
    pub name: String,
    pub account_type: AccountType,
}

impl Account {
    /// Whether users of this account may be shown to other tenants
    pub fn is_visible(&self) -> bool {
        self.is_active && !self.blocked && !self.deleted
    }

    /// Inserts a new active account
    pub async fn create(pool: &PgPool, data: CreateAccount) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Account>(
            r#"
            INSERT INTO accounts (name, account_type)
            VALUES ($1, $2)
            RETURNING id, name, account_type, is_active, blocked, deleted,
                      created_date, updated_date
            "#,
        )
        .bind(data.name)
        .bind(data.account_type)
        .fetch_one(pool)
        .await
    }

    /// Finds an account by ID (including blocked and deleted ones)
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Account>(
            r#"
            SELECT id, name, account_type, is_active, blocked, deleted,
                   created_date, updated_date
            FROM accounts
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Blocks or unblocks an account
    ///
    /// Returns false if the account does not exist.
    pub async fn set_blocked(pool: &PgPool, id: Uuid, blocked: bool) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE accounts SET blocked = $2, updated_date = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(blocked)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Hard-deletes an account and everything that cascades from it
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM accounts WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// Public company profile attached to an account
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AccountProfile {
    pub account_id: Uuid,
    pub company_name: String,
    pub description: Option<String>,
    pub website: Option<String>,
    pub updated_date: DateTime<Utc>,
}

impl AccountProfile {
    /// Creates or replaces the profile of an account
    pub async fn upsert(
        pool: &PgPool,
        account_id: Uuid,
        company_name: &str,
        description: Option<&str>,
        website: Option<&str>,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, AccountProfile>(
            r#"
            INSERT INTO account_profiles (account_id, company_name, description, website)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (account_id) DO UPDATE
               SET company_name = EXCLUDED.company_name,
                   description = EXCLUDED.description,
                   website = EXCLUDED.website,
                   updated_date = NOW()
            RETURNING account_id, company_name, description, website, updated_date
            "#,
        )
        .bind(account_id)
        .bind(company_name)
        .bind(description)
        .bind(website)
        .fetch_one(pool)
        .await
    }

    /// Finds the profile of an account
    pub async fn find(pool: &PgPool, account_id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, AccountProfile>(
            r#"
            SELECT account_id, company_name, description, website, updated_date
            FROM account_profiles
            WHERE account_id = $1
            "#,
        )
        .bind(account_id)
        .fetch_optional(pool)
        .await
    }
}
