//! Established contacts and CRM shadow rows
//!
//! A contact is symmetric: the pair `(a, b)` and `(b, a)` are the same contact.
//! The unique index on `(LEAST(sent_by, sent_to), GREATEST(sent_by, sent_to))`
//! makes a second insert for the same pair a no-op.
//!
//! CRM contacts are address-book rows a user imported before the other party
//! was connected on the platform. Once two users become contacts, the CRM rows
//! they hold for each other are removed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::account::AccountType;

/// Contact row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Contact {
    pub id: Uuid,
    pub sent_by: Uuid,
    pub sent_to: Uuid,
    pub created_date: DateTime<Utc>,
}

/// The other side of a contact, as shown in a contact list
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ContactView {
    pub contact_id: Uuid,
    pub user_id: Uuid,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub account_id: Uuid,
    pub account_type: AccountType,
    pub company_name: Option<String>,
    pub connected_since: DateTime<Utc>,
}

impl Contact {
    pub fn other_party(&self, user_id: Uuid) -> Uuid {
        if self.sent_by == user_id {
            self.sent_to
        } else {
            self.sent_by
        }
    }

    /// Creates the contact for a pair, returning the existing one if present
    pub async fn create_for_pair(
        conn: &mut PgConnection,
        sent_by: Uuid,
        sent_to: Uuid,
    ) -> Result<Self, sqlx::Error> {
        let inserted = sqlx::query_as::<_, Contact>(
            r#"
            INSERT INTO contacts (sent_by, sent_to)
            VALUES ($1, $2)
            ON CONFLICT ((LEAST(sent_by, sent_to)), (GREATEST(sent_by, sent_to))) DO NOTHING
            RETURNING id, sent_by, sent_to, created_date
            "#,
        )
        .bind(sent_by)
        .bind(sent_to)
        .fetch_optional(&mut *conn)
        .await?;

        match inserted {
            Some(contact) => Ok(contact),
            None => Self::find_between(conn, sent_by, sent_to)
                .await?
                .ok_or(sqlx::Error::RowNotFound),
        }
    }

    /// Finds the contact between two users in either direction
    pub async fn find_between(
        conn: &mut PgConnection,
        a: Uuid,
        b: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Contact>(
            r#"
            SELECT id, sent_by, sent_to, created_date
            FROM contacts
            WHERE LEAST(sent_by, sent_to) = LEAST($1::uuid, $2::uuid)
              AND GREATEST(sent_by, sent_to) = GREATEST($1::uuid, $2::uuid)
            "#,
        )
        .bind(a)
        .bind(b)
        .fetch_optional(conn)
        .await
    }

    /// Number of contact rows between two users (0 or 1)
    pub async fn count_between(pool: &PgPool, a: Uuid, b: Uuid) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM contacts
            WHERE (sent_by = $1 AND sent_to = $2) OR (sent_by = $2 AND sent_to = $1)
            "#,
        )
        .bind(a)
        .bind(b)
        .fetch_one(pool)
        .await
    }

    /// Contacts of a user, hiding soft-deleted users and invisible accounts
    pub async fn list_for_user(
        pool: &PgPool,
        user_id: Uuid,
    ) -> Result<Vec<ContactView>, sqlx::Error> {
        sqlx::query_as::<_, ContactView>(
            r#"
            SELECT c.id AS contact_id, u.id AS user_id, u.email, u.first_name, u.last_name,
                   a.id AS account_id, a.account_type, ap.company_name,
                   c.created_date AS connected_since
            FROM contacts c
            JOIN users u
              ON u.id = CASE WHEN c.sent_by = $1 THEN c.sent_to ELSE c.sent_by END
            JOIN accounts a ON a.id = u.account_id
            LEFT JOIN account_profiles ap ON ap.account_id = a.id
            WHERE (c.sent_by = $1 OR c.sent_to = $1)
              AND u.deleted = FALSE
              AND a.is_active = TRUE AND a.blocked = FALSE AND a.deleted = FALSE
            ORDER BY c.created_date DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
    }
}

/// CRM-imported address book entry
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CrmContact {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub created_date: DateTime<Utc>,
}

impl CrmContact {
    pub async fn create(
        pool: &PgPool,
        owner_id: Uuid,
        email: &str,
        first_name: Option<&str>,
        last_name: Option<&str>,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, CrmContact>(
            r#"
            INSERT INTO crm_contacts (owner_id, email, first_name, last_name)
            VALUES ($1, $2, $3, $4)
            RETURNING id, owner_id, email, first_name, last_name, created_date
            "#,
        )
        .bind(owner_id)
        .bind(email.trim())
        .bind(first_name)
        .bind(last_name)
        .fetch_one(pool)
        .await
    }

    /// Removes the CRM rows each user holds for the other
    ///
    /// Returns the number of rows removed.
    pub async fn delete_shadows(
        conn: &mut PgConnection,
        a: Uuid,
        b: Uuid,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            DELETE FROM crm_contacts crm
            USING users owner, users other
            WHERE crm.owner_id = owner.id
              AND lower(crm.email) = lower(other.email)
              AND ((owner.id = $1 AND other.id = $2) OR (owner.id = $2 AND other.id = $1))
            "#,
        )
        .bind(a)
        .bind(b)
        .execute(conn)
        .await?;

        Ok(result.rows_affected())
    }

    pub async fn list_for_owner(pool: &PgPool, owner_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, CrmContact>(
            r#"
            SELECT id, owner_id, email, first_name, last_name, created_date
            FROM crm_contacts
            WHERE owner_id = $1
            ORDER BY created_date ASC
            "#,
        )
        .bind(owner_id)
        .fetch_all(pool)
        .await
    }
}
