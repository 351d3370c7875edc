//! Contact request state machine
//!
//! # State Machine
//!
//! ```text
//! sent → accepted
//!      → rejected
//! ```
//!
//! `accepted` and `rejected` are terminal. A `sent` request can also be
//! deleted by either party; the row is archived into
//! `contact_request_history` in the same transaction.
//!
//! When a user sends a request to someone who already has a `sent` request
//! pending towards them, the pending request is accepted instead of creating
//! a second one ([`SendOutcome::AutoAccepted`]).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use std::fmt;
use uuid::Uuid;

use super::account::AccountType;
use super::contact::{Contact, CrmContact};
use super::user::User;

/// Contact request status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "contact_request_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ContactRequestStatus {
    Sent,
    Accepted,
    Rejected,
}

impl ContactRequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContactRequestStatus::Sent => "sent",
            ContactRequestStatus::Accepted => "accepted",
            ContactRequestStatus::Rejected => "rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ContactRequestStatus::Sent)
    }

    /// Checks a transition against the state machine
    pub fn transition_to(
        self,
        next: ContactRequestStatus,
    ) -> Result<ContactRequestStatus, ContactError> {
        match (self, next) {
            (ContactRequestStatus::Sent, ContactRequestStatus::Accepted)
            | (ContactRequestStatus::Sent, ContactRequestStatus::Rejected) => Ok(next),
            (from, to) => Err(ContactError::InvalidTransition { from, to }),
        }
    }
}

impl fmt::Display for ContactRequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised by contact request operations
#[derive(Debug, thiserror::Error)]
pub enum ContactError {
    #[error("cannot send a contact request to yourself")]
    SelfRequest,

    #[error("account type {0} cannot send contact requests")]
    SenderNotAllowed(AccountType),

    #[error("sender not found")]
    SenderNotFound,

    #[error("recipient not found")]
    RecipientNotFound,

    #[error("contact request not found")]
    RequestNotFound,

    #[error("users are already contacts")]
    AlreadyContacts,

    #[error("a contact request to this user is already pending")]
    DuplicateRequest,

    #[error("only the recipient may answer a contact request")]
    NotRecipient,

    #[error("only the sender or the recipient may delete a contact request")]
    NotParticipant,

    #[error("cannot move a contact request from {from} to {to}")]
    InvalidTransition {
        from: ContactRequestStatus,
        to: ContactRequestStatus,
    },

    #[error("only pending contact requests can be deleted (status is {0})")]
    NotPending(ContactRequestStatus),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Contact request row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ContactRequest {
    pub id: Uuid,
    pub sent_by: Uuid,
    pub sent_to: Uuid,
    pub status: ContactRequestStatus,
    pub created_date: DateTime<Utc>,
    pub updated_date: DateTime<Utc>,
}

/// Result of sending a contact request
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SendOutcome {
    /// A new `sent` request waits for the recipient
    Pending(ContactRequest),

    /// The recipient had already asked; their request was accepted
    AutoAccepted {
        request: ContactRequest,
        contact: Contact,
    },
}

/// Which side of pending requests to list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestDirection {
    #[default]
    Incoming,
    Outgoing,
}

/// A pending request with the counterpart's details
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ContactRequestView {
    pub id: Uuid,
    pub sent_by: Uuid,
    pub sent_to: Uuid,
    pub status: ContactRequestStatus,
    pub created_date: DateTime<Utc>,
    pub other_user_id: Uuid,
    pub other_email: String,
    pub other_first_name: Option<String>,
    pub other_last_name: Option<String>,
}

/// Archived copy of a deleted request
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ContactRequestHistory {
    pub id: Uuid,
    pub request_id: Uuid,
    pub sent_by: Uuid,
    pub sent_to: Uuid,
    pub status: ContactRequestStatus,
    pub deleted_by: Option<Uuid>,
    pub requested_date: DateTime<Utc>,
    pub deleted_date: DateTime<Utc>,
}

impl ContactRequestHistory {
    pub async fn find_by_request(
        pool: &PgPool,
        request_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, ContactRequestHistory>(
            r#"
            SELECT id, request_id, sent_by, sent_to, status, deleted_by,
                   requested_date, deleted_date
            FROM contact_request_history
            WHERE request_id = $1
            ORDER BY deleted_date ASC
            "#,
        )
        .bind(request_id)
        .fetch_all(pool)
        .await
    }
}

const REQUEST_COLUMNS: &str = "id, sent_by, sent_to, status, created_date, updated_date";

impl ContactRequest {
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!("SELECT {REQUEST_COLUMNS} FROM contact_requests WHERE id = $1");

        sqlx::query_as::<_, ContactRequest>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    async fn lock(conn: &mut PgConnection, id: Uuid) -> Result<Self, ContactError> {
        let sql =
            format!("SELECT {REQUEST_COLUMNS} FROM contact_requests WHERE id = $1 FOR UPDATE");

        sqlx::query_as::<_, ContactRequest>(&sql)
            .bind(id)
            .fetch_optional(conn)
            .await?
            .ok_or(ContactError::RequestNotFound)
    }

    async fn find_pending(
        conn: &mut PgConnection,
        sent_by: Uuid,
        sent_to: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!(
            "SELECT {REQUEST_COLUMNS} FROM contact_requests \
             WHERE sent_by = $1 AND sent_to = $2 AND status = 'sent' \
             FOR UPDATE"
        );

        sqlx::query_as::<_, ContactRequest>(&sql)
            .bind(sent_by)
            .bind(sent_to)
            .fetch_optional(conn)
            .await
    }

    async fn set_status(
        conn: &mut PgConnection,
        id: Uuid,
        status: ContactRequestStatus,
    ) -> Result<Self, sqlx::Error> {
        let sql = format!(
            "UPDATE contact_requests SET status = $2, updated_date = NOW() \
             WHERE id = $1 RETURNING {REQUEST_COLUMNS}"
        );

        sqlx::query_as::<_, ContactRequest>(&sql)
            .bind(id)
            .bind(status)
            .fetch_one(conn)
            .await
    }

    /// Serializes sends between two users, in either direction, until commit
    ///
    /// Row locks cannot cover a request that does not exist yet.
    async fn lock_pair(conn: &mut PgConnection, a: Uuid, b: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query(
            "SELECT pg_advisory_xact_lock(hashtextextended(\
             LEAST($1::uuid, $2::uuid)::text || GREATEST($1::uuid, $2::uuid)::text, 0))",
        )
        .bind(a)
        .bind(b)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Accepts a locked request and connects both users
    async fn connect(
        conn: &mut PgConnection,
        request: &ContactRequest,
    ) -> Result<(Self, Contact), ContactError> {
        request.status.transition_to(ContactRequestStatus::Accepted)?;

        let accepted = Self::set_status(conn, request.id, ContactRequestStatus::Accepted).await?;
        let contact = Contact::create_for_pair(conn, request.sent_by, request.sent_to).await?;
        let removed = CrmContact::delete_shadows(conn, request.sent_by, request.sent_to).await?;

        tracing::debug!(
            request_id = %request.id,
            contact_id = %contact.id,
            crm_rows_removed = removed,
            "Contact request accepted"
        );

        Ok((accepted, contact))
    }

    /// Sends a contact request from `sender_id` to `recipient_id`
    ///
    /// # Errors
    ///
    /// - [`ContactError::SelfRequest`] when both ids are equal
    /// - [`ContactError::SenderNotAllowed`] for guest accounts
    /// - [`ContactError::RecipientNotFound`] for unknown, deleted or blocked recipients
    /// - [`ContactError::AlreadyContacts`] / [`ContactError::DuplicateRequest`]
    pub async fn send(
        pool: &PgPool,
        sender_id: Uuid,
        recipient_id: Uuid,
    ) -> Result<SendOutcome, ContactError> {
        if sender_id == recipient_id {
            return Err(ContactError::SelfRequest);
        }

        let users = User::find_active_by_ids(pool, &[sender_id, recipient_id]).await?;

        let sender = users
            .iter()
            .find(|u| u.id == sender_id)
            .ok_or(ContactError::SenderNotFound)?;
        if !sender.account_type.can_send_contact_requests() {
            return Err(ContactError::SenderNotAllowed(sender.account_type));
        }

        match users.iter().find(|u| u.id == recipient_id) {
            Some(recipient) if !recipient.account_blocked => {}
            _ => return Err(ContactError::RecipientNotFound),
        }

        let mut tx = pool.begin().await?;

        Self::lock_pair(&mut tx, sender_id, recipient_id).await?;

        if Contact::find_between(&mut tx, sender_id, recipient_id).await?.is_some() {
            return Err(ContactError::AlreadyContacts);
        }

        if Self::find_pending(&mut tx, sender_id, recipient_id).await?.is_some() {
            return Err(ContactError::DuplicateRequest);
        }

        if let Some(cross) = Self::find_pending(&mut tx, recipient_id, sender_id).await? {
            let (request, contact) = Self::connect(&mut tx, &cross).await?;
            tx.commit().await?;

            tracing::info!(
                request_id = %request.id,
                sent_by = %sender_id,
                sent_to = %recipient_id,
                "Cross contact request resolved by auto-accept"
            );

            return Ok(SendOutcome::AutoAccepted { request, contact });
        }

        let sql = format!(
            "INSERT INTO contact_requests (sent_by, sent_to) VALUES ($1, $2) \
             RETURNING {REQUEST_COLUMNS}"
        );
        let request = sqlx::query_as::<_, ContactRequest>(&sql)
            .bind(sender_id)
            .bind(recipient_id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(
            request_id = %request.id,
            sent_by = %sender_id,
            sent_to = %recipient_id,
            "Contact request sent"
        );

        Ok(SendOutcome::Pending(request))
    }

    /// Accepts a request; only its recipient may do so
    pub async fn accept(
        pool: &PgPool,
        id: Uuid,
        actor: Uuid,
    ) -> Result<(Self, Contact), ContactError> {
        let mut tx = pool.begin().await?;

        let request = Self::lock(&mut tx, id).await?;
        if request.sent_to != actor {
            return Err(ContactError::NotRecipient);
        }

        let (accepted, contact) = Self::connect(&mut tx, &request).await?;
        tx.commit().await?;

        Ok((accepted, contact))
    }

    /// Rejects a request; only its recipient may do so
    pub async fn reject(pool: &PgPool, id: Uuid, actor: Uuid) -> Result<Self, ContactError> {
        let mut tx = pool.begin().await?;

        let request = Self::lock(&mut tx, id).await?;
        if request.sent_to != actor {
            return Err(ContactError::NotRecipient);
        }

        let next = request.status.transition_to(ContactRequestStatus::Rejected)?;
        let rejected = Self::set_status(&mut tx, request.id, next).await?;
        tx.commit().await?;

        tracing::info!(request_id = %id, "Contact request rejected");

        Ok(rejected)
    }

    /// Deletes a pending request, archiving it into the history table
    pub async fn delete(
        pool: &PgPool,
        id: Uuid,
        actor: Uuid,
    ) -> Result<ContactRequestHistory, ContactError> {
        let mut tx = pool.begin().await?;

        let request = Self::lock(&mut tx, id).await?;
        if request.sent_by != actor && request.sent_to != actor {
            return Err(ContactError::NotParticipant);
        }
        if request.status != ContactRequestStatus::Sent {
            return Err(ContactError::NotPending(request.status));
        }

        let history = sqlx::query_as::<_, ContactRequestHistory>(
            r#"
            INSERT INTO contact_request_history
                (request_id, sent_by, sent_to, status, deleted_by, requested_date)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, request_id, sent_by, sent_to, status, deleted_by,
                      requested_date, deleted_date
            "#,
        )
        .bind(request.id)
        .bind(request.sent_by)
        .bind(request.sent_to)
        .bind(request.status)
        .bind(actor)
        .bind(request.created_date)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM contact_requests WHERE id = $1")
            .bind(request.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(request_id = %id, deleted_by = %actor, "Contact request deleted");

        Ok(history)
    }

    /// Pending requests addressed to (incoming) or sent by (outgoing) a user
    ///
    /// Requests whose counterpart was soft-deleted are hidden.
    pub async fn list_pending(
        pool: &PgPool,
        user_id: Uuid,
        direction: RequestDirection,
    ) -> Result<Vec<ContactRequestView>, sqlx::Error> {
        let (mine, theirs) = match direction {
            RequestDirection::Incoming => ("sent_to", "sent_by"),
            RequestDirection::Outgoing => ("sent_by", "sent_to"),
        };

        let sql = format!(
            r#"
            SELECT r.id, r.sent_by, r.sent_to, r.status, r.created_date,
                   u.id AS other_user_id, u.email AS other_email,
                   u.first_name AS other_first_name, u.last_name AS other_last_name
            FROM contact_requests r
            JOIN users u ON u.id = r.{theirs}
            WHERE r.{mine} = $1 AND r.status = 'sent' AND u.deleted = FALSE
            ORDER BY r.created_date DESC
            "#
        );

        sqlx::query_as::<_, ContactRequestView>(&sql)
            .bind(user_id)
            .fetch_all(pool)
            .await
    }
}
