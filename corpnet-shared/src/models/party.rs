//! Event party collections and sync-by-diff
//!
//! Every event kind has five party tables (invitees, hosts, participants,
//! rsvps, collaborators). A row names a registered user by `user_id`, or an
//! external person by `email` only. Email-only rows are attributed at read
//! time to the registered user with the same (case-insensitive) email.
//!
//! Replacing a list is done by diffing: [`plan_party_sync`] compares the
//! desired entries with the stored rows and yields the rows to insert and to
//! delete. Unchanged rows keep their ids and creation dates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::account::AccountType;
use super::event::{Event, EventKind};
use super::user::User;
use crate::auth::authorization::can_edit_event;
use crate::auth::context::AuthContext;

/// Party list of an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartyRole {
    Invitees,
    Hosts,
    Participants,
    Rsvps,
    Collaborators,
}

impl PartyRole {
    pub const ALL: [PartyRole; 5] = [
        PartyRole::Invitees,
        PartyRole::Hosts,
        PartyRole::Participants,
        PartyRole::Rsvps,
        PartyRole::Collaborators,
    ];

    /// URL segment and table suffix
    pub fn as_str(&self) -> &'static str {
        match self {
            PartyRole::Invitees => "invitees",
            PartyRole::Hosts => "hosts",
            PartyRole::Participants => "participants",
            PartyRole::Rsvps => "rsvps",
            PartyRole::Collaborators => "collaborators",
        }
    }

    /// Singular noun used in notification texts
    pub fn singular(&self) -> &'static str {
        match self {
            PartyRole::Invitees => "invitee",
            PartyRole::Hosts => "host",
            PartyRole::Participants => "participant",
            PartyRole::Rsvps => "attendee",
            PartyRole::Collaborators => "collaborator",
        }
    }

    /// Hosts and collaborators run the event rather than attend it
    pub fn is_organizer(&self) -> bool {
        matches!(self, PartyRole::Hosts | PartyRole::Collaborators)
    }

    /// Checks whether a user may sit on this list of an event
    ///
    /// Organizer lists take members of the owning account, or of any account
    /// type that may manage `kind`. Attendee lists follow the invitation rules
    /// of the account type.
    pub fn admits(
        &self,
        kind: EventKind,
        event_account_id: Uuid,
        account_id: Uuid,
        account_type: AccountType,
    ) -> Result<(), String> {
        let allowed = if self.is_organizer() {
            account_id == event_account_id || account_type.can_manage(kind)
        } else {
            account_type.can_be_invited_to(kind)
        };

        if allowed {
            Ok(())
        } else {
            Err(format!(
                "{} accounts cannot be {} of a {}",
                account_type,
                self.singular(),
                kind.label()
            ))
        }
    }
}

impl fmt::Display for PartyRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown party role: {0}")]
pub struct UnknownPartyRole(pub String);

impl FromStr for PartyRole {
    type Err = UnknownPartyRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PartyRole::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| UnknownPartyRole(s.to_string()))
    }
}

/// Errors raised while editing party lists
#[derive(Debug, thiserror::Error)]
pub enum PartyError {
    #[error("event not found")]
    EventNotFound,

    #[error("event is cancelled")]
    EventCancelled,

    #[error("not allowed to edit {0} of this event")]
    Forbidden(PartyRole),

    #[error("parties[{index}]: {message}")]
    InvalidParty { index: usize, message: String },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl PartyError {
    fn invalid(index: usize, message: impl Into<String>) -> Self {
        PartyError::InvalidParty {
            index,
            message: message.into(),
        }
    }
}

/// A party row resolved against the users table
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PartyView {
    pub id: Uuid,
    pub event_id: Uuid,

    /// Registered user, either stored or matched by email
    pub user_id: Option<Uuid>,

    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,

    /// True when the row itself only holds an email
    pub external: bool,

    pub created_date: DateTime<Utc>,
}

/// One entry of a desired party list
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyInput {
    pub user_id: Option<Uuid>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// A stored row as seen by the planner
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct ExistingParty {
    pub id: Uuid,
    pub user_id: Option<Uuid>,

    /// Lower-cased email of the row, or of its user for user rows
    pub email: Option<String>,
}

/// A desired entry after validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesiredParty {
    pub user_id: Option<Uuid>,

    /// Lower-cased email of the entry, or of the user for user entries
    pub email: Option<String>,

    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Rows to change so the stored list equals the desired one
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartySyncPlan {
    pub inserts: Vec<DesiredParty>,
    pub deletes: Vec<Uuid>,
    pub kept: Vec<Uuid>,
}

/// Diffs stored rows against the desired list
///
/// A desired user matches a row with the same `user_id`, or an email-only row
/// carrying that user's email. A desired email matches an email-only row with
/// the same email, or a user row whose user has that email. Each stored row
/// matches at most once and repeated desired entries collapse. A user entry
/// and an email-only entry for the same address collapse into the user entry.
pub fn plan_party_sync(existing: &[ExistingParty], desired: &[DesiredParty]) -> PartySyncPlan {
    let mut by_user: HashMap<Uuid, &ExistingParty> = HashMap::new();
    let mut email_rows: HashMap<&str, &ExistingParty> = HashMap::new();
    let mut user_rows_by_email: HashMap<&str, &ExistingParty> = HashMap::new();

    for row in existing {
        match (row.user_id, row.email.as_deref()) {
            (Some(user_id), email) => {
                by_user.insert(user_id, row);
                if let Some(email) = email {
                    user_rows_by_email.insert(email, row);
                }
            }
            (None, Some(email)) => {
                email_rows.insert(email, row);
            }
            (None, None) => {}
        }
    }

    let mut plan = PartySyncPlan::default();
    let mut matched: HashSet<Uuid> = HashSet::new();
    let mut seen_users: HashSet<Uuid> = HashSet::new();
    let mut seen_emails: HashSet<String> = HashSet::new();

    // Emails owned by user entries; an email-only entry for the same person
    // yields to the user entry wherever it appears in the list.
    let user_emails: HashSet<&str> = desired
        .iter()
        .filter(|entry| entry.user_id.is_some())
        .filter_map(|entry| entry.email.as_deref())
        .collect();

    for entry in desired {
        match (entry.user_id, entry.email.as_deref()) {
            (Some(user_id), _) => {
                if !seen_users.insert(user_id) {
                    continue;
                }
            }
            (None, Some(email)) => {
                if user_emails.contains(email) || !seen_emails.insert(email.to_string()) {
                    continue;
                }
            }
            (None, None) => {}
        }

        let found = match (entry.user_id, entry.email.as_deref()) {
            (Some(user_id), email) => by_user
                .get(&user_id)
                .or_else(|| email.and_then(|e| email_rows.get(e))),
            (None, Some(email)) => email_rows
                .get(email)
                .or_else(|| user_rows_by_email.get(email)),
            (None, None) => None,
        };

        match found {
            Some(row) if !matched.contains(&row.id) => {
                matched.insert(row.id);
                plan.kept.push(row.id);
            }
            _ => plan.inserts.push(entry.clone()),
        }
    }

    plan.deletes = existing
        .iter()
        .filter(|row| !matched.contains(&row.id))
        .map(|row| row.id)
        .collect();

    plan
}

/// Outcome of a sync, used to schedule follow-up jobs
#[derive(Debug, Clone, Default, Serialize)]
pub struct PartySyncOutcome {
    pub inserted: usize,
    pub deleted: usize,
    pub kept: usize,

    /// Registered users that were not on the list before
    pub added_user_ids: Vec<Uuid>,
}

fn normalize_email(email: &str) -> Option<String> {
    let email = email.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Some(email),
        _ => None,
    }
}

/// Reads and edits the party tables of one event kind
pub struct EventParties;

impl EventParties {
    /// Lists a party table, resolving email-only rows to registered users
    ///
    /// Rows that name a soft-deleted user are hidden.
    pub async fn list(
        pool: &PgPool,
        kind: EventKind,
        role: PartyRole,
        event_id: Uuid,
    ) -> Result<Vec<PartyView>, sqlx::Error> {
        let sql = format!(
            r#"
            SELECT p.id, p.event_id,
                   u.id AS user_id,
                   COALESCE(u.email, p.email) AS email,
                   COALESCE(p.first_name, u.first_name) AS first_name,
                   COALESCE(p.last_name, u.last_name) AS last_name,
                   (p.user_id IS NULL) AS external,
                   p.created_date
            FROM {table} p
            LEFT JOIN users u
              ON u.id = p.user_id
              OR (p.user_id IS NULL AND lower(u.email) = lower(p.email) AND u.deleted = FALSE)
            WHERE p.event_id = $1
              AND (p.user_id IS NULL OR u.deleted = FALSE)
            ORDER BY p.created_date ASC, p.id ASC
            "#,
            table = kind.party_table(role)
        );

        sqlx::query_as::<_, PartyView>(&sql)
            .bind(event_id)
            .fetch_all(pool)
            .await
    }

    /// Whether a user sits on the collaborators list, by id or by email
    pub async fn is_collaborator(
        pool: &PgPool,
        kind: EventKind,
        event_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let sql = format!(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM {table} p
                WHERE p.event_id = $1
                  AND (p.user_id = $2
                       OR (p.user_id IS NULL
                           AND lower(p.email) = (SELECT lower(email) FROM users WHERE id = $2)))
            )
            "#,
            table = kind.party_table(PartyRole::Collaborators)
        );

        sqlx::query_scalar::<_, bool>(&sql)
            .bind(event_id)
            .bind(user_id)
            .fetch_one(pool)
            .await
    }

    /// Validates the desired list and resolves user entries to their emails
    async fn resolve(
        pool: &PgPool,
        kind: EventKind,
        role: PartyRole,
        event: &Event,
        parties: &[PartyInput],
    ) -> Result<Vec<DesiredParty>, PartyError> {
        let ids: Vec<Uuid> = parties.iter().filter_map(|p| p.user_id).collect();
        let users = User::find_active_by_ids(pool, &ids).await?;
        let users: HashMap<Uuid, _> = users.into_iter().map(|u| (u.id, u)).collect();

        let mut desired = Vec::with_capacity(parties.len());

        for (index, party) in parties.iter().enumerate() {
            let entry = match (party.user_id, party.email.as_deref()) {
                (Some(user_id), _) => {
                    let user = users
                        .get(&user_id)
                        .ok_or_else(|| PartyError::invalid(index, "user not found"))?;
                    if user.account_blocked {
                        return Err(PartyError::invalid(index, "user account is blocked"));
                    }
                    role.admits(kind, event.account_id, user.account_id, user.account_type)
                        .map_err(|message| PartyError::invalid(index, message))?;
                    DesiredParty {
                        user_id: Some(user_id),
                        email: Some(user.email.to_lowercase()),
                        first_name: party.first_name.clone(),
                        last_name: party.last_name.clone(),
                    }
                }
                (None, Some(email)) => {
                    let email = normalize_email(email)
                        .ok_or_else(|| PartyError::invalid(index, "invalid email address"))?;
                    DesiredParty {
                        user_id: None,
                        email: Some(email),
                        first_name: party.first_name.clone(),
                        last_name: party.last_name.clone(),
                    }
                }
                (None, None) => {
                    return Err(PartyError::invalid(index, "either user_id or email is required"));
                }
            };
            desired.push(entry);
        }

        Ok(desired)
    }

    /// Replaces a party list with `parties`
    ///
    /// # Errors
    ///
    /// - [`PartyError::EventNotFound`] for unknown or deleted events
    /// - [`PartyError::EventCancelled`] for cancelled events
    /// - [`PartyError::Forbidden`] unless the actor is the creator, a
    ///   collaborator (except on the collaborators list) or an admin account
    /// - [`PartyError::InvalidParty`] for entries that fail validation
    pub async fn sync(
        pool: &PgPool,
        kind: EventKind,
        role: PartyRole,
        event_id: Uuid,
        parties: &[PartyInput],
        actor: &AuthContext,
    ) -> Result<PartySyncOutcome, PartyError> {
        let event = Event::find_by_id(pool, kind, event_id)
            .await?
            .filter(|e| !e.deleted)
            .ok_or(PartyError::EventNotFound)?;

        if event.cancelled {
            return Err(PartyError::EventCancelled);
        }

        if !can_edit_event(pool, actor, kind, &event, Some(role)).await? {
            return Err(PartyError::Forbidden(role));
        }

        let desired = Self::resolve(pool, kind, role, &event, parties).await?;
        let table = kind.party_table(role);

        let mut tx = pool.begin().await?;

        let existing = sqlx::query_as::<_, ExistingParty>(&format!(
            r#"
            SELECT p.id, p.user_id, lower(COALESCE(u.email, p.email)) AS email
            FROM {table} p
            LEFT JOIN users u ON u.id = p.user_id
            WHERE p.event_id = $1
            FOR UPDATE OF p
            "#
        ))
        .bind(event_id)
        .fetch_all(&mut *tx)
        .await?;

        let plan = plan_party_sync(&existing, &desired);

        let previous_users: HashSet<Uuid> = existing.iter().filter_map(|row| row.user_id).collect();

        if !plan.deletes.is_empty() {
            sqlx::query(&format!("DELETE FROM {table} WHERE id = ANY($1)"))
                .bind(&plan.deletes)
                .execute(&mut *tx)
                .await?;
        }

        let insert_sql = format!(
            "INSERT INTO {table} (event_id, user_id, email, first_name, last_name, created_by) \
             VALUES ($1, $2, $3, $4, $5, $6)"
        );
        for entry in &plan.inserts {
            let email = if entry.user_id.is_some() { None } else { entry.email.as_deref() };
            sqlx::query(&insert_sql)
                .bind(event_id)
                .bind(entry.user_id)
                .bind(email)
                .bind(entry.first_name.as_deref())
                .bind(entry.last_name.as_deref())
                .bind(actor.user_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        let added_user_ids = plan
            .inserts
            .iter()
            .filter_map(|entry| entry.user_id)
            .filter(|id| !previous_users.contains(id))
            .collect();

        let outcome = PartySyncOutcome {
            inserted: plan.inserts.len(),
            deleted: plan.deletes.len(),
            kept: plan.kept.len(),
            added_user_ids,
        };

        tracing::info!(
            kind = %kind,
            role = %role,
            event_id = %event_id,
            inserted = outcome.inserted,
            deleted = outcome.deleted,
            kept = outcome.kept,
            "Party list synced"
        );

        Ok(outcome)
    }
}
