//! Per-event counters and engagements
//!
//! `<kind>_stats` holds one row per event with denormalised counts of its
//! party lists and engagements. [`EventStats::recompute`] rebuilds the row
//! from scratch in a single statement, so running it twice without changes in
//! between yields the same counts and concurrent runs simply overwrite each
//! other with equally fresh values.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use super::event::EventKind;
use super::party::PartyRole;

/// Engagement recorded against an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "engagement_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EngagementType {
    Answer,
    Attendee,
    Chat,
    Question,
    File,
}

impl EngagementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngagementType::Answer => "answer",
            EngagementType::Attendee => "attendee",
            EngagementType::Chat => "chat",
            EngagementType::Question => "question",
            EngagementType::File => "file",
        }
    }
}

/// Engagement row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Engagement {
    pub id: Uuid,
    pub event_id: Uuid,
    pub user_id: Option<Uuid>,
    pub engagement_type: EngagementType,
    pub created_date: DateTime<Utc>,
}

impl Engagement {
    pub async fn record(
        pool: &PgPool,
        kind: EventKind,
        event_id: Uuid,
        user_id: Option<Uuid>,
        engagement_type: EngagementType,
    ) -> Result<Self, sqlx::Error> {
        let sql = format!(
            r#"
            INSERT INTO {} (event_id, user_id, engagement_type)
            VALUES ($1, $2, $3)
            RETURNING id, event_id, user_id, engagement_type, created_date
            "#,
            kind.engagement_table()
        );

        sqlx::query_as::<_, Engagement>(&sql)
            .bind(event_id)
            .bind(user_id)
            .bind(engagement_type)
            .fetch_one(pool)
            .await
    }
}

/// Stats row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct EventStats {
    pub event_id: Uuid,
    pub answers: i64,
    pub attendees: i64,
    pub chats: i64,
    pub collaborators: i64,
    pub files: i64,
    pub hosts: i64,
    pub invitees: i64,
    pub participants: i64,
    pub questions: i64,
    pub rsvps: i64,
    pub updated_date: DateTime<Utc>,
}

impl EventStats {
    /// Counters only, for comparing two snapshots
    pub fn counts(&self) -> [i64; 10] {
        [
            self.answers,
            self.attendees,
            self.chats,
            self.collaborators,
            self.files,
            self.hosts,
            self.invitees,
            self.participants,
            self.questions,
            self.rsvps,
        ]
    }
}

const STATS_COLUMNS: &str = "event_id, answers, attendees, chats, collaborators, files, hosts, \
     invitees, participants, questions, rsvps, updated_date";

/// Builds the recompute upsert for one kind
pub fn recompute_sql(kind: EventKind) -> String {
    let engagement = |t: EngagementType| {
        format!(
            "(SELECT COUNT(*) FROM {} WHERE event_id = $1 AND engagement_type = '{}')",
            kind.engagement_table(),
            t.as_str()
        )
    };

    // Rows naming a soft-deleted user are hidden from party lists, so they
    // are not counted either.
    let party = |role: PartyRole| {
        format!(
            "(SELECT COUNT(*) FROM {} p LEFT JOIN users u ON u.id = p.user_id \
             WHERE p.event_id = $1 AND (p.user_id IS NULL OR u.deleted = FALSE))",
            kind.party_table(role)
        )
    };

    format!(
        r#"
        INSERT INTO {stats} (event_id, answers, attendees, chats, collaborators, files, hosts,
                             invitees, participants, questions, rsvps, updated_date)
        SELECT e.id, {answers}, {attendees}, {chats}, {collaborators}, {files}, {hosts},
               {invitees}, {participants}, {questions}, {rsvps}, NOW()
        FROM {events} e
        WHERE e.id = $1
        ON CONFLICT (event_id) DO UPDATE
           SET answers = EXCLUDED.answers,
               attendees = EXCLUDED.attendees,
               chats = EXCLUDED.chats,
               collaborators = EXCLUDED.collaborators,
               files = EXCLUDED.files,
               hosts = EXCLUDED.hosts,
               invitees = EXCLUDED.invitees,
               participants = EXCLUDED.participants,
               questions = EXCLUDED.questions,
               rsvps = EXCLUDED.rsvps,
               updated_date = EXCLUDED.updated_date
        RETURNING {STATS_COLUMNS}
        "#,
        stats = kind.stats_table(),
        events = kind.table(),
        answers = engagement(EngagementType::Answer),
        attendees = engagement(EngagementType::Attendee),
        chats = engagement(EngagementType::Chat),
        collaborators = party(PartyRole::Collaborators),
        files = engagement(EngagementType::File),
        hosts = party(PartyRole::Hosts),
        invitees = party(PartyRole::Invitees),
        participants = party(PartyRole::Participants),
        questions = engagement(EngagementType::Question),
        rsvps = party(PartyRole::Rsvps),
    )
}

impl EventStats {
    /// Recounts everything for one event and overwrites its stats row
    ///
    /// Returns `None` if the event does not exist.
    pub async fn recompute(
        pool: &PgPool,
        kind: EventKind,
        event_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let stats = sqlx::query_as::<_, EventStats>(&recompute_sql(kind))
            .bind(event_id)
            .fetch_optional(pool)
            .await?;

        if let Some(stats) = &stats {
            tracing::debug!(
                kind = %kind,
                event_id = %event_id,
                invitees = stats.invitees,
                rsvps = stats.rsvps,
                "Event stats recomputed"
            );
        }

        Ok(stats)
    }

    /// Current stats row, `None` until the first recompute
    pub async fn find(
        pool: &PgPool,
        kind: EventKind,
        event_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!(
            "SELECT {STATS_COLUMNS} FROM {} WHERE event_id = $1",
            kind.stats_table()
        );

        sqlx::query_as::<_, EventStats>(&sql)
            .bind(event_id)
            .fetch_optional(pool)
            .await
    }
}
