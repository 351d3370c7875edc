//! Event kinds, events and the union query over a user's relations
//!
//! Corporate access events, webinars and webcasts share one table shape:
//! an event table, five party tables, an engagement table and a stats table.
//! [`EventKind`] maps each kind to its tables so every operation in this
//! crate is written once for all three.
//!
//! # Union query
//!
//! A user relates to an event as its creator, or through one of the party
//! tables as invitee, host, participant or collaborator. Party rows may hold
//! only an email (an external party); such rows count for a registered user
//! whose email matches case-insensitively. [`Event::list_for_user`] unions
//! every branch, keeps only events whose owning account is visible, and
//! aggregates the relations per event.
//!
//! Drafts are only ever returned through the creator and collaborator
//! branches; deleted events never.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::party::PartyRole;

/// The three event families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    #[serde(rename = "corporate-access-events")]
    CorporateAccessEvent,
    #[serde(rename = "webinars")]
    Webinar,
    #[serde(rename = "webcasts")]
    Webcast,
}

impl EventKind {
    pub const ALL: [EventKind; 3] = [
        EventKind::CorporateAccessEvent,
        EventKind::Webinar,
        EventKind::Webcast,
    ];

    /// URL segment and wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::CorporateAccessEvent => "corporate-access-events",
            EventKind::Webinar => "webinars",
            EventKind::Webcast => "webcasts",
        }
    }

    /// Main event table
    pub fn table(&self) -> &'static str {
        match self {
            EventKind::CorporateAccessEvent => "corporate_access_events",
            EventKind::Webinar => "webinars",
            EventKind::Webcast => "webcasts",
        }
    }

    pub fn party_table(&self, role: PartyRole) -> String {
        format!("{}_{}", self.table(), role.as_str())
    }

    pub fn engagement_table(&self) -> String {
        format!("{}_engagements", self.table())
    }

    pub fn stats_table(&self) -> String {
        format!("{}_stats", self.table())
    }

    /// Human readable label used in notification texts
    pub fn label(&self) -> &'static str {
        match self {
            EventKind::CorporateAccessEvent => "corporate access event",
            EventKind::Webinar => "webinar",
            EventKind::Webcast => "webcast",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown event kind
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown event kind: {0}")]
pub struct UnknownEventKind(pub String);

impl FromStr for EventKind {
    type Err = UnknownEventKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownEventKind(s.to_string()))
    }
}

/// How a user relates to an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventRelation {
    Creator,
    Invitee,
    Host,
    Participant,
    Collaborator,
}

impl EventRelation {
    pub const ALL: [EventRelation; 5] = [
        EventRelation::Creator,
        EventRelation::Invitee,
        EventRelation::Host,
        EventRelation::Participant,
        EventRelation::Collaborator,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventRelation::Creator => "creator",
            EventRelation::Invitee => "invitee",
            EventRelation::Host => "host",
            EventRelation::Participant => "participant",
            EventRelation::Collaborator => "collaborator",
        }
    }

    /// Party table backing this relation, `None` for the creator branch
    pub fn party_role(&self) -> Option<PartyRole> {
        match self {
            EventRelation::Creator => None,
            EventRelation::Invitee => Some(PartyRole::Invitees),
            EventRelation::Host => Some(PartyRole::Hosts),
            EventRelation::Participant => Some(PartyRole::Participants),
            EventRelation::Collaborator => Some(PartyRole::Collaborators),
        }
    }

    /// Whether this branch may surface draft events
    pub fn sees_drafts(&self) -> bool {
        matches!(self, EventRelation::Creator | EventRelation::Collaborator)
    }
}

/// Event row (identical shape for every kind)
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Event {
    pub id: Uuid,
    pub account_id: Uuid,
    pub created_by: Uuid,
    pub updated_by: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub is_draft: bool,
    pub cancelled: bool,
    pub deleted: bool,
    pub created_date: DateTime<Utc>,
    pub updated_date: DateTime<Utc>,
}

/// Input for creating an event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateEvent {
    pub account_id: Uuid,
    pub created_by: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub is_draft: bool,
}

const EVENT_COLUMNS: &str = "id, account_id, created_by, updated_by, title, description, \
     started_at, ended_at, is_draft, cancelled, deleted, created_date, updated_date";

/// Filters for the union query
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventFilter {
    /// Only events starting at or after this instant
    pub started_after: Option<DateTime<Utc>>,

    /// Only events starting strictly before this instant
    pub started_before: Option<DateTime<Utc>>,

    #[serde(default)]
    pub include_drafts: bool,

    #[serde(default)]
    pub include_cancelled: bool,
}

impl EventFilter {
    /// Filter that keeps every non-deleted event, used for counts and visibility
    pub fn everything() -> Self {
        EventFilter {
            include_drafts: true,
            include_cancelled: true,
            ..Default::default()
        }
    }
}

/// One row of the union query: an event and every way the user relates to it
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct EventSummary {
    pub id: Uuid,
    pub account_id: Uuid,
    pub created_by: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub is_draft: bool,
    pub cancelled: bool,
    pub company_name: Option<String>,
    pub relations: Vec<String>,
}

impl EventSummary {
    pub fn has_relation(&self, relation: EventRelation) -> bool {
        self.relations.iter().any(|r| r == relation.as_str())
    }
}

/// Dashboard counters over the union query
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct DashboardCounts {
    pub total: i64,
    pub upcoming: i64,
    pub ongoing: i64,
    pub completed: i64,
    pub drafts: i64,
    pub cancelled: i64,
}

/// Pushes the grouped union query (one row per event) onto `qb`
///
/// Only closed enum values reach the SQL text; the user id, event id and
/// time bounds are bound parameters.
fn push_related_events(
    qb: &mut QueryBuilder<'_, Postgres>,
    kind: EventKind,
    user_id: Uuid,
    filter: &EventFilter,
    only_event: Option<Uuid>,
) {
    let table = kind.table();

    qb.push("WITH me AS (SELECT id, lower(email) AS email FROM users WHERE id = ");
    qb.push_bind(user_id);
    qb.push(" AND deleted = FALSE), related AS (");

    for (i, relation) in EventRelation::ALL.iter().enumerate() {
        if i > 0 {
            qb.push(" UNION ALL ");
        }

        match relation.party_role() {
            None => {
                qb.push(format!(
                    "SELECT e.id AS event_id, '{}'::text AS relation \
                     FROM {table} e JOIN me ON e.created_by = me.id",
                    relation.as_str()
                ));
            }
            Some(role) => {
                qb.push(format!(
                    "SELECT p.event_id, '{}'::text AS relation \
                     FROM {} p JOIN me ON p.user_id = me.id \
                     OR (p.user_id IS NULL AND lower(p.email) = me.email)",
                    relation.as_str(),
                    kind.party_table(role)
                ));
            }
        }
    }

    qb.push(format!(
        ") SELECT e.id, e.account_id, e.created_by, e.title, e.description, \
         e.started_at, e.ended_at, e.is_draft, e.cancelled, ap.company_name, \
         array_agg(DISTINCT r.relation ORDER BY r.relation) AS relations \
         FROM related r \
         JOIN {table} e ON e.id = r.event_id \
         JOIN accounts a ON a.id = e.account_id \
         LEFT JOIN account_profiles ap ON ap.account_id = a.id \
         WHERE e.deleted = FALSE \
         AND a.is_active = TRUE AND a.blocked = FALSE AND a.deleted = FALSE"
    ));

    if filter.include_drafts {
        let draft_branches: Vec<String> = EventRelation::ALL
            .iter()
            .filter(|r| r.sees_drafts())
            .map(|r| format!("'{}'", r.as_str()))
            .collect();
        qb.push(format!(
            " AND (e.is_draft = FALSE OR r.relation IN ({}))",
            draft_branches.join(", ")
        ));
    } else {
        qb.push(" AND e.is_draft = FALSE");
    }

    if !filter.include_cancelled {
        qb.push(" AND e.cancelled = FALSE");
    }

    if let Some(after) = filter.started_after {
        qb.push(" AND e.started_at >= ");
        qb.push_bind(after);
    }

    if let Some(before) = filter.started_before {
        qb.push(" AND e.started_at < ");
        qb.push_bind(before);
    }

    if let Some(event_id) = only_event {
        qb.push(" AND e.id = ");
        qb.push_bind(event_id);
    }

    qb.push(" GROUP BY e.id, ap.company_name");
}

/// Builds the list query: related events ordered by start time
pub fn list_query(
    kind: EventKind,
    user_id: Uuid,
    filter: &EventFilter,
) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new("");
    push_related_events(&mut qb, kind, user_id, filter, None);
    qb.push(" ORDER BY e.started_at ASC, e.id ASC");
    qb
}

/// Builds the dashboard query: counters over every related event
pub fn dashboard_query(kind: EventKind, user_id: Uuid) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(
        "SELECT COUNT(*) AS total, \
         COUNT(*) FILTER (WHERE NOT ev.is_draft AND NOT ev.cancelled \
             AND ev.started_at > NOW()) AS upcoming, \
         COUNT(*) FILTER (WHERE NOT ev.is_draft AND NOT ev.cancelled \
             AND ev.started_at <= NOW() AND ev.ended_at >= NOW()) AS ongoing, \
         COUNT(*) FILTER (WHERE NOT ev.is_draft AND NOT ev.cancelled \
             AND ev.ended_at < NOW()) AS completed, \
         COUNT(*) FILTER (WHERE ev.is_draft) AS drafts, \
         COUNT(*) FILTER (WHERE ev.cancelled) AS cancelled \
         FROM (",
    );
    push_related_events(&mut qb, kind, user_id, &EventFilter::everything(), None);
    qb.push(") ev");
    qb
}

impl Event {
    /// Creates an event of `kind`
    pub async fn create(
        pool: &PgPool,
        kind: EventKind,
        data: CreateEvent,
    ) -> Result<Self, sqlx::Error> {
        let sql = format!(
            r#"
            INSERT INTO {}
                (account_id, created_by, title, description, started_at, ended_at, is_draft)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {EVENT_COLUMNS}
            "#,
            kind.table()
        );

        sqlx::query_as::<_, Event>(&sql)
            .bind(data.account_id)
            .bind(data.created_by)
            .bind(data.title)
            .bind(data.description)
            .bind(data.started_at)
            .bind(data.ended_at)
            .bind(data.is_draft)
            .fetch_one(pool)
            .await
    }

    /// Finds an event by ID, including deleted and cancelled ones
    pub async fn find_by_id(
        pool: &PgPool,
        kind: EventKind,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!("SELECT {EVENT_COLUMNS} FROM {} WHERE id = $1", kind.table());

        sqlx::query_as::<_, Event>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Marks an event cancelled
    pub async fn cancel(
        pool: &PgPool,
        kind: EventKind,
        id: Uuid,
        actor: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let sql = format!(
            "UPDATE {} SET cancelled = TRUE, updated_by = $2, updated_date = NOW() \
             WHERE id = $1 AND deleted = FALSE",
            kind.table()
        );

        let result = sqlx::query(&sql).bind(id).bind(actor).execute(pool).await?;
        Ok(result.rows_affected() > 0)
    }

    /// Soft-deletes an event; party rows and stats stay in place
    pub async fn soft_delete(
        pool: &PgPool,
        kind: EventKind,
        id: Uuid,
        actor: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let sql = format!(
            "UPDATE {} SET deleted = TRUE, updated_by = $2, updated_date = NOW() \
             WHERE id = $1 AND deleted = FALSE",
            kind.table()
        );

        let result = sqlx::query(&sql).bind(id).bind(actor).execute(pool).await?;
        Ok(result.rows_affected() > 0)
    }

    /// Every event of `kind` the user relates to, with the relations aggregated
    pub async fn list_for_user(
        pool: &PgPool,
        kind: EventKind,
        user_id: Uuid,
        filter: &EventFilter,
    ) -> Result<Vec<EventSummary>, sqlx::Error> {
        let mut qb = list_query(kind, user_id, filter);
        qb.build_query_as::<EventSummary>().fetch_all(pool).await
    }

    /// Dashboard counters over the same union
    pub async fn dashboard(
        pool: &PgPool,
        kind: EventKind,
        user_id: Uuid,
    ) -> Result<DashboardCounts, sqlx::Error> {
        let mut qb = dashboard_query(kind, user_id);
        qb.build_query_as::<DashboardCounts>().fetch_one(pool).await
    }

    /// Whether `user_id` relates to the event through any branch
    pub async fn is_visible_to(
        pool: &PgPool,
        kind: EventKind,
        event_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let mut qb = QueryBuilder::new("");
        push_related_events(&mut qb, kind, user_id, &EventFilter::everything(), Some(event_id));

        let row = qb.build_query_as::<EventSummary>().fetch_optional(pool).await?;
        Ok(row.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_kind_round_trips_through_path_segment() {
        for kind in EventKind::ALL {
            assert_eq!(kind.as_str().parse::<EventKind>().unwrap(), kind);
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
        assert!("meetings".parse::<EventKind>().is_err());
    }

    #[test]
    fn test_kind_tables() {
        assert_eq!(EventKind::CorporateAccessEvent.table(), "corporate_access_events");
        assert_eq!(
            EventKind::Webinar.party_table(PartyRole::Invitees),
            "webinars_invitees"
        );
        assert_eq!(EventKind::Webcast.stats_table(), "webcasts_stats");
        assert_eq!(EventKind::Webcast.engagement_table(), "webcasts_engagements");
    }

    #[test]
    fn test_list_query_has_every_branch() {
        let qb = list_query(EventKind::Webinar, Uuid::new_v4(), &EventFilter::default());
        let sql = qb.sql();

        assert_eq!(sql.matches("UNION ALL").count(), 4);
        for table in [
            "webinars_invitees",
            "webinars_hosts",
            "webinars_participants",
            "webinars_collaborators",
        ] {
            assert!(sql.contains(table), "missing branch {table}");
        }
        assert!(!sql.contains("webinars_rsvps"));
        assert!(sql.contains("lower(p.email) = me.email"));
        assert!(sql.contains("a.blocked = FALSE"));
        assert!(sql.contains("e.deleted = FALSE"));
    }

    #[test]
    fn test_default_filter_hides_drafts_and_cancelled() {
        let qb = list_query(EventKind::Webcast, Uuid::new_v4(), &EventFilter::default());
        let sql = qb.sql();

        assert!(sql.contains("AND e.is_draft = FALSE AND e.cancelled = FALSE GROUP BY"));
        assert!(!sql.contains("r.relation IN"));
    }

    #[test]
    fn test_drafts_only_through_creator_and_collaborator() {
        let filter = EventFilter {
            include_drafts: true,
            include_cancelled: true,
            ..Default::default()
        };
        let qb = list_query(EventKind::CorporateAccessEvent, Uuid::new_v4(), &filter);
        let sql = qb.sql();

        assert!(sql.contains("r.relation IN ('creator', 'collaborator')"));
        assert!(!sql.contains("e.cancelled = FALSE"));
    }

    #[test]
    fn test_time_bounds_are_bound_parameters() {
        let filter = EventFilter {
            started_after: Some(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()),
            started_before: Some(Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap()),
            ..Default::default()
        };
        let qb = list_query(EventKind::Webinar, Uuid::new_v4(), &filter);
        let sql = qb.sql();

        assert!(sql.contains("e.started_at >= $2"));
        assert!(sql.contains("e.started_at < $3"));
        assert!(!sql.contains("2025"));
    }

    #[test]
    fn test_dashboard_wraps_union() {
        let qb = dashboard_query(EventKind::Webinar, Uuid::new_v4());
        let sql = qb.sql();

        assert!(sql.starts_with("SELECT COUNT(*) AS total"));
        assert!(sql.contains("AS upcoming"));
        assert!(sql.trim_end().ends_with(") ev"));
    }

    #[test]
    fn test_summary_relations() {
        let summary = EventSummary {
            id: Uuid::new_v4(),
            account_id: Uuid::new_v4(),
            created_by: Uuid::new_v4(),
            title: "Q3 results".to_string(),
            description: None,
            started_at: Utc::now(),
            ended_at: Utc::now(),
            is_draft: false,
            cancelled: false,
            company_name: Some("Acme".to_string()),
            relations: vec!["creator".to_string(), "host".to_string()],
        };

        assert!(summary.has_relation(EventRelation::Host));
        assert!(!summary.has_relation(EventRelation::Invitee));
    }
}
