/// Event-level permission checks
///
/// # Permission Model
///
/// 1. **Visibility**: a user may read an event (its parties and stats) when the
///    union query relates them to it, or when their account is a platform admin.
/// 2. **Editing**: the creator, any collaborator, and platform admins may edit
///    an event. Collaborators may not edit the collaborators list itself.
///
/// # Example
///
/// ```no_run
/// use corpnet_shared::auth::authorization::require_event_visible;
/// use corpnet_shared::auth::context::AuthContext;
/// use corpnet_shared::models::event::EventKind;
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// async fn check(pool: &PgPool, auth: &AuthContext, event_id: Uuid) -> Result<(), Box<dyn std::error::Error>> {
///     let event = require_event_visible(pool, auth, EventKind::Webinar, event_id).await?;
///     println!("{}", event.title);
///     Ok(())
/// }
/// ```

use sqlx::PgPool;
use uuid::Uuid;

use super::context::AuthContext;
use crate::models::event::{Event, EventKind};
use crate::models::party::{EventParties, PartyRole};

/// Error type for authorization checks
#[derive(Debug, thiserror::Error)]
pub enum AuthzError {
    #[error("Event not found")]
    EventNotFound,

    #[error("Not authorized to access this resource")]
    NotAuthorized,

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

/// Loads a non-deleted event
pub async fn require_event(
    pool: &PgPool,
    kind: EventKind,
    event_id: Uuid,
) -> Result<Event, AuthzError> {
    Event::find_by_id(pool, kind, event_id)
        .await?
        .filter(|event| !event.deleted)
        .ok_or(AuthzError::EventNotFound)
}

/// Loads an event the caller may read
///
/// Events the caller has no relation to are reported as not found, so their
/// existence does not leak.
pub async fn require_event_visible(
    pool: &PgPool,
    auth: &AuthContext,
    kind: EventKind,
    event_id: Uuid,
) -> Result<Event, AuthzError> {
    let event = require_event(pool, kind, event_id).await?;

    if auth.is_platform_admin() || Event::is_visible_to(pool, kind, event_id, auth.user_id).await? {
        Ok(event)
    } else {
        Err(AuthzError::EventNotFound)
    }
}

/// Whether the caller may edit `event`, optionally a specific party list
pub async fn can_edit_event(
    pool: &PgPool,
    auth: &AuthContext,
    kind: EventKind,
    event: &Event,
    list: Option<PartyRole>,
) -> Result<bool, sqlx::Error> {
    if auth.is_platform_admin() || event.created_by == auth.user_id {
        return Ok(true);
    }

    if list == Some(PartyRole::Collaborators) {
        return Ok(false);
    }

    EventParties::is_collaborator(pool, kind, event.id, auth.user_id).await
}

/// Fails with [`AuthzError::NotAuthorized`] unless the caller may edit `event`
pub async fn require_event_editor(
    pool: &PgPool,
    auth: &AuthContext,
    kind: EventKind,
    event: &Event,
) -> Result<(), AuthzError> {
    if can_edit_event(pool, auth, kind, event, None).await? {
        Ok(())
    } else {
        Err(AuthzError::NotAuthorized)
    }
}
