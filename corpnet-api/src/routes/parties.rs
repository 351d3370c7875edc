/// Party list endpoints
///
/// - `GET /v1/events/:kind/:id/parties/:role`
/// - `PUT /v1/events/:kind/:id/parties/:role` - replace the list
///
/// `:role` is one of `invitees`, `hosts`, `participants`, `rsvps`,
/// `collaborators`.
///
/// A PUT sends the complete desired list. Rows are diffed against the stored
/// ones so unchanged entries keep their ids and creation dates. Once the change
/// is committed, a stats recount is scheduled and newly added registered users
/// are notified.
use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::parse_kind,
};
use axum::{
    extract::{Path, State},
    Extension, Json,
};
use corpnet_shared::{
    auth::{authorization::require_event_visible, context::AuthContext},
    models::{
        job::{Job, JobPayload},
        party::{EventParties, PartyInput, PartyRole, PartySyncOutcome, PartyView},
    },
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Largest list accepted in one PUT
pub const MAX_PARTIES: usize = 1000;
const MAX_PARTIES_U64: u64 = MAX_PARTIES as u64;

#[derive(Debug, Deserialize, Validate)]
pub struct ReplacePartiesRequest {
    #[validate(length(max = MAX_PARTIES_U64, message = "Too many parties in one list"))]
    pub parties: Vec<PartyInput>,
}

#[derive(Debug, Serialize)]
pub struct ReplacePartiesResponse {
    #[serde(flatten)]
    pub outcome: PartySyncOutcome,

    pub parties: Vec<PartyView>,
}

fn parse_role(raw: &str) -> Result<PartyRole, ApiError> {
    raw.parse::<PartyRole>()
        .map_err(|e| ApiError::BadRequest(e.to_string()))
}

pub async fn list_parties(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path((kind, event_id, role)): Path<(String, Uuid, String)>,
) -> ApiResult<Json<Vec<PartyView>>> {
    let kind = parse_kind(&kind)?;
    let role = parse_role(&role)?;

    require_event_visible(&state.db, &auth, kind, event_id).await?;

    let parties = EventParties::list(&state.db, kind, role, event_id).await?;
    Ok(Json(parties))
}

pub async fn replace_parties(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path((kind, event_id, role)): Path<(String, Uuid, String)>,
    Json(body): Json<ReplacePartiesRequest>,
) -> ApiResult<Json<ReplacePartiesResponse>> {
    let kind = parse_kind(&kind)?;
    let role = parse_role(&role)?;
    body.validate()?;

    let outcome = EventParties::sync(&state.db, kind, role, event_id, &body.parties, &auth).await?;

    if outcome.inserted > 0 || outcome.deleted > 0 {
        Job::enqueue_or_warn(&state.db, JobPayload::UpdateEventStats { kind, event_id }).await;
    }

    if !outcome.added_user_ids.is_empty() {
        Job::enqueue_or_warn(
            &state.db,
            JobPayload::NotifyEventParties {
                kind,
                event_id,
                role,
                user_ids: outcome.added_user_ids.clone(),
            },
        )
        .await;
    }

    let parties = EventParties::list(&state.db, kind, role, event_id).await?;

    Ok(Json(ReplacePartiesResponse { outcome, parties }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_role() {
        assert_eq!(parse_role("rsvps").unwrap(), PartyRole::Rsvps);
        assert!(matches!(parse_role("speakers"), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn test_oversized_list_rejected() {
        let body = ReplacePartiesRequest {
            parties: vec![PartyInput::default(); MAX_PARTIES + 1],
        };
        assert!(body.validate().is_err());

        let body = ReplacePartiesRequest {
            parties: vec![PartyInput::default(); MAX_PARTIES],
        };
        assert!(body.validate().is_ok());
    }

    #[test]
    fn test_body_accepts_mixed_entries() {
        let body: ReplacePartiesRequest = serde_json::from_str(
            r#"{"parties":[{"user_id":"6f1c1f8e-3b0a-4a51-9a43-0a6c1f7d2b10"},{"email":"guest@example.com","first_name":"Sam"}]}"#,
        )
        .unwrap();

        assert_eq!(body.parties.len(), 2);
        assert!(body.parties[0].user_id.is_some());
        assert_eq!(body.parties[1].email.as_deref(), Some("guest@example.com"));
    }
}
