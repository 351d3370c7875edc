/// Event stats endpoints
///
/// - `GET /v1/events/:kind/:id/stats` - stored counters, computed on first read
/// - `POST /v1/events/:kind/:id/stats/refresh` - schedule a recount, 202
use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::parse_kind,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use corpnet_shared::{
    auth::{
        authorization::{require_event_editor, require_event_visible},
        context::AuthContext,
    },
    models::{
        job::{Job, JobPayload},
        stats::EventStats,
    },
};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub job_id: Uuid,
}

pub async fn get_stats(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path((kind, event_id)): Path<(String, Uuid)>,
) -> ApiResult<Json<EventStats>> {
    let kind = parse_kind(&kind)?;
    require_event_visible(&state.db, &auth, kind, event_id).await?;

    let stats = match EventStats::find(&state.db, kind, event_id).await? {
        Some(stats) => stats,
        None => EventStats::recompute(&state.db, kind, event_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Event not found".to_string()))?,
    };

    Ok(Json(stats))
}

pub async fn refresh_stats(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path((kind, event_id)): Path<(String, Uuid)>,
) -> ApiResult<(StatusCode, Json<RefreshResponse>)> {
    let kind = parse_kind(&kind)?;
    let event = require_event_visible(&state.db, &auth, kind, event_id).await?;
    require_event_editor(&state.db, &auth, kind, &event).await?;

    let job = Job::enqueue(&state.db, &JobPayload::UpdateEventStats { kind, event_id }).await?;

    Ok((StatusCode::ACCEPTED, Json(RefreshResponse { job_id: job.id })))
}
