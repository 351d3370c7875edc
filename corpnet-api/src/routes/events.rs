/// Event listing endpoints, one generic implementation for every event kind
///
/// - `GET /v1/events/:kind?started_after&started_before&include_drafts&include_cancelled`
/// - `GET /v1/events/:kind/dashboard`
///
/// `:kind` is one of `corporate-access-events`, `webinars`, `webcasts`.
use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::parse_kind,
};
use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use corpnet_shared::{
    auth::context::AuthContext,
    models::event::{DashboardCounts, Event, EventFilter, EventSummary},
};

fn check_window(filter: &EventFilter) -> Result<(), ApiError> {
    match (filter.started_after, filter.started_before) {
        (Some(after), Some(before)) if after >= before => Err(ApiError::field(
            "started_before",
            "must be later than started_after",
        )),
        _ => Ok(()),
    }
}

/// Every event of the kind the caller created, was invited to, hosts,
/// participates in or collaborates on
pub async fn list_events(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(kind): Path<String>,
    Query(filter): Query<EventFilter>,
) -> ApiResult<Json<Vec<EventSummary>>> {
    let kind = parse_kind(&kind)?;
    check_window(&filter)?;

    let events = Event::list_for_user(&state.db, kind, auth.user_id, &filter).await?;

    tracing::debug!(kind = %kind, count = events.len(), "Listed events");
    Ok(Json(events))
}

pub async fn dashboard(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(kind): Path<String>,
) -> ApiResult<Json<DashboardCounts>> {
    let kind = parse_kind(&kind)?;
    let counts = Event::dashboard(&state.db, kind, auth.user_id).await?;
    Ok(Json(counts))
}
