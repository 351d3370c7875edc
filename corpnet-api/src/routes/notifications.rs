/// Notification endpoints
///
/// - `GET /v1/notifications?unread_only=true&limit=50`
/// - `POST /v1/notifications/:id/read`
use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use corpnet_shared::{auth::context::AuthContext, models::notification::Notification};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 200;

#[derive(Debug, Default, Deserialize)]
pub struct ListNotificationsQuery {
    #[serde(default)]
    pub unread_only: bool,

    pub limit: Option<i64>,
}

impl ListNotificationsQuery {
    fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }
}

#[derive(Debug, Serialize)]
pub struct NotificationList {
    pub notifications: Vec<Notification>,
    pub unread: i64,
}

pub async fn list_notifications(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<ListNotificationsQuery>,
) -> ApiResult<Json<NotificationList>> {
    let notifications = Notification::list_for_user(
        &state.db,
        auth.user_id,
        query.unread_only,
        query.limit(),
    )
    .await?;
    let unread = Notification::count_unread(&state.db, auth.user_id).await?;

    Ok(Json(NotificationList {
        notifications,
        unread,
    }))
}

pub async fn mark_read(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Notification>> {
    let notification = Notification::mark_read(&state.db, id, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Notification not found".to_string()))?;

    Ok(Json(notification))
}
