/// Contact and contact request endpoints
///
/// - `GET /v1/contacts` - the caller's contacts
/// - `GET /v1/contact-requests?direction=incoming|outgoing` - pending requests
/// - `POST /v1/contact-requests` - send a request (or auto-accept a crossing one)
/// - `POST /v1/contact-requests/:id/accept`
/// - `POST /v1/contact-requests/:id/reject`
/// - `DELETE /v1/contact-requests/:id` - withdraw or dismiss a pending request
use crate::{app::AppState, error::ApiResult};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use corpnet_shared::{
    auth::context::AuthContext,
    models::{
        contact::{Contact, ContactView},
        contact_request::{
            ContactRequest, ContactRequestView, RequestDirection, SendOutcome,
        },
        job::{Job, JobPayload},
    },
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct SendRequestBody {
    pub sent_to: Uuid,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListRequestsQuery {
    #[serde(default)]
    pub direction: RequestDirection,
}

#[derive(Debug, Serialize)]
pub struct AcceptResponse {
    pub request: ContactRequest,
    pub contact: Contact,
}

pub async fn list_contacts(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<ContactView>>> {
    let contacts = Contact::list_for_user(&state.db, auth.user_id).await?;
    Ok(Json(contacts))
}

pub async fn list_requests(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<ListRequestsQuery>,
) -> ApiResult<Json<Vec<ContactRequestView>>> {
    let requests = ContactRequest::list_pending(&state.db, auth.user_id, query.direction).await?;
    Ok(Json(requests))
}

/// Sends a contact request
///
/// Returns 201 with `{"outcome": "pending", ...}` for a new request, or
/// `{"outcome": "auto_accepted", "request": ..., "contact": ...}` when the
/// recipient had already sent one the other way.
pub async fn send_request(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(body): Json<SendRequestBody>,
) -> ApiResult<(StatusCode, Json<SendOutcome>)> {
    let outcome = ContactRequest::send(&state.db, auth.user_id, body.sent_to).await?;

    let follow_up = match &outcome {
        SendOutcome::Pending(request) => JobPayload::NotifyContactRequest {
            request_id: request.id,
        },
        SendOutcome::AutoAccepted { request, .. } => {
            JobPayload::NotifyContactAccepted { request_id: request.id }
        }
    };
    Job::enqueue_or_warn(&state.db, follow_up).await;

    Ok((StatusCode::CREATED, Json(outcome)))
}

pub async fn accept_request(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<AcceptResponse>> {
    let (request, contact) = ContactRequest::accept(&state.db, id, auth.user_id).await?;

    Job::enqueue_or_warn(
        &state.db,
        JobPayload::NotifyContactAccepted {
            request_id: request.id,
        },
    )
    .await;

    Ok(Json(AcceptResponse { request, contact }))
}

pub async fn reject_request(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ContactRequest>> {
    let request = ContactRequest::reject(&state.db, id, auth.user_id).await?;
    Ok(Json(request))
}

pub async fn delete_request(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    ContactRequest::delete(&state.db, id, auth.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
