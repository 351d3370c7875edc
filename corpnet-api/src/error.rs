/// Error handling for the API server
///
/// Every handler returns `ApiResult<T>`. Domain errors from the shared crate
/// convert into `ApiError` with `?`, and `ApiError` renders as:
///
/// ```json
/// { "error": "validation_error", "message": "...", "details": [{ "field": "sent_to", "message": "..." }] }
/// ```
///
/// Integrity violations raised by Postgres (unique, foreign key, check, not
/// null) are client errors: they map to 422 with the offending column as the
/// detail field.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use corpnet_shared::auth::authorization::AuthzError;
use corpnet_shared::auth::jwt::JwtError;
use corpnet_shared::db::offending_column;
use corpnet_shared::models::contact_request::ContactError;
use corpnet_shared::models::party::PartyError;
use serde::{Deserialize, Serialize};
use sqlx::error::ErrorKind;
use sqlx::postgres::PgDatabaseError;
use std::fmt;

/// API result type alias
pub type ApiResult<T> = Result<T, ApiError>;

/// Unified API error type
#[derive(Debug)]
pub enum ApiError {
    /// Bad request (400)
    BadRequest(String),

    /// Unauthorized (401)
    Unauthorized(String),

    /// Forbidden (403)
    Forbidden(String),

    /// Not found (404)
    NotFound(String),

    /// Unprocessable entity (422): validation errors and integrity violations
    ValidationError(Vec<ValidationErrorDetail>),

    /// Internal server error (500)
    InternalError(String),

    /// Service unavailable (503)
    ServiceUnavailable(String),
}

/// Validation error detail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrorDetail {
    pub field: String,
    pub message: String,
}

/// Error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code (e.g., "bad_request", "unauthorized")
    pub error: String,

    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<ValidationErrorDetail>>,
}

impl ApiError {
    /// Single-field validation error
    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        ApiError::ValidationError(vec![ValidationErrorDetail {
            field: field.into(),
            message: message.into(),
        }])
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::ValidationError(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::ValidationError(errors) => {
                write!(f, "Validation failed: {} errors", errors.len())
            }
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            ApiError::ServiceUnavailable(msg) => write!(f, "Service unavailable: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let (error_code, message, details) = match self {
            ApiError::BadRequest(msg) => ("bad_request", msg, None),
            ApiError::Unauthorized(msg) => ("unauthorized", msg, None),
            ApiError::Forbidden(msg) => ("forbidden", msg, None),
            ApiError::NotFound(msg) => ("not_found", msg, None),
            ApiError::ValidationError(errors) => (
                "validation_error",
                "Request validation failed".to_string(),
                Some(errors),
            ),
            ApiError::InternalError(msg) => {
                // Logged here, never exposed to clients
                tracing::error!(error = %msg, "Internal error");
                ("internal_error", "An internal error occurred".to_string(), None)
            }
            ApiError::ServiceUnavailable(msg) => ("service_unavailable", msg, None),
        };

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
            details,
        });

        (status, body).into_response()
    }
}

/// Convert sqlx errors to API errors
impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ApiError::NotFound("Resource not found".to_string()),
            sqlx::Error::Database(db_err) => {
                let message = match db_err.kind() {
                    ErrorKind::UniqueViolation => "already exists",
                    ErrorKind::ForeignKeyViolation => "references a missing record",
                    ErrorKind::NotNullViolation => "is required",
                    ErrorKind::CheckViolation => "is invalid",
                    _ => return ApiError::InternalError(format!("Database error: {}", db_err)),
                };

                let pg = db_err.try_downcast_ref::<PgDatabaseError>();
                let field = pg
                    .and_then(|e| e.detail())
                    .and_then(offending_column)
                    .or_else(|| pg.and_then(|e| e.column()).map(str::to_string))
                    .or_else(|| db_err.constraint().map(str::to_string))
                    .unwrap_or_else(|| "record".to_string());

                ApiError::field(field, message)
            }
            sqlx::Error::PoolTimedOut => {
                ApiError::ServiceUnavailable("Database is busy, retry later".to_string())
            }
            _ => ApiError::InternalError(format!("Database error: {}", err)),
        }
    }
}

/// Convert request validation errors to API errors
impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut details: Vec<ValidationErrorDetail> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| ValidationErrorDetail {
                    field: field.to_string(),
                    message: e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| e.code.to_string()),
                })
            })
            .collect();
        details.sort_by(|a, b| a.field.cmp(&b.field));

        ApiError::ValidationError(details)
    }
}

/// Convert JWT errors to API errors
impl From<JwtError> for ApiError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Expired => ApiError::Unauthorized("Token expired".to_string()),
            JwtError::InvalidIssuer => ApiError::Unauthorized("Invalid token issuer".to_string()),
            JwtError::CreateError(msg) => ApiError::InternalError(msg),
            _ => ApiError::Unauthorized(format!("Invalid token: {}", err)),
        }
    }
}

/// Convert authorization errors to API errors
impl From<AuthzError> for ApiError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::EventNotFound => ApiError::NotFound("Event not found".to_string()),
            AuthzError::NotAuthorized => {
                ApiError::Forbidden("Not authorized to access this resource".to_string())
            }
            AuthzError::DatabaseError(err) => err.into(),
        }
    }
}

/// Convert contact request errors to API errors
impl From<ContactError> for ApiError {
    fn from(err: ContactError) -> Self {
        match err {
            ContactError::SelfRequest
            | ContactError::AlreadyContacts
            | ContactError::DuplicateRequest => ApiError::field("sent_to", err.to_string()),
            ContactError::InvalidTransition { .. } | ContactError::NotPending(_) => {
                ApiError::field("status", err.to_string())
            }
            ContactError::SenderNotAllowed(_)
            | ContactError::SenderNotFound
            | ContactError::NotRecipient
            | ContactError::NotParticipant => ApiError::Forbidden(err.to_string()),
            ContactError::RecipientNotFound | ContactError::RequestNotFound => {
                ApiError::NotFound(err.to_string())
            }
            ContactError::Database(err) => err.into(),
        }
    }
}

/// Convert party list errors to API errors
impl From<PartyError> for ApiError {
    fn from(err: PartyError) -> Self {
        match err {
            PartyError::EventNotFound => ApiError::NotFound(err.to_string()),
            PartyError::EventCancelled => ApiError::field("event", err.to_string()),
            PartyError::Forbidden(_) => ApiError::Forbidden(err.to_string()),
            PartyError::InvalidParty { index, message } => {
                ApiError::field(format!("parties[{}]", index), message)
            }
            PartyError::Database(err) => err.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corpnet_shared::models::contact_request::ContactRequestStatus;

    #[test]
    fn test_error_display() {
        let err = ApiError::BadRequest("Invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: Invalid input");

        let err = ApiError::field("sent_to", "already exists");
        assert_eq!(err.to_string(), "Validation failed: 1 errors");
    }

    #[test]
    fn test_row_not_found_is_404() {
        let err: ApiError = sqlx::Error::RowNotFound.into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_pool_timeout_is_503() {
        let err: ApiError = sqlx::Error::PoolTimedOut.into();
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_contact_errors_map_to_status_codes() {
        let cases: Vec<(ContactError, StatusCode)> = vec![
            (ContactError::SelfRequest, StatusCode::UNPROCESSABLE_ENTITY),
            (ContactError::DuplicateRequest, StatusCode::UNPROCESSABLE_ENTITY),
            (ContactError::AlreadyContacts, StatusCode::UNPROCESSABLE_ENTITY),
            (
                ContactError::InvalidTransition {
                    from: ContactRequestStatus::Accepted,
                    to: ContactRequestStatus::Rejected,
                },
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                ContactError::NotPending(ContactRequestStatus::Accepted),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (ContactError::NotRecipient, StatusCode::FORBIDDEN),
            (ContactError::NotParticipant, StatusCode::FORBIDDEN),
            (ContactError::RecipientNotFound, StatusCode::NOT_FOUND),
            (ContactError::RequestNotFound, StatusCode::NOT_FOUND),
        ];

        for (err, expected) in cases {
            let api: ApiError = err.into();
            assert_eq!(api.status(), expected);
        }
    }

    #[test]
    fn test_invalid_party_names_index() {
        let api: ApiError = PartyError::InvalidParty {
            index: 3,
            message: "user not found".to_string(),
        }
        .into();

        match api {
            ApiError::ValidationError(details) => {
                assert_eq!(details[0].field, "parties[3]");
                assert_eq!(details[0].message, "user not found");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_authz_errors() {
        let api: ApiError = AuthzError::EventNotFound.into();
        assert_eq!(api.status(), StatusCode::NOT_FOUND);

        let api: ApiError = AuthzError::NotAuthorized.into();
        assert_eq!(api.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_response_body_shape() {
        let response = ApiError::field("sent_to", "already exists").into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(json["error"], "validation_error");
        assert_eq!(json["details"][0]["field"], "sent_to");
    }

    #[tokio::test]
    async fn test_internal_error_is_opaque() {
        let response =
            ApiError::InternalError("connection reset by peer".to_string()).into_response();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(json["message"], "An internal error occurred");
        assert!(json.get("details").is_none());
    }
}
