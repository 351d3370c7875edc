/// API route handlers, organized by resource
///
/// - `health`: health check
/// - `contacts`: contacts and the contact request state machine
/// - `events`: per-kind event listings and dashboard counters
/// - `parties`: party lists of one event (read and replace)
/// - `stats`: event stats and on-demand recount
/// - `notifications`: the caller's notifications
use crate::error::ApiError;
use corpnet_shared::models::event::EventKind;

pub mod contacts;
pub mod events;
pub mod health;
pub mod notifications;
pub mod parties;
pub mod stats;

/// Parses the `:kind` path segment; unknown kinds are a 400
pub(crate) fn parse_kind(raw: &str) -> Result<EventKind, ApiError> {
    raw.parse::<EventKind>()
        .map_err(|e| ApiError::BadRequest(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_kind() {
        assert_eq!(parse_kind("webinars").unwrap(), EventKind::Webinar);
        assert!(matches!(parse_kind("meetups"), Err(ApiError::BadRequest(_))));
    }
}
