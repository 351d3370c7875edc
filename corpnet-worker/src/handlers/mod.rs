//! Job handlers
//!
//! Each job type has one handler. The orchestrator decodes the payload of a
//! claimed job and dispatches it through [`HandlerRegistry`] by job type.

use async_trait::async_trait;
use corpnet_shared::models::job::JobPayload;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Arc;

use crate::notifier::Notifier;

pub mod contact_notifications;
pub mod event_notifications;
pub mod stats;

pub use contact_notifications::ContactNotificationHandler;
pub use event_notifications::EventNotificationHandler;
pub use stats::StatsHandler;

#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The registry routed a payload the handler does not understand
    #[error("Handler {handler} cannot process {job_type} jobs")]
    UnexpectedPayload {
        handler: &'static str,
        job_type: &'static str,
    },
}

impl HandlerError {
    pub(crate) fn unexpected(handler: &'static str, payload: &JobPayload) -> Self {
        HandlerError::UnexpectedPayload {
            handler,
            job_type: payload.job_type(),
        }
    }
}

/// What a handler may use while processing a job
#[derive(Clone)]
pub struct JobContext {
    pub db: PgPool,
    pub notifier: Arc<Notifier>,
}

#[async_trait]
pub trait JobHandler: Send + Sync {
    fn name(&self) -> &'static str;

    /// Job types routed to this handler
    fn job_types(&self) -> &'static [&'static str];

    async fn handle(&self, ctx: &JobContext, payload: JobPayload) -> Result<(), HandlerError>;
}

/// Handlers keyed by job type
#[derive(Default, Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<&'static str, Arc<dyn JobHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in handler
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(StatsHandler));
        registry.register(Arc::new(EventNotificationHandler));
        registry.register(Arc::new(ContactNotificationHandler));
        registry
    }

    pub fn register(&mut self, handler: Arc<dyn JobHandler>) {
        for &job_type in handler.job_types() {
            tracing::debug!(handler = handler.name(), job_type, "Registering job handler");
            self.handlers.insert(job_type, handler.clone());
        }
    }

    pub fn get(&self, job_type: &str) -> Option<Arc<dyn JobHandler>> {
        self.handlers.get(job_type).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corpnet_shared::models::event::EventKind;
    use corpnet_shared::models::party::PartyRole;
    use uuid::Uuid;

    #[test]
    fn test_every_payload_has_a_handler() {
        let registry = HandlerRegistry::with_defaults();
        let payloads = [
            JobPayload::UpdateEventStats {
                kind: EventKind::Webinar,
                event_id: Uuid::new_v4(),
            },
            JobPayload::NotifyEventParties {
                kind: EventKind::Webcast,
                event_id: Uuid::new_v4(),
                role: PartyRole::Hosts,
                user_ids: vec![],
            },
            JobPayload::NotifyContactRequest {
                request_id: Uuid::new_v4(),
            },
            JobPayload::NotifyContactAccepted {
                request_id: Uuid::new_v4(),
            },
        ];

        for payload in &payloads {
            assert!(
                registry.get(payload.job_type()).is_some(),
                "no handler for {}",
                payload.job_type()
            );
        }
    }

    #[test]
    fn test_contact_handler_serves_both_contact_jobs() {
        let registry = HandlerRegistry::with_defaults();
        let request = registry.get("notify_contact_request").unwrap();
        let accepted = registry.get("notify_contact_accepted").unwrap();
        assert_eq!(request.name(), accepted.name());
    }

    #[test]
    fn test_unknown_type_has_no_handler() {
        assert!(HandlerRegistry::with_defaults().get("send_newsletter").is_none());
    }
}
