//! Tells users about new and accepted contact requests

use async_trait::async_trait;
use corpnet_shared::models::contact_request::{ContactRequest, ContactRequestStatus};
use corpnet_shared::models::job::JobPayload;
use corpnet_shared::models::user::User;
use serde_json::json;
use uuid::Uuid;

use super::{HandlerError, JobContext, JobHandler};
use crate::notifier::NotificationKind;

pub struct ContactNotificationHandler;

/// Who is told, who they are told about, and the status the request must have
struct Delivery {
    kind: NotificationKind,
    expected: ContactRequestStatus,
    recipient: Uuid,
    subject: Uuid,
}

impl ContactNotificationHandler {
    async fn deliver(
        &self,
        ctx: &JobContext,
        request_id: Uuid,
        accepted: bool,
    ) -> Result<(), HandlerError> {
        let Some(request) = ContactRequest::find_by_id(&ctx.db, request_id).await? else {
            tracing::info!(request_id = %request_id, "Contact request gone, skipping notification");
            return Ok(());
        };

        let delivery = if accepted {
            Delivery {
                kind: NotificationKind::ContactAccepted,
                expected: ContactRequestStatus::Accepted,
                recipient: request.sent_by,
                subject: request.sent_to,
            }
        } else {
            Delivery {
                kind: NotificationKind::ContactRequest,
                expected: ContactRequestStatus::Sent,
                recipient: request.sent_to,
                subject: request.sent_by,
            }
        };

        if request.status != delivery.expected {
            tracing::info!(
                request_id = %request_id,
                status = %request.status.as_str(),
                "Contact request changed, skipping notification"
            );
            return Ok(());
        }

        let subject = match User::find_by_id(&ctx.db, delivery.subject).await? {
            Some(user) if !user.deleted => user,
            _ => return Ok(()),
        };

        let (title, body) = contact_text(delivery.kind, &subject.display_name());
        ctx.notifier
            .notify(
                delivery.recipient,
                delivery.kind,
                title,
                body,
                json!({ "request_id": request.id, "user_id": subject.id }),
            )
            .await?;

        Ok(())
    }
}

/// Title and body of the notification
pub fn contact_text(kind: NotificationKind, other_name: &str) -> (String, String) {
    match kind {
        NotificationKind::ContactAccepted => (
            "Contact request accepted".to_string(),
            format!("{} accepted your contact request", other_name),
        ),
        _ => (
            "New contact request".to_string(),
            format!("{} wants to connect", other_name),
        ),
    }
}

#[async_trait]
impl JobHandler for ContactNotificationHandler {
    fn name(&self) -> &'static str {
        "contact_notifications"
    }

    fn job_types(&self) -> &'static [&'static str] {
        &["notify_contact_request", "notify_contact_accepted"]
    }

    async fn handle(&self, ctx: &JobContext, payload: JobPayload) -> Result<(), HandlerError> {
        match payload {
            JobPayload::NotifyContactRequest { request_id } => {
                self.deliver(ctx, request_id, false).await
            }
            JobPayload::NotifyContactAccepted { request_id } => {
                self.deliver(ctx, request_id, true).await
            }
            other => Err(HandlerError::unexpected(self.name(), &other)),
        }
    }
}
