//! Tells users they were added to an event's party list

use async_trait::async_trait;
use corpnet_shared::models::event::{Event, EventKind};
use corpnet_shared::models::job::JobPayload;
use corpnet_shared::models::party::PartyRole;
use corpnet_shared::models::user::User;
use serde_json::json;

use super::{HandlerError, JobContext, JobHandler};
use crate::notifier::NotificationKind;

pub struct EventNotificationHandler;

/// Title and body of the notification
pub fn party_added_text(kind: EventKind, role: PartyRole, event_title: &str) -> (String, String) {
    let title = format!("You were added to a {}", kind.label());
    let body = format!("{}: you are listed as {}", event_title, role.singular());
    (title, body)
}

#[async_trait]
impl JobHandler for EventNotificationHandler {
    fn name(&self) -> &'static str {
        "event_notifications"
    }

    fn job_types(&self) -> &'static [&'static str] {
        &["notify_event_parties"]
    }

    async fn handle(&self, ctx: &JobContext, payload: JobPayload) -> Result<(), HandlerError> {
        let (kind, event_id, role, user_ids) = match payload {
            JobPayload::NotifyEventParties {
                kind,
                event_id,
                role,
                user_ids,
            } => (kind, event_id, role, user_ids),
            other => return Err(HandlerError::unexpected(self.name(), &other)),
        };

        let event = match Event::find_by_id(&ctx.db, kind, event_id).await? {
            Some(event) if !event.deleted && !event.cancelled && !event.is_draft => event,
            _ => {
                tracing::info!(
                    kind = %kind,
                    event_id = %event_id,
                    "Event not announceable, skipping notifications"
                );
                return Ok(());
            }
        };

        let (title, body) = party_added_text(kind, role, &event.title);
        let recipients = User::find_active_by_ids(&ctx.db, &user_ids).await?;

        let mut sent = 0usize;
        for user in recipients.iter().filter(|u| !u.account_blocked) {
            ctx.notifier
                .notify(
                    user.id,
                    NotificationKind::EventPartyAdded,
                    title.clone(),
                    body.clone(),
                    json!({ "kind": kind, "event_id": event_id, "role": role }),
                )
                .await?;
            sent += 1;
        }

        tracing::debug!(
            kind = %kind,
            event_id = %event_id,
            role = %role,
            requested = user_ids.len(),
            sent,
            "Party notifications sent"
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_party_added_text() {
        let (title, body) = party_added_text(EventKind::Webinar, PartyRole::Rsvps, "Q3 results");
        assert_eq!(title, "You were added to a webinar");
        assert_eq!(body, "Q3 results: you are listed as attendee");
    }

    #[test]
    fn test_corporate_access_label() {
        let (title, _) =
            party_added_text(EventKind::CorporateAccessEvent, PartyRole::Invitees, "Roadshow");
        assert_eq!(title, "You were added to a corporate access event");
    }
}
