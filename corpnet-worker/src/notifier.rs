/// Notification delivery
///
/// Every notification is first stored in the `notifications` table, then
/// published as JSON on the Redis channel `notifications:{user_id}`, where the
/// socket and push gateways pick it up. The published message carries the
/// recipient's push device ids. A failed publish is logged and the stored row
/// remains, so the notification still shows up in `GET /v1/notifications`.
use chrono::{DateTime, Utc};
use corpnet_shared::models::notification::{CreateNotification, Notification};
use corpnet_shared::models::user::UserSettings;
use corpnet_shared::redis::{notification_channel, RedisClient};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::PgPool;
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// Added to an event's party list
    EventPartyAdded,
    ContactRequest,
    ContactAccepted,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::EventPartyAdded => "event_party_added",
            NotificationKind::ContactRequest => "contact_request",
            NotificationKind::ContactAccepted => "contact_accepted",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Message published on the user's notification channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushMessage {
    pub notification_id: Uuid,
    pub user_id: Uuid,
    pub notification_type: String,
    pub title: String,
    pub body: String,
    pub payload: JsonValue,
    pub device_ids: Vec<String>,
    pub created_date: DateTime<Utc>,
}

impl PushMessage {
    pub fn new(notification: &Notification, device_ids: Vec<String>) -> Self {
        PushMessage {
            notification_id: notification.id,
            user_id: notification.user_id,
            notification_type: notification.notification_type.clone(),
            title: notification.title.clone(),
            body: notification.body.clone(),
            payload: notification.payload.clone(),
            device_ids,
            created_date: notification.created_date,
        }
    }
}

pub struct Notifier {
    db: PgPool,
    redis: RedisClient,
}

impl Notifier {
    pub fn new(db: PgPool, redis: RedisClient) -> Self {
        Notifier { db, redis }
    }

    /// Stores a notification for `user_id` and publishes it
    ///
    /// # Errors
    ///
    /// Only storage errors are returned; publish errors are logged.
    pub async fn notify(
        &self,
        user_id: Uuid,
        kind: NotificationKind,
        title: String,
        body: String,
        payload: JsonValue,
    ) -> Result<Notification, sqlx::Error> {
        let notification = Notification::create(
            &self.db,
            CreateNotification {
                user_id,
                notification_type: kind.as_str().to_string(),
                title,
                body,
                payload,
            },
        )
        .await?;

        let settings = UserSettings::find_or_default(&self.db, user_id).await?;
        self.publish(&PushMessage::new(&notification, settings.device_ids()))
            .await;

        Ok(notification)
    }

    async fn publish(&self, message: &PushMessage) {
        let channel = notification_channel(message.user_id);

        let encoded = match serde_json::to_string(message) {
            Ok(encoded) => encoded,
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode push message");
                return;
            }
        };

        match self.redis.publish(&channel, &encoded).await {
            Ok(receivers) => tracing::debug!(
                channel = %channel,
                receivers,
                notification_id = %message.notification_id,
                "Notification published"
            ),
            Err(e) => tracing::warn!(
                channel = %channel,
                notification_id = %message.notification_id,
                error = %e,
                "Failed to publish notification"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn notification() -> Notification {
        Notification {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            notification_type: NotificationKind::ContactRequest.as_str().to_string(),
            title: "New contact request".to_string(),
            body: "Robin Hale wants to connect".to_string(),
            payload: json!({ "request_id": Uuid::nil() }),
            read: false,
            created_date: Utc::now(),
        }
    }

    #[test]
    fn test_push_message_copies_notification() {
        let stored = notification();
        let message = PushMessage::new(&stored, vec!["ios-1".to_string()]);

        assert_eq!(message.notification_id, stored.id);
        assert_eq!(message.user_id, stored.user_id);
        assert_eq!(message.notification_type, "contact_request");
        assert_eq!(message.device_ids, vec!["ios-1".to_string()]);
    }

    #[test]
    fn test_push_message_wire_format() {
        let message = PushMessage::new(&notification(), vec![]);
        let json = serde_json::to_value(&message).unwrap();

        assert_eq!(json["notification_type"], "contact_request");
        assert_eq!(json["payload"]["request_id"], json!(Uuid::nil()));
        assert!(json["device_ids"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(NotificationKind::EventPartyAdded.to_string(), "event_party_added");
        assert_eq!(
            serde_json::to_value(NotificationKind::ContactAccepted).unwrap(),
            json!("contact_accepted")
        );
    }
}
