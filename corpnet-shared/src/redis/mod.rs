/// Redis integration for notification fan-out
///
/// The worker publishes every stored notification on a per-user channel.
/// The socket/push gateway subscribes to those channels and forwards the
/// message to the user's open sessions and registered devices.
///
/// ```text
/// ┌─────────────┐  PUBLISH   notifications:{user_id}  ┌──────────────┐
/// │   Worker    │ ───────────────────────────────────> │ push gateway │
/// └─────────────┘                                      └──────────────┘
/// ```
///
/// # Example
///
/// ```no_run
/// use corpnet_shared::redis::{RedisClient, RedisConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = RedisClient::new(RedisConfig::from_env()?).await?;
/// let receivers = client.publish("notifications:42", "{}").await?;
/// println!("delivered to {} subscribers", receivers);
/// # Ok(())
/// # }
/// ```

pub mod client;

pub use client::{notification_channel, RedisClient, RedisClientError, RedisConfig};
