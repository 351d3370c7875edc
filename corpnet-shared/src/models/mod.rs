/// Database models for corpnet
///
/// Each model owns its SQL. Operations take a `&PgPool` (or a transaction
/// where several statements must commit together) and return `sqlx::Error`
/// or a domain error that wraps it.
///
/// # Models
///
/// - `account`: Tenants, account types and their permission table
/// - `user`: Users and per-user push settings
/// - `contact`: Established contacts and CRM shadow rows
/// - `contact_request`: The contact request state machine
/// - `event`: Event kinds, events and the union query over a user's relations
/// - `party`: Invitee/host/participant/rsvp/collaborator lists and sync-by-diff
/// - `stats`: Per-event counters and engagements
/// - `notification`: Stored user notifications
/// - `job`: Background job payloads and the enqueue side of the queue
///
/// # Example
///
/// ```no_run
/// use corpnet_shared::models::contact_request::{ContactRequest, SendOutcome};
/// use corpnet_shared::db::pool::{create_pool, DatabaseConfig};
/// use uuid::Uuid;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
///
/// match ContactRequest::send(&pool, Uuid::new_v4(), Uuid::new_v4()).await? {
///     SendOutcome::Pending(request) => println!("waiting on {}", request.sent_to),
///     SendOutcome::AutoAccepted { contact, .. } => println!("contact {}", contact.id),
/// }
/// # Ok(())
/// # }
/// ```

pub mod account;
pub mod contact;
pub mod contact_request;
pub mod event;
pub mod job;
pub mod notification;
pub mod party;
pub mod stats;
pub mod user;
