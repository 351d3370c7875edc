/// Authentication and authorization utilities
///
/// Tokens are issued by the identity service; this crate only validates them
/// and turns their claims into an [`context::AuthContext`].
///
/// # Modules
///
/// - [`jwt`]: JWT claims, signing (for issuers and tests) and validation
/// - [`context`]: The authenticated caller as seen by handlers
/// - [`authorization`]: Event-level permission checks
///
/// # Example
///
/// ```
/// use corpnet_shared::auth::context::AuthContext;
/// use corpnet_shared::auth::jwt::{create_token, validate_access_token, Claims, TokenType};
/// use corpnet_shared::models::account::AccountType;
/// use corpnet_shared::models::user::UserRole;
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let secret = "a-secret-of-at-least-thirty-two-bytes";
/// let claims = Claims::new(
///     Uuid::new_v4(),
///     Uuid::new_v4(),
///     AccountType::BuySide,
///     UserRole::User,
///     TokenType::Access,
/// );
/// let token = create_token(&claims, secret)?;
///
/// let auth = AuthContext::from_claims(&validate_access_token(&token, secret)?);
/// assert_eq!(auth.user_id, claims.sub);
/// # Ok(())
/// # }
/// ```

pub mod authorization;
pub mod context;
pub mod jwt;
