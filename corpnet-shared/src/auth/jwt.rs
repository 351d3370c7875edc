/// JWT claims and HS256 token handling
///
/// Claims carry the user, their account and the account type so that most
/// permission checks need no database round-trip.
///
/// # Token Types
///
/// - **Access Token**: Short-lived (24h), accepted by the API
/// - **Refresh Token**: Long-lived (30d), only accepted by the identity service
///
/// # Example
///
/// ```
/// use corpnet_shared::auth::jwt::{create_token, validate_token, Claims, TokenType};
/// use corpnet_shared::models::account::AccountType;
/// use corpnet_shared::models::user::UserRole;
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let user_id = Uuid::new_v4();
/// let claims = Claims::new(user_id, Uuid::new_v4(), AccountType::Corporate, UserRole::Manager, TokenType::Access);
/// let token = create_token(&claims, "your-secret-key")?;
///
/// let validated = validate_token(&token, "your-secret-key")?;
/// assert_eq!(validated.sub, user_id);
/// # Ok(())
/// # }
/// ```

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::account::AccountType;
use crate::models::user::UserRole;

/// Issuer claim of every corpnet token
pub const ISSUER: &str = "corpnet";

/// Error type for JWT operations
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("Failed to create token: {0}")]
    CreateError(String),

    #[error("Failed to validate token: {0}")]
    ValidationError(String),

    #[error("Token has expired")]
    Expired,

    #[error("Invalid issuer")]
    InvalidIssuer,

    #[error("Expected {expected} token")]
    WrongTokenType { expected: &'static str },
}

/// Token type identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

impl TokenType {
    pub fn default_expiration(&self) -> Duration {
        match self {
            TokenType::Access => Duration::hours(24),
            TokenType::Refresh => Duration::days(30),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Access => "access",
            TokenType::Refresh => "refresh",
        }
    }
}

/// JWT claims
///
/// Standard claims `sub`, `iss`, `iat`, `exp`, `nbf`, plus the account
/// context of the user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: Uuid,

    /// Always [`ISSUER`]
    pub iss: String,

    pub iat: i64,
    pub exp: i64,
    pub nbf: i64,

    pub account_id: Uuid,
    pub account_type: AccountType,
    pub role: UserRole,
    pub token_type: TokenType,
}

impl Claims {
    /// Claims with the default expiration of `token_type`
    pub fn new(
        user_id: Uuid,
        account_id: Uuid,
        account_type: AccountType,
        role: UserRole,
        token_type: TokenType,
    ) -> Self {
        Self::with_expiration(
            user_id,
            account_id,
            account_type,
            role,
            token_type,
            token_type.default_expiration(),
        )
    }

    /// Claims expiring after `expires_in` (negative for already expired tokens)
    pub fn with_expiration(
        user_id: Uuid,
        account_id: Uuid,
        account_type: AccountType,
        role: UserRole,
        token_type: TokenType,
        expires_in: Duration,
    ) -> Self {
        let now = Utc::now();

        Self {
            sub: user_id,
            iss: ISSUER.to_string(),
            iat: now.timestamp(),
            exp: (now + expires_in).timestamp(),
            nbf: now.timestamp(),
            account_id,
            account_type,
            role,
            token_type,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.exp
    }
}

/// Signs claims with HS256
pub fn create_token(claims: &Claims, secret: &str) -> Result<String, JwtError> {
    let header = Header::new(Algorithm::HS256);
    let key = EncodingKey::from_secret(secret.as_bytes());

    encode(&header, claims, &key)
        .map_err(|e| JwtError::CreateError(format!("Token encoding failed: {}", e)))
}

/// Verifies signature, expiry, not-before and issuer
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    let key = DecodingKey::from_secret(secret.as_bytes());

    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[ISSUER]);
    validation.validate_exp = true;
    validation.validate_nbf = true;
    validation.leeway = 0;

    let token_data = decode::<Claims>(token, &key, &validation).map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::Expired,
        jsonwebtoken::errors::ErrorKind::InvalidIssuer => JwtError::InvalidIssuer,
        _ => JwtError::ValidationError(format!("Token validation failed: {}", e)),
    })?;

    Ok(token_data.claims)
}

/// Validates a token and requires it to be an access token
pub fn validate_access_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    let claims = validate_token(token, secret)?;

    if claims.token_type != TokenType::Access {
        return Err(JwtError::WrongTokenType { expected: "access" });
    }

    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-key-at-least-32-bytes-long";

    fn claims(token_type: TokenType) -> Claims {
        Claims::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            AccountType::SellSide,
            UserRole::Manager,
            token_type,
        )
    }

    #[test]
    fn test_token_type_expiration() {
        assert_eq!(TokenType::Access.default_expiration(), Duration::hours(24));
        assert_eq!(TokenType::Refresh.default_expiration(), Duration::days(30));
    }

    #[test]
    fn test_create_and_validate_token() {
        let claims = claims(TokenType::Access);
        let token = create_token(&claims, SECRET).expect("Should create token");

        let validated = validate_token(&token, SECRET).expect("Should validate token");
        assert_eq!(validated.sub, claims.sub);
        assert_eq!(validated.account_id, claims.account_id);
        assert_eq!(validated.account_type, AccountType::SellSide);
        assert_eq!(validated.role, UserRole::Manager);
        assert_eq!(validated.iss, "corpnet");
    }

    #[test]
    fn test_validate_with_wrong_secret() {
        let token = create_token(&claims(TokenType::Access), "secret1").unwrap();
        assert!(validate_token(&token, "wrong-secret").is_err());
    }

    #[test]
    fn test_validate_expired_token() {
        let claims = Claims::with_expiration(
            Uuid::new_v4(),
            Uuid::new_v4(),
            AccountType::General,
            UserRole::User,
            TokenType::Access,
            Duration::seconds(-3600),
        );
        assert!(claims.is_expired());

        let token = create_token(&claims, SECRET).unwrap();
        assert!(matches!(validate_token(&token, SECRET), Err(JwtError::Expired)));
    }

    #[test]
    fn test_validate_foreign_issuer() {
        let mut claims = claims(TokenType::Access);
        claims.iss = "someone-else".to_string();

        let token = create_token(&claims, SECRET).unwrap();
        assert!(matches!(validate_token(&token, SECRET), Err(JwtError::InvalidIssuer)));
    }

    #[test]
    fn test_refresh_token_rejected_as_access() {
        let token = create_token(&claims(TokenType::Refresh), SECRET).unwrap();

        assert!(validate_token(&token, SECRET).is_ok());
        assert!(matches!(
            validate_access_token(&token, SECRET),
            Err(JwtError::WrongTokenType { expected: "access" })
        ));
    }
}
