//! The authenticated caller

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::jwt::Claims;
use crate::models::account::AccountType;
use crate::models::user::UserRole;

/// Identity of the caller, inserted into request extensions by the API's
/// auth middleware
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub account_id: Uuid,
    pub account_type: AccountType,
    pub role: UserRole,
}

impl AuthContext {
    pub fn from_claims(claims: &Claims) -> Self {
        Self {
            user_id: claims.sub,
            account_id: claims.account_id,
            account_type: claims.account_type,
            role: claims.role,
        }
    }

    pub fn is_platform_admin(&self) -> bool {
        self.account_type == AccountType::Admin
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::TokenType;

    #[test]
    fn test_from_claims() {
        let claims = Claims::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            AccountType::Admin,
            UserRole::Admin,
            TokenType::Access,
        );

        let auth = AuthContext::from_claims(&claims);
        assert_eq!(auth.user_id, claims.sub);
        assert_eq!(auth.account_id, claims.account_id);
        assert!(auth.is_platform_admin());
    }
}
