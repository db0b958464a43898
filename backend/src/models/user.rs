//! Local user accounts and their link to MFA widget clients.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::types::UserId;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
/// Database representation of a local user account.
pub struct User {
    pub id: UserId,
    /// Login name; also the identity name the IdP reports for this user.
    pub name: String,
    pub display_name: String,
    /// Argon2 PHC string.
    #[serde(skip_serializing)]
    pub password_hash: String,
}

impl User {
    /// Identity names from the IdP are compared without regard to case.
    pub fn matches_identity(&self, idp_name: &str) -> bool {
        self.name.to_lowercase() == idp_name.to_lowercase()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
/// Maps the OAuth client id used by the widget flow to a local user.
pub struct MfaUserMapping {
    pub mfa_user_id: String,
    pub user_id: UserId,
}
