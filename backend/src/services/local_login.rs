//! Username/password login against the local user directory.

use std::sync::Arc;

use crate::{
    error::AuthError,
    models::auth::BasicLoginResult,
    repositories::user::UserDirectory,
    services::session_lifecycle::SessionManager,
    utils::{verify_password, SecretBuffer},
};

pub struct LocalLogin {
    users: Arc<dyn UserDirectory>,
    sessions: SessionManager,
    mobile_inactive_time_secs: i64,
}

impl LocalLogin {
    pub fn new(
        users: Arc<dyn UserDirectory>,
        sessions: SessionManager,
        mobile_inactive_time_secs: i64,
    ) -> Self {
        Self {
            users,
            sessions,
            mobile_inactive_time_secs,
        }
    }

    /// Verifies the credentials and opens a session with no MFA token yet.
    ///
    /// Unknown users and wrong passwords fail identically.
    pub async fn login(
        &self,
        username: &str,
        password: &SecretBuffer,
    ) -> Result<BasicLoginResult, AuthError> {
        let Some(user) = self.users.find_by_name(username).await? else {
            tracing::warn!(username, "Login attempt for unknown user");
            return Err(AuthError::InvalidCredentials);
        };

        if password.is_empty() || !verify_password(password, &user.password_hash)? {
            tracing::warn!(user_id = %user.id, "Login attempt with wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        let session_id = self.sessions.create_session(user.id, None).await?;
        tracing::info!(user_id = %user.id, %session_id, "Local login succeeded");

        Ok(BasicLoginResult {
            session_uuid: session_id,
            mfa_user_name: user.name,
            mobile_background_inactive_timeout: self.mobile_inactive_time_secs,
        })
    }
}
