//! Local session lifecycle and its coordination with remote logout.
//!
//! Expiry is lazy: a session is only judged against the inactivity threshold
//! when a heartbeat (or an operation that heartbeats) arrives for it. Sessions
//! that are never heartbeaten again stay stored until an explicit logout.

use std::sync::Arc;

use serde_json::Value;

use crate::{
    error::{AuthError, SessionError},
    models::session::SessionRecord,
    repositories::session_store::SessionStore,
    services::{idp_client::IdpClient, liveness::is_alive},
    types::{SessionId, UserId},
    utils::{
        cookies::{clear_credential_cookies, CookieOptions},
        now_utc_seconds,
    },
};

/// Outcome of a token logout.
///
/// `cookies` is always populated with the clear-cookie pair so the browser
/// drops its credentials even when the remote call or local cleanup failed.
#[derive(Debug)]
pub struct TokenLogout {
    pub cookies: Vec<String>,
    pub outcome: Result<Value, AuthError>,
}

#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    idp: Arc<dyn IdpClient>,
    inactivity_threshold_secs: i64,
    cookie_options: CookieOptions,
}

impl SessionManager {
    pub fn new(
        store: Arc<dyn SessionStore>,
        idp: Arc<dyn IdpClient>,
        inactivity_threshold_secs: i64,
        cookie_options: CookieOptions,
    ) -> Self {
        Self {
            store,
            idp,
            inactivity_threshold_secs,
            cookie_options,
        }
    }

    pub async fn create_session(
        &self,
        user_id: UserId,
        mfa_token: Option<String>,
    ) -> Result<SessionId, SessionError> {
        let record = SessionRecord::new(user_id, mfa_token, now_utc_seconds());
        self.store.save(&record).await?;
        tracing::info!(%user_id, session_id = %record.session_id, "Session created");
        Ok(record.session_id)
    }

    /// Refreshes a live session or tears down an expired one.
    ///
    /// Expired sessions are logged out and deleted before
    /// [`SessionError::Ended`] is returned.
    pub async fn heartbeat(&self, session_id: SessionId) -> Result<(), SessionError> {
        let record = self
            .store
            .find_by_session_id(session_id)
            .await?
            .ok_or(SessionError::Unknown)?;

        let now = now_utc_seconds();
        if !is_alive(record.last_active_at, now, self.inactivity_threshold_secs) {
            tracing::info!(
                %session_id,
                last_active_at = %record.last_active_at,
                threshold_secs = self.inactivity_threshold_secs,
                "Session inactive past threshold; ending it"
            );
            self.teardown(&record).await?;
            return Err(SessionError::Ended);
        }

        if !self.store.touch(session_id, now).await? {
            tracing::info!(%session_id, "Session removed during heartbeat; not recreating it");
            return Err(SessionError::Unknown);
        }
        Ok(())
    }

    /// Ends a session by id. Unknown ids are a no-op.
    pub async fn logout_by_session(&self, session_id: SessionId) -> Result<(), SessionError> {
        let Some(record) = self.store.find_by_session_id(session_id).await? else {
            tracing::debug!(%session_id, "Logout for unknown session ignored");
            return Ok(());
        };
        self.teardown(&record).await
    }

    /// Invalidates `token` at the IdP and clears both credential cookies.
    ///
    /// With `trigger_local_cleanup`, the sessions of the user in `context` are
    /// deleted as well; a missing context skips that step. Local cleanup runs
    /// even when the remote call fails.
    pub async fn logout_by_token(
        &self,
        token: &str,
        trigger_local_cleanup: bool,
        context: Option<&SessionRecord>,
    ) -> TokenLogout {
        let cookies = clear_credential_cookies(self.cookie_options);

        let remote = self.idp.logout(token).await;
        if let Err(err) = &remote {
            tracing::warn!(error = %err, "Remote logout failed");
        }

        if trigger_local_cleanup {
            if let Some(context) = context {
                if let Err(err) = self.store.delete_by_user_id(context.user_id).await {
                    tracing::error!(
                        error = %err,
                        user_id = %context.user_id,
                        "Failed to delete local sessions during logout"
                    );
                    return TokenLogout {
                        cookies,
                        outcome: Err(err.into()),
                    };
                }
                tracing::info!(user_id = %context.user_id, "Local sessions removed on logout");
            }
        }

        TokenLogout {
            cookies,
            outcome: remote.map_err(AuthError::from),
        }
    }

    async fn teardown(&self, record: &SessionRecord) -> Result<(), SessionError> {
        if let Some(token) = record.remote_token() {
            if let Err(err) = self.idp.logout(token).await {
                tracing::warn!(
                    error = %err,
                    session_id = %record.session_id,
                    "Remote logout failed; deleting local session anyway"
                );
            }
        }
        self.store.delete_by_session_id(record.session_id).await?;
        tracing::info!(session_id = %record.session_id, user_id = %record.user_id, "Session ended");
        Ok(())
    }
}
