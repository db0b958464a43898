//! Server-side session records linking a local session to IdP credentials.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::types::{SessionId, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
/// Database representation of one authenticated local session.
pub struct SessionRecord {
    /// Opaque identifier handed to the client; primary key.
    pub session_id: SessionId,
    /// Local user that owns the session.
    pub user_id: UserId,
    /// OAuth access token obtained by the MFA widget flow, once it completes.
    pub mfa_token: Option<String>,
    /// Last successful heartbeat, truncated to whole seconds.
    pub last_active_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn new(user_id: UserId, mfa_token: Option<String>, now: DateTime<Utc>) -> Self {
        Self {
            session_id: SessionId::new(),
            user_id,
            mfa_token,
            last_active_at: now,
        }
    }

    /// Token to invalidate at the IdP when this session is torn down.
    pub fn remote_token(&self) -> Option<&str> {
        self.mfa_token.as_deref().filter(|token| !token.is_empty())
    }
}
