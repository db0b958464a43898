//! Session record storage.
//!
//! Every operation is a single statement, so reads, writes and deletes are
//! atomic per record. Nothing spans records; concurrent heartbeats on one
//! session resolve last-writer-wins. Refreshes of an existing session go
//! through the update-only operations so a record removed by a concurrent
//! logout stays removed.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tokio::sync::RwLock;

use crate::models::session::SessionRecord;
use crate::types::{SessionId, UserId};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Inserts the record or overwrites the one with the same session id.
    async fn save(&self, record: &SessionRecord) -> Result<(), sqlx::Error>;

    /// Sets `last_active_at` on an existing record. Returns `false` when no
    /// record has that id.
    async fn touch(&self, session_id: SessionId, at: DateTime<Utc>) -> Result<bool, sqlx::Error>;

    /// Sets `mfa_token` on an existing record. Returns `false` when no record
    /// has that id.
    async fn set_mfa_token(&self, session_id: SessionId, token: &str)
        -> Result<bool, sqlx::Error>;

    async fn find_by_session_id(
        &self,
        session_id: SessionId,
    ) -> Result<Option<SessionRecord>, sqlx::Error>;

    /// Most recently active session of the user, if any.
    async fn find_by_user_id(&self, user_id: UserId)
        -> Result<Option<SessionRecord>, sqlx::Error>;

    async fn find_by_mfa_token(&self, token: &str) -> Result<Option<SessionRecord>, sqlx::Error>;

    async fn delete_by_session_id(&self, session_id: SessionId) -> Result<(), sqlx::Error>;

    /// Removes every session the user holds.
    async fn delete_by_user_id(&self, user_id: UserId) -> Result<(), sqlx::Error>;
}

#[derive(Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn save(&self, record: &SessionRecord) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO session_store (session_id, user_id, mfa_token, last_active_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (session_id) DO UPDATE
            SET user_id = EXCLUDED.user_id,
                mfa_token = EXCLUDED.mfa_token,
                last_active_at = EXCLUDED.last_active_at
            "#,
        )
        .bind(record.session_id)
        .bind(record.user_id)
        .bind(record.mfa_token.as_deref())
        .bind(record.last_active_at)
        .execute(&self.pool)
        .await
        .map(|_| ())
    }

    async fn touch(&self, session_id: SessionId, at: DateTime<Utc>) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE session_store SET last_active_at = $2 WHERE session_id = $1")
            .bind(session_id)
            .bind(at)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_mfa_token(
        &self,
        session_id: SessionId,
        token: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE session_store SET mfa_token = $2 WHERE session_id = $1")
            .bind(session_id)
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_by_session_id(
        &self,
        session_id: SessionId,
    ) -> Result<Option<SessionRecord>, sqlx::Error> {
        sqlx::query_as::<_, SessionRecord>(
            r#"
            SELECT session_id, user_id, mfa_token, last_active_at
            FROM session_store
            WHERE session_id = $1
            "#,
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn find_by_user_id(
        &self,
        user_id: UserId,
    ) -> Result<Option<SessionRecord>, sqlx::Error> {
        sqlx::query_as::<_, SessionRecord>(
            r#"
            SELECT session_id, user_id, mfa_token, last_active_at
            FROM session_store
            WHERE user_id = $1
            ORDER BY last_active_at DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn find_by_mfa_token(&self, token: &str) -> Result<Option<SessionRecord>, sqlx::Error> {
        sqlx::query_as::<_, SessionRecord>(
            r#"
            SELECT session_id, user_id, mfa_token, last_active_at
            FROM session_store
            WHERE mfa_token = $1
            ORDER BY last_active_at DESC
            LIMIT 1
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
    }

    async fn delete_by_session_id(&self, session_id: SessionId) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM session_store WHERE session_id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map(|_| ())
    }

    async fn delete_by_user_id(&self, user_id: UserId) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM session_store WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map(|_| ())
    }
}

/// Process-local store for development runs and tests.
#[derive(Clone, Default)]
pub struct MemorySessionStore {
    records: Arc<RwLock<HashMap<SessionId, SessionRecord>>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn save(&self, record: &SessionRecord) -> Result<(), sqlx::Error> {
        self.records
            .write()
            .await
            .insert(record.session_id, record.clone());
        Ok(())
    }

    async fn touch(&self, session_id: SessionId, at: DateTime<Utc>) -> Result<bool, sqlx::Error> {
        Ok(match self.records.write().await.get_mut(&session_id) {
            Some(record) => {
                record.last_active_at = at;
                true
            }
            None => false,
        })
    }

    async fn set_mfa_token(
        &self,
        session_id: SessionId,
        token: &str,
    ) -> Result<bool, sqlx::Error> {
        Ok(match self.records.write().await.get_mut(&session_id) {
            Some(record) => {
                record.mfa_token = Some(token.to_string());
                true
            }
            None => false,
        })
    }

    async fn find_by_session_id(
        &self,
        session_id: SessionId,
    ) -> Result<Option<SessionRecord>, sqlx::Error> {
        Ok(self.records.read().await.get(&session_id).cloned())
    }

    async fn find_by_user_id(
        &self,
        user_id: UserId,
    ) -> Result<Option<SessionRecord>, sqlx::Error> {
        Ok(self
            .records
            .read()
            .await
            .values()
            .filter(|record| record.user_id == user_id)
            .max_by_key(|record| record.last_active_at)
            .cloned())
    }

    async fn find_by_mfa_token(&self, token: &str) -> Result<Option<SessionRecord>, sqlx::Error> {
        Ok(self
            .records
            .read()
            .await
            .values()
            .filter(|record| record.mfa_token.as_deref() == Some(token))
            .max_by_key(|record| record.last_active_at)
            .cloned())
    }

    async fn delete_by_session_id(&self, session_id: SessionId) -> Result<(), sqlx::Error> {
        self.records.write().await.remove(&session_id);
        Ok(())
    }

    async fn delete_by_user_id(&self, user_id: UserId) -> Result<(), sqlx::Error> {
        self.records
            .write()
            .await
            .retain(|_, record| record.user_id != user_id);
        Ok(())
    }
}
