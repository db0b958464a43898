//! User directory: local accounts and MFA client mappings.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::models::user::User;
use crate::types::UserId;

/// Read access to local users.
///
/// Mocked with `MockUserDirectory` in unit tests.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn get_by_id(&self, id: UserId) -> Result<Option<User>, sqlx::Error>;

    async fn find_by_name(&self, name: &str) -> Result<Option<User>, sqlx::Error>;

    /// Local user bound to an MFA widget client id.
    async fn get_mfa_user_mapping(&self, client_id: &str) -> Result<Option<UserId>, sqlx::Error>;
}

#[derive(Clone)]
pub struct PgUserDirectory {
    pool: PgPool,
}

impl PgUserDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn get_by_id(&self, id: UserId) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            "SELECT id, name, display_name, password_hash FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            "SELECT id, name, display_name, password_hash FROM users WHERE LOWER(name) = LOWER($1)",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
    }

    async fn get_mfa_user_mapping(&self, client_id: &str) -> Result<Option<UserId>, sqlx::Error> {
        sqlx::query_scalar::<_, UserId>(
            "SELECT user_id FROM mfa_user_mappings WHERE mfa_user_id = $1",
        )
        .bind(client_id)
        .fetch_optional(&self.pool)
        .await
    }
}
