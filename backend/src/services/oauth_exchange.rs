//! MFA widget flow: authorization-code + PKCE exchange and identity binding.

use std::sync::Arc;

use crate::{
    error::{AuthError, SessionError},
    models::auth::{AuthCookieGrant, CompletedLogin},
    repositories::{session_store::SessionStore, user::UserDirectory},
    services::{
        idp_client::{IdpClient, TokenExchangeForm, TokenExchangeResult},
        session_lifecycle::SessionManager,
    },
    types::SessionId,
    utils::cookies::{build_auth_cookie, CookieOptions, COOKIE_PATH, PRIMARY_COOKIE_NAME},
};

/// A login result together with the primary cookie carrying the access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issued<T> {
    pub payload: T,
    pub cookie: String,
}

pub struct OAuthExchange {
    idp: Arc<dyn IdpClient>,
    store: Arc<dyn SessionStore>,
    users: Arc<dyn UserDirectory>,
    sessions: SessionManager,
    cookie_options: CookieOptions,
}

impl OAuthExchange {
    pub fn new(
        idp: Arc<dyn IdpClient>,
        store: Arc<dyn SessionStore>,
        users: Arc<dyn UserDirectory>,
        sessions: SessionManager,
        cookie_options: CookieOptions,
    ) -> Self {
        Self {
            idp,
            store,
            users,
            sessions,
            cookie_options,
        }
    }

    /// Trades an authorization code for an access token. Never retried.
    pub async fn exchange_authorization_code(
        &self,
        code: &str,
        client_id: &str,
        code_verifier: &str,
        redirect_uri: &str,
    ) -> Result<TokenExchangeResult, AuthError> {
        let form = TokenExchangeForm {
            code: code.to_string(),
            client_id: client_id.to_string(),
            code_verifier: code_verifier.to_string(),
            redirect_uri: redirect_uri.to_string(),
        };
        self.idp.exchange_token(&form).await.map_err(|err| {
            tracing::error!(error = %err, client_id, "Authorization code exchange failed");
            AuthError::from(err)
        })
    }

    /// Binds the widget-flow token to an existing session.
    ///
    /// The IdP identity behind the token must name the session's local user;
    /// otherwise the session is left untouched.
    pub async fn complete_login(
        &self,
        session_id: SessionId,
        exchange: &TokenExchangeResult,
    ) -> Result<Issued<CompletedLogin>, AuthError> {
        let identity = self.idp.get_user(&exchange.access_token).await?;

        let record = self
            .store
            .find_by_session_id(session_id)
            .await?
            .ok_or(SessionError::Unknown)?;
        let user = self
            .users
            .get_by_id(record.user_id)
            .await?
            .ok_or(AuthError::UserNotFound(record.user_id))?;

        if !user.matches_identity(&identity.name) {
            tracing::warn!(
                %session_id,
                user_id = %user.id,
                idp_identity = %identity.name,
                "MFA identity does not match session user"
            );
            return Err(AuthError::IdentityMismatch);
        }

        self.sessions.heartbeat(session_id).await?;

        if !self
            .store
            .set_mfa_token(session_id, &exchange.access_token)
            .await?
        {
            tracing::info!(%session_id, "Session removed before the MFA token was bound");
            return Err(SessionError::Unknown.into());
        }
        tracing::info!(%session_id, user_id = %user.id, "MFA login completed");

        Ok(Issued {
            payload: CompletedLogin {
                username: user.name,
                display_name: user.display_name,
            },
            cookie: self.primary_cookie(exchange),
        })
    }

    /// Sets the primary cookie for a widget-flow login with no prior session.
    ///
    /// When `enable_widget_flow` is set, the local user mapped to `client_id`
    /// gets a new session carrying the token; otherwise no session is created
    /// and the mapping is not consulted.
    pub async fn set_auth_cookie(
        &self,
        enable_widget_flow: bool,
        client_id: &str,
        exchange: &TokenExchangeResult,
    ) -> Result<Issued<AuthCookieGrant>, AuthError> {
        let session_uuid = if enable_widget_flow {
            let user_id = self
                .users
                .get_mfa_user_mapping(client_id)
                .await?
                .ok_or_else(|| AuthError::UnmappedClient(client_id.to_string()))?;
            self.sessions
                .create_session(user_id, Some(exchange.access_token.clone()))
                .await?
                .to_string()
        } else {
            String::new()
        };

        let identity = self.idp.get_user(&exchange.access_token).await?;

        Ok(Issued {
            payload: AuthCookieGrant {
                mfa_username: identity.name,
                session_uuid,
            },
            cookie: self.primary_cookie(exchange),
        })
    }

    fn primary_cookie(&self, exchange: &TokenExchangeResult) -> String {
        build_auth_cookie(
            PRIMARY_COOKIE_NAME,
            &exchange.access_token,
            COOKIE_PATH,
            self.cookie_options,
        )
    }
}
