use std::sync::Arc;

use crate::{
    config::Config,
    repositories::{SessionStore, UserDirectory},
    services::{
        idp_client::IdpClient, local_login::LocalLogin, oauth_exchange::OAuthExchange,
        orchestrator::AuthOrchestrator, session_lifecycle::SessionManager,
    },
};

/// Shared handles for every request. Services are cheap views over these.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn SessionStore>,
    pub users: Arc<dyn UserDirectory>,
    pub idp: Arc<dyn IdpClient>,
}

impl AppState {
    pub fn new(
        config: Config,
        store: Arc<dyn SessionStore>,
        users: Arc<dyn UserDirectory>,
        idp: Arc<dyn IdpClient>,
    ) -> Self {
        Self {
            config,
            store,
            users,
            idp,
        }
    }

    pub fn orchestrator(&self) -> AuthOrchestrator {
        AuthOrchestrator::new(
            self.idp.clone(),
            self.config.idp_handle_retry_limit,
            self.config.cookie_options(),
        )
    }

    pub fn sessions(&self) -> SessionManager {
        SessionManager::new(
            self.store.clone(),
            self.idp.clone(),
            self.config.session_inactive_time_secs,
            self.config.cookie_options(),
        )
    }

    pub fn oauth(&self) -> OAuthExchange {
        OAuthExchange::new(
            self.idp.clone(),
            self.store.clone(),
            self.users.clone(),
            self.sessions(),
            self.config.cookie_options(),
        )
    }

    pub fn local_login(&self) -> LocalLogin {
        LocalLogin::new(
            self.users.clone(),
            self.sessions(),
            self.config.mobile_inactive_time_secs,
        )
    }
}
