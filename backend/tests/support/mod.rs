#![allow(dead_code)]
use async_trait::async_trait;
use authbroker_backend::{
    config::Config,
    error::IdpError,
    handlers,
    middleware::{log_error_responses, request_id},
    models::{auth::AuthRequest, session::SessionRecord, user::User},
    repositories::{MemorySessionStore, SessionStore, UserDirectory},
    services::idp_client::{
        AdvanceResponse, IdpClient, IdpUser, TokenExchangeForm, TokenExchangeResult,
    },
    state::AppState,
    types::UserId,
    utils::{cookies::SameSite, hash_password, now_utc_seconds},
};
use axum::{
    body::{to_bytes, Body},
    http::{header, Request, Response},
    middleware, Router,
};
use chrono::TimeDelta;
use serde_json::Value;
use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex},
};

pub const TEST_PASSWORD: &str = "correct horse battery";

pub fn test_config() -> Config {
    Config {
        database_url: std::env::var("TEST_DATABASE_URL")
            .unwrap_or_else(|_| "postgres://localhost:5432/authbroker_test".into()),
        bind_addr: "127.0.0.1:0".into(),
        tenant_url: "https://tenant.example".into(),
        oauth_application_id: "widget_app".into(),
        session_inactive_time_secs: 900,
        mobile_inactive_time_secs: 60,
        demo_app_base_url: "https://app.example".into(),
        backend_server_port: "8443".into(),
        idp_handle_retry_limit: 5,
        idp_request_timeout_secs: 5,
        cookie_same_site: SameSite::Lax,
    }
}

/// IdP double answering from queued scripts and recording every call.
#[derive(Default)]
pub struct ScriptedIdp {
    starts: Mutex<VecDeque<Result<Value, String>>>,
    advances: Mutex<VecDeque<AdvanceResponse>>,
    challenges: Mutex<VecDeque<Value>>,
    logout_error: Mutex<Option<String>>,
    access_token: Mutex<Option<String>>,
    identities: Mutex<HashMap<String, String>>,

    pub start_calls: Mutex<Vec<AuthRequest>>,
    pub challenge_tokens: Mutex<Vec<String>>,
    pub logout_tokens: Mutex<Vec<String>>,
    pub exchanges: Mutex<Vec<TokenExchangeForm>>,
}

impl ScriptedIdp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_start(self, body: Value) -> Self {
        self.starts.lock().unwrap().push_back(Ok(body));
        self
    }

    pub fn on_start_transport_error(self, message: &str) -> Self {
        self.starts.lock().unwrap().push_back(Err(message.to_string()));
        self
    }

    pub fn on_advance(self, body: Value, set_cookies: &[&str]) -> Self {
        self.advances.lock().unwrap().push_back(AdvanceResponse {
            body,
            set_cookies: set_cookies.iter().map(|c| c.to_string()).collect(),
        });
        self
    }

    pub fn on_challenge(self, body: Value) -> Self {
        self.challenges.lock().unwrap().push_back(body);
        self
    }

    pub fn failing_logout(self, message: &str) -> Self {
        *self.logout_error.lock().unwrap() = Some(message.to_string());
        self
    }

    pub fn issuing_token(self, token: &str, identity: &str) -> Self {
        *self.access_token.lock().unwrap() = Some(token.to_string());
        self.identities
            .lock()
            .unwrap()
            .insert(token.to_string(), identity.to_string());
        self
    }

    pub fn start_count(&self) -> usize {
        self.start_calls.lock().unwrap().len()
    }

    pub fn logouts(&self) -> Vec<String> {
        self.logout_tokens.lock().unwrap().clone()
    }
}

fn unscripted(call: &str) -> IdpError {
    IdpError::UnexpectedShape(format!("no scripted response for {call}"))
}

#[async_trait]
impl IdpClient for ScriptedIdp {
    async fn start_authentication(&self, request: &AuthRequest) -> Result<Value, IdpError> {
        self.start_calls.lock().unwrap().push(request.clone());
        match self.starts.lock().unwrap().pop_front() {
            Some(Ok(body)) => Ok(body),
            Some(Err(message)) => Err(IdpError::Status {
                status: 502,
                body: message,
            }),
            None => Err(unscripted("StartAuthentication")),
        }
    }

    async fn advance_authentication(&self, _payload: &Value) -> Result<AdvanceResponse, IdpError> {
        self.advances
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| unscripted("AdvanceAuthentication"))
    }

    async fn start_challenge(&self, token: &str, _request: &AuthRequest) -> Result<Value, IdpError> {
        self.challenge_tokens.lock().unwrap().push(token.to_string());
        self.challenges
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| unscripted("StartChallenge"))
    }

    async fn logout(&self, token: &str) -> Result<Value, IdpError> {
        self.logout_tokens.lock().unwrap().push(token.to_string());
        match self.logout_error.lock().unwrap().clone() {
            Some(message) => Err(IdpError::Status {
                status: 500,
                body: message,
            }),
            None => Ok(serde_json::json!({ "success": true, "Result": null })),
        }
    }

    async fn exchange_token(
        &self,
        form: &TokenExchangeForm,
    ) -> Result<TokenExchangeResult, IdpError> {
        self.exchanges.lock().unwrap().push(form.clone());
        self.access_token
            .lock()
            .unwrap()
            .clone()
            .map(|access_token| TokenExchangeResult { access_token })
            .ok_or_else(|| IdpError::Status {
                status: 400,
                body: "invalid_grant".into(),
            })
    }

    async fn get_user(&self, token: &str) -> Result<IdpUser, IdpError> {
        self.identities
            .lock()
            .unwrap()
            .get(token)
            .map(|name| IdpUser { name: name.clone() })
            .ok_or_else(|| IdpError::Status {
                status: 401,
                body: "unknown token".into(),
            })
    }
}

/// Fixed user directory for router tests.
#[derive(Default)]
pub struct StaticUsers {
    users: Vec<User>,
    mappings: HashMap<String, UserId>,
}

impl StaticUsers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, id: i32, name: &str) -> Self {
        self.users.push(User {
            id: UserId(id),
            name: name.to_string(),
            display_name: format!("{name} (display)"),
            password_hash: hash_password(TEST_PASSWORD).expect("hash password"),
        });
        self
    }

    pub fn with_mapping(mut self, client_id: &str, user_id: i32) -> Self {
        self.mappings.insert(client_id.to_string(), UserId(user_id));
        self
    }
}

#[async_trait]
impl UserDirectory for StaticUsers {
    async fn get_by_id(&self, id: UserId) -> Result<Option<User>, sqlx::Error> {
        Ok(self.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<User>, sqlx::Error> {
        Ok(self
            .users
            .iter()
            .find(|u| u.name.eq_ignore_ascii_case(name))
            .cloned())
    }

    async fn get_mfa_user_mapping(&self, client_id: &str) -> Result<Option<UserId>, sqlx::Error> {
        Ok(self.mappings.get(client_id).copied())
    }
}

pub struct TestApp {
    pub router: Router,
    pub idp: Arc<ScriptedIdp>,
    pub store: MemorySessionStore,
}

impl TestApp {
    pub fn new(idp: ScriptedIdp, users: StaticUsers) -> Self {
        Self::with_config(idp, users, test_config())
    }

    pub fn with_config(idp: ScriptedIdp, users: StaticUsers, config: Config) -> Self {
        let idp = Arc::new(idp);
        let store = MemorySessionStore::new();
        let state = AppState::new(
            config,
            Arc::new(store.clone()),
            Arc::new(users),
            idp.clone(),
        );
        let router = handlers::router(state)
            .layer(middleware::from_fn(log_error_responses))
            .layer(middleware::from_fn(request_id));
        Self { router, idp, store }
    }

    /// Stores a session for `user_id` that has been idle for `idle_secs`.
    pub async fn seed_session(
        &self,
        user_id: i32,
        mfa_token: Option<&str>,
        idle_secs: i64,
    ) -> SessionRecord {
        let record = SessionRecord::new(
            UserId(user_id),
            mfa_token.map(str::to_string),
            now_utc_seconds() - TimeDelta::seconds(idle_secs),
        );
        self.store.save(&record).await.expect("seed session");
        record
    }
}

pub fn post_json(uri: &str, body: Value, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub async fn response_json(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}

pub fn set_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|value| value.to_str().unwrap().to_string())
        .collect()
}

/// Pool for repository tests, or `None` when `TEST_DATABASE_URL` is unset.
pub async fn test_pool() -> Option<sqlx::PgPool> {
    let url = std::env::var("TEST_DATABASE_URL").ok()?;
    let pool = authbroker_backend::db::connection::create_pool(&url)
        .await
        .expect("connect to TEST_DATABASE_URL");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("run migrations");
    Some(pool)
}

pub async fn seed_db_user(pool: &sqlx::PgPool, name: &str) -> User {
    sqlx::query_as::<_, User>(
        "INSERT INTO users (name, display_name, password_hash) VALUES ($1, $2, $3) \
         RETURNING id, name, display_name, password_hash",
    )
    .bind(name)
    .bind(format!("{name} (display)"))
    .bind(hash_password(TEST_PASSWORD).expect("hash password"))
    .fetch_one(pool)
    .await
    .expect("insert user")
}
