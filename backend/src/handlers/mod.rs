//! HTTP surface of the broker.

pub mod auth;
pub mod health;
pub mod oauth;
pub mod sessions;

use axum::{
    http::{
        header::{COOKIE, SET_COOKIE},
        HeaderMap, HeaderValue,
    },
    response::Response,
    routing::{get, post},
    Router,
};

use crate::{
    state::AppState,
    utils::cookies::{extract_cookie_value, FLOW_COOKIE_NAME, WIDGET_FLOW_VALUE},
};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/auth/beginAuth", post(auth::begin_auth))
        .route("/api/auth/advanceAuth", post(auth::advance_auth))
        .route("/api/auth/beginChallenge", post(auth::begin_challenge))
        .route("/api/auth/out", post(auth::logout))
        .route("/api/auth/logoutSession", post(sessions::logout_session))
        .route("/api/HeartBeat", post(sessions::heartbeat))
        .route("/api/BasicLogin", post(sessions::basic_login))
        .route("/api/CompleteLogin", post(oauth::complete_login))
        .route("/api/setAuthCookie", post(oauth::set_auth_cookie))
        .route("/api/RedirectResource", get(oauth::redirect_resource))
        .route("/api/health", get(health::health))
        .with_state(state)
}

/// Appends `Set-Cookie` lines to a response.
pub(crate) fn with_cookies(mut response: Response, cookies: &[String]) -> Response {
    for cookie in cookies {
        match HeaderValue::from_str(cookie) {
            Ok(value) => {
                response.headers_mut().append(SET_COOKIE, value);
            }
            Err(err) => tracing::error!(error = %err, "Dropping malformed Set-Cookie value"),
        }
    }
    response
}

/// Reads a cookie from any of the request's `Cookie` headers.
pub(crate) fn request_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(|header| extract_cookie_value(header, name))
        .filter(|value| !value.is_empty())
}

pub(crate) fn widget_flow_enabled(headers: &HeaderMap) -> bool {
    request_cookie(headers, FLOW_COOKIE_NAME).as_deref() == Some(WIDGET_FLOW_VALUE)
}
