use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;

use crate::{
    error::{AppError, SESSION_ENDED_MESSAGE},
    handlers::{request_cookie, widget_flow_enabled, with_cookies},
    models::auth::{ApiResponse, AuthRequest},
    services::orchestrator::{AuthOutcome, Verdict},
    state::AppState,
    utils::cookies::{clear_credential_cookies, PRIMARY_COOKIE_NAME},
};

pub async fn begin_auth(
    State(state): State<AppState>,
    Json(payload): Json<AuthRequest>,
) -> Result<Response, AppError> {
    let outcome = state
        .orchestrator()
        .begin_authentication(&payload)
        .await?;
    Ok(render_outcome(outcome))
}

pub async fn advance_auth(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> Result<Response, AppError> {
    let outcome = state
        .orchestrator()
        .advance_authentication(&payload)
        .await?;
    Ok(render_outcome(outcome))
}

pub async fn begin_challenge(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<AuthRequest>,
) -> Result<Response, AppError> {
    let token = request_cookie(&headers, PRIMARY_COOKIE_NAME)
        .ok_or_else(|| AppError::Forbidden(SESSION_ENDED_MESSAGE.to_string()))?;
    let outcome = state
        .orchestrator()
        .start_challenge(&token, &payload)
        .await?;
    Ok(render_outcome(outcome))
}

/// Logs the presented token out at the IdP and clears both credential cookies.
///
/// Under the widget flow the sessions of the user holding the token are
/// removed as well. The clear-cookie writes are attached to every response,
/// including failures.
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let cookie_options = state.config.cookie_options();

    let Some(token) = request_cookie(&headers, PRIMARY_COOKIE_NAME) else {
        tracing::debug!("Logout without a primary cookie; clearing cookies only");
        return with_cookies(
            Json(ApiResponse::ok()).into_response(),
            &clear_credential_cookies(cookie_options),
        );
    };

    let cleanup = widget_flow_enabled(&headers);
    let context = if cleanup {
        match state.store.find_by_mfa_token(&token).await {
            Ok(context) => context,
            Err(err) => {
                return with_cookies(
                    AppError::from(err).into_response(),
                    &clear_credential_cookies(cookie_options),
                );
            }
        }
    } else {
        None
    };

    let result = state
        .sessions()
        .logout_by_token(&token, cleanup, context.as_ref())
        .await;
    let response = match result.outcome {
        Ok(body) => Json(body).into_response(),
        Err(err) => AppError::from(err).into_response(),
    };
    with_cookies(response, &result.cookies)
}

fn render_outcome(outcome: AuthOutcome) -> Response {
    let status = match outcome.verdict {
        Verdict::Accepted => StatusCode::OK,
        Verdict::Rejected => StatusCode::BAD_REQUEST,
    };
    with_cookies((status, Json(outcome.body)).into_response(), &outcome.cookies)
}
