use axum::{extract::State, Json};
use validator::Validate;

use crate::{
    error::{AppError, SessionError},
    models::auth::{ApiResponse, BasicLoginRequest, SessionMetadata},
    state::AppState,
    types::SessionId,
};

pub async fn heartbeat(
    State(state): State<AppState>,
    Json(payload): Json<SessionMetadata>,
) -> Result<Json<ApiResponse>, AppError> {
    let session_id = parse_session_id(&payload.session_uuid).ok_or(SessionError::Unknown)?;
    state.sessions().heartbeat(session_id).await?;
    Ok(Json(ApiResponse::ok()))
}

pub async fn logout_session(
    State(state): State<AppState>,
    Json(payload): Json<SessionMetadata>,
) -> Result<Json<ApiResponse>, AppError> {
    if let Some(session_id) = parse_session_id(&payload.session_uuid) {
        state.sessions().logout_by_session(session_id).await?;
    }
    Ok(Json(ApiResponse::ok()))
}

pub async fn basic_login(
    State(state): State<AppState>,
    Json(payload): Json<BasicLoginRequest>,
) -> Result<Json<ApiResponse>, AppError> {
    payload.validate()?;
    let result = state
        .local_login()
        .login(&payload.username, &payload.password)
        .await?;
    Ok(Json(ApiResponse::with_result(result)))
}

/// Strips line breaks and surrounding whitespace before parsing.
fn parse_session_id(raw: &str) -> Option<SessionId> {
    let cleaned: String = raw.chars().filter(|c| !matches!(c, '\r' | '\n')).collect();
    cleaned.trim().parse().ok()
}
