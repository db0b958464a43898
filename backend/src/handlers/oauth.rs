use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use validator::Validate;

use crate::{
    error::AppError,
    handlers::{widget_flow_enabled, with_cookies},
    models::auth::{AdvanceLoginRequest, ApiResponse, RedirectQuery},
    state::AppState,
};

/// Exchanges the widget-flow authorization code and binds the token to the
/// caller's existing session.
pub async fn complete_login(
    State(state): State<AppState>,
    Json(payload): Json<AdvanceLoginRequest>,
) -> Result<Response, AppError> {
    payload.validate()?;
    let session_id = payload
        .session_uuid
        .ok_or_else(|| AppError::BadRequest("sessionUuid is required".into()))?;

    let oauth = state.oauth();
    let exchange = oauth
        .exchange_authorization_code(
            &payload.authorization_code,
            &payload.client_id,
            &payload.code_verifier,
            &state.config.redirect_uri(),
        )
        .await?;
    let issued = oauth.complete_login(session_id, &exchange).await?;

    Ok(with_cookies(
        Json(ApiResponse::with_result(issued.payload)).into_response(),
        &[issued.cookie],
    ))
}

pub async fn set_auth_cookie(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<AdvanceLoginRequest>,
) -> Result<Response, AppError> {
    payload.validate()?;
    let oauth = state.oauth();
    let exchange = oauth
        .exchange_authorization_code(
            &payload.authorization_code,
            &payload.client_id,
            &payload.code_verifier,
            &state.config.redirect_uri(),
        )
        .await?;
    let issued = oauth
        .set_auth_cookie(widget_flow_enabled(&headers), &payload.client_id, &exchange)
        .await?;

    Ok(with_cookies(
        Json(ApiResponse::with_result(issued.payload)).into_response(),
        &[issued.cookie],
    ))
}

/// Landing point of the IdP's authorization redirect.
pub async fn redirect_resource(
    Query(query): Query<RedirectQuery>,
) -> Result<Json<ApiResponse>, AppError> {
    if let Some(error) = query.error {
        tracing::warn!(error = %error, "IdP redirect reported an authorization error");
        return Err(AppError::BadRequest(
            query.error_description.unwrap_or(error),
        ));
    }

    let code = query
        .code
        .filter(|code| !code.is_empty())
        .ok_or_else(|| AppError::BadRequest("Authorization code is missing".into()))?;
    Ok(Json(ApiResponse::with_result(
        json!({ "AuthorizationCode": code }),
    )))
}
