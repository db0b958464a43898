//! Error taxonomy for the broker.
//!
//! Domain services return [`IdpError`], [`SessionError`] or [`AuthError`];
//! handlers convert them into [`AppError`], which renders the JSON envelope.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::types::UserId;

pub const SESSION_ENDED_MESSAGE: &str = "User Session Ended. Please login again to proceed.";
pub const IDENTITY_MISMATCH_MESSAGE: &str = "Invalid Tokens. Login Failed";
pub const INVALID_CREDENTIALS_MESSAGE: &str = "Invalid Username or Password";

/// Failures talking to the identity provider.
#[derive(Debug, Error)]
pub enum IdpError {
    #[error("IdP request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("IdP returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Unexpected IdP response: {0}")]
    UnexpectedShape(String),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session not found. Please login again to proceed.")]
    Unknown,
    #[error("{}", SESSION_ENDED_MESSAGE)]
    Ended,
    #[error("Session storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error(transparent)]
    Idp(#[from] IdpError),
    #[error("IdP handle-invalidation loop exceeded after {attempts} attempts")]
    HandleRetryExhausted { attempts: u32 },
    #[error("{}", IDENTITY_MISMATCH_MESSAGE)]
    IdentityMismatch,
    #[error("{}", INVALID_CREDENTIALS_MESSAGE)]
    InvalidCredentials,
    #[error("No local user is mapped to MFA client {0}")]
    UnmappedClient(String),
    #[error("User {0} not found")]
    UserNotFound(UserId),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ErrorResponse {
    pub success: bool,
    pub error_message: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    Unauthorized(String),
    Forbidden(String),
    BadRequest(String),
    /// IdP transport or shape failure; the message is returned to the caller.
    Upstream(String),
    ServiceUnavailable(String),
    InternalServerError(anyhow::Error),
    Validation(Vec<String>),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message, code, details) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, "NOT_FOUND", None),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg, "UNAUTHORIZED", None),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg, "FORBIDDEN", None),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, "BAD_REQUEST", None),
            AppError::Upstream(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg, "IDP_ERROR", None),
            AppError::ServiceUnavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                msg,
                "IDP_RETRY_EXHAUSTED",
                None,
            ),
            AppError::InternalServerError(err) => {
                tracing::error!("Internal server error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    "INTERNAL_SERVER_ERROR",
                    None,
                )
            }
            AppError::Validation(errors) => (
                StatusCode::BAD_REQUEST,
                "Validation failed".to_string(),
                "VALIDATION_ERROR",
                Some(serde_json::json!({ "errors": errors })),
            ),
        };

        let body = Json(ErrorResponse {
            success: false,
            error_message,
            code: code.to_string(),
            details,
        });

        (status, body).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalServerError(err)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::InternalServerError(err.into())
    }
}

impl From<IdpError> for AppError {
    fn from(err: IdpError) -> Self {
        tracing::error!(error = %err, "Identity provider call failed");
        AppError::Upstream(err.to_string())
    }
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Unknown | SessionError::Ended => AppError::Unauthorized(err.to_string()),
            SessionError::Storage(e) => e.into(),
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Idp(e) => e.into(),
            AuthError::HandleRetryExhausted { .. } => {
                tracing::error!(error = %err, "Giving up on stale IdP handle invalidation");
                AppError::ServiceUnavailable(err.to_string())
            }
            AuthError::IdentityMismatch => AppError::Forbidden(err.to_string()),
            AuthError::InvalidCredentials
            | AuthError::UnmappedClient(_)
            | AuthError::UserNotFound(_) => AppError::NotFound(err.to_string()),
            AuthError::Session(e) => e.into(),
            AuthError::Storage(e) => e.into(),
            AuthError::Internal(e) => AppError::InternalServerError(e),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let messages: Vec<String> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| {
                    let code = e.code.as_ref();
                    format!("{}: {}", field, code)
                })
            })
            .collect();
        AppError::Validation(messages)
    }
}
