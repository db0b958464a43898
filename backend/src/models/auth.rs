//! Request and response payloads exchanged with the browser.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use validator::Validate;

use crate::types::SessionId;
use crate::utils::secret::SecretBuffer;

/// Body for start-authentication and start-challenge calls.
///
/// Only the fields the broker inspects are named; everything else is carried
/// through to the IdP untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AuthRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
/// Authorization code returned to the widget flow, plus its PKCE verifier.
pub struct AdvanceLoginRequest {
    #[validate(length(min = 1))]
    pub authorization_code: String,
    #[validate(length(min = 1))]
    pub client_id: String,
    #[validate(length(min = 1))]
    pub code_verifier: String,
    #[serde(default)]
    pub session_uuid: Option<SessionId>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMetadata {
    pub session_uuid: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct BasicLoginRequest {
    #[validate(length(min = 1))]
    pub username: String,
    #[serde(alias = "Password")]
    pub password: SecretBuffer,
}

#[derive(Debug, Clone, Deserialize)]
/// Query string the IdP appends when redirecting back after authorization.
pub struct RedirectQuery {
    pub code: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
/// Success envelope for responses the broker produces itself. Failures are
/// rendered by `AppError`.
pub struct ApiResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

impl ApiResponse {
    pub fn ok() -> Self {
        Self {
            success: true,
            result: None,
        }
    }

    pub fn with_result(result: impl Serialize) -> Self {
        Self {
            success: true,
            result: serde_json::to_value(result).ok(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BasicLoginResult {
    #[serde(rename = "SessionUuid")]
    pub session_uuid: SessionId,
    #[serde(rename = "MFAUserName")]
    pub mfa_user_name: String,
    #[serde(rename = "MobileBackgroundInactiveTimeout")]
    pub mobile_background_inactive_timeout: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CompletedLogin {
    pub username: String,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthCookieGrant {
    #[serde(rename = "mfaUsername")]
    pub mfa_username: String,
    /// Empty when the widget flow is disabled and no session was created.
    #[serde(rename = "SessionUuid")]
    pub session_uuid: String,
}
