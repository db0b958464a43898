//! Identity provider adapter.
//!
//! The broker only depends on the narrow [`IdpClient`] trait; [`HttpIdpClient`]
//! is the reqwest implementation used in production.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderValue, CACHE_CONTROL, SET_COOKIE},
    Client, Response,
};
use serde::Deserialize;
use serde_json::Value;

use crate::{error::IdpError, models::auth::AuthRequest, utils::secret::mask_secret};

const NATIVE_CLIENT_HEADER: &str = "X-IDAP-NATIVE-CLIENT";

/// Body and cookies of an AdvanceAuthentication round-trip.
#[derive(Debug, Clone, PartialEq)]
pub struct AdvanceResponse {
    pub body: Value,
    /// Raw `Set-Cookie` header lines, in the order the IdP sent them.
    pub set_cookies: Vec<String>,
}

/// Authorization-code grant with PKCE verifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenExchangeForm {
    pub code: String,
    pub client_id: String,
    pub code_verifier: String,
    pub redirect_uri: String,
}

#[derive(Clone, PartialEq, Eq)]
pub struct TokenExchangeResult {
    pub access_token: String,
}

impl fmt::Debug for TokenExchangeResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenExchangeResult")
            .field("access_token", &mask_secret(&self.access_token))
            .finish()
    }
}

/// Identity the IdP associates with a bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdpUser {
    pub name: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdpClient: Send + Sync {
    async fn start_authentication(&self, request: &AuthRequest) -> Result<Value, IdpError>;

    async fn advance_authentication(&self, payload: &Value)
        -> Result<AdvanceResponse, IdpError>;

    async fn start_challenge(&self, token: &str, request: &AuthRequest)
        -> Result<Value, IdpError>;

    async fn logout(&self, token: &str) -> Result<Value, IdpError>;

    async fn exchange_token(
        &self,
        form: &TokenExchangeForm,
    ) -> Result<TokenExchangeResult, IdpError>;

    async fn get_user(&self, token: &str) -> Result<IdpUser, IdpError>;
}

#[derive(Clone)]
pub struct HttpIdpClient {
    http: Client,
    tenant_url: String,
    oauth_application_id: String,
}

impl HttpIdpClient {
    pub fn new(
        tenant_url: &str,
        oauth_application_id: &str,
        timeout: Duration,
    ) -> Result<Self, IdpError> {
        let mut headers = HeaderMap::new();
        headers.insert(NATIVE_CLIENT_HEADER, HeaderValue::from_static("true"));
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));

        let http = Client::builder()
            .user_agent("authbroker-backend/1.0")
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http,
            tenant_url: tenant_url.trim_end_matches('/').to_string(),
            oauth_application_id: oauth_application_id.to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.tenant_url, path)
    }
}

#[async_trait]
impl IdpClient for HttpIdpClient {
    async fn start_authentication(&self, request: &AuthRequest) -> Result<Value, IdpError> {
        tracing::debug!(user = ?request.user, "Starting IdP authentication");
        let response = self
            .http
            .post(self.url("/Security/StartAuthentication"))
            .json(request)
            .send()
            .await?;
        read_json(response).await
    }

    async fn advance_authentication(
        &self,
        payload: &Value,
    ) -> Result<AdvanceResponse, IdpError> {
        let response = self
            .http
            .post(self.url("/Security/AdvanceAuthentication"))
            .json(payload)
            .send()
            .await?;

        let set_cookies = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .map(str::to_string)
            .collect();
        let body = read_json(response).await?;

        Ok(AdvanceResponse { body, set_cookies })
    }

    async fn start_challenge(
        &self,
        token: &str,
        request: &AuthRequest,
    ) -> Result<Value, IdpError> {
        let response = self
            .http
            .post(self.url("/Security/StartChallenge"))
            .bearer_auth(token)
            .json(request)
            .send()
            .await?;
        read_json(response).await
    }

    async fn logout(&self, token: &str) -> Result<Value, IdpError> {
        tracing::debug!(token = %mask_secret(token), "Invalidating token at IdP");
        let response = self
            .http
            .post(self.url("/Security/Logout"))
            .bearer_auth(token)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .send()
            .await?;
        read_json(response).await
    }

    async fn exchange_token(
        &self,
        form: &TokenExchangeForm,
    ) -> Result<TokenExchangeResult, IdpError> {
        let params = [
            ("code", form.code.as_str()),
            ("grant_type", "authorization_code"),
            ("redirect_uri", form.redirect_uri.as_str()),
            ("client_id", form.client_id.as_str()),
            ("code_verifier", form.code_verifier.as_str()),
        ];

        let response = self
            .http
            .post(self.url(&format!("/oauth2/token/{}", self.oauth_application_id)))
            .form(&params)
            .send()
            .await?;

        let body = read_json(response).await?;
        let token: TokenEndpointResponse = serde_json::from_value(body).map_err(|e| {
            IdpError::UnexpectedShape(format!("token response without access_token: {}", e))
        })?;
        if token.access_token.is_empty() {
            return Err(IdpError::UnexpectedShape(
                "token response carried an empty access_token".into(),
            ));
        }

        Ok(TokenExchangeResult {
            access_token: token.access_token,
        })
    }

    async fn get_user(&self, token: &str) -> Result<IdpUser, IdpError> {
        let response = self
            .http
            .get(self.url("/CDirectoryService/GetUser"))
            .bearer_auth(token)
            .send()
            .await?;

        let body = read_json(response).await?;
        body.get("Result")
            .and_then(|result| result.get("Name"))
            .and_then(Value::as_str)
            .map(|name| IdpUser {
                name: name.to_string(),
            })
            .ok_or_else(|| IdpError::UnexpectedShape("GetUser response without Result.Name".into()))
    }
}

#[derive(Debug, Deserialize)]
struct TokenEndpointResponse {
    access_token: String,
}

async fn read_json(response: Response) -> Result<Value, IdpError> {
    let status = response.status();
    let text = response.text().await?;
    if !status.is_success() {
        return Err(IdpError::Status {
            status: status.as_u16(),
            body: text,
        });
    }
    serde_json::from_str(&text)
        .map_err(|e| IdpError::UnexpectedShape(format!("response is not JSON: {}", e)))
}
