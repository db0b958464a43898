//! Primary login handshake with the identity provider.
//!
//! Start → (stale handle? logout and restart) → advance … → concluded, with an
//! optional second-factor challenge. IdP bodies are passed back to the caller
//! as-is; only the fields that drive the state machine are inspected.

use std::sync::Arc;

use serde_json::Value;

use crate::{
    error::{AuthError, IdpError},
    models::auth::AuthRequest,
    services::idp_client::IdpClient,
    utils::cookies::{
        build_auth_cookie, encode_cookie_value, set_cookie_value, CookieOptions, COOKIE_PATH,
        HANDOFF_COOKIE_NAME, PRIMARY_COOKIE_NAME,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The IdP accepted the step; maps to 200.
    Accepted,
    /// The IdP reported `success: false`; maps to 400.
    Rejected,
}

/// Result of one orchestration call, ready to be rendered by the web layer.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthOutcome {
    pub verdict: Verdict,
    pub body: Value,
    /// `Set-Cookie` lines to attach to the response.
    pub cookies: Vec<String>,
}

impl AuthOutcome {
    fn accepted(body: Value) -> Self {
        Self {
            verdict: Verdict::Accepted,
            body,
            cookies: Vec::new(),
        }
    }

    fn rejected(body: Value) -> Self {
        Self {
            verdict: Verdict::Rejected,
            body,
            cookies: Vec::new(),
        }
    }
}

pub struct AuthOrchestrator {
    idp: Arc<dyn IdpClient>,
    retry_limit: u32,
    cookie_options: CookieOptions,
}

impl AuthOrchestrator {
    pub fn new(idp: Arc<dyn IdpClient>, retry_limit: u32, cookie_options: CookieOptions) -> Self {
        Self {
            idp,
            retry_limit: retry_limit.max(1),
            cookie_options,
        }
    }

    /// Starts authentication, invalidating any unfinished remote context first.
    ///
    /// Each pass either returns or logs out one stale handle; after
    /// `retry_limit` start attempts the loop gives up with
    /// [`AuthError::HandleRetryExhausted`].
    pub async fn begin_authentication(
        &self,
        request: &AuthRequest,
    ) -> Result<AuthOutcome, AuthError> {
        for attempt in 1..=self.retry_limit {
            let body = self.idp.start_authentication(request).await?;

            if !success_flag(&body)? {
                tracing::debug!(attempt, "IdP rejected start authentication");
                return Ok(AuthOutcome::rejected(body));
            }

            let Some(handle) = stale_handle(&body)? else {
                return Ok(AuthOutcome::accepted(body));
            };

            tracing::info!(
                attempt,
                limit = self.retry_limit,
                "IdP holds an unfinished authentication; invalidating stale handle"
            );
            self.idp.logout(&handle).await?;
        }

        Err(AuthError::HandleRetryExhausted {
            attempts: self.retry_limit,
        })
    }

    /// Forwards one step of the multi-step flow.
    ///
    /// Once the IdP identifies the user, its `.ASPXAUTH` session value is
    /// re-emitted under the hand-off cookie; the IdP's own `Set-Cookie`
    /// headers never reach the browser.
    pub async fn advance_authentication(&self, payload: &Value) -> Result<AuthOutcome, AuthError> {
        let response = self.idp.advance_authentication(payload).await?;

        if !has_identified_user(&response.body) {
            return Ok(AuthOutcome::accepted(response.body));
        }

        let token = response
            .set_cookies
            .iter()
            .find_map(|line| set_cookie_value(line, PRIMARY_COOKIE_NAME))
            .filter(|value| !value.is_empty())
            .ok_or_else(|| {
                IdpError::UnexpectedShape(format!(
                    "authentication concluded without a {} cookie",
                    PRIMARY_COOKIE_NAME
                ))
            })?;

        let cookie = build_auth_cookie(
            HANDOFF_COOKIE_NAME,
            &encode_cookie_value(&token),
            COOKIE_PATH,
            self.cookie_options,
        );
        tracing::info!("IdP authentication concluded; issuing hand-off cookie");

        let mut outcome = AuthOutcome::accepted(response.body);
        outcome.cookies.push(cookie);
        Ok(outcome)
    }

    pub async fn start_challenge(
        &self,
        token: &str,
        request: &AuthRequest,
    ) -> Result<AuthOutcome, AuthError> {
        let body = self.idp.start_challenge(token, request).await?;
        if success_flag(&body)? {
            Ok(AuthOutcome::accepted(body))
        } else {
            Ok(AuthOutcome::rejected(body))
        }
    }
}

fn success_flag(body: &Value) -> Result<bool, IdpError> {
    body.get("success")
        .and_then(Value::as_bool)
        .ok_or_else(|| IdpError::UnexpectedShape("response has no boolean success field".into()))
}

/// Non-empty `Result.Auth` of a successful start response.
fn stale_handle(body: &Value) -> Result<Option<String>, IdpError> {
    let result = body
        .get("Result")
        .filter(|result| result.is_object())
        .ok_or_else(|| {
            IdpError::UnexpectedShape("successful start response has no Result object".into())
        })?;

    match result.get("Auth") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(handle)) if handle.is_empty() => Ok(None),
        Some(Value::String(handle)) => Ok(Some(handle.clone())),
        Some(other) => Err(IdpError::UnexpectedShape(format!(
            "Result.Auth is not a string: {}",
            other
        ))),
    }
}

fn has_identified_user(body: &Value) -> bool {
    body.get("Result")
        .and_then(|result| result.get("UserId"))
        .is_some_and(|user_id| !user_id.is_null())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::idp_client::{AdvanceResponse, MockIdpClient};
    use crate::utils::cookies::SameSite;
    use mockall::{predicate::eq, Sequence};
    use serde_json::json;

    fn options() -> CookieOptions {
        CookieOptions {
            same_site: SameSite::Lax,
        }
    }

    fn orchestrator(idp: MockIdpClient) -> AuthOrchestrator {
        AuthOrchestrator::new(Arc::new(idp), 5, options())
    }

    fn request() -> AuthRequest {
        AuthRequest {
            user: Some("alice".into()),
            version: Some("1.0".into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn stale_handle_triggers_exactly_one_logout_then_retry() {
        let mut idp = MockIdpClient::new();
        let mut seq = Sequence::new();
        idp.expect_start_authentication()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(json!({"success": true, "Result": {"Auth": "H1"}})));
        idp.expect_logout()
            .with(eq("H1"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(json!({"success": true})));
        idp.expect_start_authentication()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| {
                Ok(json!({"success": true, "Result": {"Auth": "", "SessionId": "s2"}}))
            });

        let outcome = orchestrator(idp)
            .begin_authentication(&request())
            .await
            .expect("outcome");
        assert_eq!(outcome.verdict, Verdict::Accepted);
        assert_eq!(outcome.body["Result"]["SessionId"], "s2");
        assert!(outcome.cookies.is_empty());
    }

    #[tokio::test]
    async fn rejection_is_returned_verbatim_without_retry() {
        let mut idp = MockIdpClient::new();
        idp.expect_start_authentication()
            .times(1)
            .returning(|_| Ok(json!({"success": false, "Message": "Unknown user"})));
        idp.expect_logout().never();

        let outcome = orchestrator(idp)
            .begin_authentication(&request())
            .await
            .expect("outcome");
        assert_eq!(outcome.verdict, Verdict::Rejected);
        assert_eq!(outcome.body, json!({"success": false, "Message": "Unknown user"}));
    }

    #[tokio::test]
    async fn rejection_after_logout_ends_the_loop() {
        let mut idp = MockIdpClient::new();
        let mut calls = 0;
        idp.expect_start_authentication().times(2).returning(move |_| {
            calls += 1;
            if calls == 1 {
                Ok(json!({"success": true, "Result": {"Auth": "H1"}}))
            } else {
                Ok(json!({"success": false, "Message": "locked"}))
            }
        });
        idp.expect_logout()
            .times(1)
            .returning(|_| Ok(json!({"success": true})));

        let outcome = orchestrator(idp)
            .begin_authentication(&request())
            .await
            .expect("outcome");
        assert_eq!(outcome.verdict, Verdict::Rejected);
    }

    #[tokio::test]
    async fn handle_loop_gives_up_after_the_cap() {
        let mut idp = MockIdpClient::new();
        idp.expect_start_authentication()
            .times(3)
            .returning(|_| Ok(json!({"success": true, "Result": {"Auth": "H"}})));
        idp.expect_logout()
            .times(3)
            .returning(|_| Ok(json!({"success": true})));

        let err = AuthOrchestrator::new(Arc::new(idp), 3, options())
            .begin_authentication(&request())
            .await
            .expect_err("cap");
        assert!(matches!(err, AuthError::HandleRetryExhausted { attempts: 3 }));
    }

    #[tokio::test]
    async fn missing_success_flag_is_a_shape_error() {
        let mut idp = MockIdpClient::new();
        idp.expect_start_authentication()
            .returning(|_| Ok(json!({"Result": {}})));

        let err = orchestrator(idp)
            .begin_authentication(&request())
            .await
            .expect_err("shape");
        assert!(matches!(err, AuthError::Idp(IdpError::UnexpectedShape(_))));
    }

    #[tokio::test]
    async fn successful_start_without_result_is_a_shape_error() {
        let mut idp = MockIdpClient::new();
        idp.expect_start_authentication()
            .returning(|_| Ok(json!({"success": true})));

        let err = orchestrator(idp)
            .begin_authentication(&request())
            .await
            .expect_err("shape");
        assert!(matches!(err, AuthError::Idp(IdpError::UnexpectedShape(_))));
    }

    #[tokio::test]
    async fn remote_logout_failure_during_retry_is_propagated() {
        let mut idp = MockIdpClient::new();
        idp.expect_start_authentication()
            .times(1)
            .returning(|_| Ok(json!({"success": true, "Result": {"Auth": "H1"}})));
        idp.expect_logout().times(1).returning(|_| {
            Err(IdpError::Status {
                status: 503,
                body: "down".into(),
            })
        });

        let err = orchestrator(idp)
            .begin_authentication(&request())
            .await
            .expect_err("logout failure");
        assert!(matches!(err, AuthError::Idp(IdpError::Status { status: 503, .. })));
    }

    #[tokio::test]
    async fn concluded_advance_reissues_idp_cookie_under_handoff_name() {
        let mut idp = MockIdpClient::new();
        idp.expect_advance_authentication().returning(|_| {
            Ok(AdvanceResponse {
                body: json!({"success": true, "Result": {"UserId": "u-1", "Summary": "LoginSuccess"}}),
                set_cookies: vec![
                    "other=1; path=/".into(),
                    ".ASPXAUTH=tok/en=; path=/; secure; HttpOnly".into(),
                ],
            })
        });

        let outcome = orchestrator(idp)
            .advance_authentication(&json!({"SessionId": "s", "Action": "Answer"}))
            .await
            .expect("outcome");
        assert_eq!(outcome.verdict, Verdict::Accepted);
        assert_eq!(outcome.cookies.len(), 1);
        let cookie = &outcome.cookies[0];
        assert!(cookie.starts_with("AUTH=tok%2Fen%3D;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Secure"));
        assert!(cookie.contains("Path=/"));
    }

    #[tokio::test]
    async fn intermediate_advance_passes_body_through() {
        let mut idp = MockIdpClient::new();
        idp.expect_advance_authentication().returning(|_| {
            Ok(AdvanceResponse {
                body: json!({"success": true, "Result": {"Summary": "StartNextChallenge"}}),
                set_cookies: vec![".ASPXAUTH=ignored; path=/".into()],
            })
        });

        let outcome = orchestrator(idp)
            .advance_authentication(&json!({"Action": "Answer"}))
            .await
            .expect("outcome");
        assert_eq!(outcome.verdict, Verdict::Accepted);
        assert!(outcome.cookies.is_empty());
        assert_eq!(outcome.body["Result"]["Summary"], "StartNextChallenge");
    }

    #[tokio::test]
    async fn failed_advance_without_result_still_passes_through() {
        let mut idp = MockIdpClient::new();
        idp.expect_advance_authentication().returning(|_| {
            Ok(AdvanceResponse {
                body: json!({"success": false, "Result": null, "Message": "Bad answer"}),
                set_cookies: Vec::new(),
            })
        });

        let outcome = orchestrator(idp)
            .advance_authentication(&json!({"Action": "Answer"}))
            .await
            .expect("outcome");
        assert_eq!(outcome.verdict, Verdict::Accepted);
        assert_eq!(outcome.body["Message"], "Bad answer");
    }

    #[tokio::test]
    async fn concluded_advance_without_idp_cookie_is_a_shape_error() {
        let mut idp = MockIdpClient::new();
        idp.expect_advance_authentication().returning(|_| {
            Ok(AdvanceResponse {
                body: json!({"success": true, "Result": {"UserId": "u-1"}}),
                set_cookies: Vec::new(),
            })
        });

        let err = orchestrator(idp)
            .advance_authentication(&json!({}))
            .await
            .expect_err("shape");
        assert!(matches!(err, AuthError::Idp(IdpError::UnexpectedShape(_))));
    }

    #[tokio::test]
    async fn challenge_maps_success_flag_to_verdict() {
        let mut idp = MockIdpClient::new();
        idp.expect_start_challenge()
            .withf(|token, _| token == "bearer-1")
            .times(2)
            .returning({
                let mut first = true;
                move |_, _| {
                    let ok = first;
                    first = false;
                    Ok(json!({"success": ok}))
                }
            });

        let orchestrator = orchestrator(idp);
        let accepted = orchestrator
            .start_challenge("bearer-1", &request())
            .await
            .expect("first");
        assert_eq!(accepted.verdict, Verdict::Accepted);
        let rejected = orchestrator
            .start_challenge("bearer-1", &request())
            .await
            .expect("second");
        assert_eq!(rejected.verdict, Verdict::Rejected);
    }
}
