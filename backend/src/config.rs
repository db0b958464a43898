use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

use crate::utils::cookies::{CookieOptions, SameSite};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    /// Base URL of the identity provider tenant, without a trailing slash.
    pub tenant_url: String,
    pub oauth_application_id: String,
    pub session_inactive_time_secs: i64,
    pub mobile_inactive_time_secs: i64,
    pub demo_app_base_url: String,
    pub backend_server_port: String,
    /// Upper bound on start-authentication attempts while stale handles are invalidated.
    pub idp_handle_retry_limit: u32,
    pub idp_request_timeout_secs: u64,
    pub cookie_same_site: SameSite,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgres://localhost:5432/authbroker".to_string());

        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

        let tenant_url = env::var("TENANT_URL")
            .map_err(|_| anyhow!("TENANT_URL must be set"))?
            .trim_end_matches('/')
            .to_string();

        let oauth_application_id = env::var("OAUTH_APPLICATION_ID")
            .map_err(|_| anyhow!("OAUTH_APPLICATION_ID must be set"))?;

        let session_inactive_time_secs = parse_var("SESSION_INACTIVE_TIME_SECS", 900)?;
        if session_inactive_time_secs < 0 {
            return Err(anyhow!("SESSION_INACTIVE_TIME_SECS must not be negative"));
        }
        let mobile_inactive_time_secs = parse_var("MOBILE_INACTIVE_TIME_SECS", 60)?;

        let demo_app_base_url = env::var("DEMO_APP_BASE_URL")
            .unwrap_or_else(|_| "http://localhost".to_string())
            .trim_end_matches('/')
            .to_string();
        let backend_server_port =
            env::var("BACKEND_SERVER_PORT").unwrap_or_else(|_| "8080".to_string());

        let idp_handle_retry_limit = parse_var("IDP_HANDLE_RETRY_LIMIT", 5)?;
        if idp_handle_retry_limit == 0 {
            return Err(anyhow!("IDP_HANDLE_RETRY_LIMIT must be at least 1"));
        }
        let idp_request_timeout_secs = parse_var("IDP_REQUEST_TIMEOUT_SECS", 30)?;

        let same_site_name = env::var("COOKIE_SAME_SITE").unwrap_or_else(|_| "Lax".to_string());
        let cookie_same_site = same_site_name
            .parse()
            .map_err(|_| anyhow!("Invalid COOKIE_SAME_SITE value: {}", same_site_name))?;

        Ok(Config {
            database_url,
            bind_addr,
            tenant_url,
            oauth_application_id,
            session_inactive_time_secs,
            mobile_inactive_time_secs,
            demo_app_base_url,
            backend_server_port,
            idp_handle_retry_limit,
            idp_request_timeout_secs,
            cookie_same_site,
        })
    }

    /// Redirect URI registered with the OAuth application for the widget flow.
    pub fn redirect_uri(&self) -> String {
        format!(
            "{}:{}/api/RedirectResource",
            self.demo_app_base_url, self.backend_server_port
        )
    }

    pub fn cookie_options(&self) -> CookieOptions {
        CookieOptions {
            same_site: self.cookie_same_site,
        }
    }
}

fn parse_var<T: FromStr>(name: &str, default: T) -> anyhow::Result<T> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| anyhow!("Invalid {} value: {}", name, raw)),
        Err(_) => Ok(default),
    }
}
