use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SameSite {
    Lax,
    Strict,
    None,
}

impl FromStr for SameSite {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lax" => Ok(SameSite::Lax),
            "strict" => Ok(SameSite::Strict),
            "none" => Ok(SameSite::None),
            _ => Err(()),
        }
    }
}

/// Attributes shared by the credential cookies. They are always `Secure`.
#[derive(Debug, Clone, Copy)]
pub struct CookieOptions {
    pub same_site: SameSite,
}

/// Primary credential cookie; carries the IdP token presented on later calls.
pub const PRIMARY_COOKIE_NAME: &str = ".ASPXAUTH";
/// Cookie under which the advance-auth flow re-emits the IdP session value.
pub const HANDOFF_COOKIE_NAME: &str = "AUTH";
/// Cookie the frontend uses to select the login flow.
pub const FLOW_COOKIE_NAME: &str = "flow";
/// `flow` cookie value that turns on the MFA widget flow.
pub const WIDGET_FLOW_VALUE: &str = "flow3";
pub const COOKIE_PATH: &str = "/";

/// Builds a browser-session cookie (no Max-Age) that is always HttpOnly and Secure.
pub fn build_auth_cookie(name: &str, value: &str, path: &str, options: CookieOptions) -> String {
    format!(
        "{}={}; Path={}; HttpOnly; SameSite={}; Secure",
        name,
        value,
        path,
        same_site_value(options.same_site)
    )
}

pub fn build_clear_cookie(name: &str, path: &str, options: CookieOptions) -> String {
    format!(
        "{}=; Path={}; Max-Age=0; HttpOnly; SameSite={}; Secure",
        name,
        path,
        same_site_value(options.same_site)
    )
}

/// Clear-cookie writes for both credential cookies, emitted on every token logout.
pub fn clear_credential_cookies(options: CookieOptions) -> Vec<String> {
    vec![
        build_clear_cookie(PRIMARY_COOKIE_NAME, COOKIE_PATH, options),
        build_clear_cookie(HANDOFF_COOKIE_NAME, COOKIE_PATH, options),
    ]
}

/// Looks up a cookie in a request `Cookie` header.
pub fn extract_cookie_value(header: &str, name: &str) -> Option<String> {
    header.split(';').map(str::trim).find_map(|pair| {
        let mut parts = pair.splitn(2, '=');
        let key = parts.next()?.trim();
        let value = parts.next()?.trim();
        if key == name {
            Some(value.to_string())
        } else {
            None
        }
    })
}

/// Returns the value of a `Set-Cookie` header line when its cookie is `name`.
pub fn set_cookie_value(header: &str, name: &str) -> Option<String> {
    let pair = header.split(';').next()?.trim();
    let (key, value) = pair.split_once('=')?;
    if key.trim() == name {
        Some(value.trim().to_string())
    } else {
        None
    }
}

/// Percent-encodes a cookie value the way form encoding does.
pub fn encode_cookie_value(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

fn same_site_value(same_site: SameSite) -> &'static str {
    match same_site {
        SameSite::Lax => "Lax",
        SameSite::Strict => "Strict",
        SameSite::None => "None",
    }
}
