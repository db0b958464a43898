use std::fmt;

use serde::Deserialize;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Request-scoped credential buffer that is wiped when dropped.
///
/// Dropping happens on every exit path of the handler that owns it, including
/// early returns and errors, so callers never clear it by hand.
#[derive(Clone, Default, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(transparent)]
pub struct SecretBuffer(String);

impl SecretBuffer {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SecretBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretBuffer(<redacted>)")
    }
}

/// Shortens a credential for log output.
pub fn mask_secret(s: &str) -> String {
    if s.is_empty() {
        return "<empty>".into();
    }
    let prefix = s.chars().take(4).collect::<String>();
    format!("{}*** (len={})", prefix, s.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_is_redacted() {
        let secret = SecretBuffer::new("hunter2");
        assert_eq!(format!("{:?}", secret), "SecretBuffer(<redacted>)");
        assert_eq!(secret.expose(), "hunter2");
    }

    #[test]
    fn zeroize_clears_contents() {
        let mut secret = SecretBuffer::new("hunter2");
        secret.zeroize();
        assert!(secret.is_empty());
    }

    #[test]
    fn deserializes_from_plain_string() {
        let secret: SecretBuffer = serde_json::from_str("\"pw\"").expect("json");
        assert_eq!(secret.expose(), "pw");
    }

    #[test]
    fn mask_secret_keeps_prefix_and_length() {
        assert_eq!(mask_secret(""), "<empty>");
        assert_eq!(mask_secret("abcdefgh"), "abcd*** (len=8)");
    }
}
