//! Redacting wrappers for API keys and shared secrets.
//!
//! Uses the `secrecy` crate so keys never reach logs or error messages.

use secrecy::{ExposeSecret, SecretBox};
use std::fmt;

/// A secret string that renders as `[REDACTED]`.
pub struct SecretString(SecretBox<str>);

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(SecretBox::new(Box::from(value.into().as_str())))
    }

    /// Expose the secret value. Only call this at the point of use.
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    pub fn is_empty(&self) -> bool {
        self.expose().is_empty()
    }

    /// Compare against a presented value without short-circuiting on the
    /// first differing byte.
    pub fn matches(&self, candidate: &str) -> bool {
        let secret = self.expose().as_bytes();
        let candidate = candidate.as_bytes();
        if secret.len() != candidate.len() {
            return false;
        }
        secret
            .iter()
            .zip(candidate)
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }
}

impl Clone for SecretString {
    fn clone(&self) -> Self {
        Self::new(self.expose())
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SecretString {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Default root of the hosted extraction service.
pub const DEFAULT_SERVICE_URL: &str = "https://api.firecrawl.dev";

/// API key and root URL for the extraction service.
#[derive(Clone)]
pub struct ServiceCredentials {
    pub api_key: SecretString,
    pub base_url: String,
}

impl ServiceCredentials {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::new(api_key),
            base_url: DEFAULT_SERVICE_URL.to_string(),
        }
    }

    /// Point at a different service root (self-hosted instance, test server).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub(crate) fn bearer(&self) -> String {
        format!("Bearer {}", self.api_key.expose())
    }
}

impl fmt::Debug for ServiceCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceCredentials")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_not_in_debug_or_display() {
        let secret = SecretString::new("fc-super-secret-key");
        assert_eq!(format!("{:?}", secret), "[REDACTED]");
        assert_eq!(format!("{}", secret), "[REDACTED]");
        assert_eq!(secret.expose(), "fc-super-secret-key");
    }

    #[test]
    fn test_matches() {
        let secret = SecretString::new("operator-token");
        assert!(secret.matches("operator-token"));
        assert!(!secret.matches("operator-tokem"));
        assert!(!secret.matches("operator"));
        assert!(!secret.matches(""));
    }

    #[test]
    fn test_credentials_debug_hides_key() {
        let creds = ServiceCredentials::new("fc-secret").with_base_url("http://localhost:3002/");
        let debug = format!("{:?}", creds);
        assert!(!debug.contains("fc-secret"));
        assert!(debug.contains("http://localhost:3002"));
        assert_eq!(creds.base_url, "http://localhost:3002");
    }
}
