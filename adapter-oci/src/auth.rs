use std::fmt;

use reqwest::header::AUTHORIZATION;
use reqwest::RequestBuilder;
use secrecy::{ExposeSecret, SecretString};

/// Attaches a pre-issued registry bearer token to outgoing requests.
///
/// The token arrives from the caller already scoped to the repository being
/// scanned, so there is no `www-authenticate` challenge round-trip here.
pub struct BearerTokenAuthorizer {
    token: SecretString,
}

impl BearerTokenAuthorizer {
    /// Build an authorizer from the raw credential string.
    ///
    /// A leading `Bearer ` scheme is stripped so callers that send the full
    /// header value and callers that send the bare token behave the same.
    pub fn new(credential: &str) -> Self {
        let trimmed = credential.trim();
        let token = trimmed
            .strip_prefix("Bearer ")
            .or_else(|| trimmed.strip_prefix("bearer "))
            .unwrap_or(trimmed)
            .trim();
        Self {
            token: SecretString::from(token.to_string()),
        }
    }

    /// `true` when no token was supplied (anonymous pulls).
    pub fn is_anonymous(&self) -> bool {
        self.token.expose_secret().is_empty()
    }

    /// Full `Authorization` header value, e.g. `Bearer abc123`.
    pub fn header_value(&self) -> String {
        format!("Bearer {}", self.token.expose_secret())
    }

    /// Attach the `Authorization` header unless the authorizer is anonymous.
    pub fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        if self.is_anonymous() {
            req
        } else {
            req.header(AUTHORIZATION, self.header_value())
        }
    }
}

impl fmt::Debug for BearerTokenAuthorizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BearerTokenAuthorizer")
            .field("token", &"[REDACTED]")
            .finish()
    }
}
