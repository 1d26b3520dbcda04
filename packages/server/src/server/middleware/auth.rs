use axum::{extract::Request, http::HeaderMap, middleware::Next, response::Response};
use scrape_pipeline::SecretString;
use tracing::debug;

use crate::server::error::ApiError;

/// Header carrying the shared secret of the cron/manual trigger.
pub const CRON_SECRET_HEADER: &str = "x-cron-secret";

/// Secrets the auth middleware checks requests against.
#[derive(Clone, Debug)]
pub struct AuthSecrets {
    pub operator_token: SecretString,
    pub cron_secret: SecretString,
}

/// What the caller proved about itself.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Caller {
    /// Presented the operator bearer token
    pub is_operator: bool,
    /// Presented the cron secret header
    pub is_cron: bool,
}

impl Caller {
    pub fn require_operator(self) -> Result<(), ApiError> {
        if self.is_operator {
            Ok(())
        } else {
            Err(ApiError::Unauthorized)
        }
    }

    pub fn require_cron(self) -> Result<(), ApiError> {
        if self.is_cron {
            Ok(())
        } else {
            Err(ApiError::Unauthorized)
        }
    }
}

/// Authentication middleware
///
/// Checks the Authorization bearer token and the cron secret header, then adds
/// a [`Caller`] to request extensions. Requests without credentials continue
/// as anonymous callers; handlers decide what they require.
pub async fn auth_middleware(secrets: AuthSecrets, mut request: Request, next: Next) -> Response {
    let caller = identify(request.headers(), &secrets);
    debug!(
        operator = caller.is_operator,
        cron = caller.is_cron,
        "Identified caller"
    );
    request.extensions_mut().insert(caller);

    next.run(request).await
}

fn identify(headers: &HeaderMap, secrets: &AuthSecrets) -> Caller {
    let bearer = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    let cron = headers
        .get(CRON_SECRET_HEADER)
        .and_then(|v| v.to_str().ok());

    Caller {
        is_operator: matches_secret(bearer, &secrets.operator_token),
        is_cron: matches_secret(cron, &secrets.cron_secret),
    }
}

fn matches_secret(candidate: Option<&str>, secret: &SecretString) -> bool {
    match candidate {
        Some(value) => !secret.is_empty() && secret.matches(value.trim()),
        None => false,
    }
}
