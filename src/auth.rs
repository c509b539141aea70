//! User identity extraction for the HTTP surface.
//!
//! Auth token verification is explicitly out of scope: "the
//! HTTP surface beyond contracts... auth token verification — specified
//! only as inputs/outputs." This extractor is the contractual boundary
//! an upstream auth middleware is expected to have already resolved by
//! the time a request reaches these handlers: it trusts
//! `x-user-sub`/`x-user-email` headers verbatim. A real deployment
//! terminates JWT/OIDC verification in front of this service and
//! forwards the verified identity through these headers.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use async_trait::async_trait;

use crate::error::AppError;

pub struct AuthenticatedUser {
    pub sub: String,
    pub email: String,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let sub = header(parts, "x-user-sub")?;
        let email = header(parts, "x-user-email")?;
        Ok(Self { sub, email })
    }
}

fn header(parts: &Parts, name: &str) -> Result<String, AppError> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| AppError::Unauthorized(format!("missing {name} header")))
}

/// `x-service-key` check for internal reviewer-facing endpoints (spec
/// §6 wire formats). Constant-time against timing attacks, matching the
/// callback HMAC comparison style.
pub fn verify_service_key(provided: Option<&str>, expected: &str) -> Result<(), AppError> {
    use subtle::ConstantTimeEq;

    let provided = provided.ok_or_else(|| AppError::Unauthorized("missing x-service-key header".to_string()))?;
    let matches = provided.len() == expected.len()
        && bool::from(provided.as_bytes().ct_eq(expected.as_bytes()));
    if matches {
        Ok(())
    } else {
        Err(AppError::Unauthorized("invalid service key".to_string()))
    }
}
