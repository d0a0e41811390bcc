//! # Authentication Module
//!
//! Optional API key authentication for the ConceptKit HTTP API.
//!
//! When `security.api_key` is configured (file or `CONCEPTKIT_API_KEY`), every
//! request except `GET /health` must carry:
//!
//! ```text
//! Authorization: Bearer <your-api-key>
//! ```

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode, header},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use subtle::ConstantTimeEq;

/// The configured key, shared with the middleware.
pub type ApiKey = Arc<str>;

/// Compare without leaking where the first mismatch is, or the key length.
fn keys_match(provided: &[u8], expected: &[u8]) -> bool {
    let max_len = provided.len().max(expected.len());
    let mut padded_provided = vec![0u8; max_len];
    let mut padded_expected = vec![0u8; max_len];
    padded_provided[..provided.len()].copy_from_slice(provided);
    padded_expected[..expected.len()].copy_from_slice(expected);

    let bytes_match: bool = padded_provided.ct_eq(&padded_expected).into();
    bytes_match && provided.len() == expected.len()
}

/// API key authentication middleware.
///
/// Accepts both `Bearer <key>` and a raw `<key>` in the Authorization header.
pub async fn api_key_auth_middleware(
    State(expected): State<ApiKey>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, (StatusCode, &'static str)> {
    // Always allow health endpoint (for load balancer checks)
    if request.uri().path() == "/health" {
        return Ok(next.run(request).await);
    }

    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let Some(header_value) = auth_header else {
        tracing::warn!(
            event = "auth_failure",
            reason = "missing_authorization_header",
            "Missing Authorization header"
        );
        return Err((StatusCode::UNAUTHORIZED, "Unauthorized"));
    };

    let provided = header_value.strip_prefix("Bearer ").unwrap_or(header_value);
    if keys_match(provided.as_bytes(), expected.as_bytes()) {
        Ok(next.run(request).await)
    } else {
        tracing::warn!(
            event = "auth_failure",
            reason = "invalid_api_key",
            "Authentication failed: invalid API key"
        );
        Err((StatusCode::UNAUTHORIZED, "Unauthorized"))
    }
}
