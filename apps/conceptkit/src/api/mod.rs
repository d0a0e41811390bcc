//! # ConceptKit HTTP API Module
//!
//! This module implements the HTTP API server using axum.
//!
//! ## Endpoints
//!
//! - `GET /health` - Health check (never authenticated)
//! - `GET /status` - Record counts per relation
//! - `POST /invoke` - Execute one concept action
//!
//! ## Security Configuration
//!
//! Read from [`SecurityConfig`] (TOML `[security]` or environment):
//! - `cors_origins` / `CONCEPTKIT_CORS_ORIGINS`: comma-separated origins, or "*" (default: localhost only)
//! - `rate_limit` / `CONCEPTKIT_RATE_LIMIT`: requests per second (default: 100, 0 to disable)
//! - `api_key` / `CONCEPTKIT_API_KEY`: if set, requires Bearer token authentication

mod auth;
mod handlers;
mod middleware;
mod types;

pub use auth::{ApiKey, api_key_auth_middleware};
pub use handlers::{health_handler, invoke_handler, status_handler};
pub use middleware::{GlobalRateLimiter, create_rate_limiter, rate_limit_middleware};
pub use types::{ErrorResponse, HealthResponse, StatusResponse};

use crate::config::{AppConfig, SecurityConfig};
use crate::dispatch::Kernel;
use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{get, post},
};
use conceptkit_core::KernelError;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state: the kernel and the configuration it was built from.
#[derive(Clone)]
pub struct AppState {
    pub kernel: Arc<Kernel>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    #[must_use]
    pub fn new(kernel: Kernel, config: AppConfig) -> Self {
        Self {
            kernel: Arc::new(kernel),
            config: Arc::new(config),
        }
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

/// Build the CORS layer.
///
/// - `Some("*")`: allows all origins
/// - `None`: localhost only
/// - otherwise: the comma-separated list, falling back to localhost when no
///   entry parses
fn build_cors_layer(security: &SecurityConfig) -> CorsLayer {
    match security.cors_origins.as_deref() {
        Some("*") => {
            tracing::warn!("CORS: Allowing ALL origins. This is insecure for production!");
            CorsLayer::permissive()
        }
        Some(origins) => {
            let allowed_origins: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|s| {
                    let trimmed = s.trim();
                    match trimmed.parse::<HeaderValue>() {
                        Ok(hv) => {
                            tracing::info!("CORS: Allowing origin: {}", trimmed);
                            Some(hv)
                        }
                        Err(e) => {
                            tracing::warn!("CORS: Invalid origin '{}': {}", trimmed, e);
                            None
                        }
                    }
                })
                .collect();

            if allowed_origins.is_empty() {
                tracing::warn!("CORS: No valid origins configured, defaulting to localhost only");
                build_localhost_cors()
            } else {
                restricted_cors(allowed_origins)
            }
        }
        None => build_localhost_cors(),
    }
}

fn restricted_cors(origins: Vec<HeaderValue>) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

/// Build a restrictive CORS layer that only allows localhost origins.
fn build_localhost_cors() -> CorsLayer {
    let origins: Vec<HeaderValue> = [
        "http://localhost:3000",
        "http://localhost:8080",
        "http://127.0.0.1:3000",
        "http://127.0.0.1:8080",
    ]
    .into_iter()
    .filter_map(|o| o.parse::<HeaderValue>().ok())
    .collect();

    restricted_cors(origins)
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Create the axum router with all endpoints and middleware.
///
/// Middleware stack (outer to inner):
/// 1. Tracing - logs all requests
/// 2. CORS - handles preflight requests
/// 3. Rate Limiting - if enabled
/// 4. Authentication - if an API key is configured
pub fn create_router(state: AppState) -> Router {
    let security = &state.config.security;
    let cors = build_cors_layer(security);

    let mut router = Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/status", get(handlers::status_handler))
        .route("/invoke", post(handlers::invoke_handler));

    // Authentication (innermost - runs last on request)
    match security.api_key.as_deref() {
        Some(key) => {
            tracing::info!("API key authentication enabled");
            let key: ApiKey = Arc::from(key);
            router = router.layer(axum_middleware::from_fn_with_state(
                key,
                auth::api_key_auth_middleware,
            ));
        }
        None => {
            tracing::warn!(
                "API key authentication DISABLED - all endpoints are publicly accessible! \
                 Set CONCEPTKIT_API_KEY to enable authentication."
            );
        }
    }

    if security.rate_limit > 0 {
        tracing::info!("Rate limiting enabled: {} requests/second", security.rate_limit);
        router = router.layer(axum_middleware::from_fn_with_state(
            create_rate_limiter(security.rate_limit),
            middleware::rate_limit_middleware,
        ));
    } else {
        tracing::info!("Rate limiting disabled");
    }

    router
        .layer(axum::extract::DefaultBodyLimit::max(2 * 1024 * 1024))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Bind and serve until Ctrl+C.
pub async fn run_server(state: AppState) -> Result<(), KernelError> {
    let addr = format!("{}:{}", state.config.server.host, state.config.server.port);
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| KernelError::Io(format!("Bind failed: {}", e)))?;

    tracing::info!("ConceptKit HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| KernelError::Io(format!("Server error: {}", e)))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KernelConfig;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn state(security: SecurityConfig) -> AppState {
        let config = AppConfig {
            security,
            ..AppConfig::default()
        };
        AppState::new(Kernel::new(&KernelConfig::default()), config)
    }

    #[tokio::test]
    async fn health_is_open_with_api_key() {
        let router = create_router(state(SecurityConfig {
            api_key: Some("k".into()),
            ..SecurityConfig::default()
        }));

        let response = router
            .oneshot(Request::get("/health").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn status_requires_api_key_when_configured() {
        let router = create_router(state(SecurityConfig {
            api_key: Some("k".into()),
            ..SecurityConfig::default()
        }));

        let response = router
            .oneshot(Request::get("/status").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn invalid_origins_fall_back_to_localhost() {
        // Only checks that construction does not panic on garbage input.
        let _layer = build_cors_layer(&SecurityConfig {
            cors_origins: Some("\u{7f}bad".into()),
            ..SecurityConfig::default()
        });
    }
}
