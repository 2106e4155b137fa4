//! Health check endpoint.
//!
//! Returns 200 OK if both PostgreSQL and Redis are reachable,
//! 503 Service Unavailable otherwise.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Health check response.
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    postgres: bool,
    redis: bool,
    plugins: usize,
}

impl HealthResponse {
    fn new(postgres: bool, redis: bool, plugins: usize) -> (StatusCode, Self) {
        let healthy = postgres && redis;
        let status_code = if healthy {
            StatusCode::OK
        } else {
            StatusCode::SERVICE_UNAVAILABLE
        };

        (
            status_code,
            Self {
                status: if healthy { "healthy" } else { "unhealthy" },
                postgres,
                redis,
                plugins,
            },
        )
    }
}

/// Health check handler.
async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let (postgres, redis) = tokio::join!(state.postgres_healthy(), state.redis_healthy());
    let (status_code, body) = HealthResponse::new(postgres, redis, state.registry().len());
    (status_code, Json(body))
}

/// Create the health check router.
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn healthy_when_both_backends_up() {
        let (code, body) = HealthResponse::new(true, true, 3);
        assert_eq!(code, StatusCode::OK);
        assert_eq!(body.status, "healthy");
        assert_eq!(body.plugins, 3);
    }

    #[test]
    fn unavailable_when_redis_down() {
        let (code, body) = HealthResponse::new(true, false, 0);
        assert_eq!(code, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body.status, "unhealthy");
    }
}
