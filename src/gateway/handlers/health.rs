//! Health check handler

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use axum::{Json, extract::State, http::StatusCode};
use chrono::Utc;
use serde::Serialize;

use super::super::state::AppState;
use super::super::types::{ApiResponse, error_codes};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub timestamp_ms: i64,
    pub store: &'static str,
    pub providers: Vec<&'static str>,
}

/// Healthy: 200 + `{code: 0, data: {...}}`. Store unreachable: 503.
///
/// The store is pinged at most once per interval; in between the last
/// successful ping counts.
pub async fn health_check(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<ApiResponse<HealthResponse>>) {
    static LAST_OK_MS: AtomicI64 = AtomicI64::new(0);
    const CHECK_INTERVAL_MS: i64 = 5000;

    let now_ms = Utc::now().timestamp_millis();
    let healthy = if now_ms - LAST_OK_MS.load(Ordering::Relaxed) > CHECK_INTERVAL_MS {
        match state.store.ping().await {
            Ok(()) => {
                LAST_OK_MS.store(now_ms, Ordering::Relaxed);
                true
            }
            Err(e) => {
                tracing::error!(store = state.store.name(), error = %e, "[HEALTH] store ping failed");
                false
            }
        }
    } else {
        true
    };

    if healthy {
        (
            StatusCode::OK,
            Json(ApiResponse::success(HealthResponse {
                timestamp_ms: now_ms,
                store: state.store.name(),
                providers: state.normalizers.providers(),
            })),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ApiResponse {
                code: error_codes::SERVICE_UNAVAILABLE,
                msg: "unavailable".to_string(),
                data: None,
            }),
        )
    }
}
