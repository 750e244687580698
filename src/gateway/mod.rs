pub mod handlers;
pub mod rate_limit;
pub mod state;
pub mod types;

use axum::{
    Router,
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::{Next, from_fn_with_state},
    response::Response,
    routing::{get, post},
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::config::GatewayConfig;
use state::AppState;
use types::{ApiError, error_codes};

pub const INTERNAL_SECRET_HEADER: &str = "x-internal-secret";

/// Guard for `/internal/*`: `X-Internal-Secret` must match the configured
/// secret. No configured secret rejects everything.
async fn internal_auth_middleware(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let expected = state
        .internal_secret
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            ApiError::new(
                StatusCode::UNAUTHORIZED,
                error_codes::AUTH_FAILED,
                "Internal routes are disabled",
            )
        })?;

    let provided = request
        .headers()
        .get(INTERNAL_SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            ApiError::new(
                StatusCode::UNAUTHORIZED,
                error_codes::MISSING_AUTH,
                "Missing X-Internal-Secret header",
            )
        })?;

    if !secret_matches(provided.as_bytes(), expected.as_bytes()) {
        warn!(path = %request.uri().path(), "Internal call with wrong secret");
        return Err(ApiError::new(
            StatusCode::UNAUTHORIZED,
            error_codes::AUTH_FAILED,
            "Invalid internal secret",
        ));
    }

    Ok(next.run(request).await)
}

/// Comparison time does not depend on where the inputs differ
fn secret_matches(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Complete application router
pub fn router(state: Arc<AppState>) -> Router {
    let internal_routes = Router::new()
        .route("/jobs/expire-pending", post(handlers::expire_pending))
        .route("/jobs/accrue-yield", post(handlers::accrue_yield))
        .route("/jobs/commission-cycles", post(handlers::commission_cycles))
        .route(
            "/commissions/earnings/{earning_id}/paid",
            post(handlers::mark_earning_paid),
        )
        .route(
            "/transactions/{transaction_id}/reprocess",
            post(handlers::reprocess_transaction),
        )
        .layer(from_fn_with_state(state.clone(), internal_auth_middleware));

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/webhooks/{provider}", post(handlers::receive_webhook))
        .nest("/internal", internal_routes)
        .with_state(state)
}

/// Bind and serve until Ctrl-C
pub async fn run_server(config: &GatewayConfig, state: Arc<AppState>) -> std::io::Result<()> {
    // Expired rate-limit windows would otherwise accumulate per key
    let limiter = state.rate_limiter.clone();
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(Duration::from_secs(60));
        loop {
            tick.tick().await;
            let purged = limiter.purge_expired();
            if purged > 0 {
                debug!(purged, "Rate-limit windows purged");
            }
        }
    });

    let providers = state.normalizers.providers();
    let store = state.store.name();
    let app = router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr).await?;

    info!(%addr, store, ?providers, "Gateway listening");
    info!("Webhooks:  POST /webhooks/{{provider}}");
    info!("Internal:  /internal/* (X-Internal-Secret required)");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::rate_limit::DashMapRateLimitStore;
    use super::*;
    use crate::config::AppConfig;
    use crate::funding::DepositService;
    use crate::ledger::WalletKind;
    use crate::store::MemoryStore;
    use axum::http::Request;
    use rust_decimal::Decimal;
    use tower::ServiceExt;

    const SECRET: &str = "test-secret";

    fn app(store: &MemoryStore) -> Router {
        let config = AppConfig {
            internal_secret: Some(SECRET.to_string()),
            ..AppConfig::default()
        };
        let state = AppState::new(
            Arc::new(store.clone()),
            Arc::new(DashMapRateLimitStore::new()),
            &config,
        );
        router(Arc::new(state))
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(resp: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(resp.into_body(), 1024 * 1024)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn paid_event(external_id: &str) -> serde_json::Value {
        serde_json::json!({
            "transactionId": "pa_1",
            "externalId": external_id,
            "type": "CASH_IN",
            "status": "PAID",
            "amount": "100.00"
        })
    }

    #[tokio::test]
    async fn test_unknown_provider_is_404() {
        let store = MemoryStore::new();
        let resp = app(&store)
            .oneshot(post_json("/webhooks/nope", paid_event("x")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_malformed_payload_is_400() {
        let store = MemoryStore::new();
        let req = Request::builder()
            .method("POST")
            .uri("/webhooks/pix-acquirer")
            .body(Body::from("{not json"))
            .unwrap();
        let resp = app(&store).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = app(&store)
            .oneshot(post_json(
                "/webhooks/pix-acquirer",
                serde_json::json!({ "status": "PAID" }),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(resp).await["code"], error_codes::INVALID_PARAMETER);
    }

    #[tokio::test]
    async fn test_unmatched_event_is_acknowledged() {
        let store = MemoryStore::new();
        let resp = app(&store)
            .oneshot(post_json("/webhooks/pix-acquirer", paid_event("ghost")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["data"]["outcome"], "not_found");
        assert_eq!(body["data"]["error_code"], "TRANSACTION_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_duplicate_delivery_credits_once() {
        let store = MemoryStore::new();
        DepositService::new(Arc::new(store.clone()))
            .open_pix_deposit(1, Decimal::new(10000, 2), "pix-acquirer", "dep-1", None)
            .await
            .unwrap();
        let app = app(&store);

        let first = app
            .clone()
            .oneshot(post_json("/webhooks/pix-acquirer", paid_event("dep-1")))
            .await
            .unwrap();
        assert_eq!(body_json(first).await["data"]["outcome"], "credited");

        let second = app
            .oneshot(post_json("/webhooks/pix-acquirer", paid_event("dep-1")))
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::OK);
        assert_eq!(body_json(second).await["data"]["outcome"], "already_settled");

        let state = store.snapshot().await;
        assert_eq!(
            state.wallet_of(1, WalletKind::Pix).unwrap().balance,
            Decimal::new(10000, 2)
        );
    }

    #[tokio::test]
    async fn test_internal_routes_require_secret() {
        let store = MemoryStore::new();
        let resp = app(&store)
            .oneshot(post_json("/internal/jobs/expire-pending", serde_json::json!({})))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let req = Request::builder()
            .method("POST")
            .uri("/internal/jobs/expire-pending")
            .header(INTERNAL_SECRET_HEADER, "wrong")
            .body(Body::empty())
            .unwrap();
        let resp = app(&store).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let req = Request::builder()
            .method("POST")
            .uri("/internal/jobs/expire-pending")
            .header(INTERNAL_SECRET_HEADER, SECRET)
            .body(Body::empty())
            .unwrap();
        let resp = app(&store).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["data"]["found"], 0);
    }

    #[tokio::test]
    async fn test_accrue_yield_accepts_empty_body() {
        let store = MemoryStore::new();
        let req = Request::builder()
            .method("POST")
            .uri("/internal/jobs/accrue-yield")
            .header(INTERNAL_SECRET_HEADER, SECRET)
            .body(Body::empty())
            .unwrap();
        let resp = app(&store).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["data"]["processed"], 0);
    }

    #[tokio::test]
    async fn test_reprocess_unknown_transaction_is_404() {
        let store = MemoryStore::new();
        let mut req = post_json(
            "/internal/transactions/999/reprocess",
            serde_json::json!({ "status": "COMPLETED" }),
        );
        req.headers_mut()
            .insert(INTERNAL_SECRET_HEADER, SECRET.parse().unwrap());
        let resp = app(&store).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_health() {
        let store = MemoryStore::new();
        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let resp = app(&store).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["data"]["store"], "memory");
    }

    #[test]
    fn test_secret_matches() {
        assert!(secret_matches(b"abc", b"abc"));
        assert!(!secret_matches(b"abc", b"abd"));
        assert!(!secret_matches(b"abc", b"abcd"));
    }
}
