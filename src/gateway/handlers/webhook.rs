//! Webhook ingress
//!
//! Status contract toward providers:
//! - unknown provider: 404
//! - rate limited: 429
//! - unparseable or unmappable payload: 400
//! - anything else, including unmatched events and internal failures: 200
//!   with an outcome string, so providers do not retry-storm

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::Utc;
use tracing::{error, warn};

use super::super::state::AppState;
use super::super::types::{ApiError, ApiResponse, WebhookAck, error_codes};
use crate::settlement::SettlementError;

pub async fn receive_webhook(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
    body: Bytes,
) -> Result<Json<ApiResponse<WebhookAck>>, ApiError> {
    let received_at = Utc::now();
    if state.normalizers.get(&provider).is_none() {
        warn!(provider = %provider, "Webhook for unknown provider");
        return Err(ApiError::new(
            StatusCode::NOT_FOUND,
            error_codes::NOT_FOUND,
            format!("Unknown provider: {}", provider),
        ));
    }

    if !state.rate_limiter.check(&format!("webhook:{}", provider)) {
        warn!(provider = %provider, "Webhook rate limited");
        return Err(ApiError::new(
            StatusCode::TOO_MANY_REQUESTS,
            error_codes::RATE_LIMITED,
            "Too many requests",
        ));
    }

    let payload: serde_json::Value = serde_json::from_slice(&body).map_err(|e| {
        warn!(provider = %provider, error = %e, "Webhook body is not JSON");
        ApiError::bad_request(format!("Invalid JSON: {}", e))
    })?;

    let event = state
        .normalizers
        .normalize(&provider, &payload, received_at)
        .map_err(|e| {
            warn!(provider = %provider, error = %e, "Webhook payload rejected");
            ApiError::bad_request(e.to_string())
        })?;

    let ack = match state.settlement.process(&event).await {
        Ok(outcome) => WebhookAck {
            outcome: outcome.as_str().to_string(),
            transaction_id: Some(outcome.transaction_id()),
            error_code: None,
        },
        Err(e) => {
            let outcome = match &e {
                SettlementError::TransactionNotFound(_) => "not_found",
                SettlementError::KindMismatch { .. } => "kind_mismatch",
                _ => "error",
            };
            if outcome == "error" {
                error!(
                    provider = %provider,
                    external_id = %event.external_id,
                    error = %e,
                    "Webhook settlement failed"
                );
            } else {
                warn!(
                    provider = %provider,
                    external_id = %event.external_id,
                    outcome,
                    "Webhook acknowledged without settlement"
                );
            }
            WebhookAck {
                outcome: outcome.to_string(),
                transaction_id: None,
                error_code: Some(e.code().to_string()),
            }
        }
    };

    Ok(Json(ApiResponse::success(ack)))
}
