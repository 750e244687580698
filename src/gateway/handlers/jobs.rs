//! Internal batch triggers and operator actions
//!
//! Mounted behind the internal-secret middleware. Each call runs one
//! bounded pass and returns its summary.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::Utc;
use tracing::error;

use super::super::state::AppState;
use super::super::types::{
    AccrueYieldRequest, ApiError, ApiResponse, MarkPaidRequest, ReprocessRequest, error_codes,
};
use crate::commission::{CommissionEarning, MaintenanceSummary};
use crate::core_types::{EarningId, TransactionId};
use crate::investment::{AccrualSummary, InvestmentError};
use crate::settlement::{SettlementError, SettlementOutcome};
use crate::sweeper::SweepSummary;

const ACTOR_OPERATOR: &str = "operator";

pub async fn expire_pending(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<SweepSummary>>, ApiError> {
    let summary = state.sweeper.sweep(Utc::now()).await.map_err(|e| {
        error!(error = %e, "Expiration sweep aborted");
        ApiError::internal(e.to_string())
    })?;
    Ok(Json(ApiResponse::success(summary)))
}

/// Body is optional: `{"reference_date": "2026-10-15", "reference_rate": "0.0004"}`
pub async fn accrue_yield(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<ApiResponse<AccrualSummary>>, ApiError> {
    let req: AccrueYieldRequest = if body.iter().all(u8::is_ascii_whitespace) {
        AccrueYieldRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| ApiError::bad_request(e.to_string()))?
    };
    let reference_date = req
        .reference_date
        .unwrap_or_else(|| Utc::now().date_naive());

    let summary = state
        .yield_engine
        .run(reference_date, req.reference_rate)
        .await
        .map_err(|e| {
            error!(%reference_date, error = %e, "Yield accrual aborted");
            match e {
                InvestmentError::RateUnavailable(_) => ApiError::new(
                    StatusCode::SERVICE_UNAVAILABLE,
                    error_codes::SERVICE_UNAVAILABLE,
                    e.to_string(),
                ),
                other => ApiError::internal(other.to_string()),
            }
        })?;
    Ok(Json(ApiResponse::success(summary)))
}

pub async fn commission_cycles(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<MaintenanceSummary>>, ApiError> {
    let summary = state
        .commissions
        .run_maintenance(Utc::now())
        .await
        .map_err(|e| {
            error!(error = %e, "Commission maintenance aborted");
            ApiError::from_status(e.http_status(), e.to_string())
        })?;
    Ok(Json(ApiResponse::success(summary)))
}

pub async fn mark_earning_paid(
    State(state): State<Arc<AppState>>,
    Path(earning_id): Path<EarningId>,
    Json(req): Json<MarkPaidRequest>,
) -> Result<Json<ApiResponse<CommissionEarning>>, ApiError> {
    let earning = state
        .commissions
        .mark_period_earning_as_paid(earning_id, &req.payment_reference, Utc::now())
        .await
        .map_err(|e| ApiError::from_status(e.http_status(), e.to_string()))?;
    Ok(Json(ApiResponse::success(earning)))
}

pub async fn reprocess_transaction(
    State(state): State<Arc<AppState>>,
    Path(transaction_id): Path<TransactionId>,
    Json(req): Json<ReprocessRequest>,
) -> Result<Json<ApiResponse<SettlementOutcome>>, ApiError> {
    let actor = req.actor.as_deref().unwrap_or(ACTOR_OPERATOR);
    let outcome = state
        .settlement
        .reprocess(transaction_id, req.status, actor)
        .await
        .map_err(|e| {
            let status = match &e {
                SettlementError::TransactionNotFound(_) => 404,
                SettlementError::KindMismatch { .. } => 400,
                e if e.is_conflict() => 409,
                _ => 500,
            };
            ApiError::from_status(status, e.to_string())
        })?;
    Ok(Json(ApiResponse::success(outcome)))
}
