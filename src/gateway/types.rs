//! API Response types and error codes
//!
//! - `ApiResponse<T>`: Unified response wrapper
//! - `error_codes`: Standard error code constants
//! - Request / response DTOs of the webhook and batch endpoints

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core_types::TransactionId;
use crate::webhook::CanonicalStatus;

// ============================================================================
// Unified API Response Format
// ============================================================================

/// Unified API response wrapper
///
/// - code: 0 = success, non-zero = error code
/// - msg: short message description
/// - data: actual data (success) or null (error)
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub code: i32,
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            code: 0,
            msg: "ok".to_string(),
            data: Some(data),
        }
    }

    pub fn error(code: i32, msg: impl Into<String>) -> ApiResponse<()> {
        ApiResponse {
            code,
            msg: msg.into(),
            data: None,
        }
    }
}

/// Error reply: HTTP status plus the `ApiResponse` envelope
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: i32,
    pub msg: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: i32, msg: impl Into<String>) -> Self {
        Self {
            status,
            code,
            msg: msg.into(),
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, error_codes::INVALID_PARAMETER, msg)
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            error_codes::INTERNAL_ERROR,
            msg,
        )
    }

    /// Map a domain error's HTTP status onto the matching API code
    pub fn from_status(http_status: u16, msg: impl Into<String>) -> Self {
        let status =
            StatusCode::from_u16(http_status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let code = match status {
            StatusCode::BAD_REQUEST => error_codes::INVALID_PARAMETER,
            StatusCode::NOT_FOUND => error_codes::NOT_FOUND,
            StatusCode::CONFLICT => error_codes::CONFLICT,
            StatusCode::UNPROCESSABLE_ENTITY => error_codes::INSUFFICIENT_BALANCE,
            _ => error_codes::INTERNAL_ERROR,
        };
        Self::new(status, code, msg)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ApiResponse::<()>::error(self.code, self.msg)),
        )
            .into_response()
    }
}

// ============================================================================
// Request / Response DTOs
// ============================================================================

/// Webhook acknowledgement. Always HTTP 200 once the provider is known
/// and the payload parses.
#[derive(Debug, Serialize, Deserialize)]
pub struct WebhookAck {
    /// Settlement outcome, or `not_found` / `kind_mismatch` / `error`
    pub outcome: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<TransactionId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AccrueYieldRequest {
    /// Defaults to the current UTC date
    pub reference_date: Option<NaiveDate>,
    /// Overrides the configured rate source
    pub reference_rate: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
pub struct MarkPaidRequest {
    pub payment_reference: String,
}

#[derive(Debug, Deserialize)]
pub struct ReprocessRequest {
    pub status: CanonicalStatus,
    #[serde(default)]
    pub actor: Option<String>,
}

// ============================================================================
// Error Codes
// ============================================================================

/// Standard API error codes
pub mod error_codes {
    pub const SUCCESS: i32 = 0;

    // Client errors (1xxx)
    pub const INVALID_PARAMETER: i32 = 1001;
    pub const INSUFFICIENT_BALANCE: i32 = 1002;

    // Auth errors (2xxx)
    pub const MISSING_AUTH: i32 = 2001;
    pub const AUTH_FAILED: i32 = 2002;

    // Resource errors (4xxx)
    pub const NOT_FOUND: i32 = 4004;
    pub const CONFLICT: i32 = 4009;
    pub const RATE_LIMITED: i32 = 4291;

    // Server errors (5xxx)
    pub const INTERNAL_ERROR: i32 = 5000;
    pub const SERVICE_UNAVAILABLE: i32 = 5001;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::from_status(404, "x").code, error_codes::NOT_FOUND);
        assert_eq!(ApiError::from_status(409, "x").code, error_codes::CONFLICT);
        let unknown = ApiError::from_status(1000, "x");
        assert_eq!(unknown.status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_error_envelope_has_no_data() {
        let body = serde_json::to_value(ApiResponse::<()>::error(1001, "bad")).unwrap();
        assert_eq!(body, serde_json::json!({ "code": 1001, "msg": "bad" }));
    }
}
