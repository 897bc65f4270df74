// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 ShambaLink

//! HTTP error envelope and domain-error mapping.
//!
//! Domain errors (`LedgerError`, `GatewayError`, `StorageError`) stay typed
//! inside the core; this module is the single place they are flattened into
//! an HTTP status plus a JSON `{"error": ...}` body. Invariant and balance
//! violations surface as 4xx, gateway trouble as 502/503, storage trouble
//! as 500 with the detail kept in the server log.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

use crate::gateway::GatewayError;
use crate::ledger::LedgerError;
use crate::storage::StorageError;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    pub fn unprocessable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn bad_gateway(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Conflict(msg) => ApiError::conflict(msg),
            LedgerError::InsufficientBalance {
                available,
                requested,
            } => ApiError::unprocessable(format!(
                "insufficient balance: requested {requested}, available {available}"
            )),
            LedgerError::NotFound(what) => ApiError::not_found(what),
            LedgerError::AlreadyExists(what) => ApiError::conflict(what),
            LedgerError::InvalidTransition { from, to } => {
                ApiError::unprocessable(format!("invalid transition from {from} to {to}"))
            }
            other => {
                error!(error = %other, "ledger failure");
                ApiError::internal("ledger storage failure")
            }
        }
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::MissingConfig(what) => {
                ApiError::service_unavailable(format!("payment gateway not configured: {what}"))
            }
            GatewayError::InvalidConfig(detail) => {
                error!(detail = %detail, "gateway configuration invalid");
                ApiError::service_unavailable("payment gateway misconfigured")
            }
            GatewayError::Request(e) => {
                error!(error = %e, "gateway request failed");
                ApiError::bad_gateway("payment gateway unreachable")
            }
            GatewayError::Status { code, .. } => {
                error!(status = code, "gateway rejected request");
                ApiError::bad_gateway(format!("payment gateway returned HTTP {code}"))
            }
            GatewayError::InvalidResponse(detail) => {
                error!(detail = %detail, "gateway response malformed");
                ApiError::bad_gateway("payment gateway response malformed")
            }
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(what) => ApiError::not_found(what),
            StorageError::AlreadyExists(what) => ApiError::conflict(what),
            other => {
                error!(error = %other, "profile storage failure");
                ApiError::internal("storage failure")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[test]
    fn constructors_set_status_and_message() {
        let nf = ApiError::not_found("missing");
        assert_eq!(nf.status, StatusCode::NOT_FOUND);
        assert_eq!(nf.message, "missing");

        let bad = ApiError::bad_request("bad");
        assert_eq!(bad.status, StatusCode::BAD_REQUEST);
        assert_eq!(bad.message, "bad");

        let conflict = ApiError::conflict("taken");
        assert_eq!(conflict.status, StatusCode::CONFLICT);

        let unp = ApiError::unprocessable("oops");
        assert_eq!(unp.status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn into_response_returns_json_body() {
        let response = ApiError::bad_request("bad data").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = String::from_utf8(body_bytes.to_vec()).unwrap();
        assert_eq!(body, r#"{"error":"bad data"}"#);
    }

    #[test]
    fn ledger_conflict_maps_to_409() {
        let api: ApiError = LedgerError::Conflict("farmer already adopted".into()).into();
        assert_eq!(api.status, StatusCode::CONFLICT);
        assert_eq!(api.message, "farmer already adopted");
    }

    #[test]
    fn insufficient_balance_maps_to_422_with_amounts() {
        let api: ApiError = LedgerError::InsufficientBalance {
            available: 2000,
            requested: 2500,
        }
        .into();
        assert_eq!(api.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(api.message.contains("2500"));
        assert!(api.message.contains("2000"));
    }

    #[test]
    fn gateway_missing_config_maps_to_503() {
        let api: ApiError = GatewayError::MissingConfig("GATEWAY_SECRET_KEY").into();
        assert_eq!(api.status, StatusCode::SERVICE_UNAVAILABLE);
    }
}
