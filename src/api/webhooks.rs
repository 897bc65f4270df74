// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 ShambaLink

//! Gateway webhook intake.
//!
//! The handler verifies the HMAC signature over the raw body before
//! anything else touches the payload. Once a delivery is accepted, the
//! response is 200 no matter what the event does downstream, so the
//! gateway never retries deliveries we have already judged.

use axum::{body::Bytes, extract::State, http::HeaderMap, Json};
use tracing::{debug, info, warn};

use crate::{
    error::ApiError,
    gateway::{
        parse_outcome, WebhookEvent, EVENT_CHARGE_FAILED, EVENT_CHARGE_SUCCESS,
        EVENT_SUBSCRIPTION_CREATE, EVENT_SUBSCRIPTION_DISABLE, SIGNATURE_HEADER,
    },
    ledger::LedgerError,
    models::WebhookAck,
    reconcile::{OutcomeSource, ReconciliationEngine},
    state::AppState,
};

#[utoipa::path(
    post,
    path = "/v1/webhooks/gateway",
    tag = "Webhooks",
    request_body = Vec<u8>,
    responses(
        (status = 200, description = "Delivery accepted", body = WebhookAck),
        (status = 400, description = "Signature or payload rejected"),
        (status = 503, description = "Gateway not configured")
    )
)]
pub async fn gateway_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, ApiError> {
    let gateway = state.gateway()?;

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| {
            warn!("webhook delivery without a signature header");
            ApiError::bad_request("missing signature header")
        })?;
    if !gateway.verify_webhook_signature(&body, signature) {
        warn!("webhook signature verification failed - forged delivery or key mismatch");
        return Err(ApiError::bad_request("invalid signature"));
    }

    let event: WebhookEvent = serde_json::from_slice(&body)
        .map_err(|_| ApiError::bad_request("malformed webhook payload"))?;

    match event.event.as_str() {
        EVENT_CHARGE_SUCCESS | EVENT_CHARGE_FAILED => {
            let Some(reference) = event.reference() else {
                return Err(ApiError::bad_request("charge event without a reference"));
            };
            let outcome = match parse_outcome(&event.data) {
                Ok(outcome) => outcome,
                Err(err) => {
                    // Accepted but undecodable: ack so the gateway stops
                    // redelivering; verify or the sweep will settle it.
                    warn!(
                        event = %event.event,
                        reference,
                        error = %err,
                        "webhook charge data undecodable, leaving payment for reverify"
                    );
                    return Ok(Json(WebhookAck { received: true }));
                }
            };

            match ReconciliationEngine::new(&state.ledger).apply(
                reference,
                &outcome,
                OutcomeSource::Webhook,
            ) {
                Ok(report) => {
                    debug!(
                        reference,
                        disposition = report.disposition.as_str(),
                        "webhook charge event reconciled"
                    );
                }
                Err(LedgerError::NotFound(_)) => {
                    // A reference we never issued. Ack anyway; retries
                    // would meet the same answer.
                    warn!(reference, "webhook for unknown payment reference");
                }
                Err(err) => return Err(err.into()),
            }
        }
        EVENT_SUBSCRIPTION_CREATE => {
            info!(
                reference = event.reference().unwrap_or("-"),
                "gateway subscription created"
            );
        }
        EVENT_SUBSCRIPTION_DISABLE => {
            info!(
                reference = event.reference().unwrap_or("-"),
                "gateway subscription disabled"
            );
        }
        other => {
            debug!(event = other, "unhandled webhook event type");
        }
    }

    Ok(Json(WebhookAck { received: true }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::tests::{
        register_farmer, seed_pending_payment, test_state, test_state_with_gateway,
        TEST_GATEWAY_SECRET,
    };
    use crate::gateway::sign_payload;
    use crate::ledger::PaymentStatus;
    use axum::http::{HeaderValue, StatusCode};
    use serde_json::json;

    fn signed_headers(body: &[u8]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let signature = sign_payload(TEST_GATEWAY_SECRET, body);
        headers.insert(SIGNATURE_HEADER, HeaderValue::from_str(&signature).unwrap());
        headers
    }

    #[tokio::test]
    async fn valid_success_delivery_settles_the_payment() {
        let (state, cleanup) = test_state_with_gateway();
        let farmer = register_farmer(&state).await;
        let reference = seed_pending_payment(&state, "payer-1", &farmer.farmer_id, 1_000);

        let body = serde_json::to_vec(&json!({
            "event": "charge.success",
            "data": {
                "reference": reference,
                "status": "success",
                "amount": 102_000,
                "currency": "KES",
                "paid_at": "2026-03-01T10:00:00Z",
                "channel": "mobile_money"
            }
        }))
        .unwrap();

        let Json(ack) = gateway_webhook(
            State(state.clone()),
            signed_headers(&body),
            Bytes::from(body),
        )
        .await
        .expect("delivery is accepted");
        assert!(ack.received);

        let payment = state.ledger.get_payment(&reference).unwrap().unwrap();
        assert_eq!(payment.status, PaymentStatus::Success);
        assert_eq!(payment.channel.as_deref(), Some("mobile_money"));

        cleanup();
    }

    #[tokio::test]
    async fn bad_signature_is_rejected_without_side_effects() {
        let (state, cleanup) = test_state_with_gateway();
        let farmer = register_farmer(&state).await;
        let reference = seed_pending_payment(&state, "payer-2", &farmer.farmer_id, 1_000);

        let body = serde_json::to_vec(&json!({
            "event": "charge.success",
            "data": { "reference": reference, "status": "success", "amount": 102_000 }
        }))
        .unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(SIGNATURE_HEADER, HeaderValue::from_static("deadbeef"));

        let err = gateway_webhook(State(state.clone()), headers, Bytes::from(body))
            .await
            .expect_err("forged signature is rejected");
        assert_eq!(err.status, StatusCode::BAD_REQUEST);

        let payment = state.ledger.get_payment(&reference).unwrap().unwrap();
        assert_eq!(payment.status, PaymentStatus::Pending);

        cleanup();
    }

    #[tokio::test]
    async fn missing_signature_header_is_400() {
        let (state, cleanup) = test_state_with_gateway();

        let body = br#"{"event":"charge.success","data":{}}"#.to_vec();
        let err = gateway_webhook(State(state), HeaderMap::new(), Bytes::from(body))
            .await
            .expect_err("unsigned delivery is rejected");
        assert_eq!(err.status, StatusCode::BAD_REQUEST);

        cleanup();
    }

    #[tokio::test]
    async fn unknown_reference_still_acks() {
        let (state, cleanup) = test_state_with_gateway();

        let body = serde_json::to_vec(&json!({
            "event": "charge.failed",
            "data": {
                "reference": "ADP_0_deadbeef",
                "status": "failed",
                "amount": 102_000,
                "gateway_response": "Declined"
            }
        }))
        .unwrap();

        let Json(ack) = gateway_webhook(
            State(state),
            signed_headers(&body),
            Bytes::from(body),
        )
        .await
        .expect("unknown references are acked");
        assert!(ack.received);

        cleanup();
    }

    #[tokio::test]
    async fn subscription_events_are_acked_without_ledger_effect() {
        let (state, cleanup) = test_state_with_gateway();

        let body = serde_json::to_vec(&json!({
            "event": "subscription.create",
            "data": { "subscription_code": "SUB_abc123" }
        }))
        .unwrap();

        let Json(ack) = gateway_webhook(
            State(state),
            signed_headers(&body),
            Bytes::from(body),
        )
        .await
        .expect("subscription events are acked");
        assert!(ack.received);

        cleanup();
    }

    #[tokio::test]
    async fn webhook_without_gateway_is_503() {
        let (state, cleanup) = test_state();

        let err = gateway_webhook(State(state), HeaderMap::new(), Bytes::from_static(b"{}"))
            .await
            .expect_err("no secret to verify against");
        assert_eq!(err.status, StatusCode::SERVICE_UNAVAILABLE);

        cleanup();
    }
}
