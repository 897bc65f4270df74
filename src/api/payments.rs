// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 ShambaLink

//! Charge initialization, lookup, verification and refunds.
//!
//! Adoption activation charges start at `POST /v1/adoptions`; this module
//! covers every other payment type plus the read and reconcile surface
//! shared by all of them.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info};
use utoipa::IntoParams;

use crate::{
    error::ApiError,
    gateway::{fees, InitializeChargeRequest, DEFAULT_CURRENCY},
    ledger::{new_reference, PaymentMetadata, PaymentRecord, PaymentType},
    models::{CheckoutInfo, InitializePaymentRequest, PaymentCheckoutResponse, ReconcileResponse},
    reconcile::{OutcomeSource, ReconciliationEngine},
    state::AppState,
    storage::{AdopterRepository, FarmerRepository},
};

/// Initialize the gateway charge for a freshly inserted pending payment.
///
/// When the gateway call fails the pending row is removed again, so the
/// caller can retry with a fresh reference and nothing half-created stays
/// in the ledger.
pub(super) async fn start_checkout(
    state: &AppState,
    payment: &PaymentRecord,
    payer_email: &str,
    metadata: Value,
) -> Result<CheckoutInfo, ApiError> {
    let gateway = match state.gateway() {
        Ok(gateway) => gateway,
        Err(err) => {
            remove_pending(state, &payment.reference);
            return Err(err);
        }
    };

    match gateway
        .initialize_charge(InitializeChargeRequest {
            reference: &payment.reference,
            payer_email,
            charge_major: payment.charge_total(),
            currency: &payment.currency,
            metadata,
        })
        .await
    {
        Ok(authorization) => Ok(CheckoutInfo {
            authorization_url: authorization.authorization_url,
            access_code: authorization.access_code,
            reference: authorization.reference,
        }),
        Err(err) => {
            remove_pending(state, &payment.reference);
            Err(err.into())
        }
    }
}

fn remove_pending(state: &AppState, reference: &str) {
    if let Err(err) = state.ledger.delete_pending_payment(reference) {
        error!(
            reference,
            error = %err,
            "failed to remove pending payment after gateway error"
        );
    }
}

/// Check an amount against the chargeable range.
pub(super) fn validate_amount(amount: u64) -> Result<(), ApiError> {
    if amount == 0 {
        return Err(ApiError::unprocessable("amount must be at least 1"));
    }
    if amount > fees::MAX_CHARGE_MAJOR {
        return Err(ApiError::unprocessable(format!(
            "amount exceeds the maximum chargeable {} {DEFAULT_CURRENCY}",
            fees::MAX_CHARGE_MAJOR
        )));
    }
    Ok(())
}

#[utoipa::path(
    post,
    path = "/v1/payments",
    request_body = InitializePaymentRequest,
    tag = "Payments",
    responses(
        (status = 201, body = PaymentCheckoutResponse),
        (status = 404, description = "Unknown payer, adoption, project or farmer"),
        (status = 422, description = "Invalid amount or missing linkage"),
        (status = 502, description = "Gateway unreachable"),
        (status = 503, description = "Gateway not configured")
    )
)]
pub async fn create_payment(
    State(state): State<AppState>,
    Json(request): Json<InitializePaymentRequest>,
) -> Result<(StatusCode, Json<PaymentCheckoutResponse>), ApiError> {
    state.gateway()?;
    validate_amount(request.amount)?;

    let payer = AdopterRepository::new(&state.storage).get(&request.payer_id)?;
    let currency = request.currency.as_deref().unwrap_or(DEFAULT_CURRENCY);

    // Resolve the linked record per payment type; contributions and
    // crowdfunding inherit the farmer from it.
    let (adoption_id, project_id, farmer_id) = match request.payment_type {
        PaymentType::Adoption => {
            return Err(ApiError::unprocessable(
                "adoption charges start at POST /v1/adoptions",
            ));
        }
        PaymentType::Contribution => {
            let adoption_id = request
                .adoption_id
                .as_deref()
                .ok_or_else(|| ApiError::bad_request("adoption_id is required for contributions"))?;
            let adoption = state
                .ledger
                .get_adoption(adoption_id)?
                .ok_or_else(|| ApiError::not_found(format!("adoption {adoption_id}")))?;
            if !adoption.status.holds_slot() {
                return Err(ApiError::unprocessable(format!(
                    "adoption is {}; no further payments can be initiated",
                    adoption.status.as_str()
                )));
            }
            (
                Some(adoption.adoption_id),
                None,
                Some(adoption.farmer_id),
            )
        }
        PaymentType::Crowdfunding => {
            let project_id = request
                .project_id
                .as_deref()
                .ok_or_else(|| ApiError::bad_request("project_id is required for crowdfunding"))?;
            let project = state
                .ledger
                .get_project(project_id)?
                .ok_or_else(|| ApiError::not_found(format!("project {project_id}")))?;
            (None, Some(project.project_id), Some(project.farmer_id))
        }
        PaymentType::Visit | PaymentType::Subscription => {
            if let Some(farmer_id) = &request.farmer_id {
                if !FarmerRepository::new(&state.storage).exists(farmer_id) {
                    return Err(ApiError::not_found(format!("farmer {farmer_id}")));
                }
            }
            (None, None, request.farmer_id.clone())
        }
    };

    let reference = new_reference(request.payment_type.reference_prefix());
    let mut payment = PaymentRecord::new_pending(
        reference,
        payer.adopter_id.clone(),
        request.payment_type,
        request.amount,
        currency,
        PaymentMetadata {
            customer_email: Some(payer.email.clone()),
            customer_name: Some(payer.full_name.clone()),
        },
    );
    payment.adoption_id = adoption_id;
    payment.project_id = project_id;
    payment.farmer_id = farmer_id;
    state.ledger.create_payment(&payment)?;

    let metadata = json!({
        "payment_type": payment.payment_type.as_str(),
        "payer_id": payment.payer_id,
        "adoption_id": payment.adoption_id,
        "project_id": payment.project_id,
        "farmer_id": payment.farmer_id,
    });
    let checkout = start_checkout(&state, &payment, &payer.email, metadata).await?;

    info!(
        reference = %payment.reference,
        payment_type = payment.payment_type.as_str(),
        amount = payment.amount,
        "payment initialized"
    );
    Ok((
        StatusCode::CREATED,
        Json(PaymentCheckoutResponse { payment, checkout }),
    ))
}

#[utoipa::path(
    get,
    path = "/v1/payments/{reference}",
    params(("reference" = String, Path, description = "Payment reference")),
    tag = "Payments",
    responses(
        (status = 200, body = PaymentRecord),
        (status = 404, description = "Unknown reference")
    )
)]
pub async fn get_payment(
    Path(reference): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<PaymentRecord>, ApiError> {
    let payment = state
        .ledger
        .get_payment(&reference)?
        .ok_or_else(|| ApiError::not_found(format!("payment {reference}")))?;
    Ok(Json(payment))
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListPaymentsQuery {
    /// List payments made by this payer.
    pub payer_id: Option<String>,
    /// List payments accruing to this farmer.
    pub farmer_id: Option<String>,
}

#[utoipa::path(
    get,
    path = "/v1/payments",
    params(ListPaymentsQuery),
    tag = "Payments",
    responses(
        (status = 200, body = [PaymentRecord]),
        (status = 400, description = "Neither or both filters given")
    )
)]
pub async fn list_payments(
    State(state): State<AppState>,
    Query(query): Query<ListPaymentsQuery>,
) -> Result<Json<Vec<PaymentRecord>>, ApiError> {
    let payments = match (query.payer_id.as_deref(), query.farmer_id.as_deref()) {
        (Some(payer_id), None) => state.ledger.list_payments_by_payer(payer_id)?,
        (None, Some(farmer_id)) => state.ledger.list_payments_by_farmer(farmer_id)?,
        _ => {
            return Err(ApiError::bad_request(
                "provide exactly one of payer_id or farmer_id",
            ));
        }
    };
    Ok(Json(payments))
}

/// The client-driven half of reconciliation: ask the gateway for the
/// charge outcome and push it through the same engine the webhook and the
/// sweeper use. Safe to call any number of times.
#[utoipa::path(
    get,
    path = "/v1/payments/{reference}/verify",
    params(("reference" = String, Path, description = "Payment reference")),
    tag = "Payments",
    responses(
        (status = 200, body = ReconcileResponse),
        (status = 404, description = "Unknown reference"),
        (status = 502, description = "Gateway unreachable"),
        (status = 503, description = "Gateway not configured")
    )
)]
pub async fn verify_payment(
    Path(reference): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<ReconcileResponse>, ApiError> {
    let gateway = state.gateway()?;

    // 404 before the gateway round-trip for references we never issued.
    state
        .ledger
        .get_payment(&reference)?
        .ok_or_else(|| ApiError::not_found(format!("payment {reference}")))?;

    let outcome = gateway.verify_charge(&reference).await?;
    let report =
        ReconciliationEngine::new(&state.ledger).apply(&reference, &outcome, OutcomeSource::Verify)?;

    Ok(Json(ReconcileResponse {
        payment: report.payment,
        disposition: report.disposition.as_str().to_string(),
    }))
}

#[utoipa::path(
    post,
    path = "/v1/payments/{reference}/refund",
    params(("reference" = String, Path, description = "Payment reference")),
    tag = "Payments",
    responses(
        (status = 200, body = PaymentRecord),
        (status = 404, description = "Unknown reference"),
        (status = 422, description = "Payment is not refundable")
    )
)]
pub async fn refund_payment(
    Path(reference): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<PaymentRecord>, ApiError> {
    let refunded = state.ledger.refund_payment(&reference)?;
    info!(reference = %refunded.reference, "payment refunded");
    Ok(Json(refunded))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::tests::{
        register_adopter, register_farmer, settle_success, test_state, test_state_with_gateway,
    };
    use crate::ledger::PaymentStatus;

    #[tokio::test]
    async fn create_payment_without_gateway_is_503_and_writes_nothing() {
        let (state, cleanup) = test_state();
        let adopter = register_adopter(&state).await;

        let request = InitializePaymentRequest {
            payer_id: adopter.adopter_id.clone(),
            payment_type: PaymentType::Visit,
            amount: 500,
            currency: None,
            adoption_id: None,
            project_id: None,
            farmer_id: None,
        };
        let err = create_payment(State(state.clone()), Json(request))
            .await
            .expect_err("no gateway configured");
        assert_eq!(err.status, StatusCode::SERVICE_UNAVAILABLE);

        let payments = state
            .ledger
            .list_payments_by_payer(&adopter.adopter_id)
            .unwrap();
        assert!(payments.is_empty());

        cleanup();
    }

    #[tokio::test]
    async fn create_payment_rolls_back_when_gateway_unreachable() {
        // Gateway configured but pointing at a closed port: the charge
        // initialization fails and the pending row must disappear again.
        let (state, cleanup) = test_state_with_gateway();
        let adopter = register_adopter(&state).await;

        let request = InitializePaymentRequest {
            payer_id: adopter.adopter_id.clone(),
            payment_type: PaymentType::Visit,
            amount: 500,
            currency: None,
            adoption_id: None,
            project_id: None,
            farmer_id: None,
        };
        let err = create_payment(State(state.clone()), Json(request))
            .await
            .expect_err("gateway is unreachable");
        assert_eq!(err.status, StatusCode::BAD_GATEWAY);

        let payments = state
            .ledger
            .list_payments_by_payer(&adopter.adopter_id)
            .unwrap();
        assert!(payments.is_empty());

        cleanup();
    }

    #[tokio::test]
    async fn adoption_type_is_redirected() {
        let (state, cleanup) = test_state_with_gateway();
        let adopter = register_adopter(&state).await;

        let request = InitializePaymentRequest {
            payer_id: adopter.adopter_id,
            payment_type: PaymentType::Adoption,
            amount: 1_000,
            currency: None,
            adoption_id: None,
            project_id: None,
            farmer_id: None,
        };
        let err = create_payment(State(state), Json(request))
            .await
            .expect_err("adoption charges have their own endpoint");
        assert_eq!(err.status, StatusCode::UNPROCESSABLE_ENTITY);

        cleanup();
    }

    #[tokio::test]
    async fn contribution_requires_known_open_adoption() {
        let (state, cleanup) = test_state_with_gateway();
        let adopter = register_adopter(&state).await;

        let missing = InitializePaymentRequest {
            payer_id: adopter.adopter_id.clone(),
            payment_type: PaymentType::Contribution,
            amount: 1_000,
            currency: None,
            adoption_id: None,
            project_id: None,
            farmer_id: None,
        };
        let err = create_payment(State(state.clone()), Json(missing))
            .await
            .expect_err("adoption_id is required");
        assert_eq!(err.status, StatusCode::BAD_REQUEST);

        let unknown = InitializePaymentRequest {
            payer_id: adopter.adopter_id,
            payment_type: PaymentType::Contribution,
            amount: 1_000,
            currency: None,
            adoption_id: Some("nope".into()),
            project_id: None,
            farmer_id: None,
        };
        let err = create_payment(State(state), Json(unknown))
            .await
            .expect_err("unknown adoption");
        assert_eq!(err.status, StatusCode::NOT_FOUND);

        cleanup();
    }

    #[tokio::test]
    async fn get_and_list_payments() {
        let (state, cleanup) = test_state();
        let farmer = register_farmer(&state).await;
        let reference = settle_success(&state, "payer-x", &farmer.farmer_id, 1_000);

        let Json(fetched) = get_payment(Path(reference.clone()), State(state.clone()))
            .await
            .expect("payment lookup succeeds");
        assert_eq!(fetched.status, PaymentStatus::Success);

        let Json(by_payer) = list_payments(
            State(state.clone()),
            Query(ListPaymentsQuery {
                payer_id: Some("payer-x".into()),
                farmer_id: None,
            }),
        )
        .await
        .expect("listing by payer succeeds");
        assert_eq!(by_payer.len(), 1);

        let err = list_payments(
            State(state),
            Query(ListPaymentsQuery {
                payer_id: None,
                farmer_id: None,
            }),
        )
        .await
        .expect_err("a filter is required");
        assert_eq!(err.status, StatusCode::BAD_REQUEST);

        cleanup();
    }

    #[tokio::test]
    async fn refund_flips_success_only() {
        let (state, cleanup) = test_state();
        let farmer = register_farmer(&state).await;
        let reference = settle_success(&state, "payer-y", &farmer.farmer_id, 1_000);

        let Json(refunded) = refund_payment(Path(reference.clone()), State(state.clone()))
            .await
            .expect("refund succeeds");
        assert_eq!(refunded.status, PaymentStatus::Refunded);

        let err = refund_payment(Path(reference), State(state))
            .await
            .expect_err("double refund is rejected");
        assert_eq!(err.status, StatusCode::UNPROCESSABLE_ENTITY);

        cleanup();
    }

    #[tokio::test]
    async fn verify_unknown_reference_is_404() {
        let (state, cleanup) = test_state_with_gateway();

        let err = verify_payment(Path("ADP_0_deadbeef".into()), State(state))
            .await
            .expect_err("unknown reference");
        assert_eq!(err.status, StatusCode::NOT_FOUND);

        cleanup();
    }
}
