// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 ShambaLink

//! Adoption creation, checkout and lifecycle transitions.
//!
//! Creating an adoption reserves both party slots, writes a pending
//! activation payment and sends the adopter to the gateway's checkout in
//! one request. If the gateway call fails, everything written here is
//! rolled back so the caller can simply retry.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};
use utoipa::IntoParams;

use crate::{
    error::ApiError,
    gateway::DEFAULT_CURRENCY,
    ledger::{
        new_reference, AdoptionDetails, AdoptionRecord, AdoptionStatus, AdoptionType,
        PaymentMetadata, PaymentPlan, PaymentRecord, PaymentType,
    },
    models::{AdoptionCheckoutResponse, CreateAdoptionRequest, PaymentCheckoutResponse},
    state::AppState,
    storage::{AdopterProfile, AdopterRepository, FarmerRepository},
};

use super::payments::{start_checkout, validate_amount};

fn build_details(
    request: &CreateAdoptionRequest,
    currency: &str,
) -> Result<AdoptionDetails, ApiError> {
    match request.adoption_type {
        AdoptionType::CropSpecific => {
            let crop = request
                .crop
                .clone()
                .filter(|crop| !crop.trim().is_empty())
                .ok_or_else(|| {
                    ApiError::unprocessable("crop is required for crop_specific adoptions")
                })?;
            Ok(AdoptionDetails::Crop {
                crop,
                amount: request.amount,
                currency: currency.to_string(),
                start_date: request.start_date,
                end_date: request.end_date,
            })
        }
        AdoptionType::LivestockSpecific => {
            let livestock = request
                .livestock
                .clone()
                .filter(|livestock| !livestock.trim().is_empty())
                .ok_or_else(|| {
                    ApiError::unprocessable(
                        "livestock is required for livestock_specific adoptions",
                    )
                })?;
            Ok(AdoptionDetails::Livestock {
                livestock,
                amount: request.amount,
                currency: currency.to_string(),
                start_date: request.start_date,
                end_date: request.end_date,
            })
        }
        _ => Ok(AdoptionDetails::Contribution {
            amount: request.amount,
            currency: currency.to_string(),
            start_date: request.start_date,
            end_date: request.end_date,
        }),
    }
}

fn rollback_adoption(state: &AppState, adoption_id: &str) {
    if let Err(err) = state.ledger.rollback_pending_adoption(adoption_id) {
        error!(
            adoption_id,
            error = %err,
            "failed to roll back pending adoption after gateway error"
        );
    }
}

fn activation_payment(
    adoption: &AdoptionRecord,
    adopter: &AdopterProfile,
    payment_type: PaymentType,
) -> PaymentRecord {
    let reference = new_reference(payment_type.reference_prefix());
    let mut payment = PaymentRecord::new_pending(
        reference,
        adoption.adopter_id.clone(),
        payment_type,
        adoption.payment_plan.amount,
        &adoption.payment_plan.currency,
        PaymentMetadata {
            customer_email: Some(adopter.email.clone()),
            customer_name: Some(adopter.full_name.clone()),
        },
    );
    payment.adoption_id = Some(adoption.adoption_id.clone());
    payment.farmer_id = Some(adoption.farmer_id.clone());
    payment
}

#[utoipa::path(
    post,
    path = "/v1/adoptions",
    request_body = CreateAdoptionRequest,
    tag = "Adoptions",
    responses(
        (status = 201, body = AdoptionCheckoutResponse),
        (status = 404, description = "Unknown adopter or farmer"),
        (status = 409, description = "A party already has an adoption in progress"),
        (status = 422, description = "Invalid amount or missing type-specific field"),
        (status = 502, description = "Gateway unreachable"),
        (status = 503, description = "Gateway not configured")
    )
)]
pub async fn create_adoption(
    State(state): State<AppState>,
    Json(request): Json<CreateAdoptionRequest>,
) -> Result<(StatusCode, Json<AdoptionCheckoutResponse>), ApiError> {
    state.gateway()?;
    validate_amount(request.amount)?;

    let adopter = AdopterRepository::new(&state.storage).get(&request.adopter_id)?;
    FarmerRepository::new(&state.storage).get(&request.farmer_id)?;

    let currency = request
        .currency
        .as_deref()
        .unwrap_or(DEFAULT_CURRENCY)
        .to_ascii_uppercase();
    let details = build_details(&request, &currency)?;
    let plan = PaymentPlan::new(request.cadence, request.amount, &currency);

    let adoption = AdoptionRecord::new(
        adopter.adopter_id.clone(),
        request.farmer_id.clone(),
        request.adoption_type,
        details,
        plan,
    );
    state.ledger.create_pending_adoption(&adoption)?;

    let payment = activation_payment(&adoption, &adopter, PaymentType::Adoption);
    if let Err(err) = state.ledger.create_payment(&payment) {
        rollback_adoption(&state, &adoption.adoption_id);
        return Err(err.into());
    }

    let metadata = json!({
        "payment_type": payment.payment_type.as_str(),
        "adoption_id": adoption.adoption_id,
        "adopter_id": adoption.adopter_id,
        "farmer_id": adoption.farmer_id,
    });
    let checkout = match start_checkout(&state, &payment, &adopter.email, metadata).await {
        Ok(checkout) => checkout,
        Err(err) => {
            rollback_adoption(&state, &adoption.adoption_id);
            return Err(err);
        }
    };

    info!(
        adoption_id = %adoption.adoption_id,
        reference = %payment.reference,
        adopter_id = %adoption.adopter_id,
        farmer_id = %adoption.farmer_id,
        "adoption created, awaiting activation payment"
    );
    Ok((
        StatusCode::CREATED,
        Json(AdoptionCheckoutResponse {
            adoption,
            payment,
            checkout,
        }),
    ))
}

/// Start another charge against an existing adoption: a fresh activation
/// attempt while it is still pending (the first charge failed or was
/// abandoned), or a top-up contribution once it is active.
#[utoipa::path(
    post,
    path = "/v1/adoptions/{adoption_id}/pay",
    params(("adoption_id" = String, Path, description = "Adoption identifier")),
    tag = "Adoptions",
    responses(
        (status = 201, body = PaymentCheckoutResponse),
        (status = 404, description = "Unknown adoption"),
        (status = 422, description = "Adoption is completed or cancelled"),
        (status = 502, description = "Gateway unreachable"),
        (status = 503, description = "Gateway not configured")
    )
)]
pub async fn pay_adoption(
    Path(adoption_id): Path<String>,
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<PaymentCheckoutResponse>), ApiError> {
    state.gateway()?;

    let adoption = state
        .ledger
        .get_adoption(&adoption_id)?
        .ok_or_else(|| ApiError::not_found(format!("adoption {adoption_id}")))?;
    if !adoption.status.holds_slot() {
        return Err(ApiError::unprocessable(format!(
            "adoption is {}; no further payments can be initiated",
            adoption.status.as_str()
        )));
    }

    let adopter = AdopterRepository::new(&state.storage).get(&adoption.adopter_id)?;
    // A still-pending adoption gets a fresh activation charge; an active
    // or paused one gets a contribution toward the running total.
    let payment_type = if adoption.status == AdoptionStatus::Pending {
        PaymentType::Adoption
    } else {
        PaymentType::Contribution
    };

    let payment = activation_payment(&adoption, &adopter, payment_type);
    state.ledger.create_payment(&payment)?;

    let metadata = json!({
        "payment_type": payment.payment_type.as_str(),
        "adoption_id": adoption.adoption_id,
        "adopter_id": adoption.adopter_id,
        "farmer_id": adoption.farmer_id,
    });
    let checkout = start_checkout(&state, &payment, &adopter.email, metadata).await?;

    info!(
        adoption_id = %adoption.adoption_id,
        reference = %payment.reference,
        payment_type = payment.payment_type.as_str(),
        "follow-up charge initialized"
    );
    Ok((
        StatusCode::CREATED,
        Json(PaymentCheckoutResponse { payment, checkout }),
    ))
}

#[utoipa::path(
    get,
    path = "/v1/adoptions/{adoption_id}",
    params(("adoption_id" = String, Path, description = "Adoption identifier")),
    tag = "Adoptions",
    responses(
        (status = 200, body = AdoptionRecord),
        (status = 404, description = "Unknown adoption")
    )
)]
pub async fn get_adoption(
    Path(adoption_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<AdoptionRecord>, ApiError> {
    let adoption = state
        .ledger
        .get_adoption(&adoption_id)?
        .ok_or_else(|| ApiError::not_found(format!("adoption {adoption_id}")))?;
    Ok(Json(adoption))
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListAdoptionsQuery {
    /// List adoptions created by this adopter.
    pub adopter_id: Option<String>,
    /// List adoptions pairing this farmer.
    pub farmer_id: Option<String>,
}

#[utoipa::path(
    get,
    path = "/v1/adoptions",
    params(ListAdoptionsQuery),
    tag = "Adoptions",
    responses(
        (status = 200, body = [AdoptionRecord]),
        (status = 400, description = "Neither or both filters given")
    )
)]
pub async fn list_adoptions(
    State(state): State<AppState>,
    Query(query): Query<ListAdoptionsQuery>,
) -> Result<Json<Vec<AdoptionRecord>>, ApiError> {
    let adoptions = match (query.adopter_id.as_deref(), query.farmer_id.as_deref()) {
        (Some(adopter_id), None) => state.ledger.list_adoptions_by_adopter(adopter_id)?,
        (None, Some(farmer_id)) => state.ledger.list_adoptions_by_farmer(farmer_id)?,
        _ => {
            return Err(ApiError::bad_request(
                "provide exactly one of adopter_id or farmer_id",
            ));
        }
    };
    Ok(Json(adoptions))
}

async fn transition(
    state: AppState,
    adoption_id: String,
    target: AdoptionStatus,
) -> Result<Json<AdoptionRecord>, ApiError> {
    let updated = state.ledger.transition_adoption(&adoption_id, target)?;
    info!(
        adoption_id = %updated.adoption_id,
        status = updated.status.as_str(),
        "adoption transitioned"
    );
    Ok(Json(updated))
}

#[utoipa::path(
    post,
    path = "/v1/adoptions/{adoption_id}/cancel",
    params(("adoption_id" = String, Path, description = "Adoption identifier")),
    tag = "Adoptions",
    responses(
        (status = 200, body = AdoptionRecord),
        (status = 404, description = "Unknown adoption"),
        (status = 422, description = "Transition not allowed from the current status")
    )
)]
pub async fn cancel_adoption(
    Path(adoption_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<AdoptionRecord>, ApiError> {
    transition(state, adoption_id, AdoptionStatus::Cancelled).await
}

#[utoipa::path(
    post,
    path = "/v1/adoptions/{adoption_id}/pause",
    params(("adoption_id" = String, Path, description = "Adoption identifier")),
    tag = "Adoptions",
    responses(
        (status = 200, body = AdoptionRecord),
        (status = 404, description = "Unknown adoption"),
        (status = 422, description = "Transition not allowed from the current status")
    )
)]
pub async fn pause_adoption(
    Path(adoption_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<AdoptionRecord>, ApiError> {
    transition(state, adoption_id, AdoptionStatus::Paused).await
}

#[utoipa::path(
    post,
    path = "/v1/adoptions/{adoption_id}/complete",
    params(("adoption_id" = String, Path, description = "Adoption identifier")),
    tag = "Adoptions",
    responses(
        (status = 200, body = AdoptionRecord),
        (status = 404, description = "Unknown adoption"),
        (status = 422, description = "Transition not allowed from the current status")
    )
)]
pub async fn complete_adoption(
    Path(adoption_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<AdoptionRecord>, ApiError> {
    transition(state, adoption_id, AdoptionStatus::Completed).await
}
