// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 ShambaLink

//! Farmer wallet balance and withdrawals.
//!
//! There is no stored balance anywhere: every read derives it from settled
//! payments minus completed and in-flight withdrawals, and the withdrawal
//! create re-derives it inside the ledger's write transaction. Handlers
//! here only route and translate errors.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::info;

use crate::{
    error::ApiError,
    gateway::DEFAULT_CURRENCY,
    ledger::{WalletBalance, WithdrawalRecord, WithdrawalStatus},
    models::{CreateWithdrawalRequest, RejectWithdrawalRequest},
    state::AppState,
    storage::FarmerRepository,
};

fn require_farmer(state: &AppState, farmer_id: &str) -> Result<(), ApiError> {
    if !FarmerRepository::new(&state.storage).exists(farmer_id) {
        return Err(ApiError::not_found(format!("farmer {farmer_id}")));
    }
    Ok(())
}

#[utoipa::path(
    get,
    path = "/v1/farmers/{farmer_id}/wallet",
    params(("farmer_id" = String, Path, description = "Farmer identifier")),
    tag = "Wallet",
    responses(
        (status = 200, body = WalletBalance),
        (status = 404, description = "Unknown farmer")
    )
)]
pub async fn get_wallet(
    Path(farmer_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<WalletBalance>, ApiError> {
    require_farmer(&state, &farmer_id)?;
    let balance = state.ledger.available_balance(&farmer_id)?;
    Ok(Json(balance))
}

#[utoipa::path(
    post,
    path = "/v1/farmers/{farmer_id}/withdrawals",
    params(("farmer_id" = String, Path, description = "Farmer identifier")),
    request_body = CreateWithdrawalRequest,
    tag = "Wallet",
    responses(
        (status = 201, body = WithdrawalRecord),
        (status = 404, description = "Unknown farmer"),
        (status = 422, description = "Zero amount or insufficient balance")
    )
)]
pub async fn create_withdrawal(
    Path(farmer_id): Path<String>,
    State(state): State<AppState>,
    Json(request): Json<CreateWithdrawalRequest>,
) -> Result<(StatusCode, Json<WithdrawalRecord>), ApiError> {
    require_farmer(&state, &farmer_id)?;
    if request.amount == 0 {
        return Err(ApiError::unprocessable("amount must be at least 1"));
    }

    let currency = request.currency.as_deref().unwrap_or(DEFAULT_CURRENCY);
    let record =
        state
            .ledger
            .create_withdrawal(&farmer_id, request.amount, currency, request.method)?;

    info!(
        reference = %record.reference,
        farmer_id = %record.farmer_id,
        amount = record.amount,
        "withdrawal requested"
    );
    Ok((StatusCode::CREATED, Json(record)))
}

#[utoipa::path(
    get,
    path = "/v1/farmers/{farmer_id}/withdrawals",
    params(("farmer_id" = String, Path, description = "Farmer identifier")),
    tag = "Wallet",
    responses(
        (status = 200, body = [WithdrawalRecord]),
        (status = 404, description = "Unknown farmer")
    )
)]
pub async fn list_withdrawals(
    Path(farmer_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Vec<WithdrawalRecord>>, ApiError> {
    require_farmer(&state, &farmer_id)?;
    let withdrawals = state.ledger.list_withdrawals_by_farmer(&farmer_id)?;
    Ok(Json(withdrawals))
}

#[utoipa::path(
    post,
    path = "/v1/withdrawals/{reference}/process",
    params(("reference" = String, Path, description = "Withdrawal reference")),
    tag = "Wallet",
    responses(
        (status = 200, body = WithdrawalRecord),
        (status = 404, description = "Unknown withdrawal"),
        (status = 422, description = "Not in a processable state")
    )
)]
pub async fn process_withdrawal(
    Path(reference): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<WithdrawalRecord>, ApiError> {
    let record = state
        .ledger
        .transition_withdrawal(&reference, WithdrawalStatus::Processing, None)?;
    Ok(Json(record))
}

#[utoipa::path(
    post,
    path = "/v1/withdrawals/{reference}/complete",
    params(("reference" = String, Path, description = "Withdrawal reference")),
    tag = "Wallet",
    responses(
        (status = 200, body = WithdrawalRecord),
        (status = 404, description = "Unknown withdrawal"),
        (status = 422, description = "Not in a completable state")
    )
)]
pub async fn complete_withdrawal(
    Path(reference): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<WithdrawalRecord>, ApiError> {
    let record =
        state
            .ledger
            .transition_withdrawal(&reference, WithdrawalStatus::Completed, None)?;
    info!(
        reference = %record.reference,
        farmer_id = %record.farmer_id,
        amount = record.amount,
        "withdrawal paid out"
    );
    Ok(Json(record))
}

#[utoipa::path(
    post,
    path = "/v1/withdrawals/{reference}/reject",
    params(("reference" = String, Path, description = "Withdrawal reference")),
    request_body = RejectWithdrawalRequest,
    tag = "Wallet",
    responses(
        (status = 200, body = WithdrawalRecord),
        (status = 404, description = "Unknown withdrawal"),
        (status = 422, description = "Already completed or rejected")
    )
)]
pub async fn reject_withdrawal(
    Path(reference): Path<String>,
    State(state): State<AppState>,
    Json(request): Json<RejectWithdrawalRequest>,
) -> Result<Json<WithdrawalRecord>, ApiError> {
    let record = state.ledger.transition_withdrawal(
        &reference,
        WithdrawalStatus::Rejected,
        request.reason.as_deref(),
    )?;
    info!(
        reference = %record.reference,
        farmer_id = %record.farmer_id,
        "withdrawal rejected, funds released"
    );
    Ok(Json(record))
}
