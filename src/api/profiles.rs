// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 ShambaLink

//! Farmer and adopter registration plus ledger-derived statistics.
//!
//! Profiles are plain JSON documents in the file store; everything numeric
//! about a party (earnings, adoption counts) is derived from the ledger at
//! read time rather than stored on the profile.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use uuid::Uuid;

use crate::{
    error::ApiError,
    models::{AdopterWithStats, CreateAdopterRequest, CreateFarmerRequest, FarmerWithStats},
    state::AppState,
    storage::{AdopterProfile, AdopterRepository, FarmerProfile, FarmerRepository},
};

#[utoipa::path(
    post,
    path = "/v1/farmers",
    request_body = CreateFarmerRequest,
    tag = "Profiles",
    responses(
        (status = 201, body = FarmerProfile),
        (status = 400, description = "Missing required fields")
    )
)]
pub async fn create_farmer(
    State(state): State<AppState>,
    Json(request): Json<CreateFarmerRequest>,
) -> Result<(StatusCode, Json<FarmerProfile>), ApiError> {
    if request.full_name.trim().is_empty() || request.email.trim().is_empty() {
        return Err(ApiError::bad_request("full_name and email are required"));
    }

    let profile = FarmerProfile {
        farmer_id: Uuid::new_v4().to_string(),
        full_name: request.full_name,
        email: request.email,
        phone: request.phone,
        county: request.county,
        farm_name: request.farm_name,
        created_at: Utc::now(),
    };
    FarmerRepository::new(&state.storage).create(&profile)?;

    Ok((StatusCode::CREATED, Json(profile)))
}

#[utoipa::path(
    get,
    path = "/v1/farmers",
    tag = "Profiles",
    responses((status = 200, body = [FarmerProfile]))
)]
pub async fn list_farmers(
    State(state): State<AppState>,
) -> Result<Json<Vec<FarmerProfile>>, ApiError> {
    let farmers = FarmerRepository::new(&state.storage).list_all()?;
    Ok(Json(farmers))
}

#[utoipa::path(
    get,
    path = "/v1/farmers/{farmer_id}",
    params(("farmer_id" = String, Path, description = "Farmer identifier")),
    tag = "Profiles",
    responses(
        (status = 200, body = FarmerProfile),
        (status = 404, description = "Unknown farmer")
    )
)]
pub async fn get_farmer(
    Path(farmer_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<FarmerProfile>, ApiError> {
    let profile = FarmerRepository::new(&state.storage).get(&farmer_id)?;
    Ok(Json(profile))
}

#[utoipa::path(
    get,
    path = "/v1/farmers/{farmer_id}/stats",
    params(("farmer_id" = String, Path, description = "Farmer identifier")),
    tag = "Profiles",
    responses(
        (status = 200, body = FarmerWithStats),
        (status = 404, description = "Unknown farmer")
    )
)]
pub async fn get_farmer_stats(
    Path(farmer_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<FarmerWithStats>, ApiError> {
    let profile = FarmerRepository::new(&state.storage).get(&farmer_id)?;
    let stats = state.ledger.farmer_stats(&farmer_id)?;
    Ok(Json(FarmerWithStats { profile, stats }))
}

#[utoipa::path(
    post,
    path = "/v1/adopters",
    request_body = CreateAdopterRequest,
    tag = "Profiles",
    responses(
        (status = 201, body = AdopterProfile),
        (status = 400, description = "Missing required fields")
    )
)]
pub async fn create_adopter(
    State(state): State<AppState>,
    Json(request): Json<CreateAdopterRequest>,
) -> Result<(StatusCode, Json<AdopterProfile>), ApiError> {
    if request.full_name.trim().is_empty() || request.email.trim().is_empty() {
        return Err(ApiError::bad_request("full_name and email are required"));
    }

    let profile = AdopterProfile {
        adopter_id: Uuid::new_v4().to_string(),
        full_name: request.full_name,
        email: request.email,
        phone: request.phone,
        created_at: Utc::now(),
    };
    AdopterRepository::new(&state.storage).create(&profile)?;

    Ok((StatusCode::CREATED, Json(profile)))
}

#[utoipa::path(
    get,
    path = "/v1/adopters/{adopter_id}",
    params(("adopter_id" = String, Path, description = "Adopter identifier")),
    tag = "Profiles",
    responses(
        (status = 200, body = AdopterProfile),
        (status = 404, description = "Unknown adopter")
    )
)]
pub async fn get_adopter(
    Path(adopter_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<AdopterProfile>, ApiError> {
    let profile = AdopterRepository::new(&state.storage).get(&adopter_id)?;
    Ok(Json(profile))
}

#[utoipa::path(
    get,
    path = "/v1/adopters/{adopter_id}/stats",
    params(("adopter_id" = String, Path, description = "Adopter identifier")),
    tag = "Profiles",
    responses(
        (status = 200, body = AdopterWithStats),
        (status = 404, description = "Unknown adopter")
    )
)]
pub async fn get_adopter_stats(
    Path(adopter_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<AdopterWithStats>, ApiError> {
    let profile = AdopterRepository::new(&state.storage).get(&adopter_id)?;
    let stats = state.ledger.adopter_stats(&adopter_id)?;
    Ok(Json(AdopterWithStats { profile, stats }))
}
