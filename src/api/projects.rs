// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 ShambaLink

//! Crowdfunding projects. Creation and reads live here; crediting happens
//! exclusively through payment reconciliation.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use tracing::info;
use utoipa::IntoParams;

use crate::{
    error::ApiError,
    ledger::ProjectRecord,
    models::CreateProjectRequest,
    state::AppState,
    storage::FarmerRepository,
};

#[utoipa::path(
    post,
    path = "/v1/projects",
    request_body = CreateProjectRequest,
    tag = "Projects",
    responses(
        (status = 201, body = ProjectRecord),
        (status = 400, description = "Missing title"),
        (status = 404, description = "Unknown farmer"),
        (status = 422, description = "Zero goal amount")
    )
)]
pub async fn create_project(
    State(state): State<AppState>,
    Json(request): Json<CreateProjectRequest>,
) -> Result<(StatusCode, Json<ProjectRecord>), ApiError> {
    if request.title.trim().is_empty() {
        return Err(ApiError::bad_request("title is required"));
    }
    if request.goal_amount == 0 {
        return Err(ApiError::unprocessable("goal_amount must be at least 1"));
    }
    if !FarmerRepository::new(&state.storage).exists(&request.farmer_id) {
        return Err(ApiError::not_found(format!("farmer {}", request.farmer_id)));
    }

    let currency = request
        .currency
        .as_deref()
        .unwrap_or(crate::gateway::DEFAULT_CURRENCY);
    let project = ProjectRecord::new(
        request.farmer_id,
        request.title,
        request.description,
        request.goal_amount,
        currency,
    );
    state.ledger.create_project(&project)?;

    info!(
        project_id = %project.project_id,
        farmer_id = %project.farmer_id,
        goal = project.goal_amount,
        "crowdfunding project opened"
    );
    Ok((StatusCode::CREATED, Json(project)))
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListProjectsQuery {
    /// Restrict to projects raised for this farmer.
    pub farmer_id: Option<String>,
}

#[utoipa::path(
    get,
    path = "/v1/projects",
    params(ListProjectsQuery),
    tag = "Projects",
    responses((status = 200, body = [ProjectRecord]))
)]
pub async fn list_projects(
    State(state): State<AppState>,
    Query(query): Query<ListProjectsQuery>,
) -> Result<Json<Vec<ProjectRecord>>, ApiError> {
    let mut projects = state.ledger.list_projects()?;
    if let Some(farmer_id) = query.farmer_id.as_deref() {
        projects.retain(|project| project.farmer_id == farmer_id);
    }
    Ok(Json(projects))
}

#[utoipa::path(
    get,
    path = "/v1/projects/{project_id}",
    params(("project_id" = String, Path, description = "Project identifier")),
    tag = "Projects",
    responses(
        (status = 200, body = ProjectRecord),
        (status = 404, description = "Unknown project")
    )
)]
pub async fn get_project(
    Path(project_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<ProjectRecord>, ApiError> {
    let project = state
        .ledger
        .get_project(&project_id)?
        .ok_or_else(|| ApiError::not_found(format!("project {project_id}")))?;
    Ok(Json(project))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::tests::{register_farmer, test_state};
    use crate::ledger::BackerEntry;
    use chrono::Utc;

    fn project_request(farmer_id: &str) -> CreateProjectRequest {
        CreateProjectRequest {
            farmer_id: farmer_id.to_string(),
            title: "Borehole for the dry season".into(),
            description: Some("Water security for the herd".into()),
            goal_amount: 120_000,
            currency: None,
        }
    }

    #[tokio::test]
    async fn create_and_fetch_project() {
        let (state, cleanup) = test_state();
        let farmer = register_farmer(&state).await;

        let (status, Json(project)) =
            create_project(State(state.clone()), Json(project_request(&farmer.farmer_id)))
                .await
                .expect("project creation succeeds");
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(project.raised_amount, 0);
        assert_eq!(project.currency, "KES");

        let Json(fetched) = get_project(Path(project.project_id.clone()), State(state))
            .await
            .expect("project lookup succeeds");
        assert_eq!(fetched.title, "Borehole for the dry season");

        cleanup();
    }

    #[tokio::test]
    async fn unknown_farmer_is_404() {
        let (state, cleanup) = test_state();

        let err = create_project(State(state), Json(project_request("ghost")))
            .await
            .expect_err("unknown farmer is rejected");
        assert_eq!(err.status, StatusCode::NOT_FOUND);

        cleanup();
    }

    #[tokio::test]
    async fn listing_filters_by_farmer() {
        let (state, cleanup) = test_state();
        let farmer = register_farmer(&state).await;
        let other = register_farmer(&state).await;
        create_project(State(state.clone()), Json(project_request(&farmer.farmer_id)))
            .await
            .expect("first project");
        create_project(State(state.clone()), Json(project_request(&other.farmer_id)))
            .await
            .expect("second project");

        let Json(all) = list_projects(
            State(state.clone()),
            Query(ListProjectsQuery { farmer_id: None }),
        )
        .await
        .expect("listing succeeds");
        assert_eq!(all.len(), 2);

        let Json(filtered) = list_projects(
            State(state),
            Query(ListProjectsQuery {
                farmer_id: Some(farmer.farmer_id.clone()),
            }),
        )
        .await
        .expect("filtered listing succeeds");
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].farmer_id, farmer.farmer_id);

        cleanup();
    }

    #[tokio::test]
    async fn read_shows_ledger_credits() {
        let (state, cleanup) = test_state();
        let farmer = register_farmer(&state).await;
        let (_, Json(project)) =
            create_project(State(state.clone()), Json(project_request(&farmer.farmer_id)))
                .await
                .expect("project creation succeeds");

        state
            .ledger
            .credit_project(
                &project.project_id,
                BackerEntry {
                    payer_id: "adopter-9".into(),
                    amount: 5_000,
                    reference: "CFD_1_abc".into(),
                    paid_at: Utc::now(),
                },
            )
            .unwrap();

        let Json(funded) = get_project(Path(project.project_id), State(state))
            .await
            .expect("project lookup succeeds");
        assert_eq!(funded.raised_amount, 5_000);
        assert_eq!(funded.backers.len(), 1);

        cleanup();
    }

    #[tokio::test]
    async fn zero_goal_is_422() {
        let (state, cleanup) = test_state();
        let farmer = register_farmer(&state).await;

        let mut request = project_request(&farmer.farmer_id);
        request.goal_amount = 0;
        let err = create_project(State(state), Json(request))
            .await
            .expect_err("zero goal is refused");
        assert_eq!(err.status, StatusCode::UNPROCESSABLE_ENTITY);

        cleanup();
    }
}
