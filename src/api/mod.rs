// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 ShambaLink

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    gateway::FeeBreakdown,
    ledger::{
        AdopterLedgerStats, AdoptionDetails, AdoptionRecord, AdoptionStatus, AdoptionType,
        BackerEntry, FarmerLedgerStats, PaymentMetadata, PaymentPlan, PaymentRecord, PaymentStatus,
        PaymentType, PayoutMethod, PlanCadence, ProjectRecord, WalletBalance, WithdrawalRecord,
        WithdrawalStatus,
    },
    models::{
        AdopterWithStats, AdoptionCheckoutResponse, CheckoutInfo, CreateAdopterRequest,
        CreateAdoptionRequest, CreateFarmerRequest, CreateProjectRequest, CreateWithdrawalRequest,
        FarmerWithStats, InitializePaymentRequest, PaymentCheckoutResponse, ReconcileResponse,
        RejectWithdrawalRequest, WebhookAck,
    },
    state::AppState,
    storage::{AdopterProfile, FarmerProfile},
};

pub mod adoptions;
pub mod health;
pub mod payments;
pub mod profiles;
pub mod projects;
pub mod wallet;
pub mod webhooks;

pub fn router(state: AppState) -> Router {
    let v1_routes = Router::new()
        .route(
            "/farmers",
            get(profiles::list_farmers).post(profiles::create_farmer),
        )
        .route("/farmers/{farmer_id}", get(profiles::get_farmer))
        .route("/farmers/{farmer_id}/stats", get(profiles::get_farmer_stats))
        .route("/farmers/{farmer_id}/wallet", get(wallet::get_wallet))
        .route(
            "/farmers/{farmer_id}/withdrawals",
            get(wallet::list_withdrawals).post(wallet::create_withdrawal),
        )
        .route("/adopters", post(profiles::create_adopter))
        .route("/adopters/{adopter_id}", get(profiles::get_adopter))
        .route(
            "/adopters/{adopter_id}/stats",
            get(profiles::get_adopter_stats),
        )
        .route(
            "/adoptions",
            get(adoptions::list_adoptions).post(adoptions::create_adoption),
        )
        .route("/adoptions/{adoption_id}", get(adoptions::get_adoption))
        .route("/adoptions/{adoption_id}/pay", post(adoptions::pay_adoption))
        .route(
            "/adoptions/{adoption_id}/cancel",
            post(adoptions::cancel_adoption),
        )
        .route(
            "/adoptions/{adoption_id}/pause",
            post(adoptions::pause_adoption),
        )
        .route(
            "/adoptions/{adoption_id}/complete",
            post(adoptions::complete_adoption),
        )
        .route(
            "/payments",
            get(payments::list_payments).post(payments::create_payment),
        )
        .route("/payments/{reference}", get(payments::get_payment))
        .route("/payments/{reference}/verify", get(payments::verify_payment))
        .route("/payments/{reference}/refund", post(payments::refund_payment))
        .route("/webhooks/gateway", post(webhooks::gateway_webhook))
        .route(
            "/withdrawals/{reference}/process",
            post(wallet::process_withdrawal),
        )
        .route(
            "/withdrawals/{reference}/complete",
            post(wallet::complete_withdrawal),
        )
        .route(
            "/withdrawals/{reference}/reject",
            post(wallet::reject_withdrawal),
        )
        .route(
            "/projects",
            get(projects::list_projects).post(projects::create_project),
        )
        .route("/projects/{project_id}", get(projects::get_project))
        .with_state(state.clone());

    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .with_state(state);

    Router::new()
        .nest("/v1", v1_routes)
        .merge(health_routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        health::liveness,
        health::readiness,
        profiles::create_farmer,
        profiles::list_farmers,
        profiles::get_farmer,
        profiles::get_farmer_stats,
        profiles::create_adopter,
        profiles::get_adopter,
        profiles::get_adopter_stats,
        adoptions::create_adoption,
        adoptions::pay_adoption,
        adoptions::get_adoption,
        adoptions::list_adoptions,
        adoptions::cancel_adoption,
        adoptions::pause_adoption,
        adoptions::complete_adoption,
        payments::create_payment,
        payments::get_payment,
        payments::list_payments,
        payments::verify_payment,
        payments::refund_payment,
        webhooks::gateway_webhook,
        wallet::get_wallet,
        wallet::create_withdrawal,
        wallet::list_withdrawals,
        wallet::process_withdrawal,
        wallet::complete_withdrawal,
        wallet::reject_withdrawal,
        projects::create_project,
        projects::list_projects,
        projects::get_project
    ),
    components(
        schemas(
            FarmerProfile,
            AdopterProfile,
            CreateFarmerRequest,
            CreateAdopterRequest,
            FarmerWithStats,
            AdopterWithStats,
            FarmerLedgerStats,
            AdopterLedgerStats,
            AdoptionRecord,
            AdoptionType,
            AdoptionStatus,
            AdoptionDetails,
            PaymentPlan,
            PlanCadence,
            CreateAdoptionRequest,
            AdoptionCheckoutResponse,
            CheckoutInfo,
            PaymentRecord,
            PaymentStatus,
            PaymentType,
            PaymentMetadata,
            FeeBreakdown,
            InitializePaymentRequest,
            PaymentCheckoutResponse,
            ReconcileResponse,
            WebhookAck,
            WalletBalance,
            WithdrawalRecord,
            WithdrawalStatus,
            PayoutMethod,
            CreateWithdrawalRequest,
            RejectWithdrawalRequest,
            ProjectRecord,
            BackerEntry,
            CreateProjectRequest
        )
    ),
    tags(
        (name = "Health", description = "Service health probes"),
        (name = "Profiles", description = "Farmer and adopter registration"),
        (name = "Adoptions", description = "Adoption pairing and lifecycle"),
        (name = "Payments", description = "Charge initialization and reconciliation"),
        (name = "Webhooks", description = "Gateway event intake"),
        (name = "Wallet", description = "Farmer balances and withdrawals"),
        (name = "Projects", description = "Crowdfunding projects")
    )
)]
struct ApiDoc;

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use axum::extract::State;
    use axum::Json;
    use chrono::Utc;

    use crate::gateway::GatewayClient;
    use crate::ledger::{new_reference, LedgerDb, SettleUpdate};
    use crate::storage::{FileStore, StoragePaths};

    pub(crate) const TEST_GATEWAY_SECRET: &str = "sk_test_webhook_secret";

    fn fresh_state(gateway: Option<GatewayClient>) -> (AppState, impl FnOnce()) {
        let root =
            std::env::temp_dir().join(format!("shambalink-api-test-{}", uuid::Uuid::new_v4()));
        let paths = StoragePaths::new(&root);
        let ledger = LedgerDb::open(&paths.ledger_file()).expect("ledger opens");
        let mut store = FileStore::new(paths);
        store.initialize().expect("store initializes");
        let state = AppState::new(ledger, store, gateway);
        (state, move || {
            let _ = std::fs::remove_dir_all(root);
        })
    }

    /// State over throwaway storage, no gateway configured.
    pub(crate) fn test_state() -> (AppState, impl FnOnce()) {
        fresh_state(None)
    }

    /// State whose gateway client points at a closed local port: signature
    /// verification works, any HTTP call to it fails fast.
    pub(crate) fn test_state_with_gateway() -> (AppState, impl FnOnce()) {
        let gateway = GatewayClient::new(
            "http://127.0.0.1:9".to_string(),
            TEST_GATEWAY_SECRET.to_string(),
            "http://localhost:8080/payments/callback".to_string(),
        )
        .expect("test gateway client builds");
        fresh_state(Some(gateway))
    }

    pub(crate) async fn register_farmer(state: &AppState) -> FarmerProfile {
        let (_, Json(profile)) = profiles::create_farmer(
            State(state.clone()),
            Json(CreateFarmerRequest {
                full_name: "Test Farmer".into(),
                email: "farmer@example.com".into(),
                phone: "+254700000000".into(),
                county: "Nakuru".into(),
                farm_name: None,
            }),
        )
        .await
        .expect("farmer registration succeeds");
        profile
    }

    pub(crate) async fn register_adopter(state: &AppState) -> AdopterProfile {
        let (_, Json(profile)) = profiles::create_adopter(
            State(state.clone()),
            Json(CreateAdopterRequest {
                full_name: "Test Adopter".into(),
                email: "adopter@example.com".into(),
                phone: None,
            }),
        )
        .await
        .expect("adopter registration succeeds");
        profile
    }

    /// Insert a pending payment directed at a farmer; returns the reference.
    pub(crate) fn seed_pending_payment(
        state: &AppState,
        payer_id: &str,
        farmer_id: &str,
        amount: u64,
    ) -> String {
        let reference = new_reference(PaymentType::Adoption.reference_prefix());
        let mut payment = PaymentRecord::new_pending(
            reference.clone(),
            payer_id.to_string(),
            PaymentType::Adoption,
            amount,
            "KES",
            PaymentMetadata::default(),
        );
        payment.farmer_id = Some(farmer_id.to_string());
        state.ledger.create_payment(&payment).unwrap();
        reference
    }

    /// A payment settled as success with the normal fee schedule applied.
    pub(crate) fn settle_success(
        state: &AppState,
        payer_id: &str,
        farmer_id: &str,
        amount: u64,
    ) -> String {
        let reference = seed_pending_payment(state, payer_id, farmer_id, amount);
        state
            .ledger
            .settle_payment(
                &reference,
                &SettleUpdate {
                    status: PaymentStatus::Success,
                    paid_at: Some(Utc::now()),
                    channel: Some("mobile_money".to_string()),
                    instrument: None,
                    failure_reason: None,
                },
            )
            .unwrap();
        reference
    }

    /// A fee-free settled payment, so wallet arithmetic stays exact.
    pub(crate) fn earn(state: &AppState, farmer_id: &str, amount: u64) -> String {
        let reference = new_reference(PaymentType::Adoption.reference_prefix());
        let mut payment = PaymentRecord::new_pending(
            reference.clone(),
            "adopter-ledger".to_string(),
            PaymentType::Adoption,
            amount,
            "KES",
            PaymentMetadata::default(),
        );
        payment.farmer_id = Some(farmer_id.to_string());
        payment.fees = FeeBreakdown::default();
        payment.recompute_net();
        state.ledger.create_payment(&payment).unwrap();
        state
            .ledger
            .settle_payment(
                &reference,
                &SettleUpdate {
                    status: PaymentStatus::Success,
                    paid_at: Some(Utc::now()),
                    channel: None,
                    instrument: None,
                    failure_reason: None,
                },
            )
            .unwrap();
        reference
    }

    #[tokio::test]
    async fn router_builds_with_all_routes() {
        let (state, cleanup) = test_state();
        let app = router(state);
        // Ensure the router can be converted into a service without panicking.
        let _ = app.into_make_service();
        cleanup();
    }
}
