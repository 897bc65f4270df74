// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 ShambaLink

//! # API Data Models
//!
//! This module defines the request and response data structures used by
//! the REST API. All types derive `Serialize`/`Deserialize` and `ToSchema`
//! for automatic JSON handling and OpenAPI documentation.
//!
//! ## Amounts
//!
//! Every amount crossing the API is in **major units** (whole KES). The
//! gateway's minor-unit convention never leaks past the gateway module.
//!
//! ## Model Categories
//!
//! - **Profiles**: Farmer and adopter registration
//! - **Adoptions**: Pairing creation and checkout
//! - **Payments**: Charge initialization and reconciliation responses
//! - **Wallet**: Withdrawal requests
//! - **Projects**: Crowdfunding creation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::ledger::{
    AdopterLedgerStats, AdoptionRecord, AdoptionType, FarmerLedgerStats, PaymentRecord,
    PaymentType, PayoutMethod, PlanCadence,
};
use crate::storage::{AdopterProfile, FarmerProfile};

// =============================================================================
// Profile Models
// =============================================================================

/// Request to register a farmer.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateFarmerRequest {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    /// County where the farm sits, e.g. `Nakuru`.
    pub county: String,
    #[serde(default)]
    pub farm_name: Option<String>,
}

/// Request to register an adopter.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateAdopterRequest {
    pub full_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
}

/// Farmer profile together with its ledger-derived statistics.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct FarmerWithStats {
    pub profile: FarmerProfile,
    pub stats: FarmerLedgerStats,
}

/// Adopter profile together with its ledger-derived statistics.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AdopterWithStats {
    pub profile: AdopterProfile,
    pub stats: AdopterLedgerStats,
}

// =============================================================================
// Adoption Models
// =============================================================================

/// Request to create an adoption and start its activation checkout.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateAdoptionRequest {
    pub adopter_id: String,
    pub farmer_id: String,
    pub adoption_type: AdoptionType,
    pub cadence: PlanCadence,
    /// Installment amount in major units; also the first charge.
    pub amount: u64,
    /// Defaults to `KES`.
    #[serde(default)]
    pub currency: Option<String>,
    /// Required for crop-specific adoptions.
    #[serde(default)]
    pub crop: Option<String>,
    /// Required for livestock-specific adoptions.
    #[serde(default)]
    pub livestock: Option<String>,
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
}

/// Where to send the payer to complete a charge.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CheckoutInfo {
    /// Hosted checkout page for the payer's browser.
    pub authorization_url: String,
    pub access_code: String,
    /// Ledger payment reference; quote it to verify later.
    pub reference: String,
}

/// A freshly created adoption plus the checkout for its first charge.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AdoptionCheckoutResponse {
    pub adoption: AdoptionRecord,
    pub payment: PaymentRecord,
    pub checkout: CheckoutInfo,
}

// =============================================================================
// Payment Models
// =============================================================================

/// Request to initialize a standalone charge (contribution, crowdfunding,
/// visit or subscription; adoptions start through the adoptions endpoint).
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct InitializePaymentRequest {
    pub payer_id: String,
    pub payment_type: PaymentType,
    /// Base amount in major units, before fees.
    pub amount: u64,
    /// Defaults to `KES`.
    #[serde(default)]
    pub currency: Option<String>,
    /// Required for contribution payments.
    #[serde(default)]
    pub adoption_id: Option<String>,
    /// Required for crowdfunding payments.
    #[serde(default)]
    pub project_id: Option<String>,
    /// Directs a visit or subscription payment to a farmer's ledger.
    /// Ignored for contributions and crowdfunding, which derive the
    /// farmer from the linked record.
    #[serde(default)]
    pub farmer_id: Option<String>,
}

/// A pending payment plus its checkout.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PaymentCheckoutResponse {
    pub payment: PaymentRecord,
    pub checkout: CheckoutInfo,
}

/// Outcome of pushing a payment through reconciliation.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReconcileResponse {
    pub payment: PaymentRecord,
    /// `applied`, `already_final` or `still_pending`.
    pub disposition: String,
}

/// Acknowledgement body for accepted webhook deliveries.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WebhookAck {
    pub received: bool,
}

// =============================================================================
// Wallet Models
// =============================================================================

/// Request to withdraw from a farmer wallet.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateWithdrawalRequest {
    /// Major units; must not exceed the available balance.
    pub amount: u64,
    /// Defaults to `KES`.
    #[serde(default)]
    pub currency: Option<String>,
    pub method: PayoutMethod,
}

/// Request to reject a withdrawal, with an optional operator note.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RejectWithdrawalRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

// =============================================================================
// Project Models
// =============================================================================

/// Request to open a crowdfunding project for a farmer.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateProjectRequest {
    pub farmer_id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Funding goal in major units.
    pub goal_amount: u64,
    /// Defaults to `KES`.
    #[serde(default)]
    pub currency: Option<String>,
}
