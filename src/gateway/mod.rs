// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 ShambaLink

//! Payment gateway adapter.
//!
//! Everything that touches the external gateway lives here: the HTTP client
//! (`client`), the fee schedule and unit conversion (`fees`), and webhook
//! signature verification plus event decoding (`webhook`). The rest of the
//! service never sees minor units or raw gateway payloads.

pub mod client;
pub mod fees;
pub mod webhook;

pub use client::{
    map_charge_status, parse_outcome, ChargeAuthorization, ChargeStatus, GatewayClient,
    GatewayError, GatewayOutcome, InitializeChargeRequest, DEFAULT_CURRENCY,
};
pub use fees::{calculate_fees, charge_total, net_amount, FeeBreakdown};
pub use webhook::{
    sign_payload, WebhookEvent, EVENT_CHARGE_FAILED, EVENT_CHARGE_SUCCESS,
    EVENT_SUBSCRIPTION_CREATE, EVENT_SUBSCRIPTION_DISABLE, SIGNATURE_HEADER,
};
