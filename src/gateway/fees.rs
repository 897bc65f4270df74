// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 ShambaLink

//! Fee schedule and monetary unit conversion.
//!
//! The gateway charges 1.5% per transaction plus a flat surcharge on larger
//! amounts, capped at a ceiling; the platform takes 2% uncapped. Fees are
//! computed and rounded in whole KES (major units). The payer is charged
//! `amount + platform fee`; the gateway retains its own fee out of the
//! settlement, so it never appears in the charged total, only in the net.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Conversion factor between major units (KES) and the minor units the
/// gateway API speaks. Applied exactly once per boundary crossing, in the
/// gateway module and nowhere else.
pub const MINOR_UNITS_PER_MAJOR: u64 = 100;

/// Largest single charge the platform accepts, in major units.
///
/// Keeps fee arithmetic far away from integer overflow and matches the
/// gateway's own per-transaction ceiling.
pub const MAX_CHARGE_MAJOR: u64 = 10_000_000;

/// Gateway processing fee rate, in permille (1.5%).
const GATEWAY_FEE_PERMILLE: u64 = 15;

/// Flat surcharge applied once the amount exceeds the waiver threshold.
const GATEWAY_FLAT_SURCHARGE: u64 = 100;

/// Amounts at or below this are exempt from the flat surcharge.
const GATEWAY_SURCHARGE_THRESHOLD: u64 = 2_500;

/// Ceiling on the total gateway fee for a single charge.
const GATEWAY_FEE_CAP: u64 = 2_000;

/// Platform commission rate, in permille (2%), uncapped.
const PLATFORM_FEE_PERMILLE: u64 = 20;

/// Per-payment fee breakdown, persisted on every ledger row.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema,
)]
pub struct FeeBreakdown {
    /// Fee retained by the payment gateway, major units.
    pub gateway: u64,
    /// Platform commission, major units.
    pub platform: u64,
}

impl FeeBreakdown {
    pub fn total(&self) -> u64 {
        self.gateway + self.platform
    }
}

/// Compute the fee breakdown for an amount in major units.
pub fn calculate_fees(amount_major: u64) -> FeeBreakdown {
    let mut gateway = permille_rounded(amount_major, GATEWAY_FEE_PERMILLE);
    if amount_major > GATEWAY_SURCHARGE_THRESHOLD {
        gateway += GATEWAY_FLAT_SURCHARGE;
    }
    let gateway = gateway.min(GATEWAY_FEE_CAP);
    let platform = permille_rounded(amount_major, PLATFORM_FEE_PERMILLE);
    FeeBreakdown { gateway, platform }
}

/// Total the payer is charged at the gateway: the amount plus the platform
/// commission. The gateway's own fee is deducted from settlement, not added
/// to the charge.
pub fn charge_total(amount_major: u64) -> u64 {
    amount_major + calculate_fees(amount_major).platform
}

/// Amount credited to the counterpart after all fees.
pub fn net_amount(amount_major: u64, fees: &FeeBreakdown) -> u64 {
    amount_major.saturating_sub(fees.total())
}

pub fn to_minor_units(amount_major: u64) -> u64 {
    amount_major * MINOR_UNITS_PER_MAJOR
}

pub fn from_minor_units(amount_minor: u64) -> u64 {
    amount_minor / MINOR_UNITS_PER_MAJOR
}

/// Round-half-up permille share, in whole major units.
fn permille_rounded(amount: u64, permille: u64) -> u64 {
    (amount * permille + 500) / 1000
}
