// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 ShambaLink

//! Profile statistics derived from the ledgers on every read. Nothing
//! here is a stored counter, so the figures cannot drift from the
//! underlying payments and adoptions.

use serde::Serialize;
use utoipa::ToSchema;

use super::adoption::AdoptionStatus;
use super::db::{LedgerDb, LedgerResult};
use super::payment::PaymentStatus;

#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
pub struct FarmerLedgerStats {
    /// Pairings still in progress (pending, active or paused).
    pub current_adoptions: u64,
    /// Every pairing ever created for this farmer.
    pub total_adoptions: u64,
    /// Σ net amounts of successful payments, major units.
    pub total_earned: u64,
}

#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
pub struct AdopterLedgerStats {
    /// Pairings currently in the `active` state.
    pub active_adoptions: u64,
    /// Every pairing ever created by this adopter.
    pub total_adoptions: u64,
    /// Σ base amounts of successful payments, major units.
    pub total_invested: u64,
    /// Count of successful payments.
    pub payments_made: u64,
}

impl LedgerDb {
    pub fn farmer_stats(&self, farmer_id: &str) -> LedgerResult<FarmerLedgerStats> {
        let adoptions = self.list_adoptions_by_farmer(farmer_id)?;
        let current = adoptions.iter().filter(|a| a.status.holds_slot()).count();
        let balance = self.available_balance(farmer_id)?;

        Ok(FarmerLedgerStats {
            current_adoptions: current as u64,
            total_adoptions: adoptions.len() as u64,
            total_earned: balance.total_earned,
        })
    }

    pub fn adopter_stats(&self, adopter_id: &str) -> LedgerResult<AdopterLedgerStats> {
        let adoptions = self.list_adoptions_by_adopter(adopter_id)?;
        let active = adoptions
            .iter()
            .filter(|a| a.status == AdoptionStatus::Active)
            .count();

        let payments = self.list_payments_by_payer(adopter_id)?;
        let mut invested: u64 = 0;
        let mut made: u64 = 0;
        for payment in &payments {
            if payment.status == PaymentStatus::Success {
                invested += payment.amount;
                made += 1;
            }
        }

        Ok(AdopterLedgerStats {
            active_adoptions: active as u64,
            total_adoptions: adoptions.len() as u64,
            total_invested: invested,
            payments_made: made,
        })
    }
}
