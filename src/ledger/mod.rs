// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 ShambaLink

//! # Reconciliation Ledger Module
//!
//! This module owns every record that money can move through: payments,
//! adoptions, withdrawals and crowdfunding projects, all persisted in a
//! single **redb** database. redb gives us serialized write transactions,
//! which is what the correctness of this module leans on.
//!
//! ## Concurrency Model
//!
//! - One writer at a time: every check-then-write here (payment settle,
//!   adoption slot claim, withdrawal balance check) happens inside one
//!   write transaction, so racing callers serialize and exactly one wins
//! - Readers never block: listings and balance reads use snapshots
//! - No stored aggregates: wallet balances and profile statistics are
//!   derived from the rows on every read
//!
//! ## Keyspace Layout
//!
//! ```text
//! payments                  reference → PaymentRecord (JSON)
//! payments_by_payer         "{payer_id}|{reference}" → payment type
//! payments_by_farmer        "{farmer_id}|{reference}" → payment type
//! adoptions                 adoption_id → AdoptionRecord (JSON)
//! slot_by_adopter           adopter_id → adoption_id   (exclusivity)
//! slot_by_farmer            farmer_id → adoption_id    (exclusivity)
//! adoptions_by_adopter      "{adopter_id}|{adoption_id}" → adoption type
//! adoptions_by_farmer       "{farmer_id}|{adoption_id}" → adoption type
//! withdrawals               reference → WithdrawalRecord (JSON)
//! withdrawals_by_farmer     "{farmer_id}|{reference}" → currency
//! projects                  project_id → ProjectRecord (JSON)
//! ```

pub mod adoption;
pub mod db;
pub mod payment;
pub mod project;
pub mod stats;
pub mod withdrawal;

pub use adoption::{
    AdoptionCredit, AdoptionDetails, AdoptionRecord, AdoptionStatus, AdoptionType, PaymentPlan,
    PlanCadence,
};
pub use db::{new_reference, LedgerDb, LedgerError, LedgerResult};
pub use payment::{
    PaymentMetadata, PaymentRecord, PaymentStatus, PaymentType, SettleOutcome, SettleUpdate,
};
pub use project::{BackerEntry, ProjectCredit, ProjectRecord};
pub use stats::{AdopterLedgerStats, FarmerLedgerStats};
pub use withdrawal::{
    PayoutMethod, WalletBalance, WithdrawalRecord, WithdrawalStatus, WITHDRAWAL_PREFIX,
};
