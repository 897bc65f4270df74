// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 ShambaLink

//! Embedded ledger database backed by redb (pure Rust, ACID).
//!
//! redb serializes write transactions through a single writer, which is what
//! gives the ledger its concurrency guarantees: the conditional payment
//! settle, the adoption check-then-insert, and the withdrawal balance check
//! each run check and mutation inside one write transaction, so racing
//! requests observe each other's commits in some serial order.
//!
//! ## Table Layout
//!
//! - `payments`: reference → serialized PaymentRecord
//! - `payments_by_payer` / `payments_by_farmer`: `owner|reference` → payment type
//! - `adoptions`: adoption_id → serialized AdoptionRecord
//! - `slot_by_adopter` / `slot_by_farmer`: party id → adoption_id while an
//!   active-eligible (pending/active/paused) adoption holds the pairing
//! - `adoptions_by_adopter` / `adoptions_by_farmer`: `owner|adoption_id` → ""
//! - `withdrawals`: reference → serialized WithdrawalRecord
//! - `withdrawals_by_farmer`: `farmer_id|reference` → ""
//! - `projects`: project_id → serialized ProjectRecord

use std::path::Path;

use chrono::Utc;
use redb::{Database, TableDefinition};
use uuid::Uuid;

// =============================================================================
// Table Definitions
// =============================================================================

/// Primary table: payment reference → serialized PaymentRecord (JSON bytes).
pub(super) const PAYMENTS: TableDefinition<&str, &[u8]> = TableDefinition::new("payments");

/// Index: `payer_id|reference` → payment type string.
pub(super) const PAYMENTS_BY_PAYER: TableDefinition<&str, &str> =
    TableDefinition::new("payments_by_payer");

/// Index: `farmer_id|reference` → payment type string.
pub(super) const PAYMENTS_BY_FARMER: TableDefinition<&str, &str> =
    TableDefinition::new("payments_by_farmer");

/// Primary table: adoption_id → serialized AdoptionRecord (JSON bytes).
pub(super) const ADOPTIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("adoptions");

/// Reservation: adopter_id → adoption_id for the one active-eligible
/// adoption the adopter may hold.
pub(super) const SLOT_BY_ADOPTER: TableDefinition<&str, &str> =
    TableDefinition::new("slot_by_adopter");

/// Reservation: farmer_id → adoption_id for the one active-eligible
/// adoption the farmer may hold.
pub(super) const SLOT_BY_FARMER: TableDefinition<&str, &str> =
    TableDefinition::new("slot_by_farmer");

/// Index: `adopter_id|adoption_id` → "".
pub(super) const ADOPTIONS_BY_ADOPTER: TableDefinition<&str, &str> =
    TableDefinition::new("adoptions_by_adopter");

/// Index: `farmer_id|adoption_id` → "".
pub(super) const ADOPTIONS_BY_FARMER: TableDefinition<&str, &str> =
    TableDefinition::new("adoptions_by_farmer");

/// Primary table: withdrawal reference → serialized WithdrawalRecord.
pub(super) const WITHDRAWALS: TableDefinition<&str, &[u8]> = TableDefinition::new("withdrawals");

/// Index: `farmer_id|reference` → "".
pub(super) const WITHDRAWALS_BY_FARMER: TableDefinition<&str, &str> =
    TableDefinition::new("withdrawals_by_farmer");

/// Primary table: project_id → serialized ProjectRecord (JSON bytes).
pub(super) const PROJECTS: TableDefinition<&str, &[u8]> = TableDefinition::new("projects");

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// One-active-pairing invariant would be violated.
    #[error("{0}")]
    Conflict(String),

    /// Withdrawal exceeds the derived available balance.
    #[error("insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance { available: u64, requested: u64 },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("invalid transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("redb database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type LedgerResult<T> = Result<T, LedgerError>;

// =============================================================================
// Key & Reference Helpers
// =============================================================================

/// Composite index key: `owner|item`.
pub(super) fn scoped_key(owner: &str, item: &str) -> String {
    format!("{owner}|{item}")
}

/// Prefix for range-scanning all index entries of one owner.
pub(super) fn scope_prefix(owner: &str) -> String {
    format!("{owner}|")
}

/// Extract the item part of a composite `owner|item` key.
pub(super) fn item_from_scoped_key(key: &str) -> Option<&str> {
    key.split_once('|').map(|(_, item)| item)
}

/// Generate a globally unique reference: `<PREFIX>_<unixMillis>_<shortId>`.
///
/// The reference is the sole idempotency key across charge initialization,
/// verify, and webhook delivery.
pub fn new_reference(prefix: &str) -> String {
    let millis = Utc::now().timestamp_millis();
    let short = Uuid::new_v4().simple().to_string();
    format!("{prefix}_{millis}_{}", &short[..8])
}

// =============================================================================
// LedgerDb
// =============================================================================

/// Embedded ACID ledger database. Cheap to share behind an `Arc`.
pub struct LedgerDb {
    pub(super) db: Database,
}

impl LedgerDb {
    /// Open (or create) the ledger database at the given path.
    pub fn open(path: &Path) -> LedgerResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(PAYMENTS)?;
            let _ = write_txn.open_table(PAYMENTS_BY_PAYER)?;
            let _ = write_txn.open_table(PAYMENTS_BY_FARMER)?;
            let _ = write_txn.open_table(ADOPTIONS)?;
            let _ = write_txn.open_table(SLOT_BY_ADOPTER)?;
            let _ = write_txn.open_table(SLOT_BY_FARMER)?;
            let _ = write_txn.open_table(ADOPTIONS_BY_ADOPTER)?;
            let _ = write_txn.open_table(ADOPTIONS_BY_FARMER)?;
            let _ = write_txn.open_table(WITHDRAWALS)?;
            let _ = write_txn.open_table(WITHDRAWALS_BY_FARMER)?;
            let _ = write_txn.open_table(PROJECTS)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    /// Cheap readability probe for health checks: begin a read transaction
    /// and open one table.
    pub fn health_check(&self) -> LedgerResult<()> {
        use redb::ReadableDatabase;

        let read_txn = self.db.begin_read()?;
        let _ = read_txn.open_table(PAYMENTS)?;
        Ok(())
    }
}
