// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 ShambaLink

//! Farmer wallet: derived balance and withdrawal requests.
//!
//! There is no stored balance column. Available funds are always derived:
//! Σ successful net earnings − Σ completed withdrawals − Σ in-flight
//! withdrawals, floored at zero. Withdrawal creation re-derives the
//! balance inside its own write transaction, so two concurrent requests
//! cannot jointly overdraw.

use chrono::{DateTime, Utc};
use redb::{ReadableDatabase, ReadableTable};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::db::{
    new_reference, scope_prefix, scoped_key, LedgerDb, LedgerError, LedgerResult, PAYMENTS,
    PAYMENTS_BY_FARMER, WITHDRAWALS, WITHDRAWALS_BY_FARMER,
};
use super::payment::{PaymentRecord, PaymentStatus};

/// Reference prefix for withdrawal requests.
pub const WITHDRAWAL_PREFIX: &str = "WDR";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum WithdrawalStatus {
    Pending,
    Processing,
    Completed,
    Rejected,
}

impl WithdrawalStatus {
    /// Whether a withdrawal in this state still reserves wallet funds.
    pub fn reserves_balance(&self) -> bool {
        matches!(self, WithdrawalStatus::Pending | WithdrawalStatus::Processing)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WithdrawalStatus::Pending => "pending",
            WithdrawalStatus::Processing => "processing",
            WithdrawalStatus::Completed => "completed",
            WithdrawalStatus::Rejected => "rejected",
        }
    }
}

/// Where the payout goes.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PayoutMethod {
    MobileMoney {
        phone: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        provider: Option<String>,
    },
    Bank {
        bank_name: String,
        account_number: String,
        account_name: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WithdrawalRecord {
    pub reference: String,
    pub farmer_id: String,
    /// Major units.
    pub amount: u64,
    pub currency: String,
    pub method: PayoutMethod,
    pub status: WithdrawalStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    pub requested_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejected_at: Option<DateTime<Utc>>,
}

impl WithdrawalRecord {
    fn new(farmer_id: String, amount: u64, currency: &str, method: PayoutMethod) -> Self {
        let now = Utc::now();
        Self {
            reference: new_reference(WITHDRAWAL_PREFIX),
            farmer_id,
            amount,
            currency: currency.to_ascii_uppercase(),
            method,
            status: WithdrawalStatus::Pending,
            rejection_reason: None,
            requested_at: now,
            updated_at: now,
            processed_at: None,
            completed_at: None,
            rejected_at: None,
        }
    }
}

/// Snapshot of a farmer's wallet, all figures in major units.
#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
pub struct WalletBalance {
    /// Σ net amounts of successful payments.
    pub total_earned: u64,
    /// Σ amounts of completed withdrawals.
    pub completed_withdrawals: u64,
    /// Σ amounts of withdrawals still pending or processing.
    pub in_flight_withdrawals: u64,
    /// What a new withdrawal may claim, floored at zero.
    pub available: u64,
}

/// Derive the wallet balance from table handles. Works over both read
/// and write transactions; the latter is what serializes withdrawal
/// creation against concurrent requests.
fn balance_from_tables(
    farmer_id: &str,
    payments: &impl ReadableTable<&'static str, &'static [u8]>,
    payments_idx: &impl ReadableTable<&'static str, &'static str>,
    withdrawals: &impl ReadableTable<&'static str, &'static [u8]>,
    withdrawals_idx: &impl ReadableTable<&'static str, &'static str>,
) -> LedgerResult<WalletBalance> {
    let prefix = scope_prefix(farmer_id);

    let mut total_earned: u64 = 0;
    for entry in payments_idx.range(prefix.as_str()..)? {
        let (key, _) = entry?;
        if !key.value().starts_with(prefix.as_str()) {
            break;
        }
        if let Some(reference) = super::db::item_from_scoped_key(key.value()) {
            if let Some(value) = payments.get(reference)? {
                let record: PaymentRecord = serde_json::from_slice(value.value())?;
                if record.status == PaymentStatus::Success {
                    total_earned += record.net_amount;
                }
            }
        }
    }

    let mut completed: u64 = 0;
    let mut in_flight: u64 = 0;
    for entry in withdrawals_idx.range(prefix.as_str()..)? {
        let (key, _) = entry?;
        if !key.value().starts_with(prefix.as_str()) {
            break;
        }
        if let Some(reference) = super::db::item_from_scoped_key(key.value()) {
            if let Some(value) = withdrawals.get(reference)? {
                let record: WithdrawalRecord = serde_json::from_slice(value.value())?;
                if record.status == WithdrawalStatus::Completed {
                    completed += record.amount;
                } else if record.status.reserves_balance() {
                    in_flight += record.amount;
                }
            }
        }
    }

    Ok(WalletBalance {
        total_earned,
        completed_withdrawals: completed,
        in_flight_withdrawals: in_flight,
        available: total_earned.saturating_sub(completed + in_flight),
    })
}

impl LedgerDb {
    /// Current wallet snapshot for a farmer.
    pub fn available_balance(&self, farmer_id: &str) -> LedgerResult<WalletBalance> {
        let read_txn = self.db.begin_read()?;
        let payments = read_txn.open_table(PAYMENTS)?;
        let payments_idx = read_txn.open_table(PAYMENTS_BY_FARMER)?;
        let withdrawals = read_txn.open_table(WITHDRAWALS)?;
        let withdrawals_idx = read_txn.open_table(WITHDRAWALS_BY_FARMER)?;
        balance_from_tables(
            farmer_id,
            &payments,
            &payments_idx,
            &withdrawals,
            &withdrawals_idx,
        )
    }

    /// Create a withdrawal request. The balance is re-derived inside this
    /// write transaction and the request fails with `InsufficientBalance`
    /// when it asks for more than is available.
    pub fn create_withdrawal(
        &self,
        farmer_id: &str,
        amount: u64,
        currency: &str,
        method: PayoutMethod,
    ) -> LedgerResult<WithdrawalRecord> {
        let write_txn = self.db.begin_write()?;
        let record = {
            let payments = write_txn.open_table(PAYMENTS)?;
            let payments_idx = write_txn.open_table(PAYMENTS_BY_FARMER)?;
            let mut withdrawals = write_txn.open_table(WITHDRAWALS)?;
            let mut withdrawals_idx = write_txn.open_table(WITHDRAWALS_BY_FARMER)?;

            let balance = balance_from_tables(
                farmer_id,
                &payments,
                &payments_idx,
                &withdrawals,
                &withdrawals_idx,
            )?;
            if amount > balance.available {
                return Err(LedgerError::InsufficientBalance {
                    available: balance.available,
                    requested: amount,
                });
            }

            let record = WithdrawalRecord::new(farmer_id.to_string(), amount, currency, method);
            let json = serde_json::to_vec(&record)?;
            withdrawals.insert(record.reference.as_str(), json.as_slice())?;
            withdrawals_idx.insert(
                scoped_key(farmer_id, &record.reference).as_str(),
                record.currency.as_str(),
            )?;
            record
        };
        write_txn.commit()?;
        Ok(record)
    }

    pub fn get_withdrawal(&self, reference: &str) -> LedgerResult<Option<WithdrawalRecord>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(WITHDRAWALS)?;
        match table.get(reference)? {
            Some(value) => {
                let record: WithdrawalRecord = serde_json::from_slice(value.value())?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// Move a withdrawal along `pending → processing → completed`, or to
    /// `rejected` from either non-terminal state. Rejection releases the
    /// reserved funds by virtue of the derived balance.
    pub fn transition_withdrawal(
        &self,
        reference: &str,
        target: WithdrawalStatus,
        reason: Option<&str>,
    ) -> LedgerResult<WithdrawalRecord> {
        let write_txn = self.db.begin_write()?;
        let updated = {
            let mut table = write_txn.open_table(WITHDRAWALS)?;
            let existing_bytes = {
                let existing = table
                    .get(reference)?
                    .ok_or_else(|| LedgerError::NotFound(format!("withdrawal {reference}")))?;
                existing.value().to_vec()
            };
            let mut record: WithdrawalRecord = serde_json::from_slice(&existing_bytes)?;

            let allowed = matches!(
                (record.status, target),
                (WithdrawalStatus::Pending, WithdrawalStatus::Processing)
                    | (WithdrawalStatus::Pending, WithdrawalStatus::Completed)
                    | (WithdrawalStatus::Processing, WithdrawalStatus::Completed)
                    | (WithdrawalStatus::Pending, WithdrawalStatus::Rejected)
                    | (WithdrawalStatus::Processing, WithdrawalStatus::Rejected)
            );
            if !allowed {
                return Err(LedgerError::InvalidTransition {
                    from: record.status.as_str().to_string(),
                    to: target.as_str().to_string(),
                });
            }

            let now = Utc::now();
            record.status = target;
            record.updated_at = now;
            match target {
                WithdrawalStatus::Processing => record.processed_at = Some(now),
                WithdrawalStatus::Completed => record.completed_at = Some(now),
                WithdrawalStatus::Rejected => {
                    record.rejected_at = Some(now);
                    record.rejection_reason = reason.map(str::to_string);
                }
                WithdrawalStatus::Pending => {}
            }

            let json = serde_json::to_vec(&record)?;
            table.insert(reference, json.as_slice())?;
            record
        };
        write_txn.commit()?;
        Ok(updated)
    }

    /// All withdrawal requests by one farmer, newest first.
    pub fn list_withdrawals_by_farmer(
        &self,
        farmer_id: &str,
    ) -> LedgerResult<Vec<WithdrawalRecord>> {
        let read_txn = self.db.begin_read()?;
        let idx_table = read_txn.open_table(WITHDRAWALS_BY_FARMER)?;
        let withdrawals = read_txn.open_table(WITHDRAWALS)?;

        let prefix = scope_prefix(farmer_id);
        let mut records = Vec::new();
        for entry in idx_table.range(prefix.as_str()..)? {
            let (key, _) = entry?;
            if !key.value().starts_with(prefix.as_str()) {
                break;
            }
            if let Some(reference) = super::db::item_from_scoped_key(key.value()) {
                if let Some(value) = withdrawals.get(reference)? {
                    let record: WithdrawalRecord = serde_json::from_slice(value.value())?;
                    records.push(record);
                }
            }
        }

        records.sort_by(|a, b| b.requested_at.cmp(&a.requested_at));
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::FeeBreakdown;
    use crate::ledger::payment::{PaymentMetadata, PaymentType, SettleUpdate};

    fn temp_ledger() -> (LedgerDb, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = LedgerDb::open(&dir.path().join("ledger.redb")).unwrap();
        (db, dir)
    }

    /// Record a successful zero-fee payment so the farmer's net earnings
    /// equal `amount` exactly.
    fn earn(db: &LedgerDb, farmer_id: &str, reference: &str, amount: u64) {
        let mut record = PaymentRecord::new_pending(
            reference.to_string(),
            "adopter-1".to_string(),
            PaymentType::Adoption,
            amount,
            "KES",
            PaymentMetadata::default(),
        );
        record.farmer_id = Some(farmer_id.to_string());
        record.fees = FeeBreakdown::default();
        record.recompute_net();
        db.create_payment(&record).unwrap();
        db.settle_payment(
            reference,
            &SettleUpdate {
                status: PaymentStatus::Success,
                paid_at: Some(Utc::now()),
                channel: None,
                instrument: None,
                failure_reason: None,
            },
        )
        .unwrap();
    }

    fn mobile_money() -> PayoutMethod {
        PayoutMethod::MobileMoney {
            phone: "+254700000001".to_string(),
            provider: Some("m-pesa".to_string()),
        }
    }

    #[test]
    fn empty_wallet_has_zero_balance() {
        let (db, _dir) = temp_ledger();
        let balance = db.available_balance("farmer-1").unwrap();
        assert_eq!(balance.total_earned, 0);
        assert_eq!(balance.available, 0);
    }

    #[test]
    fn pending_payments_do_not_count_as_earnings() {
        let (db, _dir) = temp_ledger();
        let mut record = PaymentRecord::new_pending(
            "ADP_1_a".to_string(),
            "adopter-1".to_string(),
            PaymentType::Adoption,
            1_000,
            "KES",
            PaymentMetadata::default(),
        );
        record.farmer_id = Some("farmer-1".to_string());
        db.create_payment(&record).unwrap();

        let balance = db.available_balance("farmer-1").unwrap();
        assert_eq!(balance.total_earned, 0);
    }

    #[test]
    fn withdrawals_reserve_and_release_funds() {
        let (db, _dir) = temp_ledger();
        earn(&db, "farmer-1", "ADP_1_b", 3_000);
        earn(&db, "farmer-1", "CTR_2_c", 2_000);

        let balance = db.available_balance("farmer-1").unwrap();
        assert_eq!(balance.total_earned, 5_000);
        assert_eq!(balance.available, 5_000);

        let first = db
            .create_withdrawal("farmer-1", 3_000, "KES", mobile_money())
            .unwrap();
        assert_eq!(first.status, WithdrawalStatus::Pending);
        assert!(first.reference.starts_with("WDR_"));

        let balance = db.available_balance("farmer-1").unwrap();
        assert_eq!(balance.in_flight_withdrawals, 3_000);
        assert_eq!(balance.available, 2_000);

        // More than what is left is refused, with the figures attached.
        let over = db.create_withdrawal("farmer-1", 2_500, "KES", mobile_money());
        match over {
            Err(LedgerError::InsufficientBalance {
                available,
                requested,
            }) => {
                assert_eq!(available, 2_000);
                assert_eq!(requested, 2_500);
            }
            other => panic!("expected InsufficientBalance, got {other:?}"),
        }

        // Exactly what is left drains the wallet.
        let second = db
            .create_withdrawal("farmer-1", 2_000, "KES", mobile_money())
            .unwrap();
        assert_eq!(db.available_balance("farmer-1").unwrap().available, 0);

        // Rejecting one releases its reservation.
        db.transition_withdrawal(&second.reference, WithdrawalStatus::Rejected, Some("duplicate"))
            .unwrap();
        let balance = db.available_balance("farmer-1").unwrap();
        assert_eq!(balance.in_flight_withdrawals, 3_000);
        assert_eq!(balance.available, 2_000);
    }

    #[test]
    fn completed_withdrawals_stay_deducted() {
        let (db, _dir) = temp_ledger();
        earn(&db, "farmer-1", "ADP_1_d", 5_000);

        let request = db
            .create_withdrawal("farmer-1", 3_000, "KES", mobile_money())
            .unwrap();
        let processing = db
            .transition_withdrawal(&request.reference, WithdrawalStatus::Processing, None)
            .unwrap();
        assert!(processing.processed_at.is_some());

        let completed = db
            .transition_withdrawal(&request.reference, WithdrawalStatus::Completed, None)
            .unwrap();
        assert!(completed.completed_at.is_some());

        let balance = db.available_balance("farmer-1").unwrap();
        assert_eq!(balance.completed_withdrawals, 3_000);
        assert_eq!(balance.in_flight_withdrawals, 0);
        assert_eq!(balance.available, 2_000);
    }

    #[test]
    fn balance_floors_at_zero_after_refund() {
        let (db, _dir) = temp_ledger();
        earn(&db, "farmer-1", "ADP_1_e", 1_000);

        let request = db
            .create_withdrawal("farmer-1", 800, "KES", mobile_money())
            .unwrap();
        db.transition_withdrawal(&request.reference, WithdrawalStatus::Completed, None)
            .unwrap();

        // The payment is refunded after the payout already went out.
        db.refund_payment("ADP_1_e").unwrap();

        let balance = db.available_balance("farmer-1").unwrap();
        assert_eq!(balance.total_earned, 0);
        assert_eq!(balance.completed_withdrawals, 800);
        assert_eq!(balance.available, 0);
    }

    #[test]
    fn withdrawal_transitions_are_guarded() {
        let (db, _dir) = temp_ledger();
        earn(&db, "farmer-1", "ADP_1_f", 1_000);
        let request = db
            .create_withdrawal("farmer-1", 500, "KES", mobile_money())
            .unwrap();

        db.transition_withdrawal(&request.reference, WithdrawalStatus::Rejected, Some("bad phone"))
            .unwrap();
        let stored = db.get_withdrawal(&request.reference).unwrap().unwrap();
        assert_eq!(stored.rejection_reason.as_deref(), Some("bad phone"));
        assert!(stored.rejected_at.is_some());

        // Rejected is terminal.
        assert!(matches!(
            db.transition_withdrawal(&request.reference, WithdrawalStatus::Processing, None),
            Err(LedgerError::InvalidTransition { .. })
        ));

        assert!(matches!(
            db.transition_withdrawal("WDR_missing", WithdrawalStatus::Processing, None),
            Err(LedgerError::NotFound(_))
        ));
    }

    #[test]
    fn listings_are_newest_first() {
        let (db, _dir) = temp_ledger();
        earn(&db, "farmer-1", "ADP_1_g", 10_000);

        let first = db
            .create_withdrawal("farmer-1", 1_000, "KES", mobile_money())
            .unwrap();
        let second = db
            .create_withdrawal(
                "farmer-1",
                2_000,
                "KES",
                PayoutMethod::Bank {
                    bank_name: "Equity".to_string(),
                    account_number: "0100012345".to_string(),
                    account_name: "Jane Farmer".to_string(),
                },
            )
            .unwrap();

        let listed = db.list_withdrawals_by_farmer("farmer-1").unwrap();
        assert_eq!(listed.len(), 2);
        // Same-millisecond requests may tie on the timestamp; both must be present.
        let refs: Vec<&str> = listed.iter().map(|w| w.reference.as_str()).collect();
        assert!(refs.contains(&first.reference.as_str()));
        assert!(refs.contains(&second.reference.as_str()));

        assert!(db.list_withdrawals_by_farmer("farmer-9").unwrap().is_empty());
    }
}
