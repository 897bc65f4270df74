// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 ShambaLink

//! Payment ledger: one row per attempt to move money, keyed by reference.
//!
//! Status only moves forward: `pending → {success|failed}` via the
//! conditional settle, then `success → refunded` via the explicit refund
//! action. A terminal row is never overwritten by a later reconciliation
//! event, which is what makes verify/webhook races safe.

use chrono::{DateTime, Utc};
use redb::{ReadableDatabase, ReadableTable};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::gateway::{fees, FeeBreakdown};

use super::db::{
    scope_prefix, scoped_key, LedgerDb, LedgerError, LedgerResult, PAYMENTS, PAYMENTS_BY_FARMER,
    PAYMENTS_BY_PAYER,
};

/// What a payment funds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PaymentType {
    /// Activates an adoption pairing.
    Adoption,
    /// Tops up an existing adoption's running total.
    Contribution,
    /// Credits a crowdfunding project.
    Crowdfunding,
    /// Farm visit booking fee.
    Visit,
    /// Platform subscription charge.
    Subscription,
}

impl PaymentType {
    pub fn reference_prefix(&self) -> &'static str {
        match self {
            PaymentType::Adoption => "ADP",
            PaymentType::Contribution => "CTR",
            PaymentType::Crowdfunding => "CFD",
            PaymentType::Visit => "VST",
            PaymentType::Subscription => "SUB",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentType::Adoption => "adoption",
            PaymentType::Contribution => "contribution",
            PaymentType::Crowdfunding => "crowdfunding",
            PaymentType::Visit => "visit",
            PaymentType::Subscription => "subscription",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Processing,
    Success,
    Failed,
    Cancelled,
    Refunded,
}

impl PaymentStatus {
    /// Terminal states are immutable to reconciliation.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PaymentStatus::Pending | PaymentStatus::Processing)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Processing => "processing",
            PaymentStatus::Success => "success",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Cancelled => "cancelled",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

/// Customer identity snapshot taken at charge time.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct PaymentMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaymentRecord {
    /// Unique gateway reference; the idempotency key for the whole flow.
    pub reference: String,
    pub payer_id: String,
    pub payment_type: PaymentType,
    pub status: PaymentStatus,

    /// Base amount in major units, before any fee.
    pub amount: u64,
    pub currency: String,
    pub fees: FeeBreakdown,
    /// `amount − fees.gateway − fees.platform`; what the counterpart earns.
    pub net_amount: u64,

    /// Adoption this payment activates or tops up.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adoption_id: Option<String>,
    /// Crowdfunding project this payment credits.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    /// Counterpart whose wallet the net amount accrues to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub farmer_id: Option<String>,

    /// Channel reported by the gateway (card, mobile_money, bank).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    /// Instrument descriptor reported by the gateway, e.g. `visa ****4081`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instrument: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,

    pub metadata: PaymentMetadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<DateTime<Utc>>,
}

impl PaymentRecord {
    /// Build a new pending payment with fees computed from the amount.
    pub fn new_pending(
        reference: String,
        payer_id: String,
        payment_type: PaymentType,
        amount: u64,
        currency: &str,
        metadata: PaymentMetadata,
    ) -> Self {
        let now = Utc::now();
        let fees = fees::calculate_fees(amount);
        Self {
            reference,
            payer_id,
            payment_type,
            status: PaymentStatus::Pending,
            amount,
            currency: currency.to_ascii_uppercase(),
            fees,
            net_amount: fees::net_amount(amount, &fees),
            adoption_id: None,
            project_id: None,
            farmer_id: None,
            channel: None,
            instrument: None,
            failure_reason: None,
            metadata,
            created_at: now,
            updated_at: now,
            paid_at: None,
        }
    }

    /// Keep the net amount in lockstep with amount and fees.
    pub fn recompute_net(&mut self) {
        self.net_amount = fees::net_amount(self.amount, &self.fees);
    }

    /// Total the payer was charged at the gateway.
    pub fn charge_total(&self) -> u64 {
        self.amount + self.fees.platform
    }
}

/// Fields applied when a charge outcome finalizes a payment.
#[derive(Debug, Clone)]
pub struct SettleUpdate {
    /// Must be `Success` or `Failed`.
    pub status: PaymentStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub channel: Option<String>,
    pub instrument: Option<String>,
    pub failure_reason: Option<String>,
}

/// Result of the conditional settle.
#[derive(Debug)]
pub enum SettleOutcome {
    /// This caller won the race; the payment is newly terminal.
    Applied(PaymentRecord),
    /// The payment was already terminal; nothing changed.
    AlreadyFinal(PaymentRecord),
}

impl LedgerDb {
    /// Insert a new pending payment and its owner indexes.
    pub fn create_payment(&self, record: &PaymentRecord) -> LedgerResult<()> {
        let json = serde_json::to_vec(record)?;

        let write_txn = self.db.begin_write()?;
        {
            let mut payments = write_txn.open_table(PAYMENTS)?;
            if payments.get(record.reference.as_str())?.is_some() {
                return Err(LedgerError::AlreadyExists(format!(
                    "payment {}",
                    record.reference
                )));
            }
            payments.insert(record.reference.as_str(), json.as_slice())?;

            let mut by_payer = write_txn.open_table(PAYMENTS_BY_PAYER)?;
            by_payer.insert(
                scoped_key(&record.payer_id, &record.reference).as_str(),
                record.payment_type.as_str(),
            )?;

            if let Some(farmer_id) = &record.farmer_id {
                let mut by_farmer = write_txn.open_table(PAYMENTS_BY_FARMER)?;
                by_farmer.insert(
                    scoped_key(farmer_id, &record.reference).as_str(),
                    record.payment_type.as_str(),
                )?;
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Look up a payment by its reference.
    pub fn get_payment(&self, reference: &str) -> LedgerResult<Option<PaymentRecord>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(PAYMENTS)?;
        match table.get(reference)? {
            Some(value) => {
                let record: PaymentRecord = serde_json::from_slice(value.value())?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// Conditionally finalize a payment: the terminal-state check and the
    /// write happen inside one write transaction, so of all racing callers
    /// exactly one applies and the rest observe `AlreadyFinal`.
    pub fn settle_payment(
        &self,
        reference: &str,
        update: &SettleUpdate,
    ) -> LedgerResult<SettleOutcome> {
        if !matches!(
            update.status,
            PaymentStatus::Success | PaymentStatus::Failed
        ) {
            return Err(LedgerError::InvalidTransition {
                from: "pending".to_string(),
                to: update.status.as_str().to_string(),
            });
        }

        let write_txn = self.db.begin_write()?;
        let settled = {
            let mut table = write_txn.open_table(PAYMENTS)?;
            let existing_bytes = {
                let existing = table
                    .get(reference)?
                    .ok_or_else(|| LedgerError::NotFound(format!("payment {reference}")))?;
                existing.value().to_vec()
            };

            let mut record: PaymentRecord = serde_json::from_slice(&existing_bytes)?;
            if record.status.is_terminal() {
                return Ok(SettleOutcome::AlreadyFinal(record));
            }

            record.status = update.status;
            record.paid_at = update.paid_at;
            if update.channel.is_some() {
                record.channel = update.channel.clone();
            }
            if update.instrument.is_some() {
                record.instrument = update.instrument.clone();
            }
            record.failure_reason = update.failure_reason.clone();
            record.updated_at = Utc::now();

            let json = serde_json::to_vec(&record)?;
            table.insert(reference, json.as_slice())?;
            record
        };
        write_txn.commit()?;
        Ok(SettleOutcome::Applied(settled))
    }

    /// Explicit refund action layered on a successful payment. Refunded
    /// rows stop counting toward the counterpart's wallet earnings.
    pub fn refund_payment(&self, reference: &str) -> LedgerResult<PaymentRecord> {
        let write_txn = self.db.begin_write()?;
        let refunded = {
            let mut table = write_txn.open_table(PAYMENTS)?;
            let existing_bytes = {
                let existing = table
                    .get(reference)?
                    .ok_or_else(|| LedgerError::NotFound(format!("payment {reference}")))?;
                existing.value().to_vec()
            };

            let mut record: PaymentRecord = serde_json::from_slice(&existing_bytes)?;
            if record.status != PaymentStatus::Success {
                return Err(LedgerError::InvalidTransition {
                    from: record.status.as_str().to_string(),
                    to: PaymentStatus::Refunded.as_str().to_string(),
                });
            }

            record.status = PaymentStatus::Refunded;
            record.updated_at = Utc::now();

            let json = serde_json::to_vec(&record)?;
            table.insert(reference, json.as_slice())?;
            record
        };
        write_txn.commit()?;
        Ok(refunded)
    }

    /// Remove a pending payment whose charge never got off the ground at
    /// the gateway, along with its owner indexes. Anything past `pending`
    /// is settled history and stays.
    pub fn delete_pending_payment(&self, reference: &str) -> LedgerResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut payments = write_txn.open_table(PAYMENTS)?;
            let existing_bytes = {
                let existing = payments
                    .get(reference)?
                    .ok_or_else(|| LedgerError::NotFound(format!("payment {reference}")))?;
                existing.value().to_vec()
            };
            let record: PaymentRecord = serde_json::from_slice(&existing_bytes)?;

            if record.status != PaymentStatus::Pending {
                return Err(LedgerError::InvalidTransition {
                    from: record.status.as_str().to_string(),
                    to: "deleted".to_string(),
                });
            }

            payments.remove(reference)?;

            let mut by_payer = write_txn.open_table(PAYMENTS_BY_PAYER)?;
            by_payer.remove(scoped_key(&record.payer_id, reference).as_str())?;
            if let Some(farmer_id) = &record.farmer_id {
                let mut by_farmer = write_txn.open_table(PAYMENTS_BY_FARMER)?;
                by_farmer.remove(scoped_key(farmer_id, reference).as_str())?;
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    /// All payments made by one payer, newest first.
    pub fn list_payments_by_payer(&self, payer_id: &str) -> LedgerResult<Vec<PaymentRecord>> {
        self.list_indexed_payments(PAYMENTS_BY_PAYER, payer_id)
    }

    /// All payments accruing to one farmer, newest first.
    pub fn list_payments_by_farmer(&self, farmer_id: &str) -> LedgerResult<Vec<PaymentRecord>> {
        self.list_indexed_payments(PAYMENTS_BY_FARMER, farmer_id)
    }

    /// References of payments stuck in a non-terminal state since before
    /// `older_than`, capped at `limit`. Feed for the reconciliation sweep.
    pub fn list_stale_pending(
        &self,
        older_than: DateTime<Utc>,
        limit: usize,
    ) -> LedgerResult<Vec<String>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(PAYMENTS)?;

        let mut references = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            let record: PaymentRecord = serde_json::from_slice(value.value())?;
            if !record.status.is_terminal() && record.created_at < older_than {
                references.push(record.reference);
                if references.len() >= limit {
                    break;
                }
            }
        }
        Ok(references)
    }

    fn list_indexed_payments(
        &self,
        index: redb::TableDefinition<'static, &'static str, &'static str>,
        owner: &str,
    ) -> LedgerResult<Vec<PaymentRecord>> {
        let read_txn = self.db.begin_read()?;
        let idx_table = read_txn.open_table(index)?;
        let payments = read_txn.open_table(PAYMENTS)?;

        let prefix = scope_prefix(owner);
        let mut records = Vec::new();
        for entry in idx_table.range(prefix.as_str()..)? {
            let (key, _) = entry?;
            if !key.value().starts_with(prefix.as_str()) {
                break;
            }
            if let Some(reference) = super::db::item_from_scoped_key(key.value()) {
                if let Some(value) = payments.get(reference)? {
                    let record: PaymentRecord = serde_json::from_slice(value.value())?;
                    records.push(record);
                }
            }
        }

        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }
}
