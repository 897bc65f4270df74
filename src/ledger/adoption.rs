// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 ShambaLink

//! Adoption registry: adopter↔farmer pairings and their lifecycle.
//!
//! Pairing exclusivity is enforced with reservation slots: one slot per
//! adopter and one per farmer, checked and inserted inside a single write
//! transaction. Of N concurrent creators touching the same party exactly
//! one commits; the rest get a conflict. Slots are freed when the
//! adoption reaches `completed` or `cancelled`.

use chrono::{DateTime, Utc};
use redb::{ReadableDatabase, ReadableTable};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;

use super::db::{
    scope_prefix, scoped_key, LedgerDb, LedgerError, LedgerResult, ADOPTIONS,
    ADOPTIONS_BY_ADOPTER, ADOPTIONS_BY_FARMER, SLOT_BY_ADOPTER, SLOT_BY_FARMER,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AdoptionType {
    Full,
    Partial,
    CropSpecific,
    LivestockSpecific,
    MonthlySupport,
}

impl AdoptionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdoptionType::Full => "full",
            AdoptionType::Partial => "partial",
            AdoptionType::CropSpecific => "crop_specific",
            AdoptionType::LivestockSpecific => "livestock_specific",
            AdoptionType::MonthlySupport => "monthly_support",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AdoptionStatus {
    Pending,
    Active,
    Completed,
    Cancelled,
    Paused,
}

impl AdoptionStatus {
    /// Whether an adoption in this state occupies the party slots.
    pub fn holds_slot(&self) -> bool {
        matches!(
            self,
            AdoptionStatus::Pending | AdoptionStatus::Active | AdoptionStatus::Paused
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AdoptionStatus::Pending => "pending",
            AdoptionStatus::Active => "active",
            AdoptionStatus::Completed => "completed",
            AdoptionStatus::Cancelled => "cancelled",
            AdoptionStatus::Paused => "paused",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PlanCadence {
    OneTime,
    Monthly,
    Quarterly,
    Annual,
}

/// Agreed contribution schedule plus the running total actually received.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaymentPlan {
    pub cadence: PlanCadence,
    /// Amount per installment in major units.
    pub amount: u64,
    pub currency: String,
    /// Sum of successful payments credited to this adoption.
    pub total_paid: u64,
}

impl PaymentPlan {
    pub fn new(cadence: PlanCadence, amount: u64, currency: &str) -> Self {
        Self {
            cadence,
            amount,
            currency: currency.to_ascii_uppercase(),
            total_paid: 0,
        }
    }
}

/// Type-specific adoption terms. Older records that predate the tagged
/// layout deserialize into `Legacy` untouched.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AdoptionDetails {
    Contribution {
        amount: u64,
        currency: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        start_date: Option<DateTime<Utc>>,
        #[serde(skip_serializing_if = "Option::is_none")]
        end_date: Option<DateTime<Utc>>,
    },
    Crop {
        crop: String,
        amount: u64,
        currency: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        start_date: Option<DateTime<Utc>>,
        #[serde(skip_serializing_if = "Option::is_none")]
        end_date: Option<DateTime<Utc>>,
    },
    Livestock {
        livestock: String,
        amount: u64,
        currency: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        start_date: Option<DateTime<Utc>>,
        #[serde(skip_serializing_if = "Option::is_none")]
        end_date: Option<DateTime<Utc>>,
    },
    Legacy {
        data: Value,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AdoptionRecord {
    pub adoption_id: String,
    pub adopter_id: String,
    pub farmer_id: String,
    pub adoption_type: AdoptionType,
    pub status: AdoptionStatus,
    pub details: AdoptionDetails,
    pub payment_plan: PaymentPlan,
    /// Reference of the payment that activated this adoption.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_reference: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activated_at: Option<DateTime<Utc>>,
}

impl AdoptionRecord {
    pub fn new(
        adopter_id: String,
        farmer_id: String,
        adoption_type: AdoptionType,
        details: AdoptionDetails,
        payment_plan: PaymentPlan,
    ) -> Self {
        let now = Utc::now();
        Self {
            adoption_id: Uuid::new_v4().to_string(),
            adopter_id,
            farmer_id,
            adoption_type,
            status: AdoptionStatus::Pending,
            details,
            payment_plan,
            payment_reference: None,
            created_at: now,
            updated_at: now,
            activated_at: None,
        }
    }
}

/// Result of crediting a payment to an adoption.
#[derive(Debug)]
pub enum AdoptionCredit {
    /// The credit was applied; `activated` is set when this payment moved
    /// the adoption from `pending` to `active`.
    Applied {
        record: AdoptionRecord,
        activated: bool,
    },
    /// This payment reference was already credited; nothing changed.
    AlreadyApplied(AdoptionRecord),
}

fn transition_allowed(from: AdoptionStatus, to: AdoptionStatus) -> bool {
    matches!(
        (from, to),
        (AdoptionStatus::Pending, AdoptionStatus::Cancelled)
            | (AdoptionStatus::Active, AdoptionStatus::Completed)
            | (AdoptionStatus::Active, AdoptionStatus::Cancelled)
            | (AdoptionStatus::Active, AdoptionStatus::Paused)
            | (AdoptionStatus::Paused, AdoptionStatus::Completed)
            | (AdoptionStatus::Paused, AdoptionStatus::Cancelled)
    )
}

impl LedgerDb {
    /// Insert a pending adoption, claiming both party slots. Fails with
    /// `Conflict` when either party already holds one. The slot check and
    /// the inserts share one write transaction, so concurrent creators
    /// for the same party cannot both commit.
    pub fn create_pending_adoption(&self, record: &AdoptionRecord) -> LedgerResult<()> {
        let json = serde_json::to_vec(record)?;

        let write_txn = self.db.begin_write()?;
        {
            let mut adopter_slots = write_txn.open_table(SLOT_BY_ADOPTER)?;
            if adopter_slots.get(record.adopter_id.as_str())?.is_some() {
                return Err(LedgerError::Conflict(format!(
                    "adopter {} already has an adoption in progress",
                    record.adopter_id
                )));
            }
            let mut farmer_slots = write_txn.open_table(SLOT_BY_FARMER)?;
            if farmer_slots.get(record.farmer_id.as_str())?.is_some() {
                return Err(LedgerError::Conflict(format!(
                    "farmer {} already has an adoption in progress",
                    record.farmer_id
                )));
            }

            adopter_slots.insert(record.adopter_id.as_str(), record.adoption_id.as_str())?;
            farmer_slots.insert(record.farmer_id.as_str(), record.adoption_id.as_str())?;

            let mut adoptions = write_txn.open_table(ADOPTIONS)?;
            adoptions.insert(record.adoption_id.as_str(), json.as_slice())?;

            let mut by_adopter = write_txn.open_table(ADOPTIONS_BY_ADOPTER)?;
            by_adopter.insert(
                scoped_key(&record.adopter_id, &record.adoption_id).as_str(),
                record.adoption_type.as_str(),
            )?;
            let mut by_farmer = write_txn.open_table(ADOPTIONS_BY_FARMER)?;
            by_farmer.insert(
                scoped_key(&record.farmer_id, &record.adoption_id).as_str(),
                record.adoption_type.as_str(),
            )?;
        }
        write_txn.commit()?;
        Ok(())
    }

    pub fn get_adoption(&self, adoption_id: &str) -> LedgerResult<Option<AdoptionRecord>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ADOPTIONS)?;
        match table.get(adoption_id)? {
            Some(value) => {
                let record: AdoptionRecord = serde_json::from_slice(value.value())?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// Credit a successful payment to an adoption: activates it when still
    /// pending and bumps the plan's running total. Replays of the
    /// activating reference are no-ops. Credits landing on a completed or
    /// cancelled adoption still count (the money did arrive); the caller
    /// decides whether that deserves a warning.
    pub fn record_adoption_payment(
        &self,
        adoption_id: &str,
        payment_reference: &str,
        amount: u64,
    ) -> LedgerResult<AdoptionCredit> {
        let write_txn = self.db.begin_write()?;
        let credit = {
            let mut adoptions = write_txn.open_table(ADOPTIONS)?;
            let existing_bytes = {
                let existing = adoptions
                    .get(adoption_id)?
                    .ok_or_else(|| LedgerError::NotFound(format!("adoption {adoption_id}")))?;
                existing.value().to_vec()
            };
            let mut record: AdoptionRecord = serde_json::from_slice(&existing_bytes)?;

            if record.payment_reference.as_deref() == Some(payment_reference) {
                return Ok(AdoptionCredit::AlreadyApplied(record));
            }

            let now = Utc::now();
            let activated = record.status == AdoptionStatus::Pending;
            if activated {
                record.status = AdoptionStatus::Active;
                record.activated_at = Some(now);
                record.payment_reference = Some(payment_reference.to_string());
            }
            record.payment_plan.total_paid += amount;
            record.updated_at = now;

            let json = serde_json::to_vec(&record)?;
            adoptions.insert(adoption_id, json.as_slice())?;
            AdoptionCredit::Applied { record, activated }
        };
        write_txn.commit()?;
        Ok(credit)
    }

    /// Explicit lifecycle transition (cancel, pause, complete). Reaching
    /// `completed` or `cancelled` frees both party slots.
    pub fn transition_adoption(
        &self,
        adoption_id: &str,
        target: AdoptionStatus,
    ) -> LedgerResult<AdoptionRecord> {
        let write_txn = self.db.begin_write()?;
        let updated = {
            let mut adoptions = write_txn.open_table(ADOPTIONS)?;
            let existing_bytes = {
                let existing = adoptions
                    .get(adoption_id)?
                    .ok_or_else(|| LedgerError::NotFound(format!("adoption {adoption_id}")))?;
                existing.value().to_vec()
            };
            let mut record: AdoptionRecord = serde_json::from_slice(&existing_bytes)?;

            if !transition_allowed(record.status, target) {
                return Err(LedgerError::InvalidTransition {
                    from: record.status.as_str().to_string(),
                    to: target.as_str().to_string(),
                });
            }

            record.status = target;
            record.updated_at = Utc::now();

            let json = serde_json::to_vec(&record)?;
            adoptions.insert(adoption_id, json.as_slice())?;

            if !target.holds_slot() {
                let mut adopter_slots = write_txn.open_table(SLOT_BY_ADOPTER)?;
                release_slot(&mut adopter_slots, &record.adopter_id, adoption_id)?;
                let mut farmer_slots = write_txn.open_table(SLOT_BY_FARMER)?;
                release_slot(&mut farmer_slots, &record.farmer_id, adoption_id)?;
            }
            record
        };
        write_txn.commit()?;
        Ok(updated)
    }

    /// Delete a pending adoption whose charge never got off the ground,
    /// freeing both slots. Anything past `pending` must go through the
    /// lifecycle transitions instead.
    pub fn rollback_pending_adoption(&self, adoption_id: &str) -> LedgerResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut adoptions = write_txn.open_table(ADOPTIONS)?;
            let existing_bytes = {
                let existing = adoptions
                    .get(adoption_id)?
                    .ok_or_else(|| LedgerError::NotFound(format!("adoption {adoption_id}")))?;
                existing.value().to_vec()
            };
            let record: AdoptionRecord = serde_json::from_slice(&existing_bytes)?;

            if record.status != AdoptionStatus::Pending {
                return Err(LedgerError::InvalidTransition {
                    from: record.status.as_str().to_string(),
                    to: "deleted".to_string(),
                });
            }

            adoptions.remove(adoption_id)?;

            let mut adopter_slots = write_txn.open_table(SLOT_BY_ADOPTER)?;
            release_slot(&mut adopter_slots, &record.adopter_id, adoption_id)?;
            let mut farmer_slots = write_txn.open_table(SLOT_BY_FARMER)?;
            release_slot(&mut farmer_slots, &record.farmer_id, adoption_id)?;

            let mut by_adopter = write_txn.open_table(ADOPTIONS_BY_ADOPTER)?;
            by_adopter.remove(scoped_key(&record.adopter_id, adoption_id).as_str())?;
            let mut by_farmer = write_txn.open_table(ADOPTIONS_BY_FARMER)?;
            by_farmer.remove(scoped_key(&record.farmer_id, adoption_id).as_str())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// All adoptions created by one adopter, newest first.
    pub fn list_adoptions_by_adopter(&self, adopter_id: &str) -> LedgerResult<Vec<AdoptionRecord>> {
        self.list_indexed_adoptions(ADOPTIONS_BY_ADOPTER, adopter_id)
    }

    /// All adoptions pairing one farmer, newest first.
    pub fn list_adoptions_by_farmer(&self, farmer_id: &str) -> LedgerResult<Vec<AdoptionRecord>> {
        self.list_indexed_adoptions(ADOPTIONS_BY_FARMER, farmer_id)
    }

    fn list_indexed_adoptions(
        &self,
        index: redb::TableDefinition<'static, &'static str, &'static str>,
        owner: &str,
    ) -> LedgerResult<Vec<AdoptionRecord>> {
        let read_txn = self.db.begin_read()?;
        let idx_table = read_txn.open_table(index)?;
        let adoptions = read_txn.open_table(ADOPTIONS)?;

        let prefix = scope_prefix(owner);
        let mut records = Vec::new();
        for entry in idx_table.range(prefix.as_str()..)? {
            let (key, _) = entry?;
            if !key.value().starts_with(prefix.as_str()) {
                break;
            }
            if let Some(adoption_id) = super::db::item_from_scoped_key(key.value()) {
                if let Some(value) = adoptions.get(adoption_id)? {
                    let record: AdoptionRecord = serde_json::from_slice(value.value())?;
                    records.push(record);
                }
            }
        }

        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }
}

/// Remove a party slot only if it still points at this adoption. A slot
/// claimed by a newer adoption is left alone.
fn release_slot(
    slots: &mut redb::Table<'_, &'static str, &'static str>,
    party_id: &str,
    adoption_id: &str,
) -> LedgerResult<()> {
    let held_by_this = match slots.get(party_id)? {
        Some(value) => value.value() == adoption_id,
        None => false,
    };
    if held_by_this {
        slots.remove(party_id)?;
    }
    Ok(())
}
