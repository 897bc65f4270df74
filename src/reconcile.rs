// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 ShambaLink

//! Reconciliation engine: the single choke point where gateway outcomes
//! meet the ledger.
//!
//! Client-triggered verify, webhook delivery and the background sweep all
//! funnel through [`ReconciliationEngine::apply`]. The payment settle is
//! an atomic conditional update, so when two sources race, exactly one
//! applies the outcome and dispatches the downstream effect; the others
//! observe the already-final record. Effect failures degrade to warnings
//! and never roll back a settled payment.

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::gateway::{fees, ChargeStatus, GatewayOutcome};
use crate::ledger::{
    AdoptionCredit, BackerEntry, LedgerDb, LedgerError, LedgerResult, PaymentRecord, PaymentStatus,
    PaymentType, ProjectCredit, SettleOutcome, SettleUpdate,
};

/// Reported and expected charge totals may differ by this much (major
/// units) before the mismatch is worth a warning. Covers sub-KES
/// rounding at the gateway.
const AMOUNT_TOLERANCE_MAJOR: u64 = 1;

/// Which path delivered the outcome. Logging only; all sources are
/// treated identically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeSource {
    Verify,
    Webhook,
    Sweep,
}

impl OutcomeSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeSource::Verify => "verify",
            OutcomeSource::Webhook => "webhook",
            OutcomeSource::Sweep => "sweep",
        }
    }
}

/// How an [`apply`](ReconciliationEngine::apply) call was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileDisposition {
    /// This call finalized the payment and ran the downstream effect.
    Applied,
    /// A racing source got there first; nothing was changed.
    AlreadyFinal,
    /// The gateway still reports the charge in flight; the payment
    /// stays pending and will be reconciled later.
    StillPending,
}

impl ReconcileDisposition {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconcileDisposition::Applied => "applied",
            ReconcileDisposition::AlreadyFinal => "already_final",
            ReconcileDisposition::StillPending => "still_pending",
        }
    }
}

#[derive(Debug)]
pub struct ReconcileReport {
    pub payment: PaymentRecord,
    pub disposition: ReconcileDisposition,
}

pub struct ReconciliationEngine<'a> {
    ledger: &'a LedgerDb,
}

impl<'a> ReconciliationEngine<'a> {
    pub fn new(ledger: &'a LedgerDb) -> Self {
        Self { ledger }
    }

    /// Apply a gateway outcome to the payment with this reference.
    ///
    /// Unknown references are a [`LedgerError::NotFound`]; everything
    /// else resolves to a report. Safe to call any number of times with
    /// outcomes from any source.
    pub fn apply(
        &self,
        reference: &str,
        outcome: &GatewayOutcome,
        source: OutcomeSource,
    ) -> LedgerResult<ReconcileReport> {
        let payment = self
            .ledger
            .get_payment(reference)?
            .ok_or_else(|| LedgerError::NotFound(format!("payment {reference}")))?;

        if payment.status.is_terminal() {
            debug!(
                reference,
                source = source.as_str(),
                status = payment.status.as_str(),
                "outcome arrived for an already-final payment"
            );
            return Ok(ReconcileReport {
                payment,
                disposition: ReconcileDisposition::AlreadyFinal,
            });
        }

        let status = match outcome.status {
            ChargeStatus::Success => PaymentStatus::Success,
            ChargeStatus::Failed => PaymentStatus::Failed,
            ChargeStatus::Pending => {
                debug!(
                    reference,
                    source = source.as_str(),
                    raw_status = %outcome.raw_status,
                    "charge still in flight at the gateway"
                );
                return Ok(ReconcileReport {
                    payment,
                    disposition: ReconcileDisposition::StillPending,
                });
            }
        };

        let update = SettleUpdate {
            status,
            paid_at: match status {
                PaymentStatus::Success => outcome.paid_at.or_else(|| Some(Utc::now())),
                _ => None,
            },
            channel: outcome.channel.clone(),
            instrument: outcome.instrument.clone(),
            failure_reason: outcome.failure_reason.clone(),
        };

        let settled = match self.ledger.settle_payment(reference, &update)? {
            SettleOutcome::Applied(record) => record,
            SettleOutcome::AlreadyFinal(record) => {
                debug!(
                    reference,
                    source = source.as_str(),
                    "lost the settle race to another source"
                );
                return Ok(ReconcileReport {
                    payment: record,
                    disposition: ReconcileDisposition::AlreadyFinal,
                });
            }
        };

        match settled.status {
            PaymentStatus::Success => {
                info!(
                    reference,
                    source = source.as_str(),
                    amount = settled.amount,
                    net = settled.net_amount,
                    "payment settled as success"
                );
                self.check_reported_amount(&settled, outcome, source);
                self.dispatch_effect(&settled);
            }
            _ => {
                info!(
                    reference,
                    source = source.as_str(),
                    reason = settled.failure_reason.as_deref().unwrap_or("unknown"),
                    "payment settled as failed"
                );
            }
        }

        Ok(ReconcileReport {
            payment: settled,
            disposition: ReconcileDisposition::Applied,
        })
    }

    /// Compare what the gateway says was paid against what we charged.
    /// A discrepancy is logged, never an error: the money moved, the
    /// ledger must reflect it.
    fn check_reported_amount(
        &self,
        payment: &PaymentRecord,
        outcome: &GatewayOutcome,
        source: OutcomeSource,
    ) {
        let reported = fees::from_minor_units(outcome.amount_minor);
        let expected = payment.charge_total();
        if reported.abs_diff(expected) > AMOUNT_TOLERANCE_MAJOR {
            warn!(
                reference = %payment.reference,
                source = source.as_str(),
                expected,
                reported,
                "gateway-reported amount differs from the charged total"
            );
        }
    }

    /// Run the downstream effect for a freshly successful payment.
    /// Each effect is reference-guarded on its own record, so a replay
    /// that somehow reaches this point still cannot double-credit.
    fn dispatch_effect(&self, payment: &PaymentRecord) {
        match payment.payment_type {
            PaymentType::Adoption | PaymentType::Contribution => {
                let Some(adoption_id) = payment.adoption_id.as_deref() else {
                    warn!(
                        reference = %payment.reference,
                        "successful adoption payment has no adoption link"
                    );
                    return;
                };
                match self.ledger.record_adoption_payment(
                    adoption_id,
                    &payment.reference,
                    payment.amount,
                ) {
                    Ok(AdoptionCredit::Applied { record, activated }) => {
                        if activated {
                            info!(
                                adoption_id,
                                reference = %payment.reference,
                                "adoption activated"
                            );
                        }
                        if !record.status.holds_slot() {
                            warn!(
                                adoption_id,
                                status = record.status.as_str(),
                                "credited an adoption that is no longer open"
                            );
                        }
                    }
                    Ok(AdoptionCredit::AlreadyApplied(_)) => {
                        debug!(adoption_id, "adoption credit already applied");
                    }
                    Err(err) => {
                        warn!(
                            adoption_id,
                            reference = %payment.reference,
                            error = %err,
                            "adoption credit failed; payment stays settled"
                        );
                    }
                }
            }
            PaymentType::Crowdfunding => {
                let Some(project_id) = payment.project_id.as_deref() else {
                    warn!(
                        reference = %payment.reference,
                        "successful crowdfunding payment has no project link"
                    );
                    return;
                };
                let entry = BackerEntry {
                    payer_id: payment.payer_id.clone(),
                    amount: payment.amount,
                    reference: payment.reference.clone(),
                    paid_at: payment.paid_at.unwrap_or_else(Utc::now),
                };
                match self.ledger.credit_project(project_id, entry) {
                    Ok(ProjectCredit::Applied(record)) => {
                        info!(
                            project_id,
                            raised = record.raised_amount,
                            goal = record.goal_amount,
                            "project credited"
                        );
                    }
                    Ok(ProjectCredit::AlreadyApplied(_)) => {
                        debug!(project_id, "project credit already applied");
                    }
                    Err(err) => {
                        warn!(
                            project_id,
                            reference = %payment.reference,
                            error = %err,
                            "project credit failed; payment stays settled"
                        );
                    }
                }
            }
            PaymentType::Visit | PaymentType::Subscription => {
                info!(
                    reference = %payment.reference,
                    payment_type = payment.payment_type.as_str(),
                    "ledger-only payment settled"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{
        AdoptionDetails, AdoptionRecord, AdoptionStatus, AdoptionType, PaymentMetadata,
        PaymentPlan, PlanCadence, ProjectRecord,
    };

    fn temp_ledger() -> (LedgerDb, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = LedgerDb::open(&dir.path().join("ledger.redb")).unwrap();
        (db, dir)
    }

    fn outcome(status: ChargeStatus, amount_minor: u64) -> GatewayOutcome {
        GatewayOutcome {
            status,
            raw_status: match status {
                ChargeStatus::Success => "success".to_string(),
                ChargeStatus::Failed => "failed".to_string(),
                ChargeStatus::Pending => "pending".to_string(),
            },
            amount_minor,
            currency: "KES".to_string(),
            paid_at: Some(Utc::now()),
            channel: Some("mobile_money".to_string()),
            instrument: None,
            failure_reason: match status {
                ChargeStatus::Failed => Some("declined".to_string()),
                _ => None,
            },
        }
    }

    /// Pending adoption plus its linked pending payment for 1000 KES
    /// (charged as 1020, netting 965).
    fn adoption_with_payment(db: &LedgerDb, reference: &str) -> String {
        let adoption = AdoptionRecord::new(
            "adopter-1".to_string(),
            "farmer-1".to_string(),
            AdoptionType::Full,
            AdoptionDetails::Contribution {
                amount: 1_000,
                currency: "KES".to_string(),
                start_date: None,
                end_date: None,
            },
            PaymentPlan::new(PlanCadence::Monthly, 1_000, "KES"),
        );
        db.create_pending_adoption(&adoption).unwrap();

        let mut payment = PaymentRecord::new_pending(
            reference.to_string(),
            "adopter-1".to_string(),
            PaymentType::Adoption,
            1_000,
            "KES",
            PaymentMetadata::default(),
        );
        payment.adoption_id = Some(adoption.adoption_id.clone());
        payment.farmer_id = Some("farmer-1".to_string());
        db.create_payment(&payment).unwrap();

        adoption.adoption_id
    }

    #[test]
    fn first_source_settles_second_is_noop() {
        let (db, _dir) = temp_ledger();
        let adoption_id = adoption_with_payment(&db, "ADP_1_a");
        let engine = ReconciliationEngine::new(&db);
        let success = outcome(ChargeStatus::Success, 102_000);

        let first = engine
            .apply("ADP_1_a", &success, OutcomeSource::Verify)
            .unwrap();
        assert_eq!(first.disposition, ReconcileDisposition::Applied);
        assert_eq!(first.payment.status, PaymentStatus::Success);

        let second = engine
            .apply("ADP_1_a", &success, OutcomeSource::Webhook)
            .unwrap();
        assert_eq!(second.disposition, ReconcileDisposition::AlreadyFinal);

        // The adoption activated exactly once and was credited exactly once.
        let adoption = db.get_adoption(&adoption_id).unwrap().unwrap();
        assert_eq!(adoption.status, AdoptionStatus::Active);
        assert_eq!(adoption.payment_plan.total_paid, 1_000);
        assert_eq!(adoption.payment_reference.as_deref(), Some("ADP_1_a"));
    }

    #[test]
    fn webhook_first_verify_second_is_equivalent() {
        let (db, _dir) = temp_ledger();
        let adoption_id = adoption_with_payment(&db, "ADP_1_b");
        let engine = ReconciliationEngine::new(&db);
        let success = outcome(ChargeStatus::Success, 102_000);

        let first = engine
            .apply("ADP_1_b", &success, OutcomeSource::Webhook)
            .unwrap();
        assert_eq!(first.disposition, ReconcileDisposition::Applied);

        let second = engine
            .apply("ADP_1_b", &success, OutcomeSource::Verify)
            .unwrap();
        assert_eq!(second.disposition, ReconcileDisposition::AlreadyFinal);

        let adoption = db.get_adoption(&adoption_id).unwrap().unwrap();
        assert_eq!(adoption.payment_plan.total_paid, 1_000);
    }

    #[test]
    fn late_success_cannot_overturn_failure() {
        let (db, _dir) = temp_ledger();
        let adoption_id = adoption_with_payment(&db, "ADP_1_c");
        let engine = ReconciliationEngine::new(&db);

        let failed = engine
            .apply(
                "ADP_1_c",
                &outcome(ChargeStatus::Failed, 0),
                OutcomeSource::Verify,
            )
            .unwrap();
        assert_eq!(failed.disposition, ReconcileDisposition::Applied);
        assert_eq!(failed.payment.status, PaymentStatus::Failed);
        assert_eq!(failed.payment.failure_reason.as_deref(), Some("declined"));

        let late = engine
            .apply(
                "ADP_1_c",
                &outcome(ChargeStatus::Success, 102_000),
                OutcomeSource::Webhook,
            )
            .unwrap();
        assert_eq!(late.disposition, ReconcileDisposition::AlreadyFinal);
        assert_eq!(late.payment.status, PaymentStatus::Failed);

        // No activation, no credit.
        let adoption = db.get_adoption(&adoption_id).unwrap().unwrap();
        assert_eq!(adoption.status, AdoptionStatus::Pending);
        assert_eq!(adoption.payment_plan.total_paid, 0);
    }

    #[test]
    fn pending_outcome_leaves_payment_open() {
        let (db, _dir) = temp_ledger();
        adoption_with_payment(&db, "ADP_1_d");
        let engine = ReconciliationEngine::new(&db);

        let report = engine
            .apply(
                "ADP_1_d",
                &outcome(ChargeStatus::Pending, 0),
                OutcomeSource::Verify,
            )
            .unwrap();
        assert_eq!(report.disposition, ReconcileDisposition::StillPending);
        assert_eq!(report.payment.status, PaymentStatus::Pending);

        // A real outcome can still land afterwards.
        let settled = engine
            .apply(
                "ADP_1_d",
                &outcome(ChargeStatus::Success, 102_000),
                OutcomeSource::Webhook,
            )
            .unwrap();
        assert_eq!(settled.disposition, ReconcileDisposition::Applied);
    }

    #[test]
    fn amount_mismatch_still_settles() {
        let (db, _dir) = temp_ledger();
        let adoption_id = adoption_with_payment(&db, "ADP_1_e");
        let engine = ReconciliationEngine::new(&db);

        // Gateway reports 990 where 1020 was charged; warn-and-proceed.
        let report = engine
            .apply(
                "ADP_1_e",
                &outcome(ChargeStatus::Success, 99_000),
                OutcomeSource::Webhook,
            )
            .unwrap();
        assert_eq!(report.disposition, ReconcileDisposition::Applied);
        assert_eq!(report.payment.status, PaymentStatus::Success);

        let adoption = db.get_adoption(&adoption_id).unwrap().unwrap();
        assert_eq!(adoption.status, AdoptionStatus::Active);
    }

    #[test]
    fn unknown_reference_is_not_found() {
        let (db, _dir) = temp_ledger();
        let engine = ReconciliationEngine::new(&db);
        assert!(matches!(
            engine.apply(
                "ADP_missing",
                &outcome(ChargeStatus::Success, 102_000),
                OutcomeSource::Webhook,
            ),
            Err(LedgerError::NotFound(_))
        ));
    }

    #[test]
    fn crowdfunding_success_credits_project_once() {
        let (db, _dir) = temp_ledger();
        let project = ProjectRecord::new(
            "farmer-1".to_string(),
            "Greenhouse".to_string(),
            None,
            100_000,
            "KES",
        );
        db.create_project(&project).unwrap();

        let mut payment = PaymentRecord::new_pending(
            "CFD_1_f".to_string(),
            "adopter-1".to_string(),
            PaymentType::Crowdfunding,
            5_000,
            "KES",
            PaymentMetadata::default(),
        );
        payment.project_id = Some(project.project_id.clone());
        payment.farmer_id = Some("farmer-1".to_string());
        db.create_payment(&payment).unwrap();

        let engine = ReconciliationEngine::new(&db);
        // 5000 + 2% platform fee = 5100 charged.
        let success = outcome(ChargeStatus::Success, 510_000);
        engine
            .apply("CFD_1_f", &success, OutcomeSource::Verify)
            .unwrap();
        engine
            .apply("CFD_1_f", &success, OutcomeSource::Webhook)
            .unwrap();

        let stored = db.get_project(&project.project_id).unwrap().unwrap();
        assert_eq!(stored.raised_amount, 5_000);
        assert_eq!(stored.backers.len(), 1);
        assert_eq!(stored.backers[0].reference, "CFD_1_f");
    }

    #[test]
    fn effect_failure_does_not_unsettle_the_payment() {
        let (db, _dir) = temp_ledger();
        let mut payment = PaymentRecord::new_pending(
            "ADP_1_g".to_string(),
            "adopter-1".to_string(),
            PaymentType::Adoption,
            1_000,
            "KES",
            PaymentMetadata::default(),
        );
        // Link to an adoption that does not exist.
        payment.adoption_id = Some("no-such-adoption".to_string());
        db.create_payment(&payment).unwrap();

        let engine = ReconciliationEngine::new(&db);
        let report = engine
            .apply(
                "ADP_1_g",
                &outcome(ChargeStatus::Success, 102_000),
                OutcomeSource::Webhook,
            )
            .unwrap();
        assert_eq!(report.disposition, ReconcileDisposition::Applied);

        let stored = db.get_payment("ADP_1_g").unwrap().unwrap();
        assert_eq!(stored.status, PaymentStatus::Success);
    }
}
