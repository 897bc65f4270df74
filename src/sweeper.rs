// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 ShambaLink

//! # Reconciliation Sweeper
//!
//! Background task that periodically re-verifies payments stuck in a
//! non-terminal state. Client verify and webhook delivery cover the
//! common paths; this sweep is the third source, catching payments whose
//! webhook was lost and whose payer never returned to trigger a verify.
//!
//! ## Strategy
//!
//! Every `SWEEP_INTERVAL_SECS` (default 300 s) the sweeper:
//! 1. Lists payments still pending that are older than
//!    `SWEEP_MIN_AGE_SECS` (default 600 s), capped per sweep so one
//!    backlog cannot monopolize the gateway.
//! 2. Re-verifies each against the gateway and feeds the outcome to the
//!    reconciliation engine, which applies it with the same idempotency
//!    guarantees as the other two sources.
//!
//! ## Shutdown
//!
//! Uses `tokio_util::sync::CancellationToken` for graceful shutdown.

use std::env;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config;
use crate::gateway::GatewayClient;
use crate::ledger::LedgerDb;
use crate::reconcile::{OutcomeSource, ReconcileDisposition, ReconciliationEngine};

/// Upper bound on payments re-verified in one sweep.
const SWEEP_BATCH_LIMIT: usize = 50;

/// Background sweeper that re-verifies stale pending payments.
pub struct ReconcileSweeper {
    ledger: Arc<LedgerDb>,
    gateway: Arc<GatewayClient>,
    sweep_interval: Duration,
    min_age: Duration,
}

impl ReconcileSweeper {
    /// Create a sweeper configured from the environment.
    pub fn from_env(ledger: Arc<LedgerDb>, gateway: Arc<GatewayClient>) -> Self {
        Self {
            ledger,
            gateway,
            sweep_interval: Duration::from_secs(secs_from_env(
                config::SWEEP_INTERVAL_SECS_ENV,
                config::DEFAULT_SWEEP_INTERVAL_SECS,
            )),
            min_age: Duration::from_secs(secs_from_env(
                config::SWEEP_MIN_AGE_SECS_ENV,
                config::DEFAULT_SWEEP_MIN_AGE_SECS,
            )),
        }
    }

    /// Run the sweep loop until the cancellation token is triggered.
    ///
    /// Should be spawned as a background task:
    /// ```rust,ignore
    /// tokio::spawn(sweeper.run(shutdown.clone()));
    /// ```
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            interval_secs = self.sweep_interval.as_secs(),
            min_age_secs = self.min_age.as_secs(),
            "Reconciliation sweeper starting"
        );

        loop {
            if shutdown.is_cancelled() {
                info!("Reconciliation sweeper shutting down");
                return;
            }

            self.sweep_step().await;

            tokio::select! {
                _ = tokio::time::sleep(self.sweep_interval) => {},
                _ = shutdown.cancelled() => {
                    info!("Reconciliation sweeper shutting down");
                    return;
                }
            }
        }
    }

    /// Execute one sweep: find stale pending payments and re-verify each.
    async fn sweep_step(&self) {
        let cutoff = Utc::now() - chrono::Duration::seconds(self.min_age.as_secs() as i64);
        let stale = match self.ledger.list_stale_pending(cutoff, SWEEP_BATCH_LIMIT) {
            Ok(references) => references,
            Err(e) => {
                warn!(error = %e, "Sweeper: failed to list stale payments");
                return;
            }
        };

        if stale.is_empty() {
            return;
        }

        info!(count = stale.len(), "Sweeper: re-verifying stale payments");
        let engine = ReconciliationEngine::new(&self.ledger);

        for reference in &stale {
            let outcome = match self.gateway.verify_charge(reference).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(reference = %reference, error = %e, "Sweeper: gateway verify failed");
                    continue;
                }
            };

            match engine.apply(reference, &outcome, OutcomeSource::Sweep) {
                Ok(report) => match report.disposition {
                    ReconcileDisposition::Applied => {
                        info!(
                            reference = %reference,
                            status = report.payment.status.as_str(),
                            "Sweeper: settled payment"
                        );
                    }
                    ReconcileDisposition::StillPending => {
                        debug!(reference = %reference, "Sweeper: charge still in flight");
                    }
                    ReconcileDisposition::AlreadyFinal => {
                        debug!(reference = %reference, "Sweeper: payment already final");
                    }
                },
                Err(e) => {
                    warn!(reference = %reference, error = %e, "Sweeper: failed to apply outcome");
                }
            }
        }
    }
}

fn secs_from_env(var: &str, default: u64) -> u64 {
    env::var(var)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
