// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 ShambaLink

use std::sync::Arc;

use crate::error::ApiError;
use crate::gateway::GatewayClient;
use crate::ledger::LedgerDb;
use crate::storage::FileStore;

#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<LedgerDb>,
    pub storage: Arc<FileStore>,
    /// `None` when the gateway env vars are unset; payment endpoints
    /// answer 503 in that case while the rest of the API stays up.
    pub gateway: Option<Arc<GatewayClient>>,
}

impl AppState {
    pub fn new(ledger: LedgerDb, storage: FileStore, gateway: Option<GatewayClient>) -> Self {
        Self {
            ledger: Arc::new(ledger),
            storage: Arc::new(storage),
            gateway: gateway.map(Arc::new),
        }
    }

    /// The gateway client, or a 503 for handlers that cannot work
    /// without it.
    pub fn gateway(&self) -> Result<&GatewayClient, ApiError> {
        self.gateway
            .as_deref()
            .ok_or_else(|| ApiError::service_unavailable("payment gateway is not configured"))
    }
}
