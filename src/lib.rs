// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 ShambaLink

//! ShambaLink Core - Payment Reconciliation & Adoption Matching Service
//!
//! This crate is the authoritative ledger for money flowing from adopters
//! to farmers: it initializes charges at the external payment gateway,
//! reconciles their outcomes from three racing sources (client verify,
//! gateway webhook, background sweep), pairs adopters with farmers, and
//! derives farmer wallet balances for withdrawals.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `gateway` - Payment gateway client, fee schedule, webhook signatures
//! - `ledger` - Embedded redb ledger (payments, adoptions, withdrawals, projects)
//! - `reconcile` - The outcome reconciliation engine shared by all sources
//! - `storage` - JSON-on-disk profile store (farmers, adopters)
//! - `sweeper` - Background reconciliation of stuck pending payments

pub mod api;
pub mod config;
pub mod error;
pub mod gateway;
pub mod ledger;
pub mod models;
pub mod reconcile;
pub mod state;
pub mod storage;
pub mod sweeper;
