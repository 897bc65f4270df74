// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 ShambaLink

//! # Profile Storage Module
//!
//! This module provides persistent storage for the thin collaborator
//! profiles (farmers and adopters) as plain JSON documents. Everything
//! that money moves through lives in the redb ledger instead; see the
//! `ledger` module.
//!
//! ## Storage Layout
//!
//! ```text
//! {DATA_DIR}/
//!   ledger.redb     # payments, adoptions, withdrawals, projects
//!   farmers/
//!     {farmer_id}.json
//!   adopters/
//!     {adopter_id}.json
//! ```
//!
//! ## Important Notes
//!
//! - Document writes are atomic (temp file + rename)
//! - Profiles are create/read only; lifecycle state never lives here

pub mod file_store;
pub mod paths;
pub mod repository;

pub use file_store::{FileStore, StorageError, StorageResult};
pub use paths::StoragePaths;
pub use repository::{AdopterProfile, AdopterRepository, FarmerProfile, FarmerRepository};
