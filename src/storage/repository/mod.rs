// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 ShambaLink

//! Repository layer providing typed access to document storage.
//!
//! Each repository provides read/create operations for a specific profile
//! type, using the FileStore for all file operations.

pub mod adopters;
pub mod farmers;

pub use adopters::{AdopterProfile, AdopterRepository};
pub use farmers::{FarmerProfile, FarmerRepository};
