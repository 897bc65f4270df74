// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 ShambaLink

//! Path constants and utilities for the data directory layout.

use std::env;
use std::path::{Path, PathBuf};

use crate::config;

/// Default base directory for all persistent data.
pub const DATA_ROOT: &str = "/data";

/// Path utilities for the data directory.
#[derive(Debug, Clone)]
pub struct StoragePaths {
    root: PathBuf,
}

impl Default for StoragePaths {
    fn default() -> Self {
        Self::new(DATA_ROOT)
    }
}

impl StoragePaths {
    /// Create a new StoragePaths with a custom root (useful for testing).
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Resolve the root from `DATA_DIR`, falling back to the default.
    pub fn from_env() -> Self {
        match env::var(config::DATA_DIR_ENV) {
            Ok(dir) if !dir.trim().is_empty() => Self::new(dir),
            _ => Self::default(),
        }
    }

    /// Root directory for all persistent data.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path to the embedded ledger database file.
    pub fn ledger_file(&self) -> PathBuf {
        self.root.join("ledger.redb")
    }

    // ========== Farmer Profile Paths ==========

    /// Directory containing all farmer profiles.
    pub fn farmers_dir(&self) -> PathBuf {
        self.root.join("farmers")
    }

    /// Path to a specific farmer profile file.
    pub fn farmer(&self, farmer_id: &str) -> PathBuf {
        self.farmers_dir().join(format!("{farmer_id}.json"))
    }

    // ========== Adopter Profile Paths ==========

    /// Directory containing all adopter profiles.
    pub fn adopters_dir(&self) -> PathBuf {
        self.root.join("adopters")
    }

    /// Path to a specific adopter profile file.
    pub fn adopter(&self, adopter_id: &str) -> PathBuf {
        self.adopters_dir().join(format!("{adopter_id}.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_paths_use_data_root() {
        let paths = StoragePaths::default();
        assert_eq!(paths.root(), Path::new("/data"));
        assert_eq!(paths.ledger_file(), PathBuf::from("/data/ledger.redb"));
    }

    #[test]
    fn custom_root_for_testing() {
        let paths = StoragePaths::new("/tmp/test-data");
        assert_eq!(paths.root(), Path::new("/tmp/test-data"));
        assert_eq!(
            paths.farmer("farmer-123"),
            PathBuf::from("/tmp/test-data/farmers/farmer-123.json")
        );
    }

    #[test]
    fn profile_paths_are_correct() {
        let paths = StoragePaths::default();
        assert_eq!(paths.farmers_dir(), PathBuf::from("/data/farmers"));
        assert_eq!(paths.farmer("f1"), PathBuf::from("/data/farmers/f1.json"));
        assert_eq!(paths.adopters_dir(), PathBuf::from("/data/adopters"));
        assert_eq!(paths.adopter("a1"), PathBuf::from("/data/adopters/a1.json"));
    }
}
