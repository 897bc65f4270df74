// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 ShambaLink

//! Farmer profile repository.
//!
//! Thin collaborator records: the reconciliation core only needs farmers
//! to exist and to have contact details for payout and notification.
//! Each profile is one JSON file under `{data}/farmers/`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::super::{FileStore, StorageError, StorageResult};

/// Farmer profile stored as a JSON document.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FarmerProfile {
    /// Unique farmer identifier (UUID)
    pub farmer_id: String,
    pub full_name: String,
    pub email: String,
    pub phone: String,
    /// County where the farm sits, e.g. `Nakuru`
    pub county: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub farm_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Repository for farmer profile documents.
pub struct FarmerRepository<'a> {
    storage: &'a FileStore,
}

impl<'a> FarmerRepository<'a> {
    pub fn new(storage: &'a FileStore) -> Self {
        Self { storage }
    }

    /// Check if a farmer profile exists.
    pub fn exists(&self, farmer_id: &str) -> bool {
        self.storage.exists(self.storage.paths().farmer(farmer_id))
    }

    /// Get a farmer profile by ID.
    pub fn get(&self, farmer_id: &str) -> StorageResult<FarmerProfile> {
        let path = self.storage.paths().farmer(farmer_id);
        if !self.storage.exists(&path) {
            return Err(StorageError::NotFound(format!("Farmer {farmer_id}")));
        }
        self.storage.read_json(path)
    }

    /// Create a new farmer profile.
    pub fn create(&self, profile: &FarmerProfile) -> StorageResult<()> {
        let farmer_id = &profile.farmer_id;
        if self.exists(farmer_id) {
            return Err(StorageError::AlreadyExists(format!("Farmer {farmer_id}")));
        }
        self.storage
            .write_json(self.storage.paths().farmer(farmer_id), profile)
    }

    /// List all farmer profiles.
    pub fn list_all(&self) -> StorageResult<Vec<FarmerProfile>> {
        let ids = self
            .storage
            .list_files(self.storage.paths().farmers_dir(), "json")?;

        let mut profiles = Vec::new();
        for id in ids {
            if let Ok(profile) = self.get(&id) {
                profiles.push(profile);
            }
        }
        Ok(profiles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{FileStore, StoragePaths};
    use std::env;
    use std::fs;

    fn test_store() -> FileStore {
        let test_dir = env::temp_dir().join(format!("test-farmer-repo-{}", uuid::Uuid::new_v4()));
        let paths = StoragePaths::new(&test_dir);
        let mut store = FileStore::new(paths);
        store.initialize().expect("Failed to initialize");
        store
    }

    fn cleanup(store: &FileStore) {
        let _ = fs::remove_dir_all(store.paths().root());
    }

    fn test_farmer(id: &str) -> FarmerProfile {
        FarmerProfile {
            farmer_id: id.to_string(),
            full_name: "Jane Wanjiku".to_string(),
            email: "jane@example.com".to_string(),
            phone: "+254700000001".to_string(),
            county: "Nakuru".to_string(),
            farm_name: Some("Green Valley".to_string()),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn create_and_get_farmer() {
        let store = test_store();
        let repo = FarmerRepository::new(&store);

        let farmer = test_farmer("farmer-1");
        repo.create(&farmer).unwrap();

        let loaded = repo.get("farmer-1").unwrap();
        assert_eq!(loaded.full_name, farmer.full_name);
        assert_eq!(loaded.county, "Nakuru");

        cleanup(&store);
    }

    #[test]
    fn duplicate_create_is_rejected() {
        let store = test_store();
        let repo = FarmerRepository::new(&store);

        repo.create(&test_farmer("farmer-2")).unwrap();
        let result = repo.create(&test_farmer("farmer-2"));
        assert!(matches!(result, Err(StorageError::AlreadyExists(_))));

        cleanup(&store);
    }

    #[test]
    fn missing_farmer_is_not_found() {
        let store = test_store();
        let repo = FarmerRepository::new(&store);

        assert!(!repo.exists("ghost"));
        assert!(matches!(repo.get("ghost"), Err(StorageError::NotFound(_))));

        cleanup(&store);
    }

    #[test]
    fn list_all_returns_every_profile() {
        let store = test_store();
        let repo = FarmerRepository::new(&store);

        for i in 1..=3 {
            repo.create(&test_farmer(&format!("farmer-{i}"))).unwrap();
        }

        let profiles = repo.list_all().unwrap();
        assert_eq!(profiles.len(), 3);

        cleanup(&store);
    }
}
