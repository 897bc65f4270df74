// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 ShambaLink

//! Adopter profile repository.
//!
//! The core reads these for existence checks and for the customer email
//! snapshot passed to the payment gateway at charge time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::super::{FileStore, StorageError, StorageResult};

/// Adopter profile stored as a JSON document.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AdopterProfile {
    /// Unique adopter identifier (UUID)
    pub adopter_id: String,
    pub full_name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Repository for adopter profile documents.
pub struct AdopterRepository<'a> {
    storage: &'a FileStore,
}

impl<'a> AdopterRepository<'a> {
    pub fn new(storage: &'a FileStore) -> Self {
        Self { storage }
    }

    /// Check if an adopter profile exists.
    pub fn exists(&self, adopter_id: &str) -> bool {
        self.storage
            .exists(self.storage.paths().adopter(adopter_id))
    }

    /// Get an adopter profile by ID.
    pub fn get(&self, adopter_id: &str) -> StorageResult<AdopterProfile> {
        let path = self.storage.paths().adopter(adopter_id);
        if !self.storage.exists(&path) {
            return Err(StorageError::NotFound(format!("Adopter {adopter_id}")));
        }
        self.storage.read_json(path)
    }

    /// Create a new adopter profile.
    pub fn create(&self, profile: &AdopterProfile) -> StorageResult<()> {
        let adopter_id = &profile.adopter_id;
        if self.exists(adopter_id) {
            return Err(StorageError::AlreadyExists(format!(
                "Adopter {adopter_id}"
            )));
        }
        self.storage
            .write_json(self.storage.paths().adopter(adopter_id), profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{FileStore, StoragePaths};
    use std::env;
    use std::fs;

    fn test_store() -> FileStore {
        let test_dir = env::temp_dir().join(format!("test-adopter-repo-{}", uuid::Uuid::new_v4()));
        let paths = StoragePaths::new(&test_dir);
        let mut store = FileStore::new(paths);
        store.initialize().expect("Failed to initialize");
        store
    }

    fn cleanup(store: &FileStore) {
        let _ = fs::remove_dir_all(store.paths().root());
    }

    fn test_adopter(id: &str) -> AdopterProfile {
        AdopterProfile {
            adopter_id: id.to_string(),
            full_name: "Peter Otieno".to_string(),
            email: "peter@example.com".to_string(),
            phone: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn create_and_get_adopter() {
        let store = test_store();
        let repo = AdopterRepository::new(&store);

        repo.create(&test_adopter("adopter-1")).unwrap();
        let loaded = repo.get("adopter-1").unwrap();
        assert_eq!(loaded.email, "peter@example.com");

        cleanup(&store);
    }

    #[test]
    fn duplicate_create_is_rejected() {
        let store = test_store();
        let repo = AdopterRepository::new(&store);

        repo.create(&test_adopter("adopter-2")).unwrap();
        assert!(matches!(
            repo.create(&test_adopter("adopter-2")),
            Err(StorageError::AlreadyExists(_))
        ));

        cleanup(&store);
    }

    #[test]
    fn missing_adopter_is_not_found() {
        let store = test_store();
        let repo = AdopterRepository::new(&store);
        assert!(matches!(
            repo.get("ghost"),
            Err(StorageError::NotFound(_))
        ));
        cleanup(&store);
    }
}
