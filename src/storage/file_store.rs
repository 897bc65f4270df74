// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 ShambaLink

//! Plain-filesystem document storage for profile records.
//!
//! Every document is one JSON file. Writes go to a temp file first and
//! are renamed into place, so readers never observe a half-written
//! document.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;

use serde::{de::DeserializeOwned, Serialize};

use super::StoragePaths;

/// Error type for document storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("storage not initialized")]
    NotInitialized,
}

impl From<io::Error> for StorageError {
    fn from(e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::NotFound {
            StorageError::NotFound(e.to_string())
        } else {
            StorageError::Io(e)
        }
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Document store rooted at the data directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    paths: StoragePaths,
    initialized: bool,
}

impl FileStore {
    /// Create a new FileStore.
    ///
    /// Does NOT create the directory structure. Call `initialize()` first.
    pub fn new(paths: StoragePaths) -> Self {
        Self {
            paths,
            initialized: false,
        }
    }

    /// Get the storage paths.
    pub fn paths(&self) -> &StoragePaths {
        &self.paths
    }

    /// Create the directory structure under the data root.
    /// Safe to call multiple times (idempotent).
    pub fn initialize(&mut self) -> StorageResult<()> {
        let dirs = [self.paths.farmers_dir(), self.paths.adopters_dir()];
        for dir in dirs {
            fs::create_dir_all(&dir)?;
        }
        self.initialized = true;
        Ok(())
    }

    /// Check that the data directory is writable.
    ///
    /// Performs a write-read-delete probe; surfaced by the health endpoint.
    pub fn health_check(&self) -> StorageResult<()> {
        if !self.initialized {
            return Err(StorageError::NotInitialized);
        }

        let probe = self.paths.root().join(".health_check");
        let data = b"health_check_data";

        fs::write(&probe, data)?;
        let read_back = fs::read(&probe)?;
        fs::remove_file(&probe)?;

        if read_back != data {
            return Err(StorageError::Io(io::Error::other(
                "health check data mismatch",
            )));
        }
        Ok(())
    }

    /// Read a JSON document and deserialize it.
    pub fn read_json<T: DeserializeOwned>(&self, path: impl AsRef<Path>) -> StorageResult<T> {
        if !self.initialized {
            return Err(StorageError::NotInitialized);
        }

        let file = File::open(path.as_ref())?;
        let reader = BufReader::new(file);
        let value = serde_json::from_reader(reader)?;
        Ok(value)
    }

    /// Write a JSON document (atomic write via rename).
    pub fn write_json<T: Serialize>(&self, path: impl AsRef<Path>, value: &T) -> StorageResult<()> {
        if !self.initialized {
            return Err(StorageError::NotInitialized);
        }

        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let temp_path = path.with_extension("tmp");
        {
            let file = File::create(&temp_path)?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, value)?;
            writer.flush()?;
        }
        fs::rename(&temp_path, path)?;
        Ok(())
    }

    /// Check if a document exists.
    pub fn exists(&self, path: impl AsRef<Path>) -> bool {
        path.as_ref().is_file()
    }

    /// List the ids of all documents in a directory with this extension.
    pub fn list_files(&self, dir: impl AsRef<Path>, extension: &str) -> StorageResult<Vec<String>> {
        if !self.initialized {
            return Err(StorageError::NotInitialized);
        }

        let dir = dir.as_ref();
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut ids = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_file() {
                if let Some(ext) = path.extension() {
                    if ext == extension {
                        if let Some(stem) = path.file_stem() {
                            if let Some(id) = stem.to_str() {
                                ids.push(id.to_string());
                            }
                        }
                    }
                }
            }
        }
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use std::env;

    fn test_store() -> FileStore {
        let test_dir = env::temp_dir().join(format!("test-store-{}", uuid::Uuid::new_v4()));
        let paths = StoragePaths::new(&test_dir);
        let mut store = FileStore::new(paths);
        store.initialize().expect("Failed to initialize test store");
        store
    }

    fn cleanup(store: &FileStore) {
        let _ = fs::remove_dir_all(store.paths().root());
    }

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct TestDoc {
        id: String,
        value: i32,
    }

    #[test]
    fn initialize_creates_directories() {
        let store = test_store();
        assert!(store.paths().farmers_dir().exists());
        assert!(store.paths().adopters_dir().exists());
        cleanup(&store);
    }

    #[test]
    fn write_and_read_json() {
        let store = test_store();
        let doc = TestDoc {
            id: "doc-1".to_string(),
            value: 42,
        };

        let path = store.paths().farmers_dir().join("doc-1.json");
        store.write_json(&path, &doc).unwrap();

        let read: TestDoc = store.read_json(&path).unwrap();
        assert_eq!(read, doc);
        cleanup(&store);
    }

    #[test]
    fn health_check_works() {
        let store = test_store();
        store.health_check().expect("health check should pass");
        cleanup(&store);
    }

    #[test]
    fn list_files_returns_ids() {
        let store = test_store();
        for i in 1..=3 {
            let path = store.paths().farmers_dir().join(format!("farmer-{i}.json"));
            store
                .write_json(
                    &path,
                    &TestDoc {
                        id: format!("farmer-{i}"),
                        value: i,
                    },
                )
                .unwrap();
        }

        let ids = store.list_files(store.paths().farmers_dir(), "json").unwrap();
        assert_eq!(ids.len(), 3);
        assert!(ids.contains(&"farmer-2".to_string()));
        cleanup(&store);
    }

    #[test]
    fn missing_file_reads_as_not_found() {
        let store = test_store();
        let result: StorageResult<TestDoc> =
            store.read_json(store.paths().farmers_dir().join("absent.json"));
        assert!(matches!(result, Err(StorageError::NotFound(_))));
        cleanup(&store);
    }

    #[test]
    fn uninitialized_store_returns_error() {
        let paths = StoragePaths::new("/tmp/never-init");
        let store = FileStore::new(paths);

        let result = store.read_json::<TestDoc>("/tmp/any.json");
        assert!(matches!(result, Err(StorageError::NotInitialized)));
    }
}
