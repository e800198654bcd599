/// Test utilities for storage-backed tests.
///
/// The temporary directory lives as long as the environment, so test data is
/// removed even when a test panics.
use anyhow::Result;
use std::path::PathBuf;
use tempfile::TempDir;

use super::file_store::FileStore;

pub struct TestEnvironment {
    /// Kept alive to prevent cleanup until drop
    _temp_dir: TempDir,
    pub store: FileStore,
    pub base_path: PathBuf,
}

impl TestEnvironment {
    pub fn new() -> Result<Self> {
        let temp_dir = TempDir::new()?;
        let base_path = temp_dir.path().to_path_buf();
        let store = FileStore::new(&base_path)?;

        Ok(TestEnvironment {
            _temp_dir: temp_dir,
            store,
            base_path,
        })
    }
}
