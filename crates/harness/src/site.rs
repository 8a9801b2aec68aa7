use tempfile::TempDir;

use crate::TestPeer;
use varsync_storage::StorageError;

/// A shared on-disk store that several actors open concurrently.
pub struct TestSite {
    _dir: TempDir,
    path: String,
}

impl TestSite {
    pub fn new() -> Result<Self, StorageError> {
        let dir = tempfile::tempdir()?;
        let path = dir
            .path()
            .join("varsync.db")
            .to_str()
            .ok_or_else(|| StorageError::Serialization("non-utf8 temp path".into()))?
            .to_string();
        Ok(Self { _dir: dir, path })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn peer(&self, actor: &str) -> Result<TestPeer, StorageError> {
        TestPeer::open(&self.path, actor)
    }
}
