//! File-based state storage for setback.
//!
//! State is stored as pretty-printed JSON in `.setback/state.json`.
//! Atomic writes are achieved via temp file + rename.

use std::path::{Path, PathBuf};

use crate::config::project_state_path;
use crate::core::EngineState;
use crate::error::Result;
use crate::storage::StateStore;
use crate::util::{atomic_write, read_to_string_limited};

/// File-based engine state storage.
#[derive(Debug, Clone)]
pub struct FileStateStore {
    /// Path of the state file.
    path: PathBuf,
}

impl FileStateStore {
    /// Create a store at an explicit path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Create a store for the project containing `cwd`.
    pub fn for_project(cwd: &Path) -> Self {
        Self::new(project_state_path(cwd))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StateStore for FileStateStore {
    fn load(&self) -> Result<Option<EngineState>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = read_to_string_limited(&self.path)?;
        let state: EngineState = serde_json::from_str(&content)?;

        Ok(Some(state))
    }

    fn save(&self, state: &EngineState) -> Result<()> {
        let json = serde_json::to_string_pretty(state)?;
        atomic_write(&self.path, json.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::traits::tests::test_state_store;
    use tempfile::TempDir;

    #[test]
    fn test_file_state_store() {
        let temp = TempDir::new().unwrap();
        let store = FileStateStore::new(temp.path().join("state.json"));
        test_state_store(&store);
    }

    #[test]
    fn test_creates_parent_directories() {
        let temp = TempDir::new().unwrap();
        let store = FileStateStore::for_project(temp.path());

        store.save(&EngineState::new()).unwrap();

        assert!(temp.path().join(".setback/state.json").exists());
        // No temp file left behind
        assert!(!temp.path().join(".setback/.state.json.tmp").exists());
    }

    #[test]
    fn test_corrupt_state_is_an_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("state.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(FileStateStore::new(&path).load().is_err());
    }
}
