//! Event store adapters.
//!
//! Two on-disk layouts are supported:
//! - `JsonlEventStore`: an append-only JSONL log (`.setback/events.log`)
//! - `DocumentEventStore`: one markdown note per event under a vault prefix,
//!   with the event as front matter
//!
//! Both skip entries that fail to parse and log a warning, so one bad line or
//! note never hides the rest.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::config::{project_events_log_path, EventStoreKind, VaultConfig};
use crate::core::FailureEvent;
use crate::error::{Result, SetbackError};
use crate::storage::{EventSink, EventSource};
use crate::tagging::document::{Document, FrontMatter};
use crate::tagging::documents::{DocumentRepository, FsDocumentRepository};
use crate::util::read_to_string_limited;

/// Append-only JSONL event log.
#[derive(Debug, Clone)]
pub struct JsonlEventStore {
    path: PathBuf,
}

impl JsonlEventStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Log for the project containing `cwd`.
    pub fn for_project(cwd: &Path) -> Self {
        Self::new(project_events_log_path(cwd))
    }

    /// Get the path to the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Count non-empty lines in the log, parseable or not.
    pub fn count(&self) -> Result<usize> {
        if !self.path.exists() {
            return Ok(0);
        }
        let content = read_to_string_limited(&self.path)?;
        Ok(content.lines().filter(|l| !l.trim().is_empty()).count())
    }
}

impl EventSource for JsonlEventStore {
    fn events(&self) -> Result<Vec<FailureEvent>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let content = read_to_string_limited(&self.path)?;

        let mut events = Vec::new();
        for (line_num, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }

            match serde_json::from_str::<FailureEvent>(line) {
                Ok(event) => events.push(event),
                Err(e) => tracing::warn!(
                    "skipping malformed event on line {} of {}: {}",
                    line_num + 1,
                    self.path.display(),
                    e
                ),
            }
        }

        Ok(events)
    }
}

impl EventSink for JsonlEventStore {
    fn record(&self, event: &FailureEvent) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| SetbackError::storage(parent, e))?;
            }
        }

        let json = serde_json::to_string(event)?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| SetbackError::storage(&self.path, e))?;

        writeln!(file, "{}", json).map_err(|e| SetbackError::storage(&self.path, e))
    }
}

/// Events stored as markdown notes, one per event, under `prefix`.
#[derive(Debug, Clone)]
pub struct DocumentEventStore<R> {
    repo: R,
    prefix: String,
}

impl<R: DocumentRepository> DocumentEventStore<R> {
    pub fn new(repo: R, prefix: impl Into<String>) -> Self {
        Self {
            repo,
            prefix: prefix.into(),
        }
    }

    /// Note path for an event id.
    pub fn path_for(&self, id: &str) -> String {
        format!("{}{}.md", self.prefix, id)
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    fn read_event(&self, path: &str) -> Result<Option<FailureEvent>> {
        match self.repo.read_metadata(path)? {
            Some(meta) => Ok(Some(meta.deserialize()?)),
            None => Ok(None),
        }
    }
}

impl<R: DocumentRepository> EventSource for DocumentEventStore<R> {
    fn events(&self) -> Result<Vec<FailureEvent>> {
        let mut events = Vec::new();
        for path in self.repo.list_by_prefix(&self.prefix)? {
            if !path.ends_with(".md") {
                continue;
            }
            match self.read_event(&path) {
                Ok(Some(event)) => events.push(event),
                Ok(None) => tracing::debug!("{} has no front matter", path),
                Err(e) => tracing::warn!("skipping malformed event note {}: {}", path, e),
            }
        }
        Ok(events)
    }
}

impl<R: DocumentRepository> EventSink for DocumentEventStore<R> {
    fn record(&self, event: &FailureEvent) -> Result<()> {
        let doc = Document {
            front_matter: Some(FrontMatter::from_serializable(event)?),
            body: format!("# {}\n\n{}\n", event.source_ref, event.mitigation_principle),
        };
        self.repo.create(&self.path_for(&event.id), &doc.render()?)
    }
}

/// The event store a project is configured to use.
#[derive(Debug, Clone)]
pub enum ProjectEventStore {
    Jsonl(JsonlEventStore),
    Documents(DocumentEventStore<FsDocumentRepository>),
}

impl ProjectEventStore {
    /// Open the store selected by `vault.event_store` under `root`.
    pub fn open(root: &Path, vault: &VaultConfig) -> Self {
        match vault.event_store {
            EventStoreKind::Jsonl => Self::Jsonl(JsonlEventStore::for_project(root)),
            EventStoreKind::Documents => Self::Documents(DocumentEventStore::new(
                FsDocumentRepository::new(root),
                vault.events_prefix.clone(),
            )),
        }
    }
}

impl EventSource for ProjectEventStore {
    fn events(&self) -> Result<Vec<FailureEvent>> {
        match self {
            Self::Jsonl(store) => store.events(),
            Self::Documents(store) => store.events(),
        }
    }
}

impl EventSink for ProjectEventStore {
    fn record(&self, event: &FailureEvent) -> Result<()> {
        match self {
            Self::Jsonl(store) => store.record(event),
            Self::Documents(store) => store.record(event),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::traits::tests::{sample_event, test_event_store};
    use crate::tagging::documents::MemoryDocumentRepository;
    use tempfile::TempDir;

    #[test]
    fn test_jsonl_event_store() {
        let temp = TempDir::new().unwrap();
        let store = JsonlEventStore::new(temp.path().join("nested/events.log"));
        test_event_store(&store);
        assert_eq!(store.count().unwrap(), 2);
    }

    #[test]
    fn test_jsonl_missing_file_is_empty() {
        let temp = TempDir::new().unwrap();
        let store = JsonlEventStore::new(temp.path().join("events.log"));
        assert!(store.events().unwrap().is_empty());
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_jsonl_skips_malformed_lines() {
        let temp = TempDir::new().unwrap();
        let store = JsonlEventStore::new(temp.path().join("events.log"));
        store
            .record(&sample_event("loss_20240101_001", "overthinking"))
            .unwrap();
        {
            let mut file = OpenOptions::new().append(true).open(store.path()).unwrap();
            writeln!(file, "{{ not json").unwrap();
            writeln!(file).unwrap();
            writeln!(file, r#"{{"id":"partial"}}"#).unwrap();
        }
        store
            .record(&sample_event("loss_20240101_002", "overthinking"))
            .unwrap();

        let events = store.events().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(store.count().unwrap(), 4);
    }

    #[test]
    fn test_document_event_store() {
        let store = DocumentEventStore::new(MemoryDocumentRepository::new(), "Losses/");
        test_event_store(&store);
        assert!(store.repository().exists("Losses/loss_20240101_001.md"));
    }

    #[test]
    fn test_document_event_store_skips_bad_notes() {
        let repo = MemoryDocumentRepository::new();
        repo.insert("Losses/readme.md", "No front matter here.");
        repo.insert("Losses/broken.md", "---\nid: x\n---\n");
        repo.insert("Losses/image.png", "binary");
        repo.insert("Elsewhere/note.md", "---\nid: y\n---\n");
        let store = DocumentEventStore::new(repo, "Losses/");

        store
            .record(&sample_event("loss_20240101_001", "overthinking"))
            .unwrap();

        let events = store.events().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, "loss_20240101_001");
    }

    #[test]
    fn test_document_event_store_refuses_duplicate_ids() {
        let store = DocumentEventStore::new(MemoryDocumentRepository::new(), "Losses/");
        let event = sample_event("loss_20240101_001", "overthinking");

        store.record(&event).unwrap();
        assert!(store.record(&event).is_err());
    }

    #[test]
    fn test_document_event_store_on_disk() {
        let temp = TempDir::new().unwrap();
        let repo = crate::tagging::documents::FsDocumentRepository::new(temp.path());
        let store = DocumentEventStore::new(repo, "Losses/");
        let event = sample_event("loss_20240101_001", "overthinking");

        store.record(&event).unwrap();

        assert!(temp.path().join("Losses/loss_20240101_001.md").exists());
        assert_eq!(store.events().unwrap(), vec![event]);
    }

    #[test]
    fn test_project_event_store_follows_config() {
        let temp = TempDir::new().unwrap();
        let event = sample_event("loss_20240101_001", "overthinking");

        let jsonl = VaultConfig {
            event_store: EventStoreKind::Jsonl,
            ..VaultConfig::default()
        };
        let store = ProjectEventStore::open(temp.path(), &jsonl);
        store.record(&event).unwrap();
        assert!(temp.path().join(".setback/events.log").exists());

        let store = ProjectEventStore::open(temp.path(), &VaultConfig::default());
        assert!(store.events().unwrap().is_empty());
        store.record(&event).unwrap();
        assert!(temp.path().join("Losses/loss_20240101_001.md").exists());
        assert_eq!(store.events().unwrap(), vec![event]);
    }
}
