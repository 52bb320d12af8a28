//! Document repository boundary.
//!
//! Paths are vault-relative strings with `/` separators. The engine only
//! annotates documents: it creates new ones, appends to them, or rewrites one
//! after changing a single field. It never deletes.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{Result, SetbackError};
use crate::tagging::document::{Document, FrontMatter};
use crate::util::{atomic_write, read_to_string_limited};

/// Read/write access to markdown documents.
pub trait DocumentRepository {
    /// Paths starting with `prefix`, sorted.
    fn list_by_prefix(&self, prefix: &str) -> Result<Vec<String>>;

    /// Raw content of the document at `path`.
    ///
    /// Returns `SetbackError::TargetNotFound` when it does not exist.
    fn read(&self, path: &str) -> Result<String>;

    /// Create a new document. Fails if one already exists at `path`.
    fn create(&self, path: &str, content: &str) -> Result<()>;

    /// Replace the content of an existing document.
    fn modify(&self, path: &str, content: &str) -> Result<()>;

    /// Append `text` to an existing document.
    fn append(&self, path: &str, text: &str) -> Result<()>;

    fn exists(&self, path: &str) -> bool;

    /// Parsed front matter, if the document has any.
    fn read_metadata(&self, path: &str) -> Result<Option<FrontMatter>> {
        Ok(Document::parse(&self.read(path)?)?.front_matter)
    }

    /// Document body with any front matter stripped.
    fn read_body(&self, path: &str) -> Result<String> {
        Ok(Document::parse(&self.read(path)?)?.body)
    }
}

impl<T: DocumentRepository + ?Sized> DocumentRepository for Arc<T> {
    fn list_by_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        (**self).list_by_prefix(prefix)
    }

    fn read(&self, path: &str) -> Result<String> {
        (**self).read(path)
    }

    fn create(&self, path: &str, content: &str) -> Result<()> {
        (**self).create(path, content)
    }

    fn modify(&self, path: &str, content: &str) -> Result<()> {
        (**self).modify(path, content)
    }

    fn append(&self, path: &str, text: &str) -> Result<()> {
        (**self).append(path, text)
    }

    fn exists(&self, path: &str) -> bool {
        (**self).exists(path)
    }
}

/// Documents stored as files under a vault root.
#[derive(Debug, Clone)]
pub struct FsDocumentRepository {
    root: PathBuf,
}

impl FsDocumentRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a vault-relative path, rejecting anything that would escape
    /// the root.
    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if path.is_empty() || escapes {
            return Err(SetbackError::document(format!(
                "invalid document path: {}",
                path
            )));
        }
        Ok(self.root.join(relative))
    }

    fn collect(&self, dir: &Path, out: &mut Vec<String>) -> Result<()> {
        let entries = fs::read_dir(dir).map_err(|e| SetbackError::storage(dir, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| SetbackError::storage(dir, e))?;
            let path = entry.path();
            let hidden = entry.file_name().to_string_lossy().starts_with('.');
            if hidden {
                continue;
            }
            if path.is_dir() {
                self.collect(&path, out)?;
            } else if let Ok(relative) = path.strip_prefix(&self.root) {
                let parts: Vec<String> = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect();
                out.push(parts.join("/"));
            }
        }
        Ok(())
    }
}

impl DocumentRepository for FsDocumentRepository {
    fn list_by_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let mut paths = Vec::new();
        self.collect(&self.root, &mut paths)?;
        paths.retain(|p| p.starts_with(prefix));
        paths.sort();
        Ok(paths)
    }

    fn read(&self, path: &str) -> Result<String> {
        let full = self.resolve(path)?;
        if !full.is_file() {
            return Err(SetbackError::target_not_found(path));
        }
        read_to_string_limited(&full)
    }

    fn create(&self, path: &str, content: &str) -> Result<()> {
        let full = self.resolve(path)?;
        if full.exists() {
            return Err(SetbackError::document(format!(
                "document already exists: {}",
                path
            )));
        }
        atomic_write(&full, content.as_bytes())
    }

    fn modify(&self, path: &str, content: &str) -> Result<()> {
        let full = self.resolve(path)?;
        if !full.is_file() {
            return Err(SetbackError::target_not_found(path));
        }
        atomic_write(&full, content.as_bytes())
    }

    fn append(&self, path: &str, text: &str) -> Result<()> {
        let full = self.resolve(path)?;
        if !full.is_file() {
            return Err(SetbackError::target_not_found(path));
        }
        let mut file = OpenOptions::new()
            .append(true)
            .open(&full)
            .map_err(|e| SetbackError::storage(&full, e))?;
        file.write_all(text.as_bytes())
            .map_err(|e| SetbackError::storage(&full, e))
    }

    fn exists(&self, path: &str) -> bool {
        self.resolve(path).map(|p| p.is_file()).unwrap_or(false)
    }
}

/// In-memory documents for tests.
#[derive(Debug, Default)]
pub struct MemoryDocumentRepository {
    documents: Mutex<BTreeMap<String, String>>,
    writes: Mutex<usize>,
}

impl MemoryDocumentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a document without counting it as a write.
    pub fn insert(&self, path: impl Into<String>, content: impl Into<String>) {
        self.docs().insert(path.into(), content.into());
    }

    /// Number of create/modify/append calls that changed something.
    pub fn writes(&self) -> usize {
        *self.writes.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn len(&self) -> usize {
        self.docs().len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs().is_empty()
    }

    fn docs(&self) -> MutexGuard<'_, BTreeMap<String, String>> {
        self.documents.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn record_write(&self) {
        *self.writes.lock().unwrap_or_else(|e| e.into_inner()) += 1;
    }
}

impl DocumentRepository for MemoryDocumentRepository {
    fn list_by_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .docs()
            .keys()
            .filter(|p| p.starts_with(prefix))
            .cloned()
            .collect())
    }

    fn read(&self, path: &str) -> Result<String> {
        self.docs()
            .get(path)
            .cloned()
            .ok_or_else(|| SetbackError::target_not_found(path))
    }

    fn create(&self, path: &str, content: &str) -> Result<()> {
        let mut docs = self.docs();
        if docs.contains_key(path) {
            return Err(SetbackError::document(format!(
                "document already exists: {}",
                path
            )));
        }
        docs.insert(path.to_string(), content.to_string());
        drop(docs);
        self.record_write();
        Ok(())
    }

    fn modify(&self, path: &str, content: &str) -> Result<()> {
        let mut docs = self.docs();
        let existing = docs
            .get_mut(path)
            .ok_or_else(|| SetbackError::target_not_found(path))?;
        *existing = content.to_string();
        drop(docs);
        self.record_write();
        Ok(())
    }

    fn append(&self, path: &str, text: &str) -> Result<()> {
        let mut docs = self.docs();
        let existing = docs
            .get_mut(path)
            .ok_or_else(|| SetbackError::target_not_found(path))?;
        existing.push_str(text);
        drop(docs);
        self.record_write();
        Ok(())
    }

    fn exists(&self, path: &str) -> bool {
        self.docs().contains_key(path)
    }
}
