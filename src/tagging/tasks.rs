//! Task list boundary.
//!
//! A task is an opaque id plus a line of text. Tags on tasks live inline in
//! that text.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SetbackError};
use crate::util::{atomic_write, read_to_string_limited};

/// A single task entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub text: String,
}

impl Task {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }
}

/// Lookup and text updates for tasks.
pub trait TaskList {
    fn find(&self, id: &str) -> Result<Option<Task>>;

    /// Replace the text of an existing task.
    ///
    /// Returns `SetbackError::TargetNotFound` when no task has `id`.
    fn update_text(&self, id: &str, text: &str) -> Result<()>;

    fn list(&self) -> Result<Vec<Task>>;
}

impl<T: TaskList + ?Sized> TaskList for Arc<T> {
    fn find(&self, id: &str) -> Result<Option<Task>> {
        (**self).find(id)
    }

    fn update_text(&self, id: &str, text: &str) -> Result<()> {
        (**self).update_text(id, text)
    }

    fn list(&self) -> Result<Vec<Task>> {
        (**self).list()
    }
}

/// Tasks stored as a JSON array of `{id, text}` objects.
#[derive(Debug, Clone)]
pub struct FileTaskList {
    path: PathBuf,
}

impl FileTaskList {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Vec<Task>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = read_to_string_limited(&self.path)?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&content)?)
    }
}

impl TaskList for FileTaskList {
    fn find(&self, id: &str) -> Result<Option<Task>> {
        Ok(self.load()?.into_iter().find(|t| t.id == id))
    }

    fn update_text(&self, id: &str, text: &str) -> Result<()> {
        let mut tasks = self.load()?;
        let task = tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| SetbackError::target_not_found(id))?;
        task.text = text.to_string();

        let json = serde_json::to_string_pretty(&tasks)?;
        atomic_write(&self.path, json.as_bytes())
    }

    fn list(&self) -> Result<Vec<Task>> {
        self.load()
    }
}

/// In-memory tasks for tests.
#[derive(Debug, Default)]
pub struct MemoryTaskList {
    tasks: Mutex<Vec<Task>>,
    writes: Mutex<usize>,
}

impl MemoryTaskList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tasks(tasks: Vec<Task>) -> Self {
        Self {
            tasks: Mutex::new(tasks),
            writes: Mutex::new(0),
        }
    }

    /// Number of `update_text` calls that succeeded.
    pub fn writes(&self) -> usize {
        *self.writes.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn tasks(&self) -> MutexGuard<'_, Vec<Task>> {
        self.tasks.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl TaskList for MemoryTaskList {
    fn find(&self, id: &str) -> Result<Option<Task>> {
        Ok(self.tasks().iter().find(|t| t.id == id).cloned())
    }

    fn update_text(&self, id: &str, text: &str) -> Result<()> {
        let mut tasks = self.tasks();
        let task = tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| SetbackError::target_not_found(id))?;
        task.text = text.to_string();
        drop(tasks);
        *self.writes.lock().unwrap_or_else(|e| e.into_inner()) += 1;
        Ok(())
    }

    fn list(&self) -> Result<Vec<Task>> {
        Ok(self.tasks().clone())
    }
}
