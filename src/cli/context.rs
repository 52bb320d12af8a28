//! Engine construction for the CLI.
//!
//! Every command resolves the project root (the vault) from the working
//! directory and wires the on-disk stores selected by configuration.

use std::path::{Path, PathBuf};

use crate::config::{find_project_root, Config};
use crate::core::Engine;
use crate::storage::{FileStateStore, ProjectEventStore};
use crate::tagging::{FileTaskList, FsDocumentRepository};

/// Engine backed by the project's files.
pub type ProjectEngine =
    Engine<ProjectEventStore, FsDocumentRepository, FileTaskList, FileStateStore>;

/// Build the engine for the project containing `cwd`.
pub fn open_engine(cwd: &Path, config: Config) -> ProjectEngine {
    let root = find_project_root(cwd);
    tracing::debug!("opening vault at {}", root.display());

    let events = ProjectEventStore::open(&root, &config.vault);
    let documents = FsDocumentRepository::new(&root);
    let tasks = FileTaskList::new(tasks_path(&root, &config));
    let store = FileStateStore::for_project(&root);

    Engine::new(events, documents, tasks, store, config)
}

/// Task list file for a vault root.
pub fn tasks_path(root: &Path, config: &Config) -> PathBuf {
    root.join(&config.vault.tasks_file)
}
