//! Annotation of collaborator-owned documents and tasks.
//!
//! - `document`: markdown + YAML front matter parsing
//! - `documents`: the document repository boundary
//! - `tasks`: the task list boundary
//! - `tagger`: idempotent tag application

pub mod document;
pub mod documents;
pub mod tagger;
pub mod tasks;

pub use document::{Document, FrontMatter};
pub use documents::{DocumentRepository, FsDocumentRepository, MemoryDocumentRepository};
pub use tagger::{TagOutcome, TagTarget, Tagger};
pub use tasks::{FileTaskList, MemoryTaskList, Task, TaskList};

/// Tag marking a source as having failed on `date`.
pub fn failure_tag(date: chrono::NaiveDate) -> String {
    format!("#failed-on-{}", date.format("%Y%m%d"))
}
