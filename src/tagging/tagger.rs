//! Idempotent tagging of documents and tasks.
//!
//! Applying the same tag twice leaves exactly one occurrence, and the second
//! call writes nothing. The read and the write are not atomic: callers must
//! not tag the same target from two places at once.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SetbackError};
use crate::tagging::document::Document;
use crate::tagging::documents::DocumentRepository;
use crate::tagging::tasks::TaskList;

const MAX_EXTENSION_LEN: usize = 5;

/// Where a tag goes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "ref", rename_all = "snake_case")]
pub enum TagTarget {
    /// A document path in the repository.
    Document(String),
    /// A task id in the task list.
    Task(String),
}

impl TagTarget {
    /// Classify a reference string.
    ///
    /// Anything with a path separator or a short file extension is a
    /// document; everything else is a task id.
    pub fn parse(reference: &str) -> Self {
        let reference = reference.trim();
        if looks_like_path(reference) {
            TagTarget::Document(reference.to_string())
        } else {
            TagTarget::Task(reference.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            TagTarget::Document(path) => path,
            TagTarget::Task(id) => id,
        }
    }
}

fn looks_like_path(reference: &str) -> bool {
    if reference.contains('/') || reference.contains('\\') {
        return true;
    }
    match reference.rsplit_once('.') {
        Some((stem, ext)) => {
            !stem.is_empty()
                && (1..=MAX_EXTENSION_LEN).contains(&ext.len())
                && ext.chars().all(|c| c.is_ascii_alphanumeric())
        }
        None => false,
    }
}

/// Result of a tag request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagOutcome {
    Applied,
    AlreadyPresent,
}

/// Applies tags through a document repository and a task list.
pub struct Tagger<'a, D: ?Sized, T: ?Sized> {
    documents: &'a D,
    tasks: &'a T,
}

impl<'a, D, T> Tagger<'a, D, T>
where
    D: DocumentRepository + ?Sized,
    T: TaskList + ?Sized,
{
    pub fn new(documents: &'a D, tasks: &'a T) -> Self {
        Self { documents, tasks }
    }

    /// Add `tag` to `target` unless it is already there.
    ///
    /// # Errors
    ///
    /// `SetbackError::TargetNotFound` when the document or task does not
    /// exist; storage errors from the underlying write.
    pub fn apply_tag(&self, target: &TagTarget, tag: &str) -> Result<TagOutcome> {
        let tag = tag.trim();
        if tag.is_empty() {
            return Err(SetbackError::validation("tag must not be empty"));
        }
        match target {
            TagTarget::Document(path) => self.tag_document(path, tag),
            TagTarget::Task(id) => self.tag_task(id, tag),
        }
    }

    fn tag_document(&self, path: &str, tag: &str) -> Result<TagOutcome> {
        let content = self.documents.read(path)?;
        let mut doc = Document::parse(&content)?;

        if doc.has_tag(tag) {
            tracing::debug!("{} already tagged {}", path, tag);
            return Ok(TagOutcome::AlreadyPresent);
        }

        let structured = doc
            .front_matter
            .as_ref()
            .is_some_and(|fm| fm.has_tags_field());
        if structured {
            doc.add_tag(tag);
            self.documents.modify(path, &doc.render()?)?;
        } else {
            // Appended to the raw text; front matter stays byte for byte.
            self.documents.append(path, &appended_line(&content, tag))?;
        }
        tracing::debug!("tagged {} with {}", path, tag);
        Ok(TagOutcome::Applied)
    }

    fn tag_task(&self, id: &str, tag: &str) -> Result<TagOutcome> {
        let task = self
            .tasks
            .find(id)?
            .ok_or_else(|| SetbackError::target_not_found(id))?;

        if task.text.split_whitespace().any(|token| token == tag) {
            tracing::debug!("task {} already tagged {}", id, tag);
            return Ok(TagOutcome::AlreadyPresent);
        }

        let text = if task.text.trim_end().is_empty() {
            tag.to_string()
        } else {
            format!("{} {}", task.text.trim_end(), tag)
        };
        self.tasks.update_text(id, &text)?;
        tracing::debug!("tagged task {} with {}", id, tag);
        Ok(TagOutcome::Applied)
    }
}

/// Text that puts `line` on its own line after `content`.
fn appended_line(content: &str, line: &str) -> String {
    let mut suffix = String::new();
    if !content.is_empty() && !content.ends_with('\n') {
        suffix.push('\n');
    }
    suffix.push_str(line);
    suffix.push('\n');
    suffix
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tagging::documents::MemoryDocumentRepository;
    use crate::tagging::tasks::{MemoryTaskList, Task};

    const TAG: &str = "#failed-on-20240101";

    #[test]
    fn test_parse_target() {
        assert_eq!(
            TagTarget::parse("Projects/essay.md"),
            TagTarget::Document("Projects/essay.md".to_string())
        );
        assert_eq!(
            TagTarget::parse("notes\\draft"),
            TagTarget::Document("notes\\draft".to_string())
        );
        assert_eq!(
            TagTarget::parse("essay.md"),
            TagTarget::Document("essay.md".to_string())
        );
        assert_eq!(TagTarget::parse("task-42"), TagTarget::Task("task-42".to_string()));
        assert_eq!(
            TagTarget::parse("Finish v1.0 release"),
            TagTarget::Task("Finish v1.0 release".to_string())
        );
        assert_eq!(
            TagTarget::parse("archive.backup-old"),
            TagTarget::Task("archive.backup-old".to_string())
        );
    }

    #[test]
    fn test_document_tag_is_idempotent() {
        let docs = MemoryDocumentRepository::new();
        let tasks = MemoryTaskList::new();
        docs.insert("Projects/essay.md", "# Essay\n\nDraft text.\n");
        let tagger = Tagger::new(&docs, &tasks);
        let target = TagTarget::parse("Projects/essay.md");

        assert_eq!(tagger.apply_tag(&target, TAG).unwrap(), TagOutcome::Applied);
        let after_first = docs.read("Projects/essay.md").unwrap();
        let writes = docs.writes();

        assert_eq!(
            tagger.apply_tag(&target, TAG).unwrap(),
            TagOutcome::AlreadyPresent
        );
        let after_second = docs.read("Projects/essay.md").unwrap();

        assert_eq!(after_first, after_second);
        assert_eq!(docs.writes(), writes);
        assert_eq!(after_second.matches(TAG).count(), 1);
        assert_eq!(after_second, "# Essay\n\nDraft text.\n#failed-on-20240101\n");
    }

    #[test]
    fn test_document_with_tags_field_is_modified_in_place() {
        let docs = MemoryDocumentRepository::new();
        let tasks = MemoryTaskList::new();
        docs.insert("a.md", "---\ntags:\n- draft\n---\nBody\n");
        let tagger = Tagger::new(&docs, &tasks);
        let target = TagTarget::parse("a.md");

        assert_eq!(tagger.apply_tag(&target, TAG).unwrap(), TagOutcome::Applied);
        assert_eq!(
            tagger.apply_tag(&target, TAG).unwrap(),
            TagOutcome::AlreadyPresent
        );

        let meta = docs.read_metadata("a.md").unwrap().unwrap();
        assert_eq!(meta.tags(), vec!["draft", "failed-on-20240101"]);
        assert_eq!(docs.read_body("a.md").unwrap(), "Body\n");
        assert_eq!(docs.writes(), 1);
    }

    #[test]
    fn test_body_tag_keeps_front_matter_verbatim() {
        let docs = MemoryDocumentRepository::new();
        let tasks = MemoryTaskList::new();
        let original = "---\r\ntitle: \"My Note\"  # keep me\r\naliases: [a, b]\r\n---\r\nBody";
        docs.insert("note.md", original);
        let tagger = Tagger::new(&docs, &tasks);

        assert_eq!(
            tagger.apply_tag(&TagTarget::parse("note.md"), TAG).unwrap(),
            TagOutcome::Applied
        );

        let after = docs.read("note.md").unwrap();
        assert_eq!(after, format!("{}\n{}\n", original, TAG));
        assert_eq!(docs.writes(), 1);
    }

    #[test]
    fn test_missing_document_is_not_found() {
        let docs = MemoryDocumentRepository::new();
        let tasks = MemoryTaskList::new();
        let tagger = Tagger::new(&docs, &tasks);

        let result = tagger.apply_tag(&TagTarget::parse("Missing/doc.md"), TAG);

        assert!(matches!(result, Err(SetbackError::TargetNotFound { .. })));
        assert_eq!(docs.writes(), 0);
    }

    #[test]
    fn test_task_tag_is_idempotent() {
        let docs = MemoryDocumentRepository::new();
        let tasks = MemoryTaskList::with_tasks(vec![Task::new("task-7", "Write chapter 3")]);
        let tagger = Tagger::new(&docs, &tasks);
        let target = TagTarget::parse("task-7");

        assert_eq!(tagger.apply_tag(&target, TAG).unwrap(), TagOutcome::Applied);
        assert_eq!(
            tagger.apply_tag(&target, TAG).unwrap(),
            TagOutcome::AlreadyPresent
        );

        let task = tasks.find("task-7").unwrap().unwrap();
        assert_eq!(task.text, "Write chapter 3 #failed-on-20240101");
        assert_eq!(tasks.writes(), 1);
    }

    #[test]
    fn test_missing_task_is_not_found() {
        let docs = MemoryDocumentRepository::new();
        let tasks = MemoryTaskList::new();
        let tagger = Tagger::new(&docs, &tasks);

        assert!(matches!(
            tagger.apply_tag(&TagTarget::parse("task-404"), TAG),
            Err(SetbackError::TargetNotFound { .. })
        ));
    }

    #[test]
    fn test_empty_tag_is_rejected() {
        let docs = MemoryDocumentRepository::new();
        let tasks = MemoryTaskList::new();
        let tagger = Tagger::new(&docs, &tasks);

        assert!(tagger.apply_tag(&TagTarget::parse("a.md"), "  ").is_err());
    }
}
