//! Tag command for setback.
//!
//! Applies a tag to a document (vault path) or a task (id). Re-tagging is a
//! no-op that writes nothing.

use serde::Serialize;

use crate::core::Engine;
use crate::storage::{EventSink, EventSource, StateStore};
use crate::tagging::{DocumentRepository, TagOutcome, TagTarget, TaskList};

/// Options for the tag command.
#[derive(Debug, Clone, Default)]
pub struct TagOptions {
    /// Output as JSON.
    pub json: bool,
    /// Suppress output.
    pub quiet: bool,
}

/// Output format for the tag command.
#[derive(Debug, Clone, Serialize)]
pub struct TagOutput {
    pub success: bool,
    pub target: TagTarget,
    pub tag: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<TagOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The tag command implementation.
pub struct TagCommand<E, D, T, S> {
    engine: Engine<E, D, T, S>,
}

impl<E, D, T, S> TagCommand<E, D, T, S>
where
    E: EventSource + EventSink,
    D: DocumentRepository,
    T: TaskList,
    S: StateStore,
{
    pub fn new(engine: Engine<E, D, T, S>) -> Self {
        Self { engine }
    }

    /// Tag `reference` with `tag`.
    pub fn run(&self, reference: &str, tag: &str) -> TagOutput {
        let target = TagTarget::parse(reference);
        let result = self.engine.tag(&target, tag);
        match result {
            Ok(outcome) => TagOutput {
                success: true,
                target,
                tag: tag.to_string(),
                outcome: Some(outcome),
                error: None,
            },
            Err(e) => TagOutput {
                success: false,
                target,
                tag: tag.to_string(),
                outcome: None,
                error: Some(e.to_string()),
            },
        }
    }

    /// Format output based on options.
    pub fn format_output(&self, output: &TagOutput, options: &TagOptions) -> String {
        if options.quiet {
            return String::new();
        }

        if options.json {
            serde_json::to_string_pretty(output).unwrap_or_else(|_| "{}".to_string())
        } else {
            self.format_human_readable(output)
        }
    }

    fn format_human_readable(&self, output: &TagOutput) -> String {
        match (output.success, output.outcome) {
            (true, Some(TagOutcome::Applied)) => {
                format!("Tagged {} with {}.\n", output.target.as_str(), output.tag)
            }
            (true, _) => format!(
                "{} already has {}.\n",
                output.target.as_str(),
                output.tag
            ),
            (false, _) => format!(
                "Tag failed: {}\n",
                output.error.as_deref().unwrap_or("unknown error")
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::context::tests::MemoryProject;
    use crate::tagging::Task;

    #[test]
    fn test_tag_task_once() {
        let project = MemoryProject::new();
        let cmd = TagCommand::new(project.engine());

        let first = cmd.run("task-7", "#blocked");
        let second = cmd.run("task-7", "#blocked");

        assert_eq!(first.outcome, Some(TagOutcome::Applied));
        assert_eq!(second.outcome, Some(TagOutcome::AlreadyPresent));
        assert_eq!(
            project.tasks.find("task-7").unwrap(),
            Some(Task::new("task-7", "Write chapter 3 #blocked"))
        );
        assert_eq!(project.tasks.writes(), 1);
    }

    #[test]
    fn test_tag_document() {
        let project = MemoryProject::new();
        project
            .docs
            .insert("Projects/essay.md", "---\ntags: [draft]\n---\nBody\n");
        let cmd = TagCommand::new(project.engine());

        let output = cmd.run("Projects/essay.md", "#stuck");

        assert!(output.success);
        assert!(matches!(output.target, TagTarget::Document(_)));
        let content = project.docs.read("Projects/essay.md").unwrap();
        assert!(content.contains("stuck"));
    }

    #[test]
    fn test_tag_missing_target() {
        let project = MemoryProject::new();
        let cmd = TagCommand::new(project.engine());

        let output = cmd.run("task-404", "#blocked");

        assert!(!output.success);
        assert!(output.error.unwrap().contains("task-404"));
    }

    #[test]
    fn test_format_output() {
        let project = MemoryProject::new();
        let cmd = TagCommand::new(project.engine());

        let output = cmd.run("task-7", "#blocked");
        assert_eq!(
            cmd.format_output(&output, &TagOptions::default()),
            "Tagged task-7 with #blocked.\n"
        );

        let output = cmd.run("task-7", "#blocked");
        assert_eq!(
            cmd.format_output(&output, &TagOptions::default()),
            "task-7 already has #blocked.\n"
        );

        let json = cmd.format_output(
            &output,
            &TagOptions {
                json: true,
                ..Default::default()
            },
        );
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["outcome"], "already_present");
        assert_eq!(parsed["target"]["kind"], "task");
    }
}
