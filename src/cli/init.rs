//! Init command for setback.
//!
//! Marks a directory as a vault by scaffolding `.setback/`, a commented
//! config file and an empty task list.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::{setback_home, Config};

/// Options for the init command.
#[derive(Debug, Clone, Default)]
pub struct InitOptions {
    /// Output as JSON.
    pub json: bool,
    /// Suppress output.
    pub quiet: bool,
    /// Force overwrite existing files.
    pub force: bool,
}

/// Output format for the init command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitOutput {
    /// Whether initialization was successful.
    pub success: bool,
    /// Files and directories created.
    pub created: Vec<String>,
    /// Files that already existed (skipped).
    pub skipped: Vec<String>,
    /// Error message if initialization failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl InitOutput {
    /// Create a successful output.
    pub fn success(created: Vec<String>, skipped: Vec<String>) -> Self {
        Self {
            success: true,
            created,
            skipped,
            error: None,
        }
    }

    /// Create a failed output, keeping what was created before the failure.
    pub fn failure(error: impl Into<String>, created: Vec<String>, skipped: Vec<String>) -> Self {
        Self {
            success: false,
            created,
            skipped,
            error: Some(error.into()),
        }
    }
}

/// Default config.toml content.
const DEFAULT_CONFIG: &str = r##"# setback configuration
#
# Values here override ~/.setback/config.toml; SETBACK_* environment
# variables override both.

# Exponential decay of event weight per day of age
[decay]
decay_factor = 0.95
window_days = 30

# Dominant-pattern transition ledger
[history]
cap = 30
recent_window = 5

# Deferrals before a task escalates
[deferral]
threshold_generic = 3
threshold_special = 2
special_markers = ["#synthesis"]

# Percentages a pairing must exceed to be reported
[correlation]
impact_high_threshold = 4
threshold_generic = 60
threshold_paired = 70

# Vault layout
# event_store: "documents" (one note per event) or "jsonl"
[vault]
event_store = "documents"
events_prefix = "Losses/"
reports_prefix = "Reports/"
tasks_file = "tasks.json"
monthly_top_n = 3
"##;

/// The init command implementation.
pub struct InitCommand {
    cwd: String,
}

impl InitCommand {
    /// Create a new init command.
    pub fn new(cwd: impl Into<String>) -> Self {
        Self { cwd: cwd.into() }
    }

    /// Run the init command.
    pub fn run(&self, options: &InitOptions) -> InitOutput {
        let cwd = Path::new(&self.cwd);
        let mut created = Vec::new();
        let mut skipped = Vec::new();

        // Directories carry no content; files carry content and whether to
        // overwrite.
        let setback_dir = cwd.join(".setback");
        let mut targets: Vec<(PathBuf, Option<(&str, bool)>)> = vec![
            (setback_dir.clone(), None),
            (
                setback_dir.join("config.toml"),
                Some((DEFAULT_CONFIG, options.force)),
            ),
            (
                cwd.join(&Config::default().vault.tasks_file),
                Some(("[]\n", false)),
            ),
        ];
        if let Some(home) = setback_home() {
            targets.push((home, None));
        }

        for (path, file) in targets {
            let result = match file {
                None => self.ensure_dir(&path),
                Some((content, force)) => self.ensure_file(&path, content, force),
            };
            match result {
                Ok(true) => created.push(path.display().to_string()),
                Ok(false) => skipped.push(path.display().to_string()),
                Err(e) => return InitOutput::failure(e, created, skipped),
            }
        }

        InitOutput::success(created, skipped)
    }

    /// Ensure a directory exists.
    /// Returns Ok(true) if created, Ok(false) if already exists.
    fn ensure_dir(&self, path: &Path) -> Result<bool, String> {
        if path.exists() {
            if path.is_dir() {
                return Ok(false);
            }
            return Err(format!("{} exists but is not a directory", path.display()));
        }

        fs::create_dir_all(path)
            .map_err(|e| format!("Failed to create directory {}: {}", path.display(), e))?;

        Ok(true)
    }

    /// Ensure a file exists with the given content.
    /// Returns Ok(true) if created, Ok(false) if already exists.
    fn ensure_file(&self, path: &Path, content: &str, force: bool) -> Result<bool, String> {
        if path.exists() && !force {
            return Ok(false);
        }

        fs::write(path, content)
            .map_err(|e| format!("Failed to write file {}: {}", path.display(), e))?;

        Ok(true)
    }

    /// Format output based on options.
    pub fn format_output(&self, output: &InitOutput, options: &InitOptions) -> String {
        if options.quiet {
            return String::new();
        }

        if options.json {
            serde_json::to_string_pretty(output).unwrap_or_else(|_| "{}".to_string())
        } else {
            self.format_human_readable(output)
        }
    }

    /// Format output as human-readable text.
    fn format_human_readable(&self, output: &InitOutput) -> String {
        let mut lines = Vec::new();

        if !output.success {
            lines.push(format!(
                "Init failed: {}",
                output.error.as_deref().unwrap_or("unknown error")
            ));
            if !output.created.is_empty() {
                lines.push(String::new());
                lines.push("Partially created before failure:".to_string());
                lines.extend(output.created.iter().map(|p| format!("  {}", p)));
            }
            return lines.join("\n") + "\n";
        }

        if output.created.is_empty() {
            return "setback already initialized.\n".to_string();
        }

        lines.push("Created:".to_string());
        lines.extend(output.created.iter().map(|p| format!("  {}", p)));

        if !output.skipped.is_empty() {
            lines.push("Already exists (skipped):".to_string());
            lines.extend(output.skipped.iter().map(|p| format!("  {}", p)));
        }

        lines.push(String::new());
        lines.push("setback initialized.".to_string());

        lines.join("\n") + "\n"
    }
}
