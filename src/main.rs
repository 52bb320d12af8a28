//! setback - failure memory and habit-correction engine
//!
//! CLI entry point with global panic handler.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use setback::cli::open_engine;
use setback::config::{setback_home, Config};
use setback::core::{ConsoleNotifier, EventDraft, Notifier, SilentNotifier};
use setback::error::exit_codes;
use setback::stats::PairingKind;
use setback::util::read_to_string_limited;

// =============================================================================
// CLI Definition
// =============================================================================

/// setback - remember how things go wrong, and notice when they keep going
/// wrong the same way
#[derive(Parser)]
#[command(name = "setback")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log a failure event from a JSON draft (stdin or --file)
    Log {
        /// Read the draft from a file instead of stdin
        #[arg(long, short)]
        file: Option<PathBuf>,
        /// Complete the pending context queued under this key
        #[arg(long)]
        pending: Option<String>,
        /// Output as JSON
        #[arg(long, short)]
        json: bool,
        /// Suppress output
        #[arg(long, short)]
        quiet: bool,
    },

    /// Queue a partial draft to finish later
    Later {
        /// Read the draft from a file instead of stdin
        #[arg(long, short)]
        file: Option<PathBuf>,
        /// Output as JSON
        #[arg(long, short)]
        json: bool,
        /// Suppress output
        #[arg(long, short)]
        quiet: bool,
    },

    /// List queued contexts
    Pending {
        /// Output as JSON
        #[arg(long, short)]
        json: bool,
        /// Suppress output
        #[arg(long, short)]
        quiet: bool,
    },

    /// Record that a task was put off again
    Defer {
        /// Task id or document path
        task_ref: String,
        /// Answer yes to the escalation prompt
        #[arg(long, short, conflicts_with = "no_prompt")]
        yes: bool,
        /// Never prompt; escalation is reported only
        #[arg(long)]
        no_prompt: bool,
        /// Output as JSON
        #[arg(long, short)]
        json: bool,
        /// Suppress output
        #[arg(long, short)]
        quiet: bool,
    },

    /// Clear the deferral count of a task
    Resolve {
        /// Task id or document path
        task_ref: String,
        /// Output as JSON
        #[arg(long, short)]
        json: bool,
        /// Suppress output
        #[arg(long, short)]
        quiet: bool,
    },

    /// Add a tag to a document or task
    Tag {
        /// Document path or task id
        target: String,
        /// Tag to add
        tag: String,
        /// Output as JSON
        #[arg(long, short)]
        json: bool,
        /// Suppress output
        #[arg(long, short)]
        quiet: bool,
    },

    /// Show scores, the dominant pattern, and open deferrals
    Status {
        /// Number of scores to show (0 = all)
        #[arg(long, default_value_t = 0)]
        top: usize,
        /// Output as JSON
        #[arg(long, short)]
        json: bool,
        /// Suppress output
        #[arg(long, short)]
        quiet: bool,
    },

    /// Report correlations above threshold
    Correlate {
        /// Only report one pairing
        #[arg(long, value_enum)]
        kind: Option<PairingArg>,
        /// Output as JSON
        #[arg(long, short)]
        json: bool,
        /// Suppress output
        #[arg(long, short)]
        quiet: bool,
    },

    /// Run the weekly reset or the monthly report
    Reset {
        #[arg(value_enum)]
        period: ResetPeriod,
        /// Output as JSON
        #[arg(long, short)]
        json: bool,
        /// Suppress output
        #[arg(long, short)]
        quiet: bool,
    },

    /// Initialize a vault in the current directory
    Init {
        /// Output as JSON
        #[arg(long, short)]
        json: bool,
        /// Suppress output
        #[arg(long, short)]
        quiet: bool,
        /// Overwrite an existing config file
        #[arg(long, short)]
        force: bool,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum PairingArg {
    ArchetypeEnergy,
    ArchetypeEmotion,
    CategoryImpact,
    TopicCategory,
}

impl From<PairingArg> for PairingKind {
    fn from(arg: PairingArg) -> Self {
        match arg {
            PairingArg::ArchetypeEnergy => PairingKind::ArchetypeEnergy,
            PairingArg::ArchetypeEmotion => PairingKind::ArchetypeEmotion,
            PairingArg::CategoryImpact => PairingKind::CategoryImpact,
            PairingArg::TopicCategory => PairingKind::TopicCategory,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ResetPeriod {
    Weekly,
    Monthly,
}

// =============================================================================
// Main Entry Point
// =============================================================================

fn main() -> ExitCode {
    setup_panic_handler();

    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("setback error: {}", e);
            ExitCode::from(exit_codes::ERROR as u8)
        }
    }
}

/// Set up the global panic handler.
///
/// On panic, logs to ~/.setback/crash.log and exits with code 3.
fn setup_panic_handler() {
    std::panic::set_hook(Box::new(|info| {
        eprintln!("setback panic: {}", info);

        if let Some(home) = setback_home() {
            let crash_log = home.join("crash.log");
            if let Ok(mut file) = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&crash_log)
            {
                let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
                // Already panicking; nothing left to report a write error to
                let _ = writeln!(file, "[{}] {}", timestamp, info);
            }
        }

        std::process::exit(exit_codes::CRASH);
    }));
}

/// Install the stderr log subscriber.
///
/// `SETBACK_LOG` takes an env-filter directive; `--verbose` forces debug.
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env("SETBACK_LOG").unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

/// Run the CLI and return the exit code.
fn run() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let cwd = std::env::current_dir()?;

    match cli.command {
        Commands::Log {
            file,
            pending,
            json,
            quiet,
        } => run_log(file.as_deref(), pending.as_deref(), json, quiet, &cwd),
        Commands::Later { file, json, quiet } => run_later(file.as_deref(), json, quiet, &cwd),
        Commands::Pending { json, quiet } => run_pending(json, quiet, &cwd),
        Commands::Defer {
            task_ref,
            yes,
            no_prompt,
            json,
            quiet,
        } => run_defer(&task_ref, yes, no_prompt, json, quiet, &cwd),
        Commands::Resolve {
            task_ref,
            json,
            quiet,
        } => run_resolve(&task_ref, json, quiet, &cwd),
        Commands::Tag {
            target,
            tag,
            json,
            quiet,
        } => run_tag(&target, &tag, json, quiet, &cwd),
        Commands::Status { top, json, quiet } => run_status(top, json, quiet, &cwd),
        Commands::Correlate { kind, json, quiet } => run_correlate(kind, json, quiet, &cwd),
        Commands::Reset {
            period,
            json,
            quiet,
        } => run_reset(period, json, quiet, &cwd),
        Commands::Init { json, quiet, force } => run_init(json, quiet, force, &cwd),
    }
}

// =============================================================================
// Command Implementations
// =============================================================================

/// Convert success boolean to exit code.
fn success_to_exit_code(success: bool) -> ExitCode {
    if success {
        ExitCode::from(exit_codes::OK as u8)
    } else {
        ExitCode::from(exit_codes::ERROR as u8)
    }
}

fn print_output(formatted: &str) {
    if !formatted.is_empty() {
        print!("{}", formatted);
    }
}

/// Read a JSON draft from `file`, or stdin when no file is given.
fn read_draft(file: Option<&Path>) -> Result<EventDraft, Box<dyn std::error::Error>> {
    use setback::cli::log::parse_draft;

    let input = match file {
        Some(path) => read_to_string_limited(path)?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };
    Ok(parse_draft(&input)?)
}

fn run_log(
    file: Option<&Path>,
    pending: Option<&str>,
    json: bool,
    quiet: bool,
    cwd: &Path,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    use setback::cli::log::{LogCommand, LogOptions};

    let draft = read_draft(file)?;
    let mut cmd = LogCommand::new(open_engine(cwd, Config::load_from_cwd(cwd)));
    let options = LogOptions { json, quiet };

    let now = Utc::now();
    let output = match pending {
        Some(key) => cmd.run_pending(key, draft, now),
        None => cmd.run(draft, now),
    };
    print_output(&cmd.format_output(&output, &options));

    Ok(success_to_exit_code(output.success))
}

fn run_later(
    file: Option<&Path>,
    json: bool,
    quiet: bool,
    cwd: &Path,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    use setback::cli::pending::{PendingCommand, PendingOptions};

    let draft = read_draft(file)?;
    let mut cmd = PendingCommand::new(open_engine(cwd, Config::load_from_cwd(cwd)));
    let options = PendingOptions { json, quiet };

    let output = cmd.queue(draft);
    print_output(&cmd.format_output(&output, &options));

    Ok(success_to_exit_code(output.success))
}

fn run_pending(json: bool, quiet: bool, cwd: &Path) -> Result<ExitCode, Box<dyn std::error::Error>> {
    use setback::cli::pending::{PendingCommand, PendingOptions};

    let cmd = PendingCommand::new(open_engine(cwd, Config::load_from_cwd(cwd)));
    let options = PendingOptions { json, quiet };

    let output = cmd.list();
    print_output(&cmd.format_output(&output, &options));

    Ok(success_to_exit_code(output.success))
}

fn run_defer(
    task_ref: &str,
    yes: bool,
    no_prompt: bool,
    json: bool,
    quiet: bool,
    cwd: &Path,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    use setback::cli::defer::{DeferCommand, DeferOptions};

    let mut cmd = DeferCommand::new(open_engine(cwd, Config::load_from_cwd(cwd)));
    let options = DeferOptions { json, quiet };

    let console = ConsoleNotifier::new(yes);
    let silent = SilentNotifier::new(false);
    let notifier: &dyn Notifier = if no_prompt { &silent } else { &console };

    let output = cmd.defer(task_ref, notifier);
    print_output(&cmd.format_output(&output, &options));

    if output.success && output.escalated {
        return Ok(ExitCode::from(exit_codes::ESCALATED as u8));
    }
    Ok(success_to_exit_code(output.success))
}

fn run_resolve(
    task_ref: &str,
    json: bool,
    quiet: bool,
    cwd: &Path,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    use setback::cli::defer::{DeferCommand, DeferOptions};

    let mut cmd = DeferCommand::new(open_engine(cwd, Config::load_from_cwd(cwd)));
    let options = DeferOptions { json, quiet };

    let output = cmd.resolve(task_ref);
    print_output(&cmd.format_output(&output, &options));

    Ok(success_to_exit_code(output.success))
}

fn run_tag(
    target: &str,
    tag: &str,
    json: bool,
    quiet: bool,
    cwd: &Path,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    use setback::cli::tag::{TagCommand, TagOptions};

    let cmd = TagCommand::new(open_engine(cwd, Config::load_from_cwd(cwd)));
    let options = TagOptions { json, quiet };

    let output = cmd.run(target, tag);
    print_output(&cmd.format_output(&output, &options));

    Ok(success_to_exit_code(output.success))
}

fn run_status(
    top: usize,
    json: bool,
    quiet: bool,
    cwd: &Path,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    use setback::cli::status::{StatusCommand, StatusOptions};

    let mut cmd = StatusCommand::new(open_engine(cwd, Config::load_from_cwd(cwd)));
    let options = StatusOptions { json, quiet, top };

    let output = cmd.run(Utc::now());
    print_output(&cmd.format_output(&output, &options));

    Ok(success_to_exit_code(output.success))
}

fn run_correlate(
    kind: Option<PairingArg>,
    json: bool,
    quiet: bool,
    cwd: &Path,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    use setback::cli::correlate::{CorrelateCommand, CorrelateOptions};

    let cmd = CorrelateCommand::new(open_engine(cwd, Config::load_from_cwd(cwd)));
    let options = CorrelateOptions {
        json,
        quiet,
        kind: kind.map(PairingKind::from),
    };

    let output = cmd.run(&options);
    print_output(&cmd.format_output(&output, &options));

    Ok(success_to_exit_code(output.success))
}

fn run_reset(
    period: ResetPeriod,
    json: bool,
    quiet: bool,
    cwd: &Path,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    use setback::cli::reset::{ResetCommand, ResetOptions, StateArchive};

    let mut cmd = ResetCommand::new(open_engine(cwd, Config::load_from_cwd(cwd)));
    let options = ResetOptions { json, quiet };

    let now = Utc::now();
    let output = match period {
        ResetPeriod::Weekly => {
            let archive = StateArchive::for_project(cwd, now.date_naive());
            cmd.weekly(&archive)
        }
        ResetPeriod::Monthly => cmd.monthly(now),
    };
    print_output(&cmd.format_output(&output, &options));

    Ok(success_to_exit_code(output.success))
}

fn run_init(
    json: bool,
    quiet: bool,
    force: bool,
    cwd: &Path,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    use setback::cli::init::{InitCommand, InitOptions};

    let cmd = InitCommand::new(cwd.to_string_lossy());
    let options = InitOptions { json, quiet, force };

    let output = cmd.run(&options);
    print_output(&cmd.format_output(&output, &options));

    Ok(success_to_exit_code(output.success))
}

// =============================================================================
// Tests
// =============================================================================
