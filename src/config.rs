//! Configuration loading for setback.
//!
//! Configuration follows a precedence chain:
//! 1. Environment variables (highest priority)
//! 2. Project config (`.setback/config.toml`)
//! 3. User config (`~/.setback/config.toml`)
//! 4. Defaults (lowest priority)
//!
//! All configuration is optional. The engine runs with the defaults below
//! when no config exists.

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, SetbackError};

/// Main configuration struct for setback.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Decay aggregation configuration.
    pub decay: DecayConfig,
    /// History ledger configuration.
    pub history: HistoryConfig,
    /// Deferral escalation configuration.
    pub deferral: DeferralConfig,
    /// Correlation analysis configuration.
    pub correlation: CorrelationConfig,
    /// Document vault layout.
    pub vault: VaultConfig,
}

/// Decay aggregation configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DecayConfig {
    /// Per-day multiplicative attenuation applied to an event's weight.
    pub decay_factor: f64,
    /// Trailing window in days; older events contribute nothing.
    pub window_days: u32,
}

impl DecayConfig {
    /// A decay factor must be in (0.0, 1.0) so weights strictly decrease
    /// with age and never go negative.
    pub fn is_valid_decay_factor(value: f64) -> bool {
        value.is_finite() && value > 0.0 && value < 1.0
    }
}

impl Default for DecayConfig {
    fn default() -> Self {
        Self {
            decay_factor: 0.95,
            window_days: 30,
        }
    }
}

/// History ledger configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HistoryConfig {
    /// Maximum number of transitions kept.
    pub cap: usize,
    /// Number of trailing entries inspected by `recent_unique_count`.
    pub recent_window: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            cap: 30,
            recent_window: 5,
        }
    }
}

/// Deferral escalation configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DeferralConfig {
    /// Threshold for ordinary tasks.
    pub threshold_generic: u32,
    /// Threshold for synthesis tasks.
    pub threshold_special: u32,
    /// Markers identifying a synthesis task (matched case-insensitively).
    pub special_markers: Vec<String>,
}

/// Minimum valid deferral threshold.
pub const MIN_DEFERRAL_THRESHOLD: u32 = 1;

impl DeferralConfig {
    /// A threshold of 0 would escalate before the first deferral.
    pub fn is_valid_threshold(value: u32) -> bool {
        value >= MIN_DEFERRAL_THRESHOLD
    }
}

impl Default for DeferralConfig {
    fn default() -> Self {
        Self {
            threshold_generic: 3,
            threshold_special: 2,
            special_markers: vec!["#synthesis".to_string()],
        }
    }
}

/// Correlation analysis configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CorrelationConfig {
    /// Impact at or above which an event counts as high impact.
    pub impact_high_threshold: u8,
    /// Percentage (0-100) a generic pairing must exceed to be reported.
    pub threshold_generic: u8,
    /// Percentage (0-100) a topic/category pairing must exceed.
    pub threshold_paired: u8,
}

impl CorrelationConfig {
    /// Percentages must be in [0, 100].
    pub fn is_valid_percentage(value: u8) -> bool {
        value <= 100
    }

    /// Impact thresholds must be on the 1-5 impact scale.
    pub fn is_valid_impact(value: u8) -> bool {
        (1..=5).contains(&value)
    }
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            impact_high_threshold: 4,
            threshold_generic: 60,
            threshold_paired: 70,
        }
    }
}

/// Where failure events are stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStoreKind {
    /// One note per event under `events_prefix`.
    #[default]
    Documents,
    /// Append-only `.setback/events.log`.
    Jsonl,
}

/// Document vault layout.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct VaultConfig {
    /// Event store backend.
    pub event_store: EventStoreKind,
    /// Path prefix under which failure event documents live.
    pub events_prefix: String,
    /// Path prefix under which monthly report markers live.
    pub reports_prefix: String,
    /// Task list file, relative to the vault root.
    pub tasks_file: String,
    /// Number of archetypes listed in monthly reports.
    pub monthly_top_n: usize,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            event_store: EventStoreKind::Documents,
            events_prefix: "Losses/".to_string(),
            reports_prefix: "Reports/".to_string(),
            tasks_file: "tasks.json".to_string(),
            monthly_top_n: 3,
        }
    }
}

/// Parse an environment value, warning and returning `None` when it is
/// unparseable or rejected by `valid`.
fn parse_env<T>(name: &str, current: &T, valid: impl Fn(&T) -> bool) -> Option<T>
where
    T: std::str::FromStr + std::fmt::Display,
{
    let val = env::var(name).ok()?;
    match val.parse::<T>() {
        Ok(n) if valid(&n) => Some(n),
        Ok(n) => {
            eprintln!(
                "Warning: Invalid {} value '{}'. Using default '{}'.",
                name, n, current
            );
            None
        }
        Err(_) => {
            eprintln!(
                "Warning: Invalid {} value '{}'. Could not parse. Using default '{}'.",
                name, val, current
            );
            None
        }
    }
}

/// Reset `value` to `default` when `valid` rejects it.
fn reject_invalid<T>(name: &str, value: &mut T, default: T, valid: impl Fn(T) -> bool)
where
    T: Copy + std::fmt::Display,
{
    if !valid(*value) {
        eprintln!(
            "Warning: Invalid {} value '{}' in config file. Using default '{}'.",
            name, value, default
        );
        *value = default;
    }
}

impl Config {
    /// Load configuration with full precedence chain from the current
    /// working directory.
    pub fn load() -> Self {
        match env::current_dir() {
            Ok(cwd) => Self::load_from_cwd(&cwd),
            Err(_) => {
                let mut config = Config::default();
                if let Some(user_config) = Self::load_user_config() {
                    config = config.merge(user_config);
                }
                config.validate();
                config.apply_env_overrides();
                config
            }
        }
    }

    /// Load configuration with a specific working directory.
    pub fn load_from_cwd(cwd: &Path) -> Self {
        let mut config = Config::default();

        if let Some(user_config) = Self::load_user_config() {
            config = config.merge(user_config);
        }

        if let Some(project_config) = Self::load_project_config(cwd) {
            config = config.merge(project_config);
        }

        config.validate();
        config.apply_env_overrides();

        config
    }

    /// Load user config from `~/.setback/config.toml`.
    fn load_user_config() -> Option<Config> {
        let home = setback_home()?;
        Self::load_from_file(&home.join("config.toml")).ok()
    }

    /// Load project config from `.setback/config.toml` under the project root.
    fn load_project_config(cwd: &Path) -> Option<Config> {
        Self::load_from_file(&project_dir(cwd).join("config.toml")).ok()
    }

    /// Load config from a specific file path.
    pub fn load_from_file(path: &Path) -> Result<Config> {
        let content = fs::read_to_string(path).map_err(|e| SetbackError::storage(path, e))?;
        let mut config: Config =
            toml::from_str(&content).map_err(|e| SetbackError::config(e.to_string()))?;
        config.validate();
        Ok(config)
    }

    /// Replace out-of-range file values with their defaults, warning for
    /// each. Environment overrides are checked separately as they are read.
    pub fn validate(&mut self) {
        let defaults = Config::default();

        reject_invalid(
            "decay.decay_factor",
            &mut self.decay.decay_factor,
            defaults.decay.decay_factor,
            DecayConfig::is_valid_decay_factor,
        );
        reject_invalid("history.cap", &mut self.history.cap, defaults.history.cap, |v| {
            v >= 1
        });
        reject_invalid(
            "history.recent_window",
            &mut self.history.recent_window,
            defaults.history.recent_window,
            |v| v >= 1,
        );
        reject_invalid(
            "deferral.threshold_generic",
            &mut self.deferral.threshold_generic,
            defaults.deferral.threshold_generic,
            DeferralConfig::is_valid_threshold,
        );
        reject_invalid(
            "deferral.threshold_special",
            &mut self.deferral.threshold_special,
            defaults.deferral.threshold_special,
            DeferralConfig::is_valid_threshold,
        );
        reject_invalid(
            "correlation.impact_high_threshold",
            &mut self.correlation.impact_high_threshold,
            defaults.correlation.impact_high_threshold,
            CorrelationConfig::is_valid_impact,
        );
        reject_invalid(
            "correlation.threshold_generic",
            &mut self.correlation.threshold_generic,
            defaults.correlation.threshold_generic,
            CorrelationConfig::is_valid_percentage,
        );
        reject_invalid(
            "correlation.threshold_paired",
            &mut self.correlation.threshold_paired,
            defaults.correlation.threshold_paired,
            CorrelationConfig::is_valid_percentage,
        );
    }

    /// Apply `SETBACK_*` environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Some(v) = parse_env("SETBACK_DECAY_FACTOR", &self.decay.decay_factor, |v| {
            DecayConfig::is_valid_decay_factor(*v)
        }) {
            self.decay.decay_factor = v;
        }

        if let Some(v) = parse_env("SETBACK_WINDOW_DAYS", &self.decay.window_days, |_| true) {
            self.decay.window_days = v;
        }

        if let Some(v) = parse_env("SETBACK_HISTORY_CAP", &self.history.cap, |v| *v > 0) {
            self.history.cap = v;
        }

        if let Some(v) = parse_env(
            "SETBACK_DEFERRAL_THRESHOLD",
            &self.deferral.threshold_generic,
            |v| DeferralConfig::is_valid_threshold(*v),
        ) {
            self.deferral.threshold_generic = v;
        }

        if let Some(v) = parse_env(
            "SETBACK_DEFERRAL_THRESHOLD_SPECIAL",
            &self.deferral.threshold_special,
            |v| DeferralConfig::is_valid_threshold(*v),
        ) {
            self.deferral.threshold_special = v;
        }

        if let Some(v) = parse_env(
            "SETBACK_IMPACT_HIGH_THRESHOLD",
            &self.correlation.impact_high_threshold,
            |v| CorrelationConfig::is_valid_impact(*v),
        ) {
            self.correlation.impact_high_threshold = v;
        }

        if let Some(v) = parse_env(
            "SETBACK_CORRELATION_THRESHOLD",
            &self.correlation.threshold_generic,
            |v| CorrelationConfig::is_valid_percentage(*v),
        ) {
            self.correlation.threshold_generic = v;
        }

        if let Some(v) = parse_env(
            "SETBACK_CORRELATION_THRESHOLD_PAIRED",
            &self.correlation.threshold_paired,
            |v| CorrelationConfig::is_valid_percentage(*v),
        ) {
            self.correlation.threshold_paired = v;
        }
    }

    /// Merge another config into this one.
    ///
    /// The `other` config takes precedence field by field: every value in
    /// `other` that differs from the default replaces the value in `self`.
    ///
    /// # Limitation
    ///
    /// A higher-precedence file cannot set a value back to its default to
    /// undo a lower-precedence override, because "not set" and "set to the
    /// default" are indistinguishable after deserialization.
    fn merge(mut self, other: Config) -> Self {
        let default_decay = DecayConfig::default();
        if other.decay.decay_factor != default_decay.decay_factor {
            self.decay.decay_factor = other.decay.decay_factor;
        }
        if other.decay.window_days != default_decay.window_days {
            self.decay.window_days = other.decay.window_days;
        }

        let default_history = HistoryConfig::default();
        if other.history.cap != default_history.cap {
            self.history.cap = other.history.cap;
        }
        if other.history.recent_window != default_history.recent_window {
            self.history.recent_window = other.history.recent_window;
        }

        let default_deferral = DeferralConfig::default();
        if other.deferral.threshold_generic != default_deferral.threshold_generic {
            self.deferral.threshold_generic = other.deferral.threshold_generic;
        }
        if other.deferral.threshold_special != default_deferral.threshold_special {
            self.deferral.threshold_special = other.deferral.threshold_special;
        }
        if other.deferral.special_markers != default_deferral.special_markers {
            self.deferral.special_markers = other.deferral.special_markers;
        }

        let default_corr = CorrelationConfig::default();
        if other.correlation.impact_high_threshold != default_corr.impact_high_threshold {
            self.correlation.impact_high_threshold = other.correlation.impact_high_threshold;
        }
        if other.correlation.threshold_generic != default_corr.threshold_generic {
            self.correlation.threshold_generic = other.correlation.threshold_generic;
        }
        if other.correlation.threshold_paired != default_corr.threshold_paired {
            self.correlation.threshold_paired = other.correlation.threshold_paired;
        }

        let default_vault = VaultConfig::default();
        if other.vault.event_store != default_vault.event_store {
            self.vault.event_store = other.vault.event_store;
        }
        if other.vault.events_prefix != default_vault.events_prefix {
            self.vault.events_prefix = other.vault.events_prefix;
        }
        if other.vault.reports_prefix != default_vault.reports_prefix {
            self.vault.reports_prefix = other.vault.reports_prefix;
        }
        if other.vault.tasks_file != default_vault.tasks_file {
            self.vault.tasks_file = other.vault.tasks_file;
        }
        if other.vault.monthly_top_n != default_vault.monthly_top_n {
            self.vault.monthly_top_n = other.vault.monthly_top_n;
        }

        self
    }

    /// Save configuration to the project config file.
    ///
    /// Writes `.setback/config.toml` under `root` via temp file + rename.
    pub fn save_project(&self, root: &Path) -> Result<()> {
        let dir = root.join(".setback");
        if !dir.exists() {
            fs::create_dir_all(&dir).map_err(|e| SetbackError::storage(&dir, e))?;
        }

        let content =
            toml::to_string_pretty(self).map_err(|e| SetbackError::config(e.to_string()))?;

        let temp_path = dir.join(".config.toml.tmp");
        let config_path = dir.join("config.toml");
        fs::write(&temp_path, &content).map_err(|e| SetbackError::storage(&temp_path, e))?;
        fs::rename(&temp_path, &config_path).map_err(|e| SetbackError::storage(&config_path, e))?;

        Ok(())
    }
}

/// Get the setback home directory.
///
/// Checks `SETBACK_HOME` first, then falls back to `~/.setback`.
/// An empty `SETBACK_HOME` is ignored.
pub fn setback_home() -> Option<PathBuf> {
    if let Ok(home) = env::var("SETBACK_HOME") {
        if home.is_empty() {
            tracing::warn!("SETBACK_HOME is empty, using default");
        } else {
            let path = PathBuf::from(&home);
            if path.is_absolute() {
                return Some(path);
            }
            if let Ok(canonical) = path.canonicalize() {
                return Some(canonical);
            }
            tracing::warn!("SETBACK_HOME is relative and doesn't exist, using as-is");
            return Some(path);
        }
    }

    dirs::home_dir().map(|home| home.join(".setback"))
}

/// Find the project root (the vault) for a working directory.
///
/// The nearest ancestor containing a `.setback/` directory wins; otherwise
/// the working directory itself is the root.
pub fn find_project_root(cwd: &Path) -> PathBuf {
    for ancestor in cwd.ancestors() {
        if ancestor.join(".setback").is_dir() {
            return ancestor.to_path_buf();
        }
    }
    cwd.to_path_buf()
}

/// Get the project `.setback/` directory.
pub fn project_dir(cwd: &Path) -> PathBuf {
    find_project_root(cwd).join(".setback")
}

/// Persisted engine state path: `<root>/.setback/state.json`.
pub fn project_state_path(cwd: &Path) -> PathBuf {
    project_dir(cwd).join("state.json")
}

/// Failure event log path: `<root>/.setback/events.log`.
pub fn project_events_log_path(cwd: &Path) -> PathBuf {
    project_dir(cwd).join("events.log")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert!((config.decay.decay_factor - 0.95).abs() < f64::EPSILON);
        assert_eq!(config.decay.window_days, 30);
        assert_eq!(config.history.cap, 30);
        assert_eq!(config.history.recent_window, 5);
        assert_eq!(config.deferral.threshold_generic, 3);
        assert_eq!(config.deferral.threshold_special, 2);
        assert_eq!(config.deferral.special_markers, vec!["#synthesis"]);
        assert_eq!(config.correlation.impact_high_threshold, 4);
        assert_eq!(config.correlation.threshold_generic, 60);
        assert_eq!(config.correlation.threshold_paired, 70);
        assert_eq!(config.vault.events_prefix, "Losses/");
        assert_eq!(config.vault.monthly_top_n, 3);
        assert_eq!(config.vault.event_store, EventStoreKind::Documents);
    }

    #[test]
    fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("config.toml");

        fs::write(
            &config_path,
            r#"
[decay]
decay_factor = 0.9

[deferral]
threshold_generic = 5

[vault]
event_store = "jsonl"
"#,
        )
        .unwrap();

        let config = Config::load_from_file(&config_path).unwrap();
        assert_eq!(config.vault.event_store, EventStoreKind::Jsonl);

        assert!((config.decay.decay_factor - 0.9).abs() < f64::EPSILON);
        assert_eq!(config.deferral.threshold_generic, 5);
        assert_eq!(config.decay.window_days, 30);
        assert_eq!(config.deferral.threshold_special, 2);
    }

    #[test]
    fn test_load_from_file_missing() {
        assert!(Config::load_from_file(Path::new("/nonexistent/config.toml")).is_err());
    }

    #[test]
    fn test_load_from_file_invalid_toml() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("config.toml");
        fs::write(&config_path, "this is not valid toml [[[").unwrap();

        assert!(Config::load_from_file(&config_path).is_err());
    }

    #[test]
    #[serial]
    fn test_project_config_precedence() {
        let dir = TempDir::new().unwrap();
        let setback_dir = dir.path().join(".setback");
        fs::create_dir_all(&setback_dir).unwrap();
        fs::write(
            setback_dir.join("config.toml"),
            "[history]\ncap = 12\n",
        )
        .unwrap();

        let config = Config::load_from_cwd(dir.path());

        assert_eq!(config.history.cap, 12);
        assert_eq!(config.history.recent_window, 5);
    }

    #[test]
    #[serial]
    fn test_env_var_precedence() {
        let dir = TempDir::new().unwrap();
        let setback_dir = dir.path().join(".setback");
        fs::create_dir_all(&setback_dir).unwrap();
        fs::write(
            setback_dir.join("config.toml"),
            "[deferral]\nthreshold_generic = 4\n",
        )
        .unwrap();

        env::set_var("SETBACK_DEFERRAL_THRESHOLD", "6");
        let config = Config::load_from_cwd(dir.path());
        env::remove_var("SETBACK_DEFERRAL_THRESHOLD");

        assert_eq!(config.deferral.threshold_generic, 6);
    }

    #[test]
    #[serial]
    fn test_env_var_overrides() {
        env::set_var("SETBACK_DECAY_FACTOR", "0.8");
        env::set_var("SETBACK_WINDOW_DAYS", "14");
        env::set_var("SETBACK_HISTORY_CAP", "10");
        env::set_var("SETBACK_DEFERRAL_THRESHOLD_SPECIAL", "4");
        env::set_var("SETBACK_IMPACT_HIGH_THRESHOLD", "5");
        env::set_var("SETBACK_CORRELATION_THRESHOLD", "50");
        env::set_var("SETBACK_CORRELATION_THRESHOLD_PAIRED", "90");

        let mut config = Config::default();
        config.apply_env_overrides();

        env::remove_var("SETBACK_DECAY_FACTOR");
        env::remove_var("SETBACK_WINDOW_DAYS");
        env::remove_var("SETBACK_HISTORY_CAP");
        env::remove_var("SETBACK_DEFERRAL_THRESHOLD_SPECIAL");
        env::remove_var("SETBACK_IMPACT_HIGH_THRESHOLD");
        env::remove_var("SETBACK_CORRELATION_THRESHOLD");
        env::remove_var("SETBACK_CORRELATION_THRESHOLD_PAIRED");

        assert!((config.decay.decay_factor - 0.8).abs() < f64::EPSILON);
        assert_eq!(config.decay.window_days, 14);
        assert_eq!(config.history.cap, 10);
        assert_eq!(config.deferral.threshold_special, 4);
        assert_eq!(config.correlation.impact_high_threshold, 5);
        assert_eq!(config.correlation.threshold_generic, 50);
        assert_eq!(config.correlation.threshold_paired, 90);
    }

    #[test]
    #[serial]
    fn test_env_var_invalid_values_ignored() {
        env::set_var("SETBACK_DECAY_FACTOR", "1.5");
        env::set_var("SETBACK_DEFERRAL_THRESHOLD", "0");
        env::set_var("SETBACK_CORRELATION_THRESHOLD", "not-a-number");

        let mut config = Config::default();
        config.apply_env_overrides();

        env::remove_var("SETBACK_DECAY_FACTOR");
        env::remove_var("SETBACK_DEFERRAL_THRESHOLD");
        env::remove_var("SETBACK_CORRELATION_THRESHOLD");

        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_is_valid_decay_factor() {
        assert!(DecayConfig::is_valid_decay_factor(0.95));
        assert!(!DecayConfig::is_valid_decay_factor(1.0));
        assert!(!DecayConfig::is_valid_decay_factor(1.5));
        assert!(!DecayConfig::is_valid_decay_factor(0.0));
        assert!(!DecayConfig::is_valid_decay_factor(-0.5));
        assert!(!DecayConfig::is_valid_decay_factor(f64::NAN));
    }

    #[test]
    fn test_out_of_range_file_values_fall_back() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("config.toml");
        fs::write(
            &config_path,
            "[decay]\ndecay_factor = -0.5\n\n[history]\ncap = 0\n\n[correlation]\nthreshold_paired = 150\n",
        )
        .unwrap();

        let config = Config::load_from_file(&config_path).unwrap();

        assert_eq!(config, Config::default());
        let w = crate::stats::decay::weight(
            chrono::Utc::now() - chrono::Duration::days(3),
            chrono::Utc::now(),
            config.decay.decay_factor,
        );
        assert!(w > 0.0 && w < 1.0);
    }

    #[test]
    #[serial]
    fn test_invalid_project_value_keeps_lower_layer() {
        let home = TempDir::new().unwrap();
        fs::write(home.path().join("config.toml"), "[decay]\ndecay_factor = 0.8\n").unwrap();
        let project = TempDir::new().unwrap();
        let setback_dir = project.path().join(".setback");
        fs::create_dir_all(&setback_dir).unwrap();
        fs::write(setback_dir.join("config.toml"), "[decay]\ndecay_factor = 1.0\n").unwrap();

        env::set_var("SETBACK_HOME", home.path());
        let config = Config::load_from_cwd(project.path());
        env::remove_var("SETBACK_HOME");

        assert!((config.decay.decay_factor - 0.8).abs() < f64::EPSILON);
    }

    #[test]
    fn test_merge_configs() {
        let base = Config::default();
        let other = Config {
            deferral: DeferralConfig {
                threshold_generic: 7,
                ..DeferralConfig::default()
            },
            ..Config::default()
        };

        let merged = base.merge(other);

        assert_eq!(merged.deferral.threshold_generic, 7);
        assert_eq!(merged.deferral.threshold_special, 2);
        assert_eq!(merged.history.cap, 30);
    }

    #[test]
    fn test_save_project_round_trips() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.decay.window_days = 45;

        config.save_project(dir.path()).unwrap();

        let loaded = Config::load_from_file(&dir.path().join(".setback/config.toml")).unwrap();
        assert_eq!(loaded.decay.window_days, 45);
        assert!(!dir.path().join(".setback/.config.toml.tmp").exists());
    }

    #[test]
    #[serial]
    fn test_setback_home_with_env() {
        let dir = TempDir::new().unwrap();
        env::set_var("SETBACK_HOME", dir.path().to_str().unwrap());

        let home = setback_home().unwrap();
        env::remove_var("SETBACK_HOME");

        assert_eq!(home, dir.path());
    }

    #[test]
    fn test_find_project_root_in_parent() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join(".setback")).unwrap();
        let nested = dir.path().join("notes").join("daily");
        fs::create_dir_all(&nested).unwrap();

        assert_eq!(find_project_root(&nested), dir.path());
        assert_eq!(
            project_state_path(&nested),
            dir.path().join(".setback").join("state.json")
        );
    }

    #[test]
    fn test_find_project_root_fallback_to_cwd() {
        let dir = TempDir::new().unwrap();
        assert_eq!(find_project_root(dir.path()), dir.path());
    }
}
