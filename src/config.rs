//! Application configuration.
//!
//! The configuration is loaded from a JSON file
//! (`$XDG_CONFIG_HOME/hyprpreset/config.json`).  Every tuning value used by
//! matching, restoring and screen clamping lives here as a named field, so
//! the heuristics can be recalibrated without touching control flow.
//!
//! # Example
//!
//! ```json
//! {
//!   "matching": { "index_bonus": 30, "main_window_bonus": 20 },
//!   "restore": { "launch_wait_ms": 1500 },
//!   "screen": { "visible_margin": 200.0 },
//!   "storage": { "path": "/home/me/.local/share/hyprpreset/presets.json" }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration.
///
/// Every field is optional: a minimal `{}` file is valid and all sections
/// fall back to their compiled-in defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Window matching and capture thresholds.
    #[serde(default)]
    pub matching: MatchConfig,

    /// Restore state-machine delays and limits.
    #[serde(default)]
    pub restore: RestoreConfig,

    /// Screen clamping and full-screen detection.
    #[serde(default)]
    pub screen: ScreenConfig,

    /// Where presets are persisted.
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Window matching and capture thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    /// Score added when a live window's enumeration index equals the
    /// descriptor's stored `window_index`.
    pub index_bonus: u32,
    /// Score added when the live window is the application's main window.
    pub main_window_bonus: u32,
    /// Windows smaller than this in either dimension are chrome
    /// (toolbars, palettes) and are never captured or matched.
    pub min_window_size: f64,
    /// Two windows of the same application whose origins are this close
    /// are considered the same window when adding to a preset.
    pub duplicate_tolerance: f64,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            index_bonus: 30,
            main_window_bonus: 20,
            min_window_size: 100.0,
            duplicate_tolerance: 10.0,
        }
    }
}

/// Restore state-machine delays and limits.
///
/// All durations are in **milliseconds** and act as upper bounds: where a
/// readiness condition can be observed, the restorer polls every
/// `poll_interval_ms` and resumes as soon as it holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RestoreConfig {
    /// Wait for the first window after launching an application.
    pub launch_wait_ms: u64,
    /// Settle time after activating an already-running application.
    pub activate_wait_ms: u64,
    /// Retry ladder step 0: unhide + activate.
    pub retry_activate_wait_ms: u64,
    /// Retry ladder step 1: re-open the application bundle.
    pub retry_reopen_wait_ms: u64,
    /// Retry ladder step 2: platform "reopen" request.
    pub retry_script_wait_ms: u64,
    /// Settle time after each synthesized new window.
    pub new_window_settle_ms: u64,
    /// Pause between activating an app and asking it to leave full screen.
    pub full_screen_activate_ms: u64,
    /// Full-screen exit animation.
    pub full_screen_exit_ms: u64,
    /// Unminimize animation.
    pub unminimize_ms: u64,
    /// Head start given to opened launch items before positioning begins.
    pub launch_items_delay_ms: u64,
    /// Granularity of readiness polling.
    pub poll_interval_ms: u64,
    /// Upper bound on synthesized windows per application per apply.
    pub max_new_windows: usize,
}

impl Default for RestoreConfig {
    fn default() -> Self {
        Self {
            launch_wait_ms: 1000,
            activate_wait_ms: 300,
            retry_activate_wait_ms: 300,
            retry_reopen_wait_ms: 500,
            retry_script_wait_ms: 500,
            new_window_settle_ms: 400,
            full_screen_activate_ms: 200,
            full_screen_exit_ms: 1000,
            unminimize_ms: 300,
            launch_items_delay_ms: 500,
            poll_interval_ms: 100,
            max_new_windows: 8,
        }
    }
}

/// Convert a millisecond config value into a [`Duration`].
pub fn ms(value: u64) -> Duration {
    Duration::from_millis(value)
}

/// Screen clamping and full-screen detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenConfig {
    /// How much of a window (from its origin towards the trailing edges)
    /// must land on some screen for its saved frame to be kept.
    pub visible_margin: f64,
    /// Offset from the main screen's usable top-left when relocating.
    pub relocate_inset: f64,
    /// A relocated window is shrunk to the usable area minus this margin.
    pub relocate_margin: f64,
    /// Slack when comparing a window frame against a screen frame to detect
    /// full screen.
    pub full_screen_tolerance: f64,
}

impl Default for ScreenConfig {
    fn default() -> Self {
        Self {
            visible_margin: 200.0,
            relocate_inset: 50.0,
            relocate_margin: 100.0,
            full_screen_tolerance: 2.0,
        }
    }
}

/// Where presets are persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Override for the preset file.  Defaults to
    /// `$XDG_DATA_HOME/hyprpreset/presets.json`.
    pub path: Option<PathBuf>,
}

impl StorageConfig {
    /// The preset file to use.
    pub fn resolve(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("hyprpreset")
                .join("presets.json")
        })
    }
}

impl Config {
    /// Load configuration from a JSON file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError(format!("failed to read {}: {}", path.display(), e)))?;
        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| ConfigError(format!("failed to parse {}: {}", path.display(), e)))?;
        Ok(config)
    }
}

/// Error from loading or parsing a configuration file.
#[derive(Debug, thiserror::Error)]
#[error("config error: {0}")]
pub struct ConfigError(String);
