//! Engine settings loaded from `rig.toml`.
//!
//! ```toml
//! [paths]
//! prefix = "~/.rig"
//!
//! [report]
//! enabled = true
//! collector = "https://rig.example.org/runs.json"
//! open_timeout_secs = 5
//! read_timeout_secs = 5
//! retry_pause_ms = 1000
//! flush_timeout_secs = 30
//! ```
//!
//! Every key is optional; a missing file yields the defaults above.
pub mod toml_loader;

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// Default collector endpoint for run reports.
pub const DEFAULT_COLLECTOR: &str = "https://rig.example.org/runs.json";

/// All settings.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// State locations.
    pub paths: PathSettings,
    /// Run-report delivery.
    pub report: ReportSettings,
}

/// Where rig keeps its state.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct PathSettings {
    /// Root for saved vars and queued reports; `~` is expanded.
    pub prefix: String,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            prefix: "~/.rig".to_string(),
        }
    }
}

/// Run-report delivery.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ReportSettings {
    /// Queue outcomes of public dependencies at all.
    pub enabled: bool,
    /// Collector endpoint.
    pub collector: String,
    /// Connect timeout for the collector.
    pub open_timeout_secs: u64,
    /// Read timeout for the collector.
    pub read_timeout_secs: u64,
    /// Pause after a transient delivery failure.
    pub retry_pause_ms: u64,
    /// Upper bound on one `reports flush`.
    pub flush_timeout_secs: u64,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            collector: DEFAULT_COLLECTOR.to_string(),
            open_timeout_secs: 5,
            read_timeout_secs: 5,
            retry_pause_ms: 1000,
            flush_timeout_secs: 30,
        }
    }
}

impl ReportSettings {
    /// [`Self::open_timeout_secs`] as a duration.
    #[must_use]
    pub const fn open_timeout(&self) -> Duration {
        Duration::from_secs(self.open_timeout_secs)
    }

    /// [`Self::read_timeout_secs`] as a duration.
    #[must_use]
    pub const fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    /// [`Self::retry_pause_ms`] as a duration.
    #[must_use]
    pub const fn retry_pause(&self) -> Duration {
        Duration::from_millis(self.retry_pause_ms)
    }

    /// [`Self::flush_timeout_secs`] as a duration.
    #[must_use]
    pub const fn flush_timeout(&self) -> Duration {
        Duration::from_secs(self.flush_timeout_secs)
    }
}

impl Settings {
    /// Load settings from `path`, falling back to defaults when it is absent.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the file cannot be read or parsed, or
    /// the collector is not an `http(s)` URL.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let settings: Self = toml_loader::load_config(path)?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::InvalidSetting {
            key: "report.collector".to_string(),
            message,
        };
        let url = url::Url::parse(&self.report.collector).map_err(|e| invalid(e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
        }
        Ok(())
    }

    /// `$XDG_CONFIG_HOME/rig/rig.toml`, else `~/.config/rig/rig.toml`.
    #[must_use]
    pub fn default_path() -> PathBuf {
        std::env::var("XDG_CONFIG_HOME")
            .map_or_else(|_| home_dir().join(".config"), PathBuf::from)
            .join("rig")
            .join("rig.toml")
    }

    /// The state prefix with `~` expanded.
    #[must_use]
    pub fn prefix(&self) -> PathBuf {
        expand_home(&self.paths.prefix, &home_dir())
    }

    /// Saved-variable snapshot.
    #[must_use]
    pub fn vars_file(&self) -> PathBuf {
        self.prefix().join("vars").join("saved.json")
    }

    /// Directory of queued run reports.
    #[must_use]
    pub fn reports_dir(&self) -> PathBuf {
        self.prefix().join("runs")
    }
}

/// The current user's home directory, or `.` when it cannot be found.
#[must_use]
pub fn home_dir() -> PathBuf {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map_or_else(|_| PathBuf::from("."), PathBuf::from)
}

/// Replace a leading `~` in `path` with `home`.
#[must_use]
pub fn expand_home(path: &str, home: &Path) -> PathBuf {
    match path.strip_prefix('~') {
        Some("") => home.to_path_buf(),
        Some(rest) => rest
            .strip_prefix(['/', '\\'])
            .map_or_else(|| PathBuf::from(path), |tail| home.join(tail)),
        None => PathBuf::from(path),
    }
}
