//! Structured logger with per-dependency summary collection.
use std::path::PathBuf;
use std::sync::Mutex;

use super::types::{DepEntry, DepStatus, Log};
use super::utils::log_file_path;

/// Implement the display methods of [`Log`] by delegating to inherent methods
/// of the same name on the implementing type.
macro_rules! forward_log_methods {
    ($($method:ident),+ $(,)?) => {
        $(
            fn $method(&self, msg: &str) {
                self.$method(msg);
            }
        )+
    };
}

/// Structured logger with summary collection.
///
/// Every message also reaches the persistent log file at
/// `$XDG_CACHE_HOME/rig/<command>.log` (default `~/.cache/rig/<command>.log`)
/// through the file layer installed by
/// [`init_subscriber`](super::subscriber::init_subscriber).
#[derive(Debug)]
pub struct Logger {
    deps: Mutex<Vec<DepEntry>>,
    log_file: Option<PathBuf>,
}

impl Logger {
    /// Create a new logger.
    ///
    /// Stores the log file path for display in the summary; the file itself
    /// is written by the subscriber's file layer.
    #[must_use]
    pub fn new(command: &str) -> Self {
        Self {
            deps: Mutex::new(Vec::new()),
            log_file: log_file_path(command),
        }
    }

    /// Return the log file path, if available.
    #[must_use]
    pub const fn log_path(&self) -> Option<&PathBuf> {
        self.log_file.as_ref()
    }

    /// Return a clone of all recorded dependency entries.
    #[must_use]
    pub fn dep_entries(&self) -> Vec<DepEntry> {
        self.deps.lock().map_or_else(|_| vec![], |g| g.clone())
    }

    /// Log an error message.
    pub fn error(&self, msg: &str) {
        tracing::error!("{msg}");
    }

    /// Log a warning message.
    pub fn warn(&self, msg: &str) {
        tracing::warn!("{msg}");
    }

    /// Log a stage header (major section).
    pub fn stage(&self, msg: &str) {
        tracing::info!(target: "rig::stage", "{msg}");
    }

    /// Log an informational message.
    pub fn info(&self, msg: &str) {
        tracing::info!("{msg}");
    }

    /// Log a debug message (suppressed on console unless verbose; always
    /// written to the log file).
    pub fn debug(&self, msg: &str) {
        tracing::debug!("{msg}");
    }

    /// Record a dependency result for the summary.
    pub fn record_dep(&self, name: &str, status: DepStatus, message: Option<&str>) {
        if let Ok(mut guard) = self.deps.lock() {
            guard.push(DepEntry {
                name: name.to_string(),
                status,
                message: message.map(String::from),
            });
        }
    }

    /// Count dependencies that ended unmet or failed.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.deps.lock().map_or(0, |guard| {
            guard
                .iter()
                .filter(|d| d.status != DepStatus::Met)
                .count()
        })
    }

    /// Print the summary of all recorded dependencies.
    #[allow(clippy::print_stdout)]
    pub fn print_summary(&self) {
        let deps = match self.deps.lock() {
            Ok(guard) => guard.clone(),
            Err(_) => return,
        };
        if deps.is_empty() {
            return;
        }

        println!();
        self.stage("Summary");

        let mut met = 0u32;
        let mut unmet = 0u32;
        let mut failed = 0u32;

        for dep in &deps {
            let (icon, color) = match dep.status {
                DepStatus::Met => {
                    met += 1;
                    ("✓", "\x1b[32m")
                }
                DepStatus::Unmet => {
                    unmet += 1;
                    ("○", "\x1b[33m")
                }
                DepStatus::Failed => {
                    failed += 1;
                    ("✗", "\x1b[31m")
                }
            };

            let suffix = dep
                .message
                .as_ref()
                .map_or_else(String::new, |msg| format!(" ({msg})"));

            self.info(&format!("{color}{icon} {}{suffix}\x1b[0m", dep.name));
        }

        println!();
        let total = met + unmet + failed;
        self.info(&format!(
            "{total} deps: \x1b[32m{met} met\x1b[0m, \x1b[33m{unmet} unmet\x1b[0m, \x1b[31m{failed} failed\x1b[0m"
        ));

        if let Some(path) = &self.log_file {
            self.info(&format!("\x1b[2mlog: {}\x1b[0m", path.display()));
        }
    }
}

impl Log for Logger {
    forward_log_methods!(stage, info, debug, warn, error);

    fn record_dep(&self, name: &str, status: DepStatus, message: Option<&str>) {
        self.record_dep(name, status, message);
    }
}
