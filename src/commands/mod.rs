//! Top-level subcommand orchestration.
pub mod gem;
pub mod host;
pub mod reports;
pub mod vars;
pub mod version;

use std::sync::Arc;

use anyhow::{Context as _, Result};

use crate::cli::GlobalOpts;
use crate::config::Settings;
use crate::logging::Logger;
use crate::run::RunContext;

/// Load settings and build the run context shared by every command.
///
/// # Errors
///
/// Returns an error if the settings file exists but cannot be read, parsed,
/// or validated.
pub fn load_context(global: &GlobalOpts, log: &Arc<Logger>) -> Result<RunContext> {
    let path = global.config.clone().unwrap_or_else(Settings::default_path);
    log.debug(&format!("settings: {}", path.display()));
    let settings = Settings::load(&path)
        .with_context(|| format!("loading settings from {}", path.display()))?;
    Ok(RunContext::new(settings, Arc::clone(log) as Arc<dyn crate::logging::Log>))
}

/// Print the dependency summary and bail if any dependency did not end met.
///
/// # Errors
///
/// Returns an error if one or more dependencies were recorded as unmet or
/// failed.
pub fn finish(log: &Logger) -> Result<()> {
    log.print_summary();

    let count = log.failure_count();
    if count > 0 {
        anyhow::bail!("{count} dependenc{} not met", if count == 1 { "y" } else { "ies" });
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::logging::DepStatus;

    #[test]
    fn load_context_reads_config_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rig.toml");
        std::fs::write(&path, "[report]\nenabled = false\n").unwrap();
        let global = GlobalOpts {
            config: Some(path),
        };
        let ctx = load_context(&global, &Arc::new(Logger::new("test"))).unwrap();
        assert!(!ctx.settings.report.enabled);
    }

    #[test]
    fn load_context_reports_bad_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rig.toml");
        std::fs::write(&path, "[report]\ncollector = \"file:///tmp\"\n").unwrap();
        let global = GlobalOpts {
            config: Some(path),
        };
        let err = load_context(&global, &Arc::new(Logger::new("test"))).unwrap_err();
        assert!(format!("{err:#}").contains("report.collector"));
    }

    #[test]
    fn finish_counts_failures() {
        let log = Logger::new("test");
        log.record_dep("rake.gem", DepStatus::Met, None);
        assert!(finish(&log).is_ok());
        log.record_dep("rails.gem", DepStatus::Failed, Some("gem install failed"));
        let err = finish(&log).unwrap_err();
        assert_eq!(err.to_string(), "1 dependency not met");
    }
}
