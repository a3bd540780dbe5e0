//! Per-process run context.
//!
//! The binary builds one [`RunContext`] at startup and passes it to every
//! command.  It owns the collaborators the engine needs (host identity,
//! subprocess runner, filesystem view, logger, cancellation state) and
//! knows where persistent state lives, so nothing reaches for a global.
use std::sync::Arc;

use crate::config::Settings;
use crate::context::Vocabulary;
use crate::dep::DepPool;
use crate::error::{PackageError, RigError, VarError};
use crate::exec::{Executor, SystemExecutor};
use crate::logging::Log;
use crate::operations::{FileSystemOps, SystemFileSystemOps};
use crate::pkg::{GemBackend, RubyEnv};
use crate::platform::{HostInfo, Platform};
use crate::report::{HttpTransport, RunReportQueue, RunState, Transport};
use crate::vars::{Prompter, VariableStore, persist};

/// Shared context for one invocation.
pub struct RunContext {
    /// Loaded settings.
    pub settings: Settings,
    /// Current host identity.
    pub host: Arc<dyn HostInfo>,
    /// Command executor (for testing or real system calls).
    pub executor: Arc<dyn Executor>,
    /// Filesystem operation abstraction (injectable for testing).
    pub fs_ops: Arc<dyn FileSystemOps>,
    /// Logger for output and dependency recording.
    pub log: Arc<dyn Log>,
    /// Cleared on Ctrl-C.
    pub state: RunState,
}

impl std::fmt::Debug for RunContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunContext")
            .field("settings", &self.settings)
            .field("host", &self.host)
            .field("executor", &self.executor)
            .field("fs_ops", &self.fs_ops)
            .field("log", &"<dyn Log>")
            .field("state", &self.state)
            .finish()
    }
}

impl RunContext {
    /// Create a context for the detected platform with real collaborators.
    #[must_use]
    pub fn new(settings: Settings, log: Arc<dyn Log>) -> Self {
        Self {
            settings,
            host: Arc::new(Platform::detect()),
            executor: Arc::new(SystemExecutor),
            fs_ops: Arc::new(SystemFileSystemOps),
            log,
            state: RunState::new(),
        }
    }

    /// Replace the host identity.
    #[must_use]
    pub fn with_host(mut self, host: Arc<dyn HostInfo>) -> Self {
        self.host = host;
        self
    }

    /// Replace the executor.
    #[must_use]
    pub fn with_executor(mut self, executor: Arc<dyn Executor>) -> Self {
        self.executor = executor;
        self
    }

    /// Replace the filesystem view.
    #[must_use]
    pub fn with_fs_ops(mut self, fs_ops: Arc<dyn FileSystemOps>) -> Self {
        self.fs_ops = fs_ops;
        self
    }

    /// A variable store seeded with the saved snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`VarError::Persist`] if the snapshot exists but is unreadable.
    pub fn load_vars(&self, prompter: Arc<dyn Prompter>) -> Result<VariableStore, VarError> {
        let saved = persist::load(&self.settings.vars_file())?;
        tracing::debug!("loaded {} saved vars", saved.len());
        Ok(VariableStore::new(saved, prompter))
    }

    /// Write `store`'s save snapshot over the saved file.
    ///
    /// # Errors
    ///
    /// Returns [`VarError::Persist`] if the snapshot cannot be written.
    pub fn save_vars(&self, store: &VariableStore) -> Result<(), VarError> {
        persist::save(&self.settings.vars_file(), &store.for_save())
    }

    /// The report queue posting through HTTP, or `None` when reporting is
    /// disabled.
    #[must_use]
    pub fn report_queue(&self) -> Option<Arc<RunReportQueue>> {
        if !self.settings.report.enabled {
            return None;
        }
        Some(Arc::new(self.report_queue_with(self.http_transport())))
    }

    /// HTTP transport to the configured collector.
    #[must_use]
    pub fn http_transport(&self) -> Arc<dyn Transport> {
        let report = &self.settings.report;
        Arc::new(HttpTransport::new(
            report.collector.clone(),
            report.open_timeout(),
            report.read_timeout(),
        ))
    }

    /// The report queue posting through `transport`, regardless of the
    /// `enabled` setting.
    #[must_use]
    pub fn report_queue_with(&self, transport: Arc<dyn Transport>) -> RunReportQueue {
        RunReportQueue::new(
            self.settings.reports_dir(),
            transport,
            self.host.description(),
        )
        .with_retry_pause(self.settings.report.retry_pause())
    }

    /// A dependency pool for this host, reporting when enabled.
    #[must_use]
    pub fn dep_pool(&self, vocab: Arc<Vocabulary>) -> DepPool {
        let pool = DepPool::new(Arc::clone(&self.host), vocab, Arc::clone(&self.log));
        match self.report_queue() {
            Some(queue) => pool.with_reports(queue),
            None => pool,
        }
    }

    /// The gem backend for the Ruby on `PATH`.
    ///
    /// # Errors
    ///
    /// Returns an error if `gem environment` cannot be run or parsed.
    pub fn gem_backend(&self) -> Result<GemBackend, RigError> {
        let env = RubyEnv::detect(self.executor.as_ref()).map_err(|source| {
            PackageError::Detection {
                package: "ruby".to_string(),
                source,
            }
        })?;
        Ok(GemBackend::new(
            env,
            Arc::clone(&self.executor),
            Arc::clone(&self.fs_ops),
        ))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::PathSettings;
    use crate::exec::test_helpers::RecordingExecutor;
    use crate::logging::Logger;
    use crate::platform::Os;
    use crate::report::transport::MockTransport;
    use crate::vars::prompt::MockPrompter;
    use crate::vars::{VarOpts, VarValue};

    fn context(prefix: &std::path::Path) -> RunContext {
        let settings = Settings {
            paths: PathSettings {
                prefix: prefix.display().to_string(),
            },
            ..Settings::default()
        };
        RunContext::new(settings, Arc::new(Logger::new("run-test")))
            .with_host(Arc::new(Platform::new(Os::Linux, Some("ubuntu"), Some("noble"))))
    }

    #[test]
    fn vars_round_trip_through_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());

        let mut store = ctx.load_vars(Arc::new(MockPrompter::new())).unwrap();
        store.set("db_port", VarValue::Integer(5432));
        ctx.save_vars(&store).unwrap();
        assert!(dir.path().join("vars/saved.json").exists());

        let mut reloaded = ctx.load_vars(Arc::new(MockPrompter::new())).unwrap();
        let value = reloaded
            .var("db_port", VarOpts::new().ask(false))
            .unwrap();
        assert_eq!(value, Some(VarValue::Integer(5432)));
    }

    #[test]
    fn disabled_reporting_has_no_queue() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = context(dir.path());
        ctx.settings.report.enabled = false;
        assert!(ctx.report_queue().is_none());
    }

    #[test]
    fn report_queue_lives_under_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        let queue = ctx.report_queue_with(Arc::new(MockTransport::new()));
        assert_eq!(queue.dir(), dir.path().join("runs"));
    }

    #[test]
    fn gem_backend_reads_gem_environment() {
        let dir = tempfile::tempdir().unwrap();
        let env_output = "RubyGems Environment:\n  - INSTALLATION DIRECTORY: /var/lib/gems/3.2.0\n  - EXECUTABLE DIRECTORY: /usr/local/bin\n";
        let ctx = context(dir.path()).with_executor(Arc::new(
            RecordingExecutor::new().with_responses(vec![(true, env_output), (true, "")]),
        ));
        let backend = ctx.gem_backend().unwrap();
        assert_eq!(backend.bin_path(), std::path::Path::new("/usr/local/bin"));
    }
}
