//! Package-manager backends.
//!
//! A [`PackageBackend`] exposes detection (installed versions of a package)
//! and installation for one underlying package manager.  The provided
//! methods layer the shared policy on top:
//!
//! - [`PackageBackend::installed_match`] picks the highest installed
//!   version satisfying a [`PackageSpec`],
//! - [`PackageBackend::install`] renders one command per spec, elevates it
//!   when [`PackageBackend::should_sudo`] says so, and then runs the
//!   backend's best-effort post-install hook,
//! - [`PackageBackend::should_sudo`] elevates when the manager's own policy
//!   asks for it or its install target exists but is not writable.
pub mod gem;
pub mod version;

pub use gem::{GemBackend, RubyEnv};
pub use version::{PackageSpec, Version, VersionOp, VersionSpec};

use std::path::Path;

use crate::error::PackageError;
use crate::exec::Executor;
use crate::operations::FileSystemOps;

/// Stable identity of a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendId {
    /// Key used in dependency declarations (`gem`, `apt`, …).
    pub key: &'static str,
    /// Command the backend drives.
    pub command: &'static str,
}

/// Capability set of a package-manager integration.
pub trait PackageBackend: Send + Sync + std::fmt::Debug {
    /// Key used in dependency declarations.
    fn manager_key(&self) -> &'static str;

    /// Program this backend runs.
    fn pkg_cmd(&self) -> &'static str;

    /// Executor used for install commands and hooks.
    fn executor(&self) -> &dyn Executor;

    /// Filesystem view used for the writability check.
    fn fs(&self) -> &dyn FileSystemOps;

    /// Installed versions of `name`, highest first.
    ///
    /// A package that is not installed yields an empty list.
    ///
    /// # Errors
    ///
    /// Returns [`PackageError::Detection`] if the manager's metadata cannot
    /// be read.
    fn installed_versions(&self, name: &str) -> Result<Vec<Version>, PackageError>;

    /// Command-line fragment naming `spec` for the install command.
    fn cmdline_spec(&self, spec: &PackageSpec) -> String {
        spec.name.clone()
    }

    /// Directory packages are installed into, if the backend knows it.
    fn install_target(&self) -> Option<&Path> {
        None
    }

    /// Whether the manager always needs elevation.
    fn base_should_sudo(&self) -> bool {
        false
    }

    /// Manager-specific work after a successful install.
    ///
    /// # Errors
    ///
    /// Errors are logged by [`Self::install`] and otherwise ignored.
    fn post_install(&self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Stable key and command name.
    fn identify(&self) -> BackendId {
        BackendId {
            key: self.manager_key(),
            command: self.pkg_cmd(),
        }
    }

    /// Whether `spec` accepts `version`.
    fn matches(&self, spec: &PackageSpec, version: &Version) -> bool {
        spec.matches(version)
    }

    /// Elevate when the base policy says so, or when the install target
    /// exists but is not writable by the current user.
    fn should_sudo(&self) -> bool {
        self.base_should_sudo()
            || self
                .install_target()
                .is_some_and(|dir| self.fs().exists(dir) && !self.fs().is_writable(dir))
    }

    /// Highest installed version satisfying `spec`, or `None` when absent.
    ///
    /// # Errors
    ///
    /// Propagates detection failures.
    fn installed_match(&self, spec: &PackageSpec) -> Result<Option<Version>, PackageError> {
        let found = self
            .installed_versions(&spec.name)?
            .into_iter()
            .find(|v| self.matches(spec, v));
        match &found {
            Some(version) => tracing::debug!("{spec} present ({version})"),
            None => tracing::debug!("{spec} not present"),
        }
        Ok(found)
    }

    /// Whether some installed version satisfies `spec`.
    ///
    /// # Errors
    ///
    /// Propagates detection failures.
    fn has(&self, spec: &PackageSpec) -> Result<bool, PackageError> {
        Ok(self.installed_match(spec)?.is_some())
    }

    /// Full command line installing `spec`.
    fn install_command(&self, spec: &PackageSpec, opts: &str) -> String {
        let command = format!("{} install {}", self.pkg_cmd(), self.cmdline_spec(spec));
        if opts.trim().is_empty() {
            command
        } else {
            format!("{command} {}", opts.trim())
        }
    }

    /// Install every spec in order, then run the post-install hook.
    ///
    /// # Errors
    ///
    /// Returns [`PackageError::InstallFailed`] for the first command that
    /// fails; later specs are not attempted and the hook does not run.
    fn install(&self, specs: &[PackageSpec], opts: &str) -> Result<(), PackageError> {
        let sudo = self.should_sudo();
        for spec in specs {
            let command = self.install_command(spec, opts);
            tracing::info!("Installing {spec} via {}", self.manager_key());
            self.executor()
                .shell(&command, sudo)
                .map_err(|source| PackageError::InstallFailed {
                    command: command.clone(),
                    package: spec.name.clone(),
                    source,
                })?;
        }
        if let Err(e) = self.post_install() {
            tracing::warn!("{} post-install step failed: {e:#}", self.manager_key());
        }
        Ok(())
    }
}
