//! Domain-specific error types for the provisioning engine.
//!
//! Library modules return the typed errors below; command handlers at the
//! CLI boundary convert them to [`anyhow::Error`] via the standard `?`
//! operator.
//!
//! # Error hierarchy
//!
//! ```text
//! RigError
//! ├── Config(ConfigError)   - accessor vocabulary, version specs, rig.toml
//! ├── Var(VarError)         - prompting and saved-variable persistence
//! ├── Package(PackageError) - backend detection and installation
//! ├── Report(ReportError)   - durable run-report store
//! └── Dep(DepError)         - dependency resolution
//! ```
//!
//! Absence (a package that is not installed, a variable without a saved
//! value, a payload with no fragment for this host) is never an error.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type for the engine.
#[derive(Error, Debug)]
pub enum RigError {
    /// Declaration-time configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Variable resolution or persistence error.
    #[error("Variable error: {0}")]
    Var(#[from] VarError),

    /// Package backend error.
    #[error("Package error: {0}")]
    Package(#[from] PackageError),

    /// Run-report store error.
    #[error("Report error: {0}")]
    Report(#[from] ReportError),

    /// Dependency resolution error.
    #[error("Dependency error: {0}")]
    Dep(#[from] DepError),
}

/// Errors raised while declaring vocabulary, specs, or loading settings.
///
/// These are fatal at declaration time and never retried.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// An accessor name collides with a context method or an existing accessor.
    #[error("accessor '{name}' collides with an existing method on the dependency context")]
    AccessorCollision {
        /// Offending accessor name.
        name: String,
    },

    /// A dependency body referenced an accessor the vocabulary does not declare.
    #[error("dependency '{dep}' uses undeclared accessor '{name}'")]
    UnknownAccessor {
        /// Dependency whose body made the call.
        dep: String,
        /// Accessor name that was not found.
        name: String,
    },

    /// A block accessor was used as a list, or vice versa.
    #[error("accessor '{name}' is a {expected} accessor")]
    WrongAccessorKind {
        /// Accessor name.
        name: String,
        /// Kind the accessor was declared with.
        expected: &'static str,
    },

    /// A version constraint could not be parsed.
    #[error("malformed version spec '{input}'")]
    MalformedVersionSpec {
        /// The text that failed to parse.
        input: String,
    },

    /// An address or address range could not be parsed.
    #[error("malformed address '{input}'")]
    MalformedAddress {
        /// The text that failed to parse.
        input: String,
    },

    /// A setting has a value outside what it accepts.
    #[error("invalid setting {key}: {message}")]
    InvalidSetting {
        /// Dotted key of the setting.
        key: String,
        /// What is wrong with it.
        message: String,
    },

    /// `rig.toml` could not be read.
    #[error("IO error reading config file {path}: {source}")]
    Io {
        /// Path of the settings file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// `rig.toml` is not valid TOML for the settings schema.
    #[error("invalid settings in {path}: {source}")]
    Toml {
        /// Path of the settings file.
        path: PathBuf,
        /// Parse error.
        source: toml::de::Error,
    },
}

/// Errors raised by the variable store.
#[derive(Error, Debug)]
pub enum VarError {
    /// The prompting collaborator failed; propagated uncaught.
    #[error("prompt for '{name}' failed: {source}")]
    Prompt {
        /// Variable being prompted for.
        name: String,
        /// Underlying prompt failure.
        source: anyhow::Error,
    },

    /// The saved-variable snapshot could not be read or written.
    #[error("saved vars at {path}: {source}")]
    Persist {
        /// Snapshot path.
        path: PathBuf,
        /// Underlying failure.
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Errors raised by package backends.
#[derive(Error, Debug)]
pub enum PackageError {
    /// An install subprocess exited non-zero or could not be started.
    #[error("'{command}' failed for package '{package}': {source}")]
    InstallFailed {
        /// Rendered command line that failed.
        command: String,
        /// Package being installed.
        package: String,
        /// Underlying failure from the executor.
        source: anyhow::Error,
    },

    /// Installed versions could not be determined.
    #[error("could not detect installed versions of '{package}': {source}")]
    Detection {
        /// Package being queried.
        package: String,
        /// Underlying failure.
        source: anyhow::Error,
    },
}

/// Errors raised by the durable run-report store.
#[derive(Error, Debug)]
pub enum ReportError {
    /// A report record could not be written, read, or removed.
    #[error("run report store {path}: {source}")]
    Io {
        /// File or directory involved.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

/// Errors raised while resolving dependencies.
#[derive(Error, Debug)]
pub enum DepError {
    /// No dependency is registered under this name.
    #[error("no dependency named '{0}'")]
    Unknown(String),

    /// Requirements form a cycle.
    #[error("dependency cycle detected: {0}")]
    Cycle(String),

    /// `meet` ran but `met?` still reports the dependency as unmet.
    #[error("'{0}' is still unmet after meeting it")]
    Unmet(String),

    /// A block of the dependency returned an error.
    #[error("'{dep}' failed in {stage}: {source}")]
    Failed {
        /// Dependency name.
        dep: String,
        /// Block that failed (`met?`, `meet`, ...).
        stage: String,
        /// Underlying failure.
        source: anyhow::Error,
    },
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn accessor_collision_display_names_accessor() {
        let e = ConfigError::AccessorCollision {
            name: "define".to_string(),
        };
        assert_eq!(
            e.to_string(),
            "accessor 'define' collides with an existing method on the dependency context"
        );
    }

    #[test]
    fn malformed_version_spec_display() {
        let e = ConfigError::MalformedVersionSpec {
            input: ">>> 1".to_string(),
        };
        assert_eq!(e.to_string(), "malformed version spec '>>> 1'");
    }

    #[test]
    fn config_io_has_source() {
        use std::error::Error as StdError;
        let e = ConfigError::Io {
            path: PathBuf::from("/etc/rig.toml"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(e.source().is_some());
        assert!(e.to_string().contains("/etc/rig.toml"));
    }

    #[test]
    fn install_failed_is_tagged_with_command_and_package() {
        let e = PackageError::InstallFailed {
            command: "gem install rails".to_string(),
            package: "rails".to_string(),
            source: anyhow::anyhow!("exit 1"),
        };
        let msg = e.to_string();
        assert!(msg.contains("gem install rails"));
        assert!(msg.contains("'rails'"));
    }

    #[test]
    fn dep_cycle_display() {
        let e = DepError::Cycle("a → b → a".to_string());
        assert_eq!(e.to_string(), "dependency cycle detected: a → b → a");
    }

    #[test]
    fn rig_error_from_config_error() {
        let e: RigError = ConfigError::UnknownAccessor {
            dep: "ruby".to_string(),
            name: "sorce".to_string(),
        }
        .into();
        assert!(e.to_string().contains("Configuration error"));
        assert!(e.to_string().contains("sorce"));
    }

    #[test]
    fn rig_error_from_report_error() {
        let e: RigError = ReportError::Io {
            path: PathBuf::from("/tmp/runs"),
            source: io::Error::other("disk full"),
        }
        .into();
        assert!(e.to_string().contains("Report error"));
    }

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn all_error_types_are_send_sync() {
        assert_send_sync::<RigError>();
        assert_send_sync::<ConfigError>();
        assert_send_sync::<VarError>();
        assert_send_sync::<PackageError>();
        assert_send_sync::<ReportError>();
        assert_send_sync::<DepError>();
    }

    #[test]
    fn errors_convert_to_anyhow() {
        let _a: anyhow::Error = DepError::Unknown("x".to_string()).into();
        let _b: anyhow::Error = VarError::Prompt {
            name: "x".to_string(),
            source: anyhow::anyhow!("eof"),
        }
        .into();
    }
}
