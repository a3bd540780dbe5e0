//! Filesystem query abstractions for dependency injection.
//!
//! Package backends ask "does this install target exist, and can the
//! current user write to it?" and scan metadata directories.  Routing those
//! questions through [`FileSystemOps`] lets the privilege policy and the
//! version scan be unit-tested without touching the real filesystem.
//! Production code uses [`SystemFileSystemOps`]; tests use `MockFileSystemOps`.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Abstraction over the filesystem queries used by backends.
pub trait FileSystemOps: Send + Sync + std::fmt::Debug {
    /// Returns `true` if `path` exists on the filesystem.
    fn exists(&self, path: &Path) -> bool;

    /// Returns `true` if the current user may write to `path`.
    ///
    /// Returns `false` for paths that do not exist.
    fn is_writable(&self, path: &Path) -> bool;

    /// Returns the immediate child paths inside `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if `path` cannot be opened or read as a directory.
    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>>;

    /// Read a UTF-8 file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    fn read_to_string(&self, path: &Path) -> Result<String>;
}

/// Production [`FileSystemOps`] implementation that delegates to [`std::fs`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemFileSystemOps;

impl FileSystemOps for SystemFileSystemOps {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    #[cfg(unix)]
    fn is_writable(&self, path: &Path) -> bool {
        nix::unistd::access(path, nix::unistd::AccessFlags::W_OK).is_ok()
    }

    #[cfg(not(unix))]
    fn is_writable(&self, path: &Path) -> bool {
        std::fs::metadata(path).is_ok_and(|m| !m.permissions().readonly())
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        std::fs::read_dir(path)
            .with_context(|| format!("reading directory {}", path.display()))?
            .map(|e| e.map(|entry| entry.path()).map_err(Into::into))
            .collect()
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
    }
}

/// Mock [`FileSystemOps`] for unit tests.
///
/// # Example
///
/// ```ignore
/// use rig_cli::operations::MockFileSystemOps;
///
/// let fs = MockFileSystemOps::new()
///     .with_existing("/usr/lib/ruby/gems")
///     .with_file("/specs/rake-13.0.6.gemspec", "s.name = \"rake\"");
/// ```
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MockFileSystemOps {
    existing: Vec<PathBuf>,
    writable: Vec<PathBuf>,
    files: std::collections::HashMap<PathBuf, String>,
    dirs: std::collections::HashMap<PathBuf, Vec<PathBuf>>,
}

#[cfg(test)]
impl MockFileSystemOps {
    /// Create an empty mock with nothing configured.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `path` as existing but read-only.
    #[must_use]
    pub fn with_existing(mut self, path: impl Into<PathBuf>) -> Self {
        let p = path.into();
        if !self.existing.contains(&p) {
            self.existing.push(p);
        }
        self
    }

    /// Mark `path` as existing and writable.
    #[must_use]
    pub fn with_writable(mut self, path: impl Into<PathBuf>) -> Self {
        let p = path.into();
        self = self.with_existing(p.clone());
        self.writable.push(p);
        self
    }

    /// Register a file with `content`, listing it under its parent directory.
    #[must_use]
    pub fn with_file(mut self, path: impl Into<PathBuf>, content: &str) -> Self {
        let p = path.into();
        if let Some(parent) = p.parent() {
            let parent = parent.to_path_buf();
            self = self.with_existing(parent.clone());
            self.dirs.entry(parent).or_default().push(p.clone());
        }
        self = self.with_existing(p.clone());
        self.files.insert(p, content.to_string());
        self
    }
}

#[cfg(test)]
impl FileSystemOps for MockFileSystemOps {
    fn exists(&self, path: &Path) -> bool {
        self.existing.iter().any(|p| p == path)
    }

    fn is_writable(&self, path: &Path) -> bool {
        self.writable.iter().any(|p| p == path)
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        self.dirs
            .get(path)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("mock: no entries configured for {}", path.display()))
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("mock: no such file {}", path.display()))
    }
}
