//! RubyGems backend.
//!
//! Installed versions are read from the gemspec directory: every
//! `<name>-<version>.gemspec` whose declared `s.name` is exactly `<name>`
//! contributes `<version>`.  The declared-name check keeps `rake-compiler`
//! specs out of the results for `rake`.
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use anyhow::{Context as _, Result};
use regex::Regex;

use super::{PackageBackend, PackageSpec, Version};
use crate::error::{PackageError, RigError};
use crate::exec::Executor;
use crate::operations::FileSystemOps;

/// Layout of the active Ruby installation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RubyEnv {
    /// Directory holding unpacked gems (`<gemdir>/gems`).
    pub gem_dir: PathBuf,
    /// Directory holding installed gemspecs (`<gemdir>/specifications`).
    pub gemspec_dir: PathBuf,
    /// Directory gem executables are linked into.
    pub bin_dir: PathBuf,
    /// Whether Ruby is managed by rbenv, which needs its shims refreshed.
    pub rbenv: bool,
}

impl RubyEnv {
    /// Describe a Ruby installation rooted at `gem_home`.
    pub fn new(gem_home: &Path, bin_dir: impl Into<PathBuf>, rbenv: bool) -> Self {
        Self {
            gem_dir: gem_home.join("gems"),
            gemspec_dir: gem_home.join("specifications"),
            bin_dir: bin_dir.into(),
            rbenv,
        }
    }

    /// Query `gem environment` for the active installation.
    ///
    /// # Errors
    ///
    /// Returns an error if `gem` cannot be run or its output lacks an
    /// installation directory.
    pub fn detect(executor: &dyn Executor) -> Result<Self> {
        let output = executor
            .run("gem", &["environment"])
            .context("querying gem environment")?;
        Self::from_gem_env(&output.stdout).context("parsing gem environment")
    }

    /// Parse the output of `gem environment`.
    fn from_gem_env(output: &str) -> Option<Self> {
        let gem_home = val_for(output, "INSTALLATION DIRECTORY")?;
        let bin_dir = val_for(output, "EXECUTABLE DIRECTORY")
            .map_or_else(|| Path::new(gem_home).join("bin"), PathBuf::from);
        let rbenv = val_for(output, "RUBY EXECUTABLE")
            .is_some_and(|ruby| ruby.contains("/.rbenv/") || ruby.contains("/rbenv/"));
        Some(Self::new(Path::new(gem_home), bin_dir, rbenv))
    }
}

/// Value of the first `  - KEY: value` line in `gem environment` output.
fn val_for<'a>(output: &'a str, key: &str) -> Option<&'a str> {
    output.lines().find_map(|line| {
        let line = line.trim().trim_start_matches('-').trim_start();
        let (k, v) = line.split_once(':')?;
        (k.trim() == key).then_some(v.trim()).filter(|v| !v.is_empty())
    })
}

static NAME_LINE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^\s*s\.name\s*=\s*(.+?)\s*$").ok());

/// Whether the gemspec `content` declares `s.name` as exactly `name`,
/// tolerating `"…"`, `'…'`, `%q{…}` and a trailing `.freeze`.
fn declares_name(content: &str, name: &str) -> bool {
    let Some(re) = NAME_LINE.as_ref() else {
        return false;
    };
    content
        .lines()
        .filter_map(|line| re.captures(line).and_then(|c| c.get(1)))
        .any(|value| {
            let value = value.as_str().trim_end_matches(".freeze");
            let value = value
                .strip_prefix("%q")
                .or_else(|| value.strip_prefix("%Q"))
                .unwrap_or(value);
            value.trim_matches(|c| matches!(c, '\'' | '"' | '{' | '}')) == name
        })
}

/// Version part of `file_name` if it is `<name>-<version>.gemspec`.
fn version_from_file_name<'a>(file_name: &'a str, name: &str) -> Option<&'a str> {
    file_name
        .strip_prefix(name)?
        .strip_prefix('-')?
        .strip_suffix(".gemspec")
}

/// [`PackageBackend`] driving the `gem` command.
#[derive(Debug, Clone)]
pub struct GemBackend {
    env: RubyEnv,
    executor: Arc<dyn Executor>,
    fs: Arc<dyn FileSystemOps>,
}

impl GemBackend {
    /// Backend for the Ruby described by `env`.
    pub fn new(env: RubyEnv, executor: Arc<dyn Executor>, fs: Arc<dyn FileSystemOps>) -> Self {
        Self { env, executor, fs }
    }

    /// Ruby installation this backend drives.
    #[must_use]
    pub const fn env(&self) -> &RubyEnv {
        &self.env
    }

    /// Unpacked location of the installed gem matching `name` and the
    /// optional constraint, or `None` when no installed version matches.
    ///
    /// # Errors
    ///
    /// Returns an error if `version` is malformed or detection fails.
    pub fn gem_path_for(
        &self,
        name: &str,
        version: Option<&str>,
    ) -> Result<Option<PathBuf>, RigError> {
        let spec = PackageSpec::new(name, version)?;
        Ok(self
            .installed_match(&spec)?
            .map(|found| self.env.gem_dir.join(format!("{name}-{found}"))))
    }

    /// Directory gem executables are installed into.
    #[must_use]
    pub fn bin_path(&self) -> &Path {
        &self.env.bin_dir
    }

    fn scan(&self, name: &str) -> Result<Vec<Version>> {
        let dir = &self.env.gemspec_dir;
        if !self.fs.exists(dir) {
            return Ok(Vec::new());
        }
        let mut versions = Vec::new();
        for path in self.fs.read_dir(dir)? {
            let Some(file_name) = path.file_name().and_then(|f| f.to_str()) else {
                continue;
            };
            let Some(raw) = version_from_file_name(file_name, name) else {
                continue;
            };
            if !declares_name(&self.fs.read_to_string(&path)?, name) {
                continue;
            }
            match Version::parse(raw) {
                Some(version) => versions.push(version),
                None => tracing::debug!("ignoring {file_name}: unparsable version"),
            }
        }
        versions.sort_by(|a, b| b.cmp(a));
        Ok(versions)
    }
}

impl PackageBackend for GemBackend {
    fn manager_key(&self) -> &'static str {
        "gem"
    }

    fn pkg_cmd(&self) -> &'static str {
        "gem"
    }

    fn executor(&self) -> &dyn Executor {
        self.executor.as_ref()
    }

    fn fs(&self) -> &dyn FileSystemOps {
        self.fs.as_ref()
    }

    fn installed_versions(&self, name: &str) -> Result<Vec<Version>, PackageError> {
        self.scan(name).map_err(|source| PackageError::Detection {
            package: name.to_string(),
            source,
        })
    }

    fn cmdline_spec(&self, spec: &PackageSpec) -> String {
        match &spec.version {
            Some(constraint) => format!("{} --version '{constraint}'", spec.name),
            None => spec.name.clone(),
        }
    }

    fn install_target(&self) -> Option<&Path> {
        Some(&self.env.gem_dir)
    }

    fn post_install(&self) -> Result<()> {
        if self.env.rbenv {
            self.executor.shell("rbenv rehash", false)?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::exec::test_helpers::RecordingExecutor;
    use crate::operations::MockFileSystemOps;

    const GEM_HOME: &str = "/gems/3.2.0";

    fn env(rbenv: bool) -> RubyEnv {
        RubyEnv::new(Path::new(GEM_HOME), "/usr/local/bin", rbenv)
    }

    fn spec_file(fs: MockFileSystemOps, file: &str, name_line: &str) -> MockFileSystemOps {
        fs.with_file(
            format!("{GEM_HOME}/specifications/{file}"),
            &format!("Gem::Specification.new do |s|\n  {name_line}\nend\n"),
        )
    }

    fn rails_fs() -> MockFileSystemOps {
        let fs = MockFileSystemOps::new();
        let fs = spec_file(fs, "rails-1.0.0.gemspec", "s.name = \"rails\"");
        let fs = spec_file(fs, "rails-2.0.0.gemspec", "s.name = \"rails\".freeze");
        let fs = spec_file(fs, "rails-1.2.0.gemspec", "s.name = %q{rails}");
        spec_file(fs, "rails-html-sanitizer-1.6.0.gemspec", "s.name = 'rails-html-sanitizer'")
    }

    fn backend(fs: MockFileSystemOps, executor: Arc<RecordingExecutor>) -> GemBackend {
        GemBackend::new(env(false), executor, Arc::new(fs))
    }

    fn versions(list: &[Version]) -> Vec<&str> {
        list.iter().map(Version::as_str).collect()
    }

    #[test]
    fn installed_versions_are_descending_and_name_filtered() {
        let gem = backend(rails_fs(), Arc::new(RecordingExecutor::new()));
        let found = gem.installed_versions("rails").unwrap();
        assert_eq!(versions(&found), vec!["2.0.0", "1.2.0", "1.0.0"]);
    }

    #[test]
    fn highest_matching_version_is_selected() {
        let gem = backend(rails_fs(), Arc::new(RecordingExecutor::new()));
        let spec = PackageSpec::parse("rails >= 1.2.0").unwrap();
        assert_eq!(gem.installed_match(&spec).unwrap().unwrap().as_str(), "2.0.0");
        let spec = PackageSpec::parse("rails > 2.0.0").unwrap();
        assert_eq!(gem.installed_match(&spec).unwrap(), None);
        assert!(!gem.has(&spec).unwrap());
    }

    #[test]
    fn missing_gemspec_dir_is_not_installed() {
        let gem = backend(MockFileSystemOps::new(), Arc::new(RecordingExecutor::new()));
        assert!(gem.installed_versions("rails").unwrap().is_empty());
    }

    #[test]
    fn unreadable_gemspec_is_detection_error() {
        let fs = MockFileSystemOps::new().with_existing(format!("{GEM_HOME}/specifications"));
        let gem = backend(fs, Arc::new(RecordingExecutor::new()));
        let err = gem.installed_versions("rails").unwrap_err();
        assert!(matches!(err, PackageError::Detection { ref package, .. } if package == "rails"));
    }

    #[test]
    fn cmdline_spec_quotes_constraint() {
        let gem = backend(MockFileSystemOps::new(), Arc::new(RecordingExecutor::new()));
        let spec = PackageSpec::parse("rails ~> 3.2").unwrap();
        assert_eq!(gem.cmdline_spec(&spec), "rails --version '~> 3.2'");
        assert_eq!(
            gem.install_command(&spec, "--no-document"),
            "gem install rails --version '~> 3.2' --no-document"
        );
    }

    #[test]
    fn install_elevates_when_gem_dir_is_read_only() {
        let fs = MockFileSystemOps::new().with_existing(format!("{GEM_HOME}/gems"));
        let executor = Arc::new(RecordingExecutor::new());
        let gem = backend(fs, Arc::clone(&executor));
        assert!(gem.should_sudo());
        gem.install(&[PackageSpec::parse("rake").unwrap()], "").unwrap();
        assert_eq!(executor.command_lines(), vec!["sudo sh -c gem install rake"]);
    }

    #[test]
    fn install_does_not_elevate_writable_or_missing_dir() {
        let writable = MockFileSystemOps::new().with_writable(format!("{GEM_HOME}/gems"));
        let gem = backend(writable, Arc::new(RecordingExecutor::new()));
        assert!(!gem.should_sudo());
        let gem = backend(MockFileSystemOps::new(), Arc::new(RecordingExecutor::new()));
        assert!(!gem.should_sudo());
    }

    #[test]
    fn install_failure_is_tagged_and_stops() {
        let executor = Arc::new(RecordingExecutor::new().with_responses(vec![(false, "")]));
        let gem = backend(MockFileSystemOps::new(), Arc::clone(&executor));
        let specs = [
            PackageSpec::parse("nokogiri").unwrap(),
            PackageSpec::parse("rake").unwrap(),
        ];
        let err = gem.install(&specs, "").unwrap_err();
        assert!(matches!(
            err,
            PackageError::InstallFailed { ref command, ref package, .. }
                if command == "gem install nokogiri" && package == "nokogiri"
        ));
        assert_eq!(executor.recorded_calls().len(), 1);
    }

    #[test]
    fn rbenv_rehash_runs_after_install() {
        let executor = Arc::new(RecordingExecutor::new());
        let gem = GemBackend::new(env(true), executor.clone(), Arc::new(MockFileSystemOps::new()));
        gem.install(&[PackageSpec::parse("rake").unwrap()], "").unwrap();
        assert_eq!(
            executor.command_lines(),
            vec!["sh -c gem install rake", "sh -c rbenv rehash"]
        );
    }

    #[test]
    fn failing_rehash_does_not_fail_install() {
        let executor = Arc::new(RecordingExecutor::new().with_responses(vec![(true, ""), (false, "")]));
        let gem = GemBackend::new(env(true), executor.clone(), Arc::new(MockFileSystemOps::new()));
        assert!(gem.install(&[PackageSpec::parse("rake").unwrap()], "").is_ok());
    }

    #[test]
    fn gem_path_for_uses_detected_version() {
        let gem = backend(rails_fs(), Arc::new(RecordingExecutor::new()));
        assert_eq!(
            gem.gem_path_for("rails", Some("< 2")).unwrap(),
            Some(PathBuf::from(format!("{GEM_HOME}/gems/rails-1.2.0")))
        );
        assert_eq!(gem.gem_path_for("rails", Some("> 3")).unwrap(), None);
        assert!(matches!(
            gem.gem_path_for("rails", Some(">>> 3")),
            Err(RigError::Config(_))
        ));
        assert_eq!(gem.bin_path(), Path::new("/usr/local/bin"));
    }

    #[test]
    fn declares_name_tolerates_quoting() {
        for line in [
            "s.name = \"rake\"",
            "s.name = 'rake'",
            "s.name = %q{rake}",
            "s.name = \"rake\".freeze",
        ] {
            assert!(declares_name(line, "rake"), "{line}");
        }
        assert!(!declares_name("s.name = \"rake-compiler\"", "rake"));
        assert!(!declares_name("s.summary = \"rake\"", "rake"));
    }

    #[test]
    fn ruby_env_from_gem_environment() {
        let output = "RubyGems Environment:\n  - RUBYGEMS VERSION: 3.4.10\n  - RUBY EXECUTABLE: /home/u/.rbenv/versions/3.2.2/bin/ruby\n  - INSTALLATION DIRECTORY: /home/u/.rbenv/versions/3.2.2/lib/ruby/gems/3.2.0\n  - EXECUTABLE DIRECTORY: /home/u/.rbenv/versions/3.2.2/bin\n";
        let env = RubyEnv::from_gem_env(output).unwrap();
        assert_eq!(
            env.gemspec_dir,
            PathBuf::from("/home/u/.rbenv/versions/3.2.2/lib/ruby/gems/3.2.0/specifications")
        );
        assert_eq!(env.bin_dir, PathBuf::from("/home/u/.rbenv/versions/3.2.2/bin"));
        assert!(env.rbenv);
    }

    #[test]
    fn ruby_env_detect_runs_gem_environment() {
        let executor = RecordingExecutor::new().with_responses(vec![(
            true,
            "  - INSTALLATION DIRECTORY: /var/lib/gems/3.0.0\n  - RUBY EXECUTABLE: /usr/bin/ruby3.0\n",
        )]);
        let env = RubyEnv::detect(&executor).unwrap();
        assert_eq!(env.gem_dir, PathBuf::from("/var/lib/gems/3.0.0/gems"));
        assert_eq!(env.bin_dir, PathBuf::from("/var/lib/gems/3.0.0/bin"));
        assert!(!env.rbenv);
        assert_eq!(executor.command_lines(), vec!["gem environment"]);
    }
}
