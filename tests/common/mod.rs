// Shared helpers for integration tests.
//
// Provides hand-written collaborators (host, prompter, transport, executor,
// filesystem) and a temporary-prefix-backed run context so each integration
// test can exercise the engine through its public API only.
//
// Used by all integration test binaries that declare `mod common;`.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use rig_cli::config::{PathSettings, Settings};
use rig_cli::exec::{ExecResult, Executor};
use rig_cli::logging::{Log, Logger};
use rig_cli::operations::FileSystemOps;
use rig_cli::platform::{HostInfo, SystemTag};
use rig_cli::report::{DeliveryOutcome, Transport};
use rig_cli::run::RunContext;
use rig_cli::vars::{PromptRequest, Prompter, VarValue};

/// A host whose match list is fixed, most specific tag first.
#[derive(Debug, Clone)]
pub struct FixedHost(pub Vec<&'static str>);

impl FixedHost {
    pub fn ubuntu() -> Self {
        Self(vec!["noble", "ubuntu", "apt", "linux"])
    }

    pub fn osx() -> Self {
        Self(vec!["sonoma", "brew", "osx"])
    }
}

impl HostInfo for FixedHost {
    fn system(&self) -> SystemTag {
        SystemTag::new(self.0.last().copied().unwrap_or("linux"))
    }

    fn match_list(&self) -> Vec<SystemTag> {
        self.0.iter().copied().map(SystemTag::new).collect()
    }
}

/// Answers prompts from a script and records every request it saw.
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: Mutex<VecDeque<VarValue>>,
    requests: Mutex<Vec<PromptRequest>>,
}

impl ScriptedPrompter {
    pub fn new(answers: impl IntoIterator<Item = VarValue>) -> Self {
        Self {
            answers: Mutex::new(answers.into_iter().collect()),
            requests: Mutex::default(),
        }
    }

    pub fn requests(&self) -> Vec<PromptRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Prompter for ScriptedPrompter {
    fn prompt(&self, request: &PromptRequest) -> anyhow::Result<VarValue> {
        self.requests.lock().unwrap().push(request.clone());
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| anyhow::anyhow!("no scripted answer for {}", request.name))
    }
}

/// Replays scripted delivery outcomes and records every body it was given.
///
/// Once the script runs out every delivery succeeds.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    outcomes: Mutex<VecDeque<DeliveryOutcome>>,
    bodies: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub fn new(outcomes: impl IntoIterator<Item = DeliveryOutcome>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into_iter().collect()),
            bodies: Mutex::default(),
        }
    }

    pub fn bodies(&self) -> Vec<String> {
        self.bodies.lock().unwrap().clone()
    }
}

impl Transport for ScriptedTransport {
    fn deliver(&self, body: &str) -> DeliveryOutcome {
        self.bodies.lock().unwrap().push(body.to_string());
        self.outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(DeliveryOutcome::Delivered)
    }
}

/// Records command lines and succeeds unless a line contains `fail_on`.
#[derive(Debug, Default)]
pub struct ScriptedExecutor {
    pub lines: Mutex<Vec<String>>,
    pub fail_on: Option<&'static str>,
}

impl ScriptedExecutor {
    pub fn failing_on(pattern: &'static str) -> Self {
        Self {
            fail_on: Some(pattern),
            ..Self::default()
        }
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }
}

impl Executor for ScriptedExecutor {
    fn run(&self, program: &str, args: &[&str]) -> anyhow::Result<ExecResult> {
        let result = self.run_unchecked(program, args)?;
        if !result.success {
            anyhow::bail!("{program} failed");
        }
        Ok(result)
    }

    fn run_unchecked(&self, program: &str, args: &[&str]) -> anyhow::Result<ExecResult> {
        let line = std::iter::once(program)
            .chain(args.iter().copied())
            .collect::<Vec<_>>()
            .join(" ");
        let success = self.fail_on.is_none_or(|pattern| !line.contains(pattern));
        self.lines.lock().unwrap().push(line);
        Ok(ExecResult {
            stdout: String::new(),
            stderr: String::new(),
            success,
            code: Some(i32::from(!success)),
        })
    }

    fn which(&self, _: &str) -> bool {
        true
    }
}

/// In-memory filesystem view: registered files and writable directories.
#[derive(Debug, Default)]
pub struct MemoryFs {
    files: HashMap<PathBuf, String>,
    writable: Vec<PathBuf>,
}

impl MemoryFs {
    pub fn with_file(mut self, path: impl Into<PathBuf>, content: &str) -> Self {
        self.files.insert(path.into(), content.to_string());
        self
    }

    pub fn with_writable(mut self, path: impl Into<PathBuf>) -> Self {
        self.writable.push(path.into());
        self
    }

    /// Register an installed gemspec for `name` at `version` under `gem_home`.
    pub fn with_gemspec(self, gem_home: &str, name: &str, version: &str) -> Self {
        self.with_file(
            format!("{gem_home}/specifications/{name}-{version}.gemspec"),
            &format!("Gem::Specification.new do |s|\n  s.name = \"{name}\"\nend\n"),
        )
    }
}

impl FileSystemOps for MemoryFs {
    fn exists(&self, path: &Path) -> bool {
        self.writable.iter().any(|p| p == path)
            || self
                .files
                .keys()
                .any(|file| file == path || file.starts_with(path))
    }

    fn is_writable(&self, path: &Path) -> bool {
        self.writable.iter().any(|p| p == path)
    }

    fn read_dir(&self, path: &Path) -> anyhow::Result<Vec<PathBuf>> {
        let mut entries: Vec<PathBuf> = self
            .files
            .keys()
            .filter(|file| file.parent() == Some(path))
            .cloned()
            .collect();
        entries.sort();
        Ok(entries)
    }

    fn read_to_string(&self, path: &Path) -> anyhow::Result<String> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("{} not found", path.display()))
    }
}

/// A run context rooted in a temporary prefix, on a fixed Ubuntu host.
pub struct TestRun {
    pub prefix: tempfile::TempDir,
    pub log: Arc<Logger>,
    pub ctx: RunContext,
}

impl TestRun {
    pub fn new() -> Self {
        let prefix = tempfile::tempdir().expect("create temp prefix");
        let settings = Settings {
            paths: PathSettings {
                prefix: prefix.path().display().to_string(),
            },
            ..Settings::default()
        };
        let log = Arc::new(Logger::new("integration"));
        let ctx = RunContext::new(settings, Arc::clone(&log) as Arc<dyn Log>)
            .with_host(Arc::new(FixedHost::ubuntu()));
        Self { prefix, log, ctx }
    }

    pub fn prefix_path(&self) -> &Path {
        self.prefix.path()
    }
}
