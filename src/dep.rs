//! Dependencies and the pool that resolves them.
//!
//! A [`Dep`] pairs a [`DepContext`] with the [`DepSource`] it came from.
//! [`DepPool::process`] walks a dependency's `requires` recursively, then
//! runs its blocks in order:
//!
//! ```text
//! requires → setup → met? ─ yes → done
//!                         └ no → requires_when_unmet → before → meet → after → met?
//! ```
//!
//! Each dependency is processed at most once per run; its result is cached
//! until [`DepPool::reset`].  When a run finishes a dependency its outcome
//! goes to the [`RunReportQueue`], which drops anything not from a public
//! source.
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use crate::context::{Block, DepContext, Definer, Vocabulary};
use crate::error::{ConfigError, DepError, RigError};
use crate::logging::{DepStatus, Log};
use crate::pkg::{PackageBackend, PackageSpec};
use crate::platform::HostInfo;
use crate::report::{Outcome, ReportSubject, RunReportQueue};

/// Where a dependency definition was loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// A shared source whose outcomes may be reported.
    Public,
    /// A source on this machine.
    Local,
    /// Defined inline with no source at all.
    Anonymous,
}

/// Origin of a dependency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepSource {
    /// Kind of source.
    pub kind: SourceKind,
    /// URI or path of the source; empty for anonymous definitions.
    pub uri: String,
}

impl DepSource {
    /// A public source at `uri`.
    pub fn public(uri: impl Into<String>) -> Self {
        Self {
            kind: SourceKind::Public,
            uri: uri.into(),
        }
    }

    /// A local source at `path`.
    pub fn local(path: impl Into<String>) -> Self {
        Self {
            kind: SourceKind::Local,
            uri: path.into(),
        }
    }

    /// No source.
    #[must_use]
    pub const fn anonymous() -> Self {
        Self {
            kind: SourceKind::Anonymous,
            uri: String::new(),
        }
    }

    /// Whether outcomes of this source may be reported.
    #[must_use]
    pub fn is_public(&self) -> bool {
        self.kind == SourceKind::Public
    }
}

/// A named dependency.
#[derive(Debug)]
pub struct Dep {
    context: DepContext,
    source: DepSource,
}

impl Dep {
    /// Wrap a context with its source.
    #[must_use]
    pub const fn new(context: DepContext, source: DepSource) -> Self {
        Self { context, source }
    }

    /// Dependency name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.context.name()
    }

    /// Where the dependency was defined.
    #[must_use]
    pub const fn source(&self) -> &DepSource {
        &self.source
    }

    /// The dependency's payload resolver.
    pub const fn context_mut(&mut self) -> &mut DepContext {
        &mut self.context
    }

    /// Identity used in run reports.
    #[must_use]
    pub fn subject(&self) -> ReportSubject {
        ReportSubject {
            dep_name: self.name().to_string(),
            source_uri: self.source.uri.clone(),
            public: self.source.is_public(),
        }
    }
}

/// How far [`DepPool::process`] goes for unmet dependencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Run `meet` for anything unmet.
    Meet,
    /// Only run `met?`; nothing is changed and nothing is reported.
    Check,
}

/// Registry of dependencies for one run.
pub struct DepPool {
    host: Arc<dyn HostInfo>,
    vocab: Arc<Vocabulary>,
    log: Arc<dyn Log>,
    reports: Option<Arc<RunReportQueue>>,
    deps: BTreeMap<String, Dep>,
    /// Outcome of each processed dependency and the mode that produced it.
    results: HashMap<String, (RunMode, bool)>,
}

impl fmt::Debug for DepPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DepPool")
            .field("host", &self.host)
            .field("deps", &self.deps.keys().collect::<Vec<_>>())
            .field("results", &self.results)
            .field("reports", &self.reports)
            .finish_non_exhaustive()
    }
}

impl DepPool {
    /// Create an empty pool using `vocab` for dependencies added with
    /// [`Self::add`].
    pub fn new(host: Arc<dyn HostInfo>, vocab: Arc<Vocabulary>, log: Arc<dyn Log>) -> Self {
        Self {
            host,
            vocab,
            log,
            reports: None,
            deps: BTreeMap::new(),
            results: HashMap::new(),
        }
    }

    /// Queue outcomes to `reports` after each dependency is processed.
    #[must_use]
    pub fn with_reports(mut self, reports: Arc<RunReportQueue>) -> Self {
        self.reports = Some(reports);
        self
    }

    /// Register a dependency with the pool's vocabulary.
    ///
    /// A later definition with the same name replaces the earlier one.
    pub fn add(
        &mut self,
        name: &str,
        source: DepSource,
        body: impl Fn(&mut Definer<'_>) -> Result<(), ConfigError> + Send + Sync + 'static,
    ) -> &mut Dep {
        let vocab = Arc::clone(&self.vocab);
        self.add_with_vocab(name, source, vocab, body)
    }

    /// Register a dependency that uses a template vocabulary such as
    /// [`Vocabulary::installer`].
    pub fn add_with_vocab(
        &mut self,
        name: &str,
        source: DepSource,
        vocab: Arc<Vocabulary>,
        body: impl Fn(&mut Definer<'_>) -> Result<(), ConfigError> + Send + Sync + 'static,
    ) -> &mut Dep {
        let context = DepContext::new(name, vocab, Arc::clone(&self.host), Arc::new(body));
        if self.deps.contains_key(name) {
            tracing::debug!("redefining {name}");
        }
        self.results.remove(name);
        let dep = Dep::new(context, source);
        match self.deps.entry(name.to_string()) {
            std::collections::btree_map::Entry::Occupied(mut slot) => {
                slot.insert(dep);
                slot.into_mut()
            }
            std::collections::btree_map::Entry::Vacant(slot) => slot.insert(dep),
        }
    }

    /// Register `<name>.<manager>` for `spec`: met when an installed
    /// version satisfies it, met by installing it through `backend` with
    /// `opts` appended to the install command.
    pub fn add_package(
        &mut self,
        backend: Arc<dyn PackageBackend>,
        spec: PackageSpec,
        opts: impl Into<String>,
        source: DepSource,
    ) -> &mut Dep {
        let name = format!("{}.{}", spec.name, backend.manager_key());
        let opts = opts.into();
        self.add(&name, source, move |dep| {
            let (checker, wanted) = (Arc::clone(&backend), spec.clone());
            dep.block(
                "met?",
                Block::new(move || checker.has(&wanted).map_err(anyhow::Error::from)),
            )?;
            let (installer, wanted, opts) = (Arc::clone(&backend), spec.clone(), opts.clone());
            dep.block(
                "meet",
                Block::new(move || {
                    installer.install(std::slice::from_ref(&wanted), &opts)?;
                    Ok(true)
                }),
            )?;
            Ok(())
        })
    }

    /// Look up a registered dependency.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Dep> {
        self.deps.get(name)
    }

    /// Registered dependency names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.deps.keys().map(String::as_str)
    }

    /// Forget cached results and payloads so every dependency runs again.
    pub fn reset(&mut self) {
        self.results.clear();
        for dep in self.deps.values_mut() {
            dep.context.reset();
        }
    }

    /// Process `name` and everything it requires.
    ///
    /// Returns whether the dependency ended up met.
    ///
    /// # Errors
    ///
    /// Returns [`DepError::Unknown`] or [`DepError::Cycle`] when the
    /// requirement graph is broken, [`DepError::Failed`] when one of the
    /// dependency's blocks errors, and [`ConfigError`] when its body uses
    /// the vocabulary incorrectly.
    pub fn process(&mut self, name: &str, mode: RunMode) -> Result<bool, RigError> {
        let mut stack = Vec::new();
        self.visit(name, mode, &mut stack)
    }

    /// Process `name` in [`RunMode::Meet`] and require it to end up met.
    ///
    /// # Errors
    ///
    /// Returns [`DepError::Unmet`] if it is still unmet, or any error from
    /// [`Self::process`].
    pub fn meet(&mut self, name: &str) -> Result<(), RigError> {
        if self.process(name, RunMode::Meet)? {
            Ok(())
        } else {
            Err(DepError::Unmet(name.to_string()).into())
        }
    }

    fn visit(
        &mut self,
        name: &str,
        mode: RunMode,
        stack: &mut Vec<String>,
    ) -> Result<bool, RigError> {
        // An unmet result from a check run says nothing about meeting.
        if let Some(&(cached_mode, met)) = self.results.get(name)
            && (met || cached_mode == mode)
        {
            return Ok(met);
        }
        if stack.iter().any(|n| n == name) {
            let mut chain = stack.clone();
            chain.push(name.to_string());
            return Err(DepError::Cycle(chain.join(" → ")).into());
        }
        if !self.deps.contains_key(name) {
            return Err(DepError::Unknown(name.to_string()).into());
        }

        stack.push(name.to_string());
        let result = self.resolve(name, mode, stack);
        stack.pop();

        self.results
            .insert(name.to_string(), (mode, matches!(result, Ok(true))));
        self.record(name, mode, &result);
        result
    }

    fn resolve(
        &mut self,
        name: &str,
        mode: RunMode,
        stack: &mut Vec<String>,
    ) -> Result<bool, RigError> {
        if !self.requirements_met(name, "requires", mode, stack)? {
            return Ok(false);
        }
        self.run_block(name, "setup")?;
        if self.run_block(name, "met?")? {
            self.log.debug(&format!("{name} already met"));
            return Ok(true);
        }
        if mode == RunMode::Check {
            self.log.info(&format!("{name} not met"));
            return Ok(false);
        }
        if !self.requirements_met(name, "requires_when_unmet", mode, stack)? {
            return Ok(false);
        }
        if !self.run_block(name, "before")? {
            self.log.warn(&format!("{name}: before block declined; not meeting"));
            return Ok(false);
        }
        self.log.info(&format!("meeting {name}"));
        self.run_block(name, "meet")?;
        self.run_block(name, "after")?;
        let met = self.run_block(name, "met?")?;
        if !met {
            self.log.warn(&format!("{name} still not met after meeting it"));
        }
        Ok(met)
    }

    /// Process every dependency listed under `accessor`, in order.
    ///
    /// A requirement that fails or errors makes the dependent unmet; a
    /// broken graph (cycle or unknown name) is propagated.
    fn requirements_met(
        &mut self,
        name: &str,
        accessor: &str,
        mode: RunMode,
        stack: &mut Vec<String>,
    ) -> Result<bool, RigError> {
        let required = self.context_mut(name)?.list(accessor)?;
        for requirement in &required {
            match self.visit(requirement, mode, stack) {
                Ok(true) => {}
                Ok(false) | Err(RigError::Dep(DepError::Failed { .. } | DepError::Unmet(_))) => {
                    self.log
                        .info(&format!("{name}: requirement {requirement} is not met"));
                    return Ok(false);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(true)
    }

    fn run_block(&mut self, name: &str, block: &str) -> Result<bool, RigError> {
        let Some(found) = self.context_mut(name)?.block(block)? else {
            return Ok(block != "met?");
        };
        found.call().map_err(|source| {
            DepError::Failed {
                dep: name.to_string(),
                stage: block.to_string(),
                source,
            }
            .into()
        })
    }

    fn context_mut(&mut self, name: &str) -> Result<&mut DepContext, DepError> {
        self.deps
            .get_mut(name)
            .map(Dep::context_mut)
            .ok_or_else(|| DepError::Unknown(name.to_string()))
    }

    fn record(&self, name: &str, mode: RunMode, result: &Result<bool, RigError>) {
        let (status, outcome, message) = match result {
            Ok(true) => (DepStatus::Met, Outcome::Ok, None),
            Ok(false) => (DepStatus::Unmet, Outcome::Fail, None),
            Err(e) => (DepStatus::Failed, Outcome::Error, Some(e.to_string())),
        };
        if let Some(msg) = &message {
            self.log.error(msg);
        }
        self.log.record_dep(name, status, message.as_deref());

        if mode == RunMode::Check {
            return;
        }
        if let (Some(queue), Some(dep)) = (&self.reports, self.deps.get(name))
            && let Err(e) = queue.enqueue(&dep.subject(), outcome)
        {
            self.log.warn(&format!("couldn't queue run report for {name}: {e}"));
        }
    }
}
