//! Durable queue of run reports awaiting delivery.
//!
//! Each pending report is one file in the queue directory, named by the
//! report's timestamp as `<secs>.<nanos>` so that names sort in time order.
//! Records are written to a hidden temporary file and renamed into place,
//! so a crash never leaves a half-written record that looks pending.
use std::fmt;
use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};

use super::state::RunState;
use super::transport::{DeliveryOutcome, Transport};
use crate::error::ReportError;

/// Pause after a transient delivery failure.
pub const DEFAULT_RETRY_PAUSE: Duration = Duration::from_secs(1);

/// Outcome tag sent to the collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The dependency was met.
    Ok,
    /// The dependency could not be met.
    Fail,
    /// Resolution stopped on an error worth reporting as such.
    Error,
}

impl Outcome {
    /// Classify a resolution result; a reportable error wins over the result.
    #[must_use]
    pub const fn from_result(met: bool, reportable: bool) -> Self {
        if reportable {
            Self::Error
        } else if met {
            Self::Ok
        } else {
            Self::Fail
        }
    }

    /// Wire tag.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Fail => "fail",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who a report is about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportSubject {
    /// Dependency name.
    pub dep_name: String,
    /// URI of the source the dependency was loaded from.
    pub source_uri: String,
    /// Whether the source is public; only public sources are reported.
    pub public: bool,
}

/// One persisted run report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Engine version that produced the report.
    pub version: String,
    /// When the dependency finished resolving.
    pub run_at: DateTime<Utc>,
    /// Host description.
    pub system_info: String,
    /// Dependency name.
    pub dep_name: String,
    /// Dependency source URI.
    pub source_uri: String,
    /// Outcome tag.
    pub result: Outcome,
}

impl RunReport {
    /// Build a report stamped with this engine's version.
    #[must_use]
    pub fn new(
        subject: &ReportSubject,
        result: Outcome,
        system_info: impl Into<String>,
        run_at: DateTime<Utc>,
    ) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            run_at,
            system_info: system_info.into(),
            dep_name: subject.dep_name.clone(),
            source_uri: subject.source_uri.clone(),
            result,
        }
    }

    /// `application/x-www-form-urlencoded` body.
    #[must_use]
    pub fn to_form(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .append_pair("version", &self.version)
            .append_pair(
                "run_at",
                &self.run_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            )
            .append_pair("system_info", &self.system_info)
            .append_pair("dep_name", &self.dep_name)
            .append_pair("source_uri", &self.source_uri)
            .append_pair("result", self.result.as_str())
            .finish()
    }
}

/// Tally of one flush.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushSummary {
    /// Records accepted and removed.
    pub delivered: usize,
    /// Records rejected by the collector and removed.
    pub rejected: usize,
    /// Attempts that failed transiently; their records remain.
    pub transient: usize,
    /// Records that could not be read and were set aside.
    pub unreadable: usize,
}

type Sleeper = Arc<dyn Fn(Duration) + Send + Sync>;

/// Durable, at-least-once delivery of run reports.
pub struct RunReportQueue {
    dir: PathBuf,
    transport: Arc<dyn Transport>,
    system_info: String,
    retry_pause: Duration,
    sleeper: Sleeper,
}

impl fmt::Debug for RunReportQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunReportQueue")
            .field("dir", &self.dir)
            .field("system_info", &self.system_info)
            .field("retry_pause", &self.retry_pause)
            .finish_non_exhaustive()
    }
}

impl RunReportQueue {
    /// Create a queue storing records under `dir`.
    pub fn new(
        dir: impl Into<PathBuf>,
        transport: Arc<dyn Transport>,
        system_info: impl Into<String>,
    ) -> Self {
        Self {
            dir: dir.into(),
            transport,
            system_info: system_info.into(),
            retry_pause: DEFAULT_RETRY_PAUSE,
            sleeper: Arc::new(std::thread::sleep),
        }
    }

    /// Override the pause taken after a transient failure.
    #[must_use]
    pub const fn with_retry_pause(mut self, pause: Duration) -> Self {
        self.retry_pause = pause;
        self
    }

    /// Replace how the queue pauses (tests observe the pause instead of
    /// sleeping).
    #[must_use]
    pub fn with_sleeper(mut self, sleeper: impl Fn(Duration) + Send + Sync + 'static) -> Self {
        self.sleeper = Arc::new(sleeper);
        self
    }

    /// Queue directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persist a report for `subject`, stamped now.
    ///
    /// Subjects from non-public sources are skipped and `Ok(None)` is
    /// returned.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::Io`] if the record cannot be written.
    pub fn enqueue(
        &self,
        subject: &ReportSubject,
        outcome: Outcome,
    ) -> Result<Option<PathBuf>, ReportError> {
        if !subject.public {
            tracing::debug!(
                "Not reporting {}, since it's not in a public source.",
                subject.dep_name
            );
            return Ok(None);
        }
        let report = RunReport::new(subject, outcome, self.system_info.clone(), Utc::now());
        self.store(&report).map(Some)
    }

    /// Persist `report` under a key derived from its timestamp, bumping the
    /// key by a nanosecond until it is unused.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::Io`] if the record cannot be written.
    pub fn store(&self, report: &RunReport) -> Result<PathBuf, ReportError> {
        fs::create_dir_all(&self.dir).map_err(|source| io_error(&self.dir, source))?;

        let mut at = report.run_at;
        let (key, path) = loop {
            let key = record_key(at);
            let path = self.dir.join(&key);
            if !path.exists() {
                break (key, path);
            }
            at += chrono::Duration::nanoseconds(1);
        };

        let partial = self.dir.join(format!(".{key}.partial"));
        let write = || -> std::io::Result<()> {
            let mut file = fs::File::create(&partial)?;
            file.write_all(report.to_form().as_bytes())?;
            file.sync_all()?;
            fs::rename(&partial, &path)
        };
        write().map_err(|source| io_error(&path, source))?;

        tracing::debug!("queued run report {} for {}", key, report.dep_name);
        Ok(path)
    }

    /// Pending record paths, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::Io`] if the directory exists but cannot be read.
    pub fn pending(&self) -> Result<Vec<PathBuf>, ReportError> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(&self.dir).map_err(|source| io_error(&self.dir, source))?;
        let mut records: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_ok_and(|t| t.is_file()))
            .filter(|entry| entry.file_name().to_str().is_some_and(is_record_key))
            .map(|entry| entry.path())
            .collect();
        records.sort();
        Ok(records)
    }

    /// The record attempted next: the lexicographically last key.
    ///
    /// # Errors
    ///
    /// Propagates directory read failures.
    pub fn most_recent(&self) -> Result<Option<PathBuf>, ReportError> {
        Ok(self.pending()?.pop())
    }

    /// Deliver pending records one at a time while `state` is running.
    ///
    /// Delivered and rejected records are removed.  A transient failure
    /// leaves the record in place and pauses before the next attempt.  A
    /// record that cannot be read is renamed to `.<key>.bad` and skipped.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::Io`] if a record cannot be removed or set
    /// aside.
    pub fn flush(&self, state: &RunState) -> Result<FlushSummary, ReportError> {
        let mut summary = FlushSummary::default();
        while state.is_running() {
            let Some(path) = self.most_recent()? else {
                break;
            };
            let body = match fs::read_to_string(&path) {
                Ok(body) => body,
                Err(e) => {
                    tracing::debug!("unreadable run report {}: {e}", path.display());
                    self.set_aside(&path)?;
                    summary.unreadable += 1;
                    continue;
                }
            };
            match self.transport.deliver(&body) {
                DeliveryOutcome::Delivered => {
                    self.remove(&path)?;
                    summary.delivered += 1;
                }
                DeliveryOutcome::Rejected(status) => {
                    tracing::debug!(
                        "collector rejected {} (HTTP {status}); discarding",
                        path.display()
                    );
                    self.remove(&path)?;
                    summary.rejected += 1;
                }
                DeliveryOutcome::Transient(reason) => {
                    tracing::debug!("couldn't submit run report: {reason}");
                    summary.transient += 1;
                    (self.sleeper)(self.retry_pause);
                }
            }
        }
        Ok(summary)
    }

    /// Rename an unreadable record to a hidden `.bad` name so later flushes
    /// move on to older records.
    #[allow(clippy::unused_self)]
    fn set_aside(&self, path: &Path) -> Result<(), ReportError> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let target = path.with_file_name(format!(".{name}.bad"));
        fs::rename(path, &target).map_err(|source| io_error(path, source))
    }

    #[allow(clippy::unused_self)]
    fn remove(&self, path: &Path) -> Result<(), ReportError> {
        tracing::debug!("removing run report {}", path.display());
        fs::remove_file(path).map_err(|source| io_error(path, source))
    }
}

fn io_error(path: &Path, source: std::io::Error) -> ReportError {
    ReportError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Whether `name` has the `<secs>.<nanos>` shape of [`record_key`].
fn is_record_key(name: &str) -> bool {
    name.split_once('.').is_some_and(|(secs, nanos)| {
        !secs.is_empty()
            && secs.bytes().all(|b| b.is_ascii_digit())
            && nanos.len() == 9
            && nanos.bytes().all(|b| b.is_ascii_digit())
    })
}

/// File name for a record stamped at `at`.
fn record_key(at: DateTime<Utc>) -> String {
    format!("{}.{:09}", at.timestamp(), at.timestamp_subsec_nanos())
}
