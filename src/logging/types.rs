//! Core logging types: dependency entries, status, and the [`Log`] trait.

/// Dependency result for summary reporting.
#[derive(Debug, Clone)]
pub struct DepEntry {
    /// Dependency name.
    pub name: String,
    /// Final status of the dependency.
    pub status: DepStatus,
    /// Optional detail message (e.g., the error that stopped it).
    pub message: Option<String>,
}

/// Status of a processed dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepStatus {
    /// `met?` passed, either immediately or after `meet`.
    Met,
    /// `met?` still fails, or a requirement was not met.
    Unmet,
    /// A block raised an error or the requirements could not be resolved.
    Failed,
}

/// Abstraction over logging backends.
///
/// [`Logger`](super::logger::Logger) is the console/file implementation;
/// dependency code logs through this trait so tests can inspect what was
/// recorded.
pub trait Log: Send + Sync {
    /// Log a stage header (major section).
    fn stage(&self, msg: &str);
    /// Log an informational message.
    fn info(&self, msg: &str);
    /// Log a debug message (may be suppressed on console).
    fn debug(&self, msg: &str);
    /// Log a warning message.
    fn warn(&self, msg: &str);
    /// Log an error message.
    fn error(&self, msg: &str);
    /// Record a dependency result for the summary.
    fn record_dep(&self, name: &str, status: DepStatus, message: Option<&str>);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dep_status_equality() {
        assert_eq!(DepStatus::Met, DepStatus::Met);
        assert_ne!(DepStatus::Met, DepStatus::Unmet);
        assert_ne!(DepStatus::Unmet, DepStatus::Failed);
    }

    #[test]
    fn dep_entry_clone() {
        let entry = DepEntry {
            name: "rake.gem".to_string(),
            status: DepStatus::Failed,
            message: Some("exit 1".to_string()),
        };
        let cloned = entry.clone();
        assert_eq!(cloned.name, entry.name);
        assert_eq!(cloned.status, entry.status);
        assert_eq!(cloned.message, entry.message);
    }
}
