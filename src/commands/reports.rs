//! Command: inspect and deliver queued run reports.
use std::path::Path;
use std::time::Instant;

use anyhow::{Context as _, Result};

use crate::cli::ReportsCommand;
use crate::report::{FlushSummary, RunReportQueue};
use crate::run::RunContext;

/// Run a `reports` subcommand.
///
/// # Errors
///
/// Returns an error if the report store cannot be read or Ctrl-C handling
/// cannot be installed.
#[allow(clippy::print_stdout)]
pub fn run(cmd: &ReportsCommand, ctx: &RunContext) -> Result<()> {
    let queue = ctx.report_queue_with(ctx.http_transport());
    match cmd {
        ReportsCommand::Pending => {
            for line in pending(&queue)? {
                println!("{line}");
            }
        }
        ReportsCommand::Flush => {
            if !ctx.settings.report.enabled {
                ctx.log.info("run reporting is disabled; nothing flushed");
                return Ok(());
            }
            ctx.state.stop_on_interrupt()?;
            let summary = flush(ctx, &queue)?;
            ctx.log.info(&format!(
                "{} delivered, {} rejected, {} still queued",
                summary.delivered,
                summary.rejected,
                queue.pending()?.len()
            ));
        }
    }
    Ok(())
}

/// One line per queued report, oldest first: `<key>  <dep> <result>`.
///
/// # Errors
///
/// Returns an error if the store directory or a record cannot be read.
pub fn pending(queue: &RunReportQueue) -> Result<Vec<String>> {
    queue
        .pending()?
        .iter()
        .map(|path| describe(path))
        .collect()
}

fn describe(path: &Path) -> Result<String> {
    let body = std::fs::read_to_string(path)
        .with_context(|| format!("reading run report {}", path.display()))?;
    let field = |key: &str| {
        url::form_urlencoded::parse(body.as_bytes())
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
            .unwrap_or_default()
    };
    let key = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(format!("{key}  {} {}", field("dep_name"), field("result")))
}

/// Deliver queued reports until the queue drains, the configured flush
/// timeout passes, or the run is interrupted.
///
/// # Errors
///
/// Returns an error if the report store cannot be read or updated.
pub fn flush(ctx: &RunContext, queue: &RunReportQueue) -> Result<FlushSummary> {
    let deadline = Instant::now() + ctx.settings.report.flush_timeout();
    let state = ctx.state.until(deadline);
    Ok(queue.flush(&state)?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::config::{PathSettings, Settings};
    use crate::logging::Logger;
    use crate::report::transport::MockTransport;
    use crate::report::{DeliveryOutcome, Outcome, ReportSubject};
    use std::sync::Arc;

    fn context(prefix: &Path) -> RunContext {
        let settings = Settings {
            paths: PathSettings {
                prefix: prefix.display().to_string(),
            },
            ..Settings::default()
        };
        RunContext::new(settings, Arc::new(Logger::new("test")))
    }

    fn subject(name: &str) -> ReportSubject {
        ReportSubject {
            dep_name: name.to_string(),
            source_uri: "https://github.com/rig/deps".to_string(),
            public: true,
        }
    }

    #[test]
    fn pending_lists_dep_and_result() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        let queue = ctx.report_queue_with(Arc::new(MockTransport::new()));
        queue.enqueue(&subject("rake.gem"), Outcome::Ok).unwrap();
        queue.enqueue(&subject("rails.gem"), Outcome::Error).unwrap();

        let lines = pending(&queue).unwrap();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("  rake.gem ok"));
        assert!(lines[1].ends_with("  rails.gem error"));
    }

    #[test]
    fn pending_is_empty_without_store() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(&dir.path().join("never-created"));
        let queue = ctx.report_queue_with(Arc::new(MockTransport::new()));
        assert!(pending(&queue).unwrap().is_empty());
    }

    #[test]
    fn flush_delivers_through_transport() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        let mut transport = MockTransport::new();
        transport
            .expect_deliver()
            .times(1)
            .returning(|_| DeliveryOutcome::Delivered);
        let queue = ctx.report_queue_with(Arc::new(transport));
        queue.enqueue(&subject("rake.gem"), Outcome::Ok).unwrap();

        let summary = flush(&ctx, &queue).unwrap();
        assert_eq!(summary.delivered, 1);
        assert!(queue.pending().unwrap().is_empty());
    }

    #[test]
    fn flush_stops_once_the_run_is_stopped() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        let queue = ctx.report_queue_with(Arc::new(MockTransport::new()));
        queue.enqueue(&subject("rake.gem"), Outcome::Fail).unwrap();

        ctx.state.stop();
        let summary = flush(&ctx, &queue).unwrap();
        assert_eq!(summary, FlushSummary::default());
        assert_eq!(queue.pending().unwrap().len(), 1);
    }
}
