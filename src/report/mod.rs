//! Run-outcome reporting.
//!
//! When a dependency from a public source finishes resolving, its outcome
//! is written to the durable [`RunReportQueue`].  [`RunReportQueue::flush`]
//! later posts pending records to the collector through a [`Transport`],
//! newest first, while a [`RunState`] says the run is still going.
//!
//! Reporting is best-effort: callers log queue failures and carry on.
pub mod queue;
pub mod state;
pub mod transport;

pub use queue::{FlushSummary, Outcome, ReportSubject, RunReport, RunReportQueue};
pub use state::RunState;
pub use transport::{DeliveryOutcome, HttpTransport, Transport};
