//! Delivery of report bodies to the remote collector.
use std::time::Duration;

use ureq::Agent;

/// Result of one delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The collector accepted the report (any 2xx).
    Delivered,
    /// The collector rejected the payload itself; retrying cannot help.
    Rejected(u16),
    /// Anything else: network failure, timeout, or an unexpected status.
    Transient(String),
}

/// Sends one form-encoded report body.
#[cfg_attr(test, mockall::automock)]
pub trait Transport: Send + Sync {
    /// Attempt a single delivery; never retries internally.
    fn deliver(&self, body: &str) -> DeliveryOutcome;
}

/// Statuses meaning "payload rejected, do not retry".
pub const TERMINAL_REJECTIONS: &[u16] = &[406, 422];

/// Classify an HTTP status code.
#[must_use]
pub fn classify_status(status: u16) -> DeliveryOutcome {
    if (200..300).contains(&status) {
        DeliveryOutcome::Delivered
    } else if TERMINAL_REJECTIONS.contains(&status) {
        DeliveryOutcome::Rejected(status)
    } else {
        DeliveryOutcome::Transient(format!("HTTP {status}"))
    }
}

/// [`Transport`] posting to the collector over HTTP with `ureq`.
#[derive(Debug)]
pub struct HttpTransport {
    agent: Agent,
    url: String,
}

impl HttpTransport {
    /// Create a transport for `url` with the given open and read timeouts.
    pub fn new(url: impl Into<String>, open_timeout: Duration, read_timeout: Duration) -> Self {
        let config = Agent::config_builder()
            .timeout_connect(Some(open_timeout))
            .timeout_recv_response(Some(read_timeout))
            .timeout_recv_body(Some(read_timeout))
            .http_status_as_error(false)
            .build();
        Self {
            agent: Agent::new_with_config(config),
            url: url.into(),
        }
    }

    /// Collector endpoint.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Transport for HttpTransport {
    fn deliver(&self, body: &str) -> DeliveryOutcome {
        let response = self
            .agent
            .post(&self.url)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .send(body);
        match response {
            Ok(response) => classify_status(response.status().as_u16()),
            Err(e) => DeliveryOutcome::Transient(e.to_string()),
        }
    }
}
