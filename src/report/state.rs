//! Cooperative cancellation for report delivery.
//!
//! `RunState` wraps an `Arc<AtomicBool>` and exposes only what the flush
//! loop needs: [`RunState::stop`] (called from the Ctrl-C handler) and
//! [`RunState::is_running`] (checked before every delivery attempt).  An
//! optional deadline makes the state stop on its own, so an offline flush
//! cannot spin forever.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use anyhow::{Context as _, Result};

/// A cheaply-clonable "still running" flag.
///
/// Clones share the flag; the deadline is per clone.
#[derive(Debug, Clone)]
pub struct RunState {
    running: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl RunState {
    /// Create a state in the running position.
    #[must_use]
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(true)),
            deadline: None,
        }
    }

    /// A clone of this state that also stops at `deadline`.
    #[must_use]
    pub fn until(&self, deadline: Instant) -> Self {
        Self {
            running: Arc::clone(&self.running),
            deadline: Some(deadline),
        }
    }

    /// Flip to stopped; every clone observes it.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    /// Returns `true` until [`Self::stop`] is called or the deadline passes.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire) && self.deadline.is_none_or(|d| Instant::now() < d)
    }

    /// Stop this state when the process receives Ctrl-C.
    ///
    /// # Errors
    ///
    /// Returns an error if a handler is already installed.
    pub fn stop_on_interrupt(&self) -> Result<()> {
        let state = self.clone();
        ctrlc::set_handler(move || {
            tracing::debug!("interrupted; stopping");
            state.stop();
        })
        .context("installing Ctrl-C handler")
    }
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn new_state_is_running() {
        assert!(RunState::new().is_running());
    }

    #[test]
    fn stop_is_shared_between_clones() {
        let state = RunState::new();
        let cloned = state.clone();
        state.stop();
        assert!(!cloned.is_running());
    }

    #[test]
    fn past_deadline_is_not_running() {
        let state = RunState::new();
        let expired = state.until(Instant::now().checked_sub(Duration::from_secs(1)).unwrap_or_else(Instant::now));
        assert!(!expired.is_running());
        assert!(state.is_running());
    }

    #[test]
    fn future_deadline_still_running() {
        let state = RunState::new().until(Instant::now() + Duration::from_secs(3600));
        assert!(state.is_running());
        state.stop();
        assert!(!state.is_running());
    }
}
