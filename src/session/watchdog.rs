//! Join watchdog
//!
//! Local guard against an engine that never reports the end of a join. The
//! deadline counts from the start of the poll loop, not from the join event.

use core::time::Duration;

use super::{FailReason, Session, State};

/// Default join timeout
pub const JOIN_TIMEOUT: Duration = Duration::from_secs(15);

/// Join timeout guard
#[derive(Debug, Clone, Copy)]
pub struct JoinWatchdog {
    /// Allowed time in `Joining`
    timeout: Duration,
    /// Loop start
    origin: Duration,
}

impl JoinWatchdog {
    /// Create a watchdog with the given timeout, origin at zero
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            origin: Duration::ZERO,
        }
    }

    /// Fix the origin the deadline counts from
    pub fn start(&mut self, origin: Duration) {
        self.origin = origin;
    }

    /// Configured timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Absolute deadline, saturating at `Duration::MAX`
    pub fn deadline(&self) -> Duration {
        self.origin.saturating_add(self.timeout)
    }

    /// Fail the session if it is still joining past its deadline
    ///
    /// Returns true when this call forced the failure.
    pub fn check(&self, session: &mut Session, now: Duration) -> bool {
        if session.state() != State::Joining {
            return false;
        }
        match session.join_deadline() {
            Some(deadline) if now > deadline => session.fail(FailReason::JoinTimeout),
            _ => false,
        }
    }
}

impl Default for JoinWatchdog {
    fn default() -> Self {
        Self::new(JOIN_TIMEOUT)
    }
}
