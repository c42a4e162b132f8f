//! Session state machine
//!
//! A session is one device lifetime: join, send a single uplink, wait for the
//! MAC engine to report the outcome, stop. This module holds the session data
//! and its state; the sub-modules drive it:
//! - [`dispatch`]: maps engine events to transitions (pure)
//! - [`watchdog`]: forces a failure when the join takes too long
//! - [`gate`]: admits at most one uplink at a time
//! - [`controller`]: owns everything and runs the cooperative poll loop

use core::fmt;
use core::time::Duration;

/// Pure event-to-transition mapping
pub mod dispatch;

/// Engine event taxonomy
pub mod event;

/// Session controller and poll loop
pub mod controller;

/// Busy-aware uplink admission
pub mod gate;

/// Join timeout guard
pub mod watchdog;

pub use dispatch::{dispatch, Effect, Transition};
pub use event::Event;

use self::watchdog::JoinWatchdog;

/// Length of the single uplink payload
pub const UPLINK_LEN: usize = 15;

/// Session state
///
/// States only move forward. `Completed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum State {
    /// Created, nothing sent yet
    Idle,
    /// OTAA join in progress
    Joining,
    /// Joined, uplink not yet on air
    Joined,
    /// Uplink handed to the engine, waiting for TX and RX windows
    Transmitting,
    /// Uplink finished (with or without acknowledgement)
    Completed,
    /// Session aborted
    Failed,
}

impl State {
    /// Whether no further transition can happen
    pub fn is_terminal(self) -> bool {
        matches!(self, State::Completed | State::Failed)
    }
}

/// Process exit status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(i32)]
pub enum ExitCode {
    /// Session completed, or stopped before any failure was recorded
    Success = 0,
    /// Hardware or transport could not be brought up; no session was created
    HardwareInit = 1,
    /// Payload rejected by strict decoding; no session was created
    InvalidPayload = 2,
    /// Session-fatal event, join timeout, or unknown event
    SessionFailed = -1,
}

impl ExitCode {
    /// Numeric process status
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

/// Why a session ended in `Failed`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FailReason {
    /// Beacon scan timed out
    ScanTimeout,
    /// Engine gave up joining
    JoinFailed,
    /// Engine gave up rejoining
    RejoinFailed,
    /// Network time synchronisation lost
    TimeSyncLost,
    /// Link declared dead
    LinkDead,
    /// Join watchdog expired
    JoinTimeout,
    /// Event code outside the known taxonomy
    UnknownEvent(u8),
    /// Engine error while polling
    Mac,
}

impl fmt::Display for FailReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailReason::ScanTimeout => f.write_str("scan timeout"),
            FailReason::JoinFailed => f.write_str("join failed"),
            FailReason::RejoinFailed => f.write_str("rejoin failed"),
            FailReason::TimeSyncLost => f.write_str("time sync lost"),
            FailReason::LinkDead => f.write_str("link dead"),
            FailReason::JoinTimeout => f.write_str("join timeout"),
            FailReason::UnknownEvent(code) => write!(f, "unknown event {}", code),
            FailReason::Mac => f.write_str("mac engine error"),
        }
    }
}

/// The one uplink of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UplinkRequest {
    /// Application payload
    pub payload: [u8; UPLINK_LEN],
    /// Application port
    pub port: u8,
    /// Whether an acknowledgement is requested
    pub confirmed: bool,
}

impl UplinkRequest {
    /// Unconfirmed uplink on `port`
    pub fn unconfirmed(port: u8, payload: [u8; UPLINK_LEN]) -> Self {
        Self {
            payload,
            port,
            confirmed: false,
        }
    }
}

/// Session context
///
/// Invariants:
/// - `join_deadline` is set exactly while `state == Joining`
/// - `exit_code` is written once, when entering `Completed` or `Failed`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    state: State,
    exit_code: Option<ExitCode>,
    failure: Option<FailReason>,
    join_deadline: Option<Duration>,
    pending_uplink: Option<UplinkRequest>,
}

impl Session {
    /// New idle session
    pub fn new() -> Self {
        Self {
            state: State::Idle,
            exit_code: None,
            failure: None,
            join_deadline: None,
            pending_uplink: None,
        }
    }

    /// Current state
    pub fn state(&self) -> State {
        self.state
    }

    /// Exit status to report; `Success` when nothing was recorded
    pub fn exit_code(&self) -> ExitCode {
        self.exit_code.unwrap_or(ExitCode::Success)
    }

    /// Exit status recorded by a terminal transition, if any
    pub fn recorded_exit_code(&self) -> Option<ExitCode> {
        self.exit_code
    }

    /// Failure cause, set together with `ExitCode::SessionFailed`
    pub fn failure(&self) -> Option<FailReason> {
        self.failure
    }

    /// Join deadline, present only while joining
    pub fn join_deadline(&self) -> Option<Duration> {
        self.join_deadline
    }

    /// Uplink accepted by the engine and not yet completed
    pub fn pending_uplink(&self) -> Option<&UplinkRequest> {
        self.pending_uplink.as_ref()
    }

    /// Apply a dispatcher transition. Ignored once the session is terminal.
    pub fn apply(&mut self, transition: &Transition, watchdog: &JoinWatchdog) {
        if self.state.is_terminal() {
            return;
        }

        for effect in transition.effects.iter() {
            match *effect {
                Effect::ArmWatchdog => {
                    if self.join_deadline.is_none() {
                        self.join_deadline = Some(watchdog.deadline());
                    }
                }
                Effect::DisarmWatchdog => self.join_deadline = None,
                Effect::Terminate(code, reason) => {
                    self.exit_code = Some(code);
                    self.failure = reason;
                }
                Effect::DisableLinkCheck => {}
            }
        }

        self.enter(transition.next);
    }

    /// Force `Failed` with exit code -1. Returns false if already terminal.
    pub fn fail(&mut self, reason: FailReason) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        self.exit_code = Some(ExitCode::SessionFailed);
        self.failure = Some(reason);
        self.enter(State::Failed);
        true
    }

    /// `Joined` with an uplink waiting moves on to `Transmitting`
    pub fn begin_transmission(&mut self) -> bool {
        if self.state == State::Joined && self.pending_uplink.is_some() {
            self.enter(State::Transmitting);
            return true;
        }
        false
    }

    pub(crate) fn set_pending_uplink(&mut self, request: UplinkRequest) {
        self.pending_uplink = Some(request);
    }

    fn enter(&mut self, next: State) {
        self.state = next;
        if next != State::Joining {
            self.join_deadline = None;
        }
        if next == State::Completed {
            self.pending_uplink = None;
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of a finished session loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionReport {
    /// State at loop exit
    pub state: State,
    /// Status for the process
    pub exit_code: ExitCode,
    /// Failure cause, if the session failed
    pub failure: Option<FailReason>,
    /// Whether the loop was stopped by the interrupt flag
    pub interrupted: bool,
    /// Number of loop iterations executed
    pub iterations: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_is_idle_with_success_default() {
        let session = Session::new();
        assert_eq!(session.state(), State::Idle);
        assert_eq!(session.exit_code(), ExitCode::Success);
        assert_eq!(session.recorded_exit_code(), None);
        assert!(session.join_deadline().is_none());
        assert!(session.pending_uplink().is_none());
    }

    #[test]
    fn test_fail_is_recorded_once() {
        let mut session = Session::new();
        assert!(session.fail(FailReason::LinkDead));
        assert!(!session.fail(FailReason::JoinTimeout));
        assert_eq!(session.state(), State::Failed);
        assert_eq!(session.failure(), Some(FailReason::LinkDead));
        assert_eq!(session.exit_code().as_i32(), -1);
    }

    #[test]
    fn test_begin_transmission_needs_pending_uplink() {
        let mut session = Session::new();
        let watchdog = JoinWatchdog::new(Duration::from_secs(15));
        session.apply(&dispatch(State::Idle, &Event::JoinSucceeded), &watchdog);
        assert_eq!(session.state(), State::Joined);
        assert!(!session.begin_transmission());

        session.set_pending_uplink(UplinkRequest::unconfirmed(1, [0; UPLINK_LEN]));
        assert!(session.begin_transmission());
        assert_eq!(session.state(), State::Transmitting);
    }

    #[test]
    fn test_exit_code_values() {
        assert_eq!(ExitCode::Success.as_i32(), 0);
        assert_eq!(ExitCode::HardwareInit.as_i32(), 1);
        assert_eq!(ExitCode::InvalidPayload.as_i32(), 2);
        assert_eq!(ExitCode::SessionFailed.as_i32(), -1);
    }
}
