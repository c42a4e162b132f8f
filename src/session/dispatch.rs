//! Event dispatcher
//!
//! `dispatch` is a pure function of the current state and one engine event.
//! It never touches the engine or the clock; the controller applies the
//! returned transition to the session and carries out engine-side effects.
//!
//! Unrecognised events are fatal. An engine reporting something outside the
//! taxonomy is in a protocol state this program does not model, so the session
//! stops with a failure instead of carrying on.

use heapless::Vec;

use super::{event::Event, ExitCode, FailReason, State};

/// Upper bound on effects carried by one transition
pub const MAX_EFFECTS: usize = 3;

/// Side effect requested by a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Set the join deadline
    ArmWatchdog,
    /// Clear the join deadline
    DisarmWatchdog,
    /// Turn off link-check validation in the engine
    DisableLinkCheck,
    /// Record the exit status and stop the loop
    Terminate(ExitCode, Option<FailReason>),
}

/// Result of dispatching one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    /// State after the event
    pub next: State,
    /// Effects to carry out, in order
    pub effects: Vec<Effect, MAX_EFFECTS>,
}

impl Transition {
    /// No state change, no effects
    pub fn stay(state: State) -> Self {
        Self {
            next: state,
            effects: Vec::new(),
        }
    }

    fn to(next: State) -> Self {
        Self::stay(next)
    }

    fn with(mut self, effect: Effect) -> Self {
        // MAX_EFFECTS covers every transition built below
        let _ = self.effects.push(effect);
        self
    }

    fn failure(reason: FailReason) -> Self {
        Self::to(State::Failed)
            .with(Effect::DisarmWatchdog)
            .with(Effect::Terminate(ExitCode::SessionFailed, Some(reason)))
    }

    /// Exit status this transition records, if it terminates the session
    pub fn termination(&self) -> Option<ExitCode> {
        self.effects.iter().find_map(|effect| match effect {
            Effect::Terminate(code, _) => Some(*code),
            _ => None,
        })
    }

    /// Whether `effect` is part of this transition
    pub fn has(&self, effect: Effect) -> bool {
        self.effects.contains(&effect)
    }
}

/// Map `(state, event)` to the next state and its effects
pub fn dispatch(state: State, event: &Event) -> Transition {
    if state.is_terminal() {
        return Transition::stay(state);
    }

    match *event {
        Event::ScanTimeout => Transition::failure(FailReason::ScanTimeout),
        Event::BeaconFound
        | Event::BeaconTracked
        | Event::BeaconMissed
        | Event::Reserved
        | Event::ProtocolReset
        | Event::ReceiveComplete
        | Event::LinkAlive => Transition::stay(state),
        Event::JoinStarted => match state {
            State::Idle | State::Joining => Transition::to(State::Joining).with(Effect::ArmWatchdog),
            _ => Transition::stay(state),
        },
        Event::JoinSucceeded => match state {
            State::Idle | State::Joining => Transition::to(State::Joined)
                .with(Effect::DisarmWatchdog)
                .with(Effect::DisableLinkCheck),
            _ => Transition::stay(state),
        },
        Event::JoinFailed => Transition::failure(FailReason::JoinFailed),
        Event::RejoinFailed => Transition::failure(FailReason::RejoinFailed),
        Event::TransmissionComplete { .. } => {
            Transition::to(State::Completed).with(Effect::Terminate(ExitCode::Success, None))
        }
        Event::TimeSyncLost => Transition::failure(FailReason::TimeSyncLost),
        Event::LinkDead => Transition::failure(FailReason::LinkDead),
        Event::Unknown(code) => Transition::failure(FailReason::UnknownEvent(code)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIVE_STATES: [State; 4] = [State::Idle, State::Joining, State::Joined, State::Transmitting];

    const ALL_EVENTS: [Event; 16] = [
        Event::ScanTimeout,
        Event::BeaconFound,
        Event::BeaconMissed,
        Event::BeaconTracked,
        Event::JoinStarted,
        Event::JoinSucceeded,
        Event::Reserved,
        Event::JoinFailed,
        Event::RejoinFailed,
        Event::TransmissionComplete {
            ack: true,
            rx_bytes: 3,
        },
        Event::TimeSyncLost,
        Event::ProtocolReset,
        Event::ReceiveComplete,
        Event::LinkDead,
        Event::LinkAlive,
        Event::Unknown(42),
    ];

    #[test]
    fn test_terminal_states_absorb_every_event() {
        for state in [State::Completed, State::Failed] {
            for event in ALL_EVENTS.iter() {
                assert_eq!(dispatch(state, event), Transition::stay(state));
            }
        }
    }

    #[test]
    fn test_log_only_events_keep_state() {
        let log_only = [
            Event::BeaconFound,
            Event::BeaconMissed,
            Event::BeaconTracked,
            Event::Reserved,
            Event::ProtocolReset,
            Event::ReceiveComplete,
            Event::LinkAlive,
        ];
        for state in LIVE_STATES {
            for event in log_only.iter() {
                let t = dispatch(state, event);
                assert_eq!(t.next, state);
                assert!(t.effects.is_empty());
            }
        }
    }

    #[test]
    fn test_fatal_events_fail_from_any_live_state() {
        let fatal = [
            (Event::ScanTimeout, FailReason::ScanTimeout),
            (Event::JoinFailed, FailReason::JoinFailed),
            (Event::RejoinFailed, FailReason::RejoinFailed),
            (Event::TimeSyncLost, FailReason::TimeSyncLost),
            (Event::LinkDead, FailReason::LinkDead),
            (Event::Unknown(200), FailReason::UnknownEvent(200)),
        ];
        for state in LIVE_STATES {
            for (event, reason) in fatal.iter() {
                let t = dispatch(state, event);
                assert_eq!(t.next, State::Failed);
                assert_eq!(t.termination(), Some(ExitCode::SessionFailed));
                assert!(t.has(Effect::Terminate(ExitCode::SessionFailed, Some(*reason))));
                assert!(t.has(Effect::DisarmWatchdog));
            }
        }
    }

    #[test]
    fn test_join_started_arms_watchdog() {
        for state in [State::Idle, State::Joining] {
            let t = dispatch(state, &Event::JoinStarted);
            assert_eq!(t.next, State::Joining);
            assert!(t.has(Effect::ArmWatchdog));
        }
        // no way back from Joined
        let t = dispatch(State::Joined, &Event::JoinStarted);
        assert_eq!(t, Transition::stay(State::Joined));
    }

    #[test]
    fn test_join_succeeded_disables_link_check() {
        let t = dispatch(State::Joining, &Event::JoinSucceeded);
        assert_eq!(t.next, State::Joined);
        assert!(t.has(Effect::DisarmWatchdog));
        assert!(t.has(Effect::DisableLinkCheck));
        assert_eq!(t.termination(), None);

        let t = dispatch(State::Transmitting, &Event::JoinSucceeded);
        assert_eq!(t, Transition::stay(State::Transmitting));
    }

    #[test]
    fn test_tx_complete_succeeds_regardless_of_ack() {
        for state in LIVE_STATES {
            for (ack, rx_bytes) in [(false, 0), (true, 0), (false, 12)] {
                let t = dispatch(state, &Event::TransmissionComplete { ack, rx_bytes });
                assert_eq!(t.next, State::Completed);
                assert_eq!(t.termination(), Some(ExitCode::Success));
            }
        }
    }
}
