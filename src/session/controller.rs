//! Session controller
//!
//! Owns the session and every collaborator, and runs the cooperative loop:
//!
//! 1. poll the engine, dispatching each event it delivers, in order
//! 2. check the interrupt flag
//! 3. check the join watchdog while joining
//! 4. sleep for the poll interval
//!
//! The loop ends as soon as the session is terminal or an interrupt was seen.
//! Radio and board outputs are released when the controller is dropped, so
//! every exit path (completion, failure, timeout, interrupt, panic) cleans up.

use log::{debug, error, info, warn};

use super::{
    dispatch::{dispatch, Effect},
    gate::SendGate,
    watchdog::JoinWatchdog,
    Event, FailReason, Session, SessionReport, State, UplinkRequest, UPLINK_LEN,
};
use crate::{
    clock::Clock, config::SessionConfig, hardware::Board, lorawan::MacEngine,
    shutdown::ShutdownSignal,
};

/// What the loop should do after an iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Keep polling
    Continue,
    /// Leave the loop
    Stop,
}

/// Session controller
pub struct SessionController<M, C, S, B>
where
    M: MacEngine,
    C: Clock,
    S: ShutdownSignal,
    B: Board,
{
    /// MAC engine, sole owner of the radio
    mac: M,
    /// Time source and sleep
    clock: C,
    /// Interrupt flag
    shutdown: S,
    /// Board outputs
    board: B,
    /// Loop parameters
    config: SessionConfig,
    /// Session context
    session: Session,
    /// Join timeout guard
    watchdog: JoinWatchdog,
    /// Loop stopped by the interrupt flag
    interrupted: bool,
    /// Iterations run so far
    iterations: u64,
    /// Resources already handed back
    released: bool,
}

impl<M, C, S, B> SessionController<M, C, S, B>
where
    M: MacEngine,
    C: Clock,
    S: ShutdownSignal,
    B: Board,
{
    /// Create a controller around an initialised engine
    pub fn new(mac: M, clock: C, shutdown: S, board: B, config: SessionConfig) -> Self {
        Self {
            mac,
            clock,
            shutdown,
            board,
            config,
            session: Session::new(),
            watchdog: JoinWatchdog::new(config.join_timeout),
            interrupted: false,
            iterations: 0,
            released: false,
        }
    }

    /// Reset the engine and queue the session's single uplink
    ///
    /// The engine joins on its own before sending, so this is also what starts
    /// the join. The watchdog origin is taken here, right before the loop.
    ///
    /// The deadline only applies once the engine reports `JoinStarted`. If the
    /// engine refuses this uplink, or never reports the join, the session stays
    /// `Idle` and only an interrupt ends the loop.
    pub fn start(&mut self, payload: [u8; UPLINK_LEN]) {
        info!("Starting");
        self.mac.reset();

        let request = UplinkRequest {
            payload,
            port: self.config.port,
            confirmed: self.config.confirmed,
        };
        SendGate::request_send(&mut self.session, &mut self.mac, request);
        if self.session.pending_uplink().is_some() {
            self.board.set_activity(true);
        }

        self.watchdog.start(self.clock.now());
    }

    /// Run one loop iteration
    pub fn step(&mut self) -> Flow {
        if self.interrupted || self.session.state().is_terminal() {
            return Flow::Stop;
        }
        self.iterations += 1;

        match self.mac.poll(self.clock.now()) {
            Ok(events) => {
                for event in events.iter() {
                    self.handle(event);
                    if self.session.state().is_terminal() {
                        break;
                    }
                }
            }
            Err(e) => {
                error!("MAC engine error: {}", e);
                self.session.fail(FailReason::Mac);
            }
        }

        if self.session.begin_transmission() {
            debug!("uplink handed to the radio");
        }

        if self.shutdown.is_requested() {
            warn!("Break received, exiting!");
            self.interrupted = true;
            return Flow::Stop;
        }

        if self.watchdog.check(&mut self.session, self.clock.now()) {
            error!("EV_JOIN_TIMEOUT");
        }

        if self.session.state().is_terminal() {
            return Flow::Stop;
        }

        self.clock.sleep(self.config.poll_interval);
        Flow::Continue
    }

    /// Loop until the session ends, then release everything
    pub fn run(mut self) -> SessionReport {
        while self.step() == Flow::Continue {}

        let report = self.report();
        match report.failure {
            Some(reason) => info!("session ended: {} (exit {})", reason, report.exit_code.as_i32()),
            None => info!("session ended in {:?} (exit {})", report.state, report.exit_code.as_i32()),
        }
        self.release();
        info!("done my job!");
        report
    }

    /// Snapshot of the outcome so far
    pub fn report(&self) -> SessionReport {
        SessionReport {
            state: self.session.state(),
            exit_code: self.session.exit_code(),
            failure: self.session.failure(),
            interrupted: self.interrupted,
            iterations: self.iterations,
        }
    }

    /// Session context
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Join watchdog
    pub fn watchdog(&self) -> &JoinWatchdog {
        &self.watchdog
    }

    /// MAC engine
    pub fn mac(&self) -> &M {
        &self.mac
    }

    /// Ask for the single uplink again (dropped while one is pending)
    pub fn request_send(&mut self, payload: [u8; UPLINK_LEN]) {
        let request = UplinkRequest {
            payload,
            port: self.config.port,
            confirmed: self.config.confirmed,
        };
        SendGate::request_send(&mut self.session, &mut self.mac, request);
    }

    fn handle(&mut self, event: &Event) {
        let before = self.session.state();
        let transition = dispatch(before, event);

        if transition.termination().is_some() && transition.next == State::Failed {
            error!("{}", event);
        } else {
            info!("{}", event);
        }
        if let Event::TransmissionComplete { ack, rx_bytes } = *event {
            if ack {
                info!("Received ack");
            }
            if rx_bytes > 0 {
                info!("Received {} bytes of payload", rx_bytes);
            }
        }

        if transition.has(Effect::DisableLinkCheck) {
            // Link check is switched on by the join; the network may not support it
            self.mac.set_link_check(false);
        }

        self.session.apply(&transition, &self.watchdog);

        if before != transition.next && matches!(transition.next, State::Joined | State::Completed) {
            self.board.set_activity(false);
        }
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.mac.release();
        self.board.release();
    }
}

impl<M, C, S, B> Drop for SessionController<M, C, S, B>
where
    M: MacEngine,
    C: Clock,
    S: ShutdownSignal,
    B: Board,
{
    fn drop(&mut self) {
        self.release();
    }
}
