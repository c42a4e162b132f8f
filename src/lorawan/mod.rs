//! MAC engine interface
//!
//! The session never talks to the radio directly. Everything goes through a
//! [`MacEngine`]: reset, queue one uplink, poll for events, release. This module
//! also ships a small OTAA class A engine over the [`Radio`](crate::radio::Radio)
//! trait:
//! - Frame layout ([`frame`])
//! - Radio configuration per channel and data rate ([`phy`])
//! - Time on air and duty-cycle accounting ([`airtime`])
//! - Join, uplink and RX window handling ([`mac`])

use core::fmt;
use core::time::Duration;

use heapless::Vec;

use crate::session::{Event, UplinkRequest};

/// Time on air and duty-cycle accounting
pub mod airtime;

/// Frame building and parsing
pub mod frame;

/// Class A engine over a radio
pub mod mac;

/// Radio configuration helpers
pub mod phy;

pub use frame::FrameError;
pub use mac::{MacConfig, RadioMac};

/// Maximum number of events an engine delivers from one poll
pub const MAX_EVENTS_PER_POLL: usize = 8;

/// Events delivered by one poll, in order
pub type Events = Vec<Event, MAX_EVENTS_PER_POLL>;

/// MAC layer error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MacError<E> {
    /// Radio error
    Radio(E),
    /// A TX/RX cycle is already pending
    Busy,
    /// Payload does not fit a frame
    PayloadTooLarge,
    /// Malformed frame
    InvalidFrame,
    /// Invalid MIC
    InvalidMic,
    /// Operation needs a joined session
    NotJoined,
}

impl<E> From<FrameError> for MacError<E> {
    fn from(error: FrameError) -> Self {
        match error {
            FrameError::TooLarge => MacError::PayloadTooLarge,
            FrameError::Malformed => MacError::InvalidFrame,
            FrameError::BadMic => MacError::InvalidMic,
        }
    }
}

impl<E: fmt::Debug> fmt::Display for MacError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MacError::Radio(e) => write!(f, "radio error: {:?}", e),
            MacError::Busy => f.write_str("TX/RX cycle pending"),
            MacError::PayloadTooLarge => f.write_str("payload too large"),
            MacError::InvalidFrame => f.write_str("invalid frame"),
            MacError::InvalidMic => f.write_str("invalid MIC"),
            MacError::NotJoined => f.write_str("not joined"),
        }
    }
}

/// The radio/MAC engine as seen by the session
pub trait MacEngine {
    /// Error type of the underlying radio
    type Error: fmt::Debug;

    /// Discard MAC state and any pending transfer
    fn reset(&mut self);

    /// Whether a TX/RX cycle is pending
    fn is_busy(&self) -> bool;

    /// Schedule an uplink for the next available slot, joining first if needed
    fn queue_uplink(&mut self, request: &UplinkRequest) -> Result<(), MacError<Self::Error>>;

    /// Enable or disable link-check validation
    fn set_link_check(&mut self, enabled: bool);

    /// Run pending MAC work and return the events it produced
    fn poll(&mut self, now: Duration) -> Result<Events, MacError<Self::Error>>;

    /// Give up the radio
    fn release(&mut self);
}

impl<M: MacEngine + ?Sized> MacEngine for &mut M {
    type Error = M::Error;

    fn reset(&mut self) {
        (**self).reset()
    }

    fn is_busy(&self) -> bool {
        (**self).is_busy()
    }

    fn queue_uplink(&mut self, request: &UplinkRequest) -> Result<(), MacError<Self::Error>> {
        (**self).queue_uplink(request)
    }

    fn set_link_check(&mut self, enabled: bool) {
        (**self).set_link_check(enabled)
    }

    fn poll(&mut self, now: Duration) -> Result<Events, MacError<Self::Error>> {
        (**self).poll(now)
    }

    fn release(&mut self) {
        (**self).release()
    }
}
