//! Events reported by the MAC engine
//!
//! Mirrors the LMIC event set, including its numeric codes, so engines that
//! speak those codes can be bridged with [`Event::from_code`].

use core::fmt;

/// Asynchronous event reported by the MAC engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Event {
    /// Beacon scan timed out
    ScanTimeout,
    /// First beacon found
    BeaconFound,
    /// Expected beacon not received
    BeaconMissed,
    /// Beacon received as expected
    BeaconTracked,
    /// Join procedure started
    JoinStarted,
    /// Join accepted, session keys established
    JoinSucceeded,
    /// Reserved engine event slot
    Reserved,
    /// Join abandoned by the engine
    JoinFailed,
    /// Rejoin abandoned by the engine
    RejoinFailed,
    /// Uplink done, RX windows closed
    TransmissionComplete {
        /// Network acknowledged a confirmed uplink
        ack: bool,
        /// Application payload bytes received in the RX windows
        rx_bytes: u8,
    },
    /// Network time synchronisation lost
    TimeSyncLost,
    /// Engine reset its MAC state
    ProtocolReset,
    /// Out-of-band downlink received
    ReceiveComplete,
    /// No downlink for too long
    LinkDead,
    /// Downlink seen again after link dead
    LinkAlive,
    /// Event code not in the taxonomy
    Unknown(u8),
}

impl Event {
    /// Decode a numeric engine event code
    ///
    /// `TransmissionComplete` decodes with no ack and no received bytes; engines
    /// that know those values construct the variant directly.
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => Event::ScanTimeout,
            2 => Event::BeaconFound,
            3 => Event::BeaconMissed,
            4 => Event::BeaconTracked,
            5 => Event::JoinStarted,
            6 => Event::JoinSucceeded,
            7 => Event::Reserved,
            8 => Event::JoinFailed,
            9 => Event::RejoinFailed,
            10 => Event::TransmissionComplete {
                ack: false,
                rx_bytes: 0,
            },
            11 => Event::TimeSyncLost,
            12 => Event::ProtocolReset,
            13 => Event::ReceiveComplete,
            14 => Event::LinkDead,
            15 => Event::LinkAlive,
            other => Event::Unknown(other),
        }
    }

    /// Log marker for the event
    pub fn name(&self) -> &'static str {
        match self {
            Event::ScanTimeout => "EV_SCAN_TIMEOUT",
            Event::BeaconFound => "EV_BEACON_FOUND",
            Event::BeaconMissed => "EV_BEACON_MISSED",
            Event::BeaconTracked => "EV_BEACON_TRACKED",
            Event::JoinStarted => "EV_JOINING",
            Event::JoinSucceeded => "EV_JOINED",
            Event::Reserved => "EV_RFU1",
            Event::JoinFailed => "EV_JOIN_FAILED",
            Event::RejoinFailed => "EV_REJOIN_FAILED",
            Event::TransmissionComplete { .. } => "EV_TXCOMPLETE",
            Event::TimeSyncLost => "EV_LOST_TSYNC",
            Event::ProtocolReset => "EV_RESET",
            Event::ReceiveComplete => "EV_RXCOMPLETE",
            Event::LinkDead => "EV_LINK_DEAD",
            Event::LinkAlive => "EV_LINK_ALIVE",
            Event::Unknown(_) => "Unknown event",
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::TransmissionComplete { .. } => {
                f.write_str("EV_TXCOMPLETE (includes waiting for RX windows)")
            }
            Event::Unknown(code) => write!(f, "Unknown event ({})", code),
            other => f.write_str(other.name()),
        }
    }
}
