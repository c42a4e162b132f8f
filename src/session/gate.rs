//! Duty-cycle send gate
//!
//! Admits an uplink only when no TX/RX cycle is pending. A refused request is
//! dropped with a log line: no queueing, no retry. Regional duty-cycle limits
//! are the engine's business; the gate only reads its busy bit.

use log::{info, warn};

use super::{Session, UplinkRequest};
use crate::lorawan::MacEngine;

/// Uplink admission
#[derive(Debug, Default, Clone, Copy)]
pub struct SendGate;

impl SendGate {
    /// Hand `request` to the engine unless a cycle is already pending
    pub fn request_send<M: MacEngine>(session: &mut Session, mac: &mut M, request: UplinkRequest) {
        if mac.is_busy() || session.pending_uplink().is_some() {
            warn!("OP_TXRXPEND, not sending");
            return;
        }

        match mac.queue_uplink(&request) {
            Ok(()) => {
                session.set_pending_uplink(request);
                info!("Packet queued");
            }
            Err(e) => warn!("uplink dropped: {}", e),
        }
    }
}
