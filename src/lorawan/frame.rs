//! LoRaWAN 1.0.x frame layout
//!
//! ```text
//! PHYPayload = MHDR | MACPayload | MIC
//! MACPayload = FHDR | FPort | FRMPayload
//! FHDR       = DevAddr | FCtrl | FCnt | FOpts
//! ```
//!
//! Builders return a [`Frame`] ready for the radio. Parsers work in place:
//! the caller's buffer is decrypted as a side effect.

use core::fmt;

use heapless::Vec;

use crate::config::device::{AESKey, DevAddr, DeviceConfig, SessionKeys};
use crate::crypto::{self, Direction, MIC_SIZE};

/// Largest PHY payload handled
pub const MAX_FRAME_SIZE: usize = 255;

/// Maximum FOpts length
pub const MAX_FOPTS_LEN: usize = 15;

/// LinkCheckReq / LinkCheckAns command identifier
pub const LINK_CHECK_REQ: u8 = 0x02;

/// A PHY payload
pub type Frame = Vec<u8, MAX_FRAME_SIZE>;

const FHDR_MIN_LEN: usize = 7;
const JOIN_ACCEPT_LEN: usize = 17;
const JOIN_ACCEPT_CFLIST_LEN: usize = 33;

/// MAC header types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MType {
    /// Join request
    JoinRequest = 0x00,
    /// Join accept
    JoinAccept = 0x20,
    /// Unconfirmed data up
    UnconfirmedDataUp = 0x40,
    /// Unconfirmed data down
    UnconfirmedDataDown = 0x60,
    /// Confirmed data up
    ConfirmedDataUp = 0x80,
    /// Confirmed data down
    ConfirmedDataDown = 0xA0,
    /// Rejoin request
    RejoinRequest = 0xC0,
    /// Proprietary
    Proprietary = 0xE0,
}

impl MType {
    /// Decode the type bits of an MHDR byte
    pub fn from_mhdr(mhdr: u8) -> Self {
        match mhdr & 0xE0 {
            0x00 => MType::JoinRequest,
            0x20 => MType::JoinAccept,
            0x40 => MType::UnconfirmedDataUp,
            0x60 => MType::UnconfirmedDataDown,
            0x80 => MType::ConfirmedDataUp,
            0xA0 => MType::ConfirmedDataDown,
            0xC0 => MType::RejoinRequest,
            _ => MType::Proprietary,
        }
    }
}

/// Frame control byte
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FCtrl {
    /// Adaptive data rate
    pub adr: bool,
    /// ADR acknowledgement request
    pub adr_ack_req: bool,
    /// Acknowledges the last confirmed frame
    pub ack: bool,
    /// Frame pending (downlink only)
    pub f_pending: bool,
    /// Length of FOpts
    pub f_opts_len: u8,
}

impl FCtrl {
    /// Encode to the wire byte
    pub fn to_byte(&self) -> u8 {
        let mut byte = self.f_opts_len & 0x0F;
        if self.adr {
            byte |= 0x80;
        }
        if self.adr_ack_req {
            byte |= 0x40;
        }
        if self.ack {
            byte |= 0x20;
        }
        if self.f_pending {
            byte |= 0x10;
        }
        byte
    }

    /// Decode from the wire byte
    pub fn from_byte(byte: u8) -> Self {
        Self {
            adr: (byte & 0x80) != 0,
            adr_ack_req: (byte & 0x40) != 0,
            ack: (byte & 0x20) != 0,
            f_pending: (byte & 0x10) != 0,
            f_opts_len: byte & 0x0F,
        }
    }
}

/// Frame building or parsing error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    /// Content does not fit a frame
    TooLarge,
    /// Wrong length, type or address
    Malformed,
    /// MIC mismatch
    BadMic,
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::TooLarge => f.write_str("frame too large"),
            FrameError::Malformed => f.write_str("malformed frame"),
            FrameError::BadMic => f.write_str("MIC mismatch"),
        }
    }
}

/// Contents of a join accept
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinAccept {
    /// Application nonce
    pub app_nonce: [u8; 3],
    /// Network identifier
    pub net_id: [u8; 3],
    /// Assigned device address
    pub dev_addr: DevAddr,
    /// RX1 data rate offset and RX2 data rate
    pub dl_settings: u8,
    /// RX1 delay in seconds (0 means 1)
    pub rx_delay: u8,
}

/// A validated data downlink
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Downlink {
    /// Confirmed data down
    pub confirmed: bool,
    /// ACK bit
    pub ack: bool,
    /// Frame counter (16 LSBs)
    pub fcnt: u16,
    /// Application port, when FRMPayload is present
    pub port: Option<u8>,
    /// Decrypted FRMPayload length
    pub payload_len: usize,
    /// LinkCheckAns (margin, gateway count) carried in FOpts
    pub link_check: Option<(u8, u8)>,
}

fn push(frame: &mut Frame, bytes: &[u8]) -> Result<(), FrameError> {
    frame.extend_from_slice(bytes).map_err(|_| FrameError::TooLarge)
}

fn payload_key(keys: &SessionKeys, port: u8) -> &AESKey {
    // port 0 carries MAC commands only
    if port == 0 {
        &keys.nwk_skey
    } else {
        &keys.app_skey
    }
}

/// Build a join request
pub fn build_join_request(device: &DeviceConfig, dev_nonce: u16) -> Result<Frame, FrameError> {
    let mut frame = Frame::new();
    push(&mut frame, &[MType::JoinRequest as u8])?;
    push(&mut frame, &device.app_eui)?;
    push(&mut frame, &device.dev_eui)?;
    push(&mut frame, &dev_nonce.to_le_bytes())?;

    let mic = crypto::compute_join_mic(&device.app_key, &frame);
    push(&mut frame, &mic)?;
    Ok(frame)
}

/// Build an encrypted join accept (network side)
pub fn build_join_accept(app_key: &AESKey, accept: &JoinAccept) -> Result<Frame, FrameError> {
    let mut frame = Frame::new();
    push(&mut frame, &[MType::JoinAccept as u8])?;
    push(&mut frame, &accept.app_nonce)?;
    push(&mut frame, &accept.net_id)?;
    push(&mut frame, &accept.dev_addr)?;
    push(&mut frame, &[accept.dl_settings, accept.rx_delay])?;

    let mic = crypto::compute_join_mic(app_key, &frame);
    push(&mut frame, &mic)?;
    crypto::encrypt_join_accept(app_key, &mut frame[1..]);
    Ok(frame)
}

/// Decrypt and validate a join accept in place
pub fn parse_join_accept(app_key: &AESKey, buffer: &mut [u8]) -> Result<JoinAccept, FrameError> {
    let len = buffer.len();
    if len != JOIN_ACCEPT_LEN && len != JOIN_ACCEPT_CFLIST_LEN {
        return Err(FrameError::Malformed);
    }
    if MType::from_mhdr(buffer[0]) != MType::JoinAccept {
        return Err(FrameError::Malformed);
    }

    crypto::decrypt_join_accept(app_key, &mut buffer[1..]);

    let (body, mic) = buffer.split_at(len - MIC_SIZE);
    if crypto::compute_join_mic(app_key, body) != mic {
        return Err(FrameError::BadMic);
    }

    let mut accept = JoinAccept {
        app_nonce: [0; 3],
        net_id: [0; 3],
        dev_addr: [0; 4],
        dl_settings: body[11],
        rx_delay: body[12],
    };
    accept.app_nonce.copy_from_slice(&body[1..4]);
    accept.net_id.copy_from_slice(&body[4..7]);
    accept.dev_addr.copy_from_slice(&body[7..11]);
    Ok(accept)
}

/// Fields of a data frame, excluding keys
#[derive(Debug, Clone, Copy)]
pub struct DataFrame<'a> {
    /// Message type (one of the data types)
    pub mtype: MType,
    /// Frame control; `f_opts_len` is taken from `fopts`
    pub fctrl: FCtrl,
    /// Full frame counter; the 16 LSBs go on air
    pub fcnt: u32,
    /// MAC commands piggybacked in the header
    pub fopts: &'a [u8],
    /// Port and plaintext FRMPayload
    pub body: Option<(u8, &'a [u8])>,
}

/// Build a data frame, encrypting FRMPayload and appending the MIC
pub fn build_data_frame(keys: &SessionKeys, data: &DataFrame<'_>) -> Result<Frame, FrameError> {
    if data.fopts.len() > MAX_FOPTS_LEN {
        return Err(FrameError::TooLarge);
    }
    let dir = match data.mtype {
        MType::UnconfirmedDataUp | MType::ConfirmedDataUp => Direction::Up,
        MType::UnconfirmedDataDown | MType::ConfirmedDataDown => Direction::Down,
        _ => return Err(FrameError::Malformed),
    };

    let fctrl = FCtrl {
        f_opts_len: data.fopts.len() as u8,
        ..data.fctrl
    };

    let mut frame = Frame::new();
    push(&mut frame, &[data.mtype as u8])?;
    push(&mut frame, &keys.dev_addr)?;
    push(&mut frame, &[fctrl.to_byte()])?;
    push(&mut frame, &(data.fcnt as u16).to_le_bytes())?;
    push(&mut frame, data.fopts)?;

    if let Some((port, payload)) = data.body {
        push(&mut frame, &[port])?;
        let start = frame.len();
        push(&mut frame, payload)?;
        crypto::crypt_payload(
            payload_key(keys, port),
            keys.dev_addr,
            data.fcnt,
            dir,
            &mut frame[start..],
        );
    }

    let mic = crypto::compute_mic(&keys.nwk_skey, &frame, keys.dev_addr, data.fcnt, dir);
    push(&mut frame, &mic)?;
    Ok(frame)
}

/// Build a data uplink with the current uplink counter
pub fn build_data_uplink(
    keys: &SessionKeys,
    confirmed: bool,
    port: u8,
    fopts: &[u8],
    payload: &[u8],
) -> Result<Frame, FrameError> {
    let mtype = if confirmed {
        MType::ConfirmedDataUp
    } else {
        MType::UnconfirmedDataUp
    };
    build_data_frame(
        keys,
        &DataFrame {
            mtype,
            fctrl: FCtrl::default(),
            fcnt: keys.fcnt_up,
            fopts,
            body: Some((port, payload)),
        },
    )
}

/// Validate and decrypt a data downlink in place
///
/// Frames addressed to another device come back as `Malformed`.
pub fn parse_downlink(keys: &SessionKeys, buffer: &mut [u8]) -> Result<Downlink, FrameError> {
    let len = buffer.len();
    if len < 1 + FHDR_MIN_LEN + MIC_SIZE {
        return Err(FrameError::Malformed);
    }
    let confirmed = match MType::from_mhdr(buffer[0]) {
        MType::UnconfirmedDataDown => false,
        MType::ConfirmedDataDown => true,
        _ => return Err(FrameError::Malformed),
    };
    if buffer[1..5] != keys.dev_addr {
        return Err(FrameError::Malformed);
    }

    let fctrl = FCtrl::from_byte(buffer[5]);
    let fcnt = u16::from_le_bytes([buffer[6], buffer[7]]);
    let header_end = 1 + FHDR_MIN_LEN + fctrl.f_opts_len as usize;
    let body_end = len - MIC_SIZE;
    if header_end > body_end {
        return Err(FrameError::Malformed);
    }

    let full_fcnt = (keys.fcnt_down & 0xFFFF_0000) | fcnt as u32;
    let (body, mic) = buffer.split_at(body_end);
    let expected = crypto::compute_mic(&keys.nwk_skey, body, keys.dev_addr, full_fcnt, Direction::Down);
    if expected != mic {
        return Err(FrameError::BadMic);
    }

    let link_check = find_link_check_ans(&buffer[8..header_end]);

    let (port, payload_len) = if body_end > header_end {
        let port = buffer[header_end];
        crypto::crypt_payload(
            payload_key(keys, port),
            keys.dev_addr,
            full_fcnt,
            Direction::Down,
            &mut buffer[header_end + 1..body_end],
        );
        (Some(port), body_end - header_end - 1)
    } else {
        (None, 0)
    };

    Ok(Downlink {
        confirmed,
        ack: fctrl.ack,
        fcnt,
        port,
        payload_len,
        link_check,
    })
}

// Only LinkCheckAns is understood; scanning stops at the first other command.
fn find_link_check_ans(fopts: &[u8]) -> Option<(u8, u8)> {
    match fopts {
        [LINK_CHECK_REQ, margin, gateways, ..] => Some((*margin, *gateways)),
        _ => None,
    }
}
