//! Command-line payload decoding
//!
//! The payload arrives as one hex string of [`UPLINK_LEN`] byte pairs.
//!
//! [`decode_lenient`] keeps the historical contract: nothing is validated.
//! Each pair is scanned like `%2hhx` (up to two leading hex digits) and a pair
//! that is missing or does not start with a hex digit decodes as `0`. Only
//! bounds-safety is added.
//!
//! [`decode_strict`] is opt-in and rejects anything that is not exactly
//! `2 * UPLINK_LEN` hex characters.

use core::fmt;

use crate::session::UPLINK_LEN;

/// Number of hex characters in a well-formed payload
pub const HEX_LEN: usize = UPLINK_LEN * 2;

/// Strict decoding error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadError {
    /// Wrong number of characters
    Length {
        /// Characters expected
        expected: usize,
        /// Characters found
        found: usize,
    },
    /// Non-hex character
    InvalidDigit {
        /// Character index
        position: usize,
        /// Offending character
        found: char,
    },
}

impl fmt::Display for PayloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayloadError::Length { expected, found } => {
                write!(f, "payload must be {} hex characters, got {}", expected, found)
            }
            PayloadError::InvalidDigit { position, found } => {
                write!(f, "invalid hex digit {:?} at position {}", found, position)
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for PayloadError {}

/// Decode without validation
pub fn decode_lenient(input: &str) -> [u8; UPLINK_LEN] {
    let bytes = input.as_bytes();
    let mut payload = [0u8; UPLINK_LEN];

    for (i, byte) in payload.iter_mut().enumerate() {
        let start = i * 2;
        let end = (start + 2).min(bytes.len());
        let pair = bytes.get(start..end).unwrap_or(&[]);
        *byte = scan_pair(pair);
    }

    payload
}

/// Decode, rejecting anything but exactly `HEX_LEN` hex characters
pub fn decode_strict(input: &str) -> Result<[u8; UPLINK_LEN], PayloadError> {
    decode_exact(input)
}

/// Decode exactly `2 * N` hex characters into `N` bytes
///
/// Also used for EUIs and keys given on the command line.
pub fn decode_exact<const N: usize>(input: &str) -> Result<[u8; N], PayloadError> {
    let found = input.chars().count();
    if found != N * 2 {
        return Err(PayloadError::Length {
            expected: N * 2,
            found,
        });
    }

    let mut bytes = [0u8; N];
    let mut high = 0u8;
    for (position, c) in input.chars().enumerate() {
        let digit = c
            .to_digit(16)
            .ok_or(PayloadError::InvalidDigit { position, found: c })? as u8;
        if position % 2 == 0 {
            high = digit;
        } else {
            bytes[position / 2] = (high << 4) | digit;
        }
    }

    Ok(bytes)
}

/// `0x`-prefixed lowercase hex rendering of a byte slice
pub struct Hex<'a>(pub &'a [u8]);

impl fmt::Display for Hex<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("0x")?;
        for b in self.0 {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

fn scan_pair(pair: &[u8]) -> u8 {
    let mut value = 0u8;
    for &c in pair {
        match (c as char).to_digit(16) {
            Some(d) => value = (value << 4) | d as u8,
            None => break,
        }
    }
    value
}
