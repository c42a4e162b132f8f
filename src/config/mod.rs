//! Device and session configuration
//!
//! This module contains the typed configuration the session is built from:
//! - Device identity and root key (DevEUI, AppEUI, AppKey)
//! - Session parameters (join timeout, poll interval, uplink port)

/// Device identity and keys
pub mod device;

/// Session loop parameters
pub mod session;

pub use device::{AESKey, DevAddr, DeviceConfig, EUI64};
pub use session::SessionConfig;
