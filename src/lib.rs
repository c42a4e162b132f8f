//! Single-session LoRaWAN uplink driver
//!
//! This crate drives one end-device session over a LoRaWAN network: it joins
//! over the air, sends exactly one uplink, watches the events the MAC engine
//! reports, and terminates with a process exit status.
//!
//! # Features
//! - Explicit session state machine (`Idle → Joining → Joined → Transmitting → Completed | Failed`)
//! - Pure event dispatcher, testable without a radio
//! - Join watchdog independent of the MAC engine's own failure reporting
//! - Busy-aware send gate (one outstanding uplink at a time)
//! - Minimal OTAA class A MAC engine over a generic radio trait
//! - `no_std` core; the `std` feature adds the clock, interrupt handling and UDP transport
//!
//! # Example
//! ```no_run
//! # #[cfg(feature = "std")]
//! # fn main() {
//! use lorawan_uplink::{
//!     clock::StdClock,
//!     config::{DeviceConfig, SessionConfig},
//!     hardware::{PinBoard, TracePin},
//!     lorawan::{mac::RadioMac, MacConfig},
//!     radio::UdpRadio,
//!     session::controller::SessionController,
//!     shutdown::ProcessShutdown,
//! };
//!
//! let radio = UdpRadio::bind("0.0.0.0:0", "127.0.0.1:1700").unwrap();
//! let mac = RadioMac::new(radio, DeviceConfig::default(), MacConfig::default());
//! let board = PinBoard::new(TracePin::new("led"), TracePin::new("nss"));
//!
//! let mut controller = SessionController::new(
//!     mac,
//!     StdClock::new(),
//!     ProcessShutdown,
//!     board,
//!     SessionConfig::default(),
//! );
//! controller.start([0u8; 15]);
//! let report = controller.run();
//! std::process::exit(report.exit_code.as_i32());
//! # }
//! # #[cfg(not(feature = "std"))]
//! # fn main() {}
//! ```

#![warn(missing_docs)]
#![cfg_attr(not(any(test, feature = "std")), no_std)]

/// Time source used by the session loop
pub mod clock;

/// Device and session configuration
pub mod config;

/// Cryptographic functions
pub mod crypto;

/// Board outputs touched by the session (activity LED, radio chip select)
pub mod hardware;

/// MAC engine interface and the bundled class A engine
pub mod lorawan;

/// Command-line payload decoding
pub mod payload;

/// Radio hardware abstraction layer
pub mod radio;

/// Session state machine, event dispatch and the poll loop
pub mod session;

/// Process-wide interrupt flag
pub mod shutdown;

pub use session::{
    ExitCode, FailReason, Session, SessionReport, State, UplinkRequest, UPLINK_LEN,
};
