/// Radio trait and its configuration types
pub mod traits;

/// Radio over a UDP gateway bridge
#[cfg(feature = "std")]
pub mod udp;

pub use traits::{ModulationParams, Radio, RxConfig, TxConfig};
#[cfg(feature = "std")]
pub use udp::{UdpRadio, UdpRadioError};
