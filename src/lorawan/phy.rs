use core::time::Duration;

use crate::radio::traits::{ModulationParams, RxConfig, TxConfig};

/// Default join and data channels (EU868)
pub const DEFAULT_CHANNELS: [u32; 3] = [868_100_000, 868_300_000, 868_500_000];

/// RX2 frequency
pub const RX2_FREQUENCY: u32 = 869_525_000;

/// Coding rate denominator used everywhere (4/5)
pub const CODING_RATE: u8 = 5;

/// Data rate identifier (EU868, 125 kHz)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataRate {
    /// DR0
    SF12BW125,
    /// DR1
    SF11BW125,
    /// DR2
    SF10BW125,
    /// DR3
    SF9BW125,
    /// DR4
    SF8BW125,
    /// DR5
    SF7BW125,
}

impl DataRate {
    /// Get spreading factor
    pub fn spreading_factor(&self) -> u8 {
        match self {
            DataRate::SF12BW125 => 12,
            DataRate::SF11BW125 => 11,
            DataRate::SF10BW125 => 10,
            DataRate::SF9BW125 => 9,
            DataRate::SF8BW125 => 8,
            DataRate::SF7BW125 => 7,
        }
    }

    /// Get bandwidth in Hz
    pub fn bandwidth(&self) -> u32 {
        125_000
    }

    /// Largest MACPayload accepted at this data rate
    pub fn max_payload_size(&self) -> usize {
        match self {
            DataRate::SF12BW125 | DataRate::SF11BW125 | DataRate::SF10BW125 => 59,
            DataRate::SF9BW125 => 123,
            DataRate::SF8BW125 | DataRate::SF7BW125 => 250,
        }
    }

    /// Radio modulation for this data rate
    pub fn modulation(&self) -> ModulationParams {
        ModulationParams {
            spreading_factor: self.spreading_factor(),
            bandwidth: self.bandwidth(),
            coding_rate: CODING_RATE,
        }
    }
}

/// Receive window timing, measured from the end of the uplink
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingParams {
    /// RX1 delay for data frames
    pub rx1_delay: Duration,
    /// RX2 delay for data frames
    pub rx2_delay: Duration,
    /// RX1 delay for join accepts
    pub join_accept_delay1: Duration,
    /// RX2 delay for join accepts
    pub join_accept_delay2: Duration,
}

impl Default for TimingParams {
    fn default() -> Self {
        Self {
            rx1_delay: Duration::from_secs(1),
            rx2_delay: Duration::from_secs(2),
            join_accept_delay1: Duration::from_secs(5),
            join_accept_delay2: Duration::from_secs(6),
        }
    }
}

/// Transmit configuration for one channel
pub fn tx_config(frequency: u32, data_rate: DataRate, power: i8) -> TxConfig {
    TxConfig {
        frequency,
        power,
        modulation: data_rate.modulation(),
    }
}

/// Receive configuration for one window
pub fn rx_config(frequency: u32, data_rate: DataRate, window: Duration) -> RxConfig {
    RxConfig {
        frequency,
        modulation: data_rate.modulation(),
        timeout_ms: window.as_millis().min(u32::MAX as u128) as u32,
    }
}
