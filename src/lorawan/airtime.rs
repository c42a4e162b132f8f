//! Time on air and duty-cycle accounting
//!
//! Uses the Semtech time-on-air formula with an 8 symbol preamble, explicit
//! header and CRC on. Low data rate optimisation is on for SF11 and SF12 at
//! 125 kHz.

use core::time::Duration;

use super::phy::{DataRate, CODING_RATE};

const PREAMBLE_SYMBOLS: u64 = 8;

/// Time on air of a `len` byte PHY payload
pub fn time_on_air(data_rate: DataRate, len: usize) -> Duration {
    let sf = data_rate.spreading_factor() as i64;
    let bw = data_rate.bandwidth() as u64;
    let de = if sf >= 11 { 1 } else { 0 };
    let cr = (CODING_RATE - 4) as i64;

    // explicit header (H = 0), CRC on
    let num = 8 * len as i64 - 4 * sf + 28 + 16;
    let den = 4 * (sf - 2 * de);
    let blocks = if num > 0 { (num + den - 1) / den } else { 0 };
    let payload_symbols = 8 + (blocks * (cr + 4)) as u64;

    // counted in quarter symbols for the 4.25 symbol sync word
    let quarters = (PREAMBLE_SYMBOLS + payload_symbols) * 4 + 17;
    let micros = quarters * (1u64 << sf) * 1_000_000 / (4 * bw);
    Duration::from_micros(micros)
}

/// Band availability under a duty-cycle limit
///
/// A transmission of `airtime` keeps the band closed for
/// `airtime × (divisor − 1)`, which is a `1/divisor` duty cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DutyCycle {
    divisor: u32,
    available_at: Duration,
}

impl DutyCycle {
    /// Band limited to `1/divisor`; 0 or 1 disables the limit
    pub fn new(divisor: u32) -> Self {
        Self {
            divisor,
            available_at: Duration::ZERO,
        }
    }

    /// Whether a transmission may start at `now`
    pub fn is_available(&self, now: Duration) -> bool {
        now >= self.available_at
    }

    /// Time left before the band opens
    pub fn wait_time(&self, now: Duration) -> Duration {
        self.available_at.saturating_sub(now)
    }

    /// Account for a transmission starting at `now`
    pub fn record(&mut self, now: Duration, airtime: Duration) {
        let off = airtime * self.divisor.saturating_sub(1);
        self.available_at = now + airtime + off;
    }
}

impl Default for DutyCycle {
    fn default() -> Self {
        Self::new(100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_on_air_sf7() {
        assert_eq!(
            time_on_air(DataRate::SF7BW125, 13),
            Duration::from_micros(46_336)
        );
    }

    #[test]
    fn test_time_on_air_grows_with_spreading_factor() {
        let sf7 = time_on_air(DataRate::SF7BW125, 23);
        let sf9 = time_on_air(DataRate::SF9BW125, 23);
        let sf12 = time_on_air(DataRate::SF12BW125, 23);
        assert!(sf7 < sf9 && sf9 < sf12);
        // SF12, 23 byte join request: 1482.752 ms
        assert_eq!(sf12, Duration::from_micros(1_482_752));
    }

    #[test]
    fn test_one_percent_duty_cycle() {
        let mut band = DutyCycle::default();
        assert!(band.is_available(Duration::ZERO));

        band.record(Duration::from_secs(1), Duration::from_millis(50));
        assert!(!band.is_available(Duration::from_secs(3)));
        assert_eq!(band.wait_time(Duration::from_secs(5)), Duration::from_secs(1));
        assert!(band.is_available(Duration::from_millis(6_000)));
    }

    #[test]
    fn test_unlimited_band() {
        let mut band = DutyCycle::new(1);
        band.record(Duration::ZERO, Duration::from_millis(50));
        assert!(band.is_available(Duration::from_millis(50)));
    }
}
