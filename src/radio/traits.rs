use core::fmt::Debug;

/// Radio modulation parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModulationParams {
    /// Spreading factor (SF7-SF12)
    pub spreading_factor: u8,
    /// Bandwidth in Hz
    pub bandwidth: u32,
    /// Coding rate denominator (5 for 4/5 ... 8 for 4/8)
    pub coding_rate: u8,
}

/// Radio transmission parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxConfig {
    /// Transmission power in dBm
    pub power: i8,
    /// Frequency in Hz
    pub frequency: u32,
    /// Modulation parameters
    pub modulation: ModulationParams,
}

/// Radio receive parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RxConfig {
    /// Frequency in Hz
    pub frequency: u32,
    /// Modulation parameters
    pub modulation: ModulationParams,
    /// Receive timeout in milliseconds
    pub timeout_ms: u32,
}

/// Generic radio interface trait
pub trait Radio {
    /// Error type for radio operations
    type Error: Debug;

    /// Initialize the radio
    fn init(&mut self) -> Result<(), Self::Error>;

    /// Configure the radio for transmission
    fn configure_tx(&mut self, config: TxConfig) -> Result<(), Self::Error>;

    /// Configure the radio for reception and start listening
    fn configure_rx(&mut self, config: RxConfig) -> Result<(), Self::Error>;

    /// Transmit data
    fn transmit(&mut self, buffer: &[u8]) -> Result<(), Self::Error>;

    /// Take a received packet, if one is waiting
    ///
    /// Returns the number of bytes written to `buffer`, or `WouldBlock` when
    /// nothing has arrived.
    fn receive(&mut self, buffer: &mut [u8]) -> nb::Result<usize, Self::Error>;

    /// Put the radio into sleep mode
    fn sleep(&mut self) -> Result<(), Self::Error>;
}

impl<R: Radio + ?Sized> Radio for &mut R {
    type Error = R::Error;

    fn init(&mut self) -> Result<(), Self::Error> {
        (**self).init()
    }

    fn configure_tx(&mut self, config: TxConfig) -> Result<(), Self::Error> {
        (**self).configure_tx(config)
    }

    fn configure_rx(&mut self, config: RxConfig) -> Result<(), Self::Error> {
        (**self).configure_rx(config)
    }

    fn transmit(&mut self, buffer: &[u8]) -> Result<(), Self::Error> {
        (**self).transmit(buffer)
    }

    fn receive(&mut self, buffer: &mut [u8]) -> nb::Result<usize, Self::Error> {
        (**self).receive(buffer)
    }

    fn sleep(&mut self) -> Result<(), Self::Error> {
        (**self).sleep()
    }
}
