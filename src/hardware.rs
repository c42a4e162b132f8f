//! Board outputs touched by a session
//!
//! The session lights an activity LED while an uplink is in flight and, on the
//! way out, must leave the board as it found it: LED off, radio deselected.

use embedded_hal::digital::v2::OutputPin;
use log::{trace, warn};

/// Outputs the session controller drives
pub trait Board {
    /// Show or clear the activity indicator
    fn set_activity(&mut self, on: bool);

    /// Restore outputs to their idle levels
    fn release(&mut self);
}

impl<B: Board + ?Sized> Board for &mut B {
    fn set_activity(&mut self, on: bool) {
        (**self).set_activity(on)
    }

    fn release(&mut self) {
        (**self).release()
    }
}

/// Board made of two output pins
pub struct PinBoard<LED, CS>
where
    LED: OutputPin,
    CS: OutputPin,
{
    led: LED,
    cs: CS,
    released: bool,
}

impl<LED, CS> PinBoard<LED, CS>
where
    LED: OutputPin,
    CS: OutputPin,
{
    /// Create a board from the activity LED and the radio chip-select pin
    pub fn new(led: LED, cs: CS) -> Self {
        Self {
            led,
            cs,
            released: false,
        }
    }

    /// Give back the pins
    pub fn free(self) -> (LED, CS) {
        (self.led, self.cs)
    }
}

impl<LED, CS> Board for PinBoard<LED, CS>
where
    LED: OutputPin,
    CS: OutputPin,
{
    fn set_activity(&mut self, on: bool) {
        let result = if on {
            self.led.set_high()
        } else {
            self.led.set_low()
        };
        if result.is_err() {
            warn!("activity LED not driven");
        }
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        if self.led.set_low().is_err() {
            warn!("activity LED not cleared");
        }
        // NSS high deselects the radio
        if self.cs.set_high().is_err() {
            warn!("radio chip select not released");
        }
    }
}

/// Output pin with no hardware behind it; records and traces its level
#[derive(Debug, Clone, Copy)]
pub struct TracePin {
    name: &'static str,
    high: bool,
}

impl TracePin {
    /// New pin, initially low
    pub fn new(name: &'static str) -> Self {
        Self { name, high: false }
    }

    /// Current level
    pub fn is_set_high(&self) -> bool {
        self.high
    }
}

impl OutputPin for TracePin {
    type Error = core::convert::Infallible;

    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.high = false;
        trace!("{} low", self.name);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.high = true;
        trace!("{} high", self.name);
        Ok(())
    }
}
