//! Single status LED driver.
//!
//! Generic over any `embedded_hal` output pin: on ESP-IDF an
//! `esp_idf_hal::gpio::PinDriver`, on host a [`SimPin`].  Blink policy
//! lives in [`LedMode::next`](crate::config::LedMode::next); this driver
//! only drives the pin.

use core::convert::Infallible;

use embedded_hal::digital::{ErrorType, OutputPin};
use log::warn;

pub struct StatusLed<P: OutputPin> {
    pin: P,
    on: bool,
}

impl<P: OutputPin> StatusLed<P> {
    /// Wrap `pin`, starting dark.
    pub fn new(mut pin: P) -> Self {
        if pin.set_low().is_err() {
            warn!("status_led: pin write failed");
        }
        Self { pin, on: false }
    }

    pub fn set(&mut self, on: bool) {
        let res = if on {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        };
        if res.is_err() {
            warn!("status_led: pin write failed");
            return;
        }
        self.on = on;
    }

    pub fn is_on(&self) -> bool {
        self.on
    }

    pub fn pin(&self) -> &P {
        &self.pin
    }
}

/// In-memory pin for host builds.
#[derive(Debug, Default, Clone, Copy)]
pub struct SimPin {
    pub high: bool,
}

impl ErrorType for SimPin {
    type Error = Infallible;
}

impl OutputPin for SimPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.high = false;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.high = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drives_pin() {
        let mut led = StatusLed::new(SimPin { high: true });
        assert!(!led.pin().high);
        led.set(true);
        assert!(led.is_on());
        assert!(led.pin().high);
        led.set(false);
        assert!(!led.pin().high);
    }
}
