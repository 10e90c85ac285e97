//! Pulse indicator LED driver.
//!
//! Generic over any `embedded-hal` [`OutputPin`], so the same driver runs
//! on the raw ESP-IDF GPIO ([`GpioOutput`]) and on a mock pin in tests.
//! The service decides when to flash; this driver only switches the pin.

use core::convert::Infallible;

use embedded_hal::digital::{ErrorType, OutputPin};
use log::debug;

use crate::app::ports::IndicatorPort;
use crate::drivers::hw_init;

/// Drives one LED through an output pin.
pub struct PulseLed<P: OutputPin> {
    pin: P,
    on: bool,
}

impl<P: OutputPin> PulseLed<P> {
    pub fn new(pin: P) -> Self {
        Self { pin, on: false }
    }

    pub fn is_on(&self) -> bool {
        self.on
    }

    pub fn release(self) -> P {
        self.pin
    }
}

impl<P: OutputPin> IndicatorPort for PulseLed<P> {
    fn set_indicator(&mut self, on: bool) {
        let result = if on { self.pin.set_high() } else { self.pin.set_low() };
        match result {
            Ok(()) => self.on = on,
            Err(_) => debug!("LED: pin write failed"),
        }
    }
}

/// A GPIO already configured as an output by [`hw_init::init_gpio`].
pub struct GpioOutput {
    gpio: i32,
}

impl GpioOutput {
    pub fn new(gpio: i32) -> Self {
        Self { gpio }
    }
}

impl ErrorType for GpioOutput {
    type Error = Infallible;
}

impl OutputPin for GpioOutput {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        hw_init::gpio_write(self.gpio, false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        hw_init::gpio_write(self.gpio, true);
        Ok(())
    }
}
