//! STM32G0 bindings for the DDC channel and the output enable line.

#![cfg(target_os = "none")]

use embassy_stm32::gpio::Output;
use embassy_stm32::i2c::{self, I2c};
use embassy_stm32::mode::Blocking;

use crate::display::sink::{DdcBus, EDID_I2C_ADDRESS, EdidBlock, OutputEnable};

/// Blocking I2C master wired to the sink's DDC pins.
pub struct Stm32Ddc<'d> {
    i2c: I2c<'d, Blocking>,
}

impl<'d> Stm32Ddc<'d> {
    pub fn new(i2c: I2c<'d, Blocking>) -> Self {
        Self { i2c }
    }
}

impl DdcBus for Stm32Ddc<'_> {
    type Error = i2c::Error;

    fn read_base_block(&mut self, block: &mut EdidBlock) -> Result<(), Self::Error> {
        self.i2c.blocking_write_read(EDID_I2C_ADDRESS, &[0x00], block)
    }
}

/// Push-pull enable pin for the display output stage, active high.
pub struct EnablePin<'d> {
    pin: Output<'d>,
}

impl<'d> EnablePin<'d> {
    pub fn new(pin: Output<'d>) -> Self {
        Self { pin }
    }
}

impl OutputEnable for EnablePin<'_> {
    fn set_enabled(&mut self, enabled: bool) {
        if enabled {
            self.pin.set_high();
        } else {
            self.pin.set_low();
        }
    }
}
