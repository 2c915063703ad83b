use crate::{
    error::{Mfrc522Error, Result},
    register::Register,
};
use core::convert::Infallible;
use embedded_hal::{digital, digital::OutputPin, spi::SpiBus};
use log::trace;

/// Register level access to the MFRC522 over SPI, see Section 8.1.2.
///
/// Every register exchange runs with chip select held low and releases it before returning,
/// whether or not the exchange succeeded.
pub struct RegisterBus<SPI, CS> {
    spi: SPI,
    cs: CS,
}

/// Chip select for SPI controllers that drive the NSS line themselves, like the hardware CE0/CE1
/// lines of the Raspberry Pi.
#[derive(Debug, Default, Copy, Clone)]
pub struct HardwareSelect;

impl digital::ErrorType for HardwareSelect {
    type Error = Infallible;
}

impl OutputPin for HardwareSelect {
    fn set_low(&mut self) -> core::result::Result<(), Infallible> {
        Ok(())
    }

    fn set_high(&mut self) -> core::result::Result<(), Infallible> {
        Ok(())
    }
}

// Deasserts chip select when dropped unless released explicitly
struct Selected<'a, CS: OutputPin> {
    cs: &'a mut CS,
    released: bool,
}

impl<CS: OutputPin> Selected<'_, CS> {
    fn release(mut self) -> Result<()> {
        self.released = true;
        self.cs.set_high().map_err(Mfrc522Error::chip_select)
    }
}

impl<CS: OutputPin> Drop for Selected<'_, CS> {
    fn drop(&mut self) {
        if !self.released {
            let _ = self.cs.set_high();
        }
    }
}

impl<SPI, CS> RegisterBus<SPI, CS>
where
    SPI: SpiBus<u8>,
    CS: OutputPin,
{
    pub fn new(spi: SPI, cs: CS) -> RegisterBus<SPI, CS> {
        RegisterBus { spi, cs }
    }

    /// Give back the SPI bus and chip select pin
    pub fn release(self) -> (SPI, CS) {
        (self.spi, self.cs)
    }

    fn exchange<T>(
        &mut self,
        func: impl FnOnce(&mut SPI) -> core::result::Result<T, SPI::Error>,
    ) -> Result<T> {
        self.cs.set_low().map_err(Mfrc522Error::chip_select)?;

        let selected = Selected {
            cs: &mut self.cs,
            released: false,
        };
        let spi = &mut self.spi;
        let value = func(&mut *spi).and_then(|value| spi.flush().map(|_| value));
        let value = value.map_err(Mfrc522Error::bus)?;

        selected.release()?;

        Ok(value)
    }

    pub fn write(&mut self, reg: Register, value: u8) -> Result<()> {
        trace!("write {:?} <- {:#04x}", reg, value);

        // Section 8.1.2.2 - address byte then data byte, nothing clocked back
        let write_buffer = [reg.write_address(), value];

        self.exchange(|spi| spi.write(&write_buffer))
    }

    pub fn read(&mut self, reg: Register) -> Result<u8> {
        // Section 8.1.2.1 - the zero byte terminates the register address
        let write_buffer = [reg.read_address(), 0];
        let mut read_buffer = [0u8; 2];

        self.exchange(|spi| spi.transfer(&mut read_buffer, &write_buffer))?;

        // The result is in the second byte, not the first
        trace!("read {:?} -> {:#04x}", reg, read_buffer[1]);

        Ok(read_buffer[1])
    }

    pub fn read_write(&mut self, reg: Register, func: impl FnOnce(u8) -> u8) -> Result<()> {
        let value = self.read(reg)?;
        let new_value = func(value);
        self.write(reg, new_value)?;

        Ok(())
    }

    pub fn set_bit_mask(&mut self, reg: Register, mask: u8) -> Result<()> {
        self.read_write(reg, |value| value | mask)
    }

    pub fn clear_bit_mask(&mut self, reg: Register, mask: u8) -> Result<()> {
        self.read_write(reg, |value| value & !mask)
    }

    /// Read `reg` until `done` accepts its value, at most `budget` times.
    ///
    /// This is a spin on the bus with no sleeping; the budget is the only timeout.
    pub fn poll(
        &mut self,
        reg: Register,
        budget: u16,
        done: impl Fn(u8) -> bool,
    ) -> Result<Polled> {
        let mut value = 0;

        for _ in 0..budget {
            value = self.read(reg)?;

            if done(value) {
                return Ok(Polled::Ready(value));
            }
        }

        Ok(Polled::Exhausted(value))
    }
}

/// Outcome of a bounded register poll, carrying the last value read
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Polled {
    Ready(u8),
    Exhausted(u8),
}

impl Polled {
    pub fn is_ready(&self) -> bool {
        matches!(self, Polled::Ready(_))
    }

    pub fn value(&self) -> u8 {
        match *self {
            Polled::Ready(value) | Polled::Exhausted(value) => value,
        }
    }
}
