use crate::{
    error::{Mfrc522Error, Result},
    mfrc522::Mfrc522,
    register::{Command, Register, CRC_IRQ, FLUSH_BUFFER},
};
use embedded_hal::{digital::OutputPin, spi::SpiBus};
use log::warn;

/// CRC_A as computed by the chip's coprocessor
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Crc {
    pub low: u8,
    pub high: u8,
    /// False when the coprocessor never raised CRCIRq within the poll budget, in which case the
    /// bytes are whatever the result registers held
    pub settled: bool,
}

impl Crc {
    /// Transmission order, low byte first
    pub fn bytes(&self) -> [u8; 2] {
        [self.low, self.high]
    }
}

impl<SPI, CS> Mfrc522<SPI, CS>
where
    SPI: SpiBus<u8>,
    CS: OutputPin,
{
    /// Run the CalcCRC command over `data`, see Section 10.3.1.4
    pub fn calculate_crc(&mut self, data: &[u8]) -> Result<Crc> {
        // See Section 9.3.1.6 - Set2=0 so writing the bit clears CRCIRq
        self.bus.write(Register::DivIrqReg, CRC_IRQ)?;
        self.bus.set_bit_mask(Register::FIFOLevelReg, FLUSH_BUFFER)?;

        for byte in data {
            self.bus.write(Register::FIFODataReg, *byte)?;
        }

        self.bus.write(Register::CommandReg, Command::CalcCRC.into())?;

        let polled = self.bus.poll(
            Register::DivIrqReg,
            self.config.crc_poll_budget,
            |irq| irq & CRC_IRQ != 0,
        )?;

        // Read regardless of how the poll ended
        let low = self.bus.read(Register::CRCResultRegLow)?;
        let high = self.bus.read(Register::CRCResultRegHigh)?;

        Ok(Crc {
            low,
            high,
            settled: polled.is_ready(),
        })
    }

    /// Append the CRC of `frame` to it
    pub(crate) fn append_crc(&mut self, frame: &mut Vec<u8>) -> Result<()> {
        let crc = self.calculate_crc(frame)?;

        if !crc.settled {
            if self.config.strict_crc {
                return Err(Mfrc522Error::CrcTimeout);
            }

            warn!(
                "CRC not ready after {} polls, sending {:02x?} unverified",
                self.config.crc_poll_budget,
                crc.bytes()
            );
        }

        frame.extend_from_slice(&crc.bytes());

        Ok(())
    }
}
