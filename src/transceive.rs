use crate::{
    error::Result,
    mfrc522::Mfrc522,
    register::{
        Command, Register, COM_IRQ_ENABLE, FLUSH_BUFFER, IDLE_IRQ, RX_IRQ, RX_LAST_BITS, SET1,
        START_SEND, TIMER_IRQ, TRANSCEIVE_ERRORS,
    },
};
use embedded_hal::{digital::OutputPin, spi::SpiBus};
use log::{debug, warn};

/// Largest response kept from a card, in bytes
pub const MAX_LEN: usize = 16;

/// Outcome of one exchange with a card
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Status {
    Ok,
    /// The chip timer ran out before any card answered
    NoTag,
    /// Error bits were raised, or the chip never signalled completion
    Err,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransceiveResult {
    pub status: Status,
    pub data: Vec<u8>,
    /// Number of valid bits received, at most `MAX_LEN * 8`
    pub bits: usize,
}

impl TransceiveResult {
    fn failed() -> TransceiveResult {
        TransceiveResult {
            status: Status::Err,
            data: Vec::new(),
            bits: 0,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok
    }
}

/// Bits received given the FIFO level and the number of valid bits in the last byte
pub(crate) fn received_bits(fifo_level: u8, last_bits: u8) -> usize {
    let fifo_level = fifo_level as usize;
    let last_bits = last_bits as usize;

    let bits = if last_bits != 0 {
        fifo_level.saturating_sub(1) * 8 + last_bits
    } else {
        fifo_level * 8
    };

    usize::min(bits, MAX_LEN * 8)
}

impl<SPI, CS> Mfrc522<SPI, CS>
where
    SPI: SpiBus<u8>,
    CS: OutputPin,
{
    /// Send `send_data` to the card and collect its answer
    pub fn transceive(&mut self, send_data: &[u8]) -> Result<TransceiveResult> {
        self.communicate(Command::Transceive, send_data)
    }

    /// Execute a chip command that talks to the card, either Transceive or MFAuthent
    pub(crate) fn communicate(
        &mut self,
        command: Command,
        send_data: &[u8],
    ) -> Result<TransceiveResult> {
        // See Section 9.3.1.3 - enable all IRQ's except HiAlertlEn
        self.bus.write(Register::ComIEnReg, COM_IRQ_ENABLE)?;

        // See Section 9.3.1.5 - with Set1 clear, writing back the set bits clears them
        self.bus.clear_bit_mask(Register::ComIrqReg, SET1)?;

        // See Section 9.3.1.11 - clear FIFO buffer
        self.bus.set_bit_mask(Register::FIFOLevelReg, FLUSH_BUFFER)?;

        // See Section 9.3.1.2 - idle, canceling outstanding commands
        self.bus.write(Register::CommandReg, Command::Idle.into())?;

        // See Section 9.3.1.10 - Write output data to 64 byte FIFO buffer
        for byte in send_data {
            self.bus.write(Register::FIFODataReg, *byte)?;
        }

        self.bus.write(Register::CommandReg, command.into())?;

        // See Section 9.3.1.14 - start data transmission
        self.bus.set_bit_mask(Register::BitFramingReg, START_SEND)?;

        // Exit on RxIRq, IdleIRq or TimerIRq
        let polled = self.bus.poll(
            Register::ComIrqReg,
            self.config.transceive_poll_budget,
            |irq| irq & (RX_IRQ | IDLE_IRQ | TIMER_IRQ) != 0,
        )?;

        self.bus.clear_bit_mask(Register::BitFramingReg, START_SEND)?;

        if !polled.is_ready() {
            warn!(
                "{:?} gave no IRQ after {} polls",
                command, self.config.transceive_poll_budget
            );
            return Ok(TransceiveResult::failed());
        }

        let irq = polled.value();
        let err = self.bus.read(Register::ErrorReg)? & TRANSCEIVE_ERRORS;

        if err != 0 {
            debug!("{:?} failed with ErrorReg {:#04x}", command, err);
            return Ok(TransceiveResult::failed());
        }

        let status = if irq & TIMER_IRQ != 0 {
            Status::NoTag
        } else {
            Status::Ok
        };
        let mut data = Vec::new();
        let mut bits = 0;

        if irq & (RX_IRQ | IDLE_IRQ) != 0 {
            let fifo_level = self.bus.read(Register::FIFOLevelReg)? & 0x7f;
            let last_bits = self.bus.read(Register::ControlReg)? & RX_LAST_BITS;

            bits = received_bits(fifo_level, last_bits);

            // Take every byte holding a valid bit, so 4-bit ACKs come through too
            data.reserve(bits.div_ceil(8));

            for _ in 0..bits.div_ceil(8) {
                data.push(self.bus.read(Register::FIFODataReg)?);
            }
        }

        debug!(
            "{:?} {:02x?} -> {:?} {:02x?} ({} bits)",
            command, send_data, status, data, bits
        );

        Ok(TransceiveResult { status, data, bits })
    }
}
