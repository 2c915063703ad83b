use crate::{
    bus::RegisterBus,
    config::ReaderConfig,
    error::{Mfrc522Error, Result, WritePhase},
    picc::{
        AuthMode, Block, Key, PiccCommand, RequestMode, Uid, ACK, BLOCK_SIZE, NVB_ANTICOLL,
        NVB_SELECT,
    },
    register::{Command, Register, ANTENNA_BITS, MF_CRYPTO1_ON},
    transceive::Status,
};
use embedded_hal::{digital::OutputPin, spi::SpiBus};
use log::{debug, warn};

/// What the reader knows about its own state
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub antenna_on: bool,
    pub authenticated: bool,
}

/// An MFRC522 talking to MIFARE Classic cards.
///
/// The antenna is powered on by [`Mfrc522::new`] and powered off again when the reader is
/// dropped or [`Mfrc522::close`]d. Nothing here is synchronized; share a reader between threads
/// only behind a lock.
pub struct Mfrc522<SPI, CS>
where
    SPI: SpiBus<u8>,
    CS: OutputPin,
{
    pub(crate) bus: RegisterBus<SPI, CS>,
    pub(crate) config: ReaderConfig,
    session: SessionState,
}

impl<SPI, CS> Mfrc522<SPI, CS>
where
    SPI: SpiBus<u8>,
    CS: OutputPin,
{
    pub fn new(spi: SPI, cs: CS, config: ReaderConfig) -> Result<Mfrc522<SPI, CS>> {
        let mut mfrc522 = Mfrc522 {
            bus: RegisterBus::new(spi, cs),
            config,
            session: SessionState {
                antenna_on: false,
                authenticated: false,
            },
        };

        mfrc522.reset()?;

        Ok(mfrc522)
    }

    pub fn reset(&mut self) -> Result<()> {
        // See Section 9.3.1.2 - soft reset the chip, setting all registers to defaults
        self.bus.write(Register::CommandReg, Command::SoftReset.into())?;
        self.session.authenticated = false;

        let prescale_bytes = self.config.prescaler().to_be_bytes();

        // See Section 9.3.3.10:
        // TAuto=1 - timer starts automatically at the end of the transmission in all communication modes at all speeds
        // TGated=0 - timer is not gated by pins MFIN or AUX1
        // TAutoRestart=0 - set IRQ bit instead of restarting timer
        // TPrescaler_Hi=hh - high 4-bits of prescaler value
        self.bus.write(Register::TModeReg, 0x80 | (prescale_bytes[0] & 0xF))?;
        // TPreScalerLo=ll - low bits of prescaler value
        self.bus.write(Register::TPrescalerReg, prescale_bytes[1])?;

        let timer_tick_bytes = self.config.reload().to_be_bytes();

        // See Section 9.3.3.11 - timer reload value
        // e.g. with prescaler interval of 0.5ms, reload time with 30 gives 15ms timeout
        self.bus.write(Register::TReloadRegLow, timer_tick_bytes[1])?;
        self.bus.write(Register::TReloadRegHigh, timer_tick_bytes[0])?;

        // See Section 9.3.2.6
        // ForceASK100=1 - Force 100% ASK (Amplitude Shift Keying) modulation always
        self.bus.write(Register::TxASKReg, 0b0100_0000)?;

        // See Section 9.3.2.2 - preset value for the CRC coprocessor for the CalcCRC command to 0x6363 (ISO 14443-3 part 6.2.4)
        // MSBFirst=0 - do not calc CRC with MSB first
        // TxWaitRF=1 - transmitter can only be started if RF field is generated
        // PolMFin=0 - MFIN is active LOW
        // CRCPreset=01 - CRC preset value is 0x6363
        self.bus.write(Register::ModeReg, 0b0011_1101)?;

        self.antenna_on()
    }

    pub fn version(&mut self) -> Result<u8> {
        self.bus.read(Register::VersionReg)
    }

    pub fn session(&self) -> SessionState {
        self.session
    }

    /// See Section 9.3.2.5
    /// Tx2RFEn=1 and Tx1RFEn=1 - output 13.56MHz carrier signal on TX1 and TX2
    pub fn antenna_on(&mut self) -> Result<()> {
        let value = self.bus.read(Register::TxControlReg)?;

        if value & ANTENNA_BITS != ANTENNA_BITS {
            self.bus.set_bit_mask(Register::TxControlReg, ANTENNA_BITS)?;
        }

        self.session.antenna_on = true;

        Ok(())
    }

    pub fn antenna_off(&mut self) -> Result<()> {
        self.bus.clear_bit_mask(Register::TxControlReg, ANTENNA_BITS)?;
        self.session.antenna_on = false;

        Ok(())
    }

    /// Power the antenna down, reporting any failure that dropping the reader would swallow
    pub fn close(mut self) -> Result<()> {
        self.antenna_off()
    }

    /// Ask cards in the field for their ATQA.
    ///
    /// Only a 16 bit answer counts; anything else is `None`.
    pub fn request(&mut self, mode: RequestMode) -> Result<Option<[u8; 2]>> {
        // Section 9.3.1.14 - REQA and WUPA are 7 bit short frames
        self.bus.write(Register::BitFramingReg, 0x07)?;

        let command: PiccCommand = mode.into();
        let result = self.transceive(&[u8::from(command)])?;

        match result.data[..] {
            [low, high] if result.is_ok() && result.bits == 16 => Ok(Some([low, high])),
            _ => {
                debug!("request {:?} got {:?} with {} bits", mode, result.status, result.bits);
                Ok(None)
            }
        }
    }

    /// Anticollision for cascade level 1, returning the UID once its BCC checks out
    pub fn anticoll(&mut self) -> Result<Option<Uid>> {
        // Section 9.3.1.14 - full bytes from here on
        self.bus.write(Register::BitFramingReg, 0x00)?;

        let result = self.transceive(&[u8::from(PiccCommand::SelCl1), NVB_ANTICOLL])?;

        if result.status != Status::Ok {
            return Ok(None);
        }

        let uid = Uid::from_anticoll(&result.data);

        if uid.is_none() {
            debug!("anticollision answer {:02x?} has a bad BCC or length", result.data);
        }

        Ok(uid)
    }

    /// Select the card with `uid`, returning its SAK, or 0 when no card answered properly
    pub fn select_tag(&mut self, uid: &Uid) -> Result<u8> {
        let mut frame = vec![u8::from(PiccCommand::SelCl1), NVB_SELECT];

        frame.extend_from_slice(uid.bytes());
        frame.push(uid.bcc());
        self.append_crc(&mut frame)?;

        let result = self.transceive(&frame)?;

        if result.is_ok() && result.bits == 24 {
            Ok(result.data[0])
        } else {
            debug!("select {} got {:?} with {} bits", uid, result.status, result.bits);
            Ok(0)
        }
    }

    /// Three pass authentication of the sector holding `block`.
    ///
    /// The chip runs the exchange itself and leaves MFCrypto1On set when it worked.
    pub fn authenticate(&mut self, mode: AuthMode, block: u8, key: &Key, uid: &Uid) -> Result<()> {
        let command: PiccCommand = mode.into();
        let mut frame = vec![u8::from(command), block];

        frame.extend_from_slice(key.bytes());
        frame.extend_from_slice(uid.bytes());

        let result = self.communicate(Command::MFAuthent, &frame)?;
        let crypto_on = self.bus.read(Register::Status2Reg)? & MF_CRYPTO1_ON != 0;

        self.session.authenticated = result.is_ok() && crypto_on;

        if !self.session.authenticated {
            debug!(
                "authenticate block {} got {:?}, crypto1 {}",
                block, result.status, crypto_on
            );
            return Err(Mfrc522Error::Authentication { block });
        }

        Ok(())
    }

    /// Leave the encrypted session with the card
    pub fn stop_crypto1(&mut self) -> Result<()> {
        self.bus.clear_bit_mask(Register::Status2Reg, MF_CRYPTO1_ON)?;
        self.session.authenticated = false;

        Ok(())
    }

    pub fn read(&mut self, block: u8) -> Result<Block> {
        if !self.session.authenticated {
            warn!("reading block {} without authentication", block);
        }

        let mut frame = vec![u8::from(PiccCommand::Read), block];

        self.append_crc(&mut frame)?;

        let result = self.transceive(&frame)?;

        if !result.is_ok() || result.data.len() != BLOCK_SIZE {
            debug!("read block {} got {:?} with {} bytes", block, result.status, result.data.len());
            return Err(Mfrc522Error::Read { block });
        }

        let mut data = [0u8; BLOCK_SIZE];

        data.copy_from_slice(&result.data);

        Ok(data)
    }

    /// Write a whole block; the card acknowledges the command and then the data
    pub fn write(&mut self, block: u8, data: &Block) -> Result<()> {
        if !self.session.authenticated {
            warn!("writing block {} without authentication", block);
        }

        let mut frame = vec![u8::from(PiccCommand::Write), block];

        self.append_crc(&mut frame)?;
        self.expect_ack(&frame, block, WritePhase::Command)?;

        let mut frame = data.to_vec();

        self.append_crc(&mut frame)?;
        self.expect_ack(&frame, block, WritePhase::Data)
    }

    fn expect_ack(&mut self, frame: &[u8], block: u8, phase: WritePhase) -> Result<()> {
        let result = self.transceive(frame)?;

        match result.data[..] {
            [ack] if result.is_ok() && result.bits == 4 && ack & 0x0f == ACK => Ok(()),
            _ => {
                debug!(
                    "{} for block {} got {:?} {:02x?}",
                    phase, block, result.status, result.data
                );
                Err(Mfrc522Error::Write { block, phase })
            }
        }
    }

    /// Put the selected card in the HALT state. A card that is halted says nothing back.
    pub fn halt(&mut self) -> Result<()> {
        let mut frame = vec![u8::from(PiccCommand::HltA), 0x00];

        self.append_crc(&mut frame)?;

        let result = self.transceive(&frame)?;

        if result.status == Status::Ok && result.bits > 0 {
            return Err(Mfrc522Error::Halt);
        }

        Ok(())
    }

    /// REQA followed by anticollision; `None` when no card is in the field
    pub fn read_uid(&mut self) -> Result<Option<Uid>> {
        if self.request(RequestMode::Idle)?.is_none() {
            return Ok(None);
        }

        self.anticoll()
    }
}

impl<SPI, CS> Drop for Mfrc522<SPI, CS>
where
    SPI: SpiBus<u8>,
    CS: OutputPin,
{
    fn drop(&mut self) {
        if self.session.antenna_on {
            if let Err(err) = self.antenna_off() {
                warn!("could not power down the antenna: {}", err);
            }
        }
    }
}
