use embedded_hal::{digital, spi};
use std::fmt;
use thiserror::Error;

/// Which half of a two phase MIFARE write was refused
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum WritePhase {
    Command,
    Data,
}

impl fmt::Display for WritePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WritePhase::Command => write!(f, "initiate write"),
            WritePhase::Data => write!(f, "write data"),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Mfrc522Error {
    #[error("authentication failed for block {block}")]
    Authentication { block: u8 },
    #[error("failed to read block {block}")]
    Read { block: u8 },
    #[error("failed to {phase} for block {block}")]
    Write { block: u8, phase: WritePhase },
    #[error("card answered the halt command")]
    Halt,
    #[error("CRC coprocessor did not finish")]
    CrcTimeout,
    #[error("SPI bus error: {0:?}")]
    Bus(spi::ErrorKind),
    #[error("chip select error: {0:?}")]
    ChipSelect(digital::ErrorKind),
}

impl Mfrc522Error {
    pub(crate) fn bus<E: spi::Error>(err: E) -> Mfrc522Error {
        Mfrc522Error::Bus(err.kind())
    }

    pub(crate) fn chip_select<E: digital::Error>(err: E) -> Mfrc522Error {
        Mfrc522Error::ChipSelect(err.kind())
    }
}

pub type Result<T> = std::result::Result<T, Mfrc522Error>;
