/// MFRC522 chip frequency
pub const MFRC_FREQ: f64 = 13.56e6;
/// See Section 9.3.3.10 - this is the desired MFRC522 countdown timer tick frequency
pub const TICK_FREQ: f64 = 1999.7;

/// Tunables for a reader instance
#[derive(Debug, Clone, PartialEq)]
pub struct ReaderConfig {
    /// How long, in seconds, the chip timer waits for a card to answer
    pub timer_interval: f64,
    /// Polls of DivIrqReg before a CRC calculation is given up on
    pub crc_poll_budget: u16,
    /// Polls of ComIrqReg before a transceive is given up on
    pub transceive_poll_budget: u16,
    /// Fail with `CrcTimeout` instead of using whatever the CRC result registers hold when the
    /// coprocessor never signals completion
    pub strict_crc: bool,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        ReaderConfig {
            timer_interval: 0.015,
            crc_poll_budget: 255,
            transceive_poll_budget: 2000,
            strict_crc: false,
        }
    }
}

impl ReaderConfig {
    /// The inverse calculation to get the desired 12-bit prescale value
    pub fn prescaler(&self) -> u16 {
        (((MFRC_FREQ - TICK_FREQ) / (2.0 * TICK_FREQ)) as u16) & 0x0fff
    }

    /// Timer reload value giving `timer_interval` at `TICK_FREQ`
    pub fn reload(&self) -> u16 {
        (self.timer_interval / (1.0 / TICK_FREQ)).ceil() as u16
    }
}
