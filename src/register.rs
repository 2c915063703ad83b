/// MFRC522 register addresses, see Section 9.2 of the datasheet
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum Register {
    CommandReg = 0x01,
    ComIEnReg = 0x02,
    DivIEnReg = 0x03,
    ComIrqReg = 0x04,
    DivIrqReg = 0x05,
    ErrorReg = 0x06,
    Status1Reg = 0x07,
    Status2Reg = 0x08,
    FIFODataReg = 0x09,
    FIFOLevelReg = 0x0A,
    WaterLevelReg = 0x0B,
    ControlReg = 0x0C,
    BitFramingReg = 0x0D,
    CollReg = 0x0E,
    ModeReg = 0x11,
    TxModeReg = 0x12,
    RxModeReg = 0x13,
    TxControlReg = 0x14,
    TxASKReg = 0x15,
    CRCResultRegHigh = 0x21,
    CRCResultRegLow = 0x22,
    TModeReg = 0x2A,
    TPrescalerReg = 0x2B,
    TReloadRegHigh = 0x2C,
    TReloadRegLow = 0x2D,
    VersionReg = 0x37,
}

impl Register {
    /// Section 8.1.2.3 - address byte for a register write; MSB clear, LSB reserved
    #[inline]
    pub fn write_address(self) -> u8 {
        ((self as u8) << 1) & 0x7e
    }

    /// Section 8.1.2.3 - address byte for a register read; MSB set
    #[inline]
    pub fn read_address(self) -> u8 {
        self.write_address() | 0x80
    }
}

impl From<Register> for u8 {
    fn from(reg: Register) -> u8 {
        reg as u8
    }
}

/// Commands executed by the MFRC522 itself, see Section 10.3
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum Command {
    Idle = 0x00,
    CalcCRC = 0x03,
    Transmit = 0x04,
    Receive = 0x08,
    Transceive = 0x0C,
    MFAuthent = 0x0E,
    SoftReset = 0x0F,
}

impl From<Command> for u8 {
    fn from(cmd: Command) -> u8 {
        cmd as u8
    }
}

// ComIrqReg bits (Section 9.3.1.5)
pub const TIMER_IRQ: u8 = 0x01;
pub const IDLE_IRQ: u8 = 0x10;
pub const RX_IRQ: u8 = 0x20;
pub const SET1: u8 = 0x80;

// DivIrqReg bits (Section 9.3.1.6)
pub const CRC_IRQ: u8 = 0x04;

// ErrorReg bits (Section 9.3.1.7) that abort a transceive:
// BufferOvfl, CollErr, ParityErr, ProtocolErr
pub const TRANSCEIVE_ERRORS: u8 = 0x1b;

// Status2Reg (Section 9.3.1.9)
pub const MF_CRYPTO1_ON: u8 = 0x08;

// FIFOLevelReg (Section 9.3.1.11)
pub const FLUSH_BUFFER: u8 = 0x80;

// ControlReg (Section 9.3.1.13)
pub const RX_LAST_BITS: u8 = 0x07;

// BitFramingReg (Section 9.3.1.14)
pub const START_SEND: u8 = 0x80;

// TxControlReg (Section 9.3.2.5) - Tx2RFEn and Tx1RFEn
pub const ANTENNA_BITS: u8 = 0x03;

// ComIEnReg value enabled for every exchange with a card
pub const COM_IRQ_ENABLE: u8 = 0x77;
