use std::fmt;

/// Commands understood by ISO14443A / MIFARE Classic cards
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum PiccCommand {
    ReqIdl = 0x26,
    ReqAll = 0x52,
    /// Cascade level 1; both anticollision and select use it
    SelCl1 = 0x93,
    Auth1A = 0x60,
    Auth1B = 0x61,
    Read = 0x30,
    Write = 0xa0,
    Decrement = 0xc0,
    Increment = 0xc1,
    Restore = 0xc2,
    Transfer = 0xb0,
    HltA = 0x50,
}

impl From<PiccCommand> for u8 {
    fn from(cmd: PiccCommand) -> u8 {
        cmd as u8
    }
}

/// NVB for an anticollision frame carrying only SEL and NVB
pub const NVB_ANTICOLL: u8 = 0x20;
/// NVB for a select frame carrying all 40 UID bits
pub const NVB_SELECT: u8 = 0x70;
/// Low nibble of the card's 4-bit positive acknowledgement
pub const ACK: u8 = 0x0a;

pub const BLOCK_SIZE: usize = 16;

pub type Block = [u8; BLOCK_SIZE];

/// Which card population a request wakes up
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RequestMode {
    /// REQA, cards in the IDLE state only
    Idle,
    /// WUPA, also wakes halted cards
    All,
}

impl From<RequestMode> for PiccCommand {
    fn from(mode: RequestMode) -> PiccCommand {
        match mode {
            RequestMode::Idle => PiccCommand::ReqIdl,
            RequestMode::All => PiccCommand::ReqAll,
        }
    }
}

/// Which sector key to authenticate with
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AuthMode {
    KeyA,
    KeyB,
}

impl From<AuthMode> for PiccCommand {
    fn from(mode: AuthMode) -> PiccCommand {
        match mode {
            AuthMode::KeyA => PiccCommand::Auth1A,
            AuthMode::KeyB => PiccCommand::Auth1B,
        }
    }
}

/// A single size UID. Only constructed from bytes whose BCC has been checked.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct Uid([u8; 4]);

impl Uid {
    /// Accepts the 5 bytes of an anticollision answer if the last byte is the XOR of the first 4
    pub fn from_anticoll(bytes: &[u8]) -> Option<Uid> {
        match bytes {
            [a, b, c, d, bcc] if a ^ b ^ c ^ d == *bcc => Some(Uid([*a, *b, *c, *d])),
            _ => None,
        }
    }

    pub fn bytes(&self) -> &[u8; 4] {
        &self.0
    }

    /// Block Check Character
    pub fn bcc(&self) -> u8 {
        self.0.iter().fold(0u8, |acc, b| acc ^ b)
    }

    pub fn as_u32(&self) -> u32 {
        u32::from_be_bytes(self.0)
    }
}

impl fmt::Debug for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Uid({})", self)
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02x}{:02x}{:02x}{:02x}", self.0[0], self.0[1], self.0[2], self.0[3])
    }
}

/// A 6 byte MIFARE Classic sector key
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Key(pub [u8; 6]);

impl Key {
    pub fn bytes(&self) -> &[u8; 6] {
        &self.0
    }
}

impl Default for Key {
    fn default() -> Self {
        DEFAULT_KEYS[0]
    }
}

/// Factory default and widely published keys, in the order worth trying them
pub const DEFAULT_KEYS: [Key; 13] = [
    Key([0xff; 6]),
    Key([0xa0, 0xa1, 0xa2, 0xa3, 0xa4, 0xa5]),
    Key([0xb0, 0xb1, 0xb2, 0xb3, 0xb4, 0xb5]),
    Key([0x4d, 0x3a, 0x99, 0xc3, 0x51, 0xdd]),
    Key([0x1a, 0x98, 0x2c, 0x7e, 0x45, 0x9a]),
    Key([0xaa; 6]),
    Key([0xbb; 6]),
    Key([0xcc; 6]),
    Key([0x00; 6]),
    Key([0xab; 6]),
    Key([0xbc; 6]),
    Key([0x30; 6]),
    Key([0xd3, 0xf7, 0xd3, 0xf7, 0xd3, 0xf7]),
];
