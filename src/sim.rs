//! Software model of an MFRC522 with an optional MIFARE Classic 1K card in its field.
//!
//! Only the register behaviour the driver depends on is modelled. Card answers come from a
//! simple state machine unless a test queues scripted replies, which take precedence.

use crate::{
    config::ReaderConfig,
    mfrc522::Mfrc522,
    picc::{Block, BLOCK_SIZE},
    register::{Register, CRC_IRQ, IDLE_IRQ, MF_CRYPTO1_ON, RX_IRQ, TIMER_IRQ},
};
use core::convert::Infallible;
use embedded_hal::{digital, spi};
use std::{cell::RefCell, collections::VecDeque, rc::Rc};

const ERR_IRQ: u8 = 0x02;
const NAK: u8 = 0x04;

/// What the chip sees come back after a frame goes out
#[derive(Debug, Clone)]
pub enum Reply {
    /// No card answered, the chip timer fires
    Silent,
    /// Bytes received and the valid bits in the last one, 0 meaning all 8
    Frame(Vec<u8>, u8),
    /// ErrorReg bits raised while receiving the bytes
    Error(u8, Vec<u8>),
    /// The chip never raises an IRQ
    Hang,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum CardState {
    Idle,
    Ready,
    Active,
    Halted,
}

pub struct Card {
    pub uid: [u8; 4],
    pub atqa: [u8; 2],
    pub sak: u8,
    pub key_a: [u8; 6],
    pub key_b: [u8; 6],
    pub blocks: Vec<Block>,
    state: CardState,
    authenticated_sector: Option<u8>,
    pending_write: Option<u8>,
}

impl Card {
    pub fn classic_1k(uid: [u8; 4]) -> Card {
        let mut blocks = vec![[0u8; BLOCK_SIZE]; 64];
        let bcc = uid.iter().fold(0u8, |acc, b| acc ^ b);

        blocks[0][..4].copy_from_slice(&uid);
        blocks[0][4] = bcc;
        blocks[0][5] = 0x08;

        for trailer in (3..64).step_by(4) {
            blocks[trailer] = [
                0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x07, 0x80, 0x69, 0xff, 0xff, 0xff, 0xff,
                0xff, 0xff,
            ];
        }

        Card {
            uid,
            atqa: [0x04, 0x00],
            sak: 0x08,
            key_a: [0xff; 6],
            key_b: [0xff; 6],
            blocks,
            state: CardState::Idle,
            authenticated_sector: None,
            pending_write: None,
        }
    }

    fn bcc(&self) -> u8 {
        self.uid.iter().fold(0u8, |acc, b| acc ^ b)
    }

    fn with_crc(bytes: &[u8]) -> Vec<u8> {
        let mut frame = bytes.to_vec();

        frame.extend_from_slice(&crc_a(bytes));
        frame
    }

    fn crc_ok(frame: &[u8]) -> bool {
        frame.len() > 2 && crc_a(&frame[..frame.len() - 2]) == frame[frame.len() - 2..]
    }

    fn respond(&mut self, frame: &[u8], tx_last_bits: u8) -> Reply {
        if tx_last_bits == 7 {
            return match (frame, self.state) {
                ([0x26], CardState::Idle) | ([0x52], CardState::Idle | CardState::Halted) => {
                    self.state = CardState::Ready;
                    Reply::Frame(self.atqa.to_vec(), 0)
                }
                _ => Reply::Silent,
            };
        }

        match self.state {
            CardState::Ready => {
                if frame == [0x93, 0x20] {
                    let mut answer = self.uid.to_vec();

                    answer.push(self.bcc());
                    return Reply::Frame(answer, 0);
                }

                if frame.len() == 9
                    && frame[..2] == [0x93, 0x70]
                    && frame[2..6] == self.uid
                    && frame[6] == self.bcc()
                    && Card::crc_ok(frame)
                {
                    self.state = CardState::Active;
                    return Reply::Frame(Card::with_crc(&[self.sak]), 0);
                }

                Reply::Silent
            }
            CardState::Active => {
                if !Card::crc_ok(frame) {
                    return Reply::Silent;
                }

                if let Some(block) = self.pending_write.take() {
                    if frame.len() != BLOCK_SIZE + 2 {
                        return Reply::Frame(vec![NAK], 4);
                    }

                    self.blocks[block as usize].copy_from_slice(&frame[..BLOCK_SIZE]);
                    return Reply::Frame(vec![0x0a], 4);
                }

                let block = frame[1];
                let allowed = self.authenticated_sector == Some(block / 4);

                match frame[0] {
                    0x30 if allowed => {
                        Reply::Frame(Card::with_crc(&self.blocks[block as usize]), 0)
                    }
                    0xa0 if allowed => {
                        self.pending_write = Some(block);
                        Reply::Frame(vec![0x0a], 4)
                    }
                    0x30 | 0xa0 => Reply::Frame(vec![NAK], 4),
                    0x50 => {
                        self.state = CardState::Halted;
                        self.authenticated_sector = None;
                        Reply::Silent
                    }
                    _ => Reply::Silent,
                }
            }
            CardState::Idle | CardState::Halted => Reply::Silent,
        }
    }

    fn authenticate(&mut self, frame: &[u8]) -> bool {
        if self.state != CardState::Active || frame.len() != 12 || frame[8..] != self.uid {
            return false;
        }

        let key = match frame[0] {
            0x60 => self.key_a,
            0x61 => self.key_b,
            _ => return false,
        };

        // A failed authentication drops the card back to IDLE
        if frame[2..8] != key {
            self.state = CardState::Idle;
            self.authenticated_sector = None;
            return false;
        }

        self.authenticated_sector = Some(frame[1] / 4);
        true
    }
}

/// ISO14443A CRC, preset 0x6363, returned low byte first
pub fn crc_a(data: &[u8]) -> [u8; 2] {
    let mut crc: u16 = 0x6363;

    for byte in data {
        let mut b = byte ^ (crc & 0xff) as u8;

        b ^= b << 4;

        let b = b as u16;

        crc = (crc >> 8) ^ (b << 8) ^ (b << 3) ^ (b >> 4);
    }

    crc.to_le_bytes()
}

pub struct Mfrc522Model {
    regs: [u8; 64],
    fifo: VecDeque<u8>,
    reads: [usize; 64],
    writes: [usize; 64],
    card: Option<Card>,
    replies: VecDeque<Reply>,
    /// Every frame handed to the card, in order
    pub frames: Vec<Vec<u8>>,
    /// BitFramingReg TxLastBits of the most recent frame
    pub last_tx_bits: u8,
    /// CalcCRC never completes
    pub crc_stalls: bool,
    pub selected: bool,
    pub exchanges: usize,
}

pub type Chip = Rc<RefCell<Mfrc522Model>>;

impl Mfrc522Model {
    fn new(card: Option<Card>) -> Mfrc522Model {
        let mut model = Mfrc522Model {
            regs: [0; 64],
            fifo: VecDeque::new(),
            reads: [0; 64],
            writes: [0; 64],
            card,
            replies: VecDeque::new(),
            frames: Vec::new(),
            last_tx_bits: 0,
            crc_stalls: false,
            selected: false,
            exchanges: 0,
        };

        model.soft_reset();
        model
    }

    /// Queue a reply for the next frame sent, instead of asking the card
    pub fn script(&mut self, reply: Reply) {
        self.replies.push_back(reply);
    }

    pub fn card(&self) -> &Card {
        self.card.as_ref().expect("no card in the field")
    }

    pub fn card_mut(&mut self) -> &mut Card {
        self.card.as_mut().expect("no card in the field")
    }

    pub fn register(&self, reg: Register) -> u8 {
        self.regs[reg as usize]
    }

    pub fn reads(&self, reg: Register) -> usize {
        self.reads[reg as usize]
    }

    pub fn writes(&self, reg: Register) -> usize {
        self.writes[reg as usize]
    }

    pub fn reset_counters(&mut self) {
        self.reads = [0; 64];
        self.writes = [0; 64];
    }

    fn soft_reset(&mut self) {
        self.regs = [0; 64];
        self.regs[Register::TxControlReg as usize] = 0x80;
        self.fifo.clear();
    }

    fn read_register(&mut self, addr: usize) -> u8 {
        self.reads[addr] += 1;

        match addr {
            0x09 => self.fifo.pop_front().unwrap_or(0),
            0x0a => self.fifo.len() as u8,
            0x37 => 0x92,
            _ => self.regs[addr],
        }
    }

    fn write_register(&mut self, addr: usize, value: u8) {
        self.writes[addr] += 1;

        match addr {
            0x01 => {
                self.regs[addr] = value;
                self.execute(value & 0x0f);
            }
            // ComIrqReg and DivIrqReg: bit 7 picks whether marked bits are set or cleared
            0x04 | 0x05 => {
                if value & 0x80 != 0 {
                    self.regs[addr] |= value & 0x7f;
                } else {
                    self.regs[addr] &= !(value & 0x7f);
                }
            }
            0x08 => {
                self.regs[addr] = value;

                if value & MF_CRYPTO1_ON == 0 {
                    if let Some(card) = self.card.as_mut() {
                        card.authenticated_sector = None;
                    }
                }
            }
            0x09 => self.fifo.push_back(value),
            0x0a => {
                if value & 0x80 != 0 {
                    self.fifo.clear();
                }
            }
            0x0d => {
                self.regs[addr] = value;

                if value & 0x80 != 0 && self.regs[0x01] & 0x0f == 0x0c {
                    self.transmit();
                }
            }
            _ => self.regs[addr] = value,
        }
    }

    fn execute(&mut self, command: u8) {
        match command {
            0x03 => {
                if !self.crc_stalls {
                    let data: Vec<u8> = self.fifo.iter().copied().collect();
                    let [low, high] = crc_a(&data);

                    self.regs[Register::CRCResultRegLow as usize] = low;
                    self.regs[Register::CRCResultRegHigh as usize] = high;
                    self.regs[Register::DivIrqReg as usize] |= CRC_IRQ;
                }

                self.fifo.clear();
            }
            0x0c => self.regs[Register::ErrorReg as usize] = 0,
            0x0e => {
                self.regs[Register::ErrorReg as usize] = 0;

                let frame: Vec<u8> = self.fifo.drain(..).collect();

                self.frames.push(frame.clone());

                if let Some(reply) = self.replies.pop_front() {
                    self.apply(reply);
                    return;
                }

                let accepted = self
                    .card
                    .as_mut()
                    .map_or(false, |card| card.authenticate(&frame));

                if accepted {
                    self.regs[Register::Status2Reg as usize] |= MF_CRYPTO1_ON;
                    self.regs[Register::ComIrqReg as usize] |= IDLE_IRQ;
                } else {
                    self.regs[Register::ComIrqReg as usize] |= TIMER_IRQ;
                }
            }
            0x0f => self.soft_reset(),
            _ => {}
        }
    }

    fn transmit(&mut self) {
        let frame: Vec<u8> = self.fifo.drain(..).collect();
        let tx_last_bits = self.regs[Register::BitFramingReg as usize] & 0x07;

        self.frames.push(frame.clone());
        self.last_tx_bits = tx_last_bits;

        let reply = match self.replies.pop_front() {
            Some(reply) => reply,
            None => match self.card.as_mut() {
                Some(card) => card.respond(&frame, tx_last_bits),
                None => Reply::Silent,
            },
        };

        self.apply(reply);
    }

    fn apply(&mut self, reply: Reply) {
        let irq = &mut self.regs[Register::ComIrqReg as usize];

        match reply {
            Reply::Silent => *irq |= TIMER_IRQ,
            Reply::Frame(bytes, last_bits) => {
                *irq |= RX_IRQ | IDLE_IRQ;
                self.fifo.extend(bytes);
                self.regs[Register::ControlReg as usize] = last_bits & 0x07;
            }
            Reply::Error(bits, bytes) => {
                *irq |= RX_IRQ | IDLE_IRQ | ERR_IRQ;
                self.fifo.extend(bytes);
                self.regs[Register::ErrorReg as usize] = bits;
                self.regs[Register::ControlReg as usize] = 0;
            }
            Reply::Hang => {}
        }
    }
}

/// The SPI side of the model
pub struct SimSpi(Chip);

/// The NSS pin of the model
pub struct SimCs(Chip);

impl spi::ErrorType for SimSpi {
    type Error = Infallible;
}

impl spi::SpiBus<u8> for SimSpi {
    fn read(&mut self, _words: &mut [u8]) -> Result<(), Infallible> {
        unreachable!("register reads go through transfer")
    }

    fn write(&mut self, words: &[u8]) -> Result<(), Infallible> {
        let mut chip = self.0.borrow_mut();

        assert!(chip.selected, "write without chip select");
        assert_eq!(words.len(), 2);
        assert_eq!(words[0] & 0x81, 0, "malformed write address {:#04x}", words[0]);

        chip.exchanges += 1;
        chip.write_register((words[0] >> 1) as usize, words[1]);

        Ok(())
    }

    fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> Result<(), Infallible> {
        let mut chip = self.0.borrow_mut();

        assert!(chip.selected, "transfer without chip select");
        assert_eq!(write.len(), 2);
        assert_eq!(write[0] & 0x81, 0x80, "malformed read address {:#04x}", write[0]);

        chip.exchanges += 1;
        read[0] = 0;
        read[1] = chip.read_register(((write[0] >> 1) & 0x3f) as usize);

        Ok(())
    }

    fn transfer_in_place(&mut self, _words: &mut [u8]) -> Result<(), Infallible> {
        unreachable!("register reads go through transfer")
    }

    fn flush(&mut self) -> Result<(), Infallible> {
        Ok(())
    }
}

impl digital::ErrorType for SimCs {
    type Error = Infallible;
}

impl digital::OutputPin for SimCs {
    fn set_low(&mut self) -> Result<(), Infallible> {
        let mut chip = self.0.borrow_mut();

        assert!(!chip.selected, "chip select asserted twice");
        chip.selected = true;

        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.0.borrow_mut().selected = false;

        Ok(())
    }
}

pub fn reader(card: Option<Card>) -> (Mfrc522<SimSpi, SimCs>, Chip) {
    reader_with_config(card, ReaderConfig::default())
}

pub fn reader_with_config(
    card: Option<Card>,
    config: ReaderConfig,
) -> (Mfrc522<SimSpi, SimCs>, Chip) {
    let chip = Rc::new(RefCell::new(Mfrc522Model::new(card)));
    let mfrc522 = Mfrc522::new(SimSpi(chip.clone()), SimCs(chip.clone()), config).unwrap();

    (mfrc522, chip)
}
