mod bus;
mod cancellation_token;
mod card_type;
mod config;
mod crc;
mod error;
mod log_macros;
mod mfrc522;
mod picc;
mod register;
#[cfg(test)]
mod sim;
mod transceive;

pub use crate::{
    bus::{HardwareSelect, Polled, RegisterBus},
    card_type::{identify, CardType},
    config::ReaderConfig,
    crc::Crc,
    error::{Mfrc522Error, WritePhase},
    mfrc522::{Mfrc522, SessionState},
    picc::{AuthMode, Block, Key, PiccCommand, RequestMode, Uid, BLOCK_SIZE, DEFAULT_KEYS},
    register::{Command, Register},
    transceive::{Status, TransceiveResult, MAX_LEN},
};
use cancellation_token::CancellationToken;
use clap::{Args, Parser, Subcommand, ValueEnum};
use core::fmt::Arguments;
use embedded_hal::{digital::OutputPin, spi::SpiBus};
use log::LevelFilter;
use rppal::{
    gpio::Gpio,
    spi::{Bus, Mode, SlaveSelect, Spi},
};
use std::error::Error;
use std::time::Duration;

pub trait Mfrc522ClassicLog {
    fn output(self: &Self, args: Arguments);
    fn warning(self: &Self, args: Arguments);
    fn error(self: &Self, args: Arguments);
    /// Turn colored output on or off
    fn color(self: &Self, _enabled: bool) {}
}

pub struct Mfrc522ClassicTool<'a> {
    log: &'a dyn Mfrc522ClassicLog,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
#[repr(u8)]
enum BcmPin {
    Pin1 = 1,
    Pin2,
    Pin3,
    Pin4,
    Pin5,
    Pin6,
    Pin7,
    Pin8,
    Pin9,
    Pin10,
    Pin11,
    Pin12,
    Pin13,
    Pin14,
    Pin15,
    Pin16,
    Pin17,
    Pin18,
    Pin19,
    Pin20,
    Pin21,
    Pin22,
    Pin23,
    Pin24,
    Pin25,
    Pin26,
    Pin27,
}

#[derive(Parser)]
#[clap(version, about, long_about = None)]
struct Cli {
    /// Disable colors in output
    #[arg(long = "no-color", short = 'n', env = "NO_CLI_COLOR")]
    no_color: bool,
    #[arg(long = "high", short = '1')]
    high_pins: Vec<BcmPin>,
    #[arg(long = "low", short = '0')]
    low_pins: Vec<BcmPin>,
    #[arg(long = "reset", short = 'r')]
    reset_pin: BcmPin,
    /// Drive this pin as chip select instead of relying on CE0
    #[arg(long = "cs")]
    cs_pin: Option<BcmPin>,
    /// SPI clock in Hz
    #[arg(long = "clock", env = "MFRC522_SPI_CLOCK", default_value_t = 1_000_000)]
    clock: u32,
    /// Fail when the CRC coprocessor does not finish instead of sending unchecked CRCs
    #[arg(long = "strict-crc")]
    strict_crc: bool,
    /// Log driver activity, twice for every register access
    #[arg(long = "verbose", short = 'v', action = clap::ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Option<CardCommand>,
}

#[derive(Subcommand, Clone)]
enum CardCommand {
    /// Print the UID and type of each card brought to the reader (default)
    Uid,
    /// Print the contents of a block
    Read {
        #[arg(long, short)]
        block: u8,
        #[command(flatten)]
        key: KeyArgs,
    },
    /// Overwrite a block with 16 bytes given as 32 hex digits
    Write {
        #[arg(long, short)]
        block: u8,
        #[arg(long, short, value_parser = parse_block)]
        data: Block,
        #[command(flatten)]
        key: KeyArgs,
    },
    /// Find which of the well known keys opens the sector holding a block
    Keys {
        #[arg(long, short)]
        block: u8,
    },
}

#[derive(Args, Clone)]
struct KeyArgs {
    /// Sector key as 12 hex digits
    #[arg(long, short, value_parser = parse_key, default_value = "ffffffffffff")]
    key: Key,
    /// Authenticate with key B rather than key A
    #[arg(long = "key-b")]
    key_b: bool,
}

impl KeyArgs {
    fn mode(&self) -> AuthMode {
        if self.key_b {
            AuthMode::KeyB
        } else {
            AuthMode::KeyA
        }
    }
}

fn parse_hex<const N: usize>(s: &str) -> Result<[u8; N], String> {
    let s = s.trim_start_matches("0x");

    if s.len() != N * 2 || !s.is_ascii() {
        return Err(format!("expected {} hex digits", N * 2));
    }

    let mut bytes = [0u8; N];

    for (i, byte) in bytes.iter_mut().enumerate() {
        *byte = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16).map_err(|err| err.to_string())?;
    }

    Ok(bytes)
}

fn parse_key(s: &str) -> Result<Key, String> {
    parse_hex::<6>(s).map(Key)
}

fn parse_block(s: &str) -> Result<Block, String> {
    parse_hex::<BLOCK_SIZE>(s)
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

// Time between looks for a card
const POLL_INTERVAL: Duration = Duration::from_millis(500);

impl<'a> Mfrc522ClassicTool<'a> {
    pub fn new(log: &'a dyn Mfrc522ClassicLog) -> Mfrc522ClassicTool<'a> {
        Mfrc522ClassicTool { log }
    }

    pub fn run(
        self: &mut Self,
        args: impl IntoIterator<Item = std::ffi::OsString>,
    ) -> Result<(), Box<dyn Error>> {
        let cli = match Cli::try_parse_from(args) {
            Ok(m) => m,
            Err(err) => {
                output!(self.log, "{}", err.to_string());
                return Ok(());
            }
        };

        self.log.color(!cli.no_color);
        log::set_max_level(match cli.verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        });

        let mut reset_pin = Gpio::new()?.get(cli.reset_pin as u8)?.into_output();

        reset_pin.set_reset_on_drop(false);

        reset_pin.set_low();
        std::thread::sleep(Duration::from_millis(100));

        for bcm_pin in &cli.low_pins {
            let mut pin = Gpio::new()?.get(*bcm_pin as u8)?.into_output();

            pin.set_reset_on_drop(false);
            pin.set_low();
        }

        for bcm_pin in &cli.high_pins {
            let mut pin = Gpio::new()?.get(*bcm_pin as u8)?.into_output();

            pin.set_reset_on_drop(false);
            pin.set_high();
        }

        reset_pin.set_high();
        std::thread::sleep(Duration::from_millis(50));

        let token = CancellationToken::new();
        let token_clone = token.clone();

        ctrlc::set_handler(move || {
            eprintln!("Ctrl+C received, stopping...");
            token_clone.cancel();
        })?;

        let spi = Spi::new(Bus::Spi0, SlaveSelect::Ss0, cli.clock, Mode::Mode0)?;
        let config = ReaderConfig {
            strict_crc: cli.strict_crc,
            ..ReaderConfig::default()
        };
        let command = cli.command.clone().unwrap_or(CardCommand::Uid);

        match cli.cs_pin {
            Some(bcm_pin) => {
                let mut cs = Gpio::new()?.get(bcm_pin as u8)?.into_output();

                cs.set_high();
                self.session(Mfrc522::new(spi, cs, config)?, command, &token)?;
            }
            None => self.session(Mfrc522::new(spi, HardwareSelect, config)?, command, &token)?,
        }

        reset_pin.set_low();

        Ok(())
    }

    fn session<SPI, CS>(
        self: &Self,
        mut mfrc522: Mfrc522<SPI, CS>,
        command: CardCommand,
        token: &CancellationToken,
    ) -> Result<(), Box<dyn Error>>
    where
        SPI: SpiBus<u8>,
        CS: OutputPin,
    {
        output!(self.log, "Reader Mfg Version: {:#04x}", mfrc522.version()?);

        match command {
            CardCommand::Uid => loop {
                match self.wait_for_card(&mut mfrc522, token)? {
                    Some((uid, card_type)) => {
                        output!(self.log, "{} {}", uid, card_type);
                        mfrc522.halt()?;
                    }
                    None => break,
                }
            },
            CardCommand::Read { block, key } => {
                if let Some((uid, _)) = self.wait_for_card(&mut mfrc522, token)? {
                    mfrc522.authenticate(key.mode(), block, &key.key, &uid)?;

                    let data = mfrc522.read(block);

                    mfrc522.stop_crypto1()?;
                    output!(self.log, "{:>3}: {}", block, to_hex(&data?));
                }
            }
            CardCommand::Write { block, data, key } => {
                if let Some((uid, _)) = self.wait_for_card(&mut mfrc522, token)? {
                    mfrc522.authenticate(key.mode(), block, &key.key, &uid)?;

                    let written = mfrc522.write(block, &data);

                    mfrc522.stop_crypto1()?;
                    written?;
                    output!(self.log, "{:>3}: {}", block, to_hex(&data));
                }
            }
            CardCommand::Keys { block } => {
                if let Some((uid, _)) = self.wait_for_card(&mut mfrc522, token)? {
                    self.try_keys(&mut mfrc522, block, &uid)?;
                }
            }
        }

        mfrc522.close()?;

        Ok(())
    }

    /// Poll for a card, then select it. `None` once canceled.
    fn wait_for_card<SPI, CS>(
        self: &Self,
        mfrc522: &mut Mfrc522<SPI, CS>,
        token: &CancellationToken,
    ) -> Result<Option<(Uid, CardType)>, Box<dyn Error>>
    where
        SPI: SpiBus<u8>,
        CS: OutputPin,
    {
        loop {
            if let Some(atqa) = mfrc522.request(RequestMode::Idle)? {
                match mfrc522.anticoll()? {
                    Some(uid) => match mfrc522.select_tag(&uid)? {
                        0 => warning!(self.log, "card {} did not answer select", uid),
                        sak => return Ok(Some((uid, identify(atqa, sak)))),
                    },
                    None => warning!(self.log, "anticollision failed, retrying"),
                }
            }

            if token.wait(POLL_INTERVAL) {
                return Ok(None);
            }
        }
    }

    fn try_keys<SPI, CS>(
        self: &Self,
        mfrc522: &mut Mfrc522<SPI, CS>,
        block: u8,
        uid: &Uid,
    ) -> Result<(), Box<dyn Error>>
    where
        SPI: SpiBus<u8>,
        CS: OutputPin,
    {
        for key in DEFAULT_KEYS.iter() {
            for mode in [AuthMode::KeyA, AuthMode::KeyB] {
                match mfrc522.authenticate(mode, block, key, uid) {
                    Ok(()) => {
                        mfrc522.stop_crypto1()?;
                        output!(self.log, "{:?} {}", mode, to_hex(key.bytes()));
                        return Ok(());
                    }
                    Err(Mfrc522Error::Authentication { .. }) => {
                        // A failed authentication sends the card back to IDLE
                        if mfrc522.request(RequestMode::All)?.is_none()
                            || mfrc522.anticoll()?.as_ref() != Some(uid)
                            || mfrc522.select_tag(uid)? == 0
                        {
                            return Err(format!("lost card {}", uid).into());
                        }
                    }
                    Err(err) => return Err(err.into()),
                }
            }
        }

        warning!(self.log, "no well known key opens block {}", block);

        Ok(())
    }
}
