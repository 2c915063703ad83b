use core::fmt::Arguments;
use log::{Level, LevelFilter, Metadata, Record};
use mfrc522_classic::{error, Mfrc522ClassicLog, Mfrc522ClassicTool};
use std::sync::atomic::{AtomicBool, Ordering};
use termion::color;

/// Prints tool output and the driver's `log` records to the terminal
struct Mfrc522ClassicLogger {
    color: AtomicBool,
}

static LOGGER: Mfrc522ClassicLogger = Mfrc522ClassicLogger {
    color: AtomicBool::new(true),
};

impl Mfrc522ClassicLogger {
    fn colored<C: color::Color>(&self, fg: C, label: &str, args: Arguments) {
        if self.color.load(Ordering::Relaxed) {
            eprintln!(
                "{}{}: {}{}",
                color::Fg(fg),
                label,
                args,
                color::Fg(color::Reset)
            );
        } else {
            eprintln!("{}: {}", label, args);
        }
    }
}

impl Mfrc522ClassicLog for Mfrc522ClassicLogger {
    fn output(self: &Self, args: Arguments) {
        println!("{}", args);
    }
    fn warning(self: &Self, args: Arguments) {
        self.colored(color::Yellow, "warning", args);
    }
    fn error(self: &Self, args: Arguments) {
        self.colored(color::Red, "error", args);
    }
    fn color(self: &Self, enabled: bool) {
        self.color.store(enabled, Ordering::Relaxed);
    }
}

impl log::Log for Mfrc522ClassicLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        match record.level() {
            Level::Error => self.error(*record.args()),
            Level::Warn => self.warning(*record.args()),
            Level::Info => self.colored(color::Green, "info", *record.args()),
            Level::Debug => self.colored(color::Cyan, "debug", *record.args()),
            Level::Trace => self.colored(color::LightBlack, "trace", *record.args()),
        }
    }

    fn flush(&self) {}
}

fn main() {
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(LevelFilter::Warn);
    }

    if let Err(error) = Mfrc522ClassicTool::new(&LOGGER).run(std::env::args_os()) {
        error!(LOGGER, "{}", error);
        std::process::exit(1);
    }
}
