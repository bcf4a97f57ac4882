use std::io::Write;
use std::time::Instant;

use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};

#[derive(Clone, Copy, Debug)]
enum Color {
    Red = 31,
    Yellow = 93,
    Blue = 35,
    Green = 32,
    Gray = 34,
}

impl From<Level> for Color {
    fn from(level: Level) -> Color {
        match level {
            Level::Error => Color::Red,
            Level::Warn => Color::Yellow,
            Level::Info => Color::Blue,
            Level::Debug => Color::Green,
            Level::Trace => Color::Gray,
        }
    }
}

/// Writes `[   12 ms][INFO]  [target] message` lines to stderr, coloured by
/// level, so they stay apart from program output on stdout.
struct StderrLogger {
    started: Instant,
}

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let _ = writeln!(
            std::io::stderr().lock(),
            "\x1B[90m[{:6} ms]\x1B[0m\x1B[{}m[{}]\t[{}] {}\x1B[0m",
            self.started.elapsed().as_millis(),
            Color::from(record.level()) as i32,
            record.level(),
            record.target(),
            record.args()
        );
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
    let logger = Box::new(StderrLogger {
        started: Instant::now(),
    });

    log::set_boxed_logger(logger)?;
    log::set_max_level(level);
    Ok(())
}
