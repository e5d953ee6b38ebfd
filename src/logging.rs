//! Console logger for the `tau` binary. The level comes from `TAU_LOG`.

use std::fmt;

use log::{Level, LevelFilter, Log, Metadata, Record};

macro_rules! with_color {
    ($args: ident, $color_code: ident) => {
        format_args!("\u{1B}[{}m{}\u{1B}[0m", $color_code as u8, $args)
    };
}

fn paint(args: fmt::Arguments, color_code: u8) -> String {
    format!("{}", with_color!(args, color_code))
}

fn eprint_in_color(args: fmt::Arguments, color_code: u8) {
    eprint!("{}", paint(args, color_code));
}

struct SimpleLogger;

impl Log for SimpleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let color = match record.level() {
            Level::Error => 31, // Red
            Level::Warn => 93,  // BrightYellow
            Level::Info => 34,  // Blue
            Level::Debug => 32, // Green
            Level::Trace => 90, // BrightBlack
        };
        eprint_in_color(
            format_args!(
                "[{:>5}][{}:{}] {}\n",
                record.level(),
                record.file().unwrap_or("?"),
                record.line().unwrap_or(0),
                record.args()
            ),
            color,
        );
    }

    fn flush(&self) {}
}

fn level_from(value: Option<&str>) -> LevelFilter {
    match value.map(str::to_ascii_uppercase).as_deref() {
        Some("ERROR") => LevelFilter::Error,
        Some("WARN") => LevelFilter::Warn,
        Some("INFO") => LevelFilter::Info,
        Some("DEBUG") => LevelFilter::Debug,
        Some("TRACE") => LevelFilter::Trace,
        Some("OFF") => LevelFilter::Off,
        _ => LevelFilter::Warn,
    }
}

pub fn init() {
    static LOGGER: SimpleLogger = SimpleLogger;
    if log::set_logger(&LOGGER).is_err() {
        return;
    }
    log::set_max_level(level_from(std::env::var("TAU_LOG").ok().as_deref()));
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_paint() {
        assert_eq!(paint(format_args!("mount {}", 7), 31), "\u{1B}[31mmount 7\u{1B}[0m");
    }

    #[test]
    fn test_level_from() {
        assert_eq!(level_from(Some("debug")), LevelFilter::Debug);
        assert_eq!(level_from(Some("TRACE")), LevelFilter::Trace);
        assert_eq!(level_from(Some("bogus")), LevelFilter::Warn);
        assert_eq!(level_from(None), LevelFilter::Warn);
    }
}
