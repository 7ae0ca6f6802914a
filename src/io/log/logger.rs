//! Log formatting.

use log_crate::{Level, LevelFilter, Log, Metadata, Record};

use super::Color;

/// Per-module overrides. A matching target logs up to the more verbose of
/// its own and the global level.
const LOG_LEVELS: [(&str, LevelFilter); 1] = [("osmos_kernel::mem::heap", LevelFilter::Debug)];

/// The global logger.
struct Logger {
    /// The current global level filter.
    level: LevelFilter,
}

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        let filter = LOG_LEVELS
            .iter()
            .find(|(prefix, _)| metadata.target().starts_with(prefix))
            .map_or(self.level, |(_, filter)| self.level.max(*filter));
        metadata.level() <= filter
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let (prefix, color) = match record.level() {
            Level::Error => ('e', Color::Red),
            Level::Warn => ('w', Color::Yellow),
            Level::Info => ('i', Color::Green),
            Level::Debug => ('d', Color::Cyan),
            Level::Trace => ('t', Color::LightGray),
        };

        crate::print_colored!(color, "{} ", prefix);
        crate::println!("({}) --> {}", module(record.target()), record.args());
    }

    fn flush(&self) {}
}

impl Logger {
    fn the() -> &'static Logger {
        static LOGGER: Logger = Logger {
            level: LevelFilter::Info,
        };

        &LOGGER
    }
}

/// The module a log target refers to, relative to the crate root.
fn module(target: &str) -> &str {
    match target.strip_prefix(env!("CARGO_PKG_NAME")) {
        Some("") => "init",
        Some(rest) => rest.strip_prefix("::").unwrap_or(rest),
        None => target,
    }
}

/// Initialize the logger.
pub fn init() {
    log_crate::set_logger(Logger::the()).expect("Failed to initialize logging.");
    log_crate::set_max_level(LevelFilter::Trace);
}
