use std::sync::Once;

use log::{Level, LevelFilter, Log, Metadata, Record};
use wasm_bindgen::JsValue;

/// Logger configuration.
#[derive(Clone, Copy, Debug)]
pub struct LoggingConfig {
    pub level: LevelFilter,

    /// Whether Rust panics are reported on the browser console with their message and location.
    pub panic_hook: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: LevelFilter::Info,
            panic_hook: true,
        }
    }
}

static INIT: Once = Once::new();
static LOGGER: ConsoleLogger = ConsoleLogger;

/// Installs the browser console logger.
///
/// Only the first call has an effect; later calls, or calls made after another logger was
/// installed, are ignored.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        if config.panic_hook {
            console_error_panic_hook::set_once();
        }

        if log::set_logger(&LOGGER).is_ok() {
            log::set_max_level(config.level);
        }

        log::debug!("logging initialized at {}", config.level);
    });
}

/// Writes records to the browser console, choosing the console method by level.
struct ConsoleLogger;

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let line = JsValue::from_str(&console_line(record));

        match record.level() {
            Level::Error => web_sys::console::error_1(&line),
            Level::Warn => web_sys::console::warn_1(&line),
            Level::Info => web_sys::console::info_1(&line),
            Level::Debug | Level::Trace => web_sys::console::debug_1(&line),
        }
    }

    fn flush(&self) {}
}

fn console_line(record: &Record) -> String {
    format!("[{}] {}", record.target(), record.args())
}
