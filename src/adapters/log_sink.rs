//! Log backend.
//!
//! On target the ESP-IDF logger owns the UART / USB-CDC output.  On host,
//! [`ConsoleLogger`] writes `[LEVEL] target: message` lines to stderr so
//! they never interleave with console replies on stdout.

use log::{LevelFilter, Log, Metadata, Record};

/// stderr logger for host builds.
pub struct ConsoleLogger;

#[cfg(not(target_os = "espidf"))]
static LOGGER: ConsoleLogger = ConsoleLogger;

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        eprintln!("{}", format_record(record));
    }

    fn flush(&self) {}
}

fn format_record(record: &Record<'_>) -> String {
    format!(
        "[{:<5}] {}: {}",
        record.level(),
        record.target(),
        record.args()
    )
}

/// Install the platform logger at `level`.
#[cfg(target_os = "espidf")]
pub fn init(level: LevelFilter) -> anyhow::Result<()> {
    esp_idf_logger::init()?;
    log::set_max_level(level);
    Ok(())
}

/// Install [`ConsoleLogger`] at `level`.
#[cfg(not(target_os = "espidf"))]
pub fn init(level: LevelFilter) -> anyhow::Result<()> {
    log::set_logger(&LOGGER).map_err(|e| anyhow::anyhow!("logger: {}", e))?;
    log::set_max_level(level);
    Ok(())
}
