//! FanBridge Firmware — Main Entry Point
//!
//! ```text
//! ┌──────────────────────────── core 0 ────────────────────────────┐
//! │  Scheduler ──▶ FanController ──▶ HardwareAdapter (Board ports) │
//! │      network · LED · display · duty in · temperature ·         │
//! │      tach in · outputs · console · watchdog                    │
//! └────────────────────────────▲───────────────────────────────────┘
//!                              │ Arc<TachFrequencies>  Arc<Lockout>
//! ┌──────────────────────────── core 1 ────────────────────────────┐
//! │  CaptureWorker ──▶ PulseCounterCapture (tach ISR counters)     │
//! └────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use log::{LevelFilter, error, info, warn};

use fanbridge::adapters::config_store::{self, DefaultConfig, JsonConfigFile};
use fanbridge::adapters::console_io::SerialConsole;
use fanbridge::adapters::curve::MirrorCurve;
use fanbridge::adapters::hardware::HardwareAdapter;
use fanbridge::adapters::log_sink;
use fanbridge::adapters::time::MonotonicClock;
use fanbridge::app::commands::{BasicCommands, FIRMWARE_VERSION, MODEL};
use fanbridge::app::controller::FanController;
use fanbridge::app::ports::{ConfigPort, ConsoleIo};
use fanbridge::capture::CaptureWorker;
use fanbridge::diagnostics;
use fanbridge::drivers::hw_init;
use fanbridge::drivers::status_led::StatusLed;
use fanbridge::drivers::watchdog::{BootReport, Watchdog};
use fanbridge::lockout::Lockout;
use fanbridge::scheduler::Scheduler;
use fanbridge::sensors::pwm_input::PwmInput;
use fanbridge::sensors::tach::PulseCounterCapture;
use fanbridge::sensors::temperature::TemperatureSensors;
use fanbridge::state::TachFrequencies;

/// Console attach polling step at boot.
const CONSOLE_POLL_MS: u32 = 250;

fn main() -> Result<()> {
    // ── 1. Runtime bootstrap ──────────────────────────────────
    #[cfg(target_os = "espidf")]
    esp_idf_svc::sys::link_patches();
    log_sink::init(LevelFilter::Info)?;
    diagnostics::install_panic_handler();

    let clock = MonotonicClock::new();
    let boot = BootReport::detect();

    // ── 2. Configuration ──────────────────────────────────────
    let source: Box<dyn ConfigPort> = match JsonConfigFile::from_env() {
        Some(file) => Box::new(file),
        None => Box::new(DefaultConfig),
    };
    let config = config_store::load_or_default(source.as_ref());

    // ── 3. Peripherals ────────────────────────────────────────
    if let Err(e) = hw_init::init_peripherals() {
        // Fatal: without outputs there is nothing to control.
        error!("HAL init failed: {}", e);
        return Err(e.into());
    }

    // ── 4. Console, notice, banner ────────────────────────────
    let mut console = SerialConsole::new()?;
    for _ in 0..config.console_wait_ms / CONSOLE_POLL_MS {
        if console.connected() {
            break;
        }
        std::thread::sleep(Duration::from_millis(CONSOLE_POLL_MS.into()));
    }
    if let Some(notice) = boot.notice() {
        warn!("{}", notice);
        console.write(notice.as_bytes());
        console.write(b"\r\n");
    }
    let banner = format!(
        "FanBridge v{} ({}), {} core(s)",
        FIRMWARE_VERSION,
        MODEL,
        core_count()
    );
    info!("{}", banner);
    console.write(banner.as_bytes());
    console.write(b"\r\n");
    info!("Boot: {:?}", boot.reason);

    // ── 5. Capture worker (core 1) ────────────────────────────
    let freqs = Arc::new(TachFrequencies::new());
    let lockout = Arc::new(Lockout::new());
    let worker = CaptureWorker::new(
        PulseCounterCapture::new(config.tach_window_ms),
        clock,
        Arc::clone(&freqs),
        Arc::clone(&lockout),
    );
    let _worker = worker.spawn()?;

    // ── 6. Watchdog, after the worker is up ───────────────────
    let watchdog = Watchdog::arm(config.watchdog_timeout_ms);

    // ── 7. Scheduler core ─────────────────────────────────────
    let mut hw = HardwareAdapter::new(
        TemperatureSensors::new(),
        PwmInput::new(),
        StatusLed::new(status_led_pin()?),
        console,
        watchdog,
    );
    if let Err(e) = hw.zero_outputs() {
        warn!("Boot: could not stop fans: {}", e);
    }

    let mut scheduler = Scheduler::standard(&config.intervals);
    let mut controller = FanController::new(
        hw,
        BasicCommands::new(),
        MirrorCurve,
        clock,
        config,
        freqs,
        lockout,
    );

    info!("System ready. Entering scheduler loop.");
    scheduler.run(&clock, &mut controller)
}

#[cfg(target_os = "espidf")]
fn status_led_pin() -> Result<impl embedded_hal::digital::OutputPin> {
    use esp_idf_hal::gpio::PinDriver;
    use esp_idf_hal::peripherals::Peripherals;

    let peripherals = Peripherals::take()?;
    Ok(PinDriver::output(peripherals.pins.gpio48)?)
}

#[cfg(not(target_os = "espidf"))]
fn status_led_pin() -> Result<fanbridge::drivers::status_led::SimPin> {
    Ok(fanbridge::drivers::status_led::SimPin::default())
}

#[cfg(target_os = "espidf")]
fn core_count() -> usize {
    2
}

#[cfg(not(target_os = "espidf"))]
fn core_count() -> usize {
    std::thread::available_parallelism().map_or(1, |n| n.get())
}
