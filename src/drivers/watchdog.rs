//! Watchdog supervision.
//!
//! - [`Watchdog`] wraps the ESP-IDF Task Watchdog Timer (TWDT): armed once
//!   at boot, fed by the scheduler's last task on every loop iteration.  A
//!   loop that stalls longer than the timeout resets the chip.
//! - [`ResetReason::detect`] reads the previous reset cause at boot so a
//!   watchdog reboot can be announced.
//! - [`SimWatchdog`] + [`RetainedRegs`] model the same timer on the host:
//!   a deadline against a [`Clock`] and a scratch block that survives the
//!   simulated reset.

use core::sync::atomic::{AtomicU8, Ordering};

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;
use log::{info, warn};

use crate::app::ports::{Clock, WatchdogPort};

// ── Reset cause ───────────────────────────────────────────────

/// Why the chip last came out of reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ResetReason {
    PowerOn = 1,
    Watchdog = 2,
    Software = 3,
    Panic = 4,
    Other = 5,
}

impl ResetReason {
    /// Reset cause reported by the ROM / bootloader.
    #[cfg(target_os = "espidf")]
    #[allow(non_upper_case_globals)]
    pub fn detect() -> Self {
        // SAFETY: read-only query of a value latched at boot.
        match unsafe { esp_reset_reason() } {
            esp_reset_reason_t_ESP_RST_POWERON => Self::PowerOn,
            esp_reset_reason_t_ESP_RST_TASK_WDT
            | esp_reset_reason_t_ESP_RST_INT_WDT
            | esp_reset_reason_t_ESP_RST_WDT => Self::Watchdog,
            esp_reset_reason_t_ESP_RST_SW => Self::Software,
            esp_reset_reason_t_ESP_RST_PANIC => Self::Panic,
            _ => Self::Other,
        }
    }

    /// Host builds always start cold.
    #[cfg(not(target_os = "espidf"))]
    pub fn detect() -> Self {
        Self::PowerOn
    }

    fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            1 => Some(Self::PowerOn),
            2 => Some(Self::Watchdog),
            3 => Some(Self::Software),
            4 => Some(Self::Panic),
            5 => Some(Self::Other),
            _ => None,
        }
    }
}

/// What boot learned about the previous run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootReport {
    pub reason: ResetReason,
}

impl BootReport {
    pub fn detect() -> Self {
        Self::from_reason(ResetReason::detect())
    }

    pub fn from_reason(reason: ResetReason) -> Self {
        Self { reason }
    }

    pub fn rebooted_by_watchdog(&self) -> bool {
        self.reason == ResetReason::Watchdog
    }

    /// Console notice printed after the banner, if any.
    pub fn notice(&self) -> Option<&'static str> {
        self.rebooted_by_watchdog().then_some("[Rebooted by watchdog]")
    }
}

// ── Hardware watchdog ─────────────────────────────────────────

pub struct Watchdog {
    timeout_ms: u32,
    #[cfg(target_os = "espidf")]
    subscribed: bool,
    #[cfg(not(target_os = "espidf"))]
    feeds: u64,
}

impl Watchdog {
    /// Configure the TWDT and subscribe the calling task.
    #[cfg(target_os = "espidf")]
    pub fn arm(timeout_ms: u32) -> Self {
        // SAFETY: plain FFI calls on the boot thread; the config struct
        // outlives the call.
        unsafe {
            let cfg = esp_task_wdt_config_t {
                timeout_ms,
                idle_core_mask: 0,
                trigger_panic: true,
            };
            let ret = esp_task_wdt_reconfigure(&cfg);
            if ret != ESP_OK {
                warn!("TWDT reconfigure returned {} (may already be configured)", ret);
            }

            let ret = esp_task_wdt_add(core::ptr::null_mut());
            let subscribed = ret == ESP_OK;
            if subscribed {
                info!("Watchdog: armed ({} ms timeout, panic on trigger)", timeout_ms);
            } else {
                warn!("Watchdog: failed to subscribe ({})", ret);
            }
            Self {
                timeout_ms,
                subscribed,
            }
        }
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn arm(timeout_ms: u32) -> Self {
        info!("Watchdog(sim): armed ({} ms), feeds counted only", timeout_ms);
        Self {
            timeout_ms,
            feeds: 0,
        }
    }

    pub fn timeout_ms(&self) -> u32 {
        self.timeout_ms
    }

    /// Number of feeds so far (host only).
    #[cfg(not(target_os = "espidf"))]
    pub fn feeds(&self) -> u64 {
        self.feeds
    }
}

impl WatchdogPort for Watchdog {
    #[cfg(target_os = "espidf")]
    fn feed(&mut self) {
        if self.subscribed {
            // SAFETY: the calling task subscribed in `arm`.
            unsafe {
                esp_task_wdt_reset();
            }
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn feed(&mut self) {
        self.feeds += 1;
    }
}

// ── Host model ────────────────────────────────────────────────

/// Scratch registers that survive a (simulated) reset.
#[derive(Debug, Default)]
pub struct RetainedRegs {
    reason: AtomicU8,
}

impl RetainedRegs {
    pub const fn new() -> Self {
        Self {
            reason: AtomicU8::new(0),
        }
    }

    pub fn record(&self, reason: ResetReason) {
        self.reason.store(reason as u8, Ordering::SeqCst);
    }

    /// Read and clear the recorded cause, as boot does.
    pub fn take_reset_reason(&self) -> Option<ResetReason> {
        ResetReason::from_raw(self.reason.swap(0, Ordering::SeqCst))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogStatus {
    Disarmed,
    Ok,
    Expired,
}

/// Host watchdog: expires when not fed within the timeout.
pub struct SimWatchdog<'r, C: Clock> {
    clock: C,
    regs: &'r RetainedRegs,
    timeout_us: u64,
    last_feed_us: Option<u64>,
    expired: bool,
}

impl<'r, C: Clock> SimWatchdog<'r, C> {
    pub fn new(clock: C, regs: &'r RetainedRegs) -> Self {
        Self {
            clock,
            regs,
            timeout_us: 0,
            last_feed_us: None,
            expired: false,
        }
    }

    pub fn arm(&mut self, timeout_ms: u32) {
        self.timeout_us = u64::from(timeout_ms) * 1000;
        self.last_feed_us = Some(self.clock.now_us());
        self.expired = false;
    }

    /// Check the deadline.  Records [`ResetReason::Watchdog`] on expiry.
    pub fn poll(&mut self) -> WatchdogStatus {
        let Some(last) = self.last_feed_us else {
            return WatchdogStatus::Disarmed;
        };
        if self.expired {
            return WatchdogStatus::Expired;
        }
        if self.clock.now_us().saturating_sub(last) > self.timeout_us {
            warn!("Watchdog(sim): expired, resetting");
            self.regs.record(ResetReason::Watchdog);
            self.expired = true;
            return WatchdogStatus::Expired;
        }
        WatchdogStatus::Ok
    }
}

impl<C: Clock> WatchdogPort for SimWatchdog<'_, C> {
    fn feed(&mut self) {
        if self.last_feed_us.is_some() && !self.expired {
            self.last_feed_us = Some(self.clock.now_us());
        }
    }
}
