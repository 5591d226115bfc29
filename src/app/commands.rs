//! Console command handling.
//!
//! [`CommandContext`] is everything a [`CommandProcessor`] may touch while
//! handling one line.  [`BasicCommands`] is the built-in processor: a small
//! SCPI-flavoured set covering identification, status, measurements, log
//! verbosity and a lockout self-test.
//!
//! | Command          | Reply                                            |
//! |------------------|--------------------------------------------------|
//! | `*IDN?`          | `FanBridge,FANBRIDGE-4,0,<version>`              |
//! | `SYS:VER?`       | `<version>`                                      |
//! | `SYS:STAT?`      | runtime metrics, one `key=value` list            |
//! | `MEAS?`          | one line per mbfan, fan and sensor               |
//! | `SYS:DEBUG <n>`  | `OK`; log level 0 (errors) .. 4 (trace)          |
//! | `SYS:DEBUG?`     | current level                                    |
//! | `SYS:LOCKOUT`    | `OK`, or `ERR <reason>`                          |
//! | anything else    | `ERR`                                            |
//!
//! Commands are case-insensitive.

use core::fmt::Write as _;

use log::{LevelFilter, info};

use crate::app::ports::{Clock, CommandProcessor, ConsoleIo};
use crate::config::SystemConfig;
use crate::diagnostics::LoopMetrics;
use crate::lockout::Lockout;
use crate::state::{SystemState, TachFrequencies};

pub const FIRMWARE_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const MODEL: &str = "FANBRIDGE-4";

/// Borrowed view of the controller handed to a command processor.
pub struct CommandContext<'a> {
    pub state: &'a mut SystemState,
    pub config: &'a SystemConfig,
    pub freqs: &'a TachFrequencies,
    pub lockout: &'a Lockout,
    pub clock: &'a dyn Clock,
    pub metrics: &'a LoopMetrics,
    pub out: &'a mut dyn ConsoleIo,
}

impl CommandContext<'_> {
    /// Write one reply line (CRLF-terminated).
    pub fn reply(&mut self, line: &str) {
        self.out.write(line.as_bytes());
        self.out.write(b"\r\n");
    }
}

/// Built-in command set.
#[derive(Debug, Default)]
pub struct BasicCommands {
    handled: u32,
    rejected: u32,
}

impl BasicCommands {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handled(&self) -> u32 {
        self.handled
    }

    pub fn rejected(&self) -> u32 {
        self.rejected
    }

    fn measurements(ctx: &mut CommandContext<'_>) {
        let mut line = String::new();
        let s = *ctx.state;
        for (i, (duty, freq)) in s.mbfan_duty.iter().zip(s.mbfan_freq.iter()).enumerate() {
            line.clear();
            let _ = write!(line, "mbfan{},duty={:.1},freq={:.2}", i + 1, duty, freq);
            ctx.reply(&line);
        }
        for (i, (duty, freq)) in s.fan_duty.iter().zip(s.fan_freq.iter()).enumerate() {
            line.clear();
            let _ = write!(line, "fan{},duty={:.1},freq={:.2}", i + 1, duty, freq);
            ctx.reply(&line);
        }
        for (i, temp) in s.temp.iter().enumerate() {
            line.clear();
            let _ = write!(line, "sensor{},temp={:.1}", i + 1, temp);
            ctx.reply(&line);
        }
    }

    fn status(ctx: &mut CommandContext<'_>) {
        let m = ctx.metrics.snapshot(ctx.freqs, ctx.lockout.rounds());
        let mut line = String::new();
        let _ = write!(
            line,
            "uptime={}s,core0_loops={},core0_max_loop_us={},core1_loops={},core1_max_loop_us={},tach_samples={},sensor_errors={},actuator_errors={},output_writes={},lockouts={}",
            m.uptime_secs,
            m.core0_iterations,
            m.core0_max_loop_us,
            m.core1_iterations,
            m.core1_max_loop_us,
            m.tach_samples,
            m.sensor_errors,
            m.actuator_errors,
            m.output_writes,
            m.lockouts,
        );
        if let Some(heap) = m.heap_free {
            let _ = write!(line, ",heap_free={}", heap);
        }
        ctx.reply(&line);
    }

    fn lockout_selftest(ctx: &mut CommandContext<'_>) {
        match ctx
            .lockout
            .acquire(&ctx.clock, ctx.config.lockout_timeout_ms)
        {
            Ok(guard) => {
                drop(guard);
                ctx.reply("OK");
            }
            Err(e) => {
                let mut line = String::from("ERR ");
                let _ = write!(line, "{}", e);
                ctx.reply(&line);
            }
        }
    }
}

/// Log verbosity for a `SYS:DEBUG` level.
pub fn level_filter(level: u8) -> Option<LevelFilter> {
    match level {
        0 => Some(LevelFilter::Error),
        1 => Some(LevelFilter::Warn),
        2 => Some(LevelFilter::Info),
        3 => Some(LevelFilter::Debug),
        4 => Some(LevelFilter::Trace),
        _ => None,
    }
}

fn level_number(filter: LevelFilter) -> u8 {
    match filter {
        LevelFilter::Off | LevelFilter::Error => 0,
        LevelFilter::Warn => 1,
        LevelFilter::Info => 2,
        LevelFilter::Debug => 3,
        LevelFilter::Trace => 4,
    }
}

impl CommandProcessor for BasicCommands {
    fn process(&mut self, ctx: &mut CommandContext<'_>, line: &str) {
        let line = line.trim();
        let (cmd, arg) = match line.split_once(char::is_whitespace) {
            Some((c, a)) => (c, a.trim()),
            None => (line, ""),
        };
        let cmd = cmd.to_ascii_uppercase();

        let ok = match (cmd.as_str(), arg) {
            ("*IDN?", "") => {
                let mut l = String::new();
                let _ = write!(l, "FanBridge,{},0,{}", MODEL, FIRMWARE_VERSION);
                ctx.reply(&l);
                true
            }
            ("SYS:VER?", "") => {
                ctx.reply(FIRMWARE_VERSION);
                true
            }
            ("SYS:STAT?", "") => {
                Self::status(ctx);
                true
            }
            ("MEAS?", "") => {
                Self::measurements(ctx);
                true
            }
            ("SYS:DEBUG?", "") => {
                let mut l = String::new();
                let _ = write!(l, "{}", level_number(log::max_level()));
                ctx.reply(&l);
                true
            }
            ("SYS:DEBUG", arg) => match arg.parse::<u8>().ok().and_then(level_filter) {
                Some(filter) => {
                    log::set_max_level(filter);
                    info!("console: log level set to {}", filter);
                    ctx.reply("OK");
                    true
                }
                None => false,
            },
            ("SYS:LOCKOUT", "") => {
                Self::lockout_selftest(ctx);
                true
            }
            _ => false,
        };

        if ok {
            self.handled += 1;
        } else {
            self.rejected += 1;
            ctx.reply("ERR");
        }
    }
}
