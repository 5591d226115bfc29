//! Line-oriented command console.
//!
//! Assembles bytes from a non-blocking [`ConsoleIo`] into lines and hands
//! each complete line to a dispatch callback.  The console never interprets
//! commands; that is the [`CommandProcessor`](crate::app::ports::CommandProcessor)'s job.
//!
//! # Byte handling
//!
//! | Byte            | Action                                              |
//! |-----------------|-----------------------------------------------------|
//! | `0x00`, `0xFF`  | ignored (line noise, idle UART)                     |
//! | `0x08`, `0x7F`  | drop last byte (if any); echo `"\b \b"`             |
//! | `\r`, `\n`      | echo `"\r\n"`; dispatch if non-empty; clear         |
//! | anything else   | append + echo; a full buffer is dispatched at once  |
//!
//! A full buffer moves the console to [`ConsoleState::DispatchPending`].
//! [`CommandConsole::pump`] completes that dispatch before it consumes the
//! next byte; a caller driving [`CommandConsole::feed`] directly sees the
//! pending state until the next `feed` or [`CommandConsole::flush_pending`].
//!
//! A single pump drains at most [`MAX_PUMP_BYTES`] so a flooding host cannot
//! starve the scheduler (and with it the watchdog feed).

use heapless::Vec;
use log::{debug, warn};

use crate::app::ports::ConsoleIo;

/// Line buffer capacity.
pub const LINE_CAPACITY: usize = 1024;

/// Upper bound on bytes consumed by one [`CommandConsole::pump`] call.
pub const MAX_PUMP_BYTES: usize = 4096;

const BACKSPACE: u8 = 0x08;
const DELETE: u8 = 0x7F;

/// Assembly state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleState {
    Collecting,
    /// The buffer filled up; the full line is dispatched before any
    /// further byte is consumed.
    DispatchPending,
}

/// Line assembler with optional local echo.
#[derive(Debug)]
pub struct CommandConsole {
    buf: Vec<u8, LINE_CAPACITY>,
    echo: bool,
    state: ConsoleState,
    lines: u32,
    overflows: u32,
}

impl CommandConsole {
    pub fn new(echo: bool) -> Self {
        Self {
            buf: Vec::new(),
            echo,
            state: ConsoleState::Collecting,
            lines: 0,
            overflows: 0,
        }
    }

    pub fn set_echo(&mut self, echo: bool) {
        self.echo = echo;
    }

    pub fn echo(&self) -> bool {
        self.echo
    }

    pub fn state(&self) -> ConsoleState {
        self.state
    }

    /// Bytes of the line currently being assembled.
    pub fn pending(&self) -> &[u8] {
        &self.buf
    }

    /// Lines dispatched so far (including forced ones).
    pub fn lines_dispatched(&self) -> u32 {
        self.lines
    }

    pub fn overflows(&self) -> u32 {
        self.overflows
    }

    /// Drain the bytes currently queued on `io`.
    ///
    /// Returns once `read_byte` reports no data or [`MAX_PUMP_BYTES`] have
    /// been consumed.  `dispatch` receives the console transport back so the
    /// handler can answer on it.
    pub fn pump<I, F>(&mut self, io: &mut I, mut dispatch: F) -> usize
    where
        I: ConsoleIo + ?Sized,
        F: FnMut(&mut I, &str),
    {
        let mut consumed = 0;
        while consumed < MAX_PUMP_BYTES {
            let Some(byte) = io.read_byte() else {
                break;
            };
            consumed += 1;
            self.feed(io, byte, &mut dispatch);
            self.flush_pending(io, &mut dispatch);
        }
        consumed
    }

    /// Process one byte.  A forced dispatch left pending by the previous
    /// byte is completed first.
    pub fn feed<I, F>(&mut self, io: &mut I, byte: u8, dispatch: &mut F)
    where
        I: ConsoleIo + ?Sized,
        F: FnMut(&mut I, &str),
    {
        self.flush_pending(io, dispatch);
        match byte {
            0x00 | 0xFF => {}
            BACKSPACE | DELETE => {
                self.buf.pop();
                if self.echo {
                    io.write(b"\x08 \x08");
                }
            }
            b'\r' | b'\n' => {
                if self.echo {
                    io.write(b"\r\n");
                }
                if !self.buf.is_empty() {
                    self.dispatch_line(io, dispatch);
                }
            }
            other => {
                // Capacity is checked after every append, so there is
                // always room here.
                let _ = self.buf.push(other);
                if self.echo {
                    io.write(&[other]);
                }
                if self.buf.is_full() {
                    self.state = ConsoleState::DispatchPending;
                    self.overflows += 1;
                    warn!("console: line exceeds {} bytes, dispatching", LINE_CAPACITY);
                }
            }
        }
    }

    /// Dispatch a full buffer left by [`feed`](Self::feed).  No-op while
    /// collecting.
    pub fn flush_pending<I, F>(&mut self, io: &mut I, dispatch: &mut F)
    where
        I: ConsoleIo + ?Sized,
        F: FnMut(&mut I, &str),
    {
        if self.state != ConsoleState::DispatchPending {
            return;
        }
        if self.echo {
            io.write(b"\r\n");
        }
        self.dispatch_line(io, dispatch);
    }

    fn dispatch_line<I, F>(&mut self, io: &mut I, dispatch: &mut F)
    where
        I: ConsoleIo + ?Sized,
        F: FnMut(&mut I, &str),
    {
        {
            let line = String::from_utf8_lossy(&self.buf);
            debug!("console: dispatch '{}'", line);
            dispatch(io, &line);
        }
        self.lines += 1;
        self.buf.clear();
        self.state = ConsoleState::Collecting;
    }
}
