//! Fuzz target: `CommandConsole::pump`
//!
//! Drives arbitrary byte sequences through the line editor, split into
//! arbitrary pump-sized chunks, and asserts that it never panics, never
//! dispatches an empty line and never holds more than its capacity.
//!
//! cargo fuzz run fuzz_console

#![no_main]

use std::collections::VecDeque;

use fanbridge::app::ports::ConsoleIo;
use fanbridge::console::{CommandConsole, LINE_CAPACITY};
use libfuzzer_sys::fuzz_target;

struct Feed {
    rx: VecDeque<u8>,
    tx_len: usize,
}

impl ConsoleIo for Feed {
    fn read_byte(&mut self) -> Option<u8> {
        self.rx.pop_front()
    }

    fn write(&mut self, bytes: &[u8]) {
        self.tx_len += bytes.len();
    }
}

fuzz_target!(|data: &[u8]| {
    let Some((&first, rest)) = data.split_first() else {
        return;
    };
    let mut console = CommandConsole::new(first & 1 == 1);
    let mut io = Feed {
        rx: VecDeque::new(),
        tx_len: 0,
    };

    // Byte 0 also picks the chunk size, so partial lines span pumps.
    let chunk = usize::from(first >> 1).max(1);
    for part in rest.chunks(chunk) {
        io.rx.extend(part);
        console.pump(&mut io, |_, line| {
            assert!(!line.is_empty(), "empty line dispatched");
        });
        assert!(io.rx.is_empty(), "pump left queued bytes behind");
        assert!(console.pending().len() < LINE_CAPACITY);
    }
});
