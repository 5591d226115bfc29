//! Console byte transport.
//!
//! [`SerialConsole`] implements [`ConsoleIo`] without ever blocking the
//! scheduler:
//!
//! - **`target_os = "espidf"`** — UART driver reads with a zero-tick
//!   timeout; writes go to the driver's TX ring buffer.
//! - **host** — a reader thread blocks on stdin and pushes bytes into a
//!   lock-free `heapless::spsc` queue; the scheduler only pops.  Bytes
//!   arriving while the queue is full are dropped and counted.

use crate::app::ports::ConsoleIo;

#[cfg(not(target_os = "espidf"))]
pub use host::SerialConsole;
#[cfg(target_os = "espidf")]
pub use uart::SerialConsole;

/// Host RX queue size (one slot is reserved by the queue).
pub const RX_QUEUE_LEN: usize = 1024;

#[cfg(target_os = "espidf")]
mod uart {
    use esp_idf_svc::sys::*;

    use super::ConsoleIo;
    use crate::pins;

    #[derive(Debug, Default)]
    pub struct SerialConsole {
        _private: (),
    }

    impl SerialConsole {
        /// UART must already be installed by `hw_init`.
        pub fn new() -> std::io::Result<Self> {
            Ok(Self { _private: () })
        }
    }

    impl ConsoleIo for SerialConsole {
        fn read_byte(&mut self) -> Option<u8> {
            let mut b = 0u8;
            // SAFETY: driver installed in hw_init; one-byte buffer lives for
            // the call; zero ticks means no wait.
            let n = unsafe { uart_read_bytes(pins::UART_NUM, (&raw mut b).cast(), 1, 0) };
            (n == 1).then_some(b)
        }

        fn write(&mut self, bytes: &[u8]) {
            // SAFETY: driver installed in hw_init; copies into the TX ring.
            unsafe {
                uart_write_bytes(pins::UART_NUM, bytes.as_ptr().cast(), bytes.len());
            }
        }
    }
}

#[cfg(not(target_os = "espidf"))]
mod host {
    use std::io::{Read, Write};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    use heapless::spsc::{Consumer, Producer, Queue};
    use log::{debug, warn};

    use super::{ConsoleIo, RX_QUEUE_LEN};

    #[derive(Debug, Default)]
    struct Shared {
        attached: AtomicBool,
        dropped: AtomicU32,
    }

    pub struct SerialConsole {
        rx: Consumer<'static, u8, RX_QUEUE_LEN>,
        shared: Arc<Shared>,
    }

    impl SerialConsole {
        /// Start the stdin reader thread.
        pub fn new() -> std::io::Result<Self> {
            let (producer, consumer) = leak_queue();
            let shared = Arc::new(Shared::default());
            let reader_shared = Arc::clone(&shared);
            std::thread::Builder::new()
                .name("console-rx".into())
                .spawn(move || stdin_reader(producer, &reader_shared))?;
            Ok(Self {
                rx: consumer,
                shared,
            })
        }

        /// A console fed from a queue the caller produces into.
        pub fn with_queue() -> (Self, Producer<'static, u8, RX_QUEUE_LEN>) {
            let (producer, consumer) = leak_queue();
            let shared = Arc::new(Shared::default());
            shared.attached.store(true, Ordering::Release);
            (
                Self {
                    rx: consumer,
                    shared,
                },
                producer,
            )
        }

        /// Bytes lost to a full queue.
        pub fn dropped(&self) -> u32 {
            self.shared.dropped.load(Ordering::Relaxed)
        }
    }

    fn leak_queue() -> (
        Producer<'static, u8, RX_QUEUE_LEN>,
        Consumer<'static, u8, RX_QUEUE_LEN>,
    ) {
        // One queue per console for the lifetime of the process.
        let queue: &'static mut Queue<u8, RX_QUEUE_LEN> = Box::leak(Box::new(Queue::new()));
        queue.split()
    }

    fn stdin_reader(mut tx: Producer<'static, u8, RX_QUEUE_LEN>, shared: &Shared) {
        let mut stdin = std::io::stdin().lock();
        let mut buf = [0u8; 64];
        shared.attached.store(true, Ordering::Release);
        loop {
            match stdin.read(&mut buf) {
                Ok(0) => {
                    debug!("console: stdin closed");
                    shared.attached.store(false, Ordering::Release);
                    return;
                }
                Ok(n) => {
                    for &b in &buf[..n] {
                        if tx.enqueue(b).is_err() {
                            shared.dropped.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }
                Err(e) => {
                    warn!("console: stdin read failed: {}", e);
                    shared.attached.store(false, Ordering::Release);
                    return;
                }
            }
        }
    }

    impl ConsoleIo for SerialConsole {
        fn read_byte(&mut self) -> Option<u8> {
            self.rx.dequeue()
        }

        fn write(&mut self, bytes: &[u8]) {
            let mut out = std::io::stdout().lock();
            // Output is best effort: a closed stdout must not stop the loop.
            let _ = out.write_all(bytes);
            let _ = out.flush();
        }

        fn connected(&self) -> bool {
            self.shared.attached.load(Ordering::Acquire)
        }
    }

}
