//! Adapters: concrete implementations of the port traits.
//!
//! | Adapter        | Implements          | Connects to                  |
//! |----------------|---------------------|------------------------------|
//! | `hardware`     | SensorPort          | ADC1, PWM-input edge timer   |
//! |                | OutputPort          | LEDC fan PWM + tach outputs  |
//! |                | IndicatorPort       | status LED, display, network |
//! |                | ConsoleIo           | `console_io`                 |
//! |                | WatchdogPort        | Task watchdog                |
//! | `console_io`   | ConsoleIo           | UART0 / host stdin+stdout    |
//! | `config_store` | ConfigPort          | JSON file / defaults         |
//! | `curve`        | FanCurve            | mirror policy                |
//! | `display`      | (via hardware)      | log output                   |
//! | `network`      | (via hardware)      | none (offline board)         |
//! | `log_sink`     | `log::Log`          | ESP-IDF logger / stderr      |
//! | `time`         | Clock               | ESP32 system timer           |

pub mod config_store;
pub mod console_io;
pub mod curve;
pub mod display;
pub mod hardware;
pub mod log_sink;
pub mod network;
pub mod time;
