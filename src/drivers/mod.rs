//! Hardware initialisation, status LED, watchdog and core pinning.

pub mod hw_init;
pub mod status_led;
pub mod task_pin;
pub mod watchdog;
