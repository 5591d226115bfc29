//! GPIO / peripheral pin assignments for the FanBridge board.
//!
//! Single source of truth — every driver references this module rather than
//! hard-coding pin numbers.  Index `n` of each array is channel `n`.

use crate::state::{FAN_COUNT, MBFAN_COUNT, SENSOR_COUNT};

// ---------------------------------------------------------------------------
// Fan outputs (4-pin PWM fans)
// ---------------------------------------------------------------------------

/// LEDC PWM outputs driving each fan's control line.
pub const FAN_PWM_GPIO: [i32; FAN_COUNT] = [4, 5, 6, 7];
/// Open-collector tach inputs from each fan (pulse counted, interrupt-driven).
pub const FAN_TACH_GPIO: [i32; FAN_COUNT] = [15, 16, 17, 18];

// ---------------------------------------------------------------------------
// Motherboard fan headers
// ---------------------------------------------------------------------------

/// PWM inputs from the host board (duty measured by edge timing).
pub const MBFAN_PWM_GPIO: [i32; MBFAN_COUNT] = [8, 9];
/// Synthesized tach outputs toward the host board.
pub const MBFAN_TACH_GPIO: [i32; MBFAN_COUNT] = [10, 11];

// ---------------------------------------------------------------------------
// Sensors — Analog (ADC1)
// ---------------------------------------------------------------------------

/// NTC thermistors, ADC1 channels 0 and 1 (GPIO 1 / 2 on ESP32-S3).
pub const TEMP_ADC_GPIO: [i32; SENSOR_COUNT] = [1, 2];
/// ADC1 channel numbers matching [`TEMP_ADC_GPIO`].
pub const TEMP_ADC_CHANNEL: [u32; SENSOR_COUNT] = [0, 1];

// ---------------------------------------------------------------------------
// Status LED
// ---------------------------------------------------------------------------

pub const STATUS_LED_GPIO: i32 = 48;

// ---------------------------------------------------------------------------
// UART console
// ---------------------------------------------------------------------------

pub const UART_NUM: i32 = 0;
pub const UART_TX_GPIO: i32 = 43;
pub const UART_RX_GPIO: i32 = 44;
pub const UART_BAUD: u32 = 115_200;

// ---------------------------------------------------------------------------
// PWM configuration
// ---------------------------------------------------------------------------

/// LEDC timer resolution (bits) for the fan outputs.  10 bits gives
/// 0.1 % duty steps, matching the output gate threshold.
pub const FAN_PWM_RESOLUTION_BITS: u32 = 10;
/// Fan PWM frequency (25 kHz, the 4-pin fan standard).
pub const FAN_PWM_FREQ_HZ: u32 = 25_000;
/// Resolution of the tach-synthesis timers (50 % square wave only).
pub const TACH_OUT_RESOLUTION_BITS: u32 = 8;
/// LEDC cannot go below this; lower requests are driven as a stopped fan.
pub const TACH_OUT_MIN_HZ: f32 = 1.0;
