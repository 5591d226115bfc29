//! NTC thermistor temperature sensors (10 kOhm @ 25 C, B = 3950).
//!
//! Each sensor is wired in a voltage divider with a fixed 10 kOhm resistor
//! and read via the ESP32-S3 ADC.  The simplified Beta (Steinhart-Hart)
//! equation converts resistance to temperature.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: reads ADC1 via the oneshot API (initialised by hw_init).
//! On host/test: reads from static `AtomicU16`s for injection.

use core::sync::atomic::{AtomicU16, Ordering};

#[cfg(target_os = "espidf")]
use crate::drivers::hw_init;
use crate::error::SensorError;
#[cfg(target_os = "espidf")]
use crate::pins;
use crate::state::SENSOR_COUNT;

/// Injected raw ADC values (host).  Mid-scale reads as 25 °C.
static SIM_TEMP_ADC: [AtomicU16; SENSOR_COUNT] = [const { AtomicU16::new(2048) }; SENSOR_COUNT];

pub fn sim_set_temp_adc(index: usize, raw: u16) {
    if let Some(slot) = SIM_TEMP_ADC.get(index) {
        slot.store(raw, Ordering::Relaxed);
    }
}

const R25: f32 = 10_000.0;
const BETA: f32 = 3950.0;
const T25_K: f32 = 298.15;
const R_DIVIDER: f32 = 10_000.0;
const ADC_MAX: f32 = 4095.0;
const V_REF: f32 = 3.3;

/// Reading near either rail means an open or shorted thermistor.
const RAIL_MARGIN_V: f32 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemperatureReading {
    pub raw: u16,
    pub celsius: f32,
}

#[derive(Debug, Default)]
pub struct TemperatureSensors;

impl TemperatureSensors {
    pub fn new() -> Self {
        Self
    }

    pub fn read(&self, index: usize) -> Result<TemperatureReading, SensorError> {
        if index >= SENSOR_COUNT {
            return Err(SensorError::InvalidChannel);
        }
        let raw = self.read_adc(index)?;
        let celsius = adc_to_celsius(raw).ok_or(SensorError::OutOfRange)?;
        Ok(TemperatureReading { raw, celsius })
    }

    #[cfg(target_os = "espidf")]
    fn read_adc(&self, index: usize) -> Result<u16, SensorError> {
        hw_init::adc1_read(pins::TEMP_ADC_CHANNEL[index]).ok_or(SensorError::AdcReadFailed)
    }

    #[cfg(not(target_os = "espidf"))]
    fn read_adc(&self, index: usize) -> Result<u16, SensorError> {
        Ok(SIM_TEMP_ADC[index].load(Ordering::Relaxed))
    }
}

/// Convert a raw divider reading to °C.  `None` for a disconnected or
/// shorted sensor.
pub fn adc_to_celsius(raw: u16) -> Option<f32> {
    let voltage = (raw as f32 / ADC_MAX) * V_REF;
    if voltage <= RAIL_MARGIN_V || voltage >= (V_REF - RAIL_MARGIN_V) {
        return None;
    }
    let r_ntc = R_DIVIDER * voltage / (V_REF - voltage);
    let inv_t = (1.0 / T25_K) + (1.0 / BETA) * (r_ntc / R25).ln();
    if inv_t <= 0.0 {
        return None;
    }
    Some((1.0 / inv_t) - 273.15)
}
