//! Hysteresis change gate.
//!
//! Raw duty and tach readings jitter by fractions of a percent / hertz.
//! Reprogramming the PWM hardware on every wiggle makes the fans hunt
//! audibly, so every sample is compared against the last value acted on and
//! only a change of at least the per-quantity threshold gets through.

use serde::{Deserialize, Serialize};

/// `true` when `new` differs from `prev` by at least `threshold`.
///
/// The boundary is inclusive: a delta exactly equal to the threshold
/// counts as a change.
#[inline]
pub fn changed(prev: f32, new: f32, threshold: f32) -> bool {
    (new - prev).abs() >= threshold
}

/// Gate `new` against `*slot`; on a change, store it and return the value
/// it replaced.
#[inline]
pub fn apply(slot: &mut f32, new: f32, threshold: f32) -> Option<f32> {
    if changed(*slot, new, threshold) {
        let prev = *slot;
        *slot = new;
        Some(prev)
    } else {
        None
    }
}

/// Minimum deltas per quantity class.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChangeThresholds {
    /// Motherboard PWM input duty (%), compared after rounding.
    pub input_duty: f32,
    /// Fan PWM output duty (%).
    pub output_duty: f32,
    /// Fan tach input frequency (Hz).
    pub input_freq: f32,
    /// Synthesized mbfan tach output frequency (Hz).
    pub output_freq: f32,
    /// Temperature sensors (°C).
    pub temperature: f32,
}

impl Default for ChangeThresholds {
    fn default() -> Self {
        Self {
            input_duty: 0.5,
            output_duty: 0.1,
            input_freq: 0.5,
            output_freq: 0.1,
            temperature: 0.5,
        }
    }
}

impl ChangeThresholds {
    /// All thresholds must be finite and non-negative.
    pub fn is_valid(&self) -> bool {
        [
            self.input_duty,
            self.output_duty,
            self.input_freq,
            self.output_freq,
            self.temperature,
        ]
        .iter()
        .all(|t| t.is_finite() && *t >= 0.0)
    }
}
