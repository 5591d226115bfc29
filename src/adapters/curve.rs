//! Default fan curve.
//!
//! [`MirrorCurve`] makes the board transparent: every fan runs at the duty
//! the host requests on mbfan header 1, and each mbfan header reports the
//! tach of the fan with the same index back to the host.

use crate::app::ports::FanCurve;
use crate::state::SystemState;

#[derive(Debug, Default, Clone, Copy)]
pub struct MirrorCurve;

impl FanCurve for MirrorCurve {
    fn fan_duty(&self, state: &SystemState, _channel: usize) -> f32 {
        state.mbfan_duty[0].clamp(0.0, 100.0)
    }

    fn mbfan_frequency(&self, state: &SystemState, channel: usize) -> f32 {
        state.fan_freq.get(channel).copied().unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{FAN_COUNT, MBFAN_COUNT};

    #[test]
    fn fans_follow_first_header() {
        let mut s = SystemState::new();
        s.mbfan_duty = [62.0, 10.0];
        for ch in 0..FAN_COUNT {
            assert_eq!(MirrorCurve.fan_duty(&s, ch), 62.0);
        }
    }

    #[test]
    fn headers_mirror_fan_tach() {
        let mut s = SystemState::new();
        s.fan_freq = [20.0, 21.5, 30.0, 31.0];
        for ch in 0..MBFAN_COUNT {
            assert_eq!(MirrorCurve.mbfan_frequency(&s, ch), s.fan_freq[ch]);
        }
    }

    #[test]
    fn duty_is_clamped() {
        let mut s = SystemState::new();
        s.mbfan_duty[0] = 140.0;
        assert_eq!(MirrorCurve.fan_duty(&s, 0), 100.0);
    }
}
