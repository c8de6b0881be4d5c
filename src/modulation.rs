use crate::types::OrientationState;

/// Optional control-speed modulation: scales the platform control speed
/// with the subject's tilt magnitude. Ships disabled; the sampling loop
/// never consults it, the game loop may.
#[derive(Clone, Copy, Debug)]
pub struct SpeedModulation {
    pub enabled: bool,
    /// Speed applied while disabled or at neutral tilt.
    pub base_speed: f64,
    /// Speed added per radian of tilt.
    pub gain: f64,
    pub max_speed: f64,
}

impl Default for SpeedModulation {
    fn default() -> Self {
        SpeedModulation {
            enabled: false,
            base_speed: 1.0,
            gain: 2.0,
            max_speed: 3.0,
        }
    }
}

impl SpeedModulation {
    pub fn control_speed(&self, orientation: &OrientationState) -> f64 {
        if !self.enabled {
            return self.base_speed;
        }
        (self.base_speed + self.gain * orientation.tilt_angle()).min(self.max_speed)
    }
}
