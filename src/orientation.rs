use std::sync::atomic::{AtomicU64, Ordering};

use crate::types::OrientationState;

/// Supplies instantaneous tilt readings on demand. Polled by the sample
/// clock, never pushes.
pub trait OrientationSource: Send + Sync {
    /// Current orientation, or `None` while the input device has not yet
    /// produced its first reading.
    fn read(&self) -> Option<OrientationState>;
}

/// Per-device input tuning. Known device families get their own deadzone
/// and sensitivity instead of string matching scattered through the
/// sampling path.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DeviceProfile {
    pub deadzone: f64,
    pub sensitivity: f64,
}

impl Default for DeviceProfile {
    fn default() -> Self {
        DeviceProfile {
            deadzone: 0.01,
            sensitivity: 1.0,
        }
    }
}

impl DeviceProfile {
    /// Map a reported device label to a profile. Unknown devices fall back
    /// to the default tuning.
    pub fn classify(label: &str) -> Self {
        let label = label.to_lowercase();
        if label.contains("t16000m") || label.contains("thrustmaster") {
            DeviceProfile {
                deadzone: 0.02,
                sensitivity: 1.0,
            }
        } else if label.contains("extreme 3d") || label.contains("logitech") {
            DeviceProfile {
                deadzone: 0.05,
                sensitivity: 0.9,
            }
        } else {
            DeviceProfile::default()
        }
    }

    /// Apply deadzone then sensitivity to a raw reading, axis by axis.
    pub fn apply(&self, raw: OrientationState) -> OrientationState {
        let clip = |v: f64| {
            if v.abs() < self.deadzone {
                0.0
            } else {
                v * self.sensitivity
            }
        };
        OrientationState {
            pitch: clip(raw.pitch),
            roll: clip(raw.roll),
            yaw: clip(raw.yaw),
        }
    }
}

/// Deterministic stand-in for a real tilt controller: sweeps a circle in
/// the roll/pitch plane at constant tilt. Used when no game supplies
/// readings and in tests.
pub struct MockJoystick {
    tilt: f64,
    period_ticks: u64,
    counter: AtomicU64,
}

impl MockJoystick {
    pub fn new(tilt: f64) -> Self {
        MockJoystick {
            tilt,
            period_ticks: 360,
            counter: AtomicU64::new(0),
        }
    }
}

impl OrientationSource for MockJoystick {
    fn read(&self) -> Option<OrientationState> {
        let tick = self.counter.fetch_add(1, Ordering::Relaxed);
        let phase = (tick % self.period_ticks) as f64 / self.period_ticks as f64;
        let azimuth = phase * 2.0 * std::f64::consts::PI;
        Some(OrientationState {
            roll: self.tilt * azimuth.cos(),
            pitch: self.tilt * azimuth.sin(),
            yaw: 0.0,
        })
    }
}

/// Source that is never ready. Exercises the skip-before-input path.
pub struct UnavailableSource;

impl OrientationSource for UnavailableSource {
    fn read(&self) -> Option<OrientationState> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_known_devices() {
        let profile = DeviceProfile::classify("Thrustmaster T16000M FCS");
        assert_eq!(profile.deadzone, 0.02);

        let profile = DeviceProfile::classify("Logitech Extreme 3D Pro");
        assert_eq!(profile.deadzone, 0.05);
    }

    #[test]
    fn test_classify_unknown_device() {
        assert_eq!(DeviceProfile::classify("garage-built box"), DeviceProfile::default());
    }

    #[test]
    fn test_deadzone_zeroes_small_deflections() {
        let profile = DeviceProfile {
            deadzone: 0.05,
            sensitivity: 2.0,
        };
        let raw = OrientationState {
            pitch: 0.04,
            roll: 0.2,
            yaw: -0.01,
        };
        let tuned = profile.apply(raw);
        assert_eq!(tuned.pitch, 0.0);
        assert_eq!(tuned.yaw, 0.0);
        assert!((tuned.roll - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_mock_joystick_sweeps_circle() {
        let stick = MockJoystick::new(0.3);
        let first = stick.read().unwrap();
        assert!((first.tilt_angle() - 0.3).abs() < 1e-12);

        // A quarter period later the azimuth has rotated.
        for _ in 0..89 {
            stick.read();
        }
        let later = stick.read().unwrap();
        assert!((later.tilt_angle() - 0.3).abs() < 1e-12);
        assert!((first.roll - later.roll).abs() > 0.1);
    }
}
