// Differential-drive inverse kinematics for VSS robots
// Converts a desired body velocity (linear v, angular w) to left/right wheel speeds.

use crate::error::{ActuatorError, Result};

/// Default distance between the two wheels (meters)
pub const TRACK_WIDTH: f64 = 0.066;
/// Default wheel radius (meters)
pub const WHEEL_RADIUS: f64 = 0.016;

/// Fixed geometry of a two-wheeled robot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriveGeometry {
    pub track_width: f64,
    pub wheel_radius: f64,
}

impl Default for DriveGeometry {
    fn default() -> Self {
        Self {
            track_width: TRACK_WIDTH,
            wheel_radius: WHEEL_RADIUS,
        }
    }
}

impl DriveGeometry {
    /// Build a geometry, rejecting non-finite or non-positive dimensions
    pub fn new(track_width: f64, wheel_radius: f64) -> Result<Self> {
        let valid = |x: f64| x.is_finite() && x > 0.0;
        if !valid(track_width) || !valid(wheel_radius) {
            return Err(ActuatorError::InvalidGeometry {
                track_width,
                wheel_radius,
            });
        }
        Ok(Self {
            track_width,
            wheel_radius,
        })
    }

    /// Convert body velocities to wheel speeds (rad/s)
    ///
    /// # Arguments
    /// * `v` - Linear velocity in m/s (positive = forward)
    /// * `w` - Angular velocity in rad/s (positive = counter-clockwise)
    ///
    /// Non-finite input yields non-finite output; nothing is clamped.
    pub fn wheel_speeds(&self, v: f64, w: f64) -> WheelSpeeds {
        let l = self.track_width;
        let r = self.wheel_radius;

        let right = (2.0 * v + w * l) / (2.0 * r);
        let left = right - (w * l / r);

        WheelSpeeds { left, right }
    }
}

/// Wheel angular speeds for one robot
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WheelSpeeds {
    pub left: f64,
    pub right: f64,
}

impl WheelSpeeds {
    pub fn new(left: f64, right: f64) -> Self {
        Self { left, right }
    }

    pub fn zero() -> Self {
        Self::default()
    }
}
