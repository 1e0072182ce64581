//! Attitude gating.
//!
//! The rectifying homography assumes a level camera.  When the rover rolls or
//! pitches the ground plane no longer matches the calibration, so map writes
//! for that frame are suppressed.  The navigable polar summary is still
//! produced.

use terrascan_types::RoverPose;

/// Default tolerance, in degrees, on both roll and pitch.
pub const DEFAULT_TOLERANCE_DEG: f64 = 1.0;

/// Angular distance from level for an angle reported in `[0, 360)`.
///
/// Angles above 180° wrap to `360 - angle`.
#[inline]
pub fn deviation_from_level(angle_deg: f64) -> f64 {
    if angle_deg > 180.0 {
        360.0 - angle_deg
    } else {
        angle_deg
    }
}

/// True when both roll and pitch are within the default tolerance of level.
pub fn is_valid_rotation(roll_deg: f64, pitch_deg: f64) -> bool {
    AttitudeGate::default().accepts_angles(roll_deg, pitch_deg)
}

/// Accepts a pose only when roll and pitch are both strictly within
/// `tolerance_deg` of level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttitudeGate {
    tolerance_deg: f64,
}

impl Default for AttitudeGate {
    fn default() -> Self {
        Self::new(DEFAULT_TOLERANCE_DEG)
    }
}

impl AttitudeGate {
    pub fn new(tolerance_deg: f64) -> Self {
        Self { tolerance_deg }
    }

    pub fn tolerance_deg(&self) -> f64 {
        self.tolerance_deg
    }

    pub fn accepts_angles(&self, roll_deg: f64, pitch_deg: f64) -> bool {
        deviation_from_level(roll_deg) < self.tolerance_deg
            && deviation_from_level(pitch_deg) < self.tolerance_deg
    }

    pub fn accepts(&self, pose: &RoverPose) -> bool {
        self.accepts_angles(pose.roll, pose.pitch)
    }
}
