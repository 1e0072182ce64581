//! Perception configuration.
//!
//! [`PerceptionConfig::default`] is the compiled-in configuration for the
//! simulator camera: 320×160 frames, the fixed four-point calibration, a
//! 200×200 world at 10 rectified pixels per metre, and a 1° attitude
//! tolerance.  Every field carries a serde default so hosts can deserialize a
//! partial table and override only what they need.

use serde::{Deserialize, Serialize};
use terrascan_types::TerraError;

use crate::accumulate::{DEFAULT_NAVIGABLE_WEIGHT, DEFAULT_OBSTACLE_WEIGHT};
use crate::attitude::DEFAULT_TOLERANCE_DEG;
use crate::threshold::ThresholdBand;
use crate::warp::Calibration;

/// Configuration bundle for [`PerceptionPipeline`][crate::pipeline::PerceptionPipeline].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerceptionConfig {
    /// Camera frame width in pixels.
    #[serde(default = "default_frame_width")]
    pub frame_width: usize,
    /// Camera frame height in pixels.
    #[serde(default = "default_frame_height")]
    pub frame_height: usize,
    #[serde(default)]
    pub calibration: Calibration,
    /// Side length of the square world map, in cells.
    #[serde(default = "default_world_size")]
    pub world_size: usize,
    /// Rectified pixels per metre.
    #[serde(default = "default_scale")]
    pub scale: f64,
    #[serde(default = "default_obstacle_band")]
    pub obstacle_band: ThresholdBand,
    #[serde(default = "default_navigable_band")]
    pub navigable_band: ThresholdBand,
    #[serde(default = "default_sample_band")]
    pub sample_band: ThresholdBand,
    /// Maximum roll/pitch deviation from level, exclusive, in degrees.
    #[serde(default = "default_attitude_tolerance")]
    pub attitude_tolerance_deg: f64,
    /// Obstacle evidence added per frame to each touched cell.
    #[serde(default = "default_obstacle_weight")]
    pub obstacle_weight: u32,
    /// Navigable evidence added per frame to each touched cell.
    #[serde(default = "default_navigable_weight")]
    pub navigable_weight: u32,
}

fn default_frame_width() -> usize {
    320
}
fn default_frame_height() -> usize {
    160
}
fn default_world_size() -> usize {
    200
}
fn default_scale() -> f64 {
    10.0
}
fn default_obstacle_band() -> ThresholdBand {
    ThresholdBand::OBSTACLE
}
fn default_navigable_band() -> ThresholdBand {
    ThresholdBand::NAVIGABLE
}
fn default_sample_band() -> ThresholdBand {
    ThresholdBand::SAMPLE
}
fn default_attitude_tolerance() -> f64 {
    DEFAULT_TOLERANCE_DEG
}
fn default_obstacle_weight() -> u32 {
    DEFAULT_OBSTACLE_WEIGHT
}
fn default_navigable_weight() -> u32 {
    DEFAULT_NAVIGABLE_WEIGHT
}

impl Default for PerceptionConfig {
    fn default() -> Self {
        Self {
            frame_width: default_frame_width(),
            frame_height: default_frame_height(),
            calibration: Calibration::default(),
            world_size: default_world_size(),
            scale: default_scale(),
            obstacle_band: default_obstacle_band(),
            navigable_band: default_navigable_band(),
            sample_band: default_sample_band(),
            attitude_tolerance_deg: default_attitude_tolerance(),
            obstacle_weight: default_obstacle_weight(),
            navigable_weight: default_navigable_weight(),
        }
    }
}

impl PerceptionConfig {
    /// Reject values outside their domain.
    ///
    /// Calibration geometry is checked separately when the homography is
    /// solved.
    ///
    /// # Errors
    ///
    /// [`TerraError::InvalidConfig`] naming the first offending field.
    pub fn validate(&self) -> Result<(), TerraError> {
        if self.frame_width == 0 || self.frame_height == 0 {
            return Err(TerraError::InvalidConfig(format!(
                "frame must be non-empty, got {}x{}",
                self.frame_width, self.frame_height
            )));
        }
        if self.world_size == 0 {
            return Err(TerraError::InvalidConfig("world_size must be > 0".to_string()));
        }
        if !(self.scale.is_finite() && self.scale > 0.0) {
            return Err(TerraError::InvalidConfig(format!(
                "scale must be a positive number, got {}",
                self.scale
            )));
        }
        if !(self.attitude_tolerance_deg.is_finite() && self.attitude_tolerance_deg > 0.0) {
            return Err(TerraError::InvalidConfig(format!(
                "attitude_tolerance_deg must be a positive number, got {}",
                self.attitude_tolerance_deg
            )));
        }
        if !(self.calibration.dst_size.is_finite() && self.calibration.dst_size > 0.0) {
            return Err(TerraError::InvalidConfig(format!(
                "calibration.dst_size must be a positive number, got {}",
                self.calibration.dst_size
            )));
        }
        if !self.calibration.bottom_offset.is_finite() {
            return Err(TerraError::InvalidConfig(
                "calibration.bottom_offset must be finite".to_string(),
            ));
        }
        for (name, band) in [
            ("obstacle_band", &self.obstacle_band),
            ("navigable_band", &self.navigable_band),
            ("sample_band", &self.sample_band),
        ] {
            if band.is_empty() {
                return Err(TerraError::InvalidConfig(format!(
                    "{name} has min above max: {:?} > {:?}",
                    band.min, band.max
                )));
            }
        }
        Ok(())
    }
}
