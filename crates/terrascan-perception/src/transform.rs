//! Rover frame → world grid projection.
//!
//! A rover-frame point is rotated by the rover's yaw, scaled from rectified
//! pixels to metres, translated by the rover's world position and finally
//! truncated to integer world-grid indices.  Indices are clipped, never
//! rejected, so every output is a valid [`WorldMap`][terrascan_types::WorldMap]
//! cell.
//!
//! # Example
//!
//! ```rust
//! use terrascan_perception::frame::RoverFramePoints;
//! use terrascan_perception::transform::WorldProjector;
//! use terrascan_types::RoverPose;
//!
//! let projector = WorldProjector::new(200, 10.0).unwrap();
//!
//! // 20 px (2 m) straight ahead of a rover facing +Y.
//! let pts = RoverFramePoints::new(vec![20.0], vec![0.0]);
//! let cells = projector.project(&pts, &RoverPose::level(100.0, 50.0, 90.0));
//! assert_eq!(cells, vec![(100, 52)]);
//! ```

use terrascan_types::{RoverPose, TerraError};

use crate::frame::RoverFramePoints;

/// Rotate rover-frame points counter-clockwise by `yaw_deg` degrees.
pub fn rotate_pix(points: &RoverFramePoints, yaw_deg: f64) -> RoverFramePoints {
    let (sin, cos) = yaw_deg.to_radians().sin_cos();
    points
        .iter()
        .map(|(x, y)| (x * cos - y * sin, x * sin + y * cos))
        .collect()
}

/// Scale rotated points down by `scale` pixels per metre and shift them by
/// the rover's world position.
pub fn translate_pix(
    rotated: &RoverFramePoints,
    x_pos: f64,
    y_pos: f64,
    scale: f64,
) -> Vec<(f64, f64)> {
    rotated
        .iter()
        .map(|(x, y)| (x / scale + x_pos, y / scale + y_pos))
        .collect()
}

/// Truncate a world coordinate towards zero and clip it into `[0, size)`.
#[inline]
fn to_grid_index(v: f64, world_size: usize) -> usize {
    // `as` saturates and maps NaN to 0.
    let max = world_size.saturating_sub(1) as i64;
    (v as i64).clamp(0, max) as usize
}

/// Rotate, translate and clip in one go.
pub fn pix_to_world(
    points: &RoverFramePoints,
    x_pos: f64,
    y_pos: f64,
    yaw_deg: f64,
    world_size: usize,
    scale: f64,
) -> Vec<(usize, usize)> {
    let rotated = rotate_pix(points, yaw_deg);
    translate_pix(&rotated, x_pos, y_pos, scale)
        .into_iter()
        .map(|(x, y)| (to_grid_index(x, world_size), to_grid_index(y, world_size)))
        .collect()
}

/// [`pix_to_world`] bound to a fixed world size and scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldProjector {
    world_size: usize,
    scale: f64,
}

impl WorldProjector {
    /// # Errors
    ///
    /// [`TerraError::InvalidConfig`] for an empty world or a non-positive
    /// scale.
    pub fn new(world_size: usize, scale: f64) -> Result<Self, TerraError> {
        if world_size == 0 {
            return Err(TerraError::InvalidConfig("world_size must be > 0".to_string()));
        }
        if !(scale.is_finite() && scale > 0.0) {
            return Err(TerraError::InvalidConfig(format!(
                "scale must be a positive number, got {scale}"
            )));
        }
        Ok(Self { world_size, scale })
    }

    pub fn world_size(&self) -> usize {
        self.world_size
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// World-grid `(x, y)` indices of `points` seen from `pose`.
    pub fn project(&self, points: &RoverFramePoints, pose: &RoverPose) -> Vec<(usize, usize)> {
        pix_to_world(points, pose.x, pose.y, pose.yaw, self.world_size, self.scale)
    }
}
