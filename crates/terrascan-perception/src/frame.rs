//! Rectified-grid → rover-frame conversion.
//!
//! The rover frame has its origin at the bottom-centre pixel of the rectified
//! grid, `x` pointing forward (up the image) and `y` pointing left.  Units are
//! rectified pixels; divide by the grid scale to get metres.

use terrascan_types::{BinaryMask, PolarObservation};

/// Classified pixels expressed in the rover frame as parallel `x`/`y`
/// sequences.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RoverFramePoints {
    pub xs: Vec<f64>,
    pub ys: Vec<f64>,
}

impl RoverFramePoints {
    /// Build from parallel coordinate sequences.
    ///
    /// # Panics
    ///
    /// Panics if the sequences differ in length.
    pub fn new(xs: Vec<f64>, ys: Vec<f64>) -> Self {
        assert_eq!(xs.len(), ys.len(), "x and y sequences must be parallel");
        Self { xs, ys }
    }

    pub fn len(&self) -> usize {
        self.xs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.xs.is_empty()
    }

    /// Iterate over `(x, y)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.xs.iter().copied().zip(self.ys.iter().copied())
    }
}

impl FromIterator<(f64, f64)> for RoverFramePoints {
    fn from_iter<I: IntoIterator<Item = (f64, f64)>>(iter: I) -> Self {
        let (xs, ys) = iter.into_iter().unzip();
        Self { xs, ys }
    }
}

/// Rover-frame coordinates of every foreground cell of `mask`.
///
/// Cell `(col, row)` maps to `x = (height - 1) - row`, `y = width / 2 - col`.
pub fn rover_coords(mask: &BinaryMask) -> RoverFramePoints {
    let bottom = (mask.height() as f64) - 1.0;
    let centre = (mask.width() as f64) / 2.0;
    mask.foreground()
        .map(|(col, row)| (bottom - row as f64, centre - col as f64))
        .collect()
}

/// Distance (Euclidean norm) and bearing (`atan2(y, x)`) of every point.
///
/// The origin yields distance 0 and bearing 0.
pub fn to_polar_coords(points: &RoverFramePoints) -> PolarObservation {
    let (distances, angles) = points.iter().map(|(x, y)| (x.hypot(y), y.atan2(x))).unzip();
    PolarObservation { distances, angles }
}
