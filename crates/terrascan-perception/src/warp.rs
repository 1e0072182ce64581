//! Perspective rectification.
//!
//! A fixed four-point calibration relates a trapezoid of ground seen by the
//! camera to a small square in a top-down grid where every 10×10 pixel cell
//! covers roughly one square metre.  [`PerspectiveWarper`] solves the planar
//! homography once at construction and pre-computes, for every output pixel,
//! the camera-frame location it samples from.
//!
//! # Example
//!
//! ```rust
//! use terrascan_perception::warp::{Calibration, PerspectiveWarper};
//! use terrascan_types::BinaryMask;
//!
//! let warper = PerspectiveWarper::from_calibration(&Calibration::default(), 320, 160).unwrap();
//!
//! // The calibration square lands just in front of the bottom centre.
//! let (x, y) = warper.project_point(14.0, 140.0).unwrap();
//! assert!((x - 155.0).abs() < 1e-6 && (y - 154.0).abs() < 1e-6);
//!
//! let rectified = warper.warp(&BinaryMask::zeros(320, 160)).unwrap();
//! assert_eq!(rectified.count_ones(), 0);
//! ```

use nalgebra::{Matrix3, SMatrix, SVector, Vector3};
use serde::{Deserialize, Serialize};
use terrascan_types::{BinaryMask, TerraError};

/// Calibration points closer than this to a common line are rejected.
const COLLINEAR_EPS: f64 = 1e-6;
/// Homographies with a smaller determinant are treated as singular.
const DET_EPS: f64 = 1e-12;
/// Homogeneous coordinates with a smaller `w` map to infinity.
const W_EPS: f64 = 1e-12;

// ────────────────────────────────────────────────────────────────────────────
// Calibration
// ────────────────────────────────────────────────────────────────────────────

/// Four camera-frame corners and the parameters that place their rectified
/// counterparts relative to the bottom centre of the frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    /// Camera-frame corners `[x, y]`, ordered bottom-left, bottom-right,
    /// top-right, top-left of the calibration square.
    #[serde(default = "default_source")]
    pub source: [[f64; 2]; 4],
    /// Half the side of the rectified calibration square, in pixels.
    #[serde(default = "default_dst_size")]
    pub dst_size: f64,
    /// Distance between the frame's bottom edge and the calibration square.
    #[serde(default = "default_bottom_offset")]
    pub bottom_offset: f64,
}

fn default_source() -> [[f64; 2]; 4] {
    [[14.0, 140.0], [301.0, 140.0], [200.0, 96.0], [118.0, 96.0]]
}
fn default_dst_size() -> f64 {
    5.0
}
fn default_bottom_offset() -> f64 {
    6.0
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            source: default_source(),
            dst_size: default_dst_size(),
            bottom_offset: default_bottom_offset(),
        }
    }
}

impl Calibration {
    /// Rectified corners for a `width × height` frame, in the same order as
    /// [`Calibration::source`].
    pub fn destination(&self, width: usize, height: usize) -> [[f64; 2]; 4] {
        let cx = width as f64 / 2.0;
        let bottom = height as f64 - self.bottom_offset;
        let top = bottom - 2.0 * self.dst_size;
        [
            [cx - self.dst_size, bottom],
            [cx + self.dst_size, bottom],
            [cx + self.dst_size, top],
            [cx - self.dst_size, top],
        ]
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Homography
// ────────────────────────────────────────────────────────────────────────────

/// A 3×3 planar projective transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Homography {
    matrix: Matrix3<f64>,
}

impl Homography {
    /// Solve for the homography mapping each `src[i]` onto `dst[i]`.
    ///
    /// # Errors
    ///
    /// [`TerraError::DegenerateCalibration`] when three of the points on
    /// either side are collinear or the resulting matrix is singular.
    pub fn from_correspondences(
        src: &[[f64; 2]; 4],
        dst: &[[f64; 2]; 4],
    ) -> Result<Self, TerraError> {
        ensure_general_position(src, "source")?;
        ensure_general_position(dst, "destination")?;

        // h33 is fixed to 1; each correspondence contributes two rows.
        let mut a = SMatrix::<f64, 8, 8>::zeros();
        let mut b = SVector::<f64, 8>::zeros();
        for (i, (&[x, y], &[u, v])) in src.iter().zip(dst).enumerate() {
            let r = 2 * i;
            a[(r, 0)] = x;
            a[(r, 1)] = y;
            a[(r, 2)] = 1.0;
            a[(r, 6)] = -u * x;
            a[(r, 7)] = -u * y;
            b[r] = u;

            a[(r + 1, 3)] = x;
            a[(r + 1, 4)] = y;
            a[(r + 1, 5)] = 1.0;
            a[(r + 1, 6)] = -v * x;
            a[(r + 1, 7)] = -v * y;
            b[r + 1] = v;
        }

        let h = a.lu().solve(&b).ok_or_else(|| {
            TerraError::DegenerateCalibration("calibration system is singular".to_string())
        })?;
        let matrix = Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], 1.0);
        Self::from_matrix(matrix)
    }

    /// Wrap an explicit matrix, rejecting non-finite or singular ones.
    pub fn from_matrix(matrix: Matrix3<f64>) -> Result<Self, TerraError> {
        if !matrix.iter().all(|v| v.is_finite()) {
            return Err(TerraError::DegenerateCalibration(
                "homography has non-finite entries".to_string(),
            ));
        }
        if matrix.determinant().abs() < DET_EPS {
            return Err(TerraError::DegenerateCalibration(format!(
                "homography is singular (det = {:e})",
                matrix.determinant()
            )));
        }
        Ok(Self { matrix })
    }

    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.matrix
    }

    /// The inverse transform.
    pub fn inverse(&self) -> Result<Self, TerraError> {
        let inv = self.matrix.try_inverse().ok_or_else(|| {
            TerraError::DegenerateCalibration("homography is not invertible".to_string())
        })?;
        Self::from_matrix(inv)
    }

    /// Map `(x, y)` through the transform.  Returns `None` for points that
    /// land on the line at infinity.
    pub fn apply(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        let p = self.matrix * Vector3::new(x, y, 1.0);
        let w = p[2];
        if !w.is_finite() || w.abs() <= W_EPS {
            return None;
        }
        let (u, v) = (p[0] / w, p[1] / w);
        (u.is_finite() && v.is_finite()).then_some((u, v))
    }
}

fn ensure_general_position(points: &[[f64; 2]; 4], side: &str) -> Result<(), TerraError> {
    const TRIPLES: [[usize; 3]; 4] = [[0, 1, 2], [0, 1, 3], [0, 2, 3], [1, 2, 3]];
    for [i, j, k] in TRIPLES {
        let (p, q, r) = (points[i], points[j], points[k]);
        let cross = (q[0] - p[0]) * (r[1] - p[1]) - (q[1] - p[1]) * (r[0] - p[0]);
        if !cross.is_finite() || cross.abs() <= COLLINEAR_EPS {
            return Err(TerraError::DegenerateCalibration(format!(
                "{side} points {i}, {j} and {k} are collinear"
            )));
        }
    }
    Ok(())
}

// ────────────────────────────────────────────────────────────────────────────
// PerspectiveWarper
// ────────────────────────────────────────────────────────────────────────────

/// Resamples camera-frame masks into the rectified top-down grid.
///
/// Output pixels whose pre-image falls outside the camera frame are 0.
/// Interior samples are bilinearly interpolated and rounded, so the output is
/// still a 0/1 mask.
#[derive(Debug, Clone)]
pub struct PerspectiveWarper {
    forward: Homography,
    width: usize,
    height: usize,
    /// Camera-frame sample location for every output pixel, row-major.
    lut: Vec<Option<(f64, f64)>>,
}

impl PerspectiveWarper {
    /// Build a warper for `width × height` frames from explicit corners.
    ///
    /// # Errors
    ///
    /// - [`TerraError::InvalidConfig`] for an empty frame or source corners
    ///   outside it.
    /// - [`TerraError::DegenerateCalibration`] for a singular calibration.
    pub fn new(
        src: &[[f64; 2]; 4],
        dst: &[[f64; 2]; 4],
        width: usize,
        height: usize,
    ) -> Result<Self, TerraError> {
        if width == 0 || height == 0 {
            return Err(TerraError::InvalidConfig(format!(
                "frame must be non-empty, got {width}x{height}"
            )));
        }
        for &[x, y] in src {
            if !(x >= 0.0 && y >= 0.0 && x < width as f64 && y < height as f64) {
                return Err(TerraError::InvalidConfig(format!(
                    "source point ({x}, {y}) lies outside a {width}x{height} frame"
                )));
            }
        }

        let forward = Homography::from_correspondences(src, dst)?;
        let inverse = forward.inverse()?;

        let mut lut = Vec::with_capacity(width * height);
        for row in 0..height {
            for col in 0..width {
                lut.push(inverse.apply(col as f64, row as f64));
            }
        }

        Ok(Self {
            forward,
            width,
            height,
            lut,
        })
    }

    /// Build a warper from a [`Calibration`], deriving the rectified corners
    /// from the frame size.
    pub fn from_calibration(
        calibration: &Calibration,
        width: usize,
        height: usize,
    ) -> Result<Self, TerraError> {
        let dst = calibration.destination(width, height);
        Self::new(&calibration.source, &dst, width, height)
    }

    /// `(width, height)` of the frames this warper accepts and produces.
    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn homography(&self) -> &Homography {
        &self.forward
    }

    /// Map a camera-frame point into the rectified grid.
    pub fn project_point(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        self.forward.apply(x, y)
    }

    /// Rectify `mask`.
    ///
    /// # Errors
    ///
    /// [`TerraError::ShapeMismatch`] when the mask size differs from the one
    /// the warper was built for.
    pub fn warp(&self, mask: &BinaryMask) -> Result<BinaryMask, TerraError> {
        if mask.dimensions() != self.dimensions() {
            return Err(TerraError::shape_mismatch(self.dimensions(), mask.dimensions()));
        }
        Ok(BinaryMask::from_fn(self.width, self.height, |col, row| {
            match self.lut[row * self.width + col] {
                Some((sx, sy)) => sample_bilinear(mask, sx, sy),
                None => false,
            }
        }))
    }
}

/// Bilinear sample of `mask` at `(x, y)`, with zeros outside the mask,
/// rounded to the nearest of 0 and 1.
fn sample_bilinear(mask: &BinaryMask, x: f64, y: f64) -> bool {
    let (w, h) = (mask.width() as f64, mask.height() as f64);
    if !(x > -1.0 && y > -1.0 && x < w && y < h) {
        return false;
    }

    let x0 = x.floor();
    let y0 = y.floor();
    let fx = x - x0;
    let fy = y - y0;

    let at = |cx: f64, cy: f64| -> f64 {
        if cx < 0.0 || cy < 0.0 || cx >= w || cy >= h {
            0.0
        } else {
            f64::from(mask.get(cx as usize, cy as usize))
        }
    };

    let value = at(x0, y0) * (1.0 - fx) * (1.0 - fy)
        + at(x0 + 1.0, y0) * fx * (1.0 - fy)
        + at(x0, y0 + 1.0) * (1.0 - fx) * fy
        + at(x0 + 1.0, y0 + 1.0) * fx * fy;
    value >= 0.5
}
