//! Colour thresholding.
//!
//! Splits a camera frame into one [`BinaryMask`] per [`TerrainClass`] by
//! testing every pixel against an inclusive per-channel RGB band.
//!
//! The default obstacle and navigable bands are both closed at 160, so a
//! pixel of exactly `(160, 160, 160)` is classified as both.  The masks are
//! not mutually exclusive at that boundary.
//!
//! # Example
//!
//! ```rust
//! use terrascan_perception::threshold::{color_thresh, ThresholdBand};
//! use terrascan_types::RgbImage;
//!
//! let frame = RgbImage::filled(4, 2, [200, 190, 180]);
//! let mask = color_thresh(&frame, &ThresholdBand::NAVIGABLE);
//! assert_eq!(mask.count_ones(), 8);
//! ```

use serde::{Deserialize, Serialize};
use terrascan_types::{BinaryMask, RgbImage, TerrainClass};

// ────────────────────────────────────────────────────────────────────────────
// ThresholdBand
// ────────────────────────────────────────────────────────────────────────────

/// An inclusive RGB band: a pixel matches when `min[c] <= p[c] <= max[c]`
/// for every channel `c`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdBand {
    pub min: [u8; 3],
    pub max: [u8; 3],
}

impl ThresholdBand {
    /// Dark rock walls and everything else that is not bright ground.
    pub const OBSTACLE: Self = Self::new([0, 0, 0], [160, 160, 160]);
    /// Bright sand.
    pub const NAVIGABLE: Self = Self::new([160, 160, 160], [255, 255, 255]);
    /// Yellow rock samples.
    pub const SAMPLE: Self = Self::new([100, 100, 0], [255, 255, 20]);

    pub const fn new(min: [u8; 3], max: [u8; 3]) -> Self {
        Self { min, max }
    }

    /// The compiled-in band for `class`.
    pub fn for_class(class: TerrainClass) -> Self {
        match class {
            TerrainClass::Obstacle => Self::OBSTACLE,
            TerrainClass::Navigable => Self::NAVIGABLE,
            TerrainClass::Sample => Self::SAMPLE,
        }
    }

    /// True when every channel of `rgb` lies inside the band.
    #[inline]
    pub fn contains(&self, rgb: [u8; 3]) -> bool {
        (0..3).all(|c| rgb[c] >= self.min[c] && rgb[c] <= self.max[c])
    }

    /// True when no pixel can ever match (`min > max` on some channel).
    pub fn is_empty(&self) -> bool {
        (0..3).any(|c| self.min[c] > self.max[c])
    }
}

/// Produce a mask of the same size as `image` with 1 wherever the pixel lies
/// inside `band`.
pub fn color_thresh(image: &RgbImage, band: &ThresholdBand) -> BinaryMask {
    BinaryMask::from_fn(image.width(), image.height(), |col, row| {
        band.contains(image.pixel(col, row))
    })
}

// ────────────────────────────────────────────────────────────────────────────
// ColorClassifier
// ────────────────────────────────────────────────────────────────────────────

/// One mask per terrain class, all with the dimensions of the source frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassMasks {
    pub obstacle: BinaryMask,
    pub navigable: BinaryMask,
    pub sample: BinaryMask,
}

impl ClassMasks {
    pub fn get(&self, class: TerrainClass) -> &BinaryMask {
        match class {
            TerrainClass::Obstacle => &self.obstacle,
            TerrainClass::Navigable => &self.navigable,
            TerrainClass::Sample => &self.sample,
        }
    }

    /// Apply `f` to every mask, keeping the class assignment.
    pub fn try_map<E>(
        &self,
        mut f: impl FnMut(&BinaryMask) -> Result<BinaryMask, E>,
    ) -> Result<Self, E> {
        Ok(Self {
            obstacle: f(&self.obstacle)?,
            navigable: f(&self.navigable)?,
            sample: f(&self.sample)?,
        })
    }
}

/// Applies the three class bands to a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorClassifier {
    pub obstacle: ThresholdBand,
    pub navigable: ThresholdBand,
    pub sample: ThresholdBand,
}

impl Default for ColorClassifier {
    fn default() -> Self {
        Self {
            obstacle: ThresholdBand::OBSTACLE,
            navigable: ThresholdBand::NAVIGABLE,
            sample: ThresholdBand::SAMPLE,
        }
    }
}

impl ColorClassifier {
    pub fn new(obstacle: ThresholdBand, navigable: ThresholdBand, sample: ThresholdBand) -> Self {
        Self {
            obstacle,
            navigable,
            sample,
        }
    }

    pub fn classify(&self, image: &RgbImage) -> ClassMasks {
        ClassMasks {
            obstacle: color_thresh(image, &self.obstacle),
            navigable: color_thresh(image, &self.navigable),
            sample: color_thresh(image, &self.sample),
        }
    }
}
