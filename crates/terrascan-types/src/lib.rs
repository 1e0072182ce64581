//! `terrascan-types` – shared data model for the TerraScan perception stack.
//!
//! Dense, fixed-shape containers for camera frames, binary masks and the
//! persistent world map, plus the rover state record that the perception
//! pipeline reads from and writes to once per frame.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

/// Workspace error type spanning configuration faults, frame shape
/// violations, and replay harness failures.
///
/// Attitude gating and out-of-range projections are not errors: the former
/// suppresses map writes, the latter is clipped.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TerraError {
    #[error("Degenerate calibration: {0}")]
    DegenerateCalibration(String),

    #[error(
        "Shape mismatch: expected {expected_width}x{expected_height}, got {actual_width}x{actual_height}"
    )]
    ShapeMismatch {
        expected_width: usize,
        expected_height: usize,
        actual_width: usize,
        actual_height: usize,
    },

    #[error("Pixel buffer length mismatch: expected {expected} bytes, got {actual}")]
    BufferLength { expected: usize, actual: usize },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Frame log error: {0}")]
    FrameLog(String),
}

impl TerraError {
    /// Build a [`TerraError::ShapeMismatch`] from `(width, height)` pairs.
    pub fn shape_mismatch(expected: (usize, usize), actual: (usize, usize)) -> Self {
        Self::ShapeMismatch {
            expected_width: expected.0,
            expected_height: expected.1,
            actual_width: actual.0,
            actual_height: actual.1,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Terrain classes
// ────────────────────────────────────────────────────────────────────────────

/// The three terrain classes extracted from every camera frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TerrainClass {
    Obstacle,
    Navigable,
    Sample,
}

impl TerrainClass {
    pub const ALL: [TerrainClass; 3] = [Self::Obstacle, Self::Navigable, Self::Sample];
}

impl std::fmt::Display for TerrainClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TerrainClass::Obstacle => write!(f, "obstacle"),
            TerrainClass::Navigable => write!(f, "navigable"),
            TerrainClass::Sample => write!(f, "sample"),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// RgbImage
// ────────────────────────────────────────────────────────────────────────────

/// A row-major 8-bit RGB frame (`height × width × 3`).
#[derive(Debug, Clone, PartialEq)]
pub struct RgbImage {
    width: usize,
    height: usize,
    data: Vec<u8>,
}

impl RgbImage {
    /// Create an all-black image.
    pub fn new(width: usize, height: usize) -> Self {
        Self::filled(width, height, [0, 0, 0])
    }

    /// Create an image where every pixel has the colour `rgb`.
    pub fn filled(width: usize, height: usize, rgb: [u8; 3]) -> Self {
        let mut data = Vec::with_capacity(width * height * 3);
        for _ in 0..width * height {
            data.extend_from_slice(&rgb);
        }
        Self {
            width,
            height,
            data,
        }
    }

    /// Wrap an existing interleaved RGB buffer.
    ///
    /// # Errors
    ///
    /// [`TerraError::BufferLength`] when `data.len() != width * height * 3`.
    pub fn from_raw(width: usize, height: usize, data: Vec<u8>) -> Result<Self, TerraError> {
        let expected = width * height * 3;
        if data.len() != expected {
            return Err(TerraError::BufferLength {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// `(width, height)`.
    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// The pixel at column `x`, row `y`.
    ///
    /// # Panics
    ///
    /// Panics if `(x, y)` is outside the image.
    pub fn pixel(&self, x: usize, y: usize) -> [u8; 3] {
        let i = self.offset(x, y);
        [self.data[i], self.data[i + 1], self.data[i + 2]]
    }

    pub fn set_pixel(&mut self, x: usize, y: usize, rgb: [u8; 3]) {
        let i = self.offset(x, y);
        self.data[i..i + 3].copy_from_slice(&rgb);
    }

    /// Iterate over all pixels in row-major order.
    pub fn pixels(&self) -> impl Iterator<Item = [u8; 3]> + '_ {
        self.data.chunks_exact(3).map(|p| [p[0], p[1], p[2]])
    }

    pub fn as_raw(&self) -> &[u8] {
        &self.data
    }

    fn offset(&self, x: usize, y: usize) -> usize {
        assert!(x < self.width && y < self.height, "pixel ({x}, {y}) out of bounds");
        (y * self.width + x) * 3
    }
}

// ────────────────────────────────────────────────────────────────────────────
// BinaryMask
// ────────────────────────────────────────────────────────────────────────────

/// A single-channel mask whose cells are 0 or 1.
///
/// The only way to write a cell is through a `bool`, so a mask can never hold
/// any other value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryMask {
    width: usize,
    height: usize,
    data: Vec<u8>,
}

impl BinaryMask {
    /// Create an all-zero mask.
    pub fn zeros(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0; width * height],
        }
    }

    /// Build a mask by evaluating `f(col, row)` for every cell.
    pub fn from_fn(width: usize, height: usize, mut f: impl FnMut(usize, usize) -> bool) -> Self {
        let mut data = Vec::with_capacity(width * height);
        for row in 0..height {
            for col in 0..width {
                data.push(u8::from(f(col, row)));
            }
        }
        Self {
            width,
            height,
            data,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// `(width, height)`.
    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// Cell value (0 or 1) at column `x`, row `y`.
    pub fn get(&self, x: usize, y: usize) -> u8 {
        self.data[y * self.width + x]
    }

    pub fn set(&mut self, x: usize, y: usize, on: bool) {
        self.data[y * self.width + x] = u8::from(on);
    }

    /// Number of cells set to 1.
    pub fn count_ones(&self) -> usize {
        self.data.iter().filter(|&&v| v == 1).count()
    }

    /// `(col, row)` of every foreground cell, in row-major order.
    pub fn foreground(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.data
            .iter()
            .enumerate()
            .filter(|&(_, &v)| v == 1)
            .map(|(i, _)| (i % self.width, i / self.width))
    }

    pub fn as_raw(&self) -> &[u8] {
        &self.data
    }
}

// ────────────────────────────────────────────────────────────────────────────
// RoverPose
// ────────────────────────────────────────────────────────────────────────────

/// Rover world position and attitude.
///
/// Angles are in degrees, conventionally in `[0, 360)`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RoverPose {
    /// World X position (metres, equal to world-grid cells).
    pub x: f64,
    /// World Y position.
    pub y: f64,
    /// Heading, counter-clockwise from world +X.
    pub yaw: f64,
    pub pitch: f64,
    pub roll: f64,
}

impl RoverPose {
    /// A level pose at `(x, y)` with heading `yaw`.
    pub fn level(x: f64, y: f64, yaw: f64) -> Self {
        Self {
            x,
            y,
            yaw,
            pitch: 0.0,
            roll: 0.0,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// PolarObservation
// ────────────────────────────────────────────────────────────────────────────

/// Navigable terrain expressed as `(distance, bearing)` pairs in the rover
/// frame.  Bearings are radians, positive to the left.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PolarObservation {
    pub distances: Vec<f64>,
    pub angles: Vec<f64>,
}

impl PolarObservation {
    pub fn len(&self) -> usize {
        self.distances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.distances.is_empty()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// WorldMap
// ────────────────────────────────────────────────────────────────────────────

/// Value written to every channel of a cell where a sample was seen.
pub const SAMPLE_INTENSITY: u32 = 255;

/// One accumulator channel of the [`WorldMap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MapChannel {
    Obstacle = 0,
    /// Only ever written by sample marking.
    Unused = 1,
    Navigable = 2,
}

/// Square world grid of three-channel evidence accumulators, indexed
/// `(x, y)` with both axes in `[0, size)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorldMap {
    size: usize,
    cells: Vec<[u32; 3]>,
}

impl WorldMap {
    /// Create an empty `size × size` map.
    pub fn new(size: usize) -> Self {
        Self {
            size,
            cells: vec![[0; 3]; size * size],
        }
    }

    /// Side length in cells.
    pub fn size(&self) -> usize {
        self.size
    }

    /// All three channel values at `(x, y)`.
    pub fn get(&self, x: usize, y: usize) -> [u32; 3] {
        self.cells[self.index(x, y)]
    }

    pub fn channel(&self, x: usize, y: usize, channel: MapChannel) -> u32 {
        self.get(x, y)[channel as usize]
    }

    /// Add `weight` to one channel of `(x, y)`, saturating at `u32::MAX`.
    pub fn add(&mut self, x: usize, y: usize, channel: MapChannel, weight: u32) {
        let i = self.index(x, y);
        let cell = &mut self.cells[i][channel as usize];
        *cell = cell.saturating_add(weight);
    }

    /// Overwrite every channel of `(x, y)` with [`SAMPLE_INTENSITY`].
    pub fn mark_sample(&mut self, x: usize, y: usize) {
        let i = self.index(x, y);
        self.cells[i] = [SAMPLE_INTENSITY; 3];
    }

    /// Number of cells with a non-zero value in `channel`.
    pub fn count_nonzero(&self, channel: MapChannel) -> usize {
        self.cells
            .iter()
            .filter(|c| c[channel as usize] > 0)
            .count()
    }

    /// `(x, y, value)` for every cell with a non-zero value in `channel`.
    pub fn nonzero(&self, channel: MapChannel) -> impl Iterator<Item = (usize, usize, u32)> + '_ {
        let size = self.size;
        self.cells
            .iter()
            .enumerate()
            .filter(move |(_, c)| c[channel as usize] > 0)
            .map(move |(i, c)| (i % size, i / size, c[channel as usize]))
    }

    fn index(&self, x: usize, y: usize) -> usize {
        assert!(x < self.size && y < self.size, "cell ({x}, {y}) out of bounds");
        y * self.size + x
    }
}

// ────────────────────────────────────────────────────────────────────────────
// VisionOverlay
// ────────────────────────────────────────────────────────────────────────────

/// Debug image of the rectified masks: channel 0 obstacle, channel 1 sample,
/// channel 2 navigable; each cell is 0 or 255.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisionOverlay {
    width: usize,
    height: usize,
    data: Vec<u8>,
}

impl VisionOverlay {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0; width * height * 3],
        }
    }

    /// `(width, height)`.
    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// Overlay channel used to display `class`.
    pub fn channel_for(class: TerrainClass) -> usize {
        match class {
            TerrainClass::Obstacle => 0,
            TerrainClass::Sample => 1,
            TerrainClass::Navigable => 2,
        }
    }

    /// Replace one channel with `mask` scaled to full intensity.
    ///
    /// # Errors
    ///
    /// [`TerraError::ShapeMismatch`] when the mask and overlay differ in size.
    pub fn paint(&mut self, class: TerrainClass, mask: &BinaryMask) -> Result<(), TerraError> {
        if mask.dimensions() != self.dimensions() {
            return Err(TerraError::shape_mismatch(self.dimensions(), mask.dimensions()));
        }
        let channel = Self::channel_for(class);
        for (px, &v) in self.data.chunks_exact_mut(3).zip(mask.as_raw()) {
            px[channel] = v * 255;
        }
        Ok(())
    }

    pub fn pixel(&self, x: usize, y: usize) -> [u8; 3] {
        let i = (y * self.width + x) * 3;
        [self.data[i], self.data[i + 1], self.data[i + 2]]
    }

    pub fn as_raw(&self) -> &[u8] {
        &self.data
    }
}

// ────────────────────────────────────────────────────────────────────────────
// RoverState
// ────────────────────────────────────────────────────────────────────────────

/// The rover state record exchanged with the perception pipeline.
///
/// The pipeline reads `image` and `pose`, and writes `vision_image`,
/// `worldmap` and `nav`.  Nothing else is touched.
#[derive(Debug, Clone)]
pub struct RoverState {
    pub image: RgbImage,
    pub pose: RoverPose,
    pub vision_image: VisionOverlay,
    pub worldmap: WorldMap,
    pub nav: PolarObservation,
}

impl RoverState {
    /// Fresh state for frames of `frame_width × frame_height` and a world of
    /// `world_size × world_size` cells.
    pub fn new(frame_width: usize, frame_height: usize, world_size: usize) -> Self {
        Self {
            image: RgbImage::new(frame_width, frame_height),
            pose: RoverPose::default(),
            vision_image: VisionOverlay::new(frame_width, frame_height),
            worldmap: WorldMap::new(world_size),
            nav: PolarObservation::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgb_from_raw_rejects_wrong_length() {
        let err = RgbImage::from_raw(2, 2, vec![0; 11]).unwrap_err();
        assert_eq!(
            err,
            TerraError::BufferLength {
                expected: 12,
                actual: 11
            }
        );
    }

    #[test]
    fn rgb_pixel_roundtrip() {
        let mut img = RgbImage::new(3, 2);
        img.set_pixel(2, 1, [10, 20, 30]);
        assert_eq!(img.pixel(2, 1), [10, 20, 30]);
        assert_eq!(img.pixel(0, 0), [0, 0, 0]);
        assert_eq!(img.pixels().count(), 6);
    }

    #[test]
    fn mask_foreground_is_row_major() {
        let mut mask = BinaryMask::zeros(4, 3);
        mask.set(3, 0, true);
        mask.set(1, 2, true);
        let fg: Vec<_> = mask.foreground().collect();
        assert_eq!(fg, vec![(3, 0), (1, 2)]);
        assert_eq!(mask.count_ones(), 2);
    }

    #[test]
    fn world_map_add_saturates() {
        let mut map = WorldMap::new(4);
        map.add(1, 2, MapChannel::Obstacle, u32::MAX - 1);
        map.add(1, 2, MapChannel::Obstacle, 10);
        assert_eq!(map.channel(1, 2, MapChannel::Obstacle), u32::MAX);
    }

    #[test]
    fn world_map_sample_overwrites_all_channels() {
        let mut map = WorldMap::new(4);
        map.add(0, 0, MapChannel::Navigable, 3);
        map.mark_sample(0, 0);
        assert_eq!(map.get(0, 0), [255, 255, 255]);
    }

    #[test]
    fn world_map_nonzero_reports_coordinates() {
        let mut map = WorldMap::new(5);
        map.add(4, 1, MapChannel::Navigable, 2);
        let cells: Vec<_> = map.nonzero(MapChannel::Navigable).collect();
        assert_eq!(cells, vec![(4, 1, 2)]);
        assert_eq!(map.count_nonzero(MapChannel::Obstacle), 0);
    }

    #[test]
    #[should_panic]
    fn world_map_out_of_bounds_panics() {
        let map = WorldMap::new(3);
        let _ = map.get(3, 0);
    }

    #[test]
    fn overlay_paint_scales_to_full_intensity() {
        let mut overlay = VisionOverlay::new(2, 1);
        let mut mask = BinaryMask::zeros(2, 1);
        mask.set(1, 0, true);
        overlay.paint(TerrainClass::Navigable, &mask).unwrap();
        assert_eq!(overlay.pixel(1, 0), [0, 0, 255]);
        assert_eq!(overlay.pixel(0, 0), [0, 0, 0]);
    }

    #[test]
    fn overlay_paint_rejects_shape_mismatch() {
        let mut overlay = VisionOverlay::new(2, 2);
        let mask = BinaryMask::zeros(3, 2);
        assert!(matches!(
            overlay.paint(TerrainClass::Obstacle, &mask),
            Err(TerraError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn terra_error_display() {
        let err = TerraError::shape_mismatch((320, 160), (100, 50));
        assert!(err.to_string().contains("320x160"));
        assert!(err.to_string().contains("100x50"));
    }

    #[test]
    fn pose_serialization_roundtrip() {
        let pose = RoverPose {
            x: 99.7,
            y: 85.6,
            yaw: 56.8,
            pitch: 0.3,
            roll: 359.9,
        };
        let json = serde_json::to_string(&pose).unwrap();
        let back: RoverPose = serde_json::from_str(&json).unwrap();
        assert_eq!(pose, back);
    }
}
