//! World-map accumulation and the debug overlay.
//!
//! Obstacle and navigable evidence is additive: every frame that passes the
//! attitude gate adds a fixed weight to each world cell its pixels project
//! onto.  A cell hit by several pixels of the same class in one frame is
//! credited once.  Sample sightings are not accumulated; the cell is
//! overwritten with full intensity on every channel.

use std::collections::BTreeSet;

use terrascan_types::{MapChannel, TerraError, TerrainClass, VisionOverlay, WorldMap};

use crate::threshold::ClassMasks;

/// Default obstacle increment per frame.
pub const DEFAULT_OBSTACLE_WEIGHT: u32 = 10;
/// Default navigable increment per frame.
pub const DEFAULT_NAVIGABLE_WEIGHT: u32 = 1;

/// World-grid indices of one frame's classified pixels.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProjectedFrame {
    pub obstacle: Vec<(usize, usize)>,
    pub navigable: Vec<(usize, usize)>,
    pub sample: Vec<(usize, usize)>,
}

impl ProjectedFrame {
    pub fn get(&self, class: TerrainClass) -> &[(usize, usize)] {
        match class {
            TerrainClass::Obstacle => &self.obstacle,
            TerrainClass::Navigable => &self.navigable,
            TerrainClass::Sample => &self.sample,
        }
    }
}

/// Number of distinct world cells written per class in one update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CellsTouched {
    pub obstacle: usize,
    pub navigable: usize,
    pub sample: usize,
}

/// Writes projected frames into a [`WorldMap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapAccumulator {
    obstacle_weight: u32,
    navigable_weight: u32,
}

impl Default for MapAccumulator {
    fn default() -> Self {
        Self::new(DEFAULT_OBSTACLE_WEIGHT, DEFAULT_NAVIGABLE_WEIGHT)
    }
}

impl MapAccumulator {
    pub fn new(obstacle_weight: u32, navigable_weight: u32) -> Self {
        Self {
            obstacle_weight,
            navigable_weight,
        }
    }

    /// Apply one frame of evidence.  Obstacles are written first, then
    /// navigable terrain, then samples, so a sample always wins its cell.
    pub fn accumulate(&self, map: &mut WorldMap, frame: &ProjectedFrame) -> CellsTouched {
        let obstacle = unique_cells(&frame.obstacle);
        for &(x, y) in &obstacle {
            map.add(x, y, MapChannel::Obstacle, self.obstacle_weight);
        }

        let navigable = unique_cells(&frame.navigable);
        for &(x, y) in &navigable {
            map.add(x, y, MapChannel::Navigable, self.navigable_weight);
        }

        let sample = unique_cells(&frame.sample);
        for &(x, y) in &sample {
            map.mark_sample(x, y);
        }

        CellsTouched {
            obstacle: obstacle.len(),
            navigable: navigable.len(),
            sample: sample.len(),
        }
    }
}

fn unique_cells(cells: &[(usize, usize)]) -> BTreeSet<(usize, usize)> {
    cells.iter().copied().collect()
}

/// Paint the three rectified masks into `overlay` at full intensity.
///
/// # Errors
///
/// [`TerraError::ShapeMismatch`] when the masks and overlay differ in size.
pub fn paint_overlay(overlay: &mut VisionOverlay, masks: &ClassMasks) -> Result<(), TerraError> {
    for class in TerrainClass::ALL {
        overlay.paint(class, masks.get(class))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use terrascan_types::BinaryMask;

    #[test]
    fn weights_apply_per_channel() {
        let mut map = WorldMap::new(10);
        let frame = ProjectedFrame {
            obstacle: vec![(1, 2)],
            navigable: vec![(3, 4)],
            sample: vec![],
        };
        let touched = MapAccumulator::default().accumulate(&mut map, &frame);
        assert_eq!(map.get(1, 2), [10, 0, 0]);
        assert_eq!(map.get(3, 4), [0, 0, 1]);
        assert_eq!(
            touched,
            CellsTouched {
                obstacle: 1,
                navigable: 1,
                sample: 0
            }
        );
    }

    #[test]
    fn repeated_cells_in_one_frame_count_once() {
        let mut map = WorldMap::new(10);
        let frame = ProjectedFrame {
            obstacle: vec![(5, 5), (5, 5), (5, 5)],
            navigable: vec![(0, 0), (0, 0)],
            sample: vec![],
        };
        MapAccumulator::default().accumulate(&mut map, &frame);
        assert_eq!(map.channel(5, 5, MapChannel::Obstacle), 10);
        assert_eq!(map.channel(0, 0, MapChannel::Navigable), 1);
    }

    #[test]
    fn evidence_accumulates_across_frames() {
        let mut map = WorldMap::new(10);
        let frame = ProjectedFrame {
            obstacle: vec![(2, 2)],
            navigable: vec![(2, 3)],
            sample: vec![],
        };
        let acc = MapAccumulator::default();
        for _ in 0..4 {
            acc.accumulate(&mut map, &frame);
        }
        assert_eq!(map.channel(2, 2, MapChannel::Obstacle), 40);
        assert_eq!(map.channel(2, 3, MapChannel::Navigable), 4);
    }

    #[test]
    fn sample_overwrites_accumulated_evidence() {
        let mut map = WorldMap::new(10);
        let frame = ProjectedFrame {
            obstacle: vec![(7, 7)],
            navigable: vec![(7, 7)],
            sample: vec![(7, 7), (7, 7)],
        };
        let touched = MapAccumulator::default().accumulate(&mut map, &frame);
        assert_eq!(map.get(7, 7), [255, 255, 255]);
        assert_eq!(touched.sample, 1);
    }

    #[test]
    fn paint_overlay_uses_class_channels() {
        let mut overlay = VisionOverlay::new(3, 1);
        let masks = ClassMasks {
            obstacle: BinaryMask::from_fn(3, 1, |c, _| c == 0),
            navigable: BinaryMask::from_fn(3, 1, |c, _| c == 1),
            sample: BinaryMask::from_fn(3, 1, |c, _| c == 2),
        };
        paint_overlay(&mut overlay, &masks).unwrap();
        assert_eq!(overlay.pixel(0, 0), [255, 0, 0]);
        assert_eq!(overlay.pixel(1, 0), [0, 0, 255]);
        assert_eq!(overlay.pixel(2, 0), [0, 255, 0]);
    }

    #[test]
    fn paint_overlay_replaces_previous_frame() {
        let mut overlay = VisionOverlay::new(2, 1);
        let lit = ClassMasks {
            obstacle: BinaryMask::from_fn(2, 1, |_, _| true),
            navigable: BinaryMask::from_fn(2, 1, |_, _| true),
            sample: BinaryMask::from_fn(2, 1, |_, _| true),
        };
        paint_overlay(&mut overlay, &lit).unwrap();
        let dark = ClassMasks {
            obstacle: BinaryMask::zeros(2, 1),
            navigable: BinaryMask::zeros(2, 1),
            sample: BinaryMask::zeros(2, 1),
        };
        paint_overlay(&mut overlay, &dark).unwrap();
        assert!(overlay.as_raw().iter().all(|&v| v == 0));
    }
}
