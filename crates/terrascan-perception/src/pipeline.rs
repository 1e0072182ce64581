//! [`PerceptionPipeline`] – one camera frame in, one map update out.
//!
//! Each call to [`PerceptionPipeline::step`]:
//!
//! 1. **Classify** – threshold the frame into obstacle, navigable and sample
//!    masks.
//! 2. **Rectify** – warp each mask into the top-down grid and paint the
//!    vision overlay.
//! 3. **Project** – convert rectified pixels into rover-frame points and then
//!    into world-grid indices using the rover pose.
//! 4. **Gate** – if roll or pitch exceed the attitude tolerance the world map
//!    is left untouched for this frame.
//! 5. **Accumulate** – otherwise add obstacle and navigable evidence and mark
//!    sample cells.
//! 6. **Summarise** – publish the navigable terrain as polar coordinates,
//!    whether or not the map was updated.
//!
//! The pipeline reads `image` and `pose` from [`RoverState`] and writes only
//! `vision_image`, `worldmap` and `nav`.  Frame-shape violations are detected
//! before any field is written.
//!
//! # Example
//!
//! ```rust
//! use terrascan_perception::{PerceptionConfig, PerceptionPipeline};
//! use terrascan_types::{RgbImage, RoverPose};
//!
//! let pipeline = PerceptionPipeline::new(PerceptionConfig::default()).unwrap();
//! let mut rover = pipeline.new_rover_state();
//! rover.image = RgbImage::filled(320, 160, [210, 190, 170]);
//! rover.pose = RoverPose::level(100.0, 100.0, 0.0);
//!
//! let report = pipeline.step(&mut rover).unwrap();
//! assert!(report.map_updated);
//! assert!(!rover.nav.is_empty());
//! ```

use terrascan_types::{RoverState, TerraError};
use tracing::{debug, info, instrument, warn};

use crate::accumulate::{CellsTouched, MapAccumulator, ProjectedFrame, paint_overlay};
use crate::attitude::AttitudeGate;
use crate::config::PerceptionConfig;
use crate::frame::{rover_coords, to_polar_coords};
use crate::threshold::ColorClassifier;
use crate::transform::WorldProjector;
use crate::warp::PerspectiveWarper;

// ─────────────────────────────────────────────────────────────────────────────
// FrameReport
// ─────────────────────────────────────────────────────────────────────────────

/// Summary of one processed frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameReport {
    /// Rectified obstacle pixels.
    pub obstacle_pixels: usize,
    /// Rectified navigable pixels (equal to the length of the polar summary).
    pub navigable_pixels: usize,
    /// Rectified sample pixels.
    pub sample_pixels: usize,
    /// `false` when the attitude gate suppressed the map update.
    pub map_updated: bool,
    /// Distinct world cells written, when the map was updated.
    pub cells_touched: Option<CellsTouched>,
}

// ─────────────────────────────────────────────────────────────────────────────
// PerceptionPipeline
// ─────────────────────────────────────────────────────────────────────────────

/// Stateless per-frame orchestrator.
///
/// All persistent state lives in the [`RoverState`] passed to
/// [`step`][Self::step]; taking it by `&mut` serialises frames for a given
/// rover.
#[derive(Debug, Clone)]
pub struct PerceptionPipeline {
    config: PerceptionConfig,
    classifier: ColorClassifier,
    warper: PerspectiveWarper,
    projector: WorldProjector,
    gate: AttitudeGate,
    accumulator: MapAccumulator,
}

impl PerceptionPipeline {
    /// Validate `config` and solve the calibration.
    ///
    /// # Errors
    ///
    /// - [`TerraError::InvalidConfig`] for out-of-domain values.
    /// - [`TerraError::DegenerateCalibration`] for a singular calibration.
    pub fn new(config: PerceptionConfig) -> Result<Self, TerraError> {
        config.validate()?;

        let warper = PerspectiveWarper::from_calibration(
            &config.calibration,
            config.frame_width,
            config.frame_height,
        )?;
        let projector = WorldProjector::new(config.world_size, config.scale)?;
        let classifier =
            ColorClassifier::new(config.obstacle_band, config.navigable_band, config.sample_band);
        let gate = AttitudeGate::new(config.attitude_tolerance_deg);
        let accumulator = MapAccumulator::new(config.obstacle_weight, config.navigable_weight);

        info!(
            frame_width = config.frame_width,
            frame_height = config.frame_height,
            world_size = config.world_size,
            scale = config.scale,
            "perception pipeline ready"
        );

        Ok(Self {
            config,
            classifier,
            warper,
            projector,
            gate,
            accumulator,
        })
    }

    pub fn config(&self) -> &PerceptionConfig {
        &self.config
    }

    /// A blank [`RoverState`] sized for this pipeline.
    pub fn new_rover_state(&self) -> RoverState {
        RoverState::new(
            self.config.frame_width,
            self.config.frame_height,
            self.config.world_size,
        )
    }

    /// Process the frame currently held in `rover`.
    ///
    /// # Errors
    ///
    /// [`TerraError::ShapeMismatch`] when the frame, overlay or world map do
    /// not have the configured dimensions.  `rover` is left unmodified.
    #[instrument(
        level = "debug",
        skip_all,
        fields(x = rover.pose.x, y = rover.pose.y, yaw = rover.pose.yaw)
    )]
    pub fn step(&self, rover: &mut RoverState) -> Result<FrameReport, TerraError> {
        self.check_shapes(rover)?;
        let pose = rover.pose;

        let masks = self.classifier.classify(&rover.image);
        let warped = masks.try_map(|mask| self.warper.warp(mask))?;
        paint_overlay(&mut rover.vision_image, &warped)?;

        let obstacle_pts = rover_coords(&warped.obstacle);
        let navigable_pts = rover_coords(&warped.navigable);
        let sample_pts = rover_coords(&warped.sample);

        let projected = ProjectedFrame {
            obstacle: self.projector.project(&obstacle_pts, &pose),
            navigable: self.projector.project(&navigable_pts, &pose),
            sample: self.projector.project(&sample_pts, &pose),
        };

        let map_updated = self.gate.accepts(&pose);
        let cells_touched = if map_updated {
            Some(self.accumulator.accumulate(&mut rover.worldmap, &projected))
        } else {
            warn!(
                roll = pose.roll,
                pitch = pose.pitch,
                tolerance = self.gate.tolerance_deg(),
                "attitude outside tolerance; world map not updated"
            );
            None
        };

        rover.nav = to_polar_coords(&navigable_pts);

        let report = FrameReport {
            obstacle_pixels: obstacle_pts.len(),
            navigable_pixels: navigable_pts.len(),
            sample_pixels: sample_pts.len(),
            map_updated,
            cells_touched,
        };
        debug!(?report, "frame processed");
        Ok(report)
    }

    fn check_shapes(&self, rover: &RoverState) -> Result<(), TerraError> {
        let expected = self.warper.dimensions();
        if rover.image.dimensions() != expected {
            return Err(TerraError::shape_mismatch(expected, rover.image.dimensions()));
        }
        if rover.vision_image.dimensions() != expected {
            return Err(TerraError::shape_mismatch(
                expected,
                rover.vision_image.dimensions(),
            ));
        }
        let size = self.projector.world_size();
        if rover.worldmap.size() != size {
            return Err(TerraError::shape_mismatch(
                (size, size),
                (rover.worldmap.size(), rover.worldmap.size()),
            ));
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::RoverFramePoints;
    use crate::warp::Calibration;
    use std::collections::BTreeSet;
    use terrascan_types::{MapChannel, RgbImage, RoverPose, WorldMap};

    const SAND: [u8; 3] = [200, 180, 160];
    const ROCK: [u8; 3] = [90, 70, 50];
    const GOLD: [u8; 3] = [200, 180, 0];

    fn pipeline() -> PerceptionPipeline {
        PerceptionPipeline::new(PerceptionConfig::default()).unwrap()
    }

    /// Sand below row 100, rock wall above; optionally a gold sample.
    fn scene(with_sample: bool) -> RgbImage {
        let mut img = RgbImage::filled(320, 160, ROCK);
        for row in 100..160 {
            for col in 0..320 {
                img.set_pixel(col, row, SAND);
            }
        }
        if with_sample {
            for row in 105..130 {
                for col in 130..190 {
                    img.set_pixel(col, row, GOLD);
                }
            }
        }
        img
    }

    fn rover_with(p: &PerceptionPipeline, image: RgbImage, pose: RoverPose) -> RoverState {
        let mut rover = p.new_rover_state();
        rover.image = image;
        rover.pose = pose;
        rover
    }

    fn channel_snapshot(map: &WorldMap, channel: MapChannel) -> Vec<u32> {
        let n = map.size();
        (0..n)
            .flat_map(|y| (0..n).map(move |x| (x, y)))
            .map(|(x, y)| map.channel(x, y, channel))
            .collect()
    }

    #[test]
    fn black_frame_only_adds_obstacle_weight() {
        let p = pipeline();
        let pose = RoverPose::level(99.7, 85.6, 0.0);
        let mut rover = rover_with(&p, RgbImage::new(320, 160), pose);

        let report = p.step(&mut rover).unwrap();
        assert!(report.map_updated);
        assert!(report.obstacle_pixels > 0);
        assert_eq!(report.navigable_pixels, 0);
        assert_eq!(report.sample_pixels, 0);
        assert!(rover.nav.is_empty());

        // Expected cells, computed through the individual stages.
        let warper = PerspectiveWarper::from_calibration(&Calibration::default(), 320, 160).unwrap();
        let full = terrascan_types::BinaryMask::from_fn(320, 160, |_, _| true);
        let pts = rover_coords(&warper.warp(&full).unwrap());
        let expected: BTreeSet<_> = WorldProjector::new(200, 10.0)
            .unwrap()
            .project(&pts, &pose)
            .into_iter()
            .collect();
        assert!(!expected.is_empty());

        for y in 0..200 {
            for x in 0..200 {
                let cell = rover.worldmap.get(x, y);
                if expected.contains(&(x, y)) {
                    assert_eq!(cell, [10, 0, 0], "cell ({x}, {y})");
                } else {
                    assert_eq!(cell, [0, 0, 0], "cell ({x}, {y})");
                }
            }
        }
        // Everything seen lies within ~20 m of the rover.
        for &(x, y) in &expected {
            assert!((x as f64 - 99.7).abs() < 20.0 && (y as f64 - 85.6).abs() < 20.0);
        }
    }

    #[test]
    fn repeated_valid_frames_strictly_increase_touched_cells() {
        let p = pipeline();
        let mut rover = rover_with(&p, scene(false), RoverPose::level(120.0, 60.0, 30.0));

        let mut prev_obs = channel_snapshot(&rover.worldmap, MapChannel::Obstacle);
        let mut prev_nav = channel_snapshot(&rover.worldmap, MapChannel::Navigable);
        for _ in 0..3 {
            let report = p.step(&mut rover).unwrap();
            let touched = report.cells_touched.unwrap();
            assert!(touched.obstacle > 0 && touched.navigable > 0);

            let obs = channel_snapshot(&rover.worldmap, MapChannel::Obstacle);
            let nav = channel_snapshot(&rover.worldmap, MapChannel::Navigable);
            for (before, after) in prev_obs.iter().zip(&obs).chain(prev_nav.iter().zip(&nav)) {
                assert!(after >= before);
            }
            let grew_obs = prev_obs.iter().zip(&obs).filter(|(b, a)| a > b).count();
            let grew_nav = prev_nav.iter().zip(&nav).filter(|(b, a)| a > b).count();
            assert_eq!(grew_obs, touched.obstacle);
            assert_eq!(grew_nav, touched.navigable);
            prev_obs = obs;
            prev_nav = nav;
        }
    }

    #[test]
    fn tilted_frame_leaves_map_but_publishes_polar() {
        let p = pipeline();
        let mut pose = RoverPose::level(100.0, 100.0, 0.0);
        pose.roll = 45.0;
        let mut rover = rover_with(&p, scene(true), pose);

        let before = rover.worldmap.clone();
        let report = p.step(&mut rover).unwrap();

        assert!(!report.map_updated);
        assert!(report.cells_touched.is_none());
        assert_eq!(rover.worldmap, before);
        assert!(!rover.nav.is_empty());
        assert_eq!(rover.nav.len(), report.navigable_pixels);
        // The overlay is refreshed regardless of gating.
        assert!(rover.vision_image.as_raw().iter().any(|&v| v == 255));
    }

    #[test]
    fn polar_summary_matches_navigable_rover_points() {
        let p = pipeline();
        let mut rover = rover_with(&p, scene(false), RoverPose::level(50.0, 50.0, 0.0));
        p.step(&mut rover).unwrap();

        let warper = PerspectiveWarper::from_calibration(&Calibration::default(), 320, 160).unwrap();
        let nav_mask = crate::threshold::color_thresh(
            &scene(false),
            &crate::threshold::ThresholdBand::NAVIGABLE,
        );
        let pts: RoverFramePoints = rover_coords(&warper.warp(&nav_mask).unwrap());
        assert_eq!(rover.nav, to_polar_coords(&pts));
        assert!(rover.nav.distances.iter().all(|&d| d >= 0.0));
    }

    #[test]
    fn sample_cells_are_set_to_full_intensity() {
        let p = pipeline();
        let mut rover = rover_with(&p, scene(true), RoverPose::level(100.0, 100.0, 0.0));
        let report = p.step(&mut rover).unwrap();
        assert!(report.sample_pixels > 0);

        let touched = report.cells_touched.unwrap();
        let marked: Vec<_> = rover
            .worldmap
            .nonzero(MapChannel::Unused)
            .map(|(x, y, _)| (x, y))
            .collect();
        assert_eq!(marked.len(), touched.sample);
        for (x, y) in marked {
            assert_eq!(rover.worldmap.get(x, y), [255, 255, 255]);
        }
    }

    #[test]
    fn overlay_channels_follow_rectified_masks() {
        let p = pipeline();
        let mut rover = rover_with(&p, scene(true), RoverPose::level(100.0, 100.0, 0.0));
        let report = p.step(&mut rover).unwrap();

        let lit = |c: usize| {
            rover
                .vision_image
                .as_raw()
                .chunks_exact(3)
                .filter(|px| px[c] == 255)
                .count()
        };
        assert_eq!(lit(0), report.obstacle_pixels);
        assert_eq!(lit(1), report.sample_pixels);
        assert_eq!(lit(2), report.navigable_pixels);
    }

    #[test]
    fn wrong_frame_size_fails_without_touching_state() {
        let p = pipeline();
        let mut rover = p.new_rover_state();
        rover.image = RgbImage::filled(160, 80, SAND);
        rover.nav.distances.push(1.0);
        rover.nav.angles.push(0.0);
        let overlay_before = rover.vision_image.clone();

        let err = p.step(&mut rover).unwrap_err();
        assert_eq!(err, TerraError::shape_mismatch((320, 160), (160, 80)));
        assert_eq!(rover.nav.len(), 1);
        assert_eq!(rover.vision_image, overlay_before);
    }

    #[test]
    fn wrong_world_size_is_rejected() {
        let p = pipeline();
        let mut rover = p.new_rover_state();
        rover.worldmap = WorldMap::new(50);
        assert!(matches!(
            p.step(&mut rover),
            Err(TerraError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn degenerate_calibration_fails_at_construction() {
        let mut config = PerceptionConfig::default();
        config.calibration.source = [[10.0, 100.0], [20.0, 100.0], [30.0, 100.0], [40.0, 50.0]];
        assert!(matches!(
            PerceptionPipeline::new(config),
            Err(TerraError::DegenerateCalibration(_))
        ));
    }

    #[test]
    fn invalid_config_fails_at_construction() {
        let config = PerceptionConfig {
            scale: -10.0,
            ..PerceptionConfig::default()
        };
        assert!(matches!(
            PerceptionPipeline::new(config),
            Err(TerraError::InvalidConfig(_))
        ));
    }

    #[test]
    fn heading_changes_where_evidence_lands() {
        let p = pipeline();
        let mut east = rover_with(&p, scene(false), RoverPose::level(100.0, 100.0, 0.0));
        let mut north = rover_with(&p, scene(false), RoverPose::level(100.0, 100.0, 90.0));
        p.step(&mut east).unwrap();
        p.step(&mut north).unwrap();

        // Facing +X all navigable evidence is ahead in x; facing +Y it is ahead in y.
        assert!(east.worldmap.nonzero(MapChannel::Navigable).all(|(x, _, _)| x >= 100));
        assert!(north.worldmap.nonzero(MapChannel::Navigable).all(|(_, y, _)| y >= 100));
    }
}
