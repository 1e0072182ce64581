//! `terrascan-perception` – camera frames to terrain maps.
//!
//! Turns a single forward-facing RGB frame plus the rover pose into
//! incremental evidence on a top-down world grid.
//!
//! # Modules
//!
//! - [`threshold`] – [`ColorClassifier`][threshold::ColorClassifier]: per-pixel
//!   RGB band tests producing obstacle, navigable and sample masks.
//! - [`warp`] – [`PerspectiveWarper`][warp::PerspectiveWarper]: four-point
//!   homography that rectifies the camera view onto the ground plane.
//! - [`frame`] – [`rover_coords`][frame::rover_coords] and
//!   [`to_polar_coords`][frame::to_polar_coords]: rectified pixels to the
//!   rover-centric frame.
//! - [`transform`] – [`WorldProjector`][transform::WorldProjector]: rotation,
//!   scaling and translation into clipped world-grid indices.
//! - [`attitude`] – [`AttitudeGate`][attitude::AttitudeGate]: suppresses map
//!   writes while the rover is not level.
//! - [`accumulate`] – [`MapAccumulator`][accumulate::MapAccumulator]: additive
//!   evidence and sample marking on the [`WorldMap`][terrascan_types::WorldMap].
//! - [`config`] – [`PerceptionConfig`][config::PerceptionConfig]: every tunable
//!   constant, with serde defaults.
//! - [`pipeline`] – [`PerceptionPipeline`][pipeline::PerceptionPipeline]: the
//!   per-frame orchestrator tying the stages together.

pub mod accumulate;
pub mod attitude;
pub mod config;
pub mod frame;
pub mod pipeline;
pub mod threshold;
pub mod transform;
pub mod warp;

pub use accumulate::{CellsTouched, MapAccumulator, ProjectedFrame};
pub use attitude::{AttitudeGate, is_valid_rotation};
pub use config::PerceptionConfig;
pub use frame::{RoverFramePoints, rover_coords, to_polar_coords};
pub use pipeline::{FrameReport, PerceptionPipeline};
pub use threshold::{ClassMasks, ColorClassifier, ThresholdBand, color_thresh};
pub use transform::{WorldProjector, pix_to_world, rotate_pix, translate_pix};
pub use warp::{Calibration, Homography, PerspectiveWarper};
