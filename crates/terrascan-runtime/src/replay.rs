//! Frame-log replay harness.
//!
//! A frame log is a JSON-lines file, one record per camera frame:
//!
//! ```text
//! {"image": "frames/0001.png", "x": 99.7, "y": 85.6, "yaw": 56.8, "pitch": 0.4, "roll": 359.8}
//! ```
//!
//! Image paths are resolved relative to the directory holding the log.
//! `pitch` and `roll` default to level when omitted.  Blank lines are
//! skipped.
//!
//! [`replay`] feeds every record through a [`PerceptionPipeline`] in file
//! order against a single [`RoverState`], checking the shutdown flag between
//! frames.  The world map lives only in that state; nothing is written back
//! to disk.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use terrascan_perception::PerceptionPipeline;
use terrascan_types::{MapChannel, RgbImage, RoverPose, RoverState, TerraError};
use tracing::{debug, info, instrument};

// ─────────────────────────────────────────────────────────────────────────────
// Records
// ─────────────────────────────────────────────────────────────────────────────

/// One line of a frame log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameRecord {
    /// Frame image, relative to the log's directory or absolute.
    pub image: PathBuf,
    pub x: f64,
    pub y: f64,
    pub yaw: f64,
    #[serde(default)]
    pub pitch: f64,
    #[serde(default)]
    pub roll: f64,
}

impl FrameRecord {
    pub fn pose(&self) -> RoverPose {
        RoverPose {
            x: self.x,
            y: self.y,
            yaw: self.yaw,
            pitch: self.pitch,
            roll: self.roll,
        }
    }
}

/// Parse every record in the frame log at `path`.
///
/// # Errors
///
/// [`TerraError::FrameLog`] on I/O failure or a malformed line; the message
/// carries the 1-based line number.
pub fn read_frame_log(path: &Path) -> Result<Vec<FrameRecord>, TerraError> {
    let file = File::open(path)
        .map_err(|e| TerraError::FrameLog(format!("cannot open {}: {e}", path.display())))?;

    let mut records = Vec::new();
    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| {
            TerraError::FrameLog(format!("{}:{}: {e}", path.display(), idx + 1))
        })?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line).map_err(|e| {
            TerraError::FrameLog(format!("{}:{}: {e}", path.display(), idx + 1))
        })?;
        records.push(record);
    }
    Ok(records)
}

/// Decode a PNG or JPEG frame into an [`RgbImage`].
///
/// Alpha and greyscale inputs are converted to 8-bit RGB.
pub fn load_frame(path: &Path) -> Result<RgbImage, TerraError> {
    let decoded = image::open(path)
        .map_err(|e| TerraError::FrameLog(format!("cannot decode {}: {e}", path.display())))?
        .to_rgb8();
    let (width, height) = decoded.dimensions();
    RgbImage::from_raw(width as usize, height as usize, decoded.into_raw())
}

// ─────────────────────────────────────────────────────────────────────────────
// Replay
// ─────────────────────────────────────────────────────────────────────────────

/// Outcome of a replay run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ReplaySummary {
    /// Frames stepped through the pipeline.
    pub frames: usize,
    /// Frames whose map update was suppressed by the attitude gate.
    pub gated_frames: usize,
    /// `true` when the shutdown flag stopped the replay early.
    pub interrupted: bool,
    /// Cells with any obstacle evidence at the end of the run.
    pub obstacle_cells: usize,
    /// Cells with any navigable evidence at the end of the run.
    pub navigable_cells: usize,
    /// Cells marked as holding a sample at the end of the run.
    pub sample_cells: usize,
}

/// Replay the frame log at `log_path` into `rover`.
///
/// # Errors
///
/// - [`TerraError::FrameLog`] for unreadable logs or frames.
/// - Any error from [`PerceptionPipeline::step`], e.g. a frame of the wrong
///   size.  Frames before the failing one have already been applied.
#[instrument(skip_all, fields(log = %log_path.display()))]
pub fn replay(
    pipeline: &PerceptionPipeline,
    rover: &mut RoverState,
    log_path: &Path,
    shutdown: &AtomicBool,
) -> Result<ReplaySummary, TerraError> {
    let records = read_frame_log(log_path)?;
    let base = log_path.parent().unwrap_or_else(|| Path::new(""));
    info!(frames = records.len(), "replaying frame log");

    let mut summary = ReplaySummary::default();
    for (idx, record) in records.iter().enumerate() {
        if shutdown.load(Ordering::SeqCst) {
            info!(processed = idx, "shutdown requested; stopping replay");
            summary.interrupted = true;
            break;
        }

        rover.image = load_frame(&base.join(&record.image))?;
        rover.pose = record.pose();

        let report = pipeline.step(rover)?;
        summary.frames += 1;
        if !report.map_updated {
            summary.gated_frames += 1;
        }
        debug!(frame = idx, image = %record.image.display(), "frame replayed");
    }

    summary.obstacle_cells = rover.worldmap.count_nonzero(MapChannel::Obstacle);
    summary.navigable_cells = rover.worldmap.count_nonzero(MapChannel::Navigable);
    summary.sample_cells = rover.worldmap.count_nonzero(MapChannel::Unused);
    info!(
        frames = summary.frames,
        gated = summary.gated_frames,
        obstacle_cells = summary.obstacle_cells,
        navigable_cells = summary.navigable_cells,
        sample_cells = summary.sample_cells,
        "replay finished"
    );
    Ok(summary)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
