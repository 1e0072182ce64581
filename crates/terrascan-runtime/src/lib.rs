//! `terrascan-runtime` – host-side plumbing around the perception core.
//!
//! # Modules
//!
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: installs the
//!   global `tracing` subscriber with an optional OTLP span exporter.  Set
//!   `OTEL_EXPORTER_OTLP_ENDPOINT` to ship the per-frame spans to any
//!   OTLP-compatible collector.
//! - [`replay`] – [`replay`][replay::replay]: feeds a recorded JSON-lines
//!   frame log through a
//!   [`PerceptionPipeline`][terrascan_perception::PerceptionPipeline] and
//!   reports a [`ReplaySummary`][replay::ReplaySummary].

pub mod replay;
pub mod telemetry;

pub use replay::{FrameRecord, ReplaySummary, load_frame, read_frame_log};
pub use telemetry::{TracerProviderGuard, init_tracing};
