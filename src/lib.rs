//! Vision-guided heading pipeline.
//!
//! The daemon joins a relay socket as a peer. Senders push JPEG frames at it
//! as raw binary messages or as base64 under the `data` key of a JSON text
//! message, optionally announced by a `frame_meta` descriptor. Each frame
//! runs through a segmentation oracle; the winning mask is sampled along
//! fixed horizontal scanlines and the sampled midpoints collapse into a
//! steering heading, streamed back as `{"heading": ..., "frame_id": ...}`.
//!
//! Senders retune the pipeline in flight by piggybacking `ModelConfidence`
//! and `selectedModel` keys on any control message; the `recordmode`
//! selection sentinel flips on a diagnostics channel of CSV telemetry and
//! throttled frame snapshots.
//!
//! # Module Structure
//!
//! - `config`: startup configuration (defaults, JSON file, env)
//! - `protocol`: wire shapes and message classification
//! - `frame`: decoded rasters and JPEG payload decoding
//! - `segment`: the segmentation oracle seam and its backends
//! - `heading`: scanline sampling and the heading angle
//! - `settings`: live-tunable settings and the record-mode sentinel
//! - `recording`: CSV telemetry and throttled frame snapshots
//! - `session`: the per-connection protocol state machine

pub mod config;
pub mod frame;
pub mod heading;
pub mod protocol;
pub mod recording;
pub mod segment;
pub mod session;
pub mod settings;

pub use config::{PilotConfig, RecordingSettings};
pub use frame::Frame;
pub use heading::{HeadingEstimate, Midpoint, SCAN_HEIGHTS, STRAIGHT_AHEAD_DEGREES};
pub use protocol::{
    ConfigUpdate, FrameId, FrameMeta, HeadingReply, InboundMessage, TextPayload,
};
pub use recording::{FrameStore, SaveThrottle, TelemetryLog};
pub use segment::{load_oracle, Mask, SegmentationOracle, StubOracle};
pub use session::Session;
pub use settings::{Applied, Settings, RECORD_MODE_SENTINEL};

#[cfg(feature = "backend-tract")]
pub use segment::TractOracle;
