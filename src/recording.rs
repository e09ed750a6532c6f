//! Record-mode side channel: CSV telemetry and throttled frame snapshots.
//!
//! Both sinks are best-effort. A failed write is logged and skipped; it
//! never stops frame processing and never counts against the snapshot
//! throttle.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};

use crate::frame::Frame;
use crate::protocol::{FrameId, FrameMeta};

/// Column header written once when the telemetry file is created.
const TELEMETRY_HEADER: &str = "timestamp_iso,latency_ms,longitude,latitude,model,connectionType";

// ----------------------------------------------------------------------------
// SaveThrottle
// ----------------------------------------------------------------------------

/// Interval gate for frame snapshots.
///
/// `try_acquire` only checks the clock; callers `commit` after the write
/// lands. A failed write therefore leaves the gate open for the next frame
/// instead of pushing the schedule out.
#[derive(Clone, Copy, Debug)]
pub struct SaveThrottle {
    interval: Duration,
    last_saved: Option<Instant>,
}

impl SaveThrottle {
    pub fn new(interval: Duration) -> Self {
        SaveThrottle {
            interval,
            last_saved: None,
        }
    }

    /// True when enough time has passed since the last committed save.
    /// The first call is always allowed.
    pub fn try_acquire(&self, now: Instant) -> bool {
        match self.last_saved {
            Some(last) => now.duration_since(last) >= self.interval,
            None => true,
        }
    }

    /// Record a successful save at `now`.
    pub fn commit(&mut self, now: Instant) {
        self.last_saved = Some(now);
    }
}

// ----------------------------------------------------------------------------
// TelemetryLog
// ----------------------------------------------------------------------------

/// Append-only CSV sink for per-frame telemetry.
///
/// The file is created lazily with its header on the first row, so an idle
/// session never touches disk.
pub struct TelemetryLog {
    path: PathBuf,
}

impl TelemetryLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        TelemetryLog { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one row stamped with the current wall clock.
    pub fn append(&self, meta: &FrameMeta, model_name: &str) -> Result<()> {
        let timestamp = chrono::Local::now()
            .format("%Y-%m-%d %H:%M:%S")
            .to_string();
        self.append_row(&timestamp, meta, model_name)
    }

    fn append_row(&self, timestamp_iso: &str, meta: &FrameMeta, model_name: &str) -> Result<()> {
        let write_header = !self.path.exists();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("failed to open telemetry log {}", self.path.display()))?;
        if write_header {
            writeln!(file, "{}", TELEMETRY_HEADER)
                .with_context(|| format!("failed to write {}", self.path.display()))?;
        }
        writeln!(
            file,
            "{},{},{},{},{},{}",
            timestamp_iso,
            csv_number(meta.latency_ms),
            csv_number(meta.longitude),
            csv_number(meta.latitude),
            model_name,
            meta.connection_type.as_deref().unwrap_or("")
        )
        .with_context(|| format!("failed to write {}", self.path.display()))?;
        Ok(())
    }
}

/// Missing values become empty cells, whole numbers drop the trailing `.0`.
fn csv_number(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{}", v),
        None => String::new(),
    }
}

// ----------------------------------------------------------------------------
// FrameStore
// ----------------------------------------------------------------------------

/// Throttled JPEG snapshot store.
pub struct FrameStore {
    dir: PathBuf,
    throttle: SaveThrottle,
}

impl FrameStore {
    /// Create the snapshot directory and an open throttle.
    pub fn new(dir: impl Into<PathBuf>, interval: Duration) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create snapshot dir {}", dir.display()))?;
        Ok(FrameStore {
            dir,
            throttle: SaveThrottle::new(interval),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persist a frame when the throttle allows it. Returns the written
    /// path, or `None` when throttled or when the write failed.
    pub fn maybe_save(
        &mut self,
        frame: &Frame,
        frame_id: Option<&FrameId>,
        now: Instant,
    ) -> Option<PathBuf> {
        if !self.throttle.try_acquire(now) {
            return None;
        }
        let path = self.dir.join(snapshot_name(frame_id));
        match write_snapshot(frame, &path) {
            Ok(()) => {
                self.throttle.commit(now);
                Some(path)
            }
            Err(e) => {
                log::warn!("failed to save frame to {}: {:#}", path.display(), e);
                None
            }
        }
    }
}

/// `frame[_<id>]_<stamp>.jpg`, stamped with the local wall clock.
fn snapshot_name(frame_id: Option<&FrameId>) -> String {
    let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
    match frame_id {
        Some(id) => format!("frame_{}_{}.jpg", id, stamp),
        None => format!("frame_{}.jpg", stamp),
    }
}

fn write_snapshot(frame: &Frame, path: &Path) -> Result<()> {
    let jpeg = frame.to_jpeg()?;
    fs::write(path, jpeg).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
