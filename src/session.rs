//! Per-connection processing pipeline.
//!
//! `Session` is the protocol state machine behind the socket: it classifies
//! inbound messages, carries pending frame metadata across the message
//! boundary, drives the oracle and heading estimator, and hands replies
//! back to the transport. Every failure inside the pipeline is contained
//! here; nothing short of the socket itself takes the loop down.

use std::time::Instant;

use anyhow::{Context, Result};

use crate::config::PilotConfig;
use crate::frame;
use crate::heading;
use crate::protocol::{
    self, ConfigUpdate, FrameId, FrameMeta, HeadingReply, InboundMessage, TextPayload,
};
use crate::recording::{FrameStore, TelemetryLog};
use crate::segment::{self, SegmentationOracle};
use crate::settings::Settings;

pub struct Session {
    settings: Settings,
    oracle: Box<dyn SegmentationOracle>,
    pending_meta: Option<FrameMeta>,
    telemetry: TelemetryLog,
    frames: FrameStore,
}

impl Session {
    pub fn new(
        settings: Settings,
        oracle: Box<dyn SegmentationOracle>,
        telemetry: TelemetryLog,
        frames: FrameStore,
    ) -> Self {
        Session {
            settings,
            oracle,
            pending_meta: None,
            telemetry,
            frames,
        }
    }

    /// Build a session from startup configuration. Loads and warms up the
    /// oracle; a model that fails to load here is fatal, unlike later live
    /// switches.
    pub fn from_config(config: &PilotConfig) -> Result<Self> {
        let settings = Settings::new(
            config.confidence,
            config.model_path.clone(),
            config.model_dir.clone(),
            config.record_mode,
        );
        let mut oracle = segment::load_oracle(settings.model_path())
            .with_context(|| format!("failed to load model {}", settings.model_path()))?;
        oracle.warm_up().context("oracle warm-up failed")?;
        log::info!(
            "segmentation oracle ready: {} ({})",
            settings.model_path(),
            oracle.name()
        );
        let telemetry = TelemetryLog::new(config.recording.telemetry_path.clone());
        let frames = FrameStore::new(
            config.recording.frames_dir.clone(),
            config.recording.save_interval,
        )?;
        Ok(Session::new(settings, oracle, telemetry, frames))
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Process one inbound message; `Some` is a reply to send back.
    ///
    /// Undecodable payloads, oracle failures and sink failures are logged
    /// and swallowed. The caller only sees messages it should answer.
    pub fn handle_message(&mut self, msg: &InboundMessage) -> Option<HeadingReply> {
        match msg {
            InboundMessage::Text(raw) => self.handle_text(msg, raw),
            InboundMessage::Binary(_) => {
                let frame_id = self.take_pending_id();
                self.process_frame(msg, frame_id)
            }
        }
    }

    fn handle_text(&mut self, msg: &InboundMessage, raw: &str) -> Option<HeadingReply> {
        let Some(parsed) = protocol::parse_text(raw) else {
            log::debug!("ignoring non-JSON text message");
            return None;
        };

        // Config updates ride on any message type and land before the
        // message itself is acted on.
        self.apply_config(&parsed.config);

        match parsed.payload {
            TextPayload::FrameMeta(meta) => {
                if self.settings.record_mode() {
                    match self.telemetry.append(&meta, self.settings.model_name()) {
                        Ok(()) => log::debug!(
                            "telemetry appended to {}",
                            self.telemetry.path().display()
                        ),
                        Err(e) => log::warn!("telemetry append failed: {:#}", e),
                    }
                }
                // Newest descriptor wins until a frame consumes it.
                self.pending_meta = Some(meta);
                None
            }
            TextPayload::Stats(value) => {
                log::info!("sender stats: {}", value);
                None
            }
            TextPayload::FrameData { frame_id } => {
                // A frame payload consumes the pending descriptor even when
                // it carries its own id.
                let pending_id = self.take_pending_id();
                self.process_frame(msg, frame_id.or(pending_id))
            }
            TextPayload::Other => None,
        }
    }

    fn apply_config(&mut self, update: &ConfigUpdate) {
        if update.is_empty() {
            return;
        }
        let applied = self.settings.apply(update);
        if applied.model_reloaded {
            // Swap between frames: the old oracle finishes nothing, the new
            // one serves the next frame. On failure keep the old oracle
            // rather than take the session down.
            match segment::load_oracle(self.settings.model_path()) {
                Ok(oracle) => {
                    self.oracle = oracle;
                    log::info!(
                        "segmentation model switched to {} ({})",
                        self.settings.model_path(),
                        self.oracle.name()
                    );
                }
                Err(e) => {
                    log::warn!(
                        "failed to load model {}, keeping {}: {:#}",
                        self.settings.model_path(),
                        self.oracle.name(),
                        e
                    );
                }
            }
        }
    }

    fn take_pending_id(&mut self) -> Option<FrameId> {
        self.pending_meta.take().and_then(|meta| meta.frame_id)
    }

    fn process_frame(
        &mut self,
        msg: &InboundMessage,
        frame_id: Option<FrameId>,
    ) -> Option<HeadingReply> {
        let frame = match frame::decode_message(msg) {
            Ok(frame) => frame,
            Err(e) => {
                log::debug!("dropping undecodable frame payload: {:#}", e);
                return None;
            }
        };

        let started = Instant::now();
        let masks = match self
            .oracle
            .segment(&frame, self.settings.confidence())
        {
            Ok(masks) => masks,
            Err(e) => {
                log::warn!("segmentation failed, skipping frame: {:#}", e);
                return None;
            }
        };
        let estimate = heading::estimate(&masks, frame.width(), frame.height());
        log::debug!(
            "frame {}x{}: {} midpoints, heading {:.2} ({} ms inference)",
            frame.width(),
            frame.height(),
            estimate.midpoints.len(),
            estimate.angle_degrees,
            started.elapsed().as_millis()
        );

        if self.settings.record_mode() {
            if let Some(path) = self
                .frames
                .maybe_save(&frame, frame_id.as_ref(), Instant::now())
            {
                log::info!("saved frame snapshot to {}", path.display());
            }
        }

        Some(HeadingReply::new(estimate.angle_degrees, frame_id))
    }
}
