//! Live-tunable pipeline settings.
//!
//! Senders retune the pipeline by piggybacking `ModelConfidence` and
//! `selectedModel` keys on any control message. This module owns the
//! resulting state transitions; the session applies them between frames, so
//! a change never lands mid-inference.

use crate::protocol::ConfigUpdate;

/// Model selection sentinel that toggles record mode on instead of
/// switching models.
pub const RECORD_MODE_SENTINEL: &str = "recordmode";

/// Current tuning state. Owned by the session; there is exactly one writer.
#[derive(Clone, Debug)]
pub struct Settings {
    confidence: f32,
    model_path: String,
    model_dir: String,
    record_mode: bool,
    last_selection: Option<String>,
}

/// What applying one `ConfigUpdate` changed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Applied {
    /// A new model path took effect; the caller must rebuild its oracle.
    pub model_reloaded: bool,
    /// Record mode flipped state.
    pub record_mode_changed: bool,
}

impl Settings {
    pub fn new(
        confidence: f32,
        model_path: impl Into<String>,
        model_dir: impl Into<String>,
        record_mode: bool,
    ) -> Self {
        Settings {
            confidence,
            model_path: model_path.into(),
            model_dir: model_dir.into(),
            record_mode,
            last_selection: None,
        }
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    pub fn model_path(&self) -> &str {
        &self.model_path
    }

    pub fn record_mode(&self) -> bool {
        self.record_mode
    }

    /// Final path component of the model path, as reported in telemetry.
    pub fn model_name(&self) -> &str {
        self.model_path
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(self.model_path.as_str())
    }

    /// Apply one config update and report what changed.
    ///
    /// Confidence arrives as a percentage and is truncated to an integer
    /// before normalizing, so 30, 30.9 and "30" all become 0.30. There is
    /// no bounds check; the sender owns the value.
    ///
    /// Model selection is dedup'd against the last applied selection, which
    /// makes repeated identical updates free. The `recordmode` sentinel
    /// turns record mode on and leaves the loaded model alone; any other
    /// selection switches the model and turns record mode off.
    pub fn apply(&mut self, update: &ConfigUpdate) -> Applied {
        let mut applied = Applied::default();

        if let Some(percent) = update.model_confidence {
            self.confidence = percent.trunc() as f32 / 100.0;
            log::info!("detection confidence set to {:.2}", self.confidence);
        }

        if let Some(selection) = update.selected_model.as_deref() {
            if self.last_selection.as_deref() != Some(selection) {
                if selection == RECORD_MODE_SENTINEL {
                    if !self.record_mode {
                        self.record_mode = true;
                        applied.record_mode_changed = true;
                    }
                    log::info!("record mode enabled");
                } else {
                    if self.record_mode {
                        self.record_mode = false;
                        applied.record_mode_changed = true;
                        log::info!("record mode disabled");
                    }
                    self.model_path = join_model_path(&self.model_dir, selection);
                    applied.model_reloaded = true;
                }
                self.last_selection = Some(selection.to_string());
            }
        }

        applied
    }
}

fn join_model_path(model_dir: &str, selection: &str) -> String {
    if model_dir.is_empty() {
        return selection.to_string();
    }
    format!("{}/{}", model_dir.trim_end_matches('/'), selection)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
