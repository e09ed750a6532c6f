use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

const DEFAULT_RELAY_URL: &str = "ws://127.0.0.1:9000";
const DEFAULT_MODEL_PATH: &str = "stub://path";
const DEFAULT_MODEL_DIR: &str = "models";
const DEFAULT_CONFIDENCE: f32 = 0.3;
const DEFAULT_TELEMETRY_PATH: &str = "telemetry_log.csv";
const DEFAULT_FRAMES_DIR: &str = "saved_frames";
const DEFAULT_SAVE_INTERVAL_SECS: u64 = 30;

#[derive(Debug, Deserialize, Default)]
struct PilotConfigFile {
    relay_url: Option<String>,
    model_path: Option<String>,
    model_dir: Option<String>,
    confidence: Option<f32>,
    record_mode: Option<bool>,
    recording: Option<RecordingConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct RecordingConfigFile {
    telemetry_path: Option<String>,
    frames_dir: Option<String>,
    save_interval_secs: Option<u64>,
}

/// Startup configuration for the heading daemon.
///
/// Sources, later wins: defaults, a JSON config file (explicit path or the
/// `TRAILSTEER_CONFIG` env var), scalar env overrides, then CLI flags
/// applied by the binary.
#[derive(Debug, Clone)]
pub struct PilotConfig {
    pub relay_url: String,
    pub model_path: String,
    pub model_dir: String,
    /// Initial detection threshold, already normalized to `0.0..=1.0`.
    pub confidence: f32,
    pub record_mode: bool,
    pub recording: RecordingSettings,
}

#[derive(Debug, Clone)]
pub struct RecordingSettings {
    pub telemetry_path: String,
    pub frames_dir: String,
    pub save_interval: Duration,
}

impl PilotConfig {
    /// Load configuration. An explicit file path wins over the
    /// `TRAILSTEER_CONFIG` env var; without either, defaults apply.
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        let env_path = std::env::var("TRAILSTEER_CONFIG").ok();
        let file_cfg = match config_file {
            Some(path) => Some(read_config_file(path)?),
            None => match env_path.as_deref() {
                Some(path) => Some(read_config_file(Path::new(path))?),
                None => None,
            },
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: PilotConfigFile) -> Self {
        let recording = file.recording.unwrap_or_default();
        Self {
            relay_url: file
                .relay_url
                .unwrap_or_else(|| DEFAULT_RELAY_URL.to_string()),
            model_path: file
                .model_path
                .unwrap_or_else(|| DEFAULT_MODEL_PATH.to_string()),
            model_dir: file
                .model_dir
                .unwrap_or_else(|| DEFAULT_MODEL_DIR.to_string()),
            confidence: file.confidence.unwrap_or(DEFAULT_CONFIDENCE),
            record_mode: file.record_mode.unwrap_or(false),
            recording: RecordingSettings {
                telemetry_path: recording
                    .telemetry_path
                    .unwrap_or_else(|| DEFAULT_TELEMETRY_PATH.to_string()),
                frames_dir: recording
                    .frames_dir
                    .unwrap_or_else(|| DEFAULT_FRAMES_DIR.to_string()),
                save_interval: Duration::from_secs(
                    recording
                        .save_interval_secs
                        .unwrap_or(DEFAULT_SAVE_INTERVAL_SECS),
                ),
            },
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(confidence) = std::env::var("TRAILSTEER_CONFIDENCE") {
            let parsed: f32 = confidence.parse().map_err(|_| {
                anyhow!("TRAILSTEER_CONFIDENCE must be a number between 0 and 1")
            })?;
            self.confidence = parsed;
        }
        if let Ok(path) = std::env::var("TRAILSTEER_TELEMETRY_PATH") {
            if !path.trim().is_empty() {
                self.recording.telemetry_path = path;
            }
        }
        if let Ok(dir) = std::env::var("TRAILSTEER_FRAMES_DIR") {
            if !dir.trim().is_empty() {
                self.recording.frames_dir = dir;
            }
        }
        if let Ok(interval) = std::env::var("TRAILSTEER_SAVE_INTERVAL_SECS") {
            let seconds: u64 = interval.parse().map_err(|_| {
                anyhow!("TRAILSTEER_SAVE_INTERVAL_SECS must be an integer number of seconds")
            })?;
            self.recording.save_interval = Duration::from_secs(seconds);
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if !self.relay_url.starts_with("ws://") && !self.relay_url.starts_with("wss://") {
            return Err(anyhow!(
                "relay url '{}' must start with ws:// or wss://",
                self.relay_url
            ));
        }
        if self.model_path.trim().is_empty() {
            return Err(anyhow!("model path must not be empty"));
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(anyhow!(
                "confidence {} must be between 0 and 1",
                self.confidence
            ));
        }
        if self.recording.save_interval.as_secs() == 0 {
            return Err(anyhow!("save interval must be greater than zero"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<PilotConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
