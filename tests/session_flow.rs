use std::io::Cursor;
use std::time::Duration;

use anyhow::Result;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::json;

use trailsteer::{
    Frame, FrameStore, InboundMessage, Mask, PilotConfig, RecordingSettings,
    SegmentationOracle, Session, Settings, TelemetryLog,
};

/// Oracle that replays a fixed mask set regardless of input.
#[derive(Debug)]
struct ScriptedOracle {
    masks: Vec<Mask>,
}

impl SegmentationOracle for ScriptedOracle {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn segment(&mut self, _frame: &Frame, _confidence: f32) -> Result<Vec<Mask>> {
        Ok(self.masks.clone())
    }
}

/// Oracle mimicking a model whose single detection scores 0.5: thresholds
/// above that suppress it.
#[derive(Debug)]
struct ThresholdOracle {
    masks: Vec<Mask>,
}

impl SegmentationOracle for ThresholdOracle {
    fn name(&self) -> &'static str {
        "threshold"
    }

    fn segment(&mut self, _frame: &Frame, confidence: f32) -> Result<Vec<Mask>> {
        if confidence > 0.5 {
            Ok(Vec::new())
        } else {
            Ok(self.masks.clone())
        }
    }
}

fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = image::RgbImage::from_pixel(width, height, image::Rgb([60, 110, 60]));
    let mut cursor = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(image)
        .write_to(&mut cursor, image::ImageFormat::Jpeg)
        .expect("encode test jpeg");
    cursor.into_inner()
}

fn binary_frame() -> InboundMessage {
    InboundMessage::Binary(jpeg_bytes(640, 480))
}

fn text(value: serde_json::Value) -> InboundMessage {
    InboundMessage::Text(value.to_string())
}

/// Mask with one foreground run at row 240, columns 100..120, on a 640x480
/// grid. Midpoint (110, 240) puts the heading at 131.19 degrees.
fn left_band_mask() -> Mask {
    let mut mask = Mask::empty(640, 480);
    for x in 100..120 {
        mask.set_foreground(x, 240);
    }
    mask
}

fn session_with(
    oracle: Box<dyn SegmentationOracle>,
    settings: Settings,
    dir: &std::path::Path,
) -> Session {
    let telemetry = TelemetryLog::new(dir.join("telemetry_log.csv"));
    let frames =
        FrameStore::new(dir.join("saved_frames"), Duration::from_secs(30)).expect("frame store");
    Session::new(settings, oracle, telemetry, frames)
}

fn scripted_session(dir: &std::path::Path) -> Session {
    session_with(
        Box::new(ScriptedOracle {
            masks: vec![left_band_mask()],
        }),
        Settings::new(0.3, "stub://path", "stub://models", false),
        dir,
    )
}

#[test]
fn meta_then_binary_frame_correlates_the_id() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut session = scripted_session(dir.path());

    let none = session.handle_message(&text(json!({
        "type": "frame_meta",
        "frame_id": 7,
        "latency_ms": 42,
    })));
    assert!(none.is_none());

    let reply = session.handle_message(&binary_frame()).expect("reply");
    assert_eq!(reply.heading, 131.19);
    assert_eq!(reply.to_json(), r#"{"heading":131.19,"frame_id":7}"#);

    // The descriptor was consumed; the next frame is anonymous.
    let reply = session.handle_message(&binary_frame()).expect("reply");
    assert!(reply.frame_id.is_none());
    assert_eq!(reply.to_json(), r#"{"heading":131.19,"frame_id":null}"#);
}

#[test]
fn newest_descriptor_wins() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut session = scripted_session(dir.path());

    session.handle_message(&text(json!({"type": "frame_meta", "frame_id": 1})));
    session.handle_message(&text(json!({"type": "frame_meta", "frame_id": 2})));

    let reply = session.handle_message(&binary_frame()).expect("reply");
    assert_eq!(reply.frame_id.map(|id| id.as_value().clone()), Some(json!(2)));
}

#[test]
fn json_frame_prefers_its_own_id_and_consumes_pending() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut session = scripted_session(dir.path());

    session.handle_message(&text(json!({"type": "frame_meta", "frame_id": 3})));

    let encoded = STANDARD.encode(jpeg_bytes(640, 480));
    let reply = session
        .handle_message(&text(json!({"data": encoded, "frame_id": 9})))
        .expect("reply");
    assert_eq!(reply.frame_id.map(|id| id.as_value().clone()), Some(json!(9)));

    // The pending descriptor went with it.
    let reply = session.handle_message(&binary_frame()).expect("reply");
    assert!(reply.frame_id.is_none());
}

#[test]
fn json_frame_falls_back_to_the_pending_id() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut session = scripted_session(dir.path());

    session.handle_message(&text(json!({"type": "frame_meta", "frame_id": "cam-3"})));

    let encoded = STANDARD.encode(jpeg_bytes(640, 480));
    let reply = session
        .handle_message(&text(json!({"data": encoded})))
        .expect("reply");
    assert_eq!(
        reply.frame_id.map(|id| id.as_value().clone()),
        Some(json!("cam-3"))
    );
}

#[test]
fn stats_and_unknown_messages_leave_state_alone() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut session = scripted_session(dir.path());

    session.handle_message(&text(json!({"type": "frame_meta", "frame_id": 5})));
    assert!(session
        .handle_message(&text(json!({"type": "stats", "fps": 8})))
        .is_none());
    assert!(session
        .handle_message(&text(json!({"type": "bogus", "value": 1})))
        .is_none());
    assert!(session
        .handle_message(&InboundMessage::Text("not json".to_string()))
        .is_none());

    // The pending descriptor survived all three.
    let reply = session.handle_message(&binary_frame()).expect("reply");
    assert_eq!(reply.frame_id.map(|id| id.as_value().clone()), Some(json!(5)));
}

#[test]
fn undecodable_frame_is_dropped_and_consumes_pending() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut session = scripted_session(dir.path());

    session.handle_message(&text(json!({"type": "frame_meta", "frame_id": 4})));

    let none = session.handle_message(&InboundMessage::Binary(vec![0xde, 0xad]));
    assert!(none.is_none());

    // The descriptor was spent on the broken payload.
    let reply = session.handle_message(&binary_frame()).expect("reply");
    assert!(reply.frame_id.is_none());
}

#[test]
fn confidence_update_applies_before_the_next_frame() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut session = session_with(
        Box::new(ThresholdOracle {
            masks: vec![left_band_mask()],
        }),
        Settings::new(0.3, "stub://path", "stub://models", false),
        dir.path(),
    );

    let reply = session.handle_message(&binary_frame()).expect("reply");
    assert_eq!(reply.heading, 131.19);

    // Confidence rides on an otherwise meaningless message.
    assert!(session
        .handle_message(&text(json!({"ModelConfidence": 80})))
        .is_none());
    assert_eq!(session.settings().confidence(), 0.80);

    // 0.8 suppresses the detection; no path means straight ahead.
    let reply = session.handle_message(&binary_frame()).expect("reply");
    assert_eq!(reply.heading, 90.0);

    // Drop it back down and the detection returns.
    session.handle_message(&text(json!({"ModelConfidence": "30"})));
    let reply = session.handle_message(&binary_frame()).expect("reply");
    assert_eq!(reply.heading, 131.19);
}

#[test]
fn record_mode_writes_telemetry_and_throttled_snapshots() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut session = scripted_session(dir.path());
    let csv_path = dir.path().join("telemetry_log.csv");
    let frames_dir = dir.path().join("saved_frames");

    // Record mode off: descriptors leave no trace.
    session.handle_message(&text(json!({"type": "frame_meta", "frame_id": 1})));
    assert!(!csv_path.exists());

    // The sentinel turns record mode on; the same message is also a
    // descriptor, so it logs the first telemetry row.
    session.handle_message(&text(json!({
        "type": "frame_meta",
        "frame_id": 2,
        "latency_ms": 42,
        "longitude": 4.89,
        "latitude": 52.37,
        "connectionType": "wifi",
        "selectedModel": "recordmode",
    })));
    assert!(session.settings().record_mode());

    let contents = std::fs::read_to_string(&csv_path).expect("read csv");
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(
        lines[0],
        "timestamp_iso,latency_ms,longitude,latitude,model,connectionType"
    );
    assert!(lines[1].ends_with(",42,4.89,52.37,path,wifi"), "row: {}", lines[1]);

    // First frame in record mode gets snapshotted.
    let reply = session.handle_message(&binary_frame()).expect("reply");
    assert_eq!(reply.frame_id.map(|id| id.as_value().clone()), Some(json!(2)));
    let count = std::fs::read_dir(&frames_dir).expect("read dir").count();
    assert_eq!(count, 1);

    // A frame right behind it is inside the save interval.
    session.handle_message(&binary_frame()).expect("reply");
    let count = std::fs::read_dir(&frames_dir).expect("read dir").count();
    assert_eq!(count, 1);

    // Switching models drops out of record mode; descriptors go quiet.
    session.handle_message(&text(json!({"selectedModel": "wide"})));
    assert!(!session.settings().record_mode());
    assert_eq!(session.settings().model_path(), "stub://models/wide");

    session.handle_message(&text(json!({"type": "frame_meta", "frame_id": 3})));
    let contents = std::fs::read_to_string(&csv_path).expect("read csv");
    assert_eq!(contents.lines().count(), 2);
}

#[test]
fn repeated_model_selection_is_idempotent() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut session = scripted_session(dir.path());

    session.handle_message(&text(json!({"selectedModel": "wide"})));
    assert_eq!(session.settings().model_path(), "stub://models/wide");

    // Same selection again: no reload, no state churn. The session keeps
    // answering frames either way.
    session.handle_message(&text(json!({"selectedModel": "wide"})));
    let reply = session.handle_message(&binary_frame()).expect("reply");
    assert!(reply.frame_id.is_none());
}

#[test]
fn stub_pipeline_runs_from_config() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = PilotConfig {
        relay_url: "ws://127.0.0.1:9000".to_string(),
        model_path: "stub://path".to_string(),
        model_dir: "stub://models".to_string(),
        confidence: 0.3,
        record_mode: false,
        recording: RecordingSettings {
            telemetry_path: dir
                .path()
                .join("telemetry_log.csv")
                .to_string_lossy()
                .into_owned(),
            frames_dir: dir.path().join("saved_frames").to_string_lossy().into_owned(),
            save_interval: Duration::from_secs(30),
        },
    };

    let mut session = Session::from_config(&config).expect("session");

    // The synthetic oracle paints a centered band, so the heading is dead
    // ahead.
    let reply = session.handle_message(&binary_frame()).expect("reply");
    assert_eq!(reply.heading, 90.0);

    // Record mode is off: no telemetry, no snapshots.
    assert!(!dir.path().join("telemetry_log.csv").exists());
    let count = std::fs::read_dir(dir.path().join("saved_frames"))
        .expect("read dir")
        .count();
    assert_eq!(count, 0);
}
