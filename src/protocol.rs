//! Wire shapes spoken with the relay.
//!
//! Inbound traffic is a mix of JSON control messages and frame payloads on a
//! single socket. This module only parses and classifies; it holds no state
//! and performs no I/O. The session layer decides what each message means.

use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};

// ----------------------------------------------------------------------------
// Inbound messages
// ----------------------------------------------------------------------------

/// One message as delivered by the transport, before any interpretation.
#[derive(Clone, Debug)]
pub enum InboundMessage {
    Text(String),
    Binary(Vec<u8>),
}

/// Opaque frame identifier.
///
/// Senders may use numbers, strings, or anything else JSON allows. The value
/// is never interpreted, only echoed back in the heading reply.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FrameId(Value);

impl FrameId {
    /// Wrap a JSON value. `null` counts as absent.
    pub fn from_value(value: &Value) -> Option<Self> {
        if value.is_null() {
            None
        } else {
            Some(FrameId(value.clone()))
        }
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Strings render without quotes so ids read cleanly in filenames.
        match &self.0 {
            Value::String(s) => f.write_str(s),
            other => write!(f, "{}", other),
        }
    }
}

/// Descriptor announced ahead of a frame payload.
///
/// Every field besides `frame_id` is carried only for telemetry. Unknown
/// fields are ignored.
#[derive(Clone, Debug, Default)]
pub struct FrameMeta {
    pub frame_id: Option<FrameId>,
    pub latency_ms: Option<f64>,
    pub longitude: Option<f64>,
    pub latitude: Option<f64>,
    pub connection_type: Option<String>,
}

impl FrameMeta {
    fn from_object(obj: &Map<String, Value>) -> Self {
        FrameMeta {
            frame_id: obj.get("frame_id").and_then(FrameId::from_value),
            latency_ms: obj.get("latency_ms").and_then(Value::as_f64),
            longitude: obj.get("longitude").and_then(Value::as_f64),
            latitude: obj.get("latitude").and_then(Value::as_f64),
            connection_type: obj
                .get("connectionType")
                .and_then(Value::as_str)
                .map(str::to_string),
        }
    }
}

/// Runtime tuning carried piggyback on any text message.
///
/// `model_confidence` is a percentage (0-100) as sent on the wire; the
/// settings layer normalizes it. Both fields accept numeric strings because
/// some senders stringify everything.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConfigUpdate {
    pub model_confidence: Option<f64>,
    pub selected_model: Option<String>,
}

impl ConfigUpdate {
    fn from_object(obj: &Map<String, Value>) -> Self {
        ConfigUpdate {
            model_confidence: obj.get("ModelConfidence").and_then(numeric_value),
            selected_model: obj
                .get("selectedModel")
                .and_then(Value::as_str)
                .map(str::to_string),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.model_confidence.is_none() && self.selected_model.is_none()
    }
}

fn numeric_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

// ----------------------------------------------------------------------------
// Text message classification
// ----------------------------------------------------------------------------

/// What a JSON text message asks the session to do.
///
/// Exactly one variant applies per message. `type` dispatch wins over payload
/// sniffing: a `frame_meta` or `stats` message never doubles as a frame even
/// if it happens to carry a `data` field.
#[derive(Clone, Debug)]
pub enum TextPayload {
    /// `type == "frame_meta"`: stash the descriptor for the payload to come.
    FrameMeta(FrameMeta),
    /// `type == "stats"`: sender-side statistics, logged and dropped.
    Stats(Value),
    /// Carries a base64 JPEG under `data`, frame id inline when present.
    FrameData { frame_id: Option<FrameId> },
    /// Valid JSON the session has no use for.
    Other,
}

/// A classified text message plus whatever config rode along with it.
#[derive(Clone, Debug)]
pub struct ParsedText {
    pub payload: TextPayload,
    pub config: ConfigUpdate,
}

/// Parse and classify one text message. Returns `None` when the text is not
/// valid JSON; config updates are extracted from every JSON object no matter
/// how the rest of it classifies.
pub fn parse_text(raw: &str) -> Option<ParsedText> {
    let value: Value = serde_json::from_str(raw).ok()?;
    let Some(obj) = value.as_object() else {
        // Valid JSON but not an object (array, number, ...). Nothing to do.
        return Some(ParsedText {
            payload: TextPayload::Other,
            config: ConfigUpdate::default(),
        });
    };

    let config = ConfigUpdate::from_object(obj);
    let msg_type = obj.get("type").and_then(Value::as_str);

    let payload = match msg_type {
        Some("frame_meta") => TextPayload::FrameMeta(FrameMeta::from_object(obj)),
        Some("stats") => TextPayload::Stats(value.clone()),
        _ => {
            if obj.contains_key("data") {
                TextPayload::FrameData {
                    frame_id: obj.get("frame_id").and_then(FrameId::from_value),
                }
            } else {
                TextPayload::Other
            }
        }
    };

    Some(ParsedText { payload, config })
}

// ----------------------------------------------------------------------------
// Outbound reply
// ----------------------------------------------------------------------------

/// Steering reply sent back for each processed frame.
///
/// The heading is rounded to two decimals at this boundary only; upstream
/// math keeps full precision.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HeadingReply {
    pub heading: f64,
    pub frame_id: Option<FrameId>,
}

impl HeadingReply {
    pub fn new(angle_degrees: f64, frame_id: Option<FrameId>) -> Self {
        HeadingReply {
            heading: round_2dp(angle_degrees),
            frame_id,
        }
    }

    /// Serialize for the wire. An absent frame id is sent as `null`.
    pub fn to_json(&self) -> String {
        // Struct field order gives a stable key order on the wire.
        serde_json::to_string(self).unwrap_or_else(|_| String::from("{}"))
    }
}

fn round_2dp(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
