//! Wire decode for inbound dashboard frames.
//!
//! Frames are JSON objects in one of three shapes, discriminated by a
//! `type` field whose absence means "log line" for backward compatibility
//! with the original broadcast format.

use mission_console_core::{AgentId, AgentStatus, Envelope, Event, MissionPhase};
use serde_json::{Map, Value};
use uuid::Uuid;

/// A frame the decoder refused.
///
/// Never fatal: a single malformed frame must not take down the session,
/// so the pump logs these and keeps draining.
#[derive(Debug, thiserror::Error)]
pub enum InvalidEvent {
    #[error("frame is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("frame is not a JSON object")]
    NotAnObject,
    #[error("unknown event type `{0}`")]
    UnknownType(String),
    #[error("unknown agent `{0}`")]
    UnknownAgent(String),
    #[error("unknown {field} value `{value}`")]
    UnknownState {
        field: &'static str,
        value: String,
    },
    #[error("missing or malformed field `{0}`")]
    MissingField(&'static str),
    #[error("invalid event id `{0}`")]
    InvalidId(String),
}

/// Decode one raw frame into a validated envelope.
///
/// # Errors
/// Returns [`InvalidEvent`] for anything that does not match the wire
/// contract; the caller decides whether to log, drop, or surface it.
pub fn decode_frame(text: &str) -> Result<Envelope, InvalidEvent> {
    let value: Value = serde_json::from_str(text)?;
    let Value::Object(obj) = value else {
        return Err(InvalidEvent::NotAnObject);
    };

    let id = match obj.get("id") {
        None => None,
        Some(raw) => {
            let s = raw.as_str().ok_or_else(|| InvalidEvent::InvalidId(raw.to_string()))?;
            Some(Uuid::parse_str(s).map_err(|_| InvalidEvent::InvalidId(s.to_owned()))?)
        }
    };

    let tag = match obj.get("type") {
        None => None,
        Some(raw) => Some(raw.as_str().ok_or(InvalidEvent::MissingField("type"))?),
    };

    let event = match tag {
        // No tag: the original backend broadcast bare log lines.
        None => Event::Log {
            agent: agent_field(&obj)?,
            message: require_str(&obj, "message")?.to_owned(),
        },
        Some("status") => {
            let raw = require_str(&obj, "state")?;
            let state = AgentStatus::from_wire(raw).ok_or_else(|| InvalidEvent::UnknownState {
                field: "status",
                value: raw.to_owned(),
            })?;
            Event::Status {
                agent: agent_field(&obj)?,
                state,
            }
        }
        // `state_change` is the legacy spelling of the phase tag.
        Some("phase" | "state_change") => {
            let raw = require_str(&obj, "state")?;
            let state = MissionPhase::from_wire(raw).ok_or_else(|| InvalidEvent::UnknownState {
                field: "phase",
                value: raw.to_owned(),
            })?;
            Event::Phase { state }
        }
        Some(other) => return Err(InvalidEvent::UnknownType(other.to_owned())),
    };

    Ok(Envelope { id, event })
}

fn require_str<'a>(
    obj: &'a Map<String, Value>,
    field: &'static str,
) -> Result<&'a str, InvalidEvent> {
    obj.get(field)
        .and_then(Value::as_str)
        .ok_or(InvalidEvent::MissingField(field))
}

fn agent_field(obj: &Map<String, Value>) -> Result<AgentId, InvalidEvent> {
    let raw = require_str(obj, "agent")?;
    AgentId::from_wire(raw).ok_or_else(|| InvalidEvent::UnknownAgent(raw.to_owned()))
}
