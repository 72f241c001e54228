//! Typed inbound events and connection lifecycle transitions.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state::{AgentId, AgentStatus, MissionPhase};

/// A validated inbound event.
///
/// Construction goes through the transport decode step, so unknown agents,
/// statuses, and phases are unrepresentable here and the fold over these
/// events is total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A line of agent output to append.
    Log { agent: AgentId, message: String },
    /// An explicit per-agent status change.
    Status { agent: AgentId, state: AgentStatus },
    /// A whole-session phase change.
    Phase { state: MissionPhase },
}

impl Event {
    /// Create a log event.
    #[must_use]
    pub fn log<S: Into<String>>(agent: AgentId, message: S) -> Self {
        Self::Log {
            agent,
            message: message.into(),
        }
    }

    /// Create a status event.
    #[must_use]
    pub const fn status(agent: AgentId, state: AgentStatus) -> Self {
        Self::Status { agent, state }
    }

    /// Create a phase event.
    #[must_use]
    pub const fn phase(state: MissionPhase) -> Self {
        Self::Phase { state }
    }
}

/// An event plus its optional delivery metadata.
///
/// The backend may stamp frames with an `id`; the store uses it to drop
/// redeliveries. Events without an id are never de-duplicated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// De-duplication key, when the backend supplies one.
    pub id: Option<Uuid>,
    /// The decoded event.
    pub event: Event,
}

impl Envelope {
    /// Wrap an event with a de-duplication key.
    #[must_use]
    pub const fn tracked(id: Uuid, event: Event) -> Self {
        Self {
            id: Some(id),
            event,
        }
    }
}

impl From<Event> for Envelope {
    fn from(event: Event) -> Self {
        Self { id: None, event }
    }
}

/// Connection lifecycle transition, reported explicitly by the source
/// driver rather than inferred from event silence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The event source (re)connected.
    Connected,
    /// The event source dropped.
    Disconnected,
}
