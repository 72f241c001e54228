//! Session read model: agents, statuses, phases, and log buffers.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Agent identifier.
///
/// The console is built around a fixed pair of producers; the wire names
/// match the keys the backend attributes log lines to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentId {
    /// Planning and review agent (left pane).
    Claude,
    /// Implementation agent (right pane).
    Codex,
}

impl AgentId {
    /// All agents in a session, in display order.
    pub const ALL: [Self; 2] = [Self::Claude, Self::Codex];

    /// Parse a wire value, case-insensitively.
    #[must_use]
    pub fn from_wire(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "claude" => Some(Self::Claude),
            "codex" => Some(Self::Codex),
            _ => None,
        }
    }

    /// Canonical wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Claude => "claude",
            Self::Codex => "codex",
        }
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-agent activity status.
///
/// Mutated only by explicit status events; an agent that has produced no
/// status event yet reads as `Waiting`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    /// Idle, waiting for work.
    #[default]
    Waiting,
    /// Currently producing output.
    Active,
}

impl AgentStatus {
    /// Parse a wire value, case-insensitively.
    #[must_use]
    pub fn from_wire(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "waiting" => Some(Self::Waiting),
            "active" => Some(Self::Active),
            _ => None,
        }
    }

    /// Canonical wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Active => "active",
        }
    }
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whole-session lifecycle phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissionPhase {
    /// No mission running.
    #[default]
    Idle,
    /// Architecture and task breakdown.
    Planning,
    /// Implementation.
    Building,
    /// Quality review.
    Reviewing,
}

impl MissionPhase {
    /// Parse a wire value, case-insensitively.
    ///
    /// The legacy backend broadcast phases in uppercase (`"BUILDING"`);
    /// those spellings parse to the same variants.
    #[must_use]
    pub fn from_wire(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "idle" => Some(Self::Idle),
            "planning" => Some(Self::Planning),
            "building" => Some(Self::Building),
            "reviewing" => Some(Self::Reviewing),
            _ => None,
        }
    }

    /// Canonical wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Planning => "planning",
            Self::Building => "building",
            Self::Reviewing => "reviewing",
        }
    }
}

impl std::fmt::Display for MissionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One appended line of agent output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogLine {
    /// Strictly increasing per agent, assigned at append time, never reused
    /// within a session.
    pub seq: u64,
    /// Line content, exactly as delivered.
    pub message: String,
}

/// Aggregate state for one connected session.
///
/// Owned exclusively by the `SessionStore`; readers receive owned clones,
/// never a mutable reference.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionState {
    logs: HashMap<AgentId, Vec<LogLine>>,
    next_seq: HashMap<AgentId, u64>,
    statuses: HashMap<AgentId, AgentStatus>,
    phase: MissionPhase,
    connected: bool,
}

impl SessionState {
    /// Log lines for an agent, in append order.
    #[must_use]
    pub fn log(&self, agent: AgentId) -> &[LogLine] {
        self.logs.get(&agent).map_or(&[], Vec::as_slice)
    }

    /// Current status for an agent (`Waiting` until its first status event).
    #[must_use]
    pub fn status(&self, agent: AgentId) -> AgentStatus {
        self.statuses.get(&agent).copied().unwrap_or_default()
    }

    /// Current mission phase.
    #[must_use]
    pub const fn phase(&self) -> MissionPhase {
        self.phase
    }

    /// Whether the event source is currently connected.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.connected
    }

    pub(crate) fn append_log(&mut self, agent: AgentId, message: String) -> LogLine {
        let seq = self.next_seq.entry(agent).or_insert(0);
        let line = LogLine { seq: *seq, message };
        *seq += 1;
        self.logs.entry(agent).or_default().push(line.clone());
        line
    }

    pub(crate) fn set_status(&mut self, agent: AgentId, status: AgentStatus) {
        self.statuses.insert(agent, status);
    }

    pub(crate) const fn set_phase(&mut self, phase: MissionPhase) {
        self.phase = phase;
    }

    pub(crate) const fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }
}
