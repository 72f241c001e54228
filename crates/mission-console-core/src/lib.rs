//! Core session model for the twin-agent mission console.
//!
//! This crate provides the fundamental building blocks:
//! - `SessionState` - per-agent log buffers, statuses, and mission phase
//! - `Event` / `Envelope` - typed inbound events with optional dedup ids
//! - `SessionStore` - broadcast + snapshot fold over the event stream

pub mod event;
pub mod state;
pub mod store;

pub use event::{Envelope, Event, Transition};
pub use state::{AgentId, AgentStatus, LogLine, MissionPhase, SessionState};
pub use store::{ReconnectPolicy, SessionStore, Update};
