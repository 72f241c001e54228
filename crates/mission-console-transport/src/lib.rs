//! Transport layer for the mission console.
//!
//! Splits into two halves: [`protocol`] turns raw text frames into typed
//! envelopes, [`source`] drives a frame stream into a session store with
//! connection lifecycle handling.

pub mod protocol;
pub mod source;

pub use protocol::{InvalidEvent, decode_frame};
pub use source::{SourceHandle, spawn_pump};
