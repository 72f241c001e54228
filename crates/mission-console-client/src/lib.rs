//! Outbound clients for the mission console backend.
//!
//! Two independent surfaces: [`mission::MissionIssuer`] posts mission
//! commands, [`huddle::HuddleFeed`] polls the shared huddle document.
//! Neither touches session state.

pub mod huddle;
pub mod mission;

use serde::Deserialize;

pub use huddle::{FeedError, HuddleFeed};
pub use mission::{CommandError, MissionAck, MissionIssuer, MissionRequest};

/// Connection settings shared by both clients.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Backend base URL, no trailing slash.
    pub base_url: String,
    /// Seconds between huddle polls.
    pub huddle_poll_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_owned(),
            huddle_poll_secs: 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_to_missing_fields() {
        let config: ClientConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.base_url, "http://127.0.0.1:8000");
        assert_eq!(config.huddle_poll_secs, 2);

        let config: ClientConfig =
            serde_json::from_str(r#"{"base_url":"http://backend:9000"}"#).unwrap();
        assert_eq!(config.base_url, "http://backend:9000");
        assert_eq!(config.huddle_poll_secs, 2);
    }
}
