//! Huddle document poller.
//!
//! The backend exposes the agents' shared notes as a markdown document.
//! There is no push channel for it, so the feed polls on a fixed interval
//! and publishes through a watch channel whenever the content changes.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use tokio::{sync::watch, task::JoinHandle, time};

use crate::ClientConfig;

/// Why a single poll came back empty-handed.
///
/// Polls fail routinely while the backend restarts, so the loop logs these
/// and waits for the next tick rather than surfacing them.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("backend answered {0}")]
    Status(StatusCode),
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),
}

async fn fetch_once(client: &Client, url: &str) -> Result<String, FeedError> {
    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(FeedError::Status(status));
    }
    Ok(response.text().await?)
}

/// Publish `markdown` unless it matches what subscribers already hold.
fn publish(sender: &watch::Sender<String>, markdown: String) -> bool {
    sender.send_if_modified(|current| {
        if *current == markdown {
            false
        } else {
            *current = markdown;
            true
        }
    })
}

/// Background poller for the huddle markdown.
pub struct HuddleFeed {
    content: watch::Receiver<String>,
    task: Option<JoinHandle<()>>,
}

impl HuddleFeed {
    /// Start polling `{base_url}/huddle`.
    ///
    /// The first tick fires immediately; subsequent ticks follow the
    /// configured interval (clamped to at least one second).
    #[must_use]
    pub fn spawn(config: &ClientConfig) -> Self {
        let (sender, content) = watch::channel(String::new());
        let client = Client::new();
        let url = format!("{}/huddle", config.base_url);
        let period = Duration::from_secs(config.huddle_poll_secs.max(1));

        let task = tokio::spawn(async move {
            let mut ticker = time::interval(period);
            ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match fetch_once(&client, &url).await {
                    Ok(markdown) => {
                        if publish(&sender, markdown) {
                            tracing::debug!("huddle content changed");
                        }
                    }
                    Err(err) => tracing::debug!(%err, "huddle poll failed"),
                }
            }
        });

        Self {
            content,
            task: Some(task),
        }
    }

    /// Watch receiver over the latest markdown; starts empty.
    #[must_use]
    pub fn content(&self) -> watch::Receiver<String> {
        self.content.clone()
    }

    /// Stop polling. Idempotent; the watch channel keeps the last
    /// published content.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    /// Whether the poll loop has been stopped.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.task.is_none()
    }
}

impl Drop for HuddleFeed {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for HuddleFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HuddleFeed")
            .field("stopped", &self.is_stopped())
            .finish()
    }
}
