//! Mission submission client.
//!
//! One backend, one mission at a time: the issuer refuses a second
//! submission while one is outstanding instead of queueing it.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::ClientConfig;

/// Body for `POST /start_mission`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MissionRequest {
    pub task: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_path: Option<String>,
}

impl MissionRequest {
    /// A request for `task` in the backend's default working directory.
    #[must_use]
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            project_path: None,
        }
    }

    /// Pin the mission to a project directory on the backend host.
    #[must_use]
    pub fn with_project_path(mut self, path: impl Into<String>) -> Self {
        self.project_path = Some(path.into());
        self
    }
}

/// Acknowledgement returned by the backend.
///
/// Parsed leniently: backends have shipped several shapes of this body and
/// none of the fields carry session data.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MissionAck {
    pub status: Option<String>,
    pub task: Option<String>,
    pub working_dir: Option<String>,
}

/// Why a submission did not go through.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("a mission submission is already in flight")]
    AlreadyInFlight,
    #[error("backend rejected the mission: {0}")]
    Status(StatusCode),
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Releases the in-flight flag when dropped, so every exit path out of
/// [`MissionIssuer::start_mission`] releases it, cancellation included.
struct InFlightGuard(Arc<AtomicBool>);

impl InFlightGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        if flag.swap(true, Ordering::SeqCst) {
            None
        } else {
            Some(Self(Arc::clone(flag)))
        }
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Client for the mission command endpoint.
#[derive(Clone)]
pub struct MissionIssuer {
    client: Client,
    base_url: String,
    in_flight: Arc<AtomicBool>,
}

impl MissionIssuer {
    #[must_use]
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.base_url.clone(),
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Whether a submission is currently outstanding.
    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Submit a mission to the backend.
    ///
    /// # Errors
    /// [`CommandError::AlreadyInFlight`] when a prior submission has not
    /// completed, [`CommandError::Status`] on a non-2xx response, and
    /// [`CommandError::Transport`] when the request never got an answer.
    pub async fn start_mission(
        &self,
        request: &MissionRequest,
    ) -> Result<MissionAck, CommandError> {
        let _guard =
            InFlightGuard::acquire(&self.in_flight).ok_or(CommandError::AlreadyInFlight)?;

        tracing::info!(task = %request.task, "submitting mission");
        let response = self
            .client
            .post(format!("{}/start_mission", self.base_url))
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(CommandError::Status(status));
        }
        Ok(response.json().await?)
    }
}
