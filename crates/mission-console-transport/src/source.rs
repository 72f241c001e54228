//! Source driver: pumps a frame stream into a session store.
//!
//! The pump owns the connection lifecycle. It marks the store connected
//! before the first frame, drains frames until the stream ends, and marks
//! the store disconnected on the way out. Malformed frames are logged and
//! skipped; they never tear the session down.

use std::{fmt::Display, sync::Arc};

use futures::{Stream, StreamExt};
use mission_console_core::{SessionStore, Transition};

use crate::protocol::decode_frame;

/// Handle owning the teardown of a spawned source.
///
/// Disposing is idempotent: the teardown closure runs at most once, on the
/// first call to [`SourceHandle::dispose`] or on drop, whichever comes
/// first.
pub struct SourceHandle {
    teardown: Option<Box<dyn FnOnce() + Send>>,
}

impl SourceHandle {
    /// Wrap a teardown closure.
    #[must_use]
    pub fn new(teardown: impl FnOnce() + Send + 'static) -> Self {
        Self {
            teardown: Some(Box::new(teardown)),
        }
    }

    /// Tear the source down now.
    ///
    /// Subsequent calls are no-ops.
    pub fn dispose(&mut self) {
        if let Some(teardown) = self.teardown.take() {
            teardown();
        }
    }

    /// Whether the teardown has already run.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.teardown.is_none()
    }
}

impl Drop for SourceHandle {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for SourceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceHandle")
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Spawn a task that drains `frames` into `store`.
///
/// The store is transitioned to connected before this returns, so a caller
/// that subscribes first and then spawns the pump observes the connection
/// in order. Items that fail to decode, and transport-level `Err` items,
/// are logged at warn and skipped. When the stream ends the store is
/// transitioned to disconnected and the task exits.
///
/// Dropping or disposing the returned handle aborts the task; an aborted
/// pump does not emit the disconnected transition.
pub fn spawn_pump<S, E>(store: Arc<SessionStore>, frames: S) -> SourceHandle
where
    S: Stream<Item = Result<String, E>> + Send + 'static,
    E: Display + Send + 'static,
{
    store.transition(Transition::Connected);

    let task = tokio::spawn(async move {
        tokio::pin!(frames);
        while let Some(next) = frames.next().await {
            match next {
                Ok(text) => match decode_frame(&text) {
                    Ok(envelope) => {
                        if !store.apply(envelope) {
                            tracing::debug!("duplicate event dropped");
                        }
                    }
                    Err(err) => {
                        tracing::warn!(%err, frame = %text, "skipping undecodable frame");
                    }
                },
                Err(err) => {
                    tracing::warn!(%err, "transport error, continuing");
                }
            }
        }
        tracing::debug!("frame stream ended");
        store.transition(Transition::Disconnected);
    });

    SourceHandle::new(move || task.abort())
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use mission_console_core::{AgentId, AgentStatus, MissionPhase, Update};

    use super::*;

    fn scripted(frames: &[&str]) -> impl Stream<Item = Result<String, Infallible>> + Send {
        futures::stream::iter(
            frames
                .iter()
                .map(|f| Ok((*f).to_owned()))
                .collect::<Vec<_>>(),
        )
    }

    async fn drain_until_disconnected(rx: &mut tokio::sync::broadcast::Receiver<Update>) {
        while let Ok(update) = rx.recv().await {
            if update == Update::Connection(Transition::Disconnected) {
                break;
            }
        }
    }

    #[tokio::test]
    async fn pump_applies_scripted_frames_in_order() {
        let store = Arc::new(SessionStore::new());
        let mut rx = store.updates();

        let _handle = spawn_pump(
            Arc::clone(&store),
            scripted(&[
                r#"{"agent":"claude","message":"hello"}"#,
                r#"{"type":"status","agent":"claude","state":"active"}"#,
                r#"{"type":"phase","state":"building"}"#,
                r#"{"agent":"codex","message":"world"}"#,
            ]),
        );

        drain_until_disconnected(&mut rx).await;

        let state = store.snapshot();
        assert!(!state.is_connected());
        assert_eq!(state.log(AgentId::Claude)[0].message, "hello");
        assert_eq!(state.log(AgentId::Codex)[0].message, "world");
        assert_eq!(state.status(AgentId::Claude), AgentStatus::Active);
        assert_eq!(state.phase(), MissionPhase::Building);
    }

    #[tokio::test]
    async fn pump_marks_connected_before_returning() {
        let store = Arc::new(SessionStore::new());
        let _handle = spawn_pump(Arc::clone(&store), scripted(&[]));
        assert!(store.snapshot().is_connected());
    }

    #[tokio::test]
    async fn bad_frame_is_skipped_not_fatal() {
        let store = Arc::new(SessionStore::new());
        let mut rx = store.updates();

        let _handle = spawn_pump(
            Arc::clone(&store),
            scripted(&[
                r#"{"agent":"claude","message":"first"}"#,
                r#"{"type":"telemetry","agent":"claude"}"#,
                "not json at all",
                r#"{"agent":"claude","message":"second"}"#,
            ]),
        );

        drain_until_disconnected(&mut rx).await;

        let log = store.snapshot();
        let messages: Vec<&str> = log
            .log(AgentId::Claude)
            .iter()
            .map(|l| l.message.as_str())
            .collect();
        assert_eq!(messages, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn transport_error_does_not_stop_later_frames() {
        let store = Arc::new(SessionStore::new());
        let mut rx = store.updates();

        let frames = futures::stream::iter(vec![
            Ok(r#"{"agent":"codex","message":"before"}"#.to_owned()),
            Err("connection hiccup"),
            Ok(r#"{"agent":"codex","message":"after"}"#.to_owned()),
        ]);
        let _handle = spawn_pump(Arc::clone(&store), frames);

        drain_until_disconnected(&mut rx).await;

        assert_eq!(store.snapshot().log(AgentId::Codex).len(), 2);
    }

    #[test]
    fn dispose_runs_teardown_exactly_once() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        let mut handle = SourceHandle::new(move || {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        assert!(!handle.is_disposed());
        handle.dispose();
        handle.dispose();
        assert!(handle.is_disposed());
        drop(handle);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn drop_runs_teardown() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        drop(SourceHandle::new(move || {
            seen.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
