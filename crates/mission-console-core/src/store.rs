//! Broadcast + snapshot session store folding the inbound event stream.

use std::{
    collections::HashSet,
    sync::RwLock,
};

use futures::StreamExt;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use uuid::Uuid;

use crate::{
    event::{Envelope, Event, Transition},
    state::{AgentId, AgentStatus, LogLine, MissionPhase, SessionState},
};

/// What happens to accumulated state when the source reconnects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReconnectPolicy {
    /// Discard logs, statuses, phase, and the dedup seen-set on reconnect.
    ///
    /// The default: a reconnected session starts from a blank console.
    #[default]
    Reset,
    /// Keep everything across reconnects; only the connected flag changes.
    Preserve,
}

/// Change notification pushed to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Update {
    /// A log line was appended.
    Log { agent: AgentId, line: LogLine },
    /// An agent status changed.
    Status { agent: AgentId, state: AgentStatus },
    /// The mission phase changed.
    Phase(MissionPhase),
    /// The connection came up or dropped.
    Connection(Transition),
    /// Accumulated state was discarded (reconnect under `Reset`).
    Reset,
}

struct Inner {
    state: SessionState,
    seen: HashSet<Uuid>,
}

/// Session store with broadcast and snapshot support.
///
/// The single mutator for `SessionState`: the source driver pushes decoded
/// events through [`SessionStore::apply`], display layers read via
/// [`SessionStore::snapshot`] or [`SessionStore::subscribe`].
pub struct SessionStore {
    inner: RwLock<Inner>,
    sender: broadcast::Sender<Update>,
    policy: ReconnectPolicy,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    /// Create a store with the default reset-on-reconnect policy.
    #[must_use]
    pub fn new() -> Self {
        Self::with_policy(ReconnectPolicy::default())
    }

    /// Create a store with an explicit reconnect policy.
    #[must_use]
    pub fn with_policy(policy: ReconnectPolicy) -> Self {
        let (sender, _) = broadcast::channel(1024);
        Self {
            inner: RwLock::new(Inner {
                state: SessionState::default(),
                seen: HashSet::new(),
            }),
            sender,
            policy,
        }
    }

    /// Fold one event into the session state.
    ///
    /// Returns `false` when the envelope carried an id the store has
    /// already seen this session; the duplicate is dropped without
    /// mutating anything. Never blocks on subscribers.
    pub fn apply(&self, envelope: impl Into<Envelope>) -> bool {
        let envelope = envelope.into();
        let mut inner = self.inner.write().unwrap();

        if let Some(id) = envelope.id {
            if !inner.seen.insert(id) {
                tracing::debug!(%id, "dropping redelivered event");
                return false;
            }
        }

        // Updates are sent while the lock is held so a subscriber cannot
        // observe a gap between its snapshot and the live stream.
        let update = match envelope.event {
            Event::Log { agent, message } => {
                let line = inner.state.append_log(agent, message);
                Update::Log { agent, line }
            }
            Event::Status { agent, state } => {
                inner.state.set_status(agent, state);
                Update::Status { agent, state }
            }
            Event::Phase { state } => {
                inner.state.set_phase(state);
                Update::Phase(state)
            }
        };
        let _ = self.sender.send(update);
        true
    }

    /// Record a connection lifecycle transition.
    ///
    /// Under [`ReconnectPolicy::Reset`] a `Connected` transition replaces
    /// the accumulated state with a fresh one and clears the seen-set.
    pub fn transition(&self, transition: Transition) {
        let mut inner = self.inner.write().unwrap();
        match transition {
            Transition::Connected => {
                if self.policy == ReconnectPolicy::Reset {
                    inner.state = SessionState::default();
                    inner.seen.clear();
                    let _ = self.sender.send(Update::Reset);
                }
                inner.state.set_connected(true);
            }
            Transition::Disconnected => {
                inner.state.set_connected(false);
            }
        }
        let _ = self.sender.send(Update::Connection(transition));
    }

    /// Owned snapshot of the current state.
    #[must_use]
    pub fn snapshot(&self) -> SessionState {
        self.inner.read().unwrap().state.clone()
    }

    /// Receiver for live updates only.
    #[must_use]
    pub fn updates(&self) -> broadcast::Receiver<Update> {
        self.sender.subscribe()
    }

    /// Consistent snapshot plus a receiver for everything after it.
    ///
    /// Essential for late-attaching displays: render the snapshot, then
    /// drain the receiver, and no update is missed or doubled.
    #[must_use]
    pub fn subscribe(&self) -> (SessionState, broadcast::Receiver<Update>) {
        let inner = self.inner.read().unwrap();
        (inner.state.clone(), self.sender.subscribe())
    }

    /// Stream that replays the current state as updates, then yields live
    /// updates.
    #[must_use]
    pub fn replay_plus_updates(&self) -> futures::stream::BoxStream<'static, Update> {
        let (state, rx) = self.subscribe();

        let mut replay = Vec::new();
        if state.is_connected() {
            replay.push(Update::Connection(Transition::Connected));
        }
        if state.phase() != MissionPhase::default() {
            replay.push(Update::Phase(state.phase()));
        }
        for agent in AgentId::ALL {
            if state.status(agent) != AgentStatus::default() {
                replay.push(Update::Status {
                    agent,
                    state: state.status(agent),
                });
            }
            for line in state.log(agent) {
                replay.push(Update::Log {
                    agent,
                    line: line.clone(),
                });
            }
        }

        let live = BroadcastStream::new(rx).filter_map(|res| async move { res.ok() });
        Box::pin(futures::stream::iter(replay).chain(live))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_seq_increases_in_delivery_order() {
        let store = SessionStore::new();
        for msg in ["alpha", "beta", "gamma"] {
            assert!(store.apply(Event::log(AgentId::Claude, msg)));
        }

        let state = store.snapshot();
        let log = state.log(AgentId::Claude);
        let seqs: Vec<u64> = log.iter().map(|l| l.seq).collect();
        let messages: Vec<&str> = log.iter().map(|l| l.message.as_str()).collect();
        assert_eq!(seqs, vec![0, 1, 2]);
        assert_eq!(messages, vec!["alpha", "beta", "gamma"]);
    }

    #[test]
    fn interleaved_events_land_in_the_right_places() {
        let store = SessionStore::new();
        store.apply(Event::log(AgentId::Claude, "hello"));
        store.apply(Event::log(AgentId::Codex, "world"));
        store.apply(Event::phase(MissionPhase::Building));

        let state = store.snapshot();
        assert_eq!(state.log(AgentId::Claude).len(), 1);
        assert_eq!(state.log(AgentId::Claude)[0].message, "hello");
        assert_eq!(state.log(AgentId::Codex)[0].message, "world");
        assert_eq!(state.phase(), MissionPhase::Building);
        assert_eq!(state.status(AgentId::Claude), AgentStatus::Waiting);
        assert_eq!(state.status(AgentId::Codex), AgentStatus::Waiting);
    }

    #[test]
    fn phase_change_touches_nothing_else() {
        let store = SessionStore::new();
        store.apply(Event::log(AgentId::Codex, "building"));
        store.apply(Event::status(AgentId::Codex, AgentStatus::Active));
        store.apply(Event::phase(MissionPhase::Reviewing));

        let state = store.snapshot();
        assert_eq!(state.log(AgentId::Codex).len(), 1);
        assert_eq!(state.status(AgentId::Codex), AgentStatus::Active);
        assert_eq!(state.status(AgentId::Claude), AgentStatus::Waiting);
    }

    #[test]
    fn replaying_without_id_appends_twice() {
        let store = SessionStore::new();
        let event = Event::log(AgentId::Claude, "same text");
        assert!(store.apply(event.clone()));
        assert!(store.apply(event));

        let state = store.snapshot();
        let log = state.log(AgentId::Claude);
        assert_eq!(log.len(), 2);
        assert_ne!(log[0].seq, log[1].seq);
    }

    #[test]
    fn tracked_redelivery_is_dropped() {
        let store = SessionStore::new();
        let id = Uuid::new_v4();
        assert!(store.apply(Envelope::tracked(id, Event::log(AgentId::Codex, "once"))));
        assert!(!store.apply(Envelope::tracked(id, Event::log(AgentId::Codex, "once"))));
        assert!(store.apply(Envelope::tracked(
            Uuid::new_v4(),
            Event::log(AgentId::Codex, "twice")
        )));

        assert_eq!(store.snapshot().log(AgentId::Codex).len(), 2);
    }

    #[test]
    fn reconnect_resets_by_default() {
        let store = SessionStore::new();
        store.transition(Transition::Connected);
        let id = Uuid::new_v4();
        store.apply(Envelope::tracked(id, Event::log(AgentId::Claude, "pre")));
        store.apply(Event::status(AgentId::Claude, AgentStatus::Active));
        store.apply(Event::phase(MissionPhase::Planning));

        store.transition(Transition::Disconnected);
        assert!(!store.snapshot().is_connected());

        store.transition(Transition::Connected);
        let state = store.snapshot();
        assert!(state.is_connected());
        assert!(state.log(AgentId::Claude).is_empty());
        assert_eq!(state.status(AgentId::Claude), AgentStatus::Waiting);
        assert_eq!(state.phase(), MissionPhase::Idle);

        // Seen-set is part of the session: the same id applies again.
        assert!(store.apply(Envelope::tracked(id, Event::log(AgentId::Claude, "post"))));
    }

    #[test]
    fn reconnect_preserves_under_preserve_policy() {
        let store = SessionStore::with_policy(ReconnectPolicy::Preserve);
        store.transition(Transition::Connected);
        store.apply(Event::log(AgentId::Claude, "kept"));
        store.apply(Event::status(AgentId::Codex, AgentStatus::Active));
        store.apply(Event::phase(MissionPhase::Building));

        store.transition(Transition::Disconnected);
        store.transition(Transition::Connected);

        let state = store.snapshot();
        assert!(state.is_connected());
        assert_eq!(state.log(AgentId::Claude)[0].message, "kept");
        assert_eq!(state.status(AgentId::Codex), AgentStatus::Active);
        assert_eq!(state.phase(), MissionPhase::Building);
    }

    #[test]
    fn subscriber_sees_snapshot_then_only_later_updates() {
        let store = SessionStore::new();
        store.apply(Event::log(AgentId::Claude, "before"));

        let (state, mut rx) = store.subscribe();
        assert_eq!(state.log(AgentId::Claude).len(), 1);

        store.apply(Event::log(AgentId::Claude, "after"));
        match rx.try_recv().unwrap() {
            Update::Log { agent, line } => {
                assert_eq!(agent, AgentId::Claude);
                assert_eq!(line.message, "after");
                assert_eq!(line.seq, 1);
            }
            other => panic!("unexpected update: {other:?}"),
        }
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn replay_plus_updates_replays_existing_state() {
        let store = SessionStore::new();
        store.transition(Transition::Connected);
        store.apply(Event::phase(MissionPhase::Planning));
        store.apply(Event::log(AgentId::Claude, "one"));
        store.apply(Event::log(AgentId::Codex, "two"));

        tokio_test::block_on(async {
            let mut stream = store.replay_plus_updates();
            let mut replayed = Vec::new();
            for _ in 0..4 {
                replayed.push(stream.next().await.unwrap());
            }
            assert!(replayed.contains(&Update::Connection(Transition::Connected)));
            assert!(replayed.contains(&Update::Phase(MissionPhase::Planning)));
            assert!(
                replayed
                    .iter()
                    .any(|u| matches!(u, Update::Log { agent: AgentId::Codex, line } if line.message == "two"))
            );
        });
    }
}
