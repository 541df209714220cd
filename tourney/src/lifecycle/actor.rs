//! Tournament actor: the single owner of one tournament aggregate.
//!
//! Every trigger (commands, posts, votes and timers) arrives through one
//! mpsc inbox, so transitions of a tournament are linearizable. Timers are
//! spawned tasks keyed by match ID; each one captures the match generation it
//! was armed for and is aborted as soon as that generation moves on.

use super::{
    config::SharedSettings,
    controller,
    messages::{Reply, TimerKind, TournamentMessage},
};
use crate::{
    events::{EngineEvent, EventEnvelope},
    store::TournamentStore,
    tournament::{
        EngineError, EngineResult, MatchId, MatchState, Tournament, TournamentId,
        TournamentStatus,
    },
};
use chrono::{DateTime, Utc};
use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};

/// Tournament actor handle for sending messages
#[derive(Clone, Debug)]
pub struct TournamentHandle {
    sender: mpsc::Sender<TournamentMessage>,
    tournament_id: TournamentId,
}

impl TournamentHandle {
    /// Create a new tournament handle
    pub fn new(sender: mpsc::Sender<TournamentMessage>, tournament_id: TournamentId) -> Self {
        Self {
            sender,
            tournament_id,
        }
    }

    /// Get tournament ID
    pub fn tournament_id(&self) -> &str {
        &self.tournament_id
    }

    /// Whether the actor has stopped
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Send a message to the tournament
    pub async fn send(&self, message: TournamentMessage) -> EngineResult<()> {
        self.sender
            .send(message)
            .await
            .map_err(|_| EngineError::ActorUnavailable(self.tournament_id.clone()))
    }

    /// Send a request and wait for its reply
    ///
    /// # Example
    ///
    /// ```ignore
    /// let plan = handle
    ///     .request(|response| TournamentMessage::CloseRegistration { response })
    ///     .await?;
    /// ```
    pub async fn request<T>(
        &self,
        build: impl FnOnce(Reply<T>) -> TournamentMessage,
    ) -> EngineResult<T> {
        let (response, rx) = oneshot::channel();
        self.send(build(response)).await?;
        rx.await
            .map_err(|_| EngineError::ActorUnavailable(self.tournament_id.clone()))?
    }

    /// Read-only copy of the aggregate
    pub async fn snapshot(&self) -> EngineResult<Tournament> {
        let (response, rx) = oneshot::channel();
        self.send(TournamentMessage::GetSnapshot { response }).await?;
        rx.await
            .map_err(|_| EngineError::ActorUnavailable(self.tournament_id.clone()))
    }
}

struct ScheduledTimer {
    kind: TimerKind,
    generation: u64,
    task: JoinHandle<()>,
}

/// Tournament actor managing a single tournament
pub struct TournamentActor {
    /// Committed state, always equal to what the store holds
    tournament: Tournament,

    /// Engine settings, snapshotted per message
    settings: SharedSettings,

    /// Durable store
    store: Arc<dyn TournamentStore>,

    /// Message inbox
    inbox: mpsc::Receiver<TournamentMessage>,

    /// Sender used by timer tasks; weak so timers never keep the actor alive
    timer_sender: mpsc::WeakSender<TournamentMessage>,

    /// Armed timers by match ID
    timers: HashMap<MatchId, ScheduledTimer>,

    /// Event subscribers
    subscribers: HashMap<String, mpsc::Sender<EventEnvelope>>,

    is_closed: bool,
}

impl TournamentActor {
    /// Create a new tournament actor
    ///
    /// # Arguments
    ///
    /// * `tournament` - Aggregate as last persisted
    /// * `settings` - Engine settings
    /// * `store` - Store every committed change is written to
    ///
    /// # Returns
    ///
    /// * `(TournamentActor, TournamentHandle)` - Actor and handle for sending messages
    pub fn new(
        tournament: Tournament,
        settings: SharedSettings,
        store: Arc<dyn TournamentStore>,
    ) -> (Self, TournamentHandle) {
        let (sender, inbox) = mpsc::channel(100);
        let handle = TournamentHandle::new(sender.clone(), tournament.id.clone());

        let actor = Self {
            tournament,
            settings,
            store,
            inbox,
            timer_sender: sender.downgrade(),
            timers: HashMap::new(),
            subscribers: HashMap::new(),
            is_closed: false,
        };

        (actor, handle)
    }

    /// Run the tournament actor event loop
    pub async fn run(mut self) {
        log::info!(
            "Tournament {} '{}' starting ({})",
            self.tournament.id,
            self.tournament.name,
            self.tournament.status
        );

        // Re-arm deadlines persisted before a restart
        self.sync_timers();

        while let Some(message) = self.inbox.recv().await {
            self.handle_message(message).await;

            if self.is_closed {
                break;
            }
        }

        for (_, timer) in self.timers.drain() {
            timer.task.abort();
        }
        log::info!(
            "Tournament {} '{}' stopped",
            self.tournament.id,
            self.tournament.name
        );
    }

    /// Handle a tournament message
    async fn handle_message(&mut self, message: TournamentMessage) {
        let settings = Arc::clone(&*self.settings.read().await);

        match message {
            TournamentMessage::Register {
                participant_id,
                display_name,
                response,
            } => {
                let result = self
                    .apply(|t, events| {
                        controller::register(t, participant_id, display_name, Utc::now(), events)
                    })
                    .await;
                let _ = response.send(result);
            }

            TournamentMessage::Unregister {
                participant_id,
                response,
            } => {
                let result = self
                    .apply(|t, events| controller::unregister(t, &participant_id, events))
                    .await;
                let _ = response.send(result);
            }

            TournamentMessage::OpenRegistration { response } => {
                let result = self
                    .apply(|t, events| controller::open_registration(t, events))
                    .await;
                let _ = response.send(result);
            }

            TournamentMessage::CloseRegistration { response } => {
                let result = self
                    .apply(|t, events| controller::close_registration(t, Utc::now(), events))
                    .await;
                let _ = response.send(result);
            }

            TournamentMessage::AssignFixtures {
                round_index,
                response,
            } => {
                let result = self
                    .apply(|t, events| {
                        controller::assign_fixtures(t, round_index, &settings.channels, events)
                    })
                    .await;
                let _ = response.send(result);
            }

            TournamentMessage::ParticipantPost {
                match_id,
                participant_id,
                timestamp,
                response,
            } => {
                let result = self
                    .apply(|t, events| {
                        controller::participant_post(
                            t,
                            &match_id,
                            &participant_id,
                            timestamp,
                            &settings.lifecycle,
                            events,
                        )
                    })
                    .await;
                let _ = response.send(result);
            }

            TournamentMessage::ChannelPost {
                channel_id,
                participant_id,
                timestamp,
                response,
            } => {
                let result = self
                    .apply(|t, events| {
                        controller::channel_post(
                            t,
                            &channel_id,
                            &participant_id,
                            timestamp,
                            &settings.lifecycle,
                            events,
                        )
                    })
                    .await;
                let _ = response.send(result);
            }

            TournamentMessage::OpenVote {
                match_id,
                window,
                response,
            } => {
                let result = self
                    .apply(|t, events| {
                        controller::open_vote(
                            t,
                            &match_id,
                            window,
                            Utc::now(),
                            &settings.lifecycle,
                            events,
                        )
                    })
                    .await;
                let _ = response.send(result);
            }

            TournamentMessage::CastVote {
                match_id,
                voter_id,
                choice,
                response,
            } => {
                let result = self
                    .apply(|t, _| controller::cast_vote(t, &match_id, &voter_id, choice))
                    .await;
                let _ = response.send(result);
            }

            TournamentMessage::EndMatch {
                match_id,
                winner,
                response,
            } => {
                let result = self
                    .apply(|t, events| controller::end_match(t, &match_id, winner, Utc::now(), events))
                    .await;
                let _ = response.send(result);
            }

            TournamentMessage::EndTournament { response } => {
                let result = self
                    .apply(|t, events| controller::end_tournament(t, Utc::now(), events))
                    .await;
                let _ = response.send(result);
            }

            TournamentMessage::GetSnapshot { response } => {
                let _ = response.send(self.tournament.clone());
            }

            TournamentMessage::TimerFired {
                match_id,
                generation,
                kind,
            } => {
                self.handle_timer(match_id, generation, kind).await;
            }

            TournamentMessage::Subscribe {
                subscriber_id,
                sender,
            } => {
                self.subscribers.insert(subscriber_id, sender);
            }

            TournamentMessage::Unsubscribe { subscriber_id } => {
                self.subscribers.remove(&subscriber_id);
            }

            TournamentMessage::Close { response } => {
                self.is_closed = true;
                let _ = response.send(());
            }
        }
    }

    /// Run `op` against a working copy, persist it, then commit.
    ///
    /// A failed operation or a failed save leaves the committed state, the
    /// timers and the subscribers untouched.
    async fn apply<T, F>(&mut self, op: F) -> EngineResult<T>
    where
        F: FnOnce(&mut Tournament, &mut Vec<EngineEvent>) -> EngineResult<T>,
    {
        let mut draft = self.tournament.clone();
        let mut events = Vec::new();
        let value = op(&mut draft, &mut events)?;

        if draft != self.tournament {
            if let Err(e) = self.store.save(&draft).await {
                log::error!(
                    "Tournament {}: failed to save, change discarded: {}",
                    self.tournament.id,
                    e
                );
                return Err(e.into());
            }
            self.tournament = draft;
        }

        self.sync_timers();
        self.publish(events);
        Ok(value)
    }

    async fn handle_timer(&mut self, match_id: MatchId, generation: u64, kind: TimerKind) {
        if self
            .timers
            .get(&match_id)
            .is_some_and(|t| t.generation == generation && t.kind == kind)
        {
            self.timers.remove(&match_id);
        }

        let settings = Arc::clone(&*self.settings.read().await);
        let result = self
            .apply(|t, events| match kind {
                TimerKind::ReplyDeadline => controller::reply_deadline_elapsed(
                    t,
                    &match_id,
                    generation,
                    Utc::now(),
                    &settings.lifecycle,
                    events,
                ),
                TimerKind::VoteWindow => controller::vote_window_elapsed(
                    t,
                    &match_id,
                    generation,
                    Utc::now(),
                    &settings.lifecycle,
                    events,
                ),
            })
            .await;

        match result {
            Ok(true) => log::info!(
                "Tournament {}: {:?} elapsed for {}",
                self.tournament.id,
                kind,
                match_id
            ),
            Ok(false) => log::debug!(
                "Tournament {}: stale {:?} timer for {} ignored",
                self.tournament.id,
                kind,
                match_id
            ),
            Err(e) => log::error!(
                "Tournament {}: {:?} timer for {} failed: {}",
                self.tournament.id,
                kind,
                match_id,
                e
            ),
        }
    }

    /// Timers the committed state calls for: one per match with a running
    /// reply deadline or an open vote window.
    fn desired_timers(&self) -> HashMap<MatchId, (TimerKind, u64, DateTime<Utc>)> {
        if self.tournament.status != TournamentStatus::Running {
            return HashMap::new();
        }

        self.tournament
            .matches()
            .filter_map(|m| {
                let (kind, due) = match &m.state {
                    MatchState::Pending {
                        deadline: Some(deadline),
                        ..
                    } => (TimerKind::ReplyDeadline, *deadline),
                    MatchState::Voting { closes_at, .. } => (TimerKind::VoteWindow, *closes_at),
                    _ => return None,
                };
                Some((m.id.clone(), (kind, m.generation, due)))
            })
            .collect()
    }

    /// Reconcile armed timers with the committed state. Outdated timers are
    /// aborted, missing ones armed; a deadline already in the past fires
    /// immediately.
    fn sync_timers(&mut self) {
        let desired = self.desired_timers();

        self.timers.retain(|match_id, timer| {
            let keep = desired
                .get(match_id)
                .is_some_and(|(kind, generation, _)| {
                    *kind == timer.kind && *generation == timer.generation
                });
            if !keep {
                timer.task.abort();
            }
            keep
        });

        for (match_id, (kind, generation, due)) in desired {
            if !self.timers.contains_key(&match_id) {
                self.schedule(match_id, kind, generation, due);
            }
        }
    }

    fn schedule(&mut self, match_id: MatchId, kind: TimerKind, generation: u64, due: DateTime<Utc>) {
        let wait = (due - Utc::now()).to_std().unwrap_or(Duration::ZERO);
        let sender = self.timer_sender.clone();
        let fired_id = match_id.clone();

        let task = tokio::spawn(async move {
            tokio::time::sleep(wait).await;
            if let Some(sender) = sender.upgrade() {
                let _ = sender
                    .send(TournamentMessage::TimerFired {
                        match_id: fired_id,
                        generation,
                        kind,
                    })
                    .await;
            }
        });

        log::debug!(
            "Tournament {}: armed {:?} for {} in {:?}",
            self.tournament.id,
            kind,
            match_id,
            wait
        );
        self.timers.insert(
            match_id,
            ScheduledTimer {
                kind,
                generation,
                task,
            },
        );
    }

    /// Broadcast events to all subscribers
    fn publish(&mut self, events: Vec<EngineEvent>) {
        for event in events {
            log::debug!("Tournament {}: {}", self.tournament.id, event);
            let envelope = EventEnvelope {
                tournament_id: self.tournament.id.clone(),
                event,
            };

            self.subscribers
                .retain(|subscriber_id, sender| match sender.try_send(envelope.clone()) {
                    Ok(_) => true,
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        log::warn!(
                            "Subscriber {} channel full, dropping event",
                            subscriber_id
                        );
                        true
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => {
                        log::debug!("Subscriber {} disconnected, removing", subscriber_id);
                        false
                    }
                });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        lifecycle::{EngineSettings, LifecycleConfig},
        store::InMemoryStore,
        tournament::{MatchStatus, Side},
    };

    async fn started(
        n: usize,
        lifecycle: LifecycleConfig,
    ) -> (TournamentHandle, mpsc::Receiver<EventEnvelope>) {
        let mut t = Tournament::new("t".to_string(), "Cup".to_string(), 0);
        for i in 1..=n {
            t.register(format!("u{i}"), format!("User {i}"), Utc::now())
                .unwrap();
        }
        let settings = EngineSettings {
            lifecycle,
            ..EngineSettings::default()
        }
        .into_shared();

        let (actor, handle) = TournamentActor::new(t, settings, Arc::new(InMemoryStore::new()));
        tokio::spawn(actor.run());

        let (tx, rx) = mpsc::channel(64);
        handle
            .send(TournamentMessage::Subscribe {
                subscriber_id: "test".to_string(),
                sender: tx,
            })
            .await
            .unwrap();
        handle
            .request(|response| TournamentMessage::CloseRegistration { response })
            .await
            .unwrap();
        (handle, rx)
    }

    fn short_timers() -> LifecycleConfig {
        LifecycleConfig {
            reply_timeout_secs: 60,
            vote_window_secs: 120,
            ..LifecycleConfig::default()
        }
    }

    async fn post(handle: &TournamentHandle, match_id: &str, who: &str) -> EngineResult<()> {
        handle
            .request(|response| TournamentMessage::ParticipantPost {
                match_id: match_id.to_string(),
                participant_id: who.to_string(),
                timestamp: Utc::now(),
                response,
            })
            .await
            .map(|_| ())
    }

    fn drain(rx: &mut mpsc::Receiver<EventEnvelope>) -> Vec<EngineEvent> {
        let mut events = Vec::new();
        while let Ok(envelope) = rx.try_recv() {
            events.push(envelope.event);
        }
        events
    }

    #[tokio::test(start_paused = true)]
    async fn test_reply_timeout_opens_vote() {
        let (handle, mut rx) = started(2, short_timers()).await;
        post(&handle, "R1M1", "u1").await.unwrap();

        tokio::time::sleep(Duration::from_secs(61)).await;

        let t = handle.snapshot().await.unwrap();
        let m = t.find_match("R1M1").unwrap();
        assert!(matches!(
            m.state,
            MatchState::Voting {
                reason: crate::tournament::VoteReason::ReplyTimeout,
                ..
            }
        ));
        assert!(drain(&mut rx).iter().any(|e| matches!(
            e,
            EngineEvent::MatchTimedOut { waiting_on: Some(id), .. } if id == "u2"
        )));
    }

    #[tokio::test(start_paused = true)]
    async fn test_vote_window_closes_match() {
        let (handle, _rx) = started(2, short_timers()).await;
        post(&handle, "R1M1", "u1").await.unwrap();
        tokio::time::sleep(Duration::from_secs(61)).await;

        for (voter, choice) in [("a", Side::P2), ("b", Side::P2), ("c", Side::P1)] {
            handle
                .request(|response| TournamentMessage::CastVote {
                    match_id: "R1M1".to_string(),
                    voter_id: voter.to_string(),
                    choice,
                    response,
                })
                .await
                .unwrap();
        }

        tokio::time::sleep(Duration::from_secs(121)).await;

        let t = handle.snapshot().await.unwrap();
        assert_eq!(t.status, TournamentStatus::Finished);
        assert_eq!(t.champion.as_deref(), Some("u2"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_post_resets_deadline() {
        let (handle, _rx) = started(2, short_timers()).await;
        post(&handle, "R1M1", "u1").await.unwrap();

        tokio::time::sleep(Duration::from_secs(45)).await;
        post(&handle, "R1M1", "u2").await.unwrap();
        tokio::time::sleep(Duration::from_secs(45)).await;

        let t = handle.snapshot().await.unwrap();
        assert_eq!(t.find_match("R1M1").unwrap().status(), MatchStatus::Pending);
    }

    #[tokio::test(start_paused = true)]
    async fn test_end_match_disarms_reply_timer() {
        let (handle, mut rx) = started(2, short_timers()).await;
        post(&handle, "R1M1", "u1").await.unwrap();

        handle
            .request(|response| TournamentMessage::EndMatch {
                match_id: "R1M1".to_string(),
                winner: Side::P1,
                response,
            })
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_secs(600)).await;

        let t = handle.snapshot().await.unwrap();
        assert_eq!(t.find_match("R1M1").unwrap().winner(), Some(Side::P1));
        assert_eq!(t.champion.as_deref(), Some("u1"));
        assert!(
            !drain(&mut rx)
                .iter()
                .any(|e| matches!(e, EngineEvent::MatchTimedOut { .. }))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_timer_message_is_noop() {
        let (handle, _rx) = started(2, short_timers()).await;
        post(&handle, "R1M1", "u1").await.unwrap();
        let armed = handle.snapshot().await.unwrap().find_match("R1M1").unwrap().generation;

        handle
            .request(|response| TournamentMessage::EndMatch {
                match_id: "R1M1".to_string(),
                winner: Side::P2,
                response,
            })
            .await
            .unwrap();
        let before = handle.snapshot().await.unwrap();

        // A firing that was already queued when the match was decided
        handle
            .send(TournamentMessage::TimerFired {
                match_id: "R1M1".to_string(),
                generation: armed,
                kind: TimerKind::ReplyDeadline,
            })
            .await
            .unwrap();

        assert_eq!(handle.snapshot().await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_close_stops_actor() {
        let (handle, _rx) = started(2, LifecycleConfig::default()).await;
        let (response, rx) = oneshot::channel();
        handle.send(TournamentMessage::Close { response }).await.unwrap();
        rx.await.unwrap();

        tokio::task::yield_now().await;
        assert!(matches!(
            handle.snapshot().await,
            Err(EngineError::ActorUnavailable(_))
        ));
    }
}
