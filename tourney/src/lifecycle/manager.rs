//! Tournament manager for spawning and managing tournament actors.

use super::{
    actor::{TournamentActor, TournamentHandle},
    config::{EngineSettings, SharedSettings},
    machine::VoteTally,
    messages::TournamentMessage,
};
use crate::{
    bracket::BracketPlan,
    events::EventEnvelope,
    store::{StoreError, TournamentStore},
    tournament::{
        ConfigurationError, EngineError, EngineResult, Fixture, Match, Participant, ParticipantId,
        Side, Tournament, TournamentId, TournamentStatus, TournamentSummary,
    },
};
use chrono::{DateTime, Utc};
use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::sync::{RwLock, mpsc, oneshot};
use uuid::Uuid;

/// Tournament manager for managing multiple tournament instances
pub struct TournamentManager {
    /// Durable store shared with every actor
    store: Arc<dyn TournamentStore>,

    /// Engine settings, swapped as a whole by organizer updates
    settings: SharedSettings,

    /// Running tournament actors
    tournaments: Arc<RwLock<HashMap<TournamentId, TournamentHandle>>>,

    /// Subscribers attached to every tournament, current and future
    listeners: Arc<RwLock<HashMap<String, mpsc::Sender<EventEnvelope>>>>,
}

impl TournamentManager {
    /// Create a new tournament manager
    ///
    /// # Arguments
    ///
    /// * `store` - Durable tournament store
    /// * `settings` - Engine settings, validated here
    ///
    /// # Returns
    ///
    /// * `EngineResult<TournamentManager>` - New manager, or a configuration error
    pub fn new(store: Arc<dyn TournamentStore>, settings: EngineSettings) -> EngineResult<Self> {
        settings.validate()?;

        Ok(Self {
            store,
            settings: settings.into_shared(),
            tournaments: Arc::new(RwLock::new(HashMap::new())),
            listeners: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    /// Current settings snapshot
    pub async fn settings(&self) -> Arc<EngineSettings> {
        Arc::clone(&*self.settings.read().await)
    }

    /// Handle on the live settings, for collaborators that read them later
    pub fn shared_settings(&self) -> SharedSettings {
        Arc::clone(&self.settings)
    }

    /// Apply `update` to a copy of the settings and swap it in once valid.
    ///
    /// Actors pick the new settings up with their next message. Armed timers
    /// keep the deadlines they were armed with.
    pub async fn update_settings<F>(&self, update: F) -> EngineResult<Arc<EngineSettings>>
    where
        F: FnOnce(&mut EngineSettings) -> Result<(), ConfigurationError>,
    {
        let mut guard = self.settings.write().await;
        let mut next = EngineSettings::clone(&guard);
        update(&mut next)?;
        next.validate()?;

        let next = Arc::new(next);
        *guard = Arc::clone(&next);
        log::info!("Engine settings updated");
        Ok(next)
    }

    /// Replace the battle channels fixtures are assigned to
    pub async fn set_battle_channels(&self, channels: Vec<String>) -> EngineResult<Arc<EngineSettings>> {
        let channels = clean_list(channels);
        self.update_settings(|s| {
            s.channels.battle_channels = channels;
            Ok(())
        })
        .await
    }

    /// Replace the organizer roles; at least one is required
    pub async fn set_organizer_roles(&self, roles: Vec<String>) -> EngineResult<Arc<EngineSettings>> {
        let roles = clean_list(roles);
        if roles.is_empty() {
            return Err(ConfigurationError::Invalid {
                field: "organizer_roles",
                reason: "at least one role is required".to_string(),
            }
            .into());
        }

        self.update_settings(|s| {
            s.organizer_roles = roles;
            Ok(())
        })
        .await
    }

    /// Rebind one of the named channels (bracket, registration, announce, vote)
    pub async fn set_channel(
        &self,
        name: &str,
        channel_id: Option<String>,
    ) -> EngineResult<Arc<EngineSettings>> {
        self.update_settings(|s| s.channels.set(name, channel_id)).await
    }

    pub fn store(&self) -> &Arc<dyn TournamentStore> {
        &self.store
    }

    /// Spawn an actor and attach the registered listeners. Callers insert
    /// the handle while holding the write lock on `tournaments`, so a
    /// tournament never gets two owners.
    async fn start_actor(&self, tournament: Tournament) -> TournamentHandle {
        let id = tournament.id.clone();
        let (actor, handle) =
            TournamentActor::new(tournament, self.shared_settings(), Arc::clone(&self.store));

        tokio::spawn(async move {
            actor.run().await;
        });

        let listeners = self.listeners.read().await;
        for (subscriber_id, sender) in listeners.iter() {
            let subscribe = TournamentMessage::Subscribe {
                subscriber_id: subscriber_id.clone(),
                sender: sender.clone(),
            };
            if let Err(e) = handle.send(subscribe).await {
                log::warn!("Failed to attach {} to tournament {}: {}", subscriber_id, id, e);
            }
        }

        handle
    }

    /// Load unfinished tournaments from the store and spawn their actors.
    ///
    /// Each actor re-arms the reply deadlines and vote windows it finds in
    /// the persisted aggregate.
    ///
    /// # Returns
    ///
    /// * `EngineResult<usize>` - Number of tournaments resumed
    pub async fn load_existing_tournaments(&self) -> EngineResult<usize> {
        let mut loaded = 0;

        for id in self.store.list_ids().await? {
            let mut tournaments = self.tournaments.write().await;
            if tournaments.contains_key(&id) {
                continue;
            }

            let tournament = self.store.load(&id).await?;
            if tournament.status == TournamentStatus::Finished {
                continue;
            }

            let handle = self.start_actor(tournament).await;
            tournaments.insert(id.clone(), handle);
            log::info!("Resumed tournament {}", id);
            loaded += 1;
        }

        Ok(loaded)
    }

    /// Create a tournament, make it current and spawn its actor
    ///
    /// # Arguments
    ///
    /// * `name` - Tournament name
    /// * `max_participants` - Participant cap, 0 for unlimited
    pub async fn create_tournament(
        &self,
        name: String,
        max_participants: usize,
    ) -> EngineResult<TournamentSummary> {
        let id = format!("t_{}", Uuid::new_v4().simple());
        let tournament = Tournament::new(id.clone(), name, max_participants);

        self.store.save(&tournament).await?;
        self.store.set_current(&id).await?;
        let summary = tournament.summary();
        let handle = self.start_actor(tournament).await;
        self.tournaments.write().await.insert(id.clone(), handle);

        log::info!("Created tournament {} '{}'", id, summary.name);
        Ok(summary)
    }

    /// Current tournament, creating one named `default_name` if none exists
    pub async fn ensure_current(
        &self,
        default_name: &str,
        max_participants: usize,
    ) -> EngineResult<TournamentId> {
        if let Some(id) = self.store.current().await? {
            return Ok(id);
        }

        let summary = self
            .create_tournament(default_name.to_string(), max_participants)
            .await?;
        Ok(summary.id)
    }

    pub async fn current_tournament_id(&self) -> EngineResult<TournamentId> {
        self.store
            .current()
            .await?
            .ok_or(EngineError::NoCurrentTournament)
    }

    pub async fn set_current(&self, id: &str) -> EngineResult<()> {
        self.store.set_current(id).await.map_err(|e| match e {
            StoreError::NotFound(id) => EngineError::TournamentNotFound(id),
            other => other.into(),
        })
    }

    /// Handle to a tournament's actor, respawning it from the store when needed
    pub async fn handle(&self, id: &str) -> EngineResult<TournamentHandle> {
        if let Some(handle) = self.tournaments.read().await.get(id)
            && !handle.is_closed()
        {
            return Ok(handle.clone());
        }

        let mut tournaments = self.tournaments.write().await;
        if let Some(handle) = tournaments.get(id)
            && !handle.is_closed()
        {
            return Ok(handle.clone());
        }

        let tournament = self.store.load(id).await.map_err(|e| match e {
            StoreError::NotFound(id) => EngineError::TournamentNotFound(id),
            other => other.into(),
        })?;
        let handle = self.start_actor(tournament).await;
        tournaments.insert(id.to_string(), handle.clone());
        Ok(handle)
    }

    /// Read-only copy of a tournament
    pub async fn snapshot(&self, id: &str) -> EngineResult<Tournament> {
        self.handle(id).await?.snapshot().await
    }

    /// List every stored tournament
    pub async fn list_tournaments(&self) -> EngineResult<Vec<TournamentSummary>> {
        let mut summaries = Vec::new();
        for id in self.store.list_ids().await? {
            summaries.push(self.store.load(&id).await?.summary());
        }
        Ok(summaries)
    }

    /// Attach a subscriber to every tournament, including ones spawned later
    pub async fn subscribe_all(&self, subscriber_id: &str, sender: mpsc::Sender<EventEnvelope>) {
        self.listeners
            .write()
            .await
            .insert(subscriber_id.to_string(), sender.clone());

        let tournaments = self.tournaments.read().await;
        for handle in tournaments.values() {
            let subscribe = TournamentMessage::Subscribe {
                subscriber_id: subscriber_id.to_string(),
                sender: sender.clone(),
            };
            if let Err(e) = handle.send(subscribe).await {
                log::debug!("Skipping {}: {}", handle.tournament_id(), e);
            }
        }
    }

    pub async fn unsubscribe_all(&self, subscriber_id: &str) {
        self.listeners.write().await.remove(subscriber_id);

        let tournaments = self.tournaments.read().await;
        for handle in tournaments.values() {
            let unsubscribe = TournamentMessage::Unsubscribe {
                subscriber_id: subscriber_id.to_string(),
            };
            let _ = handle.send(unsubscribe).await;
        }
    }

    /// Number of live tournament actors
    pub async fn active_count(&self) -> usize {
        self.tournaments
            .read()
            .await
            .values()
            .filter(|h| !h.is_closed())
            .count()
    }

    /// Stop every actor
    pub async fn shutdown(&self) {
        let handles: Vec<TournamentHandle> =
            self.tournaments.write().await.drain().map(|(_, h)| h).collect();

        for handle in handles {
            let (response, rx) = oneshot::channel();
            if handle.send(TournamentMessage::Close { response }).await.is_ok() {
                let _ = rx.await;
            }
        }
        log::info!("All tournament actors stopped");
    }

    pub async fn register(
        &self,
        id: &str,
        participant_id: ParticipantId,
        display_name: String,
    ) -> EngineResult<Participant> {
        self.handle(id)
            .await?
            .request(|response| TournamentMessage::Register {
                participant_id,
                display_name,
                response,
            })
            .await
    }

    pub async fn unregister(&self, id: &str, participant_id: ParticipantId) -> EngineResult<Participant> {
        self.handle(id)
            .await?
            .request(|response| TournamentMessage::Unregister {
                participant_id,
                response,
            })
            .await
    }

    pub async fn open_registration(&self, id: &str) -> EngineResult<()> {
        self.handle(id)
            .await?
            .request(|response| TournamentMessage::OpenRegistration { response })
            .await
    }

    pub async fn close_registration(&self, id: &str) -> EngineResult<BracketPlan> {
        self.handle(id)
            .await?
            .request(|response| TournamentMessage::CloseRegistration { response })
            .await
    }

    pub async fn assign_fixtures(&self, id: &str, round_index: usize) -> EngineResult<Vec<Fixture>> {
        self.handle(id)
            .await?
            .request(|response| TournamentMessage::AssignFixtures {
                round_index,
                response,
            })
            .await
    }

    pub async fn participant_post(
        &self,
        id: &str,
        match_id: String,
        participant_id: ParticipantId,
        timestamp: DateTime<Utc>,
    ) -> EngineResult<Match> {
        self.handle(id)
            .await?
            .request(|response| TournamentMessage::ParticipantPost {
                match_id,
                participant_id,
                timestamp,
                response,
            })
            .await
    }

    pub async fn channel_post(
        &self,
        id: &str,
        channel_id: String,
        participant_id: ParticipantId,
        timestamp: DateTime<Utc>,
    ) -> EngineResult<Match> {
        self.handle(id)
            .await?
            .request(|response| TournamentMessage::ChannelPost {
                channel_id,
                participant_id,
                timestamp,
                response,
            })
            .await
    }

    pub async fn open_vote(
        &self,
        id: &str,
        match_id: String,
        window: Option<Duration>,
    ) -> EngineResult<Match> {
        self.handle(id)
            .await?
            .request(|response| TournamentMessage::OpenVote {
                match_id,
                window,
                response,
            })
            .await
    }

    pub async fn cast_vote(
        &self,
        id: &str,
        match_id: String,
        voter_id: ParticipantId,
        choice: Side,
    ) -> EngineResult<VoteTally> {
        self.handle(id)
            .await?
            .request(|response| TournamentMessage::CastVote {
                match_id,
                voter_id,
                choice,
                response,
            })
            .await
    }

    pub async fn end_match(&self, id: &str, match_id: String, winner: Side) -> EngineResult<Match> {
        self.handle(id)
            .await?
            .request(|response| TournamentMessage::EndMatch {
                match_id,
                winner,
                response,
            })
            .await
    }

    pub async fn end_tournament(&self, id: &str) -> EngineResult<Option<ParticipantId>> {
        self.handle(id)
            .await?
            .request(|response| TournamentMessage::EndTournament { response })
            .await
    }
}

/// Trim entries, drop blanks and duplicates, keep the given order
fn clean_list(values: Vec<String>) -> Vec<String> {
    let mut cleaned: Vec<String> = Vec::with_capacity(values.len());
    for value in values {
        let value = value.trim();
        if !value.is_empty() && !cleaned.iter().any(|v| v == value) {
            cleaned.push(value.to_string());
        }
    }
    cleaned
}
