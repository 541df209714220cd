//! Tournament actor message types.

use super::machine::VoteTally;
use crate::{
    bracket::BracketPlan,
    events::EventEnvelope,
    tournament::{
        EngineResult, Fixture, Match, MatchId, Participant, ParticipantId, Side, Tournament,
    },
};
use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

/// One-shot reply channel carried by request messages
pub type Reply<T> = oneshot::Sender<EngineResult<T>>;

/// Which timer fired
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    ReplyDeadline,
    VoteWindow,
}

/// Messages that can be sent to a TournamentActor
#[derive(Debug)]
pub enum TournamentMessage {
    Register {
        participant_id: ParticipantId,
        display_name: String,
        response: Reply<Participant>,
    },

    Unregister {
        participant_id: ParticipantId,
        response: Reply<Participant>,
    },

    /// Announce open registration (organizer)
    OpenRegistration { response: Reply<()> },

    /// Freeze participants and build the bracket (organizer)
    CloseRegistration { response: Reply<BracketPlan> },

    /// Bind a round's matches to battle channels (organizer)
    AssignFixtures {
        round_index: usize,
        response: Reply<Vec<Fixture>>,
    },

    ParticipantPost {
        match_id: MatchId,
        participant_id: ParticipantId,
        timestamp: DateTime<Utc>,
        response: Reply<Match>,
    },

    ChannelPost {
        channel_id: String,
        participant_id: ParticipantId,
        timestamp: DateTime<Utc>,
        response: Reply<Match>,
    },

    /// Open a vote window (organizer); `None` uses the configured length
    OpenVote {
        match_id: MatchId,
        window: Option<Duration>,
        response: Reply<Match>,
    },

    CastVote {
        match_id: MatchId,
        voter_id: ParticipantId,
        choice: Side,
        response: Reply<VoteTally>,
    },

    /// Decide a match (organizer)
    EndMatch {
        match_id: MatchId,
        winner: Side,
        response: Reply<Match>,
    },

    /// Finish the tournament (organizer)
    EndTournament {
        response: Reply<Option<ParticipantId>>,
    },

    /// Read-only copy of the aggregate
    GetSnapshot { response: oneshot::Sender<Tournament> },

    /// Internal: a scheduled timer elapsed
    TimerFired {
        match_id: MatchId,
        generation: u64,
        kind: TimerKind,
    },

    /// Subscribe to engine events
    Subscribe {
        subscriber_id: String,
        sender: mpsc::Sender<EventEnvelope>,
    },

    /// Unsubscribe from engine events
    Unsubscribe { subscriber_id: String },

    /// Stop the actor and cancel its timers
    Close { response: oneshot::Sender<()> },
}
