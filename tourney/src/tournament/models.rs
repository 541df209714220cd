//! Tournament data models: participants, rounds and matches.

use super::errors::MatchError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt, str::FromStr};

/// Tournament ID type
pub type TournamentId = String;

/// Participant ID type (stable identity from the messaging platform)
pub type ParticipantId = String;

/// Match ID type (`P1`, `R1M2`, ...)
pub type MatchId = String;

/// One of the two slots of a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    P1,
    P2,
}

impl Side {
    /// Slot `i` of a round feeds position `i mod 2` of the next match.
    pub fn from_slot_index(slot: usize) -> Self {
        if slot % 2 == 0 { Side::P1 } else { Side::P2 }
    }

    pub fn other(self) -> Self {
        match self {
            Side::P1 => Side::P2,
            Side::P2 => Side::P1,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::P1 => write!(f, "p1"),
            Side::P2 => write!(f, "p2"),
        }
    }
}

impl FromStr for Side {
    type Err = MatchError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        match token.trim().to_ascii_lowercase().as_str() {
            "p1" | "1" => Ok(Side::P1),
            "p2" | "2" => Ok(Side::P2),
            _ => Err(MatchError::InvalidWinnerToken(token.to_string())),
        }
    }
}

/// Registered participant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    /// Stable participant ID
    pub id: ParticipantId,
    /// Name shown in announcements
    pub display_name: String,
    /// Registration timestamp
    pub joined_at: DateTime<Utc>,
    /// Monotonic registration sequence number
    pub seq: u64,
}

/// Tournament status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TournamentStatus {
    /// Accepting registrations
    Registration,
    /// Bracket built, matches being played
    Running,
    /// Champion decided or ended by an organizer
    Finished,
}

impl fmt::Display for TournamentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TournamentStatus::Registration => write!(f, "registration"),
            TournamentStatus::Running => write!(f, "running"),
            TournamentStatus::Finished => write!(f, "finished"),
        }
    }
}

/// Why a vote window was opened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteReason {
    /// Opened by an organizer command
    Organizer,
    /// Participants exchanged the configured number of posts
    ReplyLimit,
    /// A participant failed to reply before the deadline
    ReplyTimeout,
}

/// How a finished match was decided
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Resolution {
    /// Only one participant was ever assigned
    Bye,
    /// Organizer decision
    Organizer,
    /// Community vote; `tie_broken` is set when the tie-break policy picked the winner
    Vote {
        p1_votes: u32,
        p2_votes: u32,
        tie_broken: bool,
    },
}

/// Per-match lifecycle state, each variant carrying only what it needs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MatchState {
    /// Both slots empty
    Locked,
    /// At least one participant known; posts alternate between the two sides
    Pending {
        deadline: Option<DateTime<Utc>>,
        last_actor: Option<ParticipantId>,
        reply_count: u32,
    },
    /// Vote window open
    Voting {
        reason: VoteReason,
        closes_at: DateTime<Utc>,
        votes: BTreeMap<ParticipantId, Side>,
    },
    /// Terminal; the winner never changes
    Finished { winner: Side, resolution: Resolution },
}

impl MatchState {
    pub(crate) fn pending() -> Self {
        MatchState::Pending {
            deadline: None,
            last_actor: None,
            reply_count: 0,
        }
    }
}

/// Flat view of [`MatchState`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Locked,
    Pending,
    Voting,
    Finished,
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchStatus::Locked => write!(f, "locked"),
            MatchStatus::Pending => write!(f, "pending"),
            MatchStatus::Voting => write!(f, "voting"),
            MatchStatus::Finished => write!(f, "finished"),
        }
    }
}

/// A single bracket match
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    pub id: MatchId,
    pub slot_p1: Option<ParticipantId>,
    pub slot_p2: Option<ParticipantId>,
    pub state: MatchState,
    /// Bumped on every lifecycle transition; timers armed for an older
    /// generation are ignored when they fire.
    pub generation: u64,
    /// Battle channel assigned by fixture assignment
    pub channel_id: Option<String>,
}

impl Match {
    pub(crate) fn new(
        id: MatchId,
        slot_p1: Option<ParticipantId>,
        slot_p2: Option<ParticipantId>,
    ) -> Self {
        let state = if slot_p1.is_some() || slot_p2.is_some() {
            MatchState::pending()
        } else {
            MatchState::Locked
        };

        Self {
            id,
            slot_p1,
            slot_p2,
            state,
            generation: 0,
            channel_id: None,
        }
    }

    pub fn status(&self) -> MatchStatus {
        match self.state {
            MatchState::Locked => MatchStatus::Locked,
            MatchState::Pending { .. } => MatchStatus::Pending,
            MatchState::Voting { .. } => MatchStatus::Voting,
            MatchState::Finished { .. } => MatchStatus::Finished,
        }
    }

    pub fn slot(&self, side: Side) -> Option<&ParticipantId> {
        match side {
            Side::P1 => self.slot_p1.as_ref(),
            Side::P2 => self.slot_p2.as_ref(),
        }
    }

    pub fn winner(&self) -> Option<Side> {
        match self.state {
            MatchState::Finished { winner, .. } => Some(winner),
            _ => None,
        }
    }

    pub fn winner_id(&self) -> Option<&ParticipantId> {
        self.winner().and_then(|side| self.slot(side))
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.state, MatchState::Finished { .. })
    }

    pub fn has_both_participants(&self) -> bool {
        self.slot_p1.is_some() && self.slot_p2.is_some()
    }

    /// Which side `participant_id` plays on, if any
    pub fn side_of(&self, participant_id: &str) -> Option<Side> {
        if self.slot_p1.as_deref() == Some(participant_id) {
            Some(Side::P1)
        } else if self.slot_p2.as_deref() == Some(participant_id) {
            Some(Side::P2)
        } else {
            None
        }
    }

    /// Write `participant_id` into an empty slot.
    ///
    /// Returns `false` without touching the match when the slot is already
    /// occupied. A locked match becomes pending once a slot is filled.
    pub(crate) fn fill_slot(&mut self, side: Side, participant_id: ParticipantId) -> bool {
        let slot = match side {
            Side::P1 => &mut self.slot_p1,
            Side::P2 => &mut self.slot_p2,
        };
        if slot.is_some() {
            return false;
        }
        *slot = Some(participant_id);

        if matches!(self.state, MatchState::Locked) {
            self.state = MatchState::pending();
            self.generation += 1;
        }
        true
    }

    /// Set the winner. The only path into [`MatchState::Finished`].
    pub(crate) fn resolve(&mut self, winner: Side, resolution: Resolution) -> Result<(), MatchError> {
        if self.is_finished() {
            return Err(MatchError::AlreadyDecided(self.id.clone()));
        }
        if self.slot(winner).is_none() {
            return Err(MatchError::EmptySlot(winner));
        }

        self.state = MatchState::Finished { winner, resolution };
        self.generation += 1;
        Ok(())
    }
}

/// A bracket round
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Round {
    /// Position in [`Tournament::rounds`]
    pub index: usize,
    /// Preliminary round trimming the field to a power of two
    pub is_prelim: bool,
    pub matches: Vec<Match>,
}

/// Fixture: a match bound to a battle channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fixture {
    pub match_id: MatchId,
    pub channel_id: String,
    pub p1: Option<ParticipantId>,
    pub p2: Option<ParticipantId>,
}

/// Tournament aggregate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tournament {
    /// Tournament ID
    pub id: TournamentId,
    /// Tournament name
    pub name: String,
    /// Current status
    pub status: TournamentStatus,
    /// Participants in registration order
    pub participants: Vec<Participant>,
    /// Preliminary round (if any) followed by the main bracket rounds
    pub rounds: Vec<Round>,
    /// Participant cap, 0 means unlimited
    pub max_participants: usize,
    /// Created at timestamp
    pub created_at: DateTime<Utc>,
    /// Registration closed at timestamp
    pub started_at: Option<DateTime<Utc>>,
    /// Finished at timestamp
    pub finished_at: Option<DateTime<Utc>>,
    /// Winner of the final match
    pub champion: Option<ParticipantId>,
    #[serde(default)]
    pub(crate) next_seq: u64,
}

impl Tournament {
    /// Create an empty tournament open for registration
    pub fn new(id: TournamentId, name: String, max_participants: usize) -> Self {
        Self {
            id,
            name,
            status: TournamentStatus::Registration,
            participants: Vec::new(),
            rounds: Vec::new(),
            max_participants,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            champion: None,
            next_seq: 0,
        }
    }

    pub fn participant(&self, participant_id: &str) -> Option<&Participant> {
        self.participants.iter().find(|p| p.id == participant_id)
    }

    /// Display name for a participant, falling back to the raw ID
    pub fn display_name<'a>(&'a self, participant_id: &'a str) -> &'a str {
        self.participant(participant_id)
            .map(|p| p.display_name.as_str())
            .unwrap_or(participant_id)
    }

    pub fn has_prelim(&self) -> bool {
        self.rounds.first().is_some_and(|r| r.is_prelim)
    }

    /// Rounds after the preliminary round
    pub fn main_rounds(&self) -> &[Round] {
        if self.has_prelim() {
            &self.rounds[1..]
        } else {
            &self.rounds
        }
    }

    /// The single match of the last round
    pub fn final_match(&self) -> Option<&Match> {
        self.rounds.last().and_then(|r| r.matches.first())
    }

    pub fn matches(&self) -> impl Iterator<Item = &Match> {
        self.rounds.iter().flat_map(|r| r.matches.iter())
    }

    pub fn find_match(&self, match_id: &str) -> Option<&Match> {
        self.matches().find(|m| m.id == match_id)
    }

    pub(crate) fn find_match_mut(&mut self, match_id: &str) -> Result<&mut Match, MatchError> {
        self.rounds
            .iter_mut()
            .flat_map(|r| r.matches.iter_mut())
            .find(|m| m.id == match_id)
            .ok_or_else(|| MatchError::NotFound(match_id.to_string()))
    }

    /// Unfinished match bound to a battle channel
    pub fn match_in_channel(&self, channel_id: &str) -> Option<&Match> {
        self.matches()
            .find(|m| !m.is_finished() && m.channel_id.as_deref() == Some(channel_id))
    }

    pub fn summary(&self) -> TournamentSummary {
        TournamentSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            status: self.status,
            participant_count: self.participants.len(),
            max_participants: self.max_participants,
            round_count: self.rounds.len(),
            has_prelim: self.has_prelim(),
            champion: self.champion.clone(),
            created_at: self.created_at,
        }
    }
}

/// Tournament listing entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TournamentSummary {
    pub id: TournamentId,
    pub name: String,
    pub status: TournamentStatus,
    pub participant_count: usize,
    pub max_participants: usize,
    pub round_count: usize,
    pub has_prelim: bool,
    pub champion: Option<ParticipantId>,
    pub created_at: DateTime<Utc>,
}
