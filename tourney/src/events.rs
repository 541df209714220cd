//! Outbound engine events.
//!
//! Events are published after a mutation has been persisted. Delivery is
//! best effort: a slow or vanished subscriber never rolls back state.

use crate::{
    bracket::{BracketPlan, SlotFill},
    tournament::{
        Fixture, MatchId, ParticipantId, Resolution, Side, TournamentId, VoteReason,
    },
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    ParticipantRegistered {
        participant_id: ParticipantId,
        display_name: String,
        participant_count: usize,
    },
    ParticipantUnregistered {
        participant_id: ParticipantId,
        participant_count: usize,
    },
    RegistrationOpened {
        max_participants: usize,
    },
    BracketBuilt {
        plan: BracketPlan,
    },
    FixtureAssigned {
        fixture: Fixture,
    },
    /// Both participants of a match are known and it can be played
    MatchOpened {
        match_id: MatchId,
        p1: ParticipantId,
        p2: ParticipantId,
    },
    /// A post was accepted; the other side must reply before `new_deadline`
    MatchAdvanced {
        match_id: MatchId,
        actor: ParticipantId,
        reply_count: u32,
        new_deadline: DateTime<Utc>,
    },
    MatchTimedOut {
        match_id: MatchId,
        waiting_on: Option<ParticipantId>,
    },
    MatchEnteredVoting {
        match_id: MatchId,
        reason: VoteReason,
        closes_at: DateTime<Utc>,
    },
    MatchFinished {
        match_id: MatchId,
        winner: Side,
        winner_id: ParticipantId,
        resolution: Resolution,
    },
    RoundPropagated {
        filled: Vec<SlotFill>,
    },
    TournamentFinished {
        champion: Option<ParticipantId>,
    },
}

impl EngineEvent {
    /// Stable snake_case name, the same as the serialized `type` tag
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ParticipantRegistered { .. } => "participant_registered",
            Self::ParticipantUnregistered { .. } => "participant_unregistered",
            Self::RegistrationOpened { .. } => "registration_opened",
            Self::BracketBuilt { .. } => "bracket_built",
            Self::FixtureAssigned { .. } => "fixture_assigned",
            Self::MatchOpened { .. } => "match_opened",
            Self::MatchAdvanced { .. } => "match_advanced",
            Self::MatchTimedOut { .. } => "match_timed_out",
            Self::MatchEnteredVoting { .. } => "match_entered_voting",
            Self::MatchFinished { .. } => "match_finished",
            Self::RoundPropagated { .. } => "round_propagated",
            Self::TournamentFinished { .. } => "tournament_finished",
        }
    }

    /// Named channel binding the event is announced in, see
    /// [`ChannelBindings::require`](crate::lifecycle::ChannelBindings::require)
    pub fn binding(&self) -> &'static str {
        match self {
            Self::ParticipantRegistered { .. }
            | Self::ParticipantUnregistered { .. }
            | Self::RegistrationOpened { .. } => "registration",
            Self::BracketBuilt { .. } | Self::FixtureAssigned { .. } | Self::RoundPropagated { .. } => {
                "bracket"
            }
            Self::MatchEnteredVoting { .. } => "vote",
            Self::MatchOpened { .. }
            | Self::MatchAdvanced { .. }
            | Self::MatchTimedOut { .. }
            | Self::MatchFinished { .. }
            | Self::TournamentFinished { .. } => "announce",
        }
    }
}

impl fmt::Display for EngineEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::ParticipantRegistered {
                display_name,
                participant_count,
                ..
            } => format!("{display_name} registered ({participant_count} in)"),
            Self::ParticipantUnregistered {
                participant_id,
                participant_count,
            } => format!("{participant_id} unregistered ({participant_count} left)"),
            Self::RegistrationOpened { max_participants } => match max_participants {
                0 => "registration is open".to_string(),
                max => format!("registration is open ({max} spots)"),
            },
            Self::BracketBuilt { plan } => format!(
                "bracket built for {} participants ({} prelim matches)",
                plan.participant_count,
                plan.prelim_matches()
            ),
            Self::FixtureAssigned { fixture } => {
                format!("{} will be played in {}", fixture.match_id, fixture.channel_id)
            }
            Self::MatchOpened { match_id, p1, p2 } => format!("{match_id}: {p1} vs {p2}"),
            Self::MatchAdvanced {
                match_id,
                actor,
                new_deadline,
                ..
            } => format!("{match_id}: {actor} replied, next reply due by {new_deadline}"),
            Self::MatchTimedOut {
                match_id,
                waiting_on,
            } => match waiting_on {
                Some(id) => format!("{match_id}: {id} ran out of time"),
                None => format!("{match_id}: reply deadline passed"),
            },
            Self::MatchEnteredVoting {
                match_id,
                closes_at,
                ..
            } => format!("{match_id}: voting open until {closes_at}"),
            Self::MatchFinished {
                match_id,
                winner_id,
                ..
            } => format!("{match_id}: {winner_id} wins"),
            Self::RoundPropagated { filled } => {
                format!("{} winner(s) moved to the next round", filled.len())
            }
            Self::TournamentFinished { champion } => match champion {
                Some(id) => format!("{id} is the champion"),
                None => "tournament ended without a champion".to_string(),
            },
        };
        write!(f, "{repr}")
    }
}

/// Event tagged with the tournament it belongs to
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub tournament_id: TournamentId,
    pub event: EngineEvent,
}

impl fmt::Display for EventEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.tournament_id, self.event)
    }
}
