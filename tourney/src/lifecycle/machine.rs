//! Per-match lifecycle transitions.
//!
//! Every function here is synchronous and operates on one [`Match`]. The
//! actor decides *when* they run. These functions decide *whether* the
//! transition is legal, so a late timer or a duplicate command is rejected
//! here regardless of how it was scheduled.
//!
//! ```text
//! Locked --fill--> Pending --post--> Pending
//!                    |  \--threshold--> Voting --window--> Finished
//!                    |--deadline (timed out)--> Voting
//!  any non-Finished --organizer--> Finished
//! ```

use super::config::{LifecycleConfig, TieBreakPolicy};
use crate::tournament::{
    Match, MatchError, MatchState, ParticipantId, Resolution, Side, VoteReason,
};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, time::Duration};

/// Result of an accepted transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Advanced {
        actor: ParticipantId,
        reply_count: u32,
        deadline: DateTime<Utc>,
    },
    EnteredVoting {
        reason: VoteReason,
        closes_at: DateTime<Utc>,
    },
    Finished {
        winner: Side,
        resolution: Resolution,
    },
}

/// Votes per side
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteTally {
    pub p1: u32,
    pub p2: u32,
}

impl VoteTally {
    pub fn from_votes(votes: &BTreeMap<ParticipantId, Side>) -> Self {
        votes.values().fold(Self::default(), |mut tally, side| {
            match side {
                Side::P1 => tally.p1 += 1,
                Side::P2 => tally.p2 += 1,
            }
            tally
        })
    }

    /// Side with strictly more votes
    pub fn leader(&self) -> Option<Side> {
        match self.p1.cmp(&self.p2) {
            std::cmp::Ordering::Greater => Some(Side::P1),
            std::cmp::Ordering::Less => Some(Side::P2),
            std::cmp::Ordering::Equal => None,
        }
    }
}

pub(crate) fn deadline_after(now: DateTime<Utc>, wait: Duration) -> DateTime<Utc> {
    TimeDelta::from_std(wait)
        .ok()
        .and_then(|delta| now.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

fn ensure_open(m: &Match) -> Result<(), MatchError> {
    if m.is_finished() {
        return Err(MatchError::AlreadyDecided(m.id.clone()));
    }
    Ok(())
}

/// Accept a post from `actor`, enforcing alternating turns.
///
/// Resets the reply deadline on success. The post that reaches the
/// configured threshold moves the match to a vote instead.
pub fn record_post(
    m: &mut Match,
    actor: &str,
    at: DateTime<Utc>,
    config: &LifecycleConfig,
) -> Result<Transition, MatchError> {
    ensure_open(m)?;
    if m.side_of(actor).is_none() {
        return Err(MatchError::NotParticipant(actor.to_string()));
    }
    if !m.has_both_participants() {
        return Err(MatchError::AwaitingOpponent(m.id.clone()));
    }

    let MatchState::Pending {
        last_actor,
        reply_count,
        ..
    } = &m.state
    else {
        return Err(MatchError::AlreadyVoting(m.id.clone()));
    };

    if last_actor.as_deref() == Some(actor) {
        return Err(MatchError::NotYourTurn);
    }

    let reply_count = reply_count + 1;
    if reply_count >= config.reply_threshold {
        return open_vote(m, VoteReason::ReplyLimit, config.vote_window(), at);
    }

    let deadline = deadline_after(at, config.reply_timeout());
    m.state = MatchState::Pending {
        deadline: Some(deadline),
        last_actor: Some(actor.to_string()),
        reply_count,
    };
    m.generation += 1;

    Ok(Transition::Advanced {
        actor: actor.to_string(),
        reply_count,
        deadline,
    })
}

/// Open a vote window between the two participants
pub fn open_vote(
    m: &mut Match,
    reason: VoteReason,
    window: Duration,
    now: DateTime<Utc>,
) -> Result<Transition, MatchError> {
    ensure_open(m)?;
    if matches!(m.state, MatchState::Voting { .. }) {
        return Err(MatchError::AlreadyVoting(m.id.clone()));
    }
    if !m.has_both_participants() {
        return Err(MatchError::AwaitingOpponent(m.id.clone()));
    }

    let closes_at = deadline_after(now, window);
    m.state = MatchState::Voting {
        reason,
        closes_at,
        votes: BTreeMap::new(),
    };
    m.generation += 1;

    Ok(Transition::EnteredVoting { reason, closes_at })
}

/// The reply deadline passed without an answer: the match times out and
/// goes straight to a vote.
pub fn reply_deadline_elapsed(
    m: &mut Match,
    window: Duration,
    now: DateTime<Utc>,
) -> Result<Transition, MatchError> {
    ensure_open(m)?;
    let armed = matches!(
        m.state,
        MatchState::Pending {
            deadline: Some(_),
            ..
        }
    );
    if !armed {
        return Err(MatchError::VoteNotOpen(m.id.clone()));
    }

    open_vote(m, VoteReason::ReplyTimeout, window, now)
}

/// Record one ballot. Each voter gets exactly one.
pub fn cast_vote(m: &mut Match, voter: &str, choice: Side) -> Result<VoteTally, MatchError> {
    let id = m.id.clone();
    match &mut m.state {
        MatchState::Voting { votes, .. } => {
            if votes.contains_key(voter) {
                return Err(MatchError::AlreadyVoted);
            }
            votes.insert(voter.to_string(), choice);
            Ok(VoteTally::from_votes(votes))
        }
        MatchState::Finished { .. } => Err(MatchError::AlreadyDecided(id)),
        _ => Err(MatchError::VoteNotOpen(id)),
    }
}

/// Pick the winner of a tied vote.
///
/// `seeds` are the registration sequence numbers of the P1 and P2 occupants.
pub fn break_tie(policy: TieBreakPolicy, seeds: (u64, u64)) -> Side {
    match policy {
        TieBreakPolicy::FavorPlayerOne => Side::P1,
        TieBreakPolicy::FavorEarlierRegistrant => {
            if seeds.1 < seeds.0 {
                Side::P2
            } else {
                Side::P1
            }
        }
        TieBreakPolicy::Random => {
            if rand::random::<bool>() {
                Side::P1
            } else {
                Side::P2
            }
        }
    }
}

/// Close the vote window and finish the match with the majority choice
pub fn close_vote(
    m: &mut Match,
    policy: TieBreakPolicy,
    seeds: (u64, u64),
) -> Result<Transition, MatchError> {
    let MatchState::Voting { votes, .. } = &m.state else {
        ensure_open(m)?;
        return Err(MatchError::VoteNotOpen(m.id.clone()));
    };

    let tally = VoteTally::from_votes(votes);
    let (winner, tie_broken) = match tally.leader() {
        Some(side) => (side, false),
        None => (break_tie(policy, seeds), true),
    };

    let resolution = Resolution::Vote {
        p1_votes: tally.p1,
        p2_votes: tally.p2,
        tie_broken,
    };
    m.resolve(winner, resolution.clone())?;

    Ok(Transition::Finished { winner, resolution })
}

/// Organizer decision; wins over anything still in flight.
///
/// Both participants must be known. A match still waiting for the winner of
/// a feeding match cannot be decided, so nobody is eliminated unplayed.
pub fn decide(m: &mut Match, winner: Side) -> Result<Transition, MatchError> {
    ensure_open(m)?;
    if !m.has_both_participants() {
        return Err(MatchError::AwaitingOpponent(m.id.clone()));
    }

    m.resolve(winner, Resolution::Organizer)?;
    Ok(Transition::Finished {
        winner,
        resolution: Resolution::Organizer,
    })
}
