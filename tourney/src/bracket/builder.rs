//! Bracket construction for an arbitrary participant count.
//!
//! The main bracket is the largest power of two `T <= N`. The surplus
//! `N - T` is trimmed by a preliminary round played by the last `2 (N - T)`
//! registrants; everyone before them qualifies directly (first come, first
//! served byes).

use super::propagator::propagate;
use crate::tournament::{
    BuildError, Match, Participant, Resolution, Round, Side, Tournament, TournamentStatus,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Shape of a bracket for a given participant count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BracketPlan {
    /// Number of registered participants (N)
    pub participant_count: usize,
    /// Main bracket size, largest power of two <= N (T)
    pub main_size: usize,
    /// Participants routed to the preliminary round (P = 2 (N - T))
    pub prelim_players: usize,
}

impl BracketPlan {
    pub fn for_participants(count: usize) -> Result<Self, BuildError> {
        if count < 2 {
            return Err(BuildError::InsufficientParticipants { count });
        }

        let main_size = 1usize << (usize::BITS - 1 - count.leading_zeros());
        Ok(Self {
            participant_count: count,
            main_size,
            prelim_players: 2 * (count - main_size),
        })
    }

    pub fn has_prelim(&self) -> bool {
        self.prelim_players > 0
    }

    pub fn prelim_matches(&self) -> usize {
        self.prelim_players / 2
    }

    /// Participants seeded straight into the main bracket
    pub fn direct_count(&self) -> usize {
        self.participant_count - self.prelim_players
    }

    /// Number of main bracket rounds (sizes T/2, T/4, ..., 1 matches)
    pub fn main_round_count(&self) -> usize {
        self.main_size.trailing_zeros() as usize
    }

    /// First round-1 slot left open for preliminary winners
    pub fn first_open_slot(&self) -> usize {
        self.direct_count()
    }
}

fn prelim_match_id(index: usize) -> String {
    format!("P{}", index + 1)
}

fn main_match_id(round: usize, index: usize) -> String {
    format!("R{}M{}", round + 1, index + 1)
}

fn build_prelim_round(entrants: &[Participant]) -> Round {
    let matches = entrants
        .chunks(2)
        .enumerate()
        .map(|(i, pair)| {
            let p1 = pair.first().map(|p| p.id.clone());
            let p2 = pair.get(1).map(|p| p.id.clone());
            let mut m = Match::new(prelim_match_id(i), p1, p2);

            if !m.has_both_participants() {
                // Lone entrant advances without playing
                if let Err(e) = m.resolve(Side::P1, Resolution::Bye) {
                    log::error!("Failed to resolve bye for {}: {}", m.id, e);
                }
            }
            m
        })
        .collect();

    Round {
        index: 0,
        is_prelim: true,
        matches,
    }
}

/// Build the full round tree from the frozen participant list.
///
/// Writes the rounds into `tournament` in one assignment and moves it to
/// [`TournamentStatus::Running`]. Only round 1 of the main bracket is seeded;
/// every later slot is filled by propagation.
pub fn build_bracket(
    tournament: &mut Tournament,
    now: DateTime<Utc>,
) -> Result<BracketPlan, BuildError> {
    let plan = BracketPlan::for_participants(tournament.participants.len())?;
    let (direct, prelim) = tournament.participants.split_at(plan.direct_count());

    let mut rounds = Vec::with_capacity(plan.main_round_count() + 1);
    if plan.has_prelim() {
        rounds.push(build_prelim_round(prelim));
    }

    let mut slots: Vec<Option<String>> = direct.iter().map(|p| Some(p.id.clone())).collect();
    slots.resize(plan.main_size, None);

    let first_round = slots
        .chunks(2)
        .enumerate()
        .map(|(i, pair)| Match::new(main_match_id(0, i), pair[0].clone(), pair[1].clone()))
        .collect();
    rounds.push(Round {
        index: rounds.len(),
        is_prelim: false,
        matches: first_round,
    });

    let mut size = plan.main_size / 2;
    let mut main_round = 1;
    while size > 1 {
        size /= 2;
        let matches = (0..size)
            .map(|i| Match::new(main_match_id(main_round, i), None, None))
            .collect();
        rounds.push(Round {
            index: rounds.len(),
            is_prelim: false,
            matches,
        });
        main_round += 1;
    }

    tournament.rounds = rounds;
    tournament.status = TournamentStatus::Running;
    tournament.started_at = Some(now);

    // Byes resolved above are folded into round 1 straight away
    propagate(tournament);

    log::info!(
        "Built bracket for tournament {}: {} participants, main size {}, {} prelim matches",
        tournament.id,
        plan.participant_count,
        plan.main_size,
        plan.prelim_matches()
    );

    Ok(plan)
}
