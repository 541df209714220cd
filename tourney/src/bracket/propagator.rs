//! Round propagation: moves decided winners into the next round.

use super::BracketPlan;
use crate::tournament::{Match, MatchId, ParticipantId, Round, Side, Tournament};
use serde::{Deserialize, Serialize};

/// A slot written by a propagation pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotFill {
    pub round_index: usize,
    pub match_id: MatchId,
    pub side: Side,
    pub participant_id: ParticipantId,
    /// Destination went from locked to pending
    pub unlocked: bool,
}

/// Result of a propagation pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropagationReport {
    pub filled: Vec<SlotFill>,
}

impl PropagationReport {
    pub fn is_empty(&self) -> bool {
        self.filled.is_empty()
    }
}

fn fill(dest: &mut Match, round_index: usize, side: Side, winner: &ParticipantId) -> Option<SlotFill> {
    let was_locked = dest.slot_p1.is_none() && dest.slot_p2.is_none();
    if !dest.fill_slot(side, winner.clone()) {
        return None;
    }

    Some(SlotFill {
        round_index,
        match_id: dest.id.clone(),
        side,
        participant_id: winner.clone(),
        unlocked: was_locked,
    })
}

/// Fold preliminary winners into round 1 of the main bracket.
///
/// Preliminary match `k` owns slot `first_open + k`, where `first_open` is
/// [`BracketPlan::first_open_slot`]. Slots filled at build time are never touched.
fn fold_in_prelims(
    plan: &BracketPlan,
    prelim: &Round,
    first_main: &mut Round,
    report: &mut PropagationReport,
) {
    let first_open = plan.first_open_slot();

    for (k, m) in prelim.matches.iter().enumerate() {
        let Some(winner) = m.winner_id() else {
            continue;
        };

        let slot = first_open + k;
        let Some(dest) = first_main.matches.get_mut(slot / 2) else {
            log::warn!("Prelim match {} has no destination slot {}", m.id, slot);
            continue;
        };

        if let Some(f) = fill(dest, first_main.index, Side::from_slot_index(slot), winner) {
            report.filled.push(f);
        }
    }
}

fn advance(from: &Round, to: &mut Round, report: &mut PropagationReport) {
    for (slot, m) in from.matches.iter().enumerate() {
        let Some(winner) = m.winner_id() else {
            continue;
        };
        let Some(dest) = to.matches.get_mut(slot / 2) else {
            continue;
        };

        if let Some(f) = fill(dest, to.index, Side::from_slot_index(slot), winner) {
            report.filled.push(f);
        }
    }
}

/// Propagate every decided winner one step forward.
///
/// Only empty destination slots are written, so running this again with no
/// new results is a no-op. Cascades through several rounds in one call.
pub fn propagate(tournament: &mut Tournament) -> PropagationReport {
    let mut report = PropagationReport::default();
    let main_start = usize::from(tournament.has_prelim());

    if main_start == 1 && tournament.rounds.len() > 1 {
        match BracketPlan::for_participants(tournament.participants.len()) {
            Ok(plan) => {
                let (prelim, rest) = tournament.rounds.split_at_mut(1);
                fold_in_prelims(&plan, &prelim[0], &mut rest[0], &mut report);
            }
            Err(e) => log::warn!("Skipping prelim fold-in for {}: {}", tournament.id, e),
        }
    }

    for r in main_start..tournament.rounds.len().saturating_sub(1) {
        let (head, tail) = tournament.rounds.split_at_mut(r + 1);
        advance(&head[r], &mut tail[0], &mut report);
    }

    if !report.is_empty() {
        log::debug!(
            "Propagated {} slot(s) in tournament {}",
            report.filled.len(),
            tournament.id
        );
    }

    report
}
