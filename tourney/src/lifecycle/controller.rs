//! Tournament-level operations.
//!
//! Each operation mutates a [`Tournament`] in place and appends the events it
//! caused. Nothing here performs I/O: the actor runs these against a working
//! copy, persists the copy, and only then commits it and publishes events.

use super::{
    config::{ChannelBindings, LifecycleConfig},
    machine::{self, Transition, VoteTally},
};
use crate::{
    bracket::{BracketPlan, PropagationReport, build_bracket, propagate},
    events::EngineEvent,
    tournament::{
        ConfigurationError, EngineError, EngineResult, Fixture, Match, MatchError, MatchState,
        Participant, ParticipantId, Side, Tournament, TournamentStatus, VoteReason,
    },
};
use chrono::{DateTime, Utc};
use std::time::Duration;

fn require_status(t: &Tournament, expected: TournamentStatus) -> EngineResult<()> {
    if t.status != expected {
        return Err(EngineError::InvalidState {
            expected,
            actual: t.status,
        });
    }
    Ok(())
}

fn match_snapshot(t: &Tournament, match_id: &str) -> EngineResult<Match> {
    t.find_match(match_id)
        .cloned()
        .ok_or_else(|| MatchError::NotFound(match_id.to_string()).into())
}

/// Registration sequence numbers of the two slot occupants
fn seeds(t: &Tournament, m: &Match) -> (u64, u64) {
    let seq = |slot: Option<&ParticipantId>| {
        slot.and_then(|id| t.participant(id))
            .map_or(u64::MAX, |p| p.seq)
    };
    (seq(m.slot(Side::P1)), seq(m.slot(Side::P2)))
}

fn opened_event(m: &Match) -> Option<EngineEvent> {
    match (&m.slot_p1, &m.slot_p2, &m.state) {
        (Some(p1), Some(p2), MatchState::Pending { reply_count: 0, .. }) => {
            Some(EngineEvent::MatchOpened {
                match_id: m.id.clone(),
                p1: p1.clone(),
                p2: p2.clone(),
            })
        }
        _ => None,
    }
}

fn emit_propagation(t: &Tournament, report: PropagationReport, events: &mut Vec<EngineEvent>) {
    if report.is_empty() {
        return;
    }

    let opened: Vec<EngineEvent> = report
        .filled
        .iter()
        .filter_map(|fill| t.find_match(&fill.match_id))
        .filter_map(opened_event)
        .collect();

    events.push(EngineEvent::RoundPropagated {
        filled: report.filled,
    });
    events.extend(opened);
}

fn finish_tournament(t: &mut Tournament, now: DateTime<Utc>, events: &mut Vec<EngineEvent>) {
    t.champion = t.final_match().and_then(|m| m.winner_id()).cloned();
    t.status = TournamentStatus::Finished;
    t.finished_at = Some(now);

    log::info!(
        "Tournament {} finished, champion: {}",
        t.id,
        t.champion.as_deref().unwrap_or("none")
    );
    events.push(EngineEvent::TournamentFinished {
        champion: t.champion.clone(),
    });
}

/// Announce a finished match, move its winner forward and close the
/// tournament once the final is decided.
fn after_resolution(
    t: &mut Tournament,
    match_id: &str,
    now: DateTime<Utc>,
    events: &mut Vec<EngineEvent>,
) -> EngineResult<()> {
    let m = t
        .find_match(match_id)
        .ok_or_else(|| MatchError::NotFound(match_id.to_string()))?;

    if let MatchState::Finished { winner, resolution } = &m.state {
        let winner_id = m.slot(*winner).cloned().unwrap_or_default();
        log::info!(
            "Tournament {}: match {} won by {} ({:?})",
            t.id,
            match_id,
            winner_id,
            resolution
        );
        events.push(EngineEvent::MatchFinished {
            match_id: match_id.to_string(),
            winner: *winner,
            winner_id,
            resolution: resolution.clone(),
        });
    }

    let report = propagate(t);
    emit_propagation(t, report, events);

    if t.final_match().is_some_and(Match::is_finished) {
        finish_tournament(t, now, events);
    }
    Ok(())
}

fn apply_transition(
    t: &mut Tournament,
    match_id: &str,
    transition: Transition,
    now: DateTime<Utc>,
    events: &mut Vec<EngineEvent>,
) -> EngineResult<()> {
    match transition {
        Transition::Advanced {
            actor,
            reply_count,
            deadline,
        } => {
            events.push(EngineEvent::MatchAdvanced {
                match_id: match_id.to_string(),
                actor,
                reply_count,
                new_deadline: deadline,
            });
            Ok(())
        }
        Transition::EnteredVoting { reason, closes_at } => {
            events.push(EngineEvent::MatchEnteredVoting {
                match_id: match_id.to_string(),
                reason,
                closes_at,
            });
            Ok(())
        }
        Transition::Finished { .. } => after_resolution(t, match_id, now, events),
    }
}

pub fn register(
    t: &mut Tournament,
    participant_id: ParticipantId,
    display_name: String,
    now: DateTime<Utc>,
    events: &mut Vec<EngineEvent>,
) -> EngineResult<Participant> {
    let participant = t.register(participant_id, display_name, now)?.clone();

    events.push(EngineEvent::ParticipantRegistered {
        participant_id: participant.id.clone(),
        display_name: participant.display_name.clone(),
        participant_count: t.participants.len(),
    });
    Ok(participant)
}

pub fn unregister(
    t: &mut Tournament,
    participant_id: &str,
    events: &mut Vec<EngineEvent>,
) -> EngineResult<Participant> {
    let participant = t.unregister(participant_id)?;

    events.push(EngineEvent::ParticipantUnregistered {
        participant_id: participant.id.clone(),
        participant_count: t.participants.len(),
    });
    Ok(participant)
}

/// Announce that registration is open. Never reverses a running tournament.
pub fn open_registration(t: &Tournament, events: &mut Vec<EngineEvent>) -> EngineResult<()> {
    require_status(t, TournamentStatus::Registration)?;

    events.push(EngineEvent::RegistrationOpened {
        max_participants: t.max_participants,
    });
    Ok(())
}

/// Freeze the participant list and build the bracket
pub fn close_registration(
    t: &mut Tournament,
    now: DateTime<Utc>,
    events: &mut Vec<EngineEvent>,
) -> EngineResult<BracketPlan> {
    require_status(t, TournamentStatus::Registration)?;
    let plan = build_bracket(t, now)?;

    events.push(EngineEvent::BracketBuilt { plan });
    events.extend(t.matches().filter_map(opened_event));

    if t.final_match().is_some_and(Match::is_finished) {
        finish_tournament(t, now, events);
    }
    Ok(plan)
}

/// Bind every unassigned match of `round_index` to a battle channel,
/// round-robin over the configured channels.
///
/// `round_index` indexes [`Tournament::rounds`], so the preliminary round,
/// when present, is round 0.
pub fn assign_fixtures(
    t: &mut Tournament,
    round_index: usize,
    channels: &ChannelBindings,
    events: &mut Vec<EngineEvent>,
) -> EngineResult<Vec<Fixture>> {
    require_status(t, TournamentStatus::Running)?;
    let round = t
        .rounds
        .get_mut(round_index)
        .ok_or(EngineError::RoundNotFound(round_index))?;

    let battle = &channels.battle_channels;
    if battle.is_empty() {
        return Err(ConfigurationError::NoBattleChannels.into());
    }

    let mut fixtures = Vec::new();
    for (i, m) in round.matches.iter_mut().enumerate() {
        if m.is_finished() || m.channel_id.is_some() {
            continue;
        }

        let channel_id = battle[i % battle.len()].clone();
        m.channel_id = Some(channel_id.clone());
        fixtures.push(Fixture {
            match_id: m.id.clone(),
            channel_id,
            p1: m.slot_p1.clone(),
            p2: m.slot_p2.clone(),
        });
    }

    events.extend(fixtures.iter().map(|fixture| EngineEvent::FixtureAssigned {
        fixture: fixture.clone(),
    }));
    Ok(fixtures)
}

/// A participant posted in their match
pub fn participant_post(
    t: &mut Tournament,
    match_id: &str,
    actor: &str,
    at: DateTime<Utc>,
    config: &LifecycleConfig,
    events: &mut Vec<EngineEvent>,
) -> EngineResult<Match> {
    require_status(t, TournamentStatus::Running)?;
    let transition = machine::record_post(t.find_match_mut(match_id)?, actor, at, config)?;

    apply_transition(t, match_id, transition, at, events)?;
    match_snapshot(t, match_id)
}

/// A participant posted in a battle channel; routed to the match bound to it
pub fn channel_post(
    t: &mut Tournament,
    channel_id: &str,
    actor: &str,
    at: DateTime<Utc>,
    config: &LifecycleConfig,
    events: &mut Vec<EngineEvent>,
) -> EngineResult<Match> {
    require_status(t, TournamentStatus::Running)?;
    let match_id = t
        .match_in_channel(channel_id)
        .map(|m| m.id.clone())
        .ok_or_else(|| MatchError::NotFound(format!("in channel {channel_id}")))?;

    participant_post(t, &match_id, actor, at, config, events)
}

/// Organizer opens a vote window, using the configured length unless given
pub fn open_vote(
    t: &mut Tournament,
    match_id: &str,
    window: Option<Duration>,
    now: DateTime<Utc>,
    config: &LifecycleConfig,
    events: &mut Vec<EngineEvent>,
) -> EngineResult<Match> {
    require_status(t, TournamentStatus::Running)?;
    let window = window.unwrap_or_else(|| config.vote_window());
    let transition = machine::open_vote(
        t.find_match_mut(match_id)?,
        VoteReason::Organizer,
        window,
        now,
    )?;

    apply_transition(t, match_id, transition, now, events)?;
    match_snapshot(t, match_id)
}

pub fn cast_vote(
    t: &mut Tournament,
    match_id: &str,
    voter_id: &str,
    choice: Side,
) -> EngineResult<VoteTally> {
    require_status(t, TournamentStatus::Running)?;
    Ok(machine::cast_vote(
        t.find_match_mut(match_id)?,
        voter_id,
        choice,
    )?)
}

/// Organizer decides a match
pub fn end_match(
    t: &mut Tournament,
    match_id: &str,
    winner: Side,
    now: DateTime<Utc>,
    events: &mut Vec<EngineEvent>,
) -> EngineResult<Match> {
    require_status(t, TournamentStatus::Running)?;
    let transition = machine::decide(t.find_match_mut(match_id)?, winner)?;

    apply_transition(t, match_id, transition, now, events)?;
    match_snapshot(t, match_id)
}

/// Organizer ends the tournament early (or confirms a finished bracket)
pub fn end_tournament(
    t: &mut Tournament,
    now: DateTime<Utc>,
    events: &mut Vec<EngineEvent>,
) -> EngineResult<Option<ParticipantId>> {
    if t.status == TournamentStatus::Finished {
        return Err(EngineError::InvalidState {
            expected: TournamentStatus::Running,
            actual: TournamentStatus::Finished,
        });
    }

    finish_tournament(t, now, events);
    Ok(t.champion.clone())
}

/// Reply deadline timer fired.
///
/// Returns `false` when the timer was stale: the match moved on (its
/// generation changed) or the tournament is no longer running.
pub fn reply_deadline_elapsed(
    t: &mut Tournament,
    match_id: &str,
    generation: u64,
    now: DateTime<Utc>,
    config: &LifecycleConfig,
    events: &mut Vec<EngineEvent>,
) -> EngineResult<bool> {
    if t.status != TournamentStatus::Running {
        return Ok(false);
    }
    let m = t.find_match_mut(match_id)?;
    if m.generation != generation {
        log::debug!(
            "Stale reply deadline for {} (generation {} != {})",
            match_id,
            generation,
            m.generation
        );
        return Ok(false);
    }

    let waiting_on = match &m.state {
        MatchState::Pending {
            last_actor: Some(actor),
            ..
        } => m
            .side_of(actor)
            .and_then(|side| m.slot(side.other()))
            .cloned(),
        _ => None,
    };

    let transition = match machine::reply_deadline_elapsed(m, config.vote_window(), now) {
        Ok(transition) => transition,
        Err(e) => {
            log::debug!("Ignoring reply deadline for {}: {}", match_id, e);
            return Ok(false);
        }
    };

    events.push(EngineEvent::MatchTimedOut {
        match_id: match_id.to_string(),
        waiting_on,
    });
    apply_transition(t, match_id, transition, now, events)?;
    Ok(true)
}

/// Vote window timer fired: tally and finish the match
pub fn vote_window_elapsed(
    t: &mut Tournament,
    match_id: &str,
    generation: u64,
    now: DateTime<Utc>,
    config: &LifecycleConfig,
    events: &mut Vec<EngineEvent>,
) -> EngineResult<bool> {
    if t.status != TournamentStatus::Running {
        return Ok(false);
    }
    let m = t
        .find_match(match_id)
        .ok_or_else(|| MatchError::NotFound(match_id.to_string()))?;
    if m.generation != generation {
        log::debug!(
            "Stale vote window for {} (generation {} != {})",
            match_id,
            generation,
            m.generation
        );
        return Ok(false);
    }

    let seeds = seeds(t, m);
    let transition = match machine::close_vote(t.find_match_mut(match_id)?, config.tie_break, seeds)
    {
        Ok(transition) => transition,
        Err(e) => {
            log::debug!("Ignoring vote window for {}: {}", match_id, e);
            return Ok(false);
        }
    };

    apply_transition(t, match_id, transition, now, events)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tournament::{MatchStatus, Resolution};

    fn registered(n: usize) -> Tournament {
        let mut t = Tournament::new("t".to_string(), "Cup".to_string(), 0);
        let mut events = Vec::new();
        for i in 1..=n {
            register(&mut t, format!("u{i}"), format!("User {i}"), Utc::now(), &mut events)
                .unwrap();
        }
        t
    }

    fn running(n: usize) -> Tournament {
        let mut t = registered(n);
        close_registration(&mut t, Utc::now(), &mut Vec::new()).unwrap();
        t
    }

    #[test]
    fn test_close_registration_emits_openings() {
        let mut t = registered(5);
        let mut events = Vec::new();
        let plan = close_registration(&mut t, Utc::now(), &mut events).unwrap();

        assert_eq!(plan.main_size, 4);
        assert!(matches!(events[0], EngineEvent::BracketBuilt { .. }));
        let opened: Vec<&str> = events
            .iter()
            .filter_map(|e| match e {
                EngineEvent::MatchOpened { match_id, .. } => Some(match_id.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(opened, vec!["P1", "R1M1"]);

        assert!(matches!(
            close_registration(&mut t, Utc::now(), &mut events),
            Err(EngineError::InvalidState {
                expected: TournamentStatus::Registration,
                actual: TournamentStatus::Running
            })
        ));
    }

    #[test]
    fn test_close_registration_needs_two() {
        let mut t = registered(1);
        assert!(matches!(
            close_registration(&mut t, Utc::now(), &mut Vec::new()),
            Err(EngineError::Build(_))
        ));
        assert_eq!(t.status, TournamentStatus::Registration);
    }

    #[test]
    fn test_end_match_propagates_and_opens_next() {
        let mut t = running(5);
        let mut events = Vec::new();
        end_match(&mut t, "P1", Side::P1, Utc::now(), &mut events).unwrap();

        assert!(matches!(events[0], EngineEvent::MatchFinished { .. }));
        assert!(matches!(events[1], EngineEvent::RoundPropagated { .. }));
        assert_eq!(
            events[2],
            EngineEvent::MatchOpened {
                match_id: "R1M2".to_string(),
                p1: "u3".to_string(),
                p2: "u4".to_string(),
            }
        );
    }

    #[test]
    fn test_final_decision_finishes_tournament() {
        let mut t = running(2);
        let mut events = Vec::new();
        end_match(&mut t, "R1M1", Side::P2, Utc::now(), &mut events).unwrap();

        assert_eq!(t.status, TournamentStatus::Finished);
        assert_eq!(t.champion.as_deref(), Some("u2"));
        assert_eq!(
            events.last(),
            Some(&EngineEvent::TournamentFinished {
                champion: Some("u2".to_string())
            })
        );
        assert!(matches!(
            end_match(&mut t, "R1M1", Side::P1, Utc::now(), &mut events),
            Err(EngineError::InvalidState { .. })
        ));
    }

    #[test]
    fn test_assign_fixtures_round_robin() {
        let mut t = running(8);
        let channels = ChannelBindings {
            battle_channels: vec!["arena-1".to_string(), "arena-2".to_string()],
            ..ChannelBindings::default()
        };

        let fixtures = assign_fixtures(&mut t, 0, &channels, &mut Vec::new()).unwrap();
        let assigned: Vec<&str> = fixtures.iter().map(|f| f.channel_id.as_str()).collect();
        assert_eq!(assigned, vec!["arena-1", "arena-2", "arena-1", "arena-2"]);

        // Already bound matches are left alone
        assert!(assign_fixtures(&mut t, 0, &channels, &mut Vec::new())
            .unwrap()
            .is_empty());

        assert!(matches!(
            assign_fixtures(&mut t, 9, &channels, &mut Vec::new()),
            Err(EngineError::RoundNotFound(9))
        ));
        assert!(matches!(
            assign_fixtures(&mut t, 1, &ChannelBindings::default(), &mut Vec::new()),
            Err(EngineError::Configuration(_))
        ));
    }

    #[test]
    fn test_channel_post_routes_to_bound_match() {
        let mut t = running(4);
        let channels = ChannelBindings {
            battle_channels: vec!["arena".to_string()],
            ..ChannelBindings::default()
        };
        assign_fixtures(&mut t, 0, &channels, &mut Vec::new()).unwrap();

        let config = LifecycleConfig::default();
        let m = channel_post(&mut t, "arena", "u1", Utc::now(), &config, &mut Vec::new()).unwrap();
        assert_eq!(m.id, "R1M1");

        end_match(&mut t, "R1M1", Side::P1, Utc::now(), &mut Vec::new()).unwrap();
        let m = channel_post(&mut t, "arena", "u3", Utc::now(), &config, &mut Vec::new()).unwrap();
        assert_eq!(m.id, "R1M2");

        assert!(matches!(
            channel_post(&mut t, "arena", "u1", Utc::now(), &config, &mut Vec::new()),
            Err(EngineError::Match(MatchError::NotParticipant(_)))
        ));
    }

    #[test]
    fn test_stale_deadline_is_ignored() {
        let mut t = running(2);
        let config = LifecycleConfig::default();
        participant_post(&mut t, "R1M1", "u1", Utc::now(), &config, &mut Vec::new()).unwrap();
        let armed = t.find_match("R1M1").unwrap().generation;

        end_match(&mut t, "R1M1", Side::P2, Utc::now(), &mut Vec::new()).unwrap();
        let before = t.clone();
        let mut events = Vec::new();

        // Tournament is finished, and even if it were not the generation moved on
        let applied =
            reply_deadline_elapsed(&mut t, "R1M1", armed, Utc::now(), &config, &mut events)
                .unwrap();
        assert!(!applied);
        assert!(events.is_empty());
        assert_eq!(t, before);
    }

    #[test]
    fn test_timeout_then_vote_window_finishes_match() {
        let mut t = running(4);
        let config = LifecycleConfig::default();
        participant_post(&mut t, "R1M1", "u1", Utc::now(), &config, &mut Vec::new()).unwrap();
        let generation = t.find_match("R1M1").unwrap().generation;

        let mut events = Vec::new();
        assert!(
            reply_deadline_elapsed(&mut t, "R1M1", generation, Utc::now(), &config, &mut events)
                .unwrap()
        );
        assert_eq!(
            events[0],
            EngineEvent::MatchTimedOut {
                match_id: "R1M1".to_string(),
                waiting_on: Some("u2".to_string()),
            }
        );
        assert_eq!(t.find_match("R1M1").unwrap().status(), MatchStatus::Voting);

        cast_vote(&mut t, "R1M1", "fan", Side::P2).unwrap();
        let generation = t.find_match("R1M1").unwrap().generation;
        assert!(
            vote_window_elapsed(&mut t, "R1M1", generation, Utc::now(), &config, &mut events)
                .unwrap()
        );

        let m = t.find_match("R1M1").unwrap();
        assert_eq!(m.winner_id().map(String::as_str), Some("u2"));
        assert!(matches!(
            m.state,
            MatchState::Finished {
                resolution: Resolution::Vote { p1_votes: 0, p2_votes: 1, .. },
                ..
            }
        ));
        assert_eq!(t.final_match().unwrap().slot_p1.as_deref(), Some("u2"));
    }

    #[test]
    fn test_end_tournament_without_final() {
        let mut t = running(4);
        let mut events = Vec::new();
        assert_eq!(end_tournament(&mut t, Utc::now(), &mut events).unwrap(), None);
        assert_eq!(t.status, TournamentStatus::Finished);
        assert!(end_tournament(&mut t, Utc::now(), &mut events).is_err());
    }

    #[test]
    fn test_open_registration_only_while_registering() {
        let t = registered(0);
        let mut events = Vec::new();
        open_registration(&t, &mut events).unwrap();
        assert_eq!(
            events,
            vec![EngineEvent::RegistrationOpened {
                max_participants: 0
            }]
        );

        let t = running(2);
        assert!(open_registration(&t, &mut events).is_err());
    }
}
