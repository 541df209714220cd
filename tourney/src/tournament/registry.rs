//! Participant registry: ordered, deduplicated enrollment.

use super::{
    errors::RegistrationError,
    models::{Participant, ParticipantId, Tournament, TournamentStatus},
};
use chrono::{DateTime, Utc};

impl Tournament {
    /// Whether the participant cap has been reached (0 means unlimited)
    pub fn is_full(&self) -> bool {
        self.max_participants > 0 && self.participants.len() >= self.max_participants
    }

    /// Append a participant, preserving arrival order.
    pub fn register(
        &mut self,
        participant_id: ParticipantId,
        display_name: String,
        joined_at: DateTime<Utc>,
    ) -> Result<&Participant, RegistrationError> {
        if self.status != TournamentStatus::Registration {
            return Err(RegistrationError::Closed);
        }
        if self.is_full() {
            return Err(RegistrationError::Full {
                max: self.max_participants,
            });
        }
        if self.participant(&participant_id).is_some() {
            return Err(RegistrationError::AlreadyRegistered);
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.participants.push(Participant {
            id: participant_id,
            display_name,
            joined_at,
            seq,
        });

        let index = self.participants.len() - 1;
        Ok(&self.participants[index])
    }

    /// Remove a participant; remaining entries keep their relative order.
    pub fn unregister(&mut self, participant_id: &str) -> Result<Participant, RegistrationError> {
        if self.status != TournamentStatus::Registration {
            return Err(RegistrationError::NotRegistered);
        }

        let index = self
            .participants
            .iter()
            .position(|p| p.id == participant_id)
            .ok_or(RegistrationError::NotRegistered)?;

        Ok(self.participants.remove(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tournament(max: usize) -> Tournament {
        Tournament::new("t".to_string(), "Test Cup".to_string(), max)
    }

    fn ids(t: &Tournament) -> Vec<&str> {
        t.participants.iter().map(|p| p.id.as_str()).collect()
    }

    #[test]
    fn test_register_preserves_order() {
        let mut t = tournament(0);
        for id in ["c", "a", "b"] {
            t.register(id.to_string(), id.to_uppercase(), Utc::now()).unwrap();
        }
        assert_eq!(ids(&t), vec!["c", "a", "b"]);
        assert_eq!(t.participants[2].seq, 2);
    }

    #[test]
    fn test_register_rejects_duplicates() {
        let mut t = tournament(0);
        t.register("a".to_string(), "A".to_string(), Utc::now()).unwrap();
        assert_eq!(
            t.register("a".to_string(), "A again".to_string(), Utc::now()),
            Err(RegistrationError::AlreadyRegistered)
        );
        assert_eq!(t.participants.len(), 1);
    }

    #[test]
    fn test_register_enforces_cap() {
        let mut t = tournament(2);
        t.register("a".to_string(), "A".to_string(), Utc::now()).unwrap();
        t.register("b".to_string(), "B".to_string(), Utc::now()).unwrap();
        assert_eq!(
            t.register("c".to_string(), "C".to_string(), Utc::now()),
            Err(RegistrationError::Full { max: 2 })
        );
    }

    #[test]
    fn test_register_requires_open_registration() {
        let mut t = tournament(0);
        t.status = TournamentStatus::Running;
        assert_eq!(
            t.register("a".to_string(), "A".to_string(), Utc::now()),
            Err(RegistrationError::Closed)
        );
    }

    #[test]
    fn test_unregister_keeps_relative_order() {
        let mut t = tournament(0);
        for id in ["a", "b", "c", "d"] {
            t.register(id.to_string(), id.to_string(), Utc::now()).unwrap();
        }
        let removed = t.unregister("b").unwrap();
        assert_eq!(removed.id, "b");
        assert_eq!(ids(&t), vec!["a", "c", "d"]);

        // Sequence numbers keep increasing after a removal
        t.register("b".to_string(), "b".to_string(), Utc::now()).unwrap();
        assert_eq!(t.participants[3].seq, 4);
    }

    #[test]
    fn test_unregister_unknown_or_closed() {
        let mut t = tournament(0);
        assert_eq!(t.unregister("x"), Err(RegistrationError::NotRegistered));

        t.register("a".to_string(), "A".to_string(), Utc::now()).unwrap();
        t.status = TournamentStatus::Running;
        assert_eq!(t.unregister("a"), Err(RegistrationError::NotRegistered));
        assert_eq!(t.participants.len(), 1);
    }
}
