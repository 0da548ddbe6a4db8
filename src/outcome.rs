//! Terminal encounter outcomes
//!
//! An outcome is appended to the recorder the moment a session reaches a
//! terminal phase and is never mutated afterwards.

use std::time::Duration;

use chrono::NaiveDateTime;

use crate::ports::ParticipantId;

/// How an encounter ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutcomeKind {
    /// The hostile actor was defeated, or the participant outlasted the
    /// clock in survival mode.
    Victory,
    /// The participant died.
    Defeat,
    /// The encounter clock ran out.
    Timeout,
    /// The participant disconnected mid-encounter.
    Disconnect,
    /// The hostile actor was removed by something outside the encounter.
    ActorRemoved,
}

impl OutcomeKind {
    /// Victories are the only outcomes that enter the ranking.
    pub fn is_victory(self) -> bool {
        matches!(self, Self::Victory)
    }
}

/// One appended outcome record.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub participant: ParticipantId,
    pub participant_name: String,
    pub encounter_id: String,
    pub kind: OutcomeKind,
    /// Time from (re)start to the terminal trigger.
    pub duration: Duration,
    pub recorded_at: NaiveDateTime,
}

impl Outcome {
    pub fn new(
        participant: ParticipantId,
        participant_name: String,
        encounter_id: String,
        kind: OutcomeKind,
        duration: Duration,
    ) -> Self {
        Self {
            participant,
            participant_name,
            encounter_id,
            kind,
            duration,
            recorded_at: chrono::Local::now().naive_local(),
        }
    }
}
