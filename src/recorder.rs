//! Outcome persistence and best-time ranking
//!
//! The recorder is an append-only log with a derived ranking: a
//! participant's best time per encounter is the minimum victory duration,
//! ranking is ascending by best time with ties broken by recency (most
//! recent first). Recorder failures must never reach the state machine;
//! implementations log and swallow.

use std::sync::Mutex;
use std::time::Duration;

use chrono::NaiveDateTime;
use hashbrown::HashMap;

use crate::outcome::Outcome;
use crate::ports::ParticipantId;

/// One row of a best-time ranking.
#[derive(Debug, Clone, PartialEq)]
pub struct RankingEntry {
    pub participant: ParticipantId,
    pub participant_name: String,
    pub best_time: Duration,
    pub recorded_at: NaiveDateTime,
}

/// Durable store of encounter outcomes.
pub trait OutcomeRecorder: Send + Sync {
    /// Append an outcome. Must not block the caller; failures are the
    /// implementation's problem, never the battle manager's.
    fn append(&self, outcome: Outcome);

    /// Best victory duration for a participant on an encounter.
    fn best_time(&self, participant: ParticipantId, encounter_id: &str) -> Option<Duration>;

    /// 1-based rank of a participant's best time among all participants.
    fn rank(&self, participant: ParticipantId, encounter_id: &str) -> Option<usize>;

    /// Top `limit` participants by best time, ascending.
    fn top(&self, encounter_id: &str, limit: usize) -> Vec<RankingEntry>;
}

/// In-process recorder deriving rankings from the outcome log.
#[derive(Debug, Default)]
pub struct MemoryRecorder {
    log: Mutex<Vec<Outcome>>,
}

impl MemoryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn outcomes(&self) -> Vec<Outcome> {
        match self.log.lock() {
            Ok(log) => log.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Best run per participant for one encounter, ordered for ranking.
    fn standings(&self, encounter_id: &str) -> Vec<RankingEntry> {
        let log = match self.log.lock() {
            Ok(log) => log,
            Err(poisoned) => poisoned.into_inner(),
        };

        let mut best: HashMap<ParticipantId, RankingEntry> = HashMap::new();
        for outcome in log.iter() {
            if !outcome.kind.is_victory() || outcome.encounter_id != encounter_id {
                continue;
            }
            let entry = best.entry(outcome.participant).or_insert(RankingEntry {
                participant: outcome.participant,
                participant_name: outcome.participant_name.clone(),
                best_time: outcome.duration,
                recorded_at: outcome.recorded_at,
            });
            if outcome.duration < entry.best_time {
                entry.best_time = outcome.duration;
            }
            // Recency covers the participant's whole record, not only the
            // best run, matching how ties are broken.
            if outcome.recorded_at > entry.recorded_at {
                entry.recorded_at = outcome.recorded_at;
            }
            entry.participant_name = outcome.participant_name.clone();
        }

        let mut standings: Vec<RankingEntry> = best.into_values().collect();
        standings.sort_by(|a, b| {
            a.best_time
                .cmp(&b.best_time)
                .then(b.recorded_at.cmp(&a.recorded_at))
        });
        standings
    }
}

impl OutcomeRecorder for MemoryRecorder {
    fn append(&self, outcome: Outcome) {
        match self.log.lock() {
            Ok(mut log) => log.push(outcome),
            Err(poisoned) => poisoned.into_inner().push(outcome),
        }
    }

    fn best_time(&self, participant: ParticipantId, encounter_id: &str) -> Option<Duration> {
        self.standings(encounter_id)
            .into_iter()
            .find(|e| e.participant == participant)
            .map(|e| e.best_time)
    }

    fn rank(&self, participant: ParticipantId, encounter_id: &str) -> Option<usize> {
        self.standings(encounter_id)
            .iter()
            .position(|e| e.participant == participant)
            .map(|idx| idx + 1)
    }

    fn top(&self, encounter_id: &str, limit: usize) -> Vec<RankingEntry> {
        let mut standings = self.standings(encounter_id);
        standings.truncate(limit);
        standings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::OutcomeKind;

    fn victory(participant: u64, name: &str, encounter: &str, secs: u64) -> Outcome {
        Outcome::new(
            ParticipantId(participant),
            name.to_string(),
            encounter.to_string(),
            OutcomeKind::Victory,
            Duration::from_secs(secs),
        )
    }

    #[test]
    fn test_best_time_is_minimum_victory() {
        let recorder = MemoryRecorder::new();
        recorder.append(victory(1, "ayu", "dragon", 90));
        recorder.append(victory(1, "ayu", "dragon", 72));
        recorder.append(victory(1, "ayu", "dragon", 80));

        assert_eq!(
            recorder.best_time(ParticipantId(1), "dragon"),
            Some(Duration::from_secs(72))
        );
    }

    #[test]
    fn test_defeats_do_not_rank() {
        let recorder = MemoryRecorder::new();
        recorder.append(Outcome::new(
            ParticipantId(1),
            "ayu".to_string(),
            "dragon".to_string(),
            OutcomeKind::Timeout,
            Duration::from_secs(300),
        ));

        assert_eq!(recorder.best_time(ParticipantId(1), "dragon"), None);
        assert_eq!(recorder.rank(ParticipantId(1), "dragon"), None);
        assert!(recorder.top("dragon", 10).is_empty());
    }

    #[test]
    fn test_rank_orders_ascending_by_best_time() {
        let recorder = MemoryRecorder::new();
        recorder.append(victory(1, "ayu", "dragon", 120));
        recorder.append(victory(2, "rin", "dragon", 60));
        recorder.append(victory(3, "mio", "dragon", 90));

        assert_eq!(recorder.rank(ParticipantId(2), "dragon"), Some(1));
        assert_eq!(recorder.rank(ParticipantId(3), "dragon"), Some(2));
        assert_eq!(recorder.rank(ParticipantId(1), "dragon"), Some(3));

        let top = recorder.top("dragon", 2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].participant_name, "rin");
        assert_eq!(top[1].participant_name, "mio");
    }

    #[test]
    fn test_ties_break_by_recency() {
        let recorder = MemoryRecorder::new();
        let mut older = victory(1, "ayu", "dragon", 60);
        older.recorded_at = older.recorded_at - chrono::Duration::minutes(5);
        recorder.append(older);
        recorder.append(victory(2, "rin", "dragon", 60));

        // Same best time; the more recent run ranks first
        let top = recorder.top("dragon", 10);
        assert_eq!(top[0].participant, ParticipantId(2));
        assert_eq!(top[1].participant, ParticipantId(1));
    }

    #[test]
    fn test_encounters_are_ranked_independently() {
        let recorder = MemoryRecorder::new();
        recorder.append(victory(1, "ayu", "dragon", 60));
        recorder.append(victory(1, "ayu", "lich", 30));

        assert_eq!(
            recorder.best_time(ParticipantId(1), "dragon"),
            Some(Duration::from_secs(60))
        );
        assert_eq!(
            recorder.best_time(ParticipantId(1), "lich"),
            Some(Duration::from_secs(30))
        );
        assert_eq!(recorder.best_time(ParticipantId(1), "wyrm"), None);
    }
}
