//! Live per-participant encounter state
//!
//! A `Session` is a passive record: it holds progress and computes derived
//! values, but performs no I/O. The battle manager is its sole writer. A
//! session exists in the live table only while non-terminal; reaching
//! `Completed` or `Failed` removes it immediately.
//!
//! # Lifecycle
//!
//! 1. Start request validated → session created in `Waiting`
//! 2. Start completes → `InProgress`, encounter clock running
//! 3. Victory → next chain step (same session, fresh clock) or
//!    `Collection` → `Completed`
//! 4. Any terminal trigger → `Failed`

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::clock::{CollectionClock, EncounterClock};
use crate::encounter::EncounterDefinition;
use crate::ports::{ActorHandle, ParticipantId};

/// Battle lifecycle phase. Phases only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BattlePhase {
    /// Participant relocated to the arena, encounter not yet started
    Waiting,
    /// Encounter clock running
    InProgress,
    /// Post-victory window for picking up drops
    Collection,
    /// Terminal: the encounter (or whole chain) was cleared
    Completed,
    /// Terminal: timeout, death, disconnect or force-stop
    Failed,
}

impl BattlePhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Per-participant encounter state record.
#[derive(Debug)]
pub struct Session {
    pub participant: ParticipantId,
    pub participant_name: String,

    /// Current step's encounter id (replaced when a chain advances).
    pub encounter_id: String,

    /// Definition captured at (re)start; a store reload never swaps it
    /// underneath a live encounter.
    pub definition: Arc<EncounterDefinition>,

    pub phase: BattlePhase,

    started_at: Option<Instant>,
    ended_at: Option<Instant>,

    /// Handle of the live hostile actor, if one was spawned and is still up.
    pub live_actor: Option<ActorHandle>,

    // ─── Chain bookkeeping ──────────────────────────────────────────────────
    /// Every slot id reserved at start (initial id plus the full chain).
    pub reserved_slots: Vec<String>,

    /// Chain tail: encounter ids after the initial one, in order.
    chain: Vec<String>,

    /// Steps of the tail already entered; `chain[chain_cursor]` is next.
    chain_cursor: usize,

    /// Total step count including the initial encounter.
    total_steps: usize,

    // ─── Clocks (None = cancelled or not running) ───────────────────────────
    pub encounter_clock: Option<EncounterClock>,
    pub collection_clock: Option<CollectionClock>,
}

impl Session {
    pub fn new(
        participant: ParticipantId,
        participant_name: String,
        definition: Arc<EncounterDefinition>,
    ) -> Self {
        let chain = definition.chain.clone();
        let total_steps = chain.len() + 1;
        let reserved_slots = definition.slot_ids().map(str::to_string).collect();

        Self {
            participant,
            participant_name,
            encounter_id: definition.id.clone(),
            definition,
            phase: BattlePhase::Waiting,
            started_at: None,
            ended_at: None,
            live_actor: None,
            reserved_slots,
            chain,
            chain_cursor: 0,
            total_steps,
            encounter_clock: None,
            collection_clock: None,
        }
    }

    /// Start completes: the clock begins now.
    pub fn begin(&mut self, now: Instant) {
        self.started_at = Some(now);
        self.phase = BattlePhase::InProgress;
    }

    /// Enter a terminal phase. Cancels both clocks; idempotent on a session
    /// that already ended.
    pub fn finish(&mut self, phase: BattlePhase, now: Instant) {
        debug_assert!(phase.is_terminal());
        if self.ended_at.is_none() {
            self.ended_at = Some(now);
        }
        self.phase = phase;
        self.cancel_clocks();
    }

    pub fn cancel_clocks(&mut self) {
        self.encounter_clock = None;
        self.collection_clock = None;
    }

    /// Time from (re)start to `now`, frozen at the end timestamp once set.
    pub fn elapsed(&self, now: Instant) -> Duration {
        match self.started_at {
            None => Duration::ZERO,
            Some(start) => self
                .ended_at
                .unwrap_or(now)
                .saturating_duration_since(start),
        }
    }

    /// `max(0, time limit − elapsed)`; the full limit before the start
    /// timestamp is set.
    pub fn remaining_secs(&self, now: Instant) -> u32 {
        if self.started_at.is_none() {
            return self.definition.time_limit_secs;
        }
        let elapsed = self.elapsed(now).as_secs().min(u32::MAX as u64) as u32;
        self.definition.time_limit_secs.saturating_sub(elapsed)
    }

    /// In progress or collecting: the session occupies the live table.
    pub fn is_active(&self) -> bool {
        matches!(self.phase, BattlePhase::InProgress | BattlePhase::Collection)
    }

    pub fn is_in_progress(&self) -> bool {
        self.phase == BattlePhase::InProgress
    }

    pub fn in_collection(&self) -> bool {
        self.phase == BattlePhase::Collection
    }

    // ─── Chain ──────────────────────────────────────────────────────────────

    pub fn is_chain(&self) -> bool {
        self.total_steps > 1
    }

    pub fn has_next_step(&self) -> bool {
        self.chain_cursor < self.chain.len()
    }

    pub fn next_encounter_id(&self) -> Option<&str> {
        self.chain.get(self.chain_cursor).map(String::as_str)
    }

    /// Advance the chain cursor. The caller swaps in the next definition
    /// via [`Session::restart_with`].
    pub fn advance_chain(&mut self) {
        self.chain_cursor += 1;
    }

    /// Current position for progress display: `(step, total)`, 1-based.
    pub fn chain_position(&self) -> (usize, usize) {
        (self.chain_cursor + 1, self.total_steps)
    }

    pub fn chain_cursor(&self) -> usize {
        self.chain_cursor
    }

    /// Swap in the next step's definition and restart the clock base.
    pub fn restart_with(&mut self, definition: Arc<EncounterDefinition>, now: Instant) {
        self.encounter_id = definition.id.clone();
        self.definition = definition;
        self.started_at = Some(now);
        self.ended_at = None;
        self.live_actor = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_definition(id: &str, time_limit: u32, chain: &[&str]) -> Arc<EncounterDefinition> {
        Arc::new(EncounterDefinition {
            id: id.to_string(),
            name: id.to_string(),
            enabled: true,
            monster: id.to_string(),
            monster_level: 1,
            time_limit_secs: time_limit,
            collection_secs: 0,
            survival: false,
            spawn_delay_secs: 0,
            chain: chain.iter().map(|s| s.to_string()).collect(),
            arena: None,
            spawn: None,
            exit: None,
            warnings: Vec::new(),
            victory_commands: Vec::new(),
            defeat_commands: Vec::new(),
        })
    }

    fn make_session(def: Arc<EncounterDefinition>) -> Session {
        Session::new(ParticipantId(7), "ayu".to_string(), def)
    }

    #[test]
    fn test_remaining_before_start_is_full_limit() {
        let session = make_session(make_definition("dragon", 300, &[]));
        assert_eq!(session.phase, BattlePhase::Waiting);
        assert_eq!(session.remaining_secs(Instant::now()), 300);
        assert_eq!(session.elapsed(Instant::now()), Duration::ZERO);
    }

    #[test]
    fn test_remaining_counts_down_and_clamps() {
        let mut session = make_session(make_definition("dragon", 300, &[]));
        let start = Instant::now();
        session.begin(start);

        assert_eq!(session.remaining_secs(start + Duration::from_secs(42)), 258);
        assert_eq!(session.remaining_secs(start + Duration::from_secs(400)), 0);
    }

    #[test]
    fn test_elapsed_freezes_at_end() {
        let mut session = make_session(make_definition("dragon", 300, &[]));
        let start = Instant::now();
        session.begin(start);
        session.finish(BattlePhase::Completed, start + Duration::from_secs(42));

        // Later reads keep reporting the frozen duration
        assert_eq!(
            session.elapsed(start + Duration::from_secs(500)),
            Duration::from_secs(42)
        );
        assert!(!session.is_active());
    }

    #[test]
    fn test_chain_walk() {
        let def = make_definition("a", 60, &["b", "c"]);
        let mut session = make_session(def);

        assert!(session.is_chain());
        assert_eq!(session.chain_position(), (1, 3));
        assert_eq!(session.next_encounter_id(), Some("b"));
        assert_eq!(
            session.reserved_slots,
            vec!["a".to_string(), "b".to_string(), "c".to_string()]
        );

        session.advance_chain();
        assert_eq!(session.chain_position(), (2, 3));
        assert_eq!(session.next_encounter_id(), Some("c"));

        session.advance_chain();
        assert!(!session.has_next_step());
        assert_eq!(session.next_encounter_id(), None);
    }

    #[test]
    fn test_restart_with_resets_clock_base() {
        let mut session = make_session(make_definition("a", 60, &["b"]));
        let start = Instant::now();
        session.begin(start);
        session.live_actor = Some(ActorHandle(9));

        let next = make_definition("b", 120, &[]);
        session.advance_chain();
        session.restart_with(next, start + Duration::from_secs(30));

        assert_eq!(session.encounter_id, "b");
        assert!(session.live_actor.is_none());
        // Fresh clock base: full 120s from the restart instant
        assert_eq!(
            session.remaining_secs(start + Duration::from_secs(30)),
            120
        );
    }
}
