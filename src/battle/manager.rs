//! The session state machine.
//!
//! The manager owns the live-session table and the slot table and is
//! the only code that mutates either. Every terminal trigger (actor death,
//! clock exhaustion, participant death, disconnect, force-stop) funnels
//! through one cleanup path that cancels clocks, removes the actor,
//! records the outcome, releases slots and relocates the participant
//! exactly once. Handlers re-check phase before acting, so racing triggers
//! resolve to first-wins and the loser is a no-op.

use std::time::{Duration, Instant};

use hashbrown::HashMap;
use thiserror::Error;

use crate::clock::{ClockTick, CollectionClock, EncounterClock};
use crate::encounter::{DefinitionStore, EncounterDefinition, Placement};
use crate::outcome::{Outcome, OutcomeKind};
use crate::ports::{ActorHandle, Host, Notice, ParticipantId};
use crate::session::{BattlePhase, Session};
use crate::settings::Settings;
use crate::slots::SlotTable;
use crate::timefmt;

use super::BattleSignal;

/// Validation failures for a start request. None of these create a session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StartError {
    #[error("no encounter definition named `{0}`")]
    UnknownEncounter(String),

    #[error("encounter `{0}` is disabled")]
    EncounterDisabled(String),

    #[error("participant already has an encounter in progress")]
    AlreadyEngaged,

    #[error("encounter `{0}` is already claimed by another challenger")]
    SlotReserved(String),

    #[error("orchestration engine is not running")]
    EngineStopped,
}

/// A spawn the engine should perform off-thread and report back via
/// [`BattleSignal::ActorSpawned`].
#[derive(Debug, Clone)]
pub struct SpawnRequest {
    pub participant: ParticipantId,
    pub chain_cursor: usize,
    pub monster: String,
    pub placement: Placement,
    pub level: u32,
    /// Grace period before spawning so surroundings can finish loading.
    pub delay: Duration,
}

/// What a heartbeat decided for one session; dispatched after the session
/// borrow ends.
enum TickAction {
    Idle,
    Offline,
    Exhausted { survival: bool },
    CollectionExpired,
    CollectionAbandoned,
}

pub struct BattleManager {
    store: DefinitionStore,
    host: Host,
    sessions: HashMap<ParticipantId, Session>,
    slots: SlotTable,
    /// Exit placements owed to participants who disconnected mid-encounter.
    pending_relocations: HashMap<ParticipantId, Placement>,
    /// Spawns queued for the engine to perform off-thread.
    spawn_outbox: Vec<SpawnRequest>,
    /// Offer the leave-early hint when a collection phase starts.
    leave_hint: bool,
}

impl BattleManager {
    pub fn new(store: DefinitionStore, host: Host) -> Self {
        Self {
            store,
            host,
            sessions: HashMap::new(),
            slots: SlotTable::new(),
            pending_relocations: HashMap::new(),
            spawn_outbox: Vec::new(),
            leave_hint: true,
        }
    }

    pub fn with_settings(store: DefinitionStore, host: Host, settings: &Settings) -> Self {
        let mut manager = Self::new(store, host);
        manager.leave_hint = settings.show_leave_hint;
        manager
    }

    // ─── Operations ─────────────────────────────────────────────────────────

    /// Start an encounter for a participant.
    ///
    /// Validates synchronously: one session per participant, the whole
    /// chain's slots free, definition present and enabled. On success the
    /// participant is relocated to the arena, the clock starts and a spawn
    /// is queued.
    pub fn start(
        &mut self,
        participant: ParticipantId,
        participant_name: &str,
        encounter_id: &str,
        now: Instant,
    ) -> Result<(), StartError> {
        if self.sessions.get(&participant).is_some_and(Session::is_active) {
            return Err(StartError::AlreadyEngaged);
        }

        let def = self
            .store
            .get(encounter_id)
            .ok_or_else(|| StartError::UnknownEncounter(encounter_id.to_string()))?;
        if !def.enabled {
            return Err(StartError::EncounterDisabled(encounter_id.to_string()));
        }

        // All-or-nothing over the full chain set: nobody may claim step
        // 3-of-5 while step 1 is being fought.
        if !self.slots.reserve(def.slot_ids()) {
            return Err(StartError::SlotReserved(encounter_id.to_string()));
        }

        let mut session = Session::new(participant, participant_name.to_string(), def.clone());

        if let Some(arena) = &def.arena {
            self.host.relocator.place(participant, arena);
        }

        session.begin(now);
        session.encounter_clock = Some(EncounterClock::start(def.time_limit(), now));

        if let Some(placement) = def.spawn.clone() {
            self.spawn_outbox.push(SpawnRequest {
                participant,
                chain_cursor: 0,
                monster: def.monster.clone(),
                placement,
                level: def.monster_level,
                delay: def.spawn_delay(),
            });
        }

        let chain_step = session.is_chain().then(|| session.chain_position());
        self.sessions.insert(participant, session);

        self.host.notifier.tell(
            participant,
            &Notice::EncounterStarted {
                encounter_name: def.name.clone(),
                time_limit_secs: def.time_limit_secs,
                survival: def.survival,
                chain_step,
            },
        );

        tracing::info!(participant = participant.0, encounter = %def.id, "encounter started");
        Ok(())
    }

    /// Administrative force-stop. Tears the session down without recording
    /// an outcome. Returns whether a session existed.
    pub fn stop(&mut self, participant: ParticipantId, now: Instant) -> bool {
        if !self.sessions.contains_key(&participant) {
            return false;
        }
        self.terminate(participant, None, now);
        true
    }

    /// Force-stop every live session (host shutdown).
    pub fn stop_all(&mut self, now: Instant) {
        let participants: Vec<ParticipantId> = self.sessions.keys().copied().collect();
        for participant in participants {
            self.stop(participant, now);
        }
    }

    /// Swap the definition store wholesale. In-flight sessions keep the
    /// definitions they captured at (re)start.
    pub fn reload(&mut self, store: DefinitionStore) {
        self.store = store;
    }

    pub fn handle_signal(&mut self, signal: BattleSignal, now: Instant) {
        match signal {
            BattleSignal::ActorSpawned {
                participant,
                chain_cursor,
                handle,
            } => self.on_actor_spawned(participant, chain_cursor, handle),
            BattleSignal::ActorDied { handle, monster } => {
                self.on_actor_died(handle, &monster, now)
            }
            BattleSignal::ActorRemoved { handle } => {
                if let Some(participant) = self.find_by_actor(handle)
                    && self
                        .sessions
                        .get(&participant)
                        .is_some_and(Session::is_in_progress)
                {
                    self.terminate(participant, Some(OutcomeKind::ActorRemoved), now);
                }
            }
            BattleSignal::ParticipantDied { participant } => {
                if self
                    .sessions
                    .get(&participant)
                    .is_some_and(Session::is_in_progress)
                {
                    self.terminate(participant, Some(OutcomeKind::Defeat), now);
                }
            }
            BattleSignal::ParticipantDisconnected { participant } => {
                if self
                    .sessions
                    .get(&participant)
                    .is_some_and(Session::is_active)
                {
                    self.terminate(participant, Some(OutcomeKind::Disconnect), now);
                }
            }
            BattleSignal::ParticipantReconnected { participant } => {
                if let Some(exit) = self.pending_relocations.remove(&participant) {
                    self.host.relocator.place(participant, &exit);
                }
            }
            BattleSignal::ForceStop { participant } => {
                self.stop(participant, now);
            }
            BattleSignal::Tick => self.on_tick(now),
        }
    }

    // ─── Queries ────────────────────────────────────────────────────────────

    pub fn session(&self, participant: ParticipantId) -> Option<&Session> {
        self.sessions.get(&participant)
    }

    pub fn is_engaged(&self, participant: ParticipantId) -> bool {
        self.sessions.get(&participant).is_some_and(Session::is_active)
    }

    pub fn is_slot_reserved(&self, encounter_id: &str) -> bool {
        self.slots.is_reserved(encounter_id)
    }

    pub fn active_sessions(&self) -> impl Iterator<Item = &Session> {
        self.sessions.values()
    }

    pub fn find_by_actor(&self, handle: ActorHandle) -> Option<ParticipantId> {
        self.sessions
            .values()
            .find(|s| s.live_actor == Some(handle))
            .map(|s| s.participant)
    }

    pub fn definitions(&self) -> &DefinitionStore {
        &self.store
    }

    pub fn host(&self) -> &Host {
        &self.host
    }

    /// Drain spawns queued since the last call; the engine performs them
    /// off-thread and reports back via [`BattleSignal::ActorSpawned`].
    pub fn take_spawn_requests(&mut self) -> Vec<SpawnRequest> {
        std::mem::take(&mut self.spawn_outbox)
    }

    // ─── Signal handlers ────────────────────────────────────────────────────

    fn on_actor_spawned(
        &mut self,
        participant: ParticipantId,
        chain_cursor: usize,
        handle: Option<ActorHandle>,
    ) {
        let attach = self.sessions.get(&participant).is_some_and(|s| {
            s.is_in_progress() && s.chain_cursor() == chain_cursor
        });

        if attach {
            if let Some(session) = self.sessions.get_mut(&participant) {
                session.live_actor = handle;
            }
            if handle.is_none() {
                tracing::warn!(
                    participant = participant.0,
                    "spawner produced no actor; encounter continues without one"
                );
            }
        } else if let Some(handle) = handle {
            // Completion raced a terminal trigger or a chain advance; tear
            // the orphan down.
            self.host.spawner.remove(handle);
        }
    }

    fn on_actor_died(&mut self, handle: ActorHandle, monster: &str, now: Instant) {
        let Some(participant) = self.find_by_actor(handle) else {
            return;
        };
        let matches = self.sessions.get(&participant).is_some_and(|s| {
            s.is_in_progress() && s.definition.monster.eq_ignore_ascii_case(monster)
        });
        if matches {
            self.complete_step(participant, now, false);
        }
    }

    fn on_tick(&mut self, now: Instant) {
        let participants: Vec<ParticipantId> = self.sessions.keys().copied().collect();
        for participant in participants {
            self.tick_session(participant, now);
        }
    }

    fn tick_session(&mut self, participant: ParticipantId, now: Instant) {
        let online = self.host.presence.is_online(participant);

        let mut tell: Option<Notice> = None;
        let mut ambient: Option<Notice> = None;

        let action = {
            let Some(session) = self.sessions.get_mut(&participant) else {
                return;
            };
            match session.phase {
                BattlePhase::InProgress => {
                    if !online {
                        TickAction::Offline
                    } else {
                        let survival = session.definition.survival;
                        match session.encounter_clock.as_mut() {
                            // Clock already cancelled under a queued tick
                            None => TickAction::Idle,
                            Some(clock) => match clock.tick(now) {
                                ClockTick::Expired => TickAction::Exhausted { survival },
                                ClockTick::Running { remaining_secs } => {
                                    if let Some(text) =
                                        session.definition.warning_at(remaining_secs)
                                        && clock.check_warning(remaining_secs)
                                    {
                                        tell = Some(Notice::TimeWarning {
                                            remaining_secs,
                                            text: text.to_string(),
                                        });
                                    }
                                    ambient = Some(Notice::TimeRemaining {
                                        encounter_name: session.definition.name.clone(),
                                        remaining_secs,
                                    });
                                    TickAction::Idle
                                }
                            },
                        }
                    }
                }
                BattlePhase::Collection => {
                    if !online {
                        TickAction::CollectionAbandoned
                    } else {
                        match session.collection_clock.as_mut() {
                            None => TickAction::Idle,
                            Some(clock) => match clock.tick(now) {
                                ClockTick::Expired => TickAction::CollectionExpired,
                                ClockTick::Running { remaining_secs } => {
                                    if clock.check_warning(remaining_secs) {
                                        tell =
                                            Some(Notice::CollectionWarning { remaining_secs });
                                    }
                                    ambient =
                                        Some(Notice::CollectionRemaining { remaining_secs });
                                    TickAction::Idle
                                }
                            },
                        }
                    }
                }
                // Waiting is momentary and terminal phases never sit in the
                // live table
                _ => TickAction::Idle,
            }
        };

        if let Some(notice) = tell {
            self.host.notifier.tell(participant, &notice);
        }
        if let Some(notice) = ambient {
            self.host.notifier.ambient(participant, &notice);
        }

        match action {
            TickAction::Idle => {}
            TickAction::Offline => {
                self.terminate(participant, Some(OutcomeKind::Disconnect), now)
            }
            TickAction::Exhausted { survival: false } => {
                self.terminate(participant, Some(OutcomeKind::Timeout), now)
            }
            // Outlasting the clock is the survival-mode win
            TickAction::Exhausted { survival: true } => {
                self.complete_step(participant, now, true)
            }
            TickAction::CollectionExpired => {
                self.host.notifier.tell(participant, &Notice::CollectionEnded);
                self.finalize_completed(participant, now);
            }
            TickAction::CollectionAbandoned => self.finalize_completed(participant, now),
        }
    }

    // ─── Victory path ───────────────────────────────────────────────────────

    /// One encounter step was won, by kill or by outlasting the clock.
    /// Records the victory, then either advances the chain or enters the
    /// collection phase.
    fn complete_step(&mut self, participant: ParticipantId, now: Instant, survived: bool) {
        let (def, elapsed, name, encounter_id, remove_actor) = {
            let Some(session) = self.sessions.get_mut(&participant) else {
                return;
            };
            if !session.is_in_progress() {
                return;
            }
            session.encounter_clock = None;
            let actor = session.live_actor.take();
            (
                session.definition.clone(),
                session.elapsed(now),
                session.participant_name.clone(),
                session.encounter_id.clone(),
                // On a kill the actor is already gone; a survival win
                // removes the outlasted actor explicitly.
                if survived { actor } else { None },
            )
        };

        if let Some(handle) = remove_actor {
            self.host.spawner.remove(handle);
        }

        self.host.recorder.append(Outcome::new(
            participant,
            name.clone(),
            encounter_id.clone(),
            OutcomeKind::Victory,
            elapsed,
        ));
        self.run_commands(&def.victory_commands, &name, &def, elapsed);
        self.host.notifier.tell(
            participant,
            &Notice::Victory {
                encounter_name: def.name.clone(),
                clear_time_ms: elapsed.as_millis(),
                survival: survived,
            },
        );

        tracing::info!(
            participant = participant.0,
            encounter = %encounter_id,
            ms = elapsed.as_millis() as u64,
            survival = survived,
            "encounter step cleared"
        );

        let has_next = self
            .sessions
            .get(&participant)
            .is_some_and(Session::has_next_step);
        if has_next {
            self.advance_chain(participant, now);
        } else {
            self.enter_collection(participant, now);
        }
    }

    /// Swap the session to the next chain step with a fresh clock and a new
    /// spawn. Slots stay reserved until the whole chain ends.
    fn advance_chain(&mut self, participant: ParticipantId, now: Instant) {
        let next_id = match self
            .sessions
            .get(&participant)
            .and_then(|s| s.next_encounter_id().map(str::to_string))
        {
            Some(id) => id,
            None => return self.enter_collection(participant, now),
        };

        // Re-validate: the definition may have gone away since load. A
        // missing step ends the chain early as a success.
        let next_def = match self.store.get(&next_id) {
            Some(def) if def.enabled => def,
            _ => {
                tracing::warn!(
                    encounter = %next_id,
                    "next chain step missing or disabled; ending chain early"
                );
                return self.enter_collection(participant, now);
            }
        };

        let spawn_request = {
            let Some(session) = self.sessions.get_mut(&participant) else {
                return;
            };
            if !session.is_in_progress() {
                return;
            }
            session.advance_chain();
            session.restart_with(next_def.clone(), now);
            session.encounter_clock = Some(EncounterClock::start(next_def.time_limit(), now));

            next_def.spawn.clone().map(|placement| SpawnRequest {
                participant,
                chain_cursor: session.chain_cursor(),
                monster: next_def.monster.clone(),
                placement,
                level: next_def.monster_level,
                delay: next_def.spawn_delay(),
            })
        };
        if let Some(request) = spawn_request {
            self.spawn_outbox.push(request);
        }

        let chain_step = self.sessions.get(&participant).map(Session::chain_position);
        self.host.notifier.tell(
            participant,
            &Notice::EncounterStarted {
                encounter_name: next_def.name.clone(),
                time_limit_secs: next_def.time_limit_secs,
                survival: next_def.survival,
                chain_step,
            },
        );

        tracing::debug!(
            participant = participant.0,
            encounter = %next_def.id,
            "chain advanced"
        );
    }

    /// Post-victory transition: start the collection window, or finalize
    /// immediately when the definition has none.
    fn enter_collection(&mut self, participant: ParticipantId, now: Instant) {
        let collection_secs = {
            let Some(session) = self.sessions.get_mut(&participant) else {
                return;
            };
            if !session.is_in_progress() {
                return;
            }
            session.encounter_clock = None;
            let secs = session.definition.collection_secs;
            if secs > 0 {
                session.phase = BattlePhase::Collection;
                session.collection_clock =
                    Some(CollectionClock::start(session.definition.collection(), now));
            }
            secs
        };

        if collection_secs > 0 {
            self.host.notifier.tell(
                participant,
                &Notice::CollectionStarted {
                    collection_secs,
                    leave_hint: self.leave_hint,
                },
            );
        } else {
            self.finalize_completed(participant, now);
        }
    }

    // ─── Cleanup paths ──────────────────────────────────────────────────────

    /// Successful finalize: remove the session, release every reserved
    /// slot, return the participant to the exit placement.
    fn finalize_completed(&mut self, participant: ParticipantId, now: Instant) {
        let Some(mut session) = self.sessions.remove(&participant) else {
            return;
        };
        session.finish(BattlePhase::Completed, now);
        self.slots
            .release(session.reserved_slots.iter().map(String::as_str));
        self.relocate_or_defer(participant, session.definition.exit.clone());

        tracing::debug!(
            participant = participant.0,
            encounter = %session.encounter_id,
            "encounter completed"
        );
    }

    /// Failure finalize shared by every failure trigger. `kind: None` is an
    /// administrative stop: cleanup without an outcome record.
    fn terminate(
        &mut self,
        participant: ParticipantId,
        kind: Option<OutcomeKind>,
        now: Instant,
    ) {
        let Some(mut session) = self.sessions.remove(&participant) else {
            return;
        };
        session.finish(BattlePhase::Failed, now);
        let elapsed = session.elapsed(now);
        let def = session.definition.clone();
        let actor = session.live_actor.take();

        // The actor survives external removal only; every other failure
        // tears it down.
        if kind != Some(OutcomeKind::ActorRemoved)
            && let Some(handle) = actor
        {
            self.host.spawner.remove(handle);
        }

        if let Some(kind) = kind {
            self.host.recorder.append(Outcome::new(
                participant,
                session.participant_name.clone(),
                session.encounter_id.clone(),
                kind,
                elapsed,
            ));

            if self.host.presence.is_online(participant) {
                self.run_commands(&def.defeat_commands, &session.participant_name, &def, elapsed);

                let notice = match kind {
                    OutcomeKind::Timeout => Some(Notice::Timeout {
                        encounter_name: def.name.clone(),
                    }),
                    OutcomeKind::Defeat => Some(Notice::Defeat {
                        encounter_name: def.name.clone(),
                    }),
                    OutcomeKind::ActorRemoved => Some(Notice::ActorVanished {
                        encounter_name: def.name.clone(),
                    }),
                    _ => None,
                };
                if let Some(notice) = notice {
                    self.host.notifier.tell(participant, &notice);
                }

                if kind == OutcomeKind::Timeout {
                    // The clock won: lethal hit, attributed to the actor
                    // when one is still resolvable.
                    self.host.enforcer.slay(participant, actor);
                }
            }

            tracing::info!(
                participant = participant.0,
                encounter = %session.encounter_id,
                ?kind,
                "encounter failed"
            );
        } else {
            tracing::debug!(
                participant = participant.0,
                encounter = %session.encounter_id,
                "encounter force-stopped"
            );
        }

        self.slots
            .release(session.reserved_slots.iter().map(String::as_str));
        self.relocate_or_defer(participant, def.exit.clone());
    }

    fn relocate_or_defer(&mut self, participant: ParticipantId, exit: Option<Placement>) {
        let Some(exit) = exit else { return };
        if self.host.presence.is_online(participant) {
            self.host.relocator.place(participant, &exit);
        } else {
            // Delivered on ParticipantReconnected
            self.pending_relocations.insert(participant, exit);
        }
    }

    fn run_commands(
        &self,
        templates: &[String],
        player: &str,
        def: &EncounterDefinition,
        elapsed: Duration,
    ) {
        let ms = elapsed.as_millis();
        for template in templates {
            let command = template
                .replace("{player}", player)
                .replace("{encounter_id}", &def.id)
                .replace("{encounter_name}", &def.name)
                .replace("{time}", &timefmt::format_clock_ms(ms))
                .replace("{time_ms}", &ms.to_string());
            self.host.commands.run(&command);
        }
    }
}
