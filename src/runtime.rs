//! The orchestration engine loop.
//!
//! One tokio task owns the [`BattleManager`]: commands and signals arrive
//! through an mpsc inbox and a heartbeat fires once per second. Spawn
//! requests are performed off-task (delay + backend call) and their result
//! re-enters the inbox as [`BattleSignal::ActorSpawned`], so session state
//! is only ever touched from the engine task.

use std::time::{Duration, Instant};

use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;

use crate::battle::{BattleManager, BattleSignal, StartError};
use crate::ports::ParticipantId;

const INBOX_CAPACITY: usize = 100;

/// Heartbeat driving both countdown clocks.
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

enum EngineCommand {
    Start {
        participant: ParticipantId,
        participant_name: String,
        encounter_id: String,
        reply: oneshot::Sender<Result<(), StartError>>,
    },
    Stop {
        participant: ParticipantId,
        reply: oneshot::Sender<bool>,
    },
    Signal(BattleSignal),
    Shutdown,
}

/// Cloneable handle for feeding the engine from host glue (commands,
/// event listeners).
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineCommand>,
}

impl EngineHandle {
    pub async fn start(
        &self,
        participant: ParticipantId,
        participant_name: &str,
        encounter_id: &str,
    ) -> Result<(), StartError> {
        let (reply, response) = oneshot::channel();
        let command = EngineCommand::Start {
            participant,
            participant_name: participant_name.to_string(),
            encounter_id: encounter_id.to_string(),
            reply,
        };
        if self.tx.send(command).await.is_err() {
            return Err(StartError::EngineStopped);
        }
        response.await.unwrap_or(Err(StartError::EngineStopped))
    }

    /// Force-stop a participant's encounter. Returns whether one existed.
    pub async fn stop(&self, participant: ParticipantId) -> bool {
        let (reply, response) = oneshot::channel();
        if self
            .tx
            .send(EngineCommand::Stop { participant, reply })
            .await
            .is_err()
        {
            return false;
        }
        response.await.unwrap_or(false)
    }

    /// Deliver a host event.
    pub async fn signal(&self, signal: BattleSignal) {
        let _ = self.tx.send(EngineCommand::Signal(signal)).await;
    }

    /// Force-stop every session and end the engine loop.
    pub async fn shutdown(&self) {
        let _ = self.tx.send(EngineCommand::Shutdown).await;
    }
}

/// Event loop wrapper around a [`BattleManager`].
pub struct Engine {
    manager: BattleManager,
    inbox: mpsc::Receiver<EngineCommand>,
    /// Kept so spawn tasks can feed completions back into the inbox.
    tx: mpsc::Sender<EngineCommand>,
}

impl Engine {
    pub fn new(manager: BattleManager) -> (Self, EngineHandle) {
        let (tx, inbox) = mpsc::channel(INBOX_CAPACITY);
        let handle = EngineHandle { tx: tx.clone() };
        (
            Self {
                manager,
                inbox,
                tx,
            },
            handle,
        )
    }

    /// Run until [`EngineHandle::shutdown`] is called.
    pub async fn run(mut self) {
        let mut heartbeat = tokio::time::interval(TICK_INTERVAL);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                command = self.inbox.recv() => {
                    match command {
                        None => break,
                        Some(EngineCommand::Shutdown) => {
                            self.manager.stop_all(Instant::now());
                            break;
                        }
                        Some(EngineCommand::Start { participant, participant_name, encounter_id, reply }) => {
                            let result = self.manager.start(
                                participant,
                                &participant_name,
                                &encounter_id,
                                Instant::now(),
                            );
                            let _ = reply.send(result);
                        }
                        Some(EngineCommand::Stop { participant, reply }) => {
                            let stopped = self.manager.stop(participant, Instant::now());
                            let _ = reply.send(stopped);
                        }
                        Some(EngineCommand::Signal(signal)) => {
                            self.manager.handle_signal(signal, Instant::now());
                        }
                    }
                }
                _ = heartbeat.tick() => {
                    self.manager.handle_signal(BattleSignal::Tick, Instant::now());
                }
            }

            self.dispatch_spawns();
        }

        tracing::debug!("orchestration engine stopped");
    }

    /// Perform queued spawns off-task; completions are marshalled back onto
    /// the engine task through the inbox.
    fn dispatch_spawns(&mut self) {
        for request in self.manager.take_spawn_requests() {
            let spawner = self.manager.host().spawner.clone();
            let tx = self.tx.clone();
            tokio::spawn(async move {
                if !request.delay.is_zero() {
                    tokio::time::sleep(request.delay).await;
                }
                let handle = spawner
                    .spawn(&request.monster, &request.placement, request.level)
                    .await;
                let signal = BattleSignal::ActorSpawned {
                    participant: request.participant,
                    chain_cursor: request.chain_cursor,
                    handle,
                };
                let _ = tx.send(EngineCommand::Signal(signal)).await;
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU64, Ordering};

    use super::*;
    use crate::encounter::{DefinitionStore, EncounterDefinition, Placement};
    use crate::outcome::OutcomeKind;
    use crate::ports::{
        ActorHandle, BoxFuture, CommandRunner, Enforcer, Host, Notice, NotificationSink,
        Presence, Relocator, Spawner,
    };
    use crate::recorder::MemoryRecorder;

    struct CountingSpawner {
        next: AtomicU64,
    }

    impl Spawner for CountingSpawner {
        fn spawn(&self, _monster: &str, _at: &Placement, _level: u32) -> BoxFuture<Option<ActorHandle>> {
            let handle = ActorHandle(self.next.fetch_add(1, Ordering::SeqCst));
            Box::pin(async move { Some(handle) })
        }

        fn remove(&self, _handle: ActorHandle) {}
    }

    struct Quiet;

    impl NotificationSink for Quiet {
        fn tell(&self, _participant: ParticipantId, _notice: &Notice) {}
        fn ambient(&self, _participant: ParticipantId, _notice: &Notice) {}
    }

    impl Relocator for Quiet {
        fn place(&self, _participant: ParticipantId, _at: &Placement) {}
    }

    impl Presence for Quiet {
        fn is_online(&self, _participant: ParticipantId) -> bool {
            true
        }
    }

    impl Enforcer for Quiet {
        fn slay(&self, _participant: ParticipantId, _attributed_to: Option<ActorHandle>) {}
    }

    impl CommandRunner for Quiet {
        fn run(&self, _command: &str) {}
    }

    fn make_definition(id: &str) -> EncounterDefinition {
        EncounterDefinition {
            id: id.to_string(),
            name: id.to_string(),
            enabled: true,
            monster: id.to_string(),
            monster_level: 1,
            time_limit_secs: 300,
            collection_secs: 0,
            survival: false,
            spawn_delay_secs: 0,
            chain: Vec::new(),
            arena: None,
            spawn: Some(Placement {
                world: "arena".to_string(),
                x: 0.0,
                y: 64.0,
                z: 0.0,
                yaw: 0.0,
                pitch: 0.0,
            }),
            exit: None,
            warnings: Vec::new(),
            victory_commands: Vec::new(),
            defeat_commands: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_spawn_completion_and_victory_round_trip() {
        let recorder = Arc::new(MemoryRecorder::new());
        let quiet = Arc::new(Quiet);
        let host = Host {
            spawner: Arc::new(CountingSpawner { next: AtomicU64::new(1) }),
            recorder: recorder.clone(),
            notifier: quiet.clone(),
            relocator: quiet.clone(),
            presence: quiet.clone(),
            enforcer: quiet.clone(),
            commands: quiet,
        };

        let store = DefinitionStore::from_definitions([make_definition("dragon")]);
        let manager = BattleManager::new(store, host);
        let (engine, handle) = Engine::new(manager);
        let engine_task = tokio::spawn(engine.run());

        let participant = ParticipantId(7);
        handle
            .start(participant, "ayu", "dragon")
            .await
            .expect("start failed");

        // Let the spawn task complete and its ActorSpawned signal drain
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        handle
            .signal(BattleSignal::ActorDied {
                handle: ActorHandle(1),
                monster: "dragon".to_string(),
            })
            .await;

        handle.shutdown().await;
        engine_task.await.expect("engine task panicked");

        let outcomes = recorder.outcomes();
        assert_eq!(outcomes.len(), 1, "expected exactly one outcome");
        assert_eq!(outcomes[0].kind, OutcomeKind::Victory);
        assert_eq!(outcomes[0].encounter_id, "dragon");
    }

    #[tokio::test]
    async fn test_start_on_stopped_engine_errors() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let handle = EngineHandle { tx };

        let result = handle.start(ParticipantId(1), "ayu", "dragon").await;
        assert_eq!(result, Err(StartError::EngineStopped));
    }
}
