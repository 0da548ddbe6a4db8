pub mod battle;
pub mod clock;
pub mod encounter;
pub mod outcome;
pub mod ports;
pub mod recorder;
pub mod runtime;
pub mod session;
pub mod settings;
pub mod slots;
pub mod timefmt;

// Re-exports for convenience
pub use battle::{BattleManager, BattleSignal, SpawnRequest, StartError};
pub use clock::{ClockTick, CollectionClock, EncounterClock};
pub use encounter::{
    DefinitionError, DefinitionStore, EncounterDefinition, EncounterFile, Placement, TimeWarning,
};
pub use outcome::{Outcome, OutcomeKind};
pub use ports::{
    ActorHandle, CommandRunner, Enforcer, Host, Notice, NotificationSink, ParticipantId,
    Presence, Relocator, Spawner,
};
pub use recorder::{MemoryRecorder, OutcomeRecorder, RankingEntry};
pub use runtime::{Engine, EngineHandle};
pub use session::{BattlePhase, Session};
pub use settings::Settings;
pub use slots::SlotTable;
