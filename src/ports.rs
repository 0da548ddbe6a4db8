//! Host integration seams
//!
//! The battle manager never talks to the embedding game server directly; it
//! consumes these narrow traits. Spawn completion is the only asynchronous
//! seam: its result is marshalled back onto the orchestration thread as a
//! signal by the engine, never applied inline.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::encounter::Placement;
use crate::recorder::OutcomeRecorder;

/// Stable identity of a participating player, assigned by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParticipantId(pub u64);

/// Opaque handle to a live hostile actor owned by the host's spawning backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActorHandle(pub u64);

pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// Produces and removes live hostile actors.
pub trait Spawner: Send + Sync {
    /// Asynchronously place a hostile actor in the world.
    ///
    /// Resolves to `None` when the backend cannot produce the actor; the
    /// encounter then simply runs without one.
    fn spawn(&self, monster: &str, at: &Placement, level: u32) -> BoxFuture<Option<ActorHandle>>;

    /// Remove a previously spawned actor. Safe on an already-removed handle.
    fn remove(&self, handle: ActorHandle);
}

/// Player-facing text, rendered by the host sink.
///
/// Variants carry typed values; templating and localization live host-side.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    /// An encounter (or the next chain step) has begun.
    EncounterStarted {
        encounter_name: String,
        time_limit_secs: u32,
        /// Surviving the clock is the win condition.
        survival: bool,
        /// `(step, total)` when part of a chain.
        chain_step: Option<(usize, usize)>,
    },
    /// Per-second warning text from the definition's warning table.
    TimeWarning { remaining_secs: u32, text: String },
    /// Ambient remaining-time display, refreshed every heartbeat.
    TimeRemaining {
        encounter_name: String,
        remaining_secs: u32,
    },
    Victory {
        encounter_name: String,
        clear_time_ms: u128,
        /// Won by outlasting the clock rather than a kill.
        survival: bool,
    },
    CollectionStarted {
        collection_secs: u32,
        /// Offer the leave-early hint.
        leave_hint: bool,
    },
    CollectionWarning { remaining_secs: u32 },
    CollectionRemaining { remaining_secs: u32 },
    CollectionEnded,
    Timeout { encounter_name: String },
    Defeat { encounter_name: String },
    /// The hostile actor vanished outside the encounter's control.
    ActorVanished { encounter_name: String },
}

/// Renders outcome/progress text and ambient feedback to a participant.
pub trait NotificationSink: Send + Sync {
    fn tell(&self, participant: ParticipantId, notice: &Notice);

    /// Transient display (action bar or similar), refreshed every tick.
    fn ambient(&self, participant: ParticipantId, notice: &Notice);
}

/// Moves a participant to a placement in the host world.
pub trait Relocator: Send + Sync {
    fn place(&self, participant: ParticipantId, at: &Placement);
}

/// Reachability of participants.
pub trait Presence: Send + Sync {
    fn is_online(&self, participant: ParticipantId) -> bool;
}

/// Applies world-side consequences to a participant.
pub trait Enforcer: Send + Sync {
    /// Deal a killing blow, attributed to the given actor when the host can
    /// resolve it, or as a generic defeat otherwise.
    fn slay(&self, participant: ParticipantId, attributed_to: Option<ActorHandle>);
}

/// Runs an already-expanded host command as the console/system actor.
pub trait CommandRunner: Send + Sync {
    fn run(&self, command: &str);
}

/// Bundle of host-side services consumed by the battle manager.
#[derive(Clone)]
pub struct Host {
    pub spawner: Arc<dyn Spawner>,
    pub recorder: Arc<dyn OutcomeRecorder>,
    pub notifier: Arc<dyn NotificationSink>,
    pub relocator: Arc<dyn Relocator>,
    pub presence: Arc<dyn Presence>,
    pub enforcer: Arc<dyn Enforcer>,
    pub commands: Arc<dyn CommandRunner>,
}
