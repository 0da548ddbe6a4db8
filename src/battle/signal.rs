//! Signals delivered to the battle manager by the host event feed.
//!
//! Each variant is one discrete "interesting thing that happened". The
//! handler re-validates session phase for every variant, so a stale or
//! duplicated signal is a safe no-op.

use crate::ports::{ActorHandle, ParticipantId};

#[derive(Debug, Clone)]
pub enum BattleSignal {
    /// Asynchronous spawn completion, marshalled back onto the
    /// orchestration thread by the engine.
    ActorSpawned {
        participant: ParticipantId,
        /// Chain position the spawn was requested for; a completion from a
        /// superseded step must not attach.
        chain_cursor: usize,
        /// `None` when the spawning backend failed.
        handle: Option<ActorHandle>,
    },

    /// A hostile actor died.
    ActorDied {
        handle: ActorHandle,
        /// Monster identifier reported by the host, matched against the
        /// session's expected monster.
        monster: String,
    },

    /// A hostile actor was removed by something outside the encounter
    /// (despawn sweep, admin purge).
    ActorRemoved { handle: ActorHandle },

    ParticipantDied { participant: ParticipantId },

    ParticipantDisconnected { participant: ParticipantId },

    /// Used to deliver relocations deferred while the participant was gone.
    ParticipantReconnected { participant: ParticipantId },

    /// Administrative force-stop of one participant's encounter.
    ForceStop { participant: ParticipantId },

    /// Host clock heartbeat, nominally once per second.
    Tick,
}
