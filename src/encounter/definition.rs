//! Encounter definition types
//!
//! Definitions are loaded from TOML files and describe timed boss
//! encounters: the monster to spawn, the clock, placements, chains and the
//! per-second warning table. A file can contain one or more definitions:
//!
//! ```toml
//! [[encounter]]
//! id = "dragon"
//! name = "Elder Dragon"
//! monster = "elder_dragon"
//! time_limit_secs = 300
//! collection_secs = 30
//! chain = ["dragon_broodmother"]
//!
//! [encounter.arena]
//! world = "arena"
//! x = 100.5
//! y = 64.0
//! z = -20.5
//!
//! [[encounter.warning]]
//! at_secs = 60
//! text = "One minute remains!"
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

fn default_time_limit() -> u32 {
    300
}

fn default_collection() -> u32 {
    30
}

fn default_level() -> u32 {
    1
}

fn default_spawn_delay() -> u32 {
    1
}

/// A point in the host world where a participant or actor is placed.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Placement {
    /// Host world identifier
    pub world: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    #[serde(default)]
    pub yaw: f32,
    #[serde(default)]
    pub pitch: f32,
}

/// Warning text fired when the clock hits an exact remaining-second value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeWarning {
    pub at_secs: u32,
    pub text: String,
}

/// Root structure for encounter definition files (TOML).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EncounterFile {
    #[serde(default, rename = "encounter")]
    pub encounters: Vec<EncounterDefinition>,
}

/// Immutable parameters of one timed boss encounter.
///
/// Loaded at process start or on explicit reload; the battle manager never
/// mutates a definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncounterDefinition {
    pub id: String,

    /// Display name; the loader falls back to `id` when omitted.
    #[serde(default)]
    pub name: String,

    /// Disabled encounters reject start requests but stay listed.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Monster identifier handed to the spawning backend; the loader falls
    /// back to `id` when omitted.
    #[serde(default)]
    pub monster: String,

    #[serde(default = "default_level")]
    pub monster_level: u32,

    /// Encounter clock, in whole seconds.
    #[serde(default = "default_time_limit")]
    pub time_limit_secs: u32,

    /// Post-victory collection window; zero skips the phase entirely.
    #[serde(default = "default_collection")]
    pub collection_secs: u32,

    /// Clock expiry is the *win* condition instead of a loss.
    #[serde(default)]
    pub survival: bool,

    /// Delay before asking the spawner, so surroundings can finish loading.
    #[serde(default = "default_spawn_delay")]
    pub spawn_delay_secs: u32,

    /// Encounter ids fought back-to-back after this one, in order.
    /// Every id in the chain is reserved up front at start time.
    #[serde(default)]
    pub chain: Vec<String>,

    // ─── Placements ─────────────────────────────────────────────────────────
    /// Where the participant is put when the encounter starts.
    #[serde(default)]
    pub arena: Option<Placement>,

    /// Where the hostile actor is spawned. Without one, no spawn is
    /// requested and the encounter runs against the clock alone.
    #[serde(default)]
    pub spawn: Option<Placement>,

    /// Where the participant is returned after the encounter ends.
    #[serde(default)]
    pub exit: Option<Placement>,

    // ─── Player feedback ────────────────────────────────────────────────────
    /// Warning texts keyed by exact remaining second.
    #[serde(default, rename = "warning")]
    pub warnings: Vec<TimeWarning>,

    // ─── Host command templates ─────────────────────────────────────────────
    /// Run on victory. Placeholders: `{player}`, `{encounter_id}`,
    /// `{encounter_name}`, `{time}`, `{time_ms}`.
    #[serde(default)]
    pub victory_commands: Vec<String>,

    /// Run on any failure outcome, same placeholders.
    #[serde(default)]
    pub defeat_commands: Vec<String>,
}

impl EncounterDefinition {
    pub fn time_limit(&self) -> Duration {
        Duration::from_secs(self.time_limit_secs as u64)
    }

    pub fn collection(&self) -> Duration {
        Duration::from_secs(self.collection_secs as u64)
    }

    pub fn spawn_delay(&self) -> Duration {
        Duration::from_secs(self.spawn_delay_secs as u64)
    }

    pub fn has_chain(&self) -> bool {
        !self.chain.is_empty()
    }

    /// Every slot this encounter claims: its own id plus the full chain.
    pub fn slot_ids(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.id.as_str()).chain(self.chain.iter().map(String::as_str))
    }

    /// Warning text for an exact remaining-second value.
    pub fn warning_at(&self, remaining_secs: u32) -> Option<&str> {
        self.warnings
            .iter()
            .find(|w| w.at_secs == remaining_secs)
            .map(|w| w.text.as_str())
    }
}
