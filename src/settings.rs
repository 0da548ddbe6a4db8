//! Runtime settings
//!
//! Host-level knobs, persisted via confy under the platform config
//! directory. Encounter definitions live in their own directory (see
//! `encounter::loader`); this covers everything else.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::encounter::default_definitions_dir;

const APP_NAME: &str = "gauntlet";
const CONFIG_NAME: &str = "settings";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Verbose lifecycle logging (the embedder wires this into its
    /// subscriber filter).
    pub debug: bool,

    /// Offer the leave-early hint when a collection phase starts.
    pub show_leave_hint: bool,

    /// Directory holding encounter definition files.
    pub definitions_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            debug: false,
            show_leave_hint: true,
            definitions_dir: default_definitions_dir(),
        }
    }
}

impl Settings {
    /// Load persisted settings, falling back to defaults on first run.
    pub fn load() -> Result<Self, confy::ConfyError> {
        confy::load(APP_NAME, CONFIG_NAME)
    }

    pub fn store(&self) -> Result<(), confy::ConfyError> {
        confy::store(APP_NAME, CONFIG_NAME, self)
    }
}
