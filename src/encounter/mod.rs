//! Encounter definitions
//!
//! This module provides:
//! - **Definitions**: immutable encounter parameters loaded from TOML
//! - **Store**: id-keyed lookup, swapped wholesale on reload
//!
//! In-flight sessions keep the `Arc<EncounterDefinition>` they captured at
//! (re)start, so a reload never changes behavior underneath a live
//! encounter.

mod definition;
mod error;
mod loader;

pub use definition::{EncounterDefinition, EncounterFile, Placement, TimeWarning};
pub use error::DefinitionError;
pub use loader::{DefinitionStore, default_definitions_dir};
