//! Battle orchestration
//!
//! This module provides:
//! - **Signals**: discrete events entering the manager from the host
//! - **Manager**: the session state machine, sole writer of session state,
//!   owner of the slot table, driver of both countdown clocks
//!
//! Everything here runs on one logical thread (the engine task); see
//! `runtime` for how asynchronous spawn completions are marshalled back.

mod manager;
mod signal;


pub use manager::{BattleManager, SpawnRequest, StartError};
pub use signal::BattleSignal;
