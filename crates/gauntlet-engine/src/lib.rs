//! # Gauntlet Engine
//!
//! Host for the duel core of Project Gauntlet.
//!
//! This crate ties the gameplay crate to the outside world:
//! - Engine configuration loading
//! - Scripted duel scenarios replayed through the protocol handler
//! - JSON-lines output of the emitted duel events

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod config;
pub mod scenario;

pub use config::{ConfigError, EngineConfig};
pub use scenario::{ReplayReport, Scenario, ScenarioError, StepAction, StepRecord};
