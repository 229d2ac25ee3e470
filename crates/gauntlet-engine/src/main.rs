//! # Gauntlet
//!
//! Replays a scripted duel scenario and prints the emitted events as JSON
//! lines on stdout.
//!
//! Usage: `gauntlet <scenario.toml> [config.toml]`

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

use anyhow::{bail, Context, Result};
use gauntlet_engine::{EngineConfig, Scenario, ScenarioError};
use std::io;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Main entry point.
fn main() -> Result<()> {
    // Logs go to stderr, stdout carries the event stream
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(EnvFilter::from_default_env().add_directive("gauntlet=info".parse()?))
        .init();

    info!("Project Gauntlet starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let mut args = std::env::args().skip(1);
    let Some(scenario_path) = args.next().map(PathBuf::from) else {
        bail!("usage: gauntlet <scenario.toml> [config.toml]");
    };
    let config = match args.next() {
        Some(path) => EngineConfig::load(&path).with_context(|| format!("loading config {path}"))?,
        None => EngineConfig::load_or_default(EngineConfig::config_path()),
    };

    let scenario = Scenario::load(&scenario_path)?;
    let report = match scenario.run(&config.duel) {
        Ok(report) => report,
        Err(ScenarioError::Invariant(violation)) => {
            error!(%violation, "Duel invariant violated, aborting");
            std::process::abort();
        },
        Err(e) => return Err(e).context("replaying scenario"),
    };

    report.write_json_lines(io::stdout().lock(), config.emit_step_outcomes)?;

    info!(
        final_state = %report.final_state,
        steps = report.steps.len(),
        "Replay complete"
    );
    Ok(())
}
