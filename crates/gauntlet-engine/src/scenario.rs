//! Scripted duel replay.
//!
//! A scenario is a TOML document describing spells, players, one challenge
//! and a timeline of client signals and combat ticks. Replaying it drives a
//! [`DuelProtocolHandler`] against a [`ManualClock`] and records what every
//! step produced.
//!
//! ```toml
//! [[spells]]
//! id = 1953
//! name = "Blink"
//! recovery_time_ms = 15000
//!
//! [[players]]
//! name = "Jaina"
//! cooldowns = [{ spell = 1953, remaining_ms = 9000 }]
//!
//! [[players]]
//! name = "Garona"
//!
//! [challenge]
//! initiator = "Jaina"
//! opponent = "Garona"
//! arbiter = 42
//!
//! [[timeline]]
//! at_ms = 500
//! player = "Garona"
//! action = "accept"
//! ```

use gauntlet_common::{
    Clock, DuelError, GameTime, InvariantViolation, ManualClock, ObjectGuid, ParticipantId, SpellId,
};
use gauntlet_gameplay::{
    AuraType, DuelConfig, DuelEvent, DuelOutcome, DuelProtocolHandler, DuelSignal, DuelState,
    ModifierTable, ParticipantRegistry, Pet, Player, SignalOutcome, SpellInfo, SpellMod, SpellModOp,
    SpellStore, SpellStoreError,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Errors raised while loading or replaying a scenario.
#[derive(Debug, Error)]
pub enum ScenarioError {
    /// Scenario file could not be read
    #[error("failed to read scenario {}: {source}", path.display())]
    Io {
        /// Scenario path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// Scenario is not valid TOML
    #[error("failed to parse scenario: {0}")]
    Parse(#[from] toml::de::Error),

    /// Spell table is inconsistent
    #[error(transparent)]
    Spells(#[from] SpellStoreError),

    /// Two players share a name
    #[error("duplicate player name: {0}")]
    DuplicatePlayer(String),

    /// A step or the challenge names a player that is not declared
    #[error("unknown player: {0}")]
    UnknownPlayer(String),

    /// Timeline steps must not go back in time
    #[error("timeline step at {at_ms}ms comes after a step at {previous_ms}ms")]
    TimelineOrder {
        /// Offending step time
        at_ms: u64,
        /// Time of the step before it
        previous_ms: u64,
    },

    /// The challenge could not be opened
    #[error(transparent)]
    Duel(#[from] DuelError),

    /// Duel data is corrupt; the replay must not continue
    #[error(transparent)]
    Invariant(#[from] InvariantViolation),
}

/// A cooldown running when the scenario starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CooldownSpec {
    /// Spell on cooldown
    pub spell: SpellId,
    /// Time left at scenario start
    pub remaining_ms: u64,
    /// Cooldown category (0 = none)
    #[serde(default)]
    pub category: u32,
    /// Category time left at scenario start
    #[serde(default)]
    pub category_remaining_ms: u64,
    /// Entry is on hold
    #[serde(default)]
    pub on_hold: bool,
}

/// A spell modifier owned by a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpellModSpec {
    /// Affected spell
    pub spell: SpellId,
    /// Affected property
    #[serde(default = "default_mod_op")]
    pub op: SpellModOp,
    /// Flat change
    #[serde(default)]
    pub flat: i32,
    /// Percent change
    #[serde(default)]
    pub pct: i32,
}

fn default_mod_op() -> SpellModOp {
    SpellModOp::Cooldown
}

/// A player's pet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PetSpec {
    /// Display name
    pub name: String,
    /// Running pet cooldowns
    #[serde(default)]
    pub cooldowns: Vec<CooldownSpec>,
}

/// A player taking part in the scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSpec {
    /// Unique display name, used to refer to the player in the timeline
    pub name: String,
    /// Running cooldowns
    #[serde(default)]
    pub cooldowns: Vec<CooldownSpec>,
    /// Spell modifiers
    #[serde(default)]
    pub spell_mods: Vec<SpellModSpec>,
    /// Total of cooldown-reduction auras, in seconds
    #[serde(default)]
    pub cooldown_aura: i32,
    /// Optional pet
    #[serde(default)]
    pub pet: Option<PetSpec>,
}

/// The challenge opened before the timeline runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeSpec {
    /// Challenging player
    pub initiator: String,
    /// Challenged player
    pub opponent: String,
    /// Raw arbiter GUID
    pub arbiter: u64,
}

/// What a timeline step does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepAction {
    /// Player sends an accept
    Accept,
    /// Player sends a cancel
    Cancel,
    /// Combat-start tick for the player's duel
    Tick,
}

/// One timeline entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    /// Offset from scenario start
    pub at_ms: u64,
    /// Acting player
    pub player: String,
    /// Action
    pub action: StepAction,
    /// Arbiter echoed by an accept; defaults to the challenge arbiter
    #[serde(default)]
    pub arbiter: Option<u64>,
}

/// A full scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    /// Free-form label
    #[serde(default)]
    pub name: String,
    /// Server time at scenario start
    #[serde(default)]
    pub start_ms: u64,
    /// Spell definitions
    #[serde(default)]
    pub spells: Vec<SpellInfo>,
    /// Players
    pub players: Vec<PlayerSpec>,
    /// Challenge to open
    pub challenge: ChallengeSpec,
    /// Steps, in time order
    #[serde(default)]
    pub timeline: Vec<Step>,
}

/// What one step produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepRecord {
    /// Step time offset
    pub at_ms: u64,
    /// Acting player
    pub player: String,
    /// Action taken
    pub action: StepAction,
    /// Handler result
    pub outcome: SignalOutcome,
    /// Events emitted by the step
    pub events: Vec<DuelEvent>,
}

/// Result of a replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplayReport {
    /// Per-step records in timeline order
    pub steps: Vec<StepRecord>,
    /// Session state after the last step
    pub final_state: DuelState,
    /// Session outcome, if the duel ended
    pub outcome: Option<DuelOutcome>,
}

impl ReplayReport {
    /// All events in emission order.
    pub fn events(&self) -> impl Iterator<Item = &DuelEvent> {
        self.steps.iter().flat_map(|step| step.events.iter())
    }

    /// Writes the replay as JSON lines: optionally one line per step, then
    /// one line per event it emitted.
    pub fn write_json_lines<W: Write>(&self, mut out: W, with_steps: bool) -> io::Result<()> {
        for step in &self.steps {
            if with_steps {
                let line = json!({
                    "step": step.at_ms,
                    "player": step.player,
                    "action": step.action,
                    "outcome": step.outcome,
                });
                serde_json::to_writer(&mut out, &line)?;
                out.write_all(b"\n")?;
            }
            for event in &step.events {
                serde_json::to_writer(&mut out, event)?;
                out.write_all(b"\n")?;
            }
        }
        out.flush()
    }
}

impl Scenario {
    /// Parses a TOML scenario.
    pub fn from_toml_str(contents: &str) -> Result<Self, ScenarioError> {
        Ok(toml::from_str(contents)?)
    }

    /// Loads a TOML scenario from disk.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ScenarioError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Replays the scenario with `config`.
    pub fn run(&self, config: &DuelConfig) -> Result<ReplayReport, ScenarioError> {
        let start = GameTime::from_millis(self.start_ms);
        let clock = Arc::new(ManualClock::new(start));
        let registry = Arc::new(ParticipantRegistry::new());
        let spells = SpellStore::from_spells(self.spells.iter().cloned())?;

        let mut players: HashMap<&str, ParticipantId> = HashMap::with_capacity(self.players.len());
        for spec in &self.players {
            if players.contains_key(spec.name.as_str()) {
                return Err(ScenarioError::DuplicatePlayer(spec.name.clone()));
            }
            let handle = registry.register(build_player(spec, start));
            players.insert(spec.name.as_str(), handle.id());
        }
        let lookup = |name: &str| {
            players
                .get(name)
                .copied()
                .ok_or_else(|| ScenarioError::UnknownPlayer(name.to_string()))
        };

        let handler = DuelProtocolHandler::new(
            registry,
            Arc::new(spells),
            Arc::clone(&clock) as Arc<dyn Clock>,
            config.clone(),
        );

        let session = handler.open_challenge(
            lookup(self.challenge.initiator.as_str())?,
            lookup(self.challenge.opponent.as_str())?,
            ObjectGuid::new(self.challenge.arbiter),
        )?;
        handler.events().drain();
        info!(scenario = %self.name, steps = self.timeline.len(), "Replaying duel scenario");

        let mut steps = Vec::with_capacity(self.timeline.len());
        let mut previous_ms = 0;
        for step in &self.timeline {
            if step.at_ms < previous_ms {
                return Err(ScenarioError::TimelineOrder {
                    at_ms: step.at_ms,
                    previous_ms,
                });
            }
            previous_ms = step.at_ms;
            clock.set(start.add_millis(step.at_ms));

            let sender = lookup(step.player.as_str())?;
            let outcome = match step.action {
                StepAction::Accept => {
                    let arbiter = step.arbiter.unwrap_or(self.challenge.arbiter);
                    handler.handle(
                        sender,
                        DuelSignal::Accept {
                            arbiter_guid: ObjectGuid::new(arbiter),
                        },
                    )?
                },
                StepAction::Cancel => handler.handle(
                    sender,
                    DuelSignal::Cancel {
                        guid: ObjectGuid::EMPTY,
                    },
                )?,
                StepAction::Tick => handler.begin_combat(sender)?,
            };

            let events = handler.events().drain();
            debug!(
                at_ms = step.at_ms,
                player = %step.player,
                action = ?step.action,
                ?outcome,
                events = events.len(),
                "Replayed step"
            );
            steps.push(StepRecord {
                at_ms: step.at_ms,
                player: step.player.clone(),
                action: step.action,
                outcome,
                events,
            });
        }

        Ok(ReplayReport {
            steps,
            final_state: session.state(),
            outcome: session.outcome(),
        })
    }
}

fn build_player(spec: &PlayerSpec, now: GameTime) -> Player {
    let mut modifiers = ModifierTable::new();
    for m in &spec.spell_mods {
        modifiers.add_spell_mod(
            m.spell,
            m.op,
            SpellMod {
                flat: m.flat,
                pct: m.pct,
            },
        );
    }
    if spec.cooldown_aura != 0 {
        modifiers.add_aura(AuraType::ModCooldown, spec.cooldown_aura);
    }

    let mut player = Player::new(spec.name.as_str()).with_modifiers(modifiers);
    for cooldown in &spec.cooldowns {
        add_cooldown(player.spell_history_mut(), cooldown, now);
    }
    if let Some(pet_spec) = &spec.pet {
        let mut pet = Pet::new(pet_spec.name.as_str());
        for cooldown in &pet_spec.cooldowns {
            add_cooldown(pet.spell_history_mut(), cooldown, now);
        }
        player = player.with_pet(pet);
    }
    player
}

fn add_cooldown(history: &mut gauntlet_gameplay::SpellHistory, spec: &CooldownSpec, now: GameTime) {
    if spec.on_hold {
        history.add_on_hold(spec.spell, now, spec.remaining_ms);
    } else {
        history.add_cooldown_with_category(
            spec.spell,
            now,
            spec.remaining_ms,
            spec.category,
            spec.category_remaining_ms,
        );
    }
}
